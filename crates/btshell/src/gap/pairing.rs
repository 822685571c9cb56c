//! Pairing parameters
//!
//! The local pairing policy (I/O capability, MITM requirement, OOB presence,
//! bonding) that the demos answer pairing and I/O capability requests with.

use bitflags::bitflags;
use std::fmt;

pub const IO_CAPABILITY_DISPLAY_ONLY: u8 = 0x00;
pub const IO_CAPABILITY_DISPLAY_YES_NO: u8 = 0x01;
pub const IO_CAPABILITY_KEYBOARD_ONLY: u8 = 0x02;
pub const IO_CAPABILITY_NO_INPUT_NO_OUTPUT: u8 = 0x03;
pub const IO_CAPABILITY_KEYBOARD_DISPLAY: u8 = 0x04;

/// Largest passkey that can be entered or displayed
pub const MAX_PASSKEY: u32 = 999_999;

/// IO Capability types for pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCapability {
    /// Display only capability
    DisplayOnly,
    /// Display with yes/no capability
    DisplayYesNo,
    /// Keyboard only
    KeyboardOnly,
    /// No input, no output
    NoInputNoOutput,
    /// Both keyboard and display
    KeyboardDisplay,
}

impl IoCapability {
    /// Convert to u8 value for protocol
    pub fn to_u8(&self) -> u8 {
        match self {
            IoCapability::DisplayOnly => IO_CAPABILITY_DISPLAY_ONLY,
            IoCapability::DisplayYesNo => IO_CAPABILITY_DISPLAY_YES_NO,
            IoCapability::KeyboardOnly => IO_CAPABILITY_KEYBOARD_ONLY,
            IoCapability::NoInputNoOutput => IO_CAPABILITY_NO_INPUT_NO_OUTPUT,
            IoCapability::KeyboardDisplay => IO_CAPABILITY_KEYBOARD_DISPLAY,
        }
    }

    /// Convert from u8 value from protocol
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            IO_CAPABILITY_DISPLAY_ONLY => Some(IoCapability::DisplayOnly),
            IO_CAPABILITY_DISPLAY_YES_NO => Some(IoCapability::DisplayYesNo),
            IO_CAPABILITY_KEYBOARD_ONLY => Some(IoCapability::KeyboardOnly),
            IO_CAPABILITY_NO_INPUT_NO_OUTPUT => Some(IoCapability::NoInputNoOutput),
            IO_CAPABILITY_KEYBOARD_DISPLAY => Some(IoCapability::KeyboardDisplay),
            _ => None,
        }
    }

    /// Whether the user can answer a yes/no numeric comparison
    pub fn can_confirm(&self) -> bool {
        matches!(
            self,
            IoCapability::DisplayYesNo | IoCapability::KeyboardDisplay
        )
    }
}

impl fmt::Display for IoCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoCapability::DisplayOnly => write!(f, "Display Only"),
            IoCapability::DisplayYesNo => write!(f, "Display Yes/No"),
            IoCapability::KeyboardOnly => write!(f, "Keyboard Only"),
            IoCapability::NoInputNoOutput => write!(f, "No Input No Output"),
            IoCapability::KeyboardDisplay => write!(f, "Keyboard Display"),
        }
    }
}

bitflags! {
    /// SMP authentication requirement bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AuthRequirements: u8 {
        const BONDING = 0x01;
        const MITM = 0x04;
        const SECURE_CONNECTIONS = 0x08;
        const KEYPRESS = 0x10;
    }
}

/// Local pairing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingCapabilities {
    pub io_capability: IoCapability,
    pub oob_present: bool,
    pub mitm: bool,
    pub bonding: bool,
    pub secure_connections: bool,
}

impl Default for PairingCapabilities {
    fn default() -> Self {
        Self {
            io_capability: IoCapability::NoInputNoOutput,
            oob_present: false,
            mitm: false,
            bonding: true,
            secure_connections: false,
        }
    }
}

impl PairingCapabilities {
    pub fn auth_requirements(&self) -> AuthRequirements {
        let mut auth = AuthRequirements::empty();
        auth.set(AuthRequirements::BONDING, self.bonding);
        auth.set(AuthRequirements::MITM, self.mitm);
        auth.set(AuthRequirements::SECURE_CONNECTIONS, self.secure_connections);
        auth
    }
}

impl fmt::Display for PairingCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "I/O Capability: {}, MITM: {}, OOB: {}, Bonding: {}",
            self.io_capability, self.mitm, self.oob_present, self.bonding
        )
    }
}

/// Long Term Key with its identification values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongTermKey {
    pub key: [u8; 16],
    /// EDIV (Encrypted Diversifier)
    pub ediv: u16,
    /// RAND (Random number)
    pub rand: [u8; 8],
    /// Negotiated encryption key size in bytes
    pub key_size: u8,
}

impl LongTermKey {
    /// Whether this key answers an LTK request carrying `ediv`/`rand`
    pub fn matches(&self, ediv: u16, rand: &[u8; 8]) -> bool {
        self.ediv == ediv && &self.rand == rand
    }
}
