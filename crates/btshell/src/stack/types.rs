//! Request parameter types for the stack boundary

use crate::gap::{BdAddr, LongTermKey, PairingCapabilities, ADVERTISING_INTERVAL_MAX_MS, ADVERTISING_INTERVAL_MIN_MS};
use crate::device::LinkKey;
use bitflags::bitflags;
use std::fmt;

/// Identity of an opened stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackInfo {
    pub stack_id: u32,
    pub local_address: BdAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingParameters {
    pub interval_min_ms: u16,
    pub interval_max_ms: u16,
    /// Connectable undirected advertising when set, non-connectable otherwise
    pub connectable: bool,
}

impl Default for AdvertisingParameters {
    fn default() -> Self {
        Self {
            interval_min_ms: ADVERTISING_INTERVAL_MIN_MS,
            interval_max_ms: ADVERTISING_INTERVAL_MAX_MS,
            connectable: true,
        }
    }
}

/// Answers to LE authentication requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeAuthenticationResponse {
    /// Reply to a pairing or security request with the local policy
    PairingCapabilities(PairingCapabilities),
    /// Numeric comparison answer
    Confirmation(bool),
    Passkey(u32),
    /// No out-of-band data is available
    OutOfBandUnavailable,
    /// LTK for an encryption request, `None` for a negative reply
    LongTermKey(Option<LongTermKey>),
}

/// Answers to classic (BR/EDR) authentication requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassicAuthenticationResponse {
    PinCode(String),
    /// Stored link key, `None` for a negative reply
    LinkKey(Option<LinkKey>),
    IoCapability(PairingCapabilities),
    UserConfirmation(bool),
    Passkey(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub u32);

bitflags! {
    /// HID Information flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HidsFlags: u8 {
        const REMOTE_WAKE = 0x01;
        const NORMALLY_CONNECTABLE = 0x02;
    }
}

/// GATT services a demo registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Service {
    Hids {
        country_code: u8,
        flags: HidsFlags,
        boot_keyboard: bool,
    },
    Battery,
    DeviceInformation {
        manufacturer_name: String,
        model_number: String,
    },
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::Hids { .. } => "HID Service",
            Service::Battery => "Battery Service",
            Service::DeviceInformation { .. } => "Device Information Service",
        }
    }
}

/// HID reports exposed by the HID service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HidReportKind {
    BootKeyboardInput,
    BootKeyboardOutput,
    BootMouseInput,
    Input,
    Output,
}

impl fmt::Display for HidReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HidReportKind::BootKeyboardInput => write!(f, "Boot Keyboard Input Report"),
            HidReportKind::BootKeyboardOutput => write!(f, "Boot Keyboard Output Report"),
            HidReportKind::BootMouseInput => write!(f, "Boot Mouse Input Report"),
            HidReportKind::Input => write!(f, "Input Report"),
            HidReportKind::Output => write!(f, "Output Report"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMode {
    Boot,
    Report,
}

impl fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolMode::Boot => write!(f, "Boot"),
            ProtocolMode::Report => write!(f, "Report"),
        }
    }
}

/// Responses to HID service read/write requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HidsResponse {
    ClientConfiguration(u16),
    ProtocolMode(ProtocolMode),
    ReportMap(Vec<u8>),
    Report(Vec<u8>),
    SetReportAccepted,
    /// ATT error code
    Error(u8),
}

/// Responses to Battery service read requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasResponse {
    ClientConfiguration(u16),
    BatteryLevel(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadsetRole {
    Headset,
    AudioGateway,
}

impl fmt::Display for HeadsetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadsetRole::Headset => write!(f, "Headset"),
            HeadsetRole::AudioGateway => write!(f, "Audio Gateway"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(pub u32);

// ATT error codes used in service responses
pub const ATT_ERROR_INVALID_OFFSET: u8 = 0x07;
pub const ATT_ERROR_ATTRIBUTE_NOT_LONG: u8 = 0x0B;
pub const ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH: u8 = 0x0D;
pub const ATT_ERROR_UNLIKELY: u8 = 0x0E;
