use crate::gap::constants::*;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Central,
    Peripheral,
}

/// Discoverability mode set through `SetDiscoverabilityMode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMode {
    NonDiscoverable,
    LimitedDiscoverable,
    GeneralDiscoverable,
}

/// Connectability mode set through `SetConnectabilityMode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    NonConnectable,
    Connectable,
}

/// Pairability mode set through `SetPairabilityMode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairabilityMode {
    NonPairable,
    Pairable,
    /// Pairable with Secure Simple Pairing (classic) or Secure Connections (LE)
    PairableSecure,
}

impl DiscoveryMode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(DiscoveryMode::NonDiscoverable),
            1 => Some(DiscoveryMode::LimitedDiscoverable),
            2 => Some(DiscoveryMode::GeneralDiscoverable),
            _ => None,
        }
    }

    /// Advertising flags byte for this mode
    pub fn advertising_flags(&self) -> u8 {
        let discoverable = match self {
            DiscoveryMode::NonDiscoverable => 0,
            DiscoveryMode::LimitedDiscoverable => ADV_FLAG_LE_LIMITED_DISCOVERABLE,
            DiscoveryMode::GeneralDiscoverable => ADV_FLAG_LE_GENERAL_DISCOVERABLE,
        };
        discoverable | ADV_FLAG_BR_EDR_NOT_SUPPORTED
    }
}

impl ConnectionMode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(ConnectionMode::NonConnectable),
            1 => Some(ConnectionMode::Connectable),
            _ => None,
        }
    }
}

impl PairabilityMode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(PairabilityMode::NonPairable),
            1 => Some(PairabilityMode::Pairable),
            2 => Some(PairabilityMode::PairableSecure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    Public,
    Random,
    PublicIdentity,
    RandomIdentity,
}

impl AddressType {
    /// Type of the connection address an identity address is seen under
    pub fn device_type(self) -> Self {
        match self {
            AddressType::Public | AddressType::PublicIdentity => AddressType::Public,
            AddressType::Random | AddressType::RandomIdentity => AddressType::Random,
        }
    }
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        match value {
            PUBLIC_DEVICE_ADDRESS => AddressType::Public,
            RANDOM_DEVICE_ADDRESS => AddressType::Random,
            PUBLIC_IDENTITY_ADDRESS => AddressType::PublicIdentity,
            RANDOM_IDENTITY_ADDRESS => AddressType::RandomIdentity,
            _ => AddressType::Public,
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::Public => PUBLIC_DEVICE_ADDRESS,
            AddressType::Random => RANDOM_DEVICE_ADDRESS,
            AddressType::PublicIdentity => PUBLIC_IDENTITY_ADDRESS,
            AddressType::RandomIdentity => RANDOM_IDENTITY_ADDRESS,
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::Public => write!(f, "Public"),
            AddressType::Random => write!(f, "Random"),
            AddressType::PublicIdentity => write!(f, "Public Identity"),
            AddressType::RandomIdentity => write!(f, "Random Identity"),
        }
    }
}

/// Bluetooth device address
///
/// Bytes are stored least significant first, the order they travel over HCI.
/// The textual form is most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    /// The all-zero address, used as an empty-slot and "every device" marker
    pub const NULL: BdAddr = BdAddr { bytes: [0; 6] };

    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= 6 {
            let mut bytes = [0u8; 6];
            bytes.copy_from_slice(&slice[0..6]);
            Some(Self { bytes })
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_null(&self) -> bool {
        self.bytes == [0; 6]
    }

    /// Whether this random address is a resolvable private address
    ///
    /// Only meaningful when the peer reported a random address type.
    pub fn is_resolvable_private(&self) -> bool {
        self.bytes[5] & RANDOM_ADDRESS_TYPE_MASK == RESOLVABLE_PRIVATE_ADDRESS_BITS
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("expected 12 hexadecimal digits, found {0}")]
    InvalidLength(usize),

    #[error("invalid hexadecimal digit in address")]
    InvalidDigit,
}

impl FromStr for BdAddr {
    type Err = AddressParseError;

    /// Accepts `001122334455`, `0x001122334455` and `00:11:22:33:44:55`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let digits: String = s.chars().filter(|c| *c != ':').collect();

        if digits.len() != 12 {
            return Err(AddressParseError::InvalidLength(digits.len()));
        }

        let mut bytes = [0u8; 6];
        hex::decode_to_slice(&digits, &mut bytes).map_err(|_| AddressParseError::InvalidDigit)?;
        bytes.reverse();

        Ok(BdAddr { bytes })
    }
}

/// Connection parameters reported with an LE connection complete event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParameters {
    /// Connection interval in milliseconds
    pub interval_ms: u16,
    pub slave_latency: u16,
    /// Supervision timeout in milliseconds
    pub supervision_timeout_ms: u16,
}

/// The single active peer connection a demo tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub address: BdAddr,
    pub address_type: AddressType,
    pub role: Role,
    pub parameters: ConnectionParameters,
}
