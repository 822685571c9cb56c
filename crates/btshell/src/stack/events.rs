//! Events reported by the Bluetooth stack

use super::types::{HidReportKind, PortId, ProtocolMode};
use crate::device::{ClientConfiguration, LinkKey};
use crate::gap::{AddressType, BdAddr, ConnectionParameters, IoCapability, LongTermKey, Role, AuthRequirements};

/// A message from the stack to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEvent {
    LeConnectionComplete {
        status: u8,
        address: BdAddr,
        address_type: AddressType,
        role: Role,
        parameters: ConnectionParameters,
    },
    LeDisconnectionComplete {
        address: BdAddr,
        address_type: AddressType,
        reason: u8,
    },
    LeEncryptionChange {
        address: BdAddr,
        address_type: AddressType,
        status: u8,
        encrypted: bool,
    },
    LeEncryptionRefreshComplete {
        address: BdAddr,
        address_type: AddressType,
        status: u8,
    },
    LeAuthentication {
        address: BdAddr,
        address_type: AddressType,
        event: LeAuthenticationEvent,
    },
    InquiryResult {
        address: BdAddr,
    },
    InquiryComplete {
        count: usize,
    },
    ClassicAuthentication {
        address: BdAddr,
        event: ClassicAuthenticationEvent,
    },
    Hids(HidsEvent),
    Bas(BasEvent),
    Headset(HeadsetEvent),
}

/// LE pairing and encryption requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeAuthenticationEvent {
    /// The central started pairing
    PairingRequest {
        io_capability: IoCapability,
        auth: AuthRequirements,
    },
    /// The peripheral asked for security
    SecurityRequest { auth: AuthRequirements },
    /// Numeric comparison value to confirm
    ConfirmationRequest { value: u32 },
    PasskeyRequest,
    PasskeyDisplay { passkey: u32 },
    OutOfBandRequest,
    /// The peer wants to encrypt with a previously distributed key
    LongTermKeyRequest { ediv: u16, rand: [u8; 8] },
    /// LTK received during key distribution
    EncryptionInformation { key: LongTermKey },
    /// IRK and identity address received during key distribution
    IdentityInformation {
        irk: [u8; 16],
        identity_address: BdAddr,
        identity_address_type: AddressType,
    },
    /// Pairing finished; non-zero status means it failed
    PairingStatus { status: u8, key_size: u8 },
    /// Re-encryption with stored keys finished
    SecurityEstablishmentComplete { status: u8 },
}

/// Classic (BR/EDR) pairing requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassicAuthenticationEvent {
    PinCodeRequest,
    LinkKeyRequest,
    LinkKeyCreation { key: LinkKey },
    IoCapabilityRequest,
    UserConfirmationRequest { value: u32 },
    PasskeyRequest,
    PasskeyDisplay { passkey: u32 },
    AuthenticationStatus { status: u8 },
}

/// HID service server events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HidsEvent {
    ReadClientConfiguration {
        address: BdAddr,
        address_type: AddressType,
        transaction_id: u32,
        report: HidReportKind,
    },
    ClientConfigurationUpdate {
        address: BdAddr,
        address_type: AddressType,
        report: HidReportKind,
        value: ClientConfiguration,
    },
    GetProtocolMode {
        transaction_id: u32,
    },
    SetProtocolMode {
        mode: ProtocolMode,
    },
    GetReportMap {
        transaction_id: u32,
        offset: u16,
    },
    GetReport {
        transaction_id: u32,
        report: HidReportKind,
    },
    SetReport {
        transaction_id: u32,
        report: HidReportKind,
        data: Vec<u8>,
    },
    ControlPoint {
        command: ControlPointCommand,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPointCommand {
    Suspend,
    ExitSuspend,
}

/// Battery service server events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasEvent {
    ReadClientConfiguration {
        address: BdAddr,
        address_type: AddressType,
        transaction_id: u32,
    },
    ClientConfigurationUpdate {
        address: BdAddr,
        address_type: AddressType,
        value: ClientConfiguration,
    },
    ReadBatteryLevel {
        transaction_id: u32,
    },
}

/// Headset profile events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadsetEvent {
    OpenIndication { port: PortId, address: BdAddr },
    OpenConfirmation { port: PortId, status: u8 },
    CloseIndication { port: PortId },
    AudioConnection { port: PortId, connected: bool },
    RingIndication { port: PortId },
    ButtonPressed { port: PortId },
    SpeakerGain { port: PortId, gain: u8 },
    MicrophoneGain { port: PortId, gain: u8 },
}
