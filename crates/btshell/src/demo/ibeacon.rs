//! iBeacon advertiser
//!
//! The payload is rebuilt from the current fields each time advertising is
//! enabled. Changing a field while advertising does not restart it.

use super::common::{self, usage, value_param, Binding};
use super::{Demo, DemoConfig, DemoContext};
use crate::cli::{CommandError, CommandResult, Flow, Mode, ParameterList, TableError};
use crate::security::le::report_failure;
use crate::stack::BluetoothStack;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MAX_NUM_OF_PARAMETERS: usize = 5;

/// Flags structure followed by the Apple manufacturer data header
pub const IBEACON_PREFIX: [u8; 9] = [0x02, 0x01, 0x06, 0x1A, 0xFF, 0x4C, 0x00, 0x02, 0x15];

pub const IBEACON_PAYLOAD_LEN: usize = 30;

/// Length of the dashed text form, `8-4-4-16`
pub const UUID_STRING_LEN: usize = 35;

const UUID_DASHES: [usize; 3] = [8, 13, 18];

/// Dash positions of the RFC 4122 form, also accepted on input
const CANONICAL_UUID_STRING_LEN: usize = 36;
const CANONICAL_UUID_DASHES: [usize; 4] = [8, 13, 18, 23];

pub const DEFAULT_UUID: BeaconUuid = BeaconUuid([
    0xE2, 0xC5, 0x6D, 0xB5, 0xDF, 0xFB, 0x48, 0xD2, 0xB0, 0x60, 0xD0, 0xF5, 0xA7, 0x10, 0x96, 0xE0,
]);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UuidParseError {
    #[error("expected 35 characters, found {0}")]
    InvalidLength(usize),

    #[error("expected '-' at position {0}")]
    MisplacedDash(usize),

    #[error("invalid hexadecimal digit in UUID")]
    InvalidDigit,
}

/// Proximity UUID, most significant byte first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BeaconUuid(pub [u8; 16]);

impl FromStr for BeaconUuid {
    type Err = UuidParseError;

    /// Accepts `XXXXXXXX-XXXX-XXXX-XXXXXXXXXXXXXXXX` and the canonical
    /// `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`, hex digits in either case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dashes: &[usize] = match s.len() {
            UUID_STRING_LEN => &UUID_DASHES,
            CANONICAL_UUID_STRING_LEN => &CANONICAL_UUID_DASHES,
            len => return Err(UuidParseError::InvalidLength(len)),
        };

        let bytes = s.as_bytes();
        for &position in dashes {
            if bytes[position] != b'-' {
                return Err(UuidParseError::MisplacedDash(position));
            }
        }

        let digits: String = s
            .char_indices()
            .filter(|(index, _)| !dashes.contains(index))
            .map(|(_, c)| c)
            .collect();

        let mut uuid = [0u8; 16];
        hex::decode_to_slice(&digits, &mut uuid).map_err(|_| UuidParseError::InvalidDigit)?;
        Ok(BeaconUuid(uuid))
    }
}

impl fmt::Display for BeaconUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode_upper(self.0);
        write!(f, "{}-{}-{}-{}", &hex[..8], &hex[8..12], &hex[12..16], &hex[16..])
    }
}

pub struct IbeaconDemo {
    pub uuid: BeaconUuid,
    pub major: u16,
    pub minor: u16,
    pub tx_power: i8,
}

impl IbeaconDemo {
    /// The 30-byte advertising payload for the current fields
    pub fn payload(&self) -> [u8; IBEACON_PAYLOAD_LEN] {
        let mut payload = [0u8; IBEACON_PAYLOAD_LEN];
        payload[..9].copy_from_slice(&IBEACON_PREFIX);
        payload[9..25].copy_from_slice(&self.uuid.0);
        payload[25..27].copy_from_slice(&self.major.to_be_bytes());
        payload[27..29].copy_from_slice(&self.minor.to_be_bytes());
        payload[29] = self.tx_power as u8;
        payload
    }
}

impl Demo for IbeaconDemo {
    const NAME: &'static str = "iBeacon";
    const CONNECTABLE_ADVERTISING: bool = false;

    fn new(config: &DemoConfig) -> Self {
        Self {
            uuid: config.beacon.uuid,
            major: config.beacon.major,
            minor: config.beacon.minor,
            tx_power: config.beacon.tx_power,
        }
    }

    fn modes<S: BluetoothStack>() -> Result<Vec<Mode<DemoContext<S, Self>>>, TableError> {
        let mut bindings = common::gap_bindings::<S, Self>();
        bindings.extend(common::le_bindings::<S, Self>());
        let beacon: &[Binding<S, Self>] = &[
            ("SetIbeaconUUID", set_uuid),
            ("QueryIbeaconUUID", query_uuid),
            ("SetIbeaconMajor", set_major),
            ("SetIbeaconMinor", set_minor),
            ("SetIbeaconTxPower", set_tx_power),
            ("QueryIbeacon", query_ibeacon),
        ];
        bindings.extend_from_slice(beacon);

        Ok(vec![Mode::new("iBeacon", "iBeacon>", MAX_NUM_OF_PARAMETERS, &bindings)?])
    }

    fn open<S: BluetoothStack>(ctx: &mut DemoContext<S, Self>) -> Result<(), CommandError> {
        let info = match ctx.stack.open() {
            Ok(info) => info,
            Err(e) => {
                report_failure(&mut ctx.console, "BSC_Initialize", &e);
                return Err(CommandError::UnableToInitializeStack(e));
            }
        };
        ctx.stack_info = Some(info);
        ctx.console.line(format_args!("Bluetooth Stack ID: {}", info.stack_id));
        ctx.console
            .line(format_args!("BD_ADDR of Local Device is: {}.", info.local_address));
        Ok(())
    }

    fn close<S: BluetoothStack>(ctx: &mut DemoContext<S, Self>) {
        if ctx.stack_info.is_some() {
            ctx.stack.close();
            ctx.reset_session();
        }
    }

    fn advertising_data(&self, _config: &DemoConfig) -> Vec<u8> {
        self.payload().to_vec()
    }
}

fn set_uuid<S: BluetoothStack>(ctx: &mut DemoContext<S, IbeaconDemo>, params: &ParameterList) -> CommandResult {
    let Some(text) = params.get(0) else {
        return usage(
            &mut ctx.console,
            "SetIbeaconUUID [UUID (XXXXXXXX-XXXX-XXXX-XXXXXXXXXXXXXXXX)]",
        );
    };

    match text.text().parse::<BeaconUuid>() {
        Ok(uuid) => {
            ctx.demo.uuid = uuid;
            ctx.console.line(format_args!("iBeacon UUID set to {}.", uuid));
            Ok(Flow::Continue)
        }
        Err(e) => {
            ctx.console.line(format_args!("Invalid UUID: {}.", e));
            Err(CommandError::InvalidParameters)
        }
    }
}

fn query_uuid<S: BluetoothStack>(ctx: &mut DemoContext<S, IbeaconDemo>, _params: &ParameterList) -> CommandResult {
    ctx.console.line(ctx.demo.uuid);
    Ok(Flow::Continue)
}

fn u16_param(params: &ParameterList) -> Option<u16> {
    value_param(params, 0).and_then(|value| u16::try_from(value).ok())
}

fn set_major<S: BluetoothStack>(ctx: &mut DemoContext<S, IbeaconDemo>, params: &ParameterList) -> CommandResult {
    let Some(major) = u16_param(params) else {
        return usage(&mut ctx.console, "SetIbeaconMajor [Major (0 - 65535)]");
    };

    ctx.demo.major = major;
    ctx.console.line(format_args!("iBeacon major set to {}.", major));
    Ok(Flow::Continue)
}

fn set_minor<S: BluetoothStack>(ctx: &mut DemoContext<S, IbeaconDemo>, params: &ParameterList) -> CommandResult {
    let Some(minor) = u16_param(params) else {
        return usage(&mut ctx.console, "SetIbeaconMinor [Minor (0 - 65535)]");
    };

    ctx.demo.minor = minor;
    ctx.console.line(format_args!("iBeacon minor set to {}.", minor));
    Ok(Flow::Continue)
}

fn set_tx_power<S: BluetoothStack>(ctx: &mut DemoContext<S, IbeaconDemo>, params: &ParameterList) -> CommandResult {
    let tx_power = params
        .get(0)
        .and_then(|param| param.signed_value())
        .and_then(|value| i8::try_from(value).ok());
    let Some(tx_power) = tx_power else {
        return usage(&mut ctx.console, "SetIbeaconTxPower [Power in dBm (-128 - 127)]");
    };

    ctx.demo.tx_power = tx_power;
    ctx.console.line(format_args!("iBeacon TX power set to {} dBm.", tx_power));
    Ok(Flow::Continue)
}

fn query_ibeacon<S: BluetoothStack>(ctx: &mut DemoContext<S, IbeaconDemo>, _params: &ParameterList) -> CommandResult {
    let demo = &ctx.demo;
    ctx.console.line(format_args!("UUID:     {}", demo.uuid));
    ctx.console.line(format_args!("Major:    {}", demo.major));
    ctx.console.line(format_args!("Minor:    {}", demo.minor));
    ctx.console.line(format_args!("TX power: {} dBm", demo.tx_power));
    ctx.console
        .line(format_args!("Payload:  {}", hex::encode_upper(demo.payload())));
    Ok(Flow::Continue)
}
