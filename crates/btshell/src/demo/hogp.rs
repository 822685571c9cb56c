//! HID over GATT keyboard
//!
//! Registers the HID, Battery and Device Information services and types
//! console text into the connected host as keyboard reports.

use super::common::{self, usage, value_param, Binding};
use super::{Demo, DemoConfig, DemoContext};
use crate::cli::{CommandError, CommandResult, Flow, Mode, ParameterList, TableError};
use crate::device::ConfiguredCharacteristic;
use crate::gap::{
    BdAddr, ConnectionMode, DiscoveryMode, PairabilityMode, ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE,
    ADV_TYPE_APPEARANCE, ADV_TYPE_FLAGS,
};
use crate::security::le::report_failure;
use crate::stack::{
    BasEvent, BasResponse, BluetoothStack, ControlPointCommand, HidReportKind, HidsEvent,
    HidsFlags, HidsResponse, ProtocolMode, Service, ServiceId, StackEvent,
    ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH, ATT_ERROR_INVALID_OFFSET, ATT_ERROR_UNLIKELY,
};
use log::{info, warn};

/// Parameter capacity of the keyboard console
pub const MAX_NUM_OF_PARAMETERS: usize = 16;

pub const INPUT_REPORT_LEN: usize = 8;

/// Left shift bit of the modifier byte
pub const MODIFIER_LEFT_SHIFT: u8 = 0x02;

pub const MAX_BATTERY_LEVEL: u8 = 100;

// Keyboard output report LED bits
const LED_NUM_LOCK: u8 = 0x01;
const LED_CAPS_LOCK: u8 = 0x02;
const LED_SCROLL_LOCK: u8 = 0x04;

const HIDS_UUID: u16 = 0x1812;
const BATTERY_SERVICE_UUID: u16 = 0x180F;
const APPEARANCE_KEYBOARD: u16 = 0x03C1;

/// Boot-compatible keyboard report map with LED output report
pub const KEYBOARD_REPORT_MAP: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xA1, 0x01, // Collection (Application)
    0x05, 0x07, //   Usage Page (Key Codes)
    0x19, 0xE0, //   Usage Minimum (224)
    0x29, 0xE7, //   Usage Maximum (231)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data, Variable, Absolute), modifier byte
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Constant), reserved byte
    0x95, 0x05, //   Report Count (5)
    0x75, 0x01, //   Report Size (1)
    0x05, 0x08, //   Usage Page (LEDs)
    0x19, 0x01, //   Usage Minimum (1)
    0x29, 0x05, //   Usage Maximum (5)
    0x91, 0x02, //   Output (Data, Variable, Absolute), LED report
    0x95, 0x01, //   Report Count (1)
    0x75, 0x03, //   Report Size (3)
    0x91, 0x01, //   Output (Constant), LED padding
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x65, //   Logical Maximum (101)
    0x05, 0x07, //   Usage Page (Key Codes)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0x65, //   Usage Maximum (101)
    0x81, 0x00, //   Input (Data, Array), key array
    0xC0, // End Collection
];

/// HID usage and modifier for an ASCII character
pub fn ascii_to_usage(ch: char) -> Option<(u8, u8)> {
    const SHIFT: u8 = MODIFIER_LEFT_SHIFT;

    let key = match ch {
        'a'..='z' => (0, 0x04 + (ch as u8 - b'a')),
        'A'..='Z' => (SHIFT, 0x04 + (ch as u8 - b'A')),
        '1'..='9' => (0, 0x1E + (ch as u8 - b'1')),
        '0' => (0, 0x27),
        '\r' | '\n' => (0, 0x28),
        '\t' => (0, 0x2B),
        ' ' => (0, 0x2C),
        '-' => (0, 0x2D),
        '=' => (0, 0x2E),
        '[' => (0, 0x2F),
        ']' => (0, 0x30),
        '\\' => (0, 0x31),
        ';' => (0, 0x33),
        '\'' => (0, 0x34),
        '`' => (0, 0x35),
        ',' => (0, 0x36),
        '.' => (0, 0x37),
        '/' => (0, 0x38),
        '!' => (SHIFT, 0x1E),
        '@' => (SHIFT, 0x1F),
        '#' => (SHIFT, 0x20),
        '$' => (SHIFT, 0x21),
        '%' => (SHIFT, 0x22),
        '^' => (SHIFT, 0x23),
        '&' => (SHIFT, 0x24),
        '*' => (SHIFT, 0x25),
        '(' => (SHIFT, 0x26),
        ')' => (SHIFT, 0x27),
        '_' => (SHIFT, 0x2D),
        '+' => (SHIFT, 0x2E),
        '{' => (SHIFT, 0x2F),
        '}' => (SHIFT, 0x30),
        '|' => (SHIFT, 0x31),
        ':' => (SHIFT, 0x33),
        '"' => (SHIFT, 0x34),
        '~' => (SHIFT, 0x35),
        '<' => (SHIFT, 0x36),
        '>' => (SHIFT, 0x37),
        '?' => (SHIFT, 0x38),
        _ => return None,
    };
    Some(key)
}

fn configured_characteristic(report: HidReportKind) -> Option<ConfiguredCharacteristic> {
    match report {
        HidReportKind::Input => Some(ConfiguredCharacteristic::InputReport),
        HidReportKind::BootKeyboardInput => Some(ConfiguredCharacteristic::BootKeyboardInput),
        HidReportKind::BootMouseInput => Some(ConfiguredCharacteristic::BootMouseInput),
        HidReportKind::Output | HidReportKind::BootKeyboardOutput => None,
    }
}

pub struct HogpDemo {
    pub protocol_mode: ProtocolMode,
    pub current_input_report: [u8; INPUT_REPORT_LEN],
    pub current_output_report: u8,
    pub battery_level: u8,
    pub suspended: bool,
    services: Vec<ServiceId>,
}

impl HogpDemo {
    /// Report and client configuration keyboard input goes through
    pub fn input_report(&self) -> (HidReportKind, ConfiguredCharacteristic) {
        match self.protocol_mode {
            ProtocolMode::Boot => (
                HidReportKind::BootKeyboardInput,
                ConfiguredCharacteristic::BootKeyboardInput,
            ),
            ProtocolMode::Report => (HidReportKind::Input, ConfiguredCharacteristic::InputReport),
        }
    }

    pub fn services(&self) -> &[ServiceId] {
        &self.services
    }

    fn reset_connection_state(&mut self) {
        self.protocol_mode = ProtocolMode::Report;
        self.current_input_report = [0; INPUT_REPORT_LEN];
        self.current_output_report = 0;
        self.suspended = false;
    }
}

fn services(config: &DemoConfig) -> [Service; 3] {
    [
        Service::Hids {
            country_code: 0,
            flags: HidsFlags::REMOTE_WAKE | HidsFlags::NORMALLY_CONNECTABLE,
            boot_keyboard: true,
        },
        Service::Battery,
        Service::DeviceInformation {
            manufacturer_name: config.device_name.clone(),
            model_number: "HOGP Keyboard".to_string(),
        },
    ]
}

/// Unregister services, clean up GATT and close the stack
fn teardown<S: BluetoothStack>(ctx: &mut DemoContext<S, HogpDemo>) {
    while let Some(id) = ctx.demo.services.pop() {
        ctx.stack.unregister_service(id);
    }
    ctx.stack.gatt_cleanup();
    ctx.stack.close();
    ctx.reset_session();
}

impl Demo for HogpDemo {
    const NAME: &'static str = "HOGP";

    fn new(_config: &DemoConfig) -> Self {
        Self {
            protocol_mode: ProtocolMode::Report,
            current_input_report: [0; INPUT_REPORT_LEN],
            current_output_report: 0,
            battery_level: MAX_BATTERY_LEVEL,
            suspended: false,
            services: Vec::new(),
        }
    }

    fn modes<S: BluetoothStack>() -> Result<Vec<Mode<DemoContext<S, Self>>>, TableError> {
        let mut bindings = common::gap_bindings::<S, Self>();
        bindings.extend(common::le_bindings::<S, Self>());
        let keyboard: &[Binding<S, Self>] = &[
            ("NotifyKeyboardReport", notify_keyboard_report),
            ("SetBatteryLevel", set_battery_level),
            ("NotifyBatteryLevel", notify_battery_level),
            ("ProtocolMode", protocol_mode),
        ];
        bindings.extend_from_slice(keyboard);

        Ok(vec![Mode::new("HOGP", "HOGP>", MAX_NUM_OF_PARAMETERS, &bindings)?])
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

        if let Err(e) = ctx.stack.gatt_initialize() {
            report_failure(&mut ctx.console, "GATT_Initialize", &e);
            ctx.stack.close();
            ctx.reset_session();
            return Err(CommandError::UnableToInitializeStack(e));
        }

        for service in services(&ctx.config) {
            match ctx.stack.register_service(&service) {
                Ok(id) => {
                    info!("{} registered as {:?}", service.name(), id);
                    ctx.demo.services.push(id);
                }
                Err(e) => {
                    report_failure(&mut ctx.console, service.name(), &e);
                    teardown(ctx);
                    return Err(CommandError::UnableToRegisterServer(e));
                }
            }
        }

        if let Err(e) = ctx.stack.set_pairability_mode(PairabilityMode::Pairable) {
            report_failure(&mut ctx.console, "GAP_Set_Pairability_Mode", &e);
        }
        if let Err(e) = ctx.stack.set_connectability_mode(ConnectionMode::Connectable) {
            report_failure(&mut ctx.console, "GAP_Set_Connectability_Mode", &e);
        }
        Ok(())
    }

    fn close<S: BluetoothStack>(ctx: &mut DemoContext<S, Self>) {
        if ctx.stack_info.is_some() {
            teardown(ctx);
        }
    }

    fn handle_event<S: BluetoothStack>(ctx: &mut DemoContext<S, Self>, event: &StackEvent) {
        match event {
            StackEvent::LeConnectionComplete { status: 0, .. } | StackEvent::LeDisconnectionComplete { .. } => {
                ctx.demo.reset_connection_state();
            }
            StackEvent::Hids(event) => hids_event(ctx, event),
            StackEvent::Bas(event) => bas_event(ctx, event),
            _ => {}
        }
    }

    fn advertising_data(&self, config: &DemoConfig) -> Vec<u8> {
        let flags = DiscoveryMode::GeneralDiscoverable.advertising_flags();
        let appearance = APPEARANCE_KEYBOARD.to_le_bytes();
        let hids = HIDS_UUID.to_le_bytes();
        let battery = BATTERY_SERVICE_UUID.to_le_bytes();

        let mut data = vec![
            0x02,
            ADV_TYPE_FLAGS,
            flags,
            0x03,
            ADV_TYPE_APPEARANCE,
            appearance[0],
            appearance[1],
            0x05,
            ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE,
            hids[0],
            hids[1],
            battery[0],
            battery[1],
        ];
        common::append_name(&mut data, &config.device_name);
        data
    }
}

fn hids_event<S: BluetoothStack>(ctx: &mut DemoContext<S, HogpDemo>, event: &HidsEvent) {
    let response = match event {
        HidsEvent::ReadClientConfiguration {
            address,
            address_type,
            transaction_id,
            report,
        } => {
            let value = configured_characteristic(*report)
                .and_then(|characteristic| {
                    ctx.devices
                        .find(address, *address_type)
                        .map(|record| record.client_configuration(characteristic))
                })
                .unwrap_or_default();
            Some((*transaction_id, HidsResponse::ClientConfiguration(value.bits())))
        }
        HidsEvent::ClientConfigurationUpdate {
            address,
            address_type,
            report,
            value,
        } => {
            ctx.console.line(format_args!(
                "{} client configuration from {}: {:?}.",
                report, address, value
            ));
            let characteristic = configured_characteristic(*report);
            match (characteristic, ctx.devices.find_mut(address, *address_type)) {
                (Some(characteristic), Some(record)) => {
                    record.set_client_configuration(characteristic, *value)
                }
                _ => warn!("Client configuration for unknown peer {}", address),
            }
            None
        }
        HidsEvent::GetProtocolMode { transaction_id } => Some((
            *transaction_id,
            HidsResponse::ProtocolMode(ctx.demo.protocol_mode),
        )),
        HidsEvent::SetProtocolMode { mode } => {
            ctx.demo.protocol_mode = *mode;
            ctx.console.line(format_args!("Protocol mode set to {}.", mode));
            None
        }
        HidsEvent::GetReportMap {
            transaction_id,
            offset,
        } => {
            let offset = *offset as usize;
            let response = if offset > KEYBOARD_REPORT_MAP.len() {
                HidsResponse::Error(ATT_ERROR_INVALID_OFFSET)
            } else {
                HidsResponse::ReportMap(KEYBOARD_REPORT_MAP[offset..].to_vec())
            };
            Some((*transaction_id, response))
        }
        HidsEvent::GetReport {
            transaction_id,
            report,
        } => {
            let response = match report {
                HidReportKind::Input | HidReportKind::BootKeyboardInput => {
                    HidsResponse::Report(ctx.demo.current_input_report.to_vec())
                }
                HidReportKind::Output | HidReportKind::BootKeyboardOutput => {
                    HidsResponse::Report(vec![ctx.demo.current_output_report])
                }
                HidReportKind::BootMouseInput => HidsResponse::Error(ATT_ERROR_UNLIKELY),
            };
            Some((*transaction_id, response))
        }
        HidsEvent::SetReport {
            transaction_id,
            report,
            data,
        } => {
            let response = match report {
                HidReportKind::Output | HidReportKind::BootKeyboardOutput => match data.as_slice() {
                    [leds] => {
                        ctx.demo.current_output_report = *leds;
                        show_leds(ctx, *leds);
                        HidsResponse::SetReportAccepted
                    }
                    _ => HidsResponse::Error(ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH),
                },
                HidReportKind::Input | HidReportKind::BootKeyboardInput => {
                    if data.len() == INPUT_REPORT_LEN {
                        ctx.demo.current_input_report.copy_from_slice(data);
                        HidsResponse::SetReportAccepted
                    } else {
                        HidsResponse::Error(ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH)
                    }
                }
                HidReportKind::BootMouseInput => HidsResponse::Error(ATT_ERROR_UNLIKELY),
            };
            Some((*transaction_id, response))
        }
        HidsEvent::ControlPoint { command } => {
            ctx.demo.suspended = *command == ControlPointCommand::Suspend;
            ctx.console.line(format_args!("Control point: {:?}.", command));
            None
        }
    };

    if let Some((transaction_id, response)) = response {
        let _ = ctx.call("HIDS_Response", |stack| stack.hids_response(transaction_id, response));
    }
}

fn show_leds<S: BluetoothStack>(ctx: &mut DemoContext<S, HogpDemo>, leds: u8) {
    let state = |bit: u8| if leds & bit != 0 { "ON" } else { "OFF" };
    ctx.console.line(format_args!(
        "LEDs: Num Lock {}, Caps Lock {}, Scroll Lock {}.",
        state(LED_NUM_LOCK),
        state(LED_CAPS_LOCK),
        state(LED_SCROLL_LOCK)
    ));
}

fn bas_event<S: BluetoothStack>(ctx: &mut DemoContext<S, HogpDemo>, event: &BasEvent) {
    let response = match event {
        BasEvent::ReadClientConfiguration {
            address,
            address_type,
            transaction_id,
        } => {
            let value = ctx
                .devices
                .find(address, *address_type)
                .map(|record| record.client_configuration(ConfiguredCharacteristic::BatteryLevel))
                .unwrap_or_default();
            Some((*transaction_id, BasResponse::ClientConfiguration(value.bits())))
        }
        BasEvent::ClientConfigurationUpdate {
            address,
            address_type,
            value,
        } => {
            match ctx.devices.find_mut(address, *address_type) {
                Some(record) => {
                    record.set_client_configuration(ConfiguredCharacteristic::BatteryLevel, *value)
                }
                None => warn!("Battery configuration for unknown peer {}", address),
            }
            ctx.console
                .line(format_args!("Battery level client configuration: {:?}.", value));
            None
        }
        BasEvent::ReadBatteryLevel { transaction_id } => Some((
            *transaction_id,
            BasResponse::BatteryLevel(ctx.demo.battery_level),
        )),
    };

    if let Some((transaction_id, response)) = response {
        let _ = ctx.call("BAS_Response", |stack| stack.bas_response(transaction_id, response));
    }
}

/// Connected peer that is encrypted and subscribed to `characteristic`
fn subscribed_peer<S: BluetoothStack>(
    ctx: &DemoContext<S, HogpDemo>,
    characteristic: ConfiguredCharacteristic,
) -> Option<BdAddr> {
    let connection = ctx.connection()?;
    let record = ctx.devices.find(&connection.address, connection.address_type)?;
    (record.is_encrypted() && record.notifications_enabled(characteristic)).then_some(connection.address)
}

fn notify_keyboard_report<S: BluetoothStack>(
    ctx: &mut DemoContext<S, HogpDemo>,
    params: &ParameterList,
) -> CommandResult {
    if params.is_empty() {
        return usage(&mut ctx.console, "NotifyKeyboardReport [String to send]");
    }
    ctx.stack_info()?;

    let (report, characteristic) = ctx.demo.input_report();
    let Some(address) = subscribed_peer(ctx, characteristic) else {
        ctx.console
            .line("No encrypted connection with input report notifications enabled.");
        return Err(CommandError::Function("notifications disabled".to_string()));
    };

    for ch in params.raw().chars() {
        let Some((modifier, usage_id)) = ascii_to_usage(ch) else {
            ctx.console.line(format_args!("Skipping unsupported character '{}'.", ch));
            continue;
        };

        // Key down then key up, leaving the report cleared either way
        let key_down = [modifier, 0, usage_id, 0, 0, 0, 0, 0];
        ctx.demo.current_input_report = key_down;
        let result = ctx.call("HIDS_Notify_Input_Report", |stack| {
            stack.hids_notify_input_report(address, report, &key_down)
        });
        ctx.demo.current_input_report = [0; INPUT_REPORT_LEN];
        result?;

        let key_up = ctx.demo.current_input_report;
        ctx.call("HIDS_Notify_Input_Report", |stack| {
            stack.hids_notify_input_report(address, report, &key_up)
        })?;
    }
    Ok(Flow::Continue)
}

fn set_battery_level<S: BluetoothStack>(ctx: &mut DemoContext<S, HogpDemo>, params: &ParameterList) -> CommandResult {
    let Some(level) = value_param(params, 0).filter(|level| *level <= MAX_BATTERY_LEVEL as u32) else {
        return usage(&mut ctx.console, "SetBatteryLevel [Level (0 - 100)]");
    };

    ctx.demo.battery_level = level as u8;
    ctx.console.line(format_args!("Battery level set to {}%.", level));

    if let Some(address) = subscribed_peer(ctx, ConfiguredCharacteristic::BatteryLevel) {
        ctx.call("BAS_Notify_Battery_Level", |stack| {
            stack.bas_notify_battery_level(address, level as u8)
        })?;
    }
    Ok(Flow::Continue)
}

fn notify_battery_level<S: BluetoothStack>(
    ctx: &mut DemoContext<S, HogpDemo>,
    _params: &ParameterList,
) -> CommandResult {
    ctx.stack_info()?;
    let Some(address) = subscribed_peer(ctx, ConfiguredCharacteristic::BatteryLevel) else {
        ctx.console
            .line("No encrypted connection with battery notifications enabled.");
        return Err(CommandError::Function("notifications disabled".to_string()));
    };

    let level = ctx.demo.battery_level;
    ctx.call("BAS_Notify_Battery_Level", |stack| {
        stack.bas_notify_battery_level(address, level)
    })?;
    Ok(Flow::Continue)
}

fn protocol_mode<S: BluetoothStack>(ctx: &mut DemoContext<S, HogpDemo>, _params: &ParameterList) -> CommandResult {
    ctx.console
        .line(format_args!("Protocol mode: {}.", ctx.demo.protocol_mode));
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_to_usage() {
        assert_eq!(ascii_to_usage('a'), Some((0, 0x04)));
        assert_eq!(ascii_to_usage('z'), Some((0, 0x1D)));
        assert_eq!(ascii_to_usage('A'), Some((MODIFIER_LEFT_SHIFT, 0x04)));
        assert_eq!(ascii_to_usage('1'), Some((0, 0x1E)));
        assert_eq!(ascii_to_usage('9'), Some((0, 0x26)));
        assert_eq!(ascii_to_usage('0'), Some((0, 0x27)));
        assert_eq!(ascii_to_usage('\n'), Some((0, 0x28)));
        assert_eq!(ascii_to_usage(' '), Some((0, 0x2C)));
        assert_eq!(ascii_to_usage('é'), None);
    }

    #[test]
    fn test_advertising_data_fits() {
        let demo = HogpDemo::new(&DemoConfig::default());
        let config = DemoConfig {
            device_name: "A keyboard with a very long name indeed".to_string(),
            ..DemoConfig::default()
        };
        let data = demo.advertising_data(&config);
        assert!(data.len() <= 31);
        assert_eq!(&data[..3], &[0x02, ADV_TYPE_FLAGS, 0x06]);
        assert_eq!(&data[9..11], &[0x12, 0x18]);
    }
}
