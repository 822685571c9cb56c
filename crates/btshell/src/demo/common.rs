//! Commands shared by the demos
//!
//! GAP mode control, pairing parameters and answers to authentication
//! requests. LE demos add [`le_bindings`], the headset demo adds
//! [`classic_bindings`].

use super::{Demo, DemoContext};
use crate::cli::{CommandError, CommandHandler, CommandResult, Flow, Parameter, ParameterList};
use crate::console::Console;
use crate::gap::{
    AddressType, BdAddr, ConnectionMode, DiscoveryMode, IoCapability, PairabilityMode,
    ADV_TYPE_COMPLETE_LOCAL_NAME, ADV_TYPE_FLAGS, ADV_TYPE_SHORT_LOCAL_NAME,
    MAX_ADVERTISING_DATA_LEN,
};
use crate::security::ResponseError;
use crate::stack::{AdvertisingParameters, BluetoothStack};

/// A command name bound to its handler
pub type Binding<S, D> = (&'static str, CommandHandler<DemoContext<S, D>>);

/// Commands every demo offers
pub fn gap_bindings<S: BluetoothStack, D: Demo>() -> Vec<Binding<S, D>> {
    let bindings: &[Binding<S, D>] = &[
        ("Help", help),
        ("GetLocalAddress", get_local_address),
        ("SetDiscoverabilityMode", set_discoverability_mode),
        ("SetConnectabilityMode", set_connectability_mode),
        ("SetPairabilityMode", set_pairability_mode),
        ("ChangePairingParameters", change_pairing_parameters),
        ("PassKeyResponse", passkey_response),
        ("UserConfirmationResponse", user_confirmation_response),
    ];
    bindings.to_vec()
}

/// Commands of the LE demos
pub fn le_bindings<S: BluetoothStack, D: Demo>() -> Vec<Binding<S, D>> {
    let bindings: &[Binding<S, D>] = &[
        ("AdvertiseLE", advertise_le),
        ("Disconnect", disconnect),
        ("ListDevices", list_devices),
        ("DeleteDevice", delete_device),
    ];
    bindings.to_vec()
}

/// Commands of the classic demos
pub fn classic_bindings<S: BluetoothStack, D: Demo>() -> Vec<Binding<S, D>> {
    let bindings: &[Binding<S, D>] = &[
        ("Inquiry", inquiry),
        ("Pair", pair),
        ("EndPairing", end_pairing),
        ("PINCodeResponse", pin_code_response),
        ("ListLinkKeys", list_link_keys),
        ("DeleteLinkKey", delete_link_key),
    ];
    bindings.to_vec()
}

/// Flags and local name, the name shortened to fit
pub fn default_advertising_data(config: &super::DemoConfig) -> Vec<u8> {
    let flags = DiscoveryMode::GeneralDiscoverable.advertising_flags();
    let mut data = vec![0x02, ADV_TYPE_FLAGS, flags];
    append_name(&mut data, &config.device_name);
    data
}

/// Append the local name structure, shortened when it does not fit
pub fn append_name(data: &mut Vec<u8>, name: &str) {
    let room = MAX_ADVERTISING_DATA_LEN.saturating_sub(data.len() + 2);
    if room == 0 || name.is_empty() {
        return;
    }

    let bytes = name.as_bytes();
    let (ad_type, len) = if bytes.len() <= room {
        (ADV_TYPE_COMPLETE_LOCAL_NAME, bytes.len())
    } else {
        (ADV_TYPE_SHORT_LOCAL_NAME, room)
    };
    data.push(len as u8 + 1);
    data.push(ad_type);
    data.extend_from_slice(&bytes[..len]);
}

/// Print a usage line and reject the parameters
pub fn usage(console: &mut Console, text: &str) -> CommandResult {
    console.line(format_args!("Usage: {}.", text));
    Err(CommandError::InvalidParameters)
}

/// Address parameter at `index`
pub fn address_param(params: &ParameterList, index: usize) -> Option<BdAddr> {
    params.get(index)?.text().parse().ok()
}

/// Numeric parameter at `index`, `None` when missing or not a number
pub fn value_param(params: &ParameterList, index: usize) -> Option<u32> {
    params.get(index).and_then(Parameter::value)
}

/// Boolean parameter written as 0 or 1
pub fn flag_param(params: &ParameterList, index: usize) -> Option<bool> {
    match value_param(params, index)? {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

fn help<S: BluetoothStack, D: Demo>(ctx: &mut DemoContext<S, D>, _params: &ParameterList) -> CommandResult {
    ctx.console.line("******************************************************************");
    ctx.console.line(format_args!("* {} command options:", D::NAME));
    for name in &ctx.commands {
        ctx.console.line(format_args!("*   {}", name));
    }
    ctx.console.line("*   Quit");
    ctx.console.line("******************************************************************");
    Ok(Flow::Continue)
}

fn get_local_address<S: BluetoothStack, D: Demo>(
    ctx: &mut DemoContext<S, D>,
    _params: &ParameterList,
) -> CommandResult {
    let info = ctx.stack_info()?;
    ctx.console
        .line(format_args!("BD_ADDR of Local Device is: {}.", info.local_address));
    Ok(Flow::Continue)
}

fn set_discoverability_mode<S: BluetoothStack, D: Demo>(
    ctx: &mut DemoContext<S, D>,
    params: &ParameterList,
) -> CommandResult {
    let Some(mode) = value_param(params, 0).and_then(DiscoveryMode::from_u32) else {
        return usage(
            &mut ctx.console,
            "SetDiscoverabilityMode [Mode (0 = Non Discoverable, 1 = Limited Discoverable, 2 = General Discoverable)]",
        );
    };

    ctx.call("GAP_Set_Discoverability_Mode", |stack| {
        stack.set_discoverability_mode(mode)
    })?;
    ctx.console.line(format_args!("Discoverability mode set to {:?}.", mode));
    Ok(Flow::Continue)
}

fn set_connectability_mode<S: BluetoothStack, D: Demo>(
    ctx: &mut DemoContext<S, D>,
    params: &ParameterList,
) -> CommandResult {
    let Some(mode) = value_param(params, 0).and_then(ConnectionMode::from_u32) else {
        return usage(
            &mut ctx.console,
            "SetConnectabilityMode [Mode (0 = Non Connectable, 1 = Connectable)]",
        );
    };

    ctx.call("GAP_Set_Connectability_Mode", |stack| {
        stack.set_connectability_mode(mode)
    })?;
    ctx.console.line(format_args!("Connectability mode set to {:?}.", mode));
    Ok(Flow::Continue)
}

fn set_pairability_mode<S: BluetoothStack, D: Demo>(
    ctx: &mut DemoContext<S, D>,
    params: &ParameterList,
) -> CommandResult {
    let Some(mode) = value_param(params, 0).and_then(PairabilityMode::from_u32) else {
        return usage(
            &mut ctx.console,
            "SetPairabilityMode [Mode (0 = Non Pairable, 1 = Pairable, 2 = Pairable (Secure))]",
        );
    };

    ctx.call("GAP_Set_Pairability_Mode", |stack| {
        stack.set_pairability_mode(mode)
    })?;
    ctx.console.line(format_args!("Pairability mode set to {:?}.", mode));
    Ok(Flow::Continue)
}

fn change_pairing_parameters<S: BluetoothStack, D: Demo>(
    ctx: &mut DemoContext<S, D>,
    params: &ParameterList,
) -> CommandResult {
    let io_capability = value_param(params, 0)
        .and_then(|value| u8::try_from(value).ok())
        .and_then(IoCapability::from_u8);
    let (Some(io_capability), Some(mitm), Some(oob_present)) =
        (io_capability, flag_param(params, 1), flag_param(params, 2))
    else {
        return usage(
            &mut ctx.console,
            "ChangePairingParameters [I/O Capability (0 = Display Only, 1 = Display Yes/No, \
             2 = Keyboard Only, 3 = No Input/Output, 4 = Keyboard/Display)] \
             [MITM (0 = No, 1 = Yes)] [OOB (0 = No, 1 = Yes)]",
        );
    };

    let capabilities = &mut ctx.config.capabilities;
    capabilities.io_capability = io_capability;
    capabilities.mitm = mitm;
    capabilities.oob_present = oob_present;
    ctx.le.capabilities = *capabilities;
    ctx.classic.capabilities = *capabilities;

    ctx.console
        .line(format_args!("Pairing parameters: {}.", ctx.config.capabilities));
    Ok(Flow::Continue)
}

fn report_response(console: &mut Console, result: Result<BdAddr, ResponseError>, what: &str) -> CommandResult {
    match result {
        Ok(address) => {
            console.line(format_args!("{} sent to {}.", what, address));
            Ok(Flow::Continue)
        }
        Err(ResponseError::Stack(e)) => {
            console.line(format_args!("{} failed: {}.", what, e.code()));
            Err(e.into())
        }
        Err(ResponseError::NotPending) => {
            console.line(format_args!("Unable to send {}: no request pending.", what));
            Err(CommandError::Function(ResponseError::NotPending.to_string()))
        }
        Err(e) => {
            console.line(format_args!("{}.", e));
            Err(CommandError::InvalidParameters)
        }
    }
}

fn passkey_response<S: BluetoothStack, D: Demo>(
    ctx: &mut DemoContext<S, D>,
    params: &ParameterList,
) -> CommandResult {
    ctx.stack_info()?;
    let Some(passkey) = value_param(params, 0) else {
        return usage(&mut ctx.console, "PassKeyResponse [Numeric Passkey (0 - 999999)]");
    };

    let result = if ctx.le.pending().is_some() {
        ctx.le.passkey_response(&mut ctx.stack, passkey)
    } else {
        ctx.classic.passkey_response(&mut ctx.stack, passkey)
    };
    report_response(&mut ctx.console, result, "Passkey response")
}

fn user_confirmation_response<S: BluetoothStack, D: Demo>(
    ctx: &mut DemoContext<S, D>,
    params: &ParameterList,
) -> CommandResult {
    ctx.stack_info()?;
    let Some(accept) = flag_param(params, 0) else {
        return usage(
            &mut ctx.console,
            "UserConfirmationResponse [Confirmation (0 = No, 1 = Yes)]",
        );
    };

    let result = if ctx.le.pending().is_some() {
        ctx.le.confirmation_response(&mut ctx.stack, accept)
    } else {
        ctx.classic.confirmation_response(&mut ctx.stack, accept)
    };
    report_response(&mut ctx.console, result, "User confirmation response")
}

fn pin_code_response<S: BluetoothStack, D: Demo>(
    ctx: &mut DemoContext<S, D>,
    params: &ParameterList,
) -> CommandResult {
    ctx.stack_info()?;
    let Some(pin) = params.get(0) else {
        return usage(&mut ctx.console, "PINCodeResponse [PIN Code]");
    };

    let result = ctx.classic.pin_code_response(&mut ctx.stack, pin.text());
    report_response(&mut ctx.console, result, "PIN code response")
}

fn advertise_le<S: BluetoothStack, D: Demo>(ctx: &mut DemoContext<S, D>, params: &ParameterList) -> CommandResult {
    let Some(enable) = flag_param(params, 0) else {
        return usage(&mut ctx.console, "AdvertiseLE [(0 = Disable, 1 = Enable)]");
    };

    if enable {
        let data = ctx.demo.advertising_data(&ctx.config);
        let advertising = AdvertisingParameters {
            connectable: D::CONNECTABLE_ADVERTISING,
            ..AdvertisingParameters::default()
        };
        ctx.call("GAP_LE_Set_Advertising_Data", |stack| {
            stack.le_set_advertising_data(&data)
        })?;
        ctx.call("GAP_LE_Advertising_Enable", |stack| {
            stack.le_advertising_enable(&advertising)
        })?;
        ctx.console.line("GAP_LE_Advertising_Enable success.");
    } else {
        ctx.call("GAP_LE_Advertising_Disable", |stack| stack.le_advertising_disable())?;
        ctx.console.line("GAP_LE_Advertising_Disable success.");
    }
    Ok(Flow::Continue)
}

fn disconnect<S: BluetoothStack, D: Demo>(ctx: &mut DemoContext<S, D>, _params: &ParameterList) -> CommandResult {
    ctx.stack_info()?;
    let Some(connection) = ctx.connection() else {
        ctx.console.line("No connection to disconnect.");
        return Err(CommandError::Function("not connected".to_string()));
    };

    ctx.call("GAP_LE_Disconnect", |stack| stack.le_disconnect(connection.address))?;
    Ok(Flow::Continue)
}

fn list_devices<S: BluetoothStack, D: Demo>(ctx: &mut DemoContext<S, D>, _params: &ParameterList) -> CommandResult {
    if ctx.devices.is_empty() {
        ctx.console.line("No known devices.");
        return Ok(Flow::Continue);
    }

    for record in ctx.devices.iter() {
        ctx.console.line(format_args!(
            "{} ({}): bonded {}, encrypted {}, key size {}",
            record.address,
            record.address_type,
            record.is_bonded(),
            record.is_encrypted(),
            record.encryption_key_size
        ));
    }
    Ok(Flow::Continue)
}

fn delete_device<S: BluetoothStack, D: Demo>(ctx: &mut DemoContext<S, D>, params: &ParameterList) -> CommandResult {
    let address_type = match value_param(params, 1) {
        None if params.len() < 2 => Some(AddressType::Public),
        Some(value) if value <= 3 => Some(AddressType::from(value as u8)),
        _ => None,
    };
    let (Some(address), Some(address_type)) = (address_param(params, 0), address_type) else {
        return usage(
            &mut ctx.console,
            "DeleteDevice [BD_ADDR] [Address Type (0 = Public, 1 = Random)]",
        );
    };

    match ctx.devices.remove(&address, address_type) {
        Some(record) => {
            ctx.console.line(format_args!("Device {} deleted.", record.address));
            Ok(Flow::Continue)
        }
        None => {
            ctx.console.line(format_args!("Device {} not found.", address));
            Err(CommandError::Function("unknown device".to_string()))
        }
    }
}

fn inquiry<S: BluetoothStack, D: Demo>(ctx: &mut DemoContext<S, D>, params: &ParameterList) -> CommandResult {
    let duration = match value_param(params, 0) {
        None if params.is_empty() => Some(10),
        Some(secs) if (1..=60).contains(&secs) => Some(secs as u8),
        _ => None,
    };
    let Some(duration) = duration else {
        return usage(&mut ctx.console, "Inquiry [Duration in seconds (1 - 60)]");
    };

    ctx.call("GAP_Perform_Inquiry", |stack| stack.inquiry(duration))?;
    ctx.console.line("Inquiry started.");
    Ok(Flow::Continue)
}

fn pair<S: BluetoothStack, D: Demo>(ctx: &mut DemoContext<S, D>, params: &ParameterList) -> CommandResult {
    let Some(address) = address_param(params, 0) else {
        return usage(&mut ctx.console, "Pair [BD_ADDR]");
    };

    ctx.call("GAP_Initiate_Bonding", |stack| stack.initiate_bonding(address))?;
    ctx.console.line(format_args!("Bonding with {} started.", address));
    Ok(Flow::Continue)
}

fn end_pairing<S: BluetoothStack, D: Demo>(ctx: &mut DemoContext<S, D>, params: &ParameterList) -> CommandResult {
    let Some(address) = address_param(params, 0) else {
        return usage(&mut ctx.console, "EndPairing [BD_ADDR]");
    };

    ctx.call("GAP_End_Bonding", |stack| stack.end_bonding(address))?;
    ctx.console.line(format_args!("Bonding with {} ended.", address));
    Ok(Flow::Continue)
}

fn list_link_keys<S: BluetoothStack, D: Demo>(ctx: &mut DemoContext<S, D>, _params: &ParameterList) -> CommandResult {
    if ctx.link_keys.is_empty() {
        ctx.console.line("No stored link keys.");
    }
    for address in ctx.link_keys.addresses() {
        ctx.console.line(format_args!("Link key stored for {}", address));
    }
    Ok(Flow::Continue)
}

fn delete_link_key<S: BluetoothStack, D: Demo>(ctx: &mut DemoContext<S, D>, params: &ParameterList) -> CommandResult {
    let Some(address) = address_param(params, 0) else {
        return usage(
            &mut ctx.console,
            "DeleteLinkKey [BD_ADDR (000000000000 deletes every key)]",
        );
    };

    let deleted = ctx.link_keys.delete(&address);
    ctx.console.line(format_args!("{} link key(s) deleted.", deleted));
    Ok(Flow::Continue)
}
