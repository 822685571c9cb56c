//! Headset profile demo
//!
//! Starts in a selection mode where the user picks the Headset or Audio
//! Gateway personality. Each personality has its own command table; leaving
//! it closes the open port and returns to the selection.

use super::common::{self, address_param, usage, value_param, Binding};
use super::{Demo, DemoContext, DemoConfig};
use crate::cli::{CommandError, CommandResult, Flow, Mode, ParameterList, TableError};
use crate::gap::{BdAddr, ConnectionMode, DiscoveryMode, PairabilityMode, HCI_STATUS_SUCCESS};
use crate::security::le::report_failure;
use crate::stack::{BluetoothStack, HeadsetEvent, HeadsetRole, PortId, StackEvent};
use log::{debug, info, warn};

pub const MAX_NUM_OF_PARAMETERS: usize = 5;

pub const MAX_GAIN: u32 = 15;

/// RFCOMM server channels a remote port can be opened on
pub const MIN_PORT: u32 = 1;
pub const MAX_PORT: u32 = 30;

pub const SELECTION_MODE: &str = "Selection";
pub const HEADSET_MODE: &str = "Headset";
pub const AUDIO_GATEWAY_MODE: &str = "AudioGateway";

/// The one port the demo keeps open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPort {
    pub port: PortId,
    pub remote: Option<BdAddr>,
    /// Set once the open is confirmed or was remotely initiated
    pub connected: bool,
}

#[derive(Debug, Default)]
pub struct HeadsetDemo {
    pub role: Option<HeadsetRole>,
    pub port: Option<OpenPort>,
    pub audio_connected: bool,
    pub speaker_gain: u8,
    pub microphone_gain: u8,
}

impl HeadsetDemo {
    fn close_port<S: BluetoothStack>(ctx: &mut DemoContext<S, Self>) {
        if let Some(open) = ctx.demo.port.take() {
            if let Err(e) = ctx.stack.hdset_close(open.port) {
                report_failure(&mut ctx.console, "HDSET_Close_Port", &e);
            }
        }
        ctx.demo.audio_connected = false;
    }
}

impl Demo for HeadsetDemo {
    const NAME: &'static str = "Headset";

    fn new(_config: &DemoConfig) -> Self {
        Self::default()
    }

    fn modes<S: BluetoothStack>() -> Result<Vec<Mode<DemoContext<S, Self>>>, TableError> {
        let selection: &[Binding<S, Self>] = &[
            ("Help", selection_help),
            ("Headset", select_headset),
            ("AudioGateway", select_audio_gateway),
        ];

        let mut headset = common::gap_bindings::<S, Self>();
        headset.extend(common::classic_bindings::<S, Self>());
        let mut audio_gateway = headset.clone();

        let headset_commands: &[Binding<S, Self>] = &[
            ("OpenAudioGateway", open_remote),
            ("ButtonPress", button_press),
            ("SetSpeakerGain", set_speaker_gain),
            ("SetMicrophoneGain", set_microphone_gain),
            ("CloseAudioGateway", close_remote),
        ];
        headset.extend_from_slice(headset_commands);

        let audio_gateway_commands: &[Binding<S, Self>] = &[
            ("OpenHeadset", open_remote),
            ("RingIndication", ring_indication),
            ("SetupAudio", setup_audio),
            ("ReleaseAudio", release_audio),
            ("SetSpeakerGain", set_speaker_gain),
            ("SetMicrophoneGain", set_microphone_gain),
            ("CloseHeadset", close_remote),
        ];
        audio_gateway.extend_from_slice(audio_gateway_commands);

        Ok(vec![
            Mode::new(SELECTION_MODE, "Choose Mode>", MAX_NUM_OF_PARAMETERS, selection)?,
            Mode::new(HEADSET_MODE, "Headset>", MAX_NUM_OF_PARAMETERS, &headset)?,
            Mode::new(AUDIO_GATEWAY_MODE, "AudioGateway>", MAX_NUM_OF_PARAMETERS, &audio_gateway)?,
        ])
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

        if let Err(e) = ctx.stack.set_discoverability_mode(DiscoveryMode::GeneralDiscoverable) {
            report_failure(&mut ctx.console, "GAP_Set_Discoverability_Mode", &e);
        }
        if let Err(e) = ctx.stack.set_connectability_mode(ConnectionMode::Connectable) {
            report_failure(&mut ctx.console, "GAP_Set_Connectability_Mode", &e);
        }
        if let Err(e) = ctx.stack.set_pairability_mode(PairabilityMode::PairableSecure) {
            report_failure(&mut ctx.console, "GAP_Set_Pairability_Mode", &e);
        }
        Ok(())
    }

    fn close<S: BluetoothStack>(ctx: &mut DemoContext<S, Self>) {
        if ctx.stack_info.is_some() {
            Self::close_port(ctx);
            ctx.stack.close();
            ctx.reset_session();
        }
    }

    fn handle_event<S: BluetoothStack>(ctx: &mut DemoContext<S, Self>, event: &StackEvent) {
        match event {
            StackEvent::InquiryResult { address } => {
                ctx.console.line(format_args!("Inquiry result: {}.", address));
            }
            StackEvent::InquiryComplete { count } => {
                ctx.console
                    .line(format_args!("Inquiry complete, {} device(s) found.", count));
            }
            StackEvent::Headset(event) => headset_event(ctx, event),
            _ => {}
        }
    }

    fn mode_exited<S: BluetoothStack>(ctx: &mut DemoContext<S, Self>, mode: &'static str) {
        if mode != SELECTION_MODE {
            debug!("Leaving {} mode", mode);
            Self::close_port(ctx);
            ctx.demo.role = None;
        }
    }
}

fn headset_event<S: BluetoothStack>(ctx: &mut DemoContext<S, HeadsetDemo>, event: &HeadsetEvent) {
    let ours = |port: &PortId, demo: &HeadsetDemo| demo.port.is_some_and(|open| open.port == *port);

    match event {
        HeadsetEvent::OpenIndication { port, address } => {
            if let Some(open) = ctx.demo.port {
                warn!("{} opened {:?} while {:?} is in use", address, port, open.port);
                ctx.console
                    .line(format_args!("Port already open, rejecting {}.", address));
                if open.port != *port {
                    if let Err(e) = ctx.stack.hdset_close(*port) {
                        report_failure(&mut ctx.console, "HDSET_Close_Port", &e);
                    }
                }
                return;
            }
            ctx.demo.port = Some(OpenPort {
                port: *port,
                remote: Some(*address),
                connected: true,
            });
            ctx.console.line(format_args!("Port opened by {}.", address));
        }
        HeadsetEvent::OpenConfirmation { port, status } if ours(port, &ctx.demo) => {
            if *status == HCI_STATUS_SUCCESS {
                if let Some(open) = ctx.demo.port.as_mut() {
                    open.connected = true;
                }
                ctx.console.line("Port open confirmed.");
            } else {
                ctx.demo.port = None;
                ctx.console
                    .line(format_args!("Port open failed: 0x{:02X}.", status));
            }
        }
        HeadsetEvent::CloseIndication { port } if ours(port, &ctx.demo) => {
            ctx.demo.port = None;
            ctx.demo.audio_connected = false;
            ctx.console.line("Port closed by the remote device.");
        }
        HeadsetEvent::AudioConnection { port, connected } if ours(port, &ctx.demo) => {
            ctx.demo.audio_connected = *connected;
            let state = if *connected { "connected" } else { "disconnected" };
            ctx.console.line(format_args!("Audio {}.", state));
        }
        HeadsetEvent::RingIndication { .. } => ctx.console.line("Ring."),
        HeadsetEvent::ButtonPressed { .. } => ctx.console.line("Button pressed."),
        HeadsetEvent::SpeakerGain { gain, .. } => {
            ctx.demo.speaker_gain = *gain;
            ctx.console.line(format_args!("Speaker gain: {}.", gain));
        }
        HeadsetEvent::MicrophoneGain { gain, .. } => {
            ctx.demo.microphone_gain = *gain;
            ctx.console.line(format_args!("Microphone gain: {}.", gain));
        }
        other => debug!("Ignoring event for another port: {:?}", other),
    }
}

fn selection_help<S: BluetoothStack>(
    ctx: &mut DemoContext<S, HeadsetDemo>,
    _params: &ParameterList,
) -> CommandResult {
    ctx.console.line("******************************************************************");
    ctx.console.line("* Choose a mode:");
    ctx.console.line("*   Headset");
    ctx.console.line("*   AudioGateway");
    ctx.console.line("*   Help");
    ctx.console.line("*   Quit");
    ctx.console.line("******************************************************************");
    Ok(Flow::Continue)
}

fn select_headset<S: BluetoothStack>(ctx: &mut DemoContext<S, HeadsetDemo>, _params: &ParameterList) -> CommandResult {
    ctx.demo.role = Some(HeadsetRole::Headset);
    info!("Headset role selected");
    Ok(Flow::Enter(HEADSET_MODE))
}

fn select_audio_gateway<S: BluetoothStack>(
    ctx: &mut DemoContext<S, HeadsetDemo>,
    _params: &ParameterList,
) -> CommandResult {
    ctx.demo.role = Some(HeadsetRole::AudioGateway);
    info!("Audio gateway role selected");
    Ok(Flow::Enter(AUDIO_GATEWAY_MODE))
}

/// Port the command acts on, reporting when none is open
fn open_port<S: BluetoothStack>(ctx: &mut DemoContext<S, HeadsetDemo>) -> Result<PortId, CommandError> {
    ctx.stack_info()?;
    match ctx.demo.port {
        Some(open) => Ok(open.port),
        None => {
            ctx.console.line("No port is open.");
            Err(CommandError::Function("no open port".to_string()))
        }
    }
}

fn open_remote<S: BluetoothStack>(ctx: &mut DemoContext<S, HeadsetDemo>, params: &ParameterList) -> CommandResult {
    let role = ctx.demo.role.unwrap_or(HeadsetRole::Headset);
    let port = value_param(params, 1).filter(|port| (MIN_PORT..=MAX_PORT).contains(port));
    let (Some(address), Some(server_port)) = (address_param(params, 0), port) else {
        let text = match role {
            HeadsetRole::Headset => "OpenAudioGateway [BD_ADDR] [Server Port (1 - 30)]",
            HeadsetRole::AudioGateway => "OpenHeadset [BD_ADDR] [Server Port (1 - 30)]",
        };
        return usage(&mut ctx.console, text);
    };

    if ctx.demo.port.is_some() {
        ctx.console.line("A port is already open.");
        return Err(CommandError::Function("port already open".to_string()));
    }

    let port = ctx.call("HDSET_Open_Remote_Port", |stack| {
        stack.hdset_open_remote(role, address, server_port as u8)
    })?;
    ctx.demo.port = Some(OpenPort {
        port,
        remote: Some(address),
        connected: false,
    });
    ctx.console
        .line(format_args!("Opening {} port {} on {}.", role, server_port, address));
    Ok(Flow::Continue)
}

fn close_remote<S: BluetoothStack>(ctx: &mut DemoContext<S, HeadsetDemo>, _params: &ParameterList) -> CommandResult {
    let port = open_port(ctx)?;
    ctx.call("HDSET_Close_Port", |stack| stack.hdset_close(port))?;
    ctx.demo.port = None;
    ctx.demo.audio_connected = false;
    ctx.console.line("Port closed.");
    Ok(Flow::Continue)
}

fn ring_indication<S: BluetoothStack>(ctx: &mut DemoContext<S, HeadsetDemo>, _params: &ParameterList) -> CommandResult {
    let port = open_port(ctx)?;
    ctx.call("HDSET_Ring_Indication", |stack| stack.hdset_ring_indication(port))?;
    Ok(Flow::Continue)
}

fn button_press<S: BluetoothStack>(ctx: &mut DemoContext<S, HeadsetDemo>, _params: &ParameterList) -> CommandResult {
    let port = open_port(ctx)?;
    ctx.call("HDSET_Send_Button_Press", |stack| stack.hdset_button_press(port))?;
    Ok(Flow::Continue)
}

fn setup_audio<S: BluetoothStack>(ctx: &mut DemoContext<S, HeadsetDemo>, _params: &ParameterList) -> CommandResult {
    let port = open_port(ctx)?;
    ctx.call("HDSET_Setup_Audio_Connection", |stack| stack.hdset_setup_audio(port))?;
    Ok(Flow::Continue)
}

fn release_audio<S: BluetoothStack>(ctx: &mut DemoContext<S, HeadsetDemo>, _params: &ParameterList) -> CommandResult {
    let port = open_port(ctx)?;
    ctx.call("HDSET_Release_Audio_Connection", |stack| {
        stack.hdset_release_audio(port)
    })?;
    Ok(Flow::Continue)
}

fn gain_param(params: &ParameterList) -> Option<u8> {
    value_param(params, 0)
        .filter(|gain| *gain <= MAX_GAIN)
        .map(|gain| gain as u8)
}

fn set_speaker_gain<S: BluetoothStack>(ctx: &mut DemoContext<S, HeadsetDemo>, params: &ParameterList) -> CommandResult {
    let Some(gain) = gain_param(params) else {
        return usage(&mut ctx.console, "SetSpeakerGain [Gain (0 - 15)]");
    };

    let port = open_port(ctx)?;
    ctx.call("HDSET_Set_Speaker_Gain", |stack| stack.hdset_set_speaker_gain(port, gain))?;
    ctx.demo.speaker_gain = gain;
    Ok(Flow::Continue)
}

fn set_microphone_gain<S: BluetoothStack>(
    ctx: &mut DemoContext<S, HeadsetDemo>,
    params: &ParameterList,
) -> CommandResult {
    let Some(gain) = gain_param(params) else {
        return usage(&mut ctx.console, "SetMicrophoneGain [Gain (0 - 15)]");
    };

    let port = open_port(ctx)?;
    ctx.call("HDSET_Set_Microphone_Gain", |stack| {
        stack.hdset_set_microphone_gain(port, gain)
    })?;
    ctx.demo.microphone_gain = gain;
    Ok(Flow::Continue)
}
