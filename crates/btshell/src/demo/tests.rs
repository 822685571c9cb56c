//! Unit tests for the demo command sets

use super::headset::{AUDIO_GATEWAY_MODE, HEADSET_MODE, SELECTION_MODE};
use super::hogp::KEYBOARD_REPORT_MAP;
use super::*;
use crate::cli::{CommandError, Flow};
use crate::console::CaptureBuffer;
use crate::device::ClientConfiguration;
use crate::gap::{AddressType, BdAddr, ConnectionMode, ConnectionParameters, PairabilityMode, Role};
use crate::runner::Runner;
use crate::stack::{
    AdvertisingParameters, BasEvent, ClassicAuthenticationEvent, ClassicAuthenticationResponse, EventQueue,
    HeadsetEvent, HeadsetRole, HidReportKind, HidsEvent, HidsResponse, Journal, LoopbackStack, PortId,
    ProtocolMode, Service, ServiceId, StackCall, StackEvent, ATT_ERROR_INVALID_OFFSET,
};
use std::time::Instant;

const LOCAL: BdAddr = BdAddr {
    bytes: [0x06, 0x05, 0x04, 0x03, 0x02, 0x01],
};

const PEER: BdAddr = BdAddr {
    bytes: [0x55, 0x44, 0x33, 0x22, 0x11, 0x00],
};

struct Session<D> {
    runner: Runner<LoopbackStack, D>,
    journal: Journal,
    output: CaptureBuffer,
}

impl<D: Demo> Session<D> {
    fn new(configure: impl FnOnce(&mut LoopbackStack)) -> Self {
        let (queue, sender) = EventQueue::new();
        let mut stack = LoopbackStack::new(LOCAL).with_events(sender);
        configure(&mut stack);
        let journal = stack.journal();
        let (console, output) = Console::capture();
        let runner = Runner::new(stack, console, DemoConfig::default(), queue).unwrap();

        Self {
            runner,
            journal,
            output,
        }
    }

    fn started() -> Self {
        let mut session = Self::new(|_| {});
        session.runner.start().unwrap();
        session.journal.take();
        session.output.take();
        session
    }

    fn line(&mut self, line: &str) -> Result<Flow, CommandError> {
        self.runner.process_line(line)
    }

    fn event(&mut self, event: StackEvent) {
        self.runner.handle_event(&event, Instant::now());
    }

    fn connect_encrypted(&mut self) {
        self.event(StackEvent::LeConnectionComplete {
            status: 0,
            address: PEER,
            address_type: AddressType::Public,
            role: Role::Peripheral,
            parameters: ConnectionParameters {
                interval_ms: 30,
                slave_latency: 0,
                supervision_timeout_ms: 2000,
            },
        });
        self.event(StackEvent::LeEncryptionChange {
            address: PEER,
            address_type: AddressType::Public,
            status: 0,
            encrypted: true,
        });
    }
}

fn subscribe(session: &mut Session<HogpDemo>, report: HidReportKind) {
    session.event(StackEvent::Hids(HidsEvent::ClientConfigurationUpdate {
        address: PEER,
        address_type: AddressType::Public,
        report,
        value: ClientConfiguration::NOTIFY,
    }));
}

fn notified_reports(calls: &[StackCall]) -> Vec<(HidReportKind, Vec<u8>)> {
    calls
        .iter()
        .filter_map(|call| match call {
            StackCall::HidsNotifyInputReport { report, data, .. } => Some((*report, data.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn test_hogp_open_sequence() {
    let mut session = Session::<HogpDemo>::new(|_| {});
    session.runner.start().unwrap();

    let calls = session.journal.take();
    assert_eq!(calls[0], StackCall::Open);
    assert_eq!(calls[1], StackCall::GattInitialize);
    assert!(matches!(calls[2], StackCall::RegisterService(Service::Hids { .. })));
    assert_eq!(calls[3], StackCall::RegisterService(Service::Battery));
    assert!(matches!(
        calls[4],
        StackCall::RegisterService(Service::DeviceInformation { .. })
    ));
    assert_eq!(calls[5], StackCall::SetPairabilityMode(PairabilityMode::Pairable));
    assert_eq!(calls[6], StackCall::SetConnectabilityMode(ConnectionMode::Connectable));
    assert_eq!(session.runner.context().demo.services().len(), 3);
}

#[test]
fn test_hogp_register_failure_tears_down() {
    let mut session = Session::<HogpDemo>::new(|stack| stack.fail("BAS_Initialize_Service"));

    let err = session.runner.start().unwrap_err();
    assert_eq!(err.code(), -9);
    assert!(!session.runner.is_running());
    assert!(session.runner.context().stack_info.is_none());

    let calls = session.journal.take();
    assert_eq!(calls.len(), 6);
    assert!(matches!(calls[2], StackCall::RegisterService(Service::Hids { .. })));
    assert_eq!(calls[3], StackCall::UnregisterService(ServiceId(1)));
    assert_eq!(calls[4], StackCall::GattCleanup);
    assert_eq!(calls[5], StackCall::Close);
}

#[test]
fn test_hogp_reports_mode_failures_at_open() {
    let mut session = Session::<HogpDemo>::new(|stack| stack.fail("GAP_Set_Pairability_Mode"));
    session.runner.start().unwrap();

    let output = session.output.contents();
    assert!(output.contains("GAP_Set_Pairability_Mode returned -1."));
    assert!(!output.contains("GAP_Set_Connectability_Mode returned"));
    assert!(session
        .journal
        .calls()
        .contains(&StackCall::SetConnectabilityMode(ConnectionMode::Connectable)));
}

#[test]
fn test_hogp_stack_open_failure() {
    let mut session = Session::<HogpDemo>::new(|stack| stack.fail("BSC_Initialize"));

    let err = session.runner.start().unwrap_err();
    assert_eq!(err.code(), -7);
    assert!(session.journal.take().is_empty());
    assert!(session.output.contents().contains("BSC_Initialize"));
}

#[test]
fn test_notify_keyboard_report_key_down_then_up() {
    let mut session = Session::<HogpDemo>::started();
    session.connect_encrypted();
    subscribe(&mut session, HidReportKind::Input);
    session.journal.take();

    assert_eq!(session.line("NotifyKeyboardReport a").unwrap(), Flow::Continue);

    let reports = notified_reports(&session.journal.take());
    assert_eq!(
        reports,
        vec![
            (HidReportKind::Input, vec![0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00]),
            (HidReportKind::Input, vec![0x00; 8]),
        ]
    );
    assert_eq!(session.runner.context().demo.current_input_report, [0; 8]);
}

#[test]
fn test_notify_keyboard_report_shifted_text() {
    let mut session = Session::<HogpDemo>::started();
    session.connect_encrypted();
    subscribe(&mut session, HidReportKind::Input);
    session.journal.take();

    session.line("NotifyKeyboardReport Hi 0").unwrap();

    let reports = notified_reports(&session.journal.take());
    // 'H', 'i', ' ', '0' each as key down and key up
    assert_eq!(reports.len(), 8);
    assert_eq!(reports[0].1[..3], [0x02, 0x00, 0x0B]);
    assert_eq!(reports[2].1[..3], [0x00, 0x00, 0x0C]);
    assert_eq!(reports[4].1[..3], [0x00, 0x00, 0x2C]);
    assert_eq!(reports[6].1[..3], [0x00, 0x00, 0x27]);
    assert!(reports.iter().skip(1).step_by(2).all(|(_, data)| data == &[0; 8]));
}

#[test]
fn test_notify_keyboard_report_keeps_spacing() {
    let mut session = Session::<HogpDemo>::started();
    session.connect_encrypted();
    subscribe(&mut session, HidReportKind::Input);
    session.journal.take();

    session.line("NotifyKeyboardReport a   b\r\n").unwrap();

    let usages: Vec<u8> = notified_reports(&session.journal.take())
        .iter()
        .step_by(2)
        .map(|(_, data)| data[2])
        .collect();
    assert_eq!(usages, vec![0x04, 0x2C, 0x2C, 0x2C, 0x05]);
}

#[test]
fn test_notify_keyboard_report_requires_subscription() {
    let mut session = Session::<HogpDemo>::started();
    session.connect_encrypted();
    session.journal.take();

    let err = session.line("NotifyKeyboardReport a").unwrap_err();
    assert_eq!(err.code(), -4);
    assert!(notified_reports(&session.journal.take()).is_empty());
}

#[test]
fn test_notify_keyboard_report_requires_encryption() {
    let mut session = Session::<HogpDemo>::started();
    session.event(StackEvent::LeConnectionComplete {
        status: 0,
        address: PEER,
        address_type: AddressType::Public,
        role: Role::Peripheral,
        parameters: ConnectionParameters {
            interval_ms: 30,
            slave_latency: 0,
            supervision_timeout_ms: 2000,
        },
    });
    subscribe(&mut session, HidReportKind::Input);
    session.journal.take();

    assert!(session.line("NotifyKeyboardReport a").is_err());
    assert!(notified_reports(&session.journal.take()).is_empty());
}

#[test]
fn test_boot_protocol_uses_boot_report() {
    let mut session = Session::<HogpDemo>::started();
    session.connect_encrypted();
    session.event(StackEvent::Hids(HidsEvent::SetProtocolMode {
        mode: ProtocolMode::Boot,
    }));
    subscribe(&mut session, HidReportKind::BootKeyboardInput);
    session.journal.take();

    session.line("NotifyKeyboardReport z").unwrap();

    let reports = notified_reports(&session.journal.take());
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].0, HidReportKind::BootKeyboardInput);
    assert_eq!(reports[0].1[2], 0x1D);
}

#[test]
fn test_disconnect_resets_protocol_mode() {
    let mut session = Session::<HogpDemo>::started();
    session.connect_encrypted();
    session.event(StackEvent::Hids(HidsEvent::SetProtocolMode {
        mode: ProtocolMode::Boot,
    }));
    session.event(StackEvent::LeDisconnectionComplete {
        address: PEER,
        address_type: AddressType::Public,
        reason: 0x13,
    });

    assert_eq!(session.runner.context().demo.protocol_mode, ProtocolMode::Report);
    assert!(session.runner.context().connection().is_none());
}

#[test]
fn test_report_map_reads() {
    let mut session = Session::<HogpDemo>::started();

    session.event(StackEvent::Hids(HidsEvent::GetReportMap {
        transaction_id: 7,
        offset: 0,
    }));
    session.event(StackEvent::Hids(HidsEvent::GetReportMap {
        transaction_id: 8,
        offset: KEYBOARD_REPORT_MAP.len() as u16 + 1,
    }));

    let calls = session.journal.take();
    assert_eq!(
        calls,
        vec![
            StackCall::HidsResponse(7, HidsResponse::ReportMap(KEYBOARD_REPORT_MAP.to_vec())),
            StackCall::HidsResponse(8, HidsResponse::Error(ATT_ERROR_INVALID_OFFSET)),
        ]
    );
}

#[test]
fn test_set_output_report_shows_leds() {
    let mut session = Session::<HogpDemo>::started();

    session.event(StackEvent::Hids(HidsEvent::SetReport {
        transaction_id: 3,
        report: HidReportKind::Output,
        data: vec![0x02],
    }));

    assert_eq!(session.runner.context().demo.current_output_report, 0x02);
    assert!(session.output.contents().contains("Caps Lock ON"));
    assert_eq!(
        session.journal.take(),
        vec![StackCall::HidsResponse(3, HidsResponse::SetReportAccepted)]
    );
}

#[test]
fn test_battery_level_commands() {
    let mut session = Session::<HogpDemo>::started();

    assert_eq!(session.line("SetBatteryLevel 101").unwrap_err().code(), -6);
    session.line("SetBatteryLevel 42").unwrap();
    assert_eq!(session.runner.context().demo.battery_level, 42);
    // Nobody subscribed, nothing sent
    assert!(session.journal.take().is_empty());

    session.connect_encrypted();
    session.event(StackEvent::Bas(BasEvent::ClientConfigurationUpdate {
        address: PEER,
        address_type: AddressType::Public,
        value: ClientConfiguration::NOTIFY,
    }));
    session.journal.take();

    session.line("NotifyBatteryLevel").unwrap();
    assert_eq!(
        session.journal.take(),
        vec![StackCall::BasNotifyBatteryLevel(PEER, 42)]
    );
}

#[test]
fn test_unknown_command_changes_nothing() {
    let mut session = Session::<HogpDemo>::started();

    let err = session.line("Bogus 1 2").unwrap_err();
    assert_eq!(err.code(), -2);
    assert!(session.journal.take().is_empty());
    assert!(session.output.contents().contains("Invalid Command: BOGUS"));
}

#[test]
fn test_help_lists_mode_commands() {
    let mut session = Session::<HogpDemo>::started();

    session.line("help").unwrap();
    let output = session.output.contents();
    assert!(output.contains("NotifyKeyboardReport"));
    assert!(output.contains("ChangePairingParameters"));
}

#[test]
fn test_commands_need_open_stack() {
    let mut session = Session::<IbeaconDemo>::new(|_| {});

    assert_eq!(session.line("GetLocalAddress").unwrap_err().code(), -8);
    assert_eq!(session.line("AdvertiseLE 1").unwrap_err().code(), -8);
}

#[test]
fn test_get_local_address() {
    let mut session = Session::<IbeaconDemo>::started();

    session.line("GetLocalAddress").unwrap();
    assert!(session
        .output
        .contents()
        .contains("BD_ADDR of Local Device is: 01:02:03:04:05:06."));
}

#[test]
fn test_change_pairing_parameters() {
    let mut session = Session::<HogpDemo>::started();

    session.line("ChangePairingParameters 2 1 0").unwrap();
    let ctx = session.runner.context();
    assert_eq!(ctx.config.capabilities.io_capability, crate::gap::IoCapability::KeyboardOnly);
    assert!(ctx.config.capabilities.mitm);
    assert_eq!(ctx.le.capabilities, ctx.config.capabilities);
    assert_eq!(ctx.classic.capabilities, ctx.config.capabilities);

    assert_eq!(session.line("ChangePairingParameters 7 1 0").unwrap_err().code(), -6);
}

#[test]
fn test_ibeacon_uuid_round_trip() {
    let mut session = Session::<IbeaconDemo>::started();

    session
        .line("SetIbeaconUUID E2C56DB5-DFFB-4848-D2B060D0F5A71096")
        .unwrap();
    session.output.take();
    session.line("QueryIbeaconUUID").unwrap();

    assert_eq!(
        session.output.lines()[0],
        "E2C56DB5-DFFB-4848-D2B060D0F5A71096"
    );
}

#[test]
fn test_ibeacon_lowercase_uuid() {
    let mut session = Session::<IbeaconDemo>::started();

    session
        .line("SetIbeaconUUID e2c56db5-dffb-4848-d2b060d0f5a71096")
        .unwrap();
    session.output.take();
    session.line("QueryIbeaconUUID").unwrap();

    assert!(session.output.lines()[0].eq_ignore_ascii_case("E2C56DB5-DFFB-4848-D2B060D0F5A71096"));
}

#[test]
fn test_ibeacon_rejects_misplaced_dashes() {
    let mut session = Session::<IbeaconDemo>::started();
    let before = session.runner.context().demo.uuid;

    let err = session
        .line("SetIbeaconUUID E2C56DB5D-FFB-4848-D2B060D0F5A71096")
        .unwrap_err();
    assert_eq!(err.code(), -6);
    assert_eq!(session.runner.context().demo.uuid, before);
}

#[test]
fn test_ibeacon_advertise_pushes_payload() {
    let mut session = Session::<IbeaconDemo>::started();

    session.line("SetIbeaconMajor 0x0102").unwrap();
    session.line("SetIbeaconMinor 772").unwrap();
    session.line("SetIbeaconTxPower -40").unwrap();
    session.line("AdvertiseLE 1").unwrap();

    let calls = session.journal.take();
    assert_eq!(calls.len(), 2);
    let StackCall::LeSetAdvertisingData(data) = &calls[0] else {
        panic!("expected advertising data, got {:?}", calls[0]);
    };
    assert_eq!(data.len(), 30);
    assert_eq!(&data[25..29], &[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(data[29] as i8, -40);
    assert_eq!(
        calls[1],
        StackCall::LeAdvertisingEnable(AdvertisingParameters {
            connectable: false,
            ..AdvertisingParameters::default()
        })
    );

    session.line("AdvertiseLE 0").unwrap();
    assert_eq!(session.journal.take(), vec![StackCall::LeAdvertisingDisable]);
}

#[test]
fn test_ibeacon_tx_power_range() {
    let mut session = Session::<IbeaconDemo>::started();

    assert!(session.line("SetIbeaconTxPower -129").is_err());
    assert!(session.line("SetIbeaconMajor 65536").is_err());
    assert_eq!(session.runner.context().demo.tx_power, -59);
}

#[test]
fn test_ibeacon_too_many_parameters() {
    let mut session = Session::<IbeaconDemo>::started();

    let err = session.line("QueryIbeacon 1 2 3 4 5 6").unwrap_err();
    assert_eq!(err.code(), -5);
    assert!(session.output.contents().contains("Too many parameters."));
}

#[test]
fn test_headset_mode_selection() {
    let mut session = Session::<HeadsetDemo>::started();
    assert_eq!(session.runner.active_mode().unwrap().name(), SELECTION_MODE);

    // Role commands are not installed until a personality is chosen
    assert_eq!(session.line("ButtonPress").unwrap_err().code(), -2);

    assert_eq!(session.line("AudioGateway").unwrap(), Flow::Enter(AUDIO_GATEWAY_MODE));
    assert_eq!(session.runner.active_mode().unwrap().name(), AUDIO_GATEWAY_MODE);
    assert_eq!(session.line("ButtonPress").unwrap_err().code(), -2);

    session.line("Quit").unwrap();
    assert_eq!(session.runner.active_mode().unwrap().name(), SELECTION_MODE);
    assert!(session.runner.is_running());

    session.line("Headset").unwrap();
    assert_eq!(session.runner.active_mode().unwrap().name(), HEADSET_MODE);
}

#[test]
fn test_headset_port_lifecycle() {
    let mut session = Session::<HeadsetDemo>::started();
    session.line("Headset").unwrap();

    assert_eq!(session.line("ButtonPress").unwrap_err().code(), -4);
    session.line("OpenAudioGateway 001122334455 3").unwrap();
    session.runner.pump(Instant::now());

    let port = session.runner.context().demo.port.unwrap();
    assert!(port.connected);
    assert_eq!(port.remote, Some(PEER));

    session.line("ButtonPress").unwrap();
    session.line("SetSpeakerGain 9").unwrap();
    assert_eq!(session.line("SetSpeakerGain 16").unwrap_err().code(), -6);
    assert_eq!(session.runner.context().demo.speaker_gain, 9);

    // Leaving the personality closes the port
    session.line("Quit").unwrap();
    let calls = session.journal.take();
    assert_eq!(
        calls,
        vec![
            StackCall::HdsetOpenRemote(HeadsetRole::Headset, PEER, 3),
            StackCall::HdsetButtonPress(PortId(1)),
            StackCall::HdsetSetSpeakerGain(PortId(1), 9),
            StackCall::HdsetClose(PortId(1)),
        ]
    );
    assert!(session.runner.context().demo.port.is_none());

    session.line("Quit").unwrap();
    assert!(!session.runner.is_running());
    assert_eq!(session.journal.take(), vec![StackCall::Close]);
}

#[test]
fn test_headset_second_open_indication_is_rejected() {
    const OTHER: BdAddr = BdAddr {
        bytes: [0x01, 0x01, 0x01, 0x01, 0x01, 0x01],
    };
    let mut session = Session::<HeadsetDemo>::started();
    session.line("Headset").unwrap();

    session.event(StackEvent::Headset(HeadsetEvent::OpenIndication {
        port: PortId(7),
        address: PEER,
    }));
    session.event(StackEvent::Headset(HeadsetEvent::OpenIndication {
        port: PortId(8),
        address: OTHER,
    }));

    let port = session.runner.context().demo.port.unwrap();
    assert_eq!(port.port, PortId(7));
    assert_eq!(port.remote, Some(PEER));
    assert_eq!(session.journal.take(), vec![StackCall::HdsetClose(PortId(8))]);
    assert!(session.output.contents().contains("Port already open"));
}

#[test]
fn test_audio_gateway_audio_connection() {
    let mut session = Session::<HeadsetDemo>::started();
    session.line("AudioGateway").unwrap();

    assert!(session.line("OpenHeadset 001122334455 31").is_err());
    session.line("OpenHeadset 001122334455 1").unwrap();
    session.line("SetupAudio").unwrap();
    session.runner.pump(Instant::now());
    assert!(session.runner.context().demo.audio_connected);

    session.line("ReleaseAudio").unwrap();
    session.runner.pump(Instant::now());
    assert!(!session.runner.context().demo.audio_connected);

    session.line("RingIndication").unwrap();
    session.line("CloseHeadset").unwrap();
    assert!(session.runner.context().demo.port.is_none());
}

#[test]
fn test_headset_pin_code_response() {
    let mut session = Session::<HeadsetDemo>::started();
    session.line("Headset").unwrap();

    assert_eq!(session.line("PINCodeResponse 1234").unwrap_err().code(), -4);

    session.event(StackEvent::ClassicAuthentication {
        address: PEER,
        event: ClassicAuthenticationEvent::PinCodeRequest,
    });
    session.line("PINCodeResponse 1234").unwrap();

    assert_eq!(
        session.journal.take(),
        vec![StackCall::AuthenticationResponse(
            PEER,
            ClassicAuthenticationResponse::PinCode("1234".to_string())
        )]
    );
}

#[test]
fn test_headset_link_key_commands() {
    let mut session = Session::<HeadsetDemo>::started();
    session.line("Headset").unwrap();

    session.event(StackEvent::ClassicAuthentication {
        address: PEER,
        event: ClassicAuthenticationEvent::LinkKeyCreation {
            key: crate::device::LinkKey([0xAB; 16]),
        },
    });
    session.output.take();

    session.line("ListLinkKeys").unwrap();
    assert!(session.output.contents().contains("00:11:22:33:44:55"));

    session.line("DeleteLinkKey 000000000000").unwrap();
    assert!(session.runner.context().link_keys.is_empty());
}

#[test]
fn test_headset_inquiry_results_printed() {
    let mut session = Session::<HeadsetDemo>::started();
    session.line("Headset").unwrap();

    session.line("Inquiry 5").unwrap();
    session.event(StackEvent::InquiryResult { address: PEER });
    session.event(StackEvent::InquiryComplete { count: 1 });

    assert_eq!(session.journal.take(), vec![StackCall::Inquiry(5)]);
    let output = session.output.contents();
    assert!(output.contains("Inquiry result: 00:11:22:33:44:55."));
    assert!(output.contains("1 device(s) found"));
}

#[test]
fn test_default_advertising_data_shortens_name() {
    let config = DemoConfig {
        device_name: "x".repeat(40),
        ..DemoConfig::default()
    };

    let data = common::default_advertising_data(&config);
    assert_eq!(data.len(), 31);
    assert_eq!(data[3] as usize, 31 - 4);
    assert_eq!(data[4], crate::gap::ADV_TYPE_SHORT_LOCAL_NAME);
}
