//! End-to-end runs of the demos against the loopback stack

use btshell::console::CaptureBuffer;
use btshell::device::DeviceFlags;
use btshell::gap::{ConnectionParameters, LongTermKey, Role};
use btshell::stack::{Journal, StackCall};
use btshell::{
    AddressType, BdAddr, Console, DemoConfig, EventQueue, EventSender, HogpDemo, IbeaconDemo,
    LoopbackStack, Runner, StackEvent,
};
use std::time::{Duration, Instant};

const PEER: BdAddr = BdAddr {
    bytes: [0x55, 0x44, 0x33, 0x22, 0x11, 0x00],
};

fn runner<D: btshell::Demo>() -> (Runner<LoopbackStack, D>, Journal, CaptureBuffer, EventSender) {
    let (queue, sender) = EventQueue::new();
    let stack = LoopbackStack::new(BdAddr::new([1, 2, 3, 4, 5, 6])).with_events(sender.clone());
    let journal = stack.journal();
    let (console, output) = Console::capture();
    let runner = Runner::new(stack, console, DemoConfig::default(), queue).unwrap();
    (runner, journal, output, sender)
}

fn bonded_peer(runner: &mut Runner<LoopbackStack, HogpDemo>) {
    let (record, _) = runner.context_mut().devices.create(PEER, AddressType::Public);
    record.long_term_key = Some(LongTermKey {
        key: [0x11; 16],
        ediv: 0x1234,
        rand: [0x22; 8],
        key_size: 16,
    });
    record.flags.insert(DeviceFlags::BONDED);
}

fn connection_complete() -> StackEvent {
    StackEvent::LeConnectionComplete {
        status: 0,
        address: PEER,
        address_type: AddressType::Public,
        role: Role::Peripheral,
        parameters: ConnectionParameters {
            interval_ms: 30,
            slave_latency: 4,
            supervision_timeout_ms: 4000,
        },
    }
}

fn security_requests(journal: &Journal) -> usize {
    journal.count(|call| matches!(call, StackCall::LeRequestSecurity(_)))
}

#[test]
fn test_run_handles_queued_lines_in_order() {
    let (mut runner, journal, output, sender) = runner::<IbeaconDemo>();

    sender.line("SetIbeaconMajor 7");
    sender.line("AdvertiseLE 1");
    sender.line("bogus");
    sender.shutdown();
    runner.run().unwrap();

    assert!(!runner.is_running());
    let calls = journal.calls();
    assert_eq!(calls.first(), Some(&StackCall::Open));
    assert!(matches!(calls[1], StackCall::LeSetAdvertisingData(ref data) if data[25..27] == [0x00, 0x07]));
    assert!(matches!(calls[2], StackCall::LeAdvertisingEnable(_)));
    assert_eq!(calls.last(), Some(&StackCall::Close));
    assert!(output.contents().contains("Invalid Command: BOGUS"));
}

#[test]
fn test_quit_ends_single_mode_demo() {
    let (mut runner, journal, _output, sender) = runner::<IbeaconDemo>();

    sender.line("quit");
    sender.line("AdvertiseLE 1");
    runner.run().unwrap();

    // Nothing after the quit is handled
    assert_eq!(journal.calls(), vec![StackCall::Open, StackCall::Close]);
}

#[test]
fn test_resecurity_requested_once_after_timeout() {
    let (mut runner, journal, _output, _sender) = runner::<HogpDemo>();
    runner.start().unwrap();
    bonded_peer(&mut runner);
    journal.take();

    let connected_at = Instant::now();
    runner.handle_event(&connection_complete(), connected_at);

    // 30 ms * (4 + 8)
    runner.poll_timers(connected_at + Duration::from_millis(359));
    assert_eq!(security_requests(&journal), 0);

    runner.poll_timers(connected_at + Duration::from_millis(360));
    assert_eq!(security_requests(&journal), 1);

    runner.poll_timers(connected_at + Duration::from_secs(5));
    assert_eq!(security_requests(&journal), 1);
}

#[test]
fn test_encryption_cancels_resecurity() {
    let (mut runner, journal, _output, _sender) = runner::<HogpDemo>();
    runner.start().unwrap();
    bonded_peer(&mut runner);
    journal.take();

    let connected_at = Instant::now();
    runner.handle_event(&connection_complete(), connected_at);
    runner.handle_event(
        &StackEvent::LeEncryptionChange {
            address: PEER,
            address_type: AddressType::Public,
            status: 0,
            encrypted: true,
        },
        connected_at + Duration::from_millis(100),
    );

    runner.poll_timers(connected_at + Duration::from_secs(1));
    assert_eq!(security_requests(&journal), 0);
    assert!(runner.context().timers.is_empty());

    let record = runner.context().devices.find(&PEER, AddressType::Public).unwrap();
    assert!(record.is_encrypted());
}

#[test]
fn test_new_peer_gets_no_resecurity_timer() {
    let (mut runner, journal, _output, _sender) = runner::<HogpDemo>();
    runner.start().unwrap();
    journal.take();

    let connected_at = Instant::now();
    runner.handle_event(&connection_complete(), connected_at);
    runner.poll_timers(connected_at + Duration::from_secs(1));

    assert_eq!(security_requests(&journal), 0);
    assert_eq!(runner.context().devices.len(), 1);
}

#[test]
fn test_pump_delivers_stack_events() {
    let (mut runner, _journal, _output, sender) = runner::<HogpDemo>();
    runner.start().unwrap();

    sender.event(connection_complete());
    runner.pump(Instant::now());

    assert_eq!(runner.context().connection().map(|c| c.address), Some(PEER));
}
