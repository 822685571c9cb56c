//! Unit tests for LE and classic security handling

use super::*;
use crate::console::{CaptureBuffer, Console};
use crate::device::{DeviceFlags, DeviceStore, LinkKey, LinkKeyStore};
use crate::gap::{
    AddressType, AuthRequirements, BdAddr, ConnectionParameters, IoCapability, LongTermKey,
    PairingCapabilities, Role,
};
use crate::stack::{
    BluetoothStack, ClassicAuthenticationEvent, ClassicAuthenticationResponse, LeAuthenticationEvent,
    LeAuthenticationResponse, LoopbackStack, StackCall, StackEvent,
};
use std::time::{Duration, Instant};

const PEER: BdAddr = BdAddr {
    bytes: [0x55, 0x44, 0x33, 0x22, 0x11, 0x00],
};

const PARAMETERS: ConnectionParameters = ConnectionParameters {
    interval_ms: 30,
    slave_latency: 4,
    supervision_timeout_ms: 4000,
};

struct Fixture {
    stack: LoopbackStack,
    console: Console,
    output: CaptureBuffer,
    devices: DeviceStore,
    timers: TimerQueue<TimerKind>,
    security: LeSecurity,
    now: Instant,
}

impl Fixture {
    fn new() -> Self {
        let mut stack = LoopbackStack::new(BdAddr::new([1, 2, 3, 4, 5, 6]));
        stack.open().unwrap();
        stack.journal().take();
        let (console, output) = Console::capture();

        Self {
            stack,
            console,
            output,
            devices: DeviceStore::default(),
            timers: TimerQueue::new(),
            security: LeSecurity::new(PairingCapabilities::default()),
            now: Instant::now(),
        }
    }

    fn event(&mut self, event: StackEvent) {
        let mut ctx = SecurityContext {
            stack: &mut self.stack,
            console: &mut self.console,
            devices: &mut self.devices,
            timers: &mut self.timers,
            now: self.now,
        };
        self.security.handle_event(&mut ctx, &event);
    }

    fn advance(&mut self, by: Duration) {
        self.now += by;
        for (id, kind) in self.timers.expire(self.now) {
            let TimerKind::ReSecurity(key) = kind;
            let mut ctx = SecurityContext {
                stack: &mut self.stack,
                console: &mut self.console,
                devices: &mut self.devices,
                timers: &mut self.timers,
                now: self.now,
            };
            self.security.timer_expired(&mut ctx, id, key);
        }
    }

    fn connect(&mut self) {
        self.event(StackEvent::LeConnectionComplete {
            status: 0,
            address: PEER,
            address_type: AddressType::Public,
            role: Role::Peripheral,
            parameters: PARAMETERS,
        });
    }

    fn auth(&mut self, event: LeAuthenticationEvent) {
        self.event(StackEvent::LeAuthentication {
            address: PEER,
            address_type: AddressType::Public,
            event,
        });
    }

    fn bond(&mut self) {
        let (record, _) = self.devices.create(PEER, AddressType::Public);
        record.long_term_key = Some(LongTermKey {
            key: [7; 16],
            ediv: 0x1234,
            rand: [1; 8],
            key_size: 16,
        });
        record.flags.insert(DeviceFlags::BONDED);
    }

    fn security_requests(&self) -> usize {
        self.stack
            .journal()
            .count(|call| matches!(call, StackCall::LeRequestSecurity(_)))
    }
}

#[test]
fn test_resecurity_timeout() {
    assert_eq!(resecurity_timeout(&PARAMETERS), Duration::from_millis(360));
}

#[test]
fn test_new_peer_gets_record_without_timer() {
    let mut fixture = Fixture::new();
    fixture.connect();

    assert!(fixture.devices.find(&PEER, AddressType::Public).is_some());
    assert!(fixture.security.resecurity_timer().is_none());
    assert!(fixture.timers.is_empty());
    assert_eq!(fixture.security.connection().unwrap().address, PEER);
}

#[test]
fn test_bonded_peer_arms_resecurity_timer() {
    let mut fixture = Fixture::new();
    fixture.bond();
    fixture.connect();

    let id = fixture.security.resecurity_timer().unwrap();
    assert_eq!(
        fixture.timers.deadline(id),
        Some(fixture.now + Duration::from_millis(30 * (4 + 8)))
    );
}

#[test]
fn test_encryption_cancels_resecurity_timer() {
    let mut fixture = Fixture::new();
    fixture.bond();
    fixture.connect();

    fixture.advance(Duration::from_millis(100));
    fixture.event(StackEvent::LeEncryptionChange {
        address: PEER,
        address_type: AddressType::Public,
        status: 0,
        encrypted: true,
    });
    assert!(fixture.timers.is_empty());

    fixture.advance(Duration::from_secs(5));
    assert_eq!(fixture.security_requests(), 0);
    assert!(fixture
        .devices
        .find(&PEER, AddressType::Public)
        .unwrap()
        .is_encrypted());
}

#[test]
fn test_expiry_requests_security_once() {
    let mut fixture = Fixture::new();
    fixture.bond();
    fixture.connect();

    fixture.advance(Duration::from_millis(359));
    assert_eq!(fixture.security_requests(), 0);

    fixture.advance(Duration::from_millis(1));
    assert_eq!(fixture.security_requests(), 1);

    fixture.advance(Duration::from_secs(10));
    assert_eq!(fixture.security_requests(), 1);
    assert!(fixture.security.resecurity_timer().is_none());
}

#[test]
fn test_pairing_failure_disconnects_and_forgets() {
    let mut fixture = Fixture::new();
    fixture.connect();
    fixture.auth(LeAuthenticationEvent::PairingStatus {
        status: 0x05,
        key_size: 0,
    });

    assert!(fixture.devices.find(&PEER, AddressType::Public).is_none());
    assert_eq!(
        fixture
            .stack
            .journal()
            .count(|call| *call == StackCall::LeDisconnect(PEER)),
        1
    );
    assert!(fixture.output.contents().contains("Pairing failed"));
}

#[test]
fn test_encryption_failure_disconnects_bonded_peer() {
    let mut fixture = Fixture::new();
    fixture.bond();
    fixture.connect();
    fixture.event(StackEvent::LeEncryptionChange {
        address: PEER,
        address_type: AddressType::Public,
        status: 0x06,
        encrypted: false,
    });

    assert!(fixture.devices.is_empty());
    assert!(fixture.timers.is_empty());
    assert!(fixture
        .stack
        .journal()
        .calls()
        .contains(&StackCall::LeDisconnect(PEER)));
}

#[test]
fn test_successful_pairing_bonds() {
    let mut fixture = Fixture::new();
    fixture.connect();
    fixture.auth(LeAuthenticationEvent::PairingRequest {
        io_capability: IoCapability::NoInputNoOutput,
        auth: AuthRequirements::BONDING,
    });
    fixture.auth(LeAuthenticationEvent::EncryptionInformation {
        key: LongTermKey {
            key: [9; 16],
            ediv: 1,
            rand: [2; 8],
            key_size: 16,
        },
    });
    fixture.auth(LeAuthenticationEvent::PairingStatus {
        status: 0,
        key_size: 16,
    });

    let record = fixture.devices.find(&PEER, AddressType::Public).unwrap();
    assert!(record.is_bonded());
    assert!(record.is_encrypted());
    assert_eq!(record.encryption_key_size, 16);

    assert!(fixture.stack.journal().calls().contains(
        &StackCall::LeAuthenticationResponse(
            PEER,
            LeAuthenticationResponse::PairingCapabilities(PairingCapabilities::default())
        )
    ));

    // A bonded record survives the disconnect
    fixture.event(StackEvent::LeDisconnectionComplete {
        address: PEER,
        address_type: AddressType::Public,
        reason: 0x13,
    });
    let record = fixture.devices.find(&PEER, AddressType::Public).unwrap();
    assert!(!record.is_encrypted());
    assert!(fixture.security.connection().is_none());
}

#[test]
fn test_unbonded_record_removed_on_disconnect() {
    let mut fixture = Fixture::new();
    fixture.connect();
    fixture.event(StackEvent::LeDisconnectionComplete {
        address: PEER,
        address_type: AddressType::Public,
        reason: 0x13,
    });
    assert!(fixture.devices.is_empty());
}

#[test]
fn test_long_term_key_request() {
    let mut fixture = Fixture::new();
    fixture.bond();
    fixture.connect();

    fixture.auth(LeAuthenticationEvent::LongTermKeyRequest {
        ediv: 0x1234,
        rand: [1; 8],
    });
    fixture.auth(LeAuthenticationEvent::LongTermKeyRequest {
        ediv: 0x9999,
        rand: [1; 8],
    });

    let replies: Vec<_> = fixture
        .stack
        .journal()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StackCall::LeAuthenticationResponse(_, LeAuthenticationResponse::LongTermKey(key)) => {
                Some(key.map(|ltk| ltk.key))
            }
            _ => None,
        })
        .collect();
    assert_eq!(replies, vec![Some([7; 16]), None]);
}

#[test]
fn test_passkey_request_waits_for_user() {
    let mut fixture = Fixture::new();
    fixture.connect();

    assert!(matches!(
        fixture.security.passkey_response(&mut fixture.stack, 1234),
        Err(ResponseError::NotPending)
    ));

    fixture.auth(LeAuthenticationEvent::PasskeyRequest);
    assert_eq!(fixture.security.pending(), Some(PendingResponse::Passkey(PEER)));
    assert!(fixture.output.contents().contains("PassKeyResponse"));

    assert!(matches!(
        fixture.security.passkey_response(&mut fixture.stack, 1_000_000),
        Err(ResponseError::InvalidPasskey(1_000_000))
    ));
    assert_eq!(fixture.security.passkey_response(&mut fixture.stack, 123456).unwrap(), PEER);
    assert!(fixture.security.pending().is_none());
    assert!(fixture.stack.journal().calls().contains(
        &StackCall::LeAuthenticationResponse(PEER, LeAuthenticationResponse::Passkey(123456))
    ));
}

#[test]
fn test_confirmation_policy() {
    // No input, no output: Just Works is accepted immediately
    let mut fixture = Fixture::new();
    fixture.auth(LeAuthenticationEvent::ConfirmationRequest { value: 42 });
    assert!(fixture.security.pending().is_none());
    assert!(fixture.stack.journal().calls().contains(
        &StackCall::LeAuthenticationResponse(PEER, LeAuthenticationResponse::Confirmation(true))
    ));

    let mut fixture = Fixture::new();
    fixture.security.capabilities.io_capability = IoCapability::DisplayYesNo;
    fixture.auth(LeAuthenticationEvent::ConfirmationRequest { value: 42 });
    assert_eq!(
        fixture.security.pending(),
        Some(PendingResponse::Confirmation {
            address: PEER,
            value: 42
        })
    );
    assert!(fixture.output.contents().contains("000042"));
    fixture
        .security
        .confirmation_response(&mut fixture.stack, false)
        .unwrap();
    assert!(fixture.stack.journal().calls().contains(
        &StackCall::LeAuthenticationResponse(PEER, LeAuthenticationResponse::Confirmation(false))
    ));
}

#[test]
fn test_identity_information_enables_resolution() {
    let mut fixture = Fixture::new();
    let irk = crypto::generate_random_128();
    let private = crypto::generate_resolvable_address(&irk);

    fixture.event(StackEvent::LeConnectionComplete {
        status: 0,
        address: private,
        address_type: AddressType::Random,
        role: Role::Peripheral,
        parameters: PARAMETERS,
    });
    fixture.event(StackEvent::LeAuthentication {
        address: private,
        address_type: AddressType::Random,
        event: LeAuthenticationEvent::IdentityInformation {
            irk,
            identity_address: PEER,
            identity_address_type: AddressType::PublicIdentity,
        },
    });

    let next = crypto::generate_resolvable_address(&irk);
    let record = fixture.devices.find(&next, AddressType::Random).unwrap();
    assert_eq!(record.identity_address, Some((PEER, AddressType::PublicIdentity)));
}

#[test]
fn test_identity_information_merges_with_bonded_record() {
    let mut fixture = Fixture::new();
    fixture.bond();
    let irk = crypto::generate_random_128();
    let private = crypto::generate_resolvable_address(&irk);

    fixture.event(StackEvent::LeConnectionComplete {
        status: 0,
        address: private,
        address_type: AddressType::Random,
        role: Role::Peripheral,
        parameters: PARAMETERS,
    });
    assert_eq!(fixture.devices.len(), 2);

    fixture.event(StackEvent::LeAuthentication {
        address: private,
        address_type: AddressType::Random,
        event: LeAuthenticationEvent::IdentityInformation {
            irk,
            identity_address: PEER,
            identity_address_type: AddressType::PublicIdentity,
        },
    });

    assert_eq!(fixture.devices.len(), 1);
    let by_identity = fixture.devices.find(&PEER, AddressType::Public).unwrap().clone();
    let by_private = fixture.devices.find(&private, AddressType::Random).unwrap();
    assert_eq!(&by_identity, by_private);
    assert_eq!(by_identity.address, PEER);
    assert_eq!(by_identity.irk, Some(irk));
    assert!(by_identity.is_bonded());
    assert_eq!(by_identity.long_term_key.map(|ltk| ltk.ediv), Some(0x1234));
}

#[test]
fn test_keys_from_private_address_session_survive_merge() {
    let mut fixture = Fixture::new();
    fixture.bond();
    let irk = crypto::generate_random_128();
    let private = crypto::generate_resolvable_address(&irk);
    let fresh = LongTermKey {
        key: [9; 16],
        ediv: 0x5678,
        rand: [2; 8],
        key_size: 16,
    };

    fixture.event(StackEvent::LeConnectionComplete {
        status: 0,
        address: private,
        address_type: AddressType::Random,
        role: Role::Peripheral,
        parameters: PARAMETERS,
    });
    for event in [
        LeAuthenticationEvent::EncryptionInformation { key: fresh },
        LeAuthenticationEvent::IdentityInformation {
            irk,
            identity_address: PEER,
            identity_address_type: AddressType::PublicIdentity,
        },
    ] {
        fixture.event(StackEvent::LeAuthentication {
            address: private,
            address_type: AddressType::Random,
            event,
        });
    }

    assert_eq!(fixture.devices.len(), 1);
    let record = fixture.devices.find(&PEER, AddressType::Public).unwrap();
    assert_eq!(record.long_term_key, Some(fresh));
}

struct ClassicFixture {
    stack: LoopbackStack,
    console: Console,
    output: CaptureBuffer,
    link_keys: LinkKeyStore,
    security: ClassicSecurity,
}

impl ClassicFixture {
    fn new() -> Self {
        let mut stack = LoopbackStack::new(BdAddr::new([1, 2, 3, 4, 5, 6]));
        stack.open().unwrap();
        let (console, output) = Console::capture();
        Self {
            stack,
            console,
            output,
            link_keys: LinkKeyStore::new(),
            security: ClassicSecurity::new(PairingCapabilities::default()),
        }
    }

    fn event(&mut self, event: ClassicAuthenticationEvent) {
        let mut ctx = ClassicContext {
            stack: &mut self.stack,
            console: &mut self.console,
            link_keys: &mut self.link_keys,
        };
        self.security.handle_event(&mut ctx, &PEER, &event);
    }
}

#[test]
fn test_classic_link_key_lifecycle() {
    let mut fixture = ClassicFixture::new();

    fixture.event(ClassicAuthenticationEvent::LinkKeyRequest);
    fixture.event(ClassicAuthenticationEvent::LinkKeyCreation {
        key: LinkKey([3; 16]),
    });
    fixture.event(ClassicAuthenticationEvent::LinkKeyRequest);

    let replies: Vec<_> = fixture
        .stack
        .journal()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StackCall::AuthenticationResponse(_, ClassicAuthenticationResponse::LinkKey(key)) => Some(key),
            _ => None,
        })
        .collect();
    assert_eq!(replies, vec![None, Some(LinkKey([3; 16]))]);

    // A failed authentication discards the stored key
    fixture.event(ClassicAuthenticationEvent::AuthenticationStatus { status: 0x05 });
    assert!(fixture.link_keys.find(&PEER).is_none());
    assert!(fixture.output.contents().contains("failed"));
}

#[test]
fn test_classic_pin_code() {
    let mut fixture = ClassicFixture::new();
    fixture.event(ClassicAuthenticationEvent::PinCodeRequest);
    assert_eq!(fixture.security.pending(), Some(PendingResponse::PinCode(PEER)));

    assert!(matches!(
        fixture.security.pin_code_response(&mut fixture.stack, "01234567890123456"),
        Err(ResponseError::InvalidPinCode)
    ));
    fixture
        .security
        .pin_code_response(&mut fixture.stack, "0000")
        .unwrap();
    assert!(fixture.stack.journal().calls().contains(
        &StackCall::AuthenticationResponse(PEER, ClassicAuthenticationResponse::PinCode("0000".into()))
    ));
    assert!(fixture.security.pending().is_none());
}

#[test]
fn test_classic_io_capability_response() {
    let mut fixture = ClassicFixture::new();
    fixture.security.capabilities.mitm = true;
    fixture.event(ClassicAuthenticationEvent::IoCapabilityRequest);

    let expected = PairingCapabilities {
        mitm: true,
        ..PairingCapabilities::default()
    };
    assert!(fixture.stack.journal().calls().contains(
        &StackCall::AuthenticationResponse(PEER, ClassicAuthenticationResponse::IoCapability(expected))
    ));
}
