//! LE connection security
//!
//! Peer states run Disconnected -> Connected -> Pairing (possibly waiting on
//! the user) -> Encrypted. A peer that already has a record when it connects
//! gets a re-security timer of `interval * (latency + 8)`; if the link is
//! still unencrypted when it fires, security is requested exactly once.
//! Pairing or encryption failures disconnect the peer and drop its record.

use super::timer::{TimerId, TimerQueue};
use super::{PendingResponse, ResponseError, TimerKind};
use crate::console::Console;
use crate::device::{DeviceFlags, DeviceKey, DeviceStore};
use crate::error::StackError;
use crate::gap::{
    AddressType, BdAddr, Connection, ConnectionParameters, PairingCapabilities,
    HCI_STATUS_SUCCESS, MAX_PASSKEY,
};
use crate::stack::{BluetoothStack, LeAuthenticationEvent, LeAuthenticationResponse, StackEvent};
use log::{debug, error, info};
use std::time::{Duration, Instant};

/// Re-security timer length for a link with `parameters`
pub fn resecurity_timeout(parameters: &ConnectionParameters) -> Duration {
    Duration::from_millis(parameters.interval_ms as u64 * (parameters.slave_latency as u64 + 8))
}

/// Application state the LE security handlers work on
pub struct SecurityContext<'a, S> {
    pub stack: &'a mut S,
    pub console: &'a mut Console,
    pub devices: &'a mut DeviceStore,
    pub timers: &'a mut TimerQueue<TimerKind>,
    pub now: Instant,
}

pub struct LeSecurity {
    pub capabilities: PairingCapabilities,
    connection: Option<Connection>,
    resecurity_timer: Option<TimerId>,
    pending: Option<PendingResponse>,
}

impl LeSecurity {
    pub fn new(capabilities: PairingCapabilities) -> Self {
        Self {
            capabilities,
            connection: None,
            resecurity_timer: None,
            pending: None,
        }
    }

    /// The active LE connection
    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn pending(&self) -> Option<PendingResponse> {
        self.pending
    }

    pub fn resecurity_timer(&self) -> Option<TimerId> {
        self.resecurity_timer
    }

    /// Forget the connection, e.g. when the stack closes
    pub fn reset(&mut self, timers: &mut TimerQueue<TimerKind>) {
        self.stop_timer(timers);
        self.connection = None;
        self.pending = None;
    }

    /// Handle the LE connection and security events, ignoring the rest
    pub fn handle_event<S: BluetoothStack>(&mut self, ctx: &mut SecurityContext<'_, S>, event: &StackEvent) {
        match event {
            StackEvent::LeConnectionComplete {
                status,
                address,
                address_type,
                role,
                parameters,
            } => {
                if *status != HCI_STATUS_SUCCESS {
                    ctx.console
                        .line(format_args!("Connection to {} failed: 0x{:02X}.", address, status));
                    return;
                }
                self.connected(
                    ctx,
                    Connection {
                        address: *address,
                        address_type: *address_type,
                        role: *role,
                        parameters: *parameters,
                    },
                );
            }
            StackEvent::LeDisconnectionComplete {
                address,
                address_type,
                reason,
            } => self.disconnected(ctx, address, *address_type, *reason),
            StackEvent::LeEncryptionChange {
                address,
                address_type,
                status,
                encrypted,
            } => {
                ctx.console.line(format_args!(
                    "Encryption change for {}: status 0x{:02X}, {}.",
                    address,
                    status,
                    if *encrypted { "encrypted" } else { "not encrypted" }
                ));
                if *status != HCI_STATUS_SUCCESS {
                    self.security_failed(ctx, address, *address_type, "Encryption change failed");
                } else {
                    self.set_encrypted(ctx, address, *address_type, *encrypted);
                }
            }
            StackEvent::LeEncryptionRefreshComplete {
                address,
                address_type,
                status,
            } => {
                if *status != HCI_STATUS_SUCCESS {
                    self.security_failed(ctx, address, *address_type, "Encryption refresh failed");
                } else {
                    self.set_encrypted(ctx, address, *address_type, true);
                }
            }
            StackEvent::LeAuthentication {
                address,
                address_type,
                event,
            } => self.authentication(ctx, address, *address_type, event),
            _ => {}
        }
    }

    /// React to a fired [`TimerKind::ReSecurity`] timer
    pub fn timer_expired<S: BluetoothStack>(&mut self, ctx: &mut SecurityContext<'_, S>, id: TimerId, key: DeviceKey) {
        if self.resecurity_timer != Some(id) {
            return;
        }
        self.resecurity_timer = None;

        let Some(connection) = self.connection else {
            return;
        };
        let encrypted = ctx
            .devices
            .find(&connection.address, connection.address_type)
            .filter(|record| record.key() == key)
            .map(|record| record.is_encrypted());

        match encrypted {
            Some(false) => {
                ctx.console.line(format_args!(
                    "Security not re-established by {}, requesting security.",
                    connection.address
                ));
                if let Err(e) = ctx.stack.le_request_security(connection.address, &self.capabilities) {
                    report_failure(ctx.console, "GAP_LE_Request_Security", &e);
                }
            }
            Some(true) => debug!("{} already encrypted", connection.address),
            None => debug!("Re-security timer for a departed peer"),
        }
    }

    /// Answer a parked passkey request
    pub fn passkey_response<S: BluetoothStack>(&mut self, stack: &mut S, passkey: u32) -> Result<BdAddr, ResponseError> {
        let Some(PendingResponse::Passkey(address)) = self.pending else {
            return Err(ResponseError::NotPending);
        };
        if passkey > MAX_PASSKEY {
            return Err(ResponseError::InvalidPasskey(passkey));
        }

        stack.le_authentication_response(address, LeAuthenticationResponse::Passkey(passkey))?;
        self.pending = None;
        Ok(address)
    }

    /// Answer a parked numeric comparison
    pub fn confirmation_response<S: BluetoothStack>(&mut self, stack: &mut S, accept: bool) -> Result<BdAddr, ResponseError> {
        let Some(PendingResponse::Confirmation { address, .. }) = self.pending else {
            return Err(ResponseError::NotPending);
        };

        stack.le_authentication_response(address, LeAuthenticationResponse::Confirmation(accept))?;
        self.pending = None;
        Ok(address)
    }

    fn connected<S: BluetoothStack>(&mut self, ctx: &mut SecurityContext<'_, S>, connection: Connection) {
        self.stop_timer(ctx.timers);
        self.pending = None;
        self.connection = Some(connection);
        ctx.console.line(format_args!(
            "Connected to {} ({}), interval {} ms, latency {}.",
            connection.address,
            connection.address_type,
            connection.parameters.interval_ms,
            connection.parameters.slave_latency
        ));

        let (record, created) = ctx.devices.create(connection.address, connection.address_type);
        record.flags.remove(DeviceFlags::LINK_ENCRYPTED);
        if created {
            info!("New peer {}", connection.address);
            return;
        }

        let key = record.key();
        let timeout = resecurity_timeout(&connection.parameters);
        self.resecurity_timer = Some(ctx.timers.start(ctx.now, timeout, TimerKind::ReSecurity(key)));
        info!("Known peer {}, re-security in {:?}", connection.address, timeout);
    }

    fn disconnected<S: BluetoothStack>(
        &mut self,
        ctx: &mut SecurityContext<'_, S>,
        address: &BdAddr,
        address_type: AddressType,
        reason: u8,
    ) {
        ctx.console
            .line(format_args!("Disconnected from {}, reason 0x{:02X}.", address, reason));
        self.reset(ctx.timers);

        let Some(record) = ctx.devices.find_mut(address, address_type) else {
            return;
        };
        if record.long_term_key.is_none() && !record.is_bonded() {
            let key = record.key();
            ctx.devices.remove(&key.address, key.address_type);
            debug!("Dropped unbonded peer {}", address);
        } else {
            record.flags.remove(DeviceFlags::LINK_ENCRYPTED);
        }
    }

    fn set_encrypted<S: BluetoothStack>(
        &mut self,
        ctx: &mut SecurityContext<'_, S>,
        address: &BdAddr,
        address_type: AddressType,
        encrypted: bool,
    ) {
        if encrypted {
            self.stop_timer(ctx.timers);
        }
        if let Some(record) = ctx.devices.find_mut(address, address_type) {
            record.flags.set(DeviceFlags::LINK_ENCRYPTED, encrypted);
        }
    }

    fn authentication<S: BluetoothStack>(
        &mut self,
        ctx: &mut SecurityContext<'_, S>,
        address: &BdAddr,
        address_type: AddressType,
        event: &LeAuthenticationEvent,
    ) {
        match event {
            LeAuthenticationEvent::PairingRequest { io_capability, auth } => {
                ctx.console.line(format_args!(
                    "Pairing request from {}: {}, {:?}.",
                    address, io_capability, auth
                ));
                self.stop_timer(ctx.timers);
                ctx.devices.create(*address, address_type);
                self.respond(ctx, address, LeAuthenticationResponse::PairingCapabilities(self.capabilities));
            }
            LeAuthenticationEvent::SecurityRequest { auth } => {
                ctx.console
                    .line(format_args!("Security request from {}: {:?}.", address, auth));
                self.stop_timer(ctx.timers);
                self.respond(ctx, address, LeAuthenticationResponse::PairingCapabilities(self.capabilities));
            }
            LeAuthenticationEvent::ConfirmationRequest { value } => {
                if self.capabilities.io_capability.can_confirm() {
                    self.pending = Some(PendingResponse::Confirmation {
                        address: *address,
                        value: *value,
                    });
                    ctx.console.line(format_args!("Confirmation value: {:06}", value));
                    ctx.console
                        .line("Respond with: UserConfirmationResponse [0 = Reject, 1 = Accept]");
                } else {
                    // Just Works
                    self.respond(ctx, address, LeAuthenticationResponse::Confirmation(true));
                }
            }
            LeAuthenticationEvent::PasskeyRequest => {
                self.pending = Some(PendingResponse::Passkey(*address));
                ctx.console.line("Respond with: PassKeyResponse [Passkey]");
            }
            LeAuthenticationEvent::PasskeyDisplay { passkey } => {
                ctx.console.line(format_args!("Passkey: {:06}", passkey));
            }
            LeAuthenticationEvent::OutOfBandRequest => {
                self.respond(ctx, address, LeAuthenticationResponse::OutOfBandUnavailable);
            }
            LeAuthenticationEvent::LongTermKeyRequest { ediv, rand } => {
                let key = ctx
                    .devices
                    .find(address, address_type)
                    .and_then(|record| record.long_term_key)
                    .filter(|ltk| ltk.matches(*ediv, rand));
                if key.is_none() {
                    info!("No LTK for {}, sending negative reply", address);
                }
                self.respond(ctx, address, LeAuthenticationResponse::LongTermKey(key));
            }
            LeAuthenticationEvent::EncryptionInformation { key } => {
                let (record, _) = ctx.devices.create(*address, address_type);
                record.long_term_key = Some(*key);
                record.encryption_key_size = key.key_size;
            }
            LeAuthenticationEvent::IdentityInformation {
                irk,
                identity_address,
                identity_address_type,
            } => {
                let record = ctx.devices.bind_identity(
                    address,
                    address_type,
                    *irk,
                    *identity_address,
                    *identity_address_type,
                );
                debug!("{} is {}", address, record.address);
            }
            LeAuthenticationEvent::PairingStatus { status, key_size } => {
                self.pending = None;
                if *status != HCI_STATUS_SUCCESS {
                    self.security_failed(ctx, address, address_type, "Pairing failed");
                    return;
                }

                self.stop_timer(ctx.timers);
                let bonding = self.capabilities.bonding;
                let (record, _) = ctx.devices.create(*address, address_type);
                record.encryption_key_size = *key_size;
                record.flags.insert(DeviceFlags::LINK_ENCRYPTED);
                if bonding && record.long_term_key.is_some() {
                    record.flags.insert(DeviceFlags::BONDED);
                }
                ctx.console.line(format_args!(
                    "Pairing with {} complete, key size {}.",
                    address, key_size
                ));
            }
            LeAuthenticationEvent::SecurityEstablishmentComplete { status } => {
                if *status != HCI_STATUS_SUCCESS {
                    self.security_failed(ctx, address, address_type, "Security re-establishment failed");
                } else {
                    ctx.console.line(format_args!("Security re-established with {}.", address));
                    self.set_encrypted(ctx, address, address_type, true);
                }
            }
        }
    }

    fn respond<S: BluetoothStack>(
        &mut self,
        ctx: &mut SecurityContext<'_, S>,
        address: &BdAddr,
        response: LeAuthenticationResponse,
    ) {
        debug!("Authentication response to {}: {:?}", address, response);
        if let Err(e) = ctx.stack.le_authentication_response(*address, response) {
            report_failure(ctx.console, "GAP_LE_Authentication_Response", &e);
        }
    }

    /// Failures are terminal: drop the peer's record and the link
    fn security_failed<S: BluetoothStack>(
        &mut self,
        ctx: &mut SecurityContext<'_, S>,
        address: &BdAddr,
        address_type: AddressType,
        reason: &str,
    ) {
        ctx.console.line(format_args!("{} for {}.", reason, address));
        self.stop_timer(ctx.timers);
        self.pending = None;
        ctx.devices.remove(address, address_type);

        let connected = self
            .connection
            .map_or(false, |connection| connection.address == *address);
        if connected {
            if let Err(e) = ctx.stack.le_disconnect(*address) {
                report_failure(ctx.console, "GAP_LE_Disconnect", &e);
            }
        }
    }

    fn stop_timer(&mut self, timers: &mut TimerQueue<TimerKind>) {
        if let Some(id) = self.resecurity_timer.take() {
            timers.stop(id);
        }
    }
}

pub(crate) fn report_failure(console: &mut Console, function: &str, error: &StackError) {
    error!("{} failed: {}", function, error);
    console.line(format_args!("{} returned {}.", function, error.code()));
}
