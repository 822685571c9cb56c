//! BR/EDR authentication
//!
//! Link keys come from and go to the [`LinkKeyStore`]. PIN codes, passkeys
//! and numeric comparisons the local policy cannot settle wait for the user.

use super::le::report_failure;
use super::{PendingResponse, ResponseError};
use crate::console::Console;
use crate::device::LinkKeyStore;
use crate::gap::{BdAddr, PairingCapabilities, HCI_STATUS_SUCCESS, MAX_PASSKEY};
use crate::stack::{BluetoothStack, ClassicAuthenticationEvent, ClassicAuthenticationResponse};
use log::{debug, warn};

/// Longest PIN code the controller accepts
pub const MAX_PIN_CODE_LEN: usize = 16;

pub struct ClassicContext<'a, S> {
    pub stack: &'a mut S,
    pub console: &'a mut Console,
    pub link_keys: &'a mut LinkKeyStore,
}

pub struct ClassicSecurity {
    pub capabilities: PairingCapabilities,
    pending: Option<PendingResponse>,
}

impl ClassicSecurity {
    pub fn new(capabilities: PairingCapabilities) -> Self {
        Self {
            capabilities,
            pending: None,
        }
    }

    pub fn pending(&self) -> Option<PendingResponse> {
        self.pending
    }

    pub fn reset(&mut self) {
        self.pending = None;
    }

    pub fn handle_event<S: BluetoothStack>(
        &mut self,
        ctx: &mut ClassicContext<'_, S>,
        address: &BdAddr,
        event: &ClassicAuthenticationEvent,
    ) {
        match event {
            ClassicAuthenticationEvent::PinCodeRequest => {
                self.pending = Some(PendingResponse::PinCode(*address));
                ctx.console.line(format_args!("PIN code request from {}.", address));
                ctx.console.line("Respond with: PINCodeResponse [PIN Code]");
            }
            ClassicAuthenticationEvent::LinkKeyRequest => {
                let key = ctx.link_keys.find(address);
                debug!("Link key request from {}: {}", address, key.is_some());
                self.respond(ctx, address, ClassicAuthenticationResponse::LinkKey(key));
            }
            ClassicAuthenticationEvent::LinkKeyCreation { key } => {
                match ctx.link_keys.add(*address, *key) {
                    Ok(()) => ctx.console.line(format_args!("Link key stored for {}.", address)),
                    Err(e) => {
                        warn!("Link key for {} not stored: {}", address, e);
                        ctx.console
                            .line(format_args!("Unable to store link key for {}: {}.", address, e));
                    }
                }
            }
            ClassicAuthenticationEvent::IoCapabilityRequest => {
                self.respond(ctx, address, ClassicAuthenticationResponse::IoCapability(self.capabilities));
            }
            ClassicAuthenticationEvent::UserConfirmationRequest { value } => {
                if self.capabilities.io_capability.can_confirm() {
                    self.pending = Some(PendingResponse::Confirmation {
                        address: *address,
                        value: *value,
                    });
                    ctx.console.line(format_args!("Confirmation value: {:06}", value));
                    ctx.console
                        .line("Respond with: UserConfirmationResponse [0 = Reject, 1 = Accept]");
                } else {
                    self.respond(ctx, address, ClassicAuthenticationResponse::UserConfirmation(true));
                }
            }
            ClassicAuthenticationEvent::PasskeyRequest => {
                self.pending = Some(PendingResponse::Passkey(*address));
                ctx.console.line("Respond with: PassKeyResponse [Passkey]");
            }
            ClassicAuthenticationEvent::PasskeyDisplay { passkey } => {
                ctx.console.line(format_args!("Passkey: {:06}", passkey));
            }
            ClassicAuthenticationEvent::AuthenticationStatus { status } => {
                self.pending = None;
                if *status == HCI_STATUS_SUCCESS {
                    ctx.console
                        .line(format_args!("Authentication with {} succeeded.", address));
                } else {
                    ctx.link_keys.delete(address);
                    ctx.console.line(format_args!(
                        "Authentication with {} failed: 0x{:02X}.",
                        address, status
                    ));
                }
            }
        }
    }

    pub fn pin_code_response<S: BluetoothStack>(&mut self, stack: &mut S, pin: &str) -> Result<BdAddr, ResponseError> {
        let Some(PendingResponse::PinCode(address)) = self.pending else {
            return Err(ResponseError::NotPending);
        };
        if pin.is_empty() || pin.len() > MAX_PIN_CODE_LEN {
            return Err(ResponseError::InvalidPinCode);
        }

        stack.authentication_response(address, ClassicAuthenticationResponse::PinCode(pin.to_string()))?;
        self.pending = None;
        Ok(address)
    }

    pub fn passkey_response<S: BluetoothStack>(&mut self, stack: &mut S, passkey: u32) -> Result<BdAddr, ResponseError> {
        let Some(PendingResponse::Passkey(address)) = self.pending else {
            return Err(ResponseError::NotPending);
        };
        if passkey > MAX_PASSKEY {
            return Err(ResponseError::InvalidPasskey(passkey));
        }

        stack.authentication_response(address, ClassicAuthenticationResponse::Passkey(passkey))?;
        self.pending = None;
        Ok(address)
    }

    pub fn confirmation_response<S: BluetoothStack>(&mut self, stack: &mut S, accept: bool) -> Result<BdAddr, ResponseError> {
        let Some(PendingResponse::Confirmation { address, .. }) = self.pending else {
            return Err(ResponseError::NotPending);
        };

        stack.authentication_response(address, ClassicAuthenticationResponse::UserConfirmation(accept))?;
        self.pending = None;
        Ok(address)
    }

    fn respond<S: BluetoothStack>(
        &mut self,
        ctx: &mut ClassicContext<'_, S>,
        address: &BdAddr,
        response: ClassicAuthenticationResponse,
    ) {
        if let Err(e) = ctx.stack.authentication_response(*address, response) {
            report_failure(ctx.console, "GAP_Authentication_Response", &e);
        }
    }
}
