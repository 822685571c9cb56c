//! Pairing and encryption bookkeeping
//!
//! [`LeSecurity`] follows LE peers from connection through pairing to an
//! encrypted link, arming the re-security timer for returning peers.
//! [`ClassicSecurity`] answers BR/EDR authentication requests from the
//! link key store. Requests that need the user are parked as a
//! [`PendingResponse`] until the matching console command arrives.

pub mod classic;
pub mod crypto;
pub mod le;
pub mod timer;

#[cfg(test)]
mod tests;

pub use classic::{ClassicContext, ClassicSecurity, MAX_PIN_CODE_LEN};
pub use le::{resecurity_timeout, LeSecurity, SecurityContext};
pub use timer::{TimerId, TimerQueue};

use crate::device::DeviceKey;
use crate::error::StackError;
use crate::gap::BdAddr;
use thiserror::Error;

/// Work scheduled on the demo timer queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Ask the peer to re-establish encryption if it has not done so
    ReSecurity(DeviceKey),
}

/// Authentication request waiting for a user command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingResponse {
    Passkey(BdAddr),
    Confirmation { address: BdAddr, value: u32 },
    PinCode(BdAddr),
}

impl PendingResponse {
    pub fn address(&self) -> BdAddr {
        match self {
            PendingResponse::Passkey(address)
            | PendingResponse::PinCode(address)
            | PendingResponse::Confirmation { address, .. } => *address,
        }
    }
}

/// Errors answering a parked authentication request
#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("No matching authentication request is pending")]
    NotPending,

    #[error("Passkey {0} is out of range")]
    InvalidPasskey(u32),

    #[error("PIN code must be 1 to 16 characters")]
    InvalidPinCode,

    #[error(transparent)]
    Stack(#[from] StackError),
}
