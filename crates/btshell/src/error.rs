//! Error types for the btshell library
//!
//! This module defines the errors raised by the HCI transport and by calls
//! into a [`BluetoothStack`](crate::stack::BluetoothStack) implementation.

use crate::gap::BdAddr;
use thiserror::Error;

/// Errors that can occur when working with HCI sockets
#[derive(Error, Debug)]
pub enum HciError {
    #[error("Failed to open HCI socket: {0}")]
    SocketError(#[from] std::io::Error),

    #[error("Failed to bind to HCI device: {0}")]
    BindError(std::io::Error),

    #[error("Failed to set HCI socket filter: {0}")]
    FilterError(std::io::Error),

    #[error("Failed to send HCI command: {0}")]
    SendError(std::io::Error),

    #[error("Failed to receive HCI event: {0}")]
    ReceiveError(std::io::Error),

    #[error("Timed out waiting for HCI event")]
    Timeout,

    #[error("Invalid parameter length: {0}")]
    InvalidParamLength(usize),

    #[error("Invalid HCI packet format")]
    InvalidPacketFormat,

    #[error("HCI command 0x{opcode:04X} failed with status 0x{status:02X}")]
    CommandFailed { opcode: u16, status: u8 },
}

/// Errors returned by the Bluetooth stack entry points
#[derive(Error, Debug)]
pub enum StackError {
    /// A stack function returned a negative result code
    #[error("{function} returned {code}")]
    Failed { function: &'static str, code: i32 },

    /// The backend does not implement this entry point
    #[error("{0} is not supported by this stack")]
    Unsupported(&'static str),

    #[error("Bluetooth stack is not open")]
    NotOpen,

    #[error("No connection to {0}")]
    NotConnected(BdAddr),

    #[error(transparent)]
    Hci(#[from] HciError),
}

impl StackError {
    /// Stack-style negative result code for this error
    pub fn code(&self) -> i32 {
        match self {
            StackError::Failed { code, .. } => *code,
            StackError::Unsupported(_) => BTPS_ERROR_FEATURE_NOT_AVAILABLE,
            StackError::NotOpen => BTPS_ERROR_INVALID_BLUETOOTH_STACK_ID,
            StackError::NotConnected(_) => BTPS_ERROR_DEVICE_NOT_CONNECTED,
            StackError::Hci(_) => BTPS_ERROR_DEVICE_HCI_ERROR,
        }
    }
}

pub const BTPS_ERROR_INVALID_PARAMETER: i32 = -1;
pub const BTPS_ERROR_INVALID_BLUETOOTH_STACK_ID: i32 = -2;
pub const BTPS_ERROR_DEVICE_HCI_ERROR: i32 = -5;
pub const BTPS_ERROR_DEVICE_NOT_CONNECTED: i32 = -58;
pub const BTPS_ERROR_FEATURE_NOT_AVAILABLE: i32 = -103;
