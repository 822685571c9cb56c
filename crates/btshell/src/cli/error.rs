//! Command error taxonomy
//!
//! Every error maps onto the fixed negative status codes the console has
//! always reported, see [`CommandError::code`].

use super::parser::UserCommand;
use crate::error::StackError;
use thiserror::Error;

pub const NO_COMMAND_ERROR: i32 = -1;
pub const INVALID_COMMAND_ERROR: i32 = -2;
pub const EXIT_CODE: i32 = -3;
pub const FUNCTION_ERROR: i32 = -4;
pub const TOO_MANY_PARAMS: i32 = -5;
pub const INVALID_PARAMETERS_ERROR: i32 = -6;
pub const UNABLE_TO_INITIALIZE_STACK: i32 = -7;
pub const INVALID_STACK_ID_ERROR: i32 = -8;
pub const UNABLE_TO_REGISTER_SERVER: i32 = -9;
pub const EXIT_MODE: i32 = -10;

/// Errors reported by the dispatcher and by command handlers
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("No command")]
    NoCommand,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// The line had more parameters than the mode allows
    ///
    /// Carries the command with the parameters read up to capacity.
    #[error("Too many parameters")]
    TooManyParameters(UserCommand),

    #[error("Invalid parameters")]
    InvalidParameters,

    /// A handler failed for a reason other than the stack
    #[error("Function error: {0}")]
    Function(String),

    /// A stack entry point returned an error
    #[error("Function error: {0}")]
    Stack(#[from] StackError),

    #[error("Unable to initialize the Bluetooth stack: {0}")]
    UnableToInitializeStack(#[source] StackError),

    #[error("Invalid stack ID")]
    InvalidStackId,

    #[error("Unable to register server: {0}")]
    UnableToRegisterServer(#[source] StackError),
}

impl CommandError {
    /// Legacy numeric status for this error
    pub fn code(&self) -> i32 {
        match self {
            CommandError::NoCommand => NO_COMMAND_ERROR,
            CommandError::InvalidCommand(_) => INVALID_COMMAND_ERROR,
            CommandError::TooManyParameters(_) => TOO_MANY_PARAMS,
            CommandError::InvalidParameters => INVALID_PARAMETERS_ERROR,
            CommandError::Function(_) | CommandError::Stack(_) => FUNCTION_ERROR,
            CommandError::UnableToInitializeStack(_) => UNABLE_TO_INITIALIZE_STACK,
            CommandError::InvalidStackId => INVALID_STACK_ID_ERROR,
            CommandError::UnableToRegisterServer(_) => UNABLE_TO_REGISTER_SERVER,
        }
    }
}

/// What the runner should do once a command has completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Stay in the current mode
    Continue,
    /// Switch to the named mode, keeping the current one to return to
    Enter(&'static str),
    /// Leave the current mode; leaving the outermost mode ends the program
    ExitMode,
    /// The reserved `QUIT` token was entered
    Quit,
}

impl Flow {
    /// Legacy numeric status for this outcome
    pub fn code(&self) -> i32 {
        match self {
            Flow::Continue | Flow::Enter(_) => 0,
            Flow::ExitMode => EXIT_MODE,
            Flow::Quit => EXIT_CODE,
        }
    }
}

/// Result type returned by command handlers
pub type CommandResult = Result<Flow, CommandError>;
