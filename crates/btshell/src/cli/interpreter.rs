//! Command dispatcher

use super::error::{CommandError, CommandResult, Flow};
use super::parser::{parse_command_line, ParseError};
use super::table::Mode;
use log::debug;

/// Reserved token that leaves the current mode without a table lookup
pub const QUIT_COMMAND: &str = "QUIT";

/// Parse `line` and run the matching handler of `mode`
///
/// Unknown commands return [`CommandError::InvalidCommand`] without touching
/// `ctx`. A line with more parameters than the mode allows is rejected with
/// [`CommandError::TooManyParameters`] holding the parameters read up to
/// capacity; no handler runs.
pub fn execute<C>(ctx: &mut C, mode: &Mode<C>, line: &str) -> CommandResult {
    let command = match parse_command_line(line, mode.max_parameters()) {
        Ok(command) => command,
        Err(ParseError::NoCommand) => return Err(CommandError::NoCommand),
        Err(ParseError::TooManyParameters(partial)) => {
            debug!(
                "{}: more than {} parameters",
                partial.command,
                partial.parameters.len()
            );
            return Err(CommandError::TooManyParameters(partial));
        }
    };

    if command.command == QUIT_COMMAND {
        return Ok(Flow::Quit);
    }

    let handler = mode
        .table()
        .find(&command.command)
        .ok_or_else(|| CommandError::InvalidCommand(command.command.clone()))?;

    debug!(
        "[{}] {} with {} parameters",
        mode.name(),
        command.command,
        command.parameters.len()
    );
    handler(ctx, &command.parameters)
}
