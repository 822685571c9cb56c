//! Command-line front end shared by every demo
//!
//! A console line is tokenized by [`parser`], looked up in the active
//! [`Mode`]'s command table and dispatched by [`interpreter`]. Handlers report
//! failures through the [`CommandError`] taxonomy and request personality
//! changes through [`Flow`].

pub mod error;
pub mod interpreter;
pub mod parser;
pub mod table;


pub use error::{CommandError, CommandResult, Flow};
pub use interpreter::execute;
pub use parser::{parse_command_line, Parameter, ParameterList, ParseError, UserCommand};
pub use table::{CommandHandler, CommandTable, Mode, TableError};
