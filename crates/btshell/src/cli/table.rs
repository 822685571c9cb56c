//! Command tables and mode descriptors
//!
//! A [`CommandTable`] binds upper-case command names to handler functions.
//! A [`Mode`] wraps a table built once from a declarative binding list,
//! together with the prompt and parameter capacity of that user-interface
//! personality. Switching personalities swaps the active `Mode` instead of
//! rewriting a table in place.

use super::error::CommandResult;
use super::parser::ParameterList;
use thiserror::Error;

/// Maximum number of commands a table can hold
pub const MAX_SUPPORTED_COMMANDS: usize = 64;

/// Handler bound to a command name
pub type CommandHandler<C> = fn(&mut C, &ParameterList) -> CommandResult;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Command table is full")]
    Full,

    #[error("Command {0} is already installed")]
    Duplicate(String),

    #[error("Command name is empty")]
    EmptyName,
}

struct CommandTableEntry<C> {
    name: String,
    handler: CommandHandler<C>,
}

/// Fixed-capacity table of named command handlers
pub struct CommandTable<C> {
    entries: Vec<CommandTableEntry<C>>,
}

impl<C> Default for CommandTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CommandTable<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(MAX_SUPPORTED_COMMANDS),
        }
    }

    /// Install `handler` under `name`
    ///
    /// Names are stored upper case and must be unique within the table.
    pub fn add(&mut self, name: &str, handler: CommandHandler<C>) -> Result<(), TableError> {
        if name.is_empty() {
            return Err(TableError::EmptyName);
        }
        if self.find(name).is_some() {
            return Err(TableError::Duplicate(name.to_ascii_uppercase()));
        }
        if self.entries.len() == MAX_SUPPORTED_COMMANDS {
            return Err(TableError::Full);
        }

        self.entries.push(CommandTableEntry {
            name: name.to_ascii_uppercase(),
            handler,
        });
        Ok(())
    }

    /// Remove every command
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Case-insensitive lookup of `name`
    pub fn find(&self, name: &str) -> Option<CommandHandler<C>> {
        self.entries
            .iter()
            .find(|entry| entry.name.len() == name.len() && entry.name.eq_ignore_ascii_case(name))
            .map(|entry| entry.handler)
    }

    /// Installed names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An immutable user-interface personality
pub struct Mode<C> {
    name: &'static str,
    prompt: &'static str,
    max_parameters: usize,
    table: CommandTable<C>,
    /// Display names as written in the binding list
    display_names: Vec<&'static str>,
}

impl<C> Mode<C> {
    /// Build a mode from `(name, handler)` bindings
    pub fn new(
        name: &'static str,
        prompt: &'static str,
        max_parameters: usize,
        bindings: &[(&'static str, CommandHandler<C>)],
    ) -> Result<Self, TableError> {
        let mut table = CommandTable::new();
        for (command, handler) in bindings {
            table.add(command, *handler)?;
        }

        Ok(Self {
            name,
            prompt,
            max_parameters,
            table,
            display_names: bindings.iter().map(|(command, _)| *command).collect(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn prompt(&self) -> &'static str {
        self.prompt
    }

    pub fn max_parameters(&self) -> usize {
        self.max_parameters
    }

    pub fn table(&self) -> &CommandTable<C> {
        &self.table
    }

    /// Command names for help listings
    pub fn command_names(&self) -> &[&'static str] {
        &self.display_names
    }
}
