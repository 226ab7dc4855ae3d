pub mod doctor;
pub mod inspect;
pub mod list;
pub mod new;

use crate::{Result, TuneconfError};

/// Common trait for all command handlers
pub trait CommandHandler {
    /// Execute the command
    fn execute(&self) -> Result<CommandResult>;

    /// Get command name for logging
    fn name(&self) -> &'static str;
}

/// Command execution result
#[derive(Debug)]
pub enum CommandResult {
    /// Success with optional message
    Success(Option<String>),
    /// Error with message
    Error(String),
    /// Request refused before anything was written
    Rejected(String),
    /// Warning with message
    Warning(String),
}

impl CommandResult {
    /// Convert to exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandResult::Success(_) => 0,
            CommandResult::Error(_) => 1,
            CommandResult::Rejected(_) => 2,
            CommandResult::Warning(_) => 0,
        }
    }

    /// Get message if any
    pub fn message(&self) -> Option<&str> {
        match self {
            CommandResult::Success(msg) => msg.as_deref(),
            CommandResult::Error(msg) => Some(msg),
            CommandResult::Rejected(msg) => Some(msg),
            CommandResult::Warning(msg) => Some(msg),
        }
    }
}

impl From<TuneconfError> for CommandResult {
    fn from(error: TuneconfError) -> Self {
        if error.is_admission() {
            CommandResult::Rejected(error.to_string())
        } else {
            CommandResult::Error(error.to_string())
        }
    }
}
