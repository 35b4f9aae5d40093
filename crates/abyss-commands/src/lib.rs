//! Abyss commands: the `sys` group that exposes the evaluation pipeline.
//!
//! Every command returns an [`ActionResult`](abyss_core::ActionResult).
//! [`SystemCommands::run`] is the outermost boundary: anything a handler
//! did not anticipate comes back as a "Generic error" reply naming the
//! fault, never as a panic or an `Err` to the host.

mod system;

pub use system::SystemCommands;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Message `throwex` uses when none is given
pub const DEFAULT_THROWEX_MESSAGE: &str = "Test exception.";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("InvalidOperationError: {0}")]
    InvalidOperation(String),

    #[error("UnknownCommandError: no command named '{0}'")]
    UnknownCommand(String),

    #[error("InternalError: {0}")]
    Internal(String),

    #[error(transparent)]
    Pipeline(#[from] abyss_core::AbyssError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemCommand {
    Eval,
    Inspect,
    Hb,
    Throwex,
}

impl SystemCommand {
    pub const ALL: [SystemCommand; 4] = [
        SystemCommand::Eval,
        SystemCommand::Inspect,
        SystemCommand::Hb,
        SystemCommand::Throwex,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SystemCommand::Eval => "eval",
            SystemCommand::Inspect => "inspect",
            SystemCommand::Hb => "hb",
            SystemCommand::Throwex => "throwex",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SystemCommand::Eval => "Evaluates a piece of script code.",
            SystemCommand::Inspect => "Evaluates and then inspects a value.",
            SystemCommand::Hb => {
                "Evaluates and compiles a Handlebars template against the current execution context."
            }
            SystemCommand::Throwex => "Throws an invalid-operation fault. For testing purposes.",
        }
    }
}

impl fmt::Display for SystemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SystemCommand {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SystemCommand::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CommandError::UnknownCommand(s.to_string()))
    }
}
