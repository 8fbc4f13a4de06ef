//! Dispatch free-text command lines to typed, registered commands.
//!
//! A line such as `greet --name "Ada Lovelace" -n 2` arrives from a chat
//! message, a REPL or a remote console. A [`CommandManager`] finds the
//! [`Command`] whose alias starts the line, the command tokenizes the rest,
//! parses each declared argument and runs the per-argument and per-command
//! callbacks.
//!
//! # Example
//!
//! ```rust,ignore
//! use linecmd::prelude::*;
//!
//! struct Message {
//!     text: String,
//! }
//!
//! impl Call for Message {
//!     fn call_text(&self) -> &str {
//!         &self.text
//!     }
//!
//!     fn respond(&mut self, message: &str) {
//!         println!("{message}");
//!     }
//! }
//!
//! let greet = Command::<Message>::builder("greet")
//!     .description("Greet someone")
//!     .alias("hi")
//!     .string(arg("name").short("n").help("Who to greet"))?
//!     .integer(arg("times").short("t").required(false).default(1))?
//!     .runs(|call, matches| {
//!         let name: String = matches.get_required("name")?;
//!         for _ in 0..matches.get_optional::<i32>("times")? {
//!             call.success(&format!("Hello, {name}!"));
//!         }
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let mut manager = CommandManager::with_prefix("!");
//! manager.add_command(greet)?;
//! manager.run_command(&mut Message { text: "!hi -n Ada".into() })?;
//! ```

mod command;
mod manager;
mod matches;

pub use command::{ArgBuilder, Command, CommandBuilder, arg};
pub use manager::{CommandManager, Dispatch, HELP_ARGUMENT, HELP_COMMAND};
pub use matches::Matches;

pub use linecmd_argparse::argument::{Argument, normalize_name};
pub use linecmd_argparse::error::{ConfigError, SyntaxError};
pub use linecmd_argparse::tokenize::split;
pub use linecmd_argparse::value::{ArgValue, Value, ValueKind};
pub use linecmd_metadata::{ArgMeta, CommandCatalog, CommandMeta};

/// The context a dispatched line arrives in and responses leave through.
///
/// Implemented by the embedding program: a chat message, a console line, a
/// remote session. Only [`Call::call_text`] and [`Call::respond`] are
/// required; the other sinks default to `respond`.
pub trait Call {
    /// The raw line to dispatch.
    fn call_text(&self) -> &str;

    fn respond(&mut self, message: &str);

    fn error(&mut self, message: &str) {
        self.respond(message)
    }

    fn success(&mut self, message: &str) {
        self.respond(message)
    }

    fn info(&mut self, message: &str) {
        self.respond(message)
    }
}

/// Error raised while executing a command.
///
/// Syntax errors are recovered by [`CommandManager::run_command`];
/// configuration errors are passed through to the embedding program.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CommandError {
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }
}

impl From<String> for CommandError {
    fn from(s: String) -> Self {
        // A plain message from a callback rejects the user's input.
        CommandError::Syntax(SyntaxError::Custom(s))
    }
}

impl From<&str> for CommandError {
    fn from(s: &str) -> Self {
        CommandError::Syntax(SyntaxError::Custom(s.to_string()))
    }
}

/// Result type of argument and command callbacks.
pub type CommandResult = Result<(), CommandError>;

/// Common imports for code registering commands.
pub mod prelude {
    pub use super::{
        Call, Command, CommandBuilder, CommandError, CommandManager, CommandResult, Dispatch,
        Matches, arg,
    };
}
