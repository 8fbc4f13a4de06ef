use indexmap::IndexMap;
use linecmd_argparse::error::{ConfigError, SyntaxError};
use linecmd_metadata::CommandCatalog;

use crate::{Call, Command, CommandError, Matches};

/// Name of the built-in help command.
pub const HELP_COMMAND: &str = "help";
/// Argument of the built-in help command naming the command to describe.
pub const HELP_ARGUMENT: &str = "command";

/// Outcome of [`CommandManager::run_command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The command ran to completion.
    Executed { command: String },
    /// The command rejected the input; the error and the command's help text
    /// were sent through the call.
    Rejected { command: String, error: SyntaxError },
    /// No registered command answers to the line.
    Unmatched,
}

/// Ordered set of commands plus the built-in `help` command.
pub struct CommandManager<C> {
    prefix: String,
    report_unknown: bool,
    commands: IndexMap<String, Command<C>>,
}

impl<C: Call> Default for CommandManager<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Call> CommandManager<C> {
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    /// A manager that also accepts lines starting with `prefix`, e.g. `!greet`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let mut commands = IndexMap::new();
        commands.insert(HELP_COMMAND.to_string(), Command::builtin_help());
        Self {
            prefix: prefix.into(),
            report_unknown: false,
            commands,
        }
    }

    /// Answer lines no command matches with `Unknown command: <word>`.
    pub fn report_unknown(mut self, report: bool) -> Self {
        self.report_unknown = report;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register `command`, replacing any command with the same name.
    pub fn add_command(&mut self, command: Command<C>) -> Result<(), ConfigError> {
        for other in self.commands.values() {
            if other.name() == command.name() {
                continue;
            }
            if let Some(alias) = command.aliases().find(|a| other.aliases().any(|o| o == *a)) {
                return Err(ConfigError::AliasConflict {
                    alias: alias.to_string(),
                    existing: other.name().to_string(),
                    command: command.name().to_string(),
                });
            }
        }

        let name = command.name().to_string();
        if self.commands.contains_key(&name) {
            tracing::warn!(command = %name, "replacing registered command");
        } else {
            tracing::debug!(command = %name, "registered command");
        }
        self.commands.insert(name, command);
        Ok(())
    }

    pub fn load_commands(
        &mut self,
        commands: impl IntoIterator<Item = Command<C>>,
    ) -> Result<(), ConfigError> {
        for command in commands {
            self.add_command(command)?;
        }
        Ok(())
    }

    /// Look a command up by name, then by alias.
    pub fn command(&self, name: &str) -> Option<&Command<C>> {
        self.commands
            .get(name)
            .or_else(|| self.commands.values().find(|c| c.aliases().any(|a| a == name)))
    }

    /// Mutable access to a registered command, e.g. to reset its help cache.
    pub fn command_mut(&mut self, name: &str) -> Option<&mut Command<C>> {
        let index = self.commands.get_index_of(name).or_else(|| {
            self.commands
                .values()
                .position(|c| c.aliases().any(|a| a == name))
        })?;
        self.commands.get_index_mut(index).map(|(_, command)| command)
    }

    /// Drop the cached help text of every registered command.
    pub fn reset_help_caches(&mut self) {
        for command in self.commands.values_mut() {
            command.reset_help_cache();
        }
    }

    /// Registered commands in registration order, `help` first.
    pub fn commands(&self) -> impl Iterator<Item = &Command<C>> {
        self.commands.values()
    }

    pub fn list_commands(&self) -> String {
        let mut out = String::from("Available commands:");

        let mut commands: Vec<&Command<C>> = self.commands.values().collect();
        commands.sort_by(|a, b| a.name().cmp(b.name()));

        for command in commands {
            if command.description().is_empty() {
                out.push_str(&format!("\n  {}", command.name()));
            } else {
                out.push_str(&format!("\n  {:<16} {}", command.name(), command.description()));
            }
        }
        out
    }

    pub fn catalog(&self) -> CommandCatalog {
        CommandCatalog::new(
            self.prefix.clone(),
            self.commands.values().map(Command::meta).collect(),
        )
    }

    /// Find the command `text` invokes, with or without the manager prefix.
    ///
    /// Returns the command and the line it should execute.
    pub fn resolve<'t>(&self, text: &'t str) -> Option<(&Command<C>, &'t str)> {
        let stripped = if self.prefix.is_empty() {
            None
        } else {
            text.strip_prefix(self.prefix.as_str())
        };

        self.commands.values().find_map(|command| {
            if command.matches(text) {
                Some((command, text))
            } else {
                stripped
                    .filter(|line| command.matches(line))
                    .map(|line| (command, line))
            }
        })
    }

    /// Dispatch the call's text to the first command that answers to it.
    ///
    /// Syntax errors are reported through `call.error` followed by the
    /// command's help text through `call.info`. Configuration errors are
    /// returned.
    pub fn run_command(&self, call: &mut C) -> Result<Dispatch, ConfigError> {
        let text = call.call_text().to_string();
        let Some((command, line)) = self.resolve(&text) else {
            tracing::debug!(line = %text, "no command matched");
            self.respond_unknown(&text, call);
            return Ok(Dispatch::Unmatched);
        };

        tracing::debug!(command = command.name(), "dispatching");
        match command.execute_line(line, call) {
            Ok(matches) => {
                if command.is_builtin() {
                    self.respond_help(&matches, call)?;
                }
                Ok(Dispatch::Executed {
                    command: command.name().to_string(),
                })
            }
            Err(CommandError::Syntax(error)) => {
                tracing::debug!(command = command.name(), %error, "command rejected input");
                call.error(&error.to_string());
                call.info(command.help_text());
                Ok(Dispatch::Rejected {
                    command: command.name().to_string(),
                    error,
                })
            }
            Err(CommandError::Config(error)) => Err(error),
        }
    }

    fn respond_unknown(&self, text: &str, call: &mut C) {
        if !self.report_unknown {
            return;
        }
        let line = text.strip_prefix(self.prefix.as_str()).unwrap_or(text);
        if let Some(word) = line.split_whitespace().next() {
            call.error(&format!("Unknown command: {word}"));
        }
    }

    fn respond_help(&self, matches: &Matches<'_>, call: &mut C) -> Result<(), ConfigError> {
        let requested: String = matches.get_optional(HELP_ARGUMENT)?;
        let requested = requested.trim();
        if requested.is_empty() {
            call.info(&self.list_commands());
            return Ok(());
        }
        match self.command(requested) {
            Some(command) => call.info(command.help_text()),
            None => call.error(&format!("No command with name {requested}.")),
        }
        Ok(())
    }
}

impl<C> std::fmt::Debug for CommandManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandManager")
            .field("prefix", &self.prefix)
            .field("report_unknown", &self.report_unknown)
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}
