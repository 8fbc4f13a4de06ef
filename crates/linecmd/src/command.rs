use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use indexmap::{IndexMap, IndexSet};
use linecmd_argparse::argument::Argument;
use linecmd_argparse::help::{self, ArgDefLike, CommandMetaLike};
use linecmd_argparse::tokenize::split;
use linecmd_argparse::value::{ArgValue, Value};
use linecmd_metadata::{ArgMeta, CommandMeta};

use crate::manager::{HELP_ARGUMENT, HELP_COMMAND};
use crate::{Call, CommandError, CommandResult, ConfigError, Matches, SyntaxError};

type ArgCallback<C> = Box<dyn Fn(&mut C, &Value) -> CommandResult + Send + Sync>;
type RunCallback<C> = Box<dyn Fn(&mut C, &Matches<'_>) -> CommandResult + Send + Sync>;

/// Create an argument definition builder.
///
/// Arguments are required unless `.required(false)` is called.
///
/// # Example
///
/// ```rust,ignore
/// use linecmd::{Command, arg};
///
/// Command::<Message>::builder("show")
///     .string(arg("file").short("f").help("File to display"))?
///     .boolean(arg("verbose").short("v").required(false))?
///     .long(arg("lines").required(false).default(20))?
///     .build()?;
/// ```
pub fn arg<V: ArgValue>(name: impl Into<String>) -> ArgBuilder<V> {
    ArgBuilder::new(name)
}

/// Builder for a typed argument definition.
#[derive(Debug, Clone)]
pub struct ArgBuilder<V> {
    name: String,
    short: String,
    help: String,
    required: bool,
    default: Option<V>,
}

impl<V: ArgValue> ArgBuilder<V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short: String::new(),
            help: String::new(),
            required: true,
            default: None,
        }
    }

    pub fn short(mut self, short: impl Into<String>) -> Self {
        self.short = short.into();
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Value returned by `get_optional` when the argument was not supplied.
    pub fn default(mut self, value: V) -> Self {
        self.default = Some(value);
        self
    }

    pub fn build(self) -> Argument {
        let default = self.default.unwrap_or_else(V::fallback).into_value();
        Argument::new(&self.name, &self.short, self.help, self.required, default)
    }
}

/// Builder for [`Command`].
///
/// Every registration is validated when it is made.
pub struct CommandBuilder<C> {
    name: String,
    description: String,
    aliases: IndexSet<String>,
    parse_using_order: bool,
    reject_unknown: bool,
    arguments: IndexMap<String, Argument>,
    callbacks: HashMap<String, ArgCallback<C>>,
    run: Option<RunCallback<C>>,
}

impl<C: Call> CommandBuilder<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            description: String::new(),
            aliases: IndexSet::new(),
            parse_using_order: false,
            reject_unknown: false,
            arguments: IndexMap::new(),
            callbacks: HashMap::new(),
            run: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into().trim().to_string();
        if !alias.is_empty() {
            self.aliases.insert(alias);
        }
        self
    }

    /// Parse arguments by position instead of by `--name`/`-short` prefix.
    ///
    /// Every argument of such a command must be required.
    pub fn by_order(mut self) -> Self {
        self.parse_using_order = true;
        self
    }

    /// Reject tokens that no argument claims instead of skipping them.
    pub fn reject_unknown(mut self, reject: bool) -> Self {
        self.reject_unknown = reject;
        self
    }

    pub fn string(self, def: ArgBuilder<String>) -> Result<Self, ConfigError> {
        self.arg(def)
    }

    pub fn boolean(self, def: ArgBuilder<bool>) -> Result<Self, ConfigError> {
        self.arg(def)
    }

    pub fn integer(self, def: ArgBuilder<i32>) -> Result<Self, ConfigError> {
        self.arg(def)
    }

    pub fn long(self, def: ArgBuilder<i64>) -> Result<Self, ConfigError> {
        self.arg(def)
    }

    pub fn float(self, def: ArgBuilder<f32>) -> Result<Self, ConfigError> {
        self.arg(def)
    }

    pub fn double(self, def: ArgBuilder<f64>) -> Result<Self, ConfigError> {
        self.arg(def)
    }

    pub fn string_with<F>(self, def: ArgBuilder<String>, on_parsed: F) -> Result<Self, ConfigError>
    where
        F: Fn(&mut C, &String) -> CommandResult + Send + Sync + 'static,
    {
        self.arg_with(def, on_parsed)
    }

    pub fn boolean_with<F>(self, def: ArgBuilder<bool>, on_parsed: F) -> Result<Self, ConfigError>
    where
        F: Fn(&mut C, &bool) -> CommandResult + Send + Sync + 'static,
    {
        self.arg_with(def, on_parsed)
    }

    pub fn integer_with<F>(self, def: ArgBuilder<i32>, on_parsed: F) -> Result<Self, ConfigError>
    where
        F: Fn(&mut C, &i32) -> CommandResult + Send + Sync + 'static,
    {
        self.arg_with(def, on_parsed)
    }

    pub fn long_with<F>(self, def: ArgBuilder<i64>, on_parsed: F) -> Result<Self, ConfigError>
    where
        F: Fn(&mut C, &i64) -> CommandResult + Send + Sync + 'static,
    {
        self.arg_with(def, on_parsed)
    }

    pub fn float_with<F>(self, def: ArgBuilder<f32>, on_parsed: F) -> Result<Self, ConfigError>
    where
        F: Fn(&mut C, &f32) -> CommandResult + Send + Sync + 'static,
    {
        self.arg_with(def, on_parsed)
    }

    pub fn double_with<F>(self, def: ArgBuilder<f64>, on_parsed: F) -> Result<Self, ConfigError>
    where
        F: Fn(&mut C, &f64) -> CommandResult + Send + Sync + 'static,
    {
        self.arg_with(def, on_parsed)
    }

    pub fn arg<V: ArgValue>(self, def: ArgBuilder<V>) -> Result<Self, ConfigError> {
        self.register(def.build(), None)
    }

    /// Register an argument with a callback run as soon as its value is parsed.
    pub fn arg_with<V, F>(self, def: ArgBuilder<V>, on_parsed: F) -> Result<Self, ConfigError>
    where
        V: ArgValue,
        F: Fn(&mut C, &V) -> CommandResult + Send + Sync + 'static,
    {
        let callback: ArgCallback<C> = Box::new(move |call: &mut C, value: &Value| {
            match V::from_value(value) {
                Some(v) => on_parsed(call, &v),
                None => Ok(()),
            }
        });
        self.register(def.build(), Some(callback))
    }

    /// Set the callback run after every argument has been processed.
    pub fn runs<F>(mut self, run: F) -> Self
    where
        F: Fn(&mut C, &Matches<'_>) -> CommandResult + Send + Sync + 'static,
    {
        self.run = Some(Box::new(run));
        self
    }

    pub fn build(self) -> Result<Command<C>, ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyCommandName);
        }
        if self.parse_using_order {
            if let Some(optional) = self.arguments.values().find(|a| !a.required()) {
                return Err(ConfigError::OptionalInOrderMode {
                    command: self.name,
                    argument: optional.name().to_string(),
                });
            }
        }

        let mut aliases = self.aliases;
        aliases.insert(self.name.clone());

        Ok(Command {
            name: self.name,
            description: self.description,
            aliases,
            parse_using_order: self.parse_using_order,
            reject_unknown: self.reject_unknown,
            arguments: self.arguments,
            callbacks: self.callbacks,
            run: self.run,
            help_cache: OnceLock::new(),
            builtin: false,
        })
    }

    fn register(
        mut self,
        argument: Argument,
        on_parsed: Option<ArgCallback<C>>,
    ) -> Result<Self, ConfigError> {
        let name = argument.name().to_string();
        if name.is_empty() {
            return Err(ConfigError::EmptyArgumentName {
                command: self.name,
            });
        }
        if !argument.required() && self.parse_using_order {
            return Err(ConfigError::OptionalInOrderMode {
                command: self.name,
                argument: name,
            });
        }
        if self.arguments.contains_key(&name) {
            return Err(ConfigError::DuplicateArgument {
                command: self.name,
                argument: name,
            });
        }

        for other in self.arguments.values() {
            if argument.collides_with(other) || other.collides_with(&argument) {
                tracing::warn!(
                    command = %self.name,
                    argument = %name,
                    other = other.name(),
                    "short name collides with another argument; the first registered wins"
                );
            }
        }

        if let Some(callback) = on_parsed {
            self.callbacks.insert(name.clone(), callback);
        }
        self.arguments.insert(name, argument);
        Ok(self)
    }
}

impl<C> fmt::Debug for CommandBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuilder")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("parse_using_order", &self.parse_using_order)
            .field("arguments", &self.arguments.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A registered command: aliases, ordered argument definitions and callbacks.
///
/// A `Command` is immutable once built. Each execution parses into its own
/// [`Matches`] table, so one command can serve several calls at once.
pub struct Command<C> {
    name: String,
    description: String,
    aliases: IndexSet<String>,
    parse_using_order: bool,
    reject_unknown: bool,
    arguments: IndexMap<String, Argument>,
    callbacks: HashMap<String, ArgCallback<C>>,
    run: Option<RunCallback<C>>,
    help_cache: OnceLock<String>,
    builtin: bool,
}

impl<C: Call> Command<C> {
    pub fn builder(name: impl Into<String>) -> CommandBuilder<C> {
        CommandBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Aliases in registration order; the name is always among them.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(String::as_str)
    }

    pub fn parse_using_order(&self) -> bool {
        self.parse_using_order
    }

    pub fn rejects_unknown(&self) -> bool {
        self.reject_unknown
    }

    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.get(name)
    }

    pub fn arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.values()
    }

    /// The alias `text` invokes this command with: `text` is the alias
    /// itself or starts with the alias followed by a space.
    pub fn matched_alias(&self, text: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|alias| {
                text.strip_prefix(alias.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
            })
            .map(String::as_str)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.matched_alias(text).is_some()
    }

    /// Execute the command with the call's own text.
    pub fn execute(&self, call: &mut C) -> Result<Matches<'_>, CommandError> {
        let line = call.call_text().to_string();
        self.execute_line(&line, call)
    }

    /// Execute the command with `line`, which must start with one of its
    /// aliases.
    ///
    /// Argument callbacks run as values are parsed; the command callback runs
    /// last. The returned table holds every value parsed by this execution.
    pub fn execute_line(&self, line: &str, call: &mut C) -> Result<Matches<'_>, CommandError> {
        let Some(alias) = self.matched_alias(line) else {
            return Err(ConfigError::AliasMismatch {
                command: self.name.clone(),
                line: line.to_string(),
            }
            .into());
        };
        let rest = &line[alias.len()..];
        let tokens = split(rest.strip_prefix(' ').unwrap_or(rest));
        tracing::debug!(
            command = %self.name,
            alias,
            tokens = tokens.len(),
            by_order = self.parse_using_order,
            "executing command"
        );

        let mut matches = Matches::new(&self.name, &self.arguments);
        if self.parse_using_order {
            self.parse_in_order(&tokens, call, &mut matches)?;
        } else {
            self.parse_by_prefix(&tokens, call, &mut matches)?;
            self.check_required(&matches)?;
        }

        if let Some(run) = &self.run {
            run(call, &matches)?;
        }
        Ok(matches)
    }

    /// Help text, rendered on first use and cached.
    pub fn help_text(&self) -> &str {
        self.help_cache.get_or_init(|| help::render(self))
    }

    /// Drop the cached help text so the next [`Command::help_text`] renders again.
    ///
    /// Registered commands are reached through [`crate::CommandManager::command_mut`].
    pub fn reset_help_cache(&mut self) {
        self.help_cache = OnceLock::new();
    }

    pub fn meta(&self) -> CommandMeta {
        CommandMeta {
            name: self.name.clone(),
            description: self.description.clone(),
            aliases: self
                .aliases
                .iter()
                .filter(|a| **a != self.name)
                .cloned()
                .collect(),
            parse_using_order: self.parse_using_order,
            args: self
                .arguments
                .values()
                .map(|a| ArgMeta {
                    name: a.name().to_string(),
                    short: a.short().map(str::to_string),
                    help: a.description().to_string(),
                    required: a.required(),
                    value_type: a.kind().as_str().to_string(),
                    default_value: if a.required() { None } else { a.default_value() },
                })
                .collect(),
        }
    }

    pub(crate) fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// The manager's `help` command: one optional string argument naming the
    /// command to describe. The manager answers it after parsing.
    pub(crate) fn builtin_help() -> Self {
        let mut aliases = IndexSet::new();
        aliases.insert("h".to_string());
        aliases.insert("?".to_string());
        aliases.insert(HELP_COMMAND.to_string());

        let mut arguments = IndexMap::new();
        arguments.insert(
            HELP_ARGUMENT.to_string(),
            Argument::new(
                HELP_ARGUMENT,
                "c",
                "Command to get help/usage text of.",
                false,
                Value::String(String::new()),
            ),
        );

        Self {
            name: HELP_COMMAND.to_string(),
            description: "Lists commands and gets the help/usage text for a command.".to_string(),
            aliases,
            parse_using_order: false,
            reject_unknown: false,
            arguments,
            callbacks: HashMap::new(),
            run: None,
            help_cache: OnceLock::new(),
            builtin: true,
        }
    }

    fn parse_in_order(
        &self,
        tokens: &[String],
        call: &mut C,
        matches: &mut Matches<'_>,
    ) -> CommandResult {
        for (index, argument) in self.arguments.values().enumerate() {
            let Some(token) = tokens.get(index) else {
                return Err(self.missing(argument).into());
            };
            let value = argument.parse(token)?;
            matches.resolve(argument.name(), Some(value.clone()));
            self.run_argument(call, argument.name(), &value)?;
        }

        if self.reject_unknown {
            if let Some(extra) = tokens.get(self.arguments.len()) {
                return Err(SyntaxError::UnrecognizedArgument {
                    command: self.name.clone(),
                    token: extra.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn parse_by_prefix(
        &self,
        tokens: &[String],
        call: &mut C,
        matches: &mut Matches<'_>,
    ) -> CommandResult {
        // A token taken as the previous flag's value is still scanned, but
        // never counts as unrecognized.
        let mut value_token = None;
        for (index, token) in tokens.iter().enumerate() {
            let token = token.as_str();
            let claimed = self
                .arguments
                .values()
                .find(|a| !matches.is_resolved(a.name()) && a.matches(token));

            let Some(argument) = claimed else {
                if self.reject_unknown && value_token != Some(index) {
                    return Err(SyntaxError::UnrecognizedArgument {
                        command: self.name.clone(),
                        token: token.to_string(),
                    }
                    .into());
                }
                tracing::trace!(command = %self.name, token, "skipping unclaimed token");
                continue;
            };

            let value = if argument.prefix_only(token) {
                match tokens.get(index + 1) {
                    Some(next) => {
                        value_token = Some(index + 1);
                        Some(argument.parse(next)?)
                    }
                    None => None,
                }
            } else {
                Some(argument.parse(token)?)
            };

            if value.is_none() && argument.required() {
                return Err(SyntaxError::MissingValue {
                    command: self.name.clone(),
                    argument: argument.name().to_string(),
                }
                .into());
            }

            tracing::trace!(command = %self.name, argument = argument.name(), "resolved argument");
            matches.resolve(argument.name(), value.clone());
            if let Some(value) = &value {
                self.run_argument(call, argument.name(), value)?;
            }
        }
        Ok(())
    }

    fn check_required(&self, matches: &Matches<'_>) -> Result<(), SyntaxError> {
        match self
            .arguments
            .values()
            .find(|a| a.required() && !matches.is_present(a.name()))
        {
            Some(argument) => Err(self.missing(argument)),
            None => Ok(()),
        }
    }

    fn missing(&self, argument: &Argument) -> SyntaxError {
        SyntaxError::MissingArgument {
            command: self.name.clone(),
            argument: argument.name().to_string(),
        }
    }

    fn run_argument(&self, call: &mut C, name: &str, value: &Value) -> CommandResult {
        match self.callbacks.get(name) {
            Some(callback) => callback(call, value),
            None => Ok(()),
        }
    }
}

impl<C: Call> CommandMetaLike for Command<C> {
    type ArgDef = Argument;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(String::as_str)
    }

    fn parse_using_order(&self) -> bool {
        self.parse_using_order
    }

    fn args(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.values()
    }
}

impl<C> fmt::Debug for Command<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("parse_using_order", &self.parse_using_order)
            .field("reject_unknown", &self.reject_unknown)
            .field("arguments", &self.arguments.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueKind;

    #[derive(Debug, Default)]
    struct Recorder {
        text: String,
        out: Vec<String>,
    }

    impl Recorder {
        fn new(text: &str) -> Self {
            Self {
                text: text.to_string(),
                out: Vec::new(),
            }
        }
    }

    impl Call for Recorder {
        fn call_text(&self) -> &str {
            &self.text
        }

        fn respond(&mut self, message: &str) {
            self.out.push(message.to_string());
        }
    }

    fn counter() -> Command<Recorder> {
        Command::<Recorder>::builder("count")
            .alias("c")
            .long(arg("count").short("n").required(false).default(4211))
            .unwrap()
            .runs(|call, m| {
                let count: i64 = m.get_optional("count")?;
                call.respond(&count.to_string());
                Ok(())
            })
            .build()
            .unwrap()
    }

    #[test]
    fn long_argument_parses_inline_and_split_forms() {
        let cmd = counter();

        let mut call = Recorder::new("count --count=42");
        let m = cmd.execute(&mut call).unwrap();
        assert_eq!(m.get_any::<i64>("count", false), Ok(Some(42)));

        let mut call = Recorder::new("count --count 42");
        let m = cmd.execute(&mut call).unwrap();
        assert_eq!(m.get_any::<i64>("count", false), Ok(Some(42)));
        assert_eq!(call.out, vec!["42"]);
    }

    #[test]
    fn optional_default_is_used_when_absent() {
        let cmd = counter();
        let mut call = Recorder::new("c");
        let m = cmd.execute(&mut call).unwrap();
        assert_eq!(m.get_optional::<i64>("count"), Ok(4211));
        assert_eq!(m.get_any::<i64>("count", false), Ok(None));
        assert_eq!(call.out, vec!["4211"]);
    }

    #[test]
    fn alias_must_be_followed_by_space() {
        let cmd = counter();
        assert!(cmd.matches("count"));
        assert!(cmd.matches("c -n 3"));
        assert!(!cmd.matches("counter"));
        assert!(!cmd.matches("cc"));
        assert_eq!(cmd.matched_alias("count 1"), Some("count"));

        let mut call = Recorder::new("counter");
        let err = cmd.execute(&mut call).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Config(ConfigError::AliasMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_argument_is_rejected_at_registration() {
        let err = Command::<Recorder>::builder("dup")
            .string(arg("x"))
            .unwrap()
            .integer(arg(" x "))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateArgument {
                command: "dup".to_string(),
                argument: "x".to_string(),
            }
        );
    }

    #[test]
    fn optional_argument_is_rejected_in_order_mode() {
        let err = Command::<Recorder>::builder("sum")
            .by_order()
            .integer(arg("a").required(false))
            .unwrap_err();
        assert!(matches!(err, ConfigError::OptionalInOrderMode { .. }));

        // Switching to order mode after registering an optional argument is
        // caught when the command is built.
        let err = Command::<Recorder>::builder("sum")
            .integer(arg("a").required(false))
            .unwrap()
            .by_order()
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::OptionalInOrderMode { .. }));
    }

    #[test]
    fn empty_names_are_rejected() {
        let err = Command::<Recorder>::builder("  ").build().unwrap_err();
        assert_eq!(err, ConfigError::EmptyCommandName);

        let err = Command::<Recorder>::builder("x")
            .string(arg("   "))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyArgumentName { .. }));
    }

    #[test]
    fn name_is_always_an_alias() {
        let cmd = counter();
        let aliases: Vec<&str> = cmd.aliases().collect();
        assert_eq!(aliases, vec!["c", "count"]);
    }

    #[test]
    fn help_text_is_cached_until_reset() {
        let mut cmd = counter();
        let first = cmd.help_text().to_string();
        assert_eq!(cmd.help_text(), first);
        assert!(first.starts_with("count"));
        assert!(first.contains("--count [-n] (long): [default: 4211]"));
        cmd.reset_help_cache();
        assert_eq!(cmd.help_text(), first);
    }

    #[test]
    fn meta_describes_arguments() {
        let meta = counter().meta();
        assert_eq!(meta.name, "count");
        assert_eq!(meta.aliases, vec!["c"]);
        assert_eq!(meta.args.len(), 1);
        assert_eq!(meta.args[0].value_type, ValueKind::Long.as_str());
        assert_eq!(meta.args[0].short.as_deref(), Some("n"));
        assert_eq!(meta.args[0].default_value.as_deref(), Some("4211"));
    }

    #[test]
    fn builtin_help_has_optional_command_argument() {
        let help = Command::<Recorder>::builtin_help();
        assert!(help.is_builtin());
        assert!(help.matches("?"));
        assert!(help.matches("h -c x"));
        let argument = help.argument(HELP_ARGUMENT).unwrap();
        assert!(!argument.required());
        assert_eq!(argument.short_prefix(), Some("-c"));
    }
}
