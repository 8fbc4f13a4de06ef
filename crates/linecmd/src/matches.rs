use std::collections::HashSet;

use indexmap::IndexMap;
use linecmd_argparse::argument::{Argument, normalize_name};
use linecmd_argparse::value::{ArgValue, Value};

use crate::{CommandError, ConfigError, SyntaxError};

/// Values parsed by one execution of a command.
///
/// Borrowed from the command that produced it, so parsed values never leak
/// into another execution.
#[derive(Debug, Clone)]
pub struct Matches<'a> {
    command: &'a str,
    definitions: &'a IndexMap<String, Argument>,
    values: IndexMap<&'a str, Value>,
    resolved: HashSet<&'a str>,
}

impl<'a> Matches<'a> {
    pub(crate) fn new(command: &'a str, definitions: &'a IndexMap<String, Argument>) -> Self {
        Self {
            command,
            definitions,
            values: IndexMap::new(),
            resolved: HashSet::new(),
        }
    }

    /// Mark `name` as claimed by a token. A flag left without a value is
    /// resolved but not present.
    pub(crate) fn resolve(&mut self, name: &str, value: Option<Value>) {
        let Some((key, _)) = self.definitions.get_key_value(name) else {
            return;
        };
        self.resolved.insert(key.as_str());
        if let Some(value) = value {
            self.values.insert(key.as_str(), value);
        }
    }

    pub(crate) fn is_resolved(&self, name: &str) -> bool {
        self.resolved.contains(name)
    }

    /// Name of the command these values belong to.
    pub fn command(&self) -> &str {
        self.command
    }

    /// Whether a value was parsed for `name`.
    pub fn is_present(&self, name: &str) -> bool {
        self.values.contains_key(normalize_name(name).as_str())
    }

    /// Raw parsed value of `name`, if any.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(normalize_name(name).as_str())
    }

    /// Parsed values in the order they were resolved.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Typed value of `name`.
    ///
    /// Returns the parsed value, else the registered default when
    /// `use_default` is set, else `None`. Unknown names and a `T` that does
    /// not match the registered kind are configuration errors.
    pub fn get_any<T: ArgValue>(
        &self,
        name: &str,
        use_default: bool,
    ) -> Result<Option<T>, ConfigError> {
        let name = normalize_name(name);
        let Some(argument) = self.definitions.get(&name) else {
            return Err(ConfigError::UnknownArgument {
                command: self.command.to_string(),
                argument: name,
            });
        };
        if argument.kind() != T::KIND {
            return Err(ConfigError::TypeMismatch {
                command: self.command.to_string(),
                argument: name,
                expected: T::KIND,
                actual: argument.kind(),
            });
        }

        let value = match self.values.get(name.as_str()) {
            Some(value) => Some(value),
            None if use_default => Some(argument.default()),
            None => None,
        };
        Ok(value.and_then(T::from_value))
    }

    /// Parsed value of `name`, or its registered default.
    pub fn get_optional<T: ArgValue>(&self, name: &str) -> Result<T, ConfigError> {
        Ok(self.get_any(name, true)?.unwrap_or_else(T::fallback))
    }

    /// Parsed value of `name`; absence is reported as a syntax error.
    pub fn get_required<T: ArgValue>(&self, name: &str) -> Result<T, CommandError> {
        match self.get_any(name, false)? {
            Some(value) => Ok(value),
            None => Err(SyntaxError::MissingArgument {
                command: self.command.to_string(),
                argument: normalize_name(name),
            }
            .into()),
        }
    }
}
