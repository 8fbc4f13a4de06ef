//! Serializable description of registered commands.
//!
//! This crate intentionally does **not** depend on the dispatch engine.
//! The types here are plain snapshots of a command manager and are used for:
//! - printing the command catalog of a host (`linecmd --describe`)
//! - shipping the catalog to a remote client for completion or docs

use serde::{Deserialize, Serialize};

/// Version of the JSON layout produced by [`CommandCatalog::to_json_pretty`].
pub const CATALOG_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ArgMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default)]
    pub required: bool,
    /// One of `string`, `bool`, `int`, `long`, `float`, `double`.
    pub value_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct CommandMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub parse_using_order: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ArgMeta>,
}

impl CommandMeta {
    /// Positional usage line, e.g. `sum <a> <b>`.
    ///
    /// Only meaningful for commands parsed by order; flag-style commands
    /// return the bare name.
    pub fn usage(&self) -> String {
        if !self.parse_using_order {
            return self.name.clone();
        }
        let mut out = self.name.clone();
        for arg in &self.args {
            out.push_str(&format!(" <{}>", arg.name));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct CommandCatalog {
    pub format_version: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(default)]
    pub commands: Vec<CommandMeta>,
}

impl CommandCatalog {
    pub fn new(prefix: impl Into<String>, commands: Vec<CommandMeta>) -> Self {
        Self {
            format_version: CATALOG_FORMAT_VERSION,
            prefix: prefix.into(),
            commands,
        }
    }

    pub fn command(&self, name: &str) -> Option<&CommandMeta> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
