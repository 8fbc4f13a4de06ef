//! Tokenizing, typed argument definitions and help rendering.
//!
//! This crate knows nothing about dispatch so it can be reused by:
//! - `linecmd` (command registration, execution and the manager loop)
//! - hosts that only need to split a line or coerce a literal

pub mod error {
    use crate::value::ValueKind;
    use thiserror::Error;

    /// Malformed end-user input.
    ///
    /// The dispatcher always recovers from these: the message and the help
    /// text of the failing command are reported back to the caller.
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum SyntaxError {
        #[error("'{literal}' is not a valid {kind}")]
        InvalidValue { literal: String, kind: ValueKind },

        #[error("argument '{argument}' of '{command}' requires a value")]
        MissingValue { command: String, argument: String },

        #[error("argument '{argument}' of '{command}' is missing")]
        MissingArgument { command: String, argument: String },

        #[error("unrecognized argument '{token}' for '{command}'")]
        UnrecognizedArgument { command: String, token: String },

        #[error("{0}")]
        Custom(String),
    }

    /// Incorrect use of the registration or retrieval API by the embedding
    /// program. Never swallowed by the dispatcher.
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum ConfigError {
        #[error("command name must not be empty")]
        EmptyCommandName,

        #[error("argument name of '{command}' must not be empty")]
        EmptyArgumentName { command: String },

        #[error("there is already an argument called '{argument}' on '{command}'")]
        DuplicateArgument { command: String, argument: String },

        #[error(
            "argument '{argument}' of '{command}' cannot be optional when parsing by order"
        )]
        OptionalInOrderMode { command: String, argument: String },

        #[error("'{argument}' is not an argument of '{command}'")]
        UnknownArgument { command: String, argument: String },

        #[error("argument '{argument}' of '{command}' is {actual}, not {expected}")]
        TypeMismatch {
            command: String,
            argument: String,
            expected: ValueKind,
            actual: ValueKind,
        },

        #[error("'{line}' does not invoke '{command}'")]
        AliasMismatch { command: String, line: String },

        #[error("alias conflict: '{alias}' refers to both '{existing}' and '{command}'")]
        AliasConflict {
            alias: String,
            existing: String,
            command: String,
        },
    }
}

pub mod tokenize {
    /// Split a raw line into word tokens.
    ///
    /// - a `"..."` span becomes one token with the quotes removed
    /// - outside quotes, a token is a run of non-whitespace, non-quote characters
    /// - empty tokens are dropped
    ///
    /// An unmatched quote never fails: it is skipped and the text after it is
    /// split like any other unquoted text.
    pub fn split(input: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut rest = input;

        while let Some(c) = rest.chars().next() {
            if c == '"' {
                flush(&mut tokens, &mut current);
                match rest[1..].find('"') {
                    Some(end) => {
                        let quoted = &rest[1..1 + end];
                        if !quoted.is_empty() {
                            tokens.push(quoted.to_string());
                        }
                        rest = &rest[end + 2..];
                    }
                    None => rest = &rest[1..],
                }
                continue;
            }

            if c.is_whitespace() {
                flush(&mut tokens, &mut current);
            } else {
                current.push(c);
            }
            rest = &rest[c.len_utf8()..];
        }

        flush(&mut tokens, &mut current);
        tokens
    }

    fn flush(tokens: &mut Vec<String>, current: &mut String) {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    }
}

pub mod value {
    use crate::error::SyntaxError;
    use std::fmt;

    /// Closed tag identifying the type an argument parses into.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ValueKind {
        String,
        Bool,
        Int,
        Long,
        Float,
        Double,
    }

    impl ValueKind {
        pub const ALL: [ValueKind; 6] = [
            ValueKind::String,
            ValueKind::Bool,
            ValueKind::Int,
            ValueKind::Long,
            ValueKind::Float,
            ValueKind::Double,
        ];

        pub fn as_str(self) -> &'static str {
            match self {
                Self::String => "string",
                Self::Bool => "bool",
                Self::Int => "int",
                Self::Long => "long",
                Self::Float => "float",
                Self::Double => "double",
            }
        }

        /// Coerce `literal` into a value of this kind.
        pub fn parse(self, literal: &str) -> Result<Value, SyntaxError> {
            match self {
                Self::String => String::parse_literal(literal).map(Value::String),
                Self::Bool => bool::parse_literal(literal).map(Value::Bool),
                Self::Int => i32::parse_literal(literal).map(Value::Int),
                Self::Long => i64::parse_literal(literal).map(Value::Long),
                Self::Float => f32::parse_literal(literal).map(Value::Float),
                Self::Double => f64::parse_literal(literal).map(Value::Double),
            }
        }

        /// Default used when a registration does not supply one.
        pub fn fallback(self) -> Value {
            match self {
                Self::String => String::fallback().into_value(),
                Self::Bool => bool::fallback().into_value(),
                Self::Int => i32::fallback().into_value(),
                Self::Long => i64::fallback().into_value(),
                Self::Float => f32::fallback().into_value(),
                Self::Double => f64::fallback().into_value(),
            }
        }
    }

    impl fmt::Display for ValueKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// A parsed argument value, tagged with its kind.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Value {
        String(String),
        Bool(bool),
        Int(i32),
        Long(i64),
        Float(f32),
        Double(f64),
    }

    impl Value {
        pub fn kind(&self) -> ValueKind {
            match self {
                Self::String(_) => ValueKind::String,
                Self::Bool(_) => ValueKind::Bool,
                Self::Int(_) => ValueKind::Int,
                Self::Long(_) => ValueKind::Long,
                Self::Float(_) => ValueKind::Float,
                Self::Double(_) => ValueKind::Double,
            }
        }
    }

    impl fmt::Display for Value {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::String(v) => f.write_str(v),
                Self::Bool(v) => write!(f, "{v}"),
                Self::Int(v) => write!(f, "{v}"),
                Self::Long(v) => write!(f, "{v}"),
                Self::Float(v) => write!(f, "{v}"),
                Self::Double(v) => write!(f, "{v}"),
            }
        }
    }

    /// Rust types an argument can be declared with.
    pub trait ArgValue: Clone + Send + Sync + 'static {
        const KIND: ValueKind;

        fn fallback() -> Self;

        fn parse_literal(literal: &str) -> Result<Self, SyntaxError>;

        fn into_value(self) -> Value;

        fn from_value(value: &Value) -> Option<Self>;
    }

    impl ArgValue for String {
        const KIND: ValueKind = ValueKind::String;

        fn fallback() -> Self {
            String::new()
        }

        fn parse_literal(literal: &str) -> Result<Self, SyntaxError> {
            Ok(literal.to_string())
        }

        fn into_value(self) -> Value {
            Value::String(self)
        }

        fn from_value(value: &Value) -> Option<Self> {
            match value {
                Value::String(v) => Some(v.clone()),
                _ => None,
            }
        }
    }

    impl ArgValue for bool {
        const KIND: ValueKind = ValueKind::Bool;

        fn fallback() -> Self {
            false
        }

        fn parse_literal(literal: &str) -> Result<Self, SyntaxError> {
            match literal.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(SyntaxError::InvalidValue {
                    literal: literal.to_string(),
                    kind: Self::KIND,
                }),
            }
        }

        fn into_value(self) -> Value {
            Value::Bool(self)
        }

        fn from_value(value: &Value) -> Option<Self> {
            match value {
                Value::Bool(v) => Some(*v),
                _ => None,
            }
        }
    }

    macro_rules! numeric_value {
        ($ty:ty, $variant:ident, $fallback:expr) => {
            impl ArgValue for $ty {
                const KIND: ValueKind = ValueKind::$variant;

                fn fallback() -> Self {
                    $fallback
                }

                fn parse_literal(literal: &str) -> Result<Self, SyntaxError> {
                    literal
                        .parse::<$ty>()
                        .map_err(|_| SyntaxError::InvalidValue {
                            literal: literal.to_string(),
                            kind: Self::KIND,
                        })
                }

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(*v),
                        _ => None,
                    }
                }
            }
        };
    }

    numeric_value!(i32, Int, -1);
    numeric_value!(i64, Long, -1);
    numeric_value!(f32, Float, -1.0);
    numeric_value!(f64, Double, -1.0);
}

pub mod argument {
    use crate::error::SyntaxError;
    use crate::value::{Value, ValueKind};

    /// Trim a name and replace interior spaces with underscores.
    pub fn normalize_name(raw: &str) -> String {
        raw.trim().replace(' ', "_")
    }

    /// A named, typed argument definition.
    ///
    /// The value type is carried by `default`: its kind is the kind every
    /// parsed value of this argument has.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Argument {
        name: String,
        short: Option<String>,
        description: String,
        required: bool,
        default: Value,
        long_prefix: String,
        short_prefix: Option<String>,
    }

    impl Argument {
        pub fn new(
            name: &str,
            short: &str,
            description: impl Into<String>,
            required: bool,
            default: Value,
        ) -> Self {
            let name = normalize_name(name);
            let short = Some(normalize_name(short)).filter(|s| !s.is_empty());
            let long_prefix = format!("--{name}");
            let short_prefix = short.as_ref().map(|s| format!("-{s}"));
            Self {
                name,
                short,
                description: description.into(),
                required,
                default,
                long_prefix,
                short_prefix,
            }
        }

        pub fn name(&self) -> &str {
            &self.name
        }

        pub fn short(&self) -> Option<&str> {
            self.short.as_deref()
        }

        pub fn description(&self) -> &str {
            &self.description
        }

        pub fn required(&self) -> bool {
            self.required
        }

        pub fn default(&self) -> &Value {
            &self.default
        }

        pub fn kind(&self) -> ValueKind {
            self.default.kind()
        }

        /// `--name`
        pub fn long_prefix(&self) -> &str {
            &self.long_prefix
        }

        /// `-short`, absent when no short name was given.
        pub fn short_prefix(&self) -> Option<&str> {
            self.short_prefix.as_deref()
        }

        /// Whether `token` starts with either prefix of this argument.
        pub fn matches(&self, token: &str) -> bool {
            token.starts_with(&self.long_prefix)
                || self
                    .short_prefix
                    .as_deref()
                    .is_some_and(|p| token.starts_with(p))
        }

        /// Whether `token` is the bare flag form, whose value is the next token.
        pub fn prefix_only(&self, token: &str) -> bool {
            token == self.long_prefix || self.short_prefix.as_deref() == Some(token)
        }

        /// Parse `token` into a value of this argument's kind.
        ///
        /// `--name=value` and `-short=value` are parsed from the part after
        /// `=`; any other token is parsed whole as the value literal.
        pub fn parse(&self, token: &str) -> Result<Value, SyntaxError> {
            let literal = self.inline_value(token).unwrap_or(token);
            self.kind().parse(literal)
        }

        /// Whether a token could be claimed by both arguments through their
        /// short prefix.
        pub fn collides_with(&self, other: &Argument) -> bool {
            let Some(short) = self.short_prefix.as_deref() else {
                return false;
            };
            other.short_prefix.as_deref() == Some(short) || other.long_prefix == short
        }

        fn inline_value<'t>(&self, token: &'t str) -> Option<&'t str> {
            strip_assignment(token, &self.long_prefix).or_else(|| {
                self.short_prefix
                    .as_deref()
                    .and_then(|p| strip_assignment(token, p))
            })
        }
    }

    fn strip_assignment<'t>(token: &'t str, prefix: &str) -> Option<&'t str> {
        token.strip_prefix(prefix)?.strip_prefix('=')
    }
}

pub mod help {
    use crate::argument::Argument;
    use crate::value::{Value, ValueKind};

    pub trait ArgDefLike {
        fn name(&self) -> &str;
        fn short(&self) -> Option<&str>;
        fn help(&self) -> &str;
        fn required(&self) -> bool;
        fn value_kind(&self) -> ValueKind;
        fn default_value(&self) -> Option<String> {
            None
        }
    }

    pub trait CommandMetaLike {
        type ArgDef: ArgDefLike;

        fn name(&self) -> &str;
        fn description(&self) -> &str;
        fn aliases(&self) -> impl Iterator<Item = &str>;
        fn parse_using_order(&self) -> bool;
        fn args(&self) -> impl Iterator<Item = &Self::ArgDef>;
    }

    impl ArgDefLike for Argument {
        fn name(&self) -> &str {
            Argument::name(self)
        }

        fn short(&self) -> Option<&str> {
            Argument::short(self)
        }

        fn help(&self) -> &str {
            self.description()
        }

        fn required(&self) -> bool {
            Argument::required(self)
        }

        fn value_kind(&self) -> ValueKind {
            self.kind()
        }

        fn default_value(&self) -> Option<String> {
            match self.default() {
                Value::String(s) if s.is_empty() => None,
                other => Some(other.to_string()),
            }
        }
    }

    fn format_arg_left(def: &dyn ArgDefLike, by_order: bool) -> String {
        if by_order {
            return format!("- {} ({})", def.name(), def.value_kind());
        }
        match def.short() {
            Some(short) => format!("--{} [-{}] ({})", def.name(), short, def.value_kind()),
            None => format!("--{} ({})", def.name(), def.value_kind()),
        }
    }

    fn format_arg_help(def: &dyn ArgDefLike) -> String {
        let mut out = def.help().trim().to_string();
        if !def.required() {
            if let Some(default_value) = def.default_value() {
                if out.is_empty() {
                    out.push_str(&format!("[default: {default_value}]"));
                } else {
                    out.push_str(&format!(" [default: {default_value}]"));
                }
            }
        }
        out
    }

    fn push_rows(out: &mut String, heading: &str, defs: &[&dyn ArgDefLike], by_order: bool) {
        if defs.is_empty() {
            return;
        }
        out.push_str(&format!("\n  {heading}:"));
        for def in defs {
            let left = format_arg_left(*def, by_order);
            let help = format_arg_help(*def);
            if help.is_empty() {
                out.push_str(&format!("\n    {left}"));
            } else {
                out.push_str(&format!("\n    {left}: {help}"));
            }
        }
    }

    /// Render the help text of a command.
    ///
    /// ```text
    /// name: description
    ///   Aliases: n
    ///   Required Arguments:
    ///     --count [-c] (long): How many
    ///   Optional Arguments:
    ///     --label (string): Shown first [default: none]
    /// ```
    ///
    /// Commands parsed by order list a single `Arguments` block followed by a
    /// positional usage line.
    pub fn render<M: CommandMetaLike>(meta: &M) -> String {
        let mut out = if meta.description().trim().is_empty() {
            meta.name().to_string()
        } else {
            format!("{}: {}", meta.name(), meta.description().trim())
        };

        let aliases: Vec<&str> = meta.aliases().filter(|a| *a != meta.name()).collect();
        if !aliases.is_empty() {
            out.push_str(&format!("\n  Aliases: {}", aliases.join(", ")));
        }

        let by_order = meta.parse_using_order();
        let mut required: Vec<&dyn ArgDefLike> = Vec::new();
        let mut optional: Vec<&dyn ArgDefLike> = Vec::new();
        for def in meta.args() {
            if def.required() {
                required.push(def);
            } else {
                optional.push(def);
            }
        }

        let heading = if by_order {
            "Arguments"
        } else {
            "Required Arguments"
        };
        push_rows(&mut out, heading, &required, by_order);
        push_rows(&mut out, "Optional Arguments", &optional, by_order);

        if by_order {
            let mut usage = meta.name().to_string();
            for def in meta.args() {
                usage.push_str(&format!(" <{}>", def.name()));
            }
            out.push_str(&format!("\n  Usage: {usage}"));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::argument::{Argument, normalize_name};
    use super::error::SyntaxError;
    use super::help::{self, ArgDefLike, CommandMetaLike};
    use super::tokenize::split;
    use super::value::{ArgValue, Value, ValueKind};

    #[derive(Debug, Clone, Default)]
    struct Meta {
        name: String,
        description: String,
        aliases: Vec<String>,
        by_order: bool,
        args: Vec<Argument>,
    }

    impl CommandMetaLike for Meta {
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
            self.by_order
        }
        fn args(&self) -> impl Iterator<Item = &Argument> {
            self.args.iter()
        }
    }

    fn long_arg(name: &str, short: &str, required: bool, default: i64) -> Argument {
        Argument::new(name, short, "", required, Value::Long(default))
    }

    #[test]
    fn split_groups_quoted_spans() {
        assert_eq!(
            split(r#"cmd --str "a b" -i 3"#),
            vec!["cmd", "--str", "a b", "-i", "3"]
        );
    }

    #[test]
    fn split_drops_empty_tokens() {
        assert_eq!(split(r#"  a   ""  b "#), vec!["a", "b"]);
        assert!(split("").is_empty());
    }

    #[test]
    fn split_ignores_unmatched_quote() {
        assert_eq!(split(r#"say "hello there"#), vec!["say", "hello", "there"]);
    }

    #[test]
    fn split_separates_quote_from_adjacent_text() {
        assert_eq!(split(r#"--str="a b" x"#), vec!["--str=", "a b", "x"]);
    }

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_name("  opt str "), "opt_str");
        let arg = Argument::new(" my arg ", " m a ", "", true, Value::Int(0));
        assert_eq!(arg.name(), "my_arg");
        assert_eq!(arg.long_prefix(), "--my_arg");
        assert_eq!(arg.short_prefix(), Some("-m_a"));
    }

    #[test]
    fn empty_short_name_has_no_short_prefix() {
        let arg = long_arg("count", "  ", true, 0);
        assert_eq!(arg.short_prefix(), None);
        assert!(!arg.matches("-c"));
        assert!(!arg.prefix_only(""));
    }

    #[test]
    fn matches_and_prefix_only() {
        let arg = long_arg("count", "c", true, 0);
        assert!(arg.matches("--count"));
        assert!(arg.matches("--count=3"));
        assert!(arg.matches("-c"));
        assert!(arg.matches("-c=3"));
        assert!(!arg.matches("count"));

        assert!(arg.prefix_only("--count"));
        assert!(arg.prefix_only("-c"));
        assert!(!arg.prefix_only("--count=3"));
    }

    #[test]
    fn parse_inline_and_bare_literals() {
        let arg = long_arg("count", "c", true, 0);
        assert_eq!(arg.parse("--count=42"), Ok(Value::Long(42)));
        assert_eq!(arg.parse("-c=7"), Ok(Value::Long(7)));
        assert_eq!(arg.parse("42"), Ok(Value::Long(42)));
    }

    #[test]
    fn parse_reports_literal_and_kind() {
        let arg = Argument::new("int", "i", "", true, Value::Int(0));
        let err = arg.parse("test").unwrap_err();
        assert_eq!(
            err,
            SyntaxError::InvalidValue {
                literal: "test".to_string(),
                kind: ValueKind::Int,
            }
        );
        assert_eq!(err.to_string(), "'test' is not a valid int");
    }

    #[test]
    fn string_argument_keeps_token() {
        let arg = Argument::new("str", "s", "", false, Value::String(String::new()));
        assert_eq!(arg.parse("--str=a=b"), Ok(Value::String("a=b".to_string())));
        assert_eq!(arg.parse("plain"), Ok(Value::String("plain".to_string())));
    }

    #[test]
    fn bool_literals_are_permissive_but_checked() {
        assert_eq!(bool::parse_literal("TRUE"), Ok(true));
        assert_eq!(bool::parse_literal("yes"), Ok(true));
        assert_eq!(bool::parse_literal("0"), Ok(false));
        assert_eq!(bool::parse_literal("Off"), Ok(false));
        assert!(bool::parse_literal("maybe").is_err());
    }

    #[test]
    fn numeric_literals_are_strict() {
        assert_eq!(i32::parse_literal("-12"), Ok(-12));
        assert!(i32::parse_literal("3000000000").is_err());
        assert_eq!(i64::parse_literal("3000000000"), Ok(3_000_000_000));
        assert!(i64::parse_literal("4.2").is_err());
        assert_eq!(f64::parse_literal("57.33"), Ok(57.33));
        assert!(f32::parse_literal("3,2").is_err());
    }

    #[test]
    fn kinds_round_trip_through_values() {
        for kind in ValueKind::ALL {
            assert_eq!(kind.fallback().kind(), kind);
        }
        assert_eq!(i64::from_value(&Value::Long(4211)), Some(4211));
        assert_eq!(i64::from_value(&Value::Int(4211)), None);
        assert_eq!(ValueKind::Double.parse("0.0112"), Ok(Value::Double(0.0112)));
    }

    #[test]
    fn short_collisions_are_detected() {
        let a = long_arg("alpha", "a", true, 0);
        let b = long_arg("another", "a", true, 0);
        let c = long_arg("count", "c", true, 0);
        assert!(a.collides_with(&b));
        assert!(!a.collides_with(&c));
    }

    #[test]
    fn optional_default_is_shown_in_help() {
        let arg = long_arg("optlong", "ol", false, 4211);
        assert_eq!(arg.default_value(), Some("4211".to_string()));
        let empty = Argument::new("s", "", "", false, Value::String(String::new()));
        assert_eq!(empty.default_value(), None);
    }

    #[test]
    fn help_lists_required_then_optional() {
        let meta = Meta {
            name: "testThree".to_string(),
            description: "Defaults and help".to_string(),
            aliases: vec!["t3".to_string(), "testThree".to_string()],
            args: vec![
                Argument::new("reqstr", "rs", "A required string", true, Value::String(String::new())),
                long_arg("optlong", "", false, 4211),
            ],
            ..Default::default()
        };
        let text = help::render(&meta);
        assert_eq!(
            text,
            "testThree: Defaults and help\n  \
             Aliases: t3\n  \
             Required Arguments:\n    \
             --reqstr [-rs] (string): A required string\n  \
             Optional Arguments:\n    \
             --optlong (long): [default: 4211]"
        );
    }

    #[test]
    fn help_header_omits_separator_without_description() {
        let mut meta = Meta {
            name: "ping".to_string(),
            ..Default::default()
        };
        assert_eq!(help::render(&meta), "ping");
        meta.description = "  Check liveness ".to_string();
        assert_eq!(help::render(&meta), "ping: Check liveness");
    }

    #[test]
    fn help_in_order_mode_has_usage_line() {
        let meta = Meta {
            name: "sum".to_string(),
            by_order: true,
            args: vec![
                Argument::new("a", "", "first", true, Value::Int(0)),
                Argument::new("b", "", "second", true, Value::Int(0)),
            ],
            ..Default::default()
        };
        let text = help::render(&meta);
        assert!(text.starts_with("sum\n  Arguments:"));
        assert!(text.contains("\n    - a (int): first"));
        assert!(text.contains("\n    - b (int): second"));
        assert!(text.ends_with("\n  Usage: sum <a> <b>"));
        assert!(!text.contains("Required Arguments"));
    }
}
