//! Grammar definitions: commands, their flags and positional value slots.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Short and long identifiers reserved for help requests.
pub const HELP_SHORT: char = 'h';
pub const HELP_LONG: &str = "help";

/// Errors that can occur while loading or validating a grammar.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse JSON grammar: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("failed to read grammar file {path}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("duplicate command name or alias: {0}")]
    DuplicateCommand(String),

    #[error("invalid short flag '{0}' on command '{1}': must be a single ASCII letter or digit")]
    InvalidShortFlag(char, String),

    #[error("invalid long flag '{0}' on command '{1}': must be a non-empty word")]
    InvalidLongFlag(String, String),

    #[error("duplicate flag '{0}' on command '{1}'")]
    DuplicateFlag(String, String),

    #[error("flag '{0}' on command '{1}' shadows the reserved help flag")]
    ReservedFlag(String, String),

    #[error("'accepts' on {0} is empty: must have at least one allowed value")]
    EmptyChoices(String),

    #[error("'accepts' on {0} has duplicate value: {1}")]
    DuplicateChoice(String, String),

    #[error("array value slot {0} on command '{1}' must be the last declared slot")]
    ArraySlotNotLast(usize, String),

    #[error("value of flag '--{0}' on command '{1}' cannot be an array")]
    ArrayFlagValue(String, String),
}

/// The rule a value token must satisfy.
///
/// Either form requires the whole token to match, case-sensitively.
#[derive(Debug, Clone)]
pub enum Accepts {
    /// Exact membership in a set of allowed strings.
    OneOf(Vec<String>),
    /// Full-string match against a regular expression.
    Pattern(Pattern),
}

/// A compiled pattern that only matches an entire token.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, ConfigError> {
        let regex =
            Regex::new(&format!("^(?:{})$", source)).map_err(|e| ConfigError::InvalidPattern {
                pattern: source.to_string(),
                source: e,
            })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The pattern as written in the grammar.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, token: &str) -> bool {
        self.regex.is_match(token)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl PartialEq for Accepts {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Accepts::OneOf(a), Accepts::OneOf(b)) => a == b,
            (Accepts::Pattern(a), Accepts::Pattern(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Accepts {}

impl Accepts {
    /// Build an enumerated-set rule.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Accepts::OneOf(values.into_iter().map(Into::into).collect())
    }

    /// Build a pattern rule, compiling it immediately.
    pub fn pattern(source: &str) -> Result<Self, ConfigError> {
        Pattern::new(source).map(Accepts::Pattern)
    }

    /// Check whether a token satisfies this rule.
    pub fn accepts(&self, token: &str) -> bool {
        match self {
            Accepts::OneOf(values) => values.iter().any(|v| v == token),
            Accepts::Pattern(pattern) => pattern.is_match(token),
        }
    }
}

impl fmt::Display for Accepts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accepts::OneOf(values) => write!(f, "one of: {}", values.join(", ")),
            Accepts::Pattern(pattern) => write!(f, "matching /{}/", pattern.as_str()),
        }
    }
}

/// `accepts` is either a list of allowed strings or a pattern string.
impl<'de> Deserialize<'de> for Accepts {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, SeqAccess, Visitor};

        struct AcceptsVisitor;

        impl<'de> Visitor<'de> for AcceptsVisitor {
            type Value = Accepts;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a list of allowed values or a pattern string")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(value) = seq.next_element::<String>()? {
                    values.push(value);
                }
                Ok(Accepts::OneOf(values))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Accepts::pattern(value).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(AcceptsVisitor)
    }
}

/// A value slot: positional, or the value consumed by a keyed flag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValueSpec {
    /// Display name for help output
    pub name: Option<String>,
    /// The acceptance rule for tokens in this slot
    pub accepts: Accepts,
    /// Whether the slot takes every remaining positional token
    #[serde(default)]
    pub array: bool,
    pub description: Option<String>,
    /// Human readable form of a pattern rule
    pub accepts_description: Option<String>,
}

impl ValueSpec {
    pub fn new(accepts: Accepts) -> Self {
        Self {
            name: None,
            accepts,
            array: false,
            description: None,
            accepts_description: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }
}

/// A flag accepted by a command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlagSpec {
    /// Short identifier (e.g., 'v' for -v)
    pub short: char,
    /// Long identifier (e.g., "verbose" for --verbose)
    pub long: String,
    pub description: Option<String>,
    /// The value a keyed flag consumes from the following token
    pub value: Option<ValueSpec>,
}

impl FlagSpec {
    /// A flag that takes no value.
    pub fn switch(short: char, long: &str) -> Self {
        Self {
            short,
            long: long.to_string(),
            description: None,
            value: None,
        }
    }

    /// A flag that consumes the following token as its value.
    pub fn keyed(short: char, long: &str, value: ValueSpec) -> Self {
        Self {
            value: Some(value),
            ..Self::switch(short, long)
        }
    }

    pub fn is_keyed(&self) -> bool {
        self.value.is_some()
    }
}

/// A command and everything it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    /// Alternative (usually shorter) name for the command
    pub alias: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub flags: Vec<FlagSpec>,
    /// Positional value slots, filled in declaration order
    #[serde(default)]
    pub values: Vec<ValueSpec>,
    /// Example invocations shown in help
    #[serde(default)]
    pub examples: Vec<String>,
}

impl CommandSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            alias: None,
            description: None,
            flags: Vec::new(),
            values: Vec::new(),
            examples: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn flag(mut self, flag: FlagSpec) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn value(mut self, value: ValueSpec) -> Self {
        self.values.push(value);
        self
    }

    /// Whether a command token names this command.
    pub fn matches(&self, token: &str) -> bool {
        self.name == token || self.alias.as_deref() == Some(token)
    }

    pub fn find_short(&self, short: char) -> Option<&FlagSpec> {
        self.flags.iter().find(|f| f.short == short)
    }

    pub fn find_long(&self, long: &str) -> Option<&FlagSpec> {
        self.flags.iter().find(|f| f.long == long)
    }
}

/// The full set of commands a parser understands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Grammar {
    /// Program name used in help output
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

impl Grammar {
    pub fn new(commands: Vec<CommandSpec>) -> Self {
        Self {
            commands,
            ..Self::default()
        }
    }

    /// Parse a JSON string into a Grammar.
    pub fn from_json(json: &str) -> Result<Grammar, ConfigError> {
        let grammar: Grammar = serde_json::from_str(json)?;
        Ok(grammar)
    }

    /// Read and parse a JSON grammar file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Grammar, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Look up a command by name or alias.
    pub fn find_command(&self, token: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|c| c.matches(token))
    }

    /// Effective program name for help output.
    pub fn effective_name(&self) -> &str {
        self.name.as_deref().unwrap_or("commands")
    }

    /// Validate the grammar.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut command_names = HashSet::new();

        for command in &self.commands {
            for name in std::iter::once(&command.name).chain(&command.alias) {
                if !command_names.insert(name.as_str()) {
                    return Err(ConfigError::DuplicateCommand(name.clone()));
                }
            }
            Self::validate_command(command)?;
        }

        Ok(())
    }

    fn validate_command(command: &CommandSpec) -> Result<(), ConfigError> {
        let mut shorts = HashSet::new();
        let mut longs = HashSet::new();

        for flag in &command.flags {
            if !flag.short.is_ascii_alphanumeric() {
                return Err(ConfigError::InvalidShortFlag(
                    flag.short,
                    command.name.clone(),
                ));
            }
            if flag.long.is_empty()
                || flag.long.starts_with('-')
                || flag.long.chars().any(char::is_whitespace)
            {
                return Err(ConfigError::InvalidLongFlag(
                    flag.long.clone(),
                    command.name.clone(),
                ));
            }
            if flag.short == HELP_SHORT {
                return Err(ConfigError::ReservedFlag(
                    format!("-{}", flag.short),
                    command.name.clone(),
                ));
            }
            if flag.long == HELP_LONG {
                return Err(ConfigError::ReservedFlag(
                    format!("--{}", flag.long),
                    command.name.clone(),
                ));
            }
            if !shorts.insert(flag.short) {
                return Err(ConfigError::DuplicateFlag(
                    format!("-{}", flag.short),
                    command.name.clone(),
                ));
            }
            if !longs.insert(flag.long.as_str()) {
                return Err(ConfigError::DuplicateFlag(
                    format!("--{}", flag.long),
                    command.name.clone(),
                ));
            }

            if let Some(ref value) = flag.value {
                if value.array {
                    return Err(ConfigError::ArrayFlagValue(
                        flag.long.clone(),
                        command.name.clone(),
                    ));
                }
                Self::validate_accepts(
                    &value.accepts,
                    &format!("flag '--{}' of command '{}'", flag.long, command.name),
                )?;
            }
        }

        let last = command.values.len().saturating_sub(1);
        for (index, value) in command.values.iter().enumerate() {
            if value.array && index != last {
                return Err(ConfigError::ArraySlotNotLast(index, command.name.clone()));
            }
            Self::validate_accepts(
                &value.accepts,
                &format!("value slot {} of command '{}'", index, command.name),
            )?;
        }

        Ok(())
    }

    /// Validate an enumerated set; patterns are checked when compiled.
    fn validate_accepts(accepts: &Accepts, owner: &str) -> Result<(), ConfigError> {
        if let Accepts::OneOf(values) = accepts {
            if values.is_empty() {
                return Err(ConfigError::EmptyChoices(owner.to_string()));
            }

            let mut seen = HashSet::new();
            for value in values {
                if !seen.insert(value) {
                    return Err(ConfigError::DuplicateChoice(
                        owner.to_string(),
                        value.clone(),
                    ));
                }
            }
        }
        Ok(())
    }
}
