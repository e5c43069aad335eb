//! Matching command and argument tokens against a grammar.

use crate::config::{CommandSpec, FlagSpec, Grammar, ValueSpec, HELP_LONG, HELP_SHORT};
use crate::tokenizer::{tokenize, TokenizeError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors that can occur while parsing an input line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    #[error("unrecognized command: {0}")]
    UnrecognizedCommand(String),

    #[error("unsupported flag {0}")]
    UnsupportedFlag(String),

    #[error("expected a value after flag {0}")]
    MissingFlagValue(String),

    #[error("invalid value '{value}' after flag {flag}")]
    InvalidFlagValue { flag: String, value: String },

    #[error("invalid argument '{value}': {reason}")]
    InvalidValue {
        value: String,
        reason: ValueRejection,
    },

    #[error("flag {flag} in group {group} takes a value and cannot be grouped")]
    GroupedKeyedFlag { flag: String, group: String },
}

/// Why a positional token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRejection {
    /// The token failed the rule of the slot at this index.
    NotAccepted(usize),
    /// Every declared slot is already filled.
    NoSlotRemaining,
}

impl fmt::Display for ValueRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRejection::NotAccepted(slot) => write!(f, "not accepted by value slot {}", slot),
            ValueRejection::NoSlotRemaining => f.write_str("no value slot remains"),
        }
    }
}

/// A flag found in the input, with its value when keyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedFlag {
    pub short: char,
    pub long: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl MatchedFlag {
    fn is(&self, key: &str) -> bool {
        self.long == key || key.chars().eq(std::iter::once(self.short))
    }
}

/// A successfully parsed invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedInput {
    /// Canonical command name (never the alias)
    pub command: String,
    /// Flags in consumption order
    pub flags: Vec<MatchedFlag>,
    /// Positional values in consumption order
    pub values: Vec<String>,
}

impl ParsedInput {
    fn find(&self, key: &str) -> Option<&MatchedFlag> {
        self.flags.iter().find(|f| f.is(key))
    }

    /// Whether the flag appears, by short (`"v"`) or long (`"verbose"`) identifier.
    pub fn has_flag(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Whether the flag appears and carries a value.
    pub fn has_flag_with_value(&self, key: &str) -> bool {
        self.flag_value(key).is_some()
    }

    /// The value of the first occurrence of a keyed flag.
    pub fn flag_value(&self, key: &str) -> Option<&str> {
        self.find(key).and_then(|f| f.value.as_deref())
    }

    /// Values of every occurrence of a keyed flag, in order.
    pub fn flag_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.flags
            .iter()
            .filter(move |f| f.is(key))
            .filter_map(|f| f.value.as_deref())
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Outcome of parsing an input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The input matched the grammar.
    Success(ParsedInput),
    /// `-h` or `--help` was given for this command.
    Help(String),
}

/// Tokenize a raw line and match it against the grammar.
pub fn parse_line(grammar: &Grammar, raw: &str) -> Result<ParseOutcome, ParseError> {
    let input = tokenize(raw)?;
    match_tokens(grammar, input.command, &input.args)
}

/// Match already split, argv-style arguments against the grammar.
pub fn parse_args<S: AsRef<str>>(
    grammar: &Grammar,
    command: &str,
    args: &[S],
) -> Result<ParseOutcome, ParseError> {
    match_tokens(grammar, command, args)
}

/// Match a command token and its arguments against the grammar.
///
/// Returns `ParseOutcome::Help` as soon as `-h` or `--help` is reached.
/// Otherwise every argument must be a declared flag, the value of the keyed
/// flag before it, or a value accepted by the next unfilled positional slot.
pub fn match_tokens<S: AsRef<str>>(
    grammar: &Grammar,
    command: &str,
    args: &[S],
) -> Result<ParseOutcome, ParseError> {
    let spec = grammar
        .find_command(command)
        .ok_or_else(|| ParseError::UnrecognizedCommand(command.to_string()))?;

    debug!(command = %spec.name, args = args.len(), "matching input");
    Matcher::new(spec).run(args)
}

fn is_help(arg: &str) -> bool {
    if let Some(long) = arg.strip_prefix("--") {
        return long == HELP_LONG;
    }
    let mut chars = arg.chars();
    chars.next() == Some('-') && chars.next() == Some(HELP_SHORT) && chars.next().is_none()
}

/// Internal matcher state.
struct Matcher<'g> {
    spec: &'g CommandSpec,
    parsed: ParsedInput,
    slot: usize,
}

impl<'g> Matcher<'g> {
    fn new(spec: &'g CommandSpec) -> Self {
        Self {
            spec,
            parsed: ParsedInput {
                command: spec.name.clone(),
                ..ParsedInput::default()
            },
            slot: 0,
        }
    }

    fn run<S: AsRef<str>>(mut self, args: &[S]) -> Result<ParseOutcome, ParseError> {
        let spec = self.spec;
        let mut args_iter = args.iter().map(<S as AsRef<str>>::as_ref);

        while let Some(arg) = args_iter.next() {
            if is_help(arg) {
                debug!(command = %spec.name, "help requested");
                return Ok(ParseOutcome::Help(spec.name.clone()));
            }

            if let Some(long) = arg.strip_prefix("--") {
                let flag = spec
                    .find_long(long)
                    .ok_or_else(|| ParseError::UnsupportedFlag(arg.to_string()))?;
                self.take_flag(flag, arg, &mut args_iter)?;
            } else if let Some(shorts) = arg.strip_prefix('-') {
                self.parse_short_flags(arg, shorts, &mut args_iter)?;
            } else {
                self.parse_positional(arg)?;
            }
        }

        trace!(parsed = ?self.parsed, "matched input");
        Ok(ParseOutcome::Success(self.parsed))
    }

    fn parse_short_flags<'a>(
        &mut self,
        arg: &str,
        shorts: &str,
        args_iter: &mut impl Iterator<Item = &'a str>,
    ) -> Result<(), ParseError> {
        let spec = self.spec;
        let mut chars = shorts.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Err(ParseError::UnsupportedFlag(arg.to_string())),
            (Some(c), None) => {
                let flag = spec
                    .find_short(c)
                    .ok_or_else(|| ParseError::UnsupportedFlag(arg.to_string()))?;
                self.take_flag(flag, arg, args_iter)
            }
            _ => self.parse_group(arg, shorts),
        }
    }

    /// Resolve a group such as `-abc`: each member must be a flag without a value.
    fn parse_group(&mut self, arg: &str, shorts: &str) -> Result<(), ParseError> {
        let spec = self.spec;
        for c in shorts.chars() {
            let flag = spec
                .find_short(c)
                .ok_or_else(|| ParseError::UnsupportedFlag(format!("-{}", c)))?;
            if flag.is_keyed() {
                return Err(ParseError::GroupedKeyedFlag {
                    flag: format!("-{}", c),
                    group: arg.to_string(),
                });
            }
            self.push_flag(flag, None);
        }
        Ok(())
    }

    /// Record a flag, consuming the next token as its value when keyed.
    fn take_flag<'a>(
        &mut self,
        flag: &FlagSpec,
        arg: &str,
        args_iter: &mut impl Iterator<Item = &'a str>,
    ) -> Result<(), ParseError> {
        let Some(ref value_spec) = flag.value else {
            self.push_flag(flag, None);
            return Ok(());
        };

        let value = args_iter
            .next()
            .ok_or_else(|| ParseError::MissingFlagValue(arg.to_string()))?;
        if !value_spec.accepts.accepts(value) {
            return Err(ParseError::InvalidFlagValue {
                flag: arg.to_string(),
                value: value.to_string(),
            });
        }
        self.push_flag(flag, Some(value));
        Ok(())
    }

    fn push_flag(&mut self, flag: &FlagSpec, value: Option<&str>) {
        trace!(flag = %flag.long, value = ?value, "matched flag");
        self.parsed.flags.push(MatchedFlag {
            short: flag.short,
            long: flag.long.clone(),
            value: value.map(str::to_string),
        });
    }

    fn parse_positional(&mut self, arg: &str) -> Result<(), ParseError> {
        let slot: &ValueSpec = self
            .spec
            .values
            .get(self.slot)
            .ok_or_else(|| ParseError::InvalidValue {
                value: arg.to_string(),
                reason: ValueRejection::NoSlotRemaining,
            })?;

        if !slot.accepts.accepts(arg) {
            return Err(ParseError::InvalidValue {
                value: arg.to_string(),
                reason: ValueRejection::NotAccepted(self.slot),
            });
        }

        self.parsed.values.push(arg.to_string());
        // An array slot stays open for every remaining value.
        if !slot.array {
            self.slot += 1;
        }

        Ok(())
    }
}
