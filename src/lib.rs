//! argline - grammar-driven command line parsing.
//!
//! This library tokenizes a raw input line, matches it against a grammar
//! of commands, flags and positional values, and returns either the
//! validated invocation, a help request, or a classified error.

pub mod config;
pub mod help;
pub mod parser;
pub mod tokenizer;

pub use config::{Accepts, CommandSpec, ConfigError, FlagSpec, Grammar, ValueSpec};
pub use help::{generate_help, generate_overview};
pub use parser::{
    match_tokens, parse_args, parse_line, MatchedFlag, ParseError, ParseOutcome, ParsedInput,
    ValueRejection,
};
pub use tokenizer::{tokenize, TokenizeError, TokenizedInput};
