//! Splitting a raw input line into a command token and argument tokens.

use thiserror::Error;
use tracing::trace;

/// Errors that can occur while tokenizing a raw line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("no input provided")]
    EmptyInput,

    #[error("unterminated {quote} quote starting at byte {offset}")]
    UnterminatedQuote { quote: char, offset: usize },
}

/// A raw line split into its command and the ordered argument tokens.
///
/// Tokens borrow from the input; quoted tokens are the text between the quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedInput<'a> {
    pub command: &'a str,
    pub args: Vec<&'a str>,
}

/// Tokenize a raw line.
///
/// Whitespace separates tokens. A token starting with `"` or `'` runs to the
/// next identical quote and keeps any whitespace inside it; the other quote
/// kind is literal there. A bare token runs to the next whitespace and keeps
/// quote characters verbatim.
pub fn tokenize(raw: &str) -> Result<TokenizedInput<'_>, TokenizeError> {
    let mut tokens = Tokens { raw, pos: 0 };
    let command = tokens.next().ok_or(TokenizeError::EmptyInput)??;
    let args = tokens.collect::<Result<Vec<_>, _>>()?;

    trace!(command = %command, args = ?args, "tokenized input");
    Ok(TokenizedInput { command, args })
}

/// Iterator over the tokens of a raw line.
struct Tokens<'a> {
    raw: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn skip_whitespace(&mut self) {
        let rest = &self.raw[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    fn quoted(&mut self, quote: char) -> Result<&'a str, TokenizeError> {
        let start = self.pos + quote.len_utf8();
        match self.raw[start..].find(quote) {
            Some(len) => {
                self.pos = start + len + quote.len_utf8();
                Ok(&self.raw[start..start + len])
            }
            None => {
                let offset = self.pos;
                // Nothing after an unterminated quote is tokenized.
                self.pos = self.raw.len();
                Err(TokenizeError::UnterminatedQuote { quote, offset })
            }
        }
    }

    fn bare(&mut self) -> &'a str {
        let start = self.pos;
        let len = self.raw[start..]
            .find(char::is_whitespace)
            .unwrap_or(self.raw.len() - start);
        self.pos = start + len;
        &self.raw[start..start + len]
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Result<&'a str, TokenizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let c = self.raw[self.pos..].chars().next()?;
        Some(match c {
            '"' | '\'' => self.quoted(c),
            _ => Ok(self.bare()),
        })
    }
}
