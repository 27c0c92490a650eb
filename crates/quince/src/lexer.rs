//! The regex tokenizer.
//!
//! Patterns are matched anchored at the start of the remaining input, in
//! registration order, so the first registered pattern that matches wins.
//! Tokens are assumed to stay on one line and contain no whitespace; the
//! position arithmetic of error reporting relies on both.

use regex::Regex;
use std::fmt;

/// A `(name, value)` pair. The name ties the token to the grammar terminal
/// with the same signature; the reserved name `$` marks the end of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub name: String,
    pub value: String,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.name, self.value)
    }
}

#[derive(Debug)]
struct Pattern {
    name: String,
    regex: Regex,
}

#[derive(Debug, thiserror::Error)]
pub enum LexerError {
    #[error("invalid pattern `{name}`")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// A tokenizer over an in-memory source string.
#[derive(Debug)]
pub struct RegexLexer {
    patterns: Vec<Pattern>,
    input: String,
    pos: usize,
    line: usize,
    column: usize,
}

impl RegexLexer {
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
            input: String::new(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Register a pattern under `name`. The first registration of a name
    /// wins; later registrations of the same name are ignored.
    pub fn add_pattern(&mut self, name: impl Into<String>, pattern: &str) -> Result<(), LexerError> {
        let name = name.into();
        if self.patterns.iter().any(|p| p.name == name) {
            return Ok(());
        }
        let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|source| {
            LexerError::InvalidPattern {
                name: name.clone(),
                source,
            }
        })?;
        self.patterns.push(Pattern { name, regex });
        Ok(())
    }

    /// Install a source string, resetting the position to line 1, column 1.
    pub fn set_input(&mut self, input: &str) {
        self.input = input.to_owned();
        self.pos = 0;
        self.line = 1;
        self.column = 1;
    }

    /// 1-based line and column, pointing one past the last matched token.
    pub fn current_position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    /// The next token, or `{"$", ""}` at the end of input. Whitespace is
    /// skipped; input no pattern matches is skipped as well, leaving the
    /// column untouched so errors still point at the last good token.
    pub fn next_token(&mut self) -> Token {
        while self.pos < self.input.len() {
            let rest = &self.input[self.pos..];
            let ch = rest.chars().next().unwrap();

            match ch {
                '\n' => {
                    self.pos += 1;
                    self.line += 1;
                    self.column = 1;
                    continue;
                }
                ' ' | '\t' | '\r' => {
                    self.pos += ch.len_utf8();
                    self.column += 1;
                    continue;
                }
                _ => {}
            }

            let matched = self
                .patterns
                .iter()
                .find_map(|p| p.regex.find(rest).map(|m| (p.name.clone(), m.as_str())));
            match matched {
                Some((name, value)) => {
                    self.pos += value.len();
                    self.column += value.chars().count();
                    return Token {
                        name,
                        value: value.to_owned(),
                    };
                }
                None => {
                    self.pos += ch.len_utf8();
                }
            }
        }

        Token {
            name: "$".to_owned(),
            value: String::new(),
        }
    }
}

impl Default for RegexLexer {
    fn default() -> Self {
        Self::new()
    }
}
