//! Command-line parsing and tab completion.
//!
//! Input is tokenized with shell-like quoting and walked through a chain of
//! token completers, one grammar position at a time. The same chain answers
//! both "does this line parse, and into what" ([`TabCompleter::parse`]) and
//! "what could the token under the cursor become"
//! ([`TabCompleter::auto_complete`]).

pub mod completer;
mod tabcomplete;

use std::collections::HashMap;
use std::sync::Arc;

use ratatui::style::Color;
use thiserror::Error;

use crate::commands::Command;

pub use completer::{
    AnythingCompleter, BoolTokenCompleter, ColorTokenCompleter, CommandTokenCompleter,
    Completions, FileTokenCompleter, MatchOutcome, Next, StaticTokenCompleter, Suggestion,
    TokenCompleter,
};
pub use tabcomplete::{AcceptSource, Accepted, TabCompleter};

/// A typed value written into the context by a completer.
#[derive(Debug, Clone, PartialEq)]
pub enum CtxValue {
    Bool(bool),
    Str(String),
    Color(Color),
}

impl std::fmt::Display for CtxValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CtxValue::Bool(b) => write!(f, "{b}"),
            CtxValue::Str(s) => write!(f, "{s}"),
            CtxValue::Color(c) => write!(f, "{}", completer::color_name(*c)),
        }
    }
}

/// Scratch state built up while walking the completer chain: the raw input
/// line, the resolved command, and per-token typed values keyed by the
/// completer that wrote them ("setting", "value", "file", "url", ...).
///
/// Created fresh per parse or completion pass and discarded after dispatch.
#[derive(Default)]
pub struct CommandContext {
    pub raw: String,
    command: Option<Arc<dyn Command>>,
    values: HashMap<String, CtxValue>,
}

impl CommandContext {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            command: None,
            values: HashMap::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: CtxValue) {
        let _ = self.values.insert(key.to_string(), value);
    }

    /// Append a token to a string value, space-separated. Used by the
    /// accumulating [`AnythingCompleter`]; every other completer writes its
    /// key once per parse.
    pub fn append_str(&mut self, key: &str, token: &str) {
        match self.values.get_mut(key) {
            Some(CtxValue::Str(existing)) => {
                existing.push(' ');
                existing.push_str(token);
            }
            _ => self.set(key, CtxValue::Str(token.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CtxValue> {
        self.values.get(key)
    }

    pub fn str_value(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(CtxValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn bool_value(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(CtxValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn color_value(&self, key: &str) -> Option<Color> {
        match self.values.get(key) {
            Some(CtxValue::Color(c)) => Some(*c),
            _ => None,
        }
    }

    pub fn set_command(&mut self, command: Arc<dyn Command>) {
        self.command = Some(command);
    }

    pub fn command(&self) -> Option<Arc<dyn Command>> {
        self.command.clone()
    }
}

/// Why a line failed to parse. Callers must not conflate the two: empty
/// input is silently ignored, an unmatched token is rendered as an error.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("empty input")]
    EmptyInput,
    #[error("no command matches `{token}`")]
    NoMatch { token: String },
}
