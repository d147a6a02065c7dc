//! The parser/completion driver walking the completer chain.

use std::sync::Arc;

use crate::cmdinput::completer::{
    CommandTokenCompleter, Completions, Next, TokenCompleter,
};
use crate::cmdinput::{CommandContext, ParseError};
use crate::commands::Command;

/// How the user picked a suggestion from the drop-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptSource {
    /// Arrow-key navigation inside the list; the input line is not changed.
    Navigate,
    Tab,
    Enter,
}

/// Result of committing a suggestion into the input line.
#[derive(Debug, PartialEq)]
pub struct Accepted {
    pub close_menu: bool,
    pub text: String,
    pub cursor: usize,
}

/// State captured by the last `auto_complete` pass so a later "suggestion
/// picked" event can replace exactly the completing token's span.
#[derive(Debug, Clone)]
struct CompletionState {
    raw: String,
    cursor: usize,
    tokens: Vec<String>,
}

/// Owns the root command completer and drives parsing and completion over
/// tokenized input. Lives on the UI task; registry mutation and lookups are
/// never concurrent.
pub struct TabCompleter {
    root: CommandTokenCompleter,
    state: Option<CompletionState>,
}

impl TabCompleter {
    pub fn new() -> Self {
        Self {
            root: CommandTokenCompleter::new('/'),
            state: None,
        }
    }

    pub fn register_command(&mut self, name: &str, command: Arc<dyn Command>) {
        self.root.register(name, command);
    }

    /// Dispatch unknown, unprefixed input to `command` with the whole line
    /// accumulated under `context_key`.
    pub fn set_fallback(&mut self, command: Arc<dyn Command>, context_key: &str) {
        self.root.set_fallback(command, context_key);
    }

    /// Registered commands in lexicographic order, as (name, help) pairs.
    pub fn commands(&self) -> impl Iterator<Item = (&str, &str)> {
        self.root.commands()
    }

    /// Parse a submitted line into `ctx`. On success the context holds the
    /// resolved command and every typed value the chain wrote.
    pub fn parse(&self, line: &str, ctx: &mut CommandContext) -> Result<(), ParseError> {
        let tokens = shell_words::split(line).map_err(|_| ParseError::NoMatch {
            token: line.to_string(),
        })?;
        if tokens.is_empty() {
            return Err(ParseError::EmptyInput);
        }

        let mut owned: Option<Arc<dyn TokenCompleter>> = None;
        for token in &tokens {
            let current: &dyn TokenCompleter = match owned.as_deref() {
                Some(completer) => completer,
                None => &self.root,
            };
            match current.match_token(token, ctx) {
                None => {
                    return Err(ParseError::NoMatch {
                        token: token.clone(),
                    })
                }
                Some(outcome) => match outcome.next {
                    // Terminal position: trailing tokens are accepted
                    // unvalidated (e.g. /rpc's JSON payload).
                    Next::Done => break,
                    Next::SelfLoop => {}
                    Next::To(completer) => owned = Some(completer),
                },
            }
        }
        Ok(())
    }

    /// Complete the token under the cursor. Returns the candidates and the
    /// byte offset in `text` where that token begins (where the menu should
    /// be anchored).
    ///
    /// When the token already equals a candidate, only the exact candidates
    /// are returned, so committing a suggestion and completing again does
    /// not re-offer the token as still-incomplete.
    pub fn auto_complete(
        &mut self,
        text: &str,
        cursor: usize,
        ctx: &mut CommandContext,
    ) -> (Completions, usize) {
        self.state = None;
        let cursor = cursor.min(text.len());
        let in_text = &text[..cursor];
        let Ok(mut tokens) = shell_words::split(in_text) else {
            return (Completions::empty(), 0);
        };
        if tokens.is_empty() {
            return (Completions::empty(), 0);
        }
        // A trailing space means the user is starting the next token.
        if in_text.ends_with(' ') {
            tokens.push(String::new());
        }

        self.state = Some(CompletionState {
            raw: text.to_string(),
            cursor,
            tokens: tokens.clone(),
        });

        let last_idx = tokens.len() - 1;
        let mut owned: Option<Arc<dyn TokenCompleter>> = None;
        for token in &tokens[..last_idx] {
            let current: &dyn TokenCompleter = match owned.as_deref() {
                Some(completer) => completer,
                None => &self.root,
            };
            match current.match_token(token, ctx) {
                // Earlier tokens do not parse; nothing sensible to offer.
                None => return (Completions::empty(), 0),
                Some(outcome) => match outcome.next {
                    Next::Done => return (Completions::empty(), 0),
                    Next::SelfLoop => {}
                    Next::To(completer) => owned = Some(completer),
                },
            }
        }

        let completer: &dyn TokenCompleter = match owned.as_deref() {
            Some(completer) => completer,
            None => &self.root,
        };
        let last = &tokens[last_idx];
        let mut completions = completer.complete(last, ctx);
        if completions.exact {
            completions
                .suggestions
                .retain(|s| s.text.eq_ignore_ascii_case(last));
        }
        let offset = last_token_start(in_text, last);
        (completions, offset)
    }

    /// Commit a picked suggestion into the line recorded by the last
    /// `auto_complete` pass, replacing only the completing token's span.
    pub fn on_auto_completed(&self, picked: &str, source: AcceptSource) -> Option<Accepted> {
        let state = self.state.as_ref()?;
        if source == AcceptSource::Navigate {
            return Some(Accepted {
                close_menu: false,
                text: state.raw.clone(),
                cursor: state.cursor,
            });
        }

        let in_text = &state.raw[..state.cursor];
        let after = &state.raw[state.cursor..];
        let last = state.tokens.last()?;
        let pre_len = last_token_start(in_text, last);
        let pre = &in_text[..pre_len];
        Some(Accepted {
            close_menu: true,
            cursor: pre.len() + picked.len(),
            text: format!("{pre}{picked}{after}"),
        })
    }
}

impl Default for TabCompleter {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte offset where the last token starts. Tokens come back from the
/// tokenizer unquoted, so fall back to the cursor when the text cannot be
/// searched (e.g. the token was quoted).
fn last_token_start(in_text: &str, token: &str) -> usize {
    if token.is_empty() {
        return in_text.len();
    }
    in_text.rfind(token).unwrap_or(in_text.len())
}
