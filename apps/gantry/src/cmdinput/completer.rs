//! Token completer strategies.
//!
//! Each completer consumes exactly one token. `match_token` validates it,
//! may write a typed value into the context, and names the completer for the
//! next grammar position; `complete` is read-only and produces suggestions
//! for a partial token.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use ratatui::style::Color;

use crate::cmdinput::{CommandContext, CtxValue};
use crate::commands::Command;

/// One completion candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub text: String,
    pub help: String,
}

impl Suggestion {
    pub fn new(text: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            help: help.into(),
        }
    }
}

/// Result of a completion query: candidates whose key case-insensitively
/// starts with the partial token, sorted lexicographically. `exact` is true
/// iff some candidate equals the partial token case-insensitively.
#[derive(Debug, Default)]
pub struct Completions {
    pub suggestions: Vec<Suggestion>,
    pub exact: bool,
}

impl Completions {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }
}

/// Where the chain goes after a matched token.
#[derive(Clone)]
pub enum Next {
    /// Terminal position; trailing tokens are accepted unvalidated.
    Done,
    /// The same completer consumes the following token too. This is how the
    /// accumulating [`AnythingCompleter`] loops without an ownership cycle.
    SelfLoop,
    /// Hand the next token to this completer.
    To(Arc<dyn TokenCompleter>),
}

/// A successful single-token match.
pub struct MatchOutcome {
    /// The token in the registry's canonical casing.
    pub normalized: String,
    pub next: Next,
}

pub trait TokenCompleter: Send + Sync {
    /// Consume one token. `None` means the token does not fit this grammar
    /// position. A successful match may write context values.
    fn match_token(&self, token: &str, ctx: &mut CommandContext) -> Option<MatchOutcome>;

    /// Suggest completions for a partial token. Never mutates the context.
    fn complete(&self, partial: &str, ctx: &CommandContext) -> Completions;
}

fn prefix_candidates<'a, I>(partial: &str, candidates: I) -> Completions
where
    I: Iterator<Item = (&'a str, &'a str)>,
{
    let partial_lower = partial.to_lowercase();
    let mut suggestions = Vec::new();
    let mut exact = false;
    for (text, help) in candidates {
        let lower = text.to_lowercase();
        if lower.starts_with(&partial_lower) {
            if lower == partial_lower {
                exact = true;
            }
            suggestions.push(Suggestion::new(text, help));
        }
    }
    suggestions.sort_by(|a, b| a.text.to_lowercase().cmp(&b.text.to_lowercase()));
    Completions { suggestions, exact }
}

struct RegisteredCommand {
    canonical: String,
    command: Arc<dyn Command>,
}

struct Fallback {
    command: Arc<dyn Command>,
    completer: Arc<AnythingCompleter>,
}

/// The root of the chain: resolves the first token against the command
/// registry. The registry is mutable at runtime (G-code commands are
/// registered from server help text) and is only touched from the UI task.
///
/// Unknown tokens that do not carry the command prefix fall back to a
/// self-looping anything completer, so an open-ended command set coexists
/// with literal passthrough of raw machine-control script.
pub struct CommandTokenCompleter {
    prefix: char,
    registry: BTreeMap<String, RegisteredCommand>,
    fallback: Option<Fallback>,
}

impl CommandTokenCompleter {
    pub fn new(prefix: char) -> Self {
        Self {
            prefix,
            registry: BTreeMap::new(),
            fallback: None,
        }
    }

    /// Route unknown, unprefixed tokens to `command`, accumulating the whole
    /// line under `context_key`.
    pub fn set_fallback(&mut self, command: Arc<dyn Command>, context_key: &str) {
        self.fallback = Some(Fallback {
            command,
            completer: Arc::new(AnythingCompleter::new(context_key)),
        });
    }

    /// Register a command under `name`. Re-registration replaces the old
    /// entry; the latest registration wins.
    pub fn register(&mut self, name: &str, command: Arc<dyn Command>) {
        let key = name.to_lowercase();
        if self.registry.contains_key(&key) {
            tracing::debug!(name, "replacing registered command");
        }
        let _ = self.registry.insert(
            key,
            RegisteredCommand {
                canonical: name.to_string(),
                command,
            },
        );
    }

    /// Registered commands in lexicographic order, as (name, help) pairs.
    pub fn commands(&self) -> impl Iterator<Item = (&str, &str)> {
        self.registry
            .values()
            .map(|entry| (entry.canonical.as_str(), entry.command.help()))
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

impl TokenCompleter for CommandTokenCompleter {
    fn match_token(&self, token: &str, ctx: &mut CommandContext) -> Option<MatchOutcome> {
        if let Some(entry) = self.registry.get(&token.to_lowercase()) {
            ctx.set_command(entry.command.clone());
            let next = match entry.command.completer(ctx) {
                Some(completer) => Next::To(completer),
                None => Next::Done,
            };
            return Some(MatchOutcome {
                normalized: entry.canonical.clone(),
                next,
            });
        }
        if !token.starts_with(self.prefix) {
            if let Some(fallback) = &self.fallback {
                ctx.set_command(fallback.command.clone());
                let outcome = fallback.completer.match_token(token, ctx)?;
                return Some(MatchOutcome {
                    normalized: outcome.normalized,
                    next: Next::To(fallback.completer.clone()),
                });
            }
        }
        None
    }

    fn complete(&self, partial: &str, _ctx: &CommandContext) -> Completions {
        prefix_candidates(
            partial,
            self.registry
                .values()
                .map(|entry| (entry.canonical.as_str(), entry.command.help())),
        )
    }
}

/// Exact case-insensitive lookup in a fixed child map, e.g. settings keys or
/// the known RPC method table.
pub struct StaticTokenCompleter {
    context_key: String,
    entries: BTreeMap<String, StaticEntry>,
}

struct StaticEntry {
    canonical: String,
    help: String,
    next: Next,
}

impl StaticTokenCompleter {
    pub fn new(context_key: impl Into<String>) -> Self {
        Self {
            context_key: context_key.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, next: Next) {
        self.insert_with_help(name, "", next);
    }

    pub fn insert_with_help(&mut self, name: &str, help: &str, next: Next) {
        let _ = self.entries.insert(
            name.to_lowercase(),
            StaticEntry {
                canonical: name.to_string(),
                help: help.to_string(),
                next,
            },
        );
    }
}

impl TokenCompleter for StaticTokenCompleter {
    fn match_token(&self, token: &str, ctx: &mut CommandContext) -> Option<MatchOutcome> {
        let entry = self.entries.get(&token.to_lowercase())?;
        ctx.set(&self.context_key, CtxValue::Str(entry.canonical.clone()));
        Some(MatchOutcome {
            normalized: entry.canonical.clone(),
            next: entry.next.clone(),
        })
    }

    fn complete(&self, partial: &str, _ctx: &CommandContext) -> Completions {
        prefix_candidates(
            partial,
            self.entries
                .values()
                .map(|entry| (entry.canonical.as_str(), entry.help.as_str())),
        )
    }
}

/// Literal `true`/`false`, case-insensitive. Matches leniently: any token is
/// accepted, but the boolean is only written when the literal is recognized.
pub struct BoolTokenCompleter {
    context_key: String,
    next: Next,
}

impl BoolTokenCompleter {
    pub fn new(context_key: impl Into<String>, next: Next) -> Self {
        Self {
            context_key: context_key.into(),
            next,
        }
    }
}

impl TokenCompleter for BoolTokenCompleter {
    fn match_token(&self, token: &str, ctx: &mut CommandContext) -> Option<MatchOutcome> {
        let lower = token.to_lowercase();
        match lower.as_str() {
            "true" => ctx.set(&self.context_key, CtxValue::Bool(true)),
            "false" => ctx.set(&self.context_key, CtxValue::Bool(false)),
            _ => {}
        }
        Some(MatchOutcome {
            normalized: lower,
            next: self.next.clone(),
        })
    }

    fn complete(&self, partial: &str, _ctx: &CommandContext) -> Completions {
        prefix_candidates(partial, [("false", ""), ("true", "")].into_iter())
    }
}

/// The named colors offered for completion. Matching additionally accepts
/// `#rrggbb` hex and anything else the toolkit's color parser understands.
pub const NAMED_COLORS: &[&str] = &[
    "black",
    "blue",
    "cyan",
    "darkgray",
    "default",
    "gray",
    "green",
    "lightblue",
    "lightcyan",
    "lightgreen",
    "lightmagenta",
    "lightred",
    "lightyellow",
    "magenta",
    "red",
    "white",
    "yellow",
];

/// Parse a color token: a named color, `#rrggbb`, or `default`.
pub fn parse_color(token: &str) -> Option<Color> {
    let lower = token.to_lowercase();
    if lower == "default" {
        return Some(Color::Reset);
    }
    if let Some(hex) = lower.strip_prefix('#') {
        if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some(Color::Rgb(r, g, b));
        }
        return None;
    }
    lower.parse().ok()
}

/// Render a color back into the token form `parse_color` accepts.
pub fn color_name(color: Color) -> String {
    match color {
        Color::Reset => "default".to_string(),
        Color::Rgb(r, g, b) => format!("#{r:02x}{g:02x}{b:02x}"),
        Color::Black => "black".to_string(),
        Color::Red => "red".to_string(),
        Color::Green => "green".to_string(),
        Color::Yellow => "yellow".to_string(),
        Color::Blue => "blue".to_string(),
        Color::Magenta => "magenta".to_string(),
        Color::Cyan => "cyan".to_string(),
        Color::Gray => "gray".to_string(),
        Color::DarkGray => "darkgray".to_string(),
        Color::LightRed => "lightred".to_string(),
        Color::LightGreen => "lightgreen".to_string(),
        Color::LightYellow => "lightyellow".to_string(),
        Color::LightBlue => "lightblue".to_string(),
        Color::LightMagenta => "lightmagenta".to_string(),
        Color::LightCyan => "lightcyan".to_string(),
        Color::White => "white".to_string(),
        Color::Indexed(i) => i.to_string(),
    }
}

pub struct ColorTokenCompleter {
    context_key: String,
    next: Next,
}

impl ColorTokenCompleter {
    pub fn new(context_key: impl Into<String>, next: Next) -> Self {
        Self {
            context_key: context_key.into(),
            next,
        }
    }
}

impl TokenCompleter for ColorTokenCompleter {
    fn match_token(&self, token: &str, ctx: &mut CommandContext) -> Option<MatchOutcome> {
        let color = parse_color(token)?;
        ctx.set(&self.context_key, CtxValue::Color(color));
        Some(MatchOutcome {
            normalized: token.to_lowercase(),
            next: self.next.clone(),
        })
    }

    fn complete(&self, partial: &str, _ctx: &CommandContext) -> Completions {
        prefix_candidates(partial, NAMED_COLORS.iter().map(|name| (*name, "")))
    }
}

/// Matches any token verbatim as a path; completion lists the filesystem.
pub struct FileTokenCompleter {
    context_key: String,
    next: Next,
}

impl FileTokenCompleter {
    pub fn new(context_key: impl Into<String>, next: Next) -> Self {
        Self {
            context_key: context_key.into(),
            next,
        }
    }
}

impl TokenCompleter for FileTokenCompleter {
    fn match_token(&self, token: &str, ctx: &mut CommandContext) -> Option<MatchOutcome> {
        ctx.set(&self.context_key, CtxValue::Str(token.to_string()));
        Some(MatchOutcome {
            normalized: token.to_string(),
            next: self.next.clone(),
        })
    }

    /// Directory listing filtered by the typed name prefix. I/O failures
    /// yield an empty list; a typed path is never reported as exact so the
    /// menu keeps offering deeper entries.
    fn complete(&self, partial: &str, _ctx: &CommandContext) -> Completions {
        let (dir_part, name_part) = match partial.rfind('/') {
            Some(idx) => partial.split_at(idx + 1),
            None => ("", partial),
        };
        let dir = if dir_part.is_empty() { "." } else { dir_part };
        let Ok(entries) = std::fs::read_dir(Path::new(dir)) else {
            return Completions::empty();
        };

        let name_lower = name_part.to_lowercase();
        let mut suggestions = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') && !name_part.starts_with('.') {
                continue;
            }
            if !name.to_lowercase().starts_with(&name_lower) {
                continue;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let text = format!("{dir_part}{name}{}", if is_dir { "/" } else { "" });
            suggestions.push(Suggestion::new(text, ""));
        }
        suggestions.sort_by(|a, b| a.text.cmp(&b.text));
        Completions {
            suggestions,
            exact: false,
        }
    }
}

/// Accepts anything, accumulating tokens space-separated under its context
/// key, and loops on itself for the rest of the line (free-form trailing
/// text: URLs, raw script).
pub struct AnythingCompleter {
    context_key: String,
}

impl AnythingCompleter {
    pub fn new(context_key: impl Into<String>) -> Self {
        Self {
            context_key: context_key.into(),
        }
    }
}

impl TokenCompleter for AnythingCompleter {
    fn match_token(&self, token: &str, ctx: &mut CommandContext) -> Option<MatchOutcome> {
        ctx.append_str(&self.context_key, token);
        Some(MatchOutcome {
            normalized: token.to_string(),
            next: Next::SelfLoop,
        })
    }

    fn complete(&self, _partial: &str, _ctx: &CommandContext) -> Completions {
        Completions::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_completer_is_lenient_but_only_writes_literals() {
        let completer = BoolTokenCompleter::new("value", Next::Done);
        let mut ctx = CommandContext::new("");

        let outcome = completer.match_token("TRUE", &mut ctx).unwrap();
        assert_eq!(outcome.normalized, "true");
        assert_eq!(ctx.bool_value("value"), Some(true));

        let mut ctx = CommandContext::new("");
        assert!(completer.match_token("maybe", &mut ctx).is_some());
        assert!(ctx.get("value").is_none());
    }

    #[test]
    fn bool_completion_is_sorted_with_exact_detection() {
        let completer = BoolTokenCompleter::new("value", Next::Done);
        let ctx = CommandContext::new("");

        let all = completer.complete("", &ctx);
        let texts: Vec<_> = all.suggestions.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["false", "true"]);
        assert!(!all.exact);

        assert!(completer.complete("True", &ctx).exact);
    }

    #[test]
    fn color_parsing_accepts_names_hex_and_default() {
        assert_eq!(parse_color("default"), Some(Color::Reset));
        assert_eq!(parse_color("#4080ff"), Some(Color::Rgb(0x40, 0x80, 0xff)));
        assert_eq!(parse_color("RED"), Some(Color::Red));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("#12345g"), None);
    }

    #[test]
    fn color_match_rejects_unknown_tokens() {
        let completer = ColorTokenCompleter::new("value", Next::Done);
        let mut ctx = CommandContext::new("");
        assert!(completer.match_token("not-a-color!", &mut ctx).is_none());
        assert!(completer.match_token("#ff8000", &mut ctx).is_some());
        assert_eq!(
            ctx.color_value("value"),
            Some(Color::Rgb(0xff, 0x80, 0x00))
        );
    }

    #[test]
    fn static_completer_normalizes_to_canonical_casing() {
        let mut completer = StaticTokenCompleter::new("setting");
        completer.insert("logIncoming", Next::Done);
        let mut ctx = CommandContext::new("");

        let outcome = completer.match_token("LOGINCOMING", &mut ctx).unwrap();
        assert_eq!(outcome.normalized, "logIncoming");
        assert_eq!(ctx.str_value("setting"), Some("logIncoming"));
        assert!(completer.match_token("unknown", &mut ctx).is_none());
    }

    #[test]
    fn anything_completer_accumulates_and_loops() {
        let completer = AnythingCompleter::new("url");
        let mut ctx = CommandContext::new("");

        let outcome = completer
            .match_token("ws://host/websocket", &mut ctx)
            .unwrap();
        assert!(matches!(outcome.next, Next::SelfLoop));
        let _ = completer.match_token("extra", &mut ctx).unwrap();
        assert_eq!(ctx.str_value("url"), Some("ws://host/websocket extra"));
        assert!(completer.complete("any", &ctx).is_empty());
    }

    #[test]
    fn file_completer_lists_a_directory_and_survives_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part_a.gcode"), b"").unwrap();
        std::fs::write(dir.path().join("part_b.gcode"), b"").unwrap();
        std::fs::write(dir.path().join("other.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("parts")).unwrap();

        let completer = FileTokenCompleter::new("file", Next::Done);
        let ctx = CommandContext::new("");
        let base = dir.path().to_string_lossy().into_owned();

        let result = completer.complete(&format!("{base}/part"), &ctx);
        let texts: Vec<_> = result.suggestions.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                format!("{base}/part_a.gcode"),
                format!("{base}/part_b.gcode"),
                format!("{base}/parts/"),
            ]
        );
        assert!(!result.exact, "file completion never reports exact");

        // A path even exactly matching a file stays inexact, and a missing
        // directory is an empty result rather than an error.
        assert!(!completer.complete(&format!("{base}/other.txt"), &ctx).exact);
        assert!(completer
            .complete("/definitely/not/a/dir/x", &ctx)
            .is_empty());

        // Any token matches verbatim.
        let mut ctx = CommandContext::new("");
        assert!(completer.match_token("whatever.gcode", &mut ctx).is_some());
        assert_eq!(ctx.str_value("file"), Some("whatever.gcode"));
    }
}
