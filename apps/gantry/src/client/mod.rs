//! The interactive console: event loop, input line, output log, rendering.

pub mod app;
pub(crate) mod input;
mod notifications;
pub mod output;
pub(crate) mod view;

pub use app::App;
pub use output::{LogEntry, LogKind};

use serde_json::Value;

/// Messages into the UI event loop, from command tasks, RPC hooks and the
/// on-connect initialization sequence.
#[derive(Debug)]
pub enum UiMessage {
    Log(LogEntry),
    Connected,
    Disconnected,
    /// G-code commands discovered via `printer.gcode.help`, as (name, help).
    RegisterGcode(Vec<(String, String)>),
    KlippyState {
        connected: bool,
        state: String,
    },
    Hostname(String),
    /// Initial object status from `printer.objects.subscribe`.
    StatusSnapshot(serde_json::Map<String, Value>),
    ConfigChanged,
    ShowHelp,
    Quit,
}
