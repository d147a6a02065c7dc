//! Command objects dispatched from parsed input.
//!
//! Commands are held by the completion engine only through the [`Command`]
//! trait; the set is extended at runtime with G-code commands discovered
//! from server help text. Dispatch runs each command on its own task, so a
//! slow RPC never blocks the UI loop.

pub mod builtins;
pub mod methods;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;
use tokio::sync::mpsc;
use url::Url;

use crate::client::{LogEntry, UiMessage};
use crate::cmdinput::{CommandContext, TabCompleter, TokenCompleter};
use crate::config::Config;
use crate::rpc::RpcClient;

#[async_trait]
pub trait Command: Send + Sync {
    /// Execute against a parsed context. Errors are rendered inline by the
    /// dispatcher; they never terminate the client.
    async fn call(&self, ctx: &CommandContext, services: &Services) -> anyhow::Result<()>;

    /// The completer for the token after the command name, if any.
    fn completer(&self, ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>>;

    fn help(&self) -> &str;
}

/// What a command may touch: the RPC client, the UI message channel and the
/// shared configuration.
#[derive(Clone)]
pub struct Services {
    pub rpc: RpcClient,
    pub ui: mpsc::UnboundedSender<UiMessage>,
    pub config: Arc<RwLock<Config>>,
}

impl Services {
    pub fn new(
        rpc: RpcClient,
        ui: mpsc::UnboundedSender<UiMessage>,
        config: Arc<RwLock<Config>>,
    ) -> Self {
        Self { rpc, ui, config }
    }

    pub fn log(&self, entry: LogEntry) {
        let _ = self.ui.send(UiMessage::Log(entry));
    }

    pub fn respond(&self, text: impl Into<String>) {
        self.log(LogEntry::response(text));
    }

    pub fn internal(&self, text: impl Into<String>) {
        self.log(LogEntry::internal(text));
    }

    /// The HTTP upload endpoint derived from the WebSocket URL.
    pub fn upload_url(&self) -> anyhow::Result<Url> {
        let ws = self
            .rpc
            .url()
            .ok_or_else(|| anyhow::anyhow!("not connected to a server"))?;
        upload_url(&ws)
    }
}

pub(crate) fn upload_url(ws: &Url) -> anyhow::Result<Url> {
    let mut url = ws.clone();
    let scheme = match ws.scheme() {
        "wss" => "https",
        _ => "http",
    };
    url.set_scheme(scheme)
        .map_err(|()| anyhow::anyhow!("cannot derive http url from {ws}"))?;
    url.set_path("/server/files/upload");
    url.set_query(None);
    Ok(url)
}

/// A G-code command, either registered by name from `printer.gcode.help` or
/// acting as the passthrough for unregistered, unprefixed input.
pub struct GcodeCommand {
    help: String,
}

impl GcodeCommand {
    pub fn new(help: impl Into<String>) -> Self {
        Self { help: help.into() }
    }

    pub fn passthrough() -> Self {
        Self::new("send as raw G-code")
    }
}

#[async_trait]
impl Command for GcodeCommand {
    async fn call(&self, ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        let script = ctx.raw.trim();
        let _ = services
            .rpc
            .call("printer.gcode.script", json!({ "script": script }))
            .await?;
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        // Later tokens are part of the script, not validated.
        None
    }

    fn help(&self) -> &str {
        &self.help
    }
}

/// Register the builtin command set and the raw G-code fallback.
pub fn register_builtins(tab: &mut TabCompleter) {
    tab.register_command("/connect", Arc::new(builtins::Connect));
    tab.register_command("/disconnect", Arc::new(builtins::Disconnect));
    tab.register_command("/quit", Arc::new(builtins::Quit));
    tab.register_command("/set", Arc::new(builtins::Set));
    tab.register_command("/settings", Arc::new(builtins::Settings));
    tab.register_command("/rpc", Arc::new(builtins::Rpc));
    tab.register_command("/restart", Arc::new(builtins::Restart));
    tab.register_command("/firmware_restart", Arc::new(builtins::FirmwareRestart));
    tab.register_command("/estop", Arc::new(builtins::EStop));
    tab.register_command("/print", Arc::new(builtins::Print));
    tab.register_command("/help", Arc::new(builtins::Help));
    tab.register_command("/about", Arc::new(builtins::About));
    tab.set_fallback(Arc::new(GcodeCommand::passthrough()), "gcode");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_register_with_help_text() {
        let mut tab = TabCompleter::new();
        register_builtins(&mut tab);
        let names: Vec<_> = tab.commands().map(|(name, _)| name.to_string()).collect();
        assert!(names.contains(&"/connect".to_string()));
        assert!(names.contains(&"/estop".to_string()));
        assert!(names.contains(&"/set".to_string()));
        assert!(tab.commands().all(|(_, help)| !help.is_empty()));
    }

    #[test]
    fn upload_url_follows_the_websocket_scheme() {
        let ws = Url::parse("ws://printer.local:7125/websocket").unwrap();
        assert_eq!(
            upload_url(&ws).unwrap().as_str(),
            "http://printer.local:7125/server/files/upload"
        );

        let wss = Url::parse("wss://printer.example/websocket?token=x").unwrap();
        assert_eq!(
            upload_url(&wss).unwrap().as_str(),
            "https://printer.example/server/files/upload"
        );
    }
}
