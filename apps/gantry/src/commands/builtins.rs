//! The builtin slash commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use crate::client::UiMessage;
use crate::cmdinput::{
    AnythingCompleter, CommandContext, FileTokenCompleter, Next, StaticTokenCompleter,
    TokenCompleter,
};
use crate::commands::{methods::KNOWN_RPC_METHODS, Command, Services};
use crate::config;

/// `/connect <url>` - dial a server, replacing the configured endpoint.
pub struct Connect;

#[async_trait]
impl Command for Connect {
    async fn call(&self, ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        if services.rpc.is_connected() {
            bail!("already connected");
        }
        let raw = ctx
            .str_value("url")
            .ok_or_else(|| anyhow::anyhow!("usage: /connect <host[:port] | url>"))?;
        let url = normalize_server_url(raw)?;
        services.internal(format!("Connecting to {url}"));
        services.rpc.set_url(url);
        services
            .rpc
            .connect()
            .await
            .context("failed to connect")?;
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        Some(Arc::new(AnythingCompleter::new("url")))
    }

    fn help(&self) -> &str {
        "connect to a server"
    }
}

/// Accept `host`, `host:port` or a full URL, defaulting to Moonraker's
/// `/websocket` endpoint.
pub fn normalize_server_url(raw: &str) -> anyhow::Result<Url> {
    let text = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("ws://{raw}/websocket")
    };
    Url::parse(&text).with_context(|| format!("invalid server address `{raw}`"))
}

/// `/disconnect` - close the connection without reconnecting.
pub struct Disconnect;

#[async_trait]
impl Command for Disconnect {
    async fn call(&self, _ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        if !services.rpc.is_connected() {
            bail!("not connected");
        }
        services.rpc.disconnect().await;
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        None
    }

    fn help(&self) -> &str {
        "disconnect from the server"
    }
}

/// `/quit` - close the connection and leave the program.
pub struct Quit;

#[async_trait]
impl Command for Quit {
    async fn call(&self, _ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        services.rpc.close().await;
        let _ = services.ui.send(UiMessage::Quit);
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        None
    }

    fn help(&self) -> &str {
        "exit gantry"
    }
}

/// `/set <setting> <value>` - change a setting and persist it.
pub struct Set;

#[async_trait]
impl Command for Set {
    async fn call(&self, ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        let key = ctx
            .str_value("setting")
            .ok_or_else(|| anyhow::anyhow!("usage: /set <setting> <value>"))?;
        let value = ctx
            .get("value")
            .ok_or_else(|| anyhow::anyhow!("usage: /set {key} <value>"))?
            .clone();

        let snapshot = {
            let mut config = services.config.write();
            config.set(key, &value)?;
            config.clone()
        };
        snapshot.save()?;
        let _ = services.ui.send(UiMessage::ConfigChanged);
        services.respond(format!("Set {key} to {value}"));
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        Some(Arc::new(config::settings_completer()))
    }

    fn help(&self) -> &str {
        "change a setting"
    }
}

/// `/settings` - show the current configuration.
pub struct Settings;

#[async_trait]
impl Command for Settings {
    async fn call(&self, _ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        let snapshot = services.config.read().clone();
        services.respond(serde_json::to_string_pretty(&snapshot)?);
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        None
    }

    fn help(&self) -> &str {
        "show current settings"
    }
}

/// `/rpc <method> [json-params]` - raw server call.
pub struct Rpc;

#[async_trait]
impl Command for Rpc {
    async fn call(&self, ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        let method = ctx
            .str_value("method")
            .ok_or_else(|| anyhow::anyhow!("usage: /rpc <method> [params]"))?;
        let params = rpc_payload(&ctx.raw)?;
        let result = services.rpc.call(method, params).await?;
        services.respond(serde_json::to_string_pretty(&result)?);
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        let mut completer = StaticTokenCompleter::new("method");
        for method in KNOWN_RPC_METHODS {
            // The payload after the method is free-form JSON.
            completer.insert(method, Next::Done);
        }
        Some(Arc::new(completer))
    }

    fn help(&self) -> &str {
        "call a server RPC method directly"
    }
}

/// Everything after `/rpc <method>` is one JSON object, or empty.
pub(crate) fn rpc_payload(raw: &str) -> anyhow::Result<Value> {
    let mut parts = raw.trim().splitn(3, char::is_whitespace);
    let _slash_rpc = parts.next();
    let _method = parts.next();
    match parts.next().map(str::trim) {
        None | Some("") => Ok(json!({})),
        Some(tail) => {
            let value: Value =
                serde_json::from_str(tail).context("params must be a JSON object")?;
            if !value.is_object() {
                bail!("params must be a JSON object");
            }
            Ok(value)
        }
    }
}

/// `/restart` - restart the host service.
pub struct Restart;

#[async_trait]
impl Command for Restart {
    async fn call(&self, _ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        let _ = services.rpc.call("printer.restart", Value::Null).await?;
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        None
    }

    fn help(&self) -> &str {
        "restart the print service"
    }
}

/// `/firmware_restart` - restart the machine firmware.
pub struct FirmwareRestart;

#[async_trait]
impl Command for FirmwareRestart {
    async fn call(&self, _ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        let _ = services
            .rpc
            .call("printer.firmware_restart", Value::Null)
            .await?;
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        None
    }

    fn help(&self) -> &str {
        "restart the machine firmware"
    }
}

/// `/estop` - emergency stop.
pub struct EStop;

#[async_trait]
impl Command for EStop {
    async fn call(&self, _ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        let _ = services
            .rpc
            .call("printer.emergency_stop", Value::Null)
            .await?;
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        None
    }

    fn help(&self) -> &str {
        "emergency stop"
    }
}

/// `/print <file>` - upload a local file and start printing it.
pub struct Print;

#[async_trait]
impl Command for Print {
    async fn call(&self, ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        let file = ctx
            .str_value("file")
            .ok_or_else(|| anyhow::anyhow!("usage: /print <file>"))?;
        let url = services.upload_url()?;

        let data = tokio::fs::read(file)
            .await
            .with_context(|| format!("cannot read {file}"))?;
        let name = Path::new(file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string());

        let form = reqwest::multipart::Form::new()
            .text("print", "true")
            .part(
                "file",
                reqwest::multipart::Part::bytes(data).file_name(name.clone()),
            );
        let response = reqwest::Client::new()
            .post(url)
            .multipart(form)
            .send()
            .await
            .context("upload failed")?;
        let _ = response.error_for_status().context("upload rejected")?;

        services.respond(format!("Uploaded {name}, print started"));
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        Some(Arc::new(FileTokenCompleter::new("file", Next::Done)))
    }

    fn help(&self) -> &str {
        "upload a file and print it"
    }
}

/// `/help` - list registered commands.
pub struct Help;

#[async_trait]
impl Command for Help {
    async fn call(&self, _ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        let _ = services.ui.send(UiMessage::ShowHelp);
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        None
    }

    fn help(&self) -> &str {
        "list available commands"
    }
}

/// `/about` - version line.
pub struct About;

#[async_trait]
impl Command for About {
    async fn call(&self, _ctx: &CommandContext, services: &Services) -> anyhow::Result<()> {
        services.internal(format!(
            "gantry {} - a terminal client for Moonraker",
            env!("CARGO_PKG_VERSION")
        ));
        Ok(())
    }

    fn completer(&self, _ctx: &CommandContext) -> Option<Arc<dyn TokenCompleter>> {
        None
    }

    fn help(&self) -> &str {
        "about this program"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_addresses_normalize_to_websocket_urls() {
        assert_eq!(
            normalize_server_url("printer.local").unwrap().as_str(),
            "ws://printer.local/websocket"
        );
        assert_eq!(
            normalize_server_url("10.0.0.5:7125").unwrap().as_str(),
            "ws://10.0.0.5:7125/websocket"
        );
        assert_eq!(
            normalize_server_url("wss://printer.example/ws").unwrap().as_str(),
            "wss://printer.example/ws"
        );
        assert!(normalize_server_url("not a url").is_err());
    }

    #[test]
    fn rpc_payload_defaults_to_an_empty_object() {
        assert_eq!(rpc_payload("/rpc printer.info").unwrap(), json!({}));
        assert_eq!(
            rpc_payload(r#"/rpc printer.gcode.script {"script": "G28"}"#).unwrap(),
            json!({"script": "G28"})
        );
        assert!(rpc_payload("/rpc printer.info [1,2]").is_err());
        assert!(rpc_payload("/rpc printer.info not-json").is_err());
    }
}
