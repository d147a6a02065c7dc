//! The on-connect initialization sequence.
//!
//! Runs on its own task after every (re)connect: identify the server state,
//! register remote G-code commands, and subscribe to object status so the
//! header and status map stay live. Results flow back to the UI loop as
//! [`UiMessage`]s; the registry itself is only ever mutated there.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::client::{LogEntry, UiMessage};
use crate::commands::Services;

const STARTUP_CALL_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn initialize(services: Services) {
    if let Err(e) = try_initialize(&services).await {
        services.log(LogEntry::error(format!("initialization failed: {e:#}")));
    }
}

async fn try_initialize(services: &Services) -> anyhow::Result<()> {
    let rpc = &services.rpc;
    let info = rpc
        .call_with_timeout("server.info", Value::Null, STARTUP_CALL_TIMEOUT)
        .await?;
    let klippy_connected = info["klippy_connected"].as_bool().unwrap_or(false);
    let klippy_state = info["klippy_state"].as_str().unwrap_or("unknown").to_string();
    let ready = klippy_connected && klippy_state == "ready";
    let _ = services.ui.send(UiMessage::KlippyState {
        connected: klippy_connected,
        state: klippy_state,
    });
    if !ready {
        // notify_klippy_ready will bring us back here.
        debug!("klippy not ready, deferring initialization");
        return Ok(());
    }

    let printer_info = rpc
        .call_with_timeout("printer.info", Value::Null, STARTUP_CALL_TIMEOUT)
        .await?;
    if let Some(hostname) = printer_info["hostname"].as_str() {
        let _ = services.ui.send(UiMessage::Hostname(hostname.to_string()));
    }

    let help = rpc
        .call_with_timeout("printer.gcode.help", Value::Null, STARTUP_CALL_TIMEOUT)
        .await?;
    if let Some(entries) = help.as_object() {
        let commands: Vec<(String, String)> = entries
            .iter()
            .map(|(name, help)| {
                (
                    name.clone(),
                    help.as_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        debug!(count = commands.len(), "registering remote G-code commands");
        let _ = services.ui.send(UiMessage::RegisterGcode(commands));
    }

    let status = subscribe_all(services).await?;
    let _ = services.ui.send(UiMessage::StatusSnapshot(status));
    Ok(())
}

/// Subscribe to every printer object and return the initial status map.
async fn subscribe_all(
    services: &Services,
) -> anyhow::Result<serde_json::Map<String, Value>> {
    let rpc = &services.rpc;
    let list = rpc
        .call_with_timeout("printer.objects.list", Value::Null, STARTUP_CALL_TIMEOUT)
        .await?;
    let mut objects = serde_json::Map::new();
    if let Some(names) = list["objects"].as_array() {
        for name in names.iter().filter_map(Value::as_str) {
            let _ = objects.insert(name.to_string(), Value::Null);
        }
    }

    let response = rpc
        .call_with_timeout(
            "printer.objects.subscribe",
            json!({ "objects": objects }),
            STARTUP_CALL_TIMEOUT,
        )
        .await?;
    Ok(response["status"].as_object().cloned().unwrap_or_default())
}
