use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use parking_lot::RwLock;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use url::Url;

use gantry::client::{App, LogEntry, UiMessage};
use gantry::commands::Services;
use gantry::config::Config;
use gantry::rpc::RpcClient;

#[derive(Parser, Debug)]
#[command(
    name = "gantry",
    version,
    about = "Terminal client for Moonraker-style machine-control servers"
)]
struct Cli {
    /// Server address: HOST, HOST PORT, or a full ws:// URL. Omit to start
    /// disconnected and use /connect.
    #[arg(value_name = "ADDRESS", num_args = 0..=2)]
    address: Vec<String>,

    /// Write debug logs to this file (the terminal belongs to the UI).
    #[arg(long, env = "GANTRY_LOG", value_name = "FILE")]
    debug_log: Option<PathBuf>,
}

/// Mirror the address forms users type at the shell: bare host, host+port,
/// or a complete URL.
fn server_url(address: &[String]) -> anyhow::Result<Option<Url>> {
    let text = match address {
        [] => return Ok(None),
        [host] if host.contains("://") => host.clone(),
        [host] => format!("ws://{host}/websocket"),
        [host, port] => format!("ws://{host}:{port}/websocket"),
        _ => anyhow::bail!("expected at most HOST PORT"),
    };
    let url = Url::parse(&text).with_context(|| format!("invalid server address `{text}`"))?;
    Ok(Some(url))
}

fn init_logging(path: Option<&Path>) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(path) = path else { return Ok(None) };
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gantry=debug")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

fn install_panic_hook() {
    let original = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(stdout(), LeaveAlternateScreen);
        original(info);
    }));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.debug_log.as_deref())?;

    let config = Config::load().context("could not load configuration")?;
    let config = Arc::new(RwLock::new(config));

    let url = server_url(&cli.address)?;
    let rpc = RpcClient::new(url.clone());
    let notifications = rpc
        .take_notifications()
        .ok_or_else(|| anyhow::anyhow!("notification channel already taken"))?;

    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    {
        let ui = ui_tx.clone();
        rpc.set_on_connect(move || {
            let _ = ui.send(UiMessage::Connected);
        });
    }
    {
        let ui = ui_tx.clone();
        rpc.set_on_disconnect(move || {
            let _ = ui.send(UiMessage::Disconnected);
        });
    }

    let services = Services::new(rpc.clone(), ui_tx.clone(), config);
    let app = App::new(services, ui_rx, notifications);

    if url.is_some() {
        let rpc = rpc.clone();
        let ui = ui_tx.clone();
        let _ = tokio::spawn(async move {
            if let Err(e) = rpc.connect().await {
                let _ = ui.send(UiMessage::Log(LogEntry::error(format!(
                    "failed to connect: {e}"
                ))));
            }
        });
    }

    install_panic_hook();
    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = app.run(&mut terminal).await;

    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_forms_build_the_expected_urls() {
        assert_eq!(server_url(&[]).unwrap(), None);
        assert_eq!(
            server_url(&["printer.local".to_string()])
                .unwrap()
                .unwrap()
                .as_str(),
            "ws://printer.local/websocket"
        );
        assert_eq!(
            server_url(&["printer.local".to_string(), "7125".to_string()])
                .unwrap()
                .unwrap()
                .as_str(),
            "ws://printer.local:7125/websocket"
        );
        assert_eq!(
            server_url(&["wss://printer.example/ws".to_string()])
                .unwrap()
                .unwrap()
                .as_str(),
            "wss://printer.example/ws"
        );
        assert!(server_url(&["bad host".to_string()]).is_err());
    }
}
