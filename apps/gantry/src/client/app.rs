//! The UI event loop: keystrokes, UI messages from command tasks, and
//! server notifications, all multiplexed on one task. The completer chain
//! and the command registry live here and are never touched concurrently.

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::backend::Backend;
use ratatui::Terminal;
use regex::Regex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::client::input::InputState;
use crate::client::output::{LogEntry, OutputLog};
use crate::client::view::{self, Palette};
use crate::client::{notifications, UiMessage};
use crate::cmdinput::{
    AcceptSource, CommandContext, ParseError, Suggestion, TabCompleter,
};
use crate::commands::{self, GcodeCommand, Services};
use crate::rpc::IncomingNotification;

const OUTPUT_SCROLLBACK: usize = 1000;
const SCROLL_STEP: usize = 10;

/// Live server-side state shown in the header, fed by the initialization
/// sequence and `notify_status_update`.
#[derive(Default)]
pub(crate) struct ServerStatus {
    pub hostname: Option<String>,
    pub klippy_state: Option<String>,
    pub klippy_connected: bool,
    pub objects: serde_json::Map<String, Value>,
}

impl ServerStatus {
    pub fn print_state(&self) -> Option<&str> {
        self.objects.get("print_stats")?.get("state")?.as_str()
    }
}

/// The open suggestion drop-down.
pub(crate) struct Menu {
    pub suggestions: Vec<Suggestion>,
    pub selected: usize,
    /// Byte offset in the input text where the completing token starts.
    pub offset: usize,
}

pub struct App {
    pub(crate) services: Services,
    pub(crate) tab: TabCompleter,
    pub(crate) input: InputState,
    pub(crate) output: OutputLog,
    pub(crate) menu: Option<Menu>,
    pub(crate) status: ServerStatus,
    pub(crate) palette: Palette,
    filters: Vec<Regex>,
    ui_rx: mpsc::UnboundedReceiver<UiMessage>,
    notifications_rx: mpsc::Receiver<IncomingNotification>,
    should_quit: bool,
}

impl App {
    pub fn new(
        services: Services,
        ui_rx: mpsc::UnboundedReceiver<UiMessage>,
        notifications_rx: mpsc::Receiver<IncomingNotification>,
    ) -> Self {
        let mut tab = TabCompleter::new();
        commands::register_builtins(&mut tab);

        let config = services.config.read().clone();
        let mut app = Self {
            services,
            tab,
            input: InputState::new(),
            output: OutputLog::new(OUTPUT_SCROLLBACK),
            menu: None,
            status: ServerStatus::default(),
            palette: Palette::from_config(&config),
            filters: Vec::new(),
            ui_rx,
            notifications_rx,
            should_quit: false,
        };
        app.rebuild_filters();
        app.output.push(LogEntry::internal(format!(
            "gantry {} - /help lists commands",
            env!("CARGO_PKG_VERSION")
        )));
        app
    }

    pub async fn run<B: Backend>(mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        // Crossterm reads are blocking; a dedicated thread feeds them into
        // the select loop.
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let _ = std::thread::spawn(move || {
            loop {
                match crossterm::event::read() {
                    Ok(event) => {
                        if event_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        // Periodic redraw keeps timestamps and the header fresh even when
        // nothing else happens.
        let mut tick = tokio::time::interval(Duration::from_millis(250));
        loop {
            terminal.draw(|frame| view::render(frame, &self))?;
            tokio::select! {
                Some(event) = event_rx.recv() => self.handle_event(event),
                Some(message) = self.ui_rx.recv() => self.handle_ui_message(message),
                Some(notification) = self.notifications_rx.recv() => {
                    self.handle_notification(notification);
                }
                _ = tick.tick() => {}
            }
            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Paste(text) => {
                for ch in text.chars() {
                    self.input.insert(ch);
                }
                self.refresh_completions();
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => {
                let rpc = self.services.rpc.clone();
                let _ = tokio::spawn(async move { rpc.close().await });
                self.should_quit = true;
            }
            KeyCode::Char('w') if ctrl => {
                self.input.delete_word();
                self.refresh_completions();
            }
            KeyCode::Char(ch) if !ctrl => {
                self.input.insert(ch);
                self.refresh_completions();
            }
            KeyCode::Backspace => {
                self.input.backspace();
                self.refresh_completions();
            }
            KeyCode::Delete => {
                self.input.delete();
                self.refresh_completions();
            }
            KeyCode::Left => {
                self.input.move_left();
                self.menu = None;
            }
            KeyCode::Right => {
                self.input.move_right();
                self.menu = None;
            }
            KeyCode::Home => {
                self.input.move_home();
                self.menu = None;
            }
            KeyCode::End => {
                self.input.move_end();
                self.menu = None;
            }
            KeyCode::Esc => self.menu = None,
            KeyCode::Tab => {
                if self.menu.is_some() {
                    self.accept_suggestion(AcceptSource::Tab);
                } else {
                    self.refresh_completions();
                }
            }
            KeyCode::Enter => {
                if self.menu.is_some() {
                    self.accept_suggestion(AcceptSource::Enter);
                } else {
                    self.submit();
                }
            }
            KeyCode::Up => {
                if self.menu.is_some() {
                    self.navigate_menu(-1);
                } else {
                    self.input.history_up();
                }
            }
            KeyCode::Down => {
                if self.menu.is_some() {
                    self.navigate_menu(1);
                } else {
                    self.input.history_down();
                }
            }
            KeyCode::PageUp => self.output.scroll_up(SCROLL_STEP),
            KeyCode::PageDown => self.output.scroll_down(SCROLL_STEP),
            _ => {}
        }
    }

    fn refresh_completions(&mut self) {
        let mut ctx = CommandContext::new(self.input.text());
        let (completions, offset) =
            self.tab
                .auto_complete(self.input.text(), self.input.cursor(), &mut ctx);
        if completions.suggestions.is_empty() {
            self.menu = None;
        } else {
            self.menu = Some(Menu {
                suggestions: completions.suggestions,
                selected: 0,
                offset,
            });
        }
    }

    fn navigate_menu(&mut self, direction: isize) {
        if let Some(menu) = &mut self.menu {
            let len = menu.suggestions.len() as isize;
            menu.selected = (menu.selected as isize + direction).rem_euclid(len) as usize;
        }
    }

    fn accept_suggestion(&mut self, source: AcceptSource) {
        let Some(menu) = &self.menu else { return };
        let picked = menu.suggestions[menu.selected].text.clone();
        if let Some(accepted) = self.tab.on_auto_completed(&picked, source) {
            self.input.set(accepted.text, accepted.cursor);
            if accepted.close_menu {
                // Deliberately no refresh here: the committed token must not
                // be re-offered as still incomplete.
                self.menu = None;
            }
        }
    }

    fn submit(&mut self) {
        self.menu = None;
        let line = self.input.submit();
        let mut ctx = CommandContext::new(line.clone());
        match self.tab.parse(&line, &mut ctx) {
            // Nothing typed, nothing said.
            Err(ParseError::EmptyInput) => {}
            Err(error @ ParseError::NoMatch { .. }) => {
                self.output.push(LogEntry::error(error.to_string()));
            }
            Ok(()) => {
                self.output.push(LogEntry::command(line.as_str()));
                self.output.scroll_to_end();
                let Some(command) = ctx.command() else {
                    warn!("parsed line resolved no command");
                    return;
                };
                let services = self.services.clone();
                let _ = tokio::spawn(async move {
                    if let Err(e) = command.call(&ctx, &services).await {
                        services.log(LogEntry::error(format!("Error: {e:#}")));
                    }
                });
            }
        }
    }

    fn handle_ui_message(&mut self, message: UiMessage) {
        match message {
            UiMessage::Log(entry) => self.output.push(entry),
            UiMessage::Connected => {
                self.output.push(LogEntry::internal("Connected."));
                let _ = tokio::spawn(notifications::initialize(self.services.clone()));
            }
            UiMessage::Disconnected => {
                self.status = ServerStatus::default();
                self.output.push(LogEntry::internal("Disconnected."));
            }
            UiMessage::RegisterGcode(commands) => {
                debug!(count = commands.len(), "registering G-code commands");
                for (name, help) in commands {
                    self.tab
                        .register_command(&name, Arc::new(GcodeCommand::new(help)));
                }
            }
            UiMessage::KlippyState { connected, state } => {
                self.status.klippy_connected = connected;
                self.status.klippy_state = Some(state);
            }
            UiMessage::Hostname(hostname) => self.status.hostname = Some(hostname),
            UiMessage::StatusSnapshot(objects) => self.status.objects = objects,
            UiMessage::ConfigChanged => {
                self.palette = Palette::from_config(&self.services.config.read());
                self.rebuild_filters();
            }
            UiMessage::ShowHelp => self.show_help(),
            UiMessage::Quit => self.should_quit = true,
        }
    }

    fn handle_notification(&mut self, notification: IncomingNotification) {
        if self.services.config.read().log_incoming {
            self.output.push(LogEntry::internal(format!(
                "← {} {}",
                notification.method,
                Value::Array(notification.params.clone())
            )));
        }
        match notification.method.as_str() {
            "notify_status_update" => {
                if let Some(update) = notification.params.first().and_then(Value::as_object) {
                    merge_status(&mut self.status.objects, update);
                }
            }
            "notify_gcode_response" => {
                for line in notification.params.iter().filter_map(Value::as_str) {
                    if self.passes_filters(line) {
                        self.output.push(LogEntry::response(line));
                    }
                }
            }
            "notify_klippy_ready" => {
                self.status.klippy_connected = true;
                self.status.klippy_state = Some("ready".to_string());
                let _ = tokio::spawn(notifications::initialize(self.services.clone()));
            }
            "notify_klippy_shutdown" => {
                self.status.klippy_state = Some("shutdown".to_string());
            }
            "notify_klippy_disconnected" => {
                self.status.klippy_connected = false;
                self.status.klippy_state = Some("disconnected".to_string());
                self.status.objects.clear();
            }
            other => trace!(method = other, "unhandled notification"),
        }
    }

    fn show_help(&mut self) {
        let width = self
            .tab
            .commands()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0);
        let lines: Vec<String> = self
            .tab
            .commands()
            .map(|(name, help)| format!("{name:width$}  {help}"))
            .collect();
        for line in lines {
            self.output.push(LogEntry::internal(line));
        }
    }

    fn passes_filters(&self, line: &str) -> bool {
        !self.filters.iter().any(|re| re.is_match(line))
    }

    fn rebuild_filters(&mut self) {
        self.filters.clear();
        for pattern in &self.services.config.read().console_filter_patterns {
            match Regex::new(pattern) {
                Ok(re) => self.filters.push(re),
                Err(e) => warn!(%pattern, "invalid console filter: {e}"),
            }
        }
    }
}

fn merge_status(
    objects: &mut serde_json::Map<String, Value>,
    update: &serde_json::Map<String, Value>,
) {
    for (key, value) in update {
        match (objects.get_mut(key), value) {
            // Object updates are partial: merge keys, keep the rest.
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                for (sub_key, sub_value) in incoming {
                    let _ = existing.insert(sub_key.clone(), sub_value.clone());
                }
            }
            _ => {
                let _ = objects.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::rpc::RpcClient;
    use parking_lot::RwLock;
    use serde_json::json;

    fn test_app() -> App {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let rpc = RpcClient::new(None);
        let notifications_rx = rpc.take_notifications().unwrap();
        let services = Services::new(rpc, ui_tx, Arc::new(RwLock::new(Config::default())));
        App::new(services, ui_rx, notifications_rx)
    }

    #[tokio::test]
    async fn empty_input_is_silent_and_no_match_renders_an_error() {
        let mut app = test_app();
        let before = app.output.len();

        app.input.set(String::new(), 0);
        app.submit();
        assert_eq!(app.output.len(), before);

        app.input.set("/bogus".to_string(), 6);
        app.submit();
        let last: Vec<_> = app.output.visible(1).collect();
        assert_eq!(last[0].kind, crate::client::LogKind::Error);
        assert!(last[0].text.contains("/bogus"));
    }

    #[tokio::test]
    async fn status_updates_merge_partially() {
        let mut app = test_app();
        app.status.objects = json!({
            "print_stats": {"state": "standby", "filename": ""},
            "toolhead": {"position": [0, 0, 0, 0]},
        })
        .as_object()
        .cloned()
        .unwrap();

        app.handle_notification(IncomingNotification {
            method: "notify_status_update".to_string(),
            params: vec![json!({"print_stats": {"state": "printing"}})],
        });

        assert_eq!(app.status.print_state(), Some("printing"));
        // Untouched keys survive a partial update.
        assert_eq!(
            app.status.objects["print_stats"]["filename"],
            json!("")
        );
        assert!(app.status.objects.contains_key("toolhead"));
    }

    #[tokio::test]
    async fn gcode_responses_respect_console_filters() {
        let mut app = test_app();
        app.services.config.write().console_filter_patterns =
            vec!["^ok$".to_string()];
        app.rebuild_filters();
        let before = app.output.len();

        app.handle_notification(IncomingNotification {
            method: "notify_gcode_response".to_string(),
            params: vec![json!("ok"), json!("T:210.0 /210.0")],
        });

        assert_eq!(app.output.len(), before + 1);
        let last: Vec<_> = app.output.visible(1).collect();
        assert_eq!(last[0].text, "T:210.0 /210.0");
    }

    #[tokio::test]
    async fn remote_gcode_commands_become_parseable() {
        let mut app = test_app();
        app.handle_ui_message(UiMessage::RegisterGcode(vec![(
            "BED_MESH_CALIBRATE".to_string(),
            "Perform mesh calibration".to_string(),
        )]));

        let mut ctx = CommandContext::new("bed_mesh_calibrate");
        app.tab.parse("bed_mesh_calibrate", &mut ctx).unwrap();
        assert!(ctx.command().is_some());
        assert!(app
            .tab
            .commands()
            .any(|(name, _)| name == "BED_MESH_CALIBRATE"));
    }
}
