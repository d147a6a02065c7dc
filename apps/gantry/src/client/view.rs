//! Rendering: header line, output log, input line, suggestion drop-down.

use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Clear, List, ListItem, ListState, Paragraph};
use ratatui::Frame;

use crate::client::app::App;
use crate::config::Config;
use crate::rpc::ConnectionState;

const MENU_MAX_HEIGHT: u16 = 8;
const PROMPT: &str = "> ";

/// Theme colors resolved once per config change, not per frame.
pub struct Palette {
    pub border: Color,
    pub title: Color,
    pub primary: Color,
    pub secondary: Color,
    pub input_prompt: Color,
    pub input_text: Color,
    pub menu_background: Color,
    pub menu_text: Color,
    pub menu_help: Color,
    pub console_background: Color,
}

impl Palette {
    pub fn from_config(config: &Config) -> Self {
        let theme = &config.theme;
        Self {
            border: theme.border_color.color(),
            title: theme.title_color.color(),
            primary: theme.primary_text_color.color(),
            secondary: theme.secondary_text_color.color(),
            input_prompt: theme.input_prompt_color.color(),
            input_text: theme.input_text_color.color(),
            menu_background: theme.autocomplete_background_color.color(),
            menu_text: theme.autocomplete_text_color.color(),
            menu_help: theme.autocomplete_help_color.color(),
            console_background: theme.console_background_color.color(),
        }
    }
}

pub fn render(frame: &mut Frame, app: &App) {
    let rows = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .split(frame.area());

    render_header(frame, app, rows[0]);
    render_output(frame, app, rows[1]);
    render_input(frame, app, rows[2]);
    render_menu(frame, app, rows[1], rows[2]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let palette = &app.palette;
    let mut spans = vec![
        Span::styled(
            " gantry ",
            Style::default()
                .fg(palette.title)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("· ", Style::default().fg(palette.border)),
    ];

    match app.services.rpc.state() {
        ConnectionState::Connected => {
            let target = app
                .status
                .hostname
                .clone()
                .or_else(|| app.services.rpc.url().map(|u| u.to_string()))
                .unwrap_or_default();
            spans.push(Span::styled(target, Style::default().fg(palette.primary)));
        }
        ConnectionState::Connecting => {
            spans.push(Span::styled(
                "connecting...",
                Style::default().fg(palette.secondary),
            ));
        }
        ConnectionState::Disconnected => {
            spans.push(Span::styled(
                "disconnected",
                Style::default().fg(Color::Red),
            ));
        }
    }

    if let Some(state) = &app.status.klippy_state {
        let color = if app.status.klippy_connected && state == "ready" {
            palette.secondary
        } else {
            Color::Red
        };
        spans.push(Span::styled(
            format!("  klippy: {state}"),
            Style::default().fg(color),
        ));
    }
    if let Some(print_state) = app.status.print_state() {
        if print_state != "standby" {
            spans.push(Span::styled(
                format!("  print: {print_state}"),
                Style::default().fg(palette.title),
            ));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Format with the configured strftime pattern, falling back when the
/// pattern is invalid (formatting would otherwise panic mid-frame).
fn format_timestamp(at: &chrono::DateTime<chrono::Local>, pattern: &str) -> String {
    use chrono::format::{Item, StrftimeItems};
    let items: Vec<Item> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return at.format("%H:%M:%S").to_string();
    }
    at.format_with_items(items.into_iter()).to_string()
}

fn render_output(frame: &mut Frame, app: &App, area: Rect) {
    let palette = &app.palette;
    let format = app.services.config.read().timestamp_format.clone();
    let lines: Vec<Line> = app
        .output
        .visible(area.height as usize)
        .map(|entry| {
            let timestamp = Span::styled(
                format!("{} ", format_timestamp(&entry.at, &format)),
                Style::default().fg(palette.secondary),
            );
            let body = match entry.kind {
                crate::client::LogKind::Command => Span::styled(
                    format!("{PROMPT}{}", entry.text),
                    Style::default()
                        .fg(palette.primary)
                        .add_modifier(Modifier::BOLD),
                ),
                crate::client::LogKind::Response => {
                    Span::styled(entry.text.clone(), Style::default().fg(palette.primary))
                }
                crate::client::LogKind::Error => {
                    Span::styled(entry.text.clone(), Style::default().fg(Color::Red))
                }
                crate::client::LogKind::Internal => Span::styled(
                    entry.text.clone(),
                    Style::default()
                        .fg(palette.title)
                        .add_modifier(Modifier::ITALIC),
                ),
            };
            Line::from(vec![timestamp, body])
        })
        .collect();

    frame.render_widget(
        Paragraph::new(lines).style(Style::default().bg(palette.console_background)),
        area,
    );
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let palette = &app.palette;
    let line = Line::from(vec![
        Span::styled(
            PROMPT,
            Style::default()
                .fg(palette.input_prompt)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            app.input.text().to_string(),
            Style::default().fg(palette.input_text),
        ),
    ]);
    frame.render_widget(Paragraph::new(line), area);

    let cursor_col = PROMPT.len() + app.input.text()[..app.input.cursor()].chars().count();
    let x = area.x + (cursor_col as u16).min(area.width.saturating_sub(1));
    frame.set_cursor_position(Position::new(x, area.y));
}

fn render_menu(frame: &mut Frame, app: &App, output_area: Rect, input_area: Rect) {
    let Some(menu) = &app.menu else { return };
    if menu.suggestions.is_empty() || output_area.height == 0 {
        return;
    }
    let palette = &app.palette;

    let height = (menu.suggestions.len() as u16)
        .min(MENU_MAX_HEIGHT)
        .min(output_area.height);
    let width = menu
        .suggestions
        .iter()
        .map(|s| {
            let help = if s.help.is_empty() {
                0
            } else {
                s.help.chars().count() + 3
            };
            s.text.chars().count() + help
        })
        .max()
        .unwrap_or(0)
        .min(frame.area().width as usize) as u16;

    // Anchor the drop-down where the completing token starts, directly
    // above the input line.
    let token_col =
        PROMPT.len() + app.input.text()[..menu.offset.min(app.input.text().len())].chars().count();
    let x = (input_area.x + token_col as u16)
        .min(frame.area().width.saturating_sub(width));
    let y = input_area.y.saturating_sub(height);
    let area = Rect::new(x, y, width, height);

    let items: Vec<ListItem> = menu
        .suggestions
        .iter()
        .map(|s| {
            let mut spans = vec![Span::styled(
                s.text.clone(),
                Style::default().fg(palette.menu_text),
            )];
            if !s.help.is_empty() {
                spans.push(Span::styled(
                    format!(" - {}", s.help),
                    Style::default()
                        .fg(palette.menu_help)
                        .add_modifier(Modifier::ITALIC),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .style(Style::default().bg(palette.menu_background))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    state.select(Some(menu.selected));

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
}
