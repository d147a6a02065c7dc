//! Persisted application settings.
//!
//! Settings live in `config.json` under the platform config directory and
//! are mutable at runtime through `/set`. The [`SETTINGS`] table is the
//! single source of truth for which keys exist and how their values are
//! typed; it drives both the `/set` completion chain and assignment.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cmdinput::completer::{color_name, parse_color};
use crate::cmdinput::{
    AnythingCompleter, BoolTokenCompleter, ColorTokenCompleter, CtxValue, Next,
    StaticTokenCompleter,
};

/// A color stored as the token the user typed (`red`, `#ff8000`, `default`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigColor(pub String);

impl ConfigColor {
    pub fn color(&self) -> ratatui::style::Color {
        parse_color(&self.0).unwrap_or(ratatui::style::Color::Reset)
    }
}

impl From<&str> for ConfigColor {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Theme {
    pub border_color: ConfigColor,
    pub title_color: ConfigColor,
    pub primary_text_color: ConfigColor,
    pub secondary_text_color: ConfigColor,
    pub input_prompt_color: ConfigColor,
    pub input_text_color: ConfigColor,
    pub autocomplete_background_color: ConfigColor,
    pub autocomplete_text_color: ConfigColor,
    pub autocomplete_help_color: ConfigColor,
    pub console_background_color: ConfigColor,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            border_color: "#404040".into(),
            title_color: "yellow".into(),
            primary_text_color: "default".into(),
            secondary_text_color: "gray".into(),
            input_prompt_color: "yellow".into(),
            input_text_color: "default".into(),
            autocomplete_background_color: "gray".into(),
            autocomplete_text_color: "black".into(),
            autocomplete_help_color: "darkgray".into(),
            console_background_color: "default".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub log_incoming: bool,
    pub timestamp_format: String,
    pub check_updates_on_startup: bool,
    /// Regexes; a matching `notify_gcode_response` line is not shown.
    pub console_filter_patterns: Vec<String>,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_incoming: false,
            timestamp_format: "%H:%M:%S".to_string(),
            check_updates_on_startup: true,
            console_filter_patterns: Vec::new(),
            theme: Theme::default(),
        }
    }
}

/// How a setting's value is typed, which picks its completer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Bool,
    Color,
    Text,
}

/// Every key reachable through `/set`.
pub const SETTINGS: &[(&str, SettingKind)] = &[
    ("checkUpdatesOnStartup", SettingKind::Bool),
    ("logIncoming", SettingKind::Bool),
    ("timestampFormat", SettingKind::Text),
    ("theme.autocompleteBackgroundColor", SettingKind::Color),
    ("theme.autocompleteHelpColor", SettingKind::Color),
    ("theme.autocompleteTextColor", SettingKind::Color),
    ("theme.borderColor", SettingKind::Color),
    ("theme.consoleBackgroundColor", SettingKind::Color),
    ("theme.inputPromptColor", SettingKind::Color),
    ("theme.inputTextColor", SettingKind::Color),
    ("theme.primaryTextColor", SettingKind::Color),
    ("theme.secondaryTextColor", SettingKind::Color),
    ("theme.titleColor", SettingKind::Color),
];

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("no such setting: {0}")]
    UnknownKey(String),
    #[error("setting {key} expects a {expected} value")]
    TypeMismatch { key: String, expected: &'static str },
}

impl Config {
    /// Assign a `/set` value. Keys arrive in canonical casing from the
    /// settings completer.
    pub fn set(&mut self, key: &str, value: &CtxValue) -> Result<(), SettingsError> {
        let kind = SETTINGS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;

        match (kind, value) {
            (SettingKind::Bool, CtxValue::Bool(b)) => {
                match key {
                    "logIncoming" => self.log_incoming = *b,
                    "checkUpdatesOnStartup" => self.check_updates_on_startup = *b,
                    _ => return Err(SettingsError::UnknownKey(key.to_string())),
                }
                Ok(())
            }
            (SettingKind::Text, CtxValue::Str(s)) => {
                match key {
                    "timestampFormat" => self.timestamp_format = s.clone(),
                    _ => return Err(SettingsError::UnknownKey(key.to_string())),
                }
                Ok(())
            }
            (SettingKind::Color, CtxValue::Color(c)) => {
                let stored = ConfigColor(color_name(*c));
                match key {
                    "theme.borderColor" => self.theme.border_color = stored,
                    "theme.titleColor" => self.theme.title_color = stored,
                    "theme.primaryTextColor" => self.theme.primary_text_color = stored,
                    "theme.secondaryTextColor" => self.theme.secondary_text_color = stored,
                    "theme.inputPromptColor" => self.theme.input_prompt_color = stored,
                    "theme.inputTextColor" => self.theme.input_text_color = stored,
                    "theme.autocompleteBackgroundColor" => {
                        self.theme.autocomplete_background_color = stored
                    }
                    "theme.autocompleteTextColor" => self.theme.autocomplete_text_color = stored,
                    "theme.autocompleteHelpColor" => self.theme.autocomplete_help_color = stored,
                    "theme.consoleBackgroundColor" => {
                        self.theme.console_background_color = stored
                    }
                    _ => return Err(SettingsError::UnknownKey(key.to_string())),
                }
                Ok(())
            }
            (SettingKind::Bool, _) => Err(SettingsError::TypeMismatch {
                key: key.to_string(),
                expected: "boolean",
            }),
            (SettingKind::Color, _) => Err(SettingsError::TypeMismatch {
                key: key.to_string(),
                expected: "color",
            }),
            (SettingKind::Text, _) => Err(SettingsError::TypeMismatch {
                key: key.to_string(),
                expected: "text",
            }),
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = default_path()?;
        Self::load_from(&path)
    }

    /// Read the config file, writing the defaults first if it is missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = default_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

fn default_path() -> anyhow::Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "gantry")
        .ok_or_else(|| anyhow::anyhow!("no home directory"))?;
    Ok(dirs.config_dir().join("config.json"))
}

/// The `/set` argument chain: settings keys, each followed by a completer
/// for its value type.
pub fn settings_completer() -> StaticTokenCompleter {
    let mut completer = StaticTokenCompleter::new("setting");
    for (key, kind) in SETTINGS {
        let next = match kind {
            SettingKind::Bool => {
                Next::To(Arc::new(BoolTokenCompleter::new("value", Next::Done)))
            }
            SettingKind::Color => {
                Next::To(Arc::new(ColorTokenCompleter::new("value", Next::Done)))
            }
            SettingKind::Text => Next::To(Arc::new(AnythingCompleter::new("value"))),
        };
        completer.insert(key, next);
    }
    completer
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::Color;

    #[test]
    fn set_assigns_typed_values() {
        let mut config = Config::default();
        config
            .set("logIncoming", &CtxValue::Bool(true))
            .unwrap();
        assert!(config.log_incoming);

        config
            .set("theme.borderColor", &CtxValue::Color(Color::Rgb(0x11, 0x22, 0x33)))
            .unwrap();
        assert_eq!(config.theme.border_color.0, "#112233");
        assert_eq!(
            config.theme.border_color.color(),
            Color::Rgb(0x11, 0x22, 0x33)
        );

        config
            .set("timestampFormat", &CtxValue::Str("%H:%M".to_string()))
            .unwrap();
        assert_eq!(config.timestamp_format, "%H:%M");
    }

    #[test]
    fn set_rejects_unknown_keys_and_type_mismatches() {
        let mut config = Config::default();
        assert_eq!(
            config.set("nope", &CtxValue::Bool(true)),
            Err(SettingsError::UnknownKey("nope".to_string()))
        );
        assert!(matches!(
            config.set("logIncoming", &CtxValue::Str("yes".to_string())),
            Err(SettingsError::TypeMismatch { .. })
        ));
        assert!(matches!(
            config.set("theme.borderColor", &CtxValue::Bool(true)),
            Err(SettingsError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn every_settings_key_completes_and_assigns() {
        use crate::cmdinput::TokenCompleter;
        let completer = settings_completer();
        for (key, kind) in SETTINGS {
            let mut ctx = crate::cmdinput::CommandContext::new("");
            assert!(
                completer.match_token(key, &mut ctx).is_some(),
                "{key} missing from completer"
            );
            let value = match kind {
                SettingKind::Bool => CtxValue::Bool(true),
                SettingKind::Color => CtxValue::Color(Color::Red),
                SettingKind::Text => CtxValue::Str("x".to_string()),
            };
            let mut config = Config::default();
            config
                .set(key, &value)
                .unwrap_or_else(|e| panic!("{key}: {e}"));
        }
    }

    #[test]
    fn config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        // First load writes the defaults.
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let mut config = config;
        config.log_incoming = true;
        config.theme.title_color = "lightblue".into();
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
        assert_eq!(reloaded.theme.title_color.color(), Color::LightBlue);
    }

    #[test]
    fn unparseable_colors_fall_back_to_terminal_default() {
        let color = ConfigColor("not-a-color".to_string());
        assert_eq!(color.color(), Color::Reset);
    }
}
