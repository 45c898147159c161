//! Configuration for rely.
//!
//! Precedence, lowest first: built-in defaults, the JSON config file, then
//! environment variables (a `.env` file in the working directory counts).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{OpsError, OpsResult};

/// Default store location, relative to the repository root.
pub const DEFAULT_STORE_PATH: &str = ".rely/relations.tsv";

/// When to emit ANSI colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Colour when writing to a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for ColorMode {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorMode::Auto),
            "always" => Ok(ColorMode::Always),
            "never" => Ok(ColorMode::Never),
            other => Err(OpsError::Config(format!(
                "Invalid color mode: {} (expected auto, always or never)",
                other
            ))),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Auto => write!(f, "auto"),
            ColorMode::Always => write!(f, "always"),
            ColorMode::Never => write!(f, "never"),
        }
    }
}

/// Configuration for rely operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Relations store; relative paths are taken from the repository root.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Colour policy for terminal output.
    #[serde(default)]
    pub color: ColorMode,

    /// Whether `status` without arguments lists up-to-date files too.
    #[serde(default = "default_show_clean")]
    pub show_clean: bool,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

fn default_show_clean() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            color: ColorMode::default(),
            show_clean: default_show_clean(),
        }
    }
}

impl Config {
    /// Keys accepted by [`Config::get`] and [`Config::set`].
    pub const KEYS: [&'static str; 3] = ["store_path", "color", "show_clean"];

    /// Load configuration from disk with environment overrides.
    pub fn load() -> OpsResult<Self> {
        // Load .env file if present (silently ignore if missing)
        let _ = dotenvy::dotenv();

        Self::from_file()?.with_env(|key| std::env::var(key).ok())
    }

    /// Load only the config file, without environment overrides.
    pub fn from_file() -> OpsResult<Self> {
        match Self::config_file_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)?;
                Ok(serde_json::from_str(&contents)?)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Apply environment overrides looked up through `lookup`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> OpsResult<Self> {
        if let Some(store) = lookup("RELY_STORE") {
            self.store_path = PathBuf::from(store);
        }
        if let Some(color) = lookup("RELY_COLOR") {
            self.color = color.parse()?;
        }
        if lookup("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            self.color = ColorMode::Never;
        }
        if let Some(show) = lookup("RELY_SHOW_CLEAN") {
            self.show_clean = parse_bool(&show)?;
        }
        Ok(self)
    }

    /// Save configuration to disk.
    pub fn save(&self) -> OpsResult<()> {
        if let Some(path) = Self::config_file_path() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(self)?;
            std::fs::write(&path, contents)?;
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_file_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "rely", "rely").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "store_path" => Some(self.store_path.display().to_string()),
            "color" => Some(self.color.to_string()),
            "show_clean" => Some(self.show_clean.to_string()),
            _ => None,
        }
    }

    /// Set a configuration value by key.
    pub fn set(&mut self, key: &str, value: &str) -> OpsResult<()> {
        match key {
            "store_path" => self.store_path = PathBuf::from(value),
            "color" => self.color = value.parse()?,
            "show_clean" => self.show_clean = parse_bool(value)?,
            _ => {
                return Err(OpsError::Config(format!("Unknown config key: {}", key)));
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> OpsResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(OpsError::Config(format!("Invalid boolean: {}", value))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let config = Config::default()
            .with_env(env(&[
                ("RELY_STORE", "deps.tsv"),
                ("RELY_COLOR", "always"),
                ("RELY_SHOW_CLEAN", "no"),
            ]))
            .unwrap();
        assert_eq!(config.store_path, PathBuf::from("deps.tsv"));
        assert_eq!(config.color, ColorMode::Always);
        assert!(!config.show_clean);
    }

    #[test]
    fn test_no_color_wins() {
        let config = Config::default()
            .with_env(env(&[("RELY_COLOR", "always"), ("NO_COLOR", "1")]))
            .unwrap();
        assert_eq!(config.color, ColorMode::Never);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        assert!(matches!(
            Config::default().with_env(env(&[("RELY_COLOR", "sometimes")])),
            Err(OpsError::Config(_))
        ));
        let mut config = Config::default();
        assert!(config.set("nope", "1").is_err());
        assert!(config.set("show_clean", "maybe").is_err());
    }

    #[test]
    fn test_get_set_round_trip() {
        let mut config = Config::default();
        config.set("color", "never").unwrap();
        config.set("store_path", "/tmp/r.tsv").unwrap();
        assert_eq!(config.get("color").as_deref(), Some("never"));
        assert_eq!(config.get("store_path").as_deref(), Some("/tmp/r.tsv"));
        assert_eq!(config.get("unknown"), None);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"color":"never"}"#).unwrap();
        assert_eq!(config.store_path, PathBuf::from(DEFAULT_STORE_PATH));
        assert!(config.show_clean);
        assert_eq!(config.color, ColorMode::Never);
    }
}
