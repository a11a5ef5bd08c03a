//! Configuration file management for adsb-table.
//!
//! Reads/writes `~/.adsb-table/config.yaml` with the CPR pair window, input
//! file filter, and output settings. Command-line flags override these.

use std::path::{Path, PathBuf};

use crate::fusion::DEFAULT_PAIR_WINDOW;
use crate::types::AdsbError;

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub fusion: FusionConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    /// Maximum seconds between even and odd CPR frames
    pub pair_window: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputConfig {
    /// File name filter applied when a directory is given, e.g. `?????`
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub path: String,
    /// zstd level for Parquet output
    pub compression: i32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            fusion: FusionConfig {
                pair_window: DEFAULT_PAIR_WINDOW,
            },
            input: InputConfig { pattern: None },
            output: OutputConfig {
                path: "adsb_data.parquet".into(),
                compression: 8,
            },
        }
    }
}

/// Get the config directory path (`~/.adsb-table/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".adsb-table")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.adsb-table/config.yaml`.
///
/// Returns default config if file doesn't exist.
pub fn load_config() -> Config {
    load_config_from(&config_file())
}

/// Load config from an explicit path, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(text) => parse_config(&text).unwrap_or_default(),
        Err(e) => {
            tracing::warn!("cannot read {}: {e}, using defaults", path.display());
            Config::default()
        }
    }
}

/// Save config to `~/.adsb-table/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf, AdsbError> {
    let path = config_file();
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save config to an explicit path, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), AdsbError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| AdsbError::Config(e.to_string()))?;
    }
    std::fs::write(path, serialize_config(config)).map_err(|e| AdsbError::Config(e.to_string()))
}

/// Parse simple YAML-like config text.
fn parse_config(text: &str) -> Option<Config> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then(|| key.to_string());
            continue;
        }

        match (current_section.as_deref(), key) {
            (Some("fusion"), "pair_window") => {
                if let Some(v) = parse_float_value(val).filter(|v| *v > 0.0) {
                    config.fusion.pair_window = v;
                }
            }
            (Some("input"), "pattern") => config.input.pattern = parse_string_value(val),
            (Some("output"), "path") => {
                if let Some(v) = parse_string_value(val) {
                    config.output.path = v;
                }
            }
            (Some("output"), "compression") => {
                if let Ok(v) = val.parse::<i32>() {
                    config.output.compression = v;
                }
            }
            _ => {}
        }
    }

    Some(config)
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn parse_float_value(val: &str) -> Option<f64> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    val.parse().ok()
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# adsb-table configuration".to_string(), String::new()];

    lines.push("fusion:".into());
    lines.push(format!("  pair_window: {}", config.fusion.pair_window));
    lines.push(String::new());

    lines.push("input:".into());
    match &config.input.pattern {
        Some(p) => lines.push(format!("  pattern: \"{p}\"")),
        None => lines.push("  pattern: null".into()),
    }
    lines.push(String::new());

    lines.push("output:".into());
    lines.push(format!("  path: \"{}\"", config.output.path));
    lines.push(format!("  compression: {}", config.output.compression));

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
