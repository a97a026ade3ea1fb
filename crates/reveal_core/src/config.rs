use std::{collections::HashMap, fs, path::Path, time::Duration};

use thiserror::Error;
use tracing::warn;

pub const SETTINGS_FILE: &str = "reveal.toml";
const ENV_PREFIX: &str = "APP__";

const KEYS: [&str; 11] = [
    "max_taps",
    "max_units",
    "jitter_ms",
    "flash_ms",
    "stack_prepare_delay_ms",
    "collapse_ms",
    "deal_ms",
    "finish_settle_ms",
    "stack_scale",
    "stack_max_rotation_deg",
    "stack_bottom_margin",
];

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("unknown setting '{0}'")]
    UnknownKey(String),
    #[error("invalid value '{value}' for setting '{key}'")]
    InvalidValue { key: String, value: String },
    #[error("setting '{0}' must be positive")]
    NotPositive(&'static str),
}

/// Presentation parameters of the reveal flow. Durations are pacing only; the
/// flow never depends on wall-clock timing for correctness.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealSettings {
    pub max_taps: usize,
    pub max_units: u32,
    pub jitter_ms: u64,
    pub flash_ms: u64,
    pub stack_prepare_delay_ms: u64,
    pub collapse_ms: u64,
    pub deal_ms: u64,
    pub finish_settle_ms: u64,
    pub stack_scale: f64,
    pub stack_max_rotation_deg: f64,
    pub stack_bottom_margin: f64,
}

impl Default for RevealSettings {
    fn default() -> Self {
        Self {
            max_taps: 5,
            max_units: 10,
            jitter_ms: 150,
            flash_ms: 700,
            stack_prepare_delay_ms: 100,
            collapse_ms: 400,
            deal_ms: 500,
            finish_settle_ms: 800,
            stack_scale: 0.8,
            stack_max_rotation_deg: 5.0,
            stack_bottom_margin: 120.0,
        }
    }
}

impl RevealSettings {
    pub fn jitter_duration(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_ms)
    }

    pub fn stack_prepare_delay(&self) -> Duration {
        Duration::from_millis(self.stack_prepare_delay_ms)
    }

    pub fn collapse_duration(&self) -> Duration {
        Duration::from_millis(self.collapse_ms)
    }

    pub fn deal_duration(&self) -> Duration {
        Duration::from_millis(self.deal_ms)
    }

    pub fn finish_settle_delay(&self) -> Duration {
        Duration::from_millis(self.finish_settle_ms)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_taps == 0 {
            return Err(SettingsError::NotPositive("max_taps"));
        }
        if self.max_units == 0 {
            return Err(SettingsError::NotPositive("max_units"));
        }
        if self.stack_scale.is_nan() || self.stack_scale <= 0.0 {
            return Err(SettingsError::NotPositive("stack_scale"));
        }
        Ok(())
    }

    pub fn apply(&mut self, key: &str, raw: &str) -> Result<(), SettingsError> {
        let raw = raw.trim();
        match key {
            "max_taps" => self.max_taps = parse(key, raw)?,
            "max_units" => self.max_units = parse(key, raw)?,
            "jitter_ms" => self.jitter_ms = parse(key, raw)?,
            "flash_ms" => self.flash_ms = parse(key, raw)?,
            "stack_prepare_delay_ms" => self.stack_prepare_delay_ms = parse(key, raw)?,
            "collapse_ms" => self.collapse_ms = parse(key, raw)?,
            "deal_ms" => self.deal_ms = parse(key, raw)?,
            "finish_settle_ms" => self.finish_settle_ms = parse(key, raw)?,
            "stack_scale" => self.stack_scale = parse(key, raw)?,
            "stack_max_rotation_deg" => self.stack_max_rotation_deg = parse(key, raw)?,
            "stack_bottom_margin" => self.stack_bottom_margin = parse(key, raw)?,
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Applies every override in order, skipping the ones that do not parse.
    pub fn apply_overrides<I, K, V>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in overrides {
            let (key, value) = (key.as_ref(), value.as_ref());
            let previous = self.clone();
            if let Err(error) = self.apply(key, value) {
                warn!(key, value, %error, "settings: ignoring override");
                continue;
            }
            if let Err(error) = self.validate() {
                warn!(key, value, %error, "settings: override rejected");
                *self = previous;
            }
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, SettingsError> {
    raw.parse::<T>().map_err(|_| SettingsError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

/// Defaults, then `reveal.toml` in the working directory, then `APP__*` env vars.
pub fn load_settings() -> RevealSettings {
    load_settings_from(Path::new(SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> RevealSettings {
    let mut settings = RevealSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match file_overrides(&raw) {
            Ok(overrides) => settings.apply_overrides(overrides),
            Err(error) => warn!(
                path = %path.display(),
                %error,
                "settings: failed to parse settings file"
            ),
        }
    }

    settings.apply_overrides(env_overrides());
    settings
}

fn file_overrides(raw: &str) -> Result<Vec<(String, String)>, toml::de::Error> {
    let table = toml::from_str::<HashMap<String, toml::Value>>(raw)?;
    let mut overrides: Vec<(String, String)> = table
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(text) => text,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect();
    overrides.sort();
    Ok(overrides)
}

fn env_overrides() -> Vec<(String, String)> {
    KEYS.iter()
        .filter_map(|key| {
            let name = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
            std::env::var(name).ok().map(|value| (key.to_string(), value))
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
