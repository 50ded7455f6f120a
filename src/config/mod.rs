//! Runtime configuration: local JSON file plus the shared `config` table overlay.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

use crate::core::errors::ValidationError;
use crate::domain::period::MAX_CUTOFF_DAY;
use crate::errors::StoreError;
use crate::store::ConfigEntry;
use crate::utils::paths::{self, ensure_dir};
use crate::utils::persistence::save_json;

pub const CUTOFF_DAY_KEY: &str = "cutoff_day";
pub const DUE_DAY_KEY: &str = "due_day";
pub const DEFAULT_DUE_AMOUNT_KEY: &str = "default_due_amount";
pub const GUEST_SESSION_PRICE_KEY: &str = "guest_session_price";

/// Billing settings and store call limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClubConfig {
    /// Day of month from which dues target the following month.
    #[serde(default = "ClubConfig::default_cutoff_day")]
    pub cutoff_day: u32,
    /// Day of month after which unpaid recurring dues raise an alert.
    #[serde(default = "ClubConfig::default_due_day")]
    pub due_day: u32,
    #[serde(default = "ClubConfig::default_due_amount")]
    pub default_due_amount: Decimal,
    #[serde(default = "ClubConfig::default_guest_session_price")]
    pub guest_session_price: Decimal,
    #[serde(default = "ClubConfig::default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "ClubConfig::default_store_retries")]
    pub store_retries: u32,
    #[serde(default = "ClubConfig::default_store_backoff_ms")]
    pub store_backoff_ms: u64,
    #[serde(default = "ClubConfig::default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Directory holding the tables, when not next to `config.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for ClubConfig {
    fn default() -> Self {
        Self {
            cutoff_day: Self::default_cutoff_day(),
            due_day: Self::default_due_day(),
            default_due_amount: Self::default_due_amount(),
            guest_session_price: Self::default_guest_session_price(),
            store_timeout_ms: Self::default_store_timeout_ms(),
            store_retries: Self::default_store_retries(),
            store_backoff_ms: Self::default_store_backoff_ms(),
            lock_timeout_ms: Self::default_lock_timeout_ms(),
            data_dir: None,
        }
    }
}

impl ClubConfig {
    pub fn default_cutoff_day() -> u32 {
        19
    }

    pub fn default_due_day() -> u32 {
        10
    }

    pub fn default_due_amount() -> Decimal {
        Decimal::from(15000)
    }

    pub fn default_guest_session_price() -> Decimal {
        Decimal::from(5000)
    }

    pub fn default_store_timeout_ms() -> u64 {
        5000
    }

    pub fn default_store_retries() -> u32 {
        2
    }

    pub fn default_store_backoff_ms() -> u64 {
        200
    }

    pub fn default_lock_timeout_ms() -> u64 {
        2000
    }

    /// Applies billing keys from the shared config table. Unknown keys are ignored.
    pub fn apply_entries(&mut self, entries: &[ConfigEntry]) -> Result<(), ValidationError> {
        for entry in entries {
            match entry.key.trim() {
                CUTOFF_DAY_KEY => self.cutoff_day = parse_day(&entry.key, &entry.value)?,
                DUE_DAY_KEY => self.due_day = parse_day(&entry.key, &entry.value)?,
                DEFAULT_DUE_AMOUNT_KEY => {
                    self.default_due_amount = parse_price(&entry.value)?;
                }
                GUEST_SESSION_PRICE_KEY => {
                    self.guest_session_price = parse_price(&entry.value)?;
                }
                other => debug!(key = other, "ignoring unknown config key"),
            }
        }
        Ok(())
    }

    pub fn with_entries(mut self, entries: &[ConfigEntry]) -> Result<Self, ValidationError> {
        self.apply_entries(entries)?;
        Ok(self)
    }
}

fn parse_day(key: &str, raw: &str) -> Result<u32, ValidationError> {
    let day = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::Invalid(format!("`{key}` must be a day number, got `{raw}`")))?;
    if !(1..=MAX_CUTOFF_DAY).contains(&day) {
        return Err(ValidationError::InvalidCutoff(day));
    }
    Ok(day)
}

fn parse_price(raw: &str) -> Result<Decimal, ValidationError> {
    let price = Decimal::from_str(raw.trim())
        .map_err(|_| ValidationError::InvalidAmount(raw.trim().to_string()))?;
    if price.is_sign_negative() {
        return Err(ValidationError::InvalidAmount(raw.trim().to_string()));
    }
    Ok(price)
}

/// The local `config.json` under a club's data directory.
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, StoreError> {
        Self::with_base_dir(paths::app_data_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self, StoreError> {
        ensure_dir(&base)?;
        Ok(Self {
            path: paths::config_file_in(&base),
        })
    }

    /// The saved config, or defaults when none was written yet.
    pub fn load(&self) -> Result<ClubConfig, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no local config; using defaults");
            return Ok(ClubConfig::default());
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, config: &ClubConfig) -> Result<(), StoreError> {
        save_json(&self.path, config)?;
        info!(path = %self.path.display(), "local config saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(key: &str, value: &str) -> ConfigEntry {
        ConfigEntry {
            key: key.into(),
            value: value.into(),
        }
    }

    #[test]
    fn table_entries_override_billing_keys() {
        let config = ClubConfig::default()
            .with_entries(&[
                entry("cutoff_day", "21"),
                entry("guest_session_price", "4500"),
                entry("theme", "dark"),
            ])
            .unwrap();
        assert_eq!(config.cutoff_day, 21);
        assert_eq!(config.guest_session_price, Decimal::from(4500));
        assert_eq!(config.due_day, 10);
    }

    #[test]
    fn malformed_entries_are_rejected() {
        let err = ClubConfig::default()
            .with_entries(&[entry("cutoff_day", "31")])
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidCutoff(31));
        assert!(ClubConfig::default()
            .with_entries(&[entry("default_due_amount", "lots")])
            .is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ClubConfig = serde_json::from_str(r#"{"cutoff_day": 5}"#).unwrap();
        assert_eq!(config.cutoff_day, 5);
        assert_eq!(config.store_timeout_ms, 5000);
    }

    #[test]
    fn saved_config_loads_back() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).unwrap();
        assert_eq!(manager.load().unwrap(), ClubConfig::default());

        let config = ClubConfig {
            due_day: 12,
            data_dir: Some(temp.path().join("shared")),
            ..ClubConfig::default()
        };
        manager.save(&config).unwrap();
        assert_eq!(manager.load().unwrap(), config);
        assert_eq!(manager.path(), temp.path().join("config.json"));
    }

    #[test]
    fn unreadable_config_is_a_serde_error() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).unwrap();
        fs::write(manager.path(), "cutoff_day = 5").unwrap();
        assert!(matches!(manager.load(), Err(StoreError::Serde(_))));
    }
}
