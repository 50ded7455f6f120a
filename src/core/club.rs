use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::{ClubConfig, ConfigManager};
use crate::core::errors::CoreResult;
use crate::core::locks::KeyedLocks;
use crate::core::time::{Clock, SystemClock};
use crate::domain::{PeriodCalculator, PeriodLabel};
use crate::store::{
    BoundedStore, ConfigEntry, JsonTableStore, MemoryStore, StorePolicy, TableStore, Tables,
};
use crate::utils::paths;

/// Facade that ties the table store, settings, clock and locks together.
///
/// Services borrow a `Club` for each call; cloning it shares the store and the
/// lock set, so clones handed to other threads still exclude each other.
#[derive(Clone)]
pub struct Club {
    tables: Tables,
    config: ClubConfig,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks>,
}

impl Club {
    pub fn new(store: Arc<dyn TableStore>, config: ClubConfig, clock: Arc<dyn Clock>) -> Self {
        let locks = Arc::new(KeyedLocks::new(Duration::from_millis(config.lock_timeout_ms)));
        Self {
            tables: Tables::new(store),
            config,
            clock,
            locks,
        }
    }

    /// Same as [`Club::new`] with every store call bounded by the configured policy.
    pub fn bounded(store: Arc<dyn TableStore>, config: ClubConfig, clock: Arc<dyn Clock>) -> Self {
        let policy = StorePolicy::from_config(&config);
        let bounded: Arc<dyn TableStore> = Arc::new(BoundedStore::new(store, policy));
        Self::new(bounded, config, clock)
    }

    pub fn in_memory(config: ClubConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config, Arc::new(SystemClock))
    }

    /// Opens the club kept in the application data directory.
    pub fn open() -> CoreResult<Self> {
        Self::open_in(paths::app_data_dir())
    }

    /// Loads `config.json` from `base` and opens the JSON tables it points at:
    /// `data_dir` when set, otherwise `base` itself.
    pub fn open_in(base: PathBuf) -> CoreResult<Self> {
        let config = ConfigManager::with_base_dir(base.clone())?.load()?;
        let root = paths::tables_dir_in(config.data_dir.as_deref().unwrap_or(&base));
        let store = JsonTableStore::new(Some(root))?;
        info!(
            root = %store.root().display(),
            cutoff_day = config.cutoff_day,
            "opened club tables"
        );
        Ok(Self::bounded(Arc::new(store), config, Arc::new(SystemClock)))
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Local settings as loaded, before the shared config table is applied.
    pub fn config(&self) -> &ClubConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub(crate) fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// Effective settings: local config overlaid with the store's config table.
    pub fn settings(&self) -> CoreResult<ClubConfig> {
        let entries: Vec<ConfigEntry> = self.tables.all()?;
        debug!(entries = entries.len(), "applying shared config entries");
        Ok(self.config.clone().with_entries(&entries)?)
    }

    pub fn period_calculator(&self) -> CoreResult<PeriodCalculator> {
        Ok(PeriodCalculator::new(self.settings()?.cutoff_day)?)
    }

    /// Billing period targeted today under the effective cutoff day.
    pub fn active_period(&self) -> CoreResult<PeriodLabel> {
        Ok(self.period_calculator()?.active_period(self.today()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::CoreError;
    use crate::core::time::FixedClock;
    use crate::store::{Record, Table};

    fn club_on(date: NaiveDate, store: Arc<MemoryStore>) -> Club {
        Club::new(store, ClubConfig::default(), Arc::new(FixedClock::on(date)))
    }

    #[test]
    fn shared_config_overrides_local_cutoff() {
        let store = Arc::new(MemoryStore::new());
        let club = club_on(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(), store.clone());
        assert_eq!(club.active_period().unwrap().to_string(), "March 2025");

        let entry = ConfigEntry {
            key: "cutoff_day".into(),
            value: "10".into(),
        };
        store.seed(Table::Config, vec![entry.to_row()]);
        assert_eq!(club.settings().unwrap().cutoff_day, 10);
        assert_eq!(club.active_period().unwrap().to_string(), "April 2025");
    }

    #[test]
    fn out_of_range_shared_cutoff_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            Table::Config,
            vec![vec!["cutoff_day".to_string(), "31".to_string()]],
        );
        let club = club_on(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(), store);
        assert!(matches!(club.active_period(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn clones_share_locks() {
        let club = Club::in_memory(ClubConfig::default());
        let other = club.clone();
        let _guard = club.locks().acquire("period:March 2025").unwrap();
        assert!(other.locks().is_held("period:March 2025"));
    }
}
