#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use chrono::{NaiveDate, Weekday};
use club_core::{
    config::{ClubConfig, ConfigManager},
    core::{Club, FixedClock, RequestContext, Role},
    domain::{Member, Tariff, TimeWindow, TrainingSlot},
    errors::StoreError,
    store::{JsonTableStore, MemoryStore, Row, Table, TableStore},
};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn admin() -> RequestContext {
    RequestContext::new("admin", Role::Administrator)
}

pub fn accountant() -> RequestContext {
    RequestContext::new("tesorera", Role::Accountant)
}

pub fn coach() -> RequestContext {
    RequestContext::new("profe", Role::Coach)
}

/// Memory store that can be told to fail on demand.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    offline: AtomicBool,
    /// `append_many` writes at most this many rows, then reports failure.
    batch_limit: Mutex<Option<usize>>,
    /// Appends to this table fail without writing.
    failing_table: Mutex<Option<Table>>,
    /// `append_many` sleeps this long before writing.
    batch_delay: Mutex<Option<Duration>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn limit_batches(&self, limit: Option<usize>) {
        *self.batch_limit.lock().expect("batch limit lock") = limit;
    }

    pub fn fail_appends_to(&self, table: Option<Table>) {
        *self.failing_table.lock().expect("failing table lock") = table;
    }

    pub fn slow_batches(&self, delay: Option<Duration>) {
        *self.batch_delay.lock().expect("batch delay lock") = delay;
    }

    pub fn rows(&self, table: Table) -> usize {
        self.inner.len(table)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("store offline".into()));
        }
        Ok(())
    }

    fn check_table(&self, table: Table) -> Result<(), StoreError> {
        if *self.failing_table.lock().expect("failing table lock") == Some(table) {
            return Err(StoreError::Unreachable(format!("{} unavailable", table.name())));
        }
        Ok(())
    }
}

impl TableStore for FaultyStore {
    fn read_all(&self, table: Table) -> Result<Vec<Row>, StoreError> {
        self.check_online()?;
        self.inner.read_all(table)
    }

    fn append(&self, table: Table, row: Row) -> Result<(), StoreError> {
        self.check_online()?;
        self.check_table(table)?;
        self.inner.append(table, row)
    }

    fn append_many(&self, table: Table, rows: Vec<Row>) -> Result<(), StoreError> {
        self.check_online()?;
        self.check_table(table)?;
        let delay = *self.batch_delay.lock().expect("batch delay lock");
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        let limit = *self.batch_limit.lock().expect("batch limit lock");
        match limit {
            Some(limit) if limit < rows.len() => {
                let written: Vec<Row> = rows.into_iter().take(limit).collect();
                self.inner.append_many(table, written)?;
                Err(StoreError::Unreachable("connection dropped mid-batch".into()))
            }
            _ => self.inner.append_many(table, rows),
        }
    }

    fn find_and_update(
        &self,
        table: Table,
        id: &str,
        column: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        self.inner.find_and_update(table, id, column, value)
    }

    fn remove(&self, table: Table, id: &str) -> Result<(), StoreError> {
        self.check_online()?;
        self.inner.remove(table, id)
    }
}

pub struct Fixture {
    pub club: Club,
    pub clock: Arc<FixedClock>,
    pub store: Arc<FaultyStore>,
}

/// A club on `today` seeded with members, one tariff and the weekly template.
///
/// Members: `m1` Ana Paz (Senior), `m2` Leo Alba (no tariff), `m3` Eva Sosa,
/// and inactive `m4`. Slots: `mon-kids` and `mon-adults` share Monday
/// 18:00-19:00 at North; `wed-south` holds a single seat.
pub fn fixture_on(today: NaiveDate) -> Fixture {
    let store = Arc::new(FaultyStore::new());
    let clock = Arc::new(FixedClock::on(today));
    let club = Club::new(store.clone(), ClubConfig::default(), clock.clone());
    seed(&club);
    Fixture { club, clock, store }
}

/// Like [`fixture_on`], with every store call bounded by `config`.
pub fn bounded_fixture_on(today: NaiveDate, config: ClubConfig) -> Fixture {
    let store = Arc::new(FaultyStore::new());
    let clock = Arc::new(FixedClock::on(today));
    let club = Club::bounded(store.clone(), config, clock.clone());
    seed(&club);
    Fixture { club, clock, store }
}

pub fn seed(club: &Club) {
    let tables = club.tables();
    let members = [
        Member::new("m1", "Ana", "Paz").with_concept("Senior").with_site("North"),
        Member::new("m2", "Leo", "Alba").with_site("North"),
        Member::new("m3", "Eva", "Sosa").with_site("South"),
        Member::new("m4", "Old", "Timer").inactive(),
    ];
    for member in &members {
        tables.insert(member).expect("seed member");
    }
    tables
        .insert(&Tariff::new("Senior", Decimal::from(18000)))
        .expect("seed tariff");
    let slots = [
        slot("mon-kids", "North", Weekday::Mon, "18:00 - 19:00", "Kids", 2),
        slot("mon-adults", "North", Weekday::Mon, "18:00 - 19:00", "Adults", 10),
        slot("wed-south", "South", Weekday::Wed, "18:00 - 19:00", "Adults", 1),
    ];
    for slot in &slots {
        tables.insert(slot).expect("seed slot");
    }
}

pub fn slot(
    id: &str,
    site: &str,
    weekday: Weekday,
    window: &str,
    group: &str,
    capacity: u32,
) -> TrainingSlot {
    TrainingSlot {
        id: id.into(),
        site: site.into(),
        weekday,
        window: window.parse::<TimeWindow>().expect("window"),
        group: group.into(),
        coach: "Coach".into(),
        capacity,
    }
}

/// Creates an isolated JSON-backed club and config manager under a fresh temp dir.
pub fn setup_json_env(today: NaiveDate) -> (Club, ConfigManager, std::path::PathBuf) {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);

    let store = JsonTableStore::new(Some(base.join("tables"))).expect("create json store");
    let club = Club::new(
        Arc::new(store),
        ClubConfig::default(),
        Arc::new(FixedClock::on(today)),
    );
    let config_manager =
        ConfigManager::with_base_dir(base.clone()).expect("create config manager for temp dir");
    (club, config_manager, base)
}
