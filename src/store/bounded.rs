use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::config::ClubConfig;
use crate::errors::StoreError;

use super::{Result, Row, Table, TableStore};

/// Deadline and retry limits applied to every store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    pub timeout: Duration,
    /// Extra attempts for idempotent calls after a transient failure.
    pub retries: u32,
    pub backoff: Duration,
}

impl StorePolicy {
    pub fn from_config(config: &ClubConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.store_timeout_ms),
            retries: config.store_retries,
            backoff: Duration::from_millis(config.store_backoff_ms),
        }
    }
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self::from_config(&ClubConfig::default())
    }
}

/// Writes whose worker thread has not returned yet, per table.
///
/// A write the caller stopped waiting for stays counted until the worker
/// finishes, so nobody reads or writes the table around it.
#[derive(Default)]
struct WritesInFlight {
    counts: Mutex<HashMap<Table, usize>>,
    settled: Condvar,
}

impl WritesInFlight {
    fn start(self: &Arc<Self>, table: Table) -> WriteTicket {
        *self.counts.lock().entry(table).or_insert(0) += 1;
        WriteTicket {
            writes: Arc::clone(self),
            table,
        }
    }

    /// Waits until no write to `table` is running; false if `timeout` ran out first.
    fn wait_settled(&self, table: Table, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut counts = self.counts.lock();
        while counts.contains_key(&table) {
            if self.settled.wait_until(&mut counts, deadline).timed_out() {
                return !counts.contains_key(&table);
            }
        }
        true
    }

    fn running(&self, table: Table) -> usize {
        self.counts.lock().get(&table).copied().unwrap_or(0)
    }
}

/// Held by a write's worker thread; releases the table when dropped.
struct WriteTicket {
    writes: Arc<WritesInFlight>,
    table: Table,
}

impl Drop for WriteTicket {
    fn drop(&mut self) {
        let mut counts = self.writes.counts.lock();
        if let Some(count) = counts.get_mut(&self.table) {
            *count -= 1;
            if *count == 0 {
                counts.remove(&self.table);
            }
        }
        self.writes.settled.notify_all();
    }
}

/// Wraps a store so no call blocks past its deadline.
///
/// Reads and `find_and_update` are retried on transient failures. Appends and
/// removals are not: a timed-out call may still complete on the worker thread,
/// so repeating it could write twice. Until such a write finishes, every other
/// call on its table waits for it and fails with [`StoreError::Unsettled`] once
/// its own deadline passes. A re-read therefore never sees a half-known table.
pub struct BoundedStore {
    inner: Arc<dyn TableStore>,
    policy: StorePolicy,
    writes: Arc<WritesInFlight>,
}

impl BoundedStore {
    pub fn new(inner: Arc<dyn TableStore>, policy: StorePolicy) -> Self {
        Self {
            inner,
            policy,
            writes: Arc::default(),
        }
    }

    pub fn policy(&self) -> StorePolicy {
        self.policy
    }

    /// Writes to `table` still running on a worker thread.
    pub fn writes_in_flight(&self, table: Table) -> usize {
        self.writes.running(table)
    }

    fn read<T, F>(&self, operation: &'static str, table: Table, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn TableStore) -> Result<T> + Send + 'static,
    {
        self.call(operation, table, false, work)
    }

    fn write<F>(&self, operation: &'static str, table: Table, work: F) -> Result<()>
    where
        F: FnOnce(&dyn TableStore) -> Result<()> + Send + 'static,
    {
        self.call(operation, table, true, work)
    }

    fn call<T, F>(
        &self,
        operation: &'static str,
        table: Table,
        tracked: bool,
        work: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn TableStore) -> Result<T> + Send + 'static,
    {
        let started = Instant::now();
        if !self.writes.wait_settled(table, self.policy.timeout) {
            warn!(operation, table = %table, "earlier write still running");
            return Err(StoreError::Unsettled {
                operation,
                table: table.name().to_string(),
            });
        }
        let remaining = self.policy.timeout.saturating_sub(started.elapsed());
        let ticket = tracked.then(|| self.writes.start(table));
        let inner = Arc::clone(&self.inner);
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("store-{operation}"))
            .spawn(move || {
                let outcome = work(inner.as_ref());
                drop(ticket);
                // The receiver is gone once the deadline passed; nothing to report.
                let _ = tx.send(outcome);
            })?;
        match rx.recv_timeout(remaining) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                let elapsed = started.elapsed();
                warn!(operation, table = %table, ?elapsed, "store call timed out");
                Err(StoreError::Timeout {
                    operation,
                    table: table.name().to_string(),
                    elapsed,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::Unreachable(format!(
                "store worker for `{operation}` exited without a result"
            ))),
        }
    }

    fn with_retry<T>(
        &self,
        operation: &'static str,
        table: Table,
        mut attempt: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let mut retries = 0;
        loop {
            match attempt() {
                Err(err) if err.is_transient() && retries < self.policy.retries => {
                    retries += 1;
                    warn!(operation, table = %table, retries, error = %err, "retrying store call");
                    thread::sleep(self.policy.backoff * retries);
                }
                outcome => return outcome,
            }
        }
    }
}

impl TableStore for BoundedStore {
    fn read_all(&self, table: Table) -> Result<Vec<Row>> {
        self.with_retry("read_all", table, || {
            self.read("read_all", table, move |store| store.read_all(table))
        })
    }

    fn append(&self, table: Table, row: Row) -> Result<()> {
        self.write("append", table, move |store| store.append(table, row))
    }

    fn append_many(&self, table: Table, rows: Vec<Row>) -> Result<()> {
        self.write("append_many", table, move |store| {
            store.append_many(table, rows)
        })
    }

    fn find_and_update(&self, table: Table, id: &str, column: &str, value: &str) -> Result<()> {
        self.with_retry("find_and_update", table, || {
            let (id, column, value) = (id.to_string(), column.to_string(), value.to_string());
            self.write("find_and_update", table, move |store| {
                store.find_and_update(table, &id, &column, &value)
            })
        })
    }

    fn remove(&self, table: Table, id: &str) -> Result<()> {
        let id = id.to_string();
        self.write("remove", table, move |store| store.remove(table, &id))
    }
}
