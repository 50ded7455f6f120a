use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::core::errors::{CoreError, CoreResult};

/// Named mutual exclusion with a bounded wait.
///
/// Serializes read-then-write sequences (per period, slot, member or due) inside
/// one process. Keys are not reentrant.
#[derive(Debug)]
pub struct KeyedLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
    wait: Duration,
}

impl KeyedLocks {
    pub fn new(wait: Duration) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            wait,
        }
    }

    pub fn acquire(&self, key: impl Into<String>) -> CoreResult<KeyGuard<'_>> {
        let key = key.into();
        let deadline = Instant::now() + self.wait;
        let mut held = self.held.lock();
        while held.contains(&key) {
            if self.released.wait_until(&mut held, deadline).timed_out() && held.contains(&key) {
                warn!(key = %key, wait = ?self.wait, "lock wait expired");
                return Err(CoreError::Busy(key));
            }
        }
        held.insert(key.clone());
        Ok(KeyGuard { locks: self, key })
    }

    /// Acquires several keys in sorted order so concurrent callers cannot deadlock.
    pub fn acquire_all(&self, keys: &[String]) -> CoreResult<Vec<KeyGuard<'_>>> {
        let mut ordered = keys.to_vec();
        ordered.sort();
        ordered.dedup();
        ordered.into_iter().map(|key| self.acquire(key)).collect()
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.lock().contains(key)
    }
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.key);
        self.locks.released.notify_all();
    }
}

pub fn period_key(period: impl std::fmt::Display) -> String {
    format!("period:{period}")
}

pub fn slot_key(slot_id: &str) -> String {
    format!("slot:{slot_id}")
}

pub fn member_key(member_id: &str) -> String {
    format!("member:{member_id}")
}

pub fn due_key(due_id: &str) -> String {
    format!("due:{due_id}")
}

/// One attendance sheet: a slot on a given day.
pub fn sheet_key(slot_id: &str, date: impl std::fmt::Display) -> String {
    format!("sheet:{slot_id}:{date}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn second_holder_waits_then_gives_up() {
        let locks = KeyedLocks::new(Duration::from_millis(20));
        let guard = locks.acquire("period:March 2025").unwrap();
        assert!(matches!(
            locks.acquire("period:March 2025"),
            Err(CoreError::Busy(_))
        ));
        assert!(locks.acquire("period:April 2025").is_ok());
        drop(guard);
        assert!(!locks.is_held("period:March 2025"));
        assert!(locks.acquire("period:March 2025").is_ok());
    }

    #[test]
    fn waiter_proceeds_once_released() {
        let locks = Arc::new(KeyedLocks::new(Duration::from_secs(2)));
        let guard = locks.acquire("slot:s1").unwrap();
        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || locks.acquire("slot:s1").map(|_| ()).is_ok())
        };
        thread::sleep(Duration::from_millis(20));
        drop(guard);
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn acquire_all_deduplicates() {
        let locks = KeyedLocks::new(Duration::from_millis(10));
        let keys = vec![member_key("m1"), slot_key("s1"), member_key("m1")];
        let guards = locks.acquire_all(&keys).unwrap();
        assert_eq!(guards.len(), 2);
    }
}
