use thiserror::Error;

use crate::core::context::Capability;
use crate::errors::StoreError;

/// Input problems detected before any write reaches the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid amount `{0}`")]
    InvalidAmount(String),
    #[error("cutoff day {0} is outside 1..=28")]
    InvalidCutoff(u32),
    #[error("invalid period label `{0}`")]
    InvalidPeriod(String),
    #[error("window end {end} is before start {start}")]
    InvalidWindow { start: String, end: String },
    #[error("slot `{slot_id}` is full (capacity {capacity})")]
    Full { slot_id: String, capacity: u32 },
    #[error("member `{member_id}` already holds `{existing_slot}` at {block}")]
    Conflict {
        member_id: String,
        existing_slot: String,
        block: String,
    },
    #[error("member `{member_id}` already has a due for {period}")]
    AlreadyBilled { member_id: String, period: String },
    #[error("absence of member `{0}` requires a reason")]
    MissingAbsenceReason(String),
    #[error("due `{due_id}` cannot move from {from} to {to}")]
    InvalidTransition {
        due_id: String,
        from: String,
        to: String,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Outcome taxonomy shared by every command and query of the core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("store connectivity failure: {0}")]
    Connectivity(StoreError),
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("batch for {scope} stopped after {inserted} of {attempted} rows: {source}")]
    PartialBatch {
        scope: String,
        inserted: usize,
        attempted: usize,
        #[source]
        source: StoreError,
    },
    #[error("stored data is corrupt: {0}")]
    Corrupt(StoreError),
    #[error("`{0}` is busy, retry later")]
    Busy(String),
    #[error("`{actor}` lacks capability {capability:?}")]
    Forbidden {
        actor: String,
        capability: Capability,
    },
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// True when repeating the same command may succeed without changing its input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::Connectivity(_) | CoreError::PartialBatch { .. } | CoreError::Busy(_)
        )
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RowNotFound { table, id } => CoreError::NotFound {
                kind: table_kind(&table),
                id,
            },
            StoreError::Malformed { .. }
            | StoreError::Serde(_)
            | StoreError::UnknownColumn { .. }
            | StoreError::UnknownTable(_) => CoreError::Corrupt(err),
            StoreError::Unreachable(_)
            | StoreError::Timeout { .. }
            | StoreError::Unsettled { .. }
            | StoreError::Io(_) => CoreError::Connectivity(err),
        }
    }
}

fn table_kind(table: &str) -> &'static str {
    match table {
        "members" => "member",
        "dues" => "due",
        "schedule-template" => "slot",
        "enrollments" => "enrollment",
        "expenses" => "expense",
        _ => "row",
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn store_failures_map_onto_taxonomy() {
        let err: CoreError = StoreError::Unreachable("offline".into()).into();
        assert!(matches!(err, CoreError::Connectivity(_)));
        assert!(err.is_retryable());

        let err: CoreError = StoreError::Timeout {
            operation: "read_all",
            table: "dues".into(),
            elapsed: Duration::from_millis(10),
        }
        .into();
        assert!(matches!(err, CoreError::Connectivity(_)));

        let err: CoreError = StoreError::RowNotFound {
            table: "dues".into(),
            id: "d1".into(),
        }
        .into();
        assert!(matches!(err, CoreError::NotFound { kind: "due", .. }));
        assert!(!err.is_retryable());

        let err: CoreError = StoreError::malformed("dues", "bad amount").into();
        assert!(matches!(err, CoreError::Corrupt(_)));
    }
}
