use std::time::Duration;

use thiserror::Error;

/// Failures raised by a table store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),
    #[error("store call `{operation}` on `{table}` timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        table: String,
        elapsed: Duration,
    },
    #[error("store call `{operation}` on `{table}` waited on an earlier write that has not finished")]
    Unsettled {
        operation: &'static str,
        table: String,
    },
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("row `{id}` not found in `{table}`")]
    RowNotFound { table: String, id: String },
    #[error("unknown column `{column}` in `{table}`")]
    UnknownColumn { table: String, column: String },
    #[error("malformed row in `{table}`: {detail}")]
    Malformed { table: String, detail: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// True when the failure says nothing about the data and the call may be repeated.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unreachable(_) | StoreError::Timeout { .. } | StoreError::Unsettled { .. }
        )
    }

    pub fn malformed(table: impl Into<String>, detail: impl Into<String>) -> Self {
        StoreError::Malformed {
            table: table.into(),
            detail: detail.into(),
        }
    }
}
