//! Table store boundary: flat, order-significant tables and the adapters that hold them.

pub mod bounded;
pub mod json_backend;
pub mod memory;
pub mod records;

use std::fmt;

use crate::errors::StoreError;

pub use bounded::{BoundedStore, StorePolicy};
pub use json_backend::JsonTableStore;
pub use memory::MemoryStore;
pub use records::{changed_columns, due_columns, ColumnChange, ConfigEntry, Record, Tables};

pub type Result<T> = std::result::Result<T, StoreError>;

/// One stored row; cell order follows [`Table::columns`].
pub type Row = Vec<String>;

/// Every table the core reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Members,
    Dues,
    Tariffs,
    ScheduleTemplate,
    Enrollments,
    Attendance,
    Config,
    Expenses,
    Audit,
}

impl Table {
    pub const ALL: [Table; 9] = [
        Table::Members,
        Table::Dues,
        Table::Tariffs,
        Table::ScheduleTemplate,
        Table::Enrollments,
        Table::Attendance,
        Table::Config,
        Table::Expenses,
        Table::Audit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Members => "members",
            Table::Dues => "dues",
            Table::Tariffs => "tariffs",
            Table::ScheduleTemplate => "schedule-template",
            Table::Enrollments => "enrollments",
            Table::Attendance => "attendance",
            Table::Config => "config",
            Table::Expenses => "expenses",
            Table::Audit => "audit",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Members => &[
                "id",
                "join-date",
                "name",
                "surname",
                "id-doc",
                "birthdate",
                "guardian",
                "phone",
                "email",
                "site",
                "concept",
                "notes",
                "created-by",
                "active",
                "size",
                "group",
                "weight",
                "height",
            ],
            Table::Dues => &[
                "id",
                "payment-date",
                "member-id",
                "member-name",
                "amount",
                "concept",
                "method",
                "note",
                "state",
                "actor",
                "period-label",
                "created-on",
                "reverses",
            ],
            Table::Tariffs => &["concept", "price"],
            Table::ScheduleTemplate => &[
                "id",
                "site",
                "weekday",
                "time-window",
                "group",
                "coach",
                "capacity",
            ],
            Table::Enrollments => &["id", "member-id", "member-name", "slot-id", "label"],
            Table::Attendance => &[
                "date",
                "time",
                "member-id",
                "member-name",
                "site",
                "group-label",
                "state",
                "reason",
            ],
            Table::Config => &["key", "value"],
            Table::Expenses => &["id", "date", "amount", "category", "detail"],
            Table::Audit => &[
                "timestamp",
                "actor",
                "due-id",
                "field",
                "old",
                "new",
                "note",
            ],
        }
    }

    /// Column rows are addressed by in `find_and_update`/`remove`: always the first.
    pub fn key_column(&self) -> usize {
        0
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.columns()
            .iter()
            .position(|candidate| *candidate == column)
            .ok_or_else(|| StoreError::UnknownColumn {
                table: self.name().to_string(),
                column: column.to_string(),
            })
    }

    pub fn from_name(name: &str) -> Result<Table> {
        Table::ALL
            .into_iter()
            .find(|table| table.name() == name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Abstraction over the shared persistence behind the core.
///
/// Implementations are lock-free from the caller's point of view: nothing here
/// makes a read-then-write sequence atomic.
pub trait TableStore: Send + Sync {
    fn read_all(&self, table: Table) -> Result<Vec<Row>>;
    fn append(&self, table: Table, row: Row) -> Result<()>;
    /// Appends rows in order. On failure an unknown prefix may already be stored.
    fn append_many(&self, table: Table, rows: Vec<Row>) -> Result<()>;
    /// Sets `column` of the first row whose key equals `id`.
    fn find_and_update(&self, table: Table, id: &str, column: &str, value: &str) -> Result<()>;
    /// Deletes the first row whose key equals `id`.
    fn remove(&self, table: Table, id: &str) -> Result<()>;
}

pub(crate) fn locate(table: Table, rows: &[Row], id: &str) -> Result<usize> {
    let key = table.key_column();
    rows.iter()
        .position(|row| row.get(key).map(String::as_str) == Some(id))
        .ok_or_else(|| StoreError::RowNotFound {
            table: table.name().to_string(),
            id: id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dues_layout_keeps_original_order() {
        let columns = Table::Dues.columns();
        assert_eq!(columns[0], "id");
        assert_eq!(columns[1], "payment-date");
        assert_eq!(columns[10], "period-label");
        assert_eq!(columns[11], "created-on");
        assert_eq!(columns.last(), Some(&"reverses"));
        assert_eq!(Table::Dues.column_index("state").unwrap(), 8);
        assert!(matches!(
            Table::Dues.column_index("colour"),
            Err(StoreError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn table_names_resolve() {
        for table in Table::ALL {
            assert_eq!(Table::from_name(table.name()).unwrap(), table);
        }
        assert!(Table::from_name("payments").is_err());
    }
}
