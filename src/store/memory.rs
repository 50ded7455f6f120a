use std::collections::HashMap;

use parking_lot::RwLock;

use super::{locate, Result, Row, Table, TableStore};

/// In-process table store. Useful for embedding and as the reference adapter in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents of `table`.
    pub fn seed(&self, table: Table, rows: Vec<Row>) {
        self.tables.write().insert(table, rows);
    }

    pub fn len(&self, table: Table) -> usize {
        self.tables.read().get(&table).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, table: Table) -> bool {
        self.len(table) == 0
    }
}

impl TableStore for MemoryStore {
    fn read_all(&self, table: Table) -> Result<Vec<Row>> {
        Ok(self.tables.read().get(&table).cloned().unwrap_or_default())
    }

    fn append(&self, table: Table, row: Row) -> Result<()> {
        self.tables.write().entry(table).or_default().push(row);
        Ok(())
    }

    fn append_many(&self, table: Table, rows: Vec<Row>) -> Result<()> {
        self.tables.write().entry(table).or_default().extend(rows);
        Ok(())
    }

    fn find_and_update(&self, table: Table, id: &str, column: &str, value: &str) -> Result<()> {
        let index = table.column_index(column)?;
        let mut tables = self.tables.write();
        let rows = tables.entry(table).or_default();
        let position = locate(table, rows, id)?;
        let row = &mut rows[position];
        if row.len() <= index {
            row.resize(index + 1, String::new());
        }
        row[index] = value.to_string();
        Ok(())
    }

    fn remove(&self, table: Table, id: &str) -> Result<()> {
        let mut tables = self.tables.write();
        let rows = tables.entry(table).or_default();
        let position = locate(table, rows, id)?;
        rows.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|cell| cell.to_string()).collect()
    }

    #[test]
    fn update_pads_short_rows() {
        let store = MemoryStore::new();
        store.append(Table::Enrollments, row(&["e1", "m1"])).unwrap();
        store
            .find_and_update(Table::Enrollments, "e1", "label", "Monday")
            .unwrap();
        let rows = store.read_all(Table::Enrollments).unwrap();
        assert_eq!(rows[0].len(), 5);
        assert_eq!(rows[0][4], "Monday");
    }

    #[test]
    fn missing_rows_are_reported() {
        let store = MemoryStore::new();
        let err = store.remove(Table::Enrollments, "nope").unwrap_err();
        assert!(matches!(err, StoreError::RowNotFound { .. }));
        let err = store
            .find_and_update(Table::Dues, "nope", "state", "Confirmed")
            .unwrap_err();
        assert!(matches!(err, StoreError::RowNotFound { .. }));
    }

    #[test]
    fn remove_deletes_only_the_matching_row() {
        let store = MemoryStore::new();
        store
            .append_many(
                Table::Enrollments,
                vec![row(&["e1"]), row(&["e2"]), row(&["e3"])],
            )
            .unwrap();
        store.remove(Table::Enrollments, "e2").unwrap();
        let ids: Vec<_> = store
            .read_all(Table::Enrollments)
            .unwrap()
            .into_iter()
            .map(|row| row[0].clone())
            .collect();
        assert_eq!(ids, vec!["e1", "e3"]);
    }
}
