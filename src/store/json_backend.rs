use std::{
    fs,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::debug;

use crate::utils::paths::{ensure_dir, tables_dir};
use crate::utils::persistence::save_json;

use super::{locate, Result, Row, Table, TableStore};

const TABLE_EXTENSION: &str = "json";

/// Filesystem-backed store keeping each table as a JSON array of rows.
///
/// Writes are serialized within the process and land atomically through a
/// temporary file followed by a rename.
#[derive(Debug)]
pub struct JsonTableStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonTableStore {
    pub fn new(root: Option<PathBuf>) -> Result<Self> {
        let root = root.unwrap_or_else(tables_dir);
        ensure_dir(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn new_default() -> Result<Self> {
        Self::new(None)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, table: Table) -> PathBuf {
        self.root
            .join(format!("{}.{}", table.name(), TABLE_EXTENSION))
    }

    fn load(&self, table: Table) -> Result<Vec<Row>> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn persist(&self, table: Table, rows: &[Row]) -> Result<()> {
        save_json(&self.table_path(table), rows)?;
        debug!(table = %table, rows = rows.len(), "table persisted");
        Ok(())
    }

    fn modify<F>(&self, table: Table, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Row>) -> Result<()>,
    {
        let _guard = self.write_lock.lock();
        let mut rows = self.load(table)?;
        mutator(&mut rows)?;
        self.persist(table, &rows)
    }
}

impl TableStore for JsonTableStore {
    fn read_all(&self, table: Table) -> Result<Vec<Row>> {
        self.load(table)
    }

    fn append(&self, table: Table, row: Row) -> Result<()> {
        self.modify(table, |rows| {
            rows.push(row);
            Ok(())
        })
    }

    fn append_many(&self, table: Table, new_rows: Vec<Row>) -> Result<()> {
        self.modify(table, |rows| {
            rows.extend(new_rows);
            Ok(())
        })
    }

    fn find_and_update(&self, table: Table, id: &str, column: &str, value: &str) -> Result<()> {
        let index = table.column_index(column)?;
        self.modify(table, |rows| {
            let position = locate(table, rows, id)?;
            let row = &mut rows[position];
            if row.len() <= index {
                row.resize(index + 1, String::new());
            }
            row[index] = value.to_string();
            Ok(())
        })
    }

    fn remove(&self, table: Table, id: &str) -> Result<()> {
        self.modify(table, |rows| {
            let position = locate(table, rows, id)?;
            rows.remove(position);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::utils::persistence::staging_path;
    use tempfile::TempDir;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|cell| cell.to_string()).collect()
    }

    #[test]
    fn rows_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let store = JsonTableStore::new(Some(temp.path().to_path_buf())).unwrap();
        store
            .append(Table::Config, row(&["cutoff_day", "19"]))
            .unwrap();
        store
            .find_and_update(Table::Config, "cutoff_day", "value", "20")
            .unwrap();

        let reopened = JsonTableStore::new(Some(temp.path().to_path_buf())).unwrap();
        let rows = reopened.read_all(Table::Config).unwrap();
        assert_eq!(rows, vec![row(&["cutoff_day", "20"])]);
        assert!(!staging_path(&reopened.table_path(Table::Config)).exists());
    }

    #[test]
    fn missing_table_reads_empty() {
        let temp = TempDir::new().unwrap();
        let store = JsonTableStore::new(Some(temp.path().to_path_buf())).unwrap();
        assert!(store.read_all(Table::Dues).unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_a_serde_error() {
        let temp = TempDir::new().unwrap();
        let store = JsonTableStore::new(Some(temp.path().to_path_buf())).unwrap();
        fs::write(store.table_path(Table::Dues), "{not json").unwrap();
        assert!(matches!(
            store.read_all(Table::Dues),
            Err(StoreError::Serde(_))
        ));
    }
}
