//! Typed records over the flat tables. This is the only code that knows column order.

use std::{str::FromStr, sync::Arc};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    common::Identifiable,
    schedule::{parse_weekday, weekday_label},
    AbsenceReason, AttendanceRecord, AttendanceState, AuditEntry, Concept, Due, DueState,
    Enrollment, Expense, ExpenseCategory, Member, PaymentMethod, PeriodRef, Tariff, TimeWindow,
    TrainingSlot,
};
use crate::errors::StoreError;

use super::{Result, Row, Table, TableStore};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Column names of the dues table used for in-place updates.
pub mod due_columns {
    pub const PAYMENT_DATE: &str = "payment-date";
    pub const AMOUNT: &str = "amount";
    pub const CONCEPT: &str = "concept";
    pub const METHOD: &str = "method";
    pub const NOTE: &str = "note";
    pub const STATE: &str = "state";
    pub const ACTOR: &str = "actor";
}

/// A typed view of one table row.
pub trait Record: Sized {
    const TABLE: Table;

    fn to_row(&self) -> Row;
    fn from_row(row: &Cells<'_>) -> Result<Self>;
}

/// Positional accessor that reports decode failures against the owning table.
pub struct Cells<'a> {
    table: Table,
    row: &'a [String],
}

impl<'a> Cells<'a> {
    fn new(table: Table, row: &'a [String]) -> Self {
        Self { table, row }
    }

    /// Trailing cells missing from short rows read as empty.
    pub fn text(&self, index: usize) -> String {
        self.row
            .get(index)
            .map(|cell| cell.trim().to_string())
            .unwrap_or_default()
    }

    fn fail(&self, index: usize, detail: impl std::fmt::Display) -> StoreError {
        let column = self.table.columns().get(index).copied().unwrap_or("?");
        StoreError::malformed(self.table.name(), format!("column `{column}`: {detail}"))
    }

    pub fn required(&self, index: usize) -> Result<String> {
        let value = self.text(index);
        if value.is_empty() {
            return Err(self.fail(index, "missing value"));
        }
        Ok(value)
    }

    pub fn date(&self, index: usize) -> Result<NaiveDate> {
        let raw = self.required(index)?;
        NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|err| self.fail(index, err))
    }

    pub fn optional_date(&self, index: usize) -> Result<Option<NaiveDate>> {
        let raw = self.text(index);
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(&raw, DATE_FORMAT)
            .map(Some)
            .map_err(|err| self.fail(index, err))
    }

    pub fn decimal(&self, index: usize) -> Result<Decimal> {
        let raw = self.required(index)?;
        Decimal::from_str(&raw).map_err(|err| self.fail(index, err))
    }

    pub fn parsed<T>(&self, index: usize) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.text(index)
            .parse::<T>()
            .map_err(|err| self.fail(index, err))
    }

    fn flag(&self, index: usize) -> Result<bool> {
        match self.text(index).to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" | "" => Ok(false),
            other => Err(self.fail(index, format!("`{other}` is not a flag"))),
        }
    }
}

fn date_cell(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn optional_date_cell(date: Option<NaiveDate>) -> String {
    date.map(date_cell).unwrap_or_default()
}

impl Record for Member {
    const TABLE: Table = Table::Members;

    fn to_row(&self) -> Row {
        vec![
            self.id.clone(),
            optional_date_cell(self.joined_on),
            self.name.clone(),
            self.surname.clone(),
            self.id_doc.clone(),
            optional_date_cell(self.birthdate),
            self.guardian.clone(),
            self.phone.clone(),
            self.email.clone(),
            self.site.clone(),
            self.concept.clone(),
            self.notes.clone(),
            self.created_by.clone(),
            if self.active { "1" } else { "0" }.to_string(),
            self.size.clone(),
            self.group.clone(),
            self.weight.clone(),
            self.height.clone(),
        ]
    }

    fn from_row(cells: &Cells<'_>) -> Result<Self> {
        Ok(Self {
            id: cells.required(0)?,
            joined_on: cells.optional_date(1)?,
            name: cells.text(2),
            surname: cells.text(3),
            id_doc: cells.text(4),
            birthdate: cells.optional_date(5)?,
            guardian: cells.text(6),
            phone: cells.text(7),
            email: cells.text(8),
            site: cells.text(9),
            concept: cells.text(10),
            notes: cells.text(11),
            created_by: cells.text(12),
            active: cells.flag(13)?,
            size: cells.text(14),
            group: cells.text(15),
            weight: cells.text(16),
            height: cells.text(17),
        })
    }
}

impl Record for Tariff {
    const TABLE: Table = Table::Tariffs;

    fn to_row(&self) -> Row {
        vec![self.concept.clone(), self.price.to_string()]
    }

    fn from_row(cells: &Cells<'_>) -> Result<Self> {
        Ok(Self {
            concept: cells.required(0)?,
            price: cells.decimal(1)?,
        })
    }
}

impl Record for Due {
    const TABLE: Table = Table::Dues;

    fn to_row(&self) -> Row {
        vec![
            self.id.clone(),
            date_cell(self.payment_date),
            self.member_id.clone(),
            self.member_name.clone(),
            self.amount.to_string(),
            self.concept.to_string(),
            self.method.to_string(),
            self.note.clone(),
            self.state.to_string(),
            self.actor.clone(),
            self.period.to_string(),
            date_cell(self.created_on),
            self.reversal_of.clone().unwrap_or_default(),
        ]
    }

    fn from_row(cells: &Cells<'_>) -> Result<Self> {
        let payment_date = cells.date(1)?;
        Ok(Self {
            id: cells.required(0)?,
            payment_date,
            member_id: cells.text(2),
            member_name: cells.text(3),
            amount: cells.decimal(4)?,
            concept: Concept::from(cells.text(5).as_str()),
            method: cells.parsed::<PaymentMethod>(6)?,
            note: cells.text(7),
            state: cells.parsed::<DueState>(8)?,
            actor: cells.text(9),
            period: cells.parsed::<PeriodRef>(10)?,
            // Rows written before the column existed were never re-dated.
            created_on: cells.optional_date(11)?.unwrap_or(payment_date),
            reversal_of: Some(cells.text(12)).filter(|id| !id.is_empty()),
        })
    }
}

impl Record for TrainingSlot {
    const TABLE: Table = Table::ScheduleTemplate;

    fn to_row(&self) -> Row {
        vec![
            self.id.clone(),
            self.site.clone(),
            weekday_label(self.weekday).to_string(),
            self.window.to_string(),
            self.group.clone(),
            self.coach.clone(),
            self.capacity.to_string(),
        ]
    }

    fn from_row(cells: &Cells<'_>) -> Result<Self> {
        Ok(Self {
            id: cells.required(0)?,
            site: cells.text(1),
            weekday: parse_weekday(&cells.text(2)).map_err(|err| cells.fail(2, err))?,
            window: cells.parsed::<TimeWindow>(3)?,
            group: cells.text(4),
            coach: cells.text(5),
            capacity: cells.parsed::<u32>(6)?,
        })
    }
}

impl Record for Enrollment {
    const TABLE: Table = Table::Enrollments;

    fn to_row(&self) -> Row {
        vec![
            self.id.clone(),
            self.member_id.clone(),
            self.member_name.clone(),
            self.slot_id.clone(),
            self.label.clone(),
        ]
    }

    fn from_row(cells: &Cells<'_>) -> Result<Self> {
        Ok(Self {
            id: cells.required(0)?,
            member_id: cells.required(1)?,
            member_name: cells.text(2),
            slot_id: cells.required(3)?,
            label: cells.text(4),
        })
    }
}

impl Record for AttendanceRecord {
    const TABLE: Table = Table::Attendance;

    fn to_row(&self) -> Row {
        vec![
            date_cell(self.date),
            self.time.format(TIME_FORMAT).to_string(),
            self.member_id.clone(),
            self.member_name.clone(),
            self.site.clone(),
            self.group_label.clone(),
            self.state.to_string(),
            self.reason.map(|reason| reason.to_string()).unwrap_or_default(),
        ]
    }

    fn from_row(cells: &Cells<'_>) -> Result<Self> {
        let raw_time = cells.required(1)?;
        let time = NaiveTime::parse_from_str(&raw_time, TIME_FORMAT)
            .map_err(|err| cells.fail(1, err))?;
        let raw_reason = cells.text(7);
        let reason = if raw_reason.is_empty() {
            None
        } else {
            Some(cells.parsed::<AbsenceReason>(7)?)
        };
        Ok(Self {
            date: cells.date(0)?,
            time,
            member_id: cells.text(2),
            member_name: cells.text(3),
            site: cells.text(4),
            group_label: cells.text(5),
            state: cells.parsed::<AttendanceState>(6)?,
            reason,
        })
    }
}

impl Record for Expense {
    const TABLE: Table = Table::Expenses;

    fn to_row(&self) -> Row {
        vec![
            self.id.clone(),
            date_cell(self.date),
            self.amount.to_string(),
            self.category.to_string(),
            self.detail.clone(),
        ]
    }

    fn from_row(cells: &Cells<'_>) -> Result<Self> {
        Ok(Self {
            id: cells.required(0)?,
            date: cells.date(1)?,
            amount: cells.decimal(2)?,
            category: cells.parsed::<ExpenseCategory>(3)?,
            detail: cells.text(4),
        })
    }
}

impl Record for AuditEntry {
    const TABLE: Table = Table::Audit;

    fn to_row(&self) -> Row {
        vec![
            self.at.to_rfc3339(),
            self.actor.clone(),
            self.due_id.clone(),
            self.field.clone(),
            self.old_value.clone(),
            self.new_value.clone(),
            self.note.clone(),
        ]
    }

    fn from_row(cells: &Cells<'_>) -> Result<Self> {
        let raw = cells.required(0)?;
        let at = DateTime::parse_from_rfc3339(&raw)
            .map_err(|err| cells.fail(0, err))?
            .with_timezone(&Utc);
        Ok(Self {
            at,
            actor: cells.text(1),
            due_id: cells.required(2)?,
            field: cells.text(3),
            old_value: cells.text(4),
            new_value: cells.text(5),
            note: cells.text(6),
        })
    }
}

/// A key→value row of the shared config table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

impl Record for ConfigEntry {
    const TABLE: Table = Table::Config;

    fn to_row(&self) -> Row {
        vec![self.key.clone(), self.value.clone()]
    }

    fn from_row(cells: &Cells<'_>) -> Result<Self> {
        Ok(Self {
            key: cells.required(0)?,
            value: cells.text(1),
        })
    }
}

/// A column whose rendered cell differs between two versions of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnChange {
    pub column: &'static str,
    pub old: String,
    pub new: String,
}

/// Compares the rendered cells of `columns`, keeping their order.
pub fn changed_columns<R: Record>(
    before: &R,
    after: &R,
    columns: &[&'static str],
) -> Result<Vec<ColumnChange>> {
    let (old_row, new_row) = (before.to_row(), after.to_row());
    let mut changes = Vec::new();
    for &column in columns {
        let index = R::TABLE.column_index(column)?;
        let old = old_row.get(index).cloned().unwrap_or_default();
        let new = new_row.get(index).cloned().unwrap_or_default();
        if old != new {
            changes.push(ColumnChange { column, old, new });
        }
    }
    Ok(changes)
}

/// Typed access to a [`TableStore`].
#[derive(Clone)]
pub struct Tables {
    store: Arc<dyn TableStore>,
}

impl Tables {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn TableStore {
        self.store.as_ref()
    }

    /// Decodes every non-blank row of `R`'s table.
    pub fn all<R: Record>(&self) -> Result<Vec<R>> {
        self.store
            .read_all(R::TABLE)?
            .iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .map(|row| R::from_row(&Cells::new(R::TABLE, row)))
            .collect()
    }

    /// The record keyed `id`, or [`StoreError::RowNotFound`].
    pub fn get<R: Record + Identifiable>(&self, id: &str) -> Result<R> {
        self.all::<R>()?
            .into_iter()
            .find(|record| record.id() == id)
            .ok_or_else(|| StoreError::RowNotFound {
                table: R::TABLE.name().to_string(),
                id: id.to_string(),
            })
    }

    pub fn insert<R: Record>(&self, record: &R) -> Result<()> {
        self.store.append(R::TABLE, record.to_row())
    }

    pub fn insert_many<R: Record>(&self, records: &[R]) -> Result<()> {
        let rows = records.iter().map(Record::to_row).collect();
        self.store.append_many(R::TABLE, rows)
    }

    pub fn update<R: Record>(&self, id: &str, column: &str, value: &str) -> Result<()> {
        self.store.find_and_update(R::TABLE, id, column, value)
    }

    pub fn remove<R: Record>(&self, id: &str) -> Result<()> {
        self.store.remove(R::TABLE, id)
    }
}
