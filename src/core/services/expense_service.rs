use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use crate::core::context::{Capability, RequestContext};
use crate::core::errors::{CoreResult, ValidationError};
use crate::core::Club;
use crate::domain::{Expense, ExpenseCategory};

/// Records cash leaving the register.
pub struct ExpenseService;

impl ExpenseService {
    pub fn record_expense(
        club: &Club,
        ctx: &RequestContext,
        date: NaiveDate,
        amount: Decimal,
        category: ExpenseCategory,
        detail: &str,
    ) -> CoreResult<Expense> {
        ctx.require(Capability::RecordExpenses)?;
        if amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount(amount.to_string()).into());
        }
        let expense = Expense::new(date, amount, category, detail.trim());
        club.tables().insert(&expense)?;
        info!(expense_id = %expense.id, amount = %amount, category = %category, actor = ctx.actor(), "expense recorded");
        Ok(expense)
    }

    /// Latest expenses first.
    pub fn recent_expenses(
        club: &Club,
        ctx: &RequestContext,
        limit: usize,
    ) -> CoreResult<Vec<Expense>> {
        ctx.require_any(&[Capability::RecordExpenses, Capability::ViewCashRegister])?;
        let mut expenses: Vec<Expense> = club.tables().all()?;
        // Stable sort keeps insertion order among same-day rows; reverse makes the newest win.
        expenses.reverse();
        expenses.sort_by(|a, b| b.date.cmp(&a.date));
        expenses.truncate(limit);
        Ok(expenses)
    }
}
