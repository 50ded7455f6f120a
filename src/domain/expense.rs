use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::errors::ValidationError;
use crate::domain::common::*;

/// Cash leaving the register.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Expense {
    pub id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub category: ExpenseCategory,
    pub detail: String,
}

impl Expense {
    pub fn new(
        date: NaiveDate,
        amount: Decimal,
        category: ExpenseCategory,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            date,
            amount,
            category,
            detail: detail.into(),
        }
    }
}

impl Identifiable for Expense {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExpenseCategory {
    CourtRental,
    SportsEquipment,
    Salaries,
    Maintenance,
    Advertising,
    Taxes,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 7] = [
        ExpenseCategory::CourtRental,
        ExpenseCategory::SportsEquipment,
        ExpenseCategory::Salaries,
        ExpenseCategory::Maintenance,
        ExpenseCategory::Advertising,
        ExpenseCategory::Taxes,
        ExpenseCategory::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ExpenseCategory::CourtRental => "Court rental",
            ExpenseCategory::SportsEquipment => "Sports equipment",
            ExpenseCategory::Salaries => "Salaries",
            ExpenseCategory::Maintenance => "Maintenance",
            ExpenseCategory::Advertising => "Advertising",
            ExpenseCategory::Taxes => "Taxes",
            ExpenseCategory::Other => "Other",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExpenseCategory {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let folded = fold(raw);
        ExpenseCategory::ALL
            .into_iter()
            .find(|category| category.label().to_lowercase() == folded)
            .ok_or_else(|| ValidationError::Invalid(format!("unknown expense category `{raw}`")))
    }
}
