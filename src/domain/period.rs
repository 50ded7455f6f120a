//! Billing periods and the cutoff-driven active period calculation.

use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::core::errors::ValidationError;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];
const DAY_LABEL_FORMAT: &str = "%Y-%m-%d";
pub const MAX_CUTOFF_DAY: u32 = 28;

/// A (month, year) billing bucket rendered as `"March 2025"`.
///
/// Serialized as its label, so a decoded value always passes [`PeriodLabel::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodLabel {
    year: i32,
    month: u32,
}

impl PeriodLabel {
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::InvalidPeriod(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    /// The calendar month containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", MONTH_NAMES[(self.month - 1) as usize], self.year)
    }
}

impl TryFrom<String> for PeriodLabel {
    type Error = ValidationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<PeriodLabel> for String {
    fn from(label: PeriodLabel) -> Self {
        label.to_string()
    }
}

impl FromStr for PeriodLabel {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidPeriod(raw.to_string());
        let mut parts = raw.split_whitespace();
        let (Some(month), Some(year), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let month = MONTH_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(month))
            .ok_or_else(invalid)? as u32
            + 1;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

/// What a due is billed against: a month for recurring dues, a day for ad-hoc
/// session charges, or nothing for other one-off charges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PeriodRef {
    Month(PeriodLabel),
    Day(NaiveDate),
    #[default]
    Unassigned,
}

impl PeriodRef {
    pub fn month(&self) -> Option<PeriodLabel> {
        match self {
            PeriodRef::Month(label) => Some(*label),
            _ => None,
        }
    }

    pub fn is_month(&self, label: PeriodLabel) -> bool {
        self.month() == Some(label)
    }
}

impl fmt::Display for PeriodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodRef::Month(label) => fmt::Display::fmt(label, f),
            PeriodRef::Day(date) => write!(f, "{}", date.format(DAY_LABEL_FORMAT)),
            PeriodRef::Unassigned => Ok(()),
        }
    }
}

impl FromStr for PeriodRef {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(PeriodRef::Unassigned);
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, DAY_LABEL_FORMAT) {
            return Ok(PeriodRef::Day(date));
        }
        raw.parse().map(PeriodRef::Month)
    }
}

impl From<PeriodLabel> for PeriodRef {
    fn from(label: PeriodLabel) -> Self {
        PeriodRef::Month(label)
    }
}

/// Derives the period dues are generated for from a date and a cutoff day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodCalculator {
    cutoff_day: u32,
}

impl PeriodCalculator {
    pub fn new(cutoff_day: u32) -> Result<Self, ValidationError> {
        if !(1..=MAX_CUTOFF_DAY).contains(&cutoff_day) {
            return Err(ValidationError::InvalidCutoff(cutoff_day));
        }
        Ok(Self { cutoff_day })
    }

    pub fn cutoff_day(&self) -> u32 {
        self.cutoff_day
    }

    /// On or after the cutoff day the active period is the following month.
    pub fn active_period(&self, today: NaiveDate) -> PeriodLabel {
        let current = PeriodLabel::containing(today);
        if today.day() >= self.cutoff_day {
            current.next()
        } else {
            current
        }
    }
}

/// Convenience wrapper over [`PeriodCalculator`] for one-off calls.
pub fn active_period(today: NaiveDate, cutoff_day: u32) -> Result<PeriodLabel, ValidationError> {
    Ok(PeriodCalculator::new(cutoff_day)?.active_period(today))
}
