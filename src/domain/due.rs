use std::{collections::HashSet, fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::errors::ValidationError;
use crate::domain::common::*;
use crate::domain::period::{PeriodLabel, PeriodRef};

/// Lifecycle of a due. Only `Pending → Confirmed` exists under normal flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DueState {
    Pending,
    Confirmed,
}

impl DueState {
    pub fn label(&self) -> &'static str {
        match self {
            DueState::Pending => "Pending",
            DueState::Confirmed => "Confirmed",
        }
    }

    /// Only Pending dues move. Confirmed ones are corrected through reversal entries.
    pub fn can_move_to(&self, _target: DueState) -> bool {
        matches!(self, DueState::Pending)
    }
}

impl fmt::Display for DueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DueState {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(DueState::Pending),
            "confirmed" => Ok(DueState::Confirmed),
            other => Err(ValidationError::Invalid(format!("unknown due state `{other}`"))),
        }
    }
}

/// How a payment was (or will be) made.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum PaymentMethod {
    Cash,
    Transfer,
    MercadoPago,
    #[default]
    Unspecified,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Transfer => "Transfer",
            PaymentMethod::MercadoPago => "MercadoPago",
            PaymentMethod::Unspecified => "",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(PaymentMethod::Unspecified),
            "cash" => Ok(PaymentMethod::Cash),
            "transfer" => Ok(PaymentMethod::Transfer),
            "mercadopago" => Ok(PaymentMethod::MercadoPago),
            other => Err(ValidationError::Invalid(format!(
                "unknown payment method `{other}`"
            ))),
        }
    }
}

/// What a due charges for. Tariff plan names land in `Other`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Concept {
    MonthlyFee,
    Enrollment,
    Apparel,
    Tournament,
    GuestSession,
    Other(String),
}

impl Concept {
    pub fn label(&self) -> &str {
        match self {
            Concept::MonthlyFee => "Monthly fee",
            Concept::Enrollment => "Enrollment",
            Concept::Apparel => "Apparel",
            Concept::Tournament => "Tournament",
            Concept::GuestSession => "Guest session",
            Concept::Other(label) => label,
        }
    }

    /// Concept billed for a member's recurring due.
    pub fn for_tariff(concept: Option<&str>) -> Self {
        concept.map(Concept::from).unwrap_or(Concept::MonthlyFee)
    }
}

impl From<&str> for Concept {
    fn from(raw: &str) -> Self {
        match fold(raw).as_str() {
            "monthly fee" => Concept::MonthlyFee,
            "enrollment" => Concept::Enrollment,
            "apparel" => Concept::Apparel,
            "tournament" => Concept::Tournament,
            "guest session" => Concept::GuestSession,
            _ => Concept::Other(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single billable charge owned by one member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Due {
    pub id: String,
    /// Stamped with the settlement day; equals `created_on` until then.
    pub payment_date: NaiveDate,
    pub member_id: String,
    pub member_name: String,
    pub amount: Decimal,
    pub concept: Concept,
    pub method: PaymentMethod,
    pub note: String,
    pub state: DueState,
    pub actor: String,
    pub period: PeriodRef,
    pub created_on: NaiveDate,
    /// Id of the confirmed due this entry cancels; set only on reversal entries.
    #[serde(default)]
    pub reversal_of: Option<String>,
}

impl Due {
    /// Creates a Pending due dated `today`.
    pub fn pending(
        member_id: impl Into<String>,
        member_name: impl Into<String>,
        amount: Decimal,
        concept: Concept,
        period: PeriodRef,
        today: NaiveDate,
    ) -> Self {
        Self {
            id: new_id(),
            payment_date: today,
            member_id: member_id.into(),
            member_name: member_name.into(),
            amount,
            concept,
            method: PaymentMethod::Unspecified,
            note: String::new(),
            state: DueState::Pending,
            actor: String::new(),
            period,
            created_on: today,
            reversal_of: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Marks this entry as the reversal of `due_id`.
    pub fn reversing(mut self, due_id: impl Into<String>) -> Self {
        self.reversal_of = Some(due_id.into());
        self
    }

    pub fn confirmed_with(mut self, method: PaymentMethod) -> Self {
        self.state = DueState::Confirmed;
        self.method = method;
        self
    }

    /// Recurring dues are those billed against a month label, reversal entries aside.
    pub fn is_recurring(&self) -> bool {
        self.period.month().is_some() && !self.is_reversal()
    }

    pub fn is_reversal(&self) -> bool {
        self.reverses().is_some()
    }

    /// Id of the due this entry compensates, if it is a reversal.
    pub fn reverses(&self) -> Option<&str> {
        self.reversal_of.as_deref().filter(|id| !id.is_empty())
    }

    pub fn is_recurring_for(&self, member_id: &str, period: PeriodLabel) -> bool {
        self.member_id == member_id && self.period.is_month(period) && !self.is_reversal()
    }

    pub fn is_pending(&self) -> bool {
        self.state == DueState::Pending
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == DueState::Confirmed
    }
}

impl Identifiable for Due {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Requested changes for a settlement. Unset overrides keep the stored values.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub method: PaymentMethod,
    pub amount: Option<Decimal>,
    pub concept: Option<Concept>,
    pub note: String,
    pub target: DueState,
}

impl Settlement {
    pub fn confirm(method: PaymentMethod) -> Self {
        Self {
            method,
            amount: None,
            concept: None,
            note: String::new(),
            target: DueState::Confirmed,
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_concept(mut self, concept: Concept) -> Self {
        self.concept = Some(concept);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

/// Human-readable note for a reversal entry; the link itself lives in `reversal_of`.
pub fn reversal_note(due_id: &str, reason: &str) -> String {
    format!("reversal of {due_id}: {}", reason.trim())
}

/// Snapshot of the dues table indexed for recurring-family questions.
#[derive(Debug, Clone, Default)]
pub struct DueBook {
    dues: Vec<Due>,
    reversed: HashSet<String>,
}

impl DueBook {
    pub fn new(dues: Vec<Due>) -> Self {
        let reversed = dues
            .iter()
            .filter_map(|due| due.reverses().map(str::to_string))
            .collect();
        Self { dues, reversed }
    }

    pub fn dues(&self) -> &[Due] {
        &self.dues
    }

    pub fn get(&self, id: &str) -> Option<&Due> {
        self.dues.iter().find(|due| due.id == id)
    }

    pub fn is_reversed(&self, id: &str) -> bool {
        self.reversed.contains(id)
    }

    /// The member's recurring due for `period` that has not been reversed.
    pub fn live_recurring(&self, member_id: &str, period: PeriodLabel) -> Option<&Due> {
        self.dues
            .iter()
            .find(|due| due.is_recurring_for(member_id, period) && !self.is_reversed(&due.id))
    }

    pub fn pending_for(&self, member_id: &str, period: PeriodLabel) -> Option<&Due> {
        self.live_recurring(member_id, period)
            .filter(|due| due.is_pending())
    }

    /// Members holding a live recurring due for `period`, whatever its state.
    pub fn billed_members(&self, period: PeriodLabel) -> HashSet<&str> {
        self.dues
            .iter()
            .filter(|due| due.is_recurring() && due.period.is_month(period))
            .filter(|due| !self.is_reversed(&due.id))
            .map(|due| due.member_id.as_str())
            .collect()
    }

    /// Members whose live recurring due for `period` is Confirmed.
    pub fn paid_members(&self, period: PeriodLabel) -> HashSet<&str> {
        self.dues
            .iter()
            .filter(|due| due.is_recurring() && due.period.is_month(period) && due.is_confirmed())
            .filter(|due| !self.is_reversed(&due.id))
            .map(|due| due.member_id.as_str())
            .collect()
    }
}

/// Old vs. new value of one due field changed by a settlement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub actor: String,
    pub due_id: String,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
    pub note: String,
}

/// Parses a user-supplied amount; blank, non-numeric and negative input are rejected.
pub fn parse_amount(raw: &str) -> Result<Decimal, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("amount"));
    }
    let amount = Decimal::from_str(trimmed)
        .map_err(|_| ValidationError::InvalidAmount(trimmed.to_string()))?;
    ensure_non_negative(amount)
}

pub(crate) fn ensure_non_negative(amount: Decimal) -> Result<Decimal, ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::InvalidAmount(amount.to_string()));
    }
    Ok(amount)
}
