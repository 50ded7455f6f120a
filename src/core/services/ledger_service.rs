//! The payment ledger: creating, settling, collecting and reversing dues.

use rust_decimal::Decimal;
use tracing::{error, info};

use crate::core::context::{Capability, RequestContext};
use crate::core::errors::{CoreError, CoreResult, ValidationError};
use crate::core::locks::{due_key, period_key};
use crate::core::services::roster_service::RosterService;
use crate::core::Club;
use crate::domain::due::{ensure_non_negative, reversal_note};
use crate::domain::{
    AuditEntry, Concept, Due, DueBook, DueState, PaymentMethod, PeriodLabel, PeriodRef, Settlement,
};
use crate::store::{changed_columns, due_columns};

/// Columns a settlement may touch, in write order. State goes last so an
/// interrupted settlement never leaves a Confirmed due with stale fields.
const SETTLED_COLUMNS: [&str; 7] = [
    due_columns::PAYMENT_DATE,
    due_columns::AMOUNT,
    due_columns::CONCEPT,
    due_columns::METHOD,
    due_columns::NOTE,
    due_columns::ACTOR,
    due_columns::STATE,
];

/// Fields for a manually created due.
#[derive(Debug, Clone, PartialEq)]
pub struct DueDraft {
    pub member_id: String,
    pub amount: Decimal,
    pub concept: Concept,
    pub period: PeriodRef,
    pub method: PaymentMethod,
    pub note: String,
    pub state: DueState,
}

impl DueDraft {
    pub fn new(
        member_id: impl Into<String>,
        amount: Decimal,
        concept: Concept,
        period: PeriodRef,
    ) -> Self {
        Self {
            member_id: member_id.into(),
            amount,
            concept,
            period,
            method: PaymentMethod::Unspecified,
            note: String::new(),
            state: DueState::Pending,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Method the member said they will pay with; the due stays pending.
    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    /// Records the due as already paid.
    pub fn paid_with(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self.state = DueState::Confirmed;
        self
    }
}

pub struct PaymentLedger;

impl PaymentLedger {
    /// Appends a due. A month-labelled due is refused when the member already
    /// holds a live recurring due for that month.
    pub fn create_due(club: &Club, ctx: &RequestContext, draft: DueDraft) -> CoreResult<Due> {
        ctx.require(Capability::CollectPayments)?;
        if draft.member_id.trim().is_empty() {
            return Err(ValidationError::MissingField("member_id").into());
        }
        let amount = ensure_non_negative(draft.amount)?;
        ensure_method(draft.state, draft.method)?;
        let member = RosterService::find_member(club, draft.member_id.trim())?;

        let _guard = match draft.period.month() {
            Some(period) => {
                let guard = club.locks().acquire(period_key(period))?;
                let book = DueBook::new(club.tables().all()?);
                if book.live_recurring(&member.id, period).is_some() {
                    return Err(already_billed(&member.id, period));
                }
                Some(guard)
            }
            None => None,
        };

        let mut due = Due::pending(
            &member.id,
            member.full_name(),
            amount,
            draft.concept,
            draft.period,
            club.today(),
        )
        .with_actor(ctx.actor())
        .with_note(draft.note.trim());
        due.method = draft.method;
        due.state = draft.state;

        club.tables().insert(&due)?;
        info!(due_id = %due.id, member_id = %due.member_id, period = %due.period, actor = ctx.actor(), "due created");
        Ok(due)
    }

    /// The member's pending recurring due for `period`, if any.
    pub fn find_pending_due(
        club: &Club,
        ctx: &RequestContext,
        member_id: &str,
        period: PeriodLabel,
    ) -> CoreResult<Option<Due>> {
        ctx.require(Capability::CollectPayments)?;
        let book = DueBook::new(club.tables().all()?);
        Ok(book.pending_for(member_id, period).cloned())
    }

    pub fn due(club: &Club, ctx: &RequestContext, due_id: &str) -> CoreResult<Due> {
        ctx.require_any(&[Capability::CollectPayments, Capability::ViewCashRegister])?;
        Self::load(club, due_id)
    }

    /// Every due of a member, newest first.
    pub fn dues_for_member(
        club: &Club,
        ctx: &RequestContext,
        member_id: &str,
    ) -> CoreResult<Vec<Due>> {
        ctx.require_any(&[Capability::CollectPayments, Capability::ViewCashRegister])?;
        let mut dues: Vec<Due> = club
            .tables()
            .all::<Due>()?
            .into_iter()
            .filter(|due| due.member_id == member_id)
            .collect();
        dues.sort_by(|a, b| b.created_on.cmp(&a.created_on));
        Ok(dues)
    }

    /// Applies a settlement: stamps today as the payment date, applies the
    /// overrides and writes one audit row per changed field.
    pub fn settle(
        club: &Club,
        ctx: &RequestContext,
        due_id: &str,
        settlement: Settlement,
    ) -> CoreResult<Due> {
        ctx.require(Capability::CollectPayments)?;
        validate_settlement(&settlement)?;
        let _guard = club.locks().acquire(due_key(due_id))?;
        let due = Self::load(club, due_id)?;
        Self::apply_settlement(club, ctx, due, settlement)
    }

    /// Confirms a due keeping its amount, concept and method.
    ///
    /// The due must already carry a payment method; generated dues do not, so
    /// those are paid through [`PaymentLedger::settle`] or [`PaymentLedger::collect`].
    pub fn confirm(club: &Club, ctx: &RequestContext, due_id: &str, note: &str) -> CoreResult<Due> {
        ctx.require(Capability::CollectPayments)?;
        let _guard = club.locks().acquire(due_key(due_id))?;
        let due = Self::load(club, due_id)?;
        let settlement = Settlement::confirm(due.method).with_note(note);
        validate_settlement(&settlement)?;
        Self::apply_settlement(club, ctx, due, settlement)
    }

    /// Records a payment for a member's period: settles the pending due in
    /// place, or appends a confirmed one when none was generated.
    pub fn collect(
        club: &Club,
        ctx: &RequestContext,
        member_id: &str,
        period: PeriodLabel,
        amount: Decimal,
        method: PaymentMethod,
        note: &str,
    ) -> CoreResult<Due> {
        ctx.require(Capability::CollectPayments)?;
        let amount = ensure_non_negative(amount)?;
        ensure_method(DueState::Confirmed, method)?;
        let _period_guard = club.locks().acquire(period_key(period))?;
        let book = DueBook::new(club.tables().all()?);

        match book.live_recurring(member_id, period) {
            Some(due) if due.is_pending() => {
                let _due_guard = club.locks().acquire(due_key(&due.id))?;
                let due = Self::load(club, &due.id)?;
                let settlement = Settlement::confirm(method)
                    .with_amount(amount)
                    .with_note(note);
                Self::apply_settlement(club, ctx, due, settlement)
            }
            Some(_) => Err(already_billed(member_id, period)),
            None => {
                let member = RosterService::find_member(club, member_id)?;
                let due = Due::pending(
                    &member.id,
                    member.full_name(),
                    amount,
                    Concept::for_tariff(member.tariff_concept()),
                    period.into(),
                    club.today(),
                )
                .with_actor(ctx.actor())
                .with_note(note.trim())
                .confirmed_with(method);
                club.tables().insert(&due)?;
                info!(due_id = %due.id, member_id, period = %period, actor = ctx.actor(), "payment collected without pending due");
                Ok(due)
            }
        }
    }

    /// Cancels a confirmed due by appending a negated confirmed entry dated today.
    pub fn reverse(club: &Club, ctx: &RequestContext, due_id: &str, reason: &str) -> CoreResult<Due> {
        ctx.require(Capability::ReverseDues)?;
        if reason.trim().is_empty() {
            return Err(ValidationError::MissingField("reason").into());
        }
        let _guard = club.locks().acquire(due_key(due_id))?;
        let book = DueBook::new(club.tables().all()?);
        let original = book
            .get(due_id)
            .ok_or_else(|| CoreError::not_found("due", due_id))?;
        if original.is_reversal() {
            return Err(ValidationError::Invalid(format!("`{due_id}` is itself a reversal")).into());
        }
        if !original.is_confirmed() {
            return Err(ValidationError::Invalid(format!(
                "`{due_id}` is {}; only confirmed dues can be reversed",
                original.state
            ))
            .into());
        }
        if book.is_reversed(due_id) {
            return Err(ValidationError::Invalid(format!("`{due_id}` was already reversed")).into());
        }

        let reversal = Due::pending(
            &original.member_id,
            &original.member_name,
            -original.amount,
            original.concept.clone(),
            original.period,
            club.today(),
        )
        .with_actor(ctx.actor())
        .with_note(reversal_note(due_id, reason))
        .reversing(due_id)
        .confirmed_with(original.method);
        club.tables().insert(&reversal)?;
        info!(due_id, reversal_id = %reversal.id, amount = %reversal.amount, actor = ctx.actor(), "due reversed");
        Ok(reversal)
    }

    /// Audit rows written for one due, oldest first.
    pub fn audit_trail(
        club: &Club,
        ctx: &RequestContext,
        due_id: &str,
    ) -> CoreResult<Vec<AuditEntry>> {
        ctx.require_any(&[Capability::CollectPayments, Capability::ViewCashRegister])?;
        let mut entries: Vec<AuditEntry> = club
            .tables()
            .all::<AuditEntry>()?
            .into_iter()
            .filter(|entry| entry.due_id == due_id)
            .collect();
        entries.sort_by_key(|entry| entry.at);
        Ok(entries)
    }

    fn load(club: &Club, due_id: &str) -> CoreResult<Due> {
        Ok(club.tables().get::<Due>(due_id)?)
    }

    /// Caller holds the due's lock.
    fn apply_settlement(
        club: &Club,
        ctx: &RequestContext,
        due: Due,
        settlement: Settlement,
    ) -> CoreResult<Due> {
        if due.is_reversal() {
            return Err(ValidationError::Invalid(format!("`{}` is a reversal entry", due.id)).into());
        }
        if !due.state.can_move_to(settlement.target) {
            return Err(ValidationError::InvalidTransition {
                due_id: due.id.clone(),
                from: due.state.to_string(),
                to: settlement.target.to_string(),
            }
            .into());
        }

        let note = settlement.note.trim().to_string();
        let mut settled = due.clone();
        settled.payment_date = club.today();
        settled.method = settlement.method;
        if let Some(amount) = settlement.amount {
            settled.amount = amount;
        }
        if let Some(concept) = settlement.concept {
            settled.concept = concept;
        }
        if !note.is_empty() {
            settled.note = note.clone();
        }
        settled.actor = ctx.actor().to_string();
        settled.state = settlement.target;

        let changes = changed_columns(&due, &settled, &SETTLED_COLUMNS)?;
        if changes.is_empty() {
            return Ok(settled);
        }
        let at = club.clock().now();
        let audit: Vec<AuditEntry> = changes
            .iter()
            .map(|change| AuditEntry {
                at,
                actor: ctx.actor().to_string(),
                due_id: due.id.clone(),
                field: change.column.to_string(),
                old_value: change.old.clone(),
                new_value: change.new.clone(),
                note: note.clone(),
            })
            .collect();
        club.tables().insert_many(&audit)?;

        for change in &changes {
            if let Err(err) = club
                .tables()
                .update::<Due>(&due.id, change.column, &change.new)
            {
                error!(
                    due_id = %due.id,
                    column = change.column,
                    value = %change.new,
                    error = %err,
                    "settlement interrupted; audit rows describe the intended values"
                );
                return Err(err.into());
            }
        }
        info!(
            due_id = %due.id,
            state = %settled.state,
            amount = %settled.amount,
            method = %settled.method,
            actor = ctx.actor(),
            "due settled"
        );
        Ok(settled)
    }
}

fn validate_settlement(settlement: &Settlement) -> Result<(), ValidationError> {
    if let Some(amount) = settlement.amount {
        ensure_non_negative(amount)?;
    }
    ensure_method(settlement.target, settlement.method)
}

/// A confirmed due must say how it was paid, or the register cannot place it.
fn ensure_method(state: DueState, method: PaymentMethod) -> Result<(), ValidationError> {
    if state == DueState::Confirmed && method == PaymentMethod::Unspecified {
        return Err(ValidationError::MissingField("method"));
    }
    Ok(())
}

fn already_billed(member_id: &str, period: PeriodLabel) -> CoreError {
    ValidationError::AlreadyBilled {
        member_id: member_id.to_string(),
        period: period.to_string(),
    }
    .into()
}
