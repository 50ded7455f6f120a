//! Monthly due generation and the debtor report.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::context::{Capability, RequestContext};
use crate::core::errors::{CoreError, CoreResult};
use crate::core::locks::period_key;
use crate::core::services::roster_service::RosterService;
use crate::core::Club;
use crate::domain::{Concept, Due, DueBook, Member, PeriodLabel};
use crate::errors::StoreError;

/// What one generation pass did for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub period: PeriodLabel,
    pub active_members: usize,
    /// Members that already held a live recurring due for the period.
    pub already_billed: usize,
    pub created: usize,
}

/// An active member without a confirmed recurring due for a period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Debtor {
    pub member_id: String,
    pub name: String,
    /// Amount of the member's pending due, when one was generated.
    pub pending_amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebtorReport {
    pub period: PeriodLabel,
    /// Set once the period's due day has passed; earlier reports are informational.
    pub alert_active: bool,
    pub debtors: Vec<Debtor>,
}

pub struct DuesService;

impl DuesService {
    /// Gives every active member exactly one recurring due for `period`.
    ///
    /// Safe to repeat: members already billed are skipped, so a retry after a
    /// failure only fills the gaps.
    pub fn ensure_period_dues(
        club: &Club,
        ctx: &RequestContext,
        period: PeriodLabel,
    ) -> CoreResult<GenerationReport> {
        ctx.require(Capability::GenerateDues)?;
        let settings = club.settings()?;
        let _guard = club.locks().acquire(period_key(period))?;

        let members: Vec<Member> = club.tables().all()?;
        let tariffs = RosterService::tariff_table(club)?;
        let book = DueBook::new(club.tables().all()?);
        let billed = book.billed_members(period);
        let today = club.today();

        let active: Vec<&Member> = members.iter().filter(|member| member.active).collect();
        let fresh: Vec<Due> = active
            .iter()
            .filter(|member| !billed.contains(member.id.as_str()))
            .map(|member| {
                let concept = member.tariff_concept();
                let amount = tariffs.price_or(concept, settings.default_due_amount);
                Due::pending(
                    &member.id,
                    member.full_name(),
                    amount,
                    Concept::for_tariff(concept),
                    period.into(),
                    today,
                )
                .with_actor(ctx.actor())
            })
            .collect();

        let mut report = GenerationReport {
            period,
            active_members: active.len(),
            already_billed: active.len() - fresh.len(),
            created: 0,
        };
        if fresh.is_empty() {
            info!(period = %period, actor = ctx.actor(), "period already fully billed");
            return Ok(report);
        }

        report.created = match club.tables().insert_many(&fresh) {
            Ok(()) => fresh.len(),
            Err(source) => Self::count_landed(club, period, &fresh, source)?,
        };
        info!(
            period = %period,
            actor = ctx.actor(),
            created = report.created,
            already_billed = report.already_billed,
            "period dues generated"
        );
        Ok(report)
    }

    /// Runs [`DuesService::ensure_period_dues`] for the period active today.
    pub fn ensure_active_period_dues(
        club: &Club,
        ctx: &RequestContext,
    ) -> CoreResult<GenerationReport> {
        let period = club.active_period()?;
        Self::ensure_period_dues(club, ctx, period)
    }

    /// Active members lacking a confirmed recurring due for `period`.
    pub fn outstanding_members(
        club: &Club,
        ctx: &RequestContext,
        period: PeriodLabel,
    ) -> CoreResult<DebtorReport> {
        ctx.require(Capability::ViewDashboard)?;
        let settings = club.settings()?;
        let members: Vec<Member> = club.tables().all()?;
        let book = DueBook::new(club.tables().all()?);
        let paid = book.paid_members(period);

        let mut debtors: Vec<Debtor> = members
            .iter()
            .filter(|member| member.active && !paid.contains(member.id.as_str()))
            .map(|member| Debtor {
                member_id: member.id.clone(),
                name: member.full_name(),
                pending_amount: book.pending_for(&member.id, period).map(|due| due.amount),
            })
            .collect();
        debtors.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(DebtorReport {
            period,
            alert_active: alert_active(period, settings.due_day, club.today()),
            debtors,
        })
    }

    /// Re-reads the dues table after a failed batch to learn how much landed.
    fn count_landed(
        club: &Club,
        period: PeriodLabel,
        attempted: &[Due],
        source: StoreError,
    ) -> CoreResult<usize> {
        let ids: HashSet<&str> = attempted.iter().map(|due| due.id.as_str()).collect();
        let stored: Vec<Due> = match club.tables().all() {
            Ok(stored) => stored,
            Err(recount) => {
                error!(period = %period, error = %recount, "could not recount dues after failed batch");
                return Err(source.into());
            }
        };
        let inserted = stored
            .iter()
            .filter(|due| ids.contains(due.id.as_str()))
            .count();
        if inserted == attempted.len() {
            warn!(period = %period, error = %source, "batch reported failure but every row landed");
            return Ok(inserted);
        }
        if inserted == 0 {
            error!(period = %period, error = %source, "due batch failed before any row landed");
            return Err(source.into());
        }
        error!(
            period = %period,
            inserted,
            attempted = attempted.len(),
            error = %source,
            "due batch stopped partway"
        );
        Err(CoreError::PartialBatch {
            scope: period.to_string(),
            inserted,
            attempted: attempted.len(),
            source,
        })
    }
}

/// True once `today` reaches the due day inside (or after) the period's month.
pub fn alert_active(period: PeriodLabel, due_day: u32, today: NaiveDate) -> bool {
    let current = PeriodLabel::containing(today);
    current > period || (current == period && today.day() >= due_day)
}
