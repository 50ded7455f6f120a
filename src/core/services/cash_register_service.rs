//! Read-only register figures over confirmed dues and expenses.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::core::context::{Capability, RequestContext};
use crate::core::errors::{CoreResult, ValidationError};
use crate::core::Club;
use crate::domain::{Due, DueState, Expense, PaymentMethod, PeriodLabel};

/// Confirmed income for one payment date, split by cash and everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub cash: Decimal,
    pub digital: Decimal,
    /// Amounts stored without a payment method; counted in neither figure above.
    pub unassigned: Decimal,
    pub total: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeTotals {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub period: Option<PeriodLabel>,
    pub state: DueState,
    pub cash: Decimal,
    pub digital: Decimal,
    pub unassigned: Decimal,
    pub total: Decimal,
    /// Matching dues ordered by payment date.
    pub dues: Vec<Due>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CashFlow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
}

pub struct CashRegisterService;

impl CashRegisterService {
    pub fn daily_totals(club: &Club, ctx: &RequestContext, date: NaiveDate) -> CoreResult<DailyTotals> {
        ctx.require(Capability::ViewCashRegister)?;
        let dues: Vec<Due> = club.tables().all()?;
        let paid: Vec<&Due> = dues
            .iter()
            .filter(|due| due.is_confirmed() && due.payment_date == date)
            .collect();
        let split = MethodSplit::over(paid.iter().copied());
        Ok(DailyTotals {
            date,
            cash: split.cash,
            digital: split.digital,
            unassigned: split.unassigned,
            total: split.total(),
            count: paid.len(),
        })
    }

    /// Dues in `state` paid within `start..=end`, optionally restricted to one period.
    pub fn range_totals(
        club: &Club,
        ctx: &RequestContext,
        start: NaiveDate,
        end: NaiveDate,
        period: Option<PeriodLabel>,
        state: DueState,
    ) -> CoreResult<RangeTotals> {
        ctx.require(Capability::ViewCashRegister)?;
        ensure_window(start, end)?;
        let mut dues: Vec<Due> = club
            .tables()
            .all::<Due>()?
            .into_iter()
            .filter(|due| due.state == state)
            .filter(|due| (start..=end).contains(&due.payment_date))
            .filter(|due| period.map_or(true, |label| due.period.is_month(label)))
            .collect();
        dues.sort_by_key(|due| due.payment_date);

        let split = MethodSplit::over(dues.iter());
        Ok(RangeTotals {
            start,
            end,
            period,
            state,
            cash: split.cash,
            digital: split.digital,
            unassigned: split.unassigned,
            total: split.total(),
            dues,
        })
    }

    /// Confirmed income minus expenses over `start..=end`.
    pub fn cash_flow(
        club: &Club,
        ctx: &RequestContext,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CoreResult<CashFlow> {
        let income = Self::range_totals(club, ctx, start, end, None, DueState::Confirmed)?.total;
        let expenses: Decimal = club
            .tables()
            .all::<Expense>()?
            .iter()
            .filter(|expense| (start..=end).contains(&expense.date))
            .map(|expense| expense.amount)
            .sum();
        Ok(CashFlow {
            start,
            end,
            income,
            expenses,
            balance: income - expenses,
        })
    }
}

#[derive(Default)]
struct MethodSplit {
    cash: Decimal,
    digital: Decimal,
    unassigned: Decimal,
}

impl MethodSplit {
    fn over<'a>(dues: impl Iterator<Item = &'a Due>) -> Self {
        dues.fold(Self::default(), |mut split, due| {
            match due.method {
                PaymentMethod::Cash => split.cash += due.amount,
                PaymentMethod::Unspecified => split.unassigned += due.amount,
                _ => split.digital += due.amount,
            }
            split
        })
    }

    fn total(&self) -> Decimal {
        self.cash + self.digital + self.unassigned
    }
}

fn ensure_window(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if end < start {
        return Err(ValidationError::InvalidWindow {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClubConfig;
    use crate::core::context::Role;
    use crate::core::errors::CoreError;
    use crate::domain::{Concept, PaymentMethod, PeriodRef};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn paid(amount: i64, method: PaymentMethod, on: NaiveDate) -> Due {
        Due::pending("m", "M", Decimal::from(amount), Concept::Apparel, PeriodRef::Unassigned, on)
            .confirmed_with(method)
    }

    fn accountant() -> RequestContext {
        RequestContext::new("acc", Role::Accountant)
    }

    #[test]
    fn pending_and_other_days_are_left_out() {
        let club = Club::in_memory(ClubConfig::default());
        let tables = club.tables();
        tables.insert(&paid(100, PaymentMethod::Cash, day(5))).unwrap();
        tables.insert(&paid(70, PaymentMethod::Transfer, day(6))).unwrap();
        tables
            .insert(&Due::pending("m", "M", Decimal::from(40), Concept::Apparel, PeriodRef::Unassigned, day(5)))
            .unwrap();

        let totals = CashRegisterService::daily_totals(&club, &accountant(), day(5)).unwrap();
        assert_eq!(totals.total, Decimal::from(100));
        assert_eq!(totals.count, 1);

        let pending = CashRegisterService::range_totals(&club, &accountant(), day(1), day(31), None, DueState::Pending).unwrap();
        assert_eq!(pending.total, Decimal::from(40));
        assert_eq!(pending.unassigned, Decimal::from(40));
        assert_eq!(pending.digital, Decimal::ZERO);
    }

    #[test]
    fn rows_without_a_method_are_not_booked_as_digital() {
        let club = Club::in_memory(ClubConfig::default());
        let tables = club.tables();
        tables.insert(&paid(100, PaymentMethod::Cash, day(5))).unwrap();
        tables.insert(&paid(60, PaymentMethod::Unspecified, day(5))).unwrap();

        let totals = CashRegisterService::daily_totals(&club, &accountant(), day(5)).unwrap();
        assert_eq!(totals.cash, Decimal::from(100));
        assert_eq!(totals.digital, Decimal::ZERO);
        assert_eq!(totals.unassigned, Decimal::from(60));
        assert_eq!(totals.total, Decimal::from(160));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let club = Club::in_memory(ClubConfig::default());
        let err = CashRegisterService::range_totals(&club, &accountant(), day(9), day(2), None, DueState::Confirmed)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::InvalidWindow { .. })));
    }

    #[test]
    fn coaches_cannot_read_the_register() {
        let club = Club::in_memory(ClubConfig::default());
        let coach = RequestContext::new("profe", Role::Coach);
        assert!(matches!(
            CashRegisterService::daily_totals(&club, &coach, day(1)),
            Err(CoreError::Forbidden { .. })
        ));
    }
}
