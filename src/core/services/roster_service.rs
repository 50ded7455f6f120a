//! Read-only access to members and tariffs.

use rust_decimal::Decimal;

use crate::core::context::{Capability, RequestContext};
use crate::core::errors::CoreResult;
use crate::core::Club;
use crate::domain::{Member, Tariff, TariffTable};

const ROSTER_READERS: [Capability; 2] = [Capability::ViewRoster, Capability::CollectPayments];

pub struct RosterService;

impl RosterService {
    pub fn active_members(club: &Club, ctx: &RequestContext) -> CoreResult<Vec<Member>> {
        ctx.require_any(&ROSTER_READERS)?;
        let mut members: Vec<Member> = club
            .tables()
            .all::<Member>()?
            .into_iter()
            .filter(|member| member.active)
            .collect();
        members.sort_by(|a, b| {
            (a.surname.to_lowercase(), a.name.to_lowercase())
                .cmp(&(b.surname.to_lowercase(), b.name.to_lowercase()))
        });
        Ok(members)
    }

    /// Case-insensitive match on name, surname or id document; blank queries list everyone active.
    pub fn search_members(
        club: &Club,
        ctx: &RequestContext,
        query: &str,
    ) -> CoreResult<Vec<Member>> {
        let members = Self::active_members(club, ctx)?;
        if query.trim().is_empty() {
            return Ok(members);
        }
        Ok(members
            .into_iter()
            .filter(|member| member.matches(query))
            .collect())
    }

    pub fn member(club: &Club, ctx: &RequestContext, member_id: &str) -> CoreResult<Member> {
        ctx.require_any(&ROSTER_READERS)?;
        Self::find_member(club, member_id)
    }

    pub fn tariffs(club: &Club, ctx: &RequestContext) -> CoreResult<TariffTable> {
        ctx.require(Capability::ViewDashboard)?;
        Self::tariff_table(club)
    }

    /// Price for `concept`, falling back to the configured default due amount.
    pub fn tariff_price(club: &Club, ctx: &RequestContext, concept: &str) -> CoreResult<Decimal> {
        let tariffs = Self::tariffs(club, ctx)?;
        let settings = club.settings()?;
        let concept = Some(concept).filter(|raw| !raw.trim().is_empty());
        Ok(tariffs.price_or(concept, settings.default_due_amount))
    }

    pub(crate) fn find_member(club: &Club, member_id: &str) -> CoreResult<Member> {
        Ok(club.tables().get::<Member>(member_id)?)
    }

    pub(crate) fn tariff_table(club: &Club) -> CoreResult<TariffTable> {
        Ok(TariffTable::from_tariffs(club.tables().all::<Tariff>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClubConfig;
    use crate::core::context::Role;
    use crate::core::errors::CoreError;

    fn club() -> Club {
        let club = Club::in_memory(ClubConfig::default());
        let tables = club.tables();
        tables.insert(&Member::new("1", "Ana", "Paz").with_concept("Senior")).unwrap();
        tables.insert(&Member::new("2", "Leo", "Alba")).unwrap();
        tables.insert(&Member::new("3", "Eva", "Zapata").inactive()).unwrap();
        tables.insert(&Tariff::new("Senior", Decimal::from(18000))).unwrap();
        club
    }

    #[test]
    fn active_members_are_sorted_by_surname() {
        let ctx = RequestContext::new("admin", Role::Administrator);
        let members = RosterService::active_members(&club(), &ctx).unwrap();
        let ids: Vec<_> = members.iter().map(|member| member.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn search_skips_inactive_members() {
        let ctx = RequestContext::new("coach", Role::Coach);
        let club = club();
        assert_eq!(RosterService::search_members(&club, &ctx, "PAZ").unwrap().len(), 1);
        assert!(RosterService::search_members(&club, &ctx, "zapata").unwrap().is_empty());
    }

    #[test]
    fn tariff_price_falls_back_to_default() {
        let ctx = RequestContext::new("acc", Role::Accountant);
        let club = club();
        assert_eq!(
            RosterService::tariff_price(&club, &ctx, "senior").unwrap(),
            Decimal::from(18000)
        );
        assert_eq!(
            RosterService::tariff_price(&club, &ctx, "Juniors").unwrap(),
            Decimal::from(15000)
        );
    }

    #[test]
    fn unknown_member_is_not_found() {
        let ctx = RequestContext::new("acc", Role::Accountant);
        let err = RosterService::member(&club(), &ctx, "99").unwrap_err();
        assert!(matches!(err, CoreError::NotFound { kind: "member", .. }));
    }
}
