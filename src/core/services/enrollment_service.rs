//! Enrollment against the weekly template. Occupancy is always derived by
//! scanning the enrollments table, so withdrawing frees the seat at once.

use chrono::Weekday;
use tracing::{info, warn};

use crate::core::context::{Capability, RequestContext};
use crate::core::errors::{CoreError, CoreResult, ValidationError};
use crate::core::locks::{member_key, slot_key};
use crate::core::services::roster_service::RosterService;
use crate::core::Club;
use crate::domain::common::fold;
use crate::domain::{Enrollment, OpenSlot, TrainingSlot};

pub struct EnrollmentService;

impl EnrollmentService {
    /// Template slots at `site` on `weekday` with live occupancy, earliest first.
    pub fn list_open_slots(
        club: &Club,
        ctx: &RequestContext,
        site: &str,
        weekday: Weekday,
    ) -> CoreResult<Vec<OpenSlot>> {
        ctx.require(Capability::ManageEnrollments)?;
        let site = fold(site);
        let enrollments: Vec<Enrollment> = club.tables().all()?;
        let mut open: Vec<OpenSlot> = club
            .tables()
            .all::<TrainingSlot>()?
            .into_iter()
            .filter(|slot| slot.weekday == weekday && fold(&slot.site) == site)
            .map(|slot| {
                let enrolled = occupancy(&enrollments, &slot.id);
                OpenSlot::new(slot, enrolled)
            })
            .collect();
        open.sort_by(|a, b| {
            (a.slot.window.start, &a.slot.group).cmp(&(b.slot.window.start, &b.slot.group))
        });
        Ok(open)
    }

    /// Registers a member in a slot.
    ///
    /// Fails with `Full` when no seat remains and with `Conflict` when the member
    /// already holds any slot on the same weekday and time window.
    pub fn enroll(
        club: &Club,
        ctx: &RequestContext,
        member_id: &str,
        slot_id: &str,
    ) -> CoreResult<Enrollment> {
        ctx.require(Capability::ManageEnrollments)?;
        let _guards = club
            .locks()
            .acquire_all(&[member_key(member_id), slot_key(slot_id)])?;

        let member = RosterService::find_member(club, member_id)?;
        if !member.active {
            return Err(ValidationError::Invalid(format!("member `{member_id}` is inactive")).into());
        }
        let slots: Vec<TrainingSlot> = club.tables().all()?;
        let slot = slots
            .iter()
            .find(|slot| slot.id == slot_id)
            .ok_or_else(|| CoreError::not_found("slot", slot_id))?;
        let enrollments: Vec<Enrollment> = club.tables().all()?;

        let enrolled = occupancy(&enrollments, &slot.id);
        if enrolled >= slot.capacity {
            warn!(slot_id, member_id, capacity = slot.capacity, "slot full");
            return Err(ValidationError::Full {
                slot_id: slot.id.clone(),
                capacity: slot.capacity,
            }
            .into());
        }

        let clash = enrollments
            .iter()
            .filter(|enrollment| enrollment.member_id == member.id)
            .filter_map(|enrollment| slots.iter().find(|held| held.id == enrollment.slot_id))
            .find(|held| held.shares_block_with(slot));
        if let Some(held) = clash {
            warn!(slot_id, member_id, existing = %held.id, "enrollment conflict");
            return Err(ValidationError::Conflict {
                member_id: member.id.clone(),
                existing_slot: held.id.clone(),
                block: slot.block_label(),
            }
            .into());
        }

        let enrollment = Enrollment::new(&member, slot);
        club.tables().insert(&enrollment)?;
        info!(enrollment_id = %enrollment.id, slot_id, member_id, actor = ctx.actor(), "member enrolled");
        Ok(enrollment)
    }

    /// Deletes an enrollment row; the seat is free for the next scan.
    pub fn withdraw(
        club: &Club,
        ctx: &RequestContext,
        enrollment_id: &str,
    ) -> CoreResult<Enrollment> {
        ctx.require(Capability::ManageEnrollments)?;
        let enrollment = Self::find(club, enrollment_id)?;
        let _guard = club.locks().acquire(slot_key(&enrollment.slot_id))?;
        club.tables().remove::<Enrollment>(&enrollment.id)?;
        info!(enrollment_id, slot_id = %enrollment.slot_id, member_id = %enrollment.member_id, actor = ctx.actor(), "member withdrawn");
        Ok(enrollment)
    }

    pub fn enrollments_for_member(
        club: &Club,
        ctx: &RequestContext,
        member_id: &str,
    ) -> CoreResult<Vec<Enrollment>> {
        ctx.require_any(&[Capability::ManageEnrollments, Capability::ViewRoster])?;
        Ok(club
            .tables()
            .all::<Enrollment>()?
            .into_iter()
            .filter(|enrollment| enrollment.member_id == member_id)
            .collect())
    }

    /// Enrollments currently held in `slot_id`.
    pub(crate) fn roster_for_slot(club: &Club, slot_id: &str) -> CoreResult<Vec<Enrollment>> {
        Ok(club
            .tables()
            .all::<Enrollment>()?
            .into_iter()
            .filter(|enrollment| enrollment.slot_id == slot_id)
            .collect())
    }

    pub(crate) fn find_slot(club: &Club, slot_id: &str) -> CoreResult<TrainingSlot> {
        Ok(club.tables().get::<TrainingSlot>(slot_id)?)
    }

    fn find(club: &Club, enrollment_id: &str) -> CoreResult<Enrollment> {
        Ok(club.tables().get::<Enrollment>(enrollment_id)?)
    }
}

fn occupancy(enrollments: &[Enrollment], slot_id: &str) -> u32 {
    let count = enrollments
        .iter()
        .filter(|enrollment| enrollment.slot_id == slot_id)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}
