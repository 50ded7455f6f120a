//! Attendance sheets and the guest charges they raise.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info};

use crate::core::context::{Capability, RequestContext};
use crate::core::errors::{CoreResult, ValidationError};
use crate::core::locks::sheet_key;
use crate::core::services::enrollment_service::EnrollmentService;
use crate::core::Club;
use crate::domain::schedule::weekday_label;
use crate::domain::{
    AbsenceReason, AttendanceMark, AttendanceRecord, AttendanceSheet, AttendanceState, Concept, Due, GuestKind,
    PeriodRef, TrainingSlot,
};

/// A guest charge that could not be written after attendance was stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedCharge {
    pub member_id: Option<String>,
    pub name: String,
    pub amount: Decimal,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceOutcome {
    pub recorded: usize,
    /// Sheet lines skipped because an earlier submission stored them.
    pub already_recorded: usize,
    pub charges: Vec<Due>,
    /// Extra guests skipped because their charge for this session exists.
    pub already_charged: usize,
    /// Charges to reconcile by hand; the attendance rows are already stored.
    pub failed_charges: Vec<FailedCharge>,
}

pub struct AttendanceService;

impl AttendanceService {
    /// Sheet for `slot_id` on `date` listing every enrolled member as present.
    pub fn attendance_sheet(
        club: &Club,
        ctx: &RequestContext,
        slot_id: &str,
        date: NaiveDate,
    ) -> CoreResult<AttendanceSheet> {
        ctx.require(Capability::RecordAttendance)?;
        let slot = EnrollmentService::find_slot(club, slot_id)?;
        ensure_slot_day(&slot, date)?;
        let mut marks: Vec<AttendanceMark> = EnrollmentService::roster_for_slot(club, slot_id)?
            .into_iter()
            .map(|enrollment| AttendanceMark {
                member_id: enrollment.member_id,
                member_name: enrollment.member_name,
                present: true,
                reason: None,
            })
            .collect();
        marks.sort_by(|a, b| a.member_name.cmp(&b.member_name));
        Ok(AttendanceSheet {
            slot_id: slot.id,
            date,
            marks,
            guests: Vec::new(),
        })
    }

    /// Appends the sheet's attendance rows, then raises a pending charge for
    /// every extra guest.
    ///
    /// A failed attendance write aborts before any charge. A failed charge is
    /// logged and returned in `failed_charges`; the stored attendance stays.
    /// Submitting the same sheet again writes only what is still missing, so
    /// it is the way to retry failed charges.
    pub fn record_attendance(
        club: &Club,
        ctx: &RequestContext,
        sheet: &AttendanceSheet,
    ) -> CoreResult<AttendanceOutcome> {
        ctx.require(Capability::RecordAttendance)?;
        sheet.validate()?;
        let slot = EnrollmentService::find_slot(club, &sheet.slot_id)?;
        ensure_slot_day(&slot, sheet.date)?;
        let settings = club.settings()?;
        let _guard = club.locks().acquire(sheet_key(&slot.id, sheet.date))?;

        let stored: Vec<AttendanceRecord> = club.tables().all()?;
        let charged: Vec<Due> = club.tables().all()?;
        let (fresh, repeated): (Vec<AttendanceRecord>, Vec<AttendanceRecord>) =
            attendance_rows(&slot, sheet)
                .into_iter()
                .partition(|row| !stored.iter().any(|kept| kept.same_entry(row)));
        if !fresh.is_empty() {
            club.tables().insert_many(&fresh)?;
        }
        info!(
            slot_id = %slot.id,
            date = %sheet.date,
            rows = fresh.len(),
            skipped = repeated.len(),
            actor = ctx.actor(),
            "attendance recorded"
        );

        let mut outcome = AttendanceOutcome {
            recorded: fresh.len(),
            already_recorded: repeated.len(),
            charges: Vec::new(),
            already_charged: 0,
            failed_charges: Vec::new(),
        };
        let price = settings.guest_session_price;
        let note = format!("{} {}", slot.group_label(), sheet.date);
        for guest in sheet.guests.iter().filter(|guest| guest.kind == GuestKind::Extra) {
            let charge = Due::pending(
                guest.member_id.clone().unwrap_or_default(),
                guest.name.trim(),
                price,
                Concept::GuestSession,
                PeriodRef::Day(sheet.date),
                club.today(),
            )
            .with_actor(ctx.actor())
            .with_note(note.as_str());
            if charged.iter().any(|due| same_guest_charge(due, &charge)) {
                outcome.already_charged += 1;
                continue;
            }

            match club.tables().insert(&charge) {
                Ok(()) => outcome.charges.push(charge),
                Err(err) => {
                    error!(
                        slot_id = %slot.id,
                        date = %sheet.date,
                        guest = %guest.name,
                        member_id = guest.member_id.as_deref().unwrap_or(""),
                        amount = %price,
                        error = %err,
                        "guest charge not written; attendance already stored"
                    );
                    outcome.failed_charges.push(FailedCharge {
                        member_id: guest.member_id.clone(),
                        name: guest.name.clone(),
                        amount: price,
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(outcome)
    }
}

/// A stored guest charge for the same person and session, reversed or not.
fn same_guest_charge(stored: &Due, charge: &Due) -> bool {
    !stored.is_reversal()
        && stored.concept == Concept::GuestSession
        && stored.period == charge.period
        && stored.member_id == charge.member_id
        && stored.member_name == charge.member_name
        && stored.note == charge.note
}

fn ensure_slot_day(slot: &TrainingSlot, date: NaiveDate) -> Result<(), ValidationError> {
    if date.weekday() != slot.weekday {
        return Err(ValidationError::Invalid(format!(
            "{date} is not a {} (slot `{}`)",
            weekday_label(slot.weekday),
            slot.id
        )));
    }
    Ok(())
}

fn attendance_rows(slot: &TrainingSlot, sheet: &AttendanceSheet) -> Vec<AttendanceRecord> {
    let row = |member_id: String,
               member_name: String,
               state: AttendanceState,
               reason: Option<AbsenceReason>| AttendanceRecord {
        date: sheet.date,
        time: slot.window.start,
        member_id,
        member_name,
        site: slot.site.clone(),
        group_label: slot.group_label(),
        state,
        reason,
    };
    let roster = sheet.marks.iter().map(|mark| {
        if mark.present {
            row(mark.member_id.clone(), mark.member_name.clone(), AttendanceState::Present, None)
        } else {
            row(mark.member_id.clone(), mark.member_name.clone(), AttendanceState::Absent, mark.reason)
        }
    });
    let guests = sheet.guests.iter().map(|guest| {
        let state = match guest.kind {
            GuestKind::MakeUp => AttendanceState::MakeUp,
            GuestKind::Extra => AttendanceState::Extra,
        };
        row(
            guest.member_id.clone().unwrap_or_default(),
            guest.name.clone(),
            state,
            None,
        )
    });
    roster.chain(guests).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClubConfig;
    use crate::core::context::Role;
    use crate::core::errors::CoreError;
    use crate::core::time::FixedClock;
    use crate::domain::{GuestAttendance, Member, TimeWindow};
    use crate::store::MemoryStore;
    use chrono::Weekday;
    use std::sync::Arc;

    // 2025-03-17 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 17).unwrap()
    }

    fn club() -> Club {
        let club = Club::new(
            Arc::new(MemoryStore::new()),
            ClubConfig::default(),
            Arc::new(FixedClock::on(monday())),
        );
        let tables = club.tables();
        tables
            .insert(&TrainingSlot {
                id: "a".into(),
                site: "North".into(),
                weekday: Weekday::Mon,
                window: "18:00 - 19:00".parse::<TimeWindow>().unwrap(),
                group: "Kids".into(),
                coach: "Coach".into(),
                capacity: 10,
            })
            .unwrap();
        for (id, name) in [("m1", "Ana"), ("m2", "Leo")] {
            tables.insert(&Member::new(id, name, "Paz")).unwrap();
            let ctx = RequestContext::new("profe", Role::Coach);
            EnrollmentService::enroll(&club, &ctx, id, "a").unwrap();
        }
        club
    }

    fn coach() -> RequestContext {
        RequestContext::new("profe", Role::Coach)
    }

    #[test]
    fn sheet_lists_the_slot_roster_as_present() {
        let sheet = AttendanceService::attendance_sheet(&club(), &coach(), "a", monday()).unwrap();
        assert_eq!(sheet.marks.len(), 2);
        assert!(sheet.marks.iter().all(|mark| mark.present));
    }

    #[test]
    fn sheet_date_must_match_the_slot_weekday() {
        let tuesday = monday().succ_opt().unwrap();
        let err = AttendanceService::attendance_sheet(&club(), &coach(), "a", tuesday).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Invalid(_))));
    }

    #[test]
    fn absences_need_a_reason_before_anything_is_written() {
        let club = club();
        let mut sheet = AttendanceService::attendance_sheet(&club, &coach(), "a", monday()).unwrap();
        sheet.mark_absent("m1", None);
        let err = AttendanceService::record_attendance(&club, &coach(), &sheet).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MissingAbsenceReason(_))
        ));
        assert!(club.tables().all::<AttendanceRecord>().unwrap().is_empty());
    }

    #[test]
    fn nameless_visitor_is_rejected_before_anything_is_written() {
        let club = club();
        let mut sheet = AttendanceService::attendance_sheet(&club, &coach(), "a", monday()).unwrap();
        sheet.add_guest(GuestAttendance::visitor("", GuestKind::Extra));
        let err = AttendanceService::record_attendance(&club, &coach(), &sheet).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MissingField("guest name"))
        ));
        assert!(club.tables().all::<AttendanceRecord>().unwrap().is_empty());
        assert!(club.tables().all::<Due>().unwrap().is_empty());
    }

    #[test]
    fn extra_guests_are_charged_and_make_ups_are_not() {
        let club = club();
        let mut sheet = AttendanceService::attendance_sheet(&club, &coach(), "a", monday()).unwrap();
        sheet.mark_absent("m2", Some(AbsenceReason::Illness));
        sheet.add_guest(GuestAttendance::visitor("Visiting Kid", GuestKind::Extra));
        sheet.add_guest(GuestAttendance::member("m9", "Eva Sosa", GuestKind::MakeUp));

        let outcome = AttendanceService::record_attendance(&club, &coach(), &sheet).unwrap();
        assert_eq!(outcome.recorded, 4);
        assert_eq!(outcome.charges.len(), 1);
        assert!(outcome.failed_charges.is_empty());

        let charge = &outcome.charges[0];
        assert_eq!(charge.amount, Decimal::from(5000));
        assert_eq!(charge.concept, Concept::GuestSession);
        assert_eq!(charge.period, PeriodRef::Day(monday()));
        assert!(charge.is_pending());
        assert!(!charge.is_recurring());

        let rows: Vec<AttendanceRecord> = club.tables().all().unwrap();
        let absent = rows.iter().find(|row| row.member_id == "m2").unwrap();
        assert_eq!(absent.reason, Some(AbsenceReason::Illness));
        assert!(rows.iter().any(|row| row.state == AttendanceState::MakeUp));
    }

    #[test]
    fn resubmitting_a_sheet_writes_nothing_twice() {
        let club = club();
        let mut sheet = AttendanceService::attendance_sheet(&club, &coach(), "a", monday()).unwrap();
        sheet.add_guest(GuestAttendance::visitor("Visiting Kid", GuestKind::Extra));
        AttendanceService::record_attendance(&club, &coach(), &sheet).unwrap();

        sheet.add_guest(GuestAttendance::visitor("Late Kid", GuestKind::Extra));
        let again = AttendanceService::record_attendance(&club, &coach(), &sheet).unwrap();
        assert_eq!(again.recorded, 1);
        assert_eq!(again.already_recorded, 3);
        assert_eq!(again.already_charged, 1);
        assert_eq!(again.charges.len(), 1);
        assert_eq!(again.charges[0].member_name, "Late Kid");

        assert_eq!(club.tables().all::<AttendanceRecord>().unwrap().len(), 4);
        let charges: Vec<Due> = club.tables().all().unwrap();
        assert_eq!(charges.len(), 2);
    }
}
