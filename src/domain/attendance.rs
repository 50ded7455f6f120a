use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::core::errors::ValidationError;
use crate::domain::common::fold;

/// Presence state stored on an attendance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceState {
    Present,
    Absent,
    /// Guest recovering a missed session; no financial effect.
    MakeUp,
    /// Guest attending an additional, charged session.
    Extra,
}

impl AttendanceState {
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceState::Present => "Present",
            AttendanceState::Absent => "Absent",
            AttendanceState::MakeUp => "Make-up",
            AttendanceState::Extra => "Extra",
        }
    }
}

impl fmt::Display for AttendanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AttendanceState {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match fold(raw).as_str() {
            "present" => Ok(AttendanceState::Present),
            "absent" => Ok(AttendanceState::Absent),
            "make-up" | "makeup" => Ok(AttendanceState::MakeUp),
            "extra" => Ok(AttendanceState::Extra),
            other => Err(ValidationError::Invalid(format!(
                "unknown attendance state `{other}`"
            ))),
        }
    }
}

/// Reason code required whenever an enrolled member is marked absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbsenceReason {
    Illness,
    Injury,
    Travel,
    School,
    Weather,
    Unexcused,
}

impl AbsenceReason {
    pub const ALL: [AbsenceReason; 6] = [
        AbsenceReason::Illness,
        AbsenceReason::Injury,
        AbsenceReason::Travel,
        AbsenceReason::School,
        AbsenceReason::Weather,
        AbsenceReason::Unexcused,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AbsenceReason::Illness => "Illness",
            AbsenceReason::Injury => "Injury",
            AbsenceReason::Travel => "Travel",
            AbsenceReason::School => "School",
            AbsenceReason::Weather => "Weather",
            AbsenceReason::Unexcused => "Unexcused",
        }
    }
}

impl fmt::Display for AbsenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AbsenceReason {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let folded = fold(raw);
        AbsenceReason::ALL
            .into_iter()
            .find(|reason| reason.label().to_lowercase() == folded)
            .ok_or_else(|| ValidationError::Invalid(format!("unknown absence reason `{raw}`")))
    }
}

/// One appended attendance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub member_id: String,
    pub member_name: String,
    pub site: String,
    pub group_label: String,
    pub state: AttendanceState,
    pub reason: Option<AbsenceReason>,
}

impl AttendanceRecord {
    /// Same person in the same session, whatever state was recorded.
    pub fn same_entry(&self, other: &AttendanceRecord) -> bool {
        self.date == other.date
            && self.time == other.time
            && self.site == other.site
            && self.group_label == other.group_label
            && self.member_id == other.member_id
            && self.member_name == other.member_name
    }
}

/// Roster line of an attendance sheet; members default to present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMark {
    pub member_id: String,
    pub member_name: String,
    pub present: bool,
    pub reason: Option<AbsenceReason>,
}

impl AttendanceMark {
    pub fn absent(mut self, reason: Option<AbsenceReason>) -> Self {
        self.present = false;
        self.reason = reason;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuestKind {
    MakeUp,
    Extra,
}

/// Someone attending a slot they are not enrolled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestAttendance {
    /// Roster id when the guest is a member; non-members have none.
    pub member_id: Option<String>,
    pub name: String,
    pub kind: GuestKind,
}

impl GuestAttendance {
    pub fn member(member_id: impl Into<String>, name: impl Into<String>, kind: GuestKind) -> Self {
        Self {
            member_id: Some(member_id.into()),
            name: name.into(),
            kind,
        }
    }

    pub fn visitor(name: impl Into<String>, kind: GuestKind) -> Self {
        Self {
            member_id: None,
            name: name.into(),
            kind,
        }
    }
}

/// Attendance for one slot on one date, ready to be edited and recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSheet {
    pub slot_id: String,
    pub date: NaiveDate,
    pub marks: Vec<AttendanceMark>,
    pub guests: Vec<GuestAttendance>,
}

impl AttendanceSheet {
    /// Marks a listed member absent; returns false when the member is not on the sheet.
    pub fn mark_absent(&mut self, member_id: &str, reason: Option<AbsenceReason>) -> bool {
        match self.marks.iter_mut().find(|mark| mark.member_id == member_id) {
            Some(mark) => {
                *mark = mark.clone().absent(reason);
                true
            }
            None => false,
        }
    }

    pub fn add_guest(&mut self, guest: GuestAttendance) {
        self.guests.push(guest);
    }

    /// Every absence must carry a reason code and every guest a name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(mark) = self
            .marks
            .iter()
            .find(|mark| !mark.present && mark.reason.is_none())
        {
            return Err(ValidationError::MissingAbsenceReason(mark.member_id.clone()));
        }
        if self.guests.iter().any(|guest| guest.name.trim().is_empty()) {
            return Err(ValidationError::MissingField("guest name"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> AttendanceSheet {
        AttendanceSheet {
            slot_id: "s1".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 17).unwrap(),
            marks: vec![AttendanceMark {
                member_id: "m1".into(),
                member_name: "Ana Paz".into(),
                present: true,
                reason: None,
            }],
            guests: Vec::new(),
        }
    }

    #[test]
    fn absence_without_reason_fails_validation() {
        let mut sheet = sheet();
        assert!(sheet.validate().is_ok());
        assert!(sheet.mark_absent("m1", None));
        assert_eq!(
            sheet.validate().unwrap_err(),
            ValidationError::MissingAbsenceReason("m1".into())
        );
        sheet.mark_absent("m1", Some(AbsenceReason::Illness));
        assert!(sheet.validate().is_ok());
        assert!(!sheet.mark_absent("ghost", Some(AbsenceReason::Travel)));
    }

    #[test]
    fn guests_need_a_name() {
        let mut sheet = sheet();
        sheet.add_guest(GuestAttendance::visitor("  ", GuestKind::Extra));
        assert_eq!(
            sheet.validate().unwrap_err(),
            ValidationError::MissingField("guest name")
        );
        sheet.guests[0].name = "Walk-in".into();
        assert!(sheet.validate().is_ok());
    }

    #[test]
    fn state_labels_parse_back() {
        for state in [
            AttendanceState::Present,
            AttendanceState::Absent,
            AttendanceState::MakeUp,
            AttendanceState::Extra,
        ] {
            assert_eq!(state.label().parse::<AttendanceState>().unwrap(), state);
        }
        assert_eq!("injury".parse::<AbsenceReason>().unwrap(), AbsenceReason::Injury);
    }
}
