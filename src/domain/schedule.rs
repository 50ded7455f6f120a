//! Weekly training template: slots, time windows and weekday labels.

use std::{fmt, str::FromStr};

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::core::errors::ValidationError;
use crate::domain::common::*;

const TIME_FORMAT: &str = "%H:%M";

/// A start–end block within a day, written `"18:00 - 19:00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvalidWindow {
                start: start.format(TIME_FORMAT).to_string(),
                end: end.format(TIME_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format(TIME_FORMAT),
            self.end.format(TIME_FORMAT)
        )
    }
}

impl FromStr for TimeWindow {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::Invalid(format!("invalid time window `{raw}`"));
        let (start, end) = raw.split_once('-').ok_or_else(invalid)?;
        let start = NaiveTime::parse_from_str(start.trim(), TIME_FORMAT).map_err(|_| invalid())?;
        let end = NaiveTime::parse_from_str(end.trim(), TIME_FORMAT).map_err(|_| invalid())?;
        Self::new(start, end)
    }
}

pub fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn parse_weekday(raw: &str) -> Result<Weekday, ValidationError> {
    raw.trim()
        .parse::<Weekday>()
        .map_err(|_| ValidationError::Invalid(format!("invalid weekday `{raw}`")))
}

/// One fixed weekly block at a site, with its group, coach and capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSlot {
    pub id: String,
    pub site: String,
    pub weekday: Weekday,
    pub window: TimeWindow,
    pub group: String,
    pub coach: String,
    pub capacity: u32,
}

impl TrainingSlot {
    /// Two slots collide for a member when they share weekday and time window,
    /// whatever their site or group.
    pub fn shares_block_with(&self, other: &TrainingSlot) -> bool {
        self.weekday == other.weekday && self.window == other.window
    }

    pub fn block_label(&self) -> String {
        format!("{} {}", weekday_label(self.weekday), self.window)
    }

    /// Label stored on attendance rows for this slot.
    pub fn group_label(&self) -> String {
        format!("{} {}", self.group, self.window)
    }
}

impl Identifiable for TrainingSlot {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Displayable for TrainingSlot {
    fn display_label(&self) -> String {
        format!("{} @ {} ({})", self.block_label(), self.site, self.group)
    }
}

/// A template slot together with its live occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenSlot {
    pub slot: TrainingSlot,
    pub enrolled: u32,
    pub remaining: u32,
}

impl OpenSlot {
    pub fn new(slot: TrainingSlot, enrolled: u32) -> Self {
        let remaining = slot.capacity.saturating_sub(enrolled);
        Self {
            slot,
            enrolled,
            remaining,
        }
    }

    pub fn is_full(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_windows_round_trip_through_labels() {
        let window: TimeWindow = "18:00 - 19:00".parse().unwrap();
        assert_eq!(window.to_string(), "18:00 - 19:00");
        let tight: TimeWindow = "18:00-19:00".parse().unwrap();
        assert_eq!(window, tight);
        assert!("19:00 - 18:00".parse::<TimeWindow>().is_err());
        assert!("evening".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn weekdays_accept_full_and_short_names() {
        assert_eq!(parse_weekday("Monday").unwrap(), Weekday::Mon);
        assert_eq!(parse_weekday("tue").unwrap(), Weekday::Tue);
        assert!(parse_weekday("Lunes").is_err());
    }

    #[test]
    fn occupancy_never_goes_negative() {
        let slot = TrainingSlot {
            id: "s1".into(),
            site: "North".into(),
            weekday: Weekday::Mon,
            window: "18:00 - 19:00".parse().unwrap(),
            group: "Juniors".into(),
            coach: "Sol".into(),
            capacity: 2,
        };
        let open = OpenSlot::new(slot, 3);
        assert_eq!(open.remaining, 0);
        assert!(open.is_full());
    }
}
