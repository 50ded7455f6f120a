use serde::{Deserialize, Serialize};

use crate::domain::common::*;
use crate::domain::{member::Member, schedule::TrainingSlot};

/// A standing (member, slot) registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub member_id: String,
    pub member_name: String,
    pub slot_id: String,
    pub label: String,
}

impl Enrollment {
    pub fn new(member: &Member, slot: &TrainingSlot) -> Self {
        Self {
            id: new_id(),
            member_id: member.id.clone(),
            member_name: member.full_name(),
            slot_id: slot.id.clone(),
            label: slot.display_label(),
        }
    }
}

impl Identifiable for Enrollment {
    fn id(&self) -> &str {
        &self.id
    }
}
