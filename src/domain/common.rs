use uuid::Uuid;

/// Identifies records that expose a stable identifier.
pub trait Identifiable {
    fn id(&self) -> &str;
}

/// Supplies a presentation-ready label for UI or logs.
pub trait Displayable {
    fn display_label(&self) -> String;
}

/// Generates a fresh record identifier.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Normalizes free text for case-insensitive comparisons.
pub(crate) fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

// Re-export common dependencies so consumers can rely on this module as a façade.
pub use chrono;
pub use rust_decimal;
pub use serde;
