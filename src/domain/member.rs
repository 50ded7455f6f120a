use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::common::*;

/// A club member as kept in the roster. Members are deactivated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Member {
    pub id: String,
    pub joined_on: Option<NaiveDate>,
    pub name: String,
    pub surname: String,
    pub id_doc: String,
    pub birthdate: Option<NaiveDate>,
    pub guardian: String,
    pub phone: String,
    pub email: String,
    pub site: String,
    /// Tariff concept the member is billed under.
    pub concept: String,
    pub notes: String,
    pub created_by: String,
    pub active: bool,
    pub size: String,
    pub group: String,
    pub weight: String,
    pub height: String,
}

impl Member {
    pub fn new(id: impl Into<String>, name: impl Into<String>, surname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            surname: surname.into(),
            active: true,
            ..Self::default()
        }
    }

    pub fn with_concept(mut self, concept: impl Into<String>) -> Self {
        self.concept = concept.into();
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name.trim(), self.surname.trim())
            .trim()
            .to_string()
    }

    /// Tariff concept, or `None` when the roster leaves it blank.
    pub fn tariff_concept(&self) -> Option<&str> {
        let concept = self.concept.trim();
        (!concept.is_empty()).then_some(concept)
    }

    /// Case-insensitive match against name, surname and identity document.
    pub fn matches(&self, query: &str) -> bool {
        let needle = fold(query);
        if needle.is_empty() {
            return true;
        }
        [&self.name, &self.surname, &self.id_doc]
            .iter()
            .any(|field| fold(field).contains(&needle))
    }
}

impl Identifiable for Member {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_concept_is_treated_as_missing() {
        let member = Member::new("1", "Ana", "Paz").with_concept("   ");
        assert_eq!(member.tariff_concept(), None);
        let member = member.with_concept(" Plan 3x ");
        assert_eq!(member.tariff_concept(), Some("Plan 3x"));
    }

    #[test]
    fn search_ignores_case_and_covers_document() {
        let mut member = Member::new("1", "Lucía", "Gómez");
        member.id_doc = "40111222".into();
        assert!(member.matches("gÓm"));
        assert!(member.matches("111"));
        assert!(!member.matches("perez"));
    }
}
