//! Request-scoped actor identity and the role → capability table.

use serde::{Deserialize, Serialize};

use crate::core::errors::CoreError;

/// Closed set of staff roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Administrator,
    Coach,
    Accountant,
}

/// Individual permissions checked at the start of each command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    ViewDashboard,
    ViewRoster,
    ManageEnrollments,
    RecordAttendance,
    CollectPayments,
    GenerateDues,
    RecordExpenses,
    ViewCashRegister,
    ReverseDues,
}

impl Role {
    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Administrator => &[
                ViewDashboard,
                ViewRoster,
                ManageEnrollments,
                RecordAttendance,
                CollectPayments,
                GenerateDues,
                RecordExpenses,
                ViewCashRegister,
                ReverseDues,
            ],
            Role::Coach => &[ViewDashboard, ViewRoster, ManageEnrollments, RecordAttendance],
            Role::Accountant => &[
                ViewDashboard,
                CollectPayments,
                GenerateDues,
                RecordExpenses,
                ViewCashRegister,
            ],
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// Who is acting and in what role; threaded through every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    actor: String,
    role: Role,
}

impl RequestContext {
    pub fn new(actor: impl Into<String>, role: Role) -> Self {
        Self {
            actor: actor.into(),
            role,
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn require(&self, capability: Capability) -> Result<(), CoreError> {
        if self.role.allows(capability) {
            Ok(())
        } else {
            Err(CoreError::Forbidden {
                actor: self.actor.clone(),
                capability,
            })
        }
    }
}

impl RequestContext {
    /// Passes when the role holds at least one of `capabilities`.
    pub fn require_any(&self, capabilities: &[Capability]) -> Result<(), CoreError> {
        match capabilities.iter().find(|cap| self.role.allows(**cap)) {
            Some(_) => Ok(()),
            None => Err(CoreError::Forbidden {
                actor: self.actor.clone(),
                capability: capabilities.first().copied().unwrap_or(Capability::ViewDashboard),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coach_cannot_touch_money() {
        let ctx = RequestContext::new("profe", Role::Coach);
        assert!(ctx.require(Capability::RecordAttendance).is_ok());
        assert!(matches!(
            ctx.require(Capability::CollectPayments),
            Err(CoreError::Forbidden {
                capability: Capability::CollectPayments,
                ..
            })
        ));
    }

    #[test]
    fn only_administrators_reverse() {
        assert!(Role::Administrator.allows(Capability::ReverseDues));
        assert!(!Role::Accountant.allows(Capability::ReverseDues));
        assert!(!Role::Coach.allows(Capability::ReverseDues));
        assert!(!Role::Accountant.allows(Capability::RecordAttendance));
    }
}
