pub mod attendance_service;
pub mod cash_register_service;
pub mod dues_service;
pub mod enrollment_service;
pub mod expense_service;
pub mod ledger_service;
pub mod roster_service;

pub use attendance_service::{AttendanceOutcome, AttendanceService, FailedCharge};
pub use cash_register_service::{CashFlow, CashRegisterService, DailyTotals, RangeTotals};
pub use dues_service::{alert_active, Debtor, DebtorReport, DuesService, GenerationReport};
pub use enrollment_service::EnrollmentService;
pub use expense_service::ExpenseService;
pub use ledger_service::{DueDraft, PaymentLedger};
pub use roster_service::RosterService;
