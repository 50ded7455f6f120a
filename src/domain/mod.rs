pub mod attendance;
pub mod common;
pub mod due;
pub mod enrollment;
pub mod expense;
pub mod member;
pub mod period;
pub mod schedule;
pub mod tariff;

pub use attendance::{
    AbsenceReason, AttendanceMark, AttendanceRecord, AttendanceSheet, AttendanceState,
    GuestAttendance, GuestKind,
};
pub use common::{Displayable, Identifiable};
pub use due::{AuditEntry, Concept, Due, DueBook, DueState, PaymentMethod, Settlement};
pub use enrollment::Enrollment;
pub use expense::{Expense, ExpenseCategory};
pub use member::Member;
pub use period::{active_period, PeriodCalculator, PeriodLabel, PeriodRef};
pub use schedule::{OpenSlot, TimeWindow, TrainingSlot};
pub use tariff::{Tariff, TariffTable};
