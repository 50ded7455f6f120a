pub mod club;
pub mod context;
pub mod errors;
pub mod locks;
pub mod services;
pub mod time;

pub use club::Club;
pub use context::{Capability, RequestContext, Role};
pub use errors::{CoreError, CoreResult, ValidationError};
pub use time::{Clock, FixedClock, SystemClock};
