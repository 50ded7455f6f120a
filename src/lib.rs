#![doc(test(attr(deny(warnings))))]

//! Club Core holds the billing and scheduling rules of a sports club: monthly
//! dues generated once per member and period, the payment ledger and cash
//! register, and enrollment into capacity-limited weekly training slots.
//!
//! Persistence sits behind [`store::TableStore`]; presentation layers call the
//! services in [`core::services`] with a [`core::RequestContext`].

pub mod config;
pub mod core;
pub mod domain;
pub mod errors;
pub mod store;
pub mod utils;

pub use crate::core::{Club, CoreError, CoreResult, RequestContext, Role};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Club Core tracing initialized.");
    });
}
