//! Clock abstraction for credential expiry checks
//!
//! Issuance and validation compare whole-second timestamps, so the clock
//! deals in UTC epoch seconds. Tests swap in a pinned clock to exercise the
//! expiration boundary exactly.

use std::sync::Arc;

/// Source of the current time in whole UTC epoch seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;
