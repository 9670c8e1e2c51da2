//! Platform services the scheduler drives
//!
//! Each OS primitive sits behind a narrow trait so the scheduling logic can
//! run against real adapters in the daemon and in-memory ones in tests.

pub mod clock;
pub mod memory;
pub mod sms;
pub mod suppression;
pub mod timer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use sms::{LogSmsSender, SmsSender};
pub use suppression::{LogSuppression, SuppressionService};
pub use timer::{TimerEvent, TimerKey, TimerService, TokioTimerService};

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
