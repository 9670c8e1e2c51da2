//! Scheduling features: recurrence math, the scheduler, the window toggle
//! and the caller auto-reply

pub mod recurrence;
pub mod reply;
pub mod scheduler;
pub mod toggle;
