//! DND Lion - recurring Do Not Disturb windows
//!
//! This crate provides both the scheduling daemon and reusable library
//! components: the weekly recurrence math, the timer-driven scheduler, the
//! window toggle and the caller auto-reply.

pub mod config;
pub mod db;
pub mod error;
pub mod modules;
pub mod services;
pub mod time_utils;

pub use config::Config;
pub use db::{Database, ScheduleSettings, SettingsStore};
pub use error::{Capability, SchedulerError};
pub use modules::recurrence::{Edge, LeadPolicy, LeadTime, ScheduleRequest, WindowSpan};
pub use modules::scheduler::{ArmOutcome, Scheduler, SharedScheduler};
