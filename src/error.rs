//! Error types for the DND scheduler

use std::fmt;

/// OS-granted permissions the scheduler depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Exact one-shot wake timers
    ExactTimers,
    /// Notification policy access (needed to toggle Do Not Disturb)
    NotificationPolicy,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ExactTimers => write!(f, "exact timer scheduling"),
            Capability::NotificationPolicy => write!(f, "notification policy access"),
        }
    }
}

/// Failures surfaced by scheduling operations. None of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Capability not granted: {0}")]
    CapabilityDenied(Capability),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Platform error: {0}")]
    Platform(#[from] anyhow::Error),
}

impl SchedulerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        SchedulerError::InvalidInput(msg.into())
    }
}

pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;
