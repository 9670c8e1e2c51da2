//! Window activation toggle
//!
//! Two states, cycled forever: Inactive -> Active -> Inactive. Failing to flip
//! the OS switch never blocks the schedule; only losing the persisted flag is
//! reported.

use crate::db::SettingsStore;
use crate::services::SuppressionService;
use anyhow::{Context, Result};
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Inactive,
    Active,
}

impl WindowState {
    pub fn is_active(&self) -> bool {
        matches!(self, WindowState::Active)
    }
}

impl fmt::Display for WindowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowState::Inactive => write!(f, "inactive"),
            WindowState::Active => write!(f, "active"),
        }
    }
}

/// Applies window state to the suppression service and the settings store
#[derive(Debug)]
pub struct WindowToggle<S> {
    suppression: S,
}

impl<S: SuppressionService> WindowToggle<S> {
    pub fn new(suppression: S) -> Self {
        Self { suppression }
    }

    pub fn suppression(&self) -> &S {
        &self.suppression
    }

    /// Enter `state`: flip suppression (best effort) and persist the flag
    pub fn apply<K: SettingsStore>(&self, state: WindowState, store: &K) -> Result<()> {
        let engage = state.is_active();

        if !self.suppression.is_capability_granted() {
            warn!(
                "Notification policy access not granted; window is {} but suppression has no effect",
                state
            );
        } else if let Err(e) = self.suppression.set_suppressed(engage) {
            error!("Failed to set notification suppression to {}: {:#}", engage, e);
        }

        store
            .set_active(engage)
            .with_context(|| format!("Failed to persist window state {}", state))?;

        info!("Do Not Disturb window {}", state);
        Ok(())
    }
}
