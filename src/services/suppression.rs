//! Notification suppression (the actual "do not disturb" switch)

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// OS primitive that silences notifications
pub trait SuppressionService {
    /// Whether the app holds notification-policy access
    fn is_capability_granted(&self) -> bool;

    /// Engage or disengage suppression
    fn set_suppressed(&self, suppressed: bool) -> Result<()>;
}

impl<S: SuppressionService + ?Sized> SuppressionService for Arc<S> {
    fn is_capability_granted(&self) -> bool {
        (**self).is_capability_granted()
    }

    fn set_suppressed(&self, suppressed: bool) -> Result<()> {
        (**self).set_suppressed(suppressed)
    }
}

/// Suppression for hosts without a notification policy API: records the
/// state and logs every transition
#[derive(Debug, Default)]
pub struct LogSuppression {
    suppressed: AtomicBool,
}

impl LogSuppression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::SeqCst)
    }
}

impl SuppressionService for LogSuppression {
    fn is_capability_granted(&self) -> bool {
        true
    }

    fn set_suppressed(&self, suppressed: bool) -> Result<()> {
        let previous = self.suppressed.swap(suppressed, Ordering::SeqCst);
        if previous != suppressed {
            info!(
                "Notification suppression {}",
                if suppressed { "engaged" } else { "released" }
            );
        }
        Ok(())
    }
}
