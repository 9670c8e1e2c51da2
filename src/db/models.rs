//! Persisted settings

use crate::error::Result;
use crate::modules::recurrence::ScheduleRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reply sent to callers while the window is active, unless the user set one
pub const DEFAULT_REPLY_MESSAGE: &str = "I'm currently unavailable. Will call you back later.";

/// Everything the app persists about the schedule
///
/// Times stay in their display form ("HH:MM AM/PM") and days as short names,
/// so a stored row reads the same as the settings screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    pub start_time: String,
    pub end_time: String,
    pub days: BTreeSet<String>,
    pub reply_message: String,
    pub is_active: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            start_time: String::new(),
            end_time: String::new(),
            days: BTreeSet::new(),
            reply_message: DEFAULT_REPLY_MESSAGE.to_string(),
            is_active: false,
        }
    }
}

impl ScheduleSettings {
    /// Settings describing `request`, not yet active
    pub fn from_request(request: &ScheduleRequest, reply_message: impl Into<String>) -> Self {
        Self {
            start_time: request.start().to_string(),
            end_time: request.end().to_string(),
            days: request.days().names().into_iter().collect(),
            reply_message: reply_message.into(),
            is_active: false,
        }
    }

    /// Parse the stored text back into a schedule
    pub fn to_request(&self) -> Result<ScheduleRequest> {
        ScheduleRequest::parse(&self.start_time, &self.end_time, &self.days)
    }

    /// Whether anything worth re-arming after a restart is stored
    pub fn needs_rearm(&self) -> bool {
        self.is_active || !self.days.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_round_trip() {
        let request = ScheduleRequest::parse("10:00 PM", "07:00 AM", ["Sun", "Mon"]).unwrap();
        let settings = ScheduleSettings::from_request(&request, "Busy");

        assert_eq!(settings.start_time, "10:00 PM");
        assert_eq!(settings.end_time, "07:00 AM");
        assert_eq!(settings.days.len(), 2);
        assert_eq!(settings.to_request().unwrap(), request);
    }

    #[test]
    fn test_needs_rearm() {
        assert!(!ScheduleSettings::default().needs_rearm());

        let mut settings = ScheduleSettings::default();
        settings.days.insert("Tue".to_string());
        assert!(settings.needs_rearm());
        assert!(settings.to_request().is_err());
    }
}
