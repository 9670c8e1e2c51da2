//! Auto-reply - texts callers back while the window is active

use crate::db::SettingsStore;
use crate::services::SmsSender;
use tracing::{debug, error, info};

/// What happened to an incoming call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Reply sent to this number
    Sent(String),
    /// No caller number to reply to
    NoNumber,
    /// Window not active
    Inactive,
    /// Reply text is blank
    BlankMessage,
    /// Settings or SMS failure, already logged
    Failed,
}

/// Reply to an incoming call if the window is active
pub fn handle_incoming_call<K, M>(store: &K, sender: &M, number: Option<&str>) -> ReplyOutcome
where
    K: SettingsStore,
    M: SmsSender,
{
    let number = match number.map(str::trim) {
        Some(n) if !n.is_empty() => n,
        _ => {
            debug!("Incoming number is missing, SMS will not be sent");
            return ReplyOutcome::NoNumber;
        }
    };

    let settings = match store.read() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Could not read settings for incoming call: {:#}", e);
            return ReplyOutcome::Failed;
        }
    };

    if !settings.is_active {
        debug!("DND is not active, SMS will not be sent");
        return ReplyOutcome::Inactive;
    }

    if settings.reply_message.trim().is_empty() {
        debug!("Reply message is blank, SMS will not be sent");
        return ReplyOutcome::BlankMessage;
    }

    match sender.send_text(number, &settings.reply_message) {
        Ok(()) => {
            info!("Auto-reply sent to {}", number);
            ReplyOutcome::Sent(number.to_string())
        }
        Err(e) => {
            error!("Failed to send auto-reply to {}: {:#}", number, e);
            ReplyOutcome::Failed
        }
    }
}
