//! Outgoing text messages

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Sends a text message to a phone number
pub trait SmsSender {
    fn send_text(&self, number: &str, message: &str) -> Result<()>;
}

impl<S: SmsSender + ?Sized> SmsSender for Arc<S> {
    fn send_text(&self, number: &str, message: &str) -> Result<()> {
        (**self).send_text(number, message)
    }
}

/// Logs messages instead of handing them to a modem
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSmsSender;

impl SmsSender for LogSmsSender {
    fn send_text(&self, number: &str, message: &str) -> Result<()> {
        info!("SMS to {}: {}", number, message);
        Ok(())
    }
}
