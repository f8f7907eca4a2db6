//! SMS delivery abstraction.

use anyhow::Result;
use async_trait::async_trait;

use crate::phone::mask_phone;

/// Delivery contract for rendered SMS messages.
///
/// The service validates the phone before calling; implementations handle
/// transport, credentials, and provider-side errors. Implementations must
/// give up promptly when the calling task is cancelled.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Deliver `content` to `phone`.
    async fn send(&self, phone: &str, content: &str) -> Result<()>;
}

/// Sender that logs instead of delivering, for development and tests.
#[derive(Debug, Default, Clone)]
pub struct LogSender;

#[async_trait]
impl SmsSender for LogSender {
    async fn send(&self, phone: &str, content: &str) -> Result<()> {
        tracing::info!(
            phone = %mask_phone(phone),
            content_len = content.len(),
            "sms delivery skipped (log sender)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        let sender = LogSender;
        assert!(sender.send("13800000001", "code 123456").await.is_ok());
    }
}
