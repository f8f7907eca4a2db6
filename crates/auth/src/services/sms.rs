//! SMS one-time-code service.
//!
//! Orchestrates validation, limiter enforcement, code generation, delivery,
//! and compensation on delivery failure. Holds no per-request state; the
//! store owns everything that outlives a call.

use std::sync::Arc;
use std::time::Duration;

use crate::code::{generate_code, render_content};
use crate::config::SmsConfig;
use crate::error::SmsError;
use crate::phone::{is_phone, mask_phone};
use crate::sender::SmsSender;
use crate::stores::{CodeStore, RatePeek};

/// Why a read-only probe would deny a send right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The sliding-window rate limit is saturated.
    RateLimited,
    /// The per-day quota is exhausted.
    DailyLimitReached,
}

/// Outcome of [`SmsService::can_send`], for UI cooldown display.
/// Callers may round `retry_after` up to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPermit {
    Allowed,
    Denied {
        retry_after: Duration,
        reason: DenyReason,
    },
}

/// One-time-code issue/verify service.
pub struct SmsService {
    store: Arc<dyn CodeStore>,
    sender: Arc<dyn SmsSender>,
    config: SmsConfig,
}

impl SmsService {
    pub fn new(store: Arc<dyn CodeStore>, sender: Arc<dyn SmsSender>, config: SmsConfig) -> Self {
        Self {
            store,
            sender,
            config,
        }
    }

    fn ensure_enabled(&self) -> Result<(), SmsError> {
        if !self.config.enabled {
            return Err(SmsError::ProviderDisabled);
        }
        Ok(())
    }

    fn validate_phone(&self, phone: &str) -> Result<(), SmsError> {
        if phone.is_empty() || !is_phone(phone) {
            return Err(SmsError::PhoneInvalid);
        }
        Ok(())
    }

    /// Issue and deliver a code.
    ///
    /// The step order is contractual: enabled → phone rules → write-mode
    /// rate check → daily quota → generate → store → deliver. The rate check
    /// records the attempt even when a later step fails; an attempt was made.
    pub async fn send_code(&self, phone: &str) -> Result<(), SmsError> {
        self.ensure_enabled()?;
        self.validate_phone(phone)?;

        let decision = self
            .store
            .check_rate_limit(phone, self.config.rate_max, self.config.rate_window)
            .await?;
        if !decision.is_allowed() {
            return Err(SmsError::SendTooFrequent);
        }

        if self.config.daily_max > 0 {
            let count = self.store.incr_daily_count(phone).await?;
            if count > self.config.daily_max {
                return Err(SmsError::DailyLimitReached);
            }
        }

        let code = generate_code();
        self.store
            .save_code(phone, &code, self.config.expire_in)
            .await?;

        let content = render_content(&self.config.template, &code);
        if let Err(cause) = self.sender.send(phone, &content).await {
            // Compensate so a failed delivery leaves nothing verifiable;
            // the delete's own error must not mask the delivery error.
            if let Err(del_err) = self.store.delete_code(phone).await {
                tracing::warn!(
                    phone = %mask_phone(phone),
                    error = %del_err,
                    "compensating code delete failed"
                );
            }
            return Err(SmsError::SenderFailure(cause));
        }

        Ok(())
    }

    /// Verify a submitted code. One-shot: a success consumes the code, and
    /// any further verify fails with `CodeExpired`. Verification never
    /// touches the rate window or the daily counter.
    pub async fn verify_code(&self, phone: &str, code: &str) -> Result<(), SmsError> {
        if code.is_empty() {
            return Err(SmsError::CodeEmpty);
        }

        let stored = self.store.get_code(phone).await?;
        let Some(stored) = stored else {
            return Err(SmsError::CodeExpired);
        };
        if stored != code {
            return Err(SmsError::CodeMismatch);
        }

        if let Err(err) = self.store.delete_code(phone).await {
            // The match already succeeded; the TTL will finish the cleanup.
            tracing::warn!(phone = %mask_phone(phone), error = %err, "consumed code delete failed");
        }
        Ok(())
    }

    /// Read-only probe: would a send be admitted right now, and if not, how
    /// long until it would be. Never writes to the window or the counter.
    pub async fn can_send(&self, phone: &str) -> Result<SendPermit, SmsError> {
        self.ensure_enabled()?;
        self.validate_phone(phone)?;

        let peek = self
            .store
            .peek_rate(phone, self.config.rate_max, self.config.rate_window)
            .await?;
        if let RatePeek::Denied { retry_after } = peek {
            return Ok(SendPermit::Denied {
                retry_after,
                reason: DenyReason::RateLimited,
            });
        }

        if self.config.daily_max > 0 {
            let (count, ttl) = self.store.daily_count(phone).await?;
            if count >= self.config.daily_max {
                return Ok(SendPermit::Denied {
                    retry_after: ttl,
                    reason: DenyReason::DailyLimitReached,
                });
            }
        }

        Ok(SendPermit::Allowed)
    }
}
