//! Runtime configuration for the authentication substrate.

use std::time::Duration;

/// Runtime configuration for the SMS code service.
///
/// The record is immutable once handed to the service; the platform's
/// configuration layer builds it from whatever source it likes.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    /// When false, every service method fails with `ProviderDisabled`
    /// before any side effect.
    pub enabled: bool,
    /// Code lifetime. One second is valid; one to ten minutes is typical.
    pub expire_in: Duration,
    /// Max sends per `rate_window`. Zero or negative disables rate limiting.
    pub rate_max: i64,
    /// Sliding window size for the rate limit.
    pub rate_window: Duration,
    /// Max sends per local calendar day. Zero or negative disables the quota.
    pub daily_max: i64,
    /// Message template with a `{code}` placeholder. Empty uses a default wording.
    pub template: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expire_in: Duration::from_secs(5 * 60),
            rate_max: 1,
            rate_window: Duration::from_secs(60),
            daily_max: 10,
            template: String::new(),
        }
    }
}

/// Ticket TTL applied when a caller does not supply one.
pub const DEFAULT_TICKET_TTL: Duration = Duration::from_secs(2 * 60);

/// Runtime configuration for the scan-to-login ticket store.
#[derive(Debug, Clone)]
pub struct TicketConfig {
    /// TTL used by `create` when the caller passes none. A zero value
    /// falls back to [`DEFAULT_TICKET_TTL`].
    pub default_ttl: Duration,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TICKET_TTL,
        }
    }
}

impl TicketConfig {
    /// The effective default TTL, with the zero-value floor applied.
    pub fn effective_default_ttl(&self) -> Duration {
        if self.default_ttl.is_zero() {
            DEFAULT_TICKET_TTL
        } else {
            self.default_ttl
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_default_ttl_falls_back() {
        let cfg = TicketConfig {
            default_ttl: Duration::ZERO,
        };
        assert_eq!(cfg.effective_default_ttl(), DEFAULT_TICKET_TTL);
    }

    #[test]
    fn configured_default_ttl_wins() {
        let cfg = TicketConfig {
            default_ttl: Duration::from_secs(30),
        };
        assert_eq!(cfg.effective_default_ttl(), Duration::from_secs(30));
    }
}
