//! Sentinel error kinds for the authentication substrate.
//!
//! Every kind is testable with `matches!`; the wrapping kinds
//! (`StoreFailure`, `SenderFailure`) keep the underlying cause reachable
//! through [`std::error::Error::source`].

use thiserror::Error;

/// Errors produced by the SMS code store and service.
#[derive(Debug, Error)]
pub enum SmsError {
    /// Phone rejected by the platform phone rules.
    #[error("phone number is invalid")]
    PhoneInvalid,

    /// Verify called with an empty code.
    #[error("verification code is empty")]
    CodeEmpty,

    /// Code absent on read: expired, never stored, or already consumed.
    /// Indistinguishable from never-sent by design.
    #[error("verification code expired or missing")]
    CodeExpired,

    /// Code present but not equal to the submitted one.
    #[error("verification code mismatch")]
    CodeMismatch,

    /// The sliding-window rate limit denied the send.
    #[error("sending too frequently, retry later")]
    SendTooFrequent,

    /// The per-day send quota is exhausted.
    #[error("daily send limit reached")]
    DailyLimitReached,

    /// SMS is disabled in configuration; no side effects were performed.
    #[error("sms provider is disabled")]
    ProviderDisabled,

    /// Wraps any cache error, with the operation and key in the context chain.
    #[error("sms store failure")]
    StoreFailure(#[source] anyhow::Error),

    /// Wraps any delivery error. The stored code has already been
    /// compensated away when this is returned.
    #[error("sms delivery failed")]
    SenderFailure(#[source] anyhow::Error),
}

impl SmsError {
    /// Wrap a cache driver error, recording which operation on which key failed.
    pub(crate) fn store(op: &'static str, key: &str, err: impl Into<anyhow::Error>) -> Self {
        Self::StoreFailure(err.into().context(format!("redis {op} key={key}")))
    }
}

/// Errors produced by the scan-to-login ticket store and actions.
#[derive(Debug, Error)]
pub enum TicketError {
    /// Ticket key absent: never created, deleted, or collected by expiry.
    #[error("ticket not found")]
    NotFound,

    /// Ticket past its expiry instant, or a transition was attempted from a
    /// terminal state. The two cases are deliberately conflated for callers.
    #[error("ticket expired")]
    Expired,

    /// An optimistic update was aborted by a concurrent writer. Retryable.
    #[error("ticket update conflicted with a concurrent writer")]
    Conflict,

    /// Wraps any cache or payload codec error.
    #[error("ticket store failure")]
    StoreFailure(#[source] anyhow::Error),
}

impl TicketError {
    pub(crate) fn store(op: &'static str, key: &str, err: impl Into<anyhow::Error>) -> Self {
        Self::StoreFailure(err.into().context(format!("redis {op} key={key}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn store_failure_keeps_cause_inspectable() {
        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "redis down");
        let err = SmsError::store("GET", "sms:code:138", cause);

        assert!(matches!(err, SmsError::StoreFailure(_)));
        let source = err.source().expect("wrapped cause");
        assert!(source.to_string().contains("sms:code:138"));
    }

    #[test]
    fn sentinel_kinds_are_identity_testable() {
        assert!(matches!(SmsError::CodeExpired, SmsError::CodeExpired));
        assert!(matches!(TicketError::Conflict, TicketError::Conflict));
        assert!(!matches!(TicketError::Expired, TicketError::NotFound));
    }

    #[test]
    fn ticket_store_failure_carries_op_and_key() {
        let cause = std::io::Error::other("boom");
        let err = TicketError::store("SET", "login:ticket:abc", cause);

        let source = err.source().expect("wrapped cause");
        assert!(source.to_string().contains("SET"));
        assert!(source.to_string().contains("login:ticket:abc"));
    }
}
