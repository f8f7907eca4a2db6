//! Scan-to-login ticket model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TicketError;

/// Ticket state machine.
///
/// ```text
/// pending ──scan──▶ scanned ──confirm──▶ confirmed (terminal)
///    │                 │
///    └────reject───────┴──────▶ rejected (terminal)
/// ```
///
/// Expiry is not a status: reads past the expiry instant fail with
/// `TicketError::Expired` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Waiting for the mobile client to scan.
    Pending,
    /// Scanned, waiting for the mobile client to confirm or reject.
    Scanned,
    /// Confirmed; the desktop client may pick up the bound user.
    Confirmed,
    /// Rejected or cancelled.
    Rejected,
}

impl TicketStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected)
    }
}

/// A scan-to-login ticket shared between the desktop poller and the
/// mobile confirmer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub status: TicketStatus,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Ticket {
    /// Whether the desktop client should keep polling this ticket.
    /// Terminal states end the poll loop.
    pub fn allows_polling(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Advance `pending → scanned`, or merge metadata if already scanned.
    /// Terminal states report `Expired`; to outside observers a closed
    /// ticket and an expired one look the same.
    pub(crate) fn mark_scanned(
        &mut self,
        metadata: HashMap<String, String>,
    ) -> Result<(), TicketError> {
        match self.status {
            TicketStatus::Pending => {
                self.status = TicketStatus::Scanned;
                merge_metadata(&mut self.metadata, metadata);
                Ok(())
            }
            TicketStatus::Scanned => {
                // Idempotent re-scan.
                merge_metadata(&mut self.metadata, metadata);
                Ok(())
            }
            status => {
                tracing::debug!(ticket_id = %self.id, ?status, "scan refused: terminal state");
                Err(TicketError::Expired)
            }
        }
    }

    /// Advance `scanned → confirmed`, binding the user identity.
    pub(crate) fn confirm(
        &mut self,
        user_id: i64,
        role: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), TicketError> {
        if self.status != TicketStatus::Scanned {
            tracing::debug!(ticket_id = %self.id, status = ?self.status, "confirm refused");
            return Err(TicketError::Expired);
        }
        self.status = TicketStatus::Confirmed;
        self.user_id = Some(user_id);
        self.role = Some(role.to_string());
        merge_metadata(&mut self.metadata, metadata);
        Ok(())
    }

    /// Advance `pending | scanned → rejected`, recording the reason.
    /// Caller metadata merges after the reason, so a caller-supplied
    /// `reject_reason` key wins.
    pub(crate) fn reject(
        &mut self,
        reason: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), TicketError> {
        match self.status {
            TicketStatus::Pending | TicketStatus::Scanned => {
                self.status = TicketStatus::Rejected;
                self.metadata
                    .insert("reject_reason".to_string(), reason.to_string());
                merge_metadata(&mut self.metadata, metadata);
                Ok(())
            }
            status => {
                tracing::debug!(ticket_id = %self.id, ?status, "reject refused: terminal state");
                Err(TicketError::Expired)
            }
        }
    }
}

/// Merge `src` into `dst`, last writer wins per key. Keys are never removed;
/// an empty `src` is a no-op.
pub(crate) fn merge_metadata(dst: &mut HashMap<String, String>, src: HashMap<String, String>) {
    for (k, v) in src {
        dst.insert(k, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn ticket(status: TicketStatus) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: "t-1".to_string(),
            status,
            expires_at: now + Duration::seconds(120),
            user_id: None,
            role: None,
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }

    fn meta(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn scan_advances_pending() {
        let mut t = ticket(TicketStatus::Pending);
        t.mark_scanned(meta(&[("device", "iphone")])).unwrap();
        assert_eq!(t.status, TicketStatus::Scanned);
        assert_eq!(t.metadata["device"], "iphone");
    }

    #[test]
    fn scan_is_idempotent_from_scanned() {
        let mut t = ticket(TicketStatus::Scanned);
        t.metadata = meta(&[("device", "iphone")]);
        t.mark_scanned(meta(&[("ip", "10.0.0.1")])).unwrap();
        assert_eq!(t.status, TicketStatus::Scanned);
        assert_eq!(t.metadata.len(), 2);
    }

    #[test]
    fn scan_refused_from_terminal() {
        for status in [TicketStatus::Confirmed, TicketStatus::Rejected] {
            let mut t = ticket(status);
            let err = t.mark_scanned(HashMap::new()).unwrap_err();
            assert!(matches!(err, TicketError::Expired));
        }
    }

    #[test]
    fn confirm_binds_user_from_scanned_only() {
        let mut t = ticket(TicketStatus::Scanned);
        t.confirm(42, "user", HashMap::new()).unwrap();
        assert_eq!(t.status, TicketStatus::Confirmed);
        assert_eq!(t.user_id, Some(42));
        assert_eq!(t.role.as_deref(), Some("user"));

        for status in [
            TicketStatus::Pending,
            TicketStatus::Confirmed,
            TicketStatus::Rejected,
        ] {
            let mut t = ticket(status);
            assert!(matches!(
                t.confirm(1, "rider", HashMap::new()),
                Err(TicketError::Expired)
            ));
        }
    }

    #[test]
    fn reject_records_reason_and_caller_keys_win() {
        let mut t = ticket(TicketStatus::Scanned);
        t.reject("user-cancel", meta(&[("reject_reason", "override")]))
            .unwrap();
        assert_eq!(t.status, TicketStatus::Rejected);
        assert_eq!(t.metadata["reject_reason"], "override");
    }

    #[test]
    fn reject_refused_from_terminal() {
        let mut t = ticket(TicketStatus::Confirmed);
        assert!(matches!(
            t.reject("late", HashMap::new()),
            Err(TicketError::Expired)
        ));
    }

    #[test]
    fn payload_round_trips_and_is_self_describing() {
        let mut t = ticket(TicketStatus::Scanned);
        t.metadata = meta(&[("device", "iphone")]);
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"scanned\""));
        let back: Ticket = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    fn arb_status() -> impl Strategy<Value = TicketStatus> {
        prop_oneof![
            Just(TicketStatus::Pending),
            Just(TicketStatus::Scanned),
            Just(TicketStatus::Confirmed),
            Just(TicketStatus::Rejected),
        ]
    }

    fn arb_meta() -> impl Strategy<Value = HashMap<String, String>> {
        proptest::collection::hash_map("[a-z]{1,6}", "[a-z0-9]{0,8}", 0..4)
    }

    proptest! {
        /// Status never regresses and metadata keys never disappear,
        /// whatever transition sequence is applied.
        #[test]
        fn transitions_are_monotonic(
            start in arb_status(),
            ops in proptest::collection::vec((0..3u8, arb_meta()), 1..12),
        ) {
            let mut t = ticket(start);
            for (op, m) in ops {
                let before_status = t.status;
                let before_keys: Vec<String> = t.metadata.keys().cloned().collect();
                let _ = match op {
                    0 => t.mark_scanned(m),
                    1 => t.confirm(7, "merchant", m),
                    _ => t.reject("cancelled", m),
                };
                prop_assert!(t.status >= before_status);
                for key in before_keys {
                    prop_assert!(t.metadata.contains_key(&key));
                }
            }
        }

        /// Merging is additive with last-writer-wins.
        #[test]
        fn merge_is_additive(base in arb_meta(), add in arb_meta()) {
            let mut merged = base.clone();
            merge_metadata(&mut merged, add.clone());
            for (k, v) in &add {
                prop_assert_eq!(&merged[k], v);
            }
            for k in base.keys() {
                prop_assert!(merged.contains_key(k));
            }
        }
    }
}
