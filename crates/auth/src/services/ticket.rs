//! Semantic scan-login transitions layered on the ticket store.
//!
//! Stateless adapters: each action is one CAS-protected `update` whose
//! mutator enforces the state machine in [`crate::models`]. Conflicts
//! surface to the caller, who decides whether to retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TicketError;
use crate::models::Ticket;
use crate::stores::TicketStore;

/// Scan-to-login facade for the desktop poller and the mobile confirmer.
pub struct TicketService {
    store: Arc<dyn TicketStore>,
}

impl TicketService {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Create a `pending` ticket for the desktop client to encode in a QR.
    pub async fn create(&self, ttl: Option<Duration>) -> Result<Ticket, TicketError> {
        self.store.create(ttl).await
    }

    /// Poll the ticket state.
    pub async fn get(&self, id: &str) -> Result<Ticket, TicketError> {
        self.store.get(id).await
    }

    /// Drop the ticket after login pickup or explicit cancel.
    pub async fn delete(&self, id: &str) -> Result<(), TicketError> {
        self.store.delete(id).await
    }

    /// Mobile client scanned the QR: `pending → scanned`, idempotent when
    /// already scanned. Terminal tickets answer `Expired`.
    pub async fn mark_scanned(
        &self,
        id: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Ticket, TicketError> {
        self.store
            .update(id, Box::new(move |t| t.mark_scanned(metadata)))
            .await
    }

    /// Mobile client approved the login: `scanned → confirmed`, binding the
    /// user id and role for the desktop client to pick up.
    pub async fn confirm(
        &self,
        id: &str,
        user_id: i64,
        role: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Ticket, TicketError> {
        let role = role.to_string();
        self.store
            .update(id, Box::new(move |t| t.confirm(user_id, &role, metadata)))
            .await
    }

    /// Mobile client declined, or the desktop cancelled: `pending | scanned
    /// → rejected`, with the reason recorded in metadata.
    pub async fn reject(
        &self,
        id: &str,
        reason: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Ticket, TicketError> {
        let reason = reason.to_string();
        self.store
            .update(id, Box::new(move |t| t.reject(&reason, metadata)))
            .await
    }
}
