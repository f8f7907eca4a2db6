//! Scan-to-login ticket storage for Redis.
//!
//! Tickets live at `login:ticket:{id}` as JSON with a TTL equal to their
//! remaining lifetime. Updates run under WATCH/MULTI/EXEC so two concurrent
//! writers for the same id resolve to exactly one winner; the loser gets
//! `TicketError::Conflict` and may retry.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::config::TicketConfig;
use crate::error::TicketError;
use crate::models::{Ticket, TicketStatus};

const TICKET_KEY_PREFIX: &str = "login:ticket:";

/// In-memory mutation applied to a ticket inside the CAS cycle.
pub type TicketMutator = Box<dyn FnOnce(&mut Ticket) -> Result<(), TicketError> + Send>;

/// CAS-protected lifecycle of scan-login tickets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Create a `pending` ticket. `None` or zero TTL uses the configured
    /// default.
    async fn create(&self, ttl: Option<Duration>) -> Result<Ticket, TicketError>;

    /// Read a ticket. Absent keys fail with `NotFound`; tickets past their
    /// expiry instant fail with `Expired` (the key is left for the cache's
    /// own expiry to collect).
    async fn get(&self, id: &str) -> Result<Ticket, TicketError>;

    /// Read-mutate-write under optimistic concurrency. The write carries the
    /// *remaining* TTL, never the original, so a ticket's lifetime is a hard
    /// bound. A concurrent modification aborts with `Conflict`.
    async fn update(&self, id: &str, mutate: TicketMutator) -> Result<Ticket, TicketError>;

    /// Delete a ticket. Idempotent; used on login pickup or explicit cancel.
    async fn delete(&self, id: &str) -> Result<(), TicketError>;
}

fn ticket_key(id: &str) -> String {
    format!("{TICKET_KEY_PREFIX}{id}")
}

/// Redis implementation of [`TicketStore`].
#[derive(Clone)]
pub struct RedisTicketStore {
    client: redis::Client,
    config: TicketConfig,
}

impl RedisTicketStore {
    pub fn new(client: redis::Client) -> Self {
        Self::with_config(client, TicketConfig::default())
    }

    pub fn with_config(client: redis::Client, config: TicketConfig) -> Self {
        Self { client, config }
    }

    fn decode(key: &str, payload: &str) -> Result<Ticket, TicketError> {
        serde_json::from_str(payload).map_err(|e| TicketError::store("decode", key, e))
    }

    fn encode(key: &str, ticket: &Ticket) -> Result<String, TicketError> {
        serde_json::to_string(ticket).map_err(|e| TicketError::store("encode", key, e))
    }
}

#[async_trait]
impl TicketStore for RedisTicketStore {
    async fn create(&self, ttl: Option<Duration>) -> Result<Ticket, TicketError> {
        let ttl = ttl
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| self.config.effective_default_ttl());

        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::new_v4().to_string(),
            status: TicketStatus::Pending,
            expires_at: now + chrono::Duration::milliseconds(ttl.as_millis() as i64),
            user_id: None,
            role: None,
            created_at: now,
            updated_at: now,
            metadata: Default::default(),
        };

        let key = ticket_key(&ticket.id);
        let payload = Self::encode(&key, &ticket)?;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TicketError::store("CONNECT", "-", e))?;
        let _: () = conn
            .set_ex(&key, payload, ttl.as_secs().max(1))
            .await
            .map_err(|e| TicketError::store("SETEX", &key, e))?;

        tracing::info!(ticket_id = %ticket.id, ttl_secs = ttl.as_secs(), "login ticket created");
        Ok(ticket)
    }

    async fn get(&self, id: &str) -> Result<Ticket, TicketError> {
        let key = ticket_key(id);
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TicketError::store("CONNECT", "-", e))?;

        let payload: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| TicketError::store("GET", &key, e))?;
        let Some(payload) = payload else {
            return Err(TicketError::NotFound);
        };

        let ticket = Self::decode(&key, &payload)?;
        if Utc::now() > ticket.expires_at {
            tracing::debug!(ticket_id = %id, "ticket read past expiry");
            return Err(TicketError::Expired);
        }
        Ok(ticket)
    }

    async fn update(&self, id: &str, mutate: TicketMutator) -> Result<Ticket, TicketError> {
        let key = ticket_key(id);
        // A fresh connection is held for the whole WATCH..EXEC cycle and
        // dropped on every exit path, which also discards the watch.
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TicketError::store("CONNECT", "-", e))?;

        let _: () = redis::cmd("WATCH")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| TicketError::store("WATCH", &key, e))?;

        let payload: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| TicketError::store("GET", &key, e))?;
        let Some(payload) = payload else {
            return Err(TicketError::NotFound);
        };

        let mut ticket = Self::decode(&key, &payload)?;
        let now = Utc::now();
        if now > ticket.expires_at {
            tracing::debug!(ticket_id = %id, "ticket update past expiry");
            return Err(TicketError::Expired);
        }

        mutate(&mut ticket)?;
        ticket.updated_at = now;

        let remaining_ms = (ticket.expires_at - now).num_milliseconds();
        if remaining_ms <= 0 {
            return Err(TicketError::Expired);
        }
        let payload = Self::encode(&key, &ticket)?;

        // EXEC answers nil when the watched key changed under us.
        let exec: Option<redis::Value> = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&key)
            .arg(payload)
            .arg("PX")
            .arg(remaining_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| TicketError::store("EXEC", &key, e))?;

        match exec {
            Some(_) => Ok(ticket),
            None => {
                tracing::debug!(ticket_id = %id, "ticket update lost the race");
                Err(TicketError::Conflict)
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<(), TicketError> {
        let key = ticket_key(id);
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TicketError::store("CONNECT", "-", e))?;

        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| TicketError::store("DEL", &key, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_keys_use_the_login_namespace() {
        assert_eq!(
            ticket_key("3f2c"),
            "login:ticket:3f2c"
        );
    }

    #[test]
    fn decode_rejects_garbage_as_store_failure() {
        let err = RedisTicketStore::decode("login:ticket:x", "{not json").unwrap_err();
        assert!(matches!(err, TicketError::StoreFailure(_)));
    }
}
