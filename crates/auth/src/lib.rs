//! Authentication substrate for the lastmile delivery platform.
//!
//! Two cores share a Redis cache and a common contract style:
//!
//! - **SMS one-time codes** — [`SmsService`] issues and verifies short
//!   numeric codes under a per-phone sliding-window rate limit and a
//!   per-day quota, both enforced atomically with server-side scripts.
//! - **Scan-to-login tickets** — [`TicketService`] advances a short-lived
//!   shared ticket (`pending → scanned → confirmed | rejected`) under
//!   optimistic concurrency, never extending the original lifetime.
//!
//! The platform's HTTP handlers are thin adapters over these services; the
//! cache client, the SMS sender, and the tracing subscriber are injected by
//! the caller.
//!
//! ```no_run
//! use std::sync::Arc;
//! use lastmile_auth::{LogSender, RedisCodeStore, SmsConfig, SmsService};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = redis::Client::open("redis://127.0.0.1:6379")?;
//! let service = SmsService::new(
//!     Arc::new(RedisCodeStore::new(client)),
//!     Arc::new(LogSender),
//!     SmsConfig::default(),
//! );
//! service.send_code("13800000001").await?;
//! # Ok(())
//! # }
//! ```

mod code;
mod config;
mod error;
mod models;
mod phone;
mod sender;
mod services;
mod stores;

pub use code::{CODE_LENGTH, generate_code, render_content};
pub use config::{DEFAULT_TICKET_TTL, SmsConfig, TicketConfig};
pub use error::{SmsError, TicketError};
pub use models::{Ticket, TicketStatus};
pub use phone::{is_mobile_number, is_phone, is_telecom_number, is_unicom_number, mask_phone};
pub use sender::{LogSender, SmsSender};
pub use services::{DenyReason, SendPermit, SmsService, TicketService};
pub use stores::{
    CodeStore, RateLimitResult, RatePeek, RedisCodeStore, RedisTicketStore, TicketMutator,
    TicketStore,
};
