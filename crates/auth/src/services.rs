//! Orchestration services over the stores.
//!
//! Services hold no per-request state; they compose the injected stores,
//! the sender, and the runtime configuration.

mod sms;
mod ticket;

pub use sms::{DenyReason, SendPermit, SmsService};
pub use ticket::TicketService;
