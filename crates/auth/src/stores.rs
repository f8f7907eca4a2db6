//! Ephemeral stores (Redis).
//!
//! Everything here is TTL-bounded state behind traits so services can be
//! tested against mocks.
//!
//! ## Redis key patterns
//!
//! ```text
//! {prefix}:code:{phone}              → live one-time code (string, TTL)
//! {prefix}:rate_z:{phone}            → send timestamps (sorted set, TTL = window)
//! {prefix}:daily:{YYYYMMDD}:{phone}  → per-day send count (TTL = rest of day)
//! login:ticket:{uuid}                → scan-login ticket JSON (TTL = remaining life)
//! ```
//!
//! The `{prefix}` (default `sms`) is the multi-tenancy lever; distinct
//! deployments point at distinct prefixes.

mod code;
mod ticket;

pub use code::{CodeStore, RateLimitResult, RatePeek, RedisCodeStore};
pub use ticket::{RedisTicketStore, TicketMutator, TicketStore};

#[cfg(test)]
pub use code::MockCodeStore;
#[cfg(test)]
pub use ticket::MockTicketStore;
