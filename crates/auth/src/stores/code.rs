//! One-time code storage for Redis.
//!
//! Three concerns live behind one trait:
//! - code storage with TTL (`{prefix}:code:{phone}`)
//! - sliding-window rate limiting over a sorted set (`{prefix}:rate_z:{phone}`)
//! - per-day send counting (`{prefix}:daily:{YYYYMMDD}:{phone}`)
//!
//! The rate check, the read-only peek, and the daily increment each run as a
//! single Lua script, so concurrent senders cannot interleave between the
//! trim/insert/count/expire steps.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::Local;
use redis::AsyncCommands;

use crate::error::SmsError;
use crate::phone::mask_phone;

/// Outcome of the write-mode rate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Under the limit, includes the count after recording this attempt.
    Allowed(i64),
    /// Over the limit, includes the count after recording this attempt.
    Exceeded(i64),
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }
}

/// Outcome of the read-only rate peek.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RatePeek {
    /// A send would currently be admitted.
    Allowed,
    /// A send would be denied; `retry_after` is when the earliest window
    /// entry falls out.
    Denied { retry_after: Duration },
}

/// Store for one-time codes, the send-rate window, and the daily counter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Store a code with TTL, overwriting any live code for the phone.
    async fn save_code(&self, phone: &str, code: &str, ttl: Duration) -> Result<(), SmsError>;

    /// Read the live code, `None` when absent or expired.
    async fn get_code(&self, phone: &str) -> Result<Option<String>, SmsError>;

    /// Delete the code. Idempotent.
    async fn delete_code(&self, phone: &str) -> Result<(), SmsError>;

    /// Write-mode sliding-window check: drop entries older than the window,
    /// record this attempt, count, refresh expiry, all atomically.
    /// `max_count <= 0` disables limiting and writes nothing.
    async fn check_rate_limit(
        &self,
        phone: &str,
        max_count: i64,
        window: Duration,
    ) -> Result<RateLimitResult, SmsError>;

    /// Read-only window check; never mutates the window.
    async fn peek_rate(
        &self,
        phone: &str,
        max_count: i64,
        window: Duration,
    ) -> Result<RatePeek, SmsError>;

    /// Atomically increment today's counter, setting its TTL to the rest of
    /// the local day when missing. Returns the post-increment value.
    async fn incr_daily_count(&self, phone: &str) -> Result<i64, SmsError>;

    /// Today's count and the counter's remaining TTL, both zero when absent.
    async fn daily_count(&self, phone: &str) -> Result<(i64, Duration), SmsError>;
}

// Trim the window, record the attempt, count, refresh expiry. The member is
// the exact nanosecond string so simultaneous attempts stay distinct.
const RATE_LIMIT_SCRIPT: &str = r"
local zkey = KEYS[1]
local now_ns = ARGV[1]
local window_start_ns = ARGV[2]
local max_count = tonumber(ARGV[3])
local expire_seconds = tonumber(ARGV[4])
redis.call('ZREMRANGEBYSCORE', zkey, '-inf', window_start_ns)
redis.call('ZADD', zkey, now_ns, now_ns)
local count = redis.call('ZCARD', zkey)
redis.call('EXPIRE', zkey, expire_seconds)
if count <= max_count then
  return {1, count}
end
return {0, count}
";

// Count without writing; when denied, also return the earliest in-window
// score so the caller can compute a retry hint.
const PEEK_RATE_SCRIPT: &str = r"
local zkey = KEYS[1]
local window_start_ns = ARGV[1]
local max_count = tonumber(ARGV[2])
local count = redis.call('ZCOUNT', zkey, window_start_ns, '+inf')
if count < max_count then
  return {1, '0'}
end
local res = redis.call('ZRANGEBYSCORE', zkey, window_start_ns, '+inf', 'WITHSCORES', 'LIMIT', 0, 1)
if res and #res >= 2 then
  return {0, res[2]}
end
return {0, '0'}
";

// Increment, then set the day-aligned TTL if the key has none. Checking TTL
// after INCR covers the key's creation by this very call.
const DAILY_INCR_SCRIPT: &str = r"
local dkey = KEYS[1]
local expire_seconds = tonumber(ARGV[1])
local count = redis.call('INCR', dkey)
if redis.call('TTL', dkey) == -1 then
  redis.call('EXPIRE', dkey, expire_seconds)
end
return count
";

const DEFAULT_PREFIX: &str = "sms";

// Scripts are compiled once per store and shared across clones.
struct Scripts {
    rate_limit: redis::Script,
    peek_rate: redis::Script,
    daily_incr: redis::Script,
}

/// Redis implementation of [`CodeStore`].
#[derive(Clone)]
pub struct RedisCodeStore {
    client: redis::Client,
    prefix: String,
    scripts: std::sync::Arc<Scripts>,
}

impl RedisCodeStore {
    /// Create a store with the default `sms` key prefix.
    pub fn new(client: redis::Client) -> Self {
        Self::with_prefix(client, DEFAULT_PREFIX)
    }

    /// Create a store with a custom key prefix (no trailing colon), e.g.
    /// `dev:sms`. An empty prefix falls back to the default.
    pub fn with_prefix(client: redis::Client, prefix: &str) -> Self {
        let prefix = if prefix.is_empty() {
            DEFAULT_PREFIX
        } else {
            prefix
        };
        Self {
            client,
            prefix: prefix.to_string(),
            scripts: std::sync::Arc::new(Scripts {
                rate_limit: redis::Script::new(RATE_LIMIT_SCRIPT),
                peek_rate: redis::Script::new(PEEK_RATE_SCRIPT),
                daily_incr: redis::Script::new(DAILY_INCR_SCRIPT),
            }),
        }
    }

    fn code_key(&self, phone: &str) -> String {
        format!("{}:code:{}", self.prefix, phone)
    }

    fn rate_key(&self, phone: &str) -> String {
        format!("{}:rate_z:{}", self.prefix, phone)
    }

    fn daily_key(&self, phone: &str) -> String {
        format!("{}:daily:{}:{}", self.prefix, Local::now().format("%Y%m%d"), phone)
    }
}

fn now_unix_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Seconds from now to 23:59:59 local time, one full day when the
/// computation degenerates.
fn seconds_until_end_of_day() -> i64 {
    const FULL_DAY: i64 = 24 * 60 * 60;
    let now = Local::now();
    let end = now
        .date_naive()
        .and_hms_opt(23, 59, 59)
        .and_then(|dt| dt.and_local_timezone(Local).latest());
    match end {
        Some(end) => {
            let secs = (end - now).num_seconds();
            if secs > 0 { secs } else { FULL_DAY }
        }
        None => FULL_DAY,
    }
}

#[async_trait]
impl CodeStore for RedisCodeStore {
    async fn save_code(&self, phone: &str, code: &str, ttl: Duration) -> Result<(), SmsError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SmsError::store("CONNECT", "-", e))?;
        let key = self.code_key(phone);

        let ttl_secs = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(&key, code, ttl_secs)
            .await
            .map_err(|e| SmsError::store("SETEX", &key, e))?;

        // The code itself is a bearer secret and never reaches the logs.
        tracing::info!(phone = %mask_phone(phone), ttl_secs, "sms code stored");
        Ok(())
    }

    async fn get_code(&self, phone: &str) -> Result<Option<String>, SmsError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SmsError::store("CONNECT", "-", e))?;
        let key = self.code_key(phone);

        let code: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| SmsError::store("GET", &key, e))?;
        Ok(code)
    }

    async fn delete_code(&self, phone: &str) -> Result<(), SmsError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SmsError::store("CONNECT", "-", e))?;
        let key = self.code_key(phone);

        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| SmsError::store("DEL", &key, e))?;
        Ok(())
    }

    async fn check_rate_limit(
        &self,
        phone: &str,
        max_count: i64,
        window: Duration,
    ) -> Result<RateLimitResult, SmsError> {
        if max_count <= 0 {
            return Ok(RateLimitResult::Allowed(0));
        }
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SmsError::store("CONNECT", "-", e))?;
        let key = self.rate_key(phone);

        let now_ns = now_unix_ns();
        let window_start_ns = now_ns.saturating_sub(window.as_nanos() as u64);
        let expire_secs = window.as_secs().max(1);

        let (allowed, count): (i64, i64) = self
            .scripts
            .rate_limit
            .key(&key)
            .arg(now_ns.to_string())
            .arg(window_start_ns.to_string())
            .arg(max_count)
            .arg(expire_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| SmsError::store("EVAL rate_limit", &key, e))?;

        if allowed == 1 {
            Ok(RateLimitResult::Allowed(count))
        } else {
            Ok(RateLimitResult::Exceeded(count))
        }
    }

    async fn peek_rate(
        &self,
        phone: &str,
        max_count: i64,
        window: Duration,
    ) -> Result<RatePeek, SmsError> {
        if max_count <= 0 {
            return Ok(RatePeek::Allowed);
        }
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SmsError::store("CONNECT", "-", e))?;
        let key = self.rate_key(phone);

        let now_ns = now_unix_ns();
        let window_ns = window.as_nanos() as u64;
        let window_start_ns = now_ns.saturating_sub(window_ns);

        let (allowed, earliest): (i64, String) = self
            .scripts
            .peek_rate
            .key(&key)
            .arg(window_start_ns.to_string())
            .arg(max_count)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| SmsError::store("EVAL peek_rate", &key, e))?;

        if allowed == 1 {
            return Ok(RatePeek::Allowed);
        }

        // retry_after = earliest + window - now, clamped at zero.
        let earliest_ns = earliest.parse::<f64>().unwrap_or(0.0);
        let delta_ns = (earliest_ns + window_ns as f64) - now_ns as f64;
        let retry_after = Duration::from_nanos(delta_ns.max(0.0) as u64);
        Ok(RatePeek::Denied { retry_after })
    }

    async fn incr_daily_count(&self, phone: &str) -> Result<i64, SmsError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SmsError::store("CONNECT", "-", e))?;
        let key = self.daily_key(phone);

        let count: i64 = self
            .scripts
            .daily_incr
            .key(&key)
            .arg(seconds_until_end_of_day())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| SmsError::store("EVAL daily_incr", &key, e))?;
        Ok(count)
    }

    async fn daily_count(&self, phone: &str) -> Result<(i64, Duration), SmsError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SmsError::store("CONNECT", "-", e))?;
        let key = self.daily_key(phone);

        let count: Option<i64> = conn
            .get(&key)
            .await
            .map_err(|e| SmsError::store("GET", &key, e))?;
        let Some(count) = count else {
            return Ok((0, Duration::ZERO));
        };

        let ttl_secs: i64 = conn
            .ttl(&key)
            .await
            .map_err(|e| SmsError::store("TTL", &key, e))?;
        // -1 (no expiry) and -2 (gone between the calls) both read as zero.
        let ttl = Duration::from_secs(ttl_secs.max(0) as u64);
        Ok((count, ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RedisCodeStore {
        let client = redis::Client::open("redis://127.0.0.1:6379").unwrap();
        RedisCodeStore::new(client)
    }

    #[test]
    fn keys_carry_the_prefix() {
        let s = store();
        assert_eq!(s.code_key("13800000001"), "sms:code:13800000001");
        assert_eq!(s.rate_key("13800000001"), "sms:rate_z:13800000001");
        let daily = s.daily_key("13800000001");
        assert!(daily.starts_with("sms:daily:"));
        assert!(daily.ends_with(":13800000001"));
        // The date segment is eight digits.
        let date = daily.split(':').nth(2).unwrap();
        assert_eq!(date.len(), 8);
        assert!(date.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn empty_prefix_falls_back() {
        let client = redis::Client::open("redis://127.0.0.1:6379").unwrap();
        let s = RedisCodeStore::with_prefix(client, "");
        assert_eq!(s.code_key("1"), "sms:code:1");
    }

    #[test]
    fn custom_prefix_appears_in_every_key() {
        let client = redis::Client::open("redis://127.0.0.1:6379").unwrap();
        let s = RedisCodeStore::with_prefix(client, "dev:sms");
        assert!(s.code_key("1").starts_with("dev:sms:"));
        assert!(s.rate_key("1").starts_with("dev:sms:"));
        assert!(s.daily_key("1").starts_with("dev:sms:"));
    }

    #[test]
    fn end_of_day_is_within_a_day() {
        let secs = seconds_until_end_of_day();
        assert!(secs > 0);
        assert!(secs <= 24 * 60 * 60);
    }
}
