//! Plan rate limits backed by token buckets.
//!
//! Buckets are keyed `scope:clientId:name`, where scope is the plan id, so
//! every credential gets its own allowance per named plan limit.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::observability::metrics;
use crate::store::model::RateLimit;

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// A parsed limit such as `100/1hour`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quota {
    Unlimited,
    Limited { count: u32, period: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid rate limit '{0}'")]
pub struct InvalidQuota(pub String);

impl FromStr for Quota {
    type Err = InvalidQuota;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(Quota::Unlimited);
        }
        let invalid = || InvalidQuota(s.to_string());
        let (count, period) = s.split_once('/').ok_or_else(invalid)?;
        let count: u32 = count.trim().parse().map_err(|_| invalid())?;

        let period = period.trim().to_ascii_lowercase();
        let split = period.find(|c: char| !c.is_ascii_digit()).unwrap_or(period.len());
        let (amount, unit) = period.split_at(split);
        let amount: u64 = if amount.is_empty() { 1 } else { amount.parse().map_err(|_| invalid())? };
        let unit_secs = match unit.trim() {
            "s" | "sec" | "second" | "seconds" => 1,
            "m" | "min" | "minute" | "minutes" => 60,
            "h" | "hour" | "hours" => 3_600,
            "d" | "day" | "days" => 86_400,
            "w" | "week" | "weeks" => 604_800,
            _ => return Err(invalid()),
        };
        if amount == 0 {
            return Err(invalid());
        }
        let secs = amount.checked_mul(unit_secs).ok_or_else(invalid)?;
        Ok(Quota::Limited {
            count,
            period: Duration::from_secs(secs),
        })
    }
}

/// A request was rejected by the named limit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rate limit '{name}' exceeded")]
pub struct RateLimitExceeded {
    pub name: String,
}

/// Process-wide limiter state, owned by the server and injected where needed.
#[derive(Default)]
pub struct RateLimiterCache {
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one token from every limit; the first exhausted limit rejects.
    ///
    /// Limits whose value does not parse are logged and skipped.
    pub fn check(&self, scope: &str, client_id: &str, limits: &[RateLimit]) -> Result<(), RateLimitExceeded> {
        let mut buckets = self.buckets.lock();
        for limit in limits {
            let quota = match limit.value.parse::<Quota>() {
                Ok(quota) => quota,
                Err(e) => {
                    tracing::warn!(scope = %scope, limit = %limit.name, error = %e, "Skipping rate limit");
                    continue;
                }
            };
            let Quota::Limited { count, period } = quota else {
                continue;
            };

            let capacity = f64::from(count);
            let refill_rate = capacity / period.as_secs_f64();
            let key = format!("{}:{}:{}", scope, client_id, limit.name);
            let bucket = buckets.entry(key).or_insert_with(|| TokenBucket::new(capacity));

            if !bucket.try_acquire(capacity, refill_rate) {
                tracing::warn!(scope = %scope, client_id = %client_id, limit = %limit.name, "Rate limit exceeded");
                metrics::record_rate_limited(&limit.name);
                return Err(RateLimitExceeded {
                    name: limit.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }

    /// Forget every bucket.
    pub fn reset(&self) {
        self.buckets.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(name: &str, value: &str) -> RateLimit {
        RateLimit {
            name: name.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_parse_quota() {
        assert_eq!(
            "100/1hour".parse::<Quota>().unwrap(),
            Quota::Limited { count: 100, period: Duration::from_secs(3600) }
        );
        assert_eq!(
            "5/minute".parse::<Quota>().unwrap(),
            Quota::Limited { count: 5, period: Duration::from_secs(60) }
        );
        assert_eq!("unlimited".parse::<Quota>().unwrap(), Quota::Unlimited);
        assert!("lots".parse::<Quota>().is_err());
        assert!("5/0hour".parse::<Quota>().is_err());
        assert!("5/1fortnight".parse::<Quota>().is_err());
    }

    #[test]
    fn test_oversized_period_is_rejected() {
        assert!("1/99999999999999999week".parse::<Quota>().is_err());
        assert!("1/99999999999999999999hour".parse::<Quota>().is_err());
    }

    #[test]
    fn test_exhausts_per_client() {
        let cache = RateLimiterCache::new();
        let limits = vec![limit("default", "2/1hour")];

        assert!(cache.check("plan", "alice", &limits).is_ok());
        assert!(cache.check("plan", "alice", &limits).is_ok());
        assert_eq!(
            cache.check("plan", "alice", &limits).unwrap_err(),
            RateLimitExceeded { name: "default".into() }
        );
        assert!(cache.check("plan", "bob", &limits).is_ok());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reset_and_unparseable() {
        let cache = RateLimiterCache::new();
        let limits = vec![limit("bad", "whenever"), limit("open", "unlimited"), limit("one", "1/1day")];
        assert!(cache.check("plan", "alice", &limits).is_ok());
        assert!(cache.check("plan", "alice", &limits).is_err());

        cache.reset();
        assert!(cache.is_empty());
        assert!(cache.check("plan", "alice", &limits).is_ok());
    }
}
