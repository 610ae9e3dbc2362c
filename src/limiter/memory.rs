use std::collections::HashMap;
use std::sync::Arc;

use async_std::sync::RwLock;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::limiter::window::{system_clock, Clock};
use crate::limiter::{Admission, CounterError, CounterStore};

struct Counter {
    count: u32,
    expires_at: DateTime<Utc>,
}

type CounterMap = HashMap<String, Counter>;

/// Process-local counters with the same admission rules as the Redis script.
/// Expired counters are swept whenever a new window opens.
#[derive(Clone)]
pub struct Memory {
    counters: Arc<RwLock<CounterMap>>,
    clock: Clock,
}

impl Memory {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            counters: Arc::new(RwLock::new(CounterMap::new())),
            clock,
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for Memory {
    async fn acquire(
        &self,
        key: &str,
        quota: u32,
        ttl_seconds: u64,
    ) -> Result<Admission, CounterError> {
        let now = (self.clock)();
        let mut counters = self.counters.write().await;

        if let Some(counter) = counters.get_mut(key).filter(|c| c.expires_at > now) {
            if counter.count >= quota {
                return Ok(Admission::Rejected);
            }

            counter.count += 1;

            return Ok(Admission::Admitted(counter.count));
        }

        let ttl = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| CounterError::Unavailable(format!("invalid ttl {}", ttl_seconds)))?;

        counters.retain(|_, counter| counter.expires_at > now);
        counters.insert(
            key.into(),
            Counter {
                count: 1,
                expires_at: now + ttl,
            },
        );

        Ok(Admission::Admitted(1))
    }
}
