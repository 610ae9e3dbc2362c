use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use redis::aio::ConnectionManager;
use redis::{RedisError, Script};

use crate::config::RedisConfig;
use crate::limiter::{Admission, CounterError, CounterStore};

// KEYS[1] counter, ARGV[1] ttl in seconds, ARGV[2] quota
const ACQUIRE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    redis.call('SET', KEYS[1], 1, 'EX', ARGV[1])
    return 1
end
if tonumber(current) >= tonumber(ARGV[2]) then
    return -1
end
return redis.call('INCR', KEYS[1])
"#;

#[derive(Clone)]
pub struct Redis {
    connection: ConnectionManager,
    acquire: Arc<Script>,
}

impl Redis {
    const DEFAULT_PORT: u16 = 6379;
    const DEFAULT_DB: i64 = 0;

    pub async fn new(redis_config: &RedisConfig) -> Result<Self, RedisError> {
        let client = redis::Client::open(Self::connection_url(redis_config).as_str())?;
        let connection = client.get_connection_manager().await?;

        info!(
            "Connected to Redis at {}:{}",
            redis_config.host,
            redis_config.port.unwrap_or(Self::DEFAULT_PORT)
        );

        Ok(Redis {
            connection,
            acquire: Arc::new(Script::new(ACQUIRE_SCRIPT)),
        })
    }

    fn connection_url(redis_config: &RedisConfig) -> String {
        format!(
            "redis://{}{}:{}/{}",
            redis_config
                .password
                .as_ref()
                .map(|password| format!(":{}@", password))
                .unwrap_or_default(),
            redis_config.host,
            redis_config.port.unwrap_or(Self::DEFAULT_PORT),
            redis_config.db.unwrap_or(Self::DEFAULT_DB),
        )
    }
}

#[async_trait]
impl CounterStore for Redis {
    async fn acquire(
        &self,
        key: &str,
        quota: u32,
        ttl_seconds: u64,
    ) -> Result<Admission, CounterError> {
        let mut connection = self.connection.clone();
        let mut invocation = self.acquire.key(key);
        invocation.arg(ttl_seconds).arg(quota);

        let count: i64 = invocation
            .invoke_async(&mut connection)
            .await
            .map_err(|e| CounterError::Unavailable(e.to_string()))?;

        Ok(match u32::try_from(count) {
            Ok(count) => Admission::Admitted(count),
            Err(_) => Admission::Rejected,
        })
    }
}
