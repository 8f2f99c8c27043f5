use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use fomo_core::{CounterWindow, ExpiryPolicy};
use redis::aio::ConnectionManager;
use redis::{ConnectionInfo, IntoConnectionInfo, RedisError, Script};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::{CounterStore, StoreError};

/// Sets the expiry only when the counter is created (or somehow lost its TTL),
/// which turns the sliding window into a fixed one.
const FIXED_WINDOW_INCR: &str = r"
local value = redis.call('INCR', KEYS[1])
if value == 1 or redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return value
";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self { max_attempts: 10, retry_delay: Duration::from_secs(2) }
    }
}

pub struct RedisCounterStore {
    connection: ConnectionManager,
    window: CounterWindow,
    op_timeout: Duration,
    fixed_window_incr: Script,
}

impl RedisCounterStore {
    /// Connects and pings the server, retrying per `policy` before giving up.
    pub async fn connect(
        info: ConnectionInfo,
        window: CounterWindow,
        op_timeout: Duration,
        policy: &ConnectPolicy,
    ) -> Result<Self, StoreError> {
        let client = redis::Client::open(info).map_err(map_redis_error)?;
        let max_attempts = policy.max_attempts.max(1);
        let mut last_error = StoreError::Unavailable("no connection attempt made".to_owned());

        for attempt in 1..=max_attempts {
            match with_timeout(op_timeout, ConnectionManager::new(client.clone())).await {
                Ok(connection) => {
                    let store = Self {
                        connection,
                        window,
                        op_timeout,
                        fixed_window_incr: Script::new(FIXED_WINDOW_INCR),
                    };
                    match store.healthy().await {
                        Ok(()) => {
                            info!(
                                event_name = "system.store.connected",
                                attempt,
                                window_secs = window.ttl_secs(),
                                window_policy = ?window.policy,
                                "redis counter store connection established"
                            );
                            return Ok(store);
                        }
                        Err(error) => last_error = error,
                    }
                }
                Err(error) => last_error = error,
            }

            warn!(
                event_name = "system.store.connect_retry",
                attempt,
                max_attempts,
                error = %last_error,
                "failed to connect to redis"
            );
            if attempt < max_attempts && !policy.retry_delay.is_zero() {
                tokio::time::sleep(policy.retry_delay).await;
            }
        }

        Err(StoreError::Unavailable(format!(
            "failed to connect to redis after {max_attempts} attempts: {last_error}"
        )))
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        let mut connection = self.connection.clone();
        let ttl_secs = i64::try_from(self.window.ttl_secs()).unwrap_or(i64::MAX);

        match self.window.policy {
            ExpiryPolicy::Sliding => {
                let mut pipe = redis::pipe();
                pipe.atomic().incr(key, 1_u64).expire(key, ttl_secs).ignore();
                let (value,): (u64,) =
                    with_timeout(self.op_timeout, pipe.query_async(&mut connection)).await?;
                Ok(value)
            }
            ExpiryPolicy::Fixed => {
                let mut invocation = self.fixed_window_incr.key(key);
                invocation.arg(ttl_secs);
                let value: u64 =
                    with_timeout(self.op_timeout, invocation.invoke_async(&mut connection))
                        .await?;
                Ok(value)
            }
        }
    }

    async fn healthy(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _pong: String =
            with_timeout(self.op_timeout, redis::cmd("PING").query_async(&mut connection))
                .await?;
        Ok(())
    }
}

/// Builds connection details from `STORE_ADDR`-style input.
///
/// Accepts a bare `host:port` or a full `redis://` / `rediss://` URL. The
/// configured database and password always win over anything in the URL.
pub fn connection_info(
    addr: &str,
    password: Option<&SecretString>,
    db: i64,
) -> Result<ConnectionInfo, StoreError> {
    let addr = addr.trim();
    let url = if addr.contains("://") { addr.to_owned() } else { format!("redis://{addr}") };

    let mut info = url.as_str().into_connection_info().map_err(|error| {
        StoreError::InvalidAddress { addr: addr.to_owned(), reason: error.to_string() }
    })?;
    info.redis.db = db;
    if let Some(password) = password {
        info.redis.password = Some(password.expose_secret().to_owned());
    }

    Ok(info)
}

async fn with_timeout<T, F>(limit: Duration, future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, RedisError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result.map_err(map_redis_error),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

fn map_redis_error(error: RedisError) -> StoreError {
    if error.is_timeout() {
        return StoreError::Transient(error.to_string());
    }
    if error.is_io_error() || error.is_connection_refusal() || error.is_connection_dropped() {
        return StoreError::Unavailable(error.to_string());
    }
    StoreError::Transient(error.to_string())
}

#[cfg(test)]
mod tests {
    use redis::ConnectionAddr;
    use secrecy::SecretString;

    use super::{connection_info, ConnectPolicy};
    use crate::StoreError;

    #[test]
    fn bare_host_port_becomes_tcp_address() {
        let info = connection_info("cache.internal:6380", None, 3).expect("info");

        match info.addr {
            ConnectionAddr::Tcp(host, port) => {
                assert_eq!(host, "cache.internal");
                assert_eq!(port, 6380);
            }
            other => panic!("unexpected address {other:?}"),
        }
        assert_eq!(info.redis.db, 3);
        assert_eq!(info.redis.password, None);
    }

    #[test]
    fn configured_password_and_db_override_url() {
        let password = SecretString::from("s3cret".to_owned());
        let info =
            connection_info("redis://:old@127.0.0.1:6379/9", Some(&password), 0).expect("info");

        assert_eq!(info.redis.db, 0);
        assert_eq!(info.redis.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let error = connection_info("memcached://127.0.0.1:11211", None, 0).expect_err("error");
        assert!(matches!(error, StoreError::InvalidAddress { .. }));
    }

    #[test]
    fn default_connect_policy_matches_startup_budget() {
        let policy = ConnectPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.retry_delay.as_secs(), 2);
    }
}
