//! Counter Store - ephemeral reaction counters with a time-to-live
//!
//! A counter is created at 1 by the first increment and disappears once its
//! window elapses without activity. Every binding must perform the increment
//! and the expiry update as one atomic step, so concurrent callers for the
//! same key each observe a distinct post-increment value.
//!
//! - **Redis** (`redis_store`) - `INCR` + `EXPIRE` inside `MULTI`/`EXEC`
//! - **In-memory** (`memory`) - mutex-guarded map, used by tests and `memory://`

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod redis_store;

pub use memory::InMemoryCounterStore;
pub use redis_store::{ConnectPolicy, RedisCounterStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
    #[error("counter store request failed: {0}")]
    Transient(String),
    #[error("counter store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid counter store address `{addr}`: {reason}")]
    InvalidAddress { addr: String, reason: String },
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increments `key` (creating it at 1), applies the window expiry and
    /// returns the post-increment value.
    async fn incr(&self, key: &str) -> Result<u64, StoreError>;

    /// Succeeds iff the backing store is reachable.
    async fn healthy(&self) -> Result<(), StoreError>;
}
