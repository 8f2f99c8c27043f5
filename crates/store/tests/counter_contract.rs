use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use fomo_core::{crosses_threshold, CounterWindow};
use fomo_store::redis_store::connection_info;
use fomo_store::{ConnectPolicy, CounterStore, InMemoryCounterStore, RedisCounterStore};
use futures::future::join_all;
use redis::aio::ConnectionManager;

type CounterContractResult<T = ()> = Result<T, String>;

const CONCURRENT_REACTIONS: u64 = 64;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        match (&$left, &$right) {
            (left, right) => {
                if left != right {
                    return Err(format!(
                        "assertion failed: `left == right` (`{left:?}` != `{right:?}`)"
                    ));
                }
            }
        }
    };
}

async fn concurrent_values(
    store: Arc<dyn CounterStore>,
    key: &str,
) -> CounterContractResult<Vec<u64>> {
    let tasks = (0..CONCURRENT_REACTIONS).map(|_| {
        let store = Arc::clone(&store);
        let key = key.to_owned();
        tokio::spawn(async move { store.incr(&key).await })
    });

    let mut values = Vec::new();
    for joined in join_all(tasks).await {
        let result = joined.map_err(|error| format!("increment task panicked: {error}"))?;
        values.push(result.map_err(|error| format!("increment failed: {error}"))?);
    }
    Ok(values)
}

fn check_permutation(values: &[u64]) -> CounterContractResult {
    let distinct: BTreeSet<u64> = values.iter().copied().collect();
    require_eq!(distinct.len(), values.len());
    require_eq!(distinct.first().copied(), Some(1));
    require_eq!(distinct.last().copied(), Some(CONCURRENT_REACTIONS));

    for threshold in [1, 5, CONCURRENT_REACTIONS] {
        let crossings = values.iter().filter(|value| crosses_threshold(**value, threshold)).count();
        require!(crossings == 1, "threshold {threshold} was crossed {crossings} times");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_memory_concurrent_increments_form_a_permutation() -> CounterContractResult {
    let store: Arc<dyn CounterStore> =
        Arc::new(InMemoryCounterStore::new(CounterWindow::sliding(Duration::from_secs(30))));

    let values = concurrent_values(Arc::clone(&store), "T1_C1_1.0").await?;
    check_permutation(&values)?;

    require_eq!(store.incr("T1_C1_2.0").await.map_err(|error| error.to_string())?, 1);
    Ok(())
}

fn redis_addr() -> Option<String> {
    std::env::var("FOMO_TEST_REDIS_ADDR").ok().filter(|addr| !addr.trim().is_empty())
}

/// Connects a counter store plus a raw connection for inspecting key state.
async fn redis_store(
    addr: &str,
    window: CounterWindow,
) -> CounterContractResult<(RedisCounterStore, ConnectionManager)> {
    let info = connection_info(addr, None, 0).map_err(|error| error.to_string())?;
    let policy = ConnectPolicy { max_attempts: 1, retry_delay: Duration::ZERO };
    let store = RedisCounterStore::connect(info.clone(), window, Duration::from_secs(5), &policy)
        .await
        .map_err(|error| error.to_string())?;
    let client = redis::Client::open(info).map_err(|error| error.to_string())?;
    let inspector = ConnectionManager::new(client).await.map_err(|error| error.to_string())?;
    Ok((store, inspector))
}

async fn remaining_ttl(inspector: &mut ConnectionManager, key: &str) -> CounterContractResult<i64> {
    let ttl: i64 = redis::cmd("TTL")
        .arg(key)
        .query_async(inspector)
        .await
        .map_err(|error| format!("TTL failed: {error}"))?;
    Ok(ttl)
}

fn unique_key(label: &str) -> String {
    format!("TTEST_C{label}_{}", std::process::id())
}

async fn incr(store: &RedisCounterStore, key: &str) -> CounterContractResult<u64> {
    store.incr(key).await.map_err(|error| format!("increment failed: {error}"))
}

// The Redis tests below run against a live server only when
// `FOMO_TEST_REDIS_ADDR` is set.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn redis_concurrent_increments_form_a_permutation() -> CounterContractResult {
    let Some(addr) = redis_addr() else {
        return Ok(());
    };

    let (store, _) = redis_store(&addr, CounterWindow::sliding(Duration::from_secs(30))).await?;
    let store: Arc<dyn CounterStore> = Arc::new(store);

    let values = concurrent_values(store, &unique_key("PERM")).await?;
    check_permutation(&values)
}

#[tokio::test]
async fn redis_sliding_window_resets_ttl_on_every_increment() -> CounterContractResult {
    let Some(addr) = redis_addr() else {
        return Ok(());
    };

    let window = CounterWindow::sliding(Duration::from_secs(30));
    let (store, mut inspector) = redis_store(&addr, window).await?;
    let key = unique_key("SLIDE");

    for expected in 1..=3 {
        require_eq!(incr(&store, &key).await?, expected);
        let ttl = remaining_ttl(&mut inspector, &key).await?;
        require!(
            ttl == i64::try_from(window.ttl_secs()).unwrap_or(i64::MAX),
            "ttl after increment {expected} was {ttl}"
        );
        tokio::time::sleep(Duration::from_millis(1_100)).await;
    }
    Ok(())
}

#[tokio::test]
async fn redis_fixed_window_keeps_creation_ttl() -> CounterContractResult {
    let Some(addr) = redis_addr() else {
        return Ok(());
    };

    let window = CounterWindow::fixed(Duration::from_secs(30));
    let (store, mut inspector) = redis_store(&addr, window).await?;
    let key = unique_key("FIXED");

    require_eq!(incr(&store, &key).await?, 1);
    require_eq!(remaining_ttl(&mut inspector, &key).await?, 30);

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    require_eq!(incr(&store, &key).await?, 2);
    let ttl = remaining_ttl(&mut inspector, &key).await?;
    require!((1..30).contains(&ttl), "fixed window ttl was reset to {ttl}");
    Ok(())
}

#[tokio::test]
async fn redis_counter_restarts_at_one_after_expiry() -> CounterContractResult {
    let Some(addr) = redis_addr() else {
        return Ok(());
    };

    for window in [
        CounterWindow::sliding(Duration::from_secs(1)),
        CounterWindow::fixed(Duration::from_secs(1)),
    ] {
        let (store, _) = redis_store(&addr, window).await?;
        let key = unique_key(&format!("EXPIRE{:?}", window.policy));

        require_eq!(incr(&store, &key).await?, 1);
        require_eq!(incr(&store, &key).await?, 2);
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        require_eq!(incr(&store, &key).await?, 1);
    }
    Ok(())
}
