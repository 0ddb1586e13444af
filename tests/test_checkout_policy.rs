//! Checkout policy: reconnect-on-error swap and limit enforcement

use std::sync::Arc;
use std::time::{Duration, Instant};

use redis_pool::mock::MockDialer;
use redis_pool::{DeadpoolRedisPool, RedisConfig};

fn test_config(size: usize, limit: usize) -> RedisConfig {
    RedisConfig::builder("127.0.0.1:6379")
        .pool_size(size)
        .pool_limit(limit)
        .idle_timeout(Duration::ZERO)
        .build()
}

fn pool_with(dialer: &MockDialer, size: usize, limit: usize) -> DeadpoolRedisPool {
    DeadpoolRedisPool::with_dialer("cache1", test_config(size, limit), Arc::new(dialer.clone()))
        .expect("pool config is valid")
}

#[tokio::test]
async fn test_errored_connection_is_replaced_at_next_checkout() {
    let dialer = MockDialer::new();
    let pool = pool_with(&dialer, 1, 1);

    let mut conn = pool.get(None).await.unwrap();
    let errored_id = conn.id();
    conn.record_failure("transport fault");
    pool.put(conn);

    let replacement = pool.get(None).await.unwrap();
    assert_ne!(replacement.id(), errored_id);
    assert!(replacement.last_error().is_none());
    assert_eq!(dialer.dial_count(), 2);
}

#[tokio::test]
async fn test_healthy_connection_is_not_replaced() {
    let dialer = MockDialer::new();
    let pool = pool_with(&dialer, 2, 2);

    let conn = pool.get(None).await.unwrap();
    let id = conn.id();
    pool.put(conn);

    let conn = pool.get(None).await.unwrap();
    assert_eq!(conn.id(), id);
    assert_eq!(dialer.dial_count(), 1);
}

#[tokio::test]
async fn test_failed_replacement_dial_surfaces_and_keeps_the_slot() {
    let dialer = MockDialer::new();
    let pool = pool_with(&dialer, 1, 1);

    let mut conn = pool.get(None).await.unwrap();
    let errored_id = conn.id();
    conn.record_failure("transport fault");
    pool.put(conn);

    dialer.set_failing(true);
    let err = pool.get(None).await.unwrap_err();
    assert!(err.is_dial_error());
    // The errored connection went back to the pool, so its slot survived.
    assert_eq!(pool.status().size, 1);

    dialer.set_failing(false);
    let replacement = pool.get(None).await.unwrap();
    assert_ne!(replacement.id(), errored_id);
    // One dial for the original, one failed swap, one successful swap.
    assert_eq!(dialer.dial_count(), 3);
}

#[tokio::test]
async fn test_live_connections_never_exceed_limit() {
    let dialer = MockDialer::new();
    let pool = pool_with(&dialer, 2, 5);

    let mut held = Vec::new();
    for _ in 0..5 {
        held.push(pool.get(Some(Duration::from_secs(1))).await.unwrap());
    }
    assert_eq!(pool.status().size, 5);
    assert_eq!(dialer.dial_count(), 5);

    // The pool is saturated; the sixth caller waits out its deadline.
    let err = pool
        .get(Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(pool.status().size, 5);
}

#[tokio::test]
async fn test_saturated_pool_unblocks_on_put() {
    let dialer = MockDialer::new();
    let pool = Arc::new(pool_with(&dialer, 2, 5));

    let mut held = Vec::new();
    for _ in 0..5 {
        held.push(pool.get(Some(Duration::from_secs(1))).await.unwrap());
    }

    let releaser = {
        let pool = Arc::clone(&pool);
        let conn = held.pop().unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            pool.put(conn);
        })
    };

    let started = Instant::now();
    let conn = pool.get(Some(Duration::from_secs(2))).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(conn.last_error().is_none());

    releaser.await.unwrap();
    // Still capped after the handoff.
    assert!(pool.status().size <= 5);
}

#[tokio::test]
async fn test_return_is_unconditional() {
    let dialer = MockDialer::new();
    let pool = pool_with(&dialer, 1, 1);

    let mut conn = pool.get(None).await.unwrap();
    conn.record_failure("late failure");
    pool.put(conn);

    // The errored connection sits in the pool until the next checkout
    // filters it; returning it never dropped the slot.
    assert_eq!(pool.status().available, 1);
    assert_eq!(pool.status().size, 1);
}
