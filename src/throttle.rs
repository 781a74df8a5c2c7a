//! Failed invite lookups are counted per client network; once a network
//! reaches the limit it is refused until its counter expires.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rocket_db_pools::deadpool_redis::{self, redis::AsyncCommands};
use tracing::{info, warn};

use crate::error::StoreError;

/// Counter backend.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn failures(&self, key: &str) -> Result<u32, StoreError>;

    /// Increments the counter and restarts its expiry. Returns the new count.
    async fn record_failure(&self, key: &str, window_secs: i64) -> Result<u32, StoreError>;
}

/// IPv4 addresses count individually, IPv6 clients by their /64.
pub fn client_key(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(ip4) => format!("lookup-fail:{ip4}"),
        IpAddr::V6(ip6) => {
            let s = ip6.segments();
            format!(
                "lookup-fail:{:04x}:{:04x}:{:04x}:{:04x}::/64",
                s[0], s[1], s[2], s[3]
            )
        }
    }
}

#[derive(Clone)]
pub struct LookupThrottle {
    store: Arc<dyn AttemptStore>,
    max_failures: u32,
    window_secs: i64,
}

impl LookupThrottle {
    pub fn new(store: Arc<dyn AttemptStore>, max_failures: u32, window_secs: i64) -> Self {
        Self {
            store,
            max_failures,
            window_secs,
        }
    }

    /// Unknown peers are never blocked, and neither is anyone while the
    /// counter backend is down.
    pub async fn is_blocked(&self, client: Option<IpAddr>) -> bool {
        let Some(ip) = client else {
            return false;
        };
        match self.store.failures(&client_key(ip)).await {
            Ok(failures) => failures >= self.max_failures,
            Err(e) => {
                warn!(error = %e, "lookup throttle unavailable");
                false
            }
        }
    }

    pub async fn record_failure(&self, client: Option<IpAddr>) {
        let Some(ip) = client else {
            return;
        };
        let key = client_key(ip);
        match self.store.record_failure(&key, self.window_secs).await {
            Ok(failures) if failures >= self.max_failures => {
                info!(client = %key, failures, "client blocked from invite lookups");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not record failed lookup"),
        }
    }
}

pub struct RedisAttempts {
    pool: deadpool_redis::Pool,
}

impl RedisAttempts {
    pub fn new(pool: deadpool_redis::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for RedisAttempts {
    async fn failures(&self, key: &str) -> Result<u32, StoreError> {
        let mut conn = self.pool.get().await?;
        let failures: Option<u32> = conn.get(key).await?;
        Ok(failures.unwrap_or(0))
    }

    async fn record_failure(&self, key: &str, window_secs: i64) -> Result<u32, StoreError> {
        let mut conn = self.pool.get().await?;
        let failures: u32 = conn.incr(key, 1).await?;
        let _: bool = conn.expire(key, window_secs).await?;
        Ok(failures)
    }
}

/// In-process counters, for tests and single-node development.
#[derive(Default)]
pub struct MemoryAttempts {
    counters: Mutex<HashMap<String, (u32, Instant)>>,
}

impl MemoryAttempts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttempts {
    async fn failures(&self, key: &str) -> Result<u32, StoreError> {
        let mut counters = self.counters.lock();
        let current = counters.get(key).copied();
        match current {
            Some((_, expires)) if expires <= Instant::now() => {
                counters.remove(key);
                Ok(0)
            }
            Some((failures, _)) => Ok(failures),
            None => Ok(0),
        }
    }

    async fn record_failure(&self, key: &str, window_secs: i64) -> Result<u32, StoreError> {
        let now = Instant::now();
        let window = Duration::from_secs(u64::try_from(window_secs).unwrap_or(0));
        let mut counters = self.counters.lock();
        counters.retain(|_, (_, expires)| *expires > now);
        let entry = counters.entry(key.to_owned()).or_insert((0, now));
        entry.0 += 1;
        entry.1 = now + window;
        Ok(entry.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn throttle(max: u32) -> LookupThrottle {
        LookupThrottle::new(Arc::new(MemoryAttempts::new()), max, 60)
    }

    #[test]
    fn ipv6_clients_share_their_prefix() {
        let a = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 1, 2, 3, 4, 5, 6));
        let b = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 1, 2, 9, 9, 9, 9));
        assert_eq!(client_key(a), client_key(b));
        assert_eq!(client_key(a), "lookup-fail:2001:0db8:0001:0002::/64");
    }

    #[tokio::test]
    async fn blocks_after_the_limit() {
        let throttle = throttle(3);
        let ip = Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7)));
        for _ in 0..2 {
            throttle.record_failure(ip).await;
        }
        assert!(!throttle.is_blocked(ip).await);
        throttle.record_failure(ip).await;
        assert!(throttle.is_blocked(ip).await);

        let other = Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 8)));
        assert!(!throttle.is_blocked(other).await);
    }

    #[tokio::test]
    async fn unknown_peers_are_not_counted() {
        let throttle = throttle(1);
        throttle.record_failure(None).await;
        assert!(!throttle.is_blocked(None).await);
    }

    #[tokio::test]
    async fn counters_expire() {
        let attempts = MemoryAttempts::new();
        attempts.record_failure("k", 0).await.unwrap();
        assert_eq!(attempts.failures("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_networks_are_forgotten() {
        let attempts = MemoryAttempts::new();
        attempts.record_failure("lookup-fail:192.0.2.1", 0).await.unwrap();
        attempts.record_failure("lookup-fail:192.0.2.2", 0).await.unwrap();
        attempts.record_failure("lookup-fail:192.0.2.3", 60).await.unwrap();
        assert_eq!(attempts.counters.lock().len(), 1);
        assert_eq!(attempts.failures("lookup-fail:192.0.2.3").await.unwrap(), 1);
    }
}
