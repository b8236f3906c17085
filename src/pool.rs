//! Shared pool of validated proxies
//!
//! Entries live in a dense vector so a uniform pick is a single index draw;
//! a side map from candidate to slot keeps upsert and evict O(1). Both sit
//! behind one lock, so readers never see a half-removed entry.

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::HashMap;

use crate::error::{Result, RotatorError};
use crate::proxy::{ProxyCandidate, ValidatedProxy};

#[derive(Debug, Default)]
struct Entries {
    proxies: Vec<ValidatedProxy>,
    index: HashMap<ProxyCandidate, usize>,
}

/// Concurrency-safe registry of validated proxies
#[derive(Debug, Default)]
pub struct ProxyPool {
    entries: RwLock<Entries>,
}

impl ProxyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a proxy, or refresh `last_checked_at` if it is already present
    ///
    /// Returns true when the proxy was not in the pool before.
    pub fn upsert(&self, proxy: ValidatedProxy) -> bool {
        let mut entries = self.entries.write();
        if let Some(&slot) = entries.index.get(&proxy.candidate) {
            entries.proxies[slot].last_checked_at = proxy.last_checked_at;
            return false;
        }
        let slot = entries.proxies.len();
        entries.index.insert(proxy.candidate.clone(), slot);
        entries.proxies.push(proxy);
        true
    }

    /// Remove the entry for `candidate`; returns whether anything was removed
    pub fn evict(&self, candidate: &ProxyCandidate) -> bool {
        let mut entries = self.entries.write();
        let Some(slot) = entries.index.remove(candidate) else {
            return false;
        };
        entries.proxies.swap_remove(slot);
        if let Some(moved) = entries.proxies.get(slot) {
            let key = moved.candidate.clone();
            entries.index.insert(key, slot);
        }
        true
    }

    /// Pick one entry uniformly at random from the current set
    pub fn pull_random(&self) -> Result<ValidatedProxy> {
        let entries = self.entries.read();
        let mut rng = rand::thread_rng();
        entries
            .proxies
            .choose(&mut rng)
            .cloned()
            .ok_or(RotatorError::PoolEmpty)
    }

    /// Point-in-time copy of the pool
    pub fn snapshot(&self) -> Vec<ValidatedProxy> {
        self.entries.read().proxies.clone()
    }

    pub fn contains(&self, candidate: &ProxyCandidate) -> bool {
        self.entries.read().index.contains_key(candidate)
    }

    pub fn len(&self) -> usize {
        self.entries.read().proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyScheme;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn candidate(host: &str, port: u16) -> ProxyCandidate {
        ProxyCandidate::new(host, port, ProxyScheme::Http)
    }

    #[test]
    fn test_pull_from_empty_pool() {
        let pool = ProxyPool::new();
        assert!(matches!(pool.pull_random(), Err(RotatorError::PoolEmpty)));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_upsert_is_idempotent_and_refreshes() {
        let pool = ProxyPool::new();
        let earlier = Utc::now() - ChronoDuration::minutes(5);
        let later = Utc::now();

        assert!(pool.upsert(ValidatedProxy::new(candidate("1.2.3.4", 8080), earlier)));
        assert!(!pool.upsert(ValidatedProxy::new(candidate("1.2.3.4", 8080), later)));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.snapshot()[0].last_checked_at, later);

        // Same address, different scheme is a different entry.
        let socks = ProxyCandidate::new("1.2.3.4", 8080, ProxyScheme::Socks5);
        assert!(pool.upsert(ValidatedProxy::checked_now(socks)));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_evict_missing_is_noop() {
        let pool = ProxyPool::new();
        pool.upsert(ValidatedProxy::checked_now(candidate("1.2.3.4", 8080)));
        assert!(!pool.evict(&candidate("5.6.7.8", 3128)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_evict_keeps_index_consistent() {
        let pool = ProxyPool::new();
        for port in 1..=5 {
            pool.upsert(ValidatedProxy::checked_now(candidate("10.0.0.1", port)));
        }
        assert!(pool.evict(&candidate("10.0.0.1", 1)));
        assert!(pool.evict(&candidate("10.0.0.1", 3)));

        assert!(!pool.contains(&candidate("10.0.0.1", 1)));
        assert!(pool.contains(&candidate("10.0.0.1", 5)));
        // The entry swapped into a freed slot must still be evictable.
        assert!(pool.evict(&candidate("10.0.0.1", 5)));
        let mut ports: Vec<u16> = pool.snapshot().iter().map(|p| p.candidate.port).collect();
        ports.sort_unstable();
        assert_eq!(ports, vec![2, 4]);
    }

    #[test]
    fn test_evicted_proxy_is_never_pulled() {
        let pool = ProxyPool::new();
        pool.upsert(ValidatedProxy::checked_now(candidate("1.1.1.1", 80)));
        pool.upsert(ValidatedProxy::checked_now(candidate("2.2.2.2", 80)));
        pool.evict(&candidate("1.1.1.1", 80));

        for _ in 0..200 {
            let pulled = pool.pull_random().unwrap();
            assert_eq!(pulled.candidate, candidate("2.2.2.2", 80));
        }

        pool.upsert(ValidatedProxy::checked_now(candidate("1.1.1.1", 80)));
        let seen = (0..500).any(|_| pool.pull_random().unwrap().candidate.host == "1.1.1.1");
        assert!(seen);
    }

    #[test]
    fn test_pull_random_is_uniform() {
        let pool = ProxyPool::new();
        let k = 5;
        for port in 0..k {
            pool.upsert(ValidatedProxy::checked_now(candidate("10.0.0.1", 1000 + port)));
        }

        let draws = 50_000;
        let mut counts: HashMap<u16, usize> = HashMap::new();
        for _ in 0..draws {
            *counts.entry(pool.pull_random().unwrap().candidate.port).or_default() += 1;
        }

        assert_eq!(counts.len(), k as usize);
        let expected = draws as f64 / k as f64;
        for (port, count) in counts {
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(deviation < 0.05, "port {} drawn {} times", port, count);
        }
    }

    #[test]
    fn test_concurrent_mutation_and_reads() {
        let pool = Arc::new(ProxyPool::new());
        let stable = candidate("9.9.9.9", 9999);
        pool.upsert(ValidatedProxy::checked_now(stable.clone()));

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for i in 0..500u16 {
                        let c = candidate(&format!("10.0.{}.1", w), i + 1);
                        pool.upsert(ValidatedProxy::checked_now(c.clone()));
                        pool.evict(&c);
                    }
                })
            })
            .collect();

        let reader = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                for _ in 0..2_000 {
                    let snapshot = pool.snapshot();
                    let unique: std::collections::HashSet<_> =
                        snapshot.iter().map(|p| p.candidate.clone()).collect();
                    assert_eq!(unique.len(), snapshot.len());
                    assert!(pool.pull_random().is_ok());
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(pool.snapshot(), vec![pool.pull_random().unwrap()]);
        assert!(pool.contains(&stable));
    }
}
