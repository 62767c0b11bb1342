//! Stale-while-revalidate cache sitting in front of every provider.
//!
//! One entry per key (one per sport in practice). A fresh value is served
//! straight from memory. Once it ages past the TTL the next caller starts a
//! single background refresh and, when any older value exists, gets that older
//! value back immediately. Callers arriving while a refresh is in flight never
//! start a second one: they get the stale value, or on a cold start they all
//! await the same refresh and see the same outcome.
//!
//! The refresh runs in its own task so it completes and updates the entry even
//! when every caller was served stale. A failed refresh keeps the previous
//! value and only reports the error to callers that were awaiting it.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("refresh failed: {0:#}")]
    Refresh(Arc<anyhow::Error>),

    #[error("refresh task aborted: {0}")]
    Aborted(String),
}

type Refresh<V> = Shared<BoxFuture<'static, Result<V, CacheError>>>;

struct CacheEntry<V> {
    value: Option<V>,
    fetched_at: Option<Instant>,
    in_flight: Option<Refresh<V>>,
}

enum Lookup<V> {
    Ready(V),
    Await(Refresh<V>),
}

pub struct FreshnessCache<K, V> {
    ttl: Duration,
    entries: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
}

impl<K, V> Clone for FreshnessCache<K, V> {
    fn clone(&self) -> Self {
        FreshnessCache {
            ttl: self.ttl,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> FreshnessCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        FreshnessCache {
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the value for `key`, invoking `loader` only when a refresh is
    /// due and none is already running.
    pub async fn get<F, Fut>(&self, key: K, loader: F) -> Result<V, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let lookup = {
            let mut entries = self.entries.lock().await;
            self.lookup(&mut entries, key, loader)
        };
        match lookup {
            Lookup::Ready(value) => Ok(value),
            Lookup::Await(refresh) => refresh.await,
        }
    }

    /// Decide what to serve while holding the table lock. Any entry change is
    /// a wholesale replacement.
    fn lookup<F, Fut>(&self, entries: &mut HashMap<K, CacheEntry<V>>, key: K, loader: F) -> Lookup<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let now = Instant::now();
        let (previous, previous_at) = match entries.get(&key) {
            Some(entry) => {
                let fresh = entry
                    .fetched_at
                    .is_some_and(|at| now.saturating_duration_since(at) <= self.ttl);
                if let (true, Some(value)) = (fresh, &entry.value) {
                    return Lookup::Ready(value.clone());
                }
                if let Some(in_flight) = &entry.in_flight {
                    return match &entry.value {
                        Some(value) => Lookup::Ready(value.clone()),
                        None => Lookup::Await(in_flight.clone()),
                    };
                }
                (entry.value.clone(), entry.fetched_at)
            }
            None => (None, None),
        };

        debug!(?key, stale = previous.is_some(), "Starting cache refresh");
        let refresh = self.spawn_refresh(key.clone(), loader());
        entries.insert(
            key,
            CacheEntry {
                value: previous.clone(),
                fetched_at: previous_at,
                in_flight: Some(refresh.clone()),
            },
        );

        match previous {
            Some(value) => Lookup::Ready(value),
            None => Lookup::Await(refresh),
        }
    }

    /// Run the loader in its own task and write its outcome back. The task
    /// cannot touch the table before the caller holding the lock has recorded
    /// the in-flight entry.
    fn spawn_refresh<Fut>(&self, key: K, load: Fut) -> Refresh<V>
    where
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let handle = tokio::spawn(async move {
            let outcome = load.await;
            let mut entries = entries.lock().await;
            let previous = entries.remove(&key);
            let replacement = match &outcome {
                Ok(value) => CacheEntry {
                    value: Some(value.clone()),
                    fetched_at: Some(Instant::now()),
                    in_flight: None,
                },
                Err(err) => {
                    warn!(?key, "Cache refresh failed, keeping previous value: {:#}", err);
                    let (value, fetched_at) = previous
                        .map(|entry| (entry.value, entry.fetched_at))
                        .unwrap_or((None, None));
                    CacheEntry {
                        value,
                        fetched_at,
                        in_flight: None,
                    }
                }
            };
            entries.insert(key, replacement);
            outcome.map_err(|err| CacheError::Refresh(Arc::new(err)))
        });

        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(CacheError::Aborted(join_err.to_string())),
            }
        }
        .boxed()
        .shared()
    }
}
