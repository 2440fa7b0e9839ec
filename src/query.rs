//! Query bindings: keep the cache populated for one key and expose
//! `{data, error, is_loading, is_refetching}` to consumers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::SyncError;
use crate::key::CacheKey;
use crate::store::{CacheStore, FetchOutcome, FetchTicket};

/// Staleness policy for [`QueryBinding::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Staleness {
    /// Refetch whenever a consumer binds, even if a value is cached.
    #[default]
    AlwaysRefetch,
    /// A cached value never goes stale; fetch only when the key is empty.
    Infinite,
}

/// Snapshot of a binding's observable state.
pub struct QueryState<T> {
    /// Last known good data. Retained across fetch failures so consumers
    /// can show stale data next to an error rather than losing it.
    pub data: Option<Arc<T>>,
    pub error: Option<Arc<SyncError>>,
    /// True only while no cached value exists yet and a fetch is out.
    pub is_loading: bool,
    /// A background refetch of an already-populated key.
    pub is_refetching: bool,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        QueryState {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_refetching: self.is_refetching,
        }
    }
}

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, SyncError>> + Send + Sync>;

pub struct QueryBinding<T> {
    store: Arc<CacheStore>,
    key: CacheKey,
    fetcher: Fetcher<T>,
    staleness: Staleness,
    error: Mutex<Option<Arc<SyncError>>>,
    fetching: AtomicBool,
}

impl<T: Clone + Send + Sync + 'static> QueryBinding<T> {
    pub fn new(
        store: Arc<CacheStore>,
        key: CacheKey,
        staleness: Staleness,
        fetcher: impl Fn() -> BoxFuture<'static, Result<T, SyncError>> + Send + Sync + 'static,
    ) -> Self {
        QueryBinding {
            store,
            key,
            fetcher: Arc::new(fetcher),
            staleness,
            error: Mutex::new(None),
            fetching: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<T> {
        let data = self.store.get::<T>(&self.key);
        let error = self.error.lock().clone();
        let fetching = self.fetching.load(Ordering::SeqCst);
        QueryState {
            is_loading: fetching && data.is_none(),
            is_refetching: fetching && data.is_some(),
            data,
            error,
        }
    }

    /// Make sure the cache holds a reasonably fresh value for this key,
    /// then return the current state.
    pub async fn ensure(&self) -> QueryState<T> {
        if self.staleness == Staleness::Infinite && self.store.get::<T>(&self.key).is_some() {
            return self.state();
        }
        self.refetch().await;
        self.state()
    }

    /// Fetch and store, de-duplicated per key: if another binding is already
    /// fetching this key, wait for its outcome instead of issuing a second
    /// remote call. A follower adopts the leader's outcome, so a failing
    /// fetch is observable on every binding that waited on it.
    ///
    /// A result that arrives after `cancel_pending` superseded the fetch is
    /// not written to the cache. Failures leave prior data intact and are
    /// exposed through [`QueryBinding::state`].
    pub async fn refetch(&self) {
        match self.store.begin_fetch(&self.key) {
            FetchTicket::Follower(mut done) => {
                self.fetching.store(true, Ordering::SeqCst);
                let settled = done.borrow().as_ref().cloned();
                let outcome = match settled {
                    Some(outcome) => Some(outcome),
                    None => {
                        // the leader drops its sender on settle, which also wakes us
                        let _ = done.changed().await;
                        done.borrow().as_ref().cloned()
                    }
                };
                match outcome {
                    Some(FetchOutcome::Stored) => *self.error.lock() = None,
                    Some(FetchOutcome::Failed(e)) => *self.error.lock() = Some(e),
                    Some(FetchOutcome::Superseded) | None => {}
                }
                self.fetching.store(false, Ordering::SeqCst);
            }
            FetchTicket::Leader { epoch, done } => {
                self.fetching.store(true, Ordering::SeqCst);
                let outcome = match (self.fetcher)().await {
                    Ok(value) => {
                        if self.store.complete_fetch(&self.key, epoch, value) {
                            *self.error.lock() = None;
                            FetchOutcome::Stored
                        } else {
                            FetchOutcome::Superseded
                        }
                    }
                    Err(e) => {
                        self.store.abort_fetch(&self.key, epoch);
                        debug!(key = %self.key, error = %e, "fetch failed; keeping last known data");
                        let e = Arc::new(e);
                        *self.error.lock() = Some(e.clone());
                        FetchOutcome::Failed(e)
                    }
                };
                self.fetching.store(false, Ordering::SeqCst);
                let _ = done.send(Some(outcome));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_key;
    use crate::error::Result;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    fn counting_binding(
        store: Arc<CacheStore>,
        key: CacheKey,
        staleness: Staleness,
        calls: Arc<AtomicUsize>,
        result: Result<Vec<i64>>,
    ) -> QueryBinding<Vec<i64>> {
        let result = Mutex::new(Some(result));
        QueryBinding::new(store, key, staleness, move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let out = result
                .lock()
                .take()
                .unwrap_or_else(|| Ok(vec![42]));
            async move { out }.boxed()
        })
    }

    #[tokio::test]
    async fn test_ensure_populates_cache() {
        let store = Arc::new(CacheStore::new());
        let key = cache_key!["k"];
        let calls = Arc::new(AtomicUsize::new(0));
        let binding =
            counting_binding(store.clone(), key.clone(), Staleness::default(), calls, Ok(vec![1, 2]));

        let state = binding.ensure().await;
        assert_eq!(*state.data.unwrap(), vec![1, 2]);
        assert!(state.error.is_none());
        assert!(!state.is_loading);
        assert_eq!(*store.get::<Vec<i64>>(&key).unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_concurrent_ensures_issue_one_call() {
        let store = Arc::new(CacheStore::new());
        let key = cache_key!["k"];
        let calls = Arc::new(AtomicUsize::new(0));

        // a fetcher that stays in flight until released
        let (release_tx, release_rx) = tokio::sync::watch::channel(false);
        let counted = calls.clone();
        let binding = Arc::new(QueryBinding::<Vec<i64>>::new(
            store.clone(),
            key.clone(),
            Staleness::default(),
            move || {
                counted.fetch_add(1, Ordering::SeqCst);
                let mut release = release_rx.clone();
                async move {
                    if !*release.borrow() {
                        let _ = release.changed().await;
                    }
                    Ok(vec![5])
                }
                .boxed()
            },
        ));

        let a = tokio::spawn({
            let binding = binding.clone();
            async move { binding.ensure().await }
        });
        let b = tokio::spawn({
            let binding = binding.clone();
            async move { binding.ensure().await }
        });
        // let both tasks reach the fetch before releasing it
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        let _ = release_tx.send(true);

        let (sa, sb) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*sa.data.unwrap(), vec![5]);
        assert_eq!(*sb.data.unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn test_two_bindings_on_one_key_share_a_fetch() {
        let store = Arc::new(CacheStore::new());
        let key = cache_key!["k"];
        let calls = Arc::new(AtomicUsize::new(0));

        let (release_tx, release_rx) = tokio::sync::watch::channel(false);
        let counted = calls.clone();
        let leader = Arc::new(QueryBinding::<Vec<i64>>::new(
            store.clone(),
            key.clone(),
            Staleness::default(),
            move || {
                counted.fetch_add(1, Ordering::SeqCst);
                let mut release = release_rx.clone();
                async move {
                    if !*release.borrow() {
                        let _ = release.changed().await;
                    }
                    Ok(vec![5])
                }
                .boxed()
            },
        ));
        // a second binding whose fetcher would write different data if it
        // ever ran
        let follower = Arc::new(counting_binding(
            store.clone(),
            key.clone(),
            Staleness::default(),
            calls.clone(),
            Ok(vec![99]),
        ));

        let a = tokio::spawn({
            let leader = leader.clone();
            async move { leader.ensure().await }
        });
        tokio::task::yield_now().await;
        let b = tokio::spawn({
            let follower = follower.clone();
            async move { follower.ensure().await }
        });
        tokio::task::yield_now().await;

        assert!(follower.state().is_loading);
        let _ = release_tx.send(true);

        let (sa, sb) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*sa.data.unwrap(), vec![5]);
        assert_eq!(*sb.data.unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn test_follower_binding_observes_leader_failure() {
        let store = Arc::new(CacheStore::new());
        let key = cache_key!["k"];
        let calls = Arc::new(AtomicUsize::new(0));

        let (release_tx, release_rx) = tokio::sync::watch::channel(false);
        let counted = calls.clone();
        let leader = Arc::new(QueryBinding::<Vec<i64>>::new(
            store.clone(),
            key.clone(),
            Staleness::default(),
            move || {
                counted.fetch_add(1, Ordering::SeqCst);
                let mut release = release_rx.clone();
                async move {
                    if !*release.borrow() {
                        let _ = release.changed().await;
                    }
                    Err(SyncError::Api("backend down".to_string()))
                }
                .boxed()
            },
        ));
        let follower = Arc::new(counting_binding(
            store.clone(),
            key.clone(),
            Staleness::default(),
            calls.clone(),
            Ok(vec![99]),
        ));

        let a = tokio::spawn({
            let leader = leader.clone();
            async move { leader.ensure().await }
        });
        tokio::task::yield_now().await;
        let b = tokio::spawn({
            let follower = follower.clone();
            async move { follower.ensure().await }
        });
        tokio::task::yield_now().await;
        let _ = release_tx.send(true);

        let (sa, sb) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sa.data.is_none());
        assert!(sb.data.is_none());
        assert!(sa.error.unwrap().message().contains("backend down"));
        assert!(sb.error.unwrap().message().contains("backend down"));
        assert!(follower.state().error.is_some());
    }

    #[tokio::test]
    async fn test_failure_keeps_last_known_data() {
        let store = Arc::new(CacheStore::new());
        let key = cache_key!["k"];
        store.set(&key, vec![9i64]);

        let calls = Arc::new(AtomicUsize::new(0));
        let binding = counting_binding(
            store.clone(),
            key.clone(),
            Staleness::default(),
            calls,
            Err(SyncError::Api("server fell over".to_string())),
        );

        let state = binding.ensure().await;
        assert_eq!(*state.data.unwrap(), vec![9]);
        let error = state.error.unwrap();
        assert!(error.message().contains("server fell over"));
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let store = Arc::new(CacheStore::new());
        let key = cache_key!["k"];
        let calls = Arc::new(AtomicUsize::new(0));
        let binding = counting_binding(
            store.clone(),
            key.clone(),
            Staleness::default(),
            calls,
            Err(SyncError::Api("transient".to_string())),
        );

        binding.refetch().await;
        assert!(binding.state().error.is_some());

        // the helper falls back to Ok(vec![42]) on later calls
        binding.refetch().await;
        let state = binding.state();
        assert!(state.error.is_none());
        assert_eq!(*state.data.unwrap(), vec![42]);
    }

    #[tokio::test]
    async fn test_infinite_staleness_skips_refetch() {
        let store = Arc::new(CacheStore::new());
        let key = cache_key!["k"];
        store.set(&key, vec![1i64]);

        let calls = Arc::new(AtomicUsize::new(0));
        let binding = counting_binding(
            store.clone(),
            key.clone(),
            Staleness::Infinite,
            calls.clone(),
            Ok(vec![2]),
        );

        let state = binding.ensure().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(*state.data.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_always_refetch_replaces_cached_value() {
        let store = Arc::new(CacheStore::new());
        let key = cache_key!["k"];
        store.set(&key, vec![1i64]);

        let calls = Arc::new(AtomicUsize::new(0));
        let binding = counting_binding(
            store.clone(),
            key.clone(),
            Staleness::AlwaysRefetch,
            calls.clone(),
            Ok(vec![2]),
        );

        let state = binding.ensure().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*state.data.unwrap(), vec![2]);
    }
}
