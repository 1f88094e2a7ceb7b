//! The query client: entry point of the cache.

use crate::entry::{ErasedEntry, QueryEntry};
use crate::mutation::{MutationCache, MutationObserver};
use crate::observer::{InfiniteQueryObserver, QueryObserver};
use crate::options::{
    InfiniteQueryOptions, MutationOptions, QueryDefaults, QueryFunctionContext, QueryOptions,
};
use crate::state::{InfiniteData, QueryState};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use openq_core::{CancellationToken, QueryKey};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

#[derive(Default)]
struct Inner {
    queries: DashMap<QueryKey, Arc<dyn ErasedEntry>>,
    mutations: MutationCache,
    defaults: RwLock<QueryDefaults>,
}

/// In-memory query cache.
///
/// Entries are keyed by [`QueryKey`] and typed by the data and error types of
/// the first query registered under the key. Concurrent fetches of one key
/// share a single request. Cloning the client shares the cache.
///
/// # Example
///
/// ```
/// use openq_cache::{QueryClient, QueryOptions, query_fn};
/// use openq_core::QueryKey;
/// use serde_json::json;
///
/// # async fn example() {
/// let client = QueryClient::new();
/// let key = QueryKey::new(vec![json!("get"), json!("/string-array")]);
/// let options = QueryOptions::new(
///     key.clone(),
///     query_fn(|_ctx| async { Ok::<_, String>(vec!["a".to_string()]) }),
/// );
///
/// let data = client.fetch_query(options).await.unwrap();
/// assert_eq!(client.get_query_data::<Vec<String>, String>(&key), Some(data));
/// # }
/// ```
#[derive(Clone, Default)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: QueryDefaults) -> Self {
        Self {
            inner: Arc::new(Inner {
                defaults: RwLock::new(defaults),
                ..Default::default()
            }),
        }
    }

    pub fn defaults(&self) -> QueryDefaults {
        self.inner.defaults.read().unwrap().clone()
    }

    /// Replace the defaults for every handle onto this cache. Queries already
    /// observed keep the stale time they were created with.
    pub fn set_defaults(&self, defaults: QueryDefaults) {
        *self.inner.defaults.write().unwrap() = defaults;
    }

    /// Entry under `key`, created on first use.
    ///
    /// An entry of another type under the same key is replaced.
    pub(crate) fn entry<T, E>(&self, key: &QueryKey) -> Arc<QueryEntry<T, E>>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let mut slot = self
            .inner
            .queries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(QueryEntry::<T, E>::new(key.clone())) as Arc<dyn ErasedEntry>);

        match Arc::clone(slot.value()).into_any().downcast::<QueryEntry<T, E>>() {
            Ok(entry) => entry,
            Err(_) => {
                warn!("Replacing entry of a different type under {}", key);
                slot.value().cancel();
                let entry = Arc::new(QueryEntry::<T, E>::new(key.clone()));
                *slot.value_mut() = entry.clone() as Arc<dyn ErasedEntry>;
                entry
            }
        }
    }

    fn find<T, E>(&self, key: &QueryKey) -> Option<Arc<QueryEntry<T, E>>>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let entry = Arc::clone(self.inner.queries.get(key)?.value());
        entry.into_any().downcast::<QueryEntry<T, E>>().ok()
    }

    /// Resolve a query: cached data while fresh, otherwise a fetch.
    ///
    /// The raw data is returned; `select` only applies to observers.
    pub async fn fetch_query<T, E, S>(&self, options: QueryOptions<T, E, S>) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let entry = self.entry::<T, E>(&options.key);
        entry.seed(options.policy.initial_data.clone());

        let stale_time = options.policy.stale_time.unwrap_or(self.defaults().stale_time);
        if let Some(data) = entry.fresh_data(stale_time) {
            debug!("Serving fresh data for {}", options.key);
            return Ok(data);
        }

        let QueryOptions { key, query_fn, .. } = options;
        entry
            .fetch_with(move |signal| {
                query_fn(QueryFunctionContext {
                    key,
                    signal,
                    page_param: None,
                })
            })
            .await
    }

    /// Populate the cache. Failures are stored in the entry, never returned.
    pub async fn prefetch_query<T, E, S>(&self, options: QueryOptions<T, E, S>)
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let key = options.key.clone();
        if self.fetch_query(options).await.is_err() {
            debug!("Prefetch of {} failed", key);
        }
    }

    /// Resolve a paginated query, loading `policy.pages` pages (at least one)
    /// or as many as are already cached, whichever is more.
    pub async fn fetch_infinite_query<T, E, S>(
        &self,
        options: InfiniteQueryOptions<T, E, S>,
    ) -> Result<InfiniteData<T>, E>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        S: 'static,
    {
        let entry = self.entry::<InfiniteData<T>, E>(&options.key);

        let stale_time = options.policy.stale_time.unwrap_or(self.defaults().stale_time);
        if let Some(data) = entry.fresh_data(stale_time) {
            debug!("Serving fresh pages for {}", options.key);
            return Ok(data);
        }

        let loaded = entry.state().data.map(|d| d.len()).unwrap_or(0);
        let count = loaded.max(options.policy.pages.unwrap_or(1)).max(1);
        entry
            .fetch_with(move |signal| load_pages(options, count, signal))
            .await
    }

    pub async fn prefetch_infinite_query<T, E, S>(&self, options: InfiniteQueryOptions<T, E, S>)
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        S: 'static,
    {
        let key = options.key.clone();
        if self.fetch_infinite_query(options).await.is_err() {
            debug!("Prefetch of {} failed", key);
        }
    }

    /// Register a query observer.
    pub fn observe<T, E, S>(&self, options: QueryOptions<T, E, S>) -> QueryObserver<T, E, S>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        QueryObserver::new(self, options)
    }

    /// Register a paginated query observer.
    pub fn observe_infinite<T, E, S>(
        &self,
        options: InfiniteQueryOptions<T, E, S>,
    ) -> InfiniteQueryObserver<T, E, S>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        S: 'static,
    {
        InfiniteQueryObserver::new(self, options)
    }

    /// Register a mutation observer.
    pub fn mutation<V, T, E>(&self, options: MutationOptions<V, T, E>) -> MutationObserver<V, T, E>
    where
        V: Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        MutationObserver::new(options, self.inner.mutations.clone())
    }

    pub fn get_query_data<T, E>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        self.find::<T, E>(key)?.state().data
    }

    pub fn get_query_state<T, E>(&self, key: &QueryKey) -> Option<QueryState<T, E>>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        Some(self.find::<T, E>(key)?.state())
    }

    /// Store `data` under `key` as freshly fetched.
    pub fn set_query_data<T, E>(&self, key: &QueryKey, data: T)
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        self.entry::<T, E>(key).set_data(data);
    }

    /// Number of queries with a fetch running.
    pub fn is_fetching(&self) -> usize {
        self.inner
            .queries
            .iter()
            .filter(|entry| entry.value().is_fetching())
            .count()
    }

    /// Remove queries whose key starts with `filter`, or all of them.
    /// Running fetches are cancelled. Returns the number removed.
    pub fn remove_queries(&self, filter: Option<&QueryKey>) -> usize {
        let before = self.inner.queries.len();
        self.inner.queries.retain(|key, entry| {
            if matches_filter(key, filter) {
                entry.cancel();
                false
            } else {
                true
            }
        });
        let removed = before.saturating_sub(self.inner.queries.len());
        debug!("Removed {} queries", removed);
        removed
    }

    /// Mark matching queries stale so the next fetch goes to the network.
    pub fn invalidate_queries(&self, filter: Option<&QueryKey>) -> usize {
        let mut invalidated = 0;
        for entry in self.inner.queries.iter() {
            if matches_filter(entry.key(), filter) {
                entry.value().invalidate();
                invalidated += 1;
            }
        }
        invalidated
    }

    /// Cancel running fetches of matching queries. Returns how many were running.
    pub fn cancel_queries(&self, filter: Option<&QueryKey>) -> usize {
        let mut cancelled = 0;
        for entry in self.inner.queries.iter() {
            if matches_filter(entry.key(), filter) && entry.value().cancel() {
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn mutation_cache(&self) -> &MutationCache {
        &self.inner.mutations
    }

    pub fn query_count(&self) -> usize {
        self.inner.queries.len()
    }
}

fn matches_filter(key: &QueryKey, filter: Option<&QueryKey>) -> bool {
    filter.is_none_or(|prefix| key.starts_with(prefix))
}

/// Load `count` pages starting at the initial page param, stopping early when
/// there is no next page.
pub(crate) fn load_pages<T, E, S>(
    options: InfiniteQueryOptions<T, E, S>,
    count: usize,
    signal: CancellationToken,
) -> BoxFuture<'static, Result<InfiniteData<T>, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    S: 'static,
{
    async move {
        let mut data = InfiniteData::default();
        let mut param = Some(options.policy.initial_page_param.clone());

        while data.len() < count {
            let Some(page_param) = param.take() else {
                break;
            };
            let page = (options.query_fn)(QueryFunctionContext {
                key: options.key.clone(),
                signal: signal.clone(),
                page_param: Some(page_param.clone()),
            })
            .await?;
            data.push(page, Some(page_param));

            let last_param = data.page_params.last().and_then(Option::as_ref);
            param = options.policy.next_page_param(&data.pages, last_param);
        }

        Ok::<_, E>(data)
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{InfinitePolicy, QueryPolicy, query_fn};
    use crate::state::QueryStatus;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key(path: &str) -> QueryKey {
        QueryKey::new(vec![json!("get"), json!(path)])
    }

    fn counting(
        calls: &Arc<AtomicUsize>,
        delay: Duration,
    ) -> crate::options::QueryFn<usize, String> {
        let calls = Arc::clone(calls);
        query_fn(move |_ctx| {
            let calls = Arc::clone(&calls);
            async move {
                tokio::time::sleep(delay).await;
                Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
            }
        })
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_request() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new(key("/a"), counting(&calls, Duration::from_millis(30)));

        let first = client.fetch_query(options.clone());
        let second = client.fetch_query(options.clone());
        let (a, b) = tokio::join!(first, second);

        assert_eq!(a, Ok(1));
        assert_eq!(b, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.is_fetching(), 0);
    }

    #[tokio::test]
    async fn test_is_fetching_counts_running_queries() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let observer = client.observe(QueryOptions::new(
            key("/slow"),
            counting(&calls, Duration::from_millis(30)),
        ));

        assert_eq!(client.is_fetching(), 1);
        let state = observer.settled().await;
        assert_eq!(state.data, Some(1));
        assert_eq!(client.is_fetching(), 0);
    }

    #[tokio::test]
    async fn test_fresh_data_is_served_from_cache() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new(key("/a"), counting(&calls, Duration::ZERO))
            .with_policy(QueryPolicy::new().stale_time(Duration::from_secs(60)));

        assert_eq!(client.fetch_query(options.clone()).await, Ok(1));
        assert_eq!(client.fetch_query(options.clone()).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        client.invalidate_queries(Some(&key("/a")));
        assert_eq!(client.fetch_query(options).await, Ok(2));
    }

    #[tokio::test]
    async fn test_stale_data_is_refetched() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new(key("/a"), counting(&calls, Duration::ZERO));

        assert_eq!(client.fetch_query(options.clone()).await, Ok(1));
        assert_eq!(client.fetch_query(options).await, Ok(2));
    }

    #[tokio::test]
    async fn test_failed_prefetch_is_stored() {
        let client = QueryClient::new();
        let options: QueryOptions<Value, String> = QueryOptions::new(
            key("/broken"),
            query_fn(|_ctx| async { Err("Something went wrong".to_string()) }),
        );

        client.prefetch_query(options).await;

        let state = client
            .get_query_state::<Value, String>(&key("/broken"))
            .unwrap();
        assert_eq!(state.status, QueryStatus::Error);
        assert_eq!(state.error.as_deref(), Some("Something went wrong"));
        assert_eq!(state.data, None);
    }

    #[tokio::test]
    async fn test_initial_data_and_select() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new(key("/a"), counting(&calls, Duration::ZERO)).with_policy(
            QueryPolicy::new()
                .initial_data(10)
                .stale_time(Duration::from_secs(60))
                .select(|n: &usize| n * 100),
        );

        let observer = client.observe(options);
        assert_eq!(observer.state().data, Some(1000));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.get_query_data::<usize, String>(&key("/a")), Some(10));
    }

    #[tokio::test]
    async fn test_disabled_observer_does_not_fetch() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new(key("/a"), counting(&calls, Duration::ZERO))
            .with_policy(QueryPolicy::new().enabled(false));

        let observer = client.observe(options);
        assert!(observer.state().is_pending());
        assert_eq!(client.is_fetching(), 0);

        assert_eq!(observer.refetch().await, Ok(1));
    }

    #[tokio::test]
    async fn test_remove_queries_cancels_fetch() {
        let client = QueryClient::new();
        let options: QueryOptions<Value, String> = QueryOptions::new(
            key("/pending"),
            query_fn(|ctx: QueryFunctionContext| async move {
                ctx.signal.cancelled().await;
                Err("aborted".to_string())
            }),
        );

        let observer = client.observe(options);
        assert_eq!(client.is_fetching(), 1);

        assert_eq!(client.remove_queries(None), 1);
        assert_eq!(client.query_count(), 0);

        let state = observer.settled().await;
        assert!(state.is_pending());
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_partial_key_filters() {
        let client = QueryClient::new();
        client.set_query_data::<u32, String>(&key("/a"), 1);
        client.set_query_data::<u32, String>(&key("/b"), 2);
        client.set_query_data::<u32, String>(&QueryKey::new(vec![json!("post"), json!("/a")]), 3);

        let gets = QueryKey::new(vec![json!("get")]);
        assert_eq!(client.invalidate_queries(Some(&gets)), 2);
        assert_eq!(client.remove_queries(Some(&gets)), 2);
        assert_eq!(client.query_count(), 1);
    }

    fn paged(
        requested: &Arc<std::sync::Mutex<Vec<Value>>>,
    ) -> InfiniteQueryOptions<Value, String> {
        let requested = Arc::clone(requested);
        InfiniteQueryOptions::new(
            key("/paginated"),
            query_fn(move |ctx: QueryFunctionContext| {
                let requested = Arc::clone(&requested);
                async move {
                    let cursor = ctx.page_param.unwrap_or(Value::Null);
                    requested.lock().unwrap().push(cursor.clone());
                    let n = cursor.as_u64().unwrap_or(0);
                    let next = if n < 2 { json!(n + 1) } else { Value::Null };
                    Ok(json!({"items": [n], "nextPage": next}))
                }
            }),
        )
        .with_policy(InfinitePolicy::new().get_next_page_param(|last: &Value, _, _| {
            last.get("nextPage").filter(|v| !v.is_null()).cloned()
        }))
    }

    #[tokio::test]
    async fn test_infinite_query_pages() {
        let client = QueryClient::new();
        let requested = Arc::new(std::sync::Mutex::new(Vec::new()));
        let observer = client.observe_infinite(paged(&requested));

        let state = observer.settled().await;
        let data = state.data.unwrap();
        assert_eq!(data.pages, vec![json!({"items": [0], "nextPage": 1})]);
        assert_eq!(data.page_params, vec![Some(json!(0))]);
        assert!(observer.has_next_page());

        let data = observer.fetch_next_page().await.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.page_params[1], Some(json!(1)));

        let data = observer.fetch_next_page().await.unwrap();
        assert_eq!(data.len(), 3);
        assert!(!observer.has_next_page());

        // nothing left to load
        let data = observer.fetch_next_page().await.unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(*requested.lock().unwrap(), vec![json!(0), json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_concurrent_next_pages_load_one_page_each() {
        let client = QueryClient::new();
        let requested = Arc::new(std::sync::Mutex::new(Vec::new()));
        let observer = client.observe_infinite(paged(&requested));
        observer.settled().await;

        let (a, b) = tokio::join!(observer.fetch_next_page(), observer.fetch_next_page());
        let mut lens = vec![a.unwrap().len(), b.unwrap().len()];
        lens.sort();

        assert_eq!(lens, vec![2, 3]);
        assert_eq!(*requested.lock().unwrap(), vec![json!(0), json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_next_page_waits_for_running_refetch() {
        let client = QueryClient::new();
        let requested = Arc::new(std::sync::Mutex::new(Vec::new()));
        let observer = client.observe_infinite(paged(&requested));

        // the initial fetch is still running
        let data = observer.fetch_next_page().await.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.page_params, vec![Some(json!(0)), Some(json!(1))]);
    }

    #[tokio::test]
    async fn test_infinite_select_applies_to_observer() {
        let client = QueryClient::new();
        let requested = Arc::new(std::sync::Mutex::new(Vec::new()));
        let options = paged(&requested);
        let policy = options.policy.clone().select(|data: &InfiniteData<Value>| {
            data.pages
                .iter()
                .filter_map(|page| page["items"][0].as_u64())
                .collect::<Vec<_>>()
        });
        let observer = client.observe_infinite(options.with_policy(policy));

        assert_eq!(observer.settled().await.data, Some(vec![0]));
        assert_eq!(observer.fetch_next_page().await, Ok(vec![0, 1]));

        // the cache keeps the raw pages
        let raw = client
            .get_query_data::<InfiniteData<Value>, String>(&key("/paginated"))
            .unwrap();
        assert_eq!(raw.len(), 2);
    }

    #[tokio::test]
    async fn test_select_may_change_the_data_type() {
        let client = QueryClient::new();
        let options: QueryOptions<Vec<String>, String> = QueryOptions::new(
            key("/strings"),
            query_fn(|_ctx| async { Ok(vec!["a".to_string(), "b".to_string()]) }),
        );
        let policy = QueryPolicy::new().select(|items: &Vec<String>| items.len());
        let observer = client.observe(options.with_policy(policy));

        assert_eq!(observer.settled().await.data, Some(2));
        assert_eq!(observer.refetch().await, Ok(2));
    }

    #[test]
    fn test_set_defaults_is_shared_by_handles() {
        let client = QueryClient::new();
        let other = client.clone();
        other.set_defaults(QueryDefaults {
            stale_time: Duration::from_secs(5),
        });
        assert_eq!(client.defaults().stale_time, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_prefetch_infinite_query_loads_pages() {
        let client = QueryClient::new();
        let requested = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut options = paged(&requested);
        options.policy.pages = Some(2);

        client.prefetch_infinite_query(options).await;

        let data = client
            .get_query_data::<InfiniteData<Value>, String>(&key("/paginated"))
            .unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(*requested.lock().unwrap(), vec![json!(0), json!(1)]);
    }
}
