//! Configuration handed to the cache for one query, paginated query or mutation.

use crate::state::InfiniteData;
use futures::future::{BoxFuture, FutureExt};
use openq_core::{CancellationToken, QueryConfig, QueryKey};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// What a query function receives for one invocation.
#[derive(Debug, Clone)]
pub struct QueryFunctionContext {
    pub key: QueryKey,
    /// Cancelled when the cache abandons the fetch
    pub signal: CancellationToken,
    /// Set for pages of a paginated query
    pub page_param: Option<Value>,
}

pub type QueryFn<T, E> =
    Arc<dyn Fn(QueryFunctionContext) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Maps cached data to what observers see.
pub type SelectFn<T, S = T> = Arc<dyn Fn(&T) -> S + Send + Sync>;

/// `(last page, all pages, last page param)` to the next page param, `None` when done.
pub type NextPageParamFn<T> = Arc<dyn Fn(&T, &[T], Option<&Value>) -> Option<Value> + Send + Sync>;

pub type MutationFn<V, T, E> = Arc<dyn Fn(V) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Wrap an async closure as a [`QueryFn`].
pub fn query_fn<T, E, F, Fut>(f: F) -> QueryFn<T, E>
where
    F: Fn(QueryFunctionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// Client wide defaults, overridable per query.
#[derive(Debug, Clone, Default)]
pub struct QueryDefaults {
    pub stale_time: Duration,
}

impl From<&QueryConfig> for QueryDefaults {
    fn from(config: &QueryConfig) -> Self {
        Self {
            stale_time: Duration::from_millis(config.stale_time_ms),
        }
    }
}

/// Caching policy of one query. Passed through the adapter untouched.
///
/// `S` is the type observers see once `select` has been applied; without a
/// `select` it is the cached type itself.
pub struct QueryPolicy<T, S = T> {
    /// Overrides [`QueryDefaults::stale_time`]
    pub stale_time: Option<Duration>,
    /// Observers of a disabled query never fetch on their own
    pub enabled: bool,
    /// Seeds an entry that has no data yet
    pub initial_data: Option<T>,
    /// Applied to the data observers see; the cache keeps the raw value
    pub select: SelectFn<T, S>,
}

impl<T, S> Clone for QueryPolicy<T, S>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            stale_time: self.stale_time,
            enabled: self.enabled,
            initial_data: self.initial_data.clone(),
            select: Arc::clone(&self.select),
        }
    }
}

impl<T> Default for QueryPolicy<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self {
            stale_time: None,
            enabled: true,
            initial_data: None,
            select: Arc::new(T::clone),
        }
    }
}

impl<T> QueryPolicy<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T, S> QueryPolicy<T, S> {
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn initial_data(mut self, data: T) -> Self {
        self.initial_data = Some(data);
        self
    }

    /// Replace the selection; observers then see `U`.
    pub fn select<U, F>(self, select: F) -> QueryPolicy<T, U>
    where
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        QueryPolicy {
            stale_time: self.stale_time,
            enabled: self.enabled,
            initial_data: self.initial_data,
            select: Arc::new(select),
        }
    }
}

impl<T, S> std::fmt::Debug for QueryPolicy<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPolicy")
            .field("stale_time", &self.stale_time)
            .field("enabled", &self.enabled)
            .field("initial_data", &self.initial_data.is_some())
            .finish_non_exhaustive()
    }
}

/// A cache key plus the function that loads it.
pub struct QueryOptions<T, E, S = T> {
    pub key: QueryKey,
    pub query_fn: QueryFn<T, E>,
    pub policy: QueryPolicy<T, S>,
}

impl<T: Clone, E, S> Clone for QueryOptions<T, E, S> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            query_fn: Arc::clone(&self.query_fn),
            policy: self.policy.clone(),
        }
    }
}

impl<T, E> QueryOptions<T, E>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(key: QueryKey, query_fn: QueryFn<T, E>) -> Self {
        Self {
            key,
            query_fn,
            policy: QueryPolicy::default(),
        }
    }
}

impl<T, E, S> QueryOptions<T, E, S> {
    pub fn with_policy<U>(self, policy: QueryPolicy<T, U>) -> QueryOptions<T, E, U> {
        QueryOptions {
            key: self.key,
            query_fn: self.query_fn,
            policy,
        }
    }
}

/// Pagination policy of one paginated query.
///
/// `S` is what observers see of the pages once `select` has been applied.
pub struct InfinitePolicy<T, S = InfiniteData<T>> {
    /// Page param of the first page
    pub initial_page_param: Value,
    /// Without one, a paginated query has a single page
    pub get_next_page_param: Option<NextPageParamFn<T>>,
    /// Pages to load up front; only prefetch and the first fetch look at it
    pub pages: Option<usize>,
    pub stale_time: Option<Duration>,
    pub enabled: bool,
    pub select: SelectFn<InfiniteData<T>, S>,
}

impl<T, S> Clone for InfinitePolicy<T, S> {
    fn clone(&self) -> Self {
        Self {
            initial_page_param: self.initial_page_param.clone(),
            get_next_page_param: self.get_next_page_param.clone(),
            pages: self.pages,
            stale_time: self.stale_time,
            enabled: self.enabled,
            select: Arc::clone(&self.select),
        }
    }
}

impl<T> Default for InfinitePolicy<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self {
            initial_page_param: Value::from(0),
            get_next_page_param: None,
            pages: None,
            stale_time: None,
            enabled: true,
            select: Arc::new(InfiniteData::clone),
        }
    }
}

impl<T> InfinitePolicy<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T, S> InfinitePolicy<T, S> {
    pub fn initial_page_param(mut self, param: impl Into<Value>) -> Self {
        self.initial_page_param = param.into();
        self
    }

    pub fn get_next_page_param<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &[T], Option<&Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.get_next_page_param = Some(Arc::new(f));
        self
    }

    pub fn pages(mut self, pages: usize) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Replace the selection over all loaded pages; observers then see `U`.
    pub fn select<U, F>(self, select: F) -> InfinitePolicy<T, U>
    where
        F: Fn(&InfiniteData<T>) -> U + Send + Sync + 'static,
    {
        InfinitePolicy {
            initial_page_param: self.initial_page_param,
            get_next_page_param: self.get_next_page_param,
            pages: self.pages,
            stale_time: self.stale_time,
            enabled: self.enabled,
            select: Arc::new(select),
        }
    }

    /// Next page param after `pages`, if there is one.
    pub fn next_page_param(&self, pages: &[T], last_param: Option<&Value>) -> Option<Value> {
        let getter = self.get_next_page_param.as_ref()?;
        let last = pages.last()?;
        getter(last, pages, last_param)
    }
}

/// Configuration of a paginated query.
pub struct InfiniteQueryOptions<T, E, S = InfiniteData<T>> {
    pub key: QueryKey,
    pub query_fn: QueryFn<T, E>,
    pub policy: InfinitePolicy<T, S>,
}

impl<T, E, S> Clone for InfiniteQueryOptions<T, E, S> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            query_fn: Arc::clone(&self.query_fn),
            policy: self.policy.clone(),
        }
    }
}

impl<T, E> InfiniteQueryOptions<T, E>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(key: QueryKey, query_fn: QueryFn<T, E>) -> Self {
        Self {
            key,
            query_fn,
            policy: InfinitePolicy::default(),
        }
    }
}

impl<T, E, S> InfiniteQueryOptions<T, E, S> {
    pub fn with_policy<U>(self, policy: InfinitePolicy<T, U>) -> InfiniteQueryOptions<T, E, U> {
        InfiniteQueryOptions {
            key: self.key,
            query_fn: self.query_fn,
            policy,
        }
    }
}

type SuccessCallback<V, T> = Arc<dyn Fn(&T, &V) + Send + Sync>;
type ErrorCallback<V, E> = Arc<dyn Fn(&E, &V) + Send + Sync>;

/// Callbacks of a mutation. Passed through the adapter untouched.
pub struct MutationPolicy<V, T, E> {
    /// Called with the data and the variables of a successful invocation
    pub on_success: Option<SuccessCallback<V, T>>,
    pub on_error: Option<ErrorCallback<V, E>>,
}

impl<V, T, E> Clone for MutationPolicy<V, T, E> {
    fn clone(&self) -> Self {
        Self {
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<V, T, E> Default for MutationPolicy<V, T, E> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }
}

impl<V, T, E> MutationPolicy<V, T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &V) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&E, &V) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }
}

/// Configuration of a mutation. The variables arrive at invocation time.
pub struct MutationOptions<V, T, E> {
    pub key: QueryKey,
    pub mutation_fn: MutationFn<V, T, E>,
    pub policy: MutationPolicy<V, T, E>,
}

impl<V, T, E> Clone for MutationOptions<V, T, E> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            mutation_fn: Arc::clone(&self.mutation_fn),
            policy: self.policy.clone(),
        }
    }
}

impl<V, T, E> MutationOptions<V, T, E> {
    pub fn new<F, Fut>(key: QueryKey, f: F) -> Self
    where
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            key,
            mutation_fn: Arc::new(move |vars| f(vars).boxed()),
            policy: MutationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MutationPolicy<V, T, E>) -> Self {
        self.policy = policy;
        self
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &V) + Send + Sync + 'static,
    {
        self.policy = self.policy.on_success(f);
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&E, &V) + Send + Sync + 'static,
    {
        self.policy = self.policy.on_error(f);
        self
    }
}
