//! Handles onto cached queries.
//!
//! Observers do not push updates; callers read snapshots with `state()` or
//! wait for the running fetch with `settled()`.

use crate::client::{QueryClient, load_pages};
use crate::entry::{ErasedEntry, Planned, QueryEntry, SharedFetch};
use crate::options::{InfiniteQueryOptions, QueryFunctionContext, QueryOptions};
use crate::state::{InfiniteData, QueryState};
use futures::future::{BoxFuture, FutureExt};
use openq_core::{CancellationToken, QueryKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Observes one query.
///
/// Creating an observer fetches the query when it is enabled and its data is
/// stale. Must be created inside a tokio runtime.
pub struct QueryObserver<T, E, S = T> {
    options: QueryOptions<T, E, S>,
    entry: Arc<QueryEntry<T, E>>,
    stale_time: Duration,
}

impl<T, E, S> QueryObserver<T, E, S>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(client: &QueryClient, options: QueryOptions<T, E, S>) -> Self {
        let entry = client.entry::<T, E>(&options.key);
        entry.seed(options.policy.initial_data.clone());
        let stale_time = options
            .policy
            .stale_time
            .unwrap_or(client.defaults().stale_time);

        let observer = Self {
            options,
            entry,
            stale_time,
        };

        if observer.options.policy.enabled && observer.entry.is_stale(stale_time) {
            debug!("Observer fetching stale query {}", observer.key());
            let _ = observer.start_fetch();
        }

        observer
    }

    pub fn key(&self) -> &QueryKey {
        &self.options.key
    }

    /// Current state, with `select` applied to the data.
    pub fn state(&self) -> QueryState<S, E> {
        self.entry
            .state()
            .map_data(|data| (self.options.policy.select)(&data))
    }

    pub fn is_stale(&self) -> bool {
        self.entry.is_stale(self.stale_time)
    }

    /// Fetch now, joining a fetch that is already running.
    pub async fn refetch(&self) -> Result<S, E> {
        let data = self.start_fetch().await?;
        Ok((self.options.policy.select)(&data))
    }

    /// Wait for the running fetch, if any, and return the resulting state.
    pub async fn settled(&self) -> QueryState<S, E> {
        self.entry.wait_idle().await;
        self.state()
    }

    /// Cancel the running fetch. Returns whether there was one.
    pub fn cancel(&self) -> bool {
        self.entry.cancel()
    }

    fn start_fetch(&self) -> SharedFetch<T, E> {
        let query_fn = Arc::clone(&self.options.query_fn);
        let key = self.options.key.clone();
        self.entry.fetch_with(move |signal| {
            query_fn(QueryFunctionContext {
                key,
                signal,
                page_param: None,
            })
        })
    }
}

/// Observes one paginated query.
///
/// `state`, `fetch_next_page` and `refetch` apply the policy's `select` to
/// all loaded pages.
pub struct InfiniteQueryObserver<T, E, S = InfiniteData<T>> {
    options: InfiniteQueryOptions<T, E, S>,
    entry: Arc<QueryEntry<InfiniteData<T>, E>>,
    stale_time: Duration,
}

impl<T, E, S> InfiniteQueryObserver<T, E, S>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    S: 'static,
{
    pub(crate) fn new(client: &QueryClient, options: InfiniteQueryOptions<T, E, S>) -> Self {
        let entry = client.entry::<InfiniteData<T>, E>(&options.key);
        let stale_time = options
            .policy
            .stale_time
            .unwrap_or(client.defaults().stale_time);

        let observer = Self {
            options,
            entry,
            stale_time,
        };

        if observer.options.policy.enabled && observer.entry.is_stale(stale_time) {
            debug!("Observer fetching stale paginated query {}", observer.key());
            let _ = observer.start_refetch();
        }

        observer
    }

    pub fn key(&self) -> &QueryKey {
        &self.options.key
    }

    pub fn state(&self) -> QueryState<S, E> {
        self.entry.state().map_data(|data| self.select(&data))
    }

    pub fn is_stale(&self) -> bool {
        self.entry.is_stale(self.stale_time)
    }

    /// Whether the next page param getter yields a param after the last page.
    pub fn has_next_page(&self) -> bool {
        self.entry.state().data.is_some_and(|data| {
            let last_param = data.last().and_then(|(_, param)| param);
            self.options
                .policy
                .next_page_param(&data.pages, last_param)
                .is_some()
        })
    }

    /// Load the page after the last one and append it.
    ///
    /// Waits for a running fetch first. Without a next page the current data
    /// is returned unchanged; without any data the first pages are loaded.
    pub async fn fetch_next_page(&self) -> Result<S, E> {
        loop {
            let planned = self.entry.fetch_planned(|data, signal| match data {
                Some(current) if !current.is_empty() => self.next_page(current, signal),
                _ => Some(load_pages(self.options.clone(), self.first_page_count(0), signal)),
            });

            match planned {
                Planned::Busy(running) => {
                    let _ = running.await;
                }
                Planned::Started(fetch) => return fetch.await.map(|data| self.select(&data)),
                Planned::Skipped(data) => {
                    debug!("No next page for {}", self.key());
                    return Ok(self.select(&data.unwrap_or_default()));
                }
            }
        }
    }

    /// Reload every page from the initial page param.
    pub async fn refetch(&self) -> Result<S, E> {
        let data = self.start_refetch().await?;
        Ok(self.select(&data))
    }

    pub async fn settled(&self) -> QueryState<S, E> {
        self.entry.wait_idle().await;
        self.state()
    }

    pub fn cancel(&self) -> bool {
        self.entry.cancel()
    }

    fn select(&self, data: &InfiniteData<T>) -> S {
        (self.options.policy.select)(data)
    }

    fn first_page_count(&self, loaded: usize) -> usize {
        loaded.max(self.options.policy.pages.unwrap_or(1)).max(1)
    }

    /// Work loading the page after `current`, or `None` on the last page.
    fn next_page(
        &self,
        current: &InfiniteData<T>,
        signal: CancellationToken,
    ) -> Option<BoxFuture<'static, Result<InfiniteData<T>, E>>> {
        let last_param = current.last().and_then(|(_, param)| param);
        let next = self.options.policy.next_page_param(&current.pages, last_param)?;

        let key = self.options.key.clone();
        let query_fn = Arc::clone(&self.options.query_fn);
        let mut data = current.clone();
        Some(
            async move {
                let page = query_fn(QueryFunctionContext {
                    key,
                    signal,
                    page_param: Some(next.clone()),
                })
                .await?;
                data.push(page, Some(next));
                Ok::<_, E>(data)
            }
            .boxed(),
        )
    }

    fn start_refetch(&self) -> SharedFetch<InfiniteData<T>, E> {
        let loaded = self.entry.state().data.map(|d| d.len()).unwrap_or(0);
        let count = self.first_page_count(loaded);
        let options = self.options.clone();
        self.entry
            .fetch_with(move |signal| load_pages(options, count, signal))
    }
}
