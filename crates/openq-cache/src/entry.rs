//! One cached query: its state and the fetch currently running for it.

use crate::state::{FetchStatus, QueryState};
use futures::future::{BoxFuture, FutureExt, Shared};
use openq_core::{CancellationToken, QueryKey};
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::debug;

pub(crate) type SharedFetch<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Type-independent view of an entry, for key-wide operations.
pub(crate) trait ErasedEntry: Send + Sync {
    fn is_fetching(&self) -> bool;
    fn cancel(&self) -> bool;
    fn invalidate(&self);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Outcome of [`QueryEntry::fetch_planned`].
pub(crate) enum Planned<T, E> {
    /// Another fetch was running; nothing was planned
    Busy(SharedFetch<T, E>),
    Started(SharedFetch<T, E>),
    /// Nothing to fetch; carries the data the plan saw
    Skipped(Option<T>),
}

struct InFlight<T, E> {
    id: u64,
    future: SharedFetch<T, E>,
    signal: CancellationToken,
}

/// Lock order is `in_flight` before `state`.
pub(crate) struct QueryEntry<T, E> {
    key: QueryKey,
    state: RwLock<QueryState<T, E>>,
    in_flight: Mutex<Option<InFlight<T, E>>>,
    next_fetch_id: AtomicU64,
}

impl<T, E> QueryEntry<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(key: QueryKey) -> Self {
        Self {
            key,
            state: RwLock::new(QueryState::default()),
            in_flight: Mutex::new(None),
            next_fetch_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> QueryState<T, E> {
        self.state.read().unwrap().clone()
    }

    /// Store `data` as if it had been fetched just now.
    pub(crate) fn set_data(&self, data: T) {
        self.state.write().unwrap().succeed(data);
    }

    /// Seed an entry that has never held data.
    pub(crate) fn seed(&self, data: Option<T>) {
        let Some(data) = data else {
            return;
        };
        let mut state = self.state.write().unwrap();
        if state.data.is_none() && state.is_pending() {
            state.succeed(data);
        }
    }

    /// Cached data, if present and younger than `stale_time`.
    pub(crate) fn fresh_data(&self, stale_time: Duration) -> Option<T> {
        let state = self.state.read().unwrap();
        if state.is_stale(stale_time) {
            None
        } else {
            state.data.clone()
        }
    }

    pub(crate) fn is_stale(&self, stale_time: Duration) -> bool {
        self.state.read().unwrap().is_stale(stale_time)
    }

    pub(crate) fn current_fetch(&self) -> Option<SharedFetch<T, E>> {
        self.in_flight
            .lock()
            .unwrap()
            .as_ref()
            .map(|f| f.future.clone())
    }

    /// Wait until no fetch is running for this entry.
    pub(crate) async fn wait_idle(&self) {
        while let Some(fetch) = self.current_fetch() {
            let _ = fetch.await;
        }
    }

    /// Join the running fetch, or start one built by `work`.
    ///
    /// The fetch is spawned so it settles into the entry even when every
    /// caller drops its handle.
    pub(crate) fn fetch_with<F>(self: &Arc<Self>, work: F) -> SharedFetch<T, E>
    where
        F: FnOnce(CancellationToken) -> BoxFuture<'static, Result<T, E>>,
    {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(current) = in_flight.as_ref() {
            debug!("Joining in-flight fetch for {}", self.key);
            return current.future.clone();
        }

        let signal = CancellationToken::new();
        let work = work(signal.clone());
        self.start(&mut in_flight, signal, work)
    }

    /// Start a fetch planned from the current data, unless one is running.
    ///
    /// `plan` runs under the in-flight lock, so no other fetch can start
    /// between reading the data and starting the planned one. It returns
    /// `None` when there is nothing to fetch.
    pub(crate) fn fetch_planned<P>(self: &Arc<Self>, plan: P) -> Planned<T, E>
    where
        P: FnOnce(Option<&T>, CancellationToken) -> Option<BoxFuture<'static, Result<T, E>>>,
    {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(current) = in_flight.as_ref() {
            return Planned::Busy(current.future.clone());
        }

        let data = self.state.read().unwrap().data.clone();
        let signal = CancellationToken::new();
        match plan(data.as_ref(), signal.clone()) {
            Some(work) => Planned::Started(self.start(&mut in_flight, signal, work)),
            None => Planned::Skipped(data),
        }
    }

    fn start(
        self: &Arc<Self>,
        in_flight: &mut Option<InFlight<T, E>>,
        signal: CancellationToken,
        work: BoxFuture<'static, Result<T, E>>,
    ) -> SharedFetch<T, E> {
        let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);

        let entry = Arc::clone(self);
        let fetch_signal = signal.clone();
        let future = async move {
            let result = work.await;
            entry.settle(id, &fetch_signal, &result);
            result
        }
        .boxed()
        .shared();

        self.state.write().unwrap().fetch_status = FetchStatus::Fetching;
        *in_flight = Some(InFlight {
            id,
            future: future.clone(),
            signal,
        });

        debug!("Started fetch {} for {}", id, self.key);
        tokio::spawn(future.clone());
        future
    }

    fn settle(&self, id: u64, signal: &CancellationToken, result: &Result<T, E>) {
        let mut in_flight = self.in_flight.lock().unwrap();
        let current = in_flight.as_ref().is_some_and(|f| f.id == id);
        let mut state = self.state.write().unwrap();

        // a cancelled fetch leaves the state as it was
        if !signal.is_cancelled() {
            match result {
                Ok(data) => state.succeed(data.clone()),
                Err(error) => state.fail(error.clone()),
            }
        }

        if current {
            state.fetch_status = FetchStatus::Idle;
            *in_flight = None;
        }
    }
}

impl<T, E> ErasedEntry for QueryEntry<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn is_fetching(&self) -> bool {
        self.in_flight.lock().unwrap().is_some()
    }

    fn cancel(&self) -> bool {
        let mut in_flight = self.in_flight.lock().unwrap();
        match in_flight.take() {
            Some(fetch) => {
                fetch.signal.cancel();
                self.state.write().unwrap().fetch_status = FetchStatus::Idle;
                debug!("Cancelled fetch {} for {}", fetch.id, self.key);
                true
            }
            None => false,
        }
    }

    fn invalidate(&self) {
        self.state.write().unwrap().is_invalidated = true;
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
