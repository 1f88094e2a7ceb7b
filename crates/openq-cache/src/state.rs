//! Snapshots of query and mutation state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Whether a query has produced a result yet, and which kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    /// No result yet
    Pending,
    Success,
    Error,
}

/// Whether a request for the query is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Idle,
    Fetching,
}

/// State of one cached query.
///
/// A failed fetch keeps the data of the last successful one; a successful
/// fetch clears the error.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T, E> {
    pub data: Option<T>,
    pub error: Option<E>,
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    pub data_updated_at: Option<DateTime<Utc>>,
    pub error_updated_at: Option<DateTime<Utc>>,
    pub is_invalidated: bool,
}

impl<T, E> Default for QueryState<T, E> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            status: QueryStatus::Pending,
            fetch_status: FetchStatus::Idle,
            data_updated_at: None,
            error_updated_at: None,
            is_invalidated: false,
        }
    }
}

impl<T, E> QueryState<T, E> {
    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching
    }

    /// Data older than `stale_time`, invalidated, or missing counts as stale.
    pub fn is_stale(&self, stale_time: Duration) -> bool {
        if self.is_invalidated {
            return true;
        }
        match self.data_updated_at {
            None => true,
            Some(updated) => {
                let age = Utc::now().signed_duration_since(updated);
                age.to_std().map(|age| age >= stale_time).unwrap_or(false)
            }
        }
    }

    pub(crate) fn succeed(&mut self, data: T) {
        self.data = Some(data);
        self.error = None;
        self.status = QueryStatus::Success;
        self.data_updated_at = Some(Utc::now());
        self.is_invalidated = false;
    }

    pub(crate) fn fail(&mut self, error: E) {
        self.error = Some(error);
        self.status = QueryStatus::Error;
        self.error_updated_at = Some(Utc::now());
    }

    /// Same state with `f` applied to the data.
    pub fn map_data<U>(self, f: impl FnOnce(T) -> U) -> QueryState<U, E> {
        QueryState {
            data: self.data.map(f),
            error: self.error,
            status: self.status,
            fetch_status: self.fetch_status,
            data_updated_at: self.data_updated_at,
            error_updated_at: self.error_updated_at,
            is_invalidated: self.is_invalidated,
        }
    }
}

/// Pages of a paginated query, in fetch order, with the page param each was fetched with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfiniteData<T> {
    pub pages: Vec<T>,
    pub page_params: Vec<Option<Value>>,
}

impl<T> Default for InfiniteData<T> {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            page_params: Vec::new(),
        }
    }
}

impl<T> InfiniteData<T> {
    pub fn push(&mut self, page: T, page_param: Option<Value>) {
        self.pages.push(page);
        self.page_params.push(page_param);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn last(&self) -> Option<(&T, Option<&Value>)> {
        let page = self.pages.last()?;
        let param = self.page_params.last().and_then(Option::as_ref);
        Some((page, param))
    }
}

/// Lifecycle of one mutation invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// State of a mutation observer: the most recent invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationState<V, T, E> {
    pub status: MutationStatus,
    pub variables: Option<V>,
    pub data: Option<T>,
    pub error: Option<E>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl<V, T, E> Default for MutationState<V, T, E> {
    fn default() -> Self {
        Self {
            status: MutationStatus::Idle,
            variables: None,
            data: None,
            error: None,
            submitted_at: None,
        }
    }
}

impl<V, T, E> MutationState<V, T, E> {
    pub fn is_idle(&self) -> bool {
        self.status == MutationStatus::Idle
    }

    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == MutationStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == MutationStatus::Error
    }
}
