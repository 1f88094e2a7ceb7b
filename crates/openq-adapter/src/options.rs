//! Options for paginated queries.

use openq_cache::{InfiniteData, InfinitePolicy};
use openq_core::Payload;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_PAGE_PARAM_NAME: &str = "cursor";

/// Pagination settings for one paginated query.
///
/// `page_param_name` is the query parameter each page's param is written
/// into; left unset, the client's default (`cursor` unless configured) is
/// used. The rest is handed to the cache as is; `S` is what observers see
/// once [`select`](Self::select) has been applied to the loaded pages.
pub struct InfiniteOptions<T, S = InfiniteData<Payload<T>>> {
    pub page_param_name: Option<String>,
    pub policy: InfinitePolicy<Payload<T>, S>,
}

impl<T, S> Clone for InfiniteOptions<T, S> {
    fn clone(&self) -> Self {
        Self {
            page_param_name: self.page_param_name.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<T> Default for InfiniteOptions<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self {
            page_param_name: None,
            policy: InfinitePolicy::default(),
        }
    }
}

impl<T> InfiniteOptions<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: 'static, S> InfiniteOptions<T, S> {
    pub fn page_param_name(mut self, name: impl Into<String>) -> Self {
        self.page_param_name = Some(name.into());
        self
    }

    pub fn initial_page_param(mut self, param: impl Into<Value>) -> Self {
        self.policy = self.policy.initial_page_param(param);
        self
    }

    /// Next page param from the last page and its param; `None` ends pagination.
    ///
    /// Pages that came back without a body end pagination too.
    pub fn get_next_page_param<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, Option<&Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.policy = self
            .policy
            .get_next_page_param(move |last: &Payload<T>, _, param| {
                last.as_ref().and_then(|page| f(page, param))
            });
        self
    }

    pub fn pages(mut self, pages: usize) -> Self {
        self.policy = self.policy.pages(pages);
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.policy = self.policy.stale_time(stale_time);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.policy = self.policy.enabled(enabled);
        self
    }

    /// Transform all loaded pages before observers see them.
    pub fn select<U, F>(self, select: F) -> InfiniteOptions<T, U>
    where
        F: Fn(&InfiniteData<Payload<T>>) -> U + Send + Sync + 'static,
    {
        InfiniteOptions {
            page_param_name: self.page_param_name,
            policy: self.policy.select(select),
        }
    }

    pub fn with_policy<U>(self, policy: InfinitePolicy<Payload<T>, U>) -> InfiniteOptions<T, U> {
        InfiniteOptions {
            page_param_name: self.page_param_name,
            policy,
        }
    }
}
