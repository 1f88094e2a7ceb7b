//! # openq query cache
//!
//! A small in-memory query cache: results are stored per [`QueryKey`](openq_core::QueryKey),
//! concurrent fetches of one key are deduplicated, and data is served from
//! the cache while younger than its stale time.
//!
//! The cache knows nothing about HTTP. Queries hand it a key and an async
//! function; the function receives a [`QueryFunctionContext`] carrying a
//! cancellation signal and, for paginated queries, the page param.
//!
//! There is no retry, no garbage collection and no push notification of
//! observers. Entries live until [`QueryClient::remove_queries`].

pub mod client;
pub mod mutation;
pub mod observer;
pub mod options;
pub mod state;

mod entry;

pub use client::QueryClient;
pub use mutation::{MutationCache, MutationObserver, MutationRecord};
pub use observer::{InfiniteQueryObserver, QueryObserver};
pub use options::{
    InfinitePolicy, InfiniteQueryOptions, MutationFn, MutationOptions, MutationPolicy,
    NextPageParamFn, QueryDefaults, QueryFn, QueryFunctionContext, QueryOptions, QueryPolicy,
    SelectFn, query_fn,
};
pub use state::{
    FetchStatus, InfiniteData, MutationState, MutationStatus, QueryState, QueryStatus,
};
