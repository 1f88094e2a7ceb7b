//! # openq adapter
//!
//! Derives query keys, query functions and mutation functions from typed
//! OpenAPI operations, so they are never written by hand.
//!
//! An operation is declared once as an [`Endpoint`](openq_core::Endpoint)
//! (see [`openq_core::endpoint!`]); [`OpenapiQueryClient`] then builds cache
//! configuration for it:
//!
//! - plain queries keyed `[method, path]` or `[method, path, init]`
//! - paginated queries whose pages share the key of the base init and get
//!   their page param in the query bag (`cursor` by default)
//! - mutations keyed `[method, path]`, receiving the init per invocation
//! - prefetching of plain and paginated queries
//!
//! A response with an error payload fails the query with
//! [`QueryError::Api`](openq_core::QueryError::Api) carrying that payload;
//! failures of the fetch client come through as
//! [`QueryError::Fetch`](openq_core::QueryError::Fetch).
//!
//! ## Example
//!
//! ```no_run
//! use openq_adapter::{InfiniteOptions, OpenapiQueryClient};
//! use openq_core::{FetchInit, OpenqConfig, endpoint};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Clone, Deserialize)]
//! pub struct Page { pub items: Vec<u32>, #[serde(rename = "nextPage")] pub next_page: Option<u32> }
//!
//! endpoint!(pub GetPosts: Get "/paginated-posts" (FetchInit) => Page, serde_json::Value);
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = OpenqConfig::load()?;
//! let client = OpenapiQueryClient::from_config(&config)?;
//!
//! let posts = client.create_infinite_query::<GetPosts, _>(
//!     FetchInit::new(),
//!     InfiniteOptions::new().get_next_page_param(|page: &Page, _| page.next_page.map(Into::into)),
//!     None,
//! );
//! posts.settled().await;
//! posts.fetch_next_page().await.ok();
//! # Ok(())
//! # }
//! ```

mod client;
mod options;
mod resolve;

pub use client::{
    EndpointInfiniteQueryOptions, EndpointMutationOptions, EndpointMutationPolicy,
    EndpointQueryOptions, OpenapiQueryClient,
};
pub use options::{DEFAULT_PAGE_PARAM_NAME, InfiniteOptions};
pub use resolve::{mutation_key, query_key, split_response};
