//! Core traits and types for openq
//!
//! This crate provides the vocabulary shared by the fetch client, the query
//! cache and the adapter between them: HTTP methods, request inits, responses,
//! query keys, typed endpoints and errors.

pub mod auth;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod init;
pub mod key;
pub mod method;
pub mod response;
pub mod testing;

// Re-exports
pub use auth::{AuthConfig, AuthLocation};
pub use client::FetchClient;
pub use config::{ClientConfig, ObservabilityConfig, OpenqConfig, QueryConfig};
pub use endpoint::{Endpoint, NoRequiredParams, Payload};
pub use error::{Error, FetchError, QueryError, Result};
pub use init::{FetchInit, Params};
pub use key::{QueryKey, canonical_json};
pub use method::HttpMethod;
pub use response::FetchResponse;

pub use tokio_util::sync::CancellationToken;
