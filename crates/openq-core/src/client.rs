//! The fetch client contract the query adapter calls into.

use crate::error::FetchError;
use crate::init::FetchInit;
use crate::method::HttpMethod;
use crate::response::FetchResponse;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// An HTTP client that performs one call per `(method, path, init)`.
///
/// Implementations report remote failures through [`FetchResponse::error`] and
/// reserve `Err` for failures of the client itself (transport, encoding,
/// cancellation).
#[async_trait]
pub trait FetchClient: Send + Sync {
    async fn fetch(
        &self,
        method: HttpMethod,
        path: &str,
        init: FetchInit,
        signal: Option<CancellationToken>,
    ) -> Result<FetchResponse, FetchError>;
}

#[async_trait]
impl<T: FetchClient + ?Sized> FetchClient for Arc<T> {
    async fn fetch(
        &self,
        method: HttpMethod,
        path: &str,
        init: FetchInit,
        signal: Option<CancellationToken>,
    ) -> Result<FetchResponse, FetchError> {
        (**self).fetch(method, path, init, signal).await
    }
}
