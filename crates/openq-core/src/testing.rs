//! Shared test utilities
//!
//! [`ScriptedFetchClient`] answers requests from a table of canned replies and
//! records every request it receives, so cache and adapter behavior can be
//! exercised without a network.

use crate::client::FetchClient;
use crate::error::FetchError;
use crate::init::FetchInit;
use crate::method::HttpMethod;
use crate::response::FetchResponse;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type Responder = Arc<dyn Fn(&FetchInit) -> FetchResponse + Send + Sync>;

#[derive(Clone)]
enum Reply {
    Now(Responder),
    After(Duration, Responder),
    Never,
}

struct Route {
    method: HttpMethod,
    path: String,
    reply: Reply,
}

/// A request as the scripted client saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub path: String,
    pub init: FetchInit,
    pub had_signal: bool,
}

/// Fetch client answering from canned replies.
///
/// Routes match on exact `(method, path template)`; the last registered
/// route for a pair wins. Unrouted requests fail with
/// [`FetchError::UnknownOperation`].
#[derive(Clone, Default)]
pub struct ScriptedFetchClient {
    routes: Arc<Mutex<Vec<Route>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ScriptedFetchClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `(method, path)` with `response`.
    pub fn respond(self, method: HttpMethod, path: &str, response: FetchResponse) -> Self {
        self.respond_with(method, path, move |_| response.clone())
    }

    /// Answer `(method, path)` with whatever `responder` builds from the init.
    pub fn respond_with<F>(self, method: HttpMethod, path: &str, responder: F) -> Self
    where
        F: Fn(&FetchInit) -> FetchResponse + Send + Sync + 'static,
    {
        self.route(method, path, Reply::Now(Arc::new(responder)))
    }

    /// Answer `(method, path)` with `response` after `delay`.
    pub fn respond_after(
        self,
        method: HttpMethod,
        path: &str,
        delay: Duration,
        response: FetchResponse,
    ) -> Self {
        self.route(
            method,
            path,
            Reply::After(delay, Arc::new(move |_| response.clone())),
        )
    }

    /// Never answer `(method, path)`; the request only ends when its signal is cancelled.
    pub fn pending(self, method: HttpMethod, path: &str) -> Self {
        self.route(method, path, Reply::Never)
    }

    fn route(self, method: HttpMethod, path: &str, reply: Reply) -> Self {
        self.routes.lock().unwrap().push(Route {
            method,
            path: path.to_string(),
            reply,
        });
        self
    }

    /// All requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl FetchClient for ScriptedFetchClient {
    async fn fetch(
        &self,
        method: HttpMethod,
        path: &str,
        init: FetchInit,
        signal: Option<CancellationToken>,
    ) -> Result<FetchResponse, FetchError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            path: path.to_string(),
            init: init.clone(),
            had_signal: signal.is_some(),
        });

        let reply = {
            let routes = self.routes.lock().unwrap();
            routes
                .iter()
                .rev()
                .find(|r| r.method == method && r.path == path)
                .map(|r| r.reply.clone())
        };

        let signal = signal.unwrap_or_default();
        match reply {
            None => Err(FetchError::unknown_operation(method, path)),
            Some(Reply::Now(responder)) => Ok(responder(&init)),
            Some(Reply::After(delay, responder)) => {
                tokio::select! {
                    _ = signal.cancelled() => Err(FetchError::Aborted),
                    _ = tokio::time::sleep(delay) => Ok(responder(&init)),
                }
            }
            Some(Reply::Never) => {
                signal.cancelled().await;
                Err(FetchError::Aborted)
            }
        }
    }
}
