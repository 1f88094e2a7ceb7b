//! reqwest-backed fetch client.

use crate::auth::apply_to_request;
use crate::catalog::OperationCatalog;
use async_trait::async_trait;
use openq_core::{
    AuthConfig, CancellationToken, ClientConfig, FetchClient, FetchError, FetchInit,
    FetchResponse, HttpMethod,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Fetch client that performs real HTTP calls.
///
/// Each call resolves the path template against the base URL, serializes the
/// init into query string, headers and JSON body, and splits the response into
/// `data` (2xx) or `error` (everything else).
///
/// # Example
///
/// ```no_run
/// use openq_fetch::HttpFetchClient;
/// use openq_core::{AuthConfig, FetchClient, FetchInit, HttpMethod};
///
/// # async fn example() -> Result<(), openq_core::FetchError> {
/// let client = HttpFetchClient::new("https://api.example.com")
///     .with_auth(AuthConfig::bearer("token"));
///
/// let response = client
///     .fetch(
///         HttpMethod::Get,
///         "/blogposts/{post_id}",
///         FetchInit::new().path_param("post_id", "1"),
///         None,
///     )
///     .await?;
/// println!("{:?}", response.data);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpFetchClient {
    base_url: String,
    client: reqwest::Client,
    headers: BTreeMap<String, String>,
    auth: AuthConfig,
    catalog: Option<Arc<OperationCatalog>>,
}

impl HttpFetchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            headers: BTreeMap::new(),
            auth: AuthConfig::None,
            catalog: None,
        }
    }

    /// Build a client from the `[client]` and `[auth]` configuration sections.
    pub fn from_config(config: &ClientConfig, auth: &AuthConfig) -> Result<Self, FetchError> {
        if config.base_url.is_empty() {
            return Err(FetchError::InvalidUrl("client.base_url is not set".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.clone(),
            client,
            headers: config.headers.clone(),
            auth: auth.clone(),
            catalog: None,
        })
    }

    /// Set authentication configuration for every request.
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Send `name: value` with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Validate every request against `catalog` before sending it.
    pub fn with_catalog(mut self, catalog: OperationCatalog) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    /// Use a preconfigured reqwest client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn catalog(&self) -> Option<&OperationCatalog> {
        self.catalog.as_deref()
    }

    /// Resolve `path` against the base URL, filling `{name}` placeholders.
    fn build_url(&self, path: &str, init: &FetchInit) -> Result<Url, FetchError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FetchError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?;
            segments.pop_if_empty();
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                segments.push(&fill_segment(segment, &init.params.path)?);
            }
        }

        Ok(url)
    }

    /// Build an HTTP request from the init.
    fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        init: &FetchInit,
    ) -> Result<reqwest::RequestBuilder, FetchError> {
        let url = self.build_url(path, init)?;
        debug!("Request URL: {} {}", method.as_upper(), url);

        let mut builder = self.client.request(to_reqwest_method(method), url);

        let query = query_pairs(&init.params.query);
        if !query.is_empty() {
            builder = builder.query(&query);
        }

        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        for (name, value) in &init.params.header {
            if let Some(value) = scalar_to_string(value) {
                builder = builder.header(name, value);
            }
        }
        for (name, value) in &init.headers {
            builder = builder.header(name, value);
        }

        let cookies: Vec<String> = init
            .params
            .cookie
            .iter()
            .filter_map(|(name, value)| scalar_to_string(value).map(|v| format!("{}={}", name, v)))
            .collect();
        if !cookies.is_empty() {
            builder = builder.header(reqwest::header::COOKIE, cookies.join("; "));
        }

        if let Some(body) = &init.body {
            builder = builder.json(body);
        }

        Ok(apply_to_request(&self.auth, builder))
    }

    /// Execute the HTTP request and split the response into data or error.
    #[instrument(skip(self, builder, signal))]
    async fn execute_request(
        &self,
        method: HttpMethod,
        builder: reqwest::RequestBuilder,
        signal: Option<CancellationToken>,
    ) -> Result<FetchResponse, FetchError> {
        let response = match signal {
            Some(signal) => tokio::select! {
                biased;
                _ = signal.cancelled() => return Err(FetchError::Aborted),
                response = builder.send() => response,
            },
            None => builder.send().await,
        }
        .map_err(|e| FetchError::Http(e.to_string()))?;

        let status = response.status();
        debug!("Response status: {}", status);

        let no_body = status == reqwest::StatusCode::NO_CONTENT
            || method == HttpMethod::Head
            || response
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .is_some_and(|len| len == "0");

        let body = if no_body {
            None
        } else {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| FetchError::Http(e.to_string()))?;
            if bytes.is_empty() { None } else { Some(bytes) }
        };

        let payload = body.map(|bytes| decode_body(&bytes));
        if status.is_success() {
            Ok(FetchResponse {
                data: payload,
                error: None,
                status: status.as_u16(),
            })
        } else {
            // a failed status always carries an error, even without a body
            Ok(FetchResponse {
                data: None,
                error: Some(payload.unwrap_or(Value::Null)),
                status: status.as_u16(),
            })
        }
    }
}

/// JSON bodies are parsed; anything else is kept as text.
fn decode_body(bytes: &[u8]) -> Value {
    serde_json::from_slice::<Value>(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).to_string()))
}

#[async_trait]
impl FetchClient for HttpFetchClient {
    async fn fetch(
        &self,
        method: HttpMethod,
        path: &str,
        init: FetchInit,
        signal: Option<CancellationToken>,
    ) -> Result<FetchResponse, FetchError> {
        if let Some(catalog) = &self.catalog {
            catalog.validate(method, path, &init)?;
        }

        let builder = self.build_request(method, path, &init)?;
        self.execute_request(method, builder, signal).await
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Trace => reqwest::Method::TRACE,
    }
}

/// Replace every `{name}` in one path segment with its value.
fn fill_segment(segment: &str, values: &Map<String, Value>) -> Result<String, FetchError> {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + len];
        let value = values
            .get(name)
            .and_then(scalar_to_string)
            .ok_or_else(|| FetchError::missing_parameter("path", name))?;

        out.push_str(&rest[..start]);
        out.push_str(&value);
        rest = &rest[start + len + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Flatten the query bag: arrays explode into repeated keys, objects use
/// `key[field]`, nulls are dropped.
fn query_pairs(query: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for (name, value) in query {
        match value {
            Value::Array(items) => {
                pairs.extend(
                    items
                        .iter()
                        .filter_map(scalar_to_string)
                        .map(|v| (name.clone(), v)),
                );
            }
            Value::Object(fields) => {
                for (field, value) in fields {
                    if let Some(v) = scalar_to_string(value) {
                        pairs.push((format!("{}[{}]", name, field), v));
                    }
                }
            }
            other => {
                if let Some(v) = scalar_to_string(other) {
                    pairs.push((name.clone(), v));
                }
            }
        }
    }

    pairs
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
