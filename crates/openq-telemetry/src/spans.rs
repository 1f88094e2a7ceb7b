//! Span creation helpers for query fetches and mutations

use crate::attributes::*;

/// How a resolver call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx with a body
    Data,
    /// 2xx without a body
    Empty,
    /// The operation answered with an error payload
    ApiError,
    /// The fetch client failed
    FetchError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Data => "data",
            Outcome::Empty => "empty",
            Outcome::ApiError => "api_error",
            Outcome::FetchError => "fetch_error",
        }
    }
}

/// Attributes for tracing one query resolver call
#[derive(Debug, Clone)]
pub struct QuerySpanAttributes {
    pub method: String,
    pub path: String,
    pub query_key: String,
    pub page_param: Option<String>,
    pub status: Option<u16>,
    pub outcome: Outcome,
}

/// Attributes for tracing one mutation resolver call
#[derive(Debug, Clone)]
pub struct MutationSpanAttributes {
    pub method: String,
    pub path: String,
    pub init_json: String,
    pub status: Option<u16>,
    pub outcome: Outcome,
}

/// Record a span for one query resolver call.
///
/// Page params are attached for pages of paginated queries.
pub fn trace_query_fetch(attrs: QuerySpanAttributes) {
    let span = tracing::info_span!(
        "query_fetch",
        { OPENQ_SYSTEM } = SYSTEM_NAME,
        { OPENQ_OPERATION_KIND } = "query",
        { OPENQ_HTTP_METHOD } = %attrs.method,
        { OPENQ_HTTP_PATH } = %attrs.path,
        { OPENQ_QUERY_KEY } = %attrs.query_key,
        { OPENQ_OUTCOME } = attrs.outcome.as_str(),
        { OPENQ_PAGE_PARAM } = tracing::field::Empty,
        { OPENQ_HTTP_STATUS } = tracing::field::Empty,
    );

    if let Some(page_param) = &attrs.page_param {
        span.record(OPENQ_PAGE_PARAM, page_param.as_str());
    }
    if let Some(status) = attrs.status {
        span.record(OPENQ_HTTP_STATUS, status);
    }

    let _guard = span.enter();
}

/// Record a span for one mutation resolver call.
pub fn trace_mutation(attrs: MutationSpanAttributes) {
    let span = tracing::info_span!(
        "mutation",
        { OPENQ_SYSTEM } = SYSTEM_NAME,
        { OPENQ_OPERATION_KIND } = "mutation",
        { OPENQ_HTTP_METHOD } = %attrs.method,
        { OPENQ_HTTP_PATH } = %attrs.path,
        { OPENQ_MUTATION_INIT } = %attrs.init_json,
        { OPENQ_OUTCOME } = attrs.outcome.as_str(),
        { OPENQ_HTTP_STATUS } = tracing::field::Empty,
    );

    if let Some(status) = attrs.status {
        span.record(OPENQ_HTTP_STATUS, status);
    }

    let _guard = span.enter();
}

/// Helper to safely serialize to JSON string
pub fn safe_serialize<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<not serializable>".to_string())
}
