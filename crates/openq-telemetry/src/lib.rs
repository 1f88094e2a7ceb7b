//! # openq telemetry
//!
//! Tracing setup and span helpers for query fetches and mutations.
//!
//! [`init_telemetry`] installs a `tracing` subscriber with a fmt layer and an
//! OpenTelemetry layer; exporters are attached with [`register_span_processor`]
//! beforehand.

mod spans;
mod tracer;

pub use spans::{
    MutationSpanAttributes, Outcome, QuerySpanAttributes, safe_serialize, trace_mutation,
    trace_query_fetch,
};
pub use tracer::{
    ProcessorBuilder, init_telemetry, init_telemetry_with, register_span_processor,
    tracer_provider,
};

/// OpenTelemetry span attribute constants.
pub mod attributes {
    pub const OPENQ_SYSTEM: &str = "openq.system";
    pub const OPENQ_OPERATION_KIND: &str = "openq.operation.kind";
    pub const OPENQ_OUTCOME: &str = "openq.outcome";

    // Operation identity
    pub const OPENQ_HTTP_METHOD: &str = "openq.http.method";
    pub const OPENQ_HTTP_PATH: &str = "openq.http.path";
    pub const OPENQ_HTTP_STATUS: &str = "openq.http.status";

    // Cache attributes
    pub const OPENQ_QUERY_KEY: &str = "openq.query.key";
    pub const OPENQ_PAGE_PARAM: &str = "openq.query.page_param";
    pub const OPENQ_MUTATION_INIT: &str = "openq.mutation.init";

    pub const SYSTEM_NAME: &str = "openq";
}
