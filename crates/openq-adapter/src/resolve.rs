//! Resolvers: one fetch call per query, page or mutation invocation.
//!
//! A response carrying an error payload fails with [`QueryError::Api`], even
//! when it also carries data. Otherwise the data field is the result; a body
//! of JSON `null` and no body at all are both successes and stay distinct.

use openq_cache::QueryFunctionContext;
use openq_core::{
    CancellationToken, Endpoint, FetchClient, FetchError, FetchInit, FetchResponse, Payload,
    QueryError, QueryKey,
};
use openq_telemetry::{
    MutationSpanAttributes, Outcome, QuerySpanAttributes, safe_serialize, trace_mutation,
    trace_query_fetch,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// `[method, path]` without an init, `[method, path, init]` with one.
pub fn query_key<E: Endpoint>(init: Option<&E::Init>) -> QueryKey {
    QueryKey::operation(E::METHOD, E::PATH, init.map(init_value))
}

/// `[method, path]`; mutation inits vary per invocation and stay out of the key.
pub fn mutation_key<E: Endpoint>() -> QueryKey {
    QueryKey::operation(E::METHOD, E::PATH, None)
}

fn init_value<I: Serialize>(init: &I) -> Value {
    serde_json::to_value(init).unwrap_or_else(|e| {
        // the resolver reports the same failure as an encode error
        warn!("Init does not serialize, keying it as null: {}", e);
        Value::Null
    })
}

fn encode_init<I: Serialize>(init: Option<&I>) -> Result<FetchInit, FetchError> {
    match init {
        Some(init) => FetchInit::from_init(init),
        None => Ok(FetchInit::new()),
    }
}

/// Apply the error rule: an error payload wins over data.
pub fn split_response<Err: DeserializeOwned>(
    response: FetchResponse,
) -> Result<Option<Value>, QueryError<Err>> {
    match response.error {
        Some(error) => Err(decode_error(error)),
        None => Ok(response.data),
    }
}

fn decode_error<Err: DeserializeOwned>(error: Value) -> QueryError<Err> {
    match serde_json::from_value(error) {
        Ok(error) => QueryError::Api(error),
        Err(e) => QueryError::Fetch(FetchError::Decode(format!("error payload: {}", e))),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, FetchError> {
    serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
}

fn outcome(result: &Result<FetchResponse, FetchError>) -> (Outcome, Option<u16>) {
    match result {
        Err(_) => (Outcome::FetchError, None),
        Ok(response) if response.error.is_some() => (Outcome::ApiError, Some(response.status)),
        Ok(response) if response.data.is_none() => (Outcome::Empty, Some(response.status)),
        Ok(response) => (Outcome::Data, Some(response.status)),
    }
}

async fn fetch_traced<C, E>(
    fetch: &C,
    init: FetchInit,
    ctx: &QueryFunctionContext,
) -> Result<FetchResponse, FetchError>
where
    C: FetchClient + ?Sized,
    E: Endpoint,
{
    debug!("Resolving {} {} for {}", E::METHOD.as_upper(), E::PATH, ctx.key);
    let result = fetch
        .fetch(E::METHOD, E::PATH, init, Some(ctx.signal.clone()))
        .await;

    let (outcome, status) = outcome(&result);
    trace_query_fetch(QuerySpanAttributes {
        method: E::METHOD.to_string(),
        path: E::PATH.to_string(),
        query_key: ctx.key.to_string(),
        page_param: ctx.page_param.as_ref().map(Value::to_string),
        status,
        outcome,
    });

    result
}

async fn resolve_payload<C, E>(
    fetch: &C,
    init: FetchInit,
    ctx: &QueryFunctionContext,
) -> Result<Payload<E::Data>, QueryError<E::Error>>
where
    C: FetchClient + ?Sized,
    E: Endpoint,
{
    let response = fetch_traced::<C, E>(fetch, init, ctx).await?;
    let data = split_response::<E::Error>(response)?;
    Ok(data.map(decode::<E::Data>).transpose()?)
}

/// Resolver of a plain query.
pub(crate) async fn resolve_query<C, E>(
    fetch: &C,
    init: Option<E::Init>,
    ctx: QueryFunctionContext,
) -> Result<Payload<E::Data>, QueryError<E::Error>>
where
    C: FetchClient + ?Sized,
    E: Endpoint,
{
    let init = encode_init(init.as_ref())?;
    resolve_payload::<C, E>(fetch, init, &ctx).await
}

/// Resolver of one page: the base init with `page_param_name` set in its
/// query bag. The first page param defaults to `0`.
pub(crate) async fn resolve_page<C, E>(
    fetch: &C,
    init: Option<E::Init>,
    page_param_name: &str,
    ctx: QueryFunctionContext,
) -> Result<Payload<E::Data>, QueryError<E::Error>>
where
    C: FetchClient + ?Sized,
    E: Endpoint,
{
    let base = encode_init(init.as_ref())?;
    let page_param = ctx.page_param.clone().unwrap_or_else(|| Value::from(0));
    let init = base.with_query_param(page_param_name, page_param);
    resolve_payload::<C, E>(fetch, init, &ctx).await
}

/// Resolver of a mutation. A success without a body decodes JSON `null`, so
/// the caller always receives a defined value.
pub(crate) async fn resolve_mutation<C, E>(
    fetch: &C,
    init: E::Init,
    signal: Option<CancellationToken>,
) -> Result<E::Data, QueryError<E::Error>>
where
    C: FetchClient + ?Sized,
    E: Endpoint,
{
    let init_json = safe_serialize(&init);
    let init = FetchInit::from_init(&init)?;

    debug!("Mutating {} {}", E::METHOD.as_upper(), E::PATH);
    let result = fetch.fetch(E::METHOD, E::PATH, init, signal).await;

    let (outcome, status) = outcome(&result);
    trace_mutation(MutationSpanAttributes {
        method: E::METHOD.to_string(),
        path: E::PATH.to_string(),
        init_json,
        status,
        outcome,
    });

    let data = split_response::<E::Error>(result?)?;
    Ok(decode(data.unwrap_or(Value::Null))?)
}
