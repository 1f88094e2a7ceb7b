//! The query adapter: typed endpoints in, cache configuration out.

use crate::options::{DEFAULT_PAGE_PARAM_NAME, InfiniteOptions};
use crate::resolve::{mutation_key, query_key, resolve_mutation, resolve_page, resolve_query};
use openq_cache::{
    InfiniteData, InfiniteQueryObserver, InfiniteQueryOptions, MutationObserver, MutationOptions,
    MutationPolicy, QueryClient, QueryDefaults, QueryFunctionContext, QueryObserver, QueryOptions,
    QueryPolicy, query_fn,
};
use openq_core::{
    Endpoint, FetchClient, FetchError, NoRequiredParams, OpenqConfig, Payload, QueryConfig,
    QueryError,
};
use openq_fetch::HttpFetchClient;
use std::sync::Arc;
use tracing::debug;

/// Query options of endpoint `E`, observed as `S`.
pub type EndpointQueryOptions<E, S = Payload<<E as Endpoint>::Data>> =
    QueryOptions<Payload<<E as Endpoint>::Data>, QueryError<<E as Endpoint>::Error>, S>;

/// Paginated query options of endpoint `E`, observed as `S`.
pub type EndpointInfiniteQueryOptions<E, S = InfiniteData<Payload<<E as Endpoint>::Data>>> =
    InfiniteQueryOptions<Payload<<E as Endpoint>::Data>, QueryError<<E as Endpoint>::Error>, S>;

/// Callbacks of a mutation of endpoint `E`.
pub type EndpointMutationPolicy<E> = MutationPolicy<
    <E as Endpoint>::Init,
    <E as Endpoint>::Data,
    QueryError<<E as Endpoint>::Error>,
>;

/// Mutation options of endpoint `E`.
pub type EndpointMutationOptions<E> = MutationOptions<
    <E as Endpoint>::Init,
    <E as Endpoint>::Data,
    QueryError<<E as Endpoint>::Error>,
>;

/// Binds a fetch client to a query cache.
///
/// Every builder derives the cache key from the endpoint's method and path
/// and the init as passed: leaving the init out (`*_without_init`, only for
/// endpoints with no required parameters) gives `[method, path]`, passing one
/// gives `[method, path, init]` even when it is empty.
///
/// Policies are passed through to the cache untouched. A policy with a
/// `select` changes what observers see, which is why the query builders take
/// the observed type as a second parameter; it is always inferred (`_`).
///
/// Builders hold no state; everything persistent lives in the cache.
///
/// # Example
///
/// ```no_run
/// use openq_adapter::OpenapiQueryClient;
/// use openq_cache::QueryPolicy;
/// use openq_core::endpoint;
/// use openq_fetch::HttpFetchClient;
///
/// endpoint!(pub GetStringArray: Get "/string-array" => Vec<String>, serde_json::Value);
///
/// # async fn example() {
/// let client = OpenapiQueryClient::new(HttpFetchClient::new("https://api.example.com"));
/// let query = client.create_query_without_init::<GetStringArray, _>(QueryPolicy::new(), None);
///
/// let state = query.settled().await;
/// println!("{:?}", state.data);
/// # }
/// ```
pub struct OpenapiQueryClient<C> {
    fetch: Arc<C>,
    cache: QueryClient,
    page_param_name: String,
}

impl<C> Clone for OpenapiQueryClient<C> {
    fn clone(&self) -> Self {
        Self {
            fetch: Arc::clone(&self.fetch),
            cache: self.cache.clone(),
            page_param_name: self.page_param_name.clone(),
        }
    }
}

impl OpenapiQueryClient<HttpFetchClient> {
    /// Build an HTTP backed client from a loaded configuration.
    pub fn from_config(config: &OpenqConfig) -> Result<Self, FetchError> {
        let fetch = HttpFetchClient::from_config(&config.client, &config.auth)?;
        Ok(Self::new(fetch).with_query_config(&config.query))
    }
}

impl<C> OpenapiQueryClient<C>
where
    C: FetchClient + 'static,
{
    /// Wrap `fetch` with a fresh default cache.
    pub fn new(fetch: C) -> Self {
        Self::from_arc(Arc::new(fetch))
    }

    pub fn from_arc(fetch: Arc<C>) -> Self {
        Self {
            fetch,
            cache: QueryClient::new(),
            page_param_name: DEFAULT_PAGE_PARAM_NAME.to_string(),
        }
    }

    /// Use `cache` as the default cache.
    pub fn with_cache(mut self, cache: QueryClient) -> Self {
        self.cache = cache;
        self
    }

    /// Apply the `[query]` configuration: stale time and default page param name.
    ///
    /// The stale time is set on the current cache, which keeps its entries.
    pub fn with_query_config(mut self, config: &QueryConfig) -> Self {
        self.cache.set_defaults(QueryDefaults::from(config));
        self.page_param_name = config.page_param_name.clone();
        self
    }

    /// Page param name used when a paginated query does not name one.
    pub fn with_page_param_name(mut self, name: impl Into<String>) -> Self {
        self.page_param_name = name.into();
        self
    }

    pub fn fetch_client(&self) -> &C {
        &self.fetch
    }

    /// The default cache.
    pub fn cache(&self) -> &QueryClient {
        &self.cache
    }

    fn cache_or_default<'a>(&'a self, cache: Option<&'a QueryClient>) -> &'a QueryClient {
        cache.unwrap_or(&self.cache)
    }

    fn build_query_options<E: Endpoint, S>(
        &self,
        init: Option<E::Init>,
        policy: QueryPolicy<Payload<E::Data>, S>,
    ) -> EndpointQueryOptions<E, S> {
        let key = query_key::<E>(init.as_ref());
        debug!("Built query options for {}", key);

        let fetch = Arc::clone(&self.fetch);
        let resolver = query_fn(move |ctx: QueryFunctionContext| {
            let fetch = Arc::clone(&fetch);
            let init = init.clone();
            async move { resolve_query::<C, E>(fetch.as_ref(), init, ctx).await }
        });

        QueryOptions::new(key, resolver).with_policy(policy)
    }

    /// Query options for `E` called with `init`.
    pub fn query_options<E: Endpoint, S>(
        &self,
        init: E::Init,
        policy: QueryPolicy<Payload<E::Data>, S>,
    ) -> EndpointQueryOptions<E, S> {
        self.build_query_options::<E, S>(Some(init), policy)
    }

    /// Query options for `E` called without an init.
    pub fn query_options_without_init<E: NoRequiredParams, S>(
        &self,
        policy: QueryPolicy<Payload<E::Data>, S>,
    ) -> EndpointQueryOptions<E, S> {
        self.build_query_options::<E, S>(None, policy)
    }

    /// Register a query for `E` with `cache`, or the default cache.
    pub fn create_query<E: Endpoint, S>(
        &self,
        init: E::Init,
        policy: QueryPolicy<Payload<E::Data>, S>,
        cache: Option<&QueryClient>,
    ) -> QueryObserver<Payload<E::Data>, QueryError<E::Error>, S> {
        let options = self.query_options::<E, S>(init, policy);
        self.cache_or_default(cache).observe(options)
    }

    pub fn create_query_without_init<E: NoRequiredParams, S>(
        &self,
        policy: QueryPolicy<Payload<E::Data>, S>,
        cache: Option<&QueryClient>,
    ) -> QueryObserver<Payload<E::Data>, QueryError<E::Error>, S> {
        let options = self.query_options_without_init::<E, S>(policy);
        self.cache_or_default(cache).observe(options)
    }

    /// Paginated query options for `E`.
    ///
    /// The key comes from the base `init`; each page is requested with the
    /// page param written into the query bag under the page param name.
    pub fn infinite_query_options<E: Endpoint, S>(
        &self,
        init: E::Init,
        options: InfiniteOptions<E::Data, S>,
    ) -> EndpointInfiniteQueryOptions<E, S> {
        let key = query_key::<E>(Some(&init));
        let page_param_name = options
            .page_param_name
            .unwrap_or_else(|| self.page_param_name.clone());
        debug!("Built paginated query options for {} ({})", key, page_param_name);

        let fetch = Arc::clone(&self.fetch);
        let init = Some(init);
        let resolver = query_fn(move |ctx: QueryFunctionContext| {
            let fetch = Arc::clone(&fetch);
            let init = init.clone();
            let page_param_name = page_param_name.clone();
            async move { resolve_page::<C, E>(fetch.as_ref(), init, &page_param_name, ctx).await }
        });

        InfiniteQueryOptions::new(key, resolver).with_policy(options.policy)
    }

    /// Register a paginated query for `E` with `cache`, or the default cache.
    pub fn create_infinite_query<E: Endpoint, S: 'static>(
        &self,
        init: E::Init,
        options: InfiniteOptions<E::Data, S>,
        cache: Option<&QueryClient>,
    ) -> InfiniteQueryObserver<Payload<E::Data>, QueryError<E::Error>, S> {
        let options = self.infinite_query_options::<E, S>(init, options);
        self.cache_or_default(cache).observe_infinite(options)
    }

    /// Mutation options for `E`; the init is supplied per invocation.
    ///
    /// The callbacks of `policy` are kept; key and mutation function are
    /// always the ones derived from `E`.
    pub fn mutation_options<E: Endpoint>(
        &self,
        policy: EndpointMutationPolicy<E>,
    ) -> EndpointMutationOptions<E> {
        let fetch = Arc::clone(&self.fetch);
        MutationOptions::new(mutation_key::<E>(), move |init: E::Init| {
            let fetch = Arc::clone(&fetch);
            async move { resolve_mutation::<C, E>(fetch.as_ref(), init, None).await }
        })
        .with_policy(policy)
    }

    /// Register a mutation for `E` with `cache`, or the default cache.
    pub fn create_mutation<E: Endpoint>(
        &self,
        policy: EndpointMutationPolicy<E>,
        cache: Option<&QueryClient>,
    ) -> MutationObserver<E::Init, E::Data, QueryError<E::Error>> {
        let options = self.mutation_options::<E>(policy);
        self.cache_or_default(cache).mutation(options)
    }

    /// Populate `cache` with `E` called with `init`. Failures end up in the
    /// cache entry only.
    pub async fn prefetch_query<E: Endpoint>(
        &self,
        cache: &QueryClient,
        init: E::Init,
        policy: QueryPolicy<Payload<E::Data>>,
    ) {
        cache.prefetch_query(self.query_options::<E, _>(init, policy)).await
    }

    pub async fn prefetch_query_without_init<E: NoRequiredParams>(
        &self,
        cache: &QueryClient,
        policy: QueryPolicy<Payload<E::Data>>,
    ) {
        cache
            .prefetch_query(self.query_options_without_init::<E, _>(policy))
            .await
    }

    /// Populate `cache` with the first `options.pages` pages (at least one).
    pub async fn prefetch_infinite_query<E: Endpoint>(
        &self,
        cache: &QueryClient,
        init: E::Init,
        options: InfiniteOptions<E::Data>,
    ) {
        cache
            .prefetch_infinite_query(self.infinite_query_options::<E, _>(init, options))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use openq_core::testing::ScriptedFetchClient;
    use openq_core::{
        CancellationToken, FetchInit, FetchResponse, HttpMethod, QueryKey, endpoint,
    };
    use serde::{Deserialize, Serialize};
    use serde_json::{Value, json};
    use std::time::Duration;

    mock! {
        pub Fetch {}

        #[async_trait]
        impl FetchClient for Fetch {
            async fn fetch(
                &self,
                method: HttpMethod,
                path: &str,
                init: FetchInit,
                signal: Option<CancellationToken>,
            ) -> Result<FetchResponse, FetchError>;
        }
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct ApiError {
        code: u16,
        message: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Post {
        title: String,
        body: String,
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Page {
        items: Vec<u32>,
        #[serde(rename = "nextPage")]
        next_page: Option<u32>,
    }

    endpoint!(GetStringArray: Get "/string-array" => Vec<String>, ApiError);
    endpoint!(GetNull: Get "/null" => Value, ApiError);
    endpoint!(GetEmpty: Get "/empty" => Value, ApiError);
    endpoint!(GetBlogpost: Get "/blogposts/{post_id}" (FetchInit) => Post, ApiError);
    endpoint!(GetPosts: Get "/paginated-posts" (FetchInit) => Page, ApiError);
    endpoint!(CreatePost: Post "/blogposts" (FetchInit) => Value, ApiError);
    endpoint!(DeletePost: Delete "/blogposts/{post_id}" (FetchInit) => (), ApiError);

    #[test]
    fn test_query_keys_follow_call_shape() {
        let client = OpenapiQueryClient::new(ScriptedFetchClient::new());

        let without = client.query_options_without_init::<GetStringArray, _>(QueryPolicy::new());
        let with_empty =
            client.query_options::<GetStringArray, _>(FetchInit::new(), QueryPolicy::new());

        assert_eq!(without.key.len(), 2);
        assert_eq!(with_empty.key.len(), 3);

        let mutation = client.mutation_options::<CreatePost>(MutationPolicy::new());
        assert_eq!(
            mutation.key,
            QueryKey::new(vec![json!("post"), json!("/blogposts")])
        );
    }

    #[test]
    fn test_policy_passes_through() {
        let client = OpenapiQueryClient::new(ScriptedFetchClient::new());
        let options = client.query_options_without_init::<GetStringArray, _>(
            QueryPolicy::new()
                .stale_time(Duration::from_secs(5))
                .enabled(false),
        );
        assert_eq!(options.policy.stale_time, Some(Duration::from_secs(5)));
        assert!(!options.policy.enabled);
    }

    #[tokio::test]
    async fn test_resolver_dispatches_and_forwards_signal() {
        let mut fetch = MockFetch::new();
        fetch
            .expect_fetch()
            .withf(|method, path, init, signal| {
                *method == HttpMethod::Get
                    && path.to_string() == "/blogposts/{post_id}"
                    && init.params.path.get("post_id") == Some(&json!("1"))
                    && signal.is_some()
            })
            .times(1)
            .returning(|_, _, _, _| {
                Ok(FetchResponse::data(json!({"title": "title", "body": "body"})))
            });

        let client = OpenapiQueryClient::new(fetch);
        let options = client.query_options::<GetBlogpost, _>(
            FetchInit::new().path_param("post_id", "1"),
            QueryPolicy::new(),
        );

        let data = client.cache().fetch_query(options).await.unwrap();
        assert_eq!(
            data,
            Some(Post {
                title: "title".to_string(),
                body: "body".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_error_payload_surfaces_unchanged() {
        let mut fetch = MockFetch::new();
        fetch.expect_fetch().returning(|_, _, _, _| {
            Ok(FetchResponse::error(
                500,
                json!({"code": 500, "message": "Something went wrong"}),
            ))
        });

        let client = OpenapiQueryClient::new(fetch);
        let query = client.create_query_without_init::<GetStringArray, _>(QueryPolicy::new(), None);
        let state = query.settled().await;

        assert!(state.is_error());
        let error = state.error.unwrap();
        assert_eq!(
            error.api(),
            Some(&ApiError {
                code: 500,
                message: "Something went wrong".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_error_wins_when_both_fields_are_set() {
        let mut fetch = MockFetch::new();
        fetch.expect_fetch().returning(|_, _, _, _| {
            Ok(FetchResponse {
                data: Some(json!(["a"])),
                error: Some(json!({"code": 409, "message": "conflict"})),
                status: 409,
            })
        });

        let client = OpenapiQueryClient::new(fetch);
        let result = client
            .cache()
            .fetch_query(client.query_options_without_init::<GetStringArray, _>(QueryPolicy::new()))
            .await;
        assert_eq!(result.unwrap_err().api().map(|e| e.code), Some(409));
    }

    #[tokio::test]
    async fn test_fetch_failures_pass_through() {
        let mut fetch = MockFetch::new();
        fetch
            .expect_fetch()
            .returning(|_, _, _, _| Err(FetchError::Http("connection refused".to_string())));

        let client = OpenapiQueryClient::new(fetch);
        let result = client
            .cache()
            .fetch_query(client.query_options_without_init::<GetStringArray, _>(QueryPolicy::new()))
            .await;
        assert_eq!(
            result.unwrap_err(),
            QueryError::Fetch(FetchError::Http("connection refused".to_string()))
        );
    }

    #[tokio::test]
    async fn test_null_data_is_success() {
        let fetch = ScriptedFetchClient::new().respond(
            HttpMethod::Get,
            "/null",
            FetchResponse::data(Value::Null),
        );
        let client = OpenapiQueryClient::new(fetch);

        let state = client
            .create_query_without_init::<GetNull, _>(QueryPolicy::new(), None)
            .settled()
            .await;

        assert!(state.is_success());
        assert_eq!(state.data, Some(Some(Value::Null)));
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_absent_data_is_success() {
        let fetch =
            ScriptedFetchClient::new().respond(HttpMethod::Get, "/empty", FetchResponse::empty());
        let client = OpenapiQueryClient::new(fetch);

        let state = client
            .create_query_without_init::<GetEmpty, _>(QueryPolicy::new(), None)
            .settled()
            .await;

        assert!(state.is_success());
        assert_eq!(state.data, Some(None));
        assert_eq!(state.error, None);
    }

    fn paginated(page_param_name: &'static str) -> ScriptedFetchClient {
        ScriptedFetchClient::new().respond_with(HttpMethod::Get, "/paginated-posts", move |init| {
            match init.params.query.get(page_param_name).and_then(Value::as_u64) {
                Some(0) => FetchResponse::data(json!({"items": [1, 2, 3], "nextPage": 1})),
                Some(1) => FetchResponse::data(json!({"items": [4, 5, 6], "nextPage": 2})),
                _ => FetchResponse::error(400, json!({"code": 400, "message": "bad page"})),
            }
        })
    }

    fn next_page() -> InfiniteOptions<Page> {
        InfiniteOptions::new().get_next_page_param(|page: &Page, _| page.next_page.map(Value::from))
    }

    #[tokio::test]
    async fn test_infinite_query_pages() {
        let fetch = paginated("cursor");
        let client = OpenapiQueryClient::new(fetch.clone());

        let query = client.create_infinite_query::<GetPosts, _>(
            FetchInit::new().query_param("limit", 3),
            next_page(),
            None,
        );
        query.settled().await;
        let data = query.fetch_next_page().await.unwrap();

        assert_eq!(
            data.pages,
            vec![
                Some(Page { items: vec![1, 2, 3], next_page: Some(1) }),
                Some(Page { items: vec![4, 5, 6], next_page: Some(2) }),
            ]
        );

        let requests = fetch.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].init.params.query.get("cursor"), Some(&json!(1)));
        assert_eq!(requests[1].init.params.query.get("limit"), Some(&json!(3)));

        // the key keeps the base init
        assert_eq!(query.key().init(), Some(&json!({"params": {"query": {"limit": 3}}})));
    }

    #[tokio::test]
    async fn test_infinite_query_custom_page_param_name() {
        let fetch = paginated("page");
        let client = OpenapiQueryClient::new(fetch.clone());

        let query = client.create_infinite_query::<GetPosts, _>(
            FetchInit::new(),
            next_page().page_param_name("page"),
            None,
        );
        query.settled().await;
        query.fetch_next_page().await.unwrap();

        let requests = fetch.requests();
        assert_eq!(requests[0].init.params.query.get("page"), Some(&json!(0)));
        assert_eq!(requests[1].init.params.query.get("page"), Some(&json!(1)));
        assert!(requests[1].init.params.query.get("cursor").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_mutations_do_not_share_an_entry() {
        let fetch = ScriptedFetchClient::new().respond_after(
            HttpMethod::Post,
            "/blogposts",
            Duration::from_millis(10),
            FetchResponse::data(json!({"status": "ok"})),
        );
        let client = OpenapiQueryClient::new(fetch.clone());

        let first = client.create_mutation::<CreatePost>(MutationPolicy::new(), None);
        let second = client.create_mutation::<CreatePost>(MutationPolicy::new(), None);
        let body = json!({"title": "title", "body": "body"});

        let (a, b) = tokio::join!(
            first.mutate(FetchInit::new().body(body.clone())),
            second.mutate(FetchInit::new().body(body.clone())),
        );
        assert_eq!(a.unwrap(), json!({"status": "ok"}));
        assert_eq!(b.unwrap(), json!({"status": "ok"}));

        let records = client
            .cache()
            .mutation_cache()
            .find_all(&mutation_key::<CreatePost>());
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].id, records[1].id);
        assert_eq!(fetch.request_count(), 2);
    }

    #[tokio::test]
    async fn test_mutation_without_body_is_defined() {
        let fetch = ScriptedFetchClient::new().respond(
            HttpMethod::Delete,
            "/blogposts/{post_id}",
            FetchResponse::empty(),
        );
        let client = OpenapiQueryClient::new(fetch);

        let mutation = client.create_mutation::<DeletePost>(MutationPolicy::new(), None);
        let result = mutation
            .mutate(FetchInit::new().path_param("post_id", "1"))
            .await;

        assert_eq!(result, Ok(()));
        assert!(mutation.state().is_success());
    }

    #[tokio::test]
    async fn test_prefetch_swallows_errors() {
        let fetch = ScriptedFetchClient::new().respond(
            HttpMethod::Get,
            "/string-array",
            FetchResponse::error(500, json!({"code": 500, "message": "Something went wrong"})),
        );
        let client = OpenapiQueryClient::new(fetch);
        let cache = QueryClient::new();

        client
            .prefetch_query_without_init::<GetStringArray>(&cache, QueryPolicy::new())
            .await;

        let key = query_key::<GetStringArray>(None);
        let state = cache
            .get_query_state::<Payload<Vec<String>>, QueryError<ApiError>>(&key)
            .unwrap();
        assert!(state.is_error());
        // the adapter's default cache was not touched
        assert_eq!(client.cache().query_count(), 0);
    }

    #[tokio::test]
    async fn test_prefetch_infinite_query_loads_requested_pages() {
        let fetch = paginated("cursor");
        let client = OpenapiQueryClient::new(fetch.clone());
        let cache = QueryClient::new();

        client
            .prefetch_infinite_query::<GetPosts>(&cache, FetchInit::new(), next_page().pages(2))
            .await;

        assert_eq!(fetch.request_count(), 2);
        assert_eq!(cache.query_count(), 1);
    }

    #[test]
    fn test_query_config_sets_defaults() {
        let config = QueryConfig {
            stale_time_ms: 2000,
            page_param_name: "page".to_string(),
        };
        let client = OpenapiQueryClient::new(ScriptedFetchClient::new()).with_query_config(&config);

        assert_eq!(client.cache().defaults().stale_time, Duration::from_secs(2));
        assert_eq!(client.page_param_name, "page");
    }

    #[tokio::test]
    async fn test_query_config_keeps_the_given_cache() {
        let fetch = ScriptedFetchClient::new().respond(
            HttpMethod::Get,
            "/string-array",
            FetchResponse::data(json!(["a"])),
        );
        let config = QueryConfig {
            stale_time_ms: 2000,
            page_param_name: "page".to_string(),
        };
        let cache = QueryClient::new();
        let client = OpenapiQueryClient::new(fetch)
            .with_cache(cache.clone())
            .with_query_config(&config);

        assert_eq!(cache.defaults().stale_time, Duration::from_secs(2));
        client
            .cache()
            .fetch_query(client.query_options_without_init::<GetStringArray, _>(QueryPolicy::new()))
            .await
            .unwrap();
        assert_eq!(cache.query_count(), 1);
    }

    #[tokio::test]
    async fn test_select_reaches_the_observer() {
        let fetch = ScriptedFetchClient::new().respond(
            HttpMethod::Get,
            "/string-array",
            FetchResponse::data(json!(["a", "b"])),
        );
        let client = OpenapiQueryClient::new(fetch);

        let policy = QueryPolicy::new()
            .select(|data: &Payload<Vec<String>>| data.as_ref().map_or(0, Vec::len));
        let query = client.create_query_without_init::<GetStringArray, _>(policy, None);

        assert_eq!(query.settled().await.data, Some(2));
    }

    #[tokio::test]
    async fn test_mutation_success_callback_fires() {
        let fetch = ScriptedFetchClient::new().respond(
            HttpMethod::Post,
            "/blogposts",
            FetchResponse::data(json!({"status": "ok"})),
        );
        let client = OpenapiQueryClient::new(fetch);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let recorded = Arc::clone(&seen);
        let policy = MutationPolicy::new()
            .on_success(move |data: &Value, _: &FetchInit| recorded.lock().unwrap().push(data.clone()));
        let mutation = client.create_mutation::<CreatePost>(policy, None);
        mutation
            .mutate(FetchInit::new().body(json!({"title": "title"})))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!({"status": "ok"})]);
        assert_eq!(mutation.key(), &mutation_key::<CreatePost>());
    }

    #[tokio::test]
    async fn test_mutation_error_callback_fires() {
        let fetch = ScriptedFetchClient::new().respond(
            HttpMethod::Post,
            "/blogposts",
            FetchResponse::error(422, json!({"code": 422, "message": "Invalid"})),
        );
        let client = OpenapiQueryClient::new(fetch);
        let codes = Arc::new(std::sync::Mutex::new(Vec::new()));

        let recorded = Arc::clone(&codes);
        let options = client.mutation_options::<CreatePost>(MutationPolicy::new().on_error(
            move |error: &QueryError<ApiError>, _: &FetchInit| {
                recorded.lock().unwrap().push(error.api().map(|api| api.code));
            },
        ));
        assert_eq!(options.key, mutation_key::<CreatePost>());

        let result = client
            .cache()
            .mutation(options)
            .mutate(FetchInit::new())
            .await;

        assert!(result.is_err());
        assert_eq!(*codes.lock().unwrap(), vec![Some(422)]);
    }
}
