//! Endpoints and helpers shared by the integration tests
#![allow(dead_code)]

use openq_adapter::OpenapiQueryClient;
use openq_core::{FetchInit, endpoint};
use openq_fetch::HttpFetchClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page {
    pub items: Vec<u32>,
    #[serde(rename = "nextPage")]
    pub next_page: Option<u32>,
}

endpoint!(pub GetStringArray: Get "/string-array" => Vec<String>, ApiError);
endpoint!(pub GetNull: Get "/null" => Value, ApiError);
endpoint!(pub GetEmpty: Get "/empty" => Value, ApiError);
endpoint!(pub GetStatus: Get "/status" => Value, Value);
endpoint!(pub GetBlogpost: Get "/blogposts/{post_id}" (FetchInit) => Post, ApiError);
endpoint!(pub GetPaginatedPosts: Get "/paginated-posts" (FetchInit) => Page, ApiError);
endpoint!(pub CreatePost: Post "/blogposts" (FetchInit) => Value, ApiError);

/// Adapter talking to `server` with a fresh cache.
pub fn client(server: &mockito::ServerGuard) -> OpenapiQueryClient<HttpFetchClient> {
    OpenapiQueryClient::new(HttpFetchClient::new(server.url()))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
