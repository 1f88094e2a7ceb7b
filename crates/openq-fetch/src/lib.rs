//! # openq fetch client
//!
//! An HTTP implementation of [`openq_core::FetchClient`] built on reqwest.
//!
//! ## Features
//!
//! - Path templating, query/header/cookie parameters and JSON bodies from a
//!   [`FetchInit`](openq_core::FetchInit)
//! - API key, bearer and basic authentication
//! - Optional validation against an OpenAPI v3 document (JSON or YAML)
//! - Cancellation through a `CancellationToken`
//!
//! ## Example
//!
//! ```no_run
//! use openq_fetch::{HttpFetchClient, OperationCatalog};
//!
//! # fn main() -> Result<(), openq_core::FetchError> {
//! let client = HttpFetchClient::new("https://api.example.com")
//!     .with_catalog(OperationCatalog::from_file("./api/openapi.yaml")?);
//! # Ok(())
//! # }
//! ```

mod auth;
mod catalog;
mod client;

pub use catalog::{OperationCatalog, OperationSpec, ParameterLocation, ParameterSpec};
pub use client::HttpFetchClient;

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use openq_core::{
        AuthConfig, CancellationToken, FetchClient, FetchError, FetchInit, HttpMethod,
    };
    use serde_json::json;

    #[tokio::test]
    async fn test_success_body_becomes_data() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/blogposts/1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"title":"title","body":"body"}"#)
            .create_async()
            .await;

        let client = HttpFetchClient::new(server.url());
        let response = client
            .fetch(
                HttpMethod::Get,
                "/blogposts/{post_id}",
                FetchInit::new().path_param("post_id", "1"),
                None,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
        assert_eq!(response.data, Some(json!({"title": "title", "body": "body"})));
        assert_eq!(response.error, None);
    }

    #[tokio::test]
    async fn test_error_status_becomes_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/string-array")
            .with_status(500)
            .with_body(r#"{"code":500,"message":"Something went wrong"}"#)
            .create_async()
            .await;

        let client = HttpFetchClient::new(server.url());
        let response = client
            .fetch(HttpMethod::Get, "/string-array", FetchInit::new(), None)
            .await
            .unwrap();

        assert_eq!(response.status, 500);
        assert_eq!(response.data, None);
        assert_eq!(
            response.error,
            Some(json!({"code": 500, "message": "Something went wrong"}))
        );
    }

    #[tokio::test]
    async fn test_null_and_empty_bodies_differ() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/null")
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;
        server
            .mock("DELETE", "/items/1")
            .with_status(204)
            .create_async()
            .await;

        let client = HttpFetchClient::new(server.url());

        let response = client
            .fetch(HttpMethod::Get, "/null", FetchInit::new(), None)
            .await
            .unwrap();
        assert_eq!(response.data, Some(serde_json::Value::Null));

        let response = client
            .fetch(
                HttpMethod::Delete,
                "/items/{id}",
                FetchInit::new().path_param("id", 1),
                None,
            )
            .await
            .unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(response.data, None);
    }

    #[tokio::test]
    async fn test_non_json_error_kept_as_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/broken")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let client = HttpFetchClient::new(server.url());
        let response = client
            .fetch(HttpMethod::Get, "/broken", FetchInit::new(), None)
            .await
            .unwrap();
        assert_eq!(response.error, Some(json!("Bad Gateway")));
    }

    #[tokio::test]
    async fn test_error_status_without_body_is_still_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/string-array")
            .with_status(500)
            .create_async()
            .await;
        server
            .mock("DELETE", "/items/1")
            .with_status(404)
            .with_body("")
            .create_async()
            .await;

        let client = HttpFetchClient::new(server.url());

        let response = client
            .fetch(HttpMethod::Get, "/string-array", FetchInit::new(), None)
            .await
            .unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.data, None);
        assert_eq!(response.error, Some(serde_json::Value::Null));

        let response = client
            .fetch(
                HttpMethod::Delete,
                "/items/{id}",
                FetchInit::new().path_param("id", 1),
                None,
            )
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
        assert_eq!(response.error, Some(serde_json::Value::Null));
    }

    #[tokio::test]
    async fn test_non_json_success_kept_as_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/greeting")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("hello")
            .create_async()
            .await;

        let client = HttpFetchClient::new(server.url());
        let response = client
            .fetch(HttpMethod::Get, "/greeting", FetchInit::new(), None)
            .await
            .unwrap();
        assert_eq!(response.data, Some(json!("hello")));
        assert_eq!(response.error, None);
    }

    #[tokio::test]
    async fn test_query_body_and_auth_are_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/blogposts")
            .match_query(Matcher::UrlEncoded("cursor".into(), "1".into()))
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(json!({"title": "t"})))
            .with_status(201)
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        let client = HttpFetchClient::new(server.url()).with_auth(AuthConfig::bearer("secret"));
        let response = client
            .fetch(
                HttpMethod::Post,
                "/blogposts",
                FetchInit::new().query_param("cursor", 1).body(json!({"title": "t"})),
                None,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.data, Some(json!({"status": "ok"})));
    }

    #[tokio::test]
    async fn test_catalog_rejects_before_sending() {
        let catalog = OperationCatalog::from_str(
            r#"{
                "openapi": "3.0.0",
                "info": {"title": "t", "version": "1"},
                "paths": {
                    "/string-array": {"get": {"responses": {"200": {"description": "ok"}}}}
                }
            }"#,
        )
        .unwrap();

        // nothing listens here; validation must fail first
        let client = HttpFetchClient::new("http://127.0.0.1:9").with_catalog(catalog);
        let err = client
            .fetch(HttpMethod::Put, "/string-array", FetchInit::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnknownOperation { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_signal_aborts() {
        let client = HttpFetchClient::new("http://10.255.255.1");
        let signal = CancellationToken::new();
        signal.cancel();

        let err = client
            .fetch(HttpMethod::Get, "/slow", FetchInit::new(), Some(signal))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Aborted);
    }
}
