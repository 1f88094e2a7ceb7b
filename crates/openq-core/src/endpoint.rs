//! Typed operations.
//!
//! An [`Endpoint`] pins one `(method, path)` pair of an OpenAPI document to
//! the Rust types of its request init, success body and error body. Inits that
//! have no required keys additionally implement [`NoRequiredParams`], which is
//! what lets callers omit the init entirely.

use crate::method::HttpMethod;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub trait Endpoint: Send + Sync + 'static {
    const METHOD: HttpMethod;
    const PATH: &'static str;

    /// Request init; serializes into the [`FetchInit`](crate::FetchInit) shape.
    type Init: Serialize + Clone + Send + Sync + 'static;

    /// Body of a successful response.
    type Data: DeserializeOwned + Clone + Send + Sync + 'static;

    /// Body of a failed response.
    type Error: DeserializeOwned + Clone + std::fmt::Debug + Send + Sync + 'static;
}

/// Marker for operations whose init may be left out.
pub trait NoRequiredParams: Endpoint {}

/// Success body of a query: `None` when the response carried no body.
pub type Payload<T> = Option<T>;

/// Declare an [`Endpoint`] type.
///
/// Without an init type the endpoint takes an untyped
/// [`FetchInit`](crate::FetchInit) and may be called without one:
///
/// ```
/// use openq_core::endpoint;
///
/// #[derive(Debug, Clone, serde::Deserialize)]
/// pub struct ApiError { pub code: u16, pub message: String }
///
/// endpoint!(pub GetStringArray: Get "/string-array" => Vec<String>, ApiError);
/// ```
///
/// With an init type in parentheses the init is required:
///
/// ```
/// use openq_core::{endpoint, FetchInit};
///
/// #[derive(Debug, Clone, serde::Deserialize)]
/// pub struct Post { pub title: String }
///
/// endpoint!(pub GetBlogpost: Get "/blogposts/{post_id}" (FetchInit) => Post, serde_json::Value);
/// ```
#[macro_export]
macro_rules! endpoint {
    (@define [$($meta:tt)*] $vis:vis $name:ident, $method:ident, $path:literal, $init:ty, $data:ty, $error:ty) => {
        $($meta)*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $name;

        impl $crate::Endpoint for $name {
            const METHOD: $crate::HttpMethod = $crate::HttpMethod::$method;
            const PATH: &'static str = $path;
            type Init = $init;
            type Data = $data;
            type Error = $error;
        }
    };
    ($(#[$meta:meta])* $vis:vis $name:ident : $method:ident $path:literal => $data:ty, $error:ty) => {
        $crate::endpoint!(@define [$(#[$meta])*] $vis $name, $method, $path, $crate::FetchInit, $data, $error);
        impl $crate::NoRequiredParams for $name {}
    };
    ($(#[$meta:meta])* $vis:vis $name:ident : $method:ident $path:literal ($init:ty) => $data:ty, $error:ty) => {
        $crate::endpoint!(@define [$(#[$meta])*] $vis $name, $method, $path, $init, $data, $error);
    };
}
