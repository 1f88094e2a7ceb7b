use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Helper for creating configuration errors
    ///
    /// # Example
    /// ```
    /// use openq_core::Error;
    /// let err = Error::config_error("base_url must not be empty");
    /// ```
    pub fn config_error(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

/// Failures of the fetch client itself.
///
/// These are distinct from an operation answering with an error payload,
/// which is reported through the response and never through this type.
/// Variants carry rendered messages so the error can be cloned into every
/// observer of a shared query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Failed to encode request: {0}")]
    Encode(String),

    #[error("Request aborted")]
    Aborted,

    #[error("Operation {method} {path} is not defined by the schema")]
    UnknownOperation { method: String, path: String },

    #[error("Missing required {location} parameter: {name}")]
    MissingParameter { location: String, name: String },

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn unknown_operation(method: impl ToString, path: impl Into<String>) -> Self {
        FetchError::UnknownOperation {
            method: method.to_string(),
            path: path.into(),
        }
    }

    pub fn missing_parameter(location: impl Into<String>, name: impl Into<String>) -> Self {
        FetchError::MissingParameter {
            location: location.into(),
            name: name.into(),
        }
    }
}

/// How a query or mutation failed.
///
/// `Api` is the only failure the adapter originates: the operation answered
/// with an error payload, carried here as-is. Everything the fetch client
/// raised passes through untouched as `Fetch`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError<E> {
    #[error("remote operation reported an error: {0:?}")]
    Api(E),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl<E> QueryError<E> {
    /// The error payload, if the operation reported one.
    pub fn api(&self) -> Option<&E> {
        match self {
            QueryError::Api(e) => Some(e),
            QueryError::Fetch(_) => None,
        }
    }

    pub fn into_api(self) -> Option<E> {
        match self {
            QueryError::Api(e) => Some(e),
            QueryError::Fetch(_) => None,
        }
    }

    pub fn fetch(&self) -> Option<&FetchError> {
        match self {
            QueryError::Api(_) => None,
            QueryError::Fetch(e) => Some(e),
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, QueryError::Fetch(FetchError::Aborted))
    }
}
