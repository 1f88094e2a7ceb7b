//! Request init: the parameters, body and headers passed alongside a path.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Parameters grouped by where they land in the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Values substituted into `{name}` placeholders of the path template
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub path: Map<String, Value>,
    /// Query string parameters
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub query: Map<String, Value>,
    /// Header parameters declared by the operation
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub header: Map<String, Value>,
    /// Cookie parameters declared by the operation
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub cookie: Map<String, Value>,
}

impl Params {
    pub fn is_empty(&self) -> bool {
        self.path.is_empty() && self.query.is_empty() && self.header.is_empty() && self.cookie.is_empty()
    }
}

/// The untyped request init every fetch client receives.
///
/// Typed endpoint inits serialize into this shape:
///
/// ```json
/// { "params": { "path": {}, "query": {}, "header": {}, "cookie": {} }, "body": {}, "headers": {} }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchInit {
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,

    /// JSON request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Extra headers not declared as parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl FetchInit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert any serializable init into the fetch shape.
    pub fn from_init<I: Serialize + ?Sized>(init: &I) -> Result<Self, FetchError> {
        let value = serde_json::to_value(init).map_err(|e| FetchError::Encode(e.to_string()))?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| FetchError::Encode(e.to_string()))
    }

    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.path.insert(name.into(), value.into());
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.query.insert(name.into(), value.into());
        self
    }

    pub fn header_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.header.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Copy of this init whose query bag has `name` set to `value`.
    ///
    /// Every other parameter group, the body and the headers are left as they are.
    pub fn with_query_param(&self, name: &str, value: Value) -> Self {
        let mut init = self.clone();
        init.params.query.insert(name.to_string(), value);
        init
    }
}
