//! What a fetch client hands back for a completed request.

use serde_json::Value;

/// Result of one HTTP call.
///
/// Exactly one outcome applies: a successful status may set `data`, any other
/// status always sets `error`. `data` is `None` when a successful response
/// carried no body at all, which is not the same as a body of JSON `null`. A
/// failed response without a body reports `error` as JSON `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResponse {
    pub data: Option<Value>,
    pub error: Option<Value>,
    pub status: u16,
}

impl FetchResponse {
    /// A `200` response with a JSON body.
    pub fn data(data: impl Into<Value>) -> Self {
        Self {
            data: Some(data.into()),
            error: None,
            status: 200,
        }
    }

    /// A `204` response with no body.
    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
            status: 204,
        }
    }

    /// A failed response carrying an error payload.
    pub fn error(status: u16, error: impl Into<Value>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
            status,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
