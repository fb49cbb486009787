//! Wire messages of the check server
//!
//! Every message is one JSON object on its own line. Clients send
//! [`Request`]s; the server answers each with a [`Response`] carrying the same
//! `id`, and announces finished background checks with a [`Notification`].

use serde::{Deserialize, Serialize};

/// A client call such as `Load` or `RunMinAreaCheck`
#[derive(Debug, Deserialize)]
pub struct Request {
    pub id: Option<serde_json::Value>,
    pub method: String,
    /// Method arguments; several methods accept none
    pub params: Option<serde_json::Value>,
}

/// Answer to one request: exactly one of `result` or `error` is present
#[derive(Debug, Serialize)]
pub struct Response {
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

/// Failure payload, `code` taken from [`error_codes`]
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub message: String,
}

/// Unsolicited message, e.g. `minAreaCheckComplete`. Serialized with a
/// null `id` so clients can tell it from a response.
#[derive(Debug, Serialize)]
pub struct Notification {
    pub id: Option<serde_json::Value>,
    pub method: String,
    pub result: serde_json::Value,
}

impl Response {
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<serde_json::Value>, code: i32, message: String) -> Self {
        Response {
            id,
            result: None,
            error: Some(ErrorResponse { code, message }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Code of a failed response, `None` on success
    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code)
    }
}

impl Notification {
    pub fn new(method: &str, result: serde_json::Value) -> Self {
        Notification {
            id: None,
            method: method.to_string(),
            result,
        }
    }
}

/// Error codes carried in [`ErrorResponse::code`]
pub mod error_codes {
    /// Line is not valid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// JSON that is not a request object
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Missing or mistyped `params`
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Method needs a layout and none is loaded
    pub const NO_LAYOUT_LOADED: i32 = 2;
    /// Requested layer is not in the layout or has no results
    pub const LAYER_NOT_FOUND: i32 = 3;
    /// `top_cell` is not in the library, or the library has no top cell
    pub const CELL_NOT_FOUND: i32 = 4;
    /// Layout file unreadable or invalid
    pub const LOAD_FAILED: i32 = 5;
    /// Reported in the completion notification of a failed check
    pub const CHECK_FAILED: i32 = 6;
    /// A background check is still running
    pub const CHECK_RUNNING: i32 = 7;
}
