//! Utility functions for the check server

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::protocol::{error_codes, Response};

/// Deserialize required request params, or produce the INVALID_PARAMS
/// response naming the expected shape
pub fn parse_params<T: DeserializeOwned>(
    id: &Option<serde_json::Value>,
    params: Option<serde_json::Value>,
    expected: &str,
) -> Result<T, Response> {
    let value = params.ok_or_else(|| {
        Response::error(
            id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Invalid params: expected {}", expected),
        )
    })?;
    serde_json::from_value(value).map_err(|e| {
        Response::error(
            id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Invalid params: expected {} ({})", expected, e),
        )
    })
}

/// Like [`parse_params`], but absent params mean `T::default()`
pub fn parse_optional_params<T: DeserializeOwned + Default>(
    id: &Option<serde_json::Value>,
    params: Option<serde_json::Value>,
    expected: &str,
) -> Result<T, Response> {
    match params {
        None | Some(serde_json::Value::Null) => Ok(T::default()),
        Some(value) => parse_params(id, Some(value), expected),
    }
}

/// Success response carrying `value`, or INTERNAL_ERROR if it cannot be
/// serialized
pub fn json_response<T: Serialize>(id: Option<serde_json::Value>, value: &T) -> Response {
    match serde_json::to_value(value) {
        Ok(v) => Response::success(id, v),
        Err(e) => Response::error(
            id,
            error_codes::INTERNAL_ERROR,
            format!("Failed to serialize result: {}", e),
        ),
    }
}
