//! Check server module - line-delimited JSON-RPC over stdin/stdout
//!
//! Clients load a layout library, start min-area checks that run in the
//! background, and query the reported violations.
//!
//! # Module Structure
//! - `protocol` - JSON-RPC request/response types
//! - `state` - Server state management
//! - `util` - Parameter parsing and response helpers
//! - `handlers` - Request handlers organized by functionality

pub mod handlers;
pub mod protocol;
pub mod state;
pub mod util;

use std::sync::mpsc::Sender;

// Re-export key types for convenience
pub use protocol::{error_codes, ErrorResponse, Notification, Request, Response};
pub use state::{CheckAsyncResult, ServerEvent, ServerState};

/// Route one request to its handler
pub fn dispatch(state: &mut ServerState, request: Request, events: &Sender<ServerEvent>) -> Response {
    let Request { id, method, params } = request;
    match method.as_str() {
        "Load" => handlers::handle_load(state, id, params),
        "GetCells" => handlers::handle_get_cells(state, id),
        "GetLayers" => handlers::handle_get_layers(state, id),
        "RunMinAreaCheck" => handlers::handle_run_min_area_check(state, id, params, events),
        "CancelCheck" => handlers::handle_cancel_check(state, id),
        "GetViolations" => handlers::handle_get_violations(state, id, params),
        "QueryViolationAtPoint" => handlers::handle_query_violation_at_point(state, id, params),
        "BoxSelectViolations" => handlers::handle_box_select_violations(state, id, params),
        "Close" => handlers::handle_close(state, id),
        other => Response::error(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", other),
        ),
    }
}

/// Parse one input line and dispatch it
pub fn handle_line(state: &mut ServerState, line: &str, events: &Sender<ServerEvent>) -> Response {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            return Response::error(None, error_codes::PARSE_ERROR, format!("Parse error: {}", e));
        }
    };
    let id = value.get("id").cloned();
    match serde_json::from_value::<Request>(value) {
        Ok(request) => dispatch(state, request, events),
        Err(e) => Response::error(id, error_codes::INVALID_REQUEST, format!("Invalid request: {}", e)),
    }
}
