//! Layout handlers: Load, GetCells, GetLayers, Close

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::layout::Library;
use crate::server::protocol::{error_codes, Response};
use crate::server::state::ServerState;
use crate::server::util::{json_response, parse_params};

fn no_layout(id: Option<serde_json::Value>) -> Response {
    Response::error(
        id,
        error_codes::NO_LAYOUT_LOADED,
        "No layout loaded. Call Load first.".to_string(),
    )
}

/// Handle Load request - reads and validates a layout library
pub fn handle_load(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct LoadParams {
        file_path: String,
    }

    let params: LoadParams = match parse_params(&id, params, "{file_path: string}") {
        Ok(p) => p,
        Err(response) => return response,
    };

    if state.is_check_running() {
        return Response::error(
            id,
            error_codes::CHECK_RUNNING,
            "A check is running. Cancel it before loading another layout.".to_string(),
        );
    }

    log::info!("[Server] Loading layout: {}", params.file_path);
    let start = Instant::now();
    let library = match Library::load(&params.file_path) {
        Ok(lib) => lib,
        Err(e) => {
            log::warn!("[Server] Load failed: {:#}", e);
            return Response::error(id, error_codes::LOAD_FAILED, format!("Failed to load layout: {:#}", e));
        }
    };

    let cell_count = library.cells.len();
    let layers = library.layer_names();
    let top_cells: Vec<String> = library.top_cells().into_iter().map(String::from).collect();
    log::info!(
        "[Server] Loaded {} cells, {} layers in {:.2?}",
        cell_count,
        layers.len(),
        start.elapsed()
    );

    state.clear_results();
    state.file_path = Some(params.file_path);
    state.library = Some(Arc::new(library));

    Response::success(
        id,
        serde_json::json!({
            "status": "ok",
            "cell_count": cell_count,
            "layers": layers,
            "top_cells": top_cells,
        }),
    )
}

/// Handle GetCells request - lists cells with their direct contents
pub fn handle_get_cells(state: &ServerState, id: Option<serde_json::Value>) -> Response {
    match &state.library {
        Some(library) => json_response(id, &library.cell_infos()),
        None => no_layout(id),
    }
}

/// Handle GetLayers request - lists every layer used in the library
pub fn handle_get_layers(state: &ServerState, id: Option<serde_json::Value>) -> Response {
    match &state.library {
        Some(library) => json_response(id, &library.layer_names()),
        None => no_layout(id),
    }
}

/// Handle Close request - drops the layout and cached results
pub fn handle_close(state: &mut ServerState, id: Option<serde_json::Value>) -> Response {
    let was_loaded = state.is_file_loaded();
    state.close();
    Response::success(id, serde_json::json!({ "status": "ok", "was_loaded": was_loaded }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_requires_file_path() {
        let mut state = ServerState::new();
        let r = handle_load(&mut state, Some(serde_json::json!(1)), Some(serde_json::json!({})));
        assert_eq!(r.error_code(), Some(error_codes::INVALID_PARAMS));
    }

    #[test]
    fn test_load_missing_file() {
        let mut state = ServerState::new();
        let r = handle_load(
            &mut state,
            None,
            Some(serde_json::json!({"file_path": "/nonexistent/layout.json"})),
        );
        assert_eq!(r.error_code(), Some(error_codes::LOAD_FAILED));
        assert!(!state.is_file_loaded());
    }

    #[test]
    fn test_queries_need_layout() {
        let state = ServerState::new();
        assert_eq!(handle_get_cells(&state, None).error_code(), Some(error_codes::NO_LAYOUT_LOADED));
        assert_eq!(handle_get_layers(&state, None).error_code(), Some(error_codes::NO_LAYOUT_LOADED));
    }
}
