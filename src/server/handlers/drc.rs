//! DRC handlers: RunMinAreaCheck, CancelCheck, GetViolations

use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use serde::Deserialize;

use crate::drc::{run_min_area_drc_on_layers, CheckParameters, DesignRules};
use crate::merge::Cancelled;
use crate::server::protocol::{error_codes, Notification, Response};
use crate::server::state::{CheckAsyncResult, ServerEvent, ServerState};
use crate::server::util::{json_response, parse_optional_params};

/// Method name of the completion notification
pub const CHECK_COMPLETE_METHOD: &str = "minAreaCheckComplete";

/// Handle RunMinAreaCheck request - starts the check on a background thread
pub fn handle_run_min_area_check(
    state: &mut ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
    events: &Sender<ServerEvent>,
) -> Response {
    #[derive(Deserialize, Default)]
    struct RunCheckParams {
        #[serde(default)]
        top_cell: Option<String>,
        #[serde(default)]
        layers: Option<Vec<String>>,
        #[serde(default)]
        min_area: Option<i64>,
        #[serde(default)]
        rules: Option<DesignRules>,
        #[serde(default)]
        parameters: Option<CheckParameters>,
    }

    let params: RunCheckParams = match parse_optional_params(
        &id,
        params,
        "{top_cell?: string, layers?: string[], min_area?: number, rules?: object, parameters?: object}",
    ) {
        Ok(p) => p,
        Err(response) => return response,
    };

    let library = match &state.library {
        Some(lib) => Arc::clone(lib),
        None => {
            return Response::error(
                id,
                error_codes::NO_LAYOUT_LOADED,
                "No layout loaded. Call Load first.".to_string(),
            )
        }
    };
    if state.is_check_running() {
        return Response::error(id, error_codes::CHECK_RUNNING, "A check is already running".to_string());
    }

    let top_cell = match library.resolve_top_cell(params.top_cell.as_deref()) {
        Ok(name) => name.to_string(),
        Err(e) => return Response::error(id, error_codes::CELL_NOT_FOUND, e.to_string()),
    };
    let all_layers = library.layer_names();
    let layers = match params.layers {
        Some(requested) => {
            if let Some(missing) = requested.iter().find(|l| !all_layers.contains(l)) {
                return Response::error(
                    id,
                    error_codes::LAYER_NOT_FOUND,
                    format!("Layer '{}' not found", missing),
                );
            }
            requested
        }
        None => all_layers,
    };

    if let Some(rules) = params.rules {
        state.design_rules = rules;
    }
    if let Some(min_area) = params.min_area {
        state.design_rules.default_min_area = min_area;
    }
    if let Some(parameters) = params.parameters {
        state.parameters = parameters;
    }

    let rules = state.design_rules.clone();
    let check_params = state.parameters.clone();
    let cancel = Arc::new(AtomicBool::new(false));
    let generation = state.begin_check(Arc::clone(&cancel));

    log::info!(
        "[Server] Starting min-area check on '{}' ({} layers, default minimum {})",
        top_cell,
        layers.len(),
        rules.default_min_area
    );

    let tx = events.clone();
    let thread_cell = top_cell.clone();
    let thread_layers = layers.clone();
    thread::spawn(move || {
        let start = Instant::now();
        let outcome = run_min_area_drc_on_layers(
            &library,
            &thread_cell,
            &thread_layers,
            &rules,
            &check_params,
            Some(cancel),
        );
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let _ = tx.send(ServerEvent::CheckComplete(CheckAsyncResult {
            generation,
            outcome,
            elapsed_ms,
        }));
    });

    Response::success(
        id,
        serde_json::json!({
            "status": "started",
            "top_cell": top_cell,
            "layers": layers,
        }),
    )
}

/// Store a finished check in `state` and build the notification announcing it
pub fn apply_check_result(state: &mut ServerState, result: CheckAsyncResult) -> Notification {
    if result.generation != state.check_generation {
        log::info!(
            "[Server] Discarding result of superseded check {} after {:.2}ms",
            result.generation,
            result.elapsed_ms
        );
        return Notification::new(
            CHECK_COMPLETE_METHOD,
            serde_json::json!({ "status": "cancelled", "elapsed_ms": result.elapsed_ms }),
        );
    }
    state.running_check = None;
    let outcome = if state.is_file_loaded() {
        result.outcome
    } else {
        Err(Cancelled.into())
    };
    let payload = match outcome {
        Ok(reports) => {
            state.store_reports(reports);
            log::info!(
                "[Server] Min-area check completed: {} violations in {:.2}ms",
                state.violations.len(),
                result.elapsed_ms
            );
            let layers: Vec<serde_json::Value> = state
                .reports
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "layer": r.layer,
                        "min_area": r.min_area,
                        "violation_count": r.violations.len(),
                        "polygons": r.summary.polygons,
                        "total_area": r.summary.total_area,
                        "elapsed_ms": r.elapsed_ms,
                    })
                })
                .collect();
            let violations = serde_json::to_value(&state.violations).unwrap_or(serde_json::Value::Null);
            serde_json::json!({
                "status": "ok",
                "violation_count": state.violations.len(),
                "elapsed_ms": result.elapsed_ms,
                "layers": layers,
                "violations": violations,
            })
        }
        Err(e) if e.is::<Cancelled>() => {
            log::info!("[Server] Min-area check cancelled after {:.2}ms", result.elapsed_ms);
            serde_json::json!({ "status": "cancelled", "elapsed_ms": result.elapsed_ms })
        }
        Err(e) => {
            log::warn!("[Server] Min-area check failed: {:#}", e);
            serde_json::json!({
                "status": "error",
                "code": error_codes::CHECK_FAILED,
                "message": format!("{:#}", e),
            })
        }
    };
    Notification::new(CHECK_COMPLETE_METHOD, payload)
}

/// Handle CancelCheck request - flags the running check to stop
pub fn handle_cancel_check(state: &mut ServerState, id: Option<serde_json::Value>) -> Response {
    let status = if state.cancel_check() { "cancelling" } else { "idle" };
    Response::success(id, serde_json::json!({ "status": status }))
}

/// Handle GetViolations request - returns cached violations, optionally for one layer
pub fn handle_get_violations(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize, Default)]
    struct GetViolationsParams {
        #[serde(default)]
        layer: Option<String>,
    }

    let params: GetViolationsParams = match parse_optional_params(&id, params, "{layer?: string}") {
        Ok(p) => p,
        Err(response) => return response,
    };

    match params.layer {
        Some(layer) => {
            if !state.reports.iter().any(|r| r.layer == layer) {
                return Response::error(
                    id,
                    error_codes::LAYER_NOT_FOUND,
                    format!("No results for layer '{}'", layer),
                );
            }
            let filtered: Vec<_> = state.violations.iter().filter(|v| v.layer == layer).collect();
            json_response(id, &filtered)
        }
        None => json_response(id, &state.violations),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Library;
    use std::sync::mpsc;
    use std::time::Duration;

    fn loaded_state() -> ServerState {
        let mut state = ServerState::new();
        let lib = Library::from_json_str(
            r#"{ "cells": { "TOP": { "layers": { "M1": [[0, 0, 5, 5], [5, 0, 10, 5], [50, 50, 52, 52]] } } } }"#,
        )
        .unwrap();
        state.library = Some(Arc::new(lib));
        state.file_path = Some("memory".to_string());
        state
    }

    fn wait_for_result(rx: &mpsc::Receiver<ServerEvent>) -> CheckAsyncResult {
        loop {
            match rx.recv_timeout(Duration::from_secs(30)).unwrap() {
                ServerEvent::CheckComplete(result) => return result,
                _ => continue,
            }
        }
    }

    #[test]
    fn test_check_runs_in_background() {
        let mut state = loaded_state();
        let (tx, rx) = mpsc::channel();
        let r = handle_run_min_area_check(
            &mut state,
            Some(serde_json::json!(7)),
            Some(serde_json::json!({ "min_area": 30 })),
            &tx,
        );
        assert!(!r.is_error());
        assert!(state.is_check_running());

        let again = handle_run_min_area_check(&mut state, None, None, &tx);
        assert_eq!(again.error_code(), Some(error_codes::CHECK_RUNNING));

        let notification = apply_check_result(&mut state, wait_for_result(&rx));
        assert_eq!(notification.method, CHECK_COMPLETE_METHOD);
        assert_eq!(notification.result["status"], "ok");
        // The 2x2 square fails; the two abutting squares merge to area 50
        assert_eq!(notification.result["violation_count"], 1);
        assert!(!state.is_check_running());
        assert_eq!(state.violations[0].area, 4);
    }

    #[test]
    fn test_check_rejects_unknown_layer_and_cell() {
        let mut state = loaded_state();
        let (tx, _rx) = mpsc::channel();
        let r = handle_run_min_area_check(&mut state, None, Some(serde_json::json!({ "layers": ["M9"] })), &tx);
        assert_eq!(r.error_code(), Some(error_codes::LAYER_NOT_FOUND));
        let r = handle_run_min_area_check(&mut state, None, Some(serde_json::json!({ "top_cell": "X" })), &tx);
        assert_eq!(r.error_code(), Some(error_codes::CELL_NOT_FOUND));
        assert!(!state.is_check_running());
    }

    #[test]
    fn test_check_requires_layout() {
        let mut state = ServerState::new();
        let (tx, _rx) = mpsc::channel();
        let r = handle_run_min_area_check(&mut state, None, None, &tx);
        assert_eq!(r.error_code(), Some(error_codes::NO_LAYOUT_LOADED));
    }

    #[test]
    fn test_cancelled_result_notification() {
        let mut state = loaded_state();
        let generation = state.begin_check(Arc::new(AtomicBool::new(false)));
        let r = handle_cancel_check(&mut state, None);
        assert_eq!(r.result.unwrap()["status"], "cancelling");

        let n = apply_check_result(
            &mut state,
            CheckAsyncResult {
                generation,
                outcome: Err(Cancelled.into()),
                elapsed_ms: 1.0,
            },
        );
        assert_eq!(n.result["status"], "cancelled");
        assert!(!state.is_check_running());
        assert_eq!(handle_cancel_check(&mut state, None).result.unwrap()["status"], "idle");
    }

    #[test]
    fn test_close_discards_finished_check() {
        let mut state = loaded_state();
        let (tx, rx) = mpsc::channel();
        handle_run_min_area_check(&mut state, None, Some(serde_json::json!({ "min_area": 30 })), &tx);
        let finished = wait_for_result(&rx);
        assert!(finished.outcome.is_ok());

        crate::server::handlers::handle_close(&mut state, None);
        assert!(!state.is_check_running());

        let n = apply_check_result(&mut state, finished);
        assert_eq!(n.result["status"], "cancelled");
        assert!(!state.is_file_loaded());
        assert!(state.violations.is_empty());
        assert!(state.violation_index.is_none());
    }

    #[test]
    fn test_superseded_check_does_not_touch_new_one() {
        let mut state = loaded_state();
        let (old_tx, old_rx) = mpsc::channel();
        handle_run_min_area_check(&mut state, None, Some(serde_json::json!({ "min_area": 30 })), &old_tx);
        state.close();

        let reloaded = loaded_state();
        state.library = reloaded.library;
        let (new_tx, new_rx) = mpsc::channel();
        let r = handle_run_min_area_check(&mut state, None, Some(serde_json::json!({ "min_area": 5 })), &new_tx);
        assert!(!r.is_error());

        let n = apply_check_result(&mut state, wait_for_result(&old_rx));
        assert_eq!(n.result["status"], "cancelled");
        assert!(state.is_check_running());
        assert!(state.violations.is_empty());

        let n = apply_check_result(&mut state, wait_for_result(&new_rx));
        assert_eq!(n.result["status"], "ok");
        assert_eq!(n.result["violation_count"], 1);
        assert!(!state.is_check_running());
    }

    #[test]
    fn test_min_area_overrides_only_default_rule() {
        let mut state = loaded_state();
        let (tx, rx) = mpsc::channel();
        let r = handle_run_min_area_check(
            &mut state,
            None,
            Some(serde_json::json!({
                "rules": { "default_min_area": 1000, "min_area_rules": [{ "layer": "M1", "min_area": 1 }] },
                "min_area": 30
            })),
            &tx,
        );
        assert!(!r.is_error());
        assert_eq!(state.design_rules.default_min_area, 30);
        assert_eq!(state.design_rules.min_area_for("M1"), 1);
        assert_eq!(state.design_rules.min_area_for("M2"), 30);

        // The per-layer rule of 1 lets every M1 shape pass
        let n = apply_check_result(&mut state, wait_for_result(&rx));
        assert_eq!(n.result["status"], "ok");
        assert_eq!(n.result["violation_count"], 0);
        assert_eq!(n.result["layers"][0]["min_area"], 1);
    }
}
