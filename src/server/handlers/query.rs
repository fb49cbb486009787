//! Query handlers: QueryViolationAtPoint, BoxSelectViolations

use rstar::AABB;
use serde::{Deserialize, Serialize};

use crate::drc::MinAreaViolation;
use crate::server::protocol::Response;
use crate::server::state::ServerState;
use crate::server::util::{json_response, parse_params};

/// A violation together with its position in the cached list
#[derive(Serialize)]
struct IndexedViolation<'a> {
    index: usize,
    violation: &'a MinAreaViolation,
}

fn collect_hits<'a>(state: &'a ServerState, mut indices: Vec<usize>) -> Vec<IndexedViolation<'a>> {
    indices.sort_unstable();
    indices.dedup();
    indices
        .into_iter()
        .filter_map(|i| state.violations.get(i).map(|v| IndexedViolation { index: i, violation: v }))
        .collect()
}

/// Handle QueryViolationAtPoint request - violations whose bounds contain
/// (or lie within `tolerance` of) a point
pub fn handle_query_violation_at_point(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct QueryPointParams {
        x: f64,
        y: f64,
        #[serde(default)]
        tolerance: f64,
    }

    let params: QueryPointParams = match parse_params(&id, params, "{x: number, y: number, tolerance?: number}") {
        Ok(p) => p,
        Err(response) => return response,
    };

    // No check has stored results yet
    let index = match &state.violation_index {
        Some(index) => index,
        None => return json_response(id, &Vec::<IndexedViolation>::new()),
    };

    let point = [params.x, params.y];
    let indices: Vec<usize> = if params.tolerance > 0.0 {
        index
            .locate_within_distance(point, params.tolerance * params.tolerance)
            .map(|e| e.index)
            .collect()
    } else {
        index.locate_all_at_point(&point).map(|e| e.index).collect()
    };

    json_response(id, &collect_hits(state, indices))
}

/// Handle BoxSelectViolations request - violations whose bounds intersect a box
pub fn handle_box_select_violations(
    state: &ServerState,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> Response {
    #[derive(Deserialize)]
    struct BoxSelectParams {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    }

    let params: BoxSelectParams =
        match parse_params(&id, params, "{min_x: number, min_y: number, max_x: number, max_y: number}") {
            Ok(p) => p,
            Err(response) => return response,
        };

    // No check has stored results yet
    let index = match &state.violation_index {
        Some(index) => index,
        None => return json_response(id, &Vec::<IndexedViolation>::new()),
    };

    let envelope = AABB::from_corners([params.min_x, params.min_y], [params.max_x, params.max_y]);
    let indices: Vec<usize> = index
        .locate_in_envelope_intersecting(&envelope)
        .map(|e| e.index)
        .collect();

    json_response(id, &collect_hits(state, indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drc::LayerReport;
    use crate::drc::CheckSummary;
    use crate::geometry::{Point, Rect};

    fn violation(layer: &str, bounds: Rect) -> MinAreaViolation {
        MinAreaViolation {
            layer: layer.to_string(),
            area: bounds.area(),
            min_area: 1000,
            location: Point::new(bounds.lx, bounds.ly),
            bounds,
            shape: None,
            tiles: None,
        }
    }

    fn state_with_results() -> ServerState {
        let mut state = ServerState::new();
        state.store_reports(vec![LayerReport {
            layer: "M1".to_string(),
            min_area: 1000,
            violations: vec![
                violation("M1", Rect::new(0, 0, 10, 10)),
                violation("M1", Rect::new(100, 100, 120, 105)),
            ],
            summary: CheckSummary::default(),
            elapsed_ms: 0.0,
        }]);
        state
    }

    #[test]
    fn test_point_query() {
        let state = state_with_results();
        let r = handle_query_violation_at_point(&state, None, Some(serde_json::json!({"x": 5, "y": 5})));
        let hits = r.result.unwrap();
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["index"], 0);

        let r = handle_query_violation_at_point(
            &state,
            None,
            Some(serde_json::json!({"x": 98, "y": 100, "tolerance": 3})),
        );
        assert_eq!(r.result.unwrap()[0]["index"], 1);
    }

    #[test]
    fn test_box_select() {
        let state = state_with_results();
        let r = handle_box_select_violations(
            &state,
            None,
            Some(serde_json::json!({"min_x": -1, "min_y": -1, "max_x": 200, "max_y": 200})),
        );
        assert_eq!(r.result.unwrap().as_array().unwrap().len(), 2);

        let r = handle_box_select_violations(
            &state,
            None,
            Some(serde_json::json!({"min_x": 20, "min_y": 20, "max_x": 30, "max_y": 30})),
        );
        assert!(r.result.unwrap().as_array().unwrap().is_empty());
    }

    #[test]
    fn test_query_before_any_check_is_empty() {
        let state = ServerState::new();
        let r = handle_query_violation_at_point(&state, None, Some(serde_json::json!({"x": 0, "y": 0})));
        assert!(!r.is_error());
        assert!(r.result.unwrap().as_array().unwrap().is_empty());
        let r = handle_box_select_violations(
            &state,
            None,
            Some(serde_json::json!({"min_x": 0, "min_y": 0, "max_x": 10, "max_y": 10})),
        );
        assert!(r.result.unwrap().as_array().unwrap().is_empty());
        let r = handle_box_select_violations(&state, None, Some(serde_json::json!({"min_x": 0})));
        assert_eq!(r.error_code(), Some(crate::server::protocol::error_codes::INVALID_PARAMS));
    }
}
