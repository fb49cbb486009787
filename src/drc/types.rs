//! DRC data types and structures
//!
//! Contains violation records, the check parameter bag, per-layer rules and
//! the violation sink used by the checker.

use serde::{Deserialize, Serialize};

use crate::geometry::{tessellate_polygon, Point, Polygon, Rect, ShapeTiles};
use crate::merge::DEFAULT_CANCEL_POLL_INTERVAL;

/// Rectangle count above which the delta stream is staged on disk
pub const DEFAULT_SPILL_THRESHOLD: usize = 4_000_000;

/// A merged polygon whose net area is below the layer minimum
#[derive(Clone, Debug, Serialize)]
pub struct MinAreaViolation {
    pub layer: String,
    /// Net area in grid units squared (outer ring minus holes)
    pub area: i64,
    pub min_area: i64,
    /// Lowest-leftmost vertex of the outer ring
    pub location: Point,
    /// Bounding box of the outer ring, or the location alone when no shape
    /// was reported
    pub bounds: Rect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Polygon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles: Option<ShapeTiles>,
}

/// Algorithm parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct CheckParameters {
    /// Attach the violating shape to each report
    pub report_tiles: bool,
    pub spill_threshold: usize,
    /// Sweep events between cancellation polls
    pub cancel_poll_interval: usize,
}

impl Default for CheckParameters {
    fn default() -> Self {
        Self {
            report_tiles: true,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            cancel_poll_interval: DEFAULT_CANCEL_POLL_INTERVAL,
        }
    }
}

/// Minimum area for one layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinAreaRule {
    pub layer: String,
    pub min_area: i64,
}

/// Minimum-area rules per layer, with a fallback for unlisted layers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignRules {
    pub default_min_area: i64,
    #[serde(default)]
    pub min_area_rules: Vec<MinAreaRule>,
}

impl Default for DesignRules {
    fn default() -> Self {
        Self {
            default_min_area: 10_000, // 0.01 um^2 on a 1 nm grid
            min_area_rules: Vec::new(),
        }
    }
}

impl DesignRules {
    /// Rules applying one minimum to every layer
    pub fn uniform(min_area: i64) -> Self {
        Self {
            default_min_area: min_area,
            min_area_rules: Vec::new(),
        }
    }

    pub fn min_area_for(&self, layer: &str) -> i64 {
        self.min_area_rules
            .iter()
            .find(|r| r.layer == layer)
            .map(|r| r.min_area)
            .unwrap_or(self.default_min_area)
    }
}

/// Receiver of min-area violations
pub trait ErrorLogger {
    /// `area` is the net area of the offending polygon and `(x, y)` its
    /// lowest-leftmost vertex. `shape` is only present when tiles are
    /// reported.
    fn report_min_area_violation(&mut self, area: i64, x: i32, y: i32, shape: Option<Polygon>);
}

/// Collects violations of one layer into [`MinAreaViolation`] records
#[derive(Debug)]
pub struct ViolationCollector {
    layer: String,
    min_area: i64,
    violations: Vec<MinAreaViolation>,
}

impl ViolationCollector {
    pub fn new(layer: &str, min_area: i64) -> Self {
        Self {
            layer: layer.to_string(),
            min_area,
            violations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_violations(self) -> Vec<MinAreaViolation> {
        self.violations
    }
}

impl ErrorLogger for ViolationCollector {
    fn report_min_area_violation(&mut self, area: i64, x: i32, y: i32, shape: Option<Polygon>) {
        let location = Point::new(x, y);
        let bounds = shape
            .as_ref()
            .and_then(|s| outer_bounds(&s.outer_ring))
            .unwrap_or(Rect::new(x, y, x, y));
        let tiles = shape.as_ref().map(tessellate_polygon);
        self.violations.push(MinAreaViolation {
            layer: self.layer.clone(),
            area,
            min_area: self.min_area,
            location,
            bounds,
            shape,
            tiles,
        });
    }
}

fn outer_bounds(ring: &[Point]) -> Option<Rect> {
    let first = ring.first()?;
    Some(ring.iter().fold(Rect::new(first.x, first.y, first.x, first.y), |r, p| {
        Rect::new(r.lx.min(p.x), r.ly.min(p.y), r.hx.max(p.x), r.hy.max(p.y))
    }))
}
