//! Spatial indexing of reported violations
//!
//! R-tree entries over violation bounding boxes, enabling fast point and box
//! queries when a client picks a violation marker.

use rstar::{RTreeObject, AABB};

use super::types::Rect;

/// Violation wrapper for R-tree spatial indexing
#[derive(Clone, Debug)]
pub struct ViolationEntry {
    /// Index into the owning violation list
    pub index: usize,
    pub layer: String,
    pub bounds: AABB<[f64; 2]>,
}

impl ViolationEntry {
    pub fn new(index: usize, layer: &str, bounds: &Rect) -> Self {
        let bounds = AABB::from_corners(
            [bounds.lx as f64, bounds.ly as f64],
            [bounds.hx as f64, bounds.hy as f64],
        );
        Self {
            index,
            layer: layer.to_string(),
            bounds,
        }
    }
}

impl RTreeObject for ViolationEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

impl rstar::PointDistance for ViolationEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.bounds.distance_2(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstar::RTree;

    #[test]
    fn test_point_and_box_queries() {
        let entries = vec![
            ViolationEntry::new(0, "M1", &Rect::new(0, 0, 5, 5)),
            ViolationEntry::new(1, "M1", &Rect::new(100, 100, 110, 104)),
        ];
        let tree = RTree::bulk_load(entries);

        let hits: Vec<usize> = tree
            .locate_all_at_point(&[2.0, 3.0])
            .map(|e| e.index)
            .collect();
        assert_eq!(hits, vec![0]);

        let envelope = AABB::from_corners([90.0, 90.0], [200.0, 200.0]);
        let boxed: Vec<usize> = tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|e| e.index)
            .collect();
        assert_eq!(boxed, vec![1]);
    }
}
