//! Core geometry types for Manhattan layout data
//!
//! This module contains the primitives shared by the merge engine and the
//! checker: grid points, axis-aligned rectangles, polygon rings and the nested
//! ring forest produced by polygon reconstruction.

use serde::{Deserialize, Serialize};

/// Largest absolute coordinate accepted anywhere in the engine.
///
/// Widths, heights and translated coordinates of in-range rectangles all fit
/// in an `i32`.
pub const MAX_COORD: i32 = (1 << 30) - 1;

/// A point on the integer layout grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in grid units: `[lx, hx] x [ly, hy]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub lx: i32,
    pub ly: i32,
    pub hx: i32,
    pub hy: i32,
}

impl Rect {
    pub fn new(lx: i32, ly: i32, hx: i32, hy: i32) -> Self {
        Self { lx, ly, hx, hy }
    }

    /// Build from `[lx, ly, hx, hy]` as stored in coordinate buffers
    pub fn from_coords(c: [i32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }

    pub fn coords(&self) -> [i32; 4] {
        [self.lx, self.ly, self.hx, self.hy]
    }

    pub fn width(&self) -> i64 {
        self.hx as i64 - self.lx as i64
    }

    pub fn height(&self) -> i64 {
        self.hy as i64 - self.ly as i64
    }

    /// Zero width or zero height: such a rectangle covers nothing
    pub fn is_degenerate(&self) -> bool {
        self.lx >= self.hx || self.ly >= self.hy
    }

    pub fn area(&self) -> i64 {
        if self.is_degenerate() {
            0
        } else {
            self.width() * self.height()
        }
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            lx: self.lx.min(other.lx),
            ly: self.ly.min(other.ly),
            hx: self.hx.max(other.hx),
            hy: self.hy.max(other.hy),
        }
    }

    /// Reject inverted or out-of-range rectangles
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.lx <= self.hx && self.ly <= self.hy,
            "malformed rectangle ({}, {}, {}, {}): low corner exceeds high corner",
            self.lx, self.ly, self.hx, self.hy
        );
        for v in self.coords() {
            anyhow::ensure!(
                (-MAX_COORD..=MAX_COORD).contains(&v),
                "rectangle ({}, {}, {}, {}) exceeds the coordinate limit of +/-{}",
                self.lx, self.ly, self.hx, self.hy, MAX_COORD
            );
        }
        Ok(())
    }
}

/// A filled polygon with optional holes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Polygon {
    pub outer_ring: Vec<Point>,
    pub holes: Vec<Vec<Point>>,
}

/// One simple closed ring; the closing edge from the last vertex back to the
/// first is implicit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolyBase {
    pub points: Vec<Point>,
}

impl PolyBase {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn first_point(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn bounds(&self) -> Option<Rect> {
        let first = self.points.first()?;
        let mut r = Rect::new(first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            r.lx = r.lx.min(p.x);
            r.ly = r.ly.min(p.y);
            r.hx = r.hx.max(p.x);
            r.hy = r.hy.max(p.y);
        }
        Some(r)
    }
}

/// A ring plus the rings nested directly inside it.
///
/// Solidity alternates with depth: rings at even depth bound material,
/// rings at odd depth bound holes. It is never stored on the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolyBaseTree {
    pub poly: PolyBase,
    pub children: Vec<PolyBaseTree>,
}

impl PolyBaseTree {
    pub fn new(poly: PolyBase) -> Self {
        Self {
            poly,
            children: Vec::new(),
        }
    }

    /// Depth-first visit of this subtree; `depth` is the depth of `self`
    pub fn walk<F>(&self, depth: usize, visit: &mut F)
    where
        F: FnMut(&PolyBaseTree, usize),
    {
        visit(self, depth);
        for child in &self.children {
            child.walk(depth + 1, visit);
        }
    }

    /// Number of rings in this subtree
    pub fn ring_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.ring_count()).sum::<usize>()
    }

    /// The ring with its immediate holes, as a displayable polygon
    pub fn to_polygon(&self) -> Polygon {
        Polygon {
            outer_ring: self.poly.points.clone(),
            holes: self.children.iter().map(|c| c.poly.points.clone()).collect(),
        }
    }
}

/// Rings at even depth are solid, rings at odd depth are holes
pub fn is_solid_depth(depth: usize) -> bool {
    depth % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_degenerate_area() {
        assert_eq!(Rect::new(0, 0, 5, 5).area(), 25);
        assert_eq!(Rect::new(3, 0, 3, 10).area(), 0);
        assert!(Rect::new(0, 4, 10, 4).is_degenerate());
    }

    #[test]
    fn test_rect_validate() {
        assert!(Rect::new(0, 0, 1, 1).validate().is_ok());
        assert!(Rect::new(2, 0, 1, 1).validate().is_err());
        assert!(Rect::new(0, 0, MAX_COORD, 1).validate().is_ok());
        assert!(Rect::new(0, 0, MAX_COORD + 1, 1).validate().is_err());
    }

    #[test]
    fn test_tree_walk_depths() {
        let ring = |x: i32| PolyBase::new(vec![Point::new(x, 0), Point::new(x + 1, 0), Point::new(x + 1, 1)]);
        let mut hole = PolyBaseTree::new(ring(1));
        hole.children.push(PolyBaseTree::new(ring(2)));
        let mut root = PolyBaseTree::new(ring(0));
        root.children.push(hole);

        let mut seen = Vec::new();
        root.walk(0, &mut |node, depth| seen.push((node.poly.points[0].x, depth, is_solid_depth(depth))));
        assert_eq!(seen, vec![(0, 0, true), (1, 1, false), (2, 2, true)]);
        assert_eq!(root.ring_count(), 3);
    }
}
