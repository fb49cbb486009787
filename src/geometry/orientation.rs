//! The eight Manhattan placement orientations
//!
//! Each orientation is a 90-degree rotation, optionally preceded by a mirror.
//! Internally every variant maps to a 2x2 matrix with entries in {-1, 0, 1},
//! which makes composition a matrix product.

use serde::{Deserialize, Serialize};

use super::types::Point;

/// Placement orientation of a subcell instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ManhattanOrientation {
    #[default]
    R0,
    R90,
    R180,
    R270,
    /// Mirror x (x -> -x)
    MY,
    /// Mirror x, then rotate 90
    MYR90,
    /// Mirror y (y -> -y)
    MX,
    /// Mirror y, then rotate 90
    MXR90,
}

impl ManhattanOrientation {
    pub const ALL: [ManhattanOrientation; 8] = [
        Self::R0,
        Self::R90,
        Self::R180,
        Self::R270,
        Self::MY,
        Self::MYR90,
        Self::MX,
        Self::MXR90,
    ];

    /// Row-major `[a, b, c, d]`: `x' = a*x + b*y`, `y' = c*x + d*y`
    fn matrix(self) -> [i32; 4] {
        match self {
            Self::R0 => [1, 0, 0, 1],
            Self::R90 => [0, -1, 1, 0],
            Self::R180 => [-1, 0, 0, -1],
            Self::R270 => [0, 1, -1, 0],
            Self::MY => [-1, 0, 0, 1],
            Self::MYR90 => [0, -1, -1, 0],
            Self::MX => [1, 0, 0, -1],
            Self::MXR90 => [0, 1, 1, 0],
        }
    }

    fn from_matrix(m: [i32; 4]) -> Self {
        Self::ALL
            .into_iter()
            .find(|o| o.matrix() == m)
            .unwrap_or(Self::R0)
    }

    /// True for the four mirrored variants
    pub fn is_mirrored(self) -> bool {
        let m = self.matrix();
        m[0] * m[3] - m[1] * m[2] < 0
    }

    /// Orientation equivalent to applying `self` first and `outer` second
    pub fn concatenate(self, outer: ManhattanOrientation) -> ManhattanOrientation {
        let a = outer.matrix();
        let b = self.matrix();
        Self::from_matrix([
            a[0] * b[0] + a[1] * b[2],
            a[0] * b[1] + a[1] * b[3],
            a[2] * b[0] + a[3] * b[2],
            a[2] * b[1] + a[3] * b[3],
        ])
    }

    /// The orientation undoing `self`
    pub fn inverse(self) -> ManhattanOrientation {
        Self::ALL
            .into_iter()
            .find(|o| self.concatenate(*o) == Self::R0)
            .unwrap_or(Self::R0)
    }

    /// Transform a point about the origin, in 64-bit to stay exact for any
    /// `i32` input
    pub fn transform_xy(self, x: i64, y: i64) -> (i64, i64) {
        let m = self.matrix();
        (
            m[0] as i64 * x + m[1] as i64 * y,
            m[2] as i64 * x + m[3] as i64 * y,
        )
    }

    pub fn transform(self, p: Point) -> Point {
        let (x, y) = self.transform_xy(p.x as i64, p.y as i64);
        // Orientation matrices are signed permutations; only i32::MIN can overflow
        Point::new(x as i32, y as i32)
    }

    /// Transform `count` rectangles stored as `lx, ly, hx, hy` quadruples,
    /// starting at rectangle index `offset`. Corners are renormalized so
    /// that `lx <= hx` and `ly <= hy` still hold.
    pub fn transform_rects(self, coords: &mut [i32], offset: usize, count: usize) {
        if self == Self::R0 {
            return;
        }
        for rect in coords[offset * 4..(offset + count) * 4].chunks_exact_mut(4) {
            let (x0, y0) = self.transform_xy(rect[0] as i64, rect[1] as i64);
            let (x1, y1) = self.transform_xy(rect[2] as i64, rect[3] as i64);
            rect[0] = x0.min(x1) as i32;
            rect[1] = y0.min(y1) as i32;
            rect[2] = x0.max(x1) as i32;
            rect[3] = y0.max(y1) as i32;
        }
    }
}
