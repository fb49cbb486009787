//! Exact polygon areas on the integer grid

use crate::geometry::{Point, PolyBaseTree};

/// Twice the signed area of a ring (positive for counter-clockwise)
fn twice_signed_area(points: &[Point]) -> i128 {
    let n = points.len();
    if n < 3 {
        return 0;
    }
    (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x as i128 * b.y as i128 - b.x as i128 * a.y as i128
        })
        .sum()
}

/// Unsigned area enclosed by a ring, in grid units squared
pub fn ring_area(points: &[Point]) -> i128 {
    twice_signed_area(points).abs() / 2
}

/// Area of a solid ring minus the areas of its immediate holes
pub fn net_area(tree: &PolyBaseTree) -> i64 {
    let holes: i128 = tree.children.iter().map(|c| ring_area(&c.poly.points)).sum();
    let net = ring_area(&tree.poly.points) - holes;
    // Rings stay inside +/-MAX_COORD, so the area fits comfortably
    i64::try_from(net).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PolyBase;

    fn ring(coords: &[(i32, i32)]) -> PolyBase {
        PolyBase::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn test_ring_area_ignores_orientation() {
        let ccw = ring(&[(0, 0), (5, 0), (5, 5), (0, 5)]);
        let cw = ring(&[(0, 0), (0, 5), (5, 5), (5, 0)]);
        assert_eq!(ring_area(&ccw.points), 25);
        assert_eq!(ring_area(&cw.points), 25);
        assert_eq!(twice_signed_area(&ccw.points), 50);
    }

    #[test]
    fn test_net_area_subtracts_holes() {
        let mut tree = PolyBaseTree::new(ring(&[(0, 0), (100, 0), (100, 100), (0, 100)]));
        tree.children.push(PolyBaseTree::new(ring(&[(40, 40), (40, 60), (60, 60), (60, 40)])));
        assert_eq!(net_area(&tree), 9600);
    }

    #[test]
    fn test_large_coordinates_are_exact() {
        let m = crate::geometry::MAX_COORD;
        let big = ring(&[(-m, -m), (m, -m), (m, m), (-m, m)]);
        let side = 2 * m as i128;
        assert_eq!(ring_area(&big.points), side * side);
    }
}
