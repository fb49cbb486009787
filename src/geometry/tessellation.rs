//! Triangulation of violation shapes for display
//!
//! Shapes reported with `REPORT_TILES` are merged rings with holes. They are
//! cut into triangles with earcut and shipped as base64-encoded little-endian
//! buffers, which keeps the JSON payload compact for large shapes.

use base64::{engine::general_purpose, Engine as _};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Serialize, Serializer};

use super::types::Polygon;

/// Triangle buffers for one shape
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShapeTiles {
    /// Flat `[x0, y0, x1, y1, ...]`
    #[serde(serialize_with = "serialize_f32_vec_base64")]
    pub vertex_data: Vec<f32>,
    /// Three indices per triangle into `vertex_data` pairs
    #[serde(serialize_with = "serialize_u32_vec_base64")]
    pub index_data: Vec<u32>,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

/// Serialize Vec<f32> as a base64 string of little-endian floats
pub fn serialize_f32_vec_base64<S>(data: &[f32], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut bytes = vec![0u8; data.len() * 4];
    LittleEndian::write_f32_into(data, &mut bytes);
    serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
}

/// Serialize Vec<u32> as a base64 string of little-endian integers
pub fn serialize_u32_vec_base64<S>(data: &[u32], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut bytes = vec![0u8; data.len() * 4];
    LittleEndian::write_u32_into(data, &mut bytes);
    serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
}

/// Tessellate a ring with holes using earcut triangulation.
/// Rings with fewer than three vertices are skipped.
pub fn tessellate_polygon(polygon: &Polygon) -> ShapeTiles {
    if polygon.outer_ring.len() < 3 {
        return ShapeTiles::default();
    }

    let mut flat_coords: Vec<f64> = Vec::new();
    let mut hole_indices: Vec<usize> = Vec::new();

    for p in &polygon.outer_ring {
        flat_coords.push(p.x as f64);
        flat_coords.push(p.y as f64);
    }

    for hole in &polygon.holes {
        if hole.len() < 3 {
            continue;
        }
        hole_indices.push(flat_coords.len() / 2);
        for p in hole {
            flat_coords.push(p.x as f64);
            flat_coords.push(p.y as f64);
        }
    }

    let indices = earcutr::earcut(&flat_coords, &hole_indices, 2).unwrap_or_default();

    let vertex_data: Vec<f32> = flat_coords.iter().map(|&v| v as f32).collect();
    let index_data: Vec<u32> = indices.iter().map(|&i| i as u32).collect();

    ShapeTiles {
        vertex_count: vertex_data.len() / 2,
        triangle_count: index_data.len() / 3,
        vertex_data,
        index_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::types::Point;

    fn square(lx: i32, ly: i32, hx: i32, hy: i32) -> Vec<Point> {
        vec![
            Point::new(lx, ly),
            Point::new(hx, ly),
            Point::new(hx, hy),
            Point::new(lx, hy),
        ]
    }

    #[test]
    fn test_tessellate_square() {
        let tiles = tessellate_polygon(&Polygon {
            outer_ring: square(0, 0, 10, 10),
            holes: vec![],
        });
        assert_eq!(tiles.vertex_count, 4);
        assert_eq!(tiles.triangle_count, 2);
    }

    #[test]
    fn test_tessellate_square_with_hole() {
        let mut hole = square(3, 3, 6, 6);
        hole.reverse();
        let tiles = tessellate_polygon(&Polygon {
            outer_ring: square(0, 0, 10, 10),
            holes: vec![hole],
        });
        assert_eq!(tiles.vertex_count, 8);
        // A quad with one quad hole needs 8 triangles
        assert_eq!(tiles.triangle_count, 8);
    }

    #[test]
    fn test_base64_buffers() {
        let tiles = ShapeTiles {
            vertex_data: vec![1.0, 2.0],
            index_data: vec![7],
            vertex_count: 1,
            triangle_count: 0,
        };
        let json = serde_json::to_value(&tiles).unwrap();
        let encoded = json["index_data"].as_str().unwrap();
        let bytes = general_purpose::STANDARD.decode(encoded).unwrap();
        assert_eq!(bytes, vec![7, 0, 0, 0]);
    }
}
