//! Geometry module for Manhattan layout data
//!
//! This module provides the geometric types shared by the merge engine, the
//! checker and the server.
//!
//! # Submodules
//! - `types` - Core primitives (Point, Rect, PolyBase, PolyBaseTree)
//! - `orientation` - The eight Manhattan placement orientations
//! - `spatial` - Spatial indexing for violation picking
//! - `tessellation` - Triangulation of violation shapes for display

mod types;
mod orientation;
mod spatial;
mod tessellation;

pub use types::{
    MAX_COORD,
    Point,
    Rect,
    Polygon,
    PolyBase,
    PolyBaseTree,
    is_solid_depth,
};

pub use orientation::ManhattanOrientation;

pub use spatial::ViolationEntry;

pub use tessellation::{
    ShapeTiles,
    tessellate_polygon,
    serialize_f32_vec_base64,
    serialize_u32_vec_base64,
};
