//! Hierarchy flattening into the sorter
//!
//! Cells are visited depth first. Each visit carries the transform from the
//! cell's coordinates to the top cell: the instance orientation is applied
//! first, then the parent's, and the instance anchor is mapped through the
//! parent transform before being added to the parent translation.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::geometry::{ManhattanOrientation, Rect, MAX_COORD};
use crate::merge::{Cancelled, PointsSorter};

/// Rectangles read from a cell per call
const READ_BATCH: usize = 1024;

/// Deepest instance nesting accepted before the hierarchy is assumed cyclic
pub const MAX_HIERARCHY_DEPTH: usize = 512;

/// Read-only view of one layer of a layout cell
pub trait LayoutCell {
    /// Rectangles placed directly in this cell
    fn num_rectangles(&self) -> usize;

    /// Copy `count` rectangles starting at rectangle index `offset` into
    /// `buf` as `lx, ly, hx, hy` quadruples
    fn read_rectangle_coords(&self, buf: &mut [i32], offset: usize, count: usize) -> anyhow::Result<()>;

    fn num_subcells(&self) -> usize;

    /// Call `handler` once per subcell instance with the instantiated cell,
    /// its anchor in this cell's coordinates and its orientation
    fn traverse_subcell_instances(
        &self,
        handler: &mut dyn FnMut(&dyn LayoutCell, i32, i32, ManhattanOrientation) -> anyhow::Result<()>,
    ) -> anyhow::Result<()>;
}

/// Cell-to-top transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub orientation: ManhattanOrientation,
    pub dx: i64,
    pub dy: i64,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            orientation: ManhattanOrientation::R0,
            dx: 0,
            dy: 0,
        }
    }
}

impl Placement {
    /// Transform of an instance placed at `(x, y)` with `orientation`
    /// inside a cell placed by `self`
    pub fn child(&self, x: i32, y: i32, orientation: ManhattanOrientation) -> anyhow::Result<Placement> {
        let (ax, ay) = self.orientation.transform_xy(x as i64, y as i64);
        let dx = ax.checked_add(self.dx);
        let dy = ay.checked_add(self.dy);
        match (dx, dy) {
            (Some(dx), Some(dy)) => Ok(Placement {
                orientation: orientation.concatenate(self.orientation),
                dx,
                dy,
            }),
            _ => anyhow::bail!("instance translation overflows at anchor ({}, {})", x, y),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlattenStats {
    /// Rectangles pushed, degenerate ones included
    pub rectangles: usize,
    /// Cell instances visited, the top cell included
    pub placements: usize,
    pub max_depth: usize,
}

/// Push every rectangle under `top`, in top-cell coordinates, into `sorter`
pub fn flatten_into(
    top: &dyn LayoutCell,
    sorter: &mut PointsSorter,
    cancel: Option<&AtomicBool>,
) -> anyhow::Result<FlattenStats> {
    let mut flattener = Flattener {
        sorter,
        cancel,
        buf: Vec::new(),
        stats: FlattenStats::default(),
    };
    flattener.visit(top, Placement::default(), 0)?;
    Ok(flattener.stats)
}

struct Flattener<'a> {
    sorter: &'a mut PointsSorter,
    cancel: Option<&'a AtomicBool>,
    buf: Vec<i32>,
    stats: FlattenStats,
}

impl Flattener<'_> {
    fn visit(&mut self, cell: &dyn LayoutCell, placement: Placement, depth: usize) -> anyhow::Result<()> {
        anyhow::ensure!(
            depth <= MAX_HIERARCHY_DEPTH,
            "cell hierarchy deeper than {} levels (instance cycle?)",
            MAX_HIERARCHY_DEPTH
        );
        if self.cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false) {
            return Err(Cancelled.into());
        }
        self.stats.placements += 1;
        self.stats.max_depth = self.stats.max_depth.max(depth);

        let total = cell.num_rectangles();
        let mut offset = 0;
        while offset < total {
            let count = READ_BATCH.min(total - offset);
            self.buf.clear();
            self.buf.resize(count * 4, 0);
            cell.read_rectangle_coords(&mut self.buf, offset, count)?;
            self.push_batch(&placement, count)?;
            offset += count;
        }

        if cell.num_subcells() > 0 {
            cell.traverse_subcell_instances(&mut |sub, x, y, orientation| {
                let child = placement.child(x, y, orientation)?;
                self.visit(sub, child, depth + 1)
            })?;
        }
        Ok(())
    }

    fn push_batch(&mut self, placement: &Placement, count: usize) -> anyhow::Result<()> {
        // Local coordinates must be in range for the in-place rotation to be exact
        for rect in self.buf.chunks_exact(4) {
            Rect::new(rect[0], rect[1], rect[2], rect[3]).validate()?;
        }
        placement.orientation.transform_rects(&mut self.buf, 0, count);

        for rect in self.buf.chunks_exact(4) {
            let lx = translate(rect[0], placement.dx)?;
            let ly = translate(rect[1], placement.dy)?;
            let hx = translate(rect[2], placement.dx)?;
            let hy = translate(rect[3], placement.dy)?;
            self.sorter.put(lx, ly, hx, hy)?;
            self.stats.rectangles += 1;
        }
        Ok(())
    }
}

fn translate(v: i32, d: i64) -> anyhow::Result<i32> {
    let moved = v as i64 + d;
    anyhow::ensure!(
        (-(MAX_COORD as i64)..=MAX_COORD as i64).contains(&moved),
        "flattened coordinate {} exceeds the coordinate limit of +/-{}",
        moved,
        MAX_COORD
    );
    Ok(moved as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestCell {
        rects: Vec<[i32; 4]>,
        subs: Vec<(TestCell, i32, i32, ManhattanOrientation)>,
    }

    impl LayoutCell for TestCell {
        fn num_rectangles(&self) -> usize {
            self.rects.len()
        }

        fn read_rectangle_coords(&self, buf: &mut [i32], offset: usize, count: usize) -> anyhow::Result<()> {
            for (i, r) in self.rects[offset..offset + count].iter().enumerate() {
                buf[i * 4..i * 4 + 4].copy_from_slice(r);
            }
            Ok(())
        }

        fn num_subcells(&self) -> usize {
            self.subs.len()
        }

        fn traverse_subcell_instances(
            &self,
            handler: &mut dyn FnMut(&dyn LayoutCell, i32, i32, ManhattanOrientation) -> anyhow::Result<()>,
        ) -> anyhow::Result<()> {
            for (cell, x, y, o) in &self.subs {
                handler(cell, *x, *y, *o)?;
            }
            Ok(())
        }
    }

    fn leaf(rects: Vec<[i32; 4]>) -> TestCell {
        TestCell { rects, subs: Vec::new() }
    }

    fn flattened(top: &TestCell) -> Vec<(i32, i32, i32)> {
        let mut sorter = PointsSorter::new();
        flatten_into(top, &mut sorter, None).unwrap();
        sorter
            .into_events()
            .map(|e| (e.x, e.y0, e.y1))
            .collect()
    }

    #[test]
    fn test_translated_instance() {
        let top = TestCell {
            rects: Vec::new(),
            subs: vec![(leaf(vec![[0, 0, 2, 1]]), 10, 20, ManhattanOrientation::R0)],
        };
        assert_eq!(flattened(&top), vec![(10, 20, 21), (12, 20, 21)]);
    }

    #[test]
    fn test_nested_rotation_applies_child_first() {
        // Inner rect rotated by R90 inside a child, child rotated by R90 in top
        let child = TestCell {
            rects: Vec::new(),
            subs: vec![(leaf(vec![[1, 0, 3, 1]]), 0, 0, ManhattanOrientation::R90)],
        };
        let top = TestCell {
            rects: Vec::new(),
            subs: vec![(child, 5, 0, ManhattanOrientation::R90)],
        };
        // R180 overall: (1,0)-(3,1) -> (-3,-1)-(-1,0), then shifted by the child anchor
        assert_eq!(flattened(&top), vec![(2, -1, 0), (4, -1, 0)]);
    }

    #[test]
    fn test_placement_child_composition() {
        let parent = Placement {
            orientation: ManhattanOrientation::MX,
            dx: 100,
            dy: 0,
        };
        let child = parent.child(3, 4, ManhattanOrientation::R90).unwrap();
        assert_eq!(child.orientation, ManhattanOrientation::R90.concatenate(ManhattanOrientation::MX));
        assert_eq!((child.dx, child.dy), (103, -4));
    }

    #[test]
    fn test_out_of_range_translation_is_fatal() {
        let top = TestCell {
            rects: Vec::new(),
            subs: vec![(leaf(vec![[0, 0, 10, 10]]), MAX_COORD - 5, 0, ManhattanOrientation::R0)],
        };
        let mut sorter = PointsSorter::new();
        let err = flatten_into(&top, &mut sorter, None).unwrap_err();
        assert!(err.to_string().contains("coordinate limit"));
    }

    #[test]
    fn test_cancel_stops_flattening() {
        let top = leaf(vec![[0, 0, 1, 1]]);
        let flag = AtomicBool::new(true);
        let mut sorter = PointsSorter::new();
        let err = flatten_into(&top, &mut sorter, Some(&flag)).unwrap_err();
        assert!(err.is::<Cancelled>());
    }

    #[test]
    fn test_batches_cover_every_rectangle() {
        let rects: Vec<[i32; 4]> = (0..(READ_BATCH as i32 + 10))
            .map(|i| [i * 2, 0, i * 2 + 1, 1])
            .collect();
        let top = leaf(rects);
        let mut sorter = PointsSorter::new();
        let stats = flatten_into(&top, &mut sorter, None).unwrap();
        assert_eq!(stats.rectangles, READ_BATCH + 10);
        assert_eq!(sorter.rect_count(), READ_BATCH + 10);
    }
}
