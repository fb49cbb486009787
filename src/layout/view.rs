//! One layer of a library cell seen through the checker's cell interface

use crate::drc::LayoutCell;
use crate::geometry::ManhattanOrientation;

use super::library::{CellDef, Library};

/// A cell restricted to one layer; subcells are viewed on the same layer
#[derive(Debug, Clone, Copy)]
pub struct LayerView<'a> {
    library: &'a Library,
    cell: &'a CellDef,
    layer: &'a str,
}

impl<'a> LayerView<'a> {
    pub fn new(library: &'a Library, cell: &'a CellDef, layer: &'a str) -> Self {
        Self { library, cell, layer }
    }

    pub fn layer(&self) -> &str {
        self.layer
    }

    fn rects(&self) -> &'a [[i32; 4]] {
        self.cell
            .layers
            .get(self.layer)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }
}

impl LayoutCell for LayerView<'_> {
    fn num_rectangles(&self) -> usize {
        self.rects().len()
    }

    fn read_rectangle_coords(&self, buf: &mut [i32], offset: usize, count: usize) -> anyhow::Result<()> {
        let rects = self.rects();
        let end = offset
            .checked_add(count)
            .filter(|&end| end <= rects.len())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "rectangle range {}..{} out of bounds for layer '{}' ({} rectangles)",
                    offset,
                    offset.saturating_add(count),
                    self.layer,
                    rects.len()
                )
            })?;
        anyhow::ensure!(
            buf.len() >= count * 4,
            "coordinate buffer holds {} values, {} needed",
            buf.len(),
            count * 4
        );
        for (dst, src) in buf.chunks_exact_mut(4).zip(&rects[offset..end]) {
            dst.copy_from_slice(src);
        }
        Ok(())
    }

    fn num_subcells(&self) -> usize {
        self.cell.instances.len()
    }

    fn traverse_subcell_instances(
        &self,
        handler: &mut dyn FnMut(&dyn LayoutCell, i32, i32, ManhattanOrientation) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        for inst in &self.cell.instances {
            let sub = self
                .library
                .cell(&inst.cell)
                .ok_or_else(|| anyhow::anyhow!("unknown cell '{}'", inst.cell))?;
            let view = LayerView::new(self.library, sub, self.layer);
            handler(&view, inst.x, inst.y, inst.orientation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_reads_one_layer() {
        let lib = Library::from_json_str(
            r#"{ "cells": {
                "TOP": {
                    "layers": { "M1": [[0, 0, 1, 1], [2, 2, 3, 3]], "M2": [[9, 9, 10, 10]] },
                    "instances": [{ "cell": "SUB", "x": 5, "y": 6, "orientation": "MX" }]
                },
                "SUB": { "layers": { "M2": [[0, 0, 1, 1]] } }
            } }"#,
        )
        .unwrap();
        let view = lib.layer_view("TOP", "M1").unwrap();
        assert_eq!(view.num_rectangles(), 2);
        assert_eq!(view.num_subcells(), 1);

        let mut buf = [0; 4];
        view.read_rectangle_coords(&mut buf, 1, 1).unwrap();
        assert_eq!(buf, [2, 2, 3, 3]);
        assert!(view.read_rectangle_coords(&mut buf, 2, 1).is_err());

        let mut seen = Vec::new();
        view.traverse_subcell_instances(&mut |sub, x, y, o| {
            seen.push((sub.num_rectangles(), x, y, o));
            Ok(())
        })
        .unwrap();
        // SUB has nothing on M1
        assert_eq!(seen, vec![(0, 5, 6, ManhattanOrientation::MX)]);
    }
}
