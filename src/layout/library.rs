//! Layout library: named cells with per-layer rectangles and instances

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::geometry::{ManhattanOrientation, Rect};

use super::view::LayerView;

/// Placement of one cell inside another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub cell: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub orientation: ManhattanOrientation,
}

/// One cell definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDef {
    /// Rectangles `[lx, ly, hx, hy]` keyed by layer name
    #[serde(default)]
    pub layers: IndexMap<String, Vec<[i32; 4]>>,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

impl CellDef {
    pub fn rect_count(&self) -> usize {
        self.layers.values().map(|r| r.len()).sum()
    }

    /// Bounding box of the rectangles placed directly in this cell
    pub fn local_bounds(&self) -> Option<Rect> {
        self.layers
            .values()
            .flatten()
            .map(|c| Rect::from_coords(*c))
            .reduce(|a, b| a.union(&b))
    }
}

/// Summary of one cell for listings
#[derive(Debug, Clone, Serialize)]
pub struct CellInfo {
    pub name: String,
    pub rectangles: usize,
    pub instances: usize,
    pub bounds: Option<Rect>,
    pub is_top: bool,
}

/// A set of cells, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    #[serde(default)]
    pub name: String,
    pub cells: IndexMap<String, CellDef>,
}

impl Library {
    /// Loads and validates a layout library
    ///
    /// # Arguments
    /// * `path` - JSON file, or MessagePack when the extension is `.msgpack` or `.mpk`
    ///
    /// # Example
    /// ```ignore
    /// let library = Library::load("tests/fixtures/hierarchy.json")?;
    /// println!("{} cells", library.cells.len());
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Library> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read layout file {}", path.display()))?;
        let is_msgpack = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("msgpack") || e.eq_ignore_ascii_case("mpk"))
            .unwrap_or(false);
        let library: Library = if is_msgpack {
            rmp_serde::from_slice(&bytes)
                .with_context(|| format!("Failed to decode MessagePack layout {}", path.display()))?
        } else {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to parse JSON layout {}", path.display()))?
        };
        library.validate()?;
        Ok(library)
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Library> {
        let library: Library = serde_json::from_str(json).context("Failed to parse JSON layout")?;
        library.validate()?;
        Ok(library)
    }

    /// Check instance references, acyclic hierarchy and rectangle bounds
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, cell) in &self.cells {
            for (layer, rects) in &cell.layers {
                for r in rects {
                    Rect::from_coords(*r)
                        .validate()
                        .with_context(|| format!("in cell '{}', layer '{}'", name, layer))?;
                }
            }
            for inst in &cell.instances {
                anyhow::ensure!(
                    self.cells.contains_key(&inst.cell),
                    "cell '{}' instantiates unknown cell '{}'",
                    name,
                    inst.cell
                );
            }
        }
        self.check_acyclic()
    }

    fn check_acyclic(&self) -> anyhow::Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }
        let mut marks = vec![Mark::Unvisited; self.cells.len()];
        // Explicit stack of (cell index, next instance index)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..self.cells.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::Active;
            stack.push((root, 0));
            while let Some((idx, next)) = stack.last_mut() {
                let (name, cell) = match self.cells.get_index(*idx) {
                    Some(entry) => entry,
                    None => break,
                };
                match cell.instances.get(*next) {
                    Some(inst) => {
                        *next += 1;
                        let child = self.cells.get_index_of(&inst.cell).ok_or_else(|| {
                            anyhow::anyhow!("cell '{}' instantiates unknown cell '{}'", name, inst.cell)
                        })?;
                        match marks[child] {
                            Mark::Active => anyhow::bail!(
                                "instance cycle: cell '{}' is instantiated inside itself via '{}'",
                                inst.cell,
                                name
                            ),
                            Mark::Unvisited => {
                                marks[child] = Mark::Active;
                                stack.push((child, 0));
                            }
                            Mark::Done => {}
                        }
                    }
                    None => {
                        marks[*idx] = Mark::Done;
                        stack.pop();
                    }
                }
            }
        }
        Ok(())
    }

    pub fn cell(&self, name: &str) -> Option<&CellDef> {
        self.cells.get(name)
    }

    /// Every layer name used by any cell, in first-seen order
    pub fn layer_names(&self) -> Vec<String> {
        let names: IndexSet<&String> = self.cells.values().flat_map(|c| c.layers.keys()).collect();
        names.into_iter().cloned().collect()
    }

    /// Cells not instantiated by any other cell
    pub fn top_cells(&self) -> Vec<&str> {
        let mut used: HashMap<&str, usize> = HashMap::new();
        for cell in self.cells.values() {
            for inst in &cell.instances {
                *used.entry(inst.cell.as_str()).or_default() += 1;
            }
        }
        self.cells
            .keys()
            .map(|k| k.as_str())
            .filter(|k| !used.contains_key(k))
            .collect()
    }

    /// The requested cell, or the first top cell when none is named
    pub fn resolve_top_cell<'a>(&'a self, requested: Option<&'a str>) -> anyhow::Result<&'a str> {
        match requested {
            Some(name) => {
                anyhow::ensure!(self.cells.contains_key(name), "unknown cell '{}'", name);
                Ok(name)
            }
            None => self
                .top_cells()
                .first()
                .copied()
                .ok_or_else(|| anyhow::anyhow!("layout has no top cell")),
        }
    }

    pub fn cell_infos(&self) -> Vec<CellInfo> {
        let tops: Vec<&str> = self.top_cells();
        self.cells
            .iter()
            .map(|(name, cell)| CellInfo {
                name: name.clone(),
                rectangles: cell.rect_count(),
                instances: cell.instances.len(),
                bounds: cell.local_bounds(),
                is_top: tops.contains(&name.as_str()),
            })
            .collect()
    }

    /// View of `layer` under `cell` for the checker
    pub fn layer_view<'a>(&'a self, cell: &str, layer: &'a str) -> anyhow::Result<LayerView<'a>> {
        let def = self
            .cells
            .get(cell)
            .ok_or_else(|| anyhow::anyhow!("unknown cell '{}'", cell))?;
        Ok(LayerView::new(self, def, layer))
    }
}
