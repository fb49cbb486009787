//! Layout libraries feeding the checker
//!
//! # Submodules
//! - `library` - Cells, instances, loading (JSON / MessagePack) and validation
//! - `view` - Per-layer cell views implementing `LayoutCell`

mod library;
mod view;

pub use library::{CellDef, CellInfo, Instance, Library};

pub use view::LayerView;
