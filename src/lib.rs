//! Minimum-area design rule checking for Manhattan layouts
//!
//! Rectangles from a cell hierarchy are merged into polygons by a
//! left-to-right sweep (DeltaMerge) whose vertical boundary changes are
//! staged as a byte stream and read back into nested rings (UnloadPolys).
//! Every merged polygon with a net area below the layer minimum is reported.
//!
//! # Modules
//! - `geometry` - Points, rectangles, rings, orientations, display helpers
//! - `merge` - The rectangle union engine
//! - `drc` - Hierarchy flattening, area measurement and the check drivers
//! - `layout` - Layout libraries loaded from JSON or MessagePack
//! - `server` - JSON-RPC check server used by the `drc_server` binary
//!
//! # Example
//! ```ignore
//! let library = Library::load("design.json")?;
//! let reports = run_min_area_drc(&library, "TOP", &DesignRules::uniform(30), &CheckParameters::default(), None)?;
//! ```

pub mod geometry;
pub mod merge;
pub mod drc;
pub mod layout;
pub mod server;
