//! Design Rule Check (DRC) for minimum polygon area
//!
//! Flattens a cell hierarchy into rectangles, merges them into polygons with
//! the DeltaMerge engine and reports every polygon whose net area is below
//! the layer minimum. Layers are checked in parallel with Rayon.
//!
//! # Submodules
//! - `types` - Violations, parameters, rules and the violation sink
//! - `flatten` - The `LayoutCell` interface and hierarchy flattening
//! - `area` - Exact ring and net areas
//! - `checker` - Single-layer check driver
//! - `runners` - Multi-layer entry points

mod types;
mod flatten;
mod area;
mod checker;
mod runners;

// Re-export public types
pub use types::{
    CheckParameters,
    DesignRules,
    ErrorLogger,
    MinAreaRule,
    MinAreaViolation,
    ViolationCollector,
    DEFAULT_SPILL_THRESHOLD,
};

pub use flatten::{flatten_into, FlattenStats, LayoutCell, Placement, MAX_HIERARCHY_DEPTH};

pub use area::{net_area, ring_area};

pub use checker::{check, check_with_cancel, CheckSummary};

// Re-export runner functions
pub use runners::{
    run_min_area_drc,
    run_min_area_drc_on_layers,
    LayerReport,
};
