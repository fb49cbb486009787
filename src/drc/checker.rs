//! Min-area check of one layer hierarchy
//!
//! Flatten, sort, sweep into a staged delta stream, rebuild the ring forest
//! and measure every solid ring against the minimum.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use serde::Serialize;

use crate::geometry::is_solid_depth;
use crate::merge::{DeltaMerge, DeltaReader, DeltaSpool, DeltaWriter, PointsSorter, UnloadPolys};

use super::area::net_area;
use super::flatten::{flatten_into, LayoutCell};
use super::types::{CheckParameters, ErrorLogger};

/// Diagnostics of one check
#[derive(Clone, Debug, Default, Serialize)]
pub struct CheckSummary {
    /// Rectangles read from the hierarchy, degenerate ones included
    pub rectangles: usize,
    pub skipped_rectangles: usize,
    pub delta_records: u64,
    pub rings: usize,
    /// Solid rings measured
    pub polygons: usize,
    pub violations: usize,
    /// Net covered area over all polygons
    pub total_area: i64,
    pub spilled: bool,
}

/// Report every merged polygon under `top_cell` whose net area is below
/// `min_area`
pub fn check(
    top_cell: &dyn LayoutCell,
    min_area: i64,
    params: &CheckParameters,
    logger: &mut dyn ErrorLogger,
) -> anyhow::Result<CheckSummary> {
    check_with_cancel(top_cell, min_area, params, None, logger)
}

/// [`check`] that gives up with [`crate::merge::Cancelled`] once `cancel` is set
pub fn check_with_cancel(
    top_cell: &dyn LayoutCell,
    min_area: i64,
    params: &CheckParameters,
    cancel: Option<Arc<AtomicBool>>,
    logger: &mut dyn ErrorLogger,
) -> anyhow::Result<CheckSummary> {
    let start = Instant::now();
    let mut summary = CheckSummary::default();

    let mut sorter = PointsSorter::new();
    let flat = flatten_into(top_cell, &mut sorter, cancel.as_deref())?;
    summary.rectangles = flat.rectangles;
    summary.skipped_rectangles = sorter.skipped_count();
    log::debug!(
        "[MinArea] Flattened {} rectangles from {} placements in {:?}",
        flat.rectangles,
        flat.placements,
        start.elapsed()
    );

    let spool = if sorter.rect_count() > params.spill_threshold {
        summary.spilled = true;
        DeltaSpool::on_disk()?
    } else {
        DeltaSpool::in_memory()
    };
    let mut writer = DeltaWriter::new(spool).context("failed to start delta stream")?;
    let mut merge = DeltaMerge::new();
    if let Some(flag) = cancel {
        merge = merge.with_cancel(flag, params.cancel_poll_interval);
    }
    merge.run(sorter.into_events(), &mut writer)?;
    summary.delta_records = writer.record_count();
    let spool = writer.finish().context("failed to finish delta stream")?;

    let mut reader = DeltaReader::new(spool.into_reader()?)?;
    let (forest, unload) = UnloadPolys::new().run(&mut reader)?;
    summary.rings = unload.rings;

    for tree in &forest {
        tree.walk(0, &mut |node, depth| {
            if !is_solid_depth(depth) {
                return;
            }
            let area = net_area(node);
            summary.polygons += 1;
            summary.total_area = summary.total_area.saturating_add(area);
            if area < min_area {
                summary.violations += 1;
                let location = node.poly.points.first().copied().unwrap_or_default();
                let shape = params.report_tiles.then(|| node.to_polygon());
                logger.report_min_area_violation(area, location.x, location.y, shape);
            }
        });
    }

    log::debug!(
        "[MinArea] {} polygons, {} violations, total area {} in {:?}{}",
        summary.polygons,
        summary.violations,
        summary.total_area,
        start.elapsed(),
        if summary.spilled { " (spilled)" } else { "" }
    );
    Ok(summary)
}
