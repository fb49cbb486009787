//! DRC runner functions
//!
//! Entry points running the min-area check over the layers of a library,
//! one independent check per layer on the rayon pool.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;

use crate::layout::Library;

use super::checker::{check_with_cancel, CheckSummary};
use super::types::{CheckParameters, DesignRules, MinAreaViolation, ViolationCollector};

/// Result of checking one layer
#[derive(Clone, Debug, Serialize)]
pub struct LayerReport {
    pub layer: String,
    pub min_area: i64,
    pub violations: Vec<MinAreaViolation>,
    pub summary: CheckSummary,
    pub elapsed_ms: f64,
}

/// Run the min-area check on every layer of `library` under `top_cell`
pub fn run_min_area_drc(
    library: &Library,
    top_cell: &str,
    rules: &DesignRules,
    params: &CheckParameters,
    cancel: Option<Arc<AtomicBool>>,
) -> anyhow::Result<Vec<LayerReport>> {
    let layers = library.layer_names();
    run_min_area_drc_on_layers(library, top_cell, &layers, rules, params, cancel)
}

/// Run the min-area check on the named layers only
pub fn run_min_area_drc_on_layers(
    library: &Library,
    top_cell: &str,
    layers: &[String],
    rules: &DesignRules,
    params: &CheckParameters,
    cancel: Option<Arc<AtomicBool>>,
) -> anyhow::Result<Vec<LayerReport>> {
    let start = Instant::now();
    anyhow::ensure!(library.cell(top_cell).is_some(), "unknown cell '{}'", top_cell);

    log::info!("[DRC] Checking {} layers under cell '{}'", layers.len(), top_cell);

    // Parallel per-layer DRC
    let reports: Vec<LayerReport> = layers
        .par_iter()
        .map(|layer| -> anyhow::Result<LayerReport> {
            let layer_start = Instant::now();
            let min_area = rules.min_area_for(layer);
            let view = library.layer_view(top_cell, layer)?;
            let mut collector = ViolationCollector::new(layer, min_area);
            let summary = check_with_cancel(&view, min_area, params, cancel.clone(), &mut collector)?;
            Ok(LayerReport {
                layer: layer.clone(),
                min_area,
                violations: collector.into_violations(),
                summary,
                elapsed_ms: layer_start.elapsed().as_secs_f64() * 1000.0,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let violations: usize = reports.iter().map(|r| r.violations.len()).sum();
    log::info!(
        "[DRC] Min-area check completed: {} layers, {} violations found in {:?}",
        reports.len(),
        violations,
        start.elapsed()
    );
    Ok(reports)
}
