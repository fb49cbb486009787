//! Server state management for the check server

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rstar::RTree;

use crate::drc::{CheckParameters, DesignRules, LayerReport, MinAreaViolation};
use crate::geometry::ViolationEntry;
use crate::layout::Library;

/// In-memory state: loaded library, rules and the last check's results
pub struct ServerState {
    pub file_path: Option<String>,
    pub library: Option<Arc<Library>>,
    pub design_rules: DesignRules,
    pub parameters: CheckParameters,
    pub reports: Vec<LayerReport>,
    /// Violations of all layers, in report order
    pub violations: Vec<MinAreaViolation>,
    pub violation_index: Option<RTree<ViolationEntry>>,
    /// Cancel flag of the running check, if any
    pub running_check: Option<Arc<AtomicBool>>,
    /// Bumped when a check starts or its results are invalidated
    pub check_generation: u64,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            file_path: None,
            library: None,
            design_rules: DesignRules::default(),
            parameters: CheckParameters::default(),
            reports: Vec::new(),
            violations: Vec::new(),
            violation_index: None,
            running_check: None,
            check_generation: 0,
        }
    }

    /// Check if a layout is loaded
    pub fn is_file_loaded(&self) -> bool {
        self.library.is_some()
    }

    pub fn is_check_running(&self) -> bool {
        self.running_check.is_some()
    }

    /// Ask the running check to stop. Returns false when none is running.
    pub fn cancel_check(&self) -> bool {
        match &self.running_check {
            Some(flag) => {
                flag.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Replace cached results and rebuild the violation index
    pub fn store_reports(&mut self, reports: Vec<LayerReport>) {
        self.violations = reports.iter().flat_map(|r| r.violations.iter().cloned()).collect();
        let entries: Vec<ViolationEntry> = self
            .violations
            .iter()
            .enumerate()
            .map(|(i, v)| ViolationEntry::new(i, &v.layer, &v.bounds))
            .collect();
        self.violation_index = Some(RTree::bulk_load(entries));
        self.reports = reports;
    }

    /// Register a new background check and return its generation
    pub fn begin_check(&mut self, cancel: Arc<AtomicBool>) -> u64 {
        self.check_generation += 1;
        self.running_check = Some(cancel);
        self.check_generation
    }

    pub fn clear_results(&mut self) {
        self.reports.clear();
        self.violations.clear();
        self.violation_index = None;
    }

    /// Forget the loaded layout and everything derived from it
    pub fn close(&mut self) {
        self.cancel_check();
        self.running_check = None;
        self.check_generation += 1;
        self.file_path = None;
        self.library = None;
        self.clear_results();
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result from a background check
pub struct CheckAsyncResult {
    /// Generation handed out by `ServerState::begin_check`
    pub generation: u64,
    pub outcome: anyhow::Result<Vec<LayerReport>>,
    pub elapsed_ms: f64,
}

/// Everything the main loop waits on
pub enum ServerEvent {
    /// One line read from stdin
    Line(String),
    CheckComplete(CheckAsyncResult),
    /// Stdin reached end of file or failed
    InputClosed,
}
