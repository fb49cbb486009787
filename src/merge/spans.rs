//! Reference-counted vertical coverage at the sweep position
//!
//! Coverage is a piecewise-constant function of y stored as breakpoints in a
//! `BTreeMap`: the value at key `y` is the number of rectangles covering
//! `[y, next_key)`. Everything below the first key is uncovered. Adjacent
//! pieces never carry the same count, so the map stays proportional to the
//! number of distinct spans rather than the number of rectangles.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

/// Sorted, non-overlapping y-intervals with coverage counts
#[derive(Debug, Default, Clone)]
pub struct ActiveSpans {
    counts: BTreeMap<i32, u32>,
}

impl ActiveSpans {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of stored breakpoints
    pub fn breakpoint_count(&self) -> usize {
        self.counts.len()
    }

    /// Coverage count of the piece containing `y`
    pub fn count_at(&self, y: i32) -> u32 {
        self.counts
            .range(..=y)
            .next_back()
            .map(|(_, &c)| c)
            .unwrap_or(0)
    }

    /// Count of the piece ending just below `y`
    fn count_below(&self, y: i32) -> u32 {
        self.counts
            .range(..y)
            .next_back()
            .map(|(_, &c)| c)
            .unwrap_or(0)
    }

    /// Make `y` a breakpoint without changing coverage
    fn split_at(&mut self, y: i32) {
        if !self.counts.contains_key(&y) {
            let c = self.count_below(y);
            self.counts.insert(y, c);
        }
    }

    /// Drop the breakpoint at `y` if it no longer changes the count
    fn coalesce_at(&mut self, y: i32) {
        if let Some(&c) = self.counts.get(&y) {
            if c == self.count_below(y) {
                self.counts.remove(&y);
            }
        }
    }

    /// Add one layer of coverage over `[y0, y1)`. Empty spans are ignored.
    pub fn add(&mut self, y0: i32, y1: i32) {
        if y0 >= y1 {
            return;
        }
        self.split_at(y0);
        self.split_at(y1);
        for (_, c) in self.counts.range_mut(y0..y1) {
            *c += 1;
        }
        self.coalesce_at(y1);
        self.coalesce_at(y0);
    }

    /// Remove one layer of coverage over `[y0, y1)`.
    ///
    /// Fails if any part of the span is not covered, which means a close
    /// event arrived without its matching open.
    pub fn remove(&mut self, y0: i32, y1: i32) -> anyhow::Result<()> {
        if y0 >= y1 {
            return Ok(());
        }
        let uncovered = self.count_at(y0) == 0
            || self.counts.range(y0..y1).any(|(_, &c)| c == 0);
        anyhow::ensure!(
            !uncovered,
            "coverage underflow removing span [{}, {}): close without matching open",
            y0, y1
        );
        self.split_at(y0);
        self.split_at(y1);
        for (_, c) in self.counts.range_mut(y0..y1) {
            *c -= 1;
        }
        self.coalesce_at(y1);
        self.coalesce_at(y0);
        Ok(())
    }

    /// Maximal covered intervals intersected with `[lo, hi)`
    pub fn covered_in(&self, lo: i32, hi: i32) -> Vec<(i32, i32)> {
        let mut out: Vec<(i32, i32)> = Vec::new();
        if lo >= hi {
            return out;
        }
        let mut start = if self.count_at(lo) > 0 { Some(lo) } else { None };
        for (&y, &c) in self.counts.range((Excluded(lo), Unbounded)) {
            if y >= hi {
                break;
            }
            match (start, c > 0) {
                (None, true) => start = Some(y),
                (Some(s), false) => {
                    out.push((s, y));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            out.push((s, hi));
        }
        out
    }

    /// All maximal covered intervals
    pub fn covered_intervals(&self) -> Vec<(i32, i32)> {
        match (self.counts.keys().next(), self.counts.keys().next_back()) {
            (Some(&lo), Some(&hi)) => self.covered_in(lo, hi),
            _ => Vec::new(),
        }
    }
}
