//! DeltaMerge: left-to-right sweep over sorted rectangle edges
//!
//! All events sharing an x form one column. Opens are applied before closes,
//! then the covered set just left of x is compared with the covered set just
//! right of x inside the y-ranges the column touched. Every maximal piece
//! where the two differ becomes one delta record. Pieces are split at each
//! boundary of either coverage, so a record endpoint is always a polygon
//! vertex.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;

use super::delta::{DeltaRecord, DeltaSink, DeltaTag};
use super::sorter::{EdgeKind, SweepEvent};
use super::spans::ActiveSpans;

/// Default number of events between cancellation polls
pub const DEFAULT_CANCEL_POLL_INTERVAL: usize = 4096;

/// Error raised when a sweep is stopped through its cancel flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "merge cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Counters describing one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub events: usize,
    pub skipped_events: usize,
    /// Distinct x positions visited
    pub columns: usize,
    /// Columns where coverage changed
    pub changed_columns: usize,
    pub records: u64,
    /// Largest size reached by the active span set
    pub peak_breakpoints: usize,
}

/// The sweep engine. One instance serves one merge.
pub struct DeltaMerge {
    spans: ActiveSpans,
    cancel: Option<Arc<AtomicBool>>,
    poll_interval: usize,
    stats: MergeStats,
}

impl Default for DeltaMerge {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaMerge {
    pub fn new() -> Self {
        Self {
            spans: ActiveSpans::new(),
            cancel: None,
            poll_interval: DEFAULT_CANCEL_POLL_INTERVAL,
            stats: MergeStats::default(),
        }
    }

    /// Poll `flag` every `poll_interval` events and stop with [`Cancelled`]
    /// once it is set
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>, poll_interval: usize) -> Self {
        self.cancel = Some(flag);
        self.poll_interval = poll_interval.max(1);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|f| f.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Sweep `events` (which must be in sweep order) and push the resulting
    /// delta records into `sink`
    pub fn run<I, S>(mut self, events: I, sink: &mut S) -> anyhow::Result<MergeStats>
    where
        I: IntoIterator<Item = SweepEvent>,
        S: DeltaSink + ?Sized,
    {
        let mut events = events.into_iter().peekable();
        let mut opens: Vec<(i32, i32)> = Vec::new();
        let mut closes: Vec<(i32, i32)> = Vec::new();
        let mut last_x: Option<i32> = None;
        let mut last_change_x: Option<i32> = None;
        let mut since_poll = 0usize;

        while let Some(first) = events.next() {
            let x = first.x;
            if let Some(prev) = last_x {
                anyhow::ensure!(
                    x > prev,
                    "sweep events out of order: x = {} after x = {}",
                    x, prev
                );
            }

            opens.clear();
            closes.clear();
            let mut batch = Some(first);
            while let Some(ev) = batch {
                self.stats.events += 1;
                since_poll += 1;
                if ev.y0 >= ev.y1 {
                    self.stats.skipped_events += 1;
                } else {
                    match ev.kind {
                        EdgeKind::Open => opens.push((ev.y0, ev.y1)),
                        EdgeKind::Close => closes.push((ev.y0, ev.y1)),
                    }
                }
                batch = events.next_if(|next| next.x == x);
            }

            if since_poll >= self.poll_interval {
                since_poll = 0;
                if self.is_cancelled() {
                    return Err(Cancelled.into());
                }
            }

            let x0 = last_change_x.unwrap_or(x);
            if self.process_column(x, x0, &opens, &closes, sink)? {
                last_change_x = Some(x);
                self.stats.changed_columns += 1;
            }
            self.stats.columns += 1;
            self.stats.peak_breakpoints = self.stats.peak_breakpoints.max(self.spans.breakpoint_count());
            last_x = Some(x);
        }

        anyhow::ensure!(
            self.spans.is_empty(),
            "sweep ended with open coverage {:?}: a rectangle was opened but never closed",
            self.spans.covered_intervals()
        );

        log::debug!(
            "[DeltaMerge] {} events over {} columns -> {} records (peak {} breakpoints)",
            self.stats.events,
            self.stats.columns,
            self.stats.records,
            self.stats.peak_breakpoints
        );

        Ok(self.stats)
    }

    /// Apply one column of events; returns whether coverage changed
    fn process_column<S>(
        &mut self,
        x: i32,
        x0: i32,
        opens: &[(i32, i32)],
        closes: &[(i32, i32)],
        sink: &mut S,
    ) -> anyhow::Result<bool>
    where
        S: DeltaSink + ?Sized,
    {
        let touched = merge_ranges(opens.iter().chain(closes.iter()).copied());
        let before: Vec<Vec<(i32, i32)>> = touched
            .iter()
            .map(|&(lo, hi)| self.spans.covered_in(lo, hi))
            .collect();

        for &(y0, y1) in opens {
            self.spans.add(y0, y1);
        }
        for &(y0, y1) in closes {
            self.spans
                .remove(y0, y1)
                .with_context(|| format!("malformed sweep input at x = {}", x))?;
        }

        let mut changed = false;
        for (&(lo, hi), old) in touched.iter().zip(&before) {
            let new = self.spans.covered_in(lo, hi);
            for (y0, y1, tag) in coverage_changes(lo, hi, old, &new) {
                sink.push(DeltaRecord { x0, x1: x, y0, y1, tag })?;
                self.stats.records += 1;
                changed = true;
            }
        }
        Ok(changed)
    }
}

/// Union of possibly overlapping or touching ranges, sorted
fn merge_ranges<I>(ranges: I) -> Vec<(i32, i32)>
where
    I: Iterator<Item = (i32, i32)>,
{
    let mut ranges: Vec<(i32, i32)> = ranges.collect();
    ranges.sort_unstable();
    let mut merged: Vec<(i32, i32)> = Vec::with_capacity(ranges.len());
    for (lo, hi) in ranges {
        match merged.last_mut() {
            Some(last) if lo <= last.1 => last.1 = last.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    merged
}

/// Pieces of `[lo, hi)` where `old` and `new` coverage differ, split at every
/// endpoint of either
fn coverage_changes(
    lo: i32,
    hi: i32,
    old: &[(i32, i32)],
    new: &[(i32, i32)],
) -> Vec<(i32, i32, DeltaTag)> {
    let mut cuts: Vec<i32> = Vec::with_capacity(2 + 2 * (old.len() + new.len()));
    cuts.push(lo);
    cuts.push(hi);
    for &(a, b) in old.iter().chain(new.iter()) {
        cuts.push(a);
        cuts.push(b);
    }
    cuts.sort_unstable();
    cuts.dedup();

    let mut out = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    for w in cuts.windows(2) {
        let (a, b) = (w[0], w[1]);
        while i < old.len() && old[i].1 <= a {
            i += 1;
        }
        while j < new.len() && new[j].1 <= a {
            j += 1;
        }
        let was = i < old.len() && old[i].0 <= a;
        let is = j < new.len() && new[j].0 <= a;
        if was != is {
            let tag = if is { DeltaTag::Opening } else { DeltaTag::Closing };
            out.push((a, b, tag));
        }
    }
    out
}
