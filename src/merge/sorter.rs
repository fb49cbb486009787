//! Rectangle edge events in sweep order
//!
//! Every accepted rectangle contributes two events: its left edge opens the
//! y-span `[ly, hy)` at `lx`, its right edge closes it at `hx`. Events are
//! ordered by x, then y, with opens before closes so that abutting
//! rectangles are seen as touching rather than separated by a gap.

use rayon::prelude::*;

use crate::geometry::Rect;

/// Above this many events the sort runs on the rayon pool
const PARALLEL_SORT_THRESHOLD: usize = 1 << 16;

/// Whether an event starts or ends coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    /// Left rectangle edge
    Open,
    /// Right rectangle edge
    Close,
}

/// One vertical rectangle edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SweepEvent {
    pub x: i32,
    pub y0: i32,
    pub y1: i32,
    pub kind: EdgeKind,
}

impl SweepEvent {
    fn sort_key(&self) -> (i32, i32, EdgeKind, i32) {
        (self.x, self.y0, self.kind, self.y1)
    }
}

/// Buffers rectangles and hands their edge events out once, in sweep order
#[derive(Debug, Default)]
pub struct PointsSorter {
    events: Vec<SweepEvent>,
    rect_count: usize,
    skipped: usize,
}

impl PointsSorter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(rects: usize) -> Self {
        Self {
            events: Vec::with_capacity(rects * 2),
            rect_count: 0,
            skipped: 0,
        }
    }

    /// Accept one rectangle. Zero-area rectangles are counted and dropped.
    pub fn put(&mut self, lx: i32, ly: i32, hx: i32, hy: i32) -> anyhow::Result<()> {
        let rect = Rect::new(lx, ly, hx, hy);
        rect.validate()?;
        if rect.is_degenerate() {
            self.skipped += 1;
            return Ok(());
        }
        self.events.push(SweepEvent { x: lx, y0: ly, y1: hy, kind: EdgeKind::Open });
        self.events.push(SweepEvent { x: hx, y0: ly, y1: hy, kind: EdgeKind::Close });
        self.rect_count += 1;
        Ok(())
    }

    pub fn put_rect(&mut self, rect: &Rect) -> anyhow::Result<()> {
        self.put(rect.lx, rect.ly, rect.hx, rect.hy)
    }

    /// Rectangles that produced events
    pub fn rect_count(&self) -> usize {
        self.rect_count
    }

    /// Degenerate rectangles that were dropped
    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sort and hand out the event stream. Consumes the sorter, so the
    /// stream can only be read once.
    pub fn into_events(mut self) -> SortedEvents {
        if self.events.len() >= PARALLEL_SORT_THRESHOLD {
            self.events.par_sort_unstable_by_key(SweepEvent::sort_key);
        } else {
            self.events.sort_unstable_by_key(SweepEvent::sort_key);
        }
        SortedEvents {
            inner: self.events.into_iter(),
        }
    }
}

/// Sequential read interface over sorted events
pub struct SortedEvents {
    inner: std::vec::IntoIter<SweepEvent>,
}

impl SortedEvents {
    pub fn remaining(&self) -> usize {
        self.inner.len()
    }
}

impl Iterator for SortedEvents {
    type Item = SweepEvent;

    fn next(&mut self) -> Option<SweepEvent> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_sorted_by_x_then_y_then_kind() {
        let mut sorter = PointsSorter::new();
        sorter.put(10, 0, 20, 10).unwrap();
        sorter.put(0, 5, 10, 8).unwrap();
        sorter.put(0, 0, 10, 3).unwrap();

        let events: Vec<(i32, EdgeKind, i32)> = sorter
            .into_events()
            .map(|e| (e.x, e.kind, e.y0))
            .collect();
        assert_eq!(
            events,
            vec![
                (0, EdgeKind::Open, 0),
                (0, EdgeKind::Open, 5),
                // Abutting rectangle opens before its neighbour closes
                (10, EdgeKind::Open, 0),
                (10, EdgeKind::Close, 0),
                (10, EdgeKind::Close, 5),
                (20, EdgeKind::Close, 0),
            ]
        );
    }

    #[test]
    fn test_degenerate_rects_skipped() {
        let mut sorter = PointsSorter::new();
        sorter.put(0, 0, 0, 10).unwrap();
        sorter.put(0, 4, 10, 4).unwrap();
        sorter.put(0, 0, 1, 1).unwrap();
        assert_eq!(sorter.rect_count(), 1);
        assert_eq!(sorter.skipped_count(), 2);
        assert_eq!(sorter.into_events().remaining(), 2);
    }

    #[test]
    fn test_malformed_rect_rejected() {
        let mut sorter = PointsSorter::new();
        assert!(sorter.put(5, 0, 1, 1).is_err());
        assert!(sorter.put(0, 0, i32::MAX, 1).is_err());
        assert!(sorter.is_empty());
    }
}
