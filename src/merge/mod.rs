//! Rectangle union engine
//!
//! Rectangles are turned into edge events, swept left to right into a stream
//! of vertical boundary changes, and the stream is read back into nested
//! rings.
//!
//! # Submodules
//! - `sorter` - Edge events in sweep order (PointsSorter)
//! - `spans` - Reference-counted y-coverage at the sweep position
//! - `sweep` - The DeltaMerge sweep producing delta records
//! - `delta` - Delta records, their byte stream and the spill spool
//! - `unload` - UnloadPolys: rings and nesting from delta records

mod sorter;
mod spans;
mod sweep;
mod delta;
mod unload;

use std::collections::VecDeque;

use crate::geometry::PolyBaseTree;

pub use sorter::{EdgeKind, PointsSorter, SortedEvents, SweepEvent};

pub use spans::ActiveSpans;

pub use sweep::{Cancelled, DeltaMerge, MergeStats, DEFAULT_CANCEL_POLL_INTERVAL};

pub use delta::{
    DeltaReader,
    DeltaRecord,
    DeltaSink,
    DeltaSource,
    DeltaSpool,
    DeltaTag,
    DeltaWriter,
    SpoolReader,
};

pub use unload::{UnloadPolys, UnloadStats};

/// Union of `rects` as a ring forest, staged entirely in memory
pub fn merge_rects(rects: &[[i32; 4]]) -> anyhow::Result<Vec<PolyBaseTree>> {
    let mut sorter = PointsSorter::with_capacity(rects.len());
    for r in rects {
        sorter.put(r[0], r[1], r[2], r[3])?;
    }
    let mut queue: VecDeque<DeltaRecord> = VecDeque::new();
    DeltaMerge::new().run(sorter.into_events(), &mut queue)?;
    let (forest, _) = UnloadPolys::new().run(&mut queue)?;
    Ok(forest)
}
