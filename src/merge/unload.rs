//! UnloadPolys: rebuild nested rings from the delta stream
//!
//! Boundaries are traced with the solid on the left, so outer rings come out
//! counter-clockwise and holes clockwise. Between two record columns every
//! boundary y of the current coverage carries one horizontal edge that is
//! still growing to the right. Each such edge is an end of an open chain:
//! edges with coverage above them run rightward out of a chain's back,
//! edges with coverage below them run leftward into a chain's front.
//!
//! A vertical record at x runs from its source `s` to its target `t`
//! (downward for `Opening`, upward for `Closing`). At `s` a horizontal edge
//! must arrive: either an old bottom-boundary edge ending here or a new
//! top-boundary edge starting here. At `t` one must leave: an old
//! top-boundary edge or a new bottom-boundary edge. Depending on which ends
//! are old, the record starts a chain, extends one, joins two, or closes a
//! chain into a ring.
//!
//! Where two covered quadrants touch at a single point (a pinch), each old
//! edge pairs with the record on its covered side. The trace then turns
//! left at the pinch and corner-touching solids stay separate rings.
//!
//! Nesting comes from the sweep itself: at every chain birth the boundary
//! directly below it is recorded. Once all rings are closed, rings are
//! visited in birth order and each one's parent is the ring enclosing the
//! gap between it and that boundary.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::geometry::{is_solid_depth, Point, PolyBase, PolyBaseTree};

use super::delta::{DeltaRecord, DeltaSource, DeltaTag};

/// A horizontal boundary edge still growing to the right
#[derive(Debug, Clone, Copy)]
struct ActiveEdge {
    chain: usize,
    /// Coverage lies above the edge (a bottom boundary, chain back end)
    covered_above: bool,
}

/// Where a chain started, in sweep order
#[derive(Debug, Clone, Copy)]
struct Birth {
    x: i32,
    y: i32,
    /// Chain owning the boundary directly below, and its coverage side
    below: Option<(usize, bool)>,
    /// Coverage lies to the right of the first vertical edge
    solid: bool,
}

impl Birth {
    fn key(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

#[derive(Debug)]
struct Chain {
    points: VecDeque<Point>,
    birth: Birth,
}

#[derive(Debug)]
struct ClosedRing {
    points: Vec<Point>,
    birth: Birth,
}

/// Counters describing one reconstruction
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnloadStats {
    pub records: u64,
    pub columns: usize,
    pub rings: usize,
    pub peak_active_edges: usize,
}

/// Ring reconstruction state. One instance serves one stream.
#[derive(Debug, Default)]
pub struct UnloadPolys {
    active: BTreeMap<i32, ActiveEdge>,
    chains: Vec<Option<Chain>>,
    /// Union-find over chain ids; merged chains point at the survivor
    links: Vec<usize>,
    rings: Vec<ClosedRing>,
    ring_of_root: HashMap<usize, usize>,
    stats: UnloadStats,
}

/// Role of a record endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// An edge arrives here and the vertical leaves
    Source,
    /// The vertical arrives and an edge leaves
    Target,
}

impl UnloadPolys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the whole stream and return the root rings with their nested
    /// children
    pub fn run<S>(mut self, source: &mut S) -> anyhow::Result<(Vec<PolyBaseTree>, UnloadStats)>
    where
        S: DeltaSource + ?Sized,
    {
        let mut column: Vec<DeltaRecord> = Vec::new();
        let mut pending = source.next_record()?;
        let mut prev_x: Option<i32> = None;

        while let Some(first) = pending {
            let x = first.x1;
            if let Some(p) = prev_x {
                anyhow::ensure!(x > p, "delta records out of order: x = {} after x = {}", x, p);
            }
            let expected_x0 = prev_x.unwrap_or(x);

            column.clear();
            column.push(first);
            pending = source.next_record()?;
            while let Some(rec) = pending {
                if rec.x1 != x {
                    break;
                }
                column.push(rec);
                pending = source.next_record()?;
            }

            for rec in &column {
                anyhow::ensure!(
                    rec.x0 == expected_x0,
                    "delta record {:?} does not continue the slab starting at x = {}",
                    rec, expected_x0
                );
            }
            self.process_column(x, &column)?;
            self.stats.records += column.len() as u64;
            self.stats.columns += 1;
            self.stats.peak_active_edges = self.stats.peak_active_edges.max(self.active.len());
            prev_x = Some(x);
        }

        if let Some((&y, edge)) = self.active.iter().next() {
            anyhow::bail!(
                "unterminated ring at end of delta stream: {} open boundary edges, first at y = {} (chain {})",
                self.active.len(),
                y,
                edge.chain
            );
        }

        self.stats.rings = self.rings.len();
        let stats = self.stats;
        let forest = self.build_forest()?;
        log::debug!(
            "[UnloadPolys] {} records over {} columns -> {} rings in {} trees",
            stats.records,
            stats.columns,
            stats.rings,
            forest.len()
        );
        Ok((forest, stats))
    }

    fn find(&mut self, mut id: usize) -> usize {
        let mut root = id;
        while self.links[root] != root {
            root = self.links[root];
        }
        while self.links[id] != root {
            let next = self.links[id];
            self.links[id] = root;
            id = next;
        }
        root
    }

    fn new_chain(&mut self, points: VecDeque<Point>, birth: Birth) -> usize {
        let id = self.chains.len();
        self.chains.push(Some(Chain { points, birth }));
        self.links.push(id);
        id
    }

    fn chain_mut(&mut self, root: usize) -> anyhow::Result<&mut Chain> {
        self.chains
            .get_mut(root)
            .and_then(|c| c.as_mut())
            .ok_or_else(|| anyhow::anyhow!("corrupt delta stream: chain {} is already closed", root))
    }

    fn take_chain(&mut self, root: usize) -> anyhow::Result<Chain> {
        self.chains
            .get_mut(root)
            .and_then(|c| c.take())
            .ok_or_else(|| anyhow::anyhow!("corrupt delta stream: chain {} is already closed", root))
    }

    fn process_column(&mut self, x: i32, recs: &[DeltaRecord]) -> anyhow::Result<()> {
        for (i, r) in recs.iter().enumerate() {
            anyhow::ensure!(r.y0 < r.y1, "corrupt delta record {:?}: empty span", r);
            if i > 0 {
                let prev = &recs[i - 1];
                anyhow::ensure!(
                    prev.y1 <= r.y0,
                    "corrupt delta column at x = {}: records {:?} and {:?} overlap or are unsorted",
                    x, prev, r
                );
                anyhow::ensure!(
                    prev.y1 < r.y0 || prev.tag != r.tag,
                    "corrupt delta column at x = {}: adjacent records {:?} and {:?} share a side",
                    x, prev, r
                );
            }
        }

        // Every old edge touched by a record endpoint ends at this x
        let mut ending: BTreeMap<i32, ActiveEdge> = BTreeMap::new();
        for r in recs {
            for y in [r.y0, r.y1] {
                if let Some(edge) = self.active.remove(&y) {
                    ending.insert(y, edge);
                }
            }
        }

        for (i, r) in recs.iter().enumerate() {
            let pinch_below = i > 0 && recs[i - 1].y1 == r.y0;
            let pinch_above = i + 1 < recs.len() && recs[i + 1].y0 == r.y1;
            let (s, t) = match r.tag {
                DeltaTag::Opening => (r.y1, r.y0),
                DeltaTag::Closing => (r.y0, r.y1),
            };
            let pinch_at = |y: i32| (y == r.y0 && pinch_below) || (y == r.y1 && pinch_above);

            let arrive = take_old_edge(&mut ending, r, s, Role::Source, pinch_at(s));
            let depart = take_old_edge(&mut ending, r, t, Role::Target, pinch_at(t));
            let sp = Point::new(x, s);
            let tp = Point::new(x, t);

            match (arrive, depart) {
                (Some(a), Some(b)) => {
                    let ra = self.find(a.chain);
                    let rb = self.find(b.chain);
                    if ra == rb {
                        let mut chain = self.take_chain(ra)?;
                        chain.points.push_back(sp);
                        chain.points.push_back(tp);
                        self.close_ring(ra, chain);
                    } else {
                        let tail = self.take_chain(rb)?;
                        let head = self.chain_mut(ra)?;
                        head.points.push_back(sp);
                        head.points.push_back(tp);
                        head.points.extend(tail.points);
                        if tail.birth.key() < head.birth.key() {
                            head.birth = tail.birth;
                        }
                        self.links[rb] = ra;
                    }
                }
                (Some(a), None) => {
                    let ra = self.find(a.chain);
                    let head = self.chain_mut(ra)?;
                    head.points.push_back(sp);
                    head.points.push_back(tp);
                    self.insert_edge(t, ActiveEdge { chain: ra, covered_above: true })?;
                }
                (None, Some(b)) => {
                    let rb = self.find(b.chain);
                    let tail = self.chain_mut(rb)?;
                    tail.points.push_front(tp);
                    tail.points.push_front(sp);
                    self.insert_edge(s, ActiveEdge { chain: rb, covered_above: false })?;
                }
                (None, None) => {
                    let below = self
                        .active
                        .range(..r.y0)
                        .next_back()
                        .map(|(_, e)| (e.chain, e.covered_above));
                    let birth = Birth {
                        x,
                        y: r.y0,
                        below,
                        solid: r.tag == DeltaTag::Opening,
                    };
                    let id = self.new_chain(VecDeque::from(vec![sp, tp]), birth);
                    self.insert_edge(s, ActiveEdge { chain: id, covered_above: false })?;
                    self.insert_edge(t, ActiveEdge { chain: id, covered_above: true })?;
                }
            }
        }

        if let Some((&y, _)) = ending.iter().next() {
            anyhow::bail!(
                "corrupt delta column at x = {}: boundary edge at y = {} ends without a vertical edge",
                x, y
            );
        }
        Ok(())
    }

    fn insert_edge(&mut self, y: i32, edge: ActiveEdge) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.active.insert(y, edge).is_none(),
            "corrupt delta stream: two boundary edges at y = {}",
            y
        );
        Ok(())
    }

    fn close_ring(&mut self, root: usize, chain: Chain) {
        let mut points: Vec<Point> = chain.points.into();
        if let Some(start) = points
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| (p.x, p.y))
            .map(|(i, _)| i)
        {
            points.rotate_left(start);
        }
        self.ring_of_root.insert(root, self.rings.len());
        self.rings.push(ClosedRing {
            points,
            birth: chain.birth,
        });
    }

    /// Resolve parents in birth order and assemble the forest
    fn build_forest(mut self) -> anyhow::Result<Vec<PolyBaseTree>> {
        let mut order: Vec<usize> = (0..self.rings.len()).collect();
        order.sort_by_key(|&i| self.rings[i].birth.key());

        let mut parent: Vec<Option<usize>> = vec![None; self.rings.len()];
        let mut depth: Vec<usize> = vec![0; self.rings.len()];
        let mut resolved: Vec<bool> = vec![false; self.rings.len()];

        for &r in &order {
            let birth = self.rings[r].birth;
            let enclosing = match birth.below {
                None => None,
                Some((chain, covered_above)) => {
                    let root = self.find(chain);
                    let b = *self.ring_of_root.get(&root).ok_or_else(|| {
                        anyhow::anyhow!("corrupt delta stream: chain {} never closed", chain)
                    })?;
                    anyhow::ensure!(resolved[b], "corrupt delta stream: ring nesting is cyclic");
                    let b_solid = is_solid_depth(depth[b]);
                    // The gap above B's edge is inside B when it has B's material state
                    if b_solid == covered_above {
                        Some(b)
                    } else {
                        parent[b]
                    }
                }
            };
            parent[r] = enclosing;
            depth[r] = enclosing.map(|e| depth[e] + 1).unwrap_or(0);
            anyhow::ensure!(
                is_solid_depth(depth[r]) == birth.solid,
                "corrupt delta stream: ring born at ({}, {}) has inconsistent nesting",
                birth.x, birth.y
            );
            resolved[r] = true;
        }

        // Children are born after their parents, so building in reverse birth
        // order completes every subtree before it is attached
        let mut nodes: Vec<Option<PolyBaseTree>> = std::mem::take(&mut self.rings)
            .into_iter()
            .map(|ring| Some(PolyBaseTree::new(PolyBase::new(ring.points))))
            .collect();
        let mut roots: Vec<PolyBaseTree> = Vec::new();
        for &r in order.iter().rev() {
            let mut node = nodes[r]
                .take()
                .ok_or_else(|| anyhow::anyhow!("ring {} visited twice", r))?;
            node.children.reverse();
            match parent[r] {
                Some(p) => nodes[p]
                    .as_mut()
                    .ok_or_else(|| anyhow::anyhow!("ring {} attached after its parent", r))?
                    .children
                    .push(node),
                None => roots.push(node),
            }
        }
        roots.reverse();
        Ok(roots)
    }
}

/// Claim the old edge ending at `y` for record `r`, if it fits the role.
/// At a pinch the edge belongs to the record on its covered side.
fn take_old_edge(
    ending: &mut BTreeMap<i32, ActiveEdge>,
    r: &DeltaRecord,
    y: i32,
    role: Role,
    pinch: bool,
) -> Option<ActiveEdge> {
    let edge = *ending.get(&y)?;
    let fits_role = match role {
        Role::Source => edge.covered_above,
        Role::Target => !edge.covered_above,
    };
    let faces_record = if edge.covered_above { y == r.y0 } else { y == r.y1 };
    if fits_role && (!pinch || faces_record) {
        ending.remove(&y)
    } else {
        None
    }
}
