//! Interior obstacle handling.
//!
//! Each blocked interior cell is classified once per obstacle change and
//! turned into an [`IndexLerp`] rule per array: "this cell's value is the
//! weighted sum of these open neighbours". Boundary passes replay the rules
//! against the neighbours' current values.
//!
//! Classification, first match wins:
//! 1. **Enclosed**: all 26 neighbours blocked. Velocity forced to zero,
//!    no rule.
//! 2. **Plate**: the 4 face neighbours in one plane are blocked and at
//!    least one of the 2 neighbours along the plane normal is open. The
//!    normal component reflects off the open side, everything else slides.
//! 3. **Inside corner**: all 6 face neighbours blocked. Velocity reflects
//!    off the open cells among the 26, scaled down.
//! 4. **Outside corner**: anything else. Same as inside corner with a
//!    larger scale.
//!
//! Scalars always take the plain average of the same open set.

use log::debug;

use crate::boundary::{ArrayTag, Axis};
use crate::constants::{INSIDE_CORNER_REFLECTION, OUTSIDE_CORNER_REFLECTION, PLATE_REFLECTION};
use crate::grid::flat_index;

/// Face neighbour offsets.
const FACE: [[isize; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

/// Edge-diagonal neighbour offsets.
const EDGE: [[isize; 3]; 12] = [
    [-1, -1, 0],
    [1, -1, 0],
    [-1, 1, 0],
    [1, 1, 0],
    [-1, 0, -1],
    [1, 0, -1],
    [-1, 0, 1],
    [1, 0, 1],
    [0, -1, -1],
    [0, 1, -1],
    [0, -1, 1],
    [0, 1, 1],
];

/// Corner-diagonal neighbour offsets.
const CORNER: [[isize; 3]; 8] = [
    [-1, -1, -1],
    [1, -1, -1],
    [-1, 1, -1],
    [1, 1, -1],
    [-1, -1, 1],
    [1, -1, 1],
    [-1, 1, 1],
    [1, 1, 1],
];

/// Lifecycle of the cached tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    /// Tables match the current obstacle flags.
    Clean,
    /// Obstacles or reflectivity changed since the last rebuild.
    Dirty,
    /// A rebuild is in progress.
    Rebuilding,
}

/// `target = Σ weight * field[source]`.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexLerp {
    pub target: usize,
    pub sources: Vec<(usize, f32)>,
}

impl IndexLerp {
    #[inline]
    pub fn evaluate(&self, field: &[f32]) -> f32 {
        self.sources.iter().map(|&(i, w)| field[i] * w).sum()
    }

    pub fn weight_sum(&self) -> f32 {
        self.sources.iter().map(|&(_, w)| w).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockedKind {
    Enclosed,
    Plate { normal: Axis },
    InsideCorner,
    OutsideCorner,
}

impl BlockedKind {
    /// Weight sum a velocity rule for `axis` should have (before dividing
    /// across sources).
    pub fn velocity_scale(self, axis: Axis, reflectivity: f32) -> f32 {
        match self {
            BlockedKind::Enclosed => 0.0,
            BlockedKind::Plate { normal } if normal == axis => -reflectivity * PLATE_REFLECTION,
            BlockedKind::Plate { .. } => 1.0,
            BlockedKind::InsideCorner => -reflectivity * INSIDE_CORNER_REFLECTION,
            BlockedKind::OutsideCorner => -reflectivity * OUTSIDE_CORNER_REFLECTION,
        }
    }
}

/// Per-array correction tables for blocked cells.
#[derive(Clone, Debug)]
pub struct BlockedCellIndex {
    state: CacheState,
    velocity: [Vec<IndexLerp>; 3],
    scalar: Vec<IndexLerp>,
    enclosed: Vec<usize>,
    /// Sorted by index.
    kinds: Vec<(usize, BlockedKind)>,
}

impl Default for BlockedCellIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockedCellIndex {
    /// Empty tables, which are correct for a grid with no obstacles.
    pub fn new() -> Self {
        Self {
            state: CacheState::Clean,
            velocity: [Vec::new(), Vec::new(), Vec::new()],
            scalar: Vec::new(),
            enclosed: Vec::new(),
            kinds: Vec::new(),
        }
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn mark_dirty(&mut self) {
        self.state = CacheState::Dirty;
    }

    /// Rebuild if dirty. Returns true if a rebuild happened.
    pub fn ensure_current(&mut self, blocked: &[bool], size: usize, reflectivity: f32) -> bool {
        match self.state {
            CacheState::Clean => false,
            CacheState::Dirty | CacheState::Rebuilding => {
                self.rebuild(blocked, size, reflectivity);
                true
            }
        }
    }

    /// Reclassify every blocked interior cell.
    pub fn rebuild(&mut self, blocked: &[bool], size: usize, reflectivity: f32) {
        self.state = CacheState::Rebuilding;
        for table in &mut self.velocity {
            table.clear();
        }
        self.scalar.clear();
        self.enclosed.clear();
        self.kinds.clear();

        let mut counts = [0usize; 4];
        for z in 1..size - 1 {
            for y in 1..size - 1 {
                for x in 1..size - 1 {
                    let target = flat_index(size, x, y, z);
                    if !blocked[target] {
                        continue;
                    }
                    let coord = [x, y, z];
                    let (kind, sources) = classify(blocked, size, coord);
                    self.kinds.push((target, kind));

                    match kind {
                        BlockedKind::Enclosed => {
                            counts[0] += 1;
                            self.enclosed.push(target);
                        }
                        BlockedKind::Plate { .. } => counts[1] += 1,
                        BlockedKind::InsideCorner => counts[2] += 1,
                        BlockedKind::OutsideCorner => counts[3] += 1,
                    }
                    if kind != BlockedKind::Enclosed {
                        self.push_rules(target, kind, &sources, reflectivity);
                    }
                }
            }
        }

        debug!(
            "blocked cache rebuilt: {} enclosed, {} plate, {} inside corner, {} outside corner",
            counts[0], counts[1], counts[2], counts[3]
        );
        self.state = CacheState::Clean;
    }

    fn push_rules(&mut self, target: usize, kind: BlockedKind, sources: &[usize], reflectivity: f32) {
        let share = 1.0 / sources.len() as f32;
        for axis in Axis::ALL {
            let w = kind.velocity_scale(axis, reflectivity) * share;
            self.velocity[axis.index()].push(IndexLerp {
                target,
                sources: sources.iter().map(|&s| (s, w)).collect(),
            });
        }
        self.scalar.push(IndexLerp {
            target,
            sources: sources.iter().map(|&s| (s, share)).collect(),
        });
    }

    /// Rules for one array.
    pub fn table(&self, tag: ArrayTag) -> &[IndexLerp] {
        match tag.axis() {
            Some(axis) => &self.velocity[axis.index()],
            None => &self.scalar,
        }
    }

    /// Cells with no open neighbour.
    pub fn enclosed(&self) -> &[usize] {
        &self.enclosed
    }

    /// Classification of a blocked cell from the last rebuild.
    pub fn classification(&self, index: usize) -> Option<BlockedKind> {
        self.kinds
            .binary_search_by_key(&index, |&(i, _)| i)
            .ok()
            .map(|pos| self.kinds[pos].1)
    }

    /// All classified cells, sorted by index.
    pub fn classifications(&self) -> &[(usize, BlockedKind)] {
        &self.kinds
    }

    /// Overwrite blocked cells in `field` from their rules.
    ///
    /// Panics if the tables are stale; callers must `ensure_current` first.
    pub fn apply(&self, tag: ArrayTag, field: &mut [f32]) {
        assert!(
            self.state == CacheState::Clean,
            "blocked-cell tables read while {:?}",
            self.state
        );
        for rule in self.table(tag) {
            field[rule.target] = rule.evaluate(field);
        }
        if tag.is_velocity() {
            for &i in &self.enclosed {
                field[i] = 0.0;
            }
        }
    }
}

#[inline]
fn neighbour(size: usize, c: [usize; 3], d: [isize; 3]) -> usize {
    flat_index(
        size,
        (c[0] as isize + d[0]) as usize,
        (c[1] as isize + d[1]) as usize,
        (c[2] as isize + d[2]) as usize,
    )
}

#[inline]
fn face(size: usize, c: [usize; 3], axis: Axis, delta: isize) -> usize {
    let mut d = [0; 3];
    d[axis.index()] = delta;
    neighbour(size, c, d)
}

/// Classify an interior blocked cell and return the open cells it draws from.
fn classify(blocked: &[bool], size: usize, c: [usize; 3]) -> (BlockedKind, Vec<usize>) {
    // 1. Enclosed
    let open: Vec<usize> = FACE
        .iter()
        .chain(EDGE.iter())
        .chain(CORNER.iter())
        .map(|&d| neighbour(size, c, d))
        .filter(|&i| !blocked[i])
        .collect();
    if open.is_empty() {
        return (BlockedKind::Enclosed, open);
    }

    // 2. Plate
    for normal in Axis::ALL {
        let in_plane_blocked = normal
            .others()
            .iter()
            .all(|&a| blocked[face(size, c, a, -1)] && blocked[face(size, c, a, 1)]);
        if !in_plane_blocked {
            continue;
        }
        let sides: Vec<usize> = [face(size, c, normal, -1), face(size, c, normal, 1)]
            .into_iter()
            .filter(|&i| !blocked[i])
            .collect();
        if !sides.is_empty() {
            return (BlockedKind::Plate { normal }, sides);
        }
    }

    // 3./4. Corners
    let faces_blocked = FACE.iter().all(|&d| blocked[neighbour(size, c, d)]);
    if faces_blocked {
        (BlockedKind::InsideCorner, open)
    } else {
        (BlockedKind::OutsideCorner, open)
    }
}
