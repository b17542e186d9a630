//! Boundary conditions for the outer shell of the grid.
//!
//! Each regime is a [`BoundaryRule`]: given a shell cell and one wall it
//! touches, produce the value that wall asks for. [`fill_shell`] walks the
//! shell in three passes (6 faces, then 12 edges, then 8 corners) and lets
//! the rule combine the 1-3 walls meeting at each cell. Faces only read
//! interior cells, edges read faces and corners read edges, so the order of
//! cells inside a pass never matters.
//!
//! After the shell is filled, the obstacle corrections from
//! [`BlockedCellIndex`] are applied on top.

mod closed;
mod open;
mod wrap;

pub use closed::Closed;
pub use open::{Coupled, CouplingMode, Open};
pub use wrap::WrapAround;

use serde::{Deserialize, Serialize};

use crate::blocked::BlockedCellIndex;
use crate::coupling::BorderVelocities;
use crate::grid::flat_index;

/// How the outer shell of the cube behaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryType {
    /// Solid walls that reflect flow, scaled by the wall reflectivity.
    #[default]
    Closed,
    /// Walls copy the interior value; inflow is damped.
    Open,
    /// Average of `Open` and the parent field's flow at the wall.
    OpenShared,
    /// Walls take the parent field's flow verbatim.
    OpenSlaved,
    /// Opposite walls exchange values (periodic).
    WrapAround,
}

impl BoundaryType {
    /// Regimes that pull wall values from a parent flow source.
    pub fn is_coupled(self) -> bool {
        matches!(self, BoundaryType::OpenShared | BoundaryType::OpenSlaved)
    }
}

/// Grid axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The two axes orthogonal to this one.
    #[inline]
    pub fn others(self) -> [Axis; 2] {
        match self {
            Axis::X => [Axis::Y, Axis::Z],
            Axis::Y => [Axis::X, Axis::Z],
            Axis::Z => [Axis::X, Axis::Y],
        }
    }
}

/// Which array a boundary pass is operating on.
///
/// Velocity components flip sign on walls whose normal matches their own
/// axis and behave like scalars on the other four walls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArrayTag {
    VelocityX,
    VelocityY,
    VelocityZ,
    Ink,
    /// Solver scratch (pressure, divergence).
    Other,
}

impl ArrayTag {
    pub const VELOCITY: [ArrayTag; 3] = [ArrayTag::VelocityX, ArrayTag::VelocityY, ArrayTag::VelocityZ];

    /// Axis of a velocity component, `None` for scalars.
    #[inline]
    pub fn axis(self) -> Option<Axis> {
        match self {
            ArrayTag::VelocityX => Some(Axis::X),
            ArrayTag::VelocityY => Some(Axis::Y),
            ArrayTag::VelocityZ => Some(Axis::Z),
            ArrayTag::Ink | ArrayTag::Other => None,
        }
    }

    #[inline]
    pub fn is_velocity(self) -> bool {
        self.axis().is_some()
    }

    /// Velocity tag for an axis.
    #[inline]
    pub fn velocity(axis: Axis) -> ArrayTag {
        ArrayTag::VELOCITY[axis.index()]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Min,
    Max,
}

/// One of the six faces of the cube.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Wall {
    pub axis: Axis,
    pub side: Side,
}

impl Wall {
    /// Coordinate (on this wall's axis) of the first interior layer.
    #[inline]
    pub fn inward(self, size: usize) -> usize {
        match self.side {
            Side::Min => 1,
            Side::Max => size - 2,
        }
    }

    /// True if a velocity along this wall's normal points into the grid.
    #[inline]
    pub fn is_inflow(self, value: f32) -> bool {
        match self.side {
            Side::Min => value > 0.0,
            Side::Max => value < 0.0,
        }
    }
}

/// A cell on the outer shell and the walls it touches.
#[derive(Clone, Copy, Debug)]
pub struct ShellCell {
    pub index: usize,
    pub coord: [usize; 3],
    /// Position in [`ShellLayout::iter`] order.
    pub slot: usize,
    walls: [Wall; 3],
    wall_count: u8,
}

impl ShellCell {
    /// Walls meeting at this cell: 1 on a face, 2 on an edge, 3 at a corner.
    #[inline]
    pub fn walls(&self) -> &[Wall] {
        &self.walls[..self.wall_count as usize]
    }

    /// This cell's coordinates with one axis replaced.
    #[inline]
    pub fn with_axis(&self, axis: Axis, value: usize) -> [usize; 3] {
        let mut c = self.coord;
        c[axis.index()] = value;
        c
    }
}

/// Precomputed shell cells, grouped by how many walls they touch.
#[derive(Clone, Debug)]
pub struct ShellLayout {
    size: usize,
    faces: Vec<ShellCell>,
    edges: Vec<ShellCell>,
    corners: Vec<ShellCell>,
}

impl ShellLayout {
    pub fn new(size: usize) -> Self {
        let last = size - 1;
        let inner = size - 2;
        let mut faces = Vec::with_capacity(6 * inner * inner);
        let mut edges = Vec::with_capacity(12 * inner);
        let mut corners = Vec::with_capacity(8);

        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let coord = [x, y, z];
                    let mut walls = [Wall { axis: Axis::X, side: Side::Min }; 3];
                    let mut count = 0;
                    for axis in Axis::ALL {
                        let c = coord[axis.index()];
                        let side = if c == 0 {
                            Side::Min
                        } else if c == last {
                            Side::Max
                        } else {
                            continue;
                        };
                        walls[count] = Wall { axis, side };
                        count += 1;
                    }

                    let cell = ShellCell {
                        index: flat_index(size, x, y, z),
                        coord,
                        slot: 0,
                        walls,
                        wall_count: count as u8,
                    };
                    match count {
                        0 => {}
                        1 => faces.push(cell),
                        2 => edges.push(cell),
                        _ => corners.push(cell),
                    }
                }
            }
        }

        let mut layout = Self { size, faces, edges, corners };
        let cells = layout
            .faces
            .iter_mut()
            .chain(&mut layout.edges)
            .chain(&mut layout.corners);
        for (slot, cell) in cells.enumerate() {
            cell.slot = slot;
        }
        layout
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn faces(&self) -> &[ShellCell] {
        &self.faces
    }

    pub fn edges(&self) -> &[ShellCell] {
        &self.edges
    }

    pub fn corners(&self) -> &[ShellCell] {
        &self.corners
    }

    /// Faces, edges, corners in the order they must be filled.
    pub fn passes(&self) -> [&[ShellCell]; 3] {
        [&self.faces, &self.edges, &self.corners]
    }

    /// Every shell cell, in fill order.
    pub fn iter(&self) -> impl Iterator<Item = &ShellCell> {
        self.faces.iter().chain(&self.edges).chain(&self.corners)
    }

    pub fn len(&self) -> usize {
        self.faces.len() + self.edges.len() + self.corners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-regime wall rule.
pub trait BoundaryRule {
    /// Value wall `wall` asks for at `cell`.
    fn wall_value(&self, field: &[f32], tag: ArrayTag, cell: &ShellCell, wall: Wall) -> f32;

    /// Value stored at `cell`. Defaults to the mean over its walls.
    fn cell_value(&self, field: &[f32], tag: ArrayTag, cell: &ShellCell) -> f32 {
        let walls = cell.walls();
        let sum: f32 = walls
            .iter()
            .map(|&wall| self.wall_value(field, tag, cell, wall))
            .sum();
        sum / walls.len() as f32
    }
}

/// Fill the whole shell of `field` with `rule`.
pub fn fill_shell<R: BoundaryRule + ?Sized>(
    layout: &ShellLayout,
    rule: &R,
    tag: ArrayTag,
    field: &mut [f32],
) {
    for pass in layout.passes() {
        for cell in pass {
            let value = rule.cell_value(field, tag, cell);
            field[cell.index] = value;
        }
    }
}

/// Everything a boundary pass needs, borrowed from the owning field.
///
/// Shared across the parallel diffusion tasks, so it only holds shared
/// references.
#[derive(Clone, Copy)]
pub struct BoundaryContext<'a> {
    pub size: usize,
    pub kind: BoundaryType,
    pub reflectivity: f32,
    pub layout: &'a ShellLayout,
    pub border: Option<&'a BorderVelocities>,
    pub obstacles: &'a BlockedCellIndex,
    pub blocked: &'a [bool],
}

impl<'a> BoundaryContext<'a> {
    pub fn new(
        kind: BoundaryType,
        reflectivity: f32,
        layout: &'a ShellLayout,
        obstacles: &'a BlockedCellIndex,
        blocked: &'a [bool],
    ) -> Self {
        Self {
            size: layout.size(),
            kind,
            reflectivity,
            layout,
            border: None,
            obstacles,
            blocked,
        }
    }

    /// Attach parent velocities for the coupled regimes.
    pub fn with_border(mut self, border: Option<&'a BorderVelocities>) -> Self {
        self.border = border;
        self
    }

    /// Run one boundary pass over `field`: shell first, then obstacles.
    pub fn apply(&self, tag: ArrayTag, field: &mut [f32]) {
        let size = self.size;
        match self.kind {
            BoundaryType::Closed => {
                fill_shell(self.layout, &Closed::new(size, self.reflectivity), tag, field)
            }
            BoundaryType::Open => fill_shell(self.layout, &Open::new(size), tag, field),
            BoundaryType::OpenShared => fill_shell(
                self.layout,
                &Coupled::new(size, CouplingMode::Shared, self.border),
                tag,
                field,
            ),
            BoundaryType::OpenSlaved => fill_shell(
                self.layout,
                &Coupled::new(size, CouplingMode::Slaved, self.border),
                tag,
                field,
            ),
            BoundaryType::WrapAround => fill_shell(self.layout, &WrapAround::new(size), tag, field),
        }

        self.obstacles.apply(tag, field);
    }
}

/// Read `field` at a coordinate triple.
#[inline]
pub(crate) fn sample(field: &[f32], size: usize, c: [usize; 3]) -> f32 {
    field[flat_index(size, c[0], c[1], c[2])]
}
