//! Where a field sits in the world, and conversions between world space
//! and the grid's index space.
//!
//! The grid cube spans `position .. position + rotation * size`. Index
//! space puts cell `(i, j, k)` at `[i, i+1) x [j, j+1) x [k, k+1)`, so a
//! cell centre sits at `i + 0.5`.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// World placement of a field (`PositionWorld`, `RotationWorld`,
/// `SizeWorld`, `VelocityWorld`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placement {
    /// World position of the grid's minimum corner.
    #[serde(with = "crate::serde_utils::vec3")]
    pub position: Vec3,
    #[serde(with = "crate::serde_utils::quat")]
    pub rotation: Quat,
    /// World edge lengths of the whole cube.
    #[serde(with = "crate::serde_utils::vec3")]
    pub size: Vec3,
    /// Velocity of the grid itself, added to every sampled flow.
    #[serde(with = "crate::serde_utils::vec3")]
    pub velocity: Vec3,
}

/// A unit cube at the origin. A field given this placement swaps it for
/// [`Placement::unit_cells`] of its own size.
impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            size: Vec3::ONE,
            velocity: Vec3::ZERO,
        }
    }
}

impl Placement {
    /// Unrotated placement at the origin where one cell is one world unit.
    pub fn unit_cells(size: usize) -> Self {
        Self {
            size: Vec3::splat(size as f32),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), FieldError> {
        for (name, value) in [
            ("placement.size.x", self.size.x),
            ("placement.size.y", self.size.y),
            ("placement.size.z", self.size.z),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(FieldError::InvalidParameter { name, value });
            }
        }
        if !self.position.is_finite() || !self.velocity.is_finite() || !self.rotation.is_finite() {
            return Err(FieldError::InvalidParameter {
                name: "placement",
                value: f32::NAN,
            });
        }
        Ok(())
    }

    /// World edge length of one cell along each local axis.
    #[inline]
    pub fn cell_size(&self, grid_size: usize) -> Vec3 {
        self.size / grid_size as f32
    }

    /// World point to continuous index-space coordinates.
    pub fn world_to_grid(&self, point: Vec3, grid_size: usize) -> Vec3 {
        self.rotation.inverse() * (point - self.position) / self.cell_size(grid_size)
    }

    /// Continuous index-space coordinates to a world point.
    pub fn grid_to_world(&self, grid: Vec3, grid_size: usize) -> Vec3 {
        self.position + self.rotation * (grid * self.cell_size(grid_size))
    }

    /// Cell containing a world point, or `None` outside `[0, N)^3`.
    pub fn cell_at(&self, point: Vec3, grid_size: usize) -> Option<[usize; 3]> {
        let g = self.world_to_grid(point, grid_size).floor();
        let n = grid_size as f32;
        if g.cmplt(Vec3::ZERO).any() || g.cmpge(Vec3::splat(n)).any() || !g.is_finite() {
            return None;
        }
        Some([g.x as usize, g.y as usize, g.z as usize])
    }

    /// Grid velocity (cells per unit time) to world velocity.
    pub fn grid_to_world_velocity(&self, v: Vec3, grid_size: usize) -> Vec3 {
        self.rotation * (v * self.cell_size(grid_size)) + self.velocity
    }

    /// World velocity to grid velocity. Inverse of
    /// [`grid_to_world_velocity`](Self::grid_to_world_velocity).
    pub fn world_to_grid_velocity(&self, v: Vec3, grid_size: usize) -> Vec3 {
        self.rotation.inverse() * (v - self.velocity) / self.cell_size(grid_size)
    }
}

/// Coordinate space for [`CellBox`] corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Space {
    /// Index space: cell `(i, j, k)` spans `[i, i+1)` per axis.
    Model,
    World,
}

/// Which cells [`FluidField::get_cells`](crate::FluidField::get_cells) returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellFilter {
    All,
    Blocked,
    Open,
}

impl CellFilter {
    #[inline]
    pub fn accepts(self, blocked: bool) -> bool {
        match self {
            CellFilter::All => true,
            CellFilter::Blocked => blocked,
            CellFilter::Open => !blocked,
        }
    }
}

/// Geometry of one cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellBox {
    pub index: usize,
    pub coord: [usize; 3],
    /// Corners in binary order: bit 0 is +x, bit 1 is +y, bit 2 is +z.
    pub corners: [Vec3; 8],
}

impl CellBox {
    pub fn new(index: usize, coord: [usize; 3], placement: &Placement, grid_size: usize, space: Space) -> Self {
        let min = Vec3::new(coord[0] as f32, coord[1] as f32, coord[2] as f32);
        let corners = std::array::from_fn(|bit| {
            let offset = Vec3::new(
                (bit & 1) as f32,
                ((bit >> 1) & 1) as f32,
                ((bit >> 2) & 1) as f32,
            );
            match space {
                Space::Model => min + offset,
                Space::World => placement.grid_to_world(min + offset, grid_size),
            }
        });
        Self { index, coord, corners }
    }

    pub fn center(&self) -> Vec3 {
        (self.corners[0] + self.corners[7]) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_default_is_unit_cube() {
        let p = Placement::default();
        assert_eq!(p.cell_size(4), Vec3::splat(0.25));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_world_grid_round_trip() {
        let p = Placement {
            position: Vec3::new(10.0, -2.0, 3.0),
            rotation: Quat::from_rotation_y(0.7),
            size: Vec3::new(8.0, 4.0, 2.0),
            velocity: Vec3::ZERO,
        };
        let g = Vec3::new(1.5, 2.25, 3.0);
        let back = p.world_to_grid(p.grid_to_world(g, 8), 8);
        assert!((back - g).length() < 1e-4, "round trip gave {:?}", back);
    }

    #[test]
    fn test_cell_at_bounds() {
        let p = Placement::unit_cells(4);
        assert_eq!(p.cell_at(Vec3::new(0.1, 0.1, 0.1), 4), Some([0, 0, 0]));
        assert_eq!(p.cell_at(Vec3::new(3.9, 2.5, 1.0), 4), Some([3, 2, 1]));
        assert_eq!(p.cell_at(Vec3::new(4.0, 1.0, 1.0), 4), None);
        assert_eq!(p.cell_at(Vec3::new(-0.01, 1.0, 1.0), 4), None);
    }

    #[test]
    fn test_velocity_transform_rotates_and_offsets() {
        let p = Placement {
            rotation: Quat::from_rotation_z(FRAC_PI_2),
            size: Vec3::splat(10.0),
            velocity: Vec3::new(0.0, 0.0, 1.0),
            ..Default::default()
        };
        // One cell per unit time along local x is 1 world unit along world y
        let w = p.grid_to_world_velocity(Vec3::X, 10);
        assert!((w - Vec3::new(0.0, 1.0, 1.0)).length() < 1e-5, "got {:?}", w);
        let back = p.world_to_grid_velocity(w, 10);
        assert!((back - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_invalid_size_rejected() {
        let p = Placement { size: Vec3::new(1.0, 0.0, 1.0), ..Default::default() };
        match p.validate() {
            Err(FieldError::InvalidParameter { name, .. }) => assert_eq!(name, "placement.size.y"),
            other => panic!("expected InvalidParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_cell_box_corners() {
        let p = Placement::unit_cells(4);
        let model = CellBox::new(0, [1, 2, 3], &p, 4, Space::Model);
        assert_eq!(model.corners[0], Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(model.corners[7], Vec3::new(2.0, 3.0, 4.0));
        assert_eq!(model.center(), Vec3::new(1.5, 2.5, 3.5));

        let moved = Placement { position: Vec3::splat(5.0), ..p };
        let world = CellBox::new(0, [0, 0, 0], &moved, 4, Space::World);
        assert_eq!(world.corners[1], Vec3::new(6.0, 5.0, 5.0));
    }

    #[test]
    fn test_filter() {
        assert!(CellFilter::All.accepts(true));
        assert!(CellFilter::Blocked.accepts(true));
        assert!(!CellFilter::Open.accepts(true));
    }
}
