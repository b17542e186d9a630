//! Open walls, standalone or coupled to a parent flow source.

use super::{sample, ArrayTag, BoundaryRule, ShellCell, Wall};
use crate::constants::{OPEN_INFLOW_DAMPING, OPEN_SHARED_BLEND};
use crate::coupling::BorderVelocities;

/// Walls copy the adjacent interior value. A normal velocity component
/// pointing back into the grid is damped.
#[derive(Clone, Copy, Debug)]
pub struct Open {
    size: usize,
}

impl Open {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl BoundaryRule for Open {
    fn wall_value(&self, field: &[f32], tag: ArrayTag, cell: &ShellCell, wall: Wall) -> f32 {
        let inner = sample(field, self.size, cell.with_axis(wall.axis, wall.inward(self.size)));
        if tag.axis() == Some(wall.axis) && wall.is_inflow(inner) {
            inner * OPEN_INFLOW_DAMPING
        } else {
            inner
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CouplingMode {
    /// Blend the local open value with the parent.
    Shared,
    /// Take the parent value as-is.
    Slaved,
}

/// Open walls that take velocity from a parent.
///
/// Scalars, and velocity before the first parent pull, fall back to
/// plain [`Open`].
#[derive(Clone, Copy, Debug)]
pub struct Coupled<'a> {
    open: Open,
    mode: CouplingMode,
    border: Option<&'a BorderVelocities>,
}

impl<'a> Coupled<'a> {
    pub fn new(size: usize, mode: CouplingMode, border: Option<&'a BorderVelocities>) -> Self {
        Self {
            open: Open::new(size),
            mode,
            border,
        }
    }
}

impl BoundaryRule for Coupled<'_> {
    fn wall_value(&self, field: &[f32], tag: ArrayTag, cell: &ShellCell, wall: Wall) -> f32 {
        self.open.wall_value(field, tag, cell, wall)
    }

    fn cell_value(&self, field: &[f32], tag: ArrayTag, cell: &ShellCell) -> f32 {
        let open = self.open.cell_value(field, tag, cell);
        let parent = match (tag.axis(), self.border) {
            (Some(axis), Some(border)) => border.component(axis, cell),
            _ => None,
        };

        match (parent, self.mode) {
            (None, _) => open,
            (Some(p), CouplingMode::Slaved) => p,
            (Some(p), CouplingMode::Shared) => {
                OPEN_SHARED_BLEND * open + (1.0 - OPEN_SHARED_BLEND) * p
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::tests::run_pass;
    use crate::boundary::{BoundaryType, ShellLayout};
    use crate::grid::flat_index;
    use glam::Vec3;

    const N: usize = 5;

    fn filled(value: f32) -> Vec<f32> {
        let mut field = vec![0.0; N * N * N];
        for z in 1..N - 1 {
            for y in 1..N - 1 {
                for x in 1..N - 1 {
                    field[flat_index(N, x, y, z)] = value;
                }
            }
        }
        field
    }

    #[test]
    fn test_outflow_is_copied() {
        // +x flow leaves through the max wall, enters through the min wall
        let mut vx = filled(1.0);
        run_pass(BoundaryType::Open, 1.0, ArrayTag::VelocityX, &mut vx, N);
        assert_eq!(vx[flat_index(N, N - 1, 2, 2)], 1.0);
        assert!((vx[flat_index(N, 0, 2, 2)] - OPEN_INFLOW_DAMPING).abs() < 1e-6);
    }

    #[test]
    fn test_tangential_not_damped() {
        let mut vx = filled(1.0);
        run_pass(BoundaryType::Open, 1.0, ArrayTag::VelocityX, &mut vx, N);
        assert_eq!(vx[flat_index(N, 2, 0, 2)], 1.0);
        assert_eq!(vx[flat_index(N, 2, 2, N - 1)], 1.0);
    }

    #[test]
    fn test_coupled_without_border_is_open() {
        let mut a = filled(-0.4);
        let mut b = a.clone();
        run_pass(BoundaryType::Open, 1.0, ArrayTag::VelocityZ, &mut a, N);
        run_pass(BoundaryType::OpenSlaved, 1.0, ArrayTag::VelocityZ, &mut b, N);
        assert_eq!(a, b);
    }

    #[test]
    fn test_slaved_and_shared_use_parent() {
        let layout = ShellLayout::new(N);
        let border = BorderVelocities::uniform(&layout, Vec3::new(2.0, 0.0, 0.0));
        let mut field = filled(1.0);

        let slaved = Coupled::new(N, CouplingMode::Slaved, Some(&border));
        crate::boundary::fill_shell(&layout, &slaved, ArrayTag::VelocityX, &mut field);
        assert_eq!(field[flat_index(N, 2, 0, 2)], 2.0);
        assert_eq!(field[flat_index(N, 0, 0, 0)], 2.0);

        let mut field = filled(1.0);
        let shared = Coupled::new(N, CouplingMode::Shared, Some(&border));
        crate::boundary::fill_shell(&layout, &shared, ArrayTag::VelocityX, &mut field);
        // Outflow wall: open copy 1.0, parent 2.0
        assert!((field[flat_index(N, N - 1, 2, 2)] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_coupled_scalar_ignores_parent() {
        let layout = ShellLayout::new(N);
        let border = BorderVelocities::uniform(&layout, Vec3::splat(9.0));
        let mut ink = filled(0.25);
        let slaved = Coupled::new(N, CouplingMode::Slaved, Some(&border));
        crate::boundary::fill_shell(&layout, &slaved, ArrayTag::Ink, &mut ink);
        assert_eq!(ink[flat_index(N, 0, 2, 2)], 0.25);
    }
}
