//! Reflecting walls.

use super::{sample, ArrayTag, BoundaryRule, ShellCell, Wall};

/// Solid walls. The normal velocity component is mirrored (negated),
/// tangential components are copied, both scaled by the reflectivity.
/// Scalars are copied unscaled, which keeps pressure at zero normal
/// gradient.
#[derive(Clone, Copy, Debug)]
pub struct Closed {
    size: usize,
    reflectivity: f32,
}

impl Closed {
    pub fn new(size: usize, reflectivity: f32) -> Self {
        Self { size, reflectivity }
    }
}

impl BoundaryRule for Closed {
    fn wall_value(&self, field: &[f32], tag: ArrayTag, cell: &ShellCell, wall: Wall) -> f32 {
        let inner = sample(field, self.size, cell.with_axis(wall.axis, wall.inward(self.size)));
        match tag.axis() {
            Some(axis) if axis == wall.axis => -self.reflectivity * inner,
            Some(_) => self.reflectivity * inner,
            None => inner,
        }
    }

    /// Faces reflect. Edges and corners take the plain mean of the shell
    /// cells one step inward along each of their walls, which the earlier
    /// passes already filled, so nothing is reflected twice.
    fn cell_value(&self, field: &[f32], tag: ArrayTag, cell: &ShellCell) -> f32 {
        match cell.walls() {
            [wall] => self.wall_value(field, tag, cell, *wall),
            walls => {
                let sum: f32 = walls
                    .iter()
                    .map(|wall| {
                        let inner = cell.with_axis(wall.axis, wall.inward(self.size));
                        sample(field, self.size, inner)
                    })
                    .sum();
                sum / walls.len() as f32
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::boundary::tests::run_pass;
    use crate::boundary::{ArrayTag, BoundaryType};
    use crate::grid::flat_index;

    const N: usize = 6;

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
    fn test_normal_component_is_mirrored() {
        let mut vx = filled(2.0);
        run_pass(BoundaryType::Closed, 1.0, ArrayTag::VelocityX, &mut vx, N);
        assert_eq!(vx[flat_index(N, 0, 2, 3)], -2.0);
        assert_eq!(vx[flat_index(N, N - 1, 2, 3)], -2.0);
        // Tangential on the y walls
        assert_eq!(vx[flat_index(N, 2, 0, 3)], 2.0);
    }

    #[test]
    fn test_reflectivity_scales_walls() {
        let mut vy = filled(1.0);
        run_pass(BoundaryType::Closed, 0.5, ArrayTag::VelocityY, &mut vy, N);
        assert!((vy[flat_index(N, 3, 0, 3)] + 0.5).abs() < 1e-6);
        assert!((vy[flat_index(N, 0, 3, 3)] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_scalar_copies_inward() {
        let mut ink = filled(3.0);
        run_pass(BoundaryType::Closed, 0.5, ArrayTag::Ink, &mut ink, N);
        assert_eq!(ink[flat_index(N, 0, 2, 2)], 3.0);
        assert_eq!(ink[flat_index(N, 2, 2, N - 1)], 3.0);
        // Corners average edges, which average faces: still 3
        assert!((ink[flat_index(N, 0, 0, 0)] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_edges_average_their_faces() {
        let mut vx = filled(1.0);
        run_pass(BoundaryType::Closed, 1.0, ArrayTag::VelocityX, &mut vx, N);
        // y-wall face is tangential (+1), x-wall face is mirrored (-1)
        assert_eq!(vx[flat_index(N, 1, 0, 2)], 1.0);
        assert_eq!(vx[flat_index(N, 0, 1, 2)], -1.0);
        let edge = vx[flat_index(N, 0, 0, 2)];
        assert!(edge.abs() < 1e-6, "edge value {}", edge);
    }

    #[test]
    fn test_corners_average_their_edges() {
        let mut vx = filled(1.0);
        run_pass(BoundaryType::Closed, 0.5, ArrayTag::VelocityX, &mut vx, N);
        let at = |x, y, z| vx[flat_index(N, x, y, z)];
        let expected = (at(1, 0, 0) + at(0, 1, 0) + at(0, 0, 1)) / 3.0;
        assert!((at(0, 0, 0) - expected).abs() < 1e-6);
        // Edge (1, 0, 0) averages two tangential faces at R=0.5
        assert!((at(1, 0, 0) - 0.5).abs() < 1e-6);
        assert!((at(0, 0, 0) - 0.5 / 3.0).abs() < 1e-6, "corner {}", at(0, 0, 0));
    }
}
