//! Periodic walls.

use super::{sample, ArrayTag, BoundaryRule, ShellCell, Wall};

/// Opposite walls share one value so that cell 0 equals cell N-1.
///
/// Scalars and the normal velocity component take the last interior layer
/// (`N-2`) on both sides. Tangential velocity takes the mean of the first
/// and last interior layers.
#[derive(Clone, Copy, Debug)]
pub struct WrapAround {
    size: usize,
}

impl WrapAround {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl BoundaryRule for WrapAround {
    fn wall_value(&self, field: &[f32], tag: ArrayTag, cell: &ShellCell, wall: Wall) -> f32 {
        let far = sample(field, self.size, cell.with_axis(wall.axis, self.size - 2));
        match tag.axis() {
            Some(axis) if axis != wall.axis => {
                let near = sample(field, self.size, cell.with_axis(wall.axis, 1));
                0.5 * (near + far)
            }
            _ => far,
        }
    }
}
