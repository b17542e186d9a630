//! Cubic cell-centred grid holding ink, velocity and obstacle flags.
//!
//! Every array is flattened with `idx(x, y, z) = x + y*N + z*N*N`. Cells on
//! the outer shell (any coordinate 0 or N-1) belong to the boundary engine;
//! the solver kernels only sweep the interior.

use glam::Vec3;

use crate::constants::MIN_GRID_SIZE;

/// Flat index of `(x, y, z)` in a grid of side `n`.
///
/// Out-of-range coordinates are a caller bug; only debug builds check them.
#[inline]
pub fn flat_index(n: usize, x: usize, y: usize, z: usize) -> usize {
    debug_assert!(
        x < n && y < n && z < n,
        "cell ({}, {}, {}) outside grid of size {}",
        x,
        y,
        z,
        n
    );
    x + y * n + z * n * n
}

/// Inverse of [`flat_index`].
#[inline]
pub fn coord_of(n: usize, index: usize) -> (usize, usize, usize) {
    let z = index / (n * n);
    let rem = index - z * n * n;
    let y = rem / n;
    let x = rem - y * n;
    (x, y, z)
}

/// Cubic grid of side `size` with parallel scalar/vector arrays.
#[derive(Clone, Debug)]
pub struct FluidGrid {
    /// Cells per side. Fixed at construction.
    size: usize,

    /// Passive tracer carried by the flow
    pub(crate) ink: Vec<f32>,

    /// X-component of velocity (cells per unit time)
    pub(crate) velocity_x: Vec<f32>,

    /// Y-component of velocity
    pub(crate) velocity_y: Vec<f32>,

    /// Z-component of velocity
    pub(crate) velocity_z: Vec<f32>,

    /// Interior obstacles. Only changed through explicit setters.
    pub(crate) blocked: Vec<bool>,
}

impl FluidGrid {
    /// Create an empty grid of side `size`.
    pub fn new(size: usize) -> Self {
        assert!(
            size >= MIN_GRID_SIZE,
            "grid size must be at least {}, got {}",
            MIN_GRID_SIZE,
            size
        );
        let count = size * size * size;

        Self {
            size,
            ink: vec![0.0; count],
            velocity_x: vec![0.0; count],
            velocity_y: vec![0.0; count],
            velocity_z: vec![0.0; count],
            blocked: vec![false; count],
        }
    }

    /// Cells per side (`N`).
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Total cell count (`N^3`).
    #[inline]
    pub fn size_1d(&self) -> usize {
        self.size * self.size * self.size
    }

    // ========== Index functions ==========

    /// Flat index of cell `(x, y, z)`.
    #[inline]
    pub fn idx(&self, x: usize, y: usize, z: usize) -> usize {
        flat_index(self.size, x, y, z)
    }

    /// Cell coordinates of a flat index.
    #[inline]
    pub fn to_3d(&self, index: usize) -> (usize, usize, usize) {
        coord_of(self.size, index)
    }

    /// True for cells on the outer shell.
    #[inline]
    pub fn is_shell(&self, x: usize, y: usize, z: usize) -> bool {
        let last = self.size - 1;
        x == 0 || y == 0 || z == 0 || x == last || y == last || z == last
    }

    // ========== Field accessors ==========

    /// Ink density for every cell.
    pub fn ink(&self) -> &[f32] {
        &self.ink
    }

    /// X velocity for every cell.
    pub fn velocity_x(&self) -> &[f32] {
        &self.velocity_x
    }

    /// Y velocity for every cell.
    pub fn velocity_y(&self) -> &[f32] {
        &self.velocity_y
    }

    /// Z velocity for every cell.
    pub fn velocity_z(&self) -> &[f32] {
        &self.velocity_z
    }

    /// Obstacle flags for every cell.
    pub fn blocked(&self) -> &[bool] {
        &self.blocked
    }

    /// Velocity of cell `(x, y, z)` as a vector.
    #[inline]
    pub fn velocity_at(&self, x: usize, y: usize, z: usize) -> Vec3 {
        self.velocity_of(self.idx(x, y, z))
    }

    #[inline]
    pub(crate) fn velocity_of(&self, index: usize) -> Vec3 {
        Vec3::new(
            self.velocity_x[index],
            self.velocity_y[index],
            self.velocity_z[index],
        )
    }

    /// Ink at cell `(x, y, z)`.
    #[inline]
    pub fn ink_at(&self, x: usize, y: usize, z: usize) -> f32 {
        self.ink[self.idx(x, y, z)]
    }

    #[inline]
    pub fn is_blocked(&self, x: usize, y: usize, z: usize) -> bool {
        self.blocked[self.idx(x, y, z)]
    }

    // ========== Mutators ==========

    pub fn add_ink(&mut self, x: usize, y: usize, z: usize, amount: f32) {
        let i = self.idx(x, y, z);
        self.ink[i] += amount;
    }

    pub fn set_ink(&mut self, x: usize, y: usize, z: usize, value: f32) {
        let i = self.idx(x, y, z);
        self.ink[i] = value;
    }

    pub fn add_velocity(&mut self, x: usize, y: usize, z: usize, amount: Vec3) {
        let i = self.idx(x, y, z);
        self.velocity_x[i] += amount.x;
        self.velocity_y[i] += amount.y;
        self.velocity_z[i] += amount.z;
    }

    pub fn set_velocity(&mut self, x: usize, y: usize, z: usize, value: Vec3) {
        let i = self.idx(x, y, z);
        self.velocity_x[i] = value.x;
        self.velocity_y[i] = value.y;
        self.velocity_z[i] = value.z;
    }

    /// Set one obstacle flag. Returns true if the flag changed.
    pub(crate) fn set_blocked(&mut self, index: usize, blocked: bool) -> bool {
        let changed = self.blocked[index] != blocked;
        self.blocked[index] = blocked;
        changed
    }

    /// Zero ink and velocity, keeping obstacles.
    pub fn clear_fields(&mut self) {
        self.ink.fill(0.0);
        self.velocity_x.fill(0.0);
        self.velocity_y.fill(0.0);
        self.velocity_z.fill(0.0);
    }

    /// Clear every obstacle flag.
    pub(crate) fn clear_blocked(&mut self) -> usize {
        let count = self.blocked.iter().filter(|&&b| b).count();
        self.blocked.fill(false);
        count
    }
}

/// Scratch arrays reused by every step (avoids per-step allocation).
///
/// Owned by exactly one field; contents are meaningless between steps.
#[derive(Clone, Debug)]
pub struct StepBuffers {
    pub vx0: Vec<f32>,
    pub vy0: Vec<f32>,
    pub vz0: Vec<f32>,
    pub ink0: Vec<f32>,
    pub pressure: Vec<f32>,
    pub divergence: Vec<f32>,
}

impl StepBuffers {
    /// Create buffers sized for the given grid.
    pub fn new(grid: &FluidGrid) -> Self {
        let count = grid.size_1d();

        Self {
            vx0: vec![0.0; count],
            vy0: vec![0.0; count],
            vz0: vec![0.0; count],
            ink0: vec![0.0; count],
            pressure: vec![0.0; count],
            divergence: vec![0.0; count],
        }
    }

    /// Clear all buffers to zero.
    pub fn clear(&mut self) {
        self.vx0.fill(0.0);
        self.vy0.fill(0.0);
        self.vz0.fill(0.0);
        self.ink0.fill(0.0);
        self.pressure.fill(0.0);
        self.divergence.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_creation() {
        let grid = FluidGrid::new(8);
        assert_eq!(grid.size(), 8);
        assert_eq!(grid.size_1d(), 512);
        assert_eq!(grid.ink().len(), 512);
        assert_eq!(grid.blocked().len(), 512);
    }

    #[test]
    fn test_cell_index() {
        let grid = FluidGrid::new(4);
        // Index should be x + y*N + z*N*N
        assert_eq!(grid.idx(0, 0, 0), 0);
        assert_eq!(grid.idx(1, 0, 0), 1);
        assert_eq!(grid.idx(0, 1, 0), 4);
        assert_eq!(grid.idx(0, 0, 1), 16);
        assert_eq!(grid.idx(3, 2, 1), 3 + 2 * 4 + 16);
    }

    #[test]
    fn test_index_round_trip() {
        let grid = FluidGrid::new(5);
        for z in 0..5 {
            for y in 0..5 {
                for x in 0..5 {
                    assert_eq!(grid.to_3d(grid.idx(x, y, z)), (x, y, z));
                }
            }
        }
    }

    #[test]
    fn test_shell_detection() {
        let grid = FluidGrid::new(5);
        assert!(grid.is_shell(0, 2, 2));
        assert!(grid.is_shell(2, 4, 2));
        assert!(!grid.is_shell(1, 1, 3));
        assert!(!grid.is_shell(2, 2, 2));
    }

    #[test]
    fn test_mutators() {
        let mut grid = FluidGrid::new(6);
        grid.add_ink(2, 3, 4, 1.5);
        grid.add_ink(2, 3, 4, 0.5);
        assert_eq!(grid.ink_at(2, 3, 4), 2.0);

        grid.set_velocity(1, 1, 1, Vec3::new(1.0, 2.0, 3.0));
        grid.add_velocity(1, 1, 1, Vec3::new(0.5, 0.0, -1.0));
        assert_eq!(grid.velocity_at(1, 1, 1), Vec3::new(1.5, 2.0, 2.0));

        grid.clear_fields();
        assert_eq!(grid.ink_at(2, 3, 4), 0.0);
        assert_eq!(grid.velocity_at(1, 1, 1), Vec3::ZERO);
    }

    #[test]
    fn test_set_blocked_reports_change() {
        let mut grid = FluidGrid::new(4);
        let i = grid.idx(1, 2, 1);
        assert!(grid.set_blocked(i, true));
        assert!(!grid.set_blocked(i, true));
        assert!(grid.is_blocked(1, 2, 1));
        assert_eq!(grid.clear_blocked(), 1);
        assert!(!grid.is_blocked(1, 2, 1));
    }

    #[test]
    #[should_panic(expected = "grid size must be at least 3, got 2")]
    fn test_tiny_grid_panics() {
        let _ = FluidGrid::new(2);
    }
}
