//! Semi-Lagrangian advection on the cell-centred grid.
//!
//! Each interior cell traces back along the velocity for one time step and
//! trilinearly samples the source array there.

use crate::boundary::{ArrayTag, BoundaryContext};
use crate::constants::{ADVECTION_MAX_MARGIN, ADVECTION_MIN};
use crate::grid::flat_index;

/// Borrowed velocity field used to trace back.
#[derive(Clone, Copy)]
pub struct Velocity<'a> {
    pub x: &'a [f32],
    pub y: &'a [f32],
    pub z: &'a [f32],
}

impl<'a> Velocity<'a> {
    pub fn new(x: &'a [f32], y: &'a [f32], z: &'a [f32]) -> Self {
        Self { x, y, z }
    }
}

/// Trilinear sample of `field` at continuous index-space `(px, py, pz)`.
///
/// Caller keeps the position inside `[0, N-1)` on every axis.
#[inline]
pub fn sample_trilinear(field: &[f32], n: usize, px: f32, py: f32, pz: f32) -> f32 {
    let i0 = px.floor() as usize;
    let j0 = py.floor() as usize;
    let k0 = pz.floor() as usize;
    let sx = px - i0 as f32;
    let sy = py - j0 as f32;
    let sz = pz - k0 as f32;

    let at = |di: usize, dj: usize, dk: usize| field[flat_index(n, i0 + di, j0 + dj, k0 + dk)];

    let c00 = at(0, 0, 0) * (1.0 - sx) + at(1, 0, 0) * sx;
    let c10 = at(0, 1, 0) * (1.0 - sx) + at(1, 1, 0) * sx;
    let c01 = at(0, 0, 1) * (1.0 - sx) + at(1, 0, 1) * sx;
    let c11 = at(0, 1, 1) * (1.0 - sx) + at(1, 1, 1) * sx;

    let c0 = c00 * (1.0 - sy) + c10 * sy;
    let c1 = c01 * (1.0 - sy) + c11 * sy;

    c0 * (1.0 - sz) + c1 * sz
}

/// Advect `src` into `dst` along `velocity` over `dt`, then run the
/// boundary pass for `tag` on `dst`.
pub fn advect(
    ctx: &BoundaryContext<'_>,
    tag: ArrayTag,
    dst: &mut [f32],
    src: &[f32],
    velocity: Velocity<'_>,
    dt: f32,
) {
    let n = ctx.size;
    let lo = ADVECTION_MIN;
    let hi = n as f32 - ADVECTION_MAX_MARGIN;

    for k in 1..n - 1 {
        for j in 1..n - 1 {
            for i in 1..n - 1 {
                let idx = flat_index(n, i, j, k);
                let px = (i as f32 - dt * velocity.x[idx]).clamp(lo, hi);
                let py = (j as f32 - dt * velocity.y[idx]).clamp(lo, hi);
                let pz = (k as f32 - dt * velocity.z[idx]).clamp(lo, hi);
                dst[idx] = sample_trilinear(src, n, px, py, pz);
            }
        }
    }

    ctx.apply(tag, dst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocked::BlockedCellIndex;
    use crate::boundary::{BoundaryType, ShellLayout};

    const N: usize = 8;

    #[test]
    fn test_trilinear_midpoint() {
        let mut field = vec![0.0; N * N * N];
        field[flat_index(N, 2, 2, 2)] = 1.0;
        field[flat_index(N, 3, 2, 2)] = 3.0;
        let v = sample_trilinear(&field, N, 2.5, 2.0, 2.0);
        assert!((v - 2.0).abs() < 1e-6);
        assert_eq!(sample_trilinear(&field, N, 2.0, 2.0, 2.0), 1.0);
    }

    #[test]
    fn test_zero_velocity_is_identity() {
        let layout = ShellLayout::new(N);
        let obstacles = BlockedCellIndex::new();
        let blocked = vec![false; N * N * N];
        let ctx = BoundaryContext::new(BoundaryType::Closed, 1.0, &layout, &obstacles, &blocked);

        let zero = vec![0.0; N * N * N];
        let mut src = vec![0.0; N * N * N];
        src[flat_index(N, 3, 3, 3)] = 4.0;
        let mut dst = vec![0.0; N * N * N];
        advect(&ctx, ArrayTag::Ink, &mut dst, &src, Velocity::new(&zero, &zero, &zero), 1.0);
        assert_eq!(dst[flat_index(N, 3, 3, 3)], 4.0);
        assert_eq!(dst.iter().sum::<f32>(), 4.0);
    }

    #[test]
    fn test_uniform_velocity_shifts_blob() {
        let layout = ShellLayout::new(N);
        let obstacles = BlockedCellIndex::new();
        let blocked = vec![false; N * N * N];
        let ctx = BoundaryContext::new(BoundaryType::Closed, 1.0, &layout, &obstacles, &blocked);

        let vx = vec![1.0; N * N * N];
        let zero = vec![0.0; N * N * N];
        let mut src = vec![0.0; N * N * N];
        src[flat_index(N, 3, 4, 4)] = 1.0;
        let mut dst = vec![0.0; N * N * N];
        advect(&ctx, ArrayTag::Ink, &mut dst, &src, Velocity::new(&vx, &zero, &zero), 1.0);
        // One cell per unit time along +x
        assert_eq!(dst[flat_index(N, 4, 4, 4)], 1.0);
        assert_eq!(dst[flat_index(N, 3, 4, 4)], 0.0);
    }

    #[test]
    fn test_trace_clamped_inside_grid() {
        let layout = ShellLayout::new(N);
        let obstacles = BlockedCellIndex::new();
        let blocked = vec![false; N * N * N];
        let ctx = BoundaryContext::new(BoundaryType::Closed, 1.0, &layout, &obstacles, &blocked);

        // Huge velocity would trace far outside; must not panic
        let vx = vec![1.0e6; N * N * N];
        let zero = vec![0.0; N * N * N];
        let src = vec![1.0; N * N * N];
        let mut dst = vec![0.0; N * N * N];
        advect(&ctx, ArrayTag::Ink, &mut dst, &src, Velocity::new(&vx, &zero, &zero), 1.0);
        assert!(dst.iter().all(|v| v.is_finite()));
    }
}
