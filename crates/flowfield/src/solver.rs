//! Gauss-Seidel relaxation shared by diffusion and the pressure solve.
//!
//! Solves `c * x = x0 + a * (sum of 6 face neighbours)` over the interior
//! with a fixed sweep count and no convergence test.

use crate::boundary::{ArrayTag, BoundaryContext};
use crate::constants::{DAMPING_TIME_DIVISOR, STENCIL_NEIGHBOURS};
use crate::grid::flat_index;

/// Fixed-count relaxation. Blocked cells are skipped; the boundary pass
/// runs after every sweep so each sweep sees consistent wall values.
pub fn lin_solve(
    ctx: &BoundaryContext<'_>,
    tag: ArrayTag,
    x: &mut [f32],
    x0: &[f32],
    a: f32,
    c: f32,
    iterations: usize,
) {
    let n = ctx.size;
    let (sy, sz) = (n, n * n);
    let inv_c = 1.0 / c;

    for _ in 0..iterations {
        for k in 1..n - 1 {
            for j in 1..n - 1 {
                let row = flat_index(n, 0, j, k);
                for i in row + 1..row + n - 1 {
                    if ctx.blocked[i] {
                        continue;
                    }
                    let sum = x[i - 1] + x[i + 1] + x[i - sy] + x[i + sy] + x[i - sz] + x[i + sz];
                    x[i] = (x0[i] + a * sum) * inv_c;
                }
            }
        }
        ctx.apply(tag, x);
    }
}

/// Implicit diffusion of `x0` into `x` at rate `diffusion`.
pub fn diffuse(
    ctx: &BoundaryContext<'_>,
    tag: ArrayTag,
    x: &mut [f32],
    x0: &[f32],
    diffusion: f32,
    dt: f32,
    iterations: usize,
) {
    let a = dt * diffusion;
    lin_solve(ctx, tag, x, x0, a, 1.0 + STENCIL_NEIGHBOURS * a, iterations);
}

/// Per-step velocity multiplier for a damping rate.
#[inline]
pub fn damping_factor(damping: f32, dt: f32) -> f32 {
    1.0 / (1.0 + damping * dt / DAMPING_TIME_DIVISOR)
}

/// Scale every value in `field` by the damping factor.
pub fn damp(field: &mut [f32], damping: f32, dt: f32) {
    let factor = damping_factor(damping, dt);
    if factor == 1.0 {
        return;
    }
    for v in field.iter_mut() {
        *v *= factor;
    }
}
