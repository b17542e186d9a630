//! Pressure projection: removes divergence from a velocity field.
//!
//! 1. Negative divergence into `div`, zero `p`
//! 2. Relax `6p = div + Σp` with the shared Gauss-Seidel kernel
//! 3. Subtract the pressure gradient from each component

use crate::boundary::{ArrayTag, BoundaryContext};
use crate::grid::flat_index;
use crate::solver::lin_solve;

/// Project `(vx, vy, vz)` onto its divergence-free part.
///
/// `p` and `div` are scratch and are overwritten.
#[allow(clippy::too_many_arguments)]
pub fn project(
    ctx: &BoundaryContext<'_>,
    vx: &mut [f32],
    vy: &mut [f32],
    vz: &mut [f32],
    p: &mut [f32],
    div: &mut [f32],
    iterations: usize,
) {
    let n = ctx.size;
    let nf = n as f32;
    let (sy, sz) = (n, n * n);

    // 1. Divergence
    p.fill(0.0);
    div.fill(0.0);
    for k in 1..n - 1 {
        for j in 1..n - 1 {
            for i in 1..n - 1 {
                let idx = flat_index(n, i, j, k);
                if ctx.blocked[idx] {
                    continue;
                }
                div[idx] = -0.5
                    * (vx[idx + 1] - vx[idx - 1] + vy[idx + sy] - vy[idx - sy] + vz[idx + sz]
                        - vz[idx - sz])
                    / nf;
            }
        }
    }
    ctx.apply(ArrayTag::Other, div);
    ctx.apply(ArrayTag::Other, p);

    // 2. Pressure
    lin_solve(ctx, ArrayTag::Other, p, div, 1.0, 6.0, iterations);

    // 3. Gradient
    for k in 1..n - 1 {
        for j in 1..n - 1 {
            for i in 1..n - 1 {
                let idx = flat_index(n, i, j, k);
                if ctx.blocked[idx] {
                    continue;
                }
                vx[idx] -= 0.5 * (p[idx + 1] - p[idx - 1]) * nf;
                vy[idx] -= 0.5 * (p[idx + sy] - p[idx - sy]) * nf;
                vz[idx] -= 0.5 * (p[idx + sz] - p[idx - sz]) * nf;
            }
        }
    }
    ctx.apply(ArrayTag::VelocityX, vx);
    ctx.apply(ArrayTag::VelocityY, vy);
    ctx.apply(ArrayTag::VelocityZ, vz);
}

/// Central-difference divergence at an interior cell, in the same units as
/// the projection's source term.
#[inline]
pub fn divergence_at(vx: &[f32], vy: &[f32], vz: &[f32], n: usize, i: usize, j: usize, k: usize) -> f32 {
    let idx = flat_index(n, i, j, k);
    let (sy, sz) = (n, n * n);
    0.5 * (vx[idx + 1] - vx[idx - 1] + vy[idx + sy] - vy[idx - sy] + vz[idx + sz] - vz[idx - sz])
        / n as f32
}

/// Largest `|divergence|` over interior, non-blocked cells.
pub fn max_divergence(vx: &[f32], vy: &[f32], vz: &[f32], blocked: &[bool], n: usize) -> f32 {
    let mut max = 0.0f32;
    for k in 1..n - 1 {
        for j in 1..n - 1 {
            for i in 1..n - 1 {
                if blocked[flat_index(n, i, j, k)] {
                    continue;
                }
                max = max.max(divergence_at(vx, vy, vz, n, i, j, k).abs());
            }
        }
    }
    max
}
