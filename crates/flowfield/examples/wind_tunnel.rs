//! Wind tunnel - an open field blowing past a block, with a finer field
//! coupled to it downstream.
//!
//! The outer field is wrapped in a `SharedField` and acts as the parent of
//! the inner field, whose walls blend their own open value with the outer
//! flow (`OpenShared`).
//!
//! Optional first argument: a YAML file with `FieldParams` for the outer
//! field.
//!
//! Run with: RUST_LOG=debug cargo run --example wind_tunnel -p flowfield --release

use std::path::Path;
use std::sync::Arc;

use flowfield::{
    BoundaryType, CellFilter, FieldError, FieldParams, FluidField, Placement, SharedField, Space, Vec3,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const OUTER_SIZE: usize = 24;
const INNER_SIZE: usize = 16;
const FRAMES: usize = 120;
const WIND: f32 = 4.0;

fn main() -> Result<(), FieldError> {
    env_logger::init();

    let outer_params = match std::env::args().nth(1) {
        Some(path) => FieldParams::load_yaml(Path::new(&path))?,
        None => FieldParams {
            boundary_type: BoundaryType::Open,
            time_step: 0.1,
            iterations: 12,
            damping: 0.2,
            placement: Placement::unit_cells(OUTER_SIZE),
            ..Default::default()
        },
    };

    let mut outer = FluidField::new(OUTER_SIZE, outer_params)?;
    let blocked = outer.set_blocked_box([9, 8, 8], [11, 15, 15], true);
    println!("Outer: {}^3 cells, {} blocked", OUTER_SIZE, blocked);
    println!(
        "Obstacle corners (world): {}",
        outer.get_cells(CellFilter::Blocked, Space::World).len() * 8
    );

    let outer = SharedField::new(outer);

    // Inner field covers the wake behind the block at twice the resolution
    let inner_params = FieldParams {
        boundary_type: BoundaryType::OpenShared,
        time_step: 0.05,
        iterations: 12,
        placement: Placement {
            position: Vec3::new(12.0, 8.0, 8.0),
            size: Vec3::splat(8.0),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut inner = FluidField::new(INNER_SIZE, inner_params)?;
    inner.set_parent(Some(Arc::new(outer.clone())));

    let mut rng = ChaCha8Rng::seed_from_u64(2024);

    println!("\nframe | outer momentum x | outer ink | outer max div | inner momentum x");
    println!("------+------------------+-----------+---------------+-----------------");

    for frame in 0..FRAMES {
        {
            let mut field = outer.write();
            // Wind and ink enter along the upstream face
            for z in 1..OUTER_SIZE - 1 {
                for y in 1..OUTER_SIZE - 1 {
                    field.set_velocity(1, y, z, Vec3::new(WIND, 0.0, 0.0));
                }
            }
            for _ in 0..8 {
                let y = rng.gen_range(2..OUTER_SIZE - 2);
                let z = rng.gen_range(2..OUTER_SIZE - 2);
                field.add_ink(1, y, z, rng.gen_range(0.5..1.0));
            }
            field.update()?;
        }

        // Two fine steps per coarse step
        inner.update()?;
        inner.update()?;

        if frame % 10 == 0 {
            let field = outer.read();
            println!(
                "{:5} | {:16.3} | {:9.3} | {:13.2e} | {:16.3}",
                frame,
                field.total_momentum().x,
                field.total_ink(),
                field.max_divergence(),
                inner.total_momentum().x,
            );
        }
    }

    // Sample a line through the wake
    let points: Vec<Vec3> = (0..8).map(|i| Vec3::new(12.5 + i as f32, 12.0, 12.0)).collect();
    let wake = outer.read().get_flow_at_locations(&points, 0.5);
    println!("\nWake profile (outer):");
    for (p, v) in points.iter().zip(&wake) {
        println!("  x={:5.1}  flow=({:6.3}, {:6.3}, {:6.3})", p.x, v.x, v.y, v.z);
    }

    Ok(())
}
