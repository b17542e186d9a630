//! Parent velocities for the outer shell of a coupled field.
//!
//! Shell cell centres are converted to world space once per placement and
//! cached. Each step the parent is asked for its flow at those points, and
//! the answers are converted back into this grid's velocity units.

use glam::Vec3;
use log::{debug, warn};

use crate::boundary::{Axis, ShellCell, ShellLayout};
use crate::error::FieldError;
use crate::flow::FlowSource;
use crate::placement::Placement;

/// Parent velocity per shell cell, in grid units, ordered by
/// [`ShellCell::slot`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BorderVelocities {
    samples: Vec<Vec3>,
}

impl BorderVelocities {
    /// Same velocity on every shell cell.
    pub fn uniform(layout: &ShellLayout, velocity: Vec3) -> Self {
        Self {
            samples: vec![velocity; layout.len()],
        }
    }

    /// One component for one shell cell.
    #[inline]
    pub fn component(&self, axis: Axis, cell: &ShellCell) -> Option<f32> {
        self.samples.get(cell.slot).map(|v| v[axis.index()])
    }

    pub fn samples(&self) -> &[Vec3] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Cached shell points plus the last pull result.
#[derive(Clone, Debug, Default)]
pub struct BorderCache {
    points: Vec<Vec3>,
    placement: Option<Placement>,
    velocities: Option<BorderVelocities>,
}

impl BorderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything (regime or parent changed).
    pub fn clear(&mut self) {
        self.points.clear();
        self.placement = None;
        self.velocities = None;
    }

    /// Result of the last successful pull.
    pub fn velocities(&self) -> Option<&BorderVelocities> {
        self.velocities.as_ref()
    }

    /// World positions of the shell cell centres, in slot order.
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Query `parent` at every shell cell and store the result.
    ///
    /// On error the previous velocities are kept.
    pub fn pull(
        &mut self,
        parent: &dyn FlowSource,
        layout: &ShellLayout,
        placement: &Placement,
    ) -> Result<(), FieldError> {
        let n = layout.size();
        if self.placement.as_ref() != Some(placement) || self.points.len() != layout.len() {
            self.points = layout
                .iter()
                .map(|cell| {
                    let [x, y, z] = cell.coord;
                    let centre = Vec3::new(x as f32, y as f32, z as f32) + Vec3::splat(0.5);
                    placement.grid_to_world(centre, n)
                })
                .collect();
            self.placement = Some(*placement);
            debug!("coupling: cached {} border points", self.points.len());
        }

        let radius = placement.cell_size(n).max_element() * 0.5;
        let samples = parent.get_force(&self.points, radius)?;
        if samples.len() != self.points.len() {
            warn!(
                "coupling: parent returned {} samples for {} border points",
                samples.len(),
                self.points.len()
            );
            return Err(FieldError::SampleCountMismatch {
                expected: self.points.len(),
                actual: samples.len(),
            });
        }

        let samples = samples
            .iter()
            .map(|s| placement.world_to_grid_velocity(s.flow, n))
            .collect();
        self.velocities = Some(BorderVelocities { samples });
        Ok(())
    }
}
