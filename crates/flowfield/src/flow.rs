//! Anything that can answer "what is the flow at these world points".
//!
//! Used for field-to-field coupling and by force integrators that sample a
//! field without knowing whether it is a grid, a constant wind or a sum of
//! several sources.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use glam::Vec3;

use crate::error::FieldError;
use crate::FluidField;

/// Flow at one query point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlowSample {
    /// World-space flow velocity.
    pub flow: Vec3,
    /// Uniform viscosity multiplier of the source.
    pub viscosity: f32,
}

/// Resolution-independent flow query (`IFluidField`).
pub trait FlowSource: Send + Sync {
    /// One sample per point, in order. `radius` is the extent of the query;
    /// sources are free to ignore it.
    fn get_force(&self, points: &[Vec3], radius: f32) -> Result<Vec<FlowSample>, FieldError>;
}

/// Same flow everywhere.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UniformFlow {
    pub flow: Vec3,
    pub viscosity: f32,
}

impl UniformFlow {
    pub fn new(flow: Vec3, viscosity: f32) -> Self {
        Self { flow, viscosity }
    }
}

impl FlowSource for UniformFlow {
    fn get_force(&self, points: &[Vec3], _radius: f32) -> Result<Vec<FlowSample>, FieldError> {
        let sample = FlowSample {
            flow: self.flow,
            viscosity: self.viscosity,
        };
        Ok(vec![sample; points.len()])
    }
}

/// Sum of several sources. Viscosity is the largest member viscosity.
#[derive(Clone, Default)]
pub struct CompositeFlow {
    members: Vec<Arc<dyn FlowSource>>,
}

impl CompositeFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, member: Arc<dyn FlowSource>) -> Self {
        self.members.push(member);
        self
    }

    pub fn push(&mut self, member: Arc<dyn FlowSource>) {
        self.members.push(member);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl FlowSource for CompositeFlow {
    fn get_force(&self, points: &[Vec3], radius: f32) -> Result<Vec<FlowSample>, FieldError> {
        let mut total = vec![FlowSample::default(); points.len()];
        for member in &self.members {
            let samples = member.get_force(points, radius)?;
            if samples.len() != points.len() {
                return Err(FieldError::SampleCountMismatch {
                    expected: points.len(),
                    actual: samples.len(),
                });
            }
            for (acc, s) in total.iter_mut().zip(&samples) {
                acc.flow += s.flow;
                acc.viscosity = acc.viscosity.max(s.viscosity);
            }
        }
        Ok(total)
    }
}

/// Shared handle to a field so it can serve as another field's parent.
///
/// A field holds the write lock while it steps. Queries made during that
/// time get [`FieldError::ParentBusy`] rather than waiting.
#[derive(Clone)]
pub struct SharedField {
    inner: Arc<RwLock<FluidField>>,
}

impl SharedField {
    pub fn new(field: FluidField) -> Self {
        Self {
            inner: Arc::new(RwLock::new(field)),
        }
    }

    /// Blocking read access. A poisoned lock is recovered; the field's own
    /// step guard reports the fault.
    pub fn read(&self) -> RwLockReadGuard<'_, FluidField> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocking write access, used to step or edit the field.
    pub fn write(&self) -> RwLockWriteGuard<'_, FluidField> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Step the wrapped field.
    pub fn update(&self) -> Result<(), FieldError> {
        self.write().update()
    }
}

impl FlowSource for SharedField {
    fn get_force(&self, points: &[Vec3], radius: f32) -> Result<Vec<FlowSample>, FieldError> {
        let field = match self.inner.try_read() {
            Ok(field) => field,
            Err(TryLockError::WouldBlock) => return Err(FieldError::ParentBusy),
            Err(TryLockError::Poisoned(_)) => return Err(FieldError::StepFaulted),
        };
        field.get_force(points, radius)
    }
}

impl FlowSource for FluidField {
    fn get_force(&self, points: &[Vec3], radius: f32) -> Result<Vec<FlowSample>, FieldError> {
        let viscosity = self.params().viscosity;
        Ok(self
            .get_flow_at_locations(points, radius)
            .into_iter()
            .map(|flow| FlowSample { flow, viscosity })
            .collect())
    }
}
