//! 3D Eulerian flow field
//!
//! A cubic cell-centred grid that carries velocity and a passive tracer
//! ("ink") through diffusion, pressure projection and semi-Lagrangian
//! advection. The outer shell follows one of five boundary regimes and
//! interior cells can be blocked to form obstacles. Fields answer flow
//! queries in world space, which lets one field drive another's walls.
//!
//! # Example
//!
//! ```
//! use flowfield::{FieldParams, FluidField, Vec3};
//!
//! let mut field = FluidField::new(16, FieldParams::default())?;
//! field.set_blocked_box([6, 6, 6], [9, 9, 9], true);
//!
//! // Push some ink through the obstacle
//! for y in 4..12 {
//!     field.add_velocity(2, y, 8, Vec3::new(5.0, 0.0, 0.0));
//!     field.add_ink(2, y, 8, 1.0);
//! }
//! field.update()?;
//!
//! let flow = field.get_flow_at_locations(&[Vec3::splat(0.5)], 0.0);
//! assert_eq!(flow.len(), 1);
//! # Ok::<(), flowfield::FieldError>(())
//! ```

pub mod advection;
pub mod blocked;
pub mod boundary;
pub mod constants;
pub mod coupling;
pub mod error;
pub mod flow;
pub mod grid;
pub mod params;
pub mod placement;
pub mod pressure;
pub mod serde_utils;
pub mod solver;

pub use blocked::{BlockedKind, CacheState, IndexLerp};
pub use boundary::{ArrayTag, Axis, BoundaryType};
pub use error::FieldError;
pub use flow::{CompositeFlow, FlowSample, FlowSource, SharedField, UniformFlow};
pub use glam::{Quat, Vec3};
pub use grid::{FluidGrid, StepBuffers};
pub use params::FieldParams;
pub use placement::{CellBox, CellFilter, Placement, Space};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use advection::Velocity;
use blocked::BlockedCellIndex;
use boundary::{BoundaryContext, ShellLayout};
use constants::MIN_GRID_SIZE;
use coupling::BorderCache;

/// Sent to listeners after obstacle flags change, before the obstacle
/// tables are rebuilt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockedCellsChanged {
    /// Value of [`FluidField::blocked_generation`] after the change.
    pub generation: u64,
    /// Number of flags that actually flipped.
    pub changed: usize,
    /// Always `Dirty` when delivered.
    pub cache_state: CacheState,
}

/// Handle returned by [`FluidField::on_blocked_cells_changed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&BlockedCellsChanged) + Send + Sync>;

/// Marks a step in flight. Released on normal exit only, so a step that
/// panicked leaves the field refusing further steps until `reset()`.
struct StepGuard {
    flag: Arc<AtomicBool>,
}

impl StepGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, FieldError> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(FieldError::StepFaulted);
        }
        Ok(Self { flag: Arc::clone(flag) })
    }
}

impl Drop for StepGuard {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.flag.store(false, Ordering::Release);
        }
    }
}

/// A simulated flow field.
pub struct FluidField {
    grid: FluidGrid,

    /// Scratch arrays (pre-allocated to avoid per-step allocation)
    buffers: StepBuffers,

    params: FieldParams,

    layout: ShellLayout,
    obstacles: BlockedCellIndex,
    border: BorderCache,
    parent: Option<Arc<dyn FlowSource>>,

    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    blocked_generation: u64,

    step_guard: Arc<AtomicBool>,
    frame: u64,
}

impl FluidField {
    /// Create a field of side `size` with the given parameters.
    pub fn new(size: usize, params: FieldParams) -> Result<Self, FieldError> {
        if size < MIN_GRID_SIZE {
            return Err(FieldError::InvalidSize(size));
        }
        params.validate()?;
        Ok(Self::build(size, params))
    }

    /// Create a field with default parameters. Panics if `size < 3`.
    pub fn with_defaults(size: usize) -> Self {
        Self::build(size, FieldParams::default())
    }

    fn build(size: usize, mut params: FieldParams) -> Self {
        params.placement = sized_placement(params.placement, size);
        let grid = FluidGrid::new(size);
        let buffers = StepBuffers::new(&grid);
        debug!(
            "field created: size {}, {:?} walls",
            size, params.boundary_type
        );

        Self {
            layout: ShellLayout::new(size),
            grid,
            buffers,
            params,
            obstacles: BlockedCellIndex::new(),
            border: BorderCache::new(),
            parent: None,
            listeners: Vec::new(),
            next_listener: 0,
            blocked_generation: 0,
            step_guard: Arc::new(AtomicBool::new(false)),
            frame: 0,
        }
    }

    // ========== Configuration ==========

    pub fn size(&self) -> usize {
        self.grid.size()
    }

    pub fn params(&self) -> &FieldParams {
        &self.params
    }

    /// Replace all parameters. Invalidates whatever caches depend on the
    /// values that changed.
    pub fn set_params(&mut self, mut params: FieldParams) -> Result<(), FieldError> {
        params.validate()?;
        params.placement = sized_placement(params.placement, self.grid.size());
        if params.wall_reflectivity != self.params.wall_reflectivity {
            self.obstacles.mark_dirty();
        }
        if params.boundary_type != self.params.boundary_type {
            self.border.clear();
        }
        self.params = params;
        Ok(())
    }

    pub fn set_boundary_type(&mut self, boundary_type: BoundaryType) {
        if boundary_type != self.params.boundary_type {
            self.params.boundary_type = boundary_type;
            self.border.clear();
        }
    }

    pub fn set_wall_reflectivity(&mut self, reflectivity: f32) -> Result<(), FieldError> {
        self.set_params(FieldParams {
            wall_reflectivity: reflectivity,
            ..self.params
        })
    }

    pub fn set_placement(&mut self, placement: Placement) -> Result<(), FieldError> {
        placement.validate()?;
        self.params.placement = sized_placement(placement, self.grid.size());
        Ok(())
    }

    /// Flow source feeding the walls in `OpenShared`/`OpenSlaved` mode.
    pub fn set_parent(&mut self, parent: Option<Arc<dyn FlowSource>>) {
        self.parent = parent;
        self.border.clear();
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    // ========== Grid access ==========

    pub fn grid(&self) -> &FluidGrid {
        &self.grid
    }

    /// Mutable grid access for ink and velocity. Obstacles go through the
    /// `set_blocked_*` methods.
    pub fn grid_mut(&mut self) -> &mut FluidGrid {
        &mut self.grid
    }

    pub fn add_ink(&mut self, x: usize, y: usize, z: usize, amount: f32) {
        self.grid.add_ink(x, y, z, amount);
    }

    pub fn set_ink(&mut self, x: usize, y: usize, z: usize, value: f32) {
        self.grid.set_ink(x, y, z, value);
    }

    pub fn add_velocity(&mut self, x: usize, y: usize, z: usize, amount: Vec3) {
        self.grid.add_velocity(x, y, z, amount);
    }

    pub fn set_velocity(&mut self, x: usize, y: usize, z: usize, value: Vec3) {
        self.grid.set_velocity(x, y, z, value);
    }

    /// Raw ink bytes for GPU upload.
    pub fn ink_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.grid.ink())
    }

    /// Raw bytes of one velocity component.
    pub fn velocity_bytes(&self, axis: Axis) -> &[u8] {
        let component = match axis {
            Axis::X => self.grid.velocity_x(),
            Axis::Y => self.grid.velocity_y(),
            Axis::Z => self.grid.velocity_z(),
        };
        bytemuck::cast_slice(component)
    }

    // ========== Obstacles ==========

    pub fn set_blocked_cell(&mut self, x: usize, y: usize, z: usize, blocked: bool) -> bool {
        let i = self.grid.idx(x, y, z);
        let changed = self.grid.set_blocked(i, blocked);
        self.blocked_changed(changed as usize);
        changed
    }

    /// Set many cells with a single notification. Returns how many changed.
    pub fn set_blocked_cells<I>(&mut self, cells: I, blocked: bool) -> usize
    where
        I: IntoIterator<Item = [usize; 3]>,
    {
        let mut changed = 0;
        for [x, y, z] in cells {
            let i = self.grid.idx(x, y, z);
            changed += self.grid.set_blocked(i, blocked) as usize;
        }
        self.blocked_changed(changed);
        changed
    }

    /// Set every cell in the inclusive box `min..=max`.
    pub fn set_blocked_box(&mut self, min: [usize; 3], max: [usize; 3], blocked: bool) -> usize {
        let cells = (min[2]..=max[2]).flat_map(move |z| {
            (min[1]..=max[1]).flat_map(move |y| (min[0]..=max[0]).map(move |x| [x, y, z]))
        });
        self.set_blocked_cells(cells, blocked)
    }

    pub fn clear_blocked(&mut self) -> usize {
        let changed = self.grid.clear_blocked();
        self.blocked_changed(changed);
        changed
    }

    fn blocked_changed(&mut self, changed: usize) {
        if changed == 0 {
            return;
        }
        self.obstacles.mark_dirty();
        self.blocked_generation += 1;

        let event = BlockedCellsChanged {
            generation: self.blocked_generation,
            changed,
            cache_state: self.obstacles.state(),
        };
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }

    /// Increases every time obstacle flags change.
    pub fn blocked_generation(&self) -> u64 {
        self.blocked_generation
    }

    pub fn on_blocked_cells_changed<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&BlockedCellsChanged) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(other, _)| *other != id);
        self.listeners.len() != before
    }

    pub fn cache_state(&self) -> CacheState {
        self.obstacles.state()
    }

    /// Rebuild the obstacle tables now if they are stale.
    pub fn refresh_obstacles(&mut self) -> bool {
        self.obstacles.ensure_current(
            self.grid.blocked(),
            self.grid.size(),
            self.params.wall_reflectivity,
        )
    }

    /// Fully enclosed cells from the last rebuild.
    pub fn enclosed_cells(&self) -> &[usize] {
        self.obstacles.enclosed()
    }

    /// Obstacle rules for one array from the last rebuild.
    pub fn lerp_table(&self, tag: ArrayTag) -> &[IndexLerp] {
        self.obstacles.table(tag)
    }

    pub fn classification(&self, index: usize) -> Option<BlockedKind> {
        self.obstacles.classification(index)
    }

    // ========== Stepping ==========

    /// Advance the field by one time step.
    pub fn update(&mut self) -> Result<(), FieldError> {
        let _guard = StepGuard::acquire(&self.step_guard)?;

        // 1. Obstacle tables
        self.refresh_obstacles();

        // 2. Parent velocities for coupled walls
        self.pull_border()?;

        // 3. Enclosed cells never move
        self.zero_enclosed();

        // 4. Velocity
        self.velocity_step();

        // 5. Ink
        self.density_step();

        self.frame += 1;
        Ok(())
    }

    fn pull_border(&mut self) -> Result<(), FieldError> {
        let kind = self.params.boundary_type;
        if !kind.is_coupled() {
            return Ok(());
        }
        let parent = self.parent.as_ref().ok_or(FieldError::MissingParent(kind))?;
        match self.border.pull(parent.as_ref(), &self.layout, &self.params.placement) {
            Err(FieldError::ParentBusy) => {
                warn!("coupling: parent is mid-step, skipping frame {}", self.frame);
                Err(FieldError::ParentBusy)
            }
            other => other,
        }
    }

    fn zero_enclosed(&mut self) {
        for &i in self.obstacles.enclosed() {
            self.grid.velocity_x[i] = 0.0;
            self.grid.velocity_y[i] = 0.0;
            self.grid.velocity_z[i] = 0.0;
        }
    }

    fn velocity_step(&mut self) {
        let params = self.params;
        let (dt, iterations) = (params.time_step, params.iterations);
        let FluidGrid {
            velocity_x,
            velocity_y,
            velocity_z,
            blocked,
            ..
        } = &mut self.grid;
        let StepBuffers {
            vx0,
            vy0,
            vz0,
            pressure,
            divergence,
            ..
        } = &mut self.buffers;
        let ctx = boundary_context(&params, &self.layout, &self.obstacles, &self.border, blocked);

        // Diffuse each component into scratch; the three are independent
        vx0.fill(0.0);
        vy0.fill(0.0);
        vz0.fill(0.0);
        rayon::join(
            || solver::diffuse(&ctx, ArrayTag::VelocityX, vx0, velocity_x, params.diffusion, dt, iterations),
            || {
                rayon::join(
                    || solver::diffuse(&ctx, ArrayTag::VelocityY, vy0, velocity_y, params.diffusion, dt, iterations),
                    || solver::diffuse(&ctx, ArrayTag::VelocityZ, vz0, velocity_z, params.diffusion, dt, iterations),
                )
            },
        );

        solver::damp(vx0, params.damping, dt);
        solver::damp(vy0, params.damping, dt);
        solver::damp(vz0, params.damping, dt);

        pressure::project(&ctx, vx0, vy0, vz0, pressure, divergence, iterations);

        // Self-advection along the projected scratch field
        let velocity = Velocity::new(vx0, vy0, vz0);
        advection::advect(&ctx, ArrayTag::VelocityX, velocity_x, vx0, velocity, dt);
        advection::advect(&ctx, ArrayTag::VelocityY, velocity_y, vy0, velocity, dt);
        advection::advect(&ctx, ArrayTag::VelocityZ, velocity_z, vz0, velocity, dt);

        pressure::project(&ctx, velocity_x, velocity_y, velocity_z, pressure, divergence, iterations);
    }

    fn density_step(&mut self) {
        let params = self.params;
        let FluidGrid {
            ink,
            velocity_x,
            velocity_y,
            velocity_z,
            blocked,
            ..
        } = &mut self.grid;
        let ink0 = &mut self.buffers.ink0;
        let ctx = boundary_context(&params, &self.layout, &self.obstacles, &self.border, blocked);

        ink0.fill(0.0);
        solver::diffuse(&ctx, ArrayTag::Ink, ink0, ink, params.diffusion, params.time_step, params.iterations);
        let velocity = Velocity::new(velocity_x, velocity_y, velocity_z);
        advection::advect(&ctx, ArrayTag::Ink, ink, ink0, velocity, params.time_step);
    }

    /// Project the live velocity field onto its divergence-free part.
    pub fn project(&mut self) {
        self.refresh_obstacles();
        let FluidGrid {
            velocity_x,
            velocity_y,
            velocity_z,
            blocked,
            ..
        } = &mut self.grid;
        let ctx = boundary_context(&self.params, &self.layout, &self.obstacles, &self.border, blocked);
        pressure::project(
            &ctx,
            velocity_x,
            velocity_y,
            velocity_z,
            &mut self.buffers.pressure,
            &mut self.buffers.divergence,
            self.params.iterations,
        );
    }

    /// Run one boundary pass over every live array.
    pub fn enforce_boundaries(&mut self) {
        self.refresh_obstacles();
        let FluidGrid {
            ink,
            velocity_x,
            velocity_y,
            velocity_z,
            blocked,
            ..
        } = &mut self.grid;
        let ctx = boundary_context(&self.params, &self.layout, &self.obstacles, &self.border, blocked);
        ctx.apply(ArrayTag::VelocityX, velocity_x);
        ctx.apply(ArrayTag::VelocityY, velocity_y);
        ctx.apply(ArrayTag::VelocityZ, velocity_z);
        ctx.apply(ArrayTag::Ink, ink);
    }

    /// Clear ink, velocity and scratch after a faulted step. Obstacles,
    /// parameters and listeners are kept.
    pub fn reset(&mut self) {
        self.grid.clear_fields();
        self.buffers.clear();
        self.border.clear();
        self.obstacles.mark_dirty();
        self.frame = 0;
        self.step_guard.store(false, Ordering::Release);
        debug!("field reset");
    }

    /// True if a step was interrupted and `reset()` has not been called.
    pub fn is_faulted(&self) -> bool {
        self.step_guard.load(Ordering::Acquire)
    }

    /// Completed steps since creation or the last reset.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // ========== Queries ==========

    /// World-space flow at each point, sampled from the cell containing it.
    ///
    /// Points outside the grid get zero. A point inside a blocked cell gets
    /// the negated world flow of that cell, grid velocity included. `radius` is accepted for interface
    /// compatibility and currently ignored.
    pub fn get_flow_at_locations(&self, points: &[Vec3], _radius: f32) -> Vec<Vec3> {
        let n = self.grid.size();
        let placement = &self.params.placement;
        points
            .iter()
            .map(|&point| match placement.cell_at(point, n) {
                None => Vec3::ZERO,
                Some([x, y, z]) => {
                    let i = self.grid.idx(x, y, z);
                    let flow = placement.grid_to_world_velocity(self.grid.velocity_of(i), n);
                    if self.grid.blocked[i] {
                        -flow
                    } else {
                        flow
                    }
                }
            })
            .collect()
    }

    /// Corner geometry of every cell matching `filter`.
    pub fn get_cells(&self, filter: CellFilter, space: Space) -> Vec<CellBox> {
        let n = self.grid.size();
        self.grid
            .blocked()
            .iter()
            .enumerate()
            .filter(|&(_, &blocked)| filter.accepts(blocked))
            .map(|(i, _)| {
                let (x, y, z) = self.grid.to_3d(i);
                CellBox::new(i, [x, y, z], &self.params.placement, n, space)
            })
            .collect()
    }

    // ========== Diagnostics ==========

    /// Sum of velocity over every cell, in grid units.
    pub fn total_momentum(&self) -> Vec3 {
        let sum = |v: &[f32]| v.iter().sum::<f32>();
        Vec3::new(
            sum(self.grid.velocity_x()),
            sum(self.grid.velocity_y()),
            sum(self.grid.velocity_z()),
        )
    }

    pub fn total_ink(&self) -> f32 {
        self.grid.ink().iter().sum()
    }

    /// Largest divergence over interior, open cells.
    pub fn max_divergence(&self) -> f32 {
        pressure::max_divergence(
            self.grid.velocity_x(),
            self.grid.velocity_y(),
            self.grid.velocity_z(),
            self.grid.blocked(),
            self.grid.size(),
        )
    }
}

fn boundary_context<'a>(
    params: &FieldParams,
    layout: &'a ShellLayout,
    obstacles: &'a BlockedCellIndex,
    border: &'a BorderCache,
    blocked: &'a [bool],
) -> BoundaryContext<'a> {
    BoundaryContext::new(
        params.boundary_type,
        params.wall_reflectivity,
        layout,
        obstacles,
        blocked,
    )
    .with_border(border.velocities())
}

/// An untouched default placement means one cell per world unit at the
/// origin.
fn sized_placement(placement: Placement, size: usize) -> Placement {
    if placement == Placement::default() {
        Placement::unit_cells(size)
    } else {
        placement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_new_rejects_tiny_grid() {
        assert!(matches!(
            FluidField::new(2, FieldParams::default()),
            Err(FieldError::InvalidSize(2))
        ));
    }

    #[test]
    fn test_new_rejects_bad_params() {
        let params = FieldParams { iterations: 0, ..Default::default() };
        assert!(FluidField::new(8, params).is_err());
    }

    #[test]
    fn test_update_counts_frames() {
        let mut field = FluidField::with_defaults(6);
        field.update().unwrap();
        field.update().unwrap();
        assert_eq!(field.frame(), 2);
    }

    #[test]
    fn test_blocked_setter_marks_dirty_and_notifies() {
        let mut field = FluidField::with_defaults(8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        field.on_blocked_cells_changed(move |event| sink.lock().unwrap().push(*event));

        assert!(field.set_blocked_cell(3, 3, 3, true));
        assert_eq!(field.cache_state(), CacheState::Dirty);
        assert!(!field.set_blocked_cell(3, 3, 3, true));

        let events = seen.lock().unwrap().clone();
        assert_eq!(events.len(), 1, "unchanged write should not notify");
        assert_eq!(events[0].generation, 1);
        assert_eq!(events[0].cache_state, CacheState::Dirty);

        field.update().unwrap();
        assert_eq!(field.cache_state(), CacheState::Clean);
    }

    #[test]
    fn test_box_setter_counts_cells() {
        let mut field = FluidField::with_defaults(8);
        assert_eq!(field.set_blocked_box([2, 2, 2], [3, 4, 2], true), 6);
        assert_eq!(field.blocked_generation(), 1);
        assert_eq!(field.clear_blocked(), 6);
        assert_eq!(field.blocked_generation(), 2);
    }

    #[test]
    fn test_removed_listener_not_called() {
        let mut field = FluidField::with_defaults(6);
        let hits = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&hits);
        let id = field.on_blocked_cells_changed(move |_| *sink.lock().unwrap() += 1);
        assert!(field.remove_listener(id));
        assert!(!field.remove_listener(id));
        field.set_blocked_cell(2, 2, 2, true);
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[test]
    fn test_reflectivity_change_marks_dirty() {
        let mut field = FluidField::with_defaults(6);
        field.set_wall_reflectivity(0.5).unwrap();
        assert_eq!(field.cache_state(), CacheState::Dirty);
        assert!(field.refresh_obstacles());
        assert!(field.set_wall_reflectivity(-1.0).is_err());
    }

    #[test]
    fn test_coupled_without_parent_fails() {
        let mut field = FluidField::with_defaults(6);
        field.set_boundary_type(BoundaryType::OpenSlaved);
        assert!(matches!(
            field.update(),
            Err(FieldError::MissingParent(BoundaryType::OpenSlaved))
        ));
        // A clean error does not poison the field
        assert!(!field.is_faulted());
    }

    #[test]
    fn test_byte_views() {
        let mut field = FluidField::with_defaults(4);
        field.set_ink(1, 1, 1, 1.0);
        assert_eq!(field.ink_bytes().len(), 64 * 4);
        assert_eq!(field.velocity_bytes(Axis::Z).len(), 64 * 4);
        let i = field.grid().idx(1, 1, 1) * 4;
        assert_eq!(&field.ink_bytes()[i..i + 4], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn test_default_placement_is_unit_cells() {
        let mut field = FluidField::with_defaults(8);
        assert_eq!(field.params().placement, Placement::unit_cells(8));

        let moved = Placement { position: Vec3::X, ..Default::default() };
        field.set_placement(moved).unwrap();
        assert_eq!(field.params().placement, moved);
        field.set_placement(Placement::default()).unwrap();
        assert_eq!(field.params().placement.size, Vec3::splat(8.0));
    }

    #[test]
    fn test_get_cells_filters() {
        let mut field = FluidField::with_defaults(4);
        field.set_blocked_cell(1, 2, 1, true);
        let blocked = field.get_cells(CellFilter::Blocked, Space::Model);
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].coord, [1, 2, 1]);
        assert_eq!(field.get_cells(CellFilter::Open, Space::World).len(), 63);
        assert_eq!(field.get_cells(CellFilter::All, Space::Model).len(), 64);
    }
}
