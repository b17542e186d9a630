//! Numeric constants for the flow field solver.
//!
//! ## Tuned values
//!
//! Some of these are empirical rather than physical. `OPEN_INFLOW_DAMPING`
//! in particular was tuned to keep open walls from feeding energy back
//! into the grid; it has no derivation behind it.

/// Smallest grid side that still has an interior cell.
pub const MIN_GRID_SIZE: usize = 3;

/// Number of face neighbours in the 7-point Laplacian stencil.
pub const STENCIL_NEIGHBOURS: f32 = 6.0;

// =============================================================================
// BOUNDARIES
// =============================================================================

/// Multiplier applied to a value copied onto an `Open` wall when it would
/// push fluid back into the grid.
pub const OPEN_INFLOW_DAMPING: f32 = 0.75;

/// Weight of the local `Open` value when blending with the parent in
/// `OpenShared` mode (the parent gets `1 - OPEN_SHARED_BLEND`).
pub const OPEN_SHARED_BLEND: f32 = 0.5;

// =============================================================================
// BLOCKED CELLS
// =============================================================================

/// Reflection scale for a flat wall segment (plate).
pub const PLATE_REFLECTION: f32 = 1.0;

/// Reflection scale for a cell buried on all six faces.
pub const INSIDE_CORNER_REFLECTION: f32 = 0.25;

/// Reflection scale for a protruding obstacle corner or edge.
pub const OUTSIDE_CORNER_REFLECTION: f32 = 0.5;

// =============================================================================
// STEP
// =============================================================================

/// Damping is applied as `v *= 1 / (1 + damping * dt / DAMPING_TIME_DIVISOR)`.
pub const DAMPING_TIME_DIVISOR: f32 = 20.0;

/// Lower clamp for back-traced sample positions (in cells).
pub const ADVECTION_MIN: f32 = 0.5;

/// Upper clamp is `size - ADVECTION_MAX_MARGIN` so the 8 trilinear
/// samples stay inside the grid.
pub const ADVECTION_MAX_MARGIN: f32 = 1.5;
