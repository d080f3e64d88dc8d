//! Crate root: public surface, layer map, and crate-wide invariants
//!
//! `flowbound` computes **rigorous reachable sets of continuous dynamical
//! systems**: given a vector field `ẋ = f(x)`, an initial set and a time
//! horizon, it produces an outer approximation of every state reachable
//! from the initial set, with guaranteed enclosure of all rounding and
//! truncation error. The intended use is formal safety verification —
//! proving that trajectories cannot leave a designated safe region.
//!
//! ## Invariants (crate-wide)
//!
//! - **Rounding is an argument, never ambient state.** Every float
//!   primitive takes an explicit [`float::Rounding`]; nothing reads or
//!   writes a process-global rounding mode.
//! - **Outer approximation everywhere.** Intervals are outward-rounded;
//!   Taylor models pair a polynomial with an error bound that absorbs
//!   every round-off; grid discretisation only ever enlarges a set. Any
//!   `contains`/`subset` answer of `true` is a proof.
//! - **Failure is loud.** Arithmetic outside its mathematical domain is
//!   a [`float::DomainError`]; a NaN never appears silently. Rare
//!   correctness-critical unwinds (flow bounding, step construction) are
//!   typed errors caught exactly one layer up; empty intersections and
//!   infeasible branches are ordinary values, not errors.
//! - **No `unsafe`**, enforced below.
//!
//! ## Layer map (leaves first)
//!
//! [`float`] → [`interval`] → [`index`]/[`expansion`] → [`differential`]
//! → [`taylor`] → [`patch`]/[`function`] → [`bounder`]/[`integrator`]
//! → [`enclosure`]/[`grid`]/[`set`] → [`evolver`] → [`analyser`], with
//! [`buffer`] and [`canvas`] on the side.
//!
//! ## Typical use
//!
//! ```ignore
//! use flowbound::{
//!     AnalyserConfig, ConstraintSet, EvolverConfig, Expr, Function, Grid,
//!     IntegratorConfig, PicardIntegrator, ReachabilityAnalyser,
//!     VectorFieldEvolver,
//! };
//! use std::sync::Arc;
//!
//! let (x, y) = (Expr::var(0), Expr::var(1));
//! let field = Function::symbolic(2, vec![-y.clone(), x.clone()])?;
//! let integrator = Arc::new(PicardIntegrator::new(
//!     IntegratorConfig::default().with_maximum_error(1e-6),
//! ));
//! let evolver = VectorFieldEvolver::new(field, integrator, EvolverConfig::default());
//! let analyser = ReachabilityAnalyser::new(evolver, Grid::regular(2, 0.25), AnalyserConfig::default());
//! let certificate = analyser.verify_safety(&initial, &safe)?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// Directed-rounding float primitives and the multi-limb reference type.
pub mod float;
/// Outward-rounded intervals, error bounds, balls, boxes.
pub mod interval;
/// Multi-indices with lexicographic and graded orderings.
pub mod index;
/// Sparse polynomial coefficient storage.
pub mod expansion;
/// Truncated power series with automatic-differentiation algebra.
pub mod differential;
/// Taylor coefficient series of the elementary functions.
pub mod series;
/// Taylor models: polynomials with rigorous error bounds.
pub mod taylor;
/// Function models on concrete box domains.
pub mod patch;
/// Symbolic expressions and the polymorphic function type.
pub mod function;
/// A-priori flow bounds (Picard self-map search).
pub mod bounder;
/// Validated one-step integrators (Picard and series).
pub mod integrator;
/// Labelled Taylor-model patches of reachable sets.
pub mod enclosure;
/// Grids, cells, pavings, and enclosure pavers.
pub mod grid;
/// Constrained sets and feasibility queries.
pub mod set;
/// The evolver: iterated flow steps over a horizon.
pub mod evolver;
/// Lock-to-grid reachability analysis and safety verification.
pub mod analyser;
/// Thread-safe bounded buffer and the parallel evolution driver.
pub mod buffer;
/// Canvas interface and vertex-list plotting.
pub mod canvas;

// ============================================================================
// Canonical re-exports (the single entry point for downstream users)
// ============================================================================

pub use crate::analyser::{
    AnalyserConfig, AnalysisError, ReachabilityAnalyser, SafetyAnswer, SafetyCertificate,
};
pub use crate::bounder::{flow_bounds, FlowBounds, FlowBoundsError};
pub use crate::buffer::{evolve_concurrently, Buffer, BufferStopped};
pub use crate::canvas::{Canvas, Polygon, Projection2, VertexListCanvas};
pub use crate::enclosure::{Enclosure, EnclosureError};
pub use crate::evolver::{EnclosureList, EvolutionError, EvolverConfig, Orbit, VectorFieldEvolver};
pub use crate::float::{DomainError, FloatMP, Rounding};
pub use crate::function::{Elementary, Expr, Function, FunctionError};
pub use crate::grid::{Grid, GridCell, GridError, GridPaving, PaverStrategy};
pub use crate::integrator::{
    FlowStepError, Integrator, IntegratorConfig, PicardIntegrator, SeriesIntegrator,
};
pub use crate::interval::{Ball, ErrorBound, Interval, IntervalBox, LowerBound};
pub use crate::patch::{PatchError, ScalarPatch, VectorPatch};
pub use crate::series::AnalyticOp;
pub use crate::set::{BoxPosition, ConstraintSet, Feasibility};
pub use crate::taylor::{Sweeper, TaylorModel, ThresholdSweeper};
