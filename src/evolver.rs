//! The evolver: iterated flow steps over a time horizon
//!
//! [`VectorFieldEvolver`] walks a working deque of timed enclosures. Each
//! round pops one, asks the integrator for a one-step flow patch over the
//! enclosure's bounding box, applies the flow over the whole step to
//! extend the reach set, applies it at the step endpoint to produce the
//! next working enclosure, and requeues. Oversized enclosures are split
//! (when subdivisions are enabled), oversized Taylor-model errors are
//! reabsorbed as parameters (when reconditioning is enabled), and a
//! step-construction failure is answered by splitting before giving up.
//!
//! Step sizes come out of the bounder/integrator as halvings of the
//! proposed step, so evolution times are sums of dyadic numbers and the
//! time comparisons below are exact until the final partial step.
//!
//! Cancellation is cooperative: the flag is checked between steps, and on
//! observation the working set is discarded and the orbit collected so
//! far is returned.

use crate::enclosure::{Enclosure, EnclosureError};
use crate::function::Function;
use crate::grid::GridError;
use crate::integrator::{FlowStepError, Integrator};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A list of enclosures.
pub type EnclosureList = Vec<Enclosure>;

/// Evolution failures.
#[derive(Debug, Error)]
pub enum EvolutionError {
    /// The working-set cap was hit; the partial orbit is attached.
    #[error("working-set cap of {cap} exceeded; returning partial orbit")]
    ResourceExhaustion {
        /// The configured cap.
        cap: usize,
        /// Everything evolved before the cap was hit.
        partial: Box<Orbit>,
    },
    /// A flow step could not be constructed even after splitting.
    #[error(transparent)]
    Step(#[from] FlowStepError),
    /// Enclosure transformation failed.
    #[error(transparent)]
    Enclosure(#[from] EnclosureError),
    /// Grid discretisation failed (lock-to-grid, chain reach).
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Evolution products: reach, intermediate and final enclosure lists.
#[derive(Clone, Debug, Default)]
pub struct Orbit {
    initial: EnclosureList,
    reach: EnclosureList,
    intermediate: EnclosureList,
    final_set: EnclosureList,
}

impl Orbit {
    /// The initial set(s).
    pub fn initial(&self) -> &EnclosureList {
        &self.initial
    }

    /// Union of all enclosures produced at any intermediate time.
    pub fn reach(&self) -> &EnclosureList {
        &self.reach
    }

    /// Enclosures at step (lock-to-grid) boundaries.
    pub fn intermediate(&self) -> &EnclosureList {
        &self.intermediate
    }

    /// Enclosures at the requested termination time.
    pub fn final_set(&self) -> &EnclosureList {
        &self.final_set
    }

    /// Merge another orbit's contributions (set union of lists; the
    /// union is commutative and associative, so merge order between
    /// independently evolved enclosures does not matter).
    pub fn absorb(&mut self, other: Orbit) {
        self.initial.extend(other.initial);
        self.reach.extend(other.reach);
        self.intermediate.extend(other.intermediate);
        self.final_set.extend(other.final_set);
    }
}

/// Evolver configuration.
#[derive(Clone, Debug)]
pub struct EvolverConfig {
    /// Upper cap on the integrator step size.
    pub maximum_step_size: f64,
    /// Radius above which an enclosure is split before stepping.
    pub maximum_enclosure_radius: f64,
    /// Per-component Taylor-model error triggering reconditioning.
    pub maximum_spatial_error: f64,
    /// Reabsorb oversized errors as fresh parameters each step.
    pub enable_reconditioning: bool,
    /// Allow mid-evolution splitting.
    pub enable_subdivisions: bool,
    /// Cap on simultaneously working sets.
    pub maximum_working_sets: usize,
}

impl Default for EvolverConfig {
    fn default() -> Self {
        EvolverConfig {
            maximum_step_size: 0.125,
            maximum_enclosure_radius: 0.5,
            maximum_spatial_error: 1e-4,
            enable_reconditioning: true,
            enable_subdivisions: true,
            maximum_working_sets: 1024,
        }
    }
}

impl EvolverConfig {
    /// Set the step-size cap.
    pub fn with_maximum_step_size(mut self, h: f64) -> Self {
        self.maximum_step_size = h;
        self
    }

    /// Set the splitting radius.
    pub fn with_maximum_enclosure_radius(mut self, r: f64) -> Self {
        self.maximum_enclosure_radius = r;
        self
    }
}

/// Computes orbits of `ẋ = f(x)` by iterating a validated integrator.
pub struct VectorFieldEvolver {
    system: Function,
    integrator: Arc<dyn Integrator>,
    config: EvolverConfig,
    cancelled: Arc<AtomicBool>,
}

impl VectorFieldEvolver {
    /// Build from a vector field and an integrator.
    pub fn new(system: Function, integrator: Arc<dyn Integrator>, config: EvolverConfig) -> Self {
        debug_assert_eq!(system.argument_size(), system.result_size());
        VectorFieldEvolver { system, integrator, config, cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// The vector field.
    pub fn system(&self) -> &Function {
        &self.system
    }

    /// The configuration.
    pub fn config(&self) -> &EvolverConfig {
        &self.config
    }

    /// A handle that cancels the evolution when set. The driver checks it
    /// between integrator steps.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Compute the orbit of `initial` up to `time`.
    pub fn orbit(&self, initial: &Enclosure, time: f64) -> Result<Orbit, EvolutionError> {
        debug_assert!(time > 0.0);
        let mut orbit = Orbit {
            initial: vec![initial.clone()],
            ..Orbit::default()
        };
        let mut working: VecDeque<(f64, Enclosure)> = VecDeque::new();
        working.push_back((0.0, initial.clone()));

        while let Some((t, set)) = working.pop_front() {
            if self.cancelled.load(Ordering::Relaxed) {
                info!("evolution cancelled at t = {t}; returning partial orbit");
                return Ok(orbit);
            }
            if working.len() >= self.config.maximum_working_sets {
                warn!(cap = self.config.maximum_working_sets, "working-set cap exceeded");
                return Err(EvolutionError::ResourceExhaustion {
                    cap: self.config.maximum_working_sets,
                    partial: Box::new(orbit),
                });
            }
            // Finished sets: the final partial step lands exactly on the
            // horizon up to the dyadic slack below.
            if t + 1e-12 >= time {
                orbit.final_set.push(set);
                continue;
            }
            self.evolution_step(&mut working, &mut orbit, t, set, time)?;
        }
        info!(
            reach = orbit.reach.len(),
            final_count = orbit.final_set.len(),
            "evolution complete"
        );
        Ok(orbit)
    }

    fn evolution_step(
        &self,
        working: &mut VecDeque<(f64, Enclosure)>,
        orbit: &mut Orbit,
        t: f64,
        set: Enclosure,
        time: f64,
    ) -> Result<(), EvolutionError> {
        let cfg = &self.config;
        if set.definitely_empty(4) {
            // An infeasible constraint system is a normal end of this
            // branch, not an error.
            debug!(t, "dropping provably empty enclosure");
            return Ok(());
        }
        if cfg.enable_subdivisions && set.radius() > cfg.maximum_enclosure_radius {
            debug!(radius = set.radius(), t, "splitting oversized enclosure");
            let (a, b) = set.split_widest()?;
            working.push_back((t, a));
            working.push_back((t, b));
            return Ok(());
        }
        let set = if cfg.enable_reconditioning && set.max_error() > cfg.maximum_spatial_error {
            set.recondition(cfg.maximum_spatial_error)
        } else {
            set
        };

        let h_max = cfg.maximum_step_size.min(time - t);
        let flow = self
            .integrator
            .flow_step_adaptive(&self.system, &set.bounding_box(), h_max);
        let (h, flow) = match flow {
            Ok(ok) => ok,
            Err(e) if cfg.enable_subdivisions && set.parameter_domain().radius() > 1e-8 => {
                // A step failure on a fat enclosure: split and retry both
                // halves rather than surfacing the failure.
                debug!(error = %e, "flow step failed; splitting enclosure");
                let (a, b) = set.split_widest()?;
                working.push_back((t, a));
                working.push_back((t, b));
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let reached = set.apply_flow(&flow, h)?;
        orbit.reach.push(reached);
        let mut stepped = set.apply_flow_step(&flow, h)?;
        if cfg.enable_reconditioning {
            // Reabsorb the composition's small terms so the models stay
            // compact across steps.
            stepped.sweep(self.integrator.config().step_sweep_threshold);
        }
        orbit.intermediate.push(stepped.clone());
        debug!(t = t + h, radius = stepped.radius(), "advanced one step");
        working.push_back((t + h, stepped));
        Ok(())
    }
}
