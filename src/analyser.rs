//! Reachability analysis and safety verification
//!
//! The analyser wraps an evolver with a *lock-to-grid* discipline: after
//! every `lock_to_grid_time` units of evolution the current enclosures
//! are outer-approximated onto the configured grid and evolution is
//! re-seeded from the grid cells. This trades precision for a bounded
//! representation, which is what makes the chain-reach fixed point
//! terminate: there are finitely many cells below the configured primary
//! height and depth.
//!
//! `verify_safety` is three-valued: `Safe` when the whole chain-reach
//! paving provably sits inside the safe set, `Unsafe` when a reached cell
//! provably leaves it, `Indeterminate` otherwise — never an error for a
//! mathematically meaningful outcome. The reach paving is always
//! returned as evidence.

use crate::enclosure::Enclosure;
use crate::evolver::{EvolutionError, VectorFieldEvolver};
use crate::grid::{Grid, GridPaving, PaverStrategy};
use crate::set::ConstraintSet;
use thiserror::Error;
use tracing::{debug, info};

/// Analyser failures (wrapping evolution failures).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Evolution below the analyser failed.
    #[error(transparent)]
    Evolution(#[from] EvolutionError),
    /// The chain-reach frontier exceeded the configured cell budget.
    #[error("chain reach exceeded {cap} cells; partial paving attached")]
    CellBudgetExceeded {
        /// The configured cap.
        cap: usize,
        /// Cells reached before the budget ran out.
        partial: Box<GridPaving>,
    },
}

/// Safety verdict.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SafetyAnswer {
    /// The reachable set provably stays in the safe set.
    Safe,
    /// Some reached cell provably leaves the safe set.
    Unsafe,
    /// Neither could be established at this precision.
    Indeterminate,
}

/// Verdict plus the reach paving backing it.
#[derive(Clone, Debug)]
pub struct SafetyCertificate {
    /// The three-valued answer.
    pub answer: SafetyAnswer,
    /// Outer approximation of the reachable set.
    pub reach: GridPaving,
}

/// Analyser configuration.
#[derive(Clone, Debug)]
pub struct AnalyserConfig {
    /// Evolution span between grid discretisations.
    pub lock_to_grid_time: f64,
    /// Subdivision depth below the unit lattice cell.
    pub maximum_grid_depth: u32,
    /// Primary-cell height of the pavings.
    pub grid_height: u32,
    /// Outer-approximation strategy for enclosures.
    pub paver: PaverStrategy,
    /// Cap on the total number of frontier cells across the fixed point.
    pub maximum_chain_cells: usize,
    /// Splitting effort for the set-membership proofs in safety checks.
    pub feasibility_depth: u32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        AnalyserConfig {
            lock_to_grid_time: 1.0,
            maximum_grid_depth: 3,
            grid_height: 3,
            paver: PaverStrategy::default(),
            maximum_chain_cells: 8192,
            feasibility_depth: 6,
        }
    }
}

impl AnalyserConfig {
    /// Set the lock-to-grid period.
    pub fn with_lock_to_grid_time(mut self, t: f64) -> Self {
        self.lock_to_grid_time = t;
        self
    }

    /// Set the grid depth.
    pub fn with_maximum_grid_depth(mut self, d: u32) -> Self {
        self.maximum_grid_depth = d;
        self
    }

    /// Set the primary-cell height.
    pub fn with_grid_height(mut self, h: u32) -> Self {
        self.grid_height = h;
        self
    }
}

fn default_labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("x{i}")).collect()
}

/// Grid-based reachability analysis over a vector-field evolver.
pub struct ReachabilityAnalyser {
    evolver: VectorFieldEvolver,
    grid: Grid,
    config: AnalyserConfig,
}

impl ReachabilityAnalyser {
    /// Build from an evolver and a grid (the grid fixes the state-space
    /// discretisation; its dimension must match the system).
    pub fn new(evolver: VectorFieldEvolver, grid: Grid, config: AnalyserConfig) -> Self {
        debug_assert_eq!(grid.dimension(), evolver.system().argument_size());
        ReachabilityAnalyser { evolver, grid, config }
    }

    /// The configuration.
    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    fn empty_paving(&self) -> GridPaving {
        GridPaving::new(self.grid.clone(), self.config.grid_height)
    }

    /// Initial cells: the outer approximation of a constrained set.
    fn initial_paving(&self, initial: &ConstraintSet) -> Result<GridPaving, AnalysisError> {
        let mut paving = self.empty_paving();
        let enc = Enclosure::from_constraint_set(initial, default_labels(initial.dimension()))
            .map_err(EvolutionError::from)?;
        paving
            .adjoin_outer_approximation(&enc, self.config.maximum_grid_depth, self.config.paver)
            .map_err(EvolutionError::from)?;
        Ok(paving)
    }

    /// Evolve one enclosure for one lock-to-grid period, adjoining its
    /// reach onto `reach` and returning the outer approximation of its
    /// final sets.
    fn locked_step(
        &self,
        enc: &Enclosure,
        span: f64,
        reach: &mut GridPaving,
    ) -> Result<GridPaving, AnalysisError> {
        let cfg = &self.config;
        let orbit = self.evolver.orbit(enc, span)?;
        for r in orbit.reach() {
            reach
                .adjoin_outer_approximation(r, cfg.maximum_grid_depth, cfg.paver)
                .map_err(EvolutionError::from)?;
        }
        let mut fin = self.empty_paving();
        for f in orbit.final_set() {
            fin.adjoin_outer_approximation(f, cfg.maximum_grid_depth, cfg.paver)
                .map_err(EvolutionError::from)?;
        }
        Ok(fin)
    }

    /// Upper reach over a finite horizon with lock-to-grid re-seeding.
    pub fn upper_reach(
        &self,
        initial: &ConstraintSet,
        time: f64,
    ) -> Result<GridPaving, AnalysisError> {
        let cfg = &self.config;
        let n = initial.dimension();
        let mut reach = self.empty_paving();
        // Seed directly from the constrained set (first span keeps the
        // full nonlinear initial description).
        let mut frontier: Vec<Enclosure> =
            vec![Enclosure::from_constraint_set(initial, default_labels(n))
                .map_err(EvolutionError::from)?];
        let mut elapsed = 0.0;
        while elapsed + 1e-12 < time {
            let span = cfg.lock_to_grid_time.min(time - elapsed);
            let mut fin = self.empty_paving();
            for enc in &frontier {
                let f = self.locked_step(enc, span, &mut reach)?;
                fin = fin.union(&f).map_err(EvolutionError::from)?;
            }
            fin.recombine();
            debug!(elapsed = elapsed + span, cells = fin.cell_count(), "lock-to-grid");
            frontier = fin
                .cell_boxes()
                .into_iter()
                .map(|b| Enclosure::from_box(&b, default_labels(n)))
                .collect();
            elapsed += span;
        }
        reach.recombine();
        Ok(reach)
    }

    /// Chain-reach fixed point: iterate one-lock-period reach over the
    /// grid until no new cell appears. Termination is guaranteed by the
    /// finite number of cells below the configured height and depth
    /// (and enforced by the cell budget).
    pub fn chain_reach(&self, initial: &ConstraintSet) -> Result<GridPaving, AnalysisError> {
        let cfg = &self.config;
        let n = initial.dimension();
        let mut reach = self.empty_paving();
        let mut seen = self.initial_paving(initial)?;
        let mut frontier = seen.clone();
        // The constrained description seeds the very first evolution.
        let mut frontier_encs: Vec<Enclosure> =
            vec![Enclosure::from_constraint_set(initial, default_labels(n))
                .map_err(EvolutionError::from)?];
        let mut processed = 0usize;
        loop {
            let mut next = self.empty_paving();
            for enc in &frontier_encs {
                let fin = self.locked_step(enc, cfg.lock_to_grid_time, &mut reach)?;
                next = next.union(&fin).map_err(EvolutionError::from)?;
            }
            processed += frontier.cell_count().max(1);
            if processed > cfg.maximum_chain_cells {
                reach.recombine();
                return Err(AnalysisError::CellBudgetExceeded {
                    cap: cfg.maximum_chain_cells,
                    partial: Box::new(reach),
                });
            }
            let new = next.difference(&seen).map_err(EvolutionError::from)?;
            info!(
                new_cells = new.cell_count(),
                total = seen.cell_count(),
                "chain-reach iteration"
            );
            if new.is_empty() {
                reach.recombine();
                return Ok(reach);
            }
            seen = seen.union(&new).map_err(EvolutionError::from)?;
            frontier = new;
            frontier_encs = frontier
                .cell_boxes()
                .into_iter()
                .map(|b| Enclosure::from_box(&b, default_labels(n)))
                .collect();
        }
    }

    /// Three-valued safety verification: chain-reach, then compare every
    /// reached cell against the safe set.
    pub fn verify_safety(
        &self,
        initial: &ConstraintSet,
        safe: &ConstraintSet,
    ) -> Result<SafetyCertificate, AnalysisError> {
        let reach = self.chain_reach(initial)?;
        let mut all_inside = true;
        for cell in reach.cell_boxes() {
            if safe.contains_box(&cell) {
                continue;
            }
            all_inside = false;
            if safe.disjoint_from_box(&cell, self.config.feasibility_depth) {
                info!("reached cell provably leaves the safe set");
                return Ok(SafetyCertificate { answer: SafetyAnswer::Unsafe, reach });
            }
        }
        let answer = if all_inside { SafetyAnswer::Safe } else { SafetyAnswer::Indeterminate };
        info!(?answer, cells = reach.cell_count(), "safety verification finished");
        Ok(SafetyCertificate { answer, reach })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{Expr, Function};
    use crate::integrator::{IntegratorConfig, PicardIntegrator};
    use crate::interval::{Interval, IntervalBox};
    use crate::evolver::EvolverConfig;
    use std::sync::Arc;

    fn analyser_for(
        f: Function,
        grid_len: f64,
        cfg: AnalyserConfig,
    ) -> ReachabilityAnalyser {
        let n = f.argument_size();
        let integ = PicardIntegrator::new(IntegratorConfig::default().with_maximum_error(1e-4));
        let evolver = VectorFieldEvolver::new(
            f,
            Arc::new(integ),
            EvolverConfig::default().with_maximum_step_size(0.125),
        );
        ReachabilityAnalyser::new(evolver, Grid::regular(n, grid_len), cfg)
    }

    #[test]
    fn decay_system_chain_reach_settles_at_origin() {
        // ẋ = −x, ẏ = −y: everything flows to the origin, so the chain
        // reach from a small box stays near the box ∪ origin.
        let f = Function::symbolic(2, vec![-Expr::var(0), -Expr::var(1)]).unwrap();
        let analyser = analyser_for(
            f,
            0.25,
            AnalyserConfig::default().with_grid_height(3).with_maximum_grid_depth(2),
        );
        let initial = ConstraintSet::from_box(IntervalBox::new(vec![
            Interval::new(0.5, 0.75),
            Interval::new(0.5, 0.75),
        ]));
        let reach = analyser.chain_reach(&initial).unwrap();
        assert!(!reach.is_empty());
        let bb = reach.bounding_box();
        // Nothing flows outward.
        assert!(bb[0].upper() <= 1.0 && bb[1].upper() <= 1.0);
        assert!(bb[0].lower() >= -0.5 && bb[1].lower() >= -0.5);
        // The origin neighbourhood is reached.
        assert!(reach.cell_boxes().iter().any(|c| c.contains_point(&[0.05, 0.05])));
    }

    #[test]
    fn decay_system_is_safe_in_a_generous_region() {
        let f = Function::symbolic(2, vec![-Expr::var(0), -Expr::var(1)]).unwrap();
        let analyser = analyser_for(
            f,
            0.25,
            AnalyserConfig::default().with_grid_height(3).with_maximum_grid_depth(2),
        );
        let initial = ConstraintSet::from_box(IntervalBox::new(vec![
            Interval::new(0.5, 0.75),
            Interval::new(0.5, 0.75),
        ]));
        // Safe set: the box [-2, 2]².
        let safe = ConstraintSet::from_box(IntervalBox::new(vec![
            Interval::new(-2.0, 2.0),
            Interval::new(-2.0, 2.0),
        ]));
        let cert = analyser.verify_safety(&initial, &safe).unwrap();
        assert_eq!(cert.answer, SafetyAnswer::Safe);
        assert!(!cert.reach.is_empty());
    }

    #[test]
    fn growth_system_leaves_a_tight_region() {
        // ẋ = x from [1, 1.25]: grows past 2 quickly, so a safe set
        // capped at x ≤ 2 must be violated.
        let f = Function::symbolic(1, vec![Expr::var(0)]).unwrap();
        let analyser = analyser_for(
            f,
            0.25,
            AnalyserConfig::default().with_grid_height(4).with_maximum_grid_depth(2),
        );
        let initial =
            ConstraintSet::from_box(IntervalBox::new(vec![Interval::new(1.0, 1.25)]));
        let safe = ConstraintSet::from_box(IntervalBox::new(vec![Interval::new(0.0, 2.0)]));
        let cert = analyser.verify_safety(&initial, &safe);
        match cert {
            Ok(c) => assert_ne!(c.answer, SafetyAnswer::Safe),
            // Unbounded growth may instead blow the grid or cell budget;
            // both are acceptable refusals to certify safety.
            Err(AnalysisError::CellBudgetExceeded { .. }) | Err(AnalysisError::Evolution(_)) => {}
        }
    }

    #[test]
    fn attractor_safety_verification() {
        // ẋ = 2x − xy, ẏ = 2x² − y with initial 0.9 ≤ x ≤ 1,
        // −2.2 ≤ y ≤ −2 ∩ x² + (y+2)² ≤ 1, safe set
        // (x−2)² + (y−1)² ≤ 22 on [−1,4]×[−4,6].
        let x = Expr::var(0);
        let y = Expr::var(1);
        let f = Function::symbolic(
            2,
            vec![
                2.0 * x.clone() - x.clone() * y.clone(),
                2.0 * x.clone().powi(2) - y.clone(),
            ],
        )
        .unwrap();
        let analyser = analyser_for(
            f,
            0.5,
            AnalyserConfig::default()
                .with_grid_height(4)
                .with_maximum_grid_depth(2)
                .with_lock_to_grid_time(0.5),
        );
        let initial = ConstraintSet::new(
            IntervalBox::new(vec![Interval::new(0.9, 1.0), Interval::new(-2.2, -2.0)]),
            vec![x.clone().powi(2) + (y.clone() + 2.0).powi(2) - 1.0],
        );
        let safe = ConstraintSet::new(
            IntervalBox::new(vec![Interval::new(-1.0, 4.0), Interval::new(-4.0, 6.0)]),
            vec![(x - 2.0).powi(2) + (y - 1.0).powi(2) - 22.0],
        );
        let cert = analyser.verify_safety(&initial, &safe).unwrap();
        assert_eq!(cert.answer, SafetyAnswer::Safe);
    }
}
