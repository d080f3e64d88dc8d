//! Validated one-step integrators
//!
//! Given a vector field `f`, a domain box `D`, a step `h` and an a-priori
//! bound `B` from [`crate::bounder`], a flow step is a vector patch
//! `φ : D × [-h, h] → ℝⁿ` whose Taylor models enclose the exact flow:
//! for every `x₀ ∈ D` and `t ∈ [0, h]` the solution of `ẋ = f(x)` lies in
//! the patch's image. Two constructions are provided:
//!
//! - [`PicardIntegrator`] — fixed-point iteration
//!   `φ ← x + ∫₀ᵗ f(φ)` in Taylor-model arithmetic, starting from the
//!   constant enclosure `B`. Each iteration contracts the error bound by
//!   roughly `L·h`; the iteration stops when the per-step error budget is
//!   met or the temporal-order cap is reached.
//! - [`SeriesIntegrator`] — jet propagation of the flow's space-time
//!   Taylor series at four reference initial sets (centre, whole domain,
//!   the centre's trajectory enclosure, and `B`), assembled so that
//!   interior coefficients come from the tight centre jets while the
//!   boundary coefficients, evaluated over enclosing sets, bound the
//!   spatial and temporal truncation remainders (mean-value form).
//!
//! A flow step whose error exceeds the per-step budget fails with
//! [`FlowStepError::StepErrorExceeded`]; the adaptive driver halves the
//! step and retries down to `h / 2^REDUCTION_STEPS`.

use crate::bounder::{flow_bounds, FlowBoundsError, REDUCTION_STEPS};
use crate::differential::Differential;
use crate::function::{Function, FunctionError};
use crate::index::MultiIndex;
use crate::interval::{Interval, IntervalBox};
use crate::patch::{PatchError, VectorPatch};
use crate::taylor::TaylorModel;
use thiserror::Error;
use tracing::{debug, trace};

/// Heuristic from the adaptive order escalation: a spatial-order increase
/// is attempted once a temporal increase improves the error by less than
/// this factor.
const TRY_SPATIAL_ORDER_INCREASE_FACTOR: f64 = 4.0;

/// Integrator failures.
#[derive(Debug, Error)]
pub enum FlowStepError {
    /// The constructed step's error exceeds the per-step budget. The
    /// caller should reduce the step size or split the initial set.
    #[error("flow step error {achieved} exceeds budget {budget} at step {step}")]
    StepErrorExceeded {
        /// Error bound actually achieved.
        achieved: f64,
        /// The configured `step_maximum_error`.
        budget: f64,
        /// Step size attempted.
        step: f64,
    },
    /// The a-priori bounding stage failed.
    #[error(transparent)]
    Bounds(#[from] FlowBoundsError),
    /// Vector-field evaluation failed.
    #[error(transparent)]
    Function(#[from] FunctionError),
    /// Patch algebra failed.
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// Configuration shared by the integrators. Field names follow the
/// options table of the evolver/integrator design.
#[derive(Clone, Debug)]
pub struct IntegratorConfig {
    /// Global error budget for a full flow computation.
    pub maximum_error: f64,
    /// Multiplier for the automatic step-size proposal `h = tol / ‖Df‖`.
    pub lipschitz_tolerance: f64,
    /// Per-step error budget.
    pub step_maximum_error: f64,
    /// Sweep threshold applied while constructing a step.
    pub step_sweep_threshold: f64,
    /// Starting time-degree for the series method / iteration floor for
    /// Picard.
    pub minimum_temporal_order: u32,
    /// Cap on the time degree (and on Picard iterations).
    pub maximum_temporal_order: u32,
    /// Starting state-degree for the series method.
    pub minimum_spatial_order: u32,
    /// Cap on the state degree.
    pub maximum_spatial_order: u32,
    /// Upper cap on any proposed step size.
    pub maximum_step_size: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        let maximum_error = 1e-6;
        IntegratorConfig {
            maximum_error,
            lipschitz_tolerance: 0.5,
            step_maximum_error: maximum_error / 128.0,
            step_sweep_threshold: 1e-12,
            minimum_temporal_order: 4,
            maximum_temporal_order: 12,
            minimum_spatial_order: 1,
            maximum_spatial_order: 4,
            maximum_step_size: 16.0,
        }
    }
}

impl IntegratorConfig {
    /// Set the global and per-step error budgets from one figure.
    pub fn with_maximum_error(mut self, e: f64) -> Self {
        self.maximum_error = e;
        self.step_maximum_error = e / 128.0;
        self
    }

    /// Set the step sweep threshold.
    pub fn with_step_sweep_threshold(mut self, t: f64) -> Self {
        self.step_sweep_threshold = t;
        self
    }

    /// Set the step-size cap.
    pub fn with_maximum_step_size(mut self, h: f64) -> Self {
        self.maximum_step_size = h;
        self
    }
}

/// A validated one-step flow constructor.
pub trait Integrator: std::fmt::Debug + Send + Sync {
    /// The shared configuration.
    fn config(&self) -> &IntegratorConfig;

    /// Construct a flow step `φ` on `D × [-h, h]` given an a-priori
    /// bound `B ⊇ φ(D, [0,h])`.
    fn flow_step(
        &self,
        f: &Function,
        domain: &IntervalBox,
        h: f64,
        bounds: &IntervalBox,
    ) -> Result<VectorPatch, FlowStepError>;

    /// Bound-then-step driver with step halving: returns the achieved
    /// step size and the flow patch.
    fn flow_step_adaptive(
        &self,
        f: &Function,
        domain: &IntervalBox,
        h_max: f64,
    ) -> Result<(f64, VectorPatch), FlowStepError> {
        let cfg = self.config();
        let h_req = h_max.min(cfg.maximum_step_size);
        let fb = flow_bounds(f, domain, h_req, cfg.lipschitz_tolerance)?;
        let h_min = fb.step / f64::from(1u32 << REDUCTION_STEPS);
        let mut h = fb.step;
        let mut bounds = fb.bounds;
        loop {
            match self.flow_step(f, domain, h, &bounds) {
                Ok(patch) => return Ok((h, patch)),
                Err(FlowStepError::StepErrorExceeded { achieved, budget, .. }) if h / 2.0 >= h_min => {
                    debug!(h, achieved, budget, "halving step after flow-step failure");
                    h /= 2.0;
                    // A bound for the longer step stays valid for the
                    // shorter one, but a fresh one is usually tighter.
                    bounds = flow_bounds(f, domain, h, cfg.lipschitz_tolerance)?.bounds;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Picard
// ---------------------------------------------------------------------------

/// Fixed-point Picard iteration in Taylor-model arithmetic.
#[derive(Clone, Debug)]
pub struct PicardIntegrator {
    config: IntegratorConfig,
}

impl PicardIntegrator {
    /// With explicit configuration.
    pub fn new(config: IntegratorConfig) -> Self {
        PicardIntegrator { config }
    }
}

impl Default for PicardIntegrator {
    fn default() -> Self {
        Self::new(IntegratorConfig::default())
    }
}

impl Integrator for PicardIntegrator {
    fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    fn flow_step(
        &self,
        f: &Function,
        domain: &IntervalBox,
        h: f64,
        bounds: &IntervalBox,
    ) -> Result<VectorPatch, FlowStepError> {
        let cfg = &self.config;
        let n = domain.dimension();
        let dom = domain.join(&IntervalBox::new(vec![Interval::new(-h, h)]));

        // Identity in the state variables, constant in time.
        let phi0 = VectorPatch::from_models(
            dom.clone(),
            VectorPatch::identity(&dom).models()[..n].to_vec(),
        );
        // Initial enclosure: the a-priori bound, constant in everything.
        let mut phi = VectorPatch::constants(dom.clone(), bounds.as_slice());

        for k in 0..cfg.maximum_temporal_order {
            let contracted = phi.max_error() < cfg.step_maximum_error;
            let fphi: Vec<TaylorModel> = f.evaluate_elementary(phi.models())?;
            let integrated =
                VectorPatch::from_models(dom.clone(), fphi).antiderivative(n);
            let mut next = Vec::with_capacity(n);
            for (int_i, id_i) in integrated.models().iter().zip(phi0.models()) {
                let mut m = int_i.add(id_i);
                m.sweep(cfg.step_sweep_threshold);
                next.push(m);
            }
            phi = VectorPatch::from_models(dom.clone(), next);
            trace!(iteration = k, error = phi.max_error(), "picard iterate");
            if contracted {
                break;
            }
        }

        let achieved = phi.max_error();
        if achieved > cfg.step_maximum_error {
            return Err(FlowStepError::StepErrorExceeded {
                achieved,
                budget: cfg.step_maximum_error,
                step: h,
            });
        }
        Ok(phi)
    }
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Space-time Taylor-series integrator with adaptive orders.
#[derive(Clone, Debug)]
pub struct SeriesIntegrator {
    config: IntegratorConfig,
}

impl SeriesIntegrator {
    /// With explicit configuration.
    pub fn new(config: IntegratorConfig) -> Self {
        SeriesIntegrator { config }
    }

    /// Propagate the flow jets for one reference initial vector: iterate
    /// `y ← id + h·∫_τ f(y)` on differentials over `n+1` variables (the
    /// last one is scaled time).
    fn flow_jets(
        f: &Function,
        init: &[Interval],
        rads: &[f64],
        h: f64,
        degree: u16,
    ) -> Result<Vec<Differential<Interval>>, FunctionError> {
        let n = init.len();
        let id: Vec<Differential<Interval>> = (0..n)
            .map(|i| {
                Differential::variable(n + 1, degree, Interval::point(0.0), i)
                    .scale(&Interval::point(rads[i]))
                    .add_constant(&init[i])
            })
            .collect();
        let mut y = id.clone();
        for _ in 0..degree {
            let fy = f.evaluate_elementary(&y)?;
            y = fy
                .iter()
                .zip(&id)
                .map(|(fyi, idi)| {
                    fyi.antiderivative(n).scale(&Interval::point(h)).add(idi)
                })
                .collect();
        }
        Ok(y)
    }

    /// Build the flow patch at fixed orders.
    fn build(
        &self,
        f: &Function,
        domain: &IntervalBox,
        h: f64,
        bounds: &IntervalBox,
        so: u32,
        to: u32,
    ) -> Result<VectorPatch, FlowStepError> {
        let cfg = &self.config;
        let n = domain.dimension();
        let degree = (so + to) as u16;
        let rads: Vec<f64> = domain.iter().map(|d| d.radius().get()).collect();

        // The four reference initial vectors.
        let cx: Vec<Interval> = domain.midpoint().iter().map(|&m| Interval::point(m)).collect();
        let dx: Vec<Interval> = domain.as_slice().to_vec();
        let bx: Vec<Interval> = bounds.as_slice().to_vec();
        // Enclosure of the centre's trajectory, two Euler refinements.
        let ih = Interval::new(0.0, h);
        let cbox = IntervalBox::new(cx.clone());
        let mut ax_box = cbox.add(&f.evaluate(bounds)?.scale(&ih));
        ax_box = cbox.add(&f.evaluate(&ax_box)?.scale(&ih));
        let ax: Vec<Interval> = ax_box.as_slice().to_vec();

        let jets_c = Self::flow_jets(f, &cx, &rads, h, degree)?;
        let jets_d = Self::flow_jets(f, &dx, &rads, h, degree)?;
        let jets_a = Self::flow_jets(f, &ax, &rads, h, degree)?;
        let jets_b = Self::flow_jets(f, &bx, &rads, h, degree)?;

        let dom = domain.join(&IntervalBox::new(vec![Interval::new(-h, h)]));
        let mut models = Vec::with_capacity(n);
        for i in 0..n {
            // Interior coefficients come from the tight centre jets;
            // boundary ones from the enclosing jets: the spatial boundary
            // (degree so) from the domain jets below the top time degree,
            // and the whole top time row from the trajectory/box jets,
            // which bound the truncation remainders in mean-value form.
            let mut terms: Vec<(MultiIndex, Interval)> = Vec::new();
            let sources: [(&Differential<Interval>, bool); 4] = [
                (&jets_c[i], false),
                (&jets_d[i], true),
                (&jets_a[i], false),
                (&jets_b[i], true),
            ];
            for (k, (jet, at_spatial_boundary)) in sources.iter().enumerate() {
                let at_top_time = k >= 2;
                for (idx, c) in jet.expansion().iter() {
                    let j = u32::from(idx.get(n));
                    let s = u32::from(idx.degree()) - j;
                    let time_match = if at_top_time { j == to } else { j < to };
                    let space_match = if *at_spatial_boundary { s == so } else { s < so };
                    if time_match && space_match {
                        terms.push((idx.clone(), *c));
                    }
                }
            }
            let mut tm = TaylorModel::from_interval_terms(n + 1, terms);
            tm.sweep(cfg.step_sweep_threshold);
            models.push(tm);
        }
        Ok(VectorPatch::from_models(dom, models))
    }
}

impl Default for SeriesIntegrator {
    fn default() -> Self {
        Self::new(IntegratorConfig::default())
    }
}

impl Integrator for SeriesIntegrator {
    fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    fn flow_step(
        &self,
        f: &Function,
        domain: &IntervalBox,
        h: f64,
        bounds: &IntervalBox,
    ) -> Result<VectorPatch, FlowStepError> {
        let cfg = &self.config;
        let mut so = cfg.minimum_spatial_order;
        let mut to = cfg.minimum_temporal_order;
        let mut tphi = self.build(f, domain, h, bounds, so, to)?;
        let mut old_error = tphi.max_error() * TRY_SPATIAL_ORDER_INCREASE_FACTOR * 2.0;

        while tphi.max_error() > cfg.step_maximum_error
            && (so < cfg.maximum_spatial_order || to < cfg.maximum_temporal_order)
        {
            debug!(so, to, error = tphi.max_error(), "escalating series orders");
            // A temporal increase that stopped paying suggests the error
            // is spatial; try raising the state degree.
            if so < cfg.maximum_spatial_order
                && tphi.max_error() * TRY_SPATIAL_ORDER_INCREASE_FACTOR > old_error
            {
                let trial = self.build(f, domain, h, bounds, so + 1, to)?;
                if to == cfg.maximum_temporal_order || trial.max_error() < tphi.max_error() {
                    so += 1;
                    old_error = tphi.max_error();
                    tphi = trial;
                    continue;
                }
            }
            old_error = tphi.max_error();
            if to < cfg.maximum_temporal_order {
                to += 1;
            } else {
                break;
            }
            tphi = self.build(f, domain, h, bounds, so, to)?;
        }

        let achieved = tphi.max_error();
        if achieved > cfg.step_maximum_error {
            return Err(FlowStepError::StepErrorExceeded {
                achieved,
                budget: cfg.step_maximum_error,
                step: h,
            });
        }
        Ok(tphi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Expr;

    fn rotation() -> Function {
        // ẋ = −y, ẏ = x
        Function::symbolic(2, vec![-Expr::var(1), Expr::var(0)]).unwrap()
    }

    fn small_domain() -> IntervalBox {
        IntervalBox::new(vec![Interval::new(0.99, 1.01), Interval::new(-0.01, 0.01)])
    }

    /// Classical RK4 with a fine fixed step: the non-validated reference.
    fn rk4(f: impl Fn(f64, f64) -> (f64, f64), mut x: f64, mut y: f64, t: f64, steps: u32) -> (f64, f64) {
        let h = t / f64::from(steps);
        for _ in 0..steps {
            let (k1x, k1y) = f(x, y);
            let (k2x, k2y) = f(x + 0.5 * h * k1x, y + 0.5 * h * k1y);
            let (k3x, k3y) = f(x + 0.5 * h * k2x, y + 0.5 * h * k2y);
            let (k4x, k4y) = f(x + h * k3x, y + h * k3y);
            x += h / 6.0 * (k1x + 2.0 * k2x + 2.0 * k3x + k4x);
            y += h / 6.0 * (k1y + 2.0 * k2y + 2.0 * k3y + k4y);
        }
        (x, y)
    }

    fn check_flow_contains_reference(patch: &VectorPatch, h: f64) {
        let rot = |x: f64, y: f64| (-y, x);
        for &(x0, y0) in &[(0.99, -0.01), (1.0, 0.0), (1.01, 0.01), (0.995, 0.004)] {
            for &t in &[0.0, h / 3.0, h / 2.0, h] {
                let (rx, ry) = rk4(rot, x0, y0, t, 400);
                let args = IntervalBox::new(vec![
                    Interval::point(x0),
                    Interval::point(y0),
                    Interval::point(t),
                ]);
                let img = patch.evaluate(&args).unwrap();
                assert!(
                    img[0].widen(1e-9).contains(rx) && img[1].widen(1e-9).contains(ry),
                    "flow misses reference at x0={x0}, y0={y0}, t={t}: {img} vs ({rx}, {ry})"
                );
            }
        }
    }

    #[test]
    fn picard_step_encloses_rk_reference() {
        let f = rotation();
        let d = small_domain();
        let integ = PicardIntegrator::default();
        let (h, patch) = integ.flow_step_adaptive(&f, &d, 0.125).unwrap();
        assert!(h > 0.0);
        assert_eq!(patch.argument_size(), 3);
        assert_eq!(patch.result_size(), 2);
        check_flow_contains_reference(&patch, h);
    }

    #[test]
    fn series_step_encloses_rk_reference() {
        let f = rotation();
        let d = small_domain();
        let integ = SeriesIntegrator::default();
        let (h, patch) = integ.flow_step_adaptive(&f, &d, 0.125).unwrap();
        check_flow_contains_reference(&patch, h);
    }

    #[test]
    fn step_error_budget_is_enforced() {
        let f = rotation();
        let d = small_domain();
        // An absurdly small budget forces the error check to fire.
        let cfg = IntegratorConfig::default().with_maximum_error(1e-300);
        let integ = PicardIntegrator::new(cfg);
        let fb = flow_bounds(&f, &d, 0.125, 0.5).unwrap();
        let res = integ.flow_step(&f, &d, fb.step, &fb.bounds);
        assert!(matches!(res, Err(FlowStepError::StepErrorExceeded { .. })));
    }

    #[test]
    fn decay_flow_contracts() {
        // ẋ = −x from [1, 1.001]: after one step the state shrinks.
        let f = Function::symbolic(1, vec![-Expr::var(0)]).unwrap();
        let d = IntervalBox::new(vec![Interval::new(1.0, 1.001)]);
        let integ = PicardIntegrator::default();
        let (h, patch) = integ.flow_step_adaptive(&f, &d, 0.25).unwrap();
        let end = patch.partial_evaluate(1, h).unwrap();
        let r = end.ranges();
        let expected = (-h).exp();
        assert!(r[0].contains(expected));
        assert!(r[0].upper() < 1.0005);
    }
}
