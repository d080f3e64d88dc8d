//! A-priori flow bounds
//!
//! Before a validated flow step can be constructed, the integrator needs a
//! coarse box `B` with the self-map property
//!
//! ```text
//! D ⊕ [0,h]·f(B)  ⊆  B
//! ```
//!
//! which guarantees that every solution starting in `D` stays inside `B`
//! for all `t ∈ [0,h]`. The Picard self-map search below widens an Euler
//! guess, expands it until the inclusion holds, halves the step when the
//! expansion budget runs out, and finally runs a few non-widening
//! refinement sweeps (inclusion-monotonicity of interval evaluation keeps
//! the property through refinement).

use crate::function::{Function, FunctionError};
use crate::interval::{Interval, IntervalBox};
use thiserror::Error;
use tracing::{debug, trace};

/// Widening guess multiplier for the first Euler box.
const INITIAL_MULTIPLIER: f64 = 2.0;
/// Growth factor applied when an expansion attempt fails.
const MULTIPLIER: f64 = 1.125;
/// Fraction of the domain radius added as slack.
const BOX_RADIUS_WIDENING: f64 = 0.25;
/// Expansion attempts per step size.
const EXPANSION_STEPS: u32 = 8;
/// Number of step halvings before giving up.
pub const REDUCTION_STEPS: u32 = 8;
/// Non-widening refinement sweeps after success.
const REFINEMENT_STEPS: u32 = 4;

/// Failure to find a self-mapping bound.
#[derive(Debug, Error)]
pub enum FlowBoundsError {
    /// No step size above the minimum admits a self-mapping box. Callers
    /// interpret this as a request to reduce the step further.
    #[error("no self-mapping flow bound above step {minimum_step} (requested {requested_step})")]
    NoSelfMap {
        /// The step size asked for.
        requested_step: f64,
        /// The smallest step size tried.
        minimum_step: f64,
    },
    /// Evaluation of the vector field failed.
    #[error(transparent)]
    Function(#[from] FunctionError),
}

/// A validated step size together with its a-priori bound.
#[derive(Clone, Debug)]
pub struct FlowBounds {
    /// The (possibly reduced) step size `h`.
    pub step: f64,
    /// A box containing `φ(x₀, t)` for all `x₀ ∈ D`, `t ∈ [0, h]`.
    pub bounds: IntervalBox,
}

/// Compute a step size and an a-priori bound for the flow of `f` from
/// `domain`, starting from the requested `h_max` and the Lipschitz-based
/// first guess `lipschitz_tolerance / ‖Df(D)‖`.
pub fn flow_bounds(
    f: &Function,
    domain: &IntervalBox,
    h_max: f64,
    lipschitz_tolerance: f64,
) -> Result<FlowBounds, FlowBoundsError> {
    debug_assert!(h_max > 0.0);
    debug_assert_eq!(f.argument_size(), domain.dimension());
    debug_assert_eq!(f.result_size(), domain.dimension());

    // Slack around the domain, proportional to its radius per component.
    let delta: IntervalBox = IntervalBox::new(
        domain
            .iter()
            .map(|d| {
                let r = d.radius().scale(BOX_RADIUS_WIDENING).get();
                Interval::new(-r, r)
            })
            .collect(),
    );

    let lip = f.lipschitz_bound(domain)?;
    let h_lip = if lip > 0.0 { lipschitz_tolerance / lip } else { f64::INFINITY };
    let h_min = h_max / f64::from(1u32 << REDUCTION_STEPS);
    let mut h = h_max.min(h_lip).max(h_min);
    debug!(lipschitz = lip, h_lip, h_max, h, "flow bound step proposal");

    let fd = f.evaluate(domain)?;
    loop {
        let ih = Interval::new(0.0, h);
        // Widened Euler guess.
        let mut bx = domain.add(&fd.scale(&ih.scale(INITIAL_MULTIPLIER))).add(&delta);
        let mut success = false;
        let mut nbx = bx.clone();
        for k in 0..EXPANSION_STEPS {
            let df = f.evaluate(&bx)?;
            nbx = domain.add(&delta).add(&df.scale(&ih));
            if nbx.refines(&bx) {
                trace!(expansion = k, "self-map achieved");
                success = true;
                break;
            }
            bx = domain.add(&delta).add(&df.scale(&ih.scale(MULTIPLIER)));
        }
        if !success {
            h /= 2.0;
            if h < h_min {
                return Err(FlowBoundsError::NoSelfMap {
                    requested_step: h_max,
                    minimum_step: h_min,
                });
            }
            continue;
        }

        // Non-widening refinement; inclusion monotonicity preserves the
        // self-map property at every sweep.
        let ih = Interval::new(0.0, h);
        let mut bx = nbx;
        for _ in 0..REFINEMENT_STEPS {
            let df = f.evaluate(&bx)?;
            let refined = domain.add(&delta).add(&df.scale(&ih));
            if !refined.refines(&bx) {
                break;
            }
            bx = refined;
        }
        debug_assert!(domain.refines(&bx));
        debug!(step = h, "flow bounds found");
        return Ok(FlowBounds { step: h, bounds: bx });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Expr;

    fn field(components: Vec<Expr>) -> Function {
        let n = components.len();
        Function::symbolic(n, components).unwrap()
    }

    #[test]
    fn stiff_relaxation_field_converges() {
        // f(x) = λ(c − x), λ = 100, c = 0.5, D = [0,1], h = 0.01: the
        // bound must satisfy the self-map inclusion D ⊕ [0,h]·f(B) ⊆ B.
        let f = field(vec![100.0 * (0.5 - Expr::var(0))]);
        let d = IntervalBox::new(vec![Interval::new(0.0, 1.0)]);
        let fb = flow_bounds(&f, &d, 0.01, 0.5).unwrap();
        assert!(fb.step > 0.0 && fb.step <= 0.01);
        let ih = Interval::new(0.0, fb.step);
        let image = d.add(&f.evaluate(&fb.bounds).unwrap().scale(&ih));
        assert!(image.refines(&fb.bounds), "self-map inclusion must hold");
        assert!(d.refines(&fb.bounds));
    }

    #[test]
    fn rotation_field_bound_stays_tight() {
        // ẋ = −y, ẏ = x on a small box: the bound should not balloon.
        let f = field(vec![-Expr::var(1), Expr::var(0)]);
        let d = IntervalBox::new(vec![
            Interval::new(0.99, 1.01),
            Interval::new(-0.01, 0.01),
        ]);
        let fb = flow_bounds(&f, &d, 0.125, 0.5).unwrap();
        assert!(fb.bounds[0].upper() < 1.5);
        assert!(fb.bounds[1].magnitude() < 0.5);
        assert!(d.refines(&fb.bounds));
    }

    #[test]
    fn impossible_step_reports_reduction_floor() {
        // An explosive field with an enormous requested step forces the
        // halving loop to bottom out.
        let f = field(vec![Expr::var(0).powi(2) + 1e6]);
        let d = IntervalBox::new(vec![Interval::new(0.0, 1.0)]);
        let err = flow_bounds(&f, &d, 64.0, 0.5);
        assert!(matches!(err, Err(FlowBoundsError::NoSelfMap { .. })));
    }
}
