//! Enclosures: labelled Taylor-model patches of reachable sets
//!
//! An [`Enclosure`] represents the set
//!
//! ```text
//! { φ(s) | s ∈ D,  cⱼ(s) ≤ 0 for all j }
//! ```
//!
//! where `φ` is a vector patch over the parameter box `D`, the `cⱼ` are
//! scalar Taylor-model constraints narrowing the effective parameter
//! subset, and labels name the state components. Enclosures are
//! immutable in spirit: every transformation (`apply_map`, `apply_flow`,
//! `split`, `recondition`) returns a new value and never shrinks the
//! represented set. No operation drops a constraint silently.

use crate::function::{Function, FunctionError};
use crate::interval::{ErrorBound, Interval, IntervalBox};
use crate::patch::{PatchError, VectorPatch};
use crate::taylor::TaylorModel;
use thiserror::Error;
use tracing::trace;

/// Errors from enclosure transformation.
#[derive(Debug, Error)]
pub enum EnclosureError {
    /// Underlying patch algebra failed.
    #[error(transparent)]
    Patch(#[from] PatchError),
    /// Function evaluation failed.
    #[error(transparent)]
    Function(#[from] FunctionError),
}

/// A labelled Taylor-model patch with parameter constraints.
#[derive(Clone, Debug)]
pub struct Enclosure {
    function: VectorPatch,
    constraints: Vec<TaylorModel>,
    labels: Vec<String>,
}

impl Enclosure {
    /// Enclose a plain box: identity patch, no constraints.
    pub fn from_box(b: &IntervalBox, labels: Vec<String>) -> Self {
        debug_assert_eq!(labels.len(), b.dimension());
        Enclosure { function: VectorPatch::identity(b), constraints: Vec::new(), labels }
    }

    /// Enclose a constrained set: identity patch over the set's domain,
    /// each constraint composed over the state models.
    pub fn from_constraint_set(
        set: &crate::set::ConstraintSet,
        labels: Vec<String>,
    ) -> Result<Self, EnclosureError> {
        let mut enc = Enclosure::from_box(set.domain(), labels);
        for c in set.constraints() {
            enc = enc.new_state_constraint(c)?;
        }
        Ok(enc)
    }

    /// Wrap an explicit patch with constraints.
    pub fn from_patch(
        function: VectorPatch,
        constraints: Vec<TaylorModel>,
        labels: Vec<String>,
    ) -> Self {
        debug_assert!(constraints
            .iter()
            .all(|c| c.argument_size() == function.argument_size()));
        Enclosure { function, constraints, labels }
    }

    /// State dimension.
    pub fn dimension(&self) -> usize {
        self.function.result_size()
    }

    /// Number of parameters.
    pub fn parameter_count(&self) -> usize {
        self.function.argument_size()
    }

    /// The parameter box `D`.
    pub fn parameter_domain(&self) -> &IntervalBox {
        self.function.domain()
    }

    /// The state patch `φ`.
    pub fn function(&self) -> &VectorPatch {
        &self.function
    }

    /// The parameter constraints (each `≤ 0`).
    pub fn constraints(&self) -> &[TaylorModel] {
        &self.constraints
    }

    /// The state component names.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// A box containing the represented set (constraints ignored — they
    /// can only shrink the set, so the bound stays valid).
    pub fn bounding_box(&self) -> IntervalBox {
        self.function.ranges()
    }

    /// Largest half-width of the bounding box.
    pub fn radius(&self) -> f64 {
        self.bounding_box().radius()
    }

    /// Largest Taylor-model error bound among the state components.
    pub fn max_error(&self) -> f64 {
        self.function.max_error()
    }

    /// Apply a state map: `φ' = g ∘ φ`. Constraints are untouched.
    pub fn apply_map(&self, g: &Function) -> Result<Enclosure, EnclosureError> {
        let models = g.evaluate_elementary(self.function.models())?;
        let function = VectorPatch::from_models(self.parameter_domain().clone(), models);
        Ok(Enclosure {
            function,
            constraints: self.constraints.clone(),
            labels: self.labels.clone(),
        })
    }

    /// Apply a flow patch over a whole time interval `[0, h]`: the result
    /// gains one "time" parameter, and every constraint is embedded with
    /// the matching dummy variable.
    pub fn apply_flow(&self, flow: &VectorPatch, h: f64) -> Result<Enclosure, EnclosureError> {
        let time = VectorPatch::identity(&IntervalBox::new(vec![Interval::new(0.0, h)]));
        let combined = self.function.combine(&time);
        let function = combined.compose(flow)?;
        let constraints =
            self.constraints.iter().map(|c| c.embed(0, 1)).collect();
        trace!(radius = function.ranges().radius(), "applied flow over [0, {h}]");
        Ok(Enclosure { function, constraints, labels: self.labels.clone() })
    }

    /// Apply a flow patch at the single time `t = h`: parameters are
    /// unchanged, the state advances one step.
    pub fn apply_flow_step(&self, flow: &VectorPatch, h: f64) -> Result<Enclosure, EnclosureError> {
        let time_index = flow.argument_size() - 1;
        let step = flow.partial_evaluate(time_index, h)?;
        let function = self.function.compose(&step)?;
        Ok(Enclosure {
            function,
            constraints: self.constraints.clone(),
            labels: self.labels.clone(),
        })
    }

    /// Append the state constraint `g(x) ≤ 0` as the parameter constraint
    /// `g ∘ φ ≤ 0`.
    pub fn new_state_constraint(
        &self,
        g: &crate::function::Expr,
    ) -> Result<Enclosure, EnclosureError> {
        let composed = g
            .eval(self.function.models())
            .map_err(FunctionError::from)?;
        let mut r = self.clone();
        r.constraints.push(composed);
        Ok(r)
    }

    /// Append a raw parameter constraint `c(s) ≤ 0`.
    pub fn new_parameter_constraint(&self, c: TaylorModel) -> Enclosure {
        debug_assert_eq!(c.argument_size(), self.parameter_count());
        let mut r = self.clone();
        r.constraints.push(c);
        r
    }

    /// Bundle state models and constraints into one patch (used by the
    /// transformations that act uniformly on both).
    fn bundled(&self) -> VectorPatch {
        let mut models = self.function.models().to_vec();
        models.extend(self.constraints.iter().cloned());
        VectorPatch::from_models(self.parameter_domain().clone(), models)
    }

    fn unbundle(&self, patch: VectorPatch) -> Enclosure {
        let n = self.dimension();
        let models = patch.models()[..n].to_vec();
        let constraints = patch.models()[n..].to_vec();
        let function = VectorPatch::from_models(patch.domain().clone(), models);
        Enclosure { function, constraints, labels: self.labels.clone() }
    }

    /// Bisect parameter `k`: the union of the two halves covers the
    /// original set (splits are tight by construction).
    pub fn split(&self, k: usize) -> Result<(Enclosure, Enclosure), EnclosureError> {
        let (lo, hi) = self.parameter_domain().split(k);
        let bundled = self.bundled();
        let a = self.unbundle(bundled.restrict(&lo)?);
        let b = self.unbundle(bundled.restrict(&hi)?);
        Ok((a, b))
    }

    /// Split along the parameter whose image contributes the most width.
    pub fn split_widest(&self) -> Result<(Enclosure, Enclosure), EnclosureError> {
        self.split(self.parameter_domain().widest_dimension())
    }

    /// Reabsorb oversized Taylor-model errors as fresh parameters: any
    /// component with error above `max_error` becomes exact in a new
    /// unit parameter `u` via `φᵢ(s, u) = φᵢ(s) + eᵢ·u`. The represented
    /// set is unchanged (every error value is some `|η| ≤ eᵢ`, matched by
    /// some `u ∈ [-1, 1]`).
    pub fn recondition(&self, max_error: f64) -> Enclosure {
        let oversized: Vec<usize> = self
            .function
            .models()
            .iter()
            .enumerate()
            .filter(|(_, m)| m.error().get() > max_error)
            .map(|(i, _)| i)
            .collect();
        if oversized.is_empty() {
            return self.clone();
        }
        let old_p = self.parameter_count();
        let added = oversized.len();
        let domain = self
            .parameter_domain()
            .join(&IntervalBox::unit(added));
        let mut models = Vec::with_capacity(self.dimension());
        let mut fresh = 0;
        for (i, m) in self.function.models().iter().enumerate() {
            let mut em = m.embed(0, added);
            if oversized.contains(&i) {
                let e = em.error().get();
                em.set_error(ErrorBound::zero());
                let u = TaylorModel::coordinate(old_p + added, old_p + fresh).scale(e);
                em = em.add(&u);
                fresh += 1;
            }
            models.push(em);
        }
        let constraints = self.constraints.iter().map(|c| c.embed(0, added)).collect();
        trace!(added, "reconditioned enclosure");
        Enclosure {
            function: VectorPatch::from_models(domain, models),
            constraints,
            labels: self.labels.clone(),
        }
    }

    /// Sweep all state models at the given threshold.
    pub fn sweep(&mut self, threshold: f64) {
        self.function.sweep(threshold);
    }

    /// True when the constraint system is provably infeasible over the
    /// parameter domain (branch-and-prune on the constraint models).
    pub fn definitely_empty(&self, depth: u32) -> bool {
        if self.constraints.is_empty() {
            return false;
        }
        fn prune(constraints: &[TaylorModel], unit: &[Interval], depth: u32) -> bool {
            let mut widest = 0;
            let mut w = 0.0;
            for (j, u) in unit.iter().enumerate() {
                if u.width() > w {
                    w = u.width();
                    widest = j;
                }
            }
            for c in constraints {
                match c.evaluate(unit) {
                    Ok(v) if v.lower() > 0.0 => return true,
                    Ok(_) | Err(_) => {}
                }
            }
            if depth == 0 {
                return false;
            }
            let (lo, hi) = {
                let mut a = unit.to_vec();
                let mut b = unit.to_vec();
                let (l, h) = unit[widest].split();
                a[widest] = l;
                b[widest] = h;
                (a, b)
            };
            prune(constraints, &lo, depth - 1) && prune(constraints, &hi, depth - 1)
        }
        let unit = vec![Interval::unit(); self.parameter_count()];
        prune(&self.constraints, &unit, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Expr;

    fn labels2() -> Vec<String> {
        vec!["x".into(), "y".into()]
    }

    fn unit_square() -> IntervalBox {
        IntervalBox::new(vec![Interval::new(0.0, 1.0), Interval::new(0.0, 1.0)])
    }

    #[test]
    fn box_enclosure_reproduces_its_box() {
        let e = Enclosure::from_box(&unit_square(), labels2());
        let bb = e.bounding_box();
        assert!(unit_square().refines(&bb));
        assert_eq!(e.dimension(), 2);
        assert_eq!(e.parameter_count(), 2);
        assert_eq!(e.labels()[1], "y");
    }

    #[test]
    fn apply_map_transforms_the_image() {
        // g(x, y) = (x + y, x·y)
        let g = Function::symbolic(
            2,
            vec![Expr::var(0) + Expr::var(1), Expr::var(0) * Expr::var(1)],
        )
        .unwrap();
        let e = Enclosure::from_box(&unit_square(), labels2());
        let m = e.apply_map(&g).unwrap();
        let bb = m.bounding_box();
        assert!(bb[0].contains(2.0) && bb[0].contains(0.0));
        assert!(bb[1].contains(1.0) && bb[1].contains(0.0));
        // The parameters are unchanged; only the image moved.
        assert_eq!(m.parameter_count(), 2);
    }

    #[test]
    fn split_halves_cover_the_original() {
        let e = Enclosure::from_box(&unit_square(), labels2());
        let (a, b) = e.split(0).unwrap();
        let hull = a.bounding_box().hull(&b.bounding_box());
        assert!(e.bounding_box().refines(&hull.widen(1e-12)));
        assert!(a.bounding_box()[0].upper() <= 0.5 + 1e-12);
        assert!(b.bounding_box()[0].lower() >= 0.5 - 1e-12);
    }

    #[test]
    fn constraints_survive_splitting_and_flows() {
        let e = Enclosure::from_box(&unit_square(), labels2())
            .new_state_constraint(&(Expr::var(0) + Expr::var(1) - 1.0))
            .unwrap();
        assert_eq!(e.constraints().len(), 1);
        let (a, _) = e.split(1).unwrap();
        assert_eq!(a.constraints().len(), 1);
    }

    #[test]
    fn infeasible_constraints_are_detected() {
        // x − 5 ≥ 0 on [0,1]² is impossible: constraint 5 − x ≤ 0.
        let e = Enclosure::from_box(&unit_square(), labels2())
            .new_state_constraint(&(5.0 - Expr::var(0)))
            .unwrap();
        assert!(e.definitely_empty(2));
        // x ≤ 0.5 is perfectly feasible.
        let f = Enclosure::from_box(&unit_square(), labels2())
            .new_state_constraint(&(Expr::var(0) - 0.5))
            .unwrap();
        assert!(!f.definitely_empty(4));
    }

    #[test]
    fn recondition_moves_error_into_a_parameter() {
        let b = unit_square();
        let mut patch = VectorPatch::identity(&b);
        patch.models_mut()[0].set_error(ErrorBound::new(0.25));
        let e = Enclosure::from_patch(patch, Vec::new(), labels2());
        let r = e.recondition(0.1);
        assert_eq!(r.parameter_count(), 3);
        assert!(r.max_error() <= 0.1);
        // The image must not shrink: the original bounding box had the
        // error band, the new one realises it through the parameter.
        assert!(e.bounding_box().refines(&r.bounding_box().widen(1e-12)));
    }
}
