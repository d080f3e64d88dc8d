//! Function models: Taylor models on concrete box domains
//!
//! A patch pairs a box domain `D` with Taylor models over the normalised
//! unit box; the affine chart `x = mid(D) + rad(D)·s` ties the two
//! together. All scaling coefficients are produced by the same
//! deterministic (outward-rounded) radius computation, so the chart used
//! at creation, evaluation, composition, and antidifferentiation is one
//! and the same map. A radius rounded upward can only enlarge the
//! represented image, never shrink it.
//!
//! [`VectorPatch`] is the type the integrator hands back (a flow step on
//! `D × [-h, h]`) and the enclosure layer composes. `partial_evaluate`
//! freezes one coordinate (evaluating a flow at `t = h`), `combine` forms
//! cartesian products of independent patches, `restrict` reparametrises
//! onto a subdomain.

use crate::interval::{DomainError, Interval, IntervalBox};
use crate::taylor::TaylorModel;
use thiserror::Error;

/// Errors surfaced by patch construction and composition.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Composition requires the inner ranges to fit the outer domain.
    #[error("inner range {inner} escapes outer domain {outer} in component {component}")]
    DomainMismatch {
        /// Offending component index.
        component: usize,
        /// Range of the inner model.
        inner: Interval,
        /// Domain interval it must fit.
        outer: Interval,
    },
    /// Arity mismatch between a patch and its arguments.
    #[error("expected {expected} components, got {got}")]
    Arity {
        /// Required count.
        expected: usize,
        /// Provided count.
        got: usize,
    },
    /// A numeric domain violation bubbled up from below.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Map a point of `D_j` into the unit chart, outward-rounded.
fn unscale(x: &Interval, d: &Interval) -> Interval {
    let mid = d.midpoint();
    let rad = d.radius().get();
    if rad == 0.0 {
        // Degenerate direction: the model is constant in this variable.
        return Interval::point(0.0);
    }
    x.sub(&Interval::point(mid))
        .div(&Interval::point(rad))
        .expect("positive radius")
        .intersection(&Interval::unit().widen(f64::EPSILON))
}

/// A scalar function model: one Taylor model on a box domain.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarPatch {
    domain: IntervalBox,
    model: TaylorModel,
}

impl ScalarPatch {
    /// Wrap an existing model over a domain.
    pub fn from_model(domain: IntervalBox, model: TaylorModel) -> Self {
        debug_assert_eq!(domain.dimension(), model.argument_size());
        ScalarPatch { domain, model }
    }

    /// The constant function.
    pub fn constant(domain: IntervalBox, c: f64) -> Self {
        let model = TaylorModel::constant(domain.dimension(), c);
        ScalarPatch { domain, model }
    }

    /// The coordinate function `x ↦ x_j`, expressed in the unit chart as
    /// `mid(D_j) + rad(D_j)·s_j`.
    pub fn coordinate(domain: IntervalBox, j: usize) -> Self {
        let n = domain.dimension();
        let mid = domain[j].midpoint();
        let rad = domain[j].radius().get();
        let model = TaylorModel::coordinate(n, j).scale(rad).add_constant(mid);
        ScalarPatch { domain, model }
    }

    /// The domain box.
    pub fn domain(&self) -> &IntervalBox {
        &self.domain
    }

    /// The underlying Taylor model.
    pub fn model(&self) -> &TaylorModel {
        &self.model
    }

    /// Mutable access for sweepers.
    pub fn model_mut(&mut self) -> &mut TaylorModel {
        &mut self.model
    }

    /// Rigorous range over the whole domain.
    pub fn range(&self) -> Interval {
        self.model.range()
    }

    /// Evaluate over a sub-box of the domain.
    pub fn evaluate(&self, x: &IntervalBox) -> Result<Interval, PatchError> {
        if x.dimension() != self.domain.dimension() {
            return Err(PatchError::Arity { expected: self.domain.dimension(), got: x.dimension() });
        }
        let args: Vec<Interval> =
            x.iter().zip(self.domain.iter()).map(|(xi, di)| unscale(xi, di)).collect();
        Ok(self.model.evaluate(&args)?)
    }
}

/// A vector function model: `m` Taylor models sharing one box domain.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorPatch {
    domain: IntervalBox,
    models: Vec<TaylorModel>,
}

impl VectorPatch {
    /// Wrap existing models over a domain.
    pub fn from_models(domain: IntervalBox, models: Vec<TaylorModel>) -> Self {
        debug_assert!(models.iter().all(|m| m.argument_size() == domain.dimension()));
        VectorPatch { domain, models }
    }

    /// The identity function on a domain.
    pub fn identity(domain: &IntervalBox) -> Self {
        let models = (0..domain.dimension())
            .map(|j| ScalarPatch::coordinate(domain.clone(), j).model().clone())
            .collect();
        VectorPatch { domain: domain.clone(), models }
    }

    /// Constant vector.
    pub fn constants(domain: IntervalBox, values: &[Interval]) -> Self {
        let n = domain.dimension();
        let models =
            values.iter().map(|v| TaylorModel::constant_interval(n, v)).collect();
        VectorPatch { domain, models }
    }

    /// The domain box.
    pub fn domain(&self) -> &IntervalBox {
        &self.domain
    }

    /// Number of parameters (domain dimension).
    pub fn argument_size(&self) -> usize {
        self.domain.dimension()
    }

    /// Number of components.
    pub fn result_size(&self) -> usize {
        self.models.len()
    }

    /// Component models.
    pub fn models(&self) -> &[TaylorModel] {
        &self.models
    }

    /// Mutable component models (sweeping, reconditioning).
    pub fn models_mut(&mut self) -> &mut [TaylorModel] {
        &mut self.models
    }

    /// Componentwise range: the codomain box.
    pub fn ranges(&self) -> IntervalBox {
        IntervalBox::new(self.models.iter().map(TaylorModel::range).collect())
    }

    /// Largest single-component error bound.
    pub fn max_error(&self) -> f64 {
        self.models.iter().map(|m| m.error().get()).fold(0.0, f64::max)
    }

    /// Evaluate all components over a sub-box of the domain.
    pub fn evaluate(&self, x: &IntervalBox) -> Result<IntervalBox, PatchError> {
        if x.dimension() != self.domain.dimension() {
            return Err(PatchError::Arity { expected: self.domain.dimension(), got: x.dimension() });
        }
        let args: Vec<Interval> =
            x.iter().zip(self.domain.iter()).map(|(xi, di)| unscale(xi, di)).collect();
        let mut out = Vec::with_capacity(self.models.len());
        for m in &self.models {
            out.push(m.evaluate(&args)?);
        }
        Ok(IntervalBox::new(out))
    }

    /// Express the component models in the outer patch's unit chart:
    /// `(model − mid)/rad` per outer domain interval, with a containment
    /// check of the ranges.
    fn unit_charted(&self, outer_domain: &IntervalBox) -> Result<Vec<TaylorModel>, PatchError> {
        if outer_domain.dimension() != self.models.len() {
            return Err(PatchError::Arity {
                expected: outer_domain.dimension(),
                got: self.models.len(),
            });
        }
        let mut out = Vec::with_capacity(self.models.len());
        for (j, m) in self.models.iter().enumerate() {
            let d = outer_domain.get(j);
            let range = m.range();
            if !range.refines(&d.widen(1e-14 * (1.0 + d.magnitude()))) {
                return Err(PatchError::DomainMismatch { component: j, inner: range, outer: *d });
            }
            let mid = d.midpoint();
            let rad = d.radius().get();
            if rad == 0.0 {
                out.push(TaylorModel::constant(m.argument_size(), 0.0));
            } else {
                let inv = Interval::point(1.0).div(&Interval::point(rad))?;
                out.push(m.add_constant(-mid).scale_interval(&inv));
            }
        }
        Ok(out)
    }

    /// Composition `outer ∘ self`, defined on `self`'s domain. The ranges
    /// of `self` must fit `outer`'s domain.
    pub fn compose(&self, outer: &VectorPatch) -> Result<VectorPatch, PatchError> {
        let charted = self.unit_charted(outer.domain())?;
        let models = outer.models.iter().map(|m| m.compose(&charted)).collect();
        Ok(VectorPatch { domain: self.domain.clone(), models })
    }

    /// Compose a single scalar patch over this vector patch.
    pub fn compose_scalar(&self, outer: &ScalarPatch) -> Result<ScalarPatch, PatchError> {
        let charted = self.unit_charted(outer.domain())?;
        Ok(ScalarPatch {
            domain: self.domain.clone(),
            model: outer.model().compose(&charted),
        })
    }

    /// Antiderivative of every component in coordinate `k`, scaled by the
    /// chart factor `rad(D_k)`.
    pub fn antiderivative(&self, k: usize) -> VectorPatch {
        let rad = self.domain[k].radius().get();
        let models = self
            .models
            .iter()
            .map(|m| m.antiderivative(k).scale(rad))
            .collect();
        VectorPatch { domain: self.domain.clone(), models }
    }

    /// Freeze coordinate `k` at the point `v ∈ D_k`; the result lives on
    /// the domain with that coordinate removed.
    pub fn partial_evaluate(&self, k: usize, v: f64) -> Result<VectorPatch, PatchError> {
        let s = unscale(&Interval::point(v), self.domain.get(k));
        let mut models = Vec::with_capacity(self.models.len());
        for m in &self.models {
            models.push(m.partial_evaluate(k, &s)?);
        }
        let domain = IntervalBox::new(
            self.domain
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != k)
                .map(|(_, iv)| *iv)
                .collect(),
        );
        Ok(VectorPatch { domain, models })
    }

    /// Stack the components of two patches over the same domain.
    pub fn join(&self, other: &VectorPatch) -> VectorPatch {
        debug_assert_eq!(self.domain, other.domain);
        let mut models = self.models.clone();
        models.extend(other.models.iter().cloned());
        VectorPatch { domain: self.domain.clone(), models }
    }

    /// Cartesian product: the result takes the parameters of `self`
    /// followed by those of `other` and stacks both component lists.
    pub fn combine(&self, other: &VectorPatch) -> VectorPatch {
        let domain = self.domain.join(&other.domain);
        let back = other.domain.dimension();
        let front = self.domain.dimension();
        let mut models: Vec<TaylorModel> =
            self.models.iter().map(|m| m.embed(0, back)).collect();
        models.extend(other.models.iter().map(|m| m.embed(front, 0)));
        VectorPatch { domain, models }
    }

    /// Reparametrise onto a subdomain: the new patch represents the same
    /// function restricted to `sub ⊆ D`.
    pub fn restrict(&self, sub: &IntervalBox) -> Result<VectorPatch, PatchError> {
        debug_assert!(sub.refines(&self.domain));
        let n = self.domain.dimension();
        // Affine inner chart: s_old = α_j + β_j · s_new, outward-rounded.
        let mut inner = Vec::with_capacity(n);
        for j in 0..n {
            let old = self.domain.get(j);
            let new = sub.get(j);
            let old_rad = old.radius().get();
            if old_rad == 0.0 {
                inner.push(TaylorModel::constant(n, 0.0));
                continue;
            }
            let inv = Interval::point(1.0).div(&Interval::point(old_rad))?;
            let alpha = Interval::point(new.midpoint())
                .sub(&Interval::point(old.midpoint()))
                .mul(&inv);
            let beta = Interval::point(new.radius().get()).mul(&inv);
            let tm = TaylorModel::coordinate(n, j)
                .scale_interval(&beta)
                .add(&TaylorModel::constant_interval(n, &alpha));
            inner.push(tm);
        }
        let models = self.models.iter().map(|m| m.compose(&inner)).collect();
        Ok(VectorPatch { domain: sub.clone(), models })
    }

    /// Apply a sweeper-style threshold to every component.
    pub fn sweep(&mut self, threshold: f64) {
        for m in &mut self.models {
            m.sweep(threshold);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dom2() -> IntervalBox {
        IntervalBox::new(vec![Interval::new(1.0, 3.0), Interval::new(-2.0, 0.0)])
    }

    #[test]
    fn identity_reproduces_domain() {
        let d = dom2();
        let id = VectorPatch::identity(&d);
        let r = id.ranges();
        assert!(d.refines(&r));
        // Point evaluation near the centre.
        let x = IntervalBox::new(vec![Interval::point(2.0), Interval::point(-1.0)]);
        let v = id.evaluate(&x).unwrap();
        assert!(v[0].contains(2.0) && v[1].contains(-1.0));
    }

    #[test]
    fn partial_evaluate_freezes_a_coordinate() {
        let d = dom2();
        let id = VectorPatch::identity(&d);
        let frozen = id.partial_evaluate(1, -0.5).unwrap();
        assert_eq!(frozen.argument_size(), 1);
        assert_eq!(frozen.result_size(), 2);
        let x = IntervalBox::new(vec![Interval::point(1.5)]);
        let v = frozen.evaluate(&x).unwrap();
        assert!(v[0].contains(1.5));
        assert!(v[1].contains(-0.5));
    }

    #[test]
    fn combine_stacks_domains_and_components() {
        let a = VectorPatch::identity(&IntervalBox::new(vec![Interval::new(0.0, 1.0)]));
        let b = VectorPatch::identity(&IntervalBox::new(vec![Interval::new(5.0, 7.0)]));
        let c = a.combine(&b);
        assert_eq!(c.argument_size(), 2);
        assert_eq!(c.result_size(), 2);
        let x = IntervalBox::new(vec![Interval::point(0.25), Interval::point(6.0)]);
        let v = c.evaluate(&x).unwrap();
        assert!(v[0].contains(0.25));
        assert!(v[1].contains(6.0));
    }

    #[test]
    fn compose_checks_domain_containment() {
        let inner_dom = IntervalBox::new(vec![Interval::new(-0.5, 0.5)]);
        let inner = VectorPatch::identity(&inner_dom);
        // Outer defined on [-1, 1]: fits.
        let outer = VectorPatch::identity(&IntervalBox::new(vec![Interval::new(-1.0, 1.0)]));
        let ok = inner.compose(&outer).unwrap();
        let v = ok
            .evaluate(&IntervalBox::new(vec![Interval::point(0.25)]))
            .unwrap();
        assert!(v[0].contains(0.25));
        // Outer defined on [0, 0.1]: inner range escapes.
        let tight = VectorPatch::identity(&IntervalBox::new(vec![Interval::new(0.0, 0.1)]));
        assert!(matches!(
            inner.compose(&tight),
            Err(PatchError::DomainMismatch { .. })
        ));
    }

    #[test]
    fn antiderivative_scales_with_the_chart() {
        // f(t) = 1 on t ∈ [0, h]: ∫₀ f = t, so the range is [0, h] up to
        // the chart constant; h = 0.5 ⇒ radius 0.25.
        let d = IntervalBox::new(vec![Interval::new(0.0, 0.5)]);
        let one = VectorPatch::from_models(d.clone(), vec![TaylorModel::constant(1, 1.0)]);
        let a = one.antiderivative(0);
        let r = a.ranges();
        // Antiderivative in the unit chart is s·rad; range [-0.25, 0.25].
        assert!(r[0].contains(0.25) && r[0].contains(-0.25));
    }

    #[test]
    fn restrict_narrows_ranges() {
        let d = IntervalBox::new(vec![Interval::new(-1.0, 1.0)]);
        let id = VectorPatch::identity(&d);
        let sub = IntervalBox::new(vec![Interval::new(0.0, 0.5)]);
        let res = id.restrict(&sub).unwrap();
        let r = res.ranges();
        assert!(r[0].contains(0.0) && r[0].contains(0.5));
        assert!(r[0].upper() < 0.75, "restriction should shrink the range");
    }
}
