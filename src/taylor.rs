//! Taylor models: polynomials with a rigorous error bound
//!
//! A [`TaylorModel`] is a polynomial `p` over the normalised box `[-1,1]ⁿ`
//! together with a scalar bound `e ≥ 0`. It represents every function
//! `g : [-1,1]ⁿ → ℝ` with `|g(x) − p(x)| ≤ e` pointwise. The invariants
//! maintained by every operation:
//!
//! - `e ≥ 0` always;
//! - the polynomial and the bound together enclose the true result: any
//!   floating-point round-off introduced while combining coefficients is
//!   measured exactly (two-sum / FMA residuals) and added to `e`;
//! - the expansion is kept canonical (graded-sorted, unique keys, no
//!   exact zeros).
//!
//! Sweeping trades polynomial size for error: coefficients below a
//! threshold are moved into `e`, constant term excepted. Sweepers are an
//! open extension point via the [`Sweeper`] trait.
//!
//! Elementary functions (reciprocal, sqrt, exp, log, sin, cos, atan) are
//! computed by composing a truncated series about the range midpoint with
//! a Lagrange tail evaluated over the whole range; see [`crate::series`].

use crate::expansion::Expansion;
use crate::float::{add_rnd, div_rnd, mul_rnd, two_prod, two_sum, Rounding};
use crate::index::MultiIndex;
use crate::interval::{DomainError, ErrorBound, Interval};
use crate::series::{lagrange_tail, taylor_coefficients, AnalyticOp};
use Rounding::Up;

/// Series order used when expanding elementary functions of a model.
const ANALYTIC_ORDER: usize = 8;

/// A polynomial over `[-1,1]ⁿ` plus a uniform error bound.
#[derive(Clone, Debug, PartialEq)]
pub struct TaylorModel {
    expansion: Expansion<f64>,
    error: ErrorBound,
}

impl TaylorModel {
    // -- construction -------------------------------------------------------

    /// The zero model on `n` variables.
    pub fn zero(n: usize) -> Self {
        TaylorModel { expansion: Expansion::new(n), error: ErrorBound::zero() }
    }

    /// An exact constant.
    pub fn constant(n: usize, c: f64) -> Self {
        let mut expansion = Expansion::new(n);
        if c != 0.0 {
            expansion.append(MultiIndex::zero(n), c);
        }
        TaylorModel { expansion, error: ErrorBound::zero() }
    }

    /// A constant known only up to an interval: midpoint goes into the
    /// polynomial, the radius into the error.
    pub fn constant_interval(n: usize, c: &Interval) -> Self {
        let mut tm = Self::constant(n, c.midpoint());
        tm.error = c.radius();
        tm
    }

    /// The coordinate projection `x ↦ xⱼ`.
    pub fn coordinate(n: usize, j: usize) -> Self {
        let mut expansion = Expansion::new(n);
        expansion.append(MultiIndex::unit(n, j), 1.0);
        TaylorModel { expansion, error: ErrorBound::zero() }
    }

    /// Build from interval-valued coefficients: midpoints populate the
    /// polynomial, radii and merge round-off land in the error bound.
    pub fn from_interval_terms(args: usize, terms: Vec<(MultiIndex, Interval)>) -> TaylorModel {
        let mut error = ErrorBound::zero();
        let mut raw = Vec::with_capacity(terms.len());
        for (a, c) in terms {
            error = error.add(c.radius());
            raw.push((a, c.midpoint()));
        }
        TaylorModel::from_terms(args, raw, error)
    }

    /// Rebuild from raw terms: canonicalises and accounts the merge
    /// round-off into the error bound.
    fn from_terms(
        args: usize,
        mut terms: Vec<(MultiIndex, f64)>,
        mut error: ErrorBound,
    ) -> Self {
        terms.sort_by(|(a, _), (b, _)| a.graded_cmp(b));
        let mut expansion = Expansion::with_capacity(args, terms.len());
        let mut iter = terms.into_iter().peekable();
        while let Some((key, mut acc)) = iter.next() {
            while iter.peek().map(|(k, _)| *k == key).unwrap_or(false) {
                let (_, c) = iter.next().expect("peeked");
                let (s, resid) = two_sum(acc, c);
                acc = s;
                error = error.add_abs(resid);
            }
            if acc != 0.0 {
                expansion.append(key, acc);
            }
        }
        TaylorModel { expansion, error }
    }

    // -- accessors ----------------------------------------------------------

    /// Number of variables.
    pub fn argument_size(&self) -> usize {
        self.expansion.argument_size()
    }

    /// The polynomial part.
    pub fn expansion(&self) -> &Expansion<f64> {
        &self.expansion
    }

    /// The uniform error bound.
    pub fn error(&self) -> ErrorBound {
        self.error
    }

    /// Replace the error bound (must only ever grow in validated code).
    pub fn set_error(&mut self, e: ErrorBound) {
        self.error = e;
    }

    /// Number of stored coefficients.
    pub fn number_of_nonzeros(&self) -> usize {
        self.expansion.len()
    }

    /// The constant coefficient.
    pub fn value(&self) -> f64 {
        self.expansion
            .find_sorted(&MultiIndex::zero(self.argument_size()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Highest stored degree.
    pub fn degree(&self) -> u16 {
        self.expansion.degree()
    }

    /// Upper bound on `Σ|cᵢ|`, hence on `|p(x)|` over the unit box.
    pub fn norm1(&self) -> f64 {
        let mut s = 0.0;
        for (_, c) in self.expansion.iter() {
            s = add_rnd(s, c.abs(), Up);
        }
        s
    }

    // -- arithmetic ---------------------------------------------------------

    /// Negation (exact).
    pub fn neg(&self) -> TaylorModel {
        let mut r = self.clone();
        r.expansion.map_coefficients(|c| -c);
        r
    }

    /// Sum with exact round-off accounting.
    pub fn add(&self, other: &TaylorModel) -> TaylorModel {
        debug_assert_eq!(self.argument_size(), other.argument_size());
        let mut terms: Vec<(MultiIndex, f64)> = self.expansion.iter().cloned().collect();
        terms.extend(other.expansion.iter().cloned());
        TaylorModel::from_terms(self.argument_size(), terms, self.error.add(other.error))
    }

    /// Difference.
    pub fn sub(&self, other: &TaylorModel) -> TaylorModel {
        self.add(&other.neg())
    }

    /// Add an exact constant.
    pub fn add_constant(&self, c: f64) -> TaylorModel {
        self.add(&TaylorModel::constant(self.argument_size(), c))
    }

    /// Scale by an exact scalar; FMA residuals go into the error.
    pub fn scale(&self, c: f64) -> TaylorModel {
        let mut error = self.error.scale(c);
        let mut terms = Vec::with_capacity(self.expansion.len());
        for (a, x) in self.expansion.iter() {
            let (p, resid) = two_prod(*x, c);
            error = error.add_abs(resid);
            terms.push((a.clone(), p));
        }
        TaylorModel::from_terms(self.argument_size(), terms, error)
    }

    /// Scale by an interval: the midpoint multiplies the polynomial, the
    /// radius contributes `rad·‖p‖₁` to the error.
    pub fn scale_interval(&self, c: &Interval) -> TaylorModel {
        let mid = c.midpoint();
        let mut r = self.scale(mid);
        r.error = r.error.add(c.radius().scale(add_rnd(self.norm1(), self.error.get(), Up)));
        r
    }

    /// Product. The error propagates as
    /// `(‖p₁‖₁ + e₁)·e₂ + ‖p₂‖₁·e₁` plus the exact convolution round-off.
    pub fn mul(&self, other: &TaylorModel) -> TaylorModel {
        debug_assert_eq!(self.argument_size(), other.argument_size());
        let n = self.argument_size();
        let mut error = ErrorBound::zero();
        let mut terms: Vec<(MultiIndex, f64)> =
            Vec::with_capacity(self.expansion.len() * other.expansion.len());
        for (a, ca) in self.expansion.iter() {
            for (b, cb) in other.expansion.iter() {
                let (p, resid) = two_prod(*ca, *cb);
                error = error.add_abs(resid);
                terms.push((a.sum(b), p));
            }
        }
        let cross = self
            .error
            .scale(add_rnd(other.norm1(), other.error.get(), Up))
            .add(other.error.scale(self.norm1()));
        TaylorModel::from_terms(n, terms, error.add(cross))
    }

    /// Square via `mul` (kept separate for call-site clarity).
    pub fn square(&self) -> TaylorModel {
        self.mul(self)
    }

    /// Antiderivative in variable `j` over the unit domain: divides each
    /// coefficient by its new degree. Since `|t| ≤ 1` on the domain, the
    /// inherited error bound does not grow beyond the division round-off.
    pub fn antiderivative(&self, j: usize) -> TaylorModel {
        let mut error = self.error;
        let mut terms = Vec::with_capacity(self.expansion.len());
        for (a, c) in self.expansion.iter() {
            let mut b = a.clone();
            b.inc(j);
            let k = b.get(j) as f64;
            let q = c / k;
            // Exact residual of the division, scaled back.
            let resid = q.mul_add(-k, *c);
            error = error.add_abs(div_rnd(resid.abs(), k, Up));
            terms.push((b, q));
        }
        TaylorModel::from_terms(self.argument_size(), terms, error)
    }

    // -- sweeping -----------------------------------------------------------

    /// Move every non-constant coefficient with `|c| < threshold` into the
    /// error bound.
    pub fn sweep(&mut self, threshold: f64) {
        let n = self.argument_size();
        let zero = MultiIndex::zero(n);
        let mut swept = ErrorBound::zero();
        let mut expansion = Expansion::with_capacity(n, self.expansion.len());
        for (a, c) in self.expansion.iter() {
            if *a != zero && c.abs() < threshold {
                swept = swept.add_abs(*c);
            } else {
                expansion.append(a.clone(), *c);
            }
        }
        self.expansion = expansion;
        self.error = self.error.add(swept);
    }

    // -- evaluation and range -----------------------------------------------

    /// Evaluate over an interval vector (componentwise substitution).
    pub fn evaluate(&self, args: &[Interval]) -> Result<Interval, DomainError> {
        debug_assert_eq!(args.len(), self.argument_size());
        let mut acc = Interval::point(0.0);
        for (a, c) in self.expansion.iter() {
            let mut term = Interval::point(*c);
            for (j, &d) in a.as_slice().iter().enumerate() {
                if d > 0 {
                    term = term.mul(&args[j].powi(d as i32)?);
                }
            }
            acc = acc.add(&term);
        }
        Ok(acc.add(&self.error.as_interval()))
    }

    /// Rigorous range over the unit box. Terms of all-even degree
    /// contribute `c·[0,1]`, the rest `c·[-1,1]`; the error bound widens
    /// symmetrically.
    pub fn range(&self) -> Interval {
        let n = self.argument_size();
        let zero = MultiIndex::zero(n);
        let mut acc = Interval::point(0.0);
        for (a, c) in self.expansion.iter() {
            let term = if *a == zero {
                Interval::point(*c)
            } else if a.as_slice().iter().all(|&d| d % 2 == 0) {
                Interval::point(*c).mul(&Interval::new(0.0, 1.0))
            } else {
                Interval::point(*c).mul(&Interval::unit())
            };
            acc = acc.add(&term);
        }
        acc.add(&self.error.as_interval())
    }

    /// Upper bound on `|f(x)|` over the unit box.
    pub fn magnitude(&self) -> f64 {
        self.range().magnitude()
    }

    // -- composition --------------------------------------------------------

    /// Substitute the variables by the given models (all on a common
    /// argument space). The outer polynomial is evaluated term by term
    /// with cached monomial powers; the outer error transfers unchanged
    /// since substitution cannot enlarge a uniform bound.
    pub fn compose(&self, inner: &[TaylorModel]) -> TaylorModel {
        debug_assert_eq!(inner.len(), self.argument_size());
        let m = inner.first().map(TaylorModel::argument_size).unwrap_or(0);
        let mut powers: Vec<Vec<TaylorModel>> =
            inner.iter().map(|g| vec![TaylorModel::constant(m, 1.0), g.clone()]).collect();
        let mut acc = TaylorModel::zero(m);
        for (a, c) in self.expansion.iter() {
            let mut term = TaylorModel::constant(m, *c);
            for (j, &d) in a.as_slice().iter().enumerate() {
                if d == 0 {
                    continue;
                }
                while powers[j].len() <= d as usize {
                    let next = powers[j].last().expect("non-empty").mul(&inner[j]);
                    powers[j].push(next);
                }
                term = term.mul(&powers[j][d as usize]);
            }
            acc = acc.add(&term);
        }
        acc.error = acc.error.add(self.error);
        acc
    }

    // -- elementary functions -----------------------------------------------

    /// Apply an analytic operation by series composition about the range
    /// midpoint, with a Lagrange tail over the whole range.
    pub fn analytic(&self, op: AnalyticOp) -> Result<TaylorModel, DomainError> {
        let n = self.argument_size();
        let r = self.range();
        let c = r.midpoint();
        let centre = Interval::point(c);
        let coeffs = taylor_coefficients(op, &centre, ANALYTIC_ORDER)?;
        let tail = lagrange_tail(op, &r, ANALYTIC_ORDER)?;

        let centred = self.add_constant(-c);
        // Horner over interval coefficients.
        let mut acc = TaylorModel::constant_interval(n, coeffs.last().expect("coeffs"));
        for k in (0..coeffs.len() - 1).rev() {
            acc = acc.mul(&centred);
            acc = acc.add(&TaylorModel::constant_interval(n, &coeffs[k]));
        }
        // |f(x) − c| bound for the remainder term.
        let smag = centred.magnitude();
        let mut tail_mag = tail.magnitude();
        for _ in 0..=ANALYTIC_ORDER {
            tail_mag = mul_rnd(tail_mag, smag, Up);
        }
        acc.error = acc.error.add(ErrorBound::new(tail_mag));
        Ok(acc)
    }

    /// Embed into a larger variable space: `front` fresh variables before
    /// the existing ones, `back` after. The function is constant in the
    /// new variables, so the bound is unchanged.
    pub fn embed(&self, front: usize, back: usize) -> TaylorModel {
        let n = self.argument_size() + front + back;
        let mut expansion = Expansion::with_capacity(n, self.expansion.len());
        for (a, c) in self.expansion.iter() {
            expansion.append(a.embedded(front, back), *c);
        }
        TaylorModel { expansion, error: self.error }
    }

    /// Substitute variable `k` by an interval value, reducing the arity by
    /// one. The interval's spread and the substitution round-off both land
    /// in the error bound.
    pub fn partial_evaluate(&self, k: usize, v: &Interval) -> Result<TaylorModel, DomainError> {
        let n = self.argument_size();
        debug_assert!(k < n);
        let mut error = self.error;
        let mut terms: Vec<(MultiIndex, f64)> = Vec::with_capacity(self.expansion.len());
        for (a, c) in self.expansion.iter() {
            let d = a.get(k);
            let b = a.without_position(k);
            if d == 0 {
                terms.push((b, *c));
            } else {
                let coeff = Interval::point(*c).mul(&v.powi(d as i32)?);
                error = error.add(coeff.radius());
                terms.push((b, coeff.midpoint()));
            }
        }
        Ok(TaylorModel::from_terms(n - 1, terms, error))
    }

    /// Reciprocal.
    pub fn recip(&self) -> Result<TaylorModel, DomainError> {
        let r = self.range();
        if r.contains(0.0) {
            return Err(DomainError::DivisorStraddlesZero(r.lower(), r.upper()));
        }
        self.analytic(AnalyticOp::Rec)
    }

    /// Quotient via reciprocal.
    pub fn div(&self, other: &TaylorModel) -> Result<TaylorModel, DomainError> {
        Ok(self.mul(&other.recip()?))
    }
}

// ---------------------------------------------------------------------------
// Sweepers
// ---------------------------------------------------------------------------

/// Strategy for reducing polynomial size by moving terms into the error.
pub trait Sweeper: std::fmt::Debug + Send + Sync {
    /// Apply the reduction in place; implementations must keep the
    /// enclosure property (anything dropped is added to the error).
    fn sweep(&self, tm: &mut TaylorModel);
}

/// Sweep all non-constant coefficients below a magnitude threshold.
#[derive(Copy, Clone, Debug)]
pub struct ThresholdSweeper {
    threshold: f64,
}

impl ThresholdSweeper {
    /// A sweeper with the given magnitude threshold.
    pub fn new(threshold: f64) -> Self {
        debug_assert!(threshold >= 0.0);
        ThresholdSweeper { threshold }
    }

    /// The configured threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Sweeper for ThresholdSweeper {
    fn sweep(&self, tm: &mut TaylorModel) {
        tm.sweep(self.threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sample_unit(n: usize, rng: &mut StdRng) -> Vec<f64> {
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    fn eval_poly(tm: &TaylorModel, x: &[f64]) -> f64 {
        let mut acc = 0.0;
        for (a, c) in tm.expansion().iter() {
            let mut t = *c;
            for (j, &d) in a.as_slice().iter().enumerate() {
                for _ in 0..d {
                    t *= x[j];
                }
            }
            acc += t;
        }
        acc
    }

    #[test]
    fn sweep_moves_small_terms_into_error() {
        // 1 + ε·x with ε = 1e-16, swept at 1e-10: the term disappears and
        // the error absorbs at least ε.
        let eps = 1e-16;
        let x = TaylorModel::coordinate(1, 0);
        let mut tm = x.scale(eps).add_constant(1.0);
        tm.sweep(1e-10);
        assert!(tm.error().get() >= eps);
        assert_eq!(tm.number_of_nonzeros(), 1);
        assert_eq!(tm.value(), 1.0);
        // Idempotence (up to the error bound).
        let mut again = tm.clone();
        again.sweep(1e-10);
        assert_eq!(again.expansion(), tm.expansion());
        assert_eq!(again.error(), tm.error());
    }

    #[test]
    fn sweep_never_touches_the_constant() {
        let mut tm = TaylorModel::constant(2, 1e-20);
        tm.sweep(1e-10);
        assert_eq!(tm.value(), 1e-20);
        assert_eq!(tm.error().get(), 0.0);
    }

    #[test]
    fn product_encloses_pointwise_products() {
        let mut rng = StdRng::seed_from_u64(31);
        let x = TaylorModel::coordinate(2, 0);
        let y = TaylorModel::coordinate(2, 1);
        // f = (x + 0.5y + 0.25)², g = x·y − 0.125
        let f = x.add(&y.scale(0.5)).add_constant(0.25).square();
        let g = x.mul(&y).add_constant(-0.125);
        let h = f.mul(&g);
        for _ in 0..500 {
            let p = sample_unit(2, &mut rng);
            let fv = (p[0] + 0.5 * p[1] + 0.25_f64).powi(2);
            let gv = p[0] * p[1] - 0.125;
            let hv = fv * gv;
            let pv = eval_poly(&h, &p);
            assert!(
                (hv - pv).abs() <= h.error().get() + 1e-12,
                "point {p:?}: |{hv} − {pv}| > {}",
                h.error().get()
            );
        }
    }

    #[test]
    fn interval_scaling_accounts_radius() {
        let x = TaylorModel::coordinate(1, 0);
        let c = Interval::new(2.0 - 1e-8, 2.0 + 1e-8);
        let s = x.scale_interval(&c);
        // Error must cover rad(c)·‖x‖ = 1e-8.
        assert!(s.error().get() >= 1e-8);
        let r = s.range();
        assert!(r.contains(2.0) && r.contains(-2.0));
    }

    #[test]
    fn antiderivative_of_linear_is_quadratic_half() {
        let t = TaylorModel::coordinate(1, 0);
        let a = t.scale(2.0).antiderivative(0);
        // ∫ 2t dt = t²
        let sq = MultiIndex::from_slice(&[2]);
        assert_eq!(a.expansion().find_sorted(&sq), Some(&1.0));
        assert_eq!(a.error().get(), 0.0);
    }

    #[test]
    fn range_uses_even_power_refinement() {
        // x²: true range [0,1]; the all-even rule keeps the lower end 0.
        let x = TaylorModel::coordinate(1, 0);
        let r = x.square().range();
        assert_eq!(r.lower(), 0.0);
        assert!(r.upper() >= 1.0);
    }

    #[test]
    fn composition_encloses() {
        let mut rng = StdRng::seed_from_u64(32);
        // outer(u) = u² + u over inner = 0.5·x − 0.25
        let u = TaylorModel::coordinate(1, 0);
        let outer = u.square().add(&u);
        let inner = TaylorModel::coordinate(1, 0).scale(0.5).add_constant(-0.25);
        let comp = outer.compose(std::slice::from_ref(&inner));
        for _ in 0..200 {
            let p = sample_unit(1, &mut rng);
            let iv = 0.5 * p[0] - 0.25;
            let ov = iv * iv + iv;
            let pv = eval_poly(&comp, &p);
            assert!((ov - pv).abs() <= comp.error().get() + 1e-12);
        }
    }

    #[test]
    fn analytic_exp_encloses_reference() {
        let mut rng = StdRng::seed_from_u64(33);
        // exp(0.5x + 0.1) on [-1,1]
        let arg = TaylorModel::coordinate(1, 0).scale(0.5).add_constant(0.1);
        let e = arg.analytic(AnalyticOp::Exp).unwrap();
        for _ in 0..200 {
            let p = sample_unit(1, &mut rng);
            let truth = (0.5 * p[0] + 0.1_f64).exp();
            let pv = eval_poly(&e, &p);
            assert!((truth - pv).abs() <= e.error().get() + 1e-12, "at {p:?}");
        }
        assert!(e.error().get() < 1e-6, "series order should be ample here");
    }

    #[test]
    fn recip_rejects_zero_range() {
        let x = TaylorModel::coordinate(1, 0);
        assert!(x.recip().is_err());
        let shifted = x.scale(0.25).add_constant(1.0);
        let r = shifted.recip().unwrap();
        let val = r.evaluate(&[Interval::point(0.0)]).unwrap();
        assert!(val.contains(1.0));
    }

    #[test]
    fn evaluate_includes_error_band() {
        let mut tm = TaylorModel::constant(1, 1.0);
        tm.set_error(ErrorBound::new(0.5));
        let v = tm.evaluate(&[Interval::unit()]).unwrap();
        assert!(v.contains(0.5) && v.contains(1.5));
    }
}
