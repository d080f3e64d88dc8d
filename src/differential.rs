//! Truncated multivariate power series (automatic differentiation)
//!
//! A [`Differential`] is an expansion truncated at a fixed total degree,
//! closed under the ring operations, composition against a univariate
//! series, and a *formal* antiderivative. Truncation discards keys beyond
//! the degree cap; this is sound truncation of a formal series, not a
//! rounding step, and the consumers (jet propagation in the integrator)
//! account for the discarded tail separately through interval-valued
//! coefficients evaluated over enclosing boxes.
//!
//! Coefficients are any [`Ring`]; the crate instantiates intervals, so
//! coefficient arithmetic carries its own outward rounding.

use crate::expansion::{Coefficient, Expansion};
use crate::index::MultiIndex;
use crate::interval::Interval;

/// Coefficient ring for differentials: the [`Coefficient`] container
/// interface plus the arithmetic the algebra needs.
pub trait Ring: Coefficient {
    /// Multiplicative identity.
    fn ring_one() -> Self;
    /// Negation.
    fn ring_neg(&self) -> Self;
    /// Difference.
    fn ring_sub(&self, other: &Self) -> Self;
    /// Product.
    fn ring_mul(&self, other: &Self) -> Self;
    /// Division by a positive integer (used by the antiderivative).
    fn ring_div_int(&self, k: u32) -> Self;
}

impl Ring for Interval {
    fn ring_one() -> Self {
        Interval::point(1.0)
    }
    fn ring_neg(&self) -> Self {
        self.neg()
    }
    fn ring_sub(&self, other: &Self) -> Self {
        self.sub(other)
    }
    fn ring_mul(&self, other: &Self) -> Self {
        self.mul(other)
    }
    fn ring_div_int(&self, k: u32) -> Self {
        debug_assert!(k > 0);
        self.div(&Interval::point(k as f64)).expect("positive integer divisor")
    }
}

/// An expansion truncated at a fixed total degree, with AD algebra.
#[derive(Clone, Debug, PartialEq)]
pub struct Differential<X: Ring> {
    exp: Expansion<X>,
    degree: u16,
}

impl<X: Ring> Differential<X> {
    /// The zero differential on `n` variables, truncated at `degree`.
    pub fn zero(n: usize, degree: u16) -> Self {
        Differential { exp: Expansion::new(n), degree }
    }

    /// A constant differential.
    pub fn constant(n: usize, degree: u16, value: X) -> Self {
        let mut exp = Expansion::new(n);
        if !value.coeff_is_zero() {
            exp.append(MultiIndex::zero(n), value);
        }
        Differential { exp, degree }
    }

    /// The affine differential `value + xⱼ` (unit coefficient on `xⱼ`).
    pub fn variable(n: usize, degree: u16, value: X, j: usize) -> Self {
        let mut exp = Expansion::new(n);
        if !value.coeff_is_zero() {
            exp.append(MultiIndex::zero(n), value);
        }
        if degree >= 1 {
            exp.append(MultiIndex::unit(n, j), X::ring_one());
        }
        Differential { exp, degree }
    }

    /// Number of variables.
    pub fn argument_size(&self) -> usize {
        self.exp.argument_size()
    }

    /// Truncation degree.
    pub fn degree(&self) -> u16 {
        self.degree
    }

    /// The underlying (canonical) expansion.
    pub fn expansion(&self) -> &Expansion<X> {
        &self.exp
    }

    /// Coefficient of the zero index (the value at the expansion point).
    pub fn value(&self) -> X {
        self.exp
            .find_sorted(&MultiIndex::zero(self.argument_size()))
            .cloned()
            .unwrap_or_else(X::coeff_zero)
    }

    /// Coefficient of `xⱼ` (the j-th first-order derivative).
    pub fn gradient(&self, j: usize) -> X {
        self.exp
            .find_sorted(&MultiIndex::unit(self.argument_size(), j))
            .cloned()
            .unwrap_or_else(X::coeff_zero)
    }

    fn from_terms(n: usize, degree: u16, terms: Vec<(MultiIndex, X)>) -> Self {
        let mut exp = Expansion::with_capacity(n, terms.len());
        for (a, c) in terms {
            if a.degree() <= degree {
                exp.append(a, c);
            }
        }
        exp.canonicalize();
        Differential { exp, degree }
    }

    /// Sum; truncation degrees must agree.
    pub fn add(&self, other: &Differential<X>) -> Differential<X> {
        debug_assert_eq!(self.degree, other.degree);
        let mut terms: Vec<(MultiIndex, X)> = self.exp.iter().cloned().collect();
        terms.extend(other.exp.iter().cloned());
        Differential::from_terms(self.argument_size(), self.degree, terms)
    }

    /// Negation.
    pub fn neg(&self) -> Differential<X> {
        let mut r = self.clone();
        r.exp.map_coefficients(|c| c.ring_neg());
        r
    }

    /// Difference.
    pub fn sub(&self, other: &Differential<X>) -> Differential<X> {
        self.add(&other.neg())
    }

    /// Add a constant.
    pub fn add_constant(&self, c: &X) -> Differential<X> {
        self.add(&Differential::constant(self.argument_size(), self.degree, c.clone()))
    }

    /// Multiply every coefficient by `c`.
    pub fn scale(&self, c: &X) -> Differential<X> {
        let mut r = self.clone();
        r.exp.map_coefficients(|x| x.ring_mul(c));
        r.exp.prune_zeros();
        r
    }

    /// Product: convolution discarding results above the truncation degree.
    pub fn mul(&self, other: &Differential<X>) -> Differential<X> {
        debug_assert_eq!(self.degree, other.degree);
        let n = self.argument_size();
        let mut terms: Vec<(MultiIndex, X)> = Vec::new();
        for (a, ca) in self.exp.iter() {
            if a.degree() > self.degree {
                continue;
            }
            for (b, cb) in other.exp.iter() {
                if a.degree() + b.degree() > self.degree {
                    continue;
                }
                terms.push((a.sum(b), ca.ring_mul(cb)));
            }
        }
        Differential::from_terms(n, self.degree, terms)
    }

    /// Composition `Σₖ series[k]·(self − self.value())ᵏ` by Horner
    /// evaluation. The series is centred at the value of `self`, which is
    /// exactly how the elementary functions consume it.
    pub fn compose_series(&self, series: &[X]) -> Differential<X> {
        let n = self.argument_size();
        let centred = self.sub(&Differential::constant(n, self.degree, self.value()));
        let mut r = Differential::constant(
            n,
            self.degree,
            series.last().cloned().unwrap_or_else(X::coeff_zero),
        );
        for c in series.iter().rev().skip(1) {
            r = r.mul(&centred).add_constant(c);
        }
        r
    }

    /// Formal antiderivative in variable `j`: each index gains a degree in
    /// `j` and the coefficient is divided by the new degree. Terms pushed
    /// beyond the truncation degree are discarded.
    pub fn antiderivative(&self, j: usize) -> Differential<X> {
        let n = self.argument_size();
        let mut terms: Vec<(MultiIndex, X)> = Vec::new();
        for (a, c) in self.exp.iter() {
            if a.degree() + 1 > self.degree {
                continue;
            }
            let mut b = a.clone();
            b.inc(j);
            let k = b.get(j) as u32;
            terms.push((b, c.ring_div_int(k)));
        }
        Differential::from_terms(n, self.degree, terms)
    }

    /// Partial derivative in variable `j`.
    pub fn derivative(&self, j: usize) -> Differential<X> {
        let n = self.argument_size();
        let mut terms: Vec<(MultiIndex, X)> = Vec::new();
        for (a, c) in self.exp.iter() {
            if a.get(j) == 0 {
                continue;
            }
            let k = a.get(j) as u32;
            let mut b = a.clone();
            b.dec(j);
            let mut factor = X::coeff_zero();
            for _ in 0..k {
                factor = factor.coeff_add(&X::ring_one());
            }
            terms.push((b, c.ring_mul(&factor)));
        }
        Differential::from_terms(n, self.degree, terms)
    }
}

impl Differential<Interval> {
    /// Evaluate the polynomial part over an interval vector (each variable
    /// replaced by the given interval). Used for coarse range queries in
    /// tests; the integrator works on the coefficients directly.
    pub fn evaluate(&self, args: &[Interval]) -> Interval {
        debug_assert_eq!(args.len(), self.argument_size());
        let mut acc = Interval::point(0.0);
        for (a, c) in self.exp.iter() {
            let mut term = *c;
            for (j, &d) in a.as_slice().iter().enumerate() {
                for _ in 0..d {
                    term = term.mul(&args[j]);
                }
            }
            acc = acc.add(&term);
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn di(x: f64) -> Interval {
        Interval::point(x)
    }

    #[test]
    fn product_truncates_at_degree() {
        // (1 + x)·(1 + y) at degree 1 loses the xy term.
        let x = Differential::variable(2, 1, di(1.0), 0);
        let y = Differential::variable(2, 1, di(1.0), 1);
        let p = x.mul(&y);
        assert_eq!(p.value(), di(1.0));
        assert_eq!(p.gradient(0), di(1.0));
        assert_eq!(p.gradient(1), di(1.0));
        assert_eq!(p.expansion().len(), 3);

        // At degree 2 the cross term survives.
        let x2 = Differential::variable(2, 2, di(1.0), 0);
        let y2 = Differential::variable(2, 2, di(1.0), 1);
        let p2 = x2.mul(&y2);
        assert_eq!(p2.expansion().len(), 4);
    }

    #[test]
    fn antiderivative_divides_by_new_degree() {
        // d/dx-antiderivative of x² is x³/3; at cap 3 the term survives,
        // at cap 2 it is discarded.
        let x = Differential::variable(1, 3, di(0.0), 0);
        let x2 = x.mul(&x);
        let ad = x2.antiderivative(0);
        let cube = MultiIndex::from_slice(&[3]);
        let c = ad.expansion().find_sorted(&cube).copied().unwrap();
        assert!(c.contains(1.0 / 3.0));

        let xc = Differential::variable(1, 2, di(0.0), 0);
        let trunc = xc.mul(&xc).antiderivative(0);
        assert!(trunc.expansion().is_empty());
    }

    #[test]
    fn derivative_inverts_antiderivative() {
        let x = Differential::variable(1, 4, di(0.5), 0);
        let p = x.mul(&x).mul(&x); // (0.5 + x)³
        let round = p.antiderivative(0).derivative(0);
        // Same value and gradient up to interval rounding.
        assert!(round.value().contains(p.value().midpoint()));
        assert!(round.gradient(0).contains(p.gradient(0).midpoint()));
    }

    #[test]
    fn compose_series_matches_polynomial() {
        // series = [c₀, c₁, c₂] about value 0 ⇒ c₀ + c₁x + c₂x².
        let x = Differential::variable(1, 2, di(0.0), 0);
        let series = [di(3.0), di(2.0), di(1.0)];
        let g = x.compose_series(&series);
        assert_eq!(g.value(), di(3.0));
        assert_eq!(g.gradient(0), di(2.0));
        let sq = MultiIndex::from_slice(&[2]);
        assert_eq!(g.expansion().find_sorted(&sq), Some(&di(1.0)));
        // Centring: series about value 1 sees (x − 1) powers.
        let x1 = Differential::variable(1, 2, di(1.0), 0);
        let g1 = x1.compose_series(&series);
        assert_eq!(g1.value(), di(3.0));
        assert_eq!(g1.gradient(0), di(2.0));
    }

    #[test]
    fn evaluate_encloses_point_values() {
        let x = Differential::variable(2, 3, di(0.0), 0);
        let y = Differential::variable(2, 3, di(0.0), 1);
        // f = x²y + 2
        let f = x.mul(&x).mul(&y).add_constant(&di(2.0));
        let v = f.evaluate(&[Interval::new(0.0, 1.0), Interval::new(-1.0, 1.0)]);
        assert!(v.contains(2.0));
        assert!(v.contains(2.25 * 0.5 * 0.5 * 0.0 + 2.0));
        assert!(v.contains(1.0 * 1.0 * -1.0 + 2.0));
    }
}
