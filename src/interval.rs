//! Outward-rounded interval arithmetic
//!
//! The containment contract shared by every operation in this module: the
//! true mathematical result of an operation on any points of the operand
//! intervals lies within the returned interval. Lower endpoints round down,
//! upper endpoints round up, always through the explicit-direction
//! primitives of [`crate::float`] — there is no global rounding state to
//! get wrong.
//!
//! ## Empty and failure semantics
//!
//! The empty interval is encoded as `[+∞, −∞]` and propagates: any
//! operation with an empty operand yields empty. Domain violations (division
//! by a zero-straddling interval, logarithm touching the non-positive axis)
//! fail fast with [`DomainError`]; NaN endpoints never appear in a
//! constructed interval.
//!
//! ## The validated tiers
//!
//! - [`Interval`] — bounded pair, the workhorse;
//! - [`ErrorBound`] — upper-only magnitude bound with monotone-upward
//!   arithmetic, used for Taylor-model error accounting;
//! - [`LowerBound`] — lower-only counterpart;
//! - [`Ball`] — midpoint + radius view;
//! - plain `f64` — the approximate tier, no guarantees.

use crate::float::{
    add_rnd, atan_rnd, cos_rnd, div_rnd, exp_rnd, log_rnd, mul_rnd, pi_rnd, sin_rnd, sqrt_rnd,
    sub_rnd, Rounding,
};
pub use crate::float::DomainError;
use Rounding::{Down, Up};

/// A closed interval `[l, u]` of doubles with `l ≤ u`, or the empty
/// interval `[+∞, −∞]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Interval {
    l: f64,
    u: f64,
}

impl Interval {
    /// Construct from endpoints, checking the ordering invariant.
    pub fn new_r(l: f64, u: f64) -> Result<Self, DomainError> {
        if l.is_nan() || u.is_nan() {
            return Err(DomainError::NanProduced(l, u));
        }
        if l > u {
            return Ok(Self::empty());
        }
        Ok(Interval { l, u })
    }

    /// Construct from endpoints (panics on NaN).
    pub fn new(l: f64, u: f64) -> Self {
        Self::new_r(l, u).expect("interval endpoints must not be NaN")
    }

    /// The degenerate interval `[x, x]`.
    pub fn point(x: f64) -> Self {
        Interval { l: x, u: x }
    }

    /// The empty interval.
    pub fn empty() -> Self {
        Interval { l: f64::INFINITY, u: f64::NEG_INFINITY }
    }

    /// The normalised domain `[-1, 1]`.
    pub fn unit() -> Self {
        Interval { l: -1.0, u: 1.0 }
    }

    /// Lower endpoint.
    pub fn lower(&self) -> f64 {
        self.l
    }

    /// Upper endpoint.
    pub fn upper(&self) -> f64 {
        self.u
    }

    /// True for the empty interval.
    pub fn is_empty(&self) -> bool {
        self.l > self.u
    }

    /// True when the interval is a single point.
    pub fn is_point(&self) -> bool {
        self.l == self.u
    }

    /// Approximate midpoint (nearest rounding; the midpoint is contained by
    /// construction since it is clamped to the endpoints).
    pub fn midpoint(&self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        let m = 0.5 * (self.l + self.u);
        if m.is_finite() {
            m.clamp(self.l, self.u)
        } else {
            0.5 * self.l + 0.5 * self.u
        }
    }

    /// Radius as an upper bound: `rad ≥ (u − l) / 2` and
    /// `[mid − rad, mid + rad] ⊇ self`.
    pub fn radius(&self) -> ErrorBound {
        if self.is_empty() {
            return ErrorBound::zero();
        }
        let m = self.midpoint();
        let a = sub_rnd(self.u, m, Up);
        let b = sub_rnd(m, self.l, Up);
        ErrorBound::new(a.max(b))
    }

    /// Width `u − l`, rounded up.
    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            sub_rnd(self.u, self.l, Up)
        }
    }

    /// Magnitude `max(|l|, |u|)`.
    pub fn magnitude(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.l.abs().max(self.u.abs())
        }
    }

    /// Mignitude: the smallest absolute value attained, 0 if the interval
    /// straddles zero.
    pub fn mignitude(&self) -> f64 {
        if self.l > 0.0 {
            self.l
        } else if self.u < 0.0 {
            -self.u
        } else {
            0.0
        }
    }

    /// Membership of a point.
    pub fn contains(&self, x: f64) -> bool {
        self.l <= x && x <= self.u
    }

    /// `self ⊆ other`.
    pub fn refines(&self, other: &Interval) -> bool {
        self.is_empty() || (other.l <= self.l && self.u <= other.u)
    }

    /// Non-empty intersection test.
    pub fn intersects(&self, other: &Interval) -> bool {
        !self.is_empty() && !other.is_empty() && self.l <= other.u && other.l <= self.u
    }

    /// Set intersection (possibly empty).
    pub fn intersection(&self, other: &Interval) -> Interval {
        if !self.intersects(other) {
            return Interval::empty();
        }
        Interval { l: self.l.max(other.l), u: self.u.min(other.u) }
    }

    /// Convex hull of two intervals.
    pub fn hull(&self, other: &Interval) -> Interval {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Interval { l: self.l.min(other.l), u: self.u.max(other.u) }
    }

    /// Split at the midpoint into lower and upper halves.
    pub fn split(&self) -> (Interval, Interval) {
        let m = self.midpoint();
        (Interval { l: self.l, u: m }, Interval { l: m, u: self.u })
    }

    /// Widen outward by `delta ≥ 0` on both sides.
    pub fn widen(&self, delta: f64) -> Interval {
        if self.is_empty() {
            return *self;
        }
        Interval { l: sub_rnd(self.l, delta, Down), u: add_rnd(self.u, delta, Up) }
    }

    // -- arithmetic ---------------------------------------------------------

    /// Negation.
    pub fn neg(&self) -> Interval {
        if self.is_empty() {
            return *self;
        }
        Interval { l: -self.u, u: -self.l }
    }

    /// Outward-rounded addition.
    pub fn add(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::empty();
        }
        Interval { l: add_rnd(self.l, other.l, Down), u: add_rnd(self.u, other.u, Up) }
    }

    /// Outward-rounded subtraction.
    pub fn sub(&self, other: &Interval) -> Interval {
        self.add(&other.neg())
    }

    /// Outward-rounded multiplication; branches on the signs of the
    /// endpoints to pick the extremal products.
    pub fn mul(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::empty();
        }
        let (a, b, c, d) = (self.l, self.u, other.l, other.u);
        let (l, u) = if a >= 0.0 {
            if c >= 0.0 {
                (mul_rnd(a, c, Down), mul_rnd(b, d, Up))
            } else if d <= 0.0 {
                (mul_rnd(b, c, Down), mul_rnd(a, d, Up))
            } else {
                (mul_rnd(b, c, Down), mul_rnd(b, d, Up))
            }
        } else if b <= 0.0 {
            if c >= 0.0 {
                (mul_rnd(a, d, Down), mul_rnd(b, c, Up))
            } else if d <= 0.0 {
                (mul_rnd(b, d, Down), mul_rnd(a, c, Up))
            } else {
                (mul_rnd(a, d, Down), mul_rnd(a, c, Up))
            }
        } else if c >= 0.0 {
            (mul_rnd(a, d, Down), mul_rnd(b, d, Up))
        } else if d <= 0.0 {
            (mul_rnd(b, c, Down), mul_rnd(a, c, Up))
        } else {
            // Both straddle zero: two candidate products per endpoint.
            let l = mul_rnd(a, d, Down).min(mul_rnd(b, c, Down));
            let u = mul_rnd(a, c, Up).max(mul_rnd(b, d, Up));
            (l, u)
        };
        Interval { l, u }
    }

    /// Outward-rounded division. Rejects divisors containing zero.
    pub fn div(&self, other: &Interval) -> Result<Interval, DomainError> {
        if self.is_empty() || other.is_empty() {
            return Ok(Interval::empty());
        }
        if other.contains(0.0) {
            return Err(DomainError::DivisorStraddlesZero(other.l, other.u));
        }
        let (a, b, c, d) = (self.l, self.u, other.l, other.u);
        let (l, u) = if c > 0.0 {
            if a >= 0.0 {
                (div_rnd(a, d, Down), div_rnd(b, c, Up))
            } else if b <= 0.0 {
                (div_rnd(a, c, Down), div_rnd(b, d, Up))
            } else {
                (div_rnd(a, c, Down), div_rnd(b, c, Up))
            }
        } else if a >= 0.0 {
            (div_rnd(b, d, Down), div_rnd(a, c, Up))
        } else if b <= 0.0 {
            (div_rnd(b, c, Down), div_rnd(a, d, Up))
        } else {
            (div_rnd(b, d, Down), div_rnd(a, d, Up))
        };
        Ok(Interval { l, u })
    }

    /// Reciprocal.
    pub fn recip(&self) -> Result<Interval, DomainError> {
        Interval::point(1.0).div(self)
    }

    /// Square, sharper than `self.mul(self)` for zero-straddling intervals.
    pub fn square(&self) -> Interval {
        if self.is_empty() {
            return *self;
        }
        let m = self.mignitude();
        let g = self.magnitude();
        Interval { l: mul_rnd(m, m, Down), u: mul_rnd(g, g, Up) }
    }

    /// Integer power by repeated squaring on the monotone pieces.
    pub fn powi(&self, n: i32) -> Result<Interval, DomainError> {
        if self.is_empty() {
            return Ok(*self);
        }
        if n < 0 {
            return self.powi(-n)?.recip();
        }
        match n {
            0 => Ok(Interval::point(1.0)),
            1 => Ok(*self),
            _ if n % 2 == 0 => {
                let h = self.powi(n / 2)?;
                Ok(h.square())
            }
            _ => {
                let h = self.powi(n - 1)?;
                Ok(self.mul(&h))
            }
        }
    }

    /// Square root; a negative lower endpoint is clamped to zero provided
    /// the upper endpoint is admissible.
    pub fn sqrt(&self) -> Result<Interval, DomainError> {
        if self.is_empty() {
            return Ok(*self);
        }
        if self.u < 0.0 {
            return Err(DomainError::SqrtNegative(self.u));
        }
        let l = if self.l <= 0.0 { 0.0 } else { sqrt_rnd(self.l, Down)? };
        Ok(Interval { l, u: sqrt_rnd(self.u, Up)? })
    }

    /// Exponential (monotone).
    pub fn exp(&self) -> Interval {
        if self.is_empty() {
            return *self;
        }
        Interval { l: exp_rnd(self.l, Down), u: exp_rnd(self.u, Up) }
    }

    /// Natural logarithm (monotone); the whole interval must be positive.
    pub fn log(&self) -> Result<Interval, DomainError> {
        if self.is_empty() {
            return Ok(*self);
        }
        Ok(Interval { l: log_rnd(self.l, Down)?, u: log_rnd(self.u, Up)? })
    }

    /// Arctangent (monotone).
    pub fn atan(&self) -> Interval {
        if self.is_empty() {
            return *self;
        }
        Interval { l: atan_rnd(self.l, Down), u: atan_rnd(self.u, Up) }
    }

    /// Sine: endpoint values unless a critical point may lie inside, in
    /// which case the corresponding extremum is included.
    pub fn sin(&self) -> Interval {
        if self.is_empty() {
            return *self;
        }
        if self.width() >= 2.0 * pi_rnd(Up) {
            return Interval::unit();
        }
        let lo = sin_rnd(self.l, Down).min(sin_rnd(self.u, Down));
        let hi = sin_rnd(self.l, Up).max(sin_rnd(self.u, Up));
        // Maxima of sin at π/2 + 2kπ, minima at −π/2 + 2kπ.
        let u = if may_contain_critical(self, 0.5) { 1.0 } else { hi };
        let l = if may_contain_critical(self, -0.5) { -1.0 } else { lo };
        Interval { l, u }
    }

    /// Cosine: endpoint values unless a critical point may lie inside.
    pub fn cos(&self) -> Interval {
        if self.is_empty() {
            return *self;
        }
        if self.width() >= 2.0 * pi_rnd(Up) {
            return Interval::unit();
        }
        let lo = cos_rnd(self.l, Down).min(cos_rnd(self.u, Down));
        let hi = cos_rnd(self.l, Up).max(cos_rnd(self.u, Up));
        // Maxima of cos at 2kπ, minima at π + 2kπ.
        let u = if may_contain_critical(self, 0.0) { 1.0 } else { hi };
        let l = if may_contain_critical(self, 1.0) { -1.0 } else { lo };
        Interval { l, u }
    }

    /// Multiply by a scalar.
    pub fn scale(&self, c: f64) -> Interval {
        self.mul(&Interval::point(c))
    }
}

/// Sound test for "the interval may contain a point `(offset + 2k)·π` for
/// some integer k". Uncertainty counts as containment, so a `false` answer
/// is a proof of absence.
fn may_contain_critical(i: &Interval, offset: f64) -> bool {
    // Beyond 2^52 the double grid is coarser than the period and the
    // candidate search below loses integers; concede containment.
    if i.l.abs() > 4.5e15 || i.u.abs() > 4.5e15 {
        return true;
    }
    let pi_lo = pi_rnd(Down);
    let pi_hi = pi_rnd(Up);
    // Candidate k values around the approximate quotient; width < 2π means
    // at most one true hit, and we test a guard band of ±1.
    let k0 = ((i.l / std::f64::consts::PI - offset) / 2.0).round() as i64;
    for k in (k0 - 1)..=(k0 + 1) {
        let m = offset + 2.0 * k as f64;
        // Enclosure of m·π with outward rounding on both sides.
        let (xl, xu) = if m >= 0.0 {
            (mul_rnd(m, pi_lo, Down), mul_rnd(m, pi_hi, Up))
        } else {
            (mul_rnd(m, pi_hi, Down), mul_rnd(m, pi_lo, Up))
        };
        if xu >= i.l && xl <= i.u {
            return true;
        }
    }
    false
}

impl std::ops::Add for Interval {
    type Output = Interval;
    fn add(self, rhs: Interval) -> Interval {
        Interval::add(&self, &rhs)
    }
}

impl std::ops::Sub for Interval {
    type Output = Interval;
    fn sub(self, rhs: Interval) -> Interval {
        Interval::sub(&self, &rhs)
    }
}

impl std::ops::Mul for Interval {
    type Output = Interval;
    fn mul(self, rhs: Interval) -> Interval {
        Interval::mul(&self, &rhs)
    }
}

impl std::ops::Neg for Interval {
    type Output = Interval;
    fn neg(self) -> Interval {
        Interval::neg(&self)
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "∅")
        } else {
            write!(f, "[{:.17e}, {:.17e}]", self.l, self.u)
        }
    }
}

// ---------------------------------------------------------------------------
// Upper / lower / ball tiers
// ---------------------------------------------------------------------------

/// A non-negative upper bound on an error magnitude. All arithmetic rounds
/// upward, so accumulating through this type can only loosen, never tighten.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct ErrorBound(f64);

impl ErrorBound {
    /// Wrap a bound; negative inputs are a caller bug.
    pub fn new(e: f64) -> Self {
        debug_assert!(e >= 0.0 && !e.is_nan(), "error bound must be non-negative, got {e}");
        ErrorBound(e.max(0.0))
    }

    /// The zero bound.
    pub fn zero() -> Self {
        ErrorBound(0.0)
    }

    /// Raw value.
    pub fn get(&self) -> f64 {
        self.0
    }

    /// Upward-rounded sum.
    pub fn add(&self, other: ErrorBound) -> ErrorBound {
        ErrorBound(add_rnd(self.0, other.0, Up))
    }

    /// Add the magnitude of a double, upward.
    pub fn add_abs(&self, x: f64) -> ErrorBound {
        ErrorBound(add_rnd(self.0, x.abs(), Up))
    }

    /// Upward-rounded product.
    pub fn mul(&self, other: ErrorBound) -> ErrorBound {
        ErrorBound(mul_rnd(self.0, other.0, Up))
    }

    /// Scale by a non-negative factor, upward.
    pub fn scale(&self, c: f64) -> ErrorBound {
        ErrorBound(mul_rnd(self.0, c.abs(), Up))
    }

    /// Pointwise maximum.
    pub fn max(&self, other: ErrorBound) -> ErrorBound {
        ErrorBound(self.0.max(other.0))
    }

    /// The symmetric interval `[-e, e]`.
    pub fn as_interval(&self) -> Interval {
        Interval::new(-self.0, self.0)
    }
}

/// A lower bound: the true value is at least this.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct LowerBound(pub f64);

impl LowerBound {
    /// Downward-rounded sum.
    pub fn add(&self, other: LowerBound) -> LowerBound {
        LowerBound(add_rnd(self.0, other.0, Down))
    }
}

/// Midpoint-radius view of an interval.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ball {
    /// Centre point.
    pub centre: f64,
    /// Radius such that the represented set is `[centre − r, centre + r]`.
    pub radius: ErrorBound,
}

impl Ball {
    /// Enclosing ball of an interval.
    pub fn from_interval(i: &Interval) -> Ball {
        Ball { centre: i.midpoint(), radius: i.radius() }
    }

    /// Interval view (outward-rounded).
    pub fn as_interval(&self) -> Interval {
        let r = self.radius.get();
        Interval::new(sub_rnd(self.centre, r, Down), add_rnd(self.centre, r, Up))
    }
}

// ---------------------------------------------------------------------------
// Boxes
// ---------------------------------------------------------------------------

/// An axis-aligned box: one interval per dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalBox(Vec<Interval>);

impl IntervalBox {
    /// Construct from per-dimension intervals.
    pub fn new(intervals: Vec<Interval>) -> Self {
        IntervalBox(intervals)
    }

    /// The unit box `[-1, 1]ⁿ`.
    pub fn unit(n: usize) -> Self {
        IntervalBox(vec![Interval::unit(); n])
    }

    /// Dimension.
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// Component access.
    pub fn get(&self, i: usize) -> &Interval {
        &self.0[i]
    }

    /// Mutable component access.
    pub fn get_mut(&mut self, i: usize) -> &mut Interval {
        &mut self.0[i]
    }

    /// Iterate the components.
    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.0.iter()
    }

    /// Underlying slice.
    pub fn as_slice(&self) -> &[Interval] {
        &self.0
    }

    /// True when any component is empty.
    pub fn is_empty(&self) -> bool {
        self.0.iter().any(Interval::is_empty)
    }

    /// Vector of midpoints.
    pub fn midpoint(&self) -> Vec<f64> {
        self.0.iter().map(Interval::midpoint).collect()
    }

    /// The largest component radius.
    pub fn radius(&self) -> f64 {
        self.0.iter().map(|i| i.radius().get()).fold(0.0, f64::max)
    }

    /// Index of the widest component.
    pub fn widest_dimension(&self) -> usize {
        let mut k = 0;
        let mut w = f64::NEG_INFINITY;
        for (i, iv) in self.0.iter().enumerate() {
            if iv.width() > w {
                w = iv.width();
                k = i;
            }
        }
        k
    }

    /// Componentwise subset test.
    pub fn refines(&self, other: &IntervalBox) -> bool {
        debug_assert_eq!(self.dimension(), other.dimension());
        self.0.iter().zip(&other.0).all(|(a, b)| a.refines(b))
    }

    /// Componentwise intersection test.
    pub fn intersects(&self, other: &IntervalBox) -> bool {
        debug_assert_eq!(self.dimension(), other.dimension());
        self.0.iter().zip(&other.0).all(|(a, b)| a.intersects(b))
    }

    /// Componentwise intersection.
    pub fn intersection(&self, other: &IntervalBox) -> IntervalBox {
        IntervalBox(self.0.iter().zip(&other.0).map(|(a, b)| a.intersection(b)).collect())
    }

    /// Componentwise hull.
    pub fn hull(&self, other: &IntervalBox) -> IntervalBox {
        IntervalBox(self.0.iter().zip(&other.0).map(|(a, b)| a.hull(b)).collect())
    }

    /// Membership of a point.
    pub fn contains_point(&self, p: &[f64]) -> bool {
        self.0.len() == p.len() && self.0.iter().zip(p).all(|(i, x)| i.contains(*x))
    }

    /// Componentwise sum.
    pub fn add(&self, other: &IntervalBox) -> IntervalBox {
        IntervalBox(self.0.iter().zip(&other.0).map(|(a, b)| a.add(b)).collect())
    }

    /// Scale every component by the same interval factor.
    pub fn scale(&self, c: &Interval) -> IntervalBox {
        IntervalBox(self.0.iter().map(|i| i.mul(c)).collect())
    }

    /// Widen every component outward by `delta`.
    pub fn widen(&self, delta: f64) -> IntervalBox {
        IntervalBox(self.0.iter().map(|i| i.widen(delta)).collect())
    }

    /// Split along dimension `k` at its midpoint.
    pub fn split(&self, k: usize) -> (IntervalBox, IntervalBox) {
        let (lo, hi) = self.0[k].split();
        let mut a = self.clone();
        let mut b = self.clone();
        a.0[k] = lo;
        b.0[k] = hi;
        (a, b)
    }

    /// Append the components of `other` (cartesian product of domains).
    pub fn join(&self, other: &IntervalBox) -> IntervalBox {
        let mut v = self.0.clone();
        v.extend_from_slice(&other.0);
        IntervalBox(v)
    }
}

impl std::ops::Index<usize> for IntervalBox {
    type Output = Interval;
    fn index(&self, i: usize) -> &Interval {
        &self.0[i]
    }
}

impl std::fmt::Display for IntervalBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (k, i) in self.0.iter().enumerate() {
            if k > 0 {
                write!(f, " × ")?;
            }
            write!(f, "{i}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn rand_interval(rng: &mut StdRng) -> Interval {
        let a: f64 = rng.gen_range(-8.0..8.0);
        let b: f64 = rng.gen_range(-8.0..8.0);
        Interval::new(a.min(b), a.max(b))
    }

    fn sample_in(i: &Interval, rng: &mut StdRng) -> f64 {
        if i.is_point() {
            return i.lower();
        }
        rng.gen_range(i.lower()..=i.upper())
    }

    #[test]
    fn arithmetic_containment_under_sampling() {
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..1000 {
            let x = rand_interval(&mut rng);
            let y = rand_interval(&mut rng);
            let (px, py) = (sample_in(&x, &mut rng), sample_in(&y, &mut rng));
            assert!(x.add(&y).contains(px + py));
            assert!(x.sub(&y).contains(px - py));
            assert!(x.mul(&y).contains(px * py));
            if !y.contains(0.0) {
                assert!(x.div(&y).unwrap().contains(px / py));
            }
            assert!(x.exp().contains(px.exp()));
            assert!(x.atan().contains(px.atan()));
            assert!(x.sin().contains(px.sin()));
            assert!(x.cos().contains(px.cos()));
            if x.lower() > 0.0 {
                assert!(x.log().unwrap().contains(px.ln()));
                assert!(x.sqrt().unwrap().contains(px.sqrt()));
            }
            assert!(x.square().contains(px * px));
            assert!(x.powi(3).unwrap().contains(px * px * px));
        }
    }

    #[test]
    fn empty_propagates_through_everything() {
        let e = Interval::empty();
        let x = Interval::new(1.0, 2.0);
        assert!(e.add(&x).is_empty());
        assert!(x.mul(&e).is_empty());
        assert!(e.sin().is_empty());
        assert!(e.sqrt().unwrap().is_empty());
        assert!(e.div(&x).unwrap().is_empty());
        assert!(!e.intersects(&x));
        assert!(e.refines(&x));
    }

    #[test]
    fn division_by_zero_straddle_is_rejected() {
        let x = Interval::new(1.0, 2.0);
        let z = Interval::new(-1.0, 1.0);
        assert!(matches!(x.div(&z), Err(DomainError::DivisorStraddlesZero(_, _))));
        assert!(x.div(&Interval::point(0.0)).is_err());
    }

    #[test]
    fn sqrt_clamps_slightly_negative_lower() {
        let x = Interval::new(-1e-12, 4.0);
        let r = x.sqrt().unwrap();
        assert_eq!(r.lower(), 0.0);
        assert!(r.upper() >= 2.0);
        assert!(Interval::new(-2.0, -1.0).sqrt().is_err());
    }

    #[test]
    fn sine_includes_extrema_when_crossed() {
        let half_pi = std::f64::consts::FRAC_PI_2;
        let i = Interval::new(0.0, std::f64::consts::PI);
        let s = i.sin();
        assert!(s.contains(0.0) && s.contains(1.0));
        assert!(s.upper() >= 1.0 - 1e-15);
        // An interval clear of criticals keeps endpoint sharpness.
        let j = Interval::new(0.1, 0.2);
        let sj = j.sin();
        assert!(sj.upper() < 0.21 && sj.lower() > 0.09);
        // Straddling the minimum at 3π/2.
        let k = Interval::new(3.0 * half_pi - 0.1, 3.0 * half_pi + 0.1);
        assert_eq!(k.sin().lower(), -1.0);
        // Full period saturates.
        let w = Interval::new(0.0, 7.0);
        assert_eq!(w.sin(), Interval::unit());
    }

    #[test]
    fn cosine_extrema() {
        let i = Interval::new(-0.5, 0.5);
        assert_eq!(i.cos().upper(), 1.0);
        let j = Interval::new(3.0, 3.3);
        assert_eq!(j.cos().lower(), -1.0);
    }

    #[test]
    fn error_bound_only_grows() {
        let e = ErrorBound::zero();
        let e = e.add_abs(1e-30).add_abs(-1e-30);
        assert!(e.get() >= 2e-30);
        let big = ErrorBound::new(1.0).add(ErrorBound::new(f64::EPSILON / 4.0));
        assert!(big.get() > 1.0);
    }

    #[test]
    fn ball_round_trip_contains() {
        let i = Interval::new(0.1, 0.7);
        let b = Ball::from_interval(&i);
        assert!(i.refines(&b.as_interval()));
    }

    #[test]
    fn box_split_and_refines() {
        let b = IntervalBox::new(vec![Interval::new(0.0, 4.0), Interval::new(-1.0, 1.0)]);
        let (lo, hi) = b.split(0);
        assert!(lo.refines(&b) && hi.refines(&b));
        assert_eq!(lo[0].upper(), 2.0);
        assert_eq!(b.widest_dimension(), 0);
        assert!(lo.hull(&hi).refines(&b) && b.refines(&lo.hull(&hi)));
    }
}
