//! Directed-rounding floating-point primitives
//!
//! Every arithmetic operation in this module takes an explicit [`Rounding`]
//! direction and guarantees that the exact real result lies on the requested
//! side of the returned double. Nothing here consults (or mutates) the
//! process-global rounding mode: direction is an *argument*, so the layers
//! above can mix directions freely inside a single expression.
//!
//! ## How directed results are obtained
//!
//! - For `+`, `−`, `×` we compute the round-to-nearest result together with
//!   its exact residual via error-free transforms (two-sum, FMA two-product)
//!   and step one ulp when the residual lands on the wrong side.
//! - For `÷` and `√` the residual test compares `q·b` (resp. `s·s`) against
//!   the dividend (radicand) with an exact FMA.
//! - Transcendentals delegate to `pxfm`'s correctly-rounded routines; a
//!   correctly-rounded nearest value brackets the true result strictly
//!   between its two ulp neighbours, so a one-ulp outward nudge is sound.
//!
//! ## Failure semantics
//!
//! NaN is never returned silently: operations whose mathematical domain is
//! violated (log of a non-positive value, square root of a negative value)
//! fail with [`DomainError`]. Overflow saturates to the largest finite double
//! on the inward side and to infinity on the outward side.
//!
//! [`FloatMP`] is the multi-limb companion type: a non-overlapping expansion
//! of doubles on which `+`, `−`, `×` are *exact*, with directed rounding
//! applied only when collapsing back to a double. It is the in-crate
//! reference for the rounding-soundness tests and the scratch type for any
//! computation that must out-precision the hardware.

use thiserror::Error;

/// Rounding direction, always passed explicitly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rounding {
    /// Toward −∞: the returned value never exceeds the exact result.
    Down,
    /// To nearest, ties to even.
    Near,
    /// Toward +∞: the returned value is never below the exact result.
    Up,
}

/// Arithmetic outside its mathematical domain.
///
/// These are the only conditions under which the float and interval layers
/// refuse to produce a result; see the crate root for the fail-fast policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// Logarithm of a non-positive value.
    #[error("logarithm of non-positive value {0}")]
    LogNonPositive(f64),
    /// Square root of a negative value.
    #[error("square root of negative value {0}")]
    SqrtNegative(f64),
    /// Division by an interval straddling zero.
    #[error("division by interval [{0}, {1}] containing zero")]
    DivisorStraddlesZero(f64, f64),
    /// An operation would have produced NaN from non-NaN inputs.
    #[error("operation on {0} and {1} produced NaN")]
    NanProduced(f64, f64),
}

// ---------------------------------------------------------------------------
// Ulp stepping
// ---------------------------------------------------------------------------

/// Next double strictly above `x` (`MAX` ↦ `+∞`, `-0.0`/`0.0` ↦ smallest
/// positive subnormal).
#[inline]
pub fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Next double strictly below `x`.
#[inline]
pub fn next_down(x: f64) -> f64 {
    if x.is_nan() || x == f64::NEG_INFINITY {
        return x;
    }
    if x == 0.0 {
        return -f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits - 1)
    } else {
        f64::from_bits(bits + 1)
    }
}

// ---------------------------------------------------------------------------
// Error-free transforms
// ---------------------------------------------------------------------------

/// Knuth two-sum: returns `(s, e)` with `s = fl(a+b)` and `a + b = s + e`
/// exactly, for any finite `a`, `b`.
#[inline]
pub fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bv = s - a;
    let e = (a - (s - bv)) + (b - bv);
    (s, e)
}

/// FMA two-product: returns `(p, e)` with `p = fl(a·b)` and `a · b = p + e`
/// exactly, provided `p` is normal.
#[inline]
pub fn two_prod(a: f64, b: f64) -> (f64, f64) {
    let p = a * b;
    let e = a.mul_add(b, -p);
    (p, e)
}

/// Nudge the nearest-rounded value `s` with exact residual `e` into the
/// requested direction. With `e == 0` the result was exact and is returned
/// as-is, except in the subnormal range where the residual itself may have
/// underflowed and we widen unconditionally.
#[inline]
fn directed_from_residual(s: f64, e: f64, rnd: Rounding, possibly_inexact_zero: bool) -> f64 {
    match rnd {
        Rounding::Near => s,
        Rounding::Down => {
            if e < 0.0 || (e == 0.0 && possibly_inexact_zero) {
                next_down(s)
            } else {
                s
            }
        }
        Rounding::Up => {
            if e > 0.0 || (e == 0.0 && possibly_inexact_zero) {
                next_up(s)
            } else {
                s
            }
        }
    }
}

/// Saturate an overflowed nearest result to the inward side.
#[inline]
fn fixup_overflow(s: f64, rnd: Rounding) -> f64 {
    match (s == f64::INFINITY, rnd) {
        (true, Rounding::Down) => f64::MAX,
        (false, Rounding::Up) => f64::MIN,
        _ => s,
    }
}

// ---------------------------------------------------------------------------
// Directed arithmetic on doubles
// ---------------------------------------------------------------------------

/// `a + b` rounded in direction `rnd`.
#[inline]
pub fn add_rnd(a: f64, b: f64, rnd: Rounding) -> f64 {
    let (s, e) = two_sum(a, b);
    if s.is_infinite() && a.is_finite() && b.is_finite() {
        return fixup_overflow(s, rnd);
    }
    // Addition residuals are always representable, no underflow caveat.
    directed_from_residual(s, e, rnd, false)
}

/// `a − b` rounded in direction `rnd`.
#[inline]
pub fn sub_rnd(a: f64, b: f64, rnd: Rounding) -> f64 {
    add_rnd(a, -b, rnd)
}

/// `a · b` rounded in direction `rnd`.
#[inline]
pub fn mul_rnd(a: f64, b: f64, rnd: Rounding) -> f64 {
    let (p, e) = two_prod(a, b);
    if p.is_infinite() && a.is_finite() && b.is_finite() {
        return fixup_overflow(p, rnd);
    }
    // The FMA residual underflows when p is subnormal; widen in that case.
    let subnormal = p != 0.0 && p.abs() < f64::MIN_POSITIVE;
    directed_from_residual(p, e, rnd, subnormal && e == 0.0)
}

/// `a / b` rounded in direction `rnd`. Division by zero keeps IEEE
/// semantics for the infinite quotient; `0/0` is a NaN domain failure at the
/// interval layer, which never calls through with that pair.
#[inline]
pub fn div_rnd(a: f64, b: f64, rnd: Rounding) -> f64 {
    let q = a / b;
    if !q.is_finite() {
        if q.is_infinite() && a.is_finite() && b != 0.0 {
            return fixup_overflow(q, rnd);
        }
        return q;
    }
    // r = a − q·b exactly; the true quotient is q + r/b.
    let r = q.mul_add(-b, a);
    let e = if b > 0.0 { r } else { -r };
    let subnormal = q != 0.0 && q.abs() < f64::MIN_POSITIVE;
    directed_from_residual(q, e, rnd, subnormal && e == 0.0)
}

/// `√a` rounded in direction `rnd`. Fails on negative input.
#[inline]
pub fn sqrt_rnd(a: f64, rnd: Rounding) -> Result<f64, DomainError> {
    if a < 0.0 {
        return Err(DomainError::SqrtNegative(a));
    }
    if a == 0.0 {
        return Ok(0.0);
    }
    let s = a.sqrt();
    // r = a − s² exactly; true root is above s iff a > s².
    let r = s.mul_add(-s, a);
    Ok(directed_from_residual(s, r, rnd, false))
}

// ---------------------------------------------------------------------------
// Directed transcendentals (correctly rounded core + one-ulp nudge)
// ---------------------------------------------------------------------------

/// Outward nudge off a correctly-rounded nearest value. Exact anchors
/// (`exp 0 = 1`, `sin 0 = 0`, ...) are handled by the callers so that the
/// nudge never loosens a value that is exactly representable.
#[inline]
fn nudge(r: f64, rnd: Rounding) -> f64 {
    match rnd {
        Rounding::Near => r,
        Rounding::Down => next_down(r),
        Rounding::Up => next_up(r),
    }
}

/// `exp(x)` rounded in direction `rnd`.
#[inline]
pub fn exp_rnd(x: f64, rnd: Rounding) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    let r = pxfm::f_exp(x);
    if r.is_infinite() {
        return fixup_overflow(r, rnd);
    }
    let r = nudge(r, rnd);
    // exp is positive; a downward nudge below zero would be spurious.
    if rnd == Rounding::Down && r <= 0.0 {
        0.0
    } else {
        r
    }
}

/// `log(x)` rounded in direction `rnd`. Fails on non-positive input.
#[inline]
pub fn log_rnd(x: f64, rnd: Rounding) -> Result<f64, DomainError> {
    if x <= 0.0 {
        return Err(DomainError::LogNonPositive(x));
    }
    if x == 1.0 {
        return Ok(0.0);
    }
    Ok(nudge(pxfm::f_log(x), rnd))
}

/// `sin(x)` rounded in direction `rnd`, clamped to [-1, 1].
#[inline]
pub fn sin_rnd(x: f64, rnd: Rounding) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    nudge(pxfm::f_sin(x), rnd).clamp(-1.0, 1.0)
}

/// `cos(x)` rounded in direction `rnd`, clamped to [-1, 1].
#[inline]
pub fn cos_rnd(x: f64, rnd: Rounding) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    nudge(pxfm::f_cos(x), rnd).clamp(-1.0, 1.0)
}

/// `atan(x)` rounded in direction `rnd`.
#[inline]
pub fn atan_rnd(x: f64, rnd: Rounding) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    nudge(pxfm::f_atan(x), rnd)
}

/// π rounded in direction `rnd`. The nearest double lies strictly below π,
/// so the downward value is the constant itself.
#[inline]
pub fn pi_rnd(rnd: Rounding) -> f64 {
    match rnd {
        Rounding::Down | Rounding::Near => std::f64::consts::PI,
        Rounding::Up => next_up(std::f64::consts::PI),
    }
}

// ---------------------------------------------------------------------------
// FloatMP: exact multi-limb floats
// ---------------------------------------------------------------------------

/// A precision-tagged multi-limb float: a non-overlapping expansion of
/// doubles in decreasing magnitude whose mathematical value is the exact sum
/// of its limbs.
///
/// Addition, subtraction and multiplication are exact (the precision tag
/// only bounds how many limbs survive compression); division and square
/// root are correct to the precision tag with a directed final rounding.
/// `to_f64` rounds the exact value in the requested direction, which is what
/// makes this type usable as the reference side of the rounding-soundness
/// tests.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatMP {
    /// Non-overlapping limbs, largest magnitude first. Empty means zero.
    limbs: Vec<f64>,
    /// Maximum number of limbs kept after compression (≥ 2).
    prec_limbs: usize,
}

impl FloatMP {
    /// Construct from a double at the given precision in bits (rounded up to
    /// whole 53-bit limbs, minimum two limbs).
    pub fn with_precision(x: f64, bits: u32) -> Self {
        let prec_limbs = ((bits as usize).div_ceil(53)).max(2);
        let limbs = if x == 0.0 { Vec::new() } else { vec![x] };
        FloatMP { limbs, prec_limbs }
    }

    /// Construct from a double at the default oracle precision (212 bits).
    pub fn from_f64(x: f64) -> Self {
        Self::with_precision(x, 212)
    }

    /// Precision tag in bits.
    pub fn precision_bits(&self) -> u32 {
        (self.prec_limbs * 53) as u32
    }

    /// True when the exact value is zero.
    pub fn is_zero(&self) -> bool {
        self.limbs.is_empty()
    }

    /// Grow-expansion: add a single double into the expansion, exactly.
    fn grow(&mut self, x: f64) {
        if x == 0.0 {
            return;
        }
        let mut q = x;
        let mut out = Vec::with_capacity(self.limbs.len() + 1);
        // Accumulate from the smallest limb upward so residues cascade.
        for &limb in self.limbs.iter().rev() {
            let (s, e) = two_sum(q, limb);
            if e != 0.0 {
                out.push(e);
            }
            q = s;
        }
        if q != 0.0 {
            out.push(q);
        }
        out.reverse();
        self.limbs = out;
    }

    /// Renormalise to non-overlapping limbs and drop to the precision tag.
    /// Dropping is the only inexact step and is deferred to `compressed`
    /// callers that tolerate it; plain arithmetic keeps every limb.
    fn renormalize(&mut self) {
        let mut limbs = std::mem::take(&mut self.limbs);
        limbs.retain(|l| *l != 0.0);
        limbs.sort_by(|a, b| b.abs().partial_cmp(&a.abs()).expect("finite limbs"));
        let mut acc = FloatMP { limbs: Vec::new(), prec_limbs: self.prec_limbs };
        for l in limbs {
            acc.grow(l);
        }
        self.limbs = acc.limbs;
    }

    /// Exact sum.
    pub fn add(&self, other: &FloatMP) -> FloatMP {
        let mut r = self.clone();
        for &l in &other.limbs {
            r.grow(l);
        }
        r.renormalize();
        r
    }

    /// Exact negation.
    pub fn neg(&self) -> FloatMP {
        FloatMP {
            limbs: self.limbs.iter().map(|l| -l).collect(),
            prec_limbs: self.prec_limbs,
        }
    }

    /// Exact difference.
    pub fn sub(&self, other: &FloatMP) -> FloatMP {
        self.add(&other.neg())
    }

    /// Exact product (limb-pairwise FMA two-products, summed exactly).
    pub fn mul(&self, other: &FloatMP) -> FloatMP {
        let mut r = FloatMP { limbs: Vec::new(), prec_limbs: self.prec_limbs.max(other.prec_limbs) };
        for &a in &self.limbs {
            for &b in &other.limbs {
                let (p, e) = two_prod(a, b);
                r.grow(p);
                r.grow(e);
            }
        }
        r.renormalize();
        r
    }

    /// Quotient, correct to the precision tag. The final limb is a directed
    /// correction so that `to_f64` stays sound for the requested direction.
    pub fn div(&self, other: &FloatMP) -> Result<FloatMP, DomainError> {
        let bh = other.leading();
        if bh == 0.0 {
            return Err(DomainError::DivisorStraddlesZero(0.0, 0.0));
        }
        let mut q = FloatMP { limbs: Vec::new(), prec_limbs: self.prec_limbs.max(other.prec_limbs) };
        let mut rem = self.clone();
        for _ in 0..q.prec_limbs + 1 {
            let qi = rem.leading() / bh;
            if qi == 0.0 {
                break;
            }
            q.grow(qi);
            let step = other.mul(&FloatMP::with_precision(qi, 106));
            rem = rem.sub(&step);
        }
        q.renormalize();
        Ok(q)
    }

    /// Square root, correct to the precision tag via Newton refinement on
    /// the exact residual. Fails on a negative value.
    pub fn sqrt(&self) -> Result<FloatMP, DomainError> {
        let lead = self.leading();
        if lead < 0.0 {
            return Err(DomainError::SqrtNegative(lead));
        }
        if self.is_zero() {
            return Ok(self.clone());
        }
        let mut s = FloatMP::with_precision(lead.sqrt(), self.precision_bits());
        for _ in 0..self.prec_limbs + 1 {
            // s ← s + (a − s²) / (2s)
            let resid = self.sub(&s.mul(&s));
            if resid.is_zero() {
                break;
            }
            let denom = s.add(&s);
            let corr = resid.div(&denom)?;
            s = s.add(&corr);
        }
        s.renormalize();
        Ok(s)
    }

    /// Leading (largest-magnitude) limb, 0 for zero.
    pub fn leading(&self) -> f64 {
        self.limbs.first().copied().unwrap_or(0.0)
    }

    /// Sign of the exact value: -1, 0, or 1.
    pub fn signum(&self) -> i32 {
        let l = self.leading();
        if l > 0.0 {
            1
        } else if l < 0.0 {
            -1
        } else {
            0
        }
    }

    /// Sign of `value − x`, computed exactly.
    pub fn cmp_f64(&self, x: f64) -> i32 {
        self.sub(&FloatMP::from_f64(x)).signum()
    }

    /// Round the exact value to a double in the requested direction. The
    /// directed modes are exact: an approximate collapse is corrected by
    /// ulp steps until the exact comparison lands on the right side.
    pub fn to_f64(&self, rnd: Rounding) -> f64 {
        if self.limbs.is_empty() {
            return 0.0;
        }
        let mut approx = 0.0f64;
        for &l in self.limbs.iter().rev() {
            approx += l;
        }
        match rnd {
            Rounding::Near => approx,
            Rounding::Down => {
                let mut c = approx;
                while self.cmp_f64(c) < 0 {
                    c = next_down(c);
                }
                while c < f64::MAX && self.cmp_f64(next_up(c)) >= 0 {
                    c = next_up(c);
                }
                c
            }
            Rounding::Up => {
                let mut c = approx;
                while self.cmp_f64(c) > 0 {
                    c = next_up(c);
                }
                while c > f64::MIN && self.cmp_f64(next_down(c)) <= 0 {
                    c = next_down(c);
                }
                c
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sample(rng: &mut StdRng) -> f64 {
        // Mix magnitudes so residual paths and ulp steps all get exercised.
        let m: f64 = rng.gen_range(-1.0..1.0);
        let e: i32 = rng.gen_range(-40..40);
        m * (2.0f64).powi(e)
    }

    #[test]
    fn directed_add_brackets_exact_sum() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let (a, b) = (sample(&mut rng), sample(&mut rng));
            let exact = FloatMP::from_f64(a).add(&FloatMP::from_f64(b));
            let lo = add_rnd(a, b, Rounding::Down);
            let hi = add_rnd(a, b, Rounding::Up);
            assert!(exact.sub(&FloatMP::from_f64(lo)).signum() >= 0, "{a} + {b}: {lo} too high");
            assert!(FloatMP::from_f64(hi).sub(&exact).signum() >= 0, "{a} + {b}: {hi} too low");
            assert!(lo <= add_rnd(a, b, Rounding::Near));
            assert!(add_rnd(a, b, Rounding::Near) <= hi);
        }
    }

    #[test]
    fn directed_mul_brackets_exact_product() {
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..2000 {
            let (a, b) = (sample(&mut rng), sample(&mut rng));
            let exact = FloatMP::from_f64(a).mul(&FloatMP::from_f64(b));
            let lo = mul_rnd(a, b, Rounding::Down);
            let hi = mul_rnd(a, b, Rounding::Up);
            assert!(exact.sub(&FloatMP::from_f64(lo)).signum() >= 0);
            assert!(FloatMP::from_f64(hi).sub(&exact).signum() >= 0);
        }
    }

    #[test]
    fn directed_div_brackets_true_quotient() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..2000 {
            let a = sample(&mut rng);
            let mut b = sample(&mut rng);
            if b == 0.0 {
                b = 1.0;
            }
            let lo = div_rnd(a, b, Rounding::Down);
            let hi = div_rnd(a, b, Rounding::Up);
            // lo ≤ a/b ⇔ lo·b ≤ a (b > 0), with the exact check done in MP.
            let lo_back = FloatMP::from_f64(lo).mul(&FloatMP::from_f64(b));
            let hi_back = FloatMP::from_f64(hi).mul(&FloatMP::from_f64(b));
            let a_mp = FloatMP::from_f64(a);
            if b > 0.0 {
                assert!(a_mp.sub(&lo_back).signum() >= 0, "{a} / {b}");
                assert!(hi_back.sub(&a_mp).signum() >= 0, "{a} / {b}");
            } else {
                assert!(lo_back.sub(&a_mp).signum() >= 0, "{a} / {b}");
                assert!(a_mp.sub(&hi_back).signum() >= 0, "{a} / {b}");
            }
        }
    }

    #[test]
    fn directed_sqrt_brackets_true_root() {
        let mut rng = StdRng::seed_from_u64(10);
        for _ in 0..2000 {
            let a = sample(&mut rng).abs();
            let lo = sqrt_rnd(a, Rounding::Down).unwrap();
            let hi = sqrt_rnd(a, Rounding::Up).unwrap();
            let a_mp = FloatMP::from_f64(a);
            assert!(a_mp.sub(&FloatMP::from_f64(lo).mul(&FloatMP::from_f64(lo))).signum() >= 0);
            assert!(FloatMP::from_f64(hi).mul(&FloatMP::from_f64(hi)).sub(&a_mp).signum() >= 0);
        }
        assert!(sqrt_rnd(-1.0, Rounding::Near).is_err());
    }

    #[test]
    fn transcendental_nudges_are_ordered() {
        for &x in &[0.5, 1.0, -2.25, 10.0, -0.001] {
            assert!(exp_rnd(x, Rounding::Down) < exp_rnd(x, Rounding::Up));
            assert!(sin_rnd(x, Rounding::Down) <= sin_rnd(x, Rounding::Up));
            assert!(cos_rnd(x, Rounding::Down) <= cos_rnd(x, Rounding::Up));
            assert!(atan_rnd(x, Rounding::Down) < atan_rnd(x, Rounding::Up));
        }
        assert_eq!(exp_rnd(0.0, Rounding::Down), 1.0);
        assert_eq!(sin_rnd(0.0, Rounding::Up), 0.0);
        assert!(log_rnd(0.0, Rounding::Near).is_err());
        assert!(log_rnd(-3.0, Rounding::Near).is_err());
        assert_eq!(log_rnd(1.0, Rounding::Up).unwrap(), 0.0);
    }

    #[test]
    fn pi_brackets_the_constant() {
        // The nearest double is known to sit below π.
        assert!(pi_rnd(Rounding::Down) < pi_rnd(Rounding::Up));
        assert_eq!(pi_rnd(Rounding::Down), std::f64::consts::PI);
    }

    #[test]
    fn overflow_saturates_inward() {
        assert_eq!(add_rnd(f64::MAX, f64::MAX, Rounding::Down), f64::MAX);
        assert_eq!(add_rnd(f64::MAX, f64::MAX, Rounding::Up), f64::INFINITY);
        assert_eq!(mul_rnd(-f64::MAX, 2.0, Rounding::Up), f64::MIN);
        assert_eq!(mul_rnd(-f64::MAX, 2.0, Rounding::Down), f64::NEG_INFINITY);
    }

    #[test]
    fn multilimb_sum_is_exact_where_doubles_are_not() {
        // 0.1 + 0.2 ≠ 0.3 in doubles; the expansion keeps the residue.
        let a = FloatMP::from_f64(0.1);
        let b = FloatMP::from_f64(0.2);
        let s = a.add(&b);
        let nearest = s.to_f64(Rounding::Near);
        assert_eq!(nearest, 0.1 + 0.2);
        assert!(s.sub(&FloatMP::from_f64(nearest)).signum() != 0);
        assert!(s.to_f64(Rounding::Down) < s.to_f64(Rounding::Up));
    }

    #[test]
    fn multilimb_mul_recovers_residual() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let (a, b) = (sample(&mut rng), sample(&mut rng));
            let (p, e) = two_prod(a, b);
            let exact = FloatMP::from_f64(a).mul(&FloatMP::from_f64(b));
            let recon = FloatMP::from_f64(p).add(&FloatMP::from_f64(e));
            assert_eq!(exact.sub(&recon).signum(), 0);
        }
    }
}
