//! Taylor coefficient series of the elementary functions
//!
//! For an analytic `f` and an interval `c`, [`taylor_coefficients`]
//! returns enclosures of `tₖ = f⁽ᵏ⁾(c)/k!` for `k = 0..=n`, computed by
//! per-function recurrences in interval arithmetic. Evaluated at a point
//! interval the result is a tight series; evaluated over a whole range it
//! encloses the coefficient at *every* point of the range, which is
//! exactly the Lagrange-remainder bound the Taylor-model layer needs
//! (the `n+1`-st coefficient over the range bounds the truncation tail).

use crate::interval::{DomainError, Interval};

/// The closed set of analytic operations with series support.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AnalyticOp {
    /// Reciprocal `1/x`.
    Rec,
    /// Square root.
    Sqrt,
    /// Exponential.
    Exp,
    /// Natural logarithm.
    Log,
    /// Sine.
    Sin,
    /// Cosine.
    Cos,
    /// Arctangent.
    Atan,
}

/// Enclosures of the Taylor coefficients `f⁽ᵏ⁾(c)/k!`, `k = 0..=n`.
pub fn taylor_coefficients(
    op: AnalyticOp,
    c: &Interval,
    n: usize,
) -> Result<Vec<Interval>, DomainError> {
    let mut t = Vec::with_capacity(n + 1);
    match op {
        AnalyticOp::Rec => {
            // tₖ = (−1)ᵏ / c^{k+1}
            let inv = c.recip()?;
            let mut p = inv;
            t.push(p);
            for _ in 1..=n {
                p = p.mul(&inv).neg();
                t.push(p);
            }
        }
        AnalyticOp::Sqrt => {
            if c.lower() <= 0.0 {
                return Err(DomainError::SqrtNegative(c.lower()));
            }
            // tₖ = tₖ₋₁ · (3/2 − k) / (k·c)
            let mut p = c.sqrt()?;
            t.push(p);
            for k in 1..=n {
                let factor = Interval::point(1.5 - k as f64)
                    .div(&Interval::point(k as f64).mul(c))?;
                p = p.mul(&factor);
                t.push(p);
            }
        }
        AnalyticOp::Exp => {
            // tₖ = tₖ₋₁ / k
            let mut p = c.exp();
            t.push(p);
            for k in 1..=n {
                p = p.div(&Interval::point(k as f64))?;
                t.push(p);
            }
        }
        AnalyticOp::Log => {
            // tₖ = (−1)^{k+1} / (k·cᵏ)
            t.push(c.log()?);
            let inv = c.recip()?;
            let mut p = inv;
            for k in 1..=n {
                t.push(p.div(&Interval::point(k as f64))?);
                p = p.mul(&inv).neg();
            }
        }
        AnalyticOp::Sin | AnalyticOp::Cos => {
            // Derivatives cycle through ±sin, ±cos; divide by k!.
            let (s, co) = (c.sin(), c.cos());
            let cycle = if op == AnalyticOp::Sin {
                [s, co, s.neg(), co.neg()]
            } else {
                [co, s.neg(), co.neg(), s]
            };
            let mut fact = Interval::point(1.0);
            for k in 0..=n {
                if k > 0 {
                    fact = fact.mul(&Interval::point(k as f64));
                }
                t.push(cycle[k % 4].div(&fact)?);
            }
        }
        AnalyticOp::Atan => {
            // atan(c+s) = atan(c) + Σ rₖ₋₁ sᵏ/k with r the series of
            // 1/(q + 2cs + s²), q = 1 + c²: rⱼ = −(2c·rⱼ₋₁ + rⱼ₋₂)/q.
            t.push(c.atan());
            if n >= 1 {
                let q = c.square().add(&Interval::point(1.0));
                let two_c = c.scale(2.0);
                let mut r_prev2 = Interval::point(0.0);
                let mut r_prev = Interval::point(1.0).div(&q)?;
                t.push(r_prev);
                for k in 2..=n {
                    let r = two_c.mul(&r_prev).add(&r_prev2).neg().div(&q)?;
                    t.push(r.div(&Interval::point(k as f64))?);
                    r_prev2 = r_prev;
                    r_prev = r;
                }
            }
        }
    }
    Ok(t)
}

/// Enclosure of the `n+1`-st Taylor coefficient over the whole `range`:
/// the Lagrange form of the series remainder at order `n`.
pub fn lagrange_tail(
    op: AnalyticOp,
    range: &Interval,
    n: usize,
) -> Result<Interval, DomainError> {
    let coeffs = taylor_coefficients(op, range, n + 1)?;
    Ok(*coeffs.last().expect("n + 2 coefficients were requested"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_series_matches_factorials() {
        let t = taylor_coefficients(AnalyticOp::Exp, &Interval::point(0.0), 5).unwrap();
        assert!(t[0].contains(1.0));
        assert!(t[3].contains(1.0 / 6.0));
        assert!(t[5].contains(1.0 / 120.0));
    }

    #[test]
    fn log_series_alternates() {
        let t = taylor_coefficients(AnalyticOp::Log, &Interval::point(1.0), 4).unwrap();
        assert!(t[0].contains(0.0));
        assert!(t[1].contains(1.0));
        assert!(t[2].contains(-0.5));
        assert!(t[3].contains(1.0 / 3.0));
        assert!(t[4].contains(-0.25));
        assert!(taylor_coefficients(AnalyticOp::Log, &Interval::new(-1.0, 2.0), 2).is_err());
    }

    #[test]
    fn atan_series_at_zero_is_odd() {
        let t = taylor_coefficients(AnalyticOp::Atan, &Interval::point(0.0), 5).unwrap();
        assert!(t[0].contains(0.0));
        assert!(t[1].contains(1.0));
        assert!(t[2].contains(0.0));
        assert!(t[3].contains(-1.0 / 3.0));
        assert!(t[5].contains(0.2));
    }

    #[test]
    fn sin_series_at_zero() {
        let t = taylor_coefficients(AnalyticOp::Sin, &Interval::point(0.0), 4).unwrap();
        assert!(t[1].contains(1.0));
        assert!(t[2].contains(0.0));
        assert!(t[3].contains(-1.0 / 6.0));
    }

    #[test]
    fn tail_over_range_encloses_pointwise_coefficients() {
        let range = Interval::new(0.5, 2.0);
        let tail = lagrange_tail(AnalyticOp::Rec, &range, 2).unwrap();
        // t₃(x) = −1/x⁴; over [0.5, 2] that spans [−16, −1/16].
        assert!(tail.contains(-16.0));
        assert!(tail.contains(-1.0 / 16.0));
    }

    #[test]
    fn sqrt_series_on_positive_interval() {
        let t = taylor_coefficients(AnalyticOp::Sqrt, &Interval::point(4.0), 2).unwrap();
        assert!(t[0].contains(2.0));
        assert!(t[1].contains(0.25));
        assert!(t[2].contains(-1.0 / 64.0));
    }
}
