//! Constrained sets: boxes intersected with nonlinear inequalities
//!
//! A [`ConstraintSet`] is a bounded box domain intersected with finitely
//! many symbolic constraints `cⱼ(x) ≤ 0`. It is the form in which initial
//! sets and safe sets enter the analyser. All queries are three-valued
//! where exactness is impossible: a definite answer is a proof (backed by
//! interval evaluation, possibly after branch-and-prune splitting), and
//! `Unknown` is always a safe fallback. An infeasible region is a normal
//! outcome of a query, never an error.

use crate::function::Expr;
use crate::interval::{Interval, IntervalBox};

/// Three-valued feasibility verdict.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Feasibility {
    /// A feasible point was verified.
    Feasible,
    /// The feasible region is provably empty.
    Infeasible,
    /// Neither could be established at the given effort.
    Unknown,
}

/// Classification of a box against a set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BoxPosition {
    /// The box is provably contained in the set.
    Inside,
    /// The box is provably disjoint from the set.
    Outside,
    /// Neither containment nor disjointness was proven.
    Overlapping,
}

/// A box domain intersected with `cⱼ(x) ≤ 0` constraints.
#[derive(Clone, Debug)]
pub struct ConstraintSet {
    domain: IntervalBox,
    constraints: Vec<Expr>,
}

impl ConstraintSet {
    /// A plain box (no constraints).
    pub fn from_box(domain: IntervalBox) -> Self {
        ConstraintSet { domain, constraints: Vec::new() }
    }

    /// A box intersected with the given constraints.
    pub fn new(domain: IntervalBox, constraints: Vec<Expr>) -> Self {
        ConstraintSet { domain, constraints }
    }

    /// The bounding domain.
    pub fn domain(&self) -> &IntervalBox {
        &self.domain
    }

    /// The constraint expressions (`≤ 0` each).
    pub fn constraints(&self) -> &[Expr] {
        &self.constraints
    }

    /// State dimension.
    pub fn dimension(&self) -> usize {
        self.domain.dimension()
    }

    /// Signs of all constraints over a box: `Inside` when every
    /// constraint is provably non-positive, `Outside` when some
    /// constraint is provably positive (or the box misses the domain).
    /// Evaluation failures (a constraint leaving its mathematical domain
    /// on this box) conservatively yield `Overlapping`.
    pub fn classify(&self, b: &IntervalBox) -> BoxPosition {
        if !b.intersects(&self.domain) {
            return BoxPosition::Outside;
        }
        let mut inside = b.refines(&self.domain);
        for c in &self.constraints {
            match c.eval(b.as_slice()) {
                Ok(v) => {
                    if v.lower() > 0.0 {
                        return BoxPosition::Outside;
                    }
                    if v.upper() > 0.0 {
                        inside = false;
                    }
                }
                Err(_) => inside = false,
            }
        }
        if inside {
            BoxPosition::Inside
        } else {
            BoxPosition::Overlapping
        }
    }

    /// Proof that `b` is contained in the set.
    pub fn contains_box(&self, b: &IntervalBox) -> bool {
        self.classify(b) == BoxPosition::Inside
    }

    /// Branch-and-prune proof that the set's intersection with `b` is
    /// empty. Splitting always bisects the widest direction; `depth`
    /// bounds the number of bisections along any branch.
    pub fn disjoint_from_box(&self, b: &IntervalBox, depth: u32) -> bool {
        let cut = b.intersection(&self.domain);
        if cut.is_empty() {
            return true;
        }
        match self.classify(&cut) {
            BoxPosition::Outside => true,
            BoxPosition::Inside => false,
            BoxPosition::Overlapping => {
                if depth == 0 {
                    return false;
                }
                let (lo, hi) = cut.split(cut.widest_dimension());
                self.disjoint_from_box(&lo, depth - 1) && self.disjoint_from_box(&hi, depth - 1)
            }
        }
    }

    /// Three-valued feasibility of the whole set. `Feasible` is
    /// certified by interval evaluation at a midpoint; `Infeasible` by
    /// exhausting a branch-and-prune search.
    pub fn feasibility(&self, depth: u32) -> Feasibility {
        self.feasibility_within(&self.domain.clone(), depth)
    }

    fn feasibility_within(&self, b: &IntervalBox, depth: u32) -> Feasibility {
        match self.classify(b) {
            BoxPosition::Outside => return Feasibility::Infeasible,
            BoxPosition::Inside => return Feasibility::Feasible,
            BoxPosition::Overlapping => {}
        }
        // A certified point suffices for feasibility.
        let mid = IntervalBox::new(b.midpoint().iter().map(|&m| Interval::point(m)).collect());
        if self.classify(&mid) == BoxPosition::Inside {
            return Feasibility::Feasible;
        }
        if depth == 0 {
            return Feasibility::Unknown;
        }
        let (lo, hi) = b.split(b.widest_dimension());
        match self.feasibility_within(&lo, depth - 1) {
            Feasibility::Feasible => Feasibility::Feasible,
            Feasibility::Infeasible => match self.feasibility_within(&hi, depth - 1) {
                Feasibility::Feasible => Feasibility::Feasible,
                Feasibility::Infeasible => Feasibility::Infeasible,
                Feasibility::Unknown => Feasibility::Unknown,
            },
            Feasibility::Unknown => match self.feasibility_within(&hi, depth - 1) {
                Feasibility::Feasible => Feasibility::Feasible,
                _ => Feasibility::Unknown,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_disc() -> ConstraintSet {
        // x² + y² − 1 ≤ 0 on [−2,2]².
        let c = Expr::var(0).powi(2) + Expr::var(1).powi(2) - 1.0;
        ConstraintSet::new(
            IntervalBox::new(vec![Interval::new(-2.0, 2.0), Interval::new(-2.0, 2.0)]),
            vec![c],
        )
    }

    fn bx(x0: f64, x1: f64, y0: f64, y1: f64) -> IntervalBox {
        IntervalBox::new(vec![Interval::new(x0, x1), Interval::new(y0, y1)])
    }

    #[test]
    fn classification_of_disc_boxes() {
        let s = unit_disc();
        assert_eq!(s.classify(&bx(-0.3, 0.3, -0.3, 0.3)), BoxPosition::Inside);
        assert_eq!(s.classify(&bx(1.2, 1.5, 1.2, 1.5)), BoxPosition::Outside);
        assert_eq!(s.classify(&bx(0.5, 1.1, -0.2, 0.2)), BoxPosition::Overlapping);
        // Outside the domain box entirely.
        assert_eq!(s.classify(&bx(3.0, 4.0, 0.0, 1.0)), BoxPosition::Outside);
    }

    #[test]
    fn disjointness_needs_splitting_near_the_corner() {
        let s = unit_disc();
        // The box [0.8,1.0]×[0.8,1.0] misses the disc (0.8² + 0.8² > 1)
        // but plain interval evaluation sees [1.28−1.0, 2.0−1.0]... the
        // lower corner 0.8,0.8 gives 1.28 > 1, so no splitting is needed.
        assert!(s.disjoint_from_box(&bx(0.8, 1.0, 0.8, 1.0), 0));
        // [0.6,1.0]² straddles the circle; disjointness must fail.
        assert!(!s.disjoint_from_box(&bx(0.6, 1.0, 0.6, 1.0), 6));
        // A thin sliver just outside the circle needs a few splits.
        assert!(s.disjoint_from_box(&bx(0.95, 1.2, 0.4, 0.6), 6));
    }

    #[test]
    fn feasibility_three_ways() {
        let s = unit_disc();
        assert_eq!(s.feasibility(4), Feasibility::Feasible);
        // Disc shifted out of its own domain: x² + y² ≤ −1 is empty.
        let empty = ConstraintSet::new(
            bx(-1.0, 1.0, -1.0, 1.0),
            vec![Expr::var(0).powi(2) + Expr::var(1).powi(2) + 1.0],
        );
        assert_eq!(empty.feasibility(4), Feasibility::Infeasible);
    }

    #[test]
    fn plain_box_set_is_its_own_domain() {
        let s = ConstraintSet::from_box(bx(0.0, 1.0, 0.0, 1.0));
        assert_eq!(s.classify(&bx(0.2, 0.8, 0.2, 0.8)), BoxPosition::Inside);
        assert!(s.disjoint_from_box(&bx(2.0, 3.0, 2.0, 3.0), 0));
        assert_eq!(s.feasibility(0), Feasibility::Feasible);
    }
}
