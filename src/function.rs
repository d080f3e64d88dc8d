//! Functions: symbolic trees, patches, and the evaluation algebra
//!
//! [`Function`] is the crate's polymorphic `n → m` map. The variant set is
//! closed — constant, coordinate projection, symbolic expression tree,
//! Taylor patch, composition — and dispatch is by `match`, not by an open
//! trait hierarchy. Children are shared through `Arc`: composition forms a
//! DAG (never a cycle, composition is strictly hierarchical) and clones
//! are cheap.
//!
//! One tree walk serves every consumer through the [`Elementary`] algebra
//! trait: evaluating on [`Interval`]s gives validated ranges, on
//! [`Differential`]s automatic differentiation (hence Jacobians), and on
//! [`TaylorModel`]s the composition step of the Picard integrator. All
//! three implementations route their arithmetic through the validated
//! layers below, so a single symbolic definition of a vector field is
//! usable across the whole engine.

use crate::differential::Differential;
use crate::interval::{DomainError, Interval, IntervalBox};
use crate::patch::{PatchError, VectorPatch};
use crate::series::{taylor_coefficients, AnalyticOp};
use crate::taylor::TaylorModel;
use std::sync::Arc;
use thiserror::Error;

/// Errors from function construction and evaluation.
#[derive(Debug, Error)]
pub enum FunctionError {
    /// Wrong number of arguments or components.
    #[error("arity mismatch: expected {expected}, got {got}")]
    Arity {
        /// Required count.
        expected: usize,
        /// Provided count.
        got: usize,
    },
    /// Numeric domain violation during evaluation.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Patch-level failure (domain containment, arity).
    #[error(transparent)]
    Patch(#[from] PatchError),
}

// ---------------------------------------------------------------------------
// The evaluation algebra
// ---------------------------------------------------------------------------

/// The capability set a type needs so the expression walker can evaluate
/// into it. Implemented by intervals (plain evaluation), differentials
/// (automatic differentiation) and Taylor models (integrator composition).
pub trait Elementary: Clone {
    /// A constant in the same algebra (`self` supplies arity context).
    fn const_like(&self, c: f64) -> Self;
    /// Sum.
    fn e_add(&self, o: &Self) -> Self;
    /// Difference.
    fn e_sub(&self, o: &Self) -> Self;
    /// Product.
    fn e_mul(&self, o: &Self) -> Self;
    /// Negation.
    fn e_neg(&self) -> Self;
    /// Quotient.
    fn e_div(&self, o: &Self) -> Result<Self, DomainError>;
    /// Integer power.
    fn e_powi(&self, n: i32) -> Result<Self, DomainError>;
    /// One of the analytic operations.
    fn e_analytic(&self, op: AnalyticOp) -> Result<Self, DomainError>;
    /// Multiply by an interval constant.
    fn mul_interval(&self, c: &Interval) -> Self;
    /// Add an interval constant.
    fn add_interval(&self, c: &Interval) -> Self;
    /// An enclosure of the values this element can take, when the algebra
    /// can produce one. Used to check patch-domain containment.
    fn range_hint(&self) -> Option<Interval>;
}

impl Elementary for Interval {
    fn const_like(&self, c: f64) -> Self {
        Interval::point(c)
    }
    fn e_add(&self, o: &Self) -> Self {
        self.add(o)
    }
    fn e_sub(&self, o: &Self) -> Self {
        self.sub(o)
    }
    fn e_mul(&self, o: &Self) -> Self {
        self.mul(o)
    }
    fn e_neg(&self) -> Self {
        self.neg()
    }
    fn e_div(&self, o: &Self) -> Result<Self, DomainError> {
        self.div(o)
    }
    fn e_powi(&self, n: i32) -> Result<Self, DomainError> {
        self.powi(n)
    }
    fn e_analytic(&self, op: AnalyticOp) -> Result<Self, DomainError> {
        match op {
            AnalyticOp::Rec => self.recip(),
            AnalyticOp::Sqrt => self.sqrt(),
            AnalyticOp::Exp => Ok(self.exp()),
            AnalyticOp::Log => self.log(),
            AnalyticOp::Sin => Ok(self.sin()),
            AnalyticOp::Cos => Ok(self.cos()),
            AnalyticOp::Atan => Ok(self.atan()),
        }
    }
    fn mul_interval(&self, c: &Interval) -> Self {
        self.mul(c)
    }
    fn add_interval(&self, c: &Interval) -> Self {
        self.add(c)
    }
    fn range_hint(&self) -> Option<Interval> {
        Some(*self)
    }
}

impl Elementary for Differential<Interval> {
    fn const_like(&self, c: f64) -> Self {
        Differential::constant(self.argument_size(), self.degree(), Interval::point(c))
    }
    fn e_add(&self, o: &Self) -> Self {
        self.add(o)
    }
    fn e_sub(&self, o: &Self) -> Self {
        self.sub(o)
    }
    fn e_mul(&self, o: &Self) -> Self {
        self.mul(o)
    }
    fn e_neg(&self) -> Self {
        self.neg()
    }
    fn e_div(&self, o: &Self) -> Result<Self, DomainError> {
        Ok(self.mul(&o.e_analytic(AnalyticOp::Rec)?))
    }
    fn e_powi(&self, n: i32) -> Result<Self, DomainError> {
        if n < 0 {
            return self.e_powi(-n)?.e_analytic(AnalyticOp::Rec);
        }
        let mut acc = self.const_like(1.0);
        for _ in 0..n {
            acc = acc.mul(self);
        }
        Ok(acc)
    }
    fn e_analytic(&self, op: AnalyticOp) -> Result<Self, DomainError> {
        // Truncated series about the value; truncation is formally sound
        // for differentials, no tail bound is needed.
        let series = taylor_coefficients(op, &self.value(), self.degree() as usize)?;
        Ok(self.compose_series(&series))
    }
    fn mul_interval(&self, c: &Interval) -> Self {
        self.scale(c)
    }
    fn add_interval(&self, c: &Interval) -> Self {
        self.add_constant(c)
    }
    fn range_hint(&self) -> Option<Interval> {
        // Jets are formal; only the value enclosure is meaningful, and it
        // is not a range bound. Decline.
        None
    }
}

impl Elementary for TaylorModel {
    fn const_like(&self, c: f64) -> Self {
        TaylorModel::constant(self.argument_size(), c)
    }
    fn e_add(&self, o: &Self) -> Self {
        self.add(o)
    }
    fn e_sub(&self, o: &Self) -> Self {
        self.sub(o)
    }
    fn e_mul(&self, o: &Self) -> Self {
        self.mul(o)
    }
    fn e_neg(&self) -> Self {
        self.neg()
    }
    fn e_div(&self, o: &Self) -> Result<Self, DomainError> {
        self.div(o)
    }
    fn e_powi(&self, n: i32) -> Result<Self, DomainError> {
        if n < 0 {
            return self.e_powi(-n)?.recip();
        }
        let mut acc = self.const_like(1.0);
        for _ in 0..n {
            acc = acc.mul(self);
        }
        Ok(acc)
    }
    fn e_analytic(&self, op: AnalyticOp) -> Result<Self, DomainError> {
        self.analytic(op)
    }
    fn mul_interval(&self, c: &Interval) -> Self {
        self.scale_interval(c)
    }
    fn add_interval(&self, c: &Interval) -> Self {
        self.add(&TaylorModel::constant_interval(self.argument_size(), c))
    }
    fn range_hint(&self) -> Option<Interval> {
        Some(self.range())
    }
}

// ---------------------------------------------------------------------------
// Symbolic expressions
// ---------------------------------------------------------------------------

/// A scalar symbolic expression over numbered variables.
#[derive(Clone, Debug)]
pub enum Expr {
    /// Literal constant.
    Const(f64),
    /// Variable by position.
    Var(usize),
    /// Negation.
    Neg(Arc<Expr>),
    /// Sum.
    Add(Arc<Expr>, Arc<Expr>),
    /// Difference.
    Sub(Arc<Expr>, Arc<Expr>),
    /// Product.
    Mul(Arc<Expr>, Arc<Expr>),
    /// Quotient.
    Div(Arc<Expr>, Arc<Expr>),
    /// Integer power.
    Pow(Arc<Expr>, i32),
    /// Analytic unary operation.
    Unary(AnalyticOp, Arc<Expr>),
}

impl Expr {
    /// The variable `x_i`.
    pub fn var(i: usize) -> Expr {
        Expr::Var(i)
    }

    /// A literal constant.
    pub fn constant(c: f64) -> Expr {
        Expr::Const(c)
    }

    /// Integer power.
    pub fn powi(self, n: i32) -> Expr {
        Expr::Pow(Arc::new(self), n)
    }

    /// Square root.
    pub fn sqrt(self) -> Expr {
        Expr::Unary(AnalyticOp::Sqrt, Arc::new(self))
    }

    /// Exponential.
    pub fn exp(self) -> Expr {
        Expr::Unary(AnalyticOp::Exp, Arc::new(self))
    }

    /// Natural logarithm.
    pub fn log(self) -> Expr {
        Expr::Unary(AnalyticOp::Log, Arc::new(self))
    }

    /// Sine.
    pub fn sin(self) -> Expr {
        Expr::Unary(AnalyticOp::Sin, Arc::new(self))
    }

    /// Cosine.
    pub fn cos(self) -> Expr {
        Expr::Unary(AnalyticOp::Cos, Arc::new(self))
    }

    /// Arctangent.
    pub fn atan(self) -> Expr {
        Expr::Unary(AnalyticOp::Atan, Arc::new(self))
    }

    /// Largest variable index used, plus one.
    pub fn max_arity(&self) -> usize {
        match self {
            Expr::Const(_) => 0,
            Expr::Var(i) => i + 1,
            Expr::Neg(a) | Expr::Pow(a, _) | Expr::Unary(_, a) => a.max_arity(),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.max_arity().max(b.max_arity())
            }
        }
    }

    /// Evaluate in any [`Elementary`] algebra. The argument list supplies
    /// both the values and the arity context for constants.
    pub fn eval<T: Elementary>(&self, args: &[T]) -> Result<T, DomainError> {
        debug_assert!(!args.is_empty(), "expression evaluation needs at least one argument");
        match self {
            Expr::Const(c) => Ok(args[0].const_like(*c)),
            Expr::Var(i) => Ok(args[*i].clone()),
            Expr::Neg(a) => Ok(a.eval(args)?.e_neg()),
            Expr::Add(a, b) => Ok(a.eval(args)?.e_add(&b.eval(args)?)),
            Expr::Sub(a, b) => Ok(a.eval(args)?.e_sub(&b.eval(args)?)),
            Expr::Mul(a, b) => Ok(a.eval(args)?.e_mul(&b.eval(args)?)),
            Expr::Div(a, b) => a.eval(args)?.e_div(&b.eval(args)?),
            Expr::Pow(a, n) => a.eval(args)?.e_powi(*n),
            Expr::Unary(op, a) => a.eval(args)?.e_analytic(*op),
        }
    }
}

macro_rules! expr_binop {
    ($trait:ident, $method:ident, $variant:ident) => {
        impl std::ops::$trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::$variant(Arc::new(self), Arc::new(rhs))
            }
        }
        impl std::ops::$trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::$variant(Arc::new(self), Arc::new(Expr::Const(rhs)))
            }
        }
        impl std::ops::$trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::$variant(Arc::new(Expr::Const(self)), Arc::new(rhs))
            }
        }
    };
}

expr_binop!(Add, add, Add);
expr_binop!(Sub, sub, Sub);
expr_binop!(Mul, mul, Mul);
expr_binop!(Div, div, Div);

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Neg(Arc::new(self))
    }
}

// ---------------------------------------------------------------------------
// Generic patch evaluation
// ---------------------------------------------------------------------------

/// Evaluate a Taylor patch on arguments in any elementary algebra: the
/// arguments are moved into the patch's unit chart, the polynomial is
/// evaluated term by term, and the model error joins as an interval
/// constant.
fn eval_patch_generic<T: Elementary>(
    patch: &VectorPatch,
    args: &[T],
) -> Result<Vec<T>, FunctionError> {
    if args.len() != patch.argument_size() {
        return Err(FunctionError::Arity { expected: patch.argument_size(), got: args.len() });
    }
    let proto = &args[0];
    // Unit-chart arguments: s_j = (x_j − mid_j) / rad_j.
    let mut charted = Vec::with_capacity(args.len());
    for (j, a) in args.iter().enumerate() {
        let d = patch.domain().get(j);
        if let Some(r) = a.range_hint() {
            if !r.refines(&d.widen(1e-14 * (1.0 + d.magnitude()))) {
                return Err(PatchError::DomainMismatch { component: j, inner: r, outer: *d }.into());
            }
        }
        let rad = d.radius().get();
        if rad == 0.0 {
            charted.push(proto.const_like(0.0));
        } else {
            let inv = Interval::point(1.0).div(&Interval::point(rad))?;
            charted.push(a.add_interval(&Interval::point(-d.midpoint())).mul_interval(&inv));
        }
    }
    let mut out = Vec::with_capacity(patch.result_size());
    for m in patch.models() {
        let mut acc = proto.const_like(0.0);
        for (idx, c) in m.expansion().iter() {
            let mut term = proto.const_like(*c);
            for (j, &d) in idx.as_slice().iter().enumerate() {
                for _ in 0..d {
                    term = term.e_mul(&charted[j]);
                }
            }
            acc = acc.e_add(&term);
        }
        out.push(acc.add_interval(&m.error().as_interval()));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Function
// ---------------------------------------------------------------------------

/// A polymorphic `n → m` map over the closed variant set.
#[derive(Clone, Debug)]
pub enum Function {
    /// Constant vector value.
    Constant {
        /// Argument arity.
        args: usize,
        /// Component values.
        values: Vec<Interval>,
    },
    /// Selection of coordinates `x ↦ (x_{i₁}, …, x_{iₘ})`.
    Projection {
        /// Argument arity.
        args: usize,
        /// Selected positions.
        indices: Vec<usize>,
    },
    /// Componentwise symbolic expressions.
    Symbolic {
        /// Argument arity.
        args: usize,
        /// One expression per result component.
        components: Vec<Expr>,
    },
    /// A Taylor patch on a concrete box domain.
    Patch(VectorPatch),
    /// Composition `outer ∘ inner`.
    Composed {
        /// Applied second.
        outer: Arc<Function>,
        /// Applied first.
        inner: Arc<Function>,
    },
}

impl Function {
    /// Build a symbolic function, validating component arities.
    pub fn symbolic(args: usize, components: Vec<Expr>) -> Result<Function, FunctionError> {
        for c in &components {
            if c.max_arity() > args {
                return Err(FunctionError::Arity { expected: args, got: c.max_arity() });
            }
        }
        Ok(Function::Symbolic { args, components })
    }

    /// The identity on `n` variables.
    pub fn identity(n: usize) -> Function {
        Function::Projection { args: n, indices: (0..n).collect() }
    }

    /// Argument arity.
    pub fn argument_size(&self) -> usize {
        match self {
            Function::Constant { args, .. }
            | Function::Projection { args, .. }
            | Function::Symbolic { args, .. } => *args,
            Function::Patch(p) => p.argument_size(),
            Function::Composed { inner, .. } => inner.argument_size(),
        }
    }

    /// Result arity.
    pub fn result_size(&self) -> usize {
        match self {
            Function::Constant { values, .. } => values.len(),
            Function::Projection { indices, .. } => indices.len(),
            Function::Symbolic { components, .. } => components.len(),
            Function::Patch(p) => p.result_size(),
            Function::Composed { outer, .. } => outer.result_size(),
        }
    }

    /// Compose with another function applied first.
    pub fn compose(&self, inner: &Function) -> Result<Function, FunctionError> {
        if inner.result_size() != self.argument_size() {
            return Err(FunctionError::Arity {
                expected: self.argument_size(),
                got: inner.result_size(),
            });
        }
        Ok(Function::Composed { outer: Arc::new(self.clone()), inner: Arc::new(inner.clone()) })
    }

    /// Evaluate in any elementary algebra.
    pub fn evaluate_elementary<T: Elementary>(&self, args: &[T]) -> Result<Vec<T>, FunctionError> {
        if args.len() != self.argument_size() {
            return Err(FunctionError::Arity { expected: self.argument_size(), got: args.len() });
        }
        match self {
            Function::Constant { values, .. } => {
                let proto = &args[0];
                Ok(values.iter().map(|v| proto.const_like(0.0).add_interval(v)).collect())
            }
            Function::Projection { indices, .. } => {
                Ok(indices.iter().map(|&i| args[i].clone()).collect())
            }
            Function::Symbolic { components, .. } => {
                let mut out = Vec::with_capacity(components.len());
                for c in components {
                    out.push(c.eval(args)?);
                }
                Ok(out)
            }
            Function::Patch(p) => eval_patch_generic(p, args),
            Function::Composed { outer, inner } => {
                let mid = inner.evaluate_elementary(args)?;
                outer.evaluate_elementary(&mid)
            }
        }
    }

    /// Evaluate over an interval box.
    pub fn evaluate(&self, x: &IntervalBox) -> Result<IntervalBox, FunctionError> {
        let out = self.evaluate_elementary(x.as_slice())?;
        Ok(IntervalBox::new(out))
    }

    /// Jacobian over a box, via first-order automatic differentiation.
    /// Row `i`, column `j` encloses `∂f_i/∂x_j` over the whole box.
    pub fn jacobian(&self, x: &IntervalBox) -> Result<Vec<Vec<Interval>>, FunctionError> {
        let n = x.dimension();
        let vars: Vec<Differential<Interval>> =
            (0..n).map(|j| Differential::variable(n, 1, *x.get(j), j)).collect();
        let out = self.evaluate_elementary(&vars)?;
        Ok(out
            .iter()
            .map(|d| (0..n).map(|j| d.gradient(j)).collect())
            .collect())
    }

    /// Upper bound on the induced ∞-norm of the Jacobian over a box: the
    /// Lipschitz estimate used for step-size selection.
    pub fn lipschitz_bound(&self, x: &IntervalBox) -> Result<f64, FunctionError> {
        let jac = self.jacobian(x)?;
        let mut norm: f64 = 0.0;
        for row in &jac {
            let mut s = 0.0;
            for c in row {
                s = crate::float::add_rnd(s, c.magnitude(), crate::float::Rounding::Up);
            }
            norm = norm.max(s);
        }
        Ok(norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vdp() -> Function {
        // ẋ = y, ẏ = −x + y(1 − x²)
        let x = Expr::var(0);
        let y = Expr::var(1);
        let f0 = y.clone();
        let f1 = -x.clone() + y * (1.0 - x.powi(2));
        Function::symbolic(2, vec![f0, f1]).unwrap()
    }

    #[test]
    fn symbolic_interval_evaluation() {
        let f = vdp();
        assert_eq!(f.argument_size(), 2);
        assert_eq!(f.result_size(), 2);
        let x = IntervalBox::new(vec![Interval::point(1.0), Interval::point(2.0)]);
        let v = f.evaluate(&x).unwrap();
        assert!(v[0].contains(2.0));
        // −1 + 2·(1 − 1) = −1
        assert!(v[1].contains(-1.0));
    }

    #[test]
    fn jacobian_of_vanderpol() {
        let f = vdp();
        let x = IntervalBox::new(vec![Interval::point(1.0), Interval::point(2.0)]);
        let j = f.jacobian(&x).unwrap();
        // ∂f₀/∂x = 0, ∂f₀/∂y = 1
        assert!(j[0][0].contains(0.0));
        assert!(j[0][1].contains(1.0));
        // ∂f₁/∂x = −1 − 2xy = −5, ∂f₁/∂y = 1 − x² = 0
        assert!(j[1][0].contains(-5.0));
        assert!(j[1][1].contains(0.0));
    }

    #[test]
    fn transcendental_expressions_evaluate() {
        // f(x) = sin(x)·exp(x/2)
        let e = Expr::var(0).sin() * (Expr::var(0) / 2.0).exp();
        let f = Function::symbolic(1, vec![e]).unwrap();
        let at = IntervalBox::new(vec![Interval::point(0.7)]);
        let v = f.evaluate(&at).unwrap();
        let truth = 0.7_f64.sin() * (0.35_f64).exp();
        assert!(v[0].contains(truth));
        // Division by a zero-straddling expression fails loudly.
        let bad = Expr::constant(1.0) / Expr::var(0);
        let g = Function::symbolic(1, vec![bad]).unwrap();
        let z = IntervalBox::new(vec![Interval::new(-1.0, 1.0)]);
        assert!(g.evaluate(&z).is_err());
    }

    #[test]
    fn composition_chains_evaluation() {
        // outer(u, v) = u + v, inner(x) = (x, x²)
        let outer = Function::symbolic(2, vec![Expr::var(0) + Expr::var(1)]).unwrap();
        let inner = Function::symbolic(1, vec![Expr::var(0), Expr::var(0).powi(2)]).unwrap();
        let comp = outer.compose(&inner).unwrap();
        assert_eq!(comp.argument_size(), 1);
        assert_eq!(comp.result_size(), 1);
        let v = comp.evaluate(&IntervalBox::new(vec![Interval::point(3.0)])).unwrap();
        assert!(v[0].contains(12.0));
    }

    #[test]
    fn patch_variant_evaluates_like_its_models() {
        let d = IntervalBox::new(vec![Interval::new(0.0, 2.0)]);
        let patch = VectorPatch::identity(&d);
        let f = Function::Patch(patch);
        let v = f.evaluate(&IntervalBox::new(vec![Interval::point(1.5)])).unwrap();
        assert!(v[0].contains(1.5));
        // And on Taylor-model arguments (exercises the generic path).
        let tm_args = vec![TaylorModel::coordinate(1, 0).add_constant(1.0)];
        let out = f.evaluate_elementary(&tm_args).unwrap();
        let r = out[0].range();
        assert!(r.contains(0.0) && r.contains(2.0));
    }

    #[test]
    fn lipschitz_bound_dominates_rows() {
        let f = vdp();
        let x = IntervalBox::new(vec![Interval::new(0.9, 1.1), Interval::new(1.9, 2.1)]);
        let l = f.lipschitz_bound(&x).unwrap();
        // Row 2 dominates: |−1 − 2xy| + |1 − x²| ≈ 5.6 + 0.2
        assert!(l >= 5.0 && l < 10.0);
    }
}
