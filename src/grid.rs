//! Grids, cells, and pavings
//!
//! A [`Grid`] fixes an origin and per-dimension lengths; grid coordinate
//! `g` along axis `i` sits at `origin[i] + lengths[i]·g` in state space.
//! A [`GridCell`] is identified by a primary-cell height `h` — the root
//! box `[-2ʰ, 2ʰ]ⁿ` in grid coordinates — plus a finite binary
//! subdivision word, one bit per depth level, the split axis rotating
//! round-robin. A [`GridPaving`] is a binary tree over that subdivision
//! whose enabled leaves represent a union of cells.
//!
//! Invariants:
//! - recombination keeps the tree locally canonical (no two sibling
//!   leaves with equal marks survive a [`GridPaving::recombine`]);
//! - `adjoin*` operations are monotone — they never disable a cell;
//! - all conversions from state space to grid coordinates are outward
//!   rounded, so an adjoined outer approximation remains an outer
//!   approximation in state space.
//!
//! Outer approximation of an [`Enclosure`] is delegated to a
//! [`PaverStrategy`]: parameter-domain subdivision, affine linearisation,
//! or per-cell constraint feasibility.

use crate::enclosure::Enclosure;
use crate::float::{add_rnd, div_rnd, mul_rnd, sub_rnd, Rounding};
use crate::interval::{Interval, IntervalBox};
use crate::taylor::TaylorModel;
use bitvec::prelude::{BitVec, Lsb0};
use thiserror::Error;
use tracing::trace;
use Rounding::{Down, Up};

/// Bit storage for subdivision words.
pub type SubdivisionWord = BitVec<usize, Lsb0>;

/// Grid placement errors.
#[derive(Debug, Error)]
pub enum GridError {
    /// A box to adjoin pokes outside the primary cell at this height.
    #[error("box escapes the primary cell at height {height}")]
    OutsidePrimaryCell {
        /// Paving primary-cell height.
        height: u32,
    },
    /// Mismatched grids or heights between pavings.
    #[error("paving layout mismatch (heights {0} vs {1})")]
    LayoutMismatch(u32, u32),
}

/// An axis-aligned lattice on state space.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    origin: Vec<f64>,
    lengths: Vec<f64>,
}

impl Grid {
    /// Grid with explicit origin and cell lengths.
    pub fn new(origin: Vec<f64>, lengths: Vec<f64>) -> Self {
        debug_assert_eq!(origin.len(), lengths.len());
        debug_assert!(lengths.iter().all(|&l| l > 0.0));
        Grid { origin, lengths }
    }

    /// Unit grid centred at the origin.
    pub fn unit(dimension: usize) -> Self {
        Grid { origin: vec![0.0; dimension], lengths: vec![1.0; dimension] }
    }

    /// Regular grid with one length for every axis.
    pub fn regular(dimension: usize, length: f64) -> Self {
        Grid { origin: vec![0.0; dimension], lengths: vec![length; dimension] }
    }

    /// Dimension of the underlying space.
    pub fn dimension(&self) -> usize {
        self.origin.len()
    }

    /// Map a grid-coordinate box to state space, outward rounded.
    fn to_state(&self, gbox: &[(f64, f64)]) -> IntervalBox {
        IntervalBox::new(
            gbox.iter()
                .enumerate()
                .map(|(i, &(l, u))| {
                    Interval::new(
                        add_rnd(mul_rnd(l, self.lengths[i], Down), self.origin[i], Down),
                        add_rnd(mul_rnd(u, self.lengths[i], Up), self.origin[i], Up),
                    )
                })
                .collect(),
        )
    }

    /// Map a state-space box to grid coordinates, outward rounded.
    fn to_grid(&self, b: &IntervalBox) -> Vec<(f64, f64)> {
        (0..self.dimension())
            .map(|i| {
                let l = div_rnd(sub_rnd(b[i].lower(), self.origin[i], Down), self.lengths[i], Down);
                let u = div_rnd(sub_rnd(b[i].upper(), self.origin[i], Up), self.lengths[i], Up);
                (l, u)
            })
            .collect()
    }
}

/// A cell: primary height plus subdivision word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridCell {
    /// Primary-cell height.
    pub height: u32,
    /// Subdivision path from the primary cell, one bit per level.
    pub word: SubdivisionWord,
}

impl GridCell {
    /// The primary cell itself.
    pub fn primary(height: u32) -> Self {
        GridCell { height, word: SubdivisionWord::new() }
    }

    /// Subdivision depth in bits.
    pub fn depth(&self) -> usize {
        self.word.len()
    }

    /// Grid-coordinate bounds of this cell.
    fn grid_bounds(&self, dimension: usize) -> Vec<(f64, f64)> {
        let extent = f64::from(1u32 << self.height.min(30));
        let mut b = vec![(-extent, extent); dimension];
        for (d, bit) in self.word.iter().enumerate() {
            let axis = d % dimension;
            let (l, u) = b[axis];
            let m = 0.5 * (l + u);
            b[axis] = if *bit { (m, u) } else { (l, m) };
        }
        b
    }

    /// State-space box of this cell on a grid, outward rounded.
    pub fn state_box(&self, grid: &Grid) -> IntervalBox {
        grid.to_state(&self.grid_bounds(grid.dimension()))
    }
}

// ---------------------------------------------------------------------------
// Paving tree
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Node {
    Leaf(bool),
    Branch(Box<Node>, Box<Node>),
}

impl Node {
    fn all(&self, mark: bool) -> bool {
        match self {
            Node::Leaf(b) => *b == mark,
            Node::Branch(l, r) => l.all(mark) && r.all(mark),
        }
    }

    fn split_in_place(&mut self) {
        if let Node::Leaf(b) = self {
            let b = *b;
            *self = Node::Branch(Box::new(Node::Leaf(b)), Box::new(Node::Leaf(b)));
        }
    }

    fn recombine(&mut self) {
        if let Node::Branch(l, r) = self {
            l.recombine();
            r.recombine();
            if let (Node::Leaf(a), Node::Leaf(b)) = (l.as_ref(), r.as_ref()) {
                if a == b {
                    *self = Node::Leaf(*a);
                }
            }
        }
    }

    fn merge(a: &Node, b: &Node, op: &impl Fn(bool, bool) -> bool) -> Node {
        match (a, b) {
            (Node::Leaf(x), Node::Leaf(y)) => Node::Leaf(op(*x, *y)),
            _ => {
                let (al, ar) = a.children();
                let (bl, br) = b.children();
                Node::Branch(
                    Box::new(Node::merge(al, bl, op)),
                    Box::new(Node::merge(ar, br, op)),
                )
            }
        }
    }

    /// Children view, materialising an implicit split of a leaf.
    fn children(&self) -> (&Node, &Node) {
        static LEAF_TRUE: Node = Node::Leaf(true);
        static LEAF_FALSE: Node = Node::Leaf(false);
        match self {
            Node::Branch(l, r) => (l.as_ref(), r.as_ref()),
            Node::Leaf(true) => (&LEAF_TRUE, &LEAF_TRUE),
            Node::Leaf(false) => (&LEAF_FALSE, &LEAF_FALSE),
        }
    }

    fn count_enabled(&self) -> usize {
        match self {
            Node::Leaf(true) => 1,
            Node::Leaf(false) => 0,
            Node::Branch(l, r) => l.count_enabled() + r.count_enabled(),
        }
    }
}

/// A binary-subdivision paving: the union of its enabled leaf cells.
#[derive(Clone, Debug, PartialEq)]
pub struct GridPaving {
    grid: Grid,
    height: u32,
    root: Node,
}

impl GridPaving {
    /// Empty paving over a grid with the given primary-cell height.
    pub fn new(grid: Grid, height: u32) -> Self {
        GridPaving { grid, height, root: Node::Leaf(false) }
    }

    /// The grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Primary-cell height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// State dimension.
    pub fn dimension(&self) -> usize {
        self.grid.dimension()
    }

    /// True when no cell is enabled.
    pub fn is_empty(&self) -> bool {
        self.root.all(false)
    }

    /// Number of enabled leaves (after recombination this is the number
    /// of maximal cells).
    pub fn cell_count(&self) -> usize {
        self.root.count_enabled()
    }

    /// Enable a single cell.
    pub fn adjoin_cell(&mut self, cell: &GridCell) -> Result<(), GridError> {
        if cell.height != self.height {
            return Err(GridError::LayoutMismatch(cell.height, self.height));
        }
        let mut node = &mut self.root;
        for bit in cell.word.iter() {
            if matches!(node, Node::Leaf(true)) {
                return Ok(()); // already covered
            }
            node.split_in_place();
            node = match node {
                Node::Branch(l, r) => {
                    if *bit {
                        r.as_mut()
                    } else {
                        l.as_mut()
                    }
                }
                Node::Leaf(_) => unreachable!("just split"),
            };
        }
        *node = Node::Leaf(true);
        Ok(())
    }

    /// Adjoin an outer approximation of a state-space box, subdividing to
    /// `depth` levels per axis. Cells disjoint from the box are left
    /// alone; cells inside an ε-widening of the box (or at full depth)
    /// are enabled whole.
    pub fn adjoin_outer_box(&mut self, b: &IntervalBox, depth: u32) -> Result<(), GridError> {
        if b.is_empty() {
            return Ok(());
        }
        let n = self.dimension();
        let target = self.grid.to_grid(b);
        let extent = f64::from(1u32 << self.height.min(30));
        if target.iter().any(|&(l, u)| l < -extent || u > extent) {
            return Err(GridError::OutsidePrimaryCell { height: self.height });
        }
        let bounds = vec![(-extent, extent); n];
        // Depth counts subdivisions below the unit lattice cell; the
        // primary cell needs height+1 halvings per axis to reach it.
        let max_bits = n * (self.height as usize + 1 + depth as usize);
        Self::adjoin_rec(&mut self.root, &bounds, 0, n, max_bits, &target);
        Ok(())
    }

    fn adjoin_rec(
        node: &mut Node,
        bounds: &[(f64, f64)],
        bits: usize,
        n: usize,
        max_bits: usize,
        target: &[(f64, f64)],
    ) {
        if matches!(node, Node::Leaf(true)) {
            return;
        }
        // Cells are half-open `[cl, cu)`, so a target touching only the
        // upper face of a cell does not claim it.
        let disjoint = bounds
            .iter()
            .zip(target)
            .any(|(&(cl, cu), &(tl, tu))| cl > tu || cu <= tl);
        if disjoint {
            return;
        }
        // Fully inside an ε-widening, or out of depth: enable whole.
        let inside = bounds.iter().zip(target).all(|(&(cl, cu), &(tl, tu))| {
            let eps = 4.0 * f64::EPSILON * (1.0 + tl.abs().max(tu.abs()));
            cl >= tl - eps && cu <= tu + eps
        });
        if inside || bits == max_bits {
            *node = Node::Leaf(true);
            return;
        }
        node.split_in_place();
        let axis = bits % n;
        let (l, u) = bounds[axis];
        let m = 0.5 * (l + u);
        let mut lo = bounds.to_vec();
        let mut hi = bounds.to_vec();
        lo[axis] = (l, m);
        hi[axis] = (m, u);
        if let Node::Branch(left, right) = node {
            Self::adjoin_rec(left, &lo, bits + 1, n, max_bits, target);
            Self::adjoin_rec(right, &hi, bits + 1, n, max_bits, target);
        }
    }

    /// Recombine: bottom-up, two sibling leaves with the same mark merge
    /// into their parent; the walk stops at the first differing sibling.
    pub fn recombine(&mut self) {
        self.root.recombine();
    }

    /// Set union.
    pub fn union(&self, other: &GridPaving) -> Result<GridPaving, GridError> {
        self.merge_with(other, &|a, b| a || b)
    }

    /// Set intersection.
    pub fn intersection(&self, other: &GridPaving) -> Result<GridPaving, GridError> {
        self.merge_with(other, &|a, b| a && b)
    }

    /// Set difference.
    pub fn difference(&self, other: &GridPaving) -> Result<GridPaving, GridError> {
        self.merge_with(other, &|a, b| a && !b)
    }

    fn merge_with(
        &self,
        other: &GridPaving,
        op: &impl Fn(bool, bool) -> bool,
    ) -> Result<GridPaving, GridError> {
        if self.height != other.height || self.grid != other.grid {
            return Err(GridError::LayoutMismatch(self.height, other.height));
        }
        let mut root = Node::merge(&self.root, &other.root, op);
        root.recombine();
        Ok(GridPaving { grid: self.grid.clone(), height: self.height, root })
    }

    /// True when every leaf along the cell's path (and below) is enabled.
    pub fn superset_of_cell(&self, cell: &GridCell) -> bool {
        if cell.height != self.height {
            return false;
        }
        let mut node = &self.root;
        for bit in cell.word.iter() {
            match node {
                Node::Leaf(b) => return *b,
                Node::Branch(l, r) => node = if *bit { r.as_ref() } else { l.as_ref() },
            }
        }
        node.all(true)
    }

    /// `self ⊆ other` as unions of cells.
    pub fn subset_of(&self, other: &GridPaving) -> Result<bool, GridError> {
        Ok(self.difference(other)?.is_empty())
    }

    /// Collect the enabled cells.
    pub fn enabled_cells(&self) -> Vec<GridCell> {
        let mut out = Vec::new();
        let mut word = SubdivisionWord::new();
        Self::collect(&self.root, &mut word, self.height, &mut out);
        out
    }

    fn collect(node: &Node, word: &mut SubdivisionWord, height: u32, out: &mut Vec<GridCell>) {
        match node {
            Node::Leaf(false) => {}
            Node::Leaf(true) => out.push(GridCell { height, word: word.clone() }),
            Node::Branch(l, r) => {
                word.push(false);
                Self::collect(l, word, height, out);
                word.pop();
                word.push(true);
                Self::collect(r, word, height, out);
                word.pop();
            }
        }
    }

    /// State-space boxes of the enabled cells.
    pub fn cell_boxes(&self) -> Vec<IntervalBox> {
        self.enabled_cells().iter().map(|c| c.state_box(&self.grid)).collect()
    }

    /// Hull of the enabled cells, empty-dimension box when empty.
    pub fn bounding_box(&self) -> IntervalBox {
        let mut acc = IntervalBox::new(vec![Interval::empty(); self.dimension()]);
        for b in self.cell_boxes() {
            acc = acc.hull(&b);
        }
        acc
    }
}

// ---------------------------------------------------------------------------
// Enclosure pavers
// ---------------------------------------------------------------------------

/// How an enclosure (with constraints) is discretised onto a paving.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum PaverStrategy {
    /// Split the parameter domain until image boxes reach cell size.
    Subdivision,
    /// Linearise: stop splitting once the nonlinear + error part is
    /// small against the cell size, then adjoin the affine image box.
    #[default]
    Affine,
    /// Test every candidate cell with a nonlinear feasibility search.
    Constraint,
}

/// Magnitude of the non-affine content of a model: range of the terms of
/// degree ≥ 2 plus the error bound.
fn nonlinear_magnitude(m: &TaylorModel) -> f64 {
    let mut s = m.error().get();
    for (a, c) in m.expansion().iter() {
        if a.degree() >= 2 {
            s = add_rnd(s, c.abs(), Up);
        }
    }
    s
}

impl GridPaving {
    /// Smallest physical cell width at a subdivision depth (cells at
    /// depth `d` have grid-coordinate width `2^-d`).
    fn min_cell_width(&self, depth: u32) -> f64 {
        let shrink = (0.5f64).powi(depth as i32);
        self.grid
            .lengths
            .iter()
            .map(|l| l * shrink)
            .fold(f64::INFINITY, f64::min)
    }

    /// Adjoin an outer approximation of an enclosure at the given depth,
    /// using the selected paver strategy.
    pub fn adjoin_outer_approximation(
        &mut self,
        enc: &Enclosure,
        depth: u32,
        strategy: PaverStrategy,
    ) -> Result<(), GridError> {
        match strategy {
            PaverStrategy::Subdivision => self.adjoin_by_subdivision(enc, depth, false),
            PaverStrategy::Affine => self.adjoin_by_subdivision(enc, depth, true),
            PaverStrategy::Constraint => self.adjoin_by_constraint(enc, depth),
        }
    }

    fn adjoin_by_subdivision(
        &mut self,
        enc: &Enclosure,
        depth: u32,
        affine: bool,
    ) -> Result<(), GridError> {
        let width = self.min_cell_width(depth);
        // Budget on parameter bisections along one branch.
        let split_budget = (depth as usize + 4) * enc.parameter_count().max(1);
        self.subdivide_rec(enc, depth, affine, width, split_budget)
    }

    fn subdivide_rec(
        &mut self,
        enc: &Enclosure,
        depth: u32,
        affine: bool,
        width: f64,
        budget: usize,
    ) -> Result<(), GridError> {
        // Constraint pruning: a provably positive constraint kills the
        // whole parameter piece.
        for c in enc.constraints() {
            let unit = vec![Interval::unit(); enc.parameter_count()];
            if let Ok(v) = c.evaluate(&unit) {
                if v.lower() > 0.0 {
                    trace!("paver pruned an infeasible parameter piece");
                    return Ok(());
                }
            }
        }
        let bbox = enc.bounding_box();
        let small_enough = if affine {
            // Affine leaf test: the image box of the linear part is
            // tight, so only the nonlinear content must be subcell.
            enc.function()
                .models()
                .iter()
                .all(|m| nonlinear_magnitude(m) <= 0.5 * width)
        } else {
            bbox.radius() * 2.0 <= width
        };
        if small_enough || budget == 0 {
            return self.adjoin_outer_box(&bbox, depth);
        }
        let (a, b) = enc
            .split_widest()
            .expect("splitting a valid enclosure cannot fail");
        self.subdivide_rec(&a, depth, affine, width, budget - 1)?;
        self.subdivide_rec(&b, depth, affine, width, budget - 1)
    }

    fn adjoin_by_constraint(&mut self, enc: &Enclosure, depth: u32) -> Result<(), GridError> {
        let n = self.dimension();
        let bbox = enc.bounding_box();
        let target = self.grid.to_grid(&bbox);
        let extent = f64::from(1u32 << self.height.min(30));
        if target.iter().any(|&(l, u)| l < -extent || u > extent) {
            return Err(GridError::OutsidePrimaryCell { height: self.height });
        }
        let bounds = vec![(-extent, extent); n];
        let max_bits = n * (self.height as usize + 1 + depth as usize);
        let mut candidates: Vec<Vec<(f64, f64)>> = Vec::new();
        Self::candidate_cells(&bounds, 0, n, max_bits, &target, &mut candidates);
        for gcell in candidates {
            let cell_box = self.grid.to_state(&gcell);
            if Self::cell_feasible(enc, &cell_box, 8) {
                self.adjoin_outer_box(&cell_box.intersection(&bbox), depth)?;
            }
        }
        Ok(())
    }

    fn candidate_cells(
        bounds: &[(f64, f64)],
        bits: usize,
        n: usize,
        max_bits: usize,
        target: &[(f64, f64)],
        out: &mut Vec<Vec<(f64, f64)>>,
    ) {
        let disjoint = bounds
            .iter()
            .zip(target)
            .any(|(&(cl, cu), &(tl, tu))| cl > tu || cu <= tl);
        if disjoint {
            return;
        }
        if bits == max_bits {
            out.push(bounds.to_vec());
            return;
        }
        let axis = bits % n;
        let (l, u) = bounds[axis];
        let m = 0.5 * (l + u);
        let mut lo = bounds.to_vec();
        let mut hi = bounds.to_vec();
        lo[axis] = (l, m);
        hi[axis] = (m, u);
        Self::candidate_cells(&lo, bits + 1, n, max_bits, target, out);
        Self::candidate_cells(&hi, bits + 1, n, max_bits, target, out);
    }

    /// Branch-and-prune over parameters: can `φ(s)` meet the cell while
    /// satisfying the constraints? `true` means "not proven infeasible".
    fn cell_feasible(enc: &Enclosure, cell_box: &IntervalBox, effort: u32) -> bool {
        fn rec(enc: &Enclosure, unit: &[Interval], cell: &IntervalBox, effort: u32) -> bool {
            for (i, m) in enc.function().models().iter().enumerate() {
                match m.evaluate(unit) {
                    Ok(v) => {
                        if !v.intersects(cell.get(i)) {
                            return false;
                        }
                    }
                    Err(_) => return true,
                }
            }
            for c in enc.constraints() {
                if let Ok(v) = c.evaluate(unit) {
                    if v.lower() > 0.0 {
                        return false;
                    }
                }
            }
            if effort == 0 {
                return true;
            }
            let (widest, _) = unit
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| {
                    a.width().partial_cmp(&b.width()).expect("finite widths")
                })
                .expect("non-empty parameter list");
            let (l, h) = unit[widest].split();
            let mut lo = unit.to_vec();
            let mut hi = unit.to_vec();
            lo[widest] = l;
            hi[widest] = h;
            rec(enc, &lo, cell, effort - 1) || rec(enc, &hi, cell, effort - 1)
        }
        if enc.parameter_count() == 0 {
            return true;
        }
        let unit = vec![Interval::unit(); enc.parameter_count()];
        rec(enc, &unit, cell_box, effort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, x1: f64, y0: f64, y1: f64) -> IntervalBox {
        IntervalBox::new(vec![Interval::new(x0, x1), Interval::new(y0, y1)])
    }

    #[test]
    fn adjoined_box_is_covered() {
        let mut p = GridPaving::new(Grid::unit(2), 2);
        let b = square(0.1, 0.9, 0.1, 0.4);
        p.adjoin_outer_box(&b, 4).unwrap();
        // Every sample point of b lies in some enabled cell box.
        for &(x, y) in &[(0.1, 0.1), (0.5, 0.25), (0.9, 0.4), (0.3, 0.33)] {
            let hit = p
                .cell_boxes()
                .iter()
                .any(|cb| cb.contains_point(&[x, y]));
            assert!(hit, "({x}, {y}) escaped the outer approximation");
        }
    }

    #[test]
    fn adjoin_is_monotone() {
        let mut p = GridPaving::new(Grid::unit(2), 1);
        p.adjoin_outer_box(&square(0.0, 0.5, 0.0, 0.5), 3).unwrap();
        let before = p.clone();
        p.adjoin_outer_box(&square(-0.5, 0.0, -0.5, 0.0), 3).unwrap();
        // Union with the old paving is the new paving: nothing was lost.
        assert!(before.subset_of(&p).unwrap());
        let u = before.union(&p).unwrap();
        assert!(u.subset_of(&p).unwrap() && p.subset_of(&u).unwrap());
    }

    #[test]
    fn disjoint_boxes_make_disjoint_pavings() {
        // The regression from the design brief: [0,1]² vs [2,3]² must
        // intersect to the empty paving at every depth.
        for depth in 1..=5 {
            let mut a = GridPaving::new(Grid::unit(2), 2);
            let mut b = GridPaving::new(Grid::unit(2), 2);
            a.adjoin_outer_box(&square(0.0, 1.0, 0.0, 1.0), depth).unwrap();
            b.adjoin_outer_box(&square(2.0, 3.0, 2.0, 3.0), depth).unwrap();
            assert!(!a.is_empty() && !b.is_empty());
            assert!(a.intersection(&b).unwrap().is_empty(), "depth {depth}");
        }
    }

    #[test]
    fn recombine_is_idempotent_and_canonical() {
        let mut p = GridPaving::new(Grid::unit(2), 1);
        p.adjoin_outer_box(&square(-2.0, 2.0, -2.0, 2.0), 3).unwrap();
        p.recombine();
        let once = p.clone();
        p.recombine();
        assert_eq!(once, p);
        // The full box recombines to a single cell.
        assert_eq!(p.cell_count(), 1);
    }

    #[test]
    fn superset_walk_follows_the_word() {
        let mut p = GridPaving::new(Grid::unit(2), 1);
        let mut word = SubdivisionWord::new();
        word.push(false);
        word.push(true);
        let cell = GridCell { height: 1, word };
        p.adjoin_cell(&cell).unwrap();
        assert!(p.superset_of_cell(&cell));
        // A sibling cell is not covered.
        let mut other = SubdivisionWord::new();
        other.push(true);
        other.push(true);
        assert!(!p.superset_of_cell(&GridCell { height: 1, word: other }));
        // The parent of an only-half-enabled region is not covered.
        let mut parent = SubdivisionWord::new();
        parent.push(false);
        assert!(!p.superset_of_cell(&GridCell { height: 1, word: parent }));
    }

    #[test]
    fn union_contains_both_operands() {
        let mut a = GridPaving::new(Grid::unit(2), 2);
        let mut b = GridPaving::new(Grid::unit(2), 2);
        a.adjoin_outer_box(&square(0.0, 1.0, 0.0, 1.0), 3).unwrap();
        b.adjoin_outer_box(&square(0.5, 1.5, 0.5, 1.5), 3).unwrap();
        let u = a.union(&b).unwrap();
        assert!(a.subset_of(&u).unwrap());
        assert!(b.subset_of(&u).unwrap());
        let d = u.difference(&a).unwrap();
        assert!(d.subset_of(&b).unwrap());
    }

    #[test]
    fn escape_of_primary_cell_is_an_error() {
        let mut p = GridPaving::new(Grid::unit(1), 1);
        let err = p.adjoin_outer_box(
            &IntervalBox::new(vec![Interval::new(0.0, 10.0)]),
            2,
        );
        assert!(matches!(err, Err(GridError::OutsidePrimaryCell { .. })));
    }

    #[test]
    fn enclosure_pavers_cover_the_image() {
        use crate::enclosure::Enclosure;
        let init = square(0.2, 0.8, 0.2, 0.8);
        let enc = Enclosure::from_box(&init, vec!["x".into(), "y".into()]);
        for strategy in [
            PaverStrategy::Subdivision,
            PaverStrategy::Affine,
            PaverStrategy::Constraint,
        ] {
            let mut p = GridPaving::new(Grid::unit(2), 1);
            p.adjoin_outer_approximation(&enc, 3, strategy).unwrap();
            for &(x, y) in &[(0.2, 0.2), (0.5, 0.5), (0.8, 0.8), (0.25, 0.75)] {
                let hit = p.cell_boxes().iter().any(|cb| cb.contains_point(&[x, y]));
                assert!(hit, "{strategy:?} missed ({x}, {y})");
            }
        }
    }

    #[test]
    fn constraint_paver_prunes_infeasible_cells() {
        use crate::enclosure::Enclosure;
        use crate::function::Expr;
        // Square [−1,1]² restricted to the unit disc: corner cells far
        // from the disc must be absent under the constraint paver.
        let init = square(-1.0, 1.0, -1.0, 1.0);
        let enc = Enclosure::from_box(&init, vec!["x".into(), "y".into()])
            .new_state_constraint(&(Expr::var(0).powi(2) + Expr::var(1).powi(2) - 1.0))
            .unwrap();
        let mut p = GridPaving::new(Grid::unit(2), 1);
        p.adjoin_outer_approximation(&enc, 3, PaverStrategy::Constraint).unwrap();
        assert!(!p.is_empty());
        // (0.95, 0.95) is well outside the disc.
        let hit = p.cell_boxes().iter().any(|cb| cb.contains_point(&[0.95, 0.95]));
        assert!(!hit, "infeasible corner cell was adjoined");
        // The centre is covered.
        assert!(p.cell_boxes().iter().any(|cb| cb.contains_point(&[0.0, 0.0])));
    }
}
