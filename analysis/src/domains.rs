use core::cmp::Ordering;
use core::fmt::Debug;
use core::ops::{Deref, DerefMut};

use fixedbitset::FixedBitSet;

/////////////////////////
// Traits for domains. //
/////////////////////////

/// A join semi-lattice is a partially ordered set where the least upper
/// bound exists for every finite subset. The ordering relation can be viewed
/// as "safe approximation". Dataflow facts flowing into a merge point are
/// combined with [`JoinSemiLattice::join`], so the combined fact
/// approximates every incoming path. Top represents the biggest element
/// (largest approximation), Bottom represents the smallest one.
pub trait JoinSemiLattice: Eq + PartialOrd + Clone + Debug {
    /// A type to hold some information about the lattice on the side.
    ///
    /// For some lattices, like the bit set lattice, we need to know
    /// the size of the universe to build the top or the bottom value.
    /// When we need no such values, set this to unit.
    type LatticeContext;

    /// The unit element of the join operation. Analyses start every
    /// non-boundary node from this value.
    ///
    /// Required to be the smallest element according to the ordering.
    fn bottom(ctx: &Self::LatticeContext) -> Self;

    /// Given two elements of the lattice the join operation will compute the
    /// least upper bound.
    ///
    /// Requirements:
    /// * Reflexive: a.join(a, ctx) == a
    /// * Commutative: a.join(b, ctx) == b.join(a, ctx)
    /// * Associative: a.join(b.join(c)) == a.join(b).join(c)
    /// * Bottom is unit: bottom.join(b, ctx) == b
    /// * Upper bound: a.join(b, ctx) >= a and a.join(b, ctx) >= b
    fn join(&self, other: &Self, ctx: &Self::LatticeContext) -> Self;

    /// Join `other` into `self` in place. Returns true when `self` changed.
    /// Override it when the lattice can do this without an allocation.
    fn join_assign(&mut self, other: &Self, ctx: &Self::LatticeContext) -> bool {
        let joined = self.join(other, ctx);
        let changed = joined != *self;
        *self = joined;
        changed
    }
}

pub trait JoinSemiLatticeNoContext: JoinSemiLattice {
    /// See [JoinSemiLattice::bottom] for details. This version does not
    /// require a context.
    fn bottom_() -> Self;

    /// See [JoinSemiLattice::join] for details. This version does not
    /// require a context.
    fn join_(&self, other: &Self) -> Self;
}

impl<L: JoinSemiLattice<LatticeContext = ()>> JoinSemiLatticeNoContext for L {
    fn bottom_() -> Self {
        <L as JoinSemiLattice>::bottom(&())
    }

    fn join_(&self, other: &Self) -> Self {
        self.join(other, &())
    }
}

/// A lattice is a join semi-lattice that is also a meet semi-lattice, i.e.,
/// the greatest lower bound (meet) also exists for all subsets.
pub trait Lattice: JoinSemiLattice {
    /// The unit element of the meet operation, the largest element of the
    /// lattice.
    fn top(ctx: &Self::LatticeContext) -> Self;

    /// Given two elements of the lattice the meet operation will compute the
    /// greatest lower bound.
    ///
    /// * Reflexive: a.meet(a, ctx) == a
    /// * Commutative: a.meet(b, ctx) == b.meet(a, ctx)
    /// * Top is unit: top.meet(b, ctx) == b
    /// * Lower bound: a.meet(b, ctx) <= a and a.meet(b, ctx) <= b
    fn meet(&self, other: &Self, ctx: &Self::LatticeContext) -> Self;
}

/////////////////////////////////////
// Concrete domain implementations //
/////////////////////////////////////

/// The unit lattice is useful for testing, as a placeholder,
/// or for analyses that only care about reachability.
impl JoinSemiLattice for () {
    type LatticeContext = ();

    fn bottom(&(): &Self::LatticeContext) -> Self {}

    fn join(&self, &(): &Self, &(): &Self::LatticeContext) -> Self {}
}

impl Lattice for () {
    fn top(&(): &Self::LatticeContext) -> Self {}

    fn meet(&self, &(): &Self, &(): &Self::LatticeContext) -> Self {}
}

/// Bool is a lattice, where false is bottom and true is top,
/// join is or, meet is and.
impl JoinSemiLattice for bool {
    type LatticeContext = ();

    fn bottom(_ctx: &Self::LatticeContext) -> Self {
        false
    }

    fn join(&self, other: &Self, _ctx: &Self::LatticeContext) -> Self {
        *self || *other
    }
}

impl Lattice for bool {
    fn top(_ctx: &Self::LatticeContext) -> Self {
        true
    }

    fn meet(&self, other: &Self, _ctx: &Self::LatticeContext) -> Self {
        *self && *other
    }
}

/// An efficient power set lattice over the universe `0..n`. Union is join,
/// intersection is meet. Sets of variables, definitions, or expressions can
/// use this lattice after numbering the elements.
#[derive(PartialEq, Eq, Clone)]
pub struct BitSet(pub FixedBitSet);

impl Deref for BitSet {
    type Target = FixedBitSet;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for BitSet {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// The size of the universe of a [`BitSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitSetTop(pub usize);

impl BitSet {
    pub fn from(ctx: &BitSetTop, values: &[usize]) -> Self {
        let mut inner = FixedBitSet::with_capacity(ctx.0);
        for &v in values {
            inner.insert(v);
        }
        Self(inner)
    }
}

impl PartialOrd for BitSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.is_superset(other), other.is_superset(self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Greater),
            (false, true) => Some(Ordering::Less),
            (_, _) => None,
        }
    }
}

impl Debug for BitSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let elements: Vec<String> = self.ones().map(|x| x.to_string()).collect();
        write!(f, "{{{}}}", elements.join(", "))
    }
}

impl JoinSemiLattice for BitSet {
    type LatticeContext = BitSetTop;

    fn bottom(ctx: &Self::LatticeContext) -> Self {
        Self(FixedBitSet::with_capacity(ctx.0))
    }

    fn join(&self, other: &Self, _ctx: &Self::LatticeContext) -> Self {
        let mut result = self.clone();
        result.union_with(other);
        result
    }

    fn join_assign(&mut self, other: &Self, _ctx: &Self::LatticeContext) -> bool {
        if self.is_superset(other) {
            return false;
        }
        self.union_with(other);
        true
    }
}

impl Lattice for BitSet {
    fn top(ctx: &Self::LatticeContext) -> Self {
        let mut result = FixedBitSet::with_capacity(ctx.0);
        result.toggle_range(..);
        Self(result)
    }

    fn meet(&self, other: &Self, _ctx: &Self::LatticeContext) -> Self {
        let mut result = self.clone();
        result.intersect_with(other);
        result
    }
}

mod numerical;
pub use numerical::*;

mod transformers;
pub use transformers::*;
