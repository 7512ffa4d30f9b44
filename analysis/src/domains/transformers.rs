use core::fmt::Display;
use std::collections::BTreeMap;

use crate::domains::*;

/////////////////////////
// Domain transformers //
/////////////////////////

/// Pointwise lifting of a lattice to maps. Keys that are missing from the
/// map are implicitly bound to the bottom value of `V`, so bottom values are
/// never stored. That keeps equal facts structurally equal.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Map<K: Ord, V: JoinSemiLattice>(BTreeMap<K, V>);

impl<K: Ord, V: JoinSemiLattice> Default for Map<K, V> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<K: Ord + Clone, V: JoinSemiLattice> Map<K, V> {
    /// The value bound to `key`, or bottom.
    pub fn get_or_bottom(&self, key: &K, ctx: &V::LatticeContext) -> V {
        self.0.get(key).cloned().unwrap_or_else(|| V::bottom(ctx))
    }

    /// Bind `key` to `value`. Returns true when the map changed.
    pub fn update(&mut self, key: K, value: V, ctx: &V::LatticeContext) -> bool {
        if value == V::bottom(ctx) {
            return self.0.remove(&key).is_some();
        }
        self.0.insert(key, value.clone()) != Some(value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.0.keys()
    }

    /// Non-bottom bindings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Ord + Display, V: JoinSemiLattice + Display> Display for Map<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let elements: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", elements.join(", "))
    }
}

impl<K: Ord, V: JoinSemiLattice> PartialOrd for Map<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        // A binding missing on one side is bottom there, so it only
        // matters when it is present on the other side.
        let below = |lhs: &Self, rhs: &Self| {
            lhs.0
                .iter()
                .all(|(k, v)| rhs.0.get(k).is_some_and(|r| v <= r))
        };
        match (below(self, other), below(other, self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl<K: Ord + Clone + Debug, V: JoinSemiLattice> JoinSemiLattice for Map<K, V> {
    type LatticeContext = V::LatticeContext;

    fn bottom(_: &Self::LatticeContext) -> Self {
        Self::default()
    }

    fn join(&self, other: &Self, ctx: &Self::LatticeContext) -> Self {
        let mut result = self.clone();
        result.join_assign(other, ctx);
        result
    }

    fn join_assign(&mut self, other: &Self, ctx: &Self::LatticeContext) -> bool {
        let mut changed = false;
        for (k, v) in &other.0 {
            match self.0.get_mut(k) {
                Some(current) => changed |= current.join_assign(v, ctx),
                None => {
                    self.0.insert(k.clone(), v.clone());
                    changed = true;
                }
            }
        }
        changed
    }
}
