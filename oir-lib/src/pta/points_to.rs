use core::fmt::Debug;
use core::marker::PhantomData;

use fixedbitset::FixedBitSet;

/// Dense ids that can be stored in a [`PointsToSet`].
pub trait Idx: Copy + Eq {
    fn new(index: usize) -> Self;
    fn index(self) -> usize;
}

impl Idx for crate::heap::ObjId {
    fn new(index: usize) -> Self {
        Self(index)
    }

    fn index(self) -> usize {
        self.0
    }
}

/// A set of abstract objects stored as a bit set over object ids.
pub struct PointsToSet<O> {
    bits: FixedBitSet,
    marker: PhantomData<O>,
}

impl<O> Clone for PointsToSet<O> {
    fn clone(&self) -> Self {
        Self {
            bits: self.bits.clone(),
            marker: PhantomData,
        }
    }
}

impl<O> Default for PointsToSet<O> {
    fn default() -> Self {
        Self {
            bits: FixedBitSet::new(),
            marker: PhantomData,
        }
    }
}

// Sets that only differ in capacity are equal.
impl<O> PartialEq for PointsToSet<O> {
    fn eq(&self, other: &Self) -> bool {
        self.bits.ones().eq(other.bits.ones())
    }
}

impl<O> Eq for PointsToSet<O> {}

impl<O> Debug for PointsToSet<O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.bits.ones()).finish()
    }
}

impl<O: Idx> FromIterator<O> for PointsToSet<O> {
    fn from_iter<I: IntoIterator<Item = O>>(iter: I) -> Self {
        let mut set = Self::new();
        for obj in iter {
            set.insert(obj);
        }
        set
    }
}

impl<O: Idx> PointsToSet<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(obj: O) -> Self {
        let mut set = Self::new();
        set.insert(obj);
        set
    }

    /// Returns true when the object was not in the set.
    pub fn insert(&mut self, obj: O) -> bool {
        let index = obj.index();
        if index >= self.bits.len() {
            self.bits.grow(index + 1);
        }
        !self.bits.put(index)
    }

    pub fn contains(&self, obj: O) -> bool {
        self.bits.contains(obj.index())
    }

    pub fn is_empty(&self) -> bool {
        self.bits.ones().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = O> + '_ {
        self.bits.ones().map(O::new)
    }

    /// Add every object of `other` and return the ones that were new.
    pub fn add_all_diff(&mut self, other: &Self) -> Self {
        let diff = Self {
            bits: other.bits.difference(&self.bits).collect(),
            marker: PhantomData,
        };
        self.bits.union_with(&diff.bits);
        diff
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.bits.intersection(&other.bits).next().is_some()
    }
}
