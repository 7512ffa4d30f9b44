use core::fmt::Display;
use core::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Rem, Shl, Shr, Sub};

use crate::domains::*;

/// The flat lattice of 32-bit integer constants used by constant
/// propagation. Arithmetic follows two's complement wrapping semantics
/// with shift distances masked to the low five bits.
///
/// ```text
///          Nac
///   / ... / | \ ... \
///  ...   -1 0  1   ...
///   \ ... \ | / ... /
///         Undef
/// ```
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum ConstValue {
    /// No information yet, e.g., the variable was not assigned on any path.
    Undef,
    Constant(i32),
    /// Not a constant: conflicting values reach this point.
    Nac,
}

impl ConstValue {
    pub fn is_constant(self) -> bool {
        matches!(self, ConstValue::Constant(_))
    }

    pub fn as_constant(self) -> Option<i32> {
        match self {
            ConstValue::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Apply a binary operation on two abstract values. Two constants are
    /// folded with `op`, any NAC operand yields NAC, everything else is
    /// undefined.
    pub fn lift(self, rhs: Self, op: impl FnOnce(i32, i32) -> i32) -> Self {
        use ConstValue::*;
        match (self, rhs) {
            (Constant(l), Constant(r)) => Constant(op(l, r)),
            (Nac, _) | (_, Nac) => Nac,
            _ => Undef,
        }
    }

    /// Like [`ConstValue::lift`] for relational operators, encoding true as
    /// 1 and false as 0.
    pub fn compare(self, rhs: Self, op: impl FnOnce(&i32, &i32) -> bool) -> Self {
        self.lift(rhs, |l, r| i32::from(op(&l, &r)))
    }

    /// Logical (unsigned) right shift.
    pub fn ushr(self, rhs: Self) -> Self {
        self.lift(rhs, |l, r| (l as u32).wrapping_shr(r as u32) as i32)
    }
}

impl From<i32> for ConstValue {
    fn from(val: i32) -> Self {
        ConstValue::Constant(val)
    }
}

impl Display for ConstValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConstValue::Undef => write!(f, "UNDEF"),
            ConstValue::Constant(c) => write!(f, "{c}"),
            ConstValue::Nac => write!(f, "NAC"),
        }
    }
}

impl PartialOrd for ConstValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use ConstValue::*;
        match (self, other) {
            _ if self == other => Some(Ordering::Equal),
            (Undef, _) | (_, Nac) => Some(Ordering::Less),
            (Nac, _) | (_, Undef) => Some(Ordering::Greater),
            _ => None,
        }
    }
}

impl JoinSemiLattice for ConstValue {
    type LatticeContext = ();

    fn bottom(_: &Self::LatticeContext) -> Self {
        ConstValue::Undef
    }

    fn join(&self, other: &Self, _: &Self::LatticeContext) -> Self {
        use ConstValue::*;
        match (*self, *other) {
            (Nac, _) | (_, Nac) => Nac,
            (Undef, v) | (v, Undef) => v,
            (Constant(l), Constant(r)) if l == r => Constant(l),
            _ => Nac,
        }
    }
}

impl Lattice for ConstValue {
    fn top(_: &Self::LatticeContext) -> Self {
        ConstValue::Nac
    }

    fn meet(&self, other: &Self, _: &Self::LatticeContext) -> Self {
        use ConstValue::*;
        match (*self, *other) {
            (Undef, _) | (_, Undef) => Undef,
            (Nac, v) | (v, Nac) => v,
            (Constant(l), Constant(r)) if l == r => Constant(l),
            _ => Undef,
        }
    }
}

macro_rules! wrapping_op {
    ($trait:ident, $method:ident, $op:ident) => {
        impl $trait for ConstValue {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                self.lift(rhs, |l, r| l.$op(r))
            }
        }
    };
}

wrapping_op!(Add, add, wrapping_add);
wrapping_op!(Sub, sub, wrapping_sub);
wrapping_op!(Mul, mul, wrapping_mul);
wrapping_op!(BitAnd, bitand, bitand);
wrapping_op!(BitOr, bitor, bitor);
wrapping_op!(BitXor, bitxor, bitxor);

impl Shl for ConstValue {
    type Output = Self;

    fn shl(self, rhs: Self) -> Self::Output {
        self.lift(rhs, |l, r| l.wrapping_shl(r as u32))
    }
}

impl Shr for ConstValue {
    type Output = Self;

    fn shr(self, rhs: Self) -> Self::Output {
        self.lift(rhs, |l, r| l.wrapping_shr(r as u32))
    }
}

// Division by a constant zero can never complete normally, so nothing
// flows out of it.
impl Div for ConstValue {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        if rhs == ConstValue::Constant(0) {
            return ConstValue::Undef;
        }
        self.lift(rhs, i32::wrapping_div)
    }
}

impl Rem for ConstValue {
    type Output = Self;

    fn rem(self, rhs: Self) -> Self::Output {
        if rhs == ConstValue::Constant(0) {
            return ConstValue::Undef;
        }
        self.lift(rhs, i32::wrapping_rem)
    }
}
