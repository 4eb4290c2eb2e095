//! Unsigned integer types used as addresses, lengths and compressed words.
//!
//! All bounds arithmetic is done in `u128`, which can hold a full 65-bit CC128 length.
//! [CapInt] converts each format's native integer types to and from that working width.

use core::hash::Hash;

pub trait CapInt: Sized +
    core::fmt::Debug +
    core::fmt::LowerHex +
    core::ops::BitAnd<Output=Self> +
    core::ops::BitOr<Output=Self> +
    core::ops::BitXor<Output=Self> +
    core::ops::Not<Output=Self> +
    PartialEq + Eq + PartialOrd + Ord + Hash + Default +
    Copy + Clone {
    const BITS: usize;
    const ZERO: Self;
    const ONE: Self;
    const MAX: Self;

    fn to_u128(self) -> u128;
    /// Truncates `v` to [CapInt::BITS] bits.
    fn from_u128(v: u128) -> Self;
}
impl CapInt for u32 {
    const BITS: usize = 32;
    const ZERO: Self = 0;
    const ONE: Self = 1;
    const MAX: Self = u32::MAX;

    fn to_u128(self) -> u128 {
        self as u128
    }
    fn from_u128(v: u128) -> Self {
        v as u32
    }
}
impl CapInt for u64 {
    const BITS: usize = 64;
    const ZERO: Self = 0;
    const ONE: Self = 1;
    const MAX: Self = u64::MAX;

    fn to_u128(self) -> u128 {
        self as u128
    }
    fn from_u128(v: u128) -> Self {
        v as u64
    }
}
impl CapInt for u128 {
    const BITS: usize = 128;
    const ZERO: Self = 0;
    const ONE: Self = 1;
    const MAX: Self = u128::MAX;

    fn to_u128(self) -> u128 {
        self
    }
    fn from_u128(v: u128) -> Self {
        v
    }
}

#[cfg(test)]
mod test {
    use super::CapInt;

    #[test]
    fn from_u128_truncates() {
        assert_eq!(u32::from_u128(0x1_2345_6789), 0x2345_6789);
        assert_eq!(u64::from_u128(1 << 64), 0);
        assert_eq!(u128::from_u128(1 << 64), 1 << 64);
    }
}
