/// A mask of the bottom `width` bits, saturating at 128.
///
/// ```
/// # use cheri_caps::util::mask;
/// assert_eq!(mask(0), 0);
/// assert_eq!(mask(14), 0x3fff);
/// assert_eq!(mask(128), u128::MAX);
/// ```
pub const fn mask(width: usize) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1 << width) - 1
    }
}

/// The index of the highest set bit plus one, i.e. 0 for 0.
pub const fn bit_length(v: u128) -> usize {
    (u128::BITS - v.leading_zeros()) as usize
}

/// Extract `width` bits of `val` starting at bit `lo`
pub const fn extract(val: u128, lo: usize, width: usize) -> u128 {
    if lo >= 128 {
        0
    } else {
        (val >> lo) & mask(width)
    }
}

#[cfg(test)]
mod test {
    use crate::util::{bit_length, extract};

    #[test]
    fn test_bit_length() {
        assert_eq!(bit_length(0), 0);
        assert_eq!(bit_length(1), 1);
        assert_eq!(bit_length(0x1fff), 13);
        assert_eq!(bit_length(1 << 64), 65);
        assert_eq!(bit_length(u128::MAX), 128);
    }

    #[test]
    fn test_extract() {
        assert_eq!(extract(0x1ffff_c018004, 27, 18), 0x3ffff);
        assert_eq!(extract(0x1ffff_c018004, 26, 1), 1);
        assert_eq!(extract(u128::MAX, 200, 4), 0);
    }
}
