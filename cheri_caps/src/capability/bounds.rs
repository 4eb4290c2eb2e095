//! The floating-point bounds encoding shared by every format.
//!
//! Bounds are stored as a bottom mantissa `B` of [CompressedCapability::MANTISSA_WIDTH] bits, a top mantissa `T`
//! missing its two most significant bits, and an exponent `E`.
//! When the internal-exponent flag is set, the exponent is stored in the low bits of the `B` and `T` fields and those
//! mantissa bits are implicitly zero.
//! All arithmetic here is done in `u128` so a single implementation covers lengths of up to 65 bits.

use crate::util::{bit_length, extract, mask};

use super::CompressedCapability;

/// The bounds fields as they sit in the compressed word, before the exponent is unfolded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EncodedBounds {
    pub internal_exponent: bool,
    /// `MANTISSA_WIDTH - 2` bits
    pub top: u32,
    /// `MANTISSA_WIDTH` bits
    pub bottom: u32,
}

/// Exponent and full-width mantissas recovered from [EncodedBounds].
/// The top two bits of `t` are inferred from `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundsBits {
    pub b: u32,
    pub t: u32,
    pub e: u8,
    pub ie: bool,
}

/// Which "lap" of the mantissa window a bound lies in, relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Behind,
    Same,
    Ahead,
}
impl Region {
    /// `bound_hi` and `cursor_hi` are true when the respective 3-bit tag lies below the representable-region boundary.
    fn new(bound_hi: bool, cursor_hi: bool) -> Self {
        match (bound_hi, cursor_hi) {
            (false, true) => Region::Behind,
            (true, false) => Region::Ahead,
            _ => Region::Same,
        }
    }

    fn offset(self) -> u128 {
        match self {
            Region::Behind => u128::MAX, // -1 in two's complement, always used with wrapping arithmetic
            Region::Same => 0,
            Region::Ahead => 1,
        }
    }
}

/// Bounds decoded against a particular cursor.
/// `base` is at most `ADDR_WIDTH` bits, `top` at most `LEN_WIDTH` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedBounds {
    pub base: u128,
    pub top: u128,
    /// The exponent after clamping to [CompressedCapability::MAX_EXPONENT]
    pub exponent: u8,
    pub valid: bool,
}

/// The result of encoding a `(base, top)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsEncoding {
    pub bounds: EncodedBounds,
    /// The exponent stored in the encoding (zero when the internal exponent is not used)
    pub exponent: u8,
    /// `LEN_WIDTH` bits, clears the address bits below the representable granule
    pub alignment_mask: u128,
    pub exact: bool,
}

pub fn extract_bounds_bits<F: CompressedCapability>(enc: EncodedBounds) -> BoundsBits {
    let mw = F::MANTISSA_WIDTH;
    let (e, b, t, l_msb) = if enc.internal_exponent {
        let e_low = enc.bottom & mask(F::EXPONENT_LOW_WIDTH) as u32;
        let e_high = enc.top & mask(F::EXPONENT_HIGH_WIDTH) as u32;
        let e = (e_high << F::EXPONENT_LOW_WIDTH) | e_low;
        let b = (enc.bottom >> F::EXPONENT_LOW_WIDTH) << F::EXPONENT_LOW_WIDTH;
        let t = (enc.top >> F::EXPONENT_HIGH_WIDTH) << F::EXPONENT_HIGH_WIDTH;
        (e as u8, b, t, 1)
    } else {
        (0, enc.bottom, enc.top, 0)
    };

    // The two top bits of T are not stored. They are B's top bits, plus one if T's lower bits wrapped past B's,
    // plus one for the implied leading one of an internal-exponent length.
    let low_mask = mask(mw - 2) as u32;
    let l_carry = ((t & low_mask) < (b & low_mask)) as u32;
    let t_hi = ((b >> (mw - 2)) + l_carry + l_msb) & 0b11;
    let t = (t & low_mask) | (t_hi << (mw - 2));

    BoundsBits { b, t, e, ie: enc.internal_exponent }
}

pub fn compute_base_top<F: CompressedCapability>(bits: BoundsBits, cursor: u128) -> DecodedBounds {
    let aw = F::ADDR_WIDTH;
    let mw = F::MANTISSA_WIDTH;
    let e = (bits.e as usize).min(F::MAX_EXPONENT);

    let a3 = extract(cursor, e + mw - 3, 3) as u32;
    let b3 = bits.b >> (mw - 3);
    let t3 = bits.t >> (mw - 3);
    let r3 = b3.wrapping_sub(1) & 0b111;

    let a_hi = a3 < r3;
    let region_base = Region::new(b3 < r3, a_hi);
    let region_top = Region::new(t3 < r3, a_hi);

    let a_top = extract(cursor, e + mw, aw);
    let base = (((a_top.wrapping_add(region_base.offset()) << mw) | bits.b as u128) << e) & mask(F::LEN_WIDTH);
    let mut top = (((a_top.wrapping_add(region_top.offset()) << mw) | bits.t as u128) << e) & mask(F::LEN_WIDTH);

    // If the top bits of base and top are too far apart, top wrapped around the address space the wrong way.
    if e < F::MAX_EXPONENT - 1 {
        let top2 = extract(top, aw - 1, 2);
        let base2 = extract(base, aw - 1, 1);
        if top2.wrapping_sub(base2) & 0b11 > 1 {
            top ^= 1 << aw;
        }
    }

    let base = base & mask(aw);
    DecodedBounds {
        base,
        top,
        exponent: e as u8,
        valid: (bits.e as usize) <= F::MAX_EXPONENT && base <= top && top <= 1 << aw,
    }
}

/// Encode `[base, top)`, rounding outwards if the pair isn't exactly representable.
///
/// `base` must fit in `ADDR_WIDTH` bits and `top` must lie in `base..=2^ADDR_WIDTH`.
pub fn compute_ebt<F: CompressedCapability>(base: u128, top: u128) -> BoundsEncoding {
    debug_assert!(base <= mask(F::ADDR_WIDTH), "base {base:#x} is wider than the address");
    debug_assert!(base <= top, "base {base:#x} above top {top:#x}");
    debug_assert!(top <= 1 << F::ADDR_WIDTH, "top {top:#x} beyond the end of the address space");

    let mw = F::MANTISSA_WIDTH;
    let elw = F::EXPONENT_LOW_WIDTH;
    let length = top.wrapping_sub(base) & mask(F::LEN_WIDTH);
    let e = bit_length(length >> (mw - 1)).min(F::MAX_EXPONENT);
    let ie = e != 0 || extract(length, mw - 2, 1) != 0;

    if !ie {
        return BoundsEncoding {
            bounds: EncodedBounds {
                internal_exponent: false,
                top: extract(top, 0, mw - 2) as u32,
                bottom: extract(base, 0, mw) as u32,
            },
            exponent: 0,
            alignment_mask: mask(F::LEN_WIDTH),
            exact: true,
        };
    }

    let ie_width = mw - elw;
    let shift = e + elw;
    let mut b_ie = extract(base, shift, ie_width);
    let mut t_ie = extract(top, shift, ie_width);
    let mut lost_base = extract(base, 0, shift) != 0;
    let mut lost_top = extract(top, 0, shift) != 0;
    if lost_top {
        t_ie = (t_ie + 1) & mask(ie_width);
    }

    // Rounding top up can leave the length one bit too wide for the mantissa, in which case go up an exponent.
    let len_ie = t_ie.wrapping_sub(b_ie) & mask(ie_width);
    let inc_e = extract(len_ie, mw - 4, 1) != 0;
    if inc_e {
        lost_base |= b_ie & 1 != 0;
        lost_top |= t_ie & 1 != 0;
        b_ie = extract(base, shift + 1, ie_width);
        t_ie = (extract(top, shift + 1, ie_width) + lost_top as u128) & mask(ie_width);
    }

    let e = e + inc_e as usize;
    let e_low = e as u128 & mask(elw);
    let e_high = (e as u128 >> elw) & mask(F::EXPONENT_HIGH_WIDTH);
    BoundsEncoding {
        bounds: EncodedBounds {
            internal_exponent: true,
            top: (((t_ie & mask(mw - 5)) << F::EXPONENT_HIGH_WIDTH) | e_high) as u32,
            bottom: ((b_ie << elw) | e_low) as u32,
        },
        exponent: e as u8,
        alignment_mask: mask(F::LEN_WIDTH) & !mask(e + elw),
        exact: !(lost_base || lost_top),
    }
}

/// Decode `enc` as if it were stored with `cursor`.
pub fn decode_bounds<F: CompressedCapability>(enc: EncodedBounds, cursor: u128) -> DecodedBounds {
    compute_base_top::<F>(extract_bounds_bits::<F>(enc), cursor)
}

#[cfg(test)]
mod test {
    use assert_hex::assert_eq_hex;

    use crate::capability::{cc128::Cc128, cc64::Cc64};

    use super::*;

    #[test]
    fn top_bits_are_inferred() {
        let bits = extract_bounds_bits::<Cc128>(EncodedBounds { internal_exponent: false, top: 0x0010, bottom: 0x3000 });
        assert_eq_hex!(bits.t, 0x3010);

        // T's low bits are below B's, so T carried into the next window and its top bits wrap from 0b11 to 0b00
        let bits = extract_bounds_bits::<Cc128>(EncodedBounds { internal_exponent: false, top: 0x0010, bottom: 0x3800 });
        assert_eq_hex!(bits.t, 0x0010);
        assert!(!bits.ie);

        let bits = extract_bounds_bits::<Cc128>(EncodedBounds { internal_exponent: false, top: 0x0fff, bottom: 0x1000 });
        assert_eq_hex!(bits.t, 0x1fff);
    }

    #[test]
    fn internal_exponent_is_unfolded() {
        // e = 0b101_011 = 43
        let bits = extract_bounds_bits::<Cc128>(EncodedBounds { internal_exponent: true, top: 0x0105, bottom: 0x0043 });
        assert_eq!(bits.e, 43);
        assert_eq_hex!(bits.b, 0x0040);
        // Low three bits of T are zero, and the implied leading one sets bit MW-2
        assert_eq_hex!(bits.t, 0x1100);
    }

    #[test]
    fn full_address_space_decodes_from_any_cursor() {
        let enc = compute_ebt::<Cc128>(0, 1 << 64);
        assert!(enc.exact);
        for cursor in [0, 0x1000, u64::MAX as u128, 0x8000_0000_0000_0000] {
            let dec = decode_bounds::<Cc128>(enc.bounds, cursor);
            assert_eq_hex!(dec.base, 0);
            assert_eq_hex!(dec.top, 1 << 64);
            assert!(dec.valid);
        }

        let enc = compute_ebt::<Cc64>(0, 1 << 32);
        assert!(enc.exact);
        let dec = decode_bounds::<Cc64>(enc.bounds, 0xdead_beef);
        assert_eq_hex!(dec.base, 0);
        assert_eq_hex!(dec.top, 1 << 32);
    }

    #[test]
    fn small_lengths_do_not_use_internal_exponent() {
        let enc = compute_ebt::<Cc128>(0x1234, 0x1234 + 0xfff);
        assert!(!enc.bounds.internal_exponent);
        assert!(enc.exact);
        assert_eq_hex!(enc.alignment_mask, (1u128 << 65) - 1);

        let enc = compute_ebt::<Cc128>(0x1000, 0x2000);
        assert!(enc.bounds.internal_exponent);
        assert_eq!(enc.exponent, 0);
        assert!(enc.exact);
    }

    #[test]
    fn rounding_increments_exponent() {
        // Length 0x3fff with a misaligned base rounds up past 2^14, so the mantissa overflows into e+1
        let enc = compute_ebt::<Cc128>(0x1, 0x4000);
        assert!(!enc.exact);
        assert_eq!(enc.exponent, 2);
        let dec = decode_bounds::<Cc128>(enc.bounds, 0x1);
        assert_eq_hex!(dec.base, 0);
        assert_eq_hex!(dec.top, 0x4000);
    }

    #[test]
    fn cursor_region_selects_lap() {
        let enc = compute_ebt::<Cc64>(0x7f00_0000, 0x8100_0000);
        assert!(enc.exact);
        // A cursor just below base still lands in the representable region
        let dec = decode_bounds::<Cc64>(enc.bounds, 0x7eff_0000);
        assert_eq_hex!(dec.base, 0x7f00_0000);
        assert_eq_hex!(dec.top, 0x8100_0000);
        // A cursor far away decodes to a different lap
        let dec = decode_bounds::<Cc64>(enc.bounds, 0x1000_0000);
        assert_ne!(dec.base, 0x7f00_0000);
    }

    #[test]
    fn region_from_tags() {
        assert_eq!(Region::new(false, true), Region::Behind);
        assert_eq!(Region::new(true, false), Region::Ahead);
        assert_eq!(Region::new(true, true), Region::Same);
        assert_eq!(Region::new(false, false), Region::Same);

        assert_eq!(5u128.wrapping_add(Region::Behind.offset()), 4);
        assert_eq!(5u128.wrapping_add(Region::Same.offset()), 5);
        assert_eq!(5u128.wrapping_add(Region::Ahead.offset()), 6);
    }

    #[test]
    fn top_correction_wraps_past_end_of_address_space() {
        // [0xffff_fff0, 0x1_0000_0010) straddles the end of the address space.
        // From a cursor at the bottom of the address space, top decodes into the low lap and has to be pushed back up.
        let enc = EncodedBounds { internal_exponent: false, top: 0x10, bottom: 0xf0 };
        for cursor in [0x8, 0xffff_fff8] {
            let dec = decode_bounds::<Cc64>(enc, cursor);
            assert_eq_hex!(dec.base, 0xffff_fff0);
            assert_eq_hex!(dec.top, 0x1_0000_0010);
            assert!(!dec.valid);
        }
    }

    #[test]
    fn top_correction_stops_below_max_exponent() {
        // B's tag is high and the cursor's is low, so base comes from the lap behind the cursor
        let bits = |e| BoundsBits { b: 0xf0, t: 0x10, e, ie: true };

        let dec = compute_base_top::<Cc64>(bits(Cc64::MAX_EXPONENT as u8 - 2), 0);
        assert_eq_hex!(dec.base, 0xf000_0000);
        assert_eq_hex!(dec.top, 0x1_1000_0000);

        // From MAX_EXPONENT - 1 up the mantissa covers the whole address space and top is left alone
        let dec = compute_base_top::<Cc64>(bits(Cc64::MAX_EXPONENT as u8 - 1), 0);
        assert_eq_hex!(dec.base, 0xe000_0000);
        assert_eq_hex!(dec.top, 0x2000_0000);
        assert!(!dec.valid);
    }
}
