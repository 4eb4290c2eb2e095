//! Representability checks and the alignment/length rounding derived from the bounds encoding.

use crate::util::mask;

use super::{
    bounds::{compute_ebt, decode_bounds, extract_bounds_bits},
    Capability, CompressedCapability, SealedCursorRule,
};

pub fn is_representable_exact<F: CompressedCapability>(cap: &Capability<F>) -> bool {
    if !cap.bounds_valid() {
        return false;
    }
    let (base, top, cursor) = cap.bounds_u128();
    let enc = compute_ebt::<F>(base, top);
    let dec = decode_bounds::<F>(enc.bounds, cursor);
    dec.base == base && dec.top == top
}

/// `Some(result)` if the format's sealing rule decides the answer on its own.
fn sealed_cursor_rule<F: CompressedCapability>(sealed: bool, cursor: u128, new_cursor: u128) -> Option<bool> {
    match F::SEALED_CURSOR_RULE {
        SealedCursorRule::Frozen if sealed => Some(cursor == new_cursor),
        _ => None,
    }
}

/// Fast path.
///
/// Decoding picks the lap of the mantissa window by comparing the cursor against the representable region boundary
/// `R = (B[MW-1:MW-3] - 1) << (MW-3)`, so two cursors decode to the same bounds exactly when
/// `((cursor >> E) - R) >> MW` agrees for both.
/// This only holds while the top correction is active (`E + MW < ADDR_WIDTH`), beyond that the precise check is used.
pub fn is_representable_new_addr<F: CompressedCapability>(sealed: bool, base: u128, length: u128, cursor: u128, new_cursor: u128) -> bool {
    if let Some(result) = sealed_cursor_rule::<F>(sealed, cursor, new_cursor) {
        return result;
    }
    if cursor == new_cursor {
        return true;
    }
    let top = base + length;
    let in_bounds = |a: u128| base <= a && a < top;
    if in_bounds(cursor) && in_bounds(new_cursor) {
        return true;
    }

    let mw = F::MANTISSA_WIDTH;
    let bits = extract_bounds_bits::<F>(compute_ebt::<F>(base, top).bounds);
    let e = (bits.e as usize).min(F::MAX_EXPONENT);
    if e + mw >= F::ADDR_WIDTH {
        return is_representable_new_addr_precise::<F>(sealed, base, length, cursor, new_cursor);
    }

    let r = ((bits.b >> (mw - 3)).wrapping_sub(1) & 0b111) as u128;
    let window = |a: u128| ((a >> e).wrapping_sub(r << (mw - 3)) & mask(F::ADDR_WIDTH - e)) >> mw;
    window(cursor) == window(new_cursor)
}

/// Slow path: decode the bounds with both cursors and compare.
pub fn is_representable_new_addr_precise<F: CompressedCapability>(sealed: bool, base: u128, length: u128, cursor: u128, new_cursor: u128) -> bool {
    if let Some(result) = sealed_cursor_rule::<F>(sealed, cursor, new_cursor) {
        return result;
    }
    let enc = compute_ebt::<F>(base, base + length);
    let old = decode_bounds::<F>(enc.bounds, cursor);
    let new = decode_bounds::<F>(enc.bounds, new_cursor);
    old.base == new.base && old.top == new.top
}

/// `length` must be at most `2^ADDR_WIDTH`.
pub fn alignment_mask<F: CompressedCapability>(length: u128) -> u128 {
    compute_ebt::<F>(0, length).alignment_mask
}

pub fn representable_length<F: CompressedCapability>(length: u128) -> u128 {
    let m = alignment_mask::<F>(length);
    (length + (!m & mask(F::LEN_WIDTH))) & m
}

pub fn required_alignment<F: CompressedCapability>(length: u128) -> u128 {
    (!alignment_mask::<F>(length) & mask(F::LEN_WIDTH)) + 1
}
