use assert_hex::assert_eq_hex;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::capability::{CapBoundsErr, CapSealErr, Capability, CompressedCapability};

use super::{Cc128, Cc128Bitfield};

type Cap = Capability<Cc128>;

fn bounded(base: u64, top: u128) -> (Cap, bool) {
    let mut cap = Cc128::null_cap();
    cap.set_address_unchecked(base);
    Cc128::setbounds(&cap, base, top)
}

fn check_round_trip(cap: &Cap) {
    let pesbt = Cc128::compress_raw(cap);
    let decoded = Cc128::decompress_raw(pesbt, cap.address(), cap.tag());
    assert_eq_hex!(decoded.base(), cap.base());
    assert_eq_hex!(decoded.top(), cap.top());
    assert_eq!(&decoded, cap);
}

#[test]
fn null_cap_encoding() {
    let null = Cc128::null_cap();
    assert_eq_hex!(Cc128::compress_raw(&null), 0x0000_1fff_fc01_8004);
    assert_eq_hex!(Cc128::compress_mem(&null), 0);
    assert_eq_hex!(null.base(), 0);
    assert_eq_hex!(null.top(), 1 << 64);
    assert_eq!(null.otype(), Cc128::OTYPE_UNSEALED);
    assert_eq!(null.permissions(), 0);
    assert_eq!(null.user_permissions(), 0);
    assert!(!null.tag());
    assert!(null.bounds_valid());
    assert_eq!(null.exponent(), 52);
    assert_eq!(Cap::default(), null);
}

#[test]
fn raw_zero_differs_from_mem_zero() {
    let raw = Cc128::decompress_raw(0, 0, false);
    let mem = Cc128::decompress_mem(0, 0, false);
    assert_ne!(raw, mem);
    // All-zero raw bits are a sealed, zero-length capability
    assert_eq!(raw.otype(), 0);
    assert!(raw.is_sealed());
    assert_eq_hex!(raw.top(), 0);
    assert_eq_hex!(mem.top(), 1 << 64);
}

#[test]
fn field_positions() {
    let mut cap = Cc128::null_cap();
    cap.set_user_permissions(0xf);
    cap.set_permissions(Cc128::PERM_LOAD | Cc128::PERM_STORE);
    cap.set_reserved(0b11);
    cap.set_flags(1);
    assert_eq_hex!(Cc128::compress_raw(&cap), 0xf00c_ffff_fc01_8004);

    let bf = Cc128Bitfield::new(Cc128::compress_raw(&cap));
    assert_eq_hex!(bf.user_permissions(), 0xf);
    assert_eq_hex!(bf.permissions(), 0xc);
    assert_eq_hex!(bf.otype(), 0x3ffff);
    assert_eq_hex!(bf.internal_exponent(), 1);
}

#[test]
fn setters_truncate_to_field_width() {
    let mut cap = Cc128::null_cap();
    cap.set_permissions(0xffff_ffff);
    cap.set_user_permissions(0xff);
    cap.set_otype(0xfff_ffff);
    cap.set_flags(0xff);
    cap.set_reserved(0xff);
    assert_eq_hex!(cap.permissions(), 0xfff);
    assert_eq_hex!(cap.user_permissions(), 0xf);
    assert_eq_hex!(cap.otype(), 0x3ffff);
    assert_eq_hex!(cap.flags(), 1);
    assert_eq_hex!(cap.reserved(), 0b11);
}

#[test]
fn power_of_two_region_is_exact() {
    let (cap, exact) = bounded(0x1000, 0x2000);
    assert!(exact);
    assert_eq_hex!(cap.base(), 0x1000);
    assert_eq_hex!(cap.top(), 0x2000);
    assert_eq_hex!(Cc128::compress_raw(&cap), 0x0000_1fff_fc00_1000);
    assert!(cap.is_exact());
    check_round_trip(&cap);
}

#[test]
fn unaligned_region_widens() {
    let (cap, exact) = bounded(0x1001, 0x2001);
    assert!(!exact);
    assert_eq_hex!(cap.base(), 0x1000);
    assert_eq_hex!(cap.top(), 0x2008);
    // The request was inexact, but the widened bounds themselves are representable
    assert!(cap.is_exact());
    check_round_trip(&cap);
}

#[test]
fn lengths_below_mantissa_range_are_always_exact() {
    // Less than 2^12 bytes needs no exponent, whatever the alignment
    let (cap, exact) = bounded(0x1000, 0x1fff);
    assert!(exact);
    assert_eq_hex!(cap.top(), 0x1fff);

    let (cap, exact) = bounded(0xffff_ffff_ffff_f001, 0x1_0000_0000_0000_0000);
    assert!(exact);
    assert_eq_hex!(cap.base(), 0xffff_ffff_ffff_f001);
    check_round_trip(&cap);
}

#[test]
fn representable_lengths() {
    assert_eq_hex!(Cc128::get_representable_length(0x1001), 0x1008);
    assert_eq_hex!(Cc128::get_required_alignment(0x1001), 8);
    assert_eq_hex!(Cc128::get_alignment_mask(0x1001), 0x1_ffff_ffff_ffff_fff8);

    assert_eq_hex!(Cc128::get_representable_length(0xfff), 0xfff);
    assert_eq_hex!(Cc128::get_required_alignment(0xfff), 1);
    assert_eq_hex!(Cc128::get_alignment_mask(0xfff), 0x1_ffff_ffff_ffff_ffff);

    assert_eq_hex!(Cc128::get_representable_length(0x3fff), 0x4000);
    assert_eq_hex!(Cc128::get_required_alignment(0x3fff), 32);
    assert_eq_hex!(Cc128::get_representable_length(0x4000), 0x4000);

    assert_eq_hex!(Cc128::get_representable_length(u64::MAX as u128), 1 << 64);
    assert_eq_hex!(Cc128::get_representable_length(1 << 64), 1 << 64);
}

#[test]
fn aligned_representable_lengths_are_exact() {
    // Sweep every exponent, with lengths just above each power of two
    for pow2 in 12..64 {
        for extra in [0u128, 1, 0x7f, 0xfff] {
            let length = (1u128 << pow2) + extra;
            let rep_len = Cc128::get_representable_length(length);
            let align = Cc128::get_required_alignment(length);
            assert!(rep_len >= length);
            assert_eq!(Cc128::get_representable_length(rep_len), rep_len);

            let base = (0x1234_5678_9abc_def0u128 & !(align - 1)) as u64 & !(1 << 63);
            let (cap, exact) = bounded(base, base as u128 + rep_len);
            assert!(exact, "length {length:#x} -> {rep_len:#x} at base {base:#x} wasn't exact");
            check_round_trip(&cap);
        }
    }
}

#[test]
fn max_perms_cap() {
    let cap = Cc128::make_max_perms_cap(0, 0, 0x10000);
    assert!(cap.tag());
    assert_eq_hex!(cap.permissions(), Cc128::PERMS_ALL);
    assert!(cap.has_permissions(Cc128::PERM_LOAD | Cc128::PERM_STORE | Cc128::PERM_EXECUTE | Cc128::PERM_SETCID));
    assert_eq_hex!(cap.user_permissions(), 0xf);
    assert_eq!(cap.otype(), Cc128::OTYPE_UNSEALED);
    assert!(!cap.is_sealed());
    assert_eq_hex!(cap.base(), 0);
    assert_eq_hex!(cap.top(), 0x10000);
    assert!(cap.is_exact());
    check_round_trip(&cap);
}

#[test]
fn max_perms_cap_cursor_placement() {
    // Inside the representable region [0x800, 0x4800) of [0x1000, 0x2000), but out of bounds
    let cap = Cc128::make_max_perms_cap(0x1000, 0x2400, 0x2000);
    assert!(cap.tag());
    assert_eq_hex!(cap.address(), 0x2400);
    assert_eq_hex!(cap.base(), 0x1000);
    assert_eq_hex!(cap.top(), 0x2000);

    // Far outside it, the bounds no longer decode to what was asked for so the capability is untagged
    let cap = Cc128::make_max_perms_cap(0x1000, 0x10_0000, 0x2000);
    assert!(!cap.tag());
    assert_eq_hex!(cap.address(), 0x10_0000);
    assert_ne!(cap.base(), 0x1000);
    assert_eq_hex!(cap.permissions(), Cc128::PERMS_ALL);
}

#[test]
fn new_addr_representability() {
    // [0x1000, 0x2000) has E = 0 and B[13:11] = 2, so the representable region starts at 0x800 and spans 2^14
    let check = |new_cursor: u64, expected: bool| {
        let fast = Cc128::is_representable_new_addr(false, 0x1000, 0x1000, 0x1000, new_cursor);
        let precise = Cc128::is_representable_new_addr_precise(false, 0x1000, 0x1000, 0x1000, new_cursor);
        assert_eq!(fast, expected, "fast path for {new_cursor:#x}");
        assert_eq!(precise, expected, "precise path for {new_cursor:#x}");
    };
    check(0x1800, true);
    check(0x2400, true);
    check(0x800, true);
    check(0x47ff, true);
    check(0x4800, false);
    check(0x7ff, false);
    check(0xffff_ffff_ffff_f000, false);
    // Sealing doesn't matter for this format
    assert!(Cc128::is_representable_new_addr(true, 0x1000, 0x1000, 0x1000, 0x1800));
}

#[test]
fn set_address_out_of_region_clears_tag() {
    let mut cap = Cc128::make_max_perms_cap(0x1000, 0x1000, 0x2000);
    assert!(cap.set_address(0x2400));
    assert!(cap.tag());
    assert_eq_hex!(cap.offset(), 0x1400);
    assert!(!cap.in_bounds(0x2400, 1));

    assert!(!cap.set_address(0x4800));
    assert!(!cap.tag());
    assert_ne!(cap.base(), 0x1000);
}

#[test]
fn offsets_wrap() {
    let mut cap = Cc128::make_max_perms_cap(0x1000, 0x1000, 0x2000);
    assert!(cap.inc_address(0x10));
    assert_eq_hex!(cap.address(), 0x1010);
    assert!(cap.inc_address(u64::MAX));
    assert_eq_hex!(cap.address(), 0x100f);
    assert!(cap.set_offset(0x20));
    assert_eq_hex!(cap.address(), 0x1020);
    assert!(cap.in_bounds(0x1020, 0xfe0));
    assert!(!cap.in_bounds(0x1020, 0xfe1));
}

#[test]
fn set_bounds_exact() -> Result<(), CapBoundsErr> {
    let mut cap = Cc128::make_max_perms_cap(0, 0, 1 << 64);
    cap.set_bounds_exact(0x1000, 0x2000)?;
    assert_eq!(cap.bounds().to_string(), "[1000, 2000)");

    let before = cap;
    assert_eq!(cap.set_bounds_exact(0x1001, 0x2001), Err(CapBoundsErr::Unrepresentable));
    assert_eq!(cap.set_bounds_exact(0x2001, 0x2000), Err(CapBoundsErr::InvertedBounds));
    assert_eq!(cap.set_bounds_exact(0, (1 << 64) + 1), Err(CapBoundsErr::TopOutOfRange));
    assert_eq!(cap, before);
    Ok(())
}

#[test]
fn sealing() -> Result<(), CapSealErr> {
    let mut cap = Cc128::make_max_perms_cap(0, 0, 0x1000);
    assert_eq!(cap.seal(Cc128::OTYPE_SENTRY), Err(CapSealErr::ReservedOtype(Cc128::OTYPE_SENTRY)));
    cap.seal(Cc128::MAX_UNRESERVED_OTYPE)?;
    assert!(cap.is_sealed());
    assert!(!cap.has_reserved_otype());
    assert_eq!(cap.seal(0), Err(CapSealErr::AlreadySealed));
    cap.unseal();
    cap.seal_entry()?;
    assert!(cap.has_reserved_otype());
    assert_eq!(cap.otype(), 0x3fffe);
    Ok(())
}

#[test]
fn invalid_exponent_decodes_invalid_bounds() {
    let pesbt = (1 << 26) | (0b111 << 14) | 0b111;
    let bits = Cc128::extract_bounds_bits(pesbt);
    assert_eq!(bits.e, 63);
    assert!(bits.ie);
    let cap = Cc128::decompress_raw(pesbt, 0, true);
    assert!(!cap.bounds_valid());
    assert!(!cap.is_exact());
    assert_eq!(cap.length(), 0);
    assert!(!cap.is_representable_with_new_addr(1));
    // Still round trips bit-for-bit
    assert_eq_hex!(Cc128::compress_raw(&cap), pesbt);
}

#[test]
fn random_words_round_trip() {
    let mut rng = StdRng::seed_from_u64(0xcc128);
    for _ in 0..10_000 {
        let pesbt: u64 = rng.gen();
        let cursor: u64 = rng.gen();
        let cap = Cc128::decompress_raw(pesbt, cursor, true);
        assert_eq_hex!(Cc128::compress_raw(&cap), pesbt);
        assert_eq_hex!(Cc128::compress_mem(&Cc128::decompress_mem(pesbt, cursor, true)), pesbt);
    }
}

#[test]
fn random_bounds_never_shrink() {
    let mut rng = StdRng::seed_from_u64(128);
    for _ in 0..10_000 {
        let base: u64 = rng.gen();
        let length = rng.gen_range(0..=(u64::MAX - base) as u128 + 1) >> rng.gen_range(0..64u32);
        let top = base as u128 + length;
        let (cap, exact) = bounded(base, top);
        assert!(cap.base() <= base);
        assert!(cap.top() >= top);
        assert_eq!(exact, cap.base() == base && cap.top() == top);
        check_round_trip(&cap);
    }
}
