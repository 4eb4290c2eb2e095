use crate::{num::CapInt, util::mask};

use super::{
    bounds::{self, BoundsBits, EncodedBounds},
    builder, repr, Capability,
};

/// Every field of a compressed word, unpacked but not interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawFields {
    pub user_permissions: u32,
    pub permissions: u32,
    pub reserved: u8,
    pub flags: u8,
    pub otype: u32,
    pub bounds: EncodedBounds,
}

/// Whether a sealed capability's cursor may move at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealedCursorRule {
    /// Sealing doesn't affect cursor representability.
    Unrestricted,
    /// Any cursor change makes a sealed capability unrepresentable.
    Frozen,
}

/// A compressed capability format.
///
/// Implementors only declare widths and the layout of the compressed word ([CompressedCapability::unpack_fields] and
/// [CompressedCapability::pack_fields]), every other operation is provided.
/// An inconsistent layout fails to compile as soon as any provided operation is used.
///
/// The compressed word is the metadata half of a capability (the "pesbt": permissions, otype, exponent, bottom, top).
/// The other half is the cursor, and the tag is stored out of band.
pub trait CompressedCapability: Sized + Copy + Clone + core::fmt::Debug + PartialEq + Eq + 'static {
    /// Address and compressed-word type, [CompressedCapability::ADDR_WIDTH] bits.
    type Addr: CapInt;
    /// Wide enough for a length of `2^ADDR_WIDTH`.
    type Length: CapInt;

    const NAME: &'static str;

    const ADDR_WIDTH: usize;
    const LEN_WIDTH: usize = Self::ADDR_WIDTH + 1;
    const MANTISSA_WIDTH: usize;
    /// Exponent bits folded into the bottom of the B field when the internal exponent is used
    const EXPONENT_LOW_WIDTH: usize;
    /// Exponent bits folded into the bottom of the T field when the internal exponent is used
    const EXPONENT_HIGH_WIDTH: usize;
    /// The largest meaningful exponent. A length of `2^ADDR_WIDTH` encodes with exactly this exponent.
    const MAX_EXPONENT: usize = Self::LEN_WIDTH - Self::MANTISSA_WIDTH + 1;

    const UPERMS_WIDTH: usize;
    const HWPERMS_WIDTH: usize;
    const RESERVED_WIDTH: usize;
    const FLAGS_WIDTH: usize;
    const OTYPE_WIDTH: usize;

    /// XORed with the raw compressed word when it is stored in memory, so that zeroed memory decodes to the null capability.
    const NULL_XOR_MASK: Self::Addr;
    const SEALED_CURSOR_RULE: SealedCursorRule = SealedCursorRule::Unrestricted;

    const PERM_GLOBAL: u32 = 1 << 0;
    const PERM_EXECUTE: u32 = 1 << 1;
    const PERM_LOAD: u32 = 1 << 2;
    const PERM_STORE: u32 = 1 << 3;
    const PERM_LOAD_CAP: u32 = 1 << 4;
    const PERM_STORE_CAP: u32 = 1 << 5;
    const PERM_STORE_LOCAL: u32 = 1 << 6;
    const PERM_SEAL: u32 = 1 << 7;
    const PERM_CINVOKE: u32 = 1 << 8;
    const PERM_UNSEAL: u32 = 1 << 9;
    const PERM_ACCESS_SYS_REGS: u32 = 1 << 10;
    const PERM_SETCID: u32 = 1 << 11;
    const PERMS_ALL: u32 = mask(Self::HWPERMS_WIDTH) as u32;
    const UPERMS_ALL: u32 = mask(Self::UPERMS_WIDTH) as u32;

    const OTYPE_MAX: u32 = mask(Self::OTYPE_WIDTH) as u32;
    const OTYPE_UNSEALED: u32 = Self::OTYPE_MAX;
    const OTYPE_SENTRY: u32 = Self::OTYPE_MAX - 1;
    const OTYPE_RESERVED2: u32 = Self::OTYPE_MAX - 2;
    const OTYPE_RESERVED3: u32 = Self::OTYPE_MAX - 3;
    const MAX_UNRESERVED_OTYPE: u32 = Self::OTYPE_MAX - 4;

    /// Post-monomorphization layout check, referenced by every provided operation.
    const LAYOUT_CHECK: () = {
        assert!(Self::ADDR_WIDTH == <Self::Addr as CapInt>::BITS, "Addr must be exactly ADDR_WIDTH bits");
        assert!(Self::LEN_WIDTH <= <Self::Length as CapInt>::BITS, "Length must hold LEN_WIDTH bits");
        assert!(Self::LEN_WIDTH < 128, "bounds arithmetic is done in u128");
        assert!(Self::MANTISSA_WIDTH > Self::EXPONENT_LOW_WIDTH + 2, "mantissa too narrow to hold the internal exponent");
        assert!(Self::MANTISSA_WIDTH - 2 > Self::EXPONENT_HIGH_WIDTH + 2, "mantissa too narrow to hold the internal exponent");
        assert!(Self::MANTISSA_WIDTH <= 32, "mantissas are stored in u32");
        assert!(Self::MANTISSA_WIDTH < Self::ADDR_WIDTH);
        assert!(mask(Self::EXPONENT_LOW_WIDTH + Self::EXPONENT_HIGH_WIDTH) >= Self::MAX_EXPONENT as u128, "exponent field can't hold MAX_EXPONENT");
        assert!(Self::HWPERMS_WIDTH >= 12 && Self::HWPERMS_WIDTH <= 32);
        assert!(Self::UPERMS_WIDTH <= 32);
        assert!(Self::OTYPE_WIDTH >= 3 && Self::OTYPE_WIDTH <= 32, "otype must fit the four reserved values");
        assert!(Self::FLAGS_WIDTH <= 8 && Self::RESERVED_WIDTH <= 8);
        assert!(
            Self::UPERMS_WIDTH + Self::HWPERMS_WIDTH + Self::RESERVED_WIDTH + Self::FLAGS_WIDTH + Self::OTYPE_WIDTH
                + 1 + (Self::MANTISSA_WIDTH - 2) + Self::MANTISSA_WIDTH
                == Self::ADDR_WIDTH,
            "fields must exactly fill the compressed word"
        );
    };

    /// Split a raw (not null-masked) compressed word into fields.
    fn unpack_fields(pesbt: Self::Addr) -> RawFields;
    /// Inverse of [CompressedCapability::unpack_fields]. Values wider than their field are truncated.
    fn pack_fields(fields: &RawFields) -> Self::Addr;

    fn compress_raw(cap: &Capability<Self>) -> Self::Addr {
        let _ = Self::LAYOUT_CHECK;
        Self::pack_fields(&cap.raw_fields())
    }

    fn decompress_raw(pesbt: Self::Addr, cursor: Self::Addr, tag: bool) -> Capability<Self> {
        let _ = Self::LAYOUT_CHECK;
        Capability::from_fields(Self::unpack_fields(pesbt), cursor, tag)
    }

    fn compress_mem(cap: &Capability<Self>) -> Self::Addr {
        Self::compress_raw(cap) ^ Self::NULL_XOR_MASK
    }

    fn decompress_mem(pesbt: Self::Addr, cursor: Self::Addr, tag: bool) -> Capability<Self> {
        Self::decompress_raw(pesbt ^ Self::NULL_XOR_MASK, cursor, tag)
    }

    /// The capability that zeroed memory decodes to: untagged, unsealed, no permissions and bounds covering the whole
    /// address space.
    fn null_cap() -> Capability<Self> {
        Self::decompress_mem(Self::Addr::ZERO, Self::Addr::ZERO, false)
    }

    fn extract_bounds_bits(pesbt: Self::Addr) -> BoundsBits {
        let _ = Self::LAYOUT_CHECK;
        bounds::extract_bounds_bits::<Self>(Self::unpack_fields(pesbt).bounds)
    }

    /// Set the bounds of a copy of `cap` to `[req_base, req_top)`, widening them if necessary.
    /// Returns the new capability and whether the bounds are exactly the requested ones.
    ///
    /// Every other field, including the cursor and tag, is preserved.
    fn setbounds(cap: &Capability<Self>, req_base: Self::Addr, req_top: Self::Length) -> (Capability<Self>, bool) {
        let _ = Self::LAYOUT_CHECK;
        builder::setbounds(cap, req_base.to_u128(), req_top.to_u128())
    }

    /// True if encoding the capability's bounds and decoding them again with its cursor gives back the same bounds.
    fn is_representable_exact(cap: &Capability<Self>) -> bool {
        let _ = Self::LAYOUT_CHECK;
        repr::is_representable_exact(cap)
    }

    /// Would a capability with bounds `[base, base + length)` still decode to the same bounds if its cursor moved from
    /// `cursor` to `new_cursor`?
    fn is_representable_new_addr(sealed: bool, base: Self::Addr, length: Self::Length, cursor: Self::Addr, new_cursor: Self::Addr) -> bool {
        let _ = Self::LAYOUT_CHECK;
        repr::is_representable_new_addr::<Self>(sealed, base.to_u128(), length.to_u128(), cursor.to_u128(), new_cursor.to_u128())
    }

    /// [CompressedCapability::is_representable_new_addr], computed by decoding with both cursors and comparing.
    fn is_representable_new_addr_precise(sealed: bool, base: Self::Addr, length: Self::Length, cursor: Self::Addr, new_cursor: Self::Addr) -> bool {
        let _ = Self::LAYOUT_CHECK;
        repr::is_representable_new_addr_precise::<Self>(sealed, base.to_u128(), length.to_u128(), cursor.to_u128(), new_cursor.to_u128())
    }

    /// An unsealed capability with every permission, bounded as closely as possible to `[base, top)`.
    ///
    /// The capability is tagged unless `cursor` is outside the representable region of those bounds, in which case the
    /// bounds decode differently relative to `cursor` and the tag is cleared.
    fn make_max_perms_cap(base: Self::Addr, cursor: Self::Addr, top: Self::Length) -> Capability<Self> {
        let _ = Self::LAYOUT_CHECK;
        builder::make_max_perms_cap(base.to_u128(), cursor, top.to_u128())
    }

    /// The smallest length `>= length` that can be exactly represented, given a suitably aligned base.
    ///
    /// `length` must be at most `2^ADDR_WIDTH`, larger values give meaningless results.
    fn get_representable_length(length: Self::Length) -> Self::Length {
        let _ = Self::LAYOUT_CHECK;
        Self::Length::from_u128(repr::representable_length::<Self>(length.to_u128()))
    }

    /// The alignment a base must have for `get_representable_length(length)` bytes from it to be exactly representable.
    ///
    /// `length` must be at most `2^ADDR_WIDTH`.
    fn get_required_alignment(length: Self::Length) -> Self::Length {
        let _ = Self::LAYOUT_CHECK;
        Self::Length::from_u128(repr::required_alignment::<Self>(length.to_u128()))
    }

    /// A mask which, when ANDed with an address, aligns it down to [CompressedCapability::get_required_alignment].
    ///
    /// `length` must be at most `2^ADDR_WIDTH`.
    fn get_alignment_mask(length: Self::Length) -> Self::Length {
        let _ = Self::LAYOUT_CHECK;
        Self::Length::from_u128(repr::alignment_mask::<Self>(length.to_u128()))
    }
}
