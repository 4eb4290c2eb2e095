//! The 128-bit compressed format: a 64-bit address alongside a 64-bit word of metadata.
//!
//! ```text
//!  63   60 59      48 47  46 45 44      27 26 25  14 13   0
//! | uperms | hwperms | res | f | otype    |IE|  T   |  B   |
//! ```
//! With IE set, the bottom three bits of T and B hold the top and bottom halves of a 6-bit exponent.

use bitutils::bf;

use crate::util::mask;

use super::{bounds::EncodedBounds, CompressedCapability, RawFields};

#[cfg(test)]
mod test;

bf!(pub Cc128Bitfield[u64] {
    bottom_encoded: 0:13,
    top_encoded: 14:25,
    internal_exponent: 26:26,
    otype: 27:44,
    flags: 45:45,
    reserved: 46:47,
    permissions: 48:59,
    user_permissions: 60:63
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cc128;

impl CompressedCapability for Cc128 {
    type Addr = u64;
    type Length = u128;

    const NAME: &'static str = "cc128";

    const ADDR_WIDTH: usize = 64;
    const MANTISSA_WIDTH: usize = 14;
    const EXPONENT_LOW_WIDTH: usize = 3;
    const EXPONENT_HIGH_WIDTH: usize = 3;

    const UPERMS_WIDTH: usize = 4;
    const HWPERMS_WIDTH: usize = 12;
    const RESERVED_WIDTH: usize = 2;
    const FLAGS_WIDTH: usize = 1;
    const OTYPE_WIDTH: usize = 18;

    const NULL_XOR_MASK: u64 = 0x0000_1fff_fc01_8004;

    fn unpack_fields(pesbt: u64) -> RawFields {
        let bf = Cc128Bitfield::new(pesbt);
        RawFields {
            user_permissions: bf.user_permissions() as u32,
            permissions: bf.permissions() as u32,
            reserved: bf.reserved() as u8,
            flags: bf.flags() as u8,
            otype: bf.otype() as u32,
            bounds: EncodedBounds {
                internal_exponent: bf.internal_exponent() != 0,
                top: bf.top_encoded() as u32,
                bottom: bf.bottom_encoded() as u32,
            },
        }
    }

    fn pack_fields(fields: &RawFields) -> u64 {
        let field = |val: u32, width: usize| val as u64 & mask(width) as u64;
        let mut bf = Cc128Bitfield::new(0);
        bf.set_user_permissions(field(fields.user_permissions, Self::UPERMS_WIDTH));
        bf.set_permissions(field(fields.permissions, Self::HWPERMS_WIDTH));
        bf.set_reserved(field(fields.reserved as u32, Self::RESERVED_WIDTH));
        bf.set_flags(field(fields.flags as u32, Self::FLAGS_WIDTH));
        bf.set_otype(field(fields.otype, Self::OTYPE_WIDTH));
        bf.set_internal_exponent(fields.bounds.internal_exponent as u64);
        bf.set_top_encoded(field(fields.bounds.top, Self::MANTISSA_WIDTH - 2));
        bf.set_bottom_encoded(field(fields.bounds.bottom, Self::MANTISSA_WIDTH));
        bf.val
    }
}
