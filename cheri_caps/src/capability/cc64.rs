//! The 64-bit compressed format: a 32-bit address alongside a 32-bit word of metadata.
//!
//! ```text
//!  31      20 19 18  15 14 13  8 7    0
//! | hwperms  | f | otype|IE|  T  |  B  |
//! ```
//! There are no user permissions or reserved bits, both always read as zero.

use bitutils::bf;

use crate::util::mask;

use super::{bounds::EncodedBounds, CompressedCapability, RawFields};


bf!(pub Cc64Bitfield[u32] {
    bottom_encoded: 0:7,
    top_encoded: 8:13,
    internal_exponent: 14:14,
    otype: 15:18,
    flags: 19:19,
    permissions: 20:31
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cc64;

impl CompressedCapability for Cc64 {
    type Addr = u32;
    type Length = u64;

    const NAME: &'static str = "cc64";

    const ADDR_WIDTH: usize = 32;
    const MANTISSA_WIDTH: usize = 8;
    const EXPONENT_LOW_WIDTH: usize = 3;
    const EXPONENT_HIGH_WIDTH: usize = 3;

    const UPERMS_WIDTH: usize = 0;
    const HWPERMS_WIDTH: usize = 12;
    const RESERVED_WIDTH: usize = 0;
    const FLAGS_WIDTH: usize = 1;
    const OTYPE_WIDTH: usize = 4;

    const NULL_XOR_MASK: u32 = 0x0007_c302;

    fn unpack_fields(pesbt: u32) -> RawFields {
        let bf = Cc64Bitfield::new(pesbt);
        RawFields {
            user_permissions: 0,
            permissions: bf.permissions(),
            reserved: 0,
            flags: bf.flags() as u8,
            otype: bf.otype(),
            bounds: EncodedBounds {
                internal_exponent: bf.internal_exponent() != 0,
                top: bf.top_encoded(),
                bottom: bf.bottom_encoded(),
            },
        }
    }

    fn pack_fields(fields: &RawFields) -> u32 {
        let field = |val: u32, width: usize| val & mask(width) as u32;
        let mut bf = Cc64Bitfield::new(0);
        bf.set_permissions(field(fields.permissions, Self::HWPERMS_WIDTH));
        bf.set_flags(field(fields.flags as u32, Self::FLAGS_WIDTH));
        bf.set_otype(field(fields.otype, Self::OTYPE_WIDTH));
        bf.set_internal_exponent(fields.bounds.internal_exponent as u32);
        bf.set_top_encoded(field(fields.bounds.top, Self::MANTISSA_WIDTH - 2));
        bf.set_bottom_encoded(field(fields.bounds.bottom, Self::MANTISSA_WIDTH));
        bf.val
    }
}
