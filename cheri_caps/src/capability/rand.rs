//! Random capability generation, for test vectors and randomized tests.

use core::ops::RangeInclusive;

use rand::{
    distributions::{uniform::SampleUniform, Distribution, Standard},
    Rng,
};

use crate::num::CapInt;

use super::{Capability, CompressedCapability, RawFields};

#[derive(Debug, Clone, Copy)]
pub enum ChooseRand<T>
where
    T: core::fmt::Debug + SampleUniform + core::cmp::PartialOrd,
    Standard: Distribution<T>,
{
    Any,
    /// Uniform distribution sampling over inclusive range (.0)..=(.1)
    Between(T, T),
}
impl<T> ChooseRand<T>
where
    T: core::fmt::Debug + SampleUniform + core::cmp::PartialOrd,
    Standard: Distribution<T>,
{
    pub fn sample<R: Rng>(self, rng: &mut R) -> T {
        match self {
            ChooseRand::Any => rng.gen(),
            ChooseRand::Between(a, b) => {
                if a > b {
                    panic!("Cannot ChooseRand::Between({:?}, {:?}) where a > b", a, b);
                } else if a == b {
                    a
                } else {
                    rng.gen_range(a..=b)
                }
            }
        }
    }
}

pub fn choose_from<T: Copy, R: Rng>(rng: &mut R, array: &[T]) -> T {
    array[rng.gen_range(0..array.len())]
}

/// A compressed word, the cursor and tag stored alongside it, and what they should decompress to.
#[derive(Debug, Clone, Copy)]
pub struct CapTestCase<F: CompressedCapability> {
    pub pesbt: F::Addr,
    pub cursor: F::Addr,
    pub tag: bool,
    pub expected: Capability<F>,
    /// The bounds passed to setbounds, if the capability was made that way
    pub requested: Option<(F::Addr, F::Length)>,
    /// For capabilities made with setbounds, whether the requested bounds were exact.
    /// Otherwise, whether the decoded bounds are exactly representable.
    pub exact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeCase {
    NullCap,
    FullAddressSpace,
    ZeroLength,
    EndOfAddressSpace,
    /// A length of `2^n - 1` at an odd base, which has to round up into the next exponent
    RoundsUpExponent,
    /// Cursor moved to a random address, usually out of the representable region
    CursorOutsideRegion,
    /// Internal exponent set, with an exponent above the maximum
    InvalidExponent,
    SealedEntry,
    /// A rounded-up length at a base aligned with the alignment mask, which is always exact
    AlignedRepresentable,
}
impl EdgeCase {
    pub fn name(&self) -> &'static str {
        match self {
            EdgeCase::NullCap => "null capability",
            EdgeCase::FullAddressSpace => "bounds cover the whole address space",
            EdgeCase::ZeroLength => "zero-length bounds",
            EdgeCase::EndOfAddressSpace => "top at the end of the address space",
            EdgeCase::RoundsUpExponent => "length rounds up to the next exponent",
            EdgeCase::CursorOutsideRegion => "cursor moved to a random address",
            EdgeCase::InvalidExponent => "exponent above the maximum",
            EdgeCase::SealedEntry => "sealed entry",
            EdgeCase::AlignedRepresentable => "aligned base with a representable length",
        }
    }
}

pub const ALL_EDGE_CASES: [EdgeCase; 9] = [
    EdgeCase::NullCap,
    EdgeCase::FullAddressSpace,
    EdgeCase::ZeroLength,
    EdgeCase::EndOfAddressSpace,
    EdgeCase::RoundsUpExponent,
    EdgeCase::CursorOutsideRegion,
    EdgeCase::InvalidExponent,
    EdgeCase::SealedEntry,
    EdgeCase::AlignedRepresentable,
];

pub trait RandCap: CompressedCapability {
    /// The range of values that can be passed into [RandCap::rand_bounded_cap] as len_pow2.
    const LEN_POW2_RANGE: RangeInclusive<u8> = 0..=(Self::ADDR_WIDTH as u8);

    fn rand_addr<R: Rng>(rng: &mut R, choice: ChooseRand<u128>) -> Self::Addr {
        Self::Addr::from_u128(choice.sample(rng))
    }

    /// Record the compressed form of `cap` along with what it decompresses to.
    fn test_case(cap: &Capability<Self>, requested: Option<(u128, u128)>, exact: bool) -> CapTestCase<Self> {
        let pesbt = Self::compress_raw(cap);
        CapTestCase {
            pesbt,
            cursor: cap.address(),
            tag: cap.tag(),
            expected: Self::decompress_raw(pesbt, cap.address(), cap.tag()),
            requested: requested.map(|(base, top)| (Self::Addr::from_u128(base), Self::Length::from_u128(top))),
            exact,
        }
    }

    /// A tagged capability with random fields, where the length is at most `2^len_pow2`.
    fn rand_bounded_cap<R: Rng>(rng: &mut R, len_pow2: Option<u8>) -> CapTestCase<Self> {
        let len_pow2 = len_pow2.unwrap_or_else(|| rng.gen_range(Self::LEN_POW2_RANGE));
        let length = match len_pow2 {
            0 => ChooseRand::Between(0, 1).sample(rng),
            n => ChooseRand::Between(1u128 << (n - 1), 1u128 << n).sample(rng),
        };
        let base = ChooseRand::Between(0, (1u128 << Self::ADDR_WIDTH) - length).sample(rng);
        Self::bounded_test_case(rng, base, base + length)
    }

    /// A tagged capability with random fields, bounded by `[base, top)`, with its cursor somewhere in those bounds.
    fn bounded_test_case<R: Rng>(rng: &mut R, base: u128, top: u128) -> CapTestCase<Self> {
        let mut cap = Self::null_cap();
        cap.set_permissions(rng.gen());
        cap.set_user_permissions(rng.gen());
        cap.set_flags(rng.gen());
        cap.set_reserved(rng.gen());
        if rng.gen() {
            cap.set_otype(rng.gen_range(0..=Self::MAX_UNRESERVED_OTYPE));
        }
        cap.set_tag(true);

        let (mut cap, exact) = Self::setbounds(&cap, Self::Addr::from_u128(base), Self::Length::from_u128(top));
        let cursor = Self::rand_addr(rng, ChooseRand::Between(base, top.saturating_sub(1).max(base)));
        cap.set_address_unchecked(cursor);
        Self::test_case(&cap, Some((base, top)), exact)
    }

    /// A random compressed word and cursor, which may decode to anything.
    fn rand_raw_cap<R: Rng>(rng: &mut R) -> CapTestCase<Self> {
        let pesbt = Self::rand_addr(rng, ChooseRand::Any);
        let cursor = Self::rand_addr(rng, ChooseRand::Any);
        let cap = Self::decompress_raw(pesbt, cursor, rng.gen());
        Self::test_case(&cap, None, Self::is_representable_exact(&cap))
    }

    fn rand_edge_case<R: Rng>(rng: &mut R, edge_case: EdgeCase) -> CapTestCase<Self> {
        let addr_space = 1u128 << Self::ADDR_WIDTH;
        match edge_case {
            EdgeCase::NullCap => {
                let mut cap = Self::null_cap();
                cap.set_address_unchecked(Self::rand_addr(rng, ChooseRand::Any));
                Self::test_case(&cap, None, true)
            }
            EdgeCase::FullAddressSpace => {
                let cap = Self::make_max_perms_cap(Self::Addr::ZERO, Self::rand_addr(rng, ChooseRand::Any), Self::Length::from_u128(addr_space));
                Self::test_case(&cap, Some((0, addr_space)), true)
            }
            EdgeCase::ZeroLength => {
                let base = ChooseRand::Between(0, addr_space - 1).sample(rng);
                Self::bounded_test_case(rng, base, base)
            }
            EdgeCase::EndOfAddressSpace => {
                let len_pow2 = rng.gen_range(0..Self::ADDR_WIDTH);
                let length = ChooseRand::Between(1, 1u128 << len_pow2).sample(rng);
                Self::bounded_test_case(rng, addr_space - length, addr_space)
            }
            EdgeCase::RoundsUpExponent => {
                let len_pow2 = rng.gen_range(Self::MANTISSA_WIDTH..Self::ADDR_WIDTH);
                let length = (1u128 << len_pow2) - 1;
                let base = ChooseRand::Between(0, addr_space - length - 2).sample(rng) | 1;
                Self::bounded_test_case(rng, base, base + length)
            }
            EdgeCase::CursorOutsideRegion => {
                let case = Self::rand_bounded_cap(rng, None);
                let mut cap = case.expected;
                cap.set_address(Self::rand_addr(rng, ChooseRand::Any));
                Self::test_case(&cap, None, Self::is_representable_exact(&cap))
            }
            EdgeCase::InvalidExponent => {
                let e = rng.gen_range((Self::MAX_EXPONENT as u32 + 1)..(1 << (Self::EXPONENT_LOW_WIDTH + Self::EXPONENT_HIGH_WIDTH)));
                let low_mask = (1 << Self::EXPONENT_LOW_WIDTH) - 1;
                let high_mask = (1 << Self::EXPONENT_HIGH_WIDTH) - 1;
                let mut fields: RawFields = Self::unpack_fields(Self::rand_addr(rng, ChooseRand::Any));
                fields.bounds.internal_exponent = true;
                fields.bounds.bottom = (fields.bounds.bottom & !low_mask) | (e & low_mask);
                fields.bounds.top = (fields.bounds.top & !high_mask) | ((e >> Self::EXPONENT_LOW_WIDTH) & high_mask);
                let cap = Self::decompress_raw(Self::pack_fields(&fields), Self::rand_addr(rng, ChooseRand::Any), rng.gen());
                Self::test_case(&cap, None, false)
            }
            EdgeCase::SealedEntry => {
                let case = Self::rand_bounded_cap(rng, None);
                let mut cap = case.expected;
                cap.set_otype(Self::OTYPE_SENTRY);
                let requested = case.requested.map(|(base, top)| (base.to_u128(), top.to_u128()));
                Self::test_case(&cap, requested, case.exact)
            }
            EdgeCase::AlignedRepresentable => {
                let len_pow2 = rng.gen_range(Self::LEN_POW2_RANGE);
                let length = ChooseRand::Between(0, 1u128 << len_pow2).sample(rng);
                let length = Self::Length::from_u128(length);
                let rep_len = Self::get_representable_length(length).to_u128();
                let mask = Self::get_alignment_mask(length).to_u128();
                let base = ChooseRand::Between(0, addr_space - rep_len).sample(rng) & mask;
                Self::bounded_test_case(rng, base, base + rep_len)
            }
        }
    }
}
impl<F: CompressedCapability> RandCap for F {}
