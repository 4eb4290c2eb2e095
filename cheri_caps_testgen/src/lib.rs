//! Generation, encoding and decoding of external test vector files for other capability implementations e.g. Bluespec
//! or Sail harnesses.

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{formats::Lowercase, DeserializeAs, SerializeAs};
use tracing_subscriber::EnvFilter;

use cheri_caps::{
    capability::{
        cc128::Cc128,
        cc64::Cc64,
        rand::{choose_from, CapTestCase, EdgeCase, RandCap, ALL_EDGE_CASES},
        CompressedCapability,
    },
    num::CapInt,
};

#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatVariant {
    Cc64,
    #[default]
    Cc128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RandomCategory {
    /// Tagged capabilities made with setbounds, one batch for each length power of two
    Bounded,
    /// Random compressed words with random cursors
    Raw,
}

pub fn format_len_pow2s(format: FormatVariant) -> core::ops::RangeInclusive<u8> {
    match format {
        FormatVariant::Cc64 => Cc64::LEN_POW2_RANGE,
        FormatVariant::Cc128 => Cc128::LEN_POW2_RANGE,
    }
}

pub fn gen_in_category<R: Rng>(rng: &mut R, format: FormatVariant, category: RandomCategory, len_pow2: Option<u8>) -> CapTestCaseSerDe {
    match (format, category) {
        (FormatVariant::Cc64, RandomCategory::Bounded) => Cc64::rand_bounded_cap(rng, len_pow2).into(),
        (FormatVariant::Cc64, RandomCategory::Raw) => Cc64::rand_raw_cap(rng).into(),
        (FormatVariant::Cc128, RandomCategory::Bounded) => Cc128::rand_bounded_cap(rng, len_pow2).into(),
        (FormatVariant::Cc128, RandomCategory::Raw) => Cc128::rand_raw_cap(rng).into(),
    }
}

pub fn gen_edge<R: Rng>(rng: &mut R, format: FormatVariant, edge_case: EdgeCase) -> CapTestCaseSerDe {
    match format {
        FormatVariant::Cc64 => Cc64::rand_edge_case(rng, edge_case).into(),
        FormatVariant::Cc128 => Cc128::rand_edge_case(rng, edge_case).into(),
    }
}

/// An edge case picked at random for each test.
pub fn gen_any_edge<R: Rng>(rng: &mut R, format: FormatVariant) -> CapTestCaseSerDe {
    let edge_case = choose_from(rng, &ALL_EDGE_CASES);
    gen_edge(rng, format, edge_case)
}

pub fn variant_edge_cases() -> &'static [EdgeCase] {
    &ALL_EDGE_CASES
}

/// Log to stderr, so test vectors written to stdout stay clean.
/// `RUST_LOG` takes priority over the verbosity count.
pub fn init_tracing(verbose: u8) {
    let default_directive = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn serialize_hex_u64<S>(v: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serde_with::hex::Hex::<Lowercase>::serialize_as(&u64::to_be_bytes(*v), serializer)
}

fn deserialize_hex_u64<'de, D>(deserializer: D) -> Result<u64, D::Error> where D: Deserializer<'de> {
    let bytes: [u8; 8] = serde_with::hex::Hex::<Lowercase>::deserialize_as(deserializer)?;
    Ok(u64::from_be_bytes(bytes))
}

fn serialize_hex_u128<S>(v: &u128, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serde_with::hex::Hex::<Lowercase>::serialize_as(&u128::to_be_bytes(*v), serializer)
}

fn deserialize_hex_u128<'de, D>(deserializer: D) -> Result<u128, D::Error> where D: Deserializer<'de> {
    let bytes: [u8; 16] = serde_with::hex::Hex::<Lowercase>::deserialize_as(deserializer)?;
    Ok(u128::from_be_bytes(bytes))
}

/// One line of a test vector file.
///
/// Words and addresses are zero-extended to 64 bits and tops to 128 bits regardless of format, so files for both formats
/// share a column layout.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct CapTestCaseSerDe {
    format: FormatVariant,

    #[serde(serialize_with = "serialize_hex_u64", deserialize_with = "deserialize_hex_u64")]
    pesbt: u64,
    #[serde(serialize_with = "serialize_hex_u64", deserialize_with = "deserialize_hex_u64")]
    cursor: u64,
    tag: bool,

    /// Zero unless the capability was made with setbounds
    #[serde(serialize_with = "serialize_hex_u64", deserialize_with = "deserialize_hex_u64")]
    requested_base: u64,
    #[serde(serialize_with = "serialize_hex_u128", deserialize_with = "deserialize_hex_u128")]
    requested_top: u128,
    exact: bool,

    #[serde(serialize_with = "serialize_hex_u64", deserialize_with = "deserialize_hex_u64")]
    base: u64,
    #[serde(serialize_with = "serialize_hex_u128", deserialize_with = "deserialize_hex_u128")]
    top: u128,
    bounds_valid: bool,
    exponent: u8,
    perms: u32,
    uperms: u32,
    otype: u32,
    flags: u8,
    reserved: u8,
}
impl CapTestCaseSerDe {
    fn from_case<F: CompressedCapability>(format: FormatVariant, value: CapTestCase<F>) -> Self {
        let (requested_base, requested_top) = value.requested.map_or((0, 0), |(base, top)| (base.to_u128(), top.to_u128()));
        let cap = value.expected;
        CapTestCaseSerDe {
            format,
            pesbt: value.pesbt.to_u128() as u64,
            cursor: value.cursor.to_u128() as u64,
            tag: value.tag,
            requested_base: requested_base as u64,
            requested_top,
            exact: value.exact,
            base: cap.base().to_u128() as u64,
            top: cap.top().to_u128(),
            bounds_valid: cap.bounds_valid(),
            exponent: cap.exponent(),
            perms: cap.permissions(),
            uperms: cap.user_permissions(),
            otype: cap.otype(),
            flags: cap.flags(),
            reserved: cap.reserved(),
        }
    }
}
impl From<CapTestCase<Cc64>> for CapTestCaseSerDe {
    fn from(value: CapTestCase<Cc64>) -> Self {
        Self::from_case(FormatVariant::Cc64, value)
    }
}
impl From<CapTestCase<Cc128>> for CapTestCaseSerDe {
    fn from(value: CapTestCase<Cc128>) -> Self {
        Self::from_case(FormatVariant::Cc128, value)
    }
}
