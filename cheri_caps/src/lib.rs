//! Encoding and decoding of CHERI compressed capabilities.
//!
//! Two formats are provided, [capability::cc64::Cc64] (32-bit addresses packed with metadata into a 64-bit capability)
//! and [capability::cc128::Cc128] (64-bit addresses, 128-bit capability).
//! Both share one generic implementation of the floating-point bounds encoding, parameterised by
//! [capability::CompressedCapability].
//!
//! The `rand` feature adds random capability generation in [capability::rand]. Tests always build with it.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod capability;
pub mod num;
pub mod util;
