#[cfg(feature = "std")]
use thiserror::Error;

use crate::{num::CapInt, util::mask};

use self::bounds::{decode_bounds, DecodedBounds, EncodedBounds};

pub use self::format::{CompressedCapability, RawFields, SealedCursorRule};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AddrRange<F: CompressedCapability> {
    base: F::Addr,
    top: F::Length,
}
impl<F: CompressedCapability> AddrRange<F> {
    pub fn base_top(base: F::Addr, top: F::Length) -> Self {
        assert!(base.to_u128() <= top.to_u128(), "Can't create an AddrRange with base {base:x} > top {top:x}");
        assert!(top.to_u128() <= 1 << F::ADDR_WIDTH, "Can't create an AddrRange with a top {top:x} beyond the address space");
        Self { base, top }
    }

    pub fn base(&self) -> F::Addr {
        self.base
    }
    pub fn top(&self) -> F::Length {
        self.top
    }
    pub fn len(&self) -> F::Length {
        F::Length::from_u128(self.top.to_u128() - self.base.to_u128())
    }
    pub fn is_empty(&self) -> bool {
        self.top.to_u128() == self.base.to_u128()
    }

    /// Returns true if `self` fully contains the entirety of `other`.
    ///
    /// ```
    /// # use cheri_caps::capability::{AddrRange, cc64::Cc64};
    /// let full = AddrRange::<Cc64>::base_top(0, 1 << 32);
    /// assert!(full.encompasses(&full));
    /// assert!(full.encompasses(&AddrRange::base_top(0x50, 0x100)));
    /// assert!(!AddrRange::<Cc64>::base_top(0, 0x100).encompasses(&AddrRange::base_top(0x50, 0x101)));
    /// ```
    pub fn encompasses(&self, other: &AddrRange<F>) -> bool {
        self.base.to_u128() <= other.base.to_u128() && self.top.to_u128() >= other.top.to_u128()
    }
}
impl<F: CompressedCapability> core::fmt::Display for AddrRange<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{:x}, {:x})", self.base, self.top)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "std", derive(Error))]
pub enum CapBoundsErr {
    #[cfg_attr(feature = "std", error("Requested bounds can only be represented by widening them"))]
    Unrepresentable,
    #[cfg_attr(feature = "std", error("Requested base is above the requested top"))]
    InvertedBounds,
    #[cfg_attr(feature = "std", error("Requested top is beyond the end of the address space"))]
    TopOutOfRange,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "std", derive(Error))]
pub enum CapSealErr {
    #[cfg_attr(feature = "std", error("Object type {0:#x} is reserved"))]
    ReservedOtype(u32),
    #[cfg_attr(feature = "std", error("Capability is already sealed"))]
    AlreadySealed,
}

/// A decompressed capability in format `F`.
///
/// Along with the decoded fields, the bounds exactly as they were encoded are kept so that compressing a decompressed
/// capability reproduces the same word, even for encodings the encoder would never produce.
#[derive(Debug, Clone, Copy)]
pub struct Capability<F: CompressedCapability> {
    address: F::Addr,
    base: F::Addr,
    top: F::Length,
    permissions: u32,
    user_permissions: u32,
    otype: u32,
    flags: u8,
    reserved: u8,
    tag: bool,
    bounds_valid: bool,
    exponent: u8,
    encoded_bounds: EncodedBounds,
}
impl<F: CompressedCapability> Capability<F> {
    pub(crate) fn from_fields(fields: RawFields, cursor: F::Addr, tag: bool) -> Self {
        let mut cap = Self {
            address: cursor,
            base: F::Addr::ZERO,
            top: F::Length::ZERO,
            permissions: fields.permissions & F::PERMS_ALL,
            user_permissions: fields.user_permissions & F::UPERMS_ALL,
            otype: fields.otype & F::OTYPE_MAX,
            flags: fields.flags & mask(F::FLAGS_WIDTH) as u8,
            reserved: fields.reserved & mask(F::RESERVED_WIDTH) as u8,
            tag,
            bounds_valid: false,
            exponent: 0,
            encoded_bounds: fields.bounds,
        };
        cap.redecode_bounds();
        cap
    }

    pub(crate) fn raw_fields(&self) -> RawFields {
        RawFields {
            user_permissions: self.user_permissions,
            permissions: self.permissions,
            reserved: self.reserved,
            flags: self.flags,
            otype: self.otype,
            bounds: self.encoded_bounds,
        }
    }

    pub(crate) fn replace_bounds(&mut self, encoded: EncodedBounds, decoded: DecodedBounds) {
        self.encoded_bounds = encoded;
        self.apply_decoded_bounds(decoded);
    }

    /// `(base, top, address)`
    pub(crate) fn bounds_u128(&self) -> (u128, u128, u128) {
        (self.base.to_u128(), self.top.to_u128(), self.address.to_u128())
    }

    fn apply_decoded_bounds(&mut self, decoded: DecodedBounds) {
        self.base = F::Addr::from_u128(decoded.base);
        self.top = F::Length::from_u128(decoded.top);
        self.bounds_valid = decoded.valid;
        self.exponent = decoded.exponent;
    }

    fn redecode_bounds(&mut self) {
        let decoded = decode_bounds::<F>(self.encoded_bounds, self.address.to_u128());
        self.apply_decoded_bounds(decoded);
    }

    pub fn tag(&self) -> bool {
        self.tag
    }
    pub fn set_tag(&mut self, tag: bool) {
        self.tag = tag
    }
    /// Clear the tag
    pub fn invalidate(&mut self) {
        self.tag = false
    }

    pub fn base(&self) -> F::Addr {
        self.base
    }
    pub fn top(&self) -> F::Length {
        self.top
    }
    /// `top - base`, or zero if the bounds are not valid
    pub fn length(&self) -> F::Length {
        if self.bounds_valid {
            F::Length::from_u128(self.top.to_u128() - self.base.to_u128())
        } else {
            F::Length::ZERO
        }
    }
    /// Panics if the bounds are not valid, see [Capability::bounds_valid].
    pub fn bounds(&self) -> AddrRange<F> {
        AddrRange::base_top(self.base, self.top)
    }
    /// False if the encoded exponent is out of range, or the bounds decoded to something other than
    /// `base <= top <= 2^ADDR_WIDTH`. Only possible for words the encoder didn't produce.
    pub fn bounds_valid(&self) -> bool {
        self.bounds_valid
    }
    pub fn exponent(&self) -> u8 {
        self.exponent
    }

    /// Set the bounds, widening them if necessary. Returns true if the bounds are exactly `[base, top)`.
    ///
    /// `base <= top <= 2^ADDR_WIDTH` is a precondition, use [Capability::set_bounds_exact] for a checked version.
    pub fn set_bounds(&mut self, base: F::Addr, top: F::Length) -> bool {
        let (new_cap, exact) = F::setbounds(self, base, top);
        *self = new_cap;
        exact
    }

    /// Set the bounds to exactly `[base, top)`, leaving the capability untouched if that isn't possible.
    pub fn set_bounds_exact(&mut self, base: F::Addr, top: F::Length) -> Result<(), CapBoundsErr> {
        if base.to_u128() > top.to_u128() {
            return Err(CapBoundsErr::InvertedBounds);
        }
        if top.to_u128() > 1 << F::ADDR_WIDTH {
            return Err(CapBoundsErr::TopOutOfRange);
        }
        let (new_cap, exact) = F::setbounds(self, base, top);
        if !exact {
            return Err(CapBoundsErr::Unrepresentable);
        }
        *self = new_cap;
        Ok(())
    }

    pub fn address(&self) -> F::Addr {
        self.address
    }

    /// Move the cursor without checking representability. The bounds are decoded again relative to the new cursor.
    pub fn set_address_unchecked(&mut self, address: F::Addr) {
        self.address = address;
        self.redecode_bounds();
    }

    /// Move the cursor. If the bounds no longer decode to the same values, the tag is cleared and the bounds take the
    /// values they decode to relative to the new cursor.
    ///
    /// Returns whether the capability stayed representable.
    pub fn set_address(&mut self, address: F::Addr) -> bool {
        let fast_check = self.is_representable_with_new_addr(address);
        let (old_base, old_top) = (self.base, self.top);
        self.set_address_unchecked(address);
        let representable = fast_check && self.base == old_base && self.top == old_top;
        if !representable {
            self.tag = false;
        }
        representable
    }

    /// [Capability::set_address] to `address + delta`, wrapping.
    pub fn inc_address(&mut self, delta: F::Addr) -> bool {
        self.set_address(F::Addr::from_u128(self.address.to_u128().wrapping_add(delta.to_u128())))
    }

    /// `address - base`, wrapping.
    pub fn offset(&self) -> F::Addr {
        F::Addr::from_u128(self.address.to_u128().wrapping_sub(self.base.to_u128()))
    }

    /// [Capability::set_address] to `base + offset`, wrapping.
    pub fn set_offset(&mut self, offset: F::Addr) -> bool {
        self.set_address(F::Addr::from_u128(self.base.to_u128().wrapping_add(offset.to_u128())))
    }

    pub fn is_representable_with_new_addr(&self, address: F::Addr) -> bool {
        self.bounds_valid && F::is_representable_new_addr(self.is_sealed(), self.base, self.length(), self.address, address)
    }

    /// True if `[addr, addr + size)` lies within the bounds.
    pub fn in_bounds(&self, addr: F::Addr, size: F::Length) -> bool {
        let addr = addr.to_u128();
        self.bounds_valid && self.base.to_u128() <= addr && addr + size.to_u128() <= self.top.to_u128()
    }

    pub fn is_exact(&self) -> bool {
        F::is_representable_exact(self)
    }

    pub fn permissions(&self) -> u32 {
        self.permissions
    }
    pub fn set_permissions(&mut self, permissions: u32) {
        self.permissions = permissions & F::PERMS_ALL
    }
    pub fn has_permissions(&self, permissions: u32) -> bool {
        self.permissions & permissions == permissions
    }
    pub fn user_permissions(&self) -> u32 {
        self.user_permissions
    }
    pub fn set_user_permissions(&mut self, user_permissions: u32) {
        self.user_permissions = user_permissions & F::UPERMS_ALL
    }

    pub fn otype(&self) -> u32 {
        self.otype
    }
    pub fn set_otype(&mut self, otype: u32) {
        self.otype = otype & F::OTYPE_MAX
    }
    pub fn is_sealed(&self) -> bool {
        self.otype != F::OTYPE_UNSEALED
    }
    pub fn has_reserved_otype(&self) -> bool {
        self.otype > F::MAX_UNRESERVED_OTYPE
    }
    pub fn seal(&mut self, otype: u32) -> Result<(), CapSealErr> {
        if self.is_sealed() {
            return Err(CapSealErr::AlreadySealed);
        }
        if otype > F::MAX_UNRESERVED_OTYPE {
            return Err(CapSealErr::ReservedOtype(otype));
        }
        self.otype = otype;
        Ok(())
    }
    /// Seal as a sentry (sealed entry) capability
    pub fn seal_entry(&mut self) -> Result<(), CapSealErr> {
        if self.is_sealed() {
            return Err(CapSealErr::AlreadySealed);
        }
        self.otype = F::OTYPE_SENTRY;
        Ok(())
    }
    pub fn unseal(&mut self) {
        self.otype = F::OTYPE_UNSEALED
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }
    pub fn set_flags(&mut self, flags: u8) {
        self.flags = flags & mask(F::FLAGS_WIDTH) as u8
    }
    pub fn reserved(&self) -> u8 {
        self.reserved
    }
    pub fn set_reserved(&mut self, reserved: u8) {
        self.reserved = reserved & mask(F::RESERVED_WIDTH) as u8
    }
}
impl<F: CompressedCapability> PartialEq for Capability<F> {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.address == other.address && F::compress_raw(self) == F::compress_raw(other)
    }
}
impl<F: CompressedCapability> Eq for Capability<F> {}
impl<F: CompressedCapability> Default for Capability<F> {
    fn default() -> Self {
        F::null_cap()
    }
}
impl<F: CompressedCapability> core::fmt::Display for Capability<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {:x} [{:x}, {:x}) perms:{:x}", F::NAME, self.address, self.base, self.top, self.permissions)?;
        if F::UPERMS_WIDTH > 0 {
            write!(f, " uperms:{:x}", self.user_permissions)?;
        }
        if self.is_sealed() {
            write!(f, " otype:{:x}", self.otype)?;
        }
        if !self.bounds_valid {
            write!(f, " (invalid bounds)")?;
        }
        if !self.tag {
            write!(f, " (untagged)")?;
        }
        Ok(())
    }
}

pub mod bounds;
mod builder;
pub mod cc128;
pub mod cc64;
mod format;
#[cfg(feature = "rand")]
pub mod rand;
mod repr;
