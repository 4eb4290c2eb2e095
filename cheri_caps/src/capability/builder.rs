use crate::num::CapInt;

use super::{
    bounds::{compute_ebt, decode_bounds},
    Capability, CompressedCapability,
};

pub fn setbounds<F: CompressedCapability>(cap: &Capability<F>, req_base: u128, req_top: u128) -> (Capability<F>, bool) {
    let enc = compute_ebt::<F>(req_base, req_top);
    // Decode relative to the new base, which is always inside the new representable region
    let dec = decode_bounds::<F>(enc.bounds, req_base);
    let exact = dec.base == req_base && dec.top == req_top;
    debug_assert_eq!(exact, enc.exact, "encoder and decoder disagree on exactness of [{req_base:#x}, {req_top:#x})");
    debug_assert!(dec.base <= req_base && dec.top >= req_top, "[{req_base:#x}, {req_top:#x}) was narrowed");

    let mut new_cap = *cap;
    new_cap.replace_bounds(enc.bounds, dec);
    (new_cap, exact)
}

/// The bounds are set with the cursor at `base`, then the cursor is moved with [Capability::set_address].
/// A cursor outside the representable region of those bounds therefore clears the tag.
pub fn make_max_perms_cap<F: CompressedCapability>(base: u128, cursor: F::Addr, top: u128) -> Capability<F> {
    let mut cap = F::null_cap();
    cap.set_permissions(F::PERMS_ALL);
    cap.set_user_permissions(F::UPERMS_ALL);
    cap.set_otype(F::OTYPE_UNSEALED);
    cap.set_tag(true);
    cap.set_address_unchecked(F::Addr::from_u128(base));
    let (mut cap, _) = setbounds(&cap, base, top);
    cap.set_address(cursor);
    cap
}
