//! Constant-time comparison and secure zeroization (spec §4.10 "array helpers").

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Compares two byte slices in constant time. Used for MAC verification
/// only: does not short-circuit on the first mismatch and does not branch
/// on the value of either input.
///
/// Slices of different length are never equal, but the length check itself
/// is not timed against secret data — lengths are not secret here.
#[must_use]
pub fn secure_equals(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Overwrites every byte of `buf` with zero. Not optimized away by the
/// compiler (`zeroize::Zeroize` uses a volatile write internally).
pub fn secure_zero(buf: &mut [u8]) {
    buf.zeroize();
}
