//! Byte-array blinding (spec §4.6): wraps plaintext in random-length random
//! prefixes/suffixes so the ciphertext length leaks nothing about the true
//! plaintext length up to roughly 29 bytes.
//!
//! Layout: `prefix_len(1) | suffix_len(1) | packed_len(1..4) | prefix |
//! plaintext | suffix`.

use crate::error::{ensure, Result, TupwError};
use crate::packed_uint;
use crate::rng;

/// Hard cap on the "minimum blinding length" parameter, matching the
/// original's input validation (spec §9 Open Questions). The core never
/// requests more than `block_size + 1`, but callers of this module directly
/// (e.g. tests) are still bound by the cap.
pub const MIN_BLIND_LEN_CAP: usize = 256;

const MAX_BASE_BLIND_LEN: u32 = 15;
const MAX_SIDE_LEN: u32 = 255;

/// Builds a blinded byte array from `src`, padding with random prefix and
/// suffix bytes until the total length is at least `min_len`.
///
/// # Errors
/// Returns `Argument` if `min_len` exceeds [`MIN_BLIND_LEN_CAP`].
pub fn build(src: &[u8], min_len: usize) -> Result<Vec<u8>> {
    ensure!(
        min_len <= MIN_BLIND_LEN_CAP,
        Argument,
        format!("minimum blind length {min_len} exceeds the cap of {MIN_BLIND_LEN_CAP}")
    );

    let packed_len = packed_uint::from_int(src.len() as u32)?;

    let mut prefix_len = rng::uniform_u32(0, MAX_BASE_BLIND_LEN);
    let mut suffix_len = rng::uniform_u32(0, MAX_BASE_BLIND_LEN);

    let fixed_len = 2 + packed_len.len() + src.len();
    let mut total = fixed_len + prefix_len as usize + suffix_len as usize;

    // Grow prefix/suffix symmetrically, alternating which side absorbs an
    // odd remainder, until the declared minimum is met.
    let mut grow_prefix_next = true;
    while total < min_len {
        if grow_prefix_next && prefix_len < MAX_SIDE_LEN {
            prefix_len += 1;
            total += 1;
        } else if suffix_len < MAX_SIDE_LEN {
            suffix_len += 1;
            total += 1;
        } else if prefix_len < MAX_SIDE_LEN {
            prefix_len += 1;
            total += 1;
        } else {
            break;
        }
        grow_prefix_next = !grow_prefix_next;
    }

    let mut out = Vec::with_capacity(total);
    out.push(prefix_len as u8);
    out.push(suffix_len as u8);
    out.extend_from_slice(&packed_len);
    let prefix_start = out.len();
    out.resize(out.len() + prefix_len as usize, 0);
    rng::fill(&mut out[prefix_start..]);
    out.extend_from_slice(src);
    let suffix_start = out.len();
    out.resize(out.len() + suffix_len as usize, 0);
    rng::fill(&mut out[suffix_start..]);

    Ok(out)
}

/// Recovers the original plaintext from a blinded byte array built by
/// [`build`].
///
/// # Errors
/// Returns `Integrity` if the declared field lengths do not exactly
/// account for `src`'s length.
pub fn unblind(src: &[u8]) -> Result<Vec<u8>> {
    ensure!(src.len() >= 3, Integrity, "Invalid blinded byte array");
    let prefix_len = src[0] as usize;
    let suffix_len = src[1] as usize;
    let (value_len, packed_len_size) = packed_uint::to_int(src, 2)
        .map_err(|_| TupwError::Integrity("Invalid blinded byte array".into()))?;
    let value_len = value_len as usize;

    let header_len = 2 + packed_len_size;
    let expected_total = header_len + prefix_len + value_len + suffix_len;
    ensure!(expected_total == src.len(), Integrity, "Invalid blinded byte array");

    let start = header_len + prefix_len;
    Ok(src[start..start + value_len].to_vec())
}
