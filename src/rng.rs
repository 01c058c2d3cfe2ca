//! Thin facade over the system CSPRNG (spec §4.1).
//!
//! Wraps `rand`'s `OsRng` and adds unbiased uniform-range sampling via
//! rejection sampling against a bitmask, rather than a modulo reduction
//! (which would skew the distribution whenever `(to - from) + 1` does not
//! evenly divide the sampler's range).

use rand::RngCore;

/// Fills `buf` with cryptographically secure random bytes.
pub fn fill(buf: &mut [u8]) {
    rand::rngs::OsRng.fill_bytes(buf);
}

/// Fills `buf` with cryptographically secure random *non-zero* bytes.
/// Each byte is redrawn until it is non-zero; used where a zero byte would
/// be indistinguishable from un-initialized storage to a casual reader.
pub fn non_zero_fill(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        loop {
            let mut one = [0u8; 1];
            rand::rngs::OsRng.fill_bytes(&mut one);
            if one[0] != 0 {
                *byte = one[0];
                break;
            }
        }
    }
}

/// Draws a uniform `u32` in the inclusive range `[from, to]` without modulo
/// bias. `from` must be `<= to`.
#[must_use]
pub fn uniform_u32(from: u32, to: u32) -> u32 {
    debug_assert!(from <= to);
    let span = to - from;
    if span == 0 {
        return from;
    }
    let mask = bitmask_for(u64::from(span));
    loop {
        let draw = u64::from(draw_u32()) & mask;
        if draw <= u64::from(span) {
            return from + draw as u32;
        }
    }
}

/// Draws a uniform `i64` in the inclusive range `[from, to]` without modulo
/// bias. Handles ranges that straddle zero by performing the draw over the
/// unsigned span `to - from` (computed in `u64` so it cannot overflow even
/// when `from` is `i64::MIN`) and adding it back onto `from`.
#[must_use]
pub fn uniform_i64(from: i64, to: i64) -> i64 {
    debug_assert!(from <= to);
    let span = (to as i128 - from as i128) as u64;
    if span == 0 {
        return from;
    }
    let mask = bitmask_for(span);
    loop {
        let draw = draw_u64() & mask;
        if draw <= span {
            return ((from as i128) + draw as i128) as i64;
        }
    }
}

/// Smallest all-ones bitmask that fully covers `span` (i.e. `2^k - 1 >= span`).
fn bitmask_for(span: u64) -> u64 {
    if span == u64::MAX {
        return u64::MAX;
    }
    let bits = 64 - (span + 1).leading_zeros();
    (1u64 << bits) - 1
}

fn draw_u32() -> u32 {
    rand::rngs::OsRng.next_u32()
}

fn draw_u64() -> u64 {
    rand::rngs::OsRng.next_u64()
}
