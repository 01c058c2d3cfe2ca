//! Plaintext framing for the legacy and block-aligning padding schemes
//! (spec §4.4, §4.5).

use crate::error::{ensure, Result};
use crate::rng;

/// Removes legacy arbitrary-tail padding (formats 1–2, decrypt only). The
/// last byte `p` names the number of trailing bytes to strip; `p` must be
/// in `1..=block_size` and must not exceed the buffer length.
pub fn unpad_arbitrary_tail(data: &[u8], block_size: usize) -> Result<Vec<u8>> {
    ensure!(!data.is_empty(), Argument, "cannot unpad an empty buffer");
    let p = *data.last().unwrap() as usize;
    ensure!(
        p > 0 && p <= block_size && p <= data.len(),
        Argument,
        format!("invalid arbitrary-tail padding count {p}")
    );
    Ok(data[..data.len() - p].to_vec())
}

/// Appends random bytes so the result's length is a multiple of
/// `block_size`. If `data` is already block-aligned, a full extra block of
/// random bytes is appended — padding is never zero bytes, and a padded
/// buffer is never the same length as an already-aligned input.
#[must_use]
pub fn pad_random(data: &[u8]) -> Vec<u8> {
    pad_random_to_block_size(data, 16)
}

/// Same as [`pad_random`] with an explicit block size, for testing against
/// block sizes other than AES's 16 bytes.
#[must_use]
pub fn pad_random_to_block_size(data: &[u8], block_size: usize) -> Vec<u8> {
    let remainder = data.len() % block_size;
    let pad_len = if remainder == 0 { block_size } else { block_size - remainder };
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    let mut pad = vec![0u8; pad_len];
    rng::fill(&mut pad);
    out.extend_from_slice(&pad);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpad_strips_declared_count() {
        let mut data = vec![1, 2, 3, 4];
        data.push(2);
        assert_eq!(unpad_arbitrary_tail(&data, 16).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn unpad_rejects_zero_count() {
        let data = vec![1, 2, 3, 0];
        assert!(unpad_arbitrary_tail(&data, 16).is_err());
    }

    #[test]
    fn unpad_rejects_count_beyond_block_size() {
        let data = vec![1, 2, 3, 17];
        assert!(unpad_arbitrary_tail(&data, 16).is_err());
    }

    #[test]
    fn unpad_rejects_count_beyond_buffer_length() {
        let data = vec![5];
        assert!(unpad_arbitrary_tail(&data, 16).is_err());
    }

    #[test]
    fn pad_random_aligns_to_block_size() {
        for len in 0..40 {
            let data = vec![0xAAu8; len];
            let padded = pad_random_to_block_size(&data, 16);
            assert_eq!(padded.len() % 16, 0);
            assert!(padded.len() > data.len() || data.len() % 16 != 0 || padded.len() == data.len() + 16);
        }
    }

    #[test]
    fn pad_random_adds_full_block_when_already_aligned() {
        let data = vec![0u8; 32];
        let padded = pad_random_to_block_size(&data, 16);
        assert_eq!(padded.len(), 48);
    }
}
