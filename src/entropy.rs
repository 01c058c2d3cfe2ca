//! Shannon entropy over a byte histogram (spec §4.9), used to reject weak
//! source material before it is mixed into key derivation.

use crate::error::{Result, TupwError};

/// Minimum aggregate Shannon information the engine's source bytes must
/// carry, in bits.
pub const MIN_INFORMATION_BITS: f64 = 128.0;

/// Below this entropy (bits/byte) the source is considered constant rather
/// than merely short; `2^-13` per spec §4.9.
const CONSTANT_ENTROPY_THRESHOLD: f64 = 1.0 / 8192.0;

/// Accumulates a 256-entry byte histogram and computes Shannon entropy.
#[derive(Clone)]
pub struct EntropyCalculator {
    histogram: [u64; 256],
    total: u64,
}

impl Default for EntropyCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropyCalculator {
    /// Creates an empty calculator.
    #[must_use]
    pub fn new() -> Self {
        Self { histogram: [0u64; 256], total: 0 }
    }

    /// Folds `bytes` into the running histogram.
    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.histogram[b as usize] += 1;
        }
        self.total += bytes.len() as u64;
    }

    /// Shannon entropy in bits per byte over everything seen so far.
    #[must_use]
    pub fn entropy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let total = self.total as f64;
        let mut bits = 0.0;
        for &count in &self.histogram {
            if count == 0 {
                continue;
            }
            let p = count as f64 / total;
            bits -= p * p.log2();
        }
        bits
    }

    /// Total Shannon information carried by everything seen so far, rounded
    /// to the nearest bit.
    #[must_use]
    pub fn information_bits(&self) -> u64 {
        (self.entropy() * self.total as f64).round() as u64
    }

    /// True when the input is effectively a single repeated byte value.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.entropy() < CONSTANT_ENTROPY_THRESHOLD
    }
}

/// Validates that the concatenation of `sources` carries at least
/// [`MIN_INFORMATION_BITS`] of Shannon information, tailoring the error
/// message to whether the input is constant or merely short.
///
/// # Errors
/// Returns `Argument` when the aggregate information is insufficient.
pub fn check_information(sources: &[&[u8]]) -> Result<()> {
    let mut calc = EntropyCalculator::new();
    for &s in sources {
        calc.update(s);
    }
    if calc.information_bits() >= MIN_INFORMATION_BITS as u64 {
        return Ok(());
    }
    if calc.is_constant() {
        Err(TupwError::Argument(
            "source bytes carry no information (all bytes are identical)".into(),
        ))
    } else {
        Err(TupwError::Argument(format!(
            "source bytes do not carry enough information: {} of {} required bits",
            calc.information_bits(),
            MIN_INFORMATION_BITS as u64
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_bytes_have_zero_entropy() {
        let mut calc = EntropyCalculator::new();
        calc.update(&[0xAAu8; 300]);
        assert!(calc.is_constant());
        assert!(calc.information_bits() < MIN_INFORMATION_BITS as u64);
    }

    #[test]
    fn uniform_bytes_have_high_entropy() {
        let mut calc = EntropyCalculator::new();
        let data: Vec<u8> = (0..=255u8).cycle().take(2048).collect();
        calc.update(&data);
        assert!(calc.entropy() > 7.9);
        assert!(calc.information_bits() >= MIN_INFORMATION_BITS as u64);
    }

    #[test]
    fn check_information_rejects_constant_source() {
        let data = [0xAAu8; 300];
        let err = check_information(&[&data]).unwrap_err();
        assert!(matches!(err, TupwError::Argument(_)));
        assert!(err.to_string().contains("no information"));
    }

    #[test]
    fn check_information_accepts_rich_source() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (0xFFu32.wrapping_sub(i & 0xFF)) as u8).collect();
        assert!(check_information(&[&data]).is_ok());
    }
}
