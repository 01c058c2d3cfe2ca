//! Wire-format codecs (spec §4.2).
//!
//! Two independent codecs live here because both are part of the wire
//! contract: the Base32-SpellSafe alphabet that format 6 (the only format
//! the core ever writes) uses, and the legacy unpadded Base64 codec that
//! formats 1–5 require for backward-compatible decryption.

use crate::error::{ensure, Result};
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::{DecodePaddingMode, Engine};
use base64::alphabet;

/// The 32-symbol spell-safe alphabet: no vowels, no `l`/`1`/`I`, no `O`/`0`.
/// Digit `1` is reserved as the field separator and deliberately excluded.
const ALPHABET: &[u8; 32] = b"23456789BCDFGHJKMNPQRSTVWXYZbdgt";

/// Reverse lookup table built once from `ALPHABET`; `0xFF` marks a byte that
/// is not part of the alphabet.
fn reverse_lookup() -> [u8; 256] {
    let mut table = [0xFFu8; 256];
    for (value, &symbol) in ALPHABET.iter().enumerate() {
        table[symbol as usize] = value as u8;
    }
    table
}

/// Encodes `bytes` into the spell-safe alphabet. Packs input 8 bits at a
/// time into 5-bit groups and emits one symbol per group; the final partial
/// group (if any) is zero-padded on the low bits. No separator or padding
/// character is appended — the decoded length is recovered from the
/// encoded string's length.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity((bytes.len() * 8 + 4) / 5);
    let mut acc: u32 = 0;
    let mut acc_bits: u32 = 0;
    for &byte in bytes {
        acc = (acc << 8) | u32::from(byte);
        acc_bits += 8;
        while acc_bits >= 5 {
            acc_bits -= 5;
            let idx = (acc >> acc_bits) & 0x1F;
            out.push(ALPHABET[idx as usize] as char);
        }
    }
    if acc_bits > 0 {
        let idx = (acc << (5 - acc_bits)) & 0x1F;
        out.push(ALPHABET[idx as usize] as char);
    }
    out
}

/// Decodes a spell-safe-encoded string back into bytes. Fails with
/// `Argument` on any character outside the alphabet, including the
/// separator `1` itself.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let table = reverse_lookup();
    let byte_len = (text.len() * 5) / 8;
    let mut out = Vec::with_capacity(byte_len);
    let mut acc: u32 = 0;
    let mut acc_bits: u32 = 0;
    for b in text.bytes() {
        let value = table[b as usize];
        ensure!(
            value != 0xFF,
            Argument,
            format!("character '{}' is not part of the spell-safe Base32 alphabet", b as char)
        );
        acc = (acc << 5) | u32::from(value);
        acc_bits += 5;
        if acc_bits >= 8 {
            acc_bits -= 8;
            out.push(((acc >> acc_bits) & 0xFF) as u8);
        }
    }
    Ok(out)
}

/// Legacy codec for formats 1–5. Standard Base64 alphabet, but padding is
/// optional on decode (the original's decoder accepted both, see
/// SPEC_FULL.md §C) and never emitted on encode (only needed for
/// compatibility decoding, so encode is unused in practice but kept to
/// mirror the symmetric shape of the spell-safe codec above).
fn legacy_engine() -> GeneralPurpose {
    let config = GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent);
    GeneralPurpose::new(&alphabet::STANDARD, config)
}

/// Decodes legacy unpadded-or-padded Base64, as used by format ids 1–5.
pub fn legacy_decode(text: &str) -> Result<Vec<u8>> {
    legacy_engine()
        .decode(text)
        .map_err(|e| crate::error::TupwError::Argument(format!("invalid Base64 encoding: {e}")))
}

/// Encodes to legacy Base64 without padding. Not used by the core encrypt
/// path (format 6 always emits spell-safe Base32) but kept so the codec
/// pair is symmetric and testable in isolation.
#[must_use]
pub fn legacy_encode(bytes: &[u8]) -> String {
    legacy_engine().encode(bytes)
}
