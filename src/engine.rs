//! Core encryption engine (spec §4.10): key derivation, encrypt, decrypt,
//! wire-format assembly/parsing, MAC verification, and disposal.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Mutex;
use zeroize::Zeroize;

use crate::array_utils;
use crate::base32;
use crate::block_cipher::{self, BLOCK_SIZE};
use crate::blinding;
use crate::entropy;
use crate::error::{ensure, Result, TupwError};
use crate::padding;
use crate::protected_array::ProtectedByteArray;
use crate::rng;

type HmacSha256 = Hmac<Sha256>;

const MIN_HMAC_KEY_LEN: usize = 14;
const MAX_HMAC_KEY_LEN: usize = 32;
const MIN_SOURCE_BYTES_LEN: usize = 100;
const MAX_SOURCE_BYTES_LEN: usize = 10_000_000;

/// Minimum blind length the core always requests: forces the blinded,
/// padded plaintext to occupy at least two AES blocks.
const CORE_MIN_BLIND_LEN: usize = BLOCK_SIZE + 1;

const KEY_DERIVATION_PREFIX_SALT: [u8; 2] = [0x54, 0x75]; // "Tu"
const KEY_DERIVATION_SUFFIX_SALT: [u8; 2] = [0x70, 0x57]; // "pW"

/// The format id the core always writes. Formats 1–5 remain decryptable
/// for backward compatibility but are never produced by [`Engine::encrypt`].
const CURRENT_FORMAT_ID: u8 = 6;

struct EngineInner {
    enc_key: ProtectedByteArray,
    mac_key: ProtectedByteArray,
}

/// A constructed engine instance: holds a split 256-bit master secret
/// (encryption-key half, MAC-key half) derived from a program HMAC key and
/// caller-supplied source bytes. See spec §3/§4.10 for the full contract.
///
/// Safe to share across threads (`Arc<Engine>`): disposal and the
/// valid/disposed check are serialized behind an internal mutex, per
/// spec §5.
pub struct Engine {
    state: Mutex<Option<EngineInner>>,
}

impl Engine {
    /// Derives a new engine instance from `hmac_key` and `source_bytes`.
    ///
    /// # Errors
    /// Returns `Argument` if `hmac_key` is shorter than 14 or longer than 32
    /// bytes; if any source byte array is empty; if the aggregate source
    /// byte length is outside `[100, 10_000_000]`; or if the aggregate
    /// Shannon information of the source bytes is below 128 bits.
    pub fn new(hmac_key: &[u8], source_bytes: &[&[u8]]) -> Result<Self> {
        ensure!(
            hmac_key.len() >= MIN_HMAC_KEY_LEN,
            Argument,
            format!(
                "HMAC key length {} is less than {MIN_HMAC_KEY_LEN}",
                hmac_key.len()
            )
        );
        ensure!(
            hmac_key.len() <= MAX_HMAC_KEY_LEN,
            Argument,
            format!(
                "HMAC key length {} is larger than {MAX_HMAC_KEY_LEN}",
                hmac_key.len()
            )
        );

        for (i, s) in source_bytes.iter().enumerate() {
            ensure!(!s.is_empty(), Argument, format!("source byte array {i} is empty"));
        }
        let total_len: usize = source_bytes.iter().map(|s| s.len()).sum();
        ensure!(
            total_len >= MIN_SOURCE_BYTES_LEN,
            Argument,
            format!("aggregate source bytes length {total_len} is below the minimum {MIN_SOURCE_BYTES_LEN}")
        );
        ensure!(
            total_len <= MAX_SOURCE_BYTES_LEN,
            Argument,
            format!("aggregate source bytes length {total_len} exceeds the maximum {MAX_SOURCE_BYTES_LEN}")
        );
        entropy::check_information(source_bytes)?;

        let mut h = hmac_concat(hmac_key, source_bytes);
        let enc_key = ProtectedByteArray::new(&h[0..16]);
        let mac_key = ProtectedByteArray::new(&h[16..32]);
        h.zeroize();

        #[cfg(feature = "tracing")]
        tracing::debug!(source_arrays = source_bytes.len(), total_len, "engine constructed");

        Ok(Self { state: Mutex::new(Some(EngineInner { enc_key, mac_key })) })
    }

    /// Encrypts `plaintext`, optionally binding the result to `subject`, and
    /// returns the self-describing format-6 wire string.
    ///
    /// # Errors
    /// Returns `UseAfterDispose` if the engine has been disposed.
    pub fn encrypt(&self, plaintext: &[u8], subject: &str) -> Result<String> {
        let guard = self.state.lock().unwrap();
        let inner = guard.as_ref().ok_or_else(disposed_error)?;

        let mut enc_key = inner.enc_key.get()?;
        let mut mac_key = inner.mac_key.get()?;
        let mut k_e: Vec<u8> = Vec::new();
        let mut blinded: Vec<u8> = Vec::new();
        let mut padded: Vec<u8> = Vec::new();
        let mut k_m: Vec<u8> = Vec::new();

        let result = (|| {
            k_e = derive_subject_key(&mac_key, &enc_key, subject);

            let mut iv = [0u8; BLOCK_SIZE];
            rng::fill(&mut iv);

            blinded = blinding::build(plaintext, CORE_MIN_BLIND_LEN)?;
            padded = padding::pad_random_to_block_size(&blinded, BLOCK_SIZE);

            let ciphertext = block_cipher::cbc_encrypt(&k_e, &iv, &padded)?;

            k_m = derive_subject_key(&enc_key, &mac_key, subject);
            let mac = mac_over(&k_m, CURRENT_FORMAT_ID, &iv, &ciphertext);

            Ok(format!(
                "{CURRENT_FORMAT_ID}1{}1{}1{}",
                base32::encode(&iv),
                base32::encode(&ciphertext),
                base32::encode(&mac),
            ))
        })();

        enc_key.zeroize();
        mac_key.zeroize();
        k_e.zeroize();
        blinded.zeroize();
        padded.zeroize();
        k_m.zeroize();

        #[cfg(feature = "tracing")]
        match &result {
            Ok(s) => tracing::debug!(format_id = CURRENT_FORMAT_ID, output_len = s.len(), "encrypt ok"),
            Err(e) => tracing::debug!(error_kind = e.kind(), "encrypt failed"),
        }

        result
    }

    /// Decrypts a wire string previously produced by [`Self::encrypt`] (or
    /// any of formats 1–5, for backward compatibility), verifying the
    /// subject binding and MAC before returning the recovered plaintext.
    ///
    /// # Errors
    /// Returns `UseAfterDispose` if the engine has been disposed;
    /// `Argument` for a malformed wire string or unsupported format id;
    /// `Integrity` on MAC mismatch.
    pub fn decrypt(&self, encoded: &str, subject: &str) -> Result<Vec<u8>> {
        let guard = self.state.lock().unwrap();
        let inner = guard.as_ref().ok_or_else(disposed_error)?;

        let mut enc_key = inner.enc_key.get()?;
        let mut mac_key = inner.mac_key.get()?;
        let mut k_m: Vec<u8> = Vec::new();
        let mut k_e: Vec<u8> = Vec::new();
        let mut framed: Vec<u8> = Vec::new();

        let result = (|| {
            let parts = parse_wire_format(encoded)?;

            let decode_field = |field: &str| -> Result<Vec<u8>> {
                if parts.format_id == CURRENT_FORMAT_ID {
                    base32::decode(field)
                } else {
                    base32::legacy_decode(field)
                }
            };
            let iv_bytes = decode_field(parts.iv)?;
            let ciphertext = decode_field(parts.ciphertext)?;
            let mac = decode_field(parts.mac)?;

            ensure!(
                iv_bytes.len() == BLOCK_SIZE,
                Argument,
                format!("IV must be {BLOCK_SIZE} bytes, was {}", iv_bytes.len())
            );
            let iv: [u8; BLOCK_SIZE] = iv_bytes.try_into().unwrap();

            k_m = mac_key_for_decrypt(&enc_key, &mac_key, parts.format_id, subject);
            let mac_expected = mac_over(&k_m, parts.format_id, &iv, &ciphertext);
            ensure!(
                array_utils::secure_equals(&mac_expected, &mac),
                Integrity,
                "MAC verification failed"
            );

            k_e = derive_subject_key(&mac_key, &enc_key, subject);
            framed = decrypt_ciphertext(parts.format_id, &k_e, &iv, &ciphertext)?;

            if parts.format_id >= 3 {
                blinding::unblind(&framed)
            } else {
                padding::unpad_arbitrary_tail(&framed, BLOCK_SIZE)
            }
        })();

        enc_key.zeroize();
        mac_key.zeroize();
        k_m.zeroize();
        k_e.zeroize();
        framed.zeroize();

        #[cfg(feature = "tracing")]
        match &result {
            Ok(p) => tracing::debug!(output_len = p.len(), "decrypt ok"),
            Err(e) => tracing::debug!(error_kind = e.kind(), "decrypt failed"),
        }

        result
    }

    /// Convenience overload of [`Self::encrypt`] for UTF-8 cleartext.
    pub fn encrypt_str(&self, plaintext: &str, subject: &str) -> Result<String> {
        self.encrypt(plaintext.as_bytes(), subject)
    }

    /// Convenience overload of [`Self::decrypt`] that requires the
    /// recovered bytes to be valid, strictly-checked UTF-8.
    pub fn decrypt_str(&self, encoded: &str, subject: &str) -> Result<String> {
        let bytes = self.decrypt(encoded, subject)?;
        String::from_utf8(bytes)
            .map_err(|e| TupwError::Argument(format!("decrypted data is not valid UTF-8: {e}")))
    }

    /// Disposes the engine: zeroizes both protected key halves and
    /// transitions every subsequent operation to `UseAfterDispose`. Safe to
    /// call more than once.
    pub fn dispose(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.take();
    }

    /// True if the engine has not yet been disposed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state.lock().unwrap().is_some()
    }
}

fn disposed_error() -> TupwError {
    TupwError::UseAfterDispose("engine has been disposed".into())
}

fn hmac_concat(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    for p in parts {
        mac.update(p);
    }
    mac.finalize().into_bytes().into()
}

/// `HMAC-SHA-256(hmac_key = base_other_half, message = base_this_half || "Tu" || subject || "pW")`
/// when `subject` is non-empty, else `base_this_half` unchanged. This single
/// helper implements both the encrypt-side `k_e`/`k_m` derivations (spec
/// §4.10 steps 2 and 6) since they share the same shape with the two
/// 128-bit halves swapped.
fn derive_subject_key(hmac_key_half: &[u8], base_half: &[u8], subject: &str) -> Vec<u8> {
    if subject.is_empty() {
        return base_half.to_vec();
    }
    let mut mac = HmacSha256::new_from_slice(hmac_key_half).expect("HMAC accepts any key length");
    mac.update(base_half);
    mac.update(&KEY_DERIVATION_PREFIX_SALT);
    mac.update(subject.as_bytes());
    mac.update(&KEY_DERIVATION_SUFFIX_SALT);
    mac.finalize().into_bytes().to_vec()
}

/// MAC key selection for decrypt (spec §4.10 step 6): format ids `<= 4`
/// always use the raw MAC key, even when a subject is supplied — this is
/// format 4's documented bug (spec §9), preserved for wire compatibility.
/// Format ids `>= 5` derive a subject-bound key exactly like encrypt does.
fn mac_key_for_decrypt(enc_key: &[u8], mac_key: &[u8], format_id: u8, subject: &str) -> Vec<u8> {
    if format_id >= 5 {
        derive_subject_key(enc_key, mac_key, subject)
    } else {
        mac_key.to_vec()
    }
}

fn mac_over(key: &[u8], format_id: u8, iv: &[u8; BLOCK_SIZE], ciphertext: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(&[format_id]);
    mac.update(iv);
    mac.update(ciphertext);
    mac.finalize().into_bytes().to_vec()
}

struct WireParts<'a> {
    format_id: u8,
    iv: &'a str,
    ciphertext: &'a str,
    mac: &'a str,
}

fn parse_wire_format(encoded: &str) -> Result<WireParts<'_>> {
    let mut chars = encoded.chars();
    let id_char = chars.next().ok_or_else(|| TupwError::Argument("empty encryption string".into()))?;
    let format_id = id_char
        .to_digit(10)
        .ok_or_else(|| TupwError::Argument(format!("format id '{id_char}' is not numeric")))?
        as u8;
    ensure!(
        (1..=6).contains(&format_id),
        Argument,
        format!("format id {format_id} is not in the supported range 1..=6")
    );

    let separator = if format_id == CURRENT_FORMAT_ID { '1' } else { '$' };
    let after_id = &encoded[id_char.len_utf8()..];
    let mut after_id_chars = after_id.chars();
    ensure!(
        after_id_chars.next() == Some(separator),
        Argument,
        format!("expected separator '{separator}' immediately after the format id")
    );
    let rest = after_id_chars.as_str();
    let fields: Vec<&str> = rest.split(separator).collect();
    ensure!(
        fields.len() == 3,
        Argument,
        format!("expected 3 fields after the format id, found {}", fields.len())
    );
    Ok(WireParts { format_id, iv: fields[0], ciphertext: fields[1], mac: fields[2] })
}

fn decrypt_ciphertext(format_id: u8, key: &[u8], iv: &[u8; BLOCK_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    match format_id {
        1 => block_cipher::cfb_decrypt(key, iv, ciphertext),
        2 | 3 => block_cipher::ctr_transform(key, iv, ciphertext),
        4 | 5 | 6 => block_cipher::cbc_decrypt(key, iv, ciphertext),
        _ => Err(TupwError::Argument(format!("format id {format_id} is not in the supported range 1..=6"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rich_source(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn test_engine() -> Engine {
        let hmac_key = rich_source(20, 7);
        let source = rich_source(200, 13);
        Engine::new(&hmac_key, &[&source]).unwrap()
    }

    #[test]
    fn round_trip_empty_subject() {
        let engine = test_engine();
        let plaintext = b"a small secret";
        let encoded = engine.encrypt(plaintext, "").unwrap();
        assert_eq!(engine.decrypt(&encoded, "").unwrap(), plaintext);
    }

    #[test]
    fn round_trip_with_subject() {
        let engine = test_engine();
        let plaintext = "unicode secret \u{263A}".as_bytes();
        let encoded = engine.encrypt(plaintext, "db-password").unwrap();
        assert_eq!(engine.decrypt(&encoded, "db-password").unwrap(), plaintext);
    }

    #[test]
    fn subject_binding_rejects_wrong_subject() {
        let engine = test_engine();
        let encoded = engine.encrypt(b"bound secret", "context-a").unwrap();
        let err = engine.decrypt(&encoded, "context-b").unwrap_err();
        assert!(matches!(err, TupwError::Integrity(_)));
    }

    #[test]
    fn repeated_encryption_is_nondeterministic() {
        let engine = test_engine();
        let a = engine.encrypt(b"same plaintext", "s").unwrap();
        let b = engine.encrypt(b"same plaintext", "s").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tamper_with_mac_fails_integrity() {
        let engine = test_engine();
        let mut encoded = engine.encrypt(b"tamper me", "").unwrap();
        let last = encoded.pop().unwrap();
        let replacement = if last == '2' { '3' } else { '2' };
        encoded.push(replacement);
        let err = engine.decrypt(&encoded, "").unwrap_err();
        assert!(matches!(err, TupwError::Integrity(_)));
    }

    #[test]
    fn dispose_rejects_further_operations() {
        let engine = test_engine();
        engine.dispose();
        assert!(!engine.is_valid());
        assert!(matches!(engine.encrypt(b"x", "").unwrap_err(), TupwError::UseAfterDispose(_)));
        assert!(matches!(engine.decrypt("6111", "").unwrap_err(), TupwError::UseAfterDispose(_)));
    }

    #[test]
    fn constructor_rejects_short_hmac_key() {
        let source = rich_source(200, 1);
        let err = Engine::new(&[0u8; 13], &[&source]).unwrap_err();
        assert!(err.to_string().contains("less than 14"));
    }

    #[test]
    fn constructor_rejects_long_hmac_key() {
        let source = rich_source(200, 1);
        let err = Engine::new(&[0u8; 33], &[&source]).unwrap_err();
        assert!(err.to_string().contains("larger than 32"));
    }

    #[test]
    fn constructor_rejects_constant_source() {
        let hmac_key = rich_source(20, 2);
        let source = [0xAAu8; 300];
        let err = Engine::new(&hmac_key, &[&source]).unwrap_err();
        assert!(err.to_string().contains("no information"));
    }

    #[test]
    fn constructor_rejects_short_aggregate_source() {
        let hmac_key = rich_source(20, 3);
        let source = rich_source(50, 4);
        assert!(Engine::new(&hmac_key, &[&source]).is_err());
    }

    #[test]
    fn constructor_rejects_empty_source_array() {
        let hmac_key = rich_source(20, 5);
        let a = rich_source(100, 6);
        let empty: [u8; 0] = [];
        assert!(Engine::new(&hmac_key, &[&a, &empty]).is_err());
    }

    #[test]
    fn decrypt_rejects_malformed_format_id() {
        let engine = test_engine();
        assert!(engine.decrypt("91x1y1z", "").is_err());
        assert!(engine.decrypt("x1y1z1w", "").is_err());
    }

    #[test]
    fn decrypt_rejects_wrong_field_count() {
        let engine = test_engine();
        assert!(engine.decrypt("61x1y", "").is_err());
    }

    #[test]
    fn str_convenience_overloads_round_trip() {
        let engine = test_engine();
        let encoded = engine.encrypt_str("plain utf8 text", "ctx").unwrap();
        assert_eq!(engine.decrypt_str(&encoded, "ctx").unwrap(), "plain utf8 text");
    }

    #[test]
    fn decrypt_rejects_non_utf8_payload_through_str_overload() {
        let engine = test_engine();
        let encoded = engine.encrypt(&[0xFF, 0xFE, 0xFD], "").unwrap();
        assert!(engine.decrypt_str(&encoded, "").is_err());
    }
}
