//! Highlights the rejection paths an attacker-controlled input can hit.

use tupw::{Engine, TupwError};

fn rich_source(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(41).wrapping_add(seed)).collect()
}

fn test_engine(seed: u8) -> Engine {
    let hmac_key = rich_source(22, seed);
    let source = rich_source(250, seed.wrapping_add(5));
    Engine::new(&hmac_key, &[&source]).unwrap()
}

#[test]
fn constructor_rejects_out_of_range_hmac_keys() {
    let source = rich_source(200, 1);
    let too_short = Engine::new(&[0u8; 13], &[&source]).unwrap_err();
    assert!(matches!(too_short, TupwError::Argument(ref msg) if msg.contains("less than 14")));

    let too_long = Engine::new(&[0u8; 33], &[&source]).unwrap_err();
    assert!(matches!(too_long, TupwError::Argument(ref msg) if msg.contains("larger than 32")));
}

#[test]
fn constructor_rejects_low_entropy_source() {
    let hmac_key = rich_source(20, 2);
    let source = [0xAAu8; 300];
    let err = Engine::new(&hmac_key, &[&source]).unwrap_err();
    assert!(matches!(err, TupwError::Argument(ref msg) if msg.contains("no information")));
}

#[test]
fn tampering_with_ciphertext_fails_integrity_not_panic() {
    let engine = test_engine(10);
    let encoded = engine.encrypt(b"do not tamper with me", "").unwrap();
    // Format 6 splits on '1' into exactly [format_id, iv, ciphertext, mac];
    // flip a character inside the ciphertext field only.
    let mut fields: Vec<String> = encoded.split('1').map(String::from).collect();
    assert_eq!(fields.len(), 4);
    let cipher_field = fields[2].as_bytes();
    let mut mutated: Vec<u8> = cipher_field.to_vec();
    mutated[0] = if mutated[0] == b'2' { b'3' } else { b'2' };
    fields[2] = String::from_utf8(mutated).unwrap();
    let tampered = fields.join("1");

    assert!(matches!(engine.decrypt(&tampered, ""), Err(TupwError::Integrity(_))));
}

#[test]
fn decrypt_rejects_unknown_format_id() {
    let engine = test_engine(11);
    let err = engine.decrypt("91xyz1abc1def", "").unwrap_err();
    assert!(matches!(err, TupwError::Argument(_)));
}

#[test]
fn decrypt_rejects_non_numeric_format_id() {
    let engine = test_engine(12);
    let err = engine.decrypt("z1xyz1abc1def", "").unwrap_err();
    assert!(matches!(err, TupwError::Argument(_)));
}

#[test]
fn decrypt_rejects_truncated_wire_string() {
    let engine = test_engine(13);
    let encoded = engine.encrypt(b"full string", "").unwrap();
    let truncated = &encoded[..encoded.len() / 2];
    assert!(engine.decrypt(truncated, "").is_err());
}

#[test]
fn decrypt_rejects_base32_separator_inside_a_field() {
    let engine = test_engine(14);
    // format 6 uses '1' as the separator; a 4th '1' desynchronizes field parsing.
    let encoded = engine.encrypt(b"whatever", "").unwrap();
    let mutated = format!("{encoded}1extra");
    assert!(engine.decrypt(&mutated, "").is_err());
}

#[test]
fn use_after_dispose_is_reported_on_every_entry_point() {
    let engine = test_engine(15);
    let encoded = engine.encrypt(b"before dispose", "").unwrap();
    engine.dispose();

    assert!(matches!(engine.encrypt(b"after", ""), Err(TupwError::UseAfterDispose(_))));
    assert!(matches!(engine.decrypt(&encoded, ""), Err(TupwError::UseAfterDispose(_))));
    assert!(matches!(engine.encrypt_str("after", ""), Err(TupwError::UseAfterDispose(_))));
    assert!(matches!(engine.decrypt_str(&encoded, ""), Err(TupwError::UseAfterDispose(_))));
}

#[test]
fn decrypt_str_rejects_invalid_utf8_recovered_plaintext() {
    let engine = test_engine(16);
    let encoded = engine.encrypt(&[0xC0, 0x80, 0xFF], "").unwrap();
    assert!(matches!(engine.decrypt_str(&encoded, ""), Err(TupwError::Argument(_))));
}
