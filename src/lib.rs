#![deny(warnings, missing_docs, unsafe_code)]
#![deny(absolute_paths_not_starting_with_crate)]
#![deny(elided_lifetimes_in_paths, explicit_outlives_requirements, keyword_idents)]
#![deny(macro_use_extern_crate, meta_variable_misuse, missing_abi)]
#![deny(non_ascii_idents, rust_2021_incompatible_closure_captures)]
#![deny(rust_2021_incompatible_or_patterns, rust_2021_prefixes_incompatible_syntax)]
#![deny(rust_2021_prelude_collisions, single_use_lifetimes, trivial_casts)]
#![deny(trivial_numeric_casts, unstable_features)]
#![deny(unused_extern_crates, unused_import_braces, unused_lifetimes, unused_macro_rules)]
#![deny(unused_qualifications)]
// Several leaf modules (`rng`, `base32`, `block_cipher`, `padding`,
// `protected_array`) implement the full operation set their spec component
// calls for (e.g. both encode/decode directions of a codec, both signed and
// unsigned RNG ranges, the complete protected-array accessor surface) even
// though the engine's own encrypt/decrypt path only ever exercises a subset.
// `dead_code` is allowed crate-wide for that reason rather than scattering
// per-function `#[cfg(test)]`/`#[allow]` annotations across those modules.
#![allow(dead_code)]
//
//! Key derivation from split material and authenticated encryption for
//! small secrets (database passwords, API tokens, private keys) that must
//! live in configuration files, environment variables, or source control
//! outside a dedicated key-management service.
//!
//! An [`Engine`] is constructed once from a program-supplied HMAC key and
//! one or more "source byte" arrays (material specific to the deployment:
//! a machine id, a build fingerprint, anything that is *not* secret on its
//! own but is awkward for an attacker to reproduce). It derives a 256-bit
//! master secret, splits it into an encryption-key half and a MAC-key
//! half, and uses those to seal and open small plaintexts:
//!
//! ```no_run
//! use tupw::Engine;
//!
//! let hmac_key = [0x42u8; 20];
//! let source: Vec<u8> = (0..200u32).map(|i| i as u8).collect();
//! let engine = Engine::new(&hmac_key, &[&source]).unwrap();
//!
//! let encoded = engine.encrypt_str("super secret password", "db-prod").unwrap();
//! let recovered = engine.decrypt_str(&encoded, "db-prod").unwrap();
//! assert_eq!(recovered, "super secret password");
//! ```
//!
//! The wire string format, key-derivation rules, and the historical
//! formats this crate must keep decrypting for backward compatibility are
//! all documented at the module level; start at [`engine`] for the
//! end-to-end algorithm.

mod array_utils;
mod base32;
mod blinding;
mod block_cipher;
mod engine;
mod entropy;
mod error;
mod packed_uint;
mod padding;
mod protected_array;
mod rng;

pub use engine::Engine;
pub use error::{Result, TupwError};
