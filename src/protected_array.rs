//! Masked-index protected byte array (spec §4.7).
//!
//! Stores a secret byte sequence such that no secret byte sits at a
//! predictable position or with its true value — a defense against casual
//! memory inspection and accidental logging, *not* a defense against an
//! attacker able to read the whole process's memory (spec §9 Design Notes
//! says so explicitly, and so do we: see the module-level warning below).
//!
//! This does not provide cryptographic security against an attacker who can
//! read arbitrary process memory. It raises the bar against memory dumps,
//! swap-file leakage, and debugger/log inspection that only samples a few
//! bytes at a time.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use zeroize::Zeroize;

use crate::array_utils;
use crate::error::{ensure, Result};
use crate::rng;

const STORAGE_CHUNK: usize = 50;
const SEED_FILL: u8 = 0x5A;

/// Fixed negative pseudo-positions used to mask the logical length and the
/// randomized start offset. Chosen distinct from any real physical
/// position, which is always `>= 0`.
const LENGTH_POS: i64 = -1;
const START_POS: i64 = -2;

/// A byte sequence held obfuscated in memory for the lifetime of the
/// instance; see the module docs for the threat model this does and does
/// not address.
pub struct ProtectedByteArray {
    mask_key: [u8; 16],
    storage: Vec<u8>,
    index_table: Vec<u32>,
    masked_length: u32,
    masked_start_offset: u32,
    valid: bool,
}

impl ProtectedByteArray {
    /// Copies `data` into a freshly masked, shuffled internal layout. The
    /// caller is responsible for zeroizing `data` afterwards if it is no
    /// longer needed in the clear.
    #[must_use]
    pub fn new(data: &[u8]) -> Self {
        let logical_len = data.len();
        let storage_len = storage_len_for(logical_len);

        let mut mask_key = [0u8; 16];
        rng::fill(&mut mask_key);

        let mut storage = vec![0u8; storage_len];
        rng::fill(&mut storage);

        let permutation = random_permutation(storage_len);
        let mut index_table = vec![0u32; storage_len];
        for (slot, &physical) in permutation.iter().enumerate() {
            index_table[slot] = physical ^ int_mask(&mask_key, slot as i64);
        }

        let start_offset = if storage_len > logical_len {
            rng::uniform_u32(0, (storage_len - logical_len) as u32)
        } else {
            0
        };

        let mut array = Self {
            mask_key,
            storage,
            index_table,
            masked_length: logical_len as u32 ^ int_mask(&mask_key, LENGTH_POS),
            masked_start_offset: start_offset ^ int_mask(&mask_key, START_POS),
            valid: true,
        };

        for (j, &byte) in data.iter().enumerate() {
            array.write_physical(start_offset as usize + j, byte);
        }

        array
    }

    /// The logical length `L` this instance was constructed with.
    ///
    /// # Errors
    /// Returns `UseAfterDispose` if called after [`Self::dispose`].
    pub fn len(&self) -> Result<usize> {
        self.check_valid()?;
        Ok((self.masked_length ^ int_mask(&self.mask_key, LENGTH_POS)) as usize)
    }

    /// True when the logical length is zero.
    ///
    /// # Errors
    /// Returns `UseAfterDispose` if called after [`Self::dispose`].
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads the byte at logical index `i`.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` if `i` is not in `[0, len())`, or
    /// `UseAfterDispose` if called after [`Self::dispose`].
    pub fn get_at(&self, i: usize) -> Result<u8> {
        self.check_valid()?;
        let len = self.len()?;
        ensure!(i < len, IndexOutOfRange, format!("index {i} is out of range for length {len}"));
        let physical = self.physical_position(i);
        Ok(self.storage[physical] ^ byte_mask(&self.mask_key, physical as i64))
    }

    /// Writes `value` at logical index `i`.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` if `i` is not in `[0, len())`, or
    /// `UseAfterDispose` if called after [`Self::dispose`].
    pub fn set_at(&mut self, i: usize, value: u8) -> Result<()> {
        self.check_valid()?;
        let len = self.len()?;
        ensure!(i < len, IndexOutOfRange, format!("index {i} is out of range for length {len}"));
        self.write_physical(self.start_offset() as usize + i, value);
        Ok(())
    }

    /// Materializes a fresh owned copy of the logical byte sequence. The
    /// caller owns zeroizing the returned buffer when done with it.
    ///
    /// # Errors
    /// Returns `UseAfterDispose` if called after [`Self::dispose`].
    pub fn get(&self) -> Result<Vec<u8>> {
        self.check_valid()?;
        let len = self.len()?;
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            out.push(self.get_at(i)?);
        }
        Ok(out)
    }

    /// Constant-time equality against another protected array. Materializes
    /// both sides transiently and zeroizes them before returning.
    ///
    /// # Errors
    /// Returns `UseAfterDispose` if either side has been disposed.
    pub fn equals(&self, other: &Self) -> Result<bool> {
        let mut a = self.get()?;
        let mut b = other.get()?;
        let result = array_utils::secure_equals(&a, &b);
        array_utils::secure_zero(&mut a);
        array_utils::secure_zero(&mut b);
        Ok(result)
    }

    /// Zeroizes every internal buffer (storage, index table, per-instance
    /// AES key) and marks the instance invalid. Subsequent operations fail
    /// with `UseAfterDispose`.
    pub fn dispose(&mut self) {
        self.storage.zeroize();
        self.index_table.zeroize();
        self.mask_key.zeroize();
        self.masked_length = 0;
        self.masked_start_offset = 0;
        self.valid = false;
    }

    fn check_valid(&self) -> Result<()> {
        ensure!(self.valid, UseAfterDispose, "protected byte array has already been disposed");
        Ok(())
    }

    fn start_offset(&self) -> u32 {
        self.masked_start_offset ^ int_mask(&self.mask_key, START_POS)
    }

    fn physical_position(&self, logical_index: usize) -> usize {
        let slot = self.start_offset() as usize + logical_index;
        (self.index_table[slot] ^ int_mask(&self.mask_key, slot as i64)) as usize
    }

    fn write_physical(&mut self, slot: usize, value: u8) {
        let physical = (self.index_table[slot] ^ int_mask(&self.mask_key, slot as i64)) as usize;
        self.storage[physical] = value ^ byte_mask(&self.mask_key, physical as i64);
    }
}

impl Drop for ProtectedByteArray {
    fn drop(&mut self) {
        if self.valid {
            self.dispose();
        }
    }
}

fn storage_len_for(logical_len: usize) -> usize {
    ((logical_len + STORAGE_CHUNK - 1) / STORAGE_CHUNK) * STORAGE_CHUNK
}

fn random_permutation(n: usize) -> Vec<u32> {
    let mut values: Vec<u32> = (0..n as u32).collect();
    for i in (1..n).rev() {
        let j = rng::uniform_u32(0, i as u32) as usize;
        values.swap(i, j);
    }
    values
}

/// Encrypts a position-keyed 16-byte seed block under the instance's
/// per-instance AES-128 key and returns the resulting mask block. Per spec
/// §4.7, the seed and mask buffers are zeroized after use rather than left
/// on the stack for the next call to reuse.
fn mask_block(mask_key: &[u8; 16], position: i64) -> [u8; 16] {
    let mut seed = [SEED_FILL; 16];
    seed[6..10].copy_from_slice(&(position as i32).to_be_bytes());
    let cipher = Aes128::new(GenericArray::from_slice(mask_key));
    let mut block = GenericArray::clone_from_slice(&seed);
    cipher.encrypt_block(&mut block);
    let mut out = [0u8; 16];
    out.copy_from_slice(&block);
    seed.zeroize();
    block.as_mut_slice().zeroize();
    out
}

/// Single-byte mask derived from the mask block for `position`.
fn byte_mask(mask_key: &[u8; 16], position: i64) -> u8 {
    let block = mask_block(mask_key, position);
    let idx = (13 * ((position & 0xF) as usize) + 5) & 15;
    block[idx]
}

/// 4-byte little-endian integer mask derived from the mask block for
/// `position`.
fn int_mask(mask_key: &[u8; 16], position: i64) -> u32 {
    let block = mask_block(mask_key, position);
    let idx = (7 * ((position.unsigned_abs() % 13) as usize) + 3) % 13;
    u32::from_le_bytes(block[idx..idx + 4].try_into().unwrap())
}
