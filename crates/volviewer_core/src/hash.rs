//! # Name Hashing
//!
//! Directory and file names are keyed by a 64-bit hash. SipHash-1-3 with fixed
//! keys keeps the value stable across runs and platforms.

use siphasher::sip::SipHasher13;
use std::hash::Hasher;

const KEY_0: u64 = 0x3243_f6a8_885a_308d;
const KEY_1: u64 = 0x1311_1111_1111_1111;

/// Hashes a byte string.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(KEY_0, KEY_1);
    hasher.write(bytes);
    hasher.finish()
}
