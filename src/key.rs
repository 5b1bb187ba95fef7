//! Structural program keys.
//!
//! A program key is an append-only byte string collected while walking a
//! [`ProgramInfo`](crate::program_info::ProgramInfo). Two draws whose keys
//! compare equal are guaranteed to generate identical shader text, so the
//! key doubles as the cache lookup key for compiled programs.

use std::fmt;

/// Append-only builder for structural keys.
///
/// Scalars are written little-endian and floats by their raw bit pattern,
/// so equal keys mean byte-for-byte equal inputs rather than "close enough"
/// float comparisons.
#[derive(Debug, Default, Clone)]
pub struct KeyBuilder {
    bytes: Vec<u8>,
}

impl KeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    pub fn push_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_i32(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_f32(&mut self, v: f32) {
        self.push_u32(v.to_bits());
    }

    pub fn push_bool(&mut self, v: bool) {
        self.bytes.push(v as u8);
    }

    /// Append raw bytes with a length prefix so adjacent fields cannot alias.
    pub fn push_bytes(&mut self, v: &[u8]) {
        self.push_u32(v.len() as u32);
        self.bytes.extend_from_slice(v);
    }

    pub fn push_str(&mut self, v: &str) {
        self.push_bytes(v.as_bytes());
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn finish(self) -> ProgramKey {
        ProgramKey { bytes: self.bytes }
    }
}

/// A finished structural key, usable as a hash-map key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    bytes: Vec<u8>,
}

impl ProgramKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Fixed-width digest of the key, for log lines and debug labels.
    pub fn digest(&self) -> [u8; 32] {
        hash_bytes(&self.bytes)
    }

    /// Short hex form of the digest.
    pub fn digest_hex(&self) -> String {
        let d = self.digest();
        let mut out = String::with_capacity(16);
        for b in &d[0..8] {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }
}

impl fmt::Debug for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgramKey({} bytes, {})", self.bytes.len(), self.digest_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> [u8; 32] {
    fn fnv1a64_with_seed(bytes: &[u8], seed: u64) -> u64 {
        let mut hash = 0xcbf2_9ce4_8422_2325_u64 ^ seed;
        for &b in bytes {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }

    let h0 = fnv1a64_with_seed(bytes, 0x0000_0000_0000_0000);
    let h1 = fnv1a64_with_seed(bytes, 0x9e37_79b9_7f4a_7c15);
    let h2 = fnv1a64_with_seed(bytes, 0xc2b2_ae3d_27d4_eb4f);
    let h3 = fnv1a64_with_seed(bytes, 0x1656_67b1_9e37_79f9);

    let mut out = [0_u8; 32];
    out[0..8].copy_from_slice(&h0.to_le_bytes());
    out[8..16].copy_from_slice(&h1.to_le_bytes());
    out[16..24].copy_from_slice(&h2.to_le_bytes());
    out[24..32].copy_from_slice(&h3.to_le_bytes());
    out
}
