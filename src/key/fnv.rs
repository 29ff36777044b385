use std::hash::Hasher;

pub const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
pub const PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a streaming hash.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a(u64);

impl Fnv1a {
    pub const fn new() -> Self {
        Self(OFFSET_BASIS)
    }

    pub fn hash_bytes(bytes: &[u8]) -> u64 {
        let mut hasher = Self::new();
        hasher.write(bytes);
        hasher.finish()
    }
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for Fnv1a {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let mut acc = self.0;
        for &byte in bytes {
            acc ^= u64::from(byte);
            acc = acc.wrapping_mul(PRIME);
        }
        self.0 = acc;
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }
}
