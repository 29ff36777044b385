// Structural key derivation
pub mod encoder;
pub mod fnv;

use std::fmt;
use std::hash::Hasher;

use serde::Serialize;

pub use encoder::Sink;
pub use fnv::Fnv1a;

use crate::config::KeyConfig;
use crate::error::KeyError;

/// 64-bit key derived from the encoded content of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DerivedKey(pub u64);

impl DerivedKey {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<DerivedKey> for u64 {
    fn from(key: DerivedKey) -> Self {
        key.0
    }
}

/// Derives the cache key of `param` by streaming its canonical encoding
/// through FNV-1a.
///
/// Indirections (`Box`, `Rc`, `Arc`, `RefCell`, `Mutex`, references) are
/// followed, so the key reflects the pointee's content at the time of the
/// call rather than its address.
pub fn derive_key<P: Serialize + ?Sized>(
    param: &P,
    config: &KeyConfig,
) -> Result<DerivedKey, KeyError> {
    let mut hasher = Fnv1a::new();
    encoder::encode_into(&mut hasher, param, *config)?;
    Ok(DerivedKey(hasher.finish()))
}
