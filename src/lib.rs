//! Value-keyed memoization.
//!
//! [`Cache`] wraps a single-parameter function and remembers its result for
//! every distinct parameter *value*. Keys are derived structurally: the
//! parameter is walked through its [`serde::Serialize`] impl into a canonical
//! byte encoding (following `Box`, `Rc`, `Arc`, `RefCell` and friends to
//! their contents), and those bytes are hashed with 64-bit FNV-1a.
//!
//! ```
//! use serde::Serialize;
//! use valmemo::Cache;
//!
//! #[derive(Serialize)]
//! struct Params {
//!     a: String,
//!     b: String,
//! }
//!
//! let cache = Cache::new(|p: Params| p.a + &p.b);
//! for _ in 0..10 {
//!     let joined = cache.call_with_cache(Params {
//!         a: "A".into(),
//!         b: "B".into(),
//!     });
//!     assert_eq!(joined, "AB");
//! }
//! assert_eq!(cache.stats().misses, 1);
//! ```
//!
//! The table only grows: there is no eviction, invalidation or persistence.

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod metrics;
pub mod table;

pub use cache::{Cache, DynCache};
pub use config::{CacheConfig, KeyConfig};
pub use error::{ConfigError, KeyError};
pub use key::{DerivedKey, derive_key};
pub use metrics::CacheStats;
