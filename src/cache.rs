use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::{CacheConfig, KeyConfig};
use crate::error::KeyError;
use crate::key::{DerivedKey, derive_key};
use crate::metrics::{CacheMetrics, CacheStats};
use crate::table::{Lookup, MemoTable};

/// Cache over a boxed function, for when the closure type cannot be named.
pub type DynCache<P, R> = Cache<P, R, Box<dyn Fn(P) -> R + Send + Sync>>;

/// Memoizing wrapper around a single-parameter function.
///
/// Results are keyed by the *content* of the parameter: two parameters that
/// encode to the same bytes share an entry, however they were allocated.
/// The parameter type must implement [`Serialize`] and must not contain
/// reference cycles; the result type is stored as-is and handed out by clone.
///
/// The cache is safe to share between threads. Misses compute outside the
/// table lock, so two threads missing on the same key may both run the
/// function; the wrapped function is assumed to be referentially transparent.
pub struct Cache<P, R, F> {
    function: F,
    table: MemoTable<R>,
    metrics: CacheMetrics,
    config: CacheConfig,
    key_config: KeyConfig,
    _param: PhantomData<fn(P)>,
}

impl<P, R, F> Cache<P, R, F>
where
    P: Serialize,
{
    pub fn new(function: F) -> Self
    where
        F: Fn(P) -> R,
    {
        Self::build(function, CacheConfig::default())
    }

    pub fn with_config(function: F, config: CacheConfig) -> Self
    where
        F: Fn(P) -> R,
    {
        Self::build(function, config)
    }

    /// Builds a cache configured from `VALMEMO_*` environment variables.
    pub fn from_env(function: F) -> Self
    where
        F: Fn(P) -> R,
    {
        Self::build(function, CacheConfig::from_env())
    }

    /// Wraps a function that may fail. Only `Ok` results are memoized; see
    /// [`call_fallible`](Self::call_fallible).
    pub fn fallible<E>(function: F) -> Self
    where
        F: Fn(P) -> Result<R, E>,
    {
        Self::build(function, CacheConfig::default())
    }

    pub fn fallible_with_config<E>(function: F, config: CacheConfig) -> Self
    where
        F: Fn(P) -> Result<R, E>,
    {
        Self::build(function, config)
    }

    fn build(function: F, config: CacheConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(err) => {
                warn!(%err, "invalid cache configuration, using defaults for rejected values");
                config.sanitized()
            }
        };
        debug!(
            max_depth = config.max_depth,
            canonical_seqs = config.canonical_seqs,
            initial_capacity = config.initial_capacity,
            "memo cache created"
        );
        Self {
            function,
            table: MemoTable::with_capacity(config.initial_capacity),
            metrics: CacheMetrics::new(),
            key_config: config.key_config(),
            config,
            _param: PhantomData,
        }
    }

    /// Returns the memoized result for `param`, computing it on a miss.
    ///
    /// # Panics
    ///
    /// Panics if `param` cannot be encoded (a `Serialize` impl reports an
    /// error, or the value nests deeper than the configured limit). A panic
    /// raised by the wrapped function propagates and nothing is stored.
    pub fn call_with_cache(&self, param: P) -> R
    where
        F: Fn(P) -> R,
        R: Clone,
    {
        let key = self.key_for(&param);
        let (result, lookup) = self
            .table
            .get_or_compute(key, || (self.function)(param));
        self.record(key, lookup);
        result
    }

    /// Like [`call_with_cache`](Self::call_with_cache) for a fallible
    /// function. An `Err` is returned unchanged and not memoized, so the next
    /// call with an equal parameter runs the function again.
    pub fn call_fallible<E>(&self, param: P) -> Result<R, E>
    where
        F: Fn(P) -> Result<R, E>,
        R: Clone,
    {
        let key = self.key_for(&param);
        match self
            .table
            .try_get_or_compute(key, || (self.function)(param))
        {
            Ok((result, lookup)) => {
                self.record(key, lookup);
                Ok(result)
            }
            Err(err) => {
                self.metrics.record_miss();
                self.metrics.record_failure();
                trace!(%key, "computation failed, not cached");
                Err(err)
            }
        }
    }

    /// Derives the key `param` would be stored under.
    pub fn try_key(&self, param: &P) -> Result<DerivedKey, KeyError> {
        derive_key(param, &self.key_config)
    }

    /// Whether a result for `param` is already stored. Never runs the
    /// wrapped function.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`call_with_cache`](Self::call_with_cache).
    pub fn contains(&self, param: &P) -> bool {
        self.table.contains(self.key_for(param))
    }

    fn key_for(&self, param: &P) -> DerivedKey {
        self.try_key(param)
            .unwrap_or_else(|err| panic!("valmemo: failed to derive cache key: {err}"))
    }

    fn record(&self, key: DerivedKey, lookup: Lookup) {
        match lookup {
            Lookup::Hit => {
                self.metrics.record_hit();
                trace!(%key, "cache hit");
            }
            Lookup::Miss { replaced } => {
                self.metrics.record_miss();
                self.metrics.record_insert(replaced);
                if replaced {
                    debug!(%key, "concurrent miss overwrote an existing entry");
                } else {
                    trace!(%key, "cache miss");
                }
            }
        }
    }
}

impl<P, R, F> Cache<P, R, F> {
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.table.len())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The wrapped function, for calling it without the cache.
    pub fn function(&self) -> &F {
        &self.function
    }
}

impl<P, R, F> fmt::Debug for Cache<P, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
