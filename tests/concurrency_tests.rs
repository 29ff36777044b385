mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use rayon::prelude::*;
use serde::Serialize;
use valmemo::Cache;

#[test]
fn parallel_callers_see_consistent_results() {
    common::init_tracing();
    let calls = AtomicUsize::new(0);
    let cache = Cache::new(|i: u64| {
        calls.fetch_add(1, Ordering::SeqCst);
        i * 2
    });

    (0..10_000u64).into_par_iter().for_each(|i| {
        assert_eq!(cache.call_with_cache(i % 10), (i % 10) * 2);
    });

    let stats = cache.stats();
    assert_eq!(stats.entries, 10);
    assert_eq!(stats.lookups(), 10_000);
    // Racing misses may compute a key more than once, but every computation
    // is accounted for as a miss.
    assert!(calls.load(Ordering::SeqCst) >= 10);
    assert_eq!(calls.load(Ordering::SeqCst) as u64, stats.misses);
}

#[test]
fn warm_cache_serves_parallel_hits_without_computing() {
    let calls = AtomicUsize::new(0);
    let cache = Cache::new(|s: String| {
        calls.fetch_add(1, Ordering::SeqCst);
        s.to_uppercase()
    });

    let words: Vec<String> = ["alpha", "beta", "gamma"].iter().map(|w| w.to_string()).collect();
    for word in &words {
        cache.call_with_cache(word.clone());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    (0..3_000usize).into_par_iter().for_each(|i| {
        let word = words[i % words.len()].clone();
        assert_eq!(cache.call_with_cache(word.clone()), word.to_uppercase());
    });

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(cache.stats().hits, 3_000);
}

// Both threads must be inside the wrapped function at the same time for the
// barrier to release, which only happens if no lock is held while computing.
#[test]
fn concurrent_misses_compute_independently() {
    let barrier = Barrier::new(2);
    let calls = AtomicUsize::new(0);
    let cache = Cache::new(|i: i32| {
        calls.fetch_add(1, Ordering::SeqCst);
        barrier.wait();
        i + 1
    });

    thread::scope(|scope| {
        let first = scope.spawn(|| cache.call_with_cache(41));
        let second = scope.spawn(|| cache.call_with_cache(41));
        assert_eq!(first.join().unwrap(), 42);
        assert_eq!(second.join().unwrap(), 42);
    });

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let stats = cache.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.insertions, 2);
    assert_eq!(stats.overwrites, 1);
}

#[test]
fn shared_pointee_mutation_is_observed_across_threads() {
    #[derive(Clone, Serialize)]
    struct Params {
        weights: Arc<Mutex<Vec<u32>>>,
    }

    let calls = AtomicUsize::new(0);
    let cache = Cache::new(|p: Params| {
        calls.fetch_add(1, Ordering::SeqCst);
        p.weights.lock().unwrap().iter().sum::<u32>()
    });

    let params = Params {
        weights: Arc::new(Mutex::new(vec![1, 2, 3])),
    };

    thread::scope(|scope| {
        for _ in 0..4 {
            let params = params.clone();
            let cache = &cache;
            scope.spawn(move || assert_eq!(cache.call_with_cache(params), 6));
        }
    });
    let after_first_round = calls.load(Ordering::SeqCst);
    assert!((1..=4).contains(&after_first_round));

    params.weights.lock().unwrap().push(4);
    assert_eq!(cache.call_with_cache(params.clone()), 10);
    assert_eq!(calls.load(Ordering::SeqCst), after_first_round + 1);
    assert_eq!(cache.len(), 2);
}

#[test]
fn cache_is_shareable_through_arc() {
    let cache = Arc::new(Cache::new(|v: Vec<u8>| v.iter().map(|&b| u64::from(b)).sum::<u64>()));

    let handles: Vec<_> = (0..8u8)
        .map(|n| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.call_with_cache((0..=n).collect()))
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        let n = n as u64;
        assert_eq!(handle.join().unwrap(), n * (n + 1) / 2);
    }
    assert_eq!(cache.len(), 8);
}
