use std::cell::RefCell;
use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::Serialize;
use valmemo::{DerivedKey, KeyConfig, KeyError, derive_key};

fn key<P: Serialize + ?Sized>(value: &P) -> DerivedKey {
    derive_key(value, &KeyConfig::default()).expect("value should derive a key")
}

#[derive(Serialize)]
struct Record {
    id: u32,
    name: String,
    scores: Vec<f64>,
}

fn record() -> Record {
    Record {
        id: 7,
        name: "seven".to_string(),
        scores: vec![0.5, 1.5],
    }
}

#[test]
fn derivation_is_deterministic() {
    assert_eq!(key(&record()), key(&record()));
    assert_eq!(key(&42u8), key(&42u8));
}

#[test]
fn any_field_change_changes_the_key() {
    let base = key(&record());

    let mut changed = record();
    changed.id = 8;
    assert_ne!(key(&changed), base);

    let mut changed = record();
    changed.name.push('!');
    assert_ne!(key(&changed), base);

    let mut changed = record();
    changed.scores.push(0.0);
    assert_ne!(key(&changed), base);
}

#[test]
fn indirections_are_transparent() {
    let plain = key(&record());
    assert_eq!(key(&Box::new(record())), plain);
    assert_eq!(key(&Rc::new(record())), plain);
    assert_eq!(key(&Arc::new(Mutex::new(record()))), plain);
    assert_eq!(key(&&&record()), plain);
}

#[test]
fn pointee_content_not_address_drives_the_key() {
    let shared = Rc::new(RefCell::new(vec![1u32, 2]));
    let alias = Rc::clone(&shared);

    let before = key(&shared);
    assert_eq!(key(&alias), before);
    assert_eq!(key(&Rc::new(RefCell::new(vec![1u32, 2]))), before);

    alias.borrow_mut().push(3);
    assert_ne!(key(&shared), before);
}

#[test]
fn integer_width_is_part_of_the_key() {
    assert_ne!(key(&1u32), key(&1u64));
    assert_ne!(key(&1i32), key(&1u32));
}

#[test]
fn unit_variants_are_distinguished() {
    #[derive(Serialize)]
    enum Mode {
        Fast,
        Slow,
        Custom { level: u8 },
    }

    assert_ne!(key(&Mode::Fast), key(&Mode::Slow));
    assert_ne!(key(&Mode::Custom { level: 1 }), key(&Mode::Custom { level: 2 }));
}

#[test]
fn canonical_seqs_make_sets_order_insensitive() -> Result<()> {
    let config = KeyConfig {
        canonical_seqs: true,
        ..KeyConfig::default()
    };
    let hashed: HashSet<u16> = (0..200).collect();
    let ordered: BTreeSet<u16> = (0..200).rev().collect();
    assert_eq!(derive_key(&hashed, &config)?, derive_key(&ordered, &config)?);
    Ok(())
}

#[test]
fn cyclic_graphs_hit_the_depth_limit() {
    #[derive(Serialize)]
    struct Node {
        value: u32,
        next: Option<Rc<RefCell<Node>>>,
    }

    let a = Rc::new(RefCell::new(Node {
        value: 1,
        next: None,
    }));
    let b = Rc::new(RefCell::new(Node {
        value: 2,
        next: Some(Rc::clone(&a)),
    }));
    a.borrow_mut().next = Some(Rc::clone(&b));

    let config = KeyConfig::default();
    assert_eq!(
        derive_key(&a, &config),
        Err(KeyError::DepthExceeded {
            limit: config.max_depth
        })
    );

    // Break the cycle so both nodes are freed.
    a.borrow_mut().next = None;
    assert!(derive_key(&b, &config).is_ok());
}

#[test]
fn poisoned_locks_cannot_be_encoded() {
    let shared = Arc::new(Mutex::new(5u32));
    let poisoner = Arc::clone(&shared);
    let _ = std::thread::spawn(move || {
        let _guard = poisoner.lock().unwrap();
        panic!("poison the lock");
    })
    .join();

    let err = derive_key(&shared, &KeyConfig::default()).unwrap_err();
    assert!(matches!(err, KeyError::Custom(_)));
    assert!(err.to_string().contains("cannot be serialized"));
}

#[test]
fn mutably_borrowed_cells_cannot_be_encoded() {
    let cell = RefCell::new(3u8);
    let _guard = cell.borrow_mut();
    assert!(matches!(
        derive_key(&cell, &KeyConfig::default()),
        Err(KeyError::Custom(_))
    ));
}
