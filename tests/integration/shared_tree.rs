#![allow(clippy::all)]

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;

use bplus_index::{
    storage::btree::Window, Key, MemStore, NaturalOrder, Result, SharedTree, Tree, TreeOptions,
};

#[test]
fn writers_and_warmers_share_one_tree() -> Result<()> {
    let options = TreeOptions::default().order(5).cache_capacity(64);
    let shared = SharedTree::new(Tree::open_or_create(MemStore::new(), options)?);
    let stop = Arc::new(AtomicBool::new(false));

    let warmer = {
        let shared = shared.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || -> Result<usize> {
            let mut loaded = 0;
            while !stop.load(AtomicOrdering::Relaxed) {
                let root = shared.root();
                loaded += shared.warm(&[root])?;
                thread::yield_now();
            }
            Ok(loaded)
        })
    };

    let writers: Vec<_> = (0..3u32)
        .map(|w| {
            let shared = shared.clone();
            thread::spawn(move || -> Result<()> {
                for i in 0..200u32 {
                    shared.insert(&mut NaturalOrder, 1 + (i % 50), w == 0)?;
                }
                Ok(())
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer panicked")?;
    }
    stop.store(true, AtomicOrdering::Relaxed);
    warmer.join().expect("warmer panicked")?;

    for key in 1..=50 {
        let found = shared.lookup(&mut NaturalOrder, &Key::Known(key), Window::ALL)?;
        assert_eq!(found.total(), 12, "key {key}");
    }
    let shape = shared.with(|tree| tree.check(&mut NaturalOrder))?;
    assert_eq!(shape.records, 600);
    assert_eq!(shared.stats_snapshot().inserts, 600);
    Ok(())
}
