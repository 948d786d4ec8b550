#![allow(clippy::all)]

use std::cmp::Ordering;

use bplus_index::{storage::btree::Window, Key, MemStore, Result, Tree, TreeOptions};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy)]
struct Statement {
    subject: u32,
    predicate: u32,
    object: u32,
}

/// Orders statement ids by subject; an unknown key is a bare subject.
fn by_subject(statements: &[Statement]) -> impl FnMut(&Key<u32>, &Key<u32>) -> Result<Ordering> + '_ {
    move |a: &Key<u32>, b: &Key<u32>| {
        let subject = |key: &Key<u32>| match key {
            Key::Known(id) => statements[*id as usize].subject,
            Key::Unknown(subject) => *subject,
        };
        Ok(subject(a).cmp(&subject(b)))
    }
}

fn index(order: usize, statements: &[Statement]) -> Result<Tree<MemStore>> {
    let mut tree = Tree::open_or_create(MemStore::new(), TreeOptions::default().order(order))?;
    let mut cmp = by_subject(statements);
    for id in 0..statements.len() as u32 {
        tree.insert(&mut cmp, id, true)?;
    }
    Ok(tree)
}

#[test]
fn statements_grouped_by_subject_in_insertion_order() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let statements: Vec<Statement> = (0..600)
        .map(|_| Statement {
            subject: rng.gen_range(0..30),
            predicate: rng.gen_range(0..5),
            object: rng.gen(),
        })
        .collect();
    let mut tree = index(6, &statements)?;

    let mut cmp = by_subject(&statements);
    for subject in 0..32 {
        let found = tree.lookup(&mut cmp, &Key::Unknown(subject), Window::ALL)?;
        let expected: Vec<u32> = statements
            .iter()
            .enumerate()
            .filter(|(_, s)| s.subject == subject)
            .map(|(id, _)| id as u32)
            .collect();
        assert_eq!(found.items(), expected.as_slice(), "subject {subject}");
    }
    let shape = tree.check::<u32>(&mut cmp)?;
    assert_eq!(shape.records, statements.len());
    Ok(())
}

#[test]
fn paging_through_a_hot_subject() -> Result<()> {
    let statements: Vec<Statement> = (0..90)
        .map(|i| Statement {
            subject: if i % 3 == 0 { 1 } else { 2 },
            predicate: i,
            object: i * 7,
        })
        .collect();
    let mut tree = index(3, &statements)?;
    let mut cmp = by_subject(&statements);

    let mut collected = Vec::new();
    let mut start = 0;
    loop {
        let page = tree.lookup(&mut cmp, &Key::Unknown(1), Window::new(start, 8))?;
        collected.extend_from_slice(page.items());
        start += 8;
        if start >= page.total() {
            break;
        }
    }
    let predicates: Vec<u32> = collected
        .iter()
        .map(|&id| statements[id as usize].predicate)
        .collect();
    assert_eq!(predicates, (0..90).step_by(3).collect::<Vec<_>>());
    assert!(collected.iter().all(|&id| statements[id as usize].object == id * 7));
    Ok(())
}
