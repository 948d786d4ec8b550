#![allow(clippy::all)]

use std::cmp::Ordering;

use bplus_index::{
    storage::btree::Window, Decision, Key, MemStore, Result, Tree, TreeOptions,
};
use rand::{distributions::Alphanumeric, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// String dictionary: ids index `strings`, the tree orders ids by string.
struct Dict {
    strings: Vec<String>,
    tree: Tree<MemStore>,
}

fn resolve<'a>(strings: &'a [String], key: &'a Key<String>) -> &'a str {
    match key {
        Key::Known(id) => &strings[*id as usize],
        Key::Unknown(text) => text,
    }
}

impl Dict {
    fn open(order: usize) -> Result<Self> {
        Ok(Self {
            strings: Vec::new(),
            tree: Tree::open_or_create(MemStore::new(), TreeOptions::default().order(order))?,
        })
    }

    fn intern(&mut self, text: &str) -> Result<u32> {
        let strings = &self.strings;
        let mut cmp = |a: &Key<String>, b: &Key<String>| -> Result<Ordering> {
            Ok(resolve(strings, a).cmp(resolve(strings, b)))
        };
        let next = strings.len() as u32;
        let mut existing = None;
        let inserted = self
            .tree
            .insert_with(&mut cmp, &Key::Unknown(text.to_owned()), |found| match found {
                Some(record) => {
                    existing = Some(record.value);
                    Decision::Skip
                }
                None => Decision::Insert {
                    record: next,
                    back: false,
                },
            })?;
        match (inserted, existing) {
            (Some(id), _) => {
                self.strings.push(text.to_owned());
                Ok(id)
            }
            (None, Some(id)) => Ok(id),
            (None, None) => unreachable!("hook always decides"),
        }
    }

    fn get(&mut self, text: &str) -> Result<Option<u32>> {
        let strings = &self.strings;
        let mut cmp = |a: &Key<String>, b: &Key<String>| -> Result<Ordering> {
            Ok(resolve(strings, a).cmp(resolve(strings, b)))
        };
        let found = self
            .tree
            .lookup(&mut cmp, &Key::Unknown(text.to_owned()), Window::new(0, 1))?;
        Ok(found.items().first().copied())
    }
}

fn random_string(rng: &mut ChaCha8Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric).map(char::from).take(len).collect()
}

#[test]
fn intern_is_idempotent() -> Result<()> {
    let mut dict = Dict::open(4)?;
    let alpha = dict.intern("alpha")?;
    let beta = dict.intern("beta")?;
    assert_ne!(alpha, beta);
    assert_eq!(dict.intern("alpha")?, alpha);
    assert_eq!(dict.intern("beta")?, beta);
    assert_eq!(dict.get("alpha")?, Some(alpha));
    assert_eq!(dict.get("gamma")?, None);
    assert_eq!(dict.tree.stats_snapshot().skipped_inserts, 2);
    Ok(())
}

#[test]
fn many_strings_resolve_and_stay_ordered() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut dict = Dict::open(5)?;
    let mut words: Vec<String> = (0..400).map(|i| random_string(&mut rng, 3 + i % 9)).collect();
    words.push("repeat".into());
    words.push("repeat".into());

    let ids: Vec<u32> = words.iter().map(|w| dict.intern(w)).collect::<Result<_>>()?;
    for (word, id) in words.iter().zip(&ids) {
        assert_eq!(dict.strings[*id as usize], *word);
        assert_eq!(dict.get(word)?, Some(*id));
    }

    let ordered: Vec<String> = dict
        .tree
        .records()?
        .into_iter()
        .map(|r| dict.strings[r.key as usize].clone())
        .collect();
    let mut expected = dict.strings.clone();
    expected.sort();
    assert_eq!(ordered, expected);

    let strings = dict.strings.clone();
    let mut cmp = |a: &Key<String>, b: &Key<String>| -> Result<Ordering> {
        Ok(resolve(&strings, a).cmp(resolve(&strings, b)))
    };
    let shape = dict.tree.check::<String>(&mut cmp)?;
    assert_eq!(shape.records, strings.len());
    Ok(())
}
