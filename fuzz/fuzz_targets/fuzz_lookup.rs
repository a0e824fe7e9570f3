#![no_main]

use libfuzzer_sys::fuzz_target;

use linq_engine::{default_comparer, of, Lookup, LookupOptions};

/// Keep inputs small enough that the naive model stays cheap.
const MAX_ITEMS: usize = 4_096;

fuzz_target!(|data: &[u8]| {
    let Some((&buckets, rest)) = data.split_first() else {
        return;
    };
    let items: Vec<u8> = rest.iter().copied().take(MAX_ITEMS).collect();
    let initial_buckets = usize::from(buckets % 32) + 1;

    let lookup = match Lookup::create_with_options(
        &of(items.clone()),
        |x: &u8| Ok(x % 37),
        default_comparer(),
        LookupOptions { initial_buckets },
    ) {
        Ok(lookup) => lookup,
        Err(err) => panic!("lookup construction failed: {err}"),
    };

    let mut expected: Vec<(u8, Vec<u8>)> = Vec::new();
    for &item in &items {
        let key = item % 37;
        match expected.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(item),
            None => expected.push((key, vec![item])),
        }
    }

    assert_eq!(lookup.len(), expected.len());
    for (grouping, (key, members)) in lookup.groupings().zip(&expected) {
        assert_eq!(grouping.key(), key);
        assert_eq!(grouping.elements(), members.as_slice());
    }
});
