mod common;

use common::{collect, failing, tracked};
use linq_engine::{
    default_comparer, of, range, Enumerable, Enumerator, FnComparer, Grouping, LinqError, Lookup,
    LookupOptions, Seq, SharedComparer,
};
use pretty_assertions::assert_eq;

fn contents<K: Clone + 'static, E: Clone + 'static>(lookup: &Lookup<K, E>) -> Vec<(K, Vec<E>)> {
    lookup
        .groupings()
        .map(|g| (g.key().clone(), g.elements().to_vec()))
        .collect()
}

#[test]
fn groups_words_by_length_in_first_seen_order() {
    let words = of(vec!["a", "bb", "ccc", "dd"]);
    let lookup = words.to_lookup(|w| w.len()).unwrap();

    assert_eq!(
        contents(&lookup),
        vec![(1, vec!["a"]), (2, vec!["bb", "dd"]), (3, vec!["ccc"])]
    );
    assert_eq!(lookup.len(), 3);
    assert_eq!(lookup.cheap_count(), Some(3));
}

#[test]
fn construction_drains_the_source_exactly_once() {
    let (source, probe) = tracked(vec![5, 6, 5]);
    let lookup = source.to_lookup(|x| *x).unwrap();
    assert_eq!(probe.opened(), 1);
    assert_eq!(probe.open_cursors(), 0);

    lookup.get(&5).to_vec().unwrap();
    lookup.to_vec().unwrap();
    assert_eq!(probe.opened(), 1);
}

#[test]
fn key_selector_error_aborts_construction() {
    let err = of(vec![1, 2, 3])
        .to_lookup_by(
            |&x| {
                if x == 3 {
                    Err(LinqError::transform("no key"))
                } else {
                    Ok(x)
                }
            },
            default_comparer(),
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "no key");

    let (source, probe) = failing(vec![1, 2], 1);
    assert!(source.to_lookup(|x| *x).is_err());
    assert_eq!(probe.open_cursors(), 0);
}

#[test]
fn resizing_keeps_every_key_reachable() {
    let keys = range(0, 16).unwrap();
    let lookup = keys.to_lookup(|x| x * 3).unwrap();

    assert!(lookup.bucket_count() > 7);
    assert_eq!(lookup.len(), 16);
    for key in 0..16 {
        assert_eq!(lookup.get(&(key * 3)).to_vec().unwrap(), vec![key]);
        assert!(lookup.contains_key(&(key * 3)));
    }
    assert!(!lookup.contains_key(&1));
}

#[test]
fn growth_is_two_n_plus_one() {
    let lookup = Lookup::create_with_options(
        &range(0, 8).unwrap(),
        |x| Ok(*x),
        default_comparer(),
        LookupOptions { initial_buckets: 3 },
    )
    .unwrap();
    // 3 -> 7 on the fourth key, 7 -> 15 on the eighth.
    assert_eq!(lookup.bucket_count(), 15);

    let rounded = Lookup::create_with_options(
        &of(vec![1]),
        |x| Ok(*x),
        default_comparer(),
        LookupOptions { initial_buckets: 4 },
    )
    .unwrap();
    assert_eq!(rounded.bucket_count(), 5);

    let rejected = Lookup::create_with_options(
        &of(vec![1]),
        |x: &i32| Ok(*x),
        default_comparer(),
        LookupOptions { initial_buckets: 0 },
    );
    assert!(matches!(
        rejected,
        Err(LinqError::InvalidArgument { name: "initial_buckets", .. })
    ));
}

#[test]
fn equal_but_distinct_comparers_group_identically() {
    let names = of(vec!["Ann", "bob", "ANN", "Bob", "cy"]);
    let first: SharedComparer<String> = FnComparer::by_key(|s: &String| s.to_lowercase()).shared();
    let second: SharedComparer<String> = FnComparer::by_key(|s: &String| s.to_lowercase()).shared();

    let by_first = names.to_lookup_by(|s| Ok(s.to_string()), first).unwrap();
    let by_second = names.to_lookup_by(|s| Ok(s.to_string()), second).unwrap();

    assert_eq!(contents(&by_first), contents(&by_second));
    assert_eq!(by_first.len(), 3);
    assert_eq!(
        by_first.get(&"BOB".to_string()).to_vec().unwrap(),
        vec!["bob", "Bob"]
    );
}

#[test]
fn element_selector_and_result_selector() {
    let people = of(vec![("eng", "ann"), ("ops", "bob"), ("eng", "cy")]);
    let lookup = Lookup::create_with_elements(
        &people,
        |(team, _)| Ok(*team),
        |(_, name)| Ok(name.len()),
        default_comparer(),
    )
    .unwrap();
    assert_eq!(contents(&lookup), vec![("eng", vec![3, 2]), ("ops", vec![3])]);

    let summary = lookup
        .to_vec_with(|team, sizes| Ok(format!("{team}:{}", sizes.count()?)))
        .unwrap();
    assert_eq!(summary, vec!["eng:2", "ops:1"]);
    assert_eq!(summary.capacity(), 2);

    let lazy = lookup.apply_result_selector(|team, sizes| {
        Ok((team.to_string(), sizes.aggregate(0, |acc, n| Ok(acc + n))?))
    });
    assert_eq!(lazy.cheap_count(), Some(2));
    assert_eq!(
        collect(&lazy),
        vec![("eng".to_string(), 5), ("ops".to_string(), 3)]
    );
    assert_eq!(lazy.to_vec().unwrap(), collect(&lazy));
}

#[test]
fn join_lookup_drops_null_keys() {
    let rows = of(vec![(Some(1), 'a'), (None, 'b'), (Some(1), 'c'), (None, 'd')]);
    let lookup =
        Lookup::create_for_join(&rows, |row: &(Option<i32>, char)| Ok(row.0), default_comparer())
            .unwrap();

    assert_eq!(lookup.len(), 1);
    assert_eq!(
        lookup.get(&1).to_vec().unwrap(),
        vec![(Some(1), 'a'), (Some(1), 'c')]
    );
}

#[test]
fn full_join_lookup_hides_the_null_grouping_from_key_lookup() {
    let rows = of(vec![(None, 'a'), (Some(0), 'b'), (None, 'c')]);
    let lookup = Lookup::create_for_full_join(
        &rows,
        |row: &(Option<i32>, char)| Ok(row.0),
        default_comparer(),
    )
    .unwrap();

    assert_eq!(lookup.len(), 2);
    assert!(!lookup.contains_key(&None));
    assert!(lookup.get(&None).to_vec().unwrap().is_empty());
    assert!(lookup.fetch_grouping(&None).is_none());
    assert!(lookup.contains_key(&Some(0)));

    let keys: Vec<Option<i32>> = lookup.groupings().map(|g| *g.key()).collect();
    assert_eq!(keys, vec![None, Some(0)]);
    let null_rows: Vec<char> = lookup
        .null_key_grouping()
        .map(|g| g.elements().iter().map(|row| row.1).collect())
        .unwrap_or_default();
    assert_eq!(null_rows, vec!['a', 'c']);
}

#[test]
fn fetched_groupings_are_skipped_by_the_unfetched_walk() {
    let rows = of(vec![(Some("x"), 1), (Some("y"), 2), (None, 3), (Some("z"), 4)]);
    let lookup = Lookup::create_for_full_join(&rows, |row| Ok(row.0), default_comparer()).unwrap();

    assert_eq!(lookup.fetch(&Some("y")).to_vec().unwrap(), vec![(Some("y"), 2)]);
    assert!(lookup.fetch(&Some("missing")).to_vec().unwrap().is_empty());
    assert!(lookup.is_fetched(&Some("y")));

    let mut cursor = lookup.unfetched_enumerator();
    let mut keys = Vec::new();
    while cursor.move_next().unwrap() {
        let grouping: &Grouping<Option<&str>, (Option<&str>, i32)> = cursor.current().unwrap();
        keys.push(*grouping.key());
    }
    assert_eq!(keys, vec![Some("x"), None, Some("z")]);
}

#[test]
fn groupings_are_sequences() {
    let lookup = of(vec![1, 2, 3, 4, 5, 6]).to_lookup(|x| x % 3).unwrap();
    let ones = lookup.grouping(&1).unwrap();
    assert_eq!(*ones.key(), 1);
    assert_eq!(ones.len(), 2);

    let seq: Seq<i32> = ones.to_seq();
    assert_eq!(seq.cheap_count(), Some(2));
    assert_eq!(seq.select(|x| x * 10).to_vec().unwrap(), vec![10, 40]);

    let all: Seq<Grouping<i32, i32>> = Seq::new(lookup.clone());
    assert_eq!(all.count().unwrap(), 3);
    assert_eq!(all.first().unwrap().key(), &1);
}

#[test]
fn group_by_is_deferred_and_replayable() {
    let (source, probe) = tracked(vec!["apple", "avocado", "banana", "blueberry", "cherry"]);
    let groups = source.group_by(|s| s.chars().next());
    assert_eq!(probe.opened(), 0);

    let mut cursor = groups.enumerator();
    assert_eq!(probe.opened(), 0);
    assert!(cursor.move_next().unwrap());
    assert_eq!(probe.opened(), 1);
    assert_eq!(cursor.current().map(|g| *g.key()), Some(Some('a')));

    let keys: Vec<Option<char>> = collect(&groups).iter().map(|g| *g.key()).collect();
    assert_eq!(keys, vec![Some('a'), Some('b'), Some('c')]);
    assert_eq!(groups.count().unwrap(), 3);
}

#[test]
fn group_by_element_and_result_selectors() {
    let sales = of(vec![("north", 10), ("south", 5), ("north", 7)]);

    let amounts = sales.group_by_element(|(region, _)| *region, |(_, amount)| *amount);
    let flattened: Vec<(&str, Vec<i32>)> = amounts
        .to_vec()
        .unwrap()
        .into_iter()
        .map(|g| (*g.key(), g.elements().to_vec()))
        .collect();
    assert_eq!(flattened, vec![("north", vec![10, 7]), ("south", vec![5])]);

    let totals = sales.group_by_result(
        |(region, _)| *region,
        |(_, amount)| *amount,
        |region, amounts| (region.to_string(), amounts.to_vec().unwrap().iter().sum::<i32>()),
    );
    assert_eq!(
        totals.to_vec().unwrap(),
        vec![("north".to_string(), 17), ("south".to_string(), 5)]
    );
    assert_eq!(collect(&totals), totals.to_vec().unwrap());
}

#[test]
fn try_group_by_uses_the_supplied_comparer() {
    let words = of(vec!["Tea", "tea", "TEA", "coffee"]);
    let comparer = FnComparer::by_key(|s: &String| s.to_lowercase()).shared();
    let groups = words.try_group_by(|w| Ok(w.to_string()), comparer);

    let sizes: Vec<(String, usize)> = groups
        .to_vec()
        .unwrap()
        .iter()
        .map(|g| (g.key().clone(), g.len()))
        .collect();
    assert_eq!(sizes, vec![("Tea".to_string(), 3), ("coffee".to_string(), 1)]);
}
