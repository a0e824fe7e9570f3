mod common;

use common::{collect, drain, failing, tracked, tracked_counted};
use linq_engine::{of, repeat, LinqError, Seq};
use pretty_assertions::assert_eq;

#[test]
fn repeat_each_value_by_itself_streaming_and_bulk() {
    let seq = of(vec![1, 2, 2, 3]).select_many(|&x| repeat(x, x as usize));
    let expected = vec![1, 2, 2, 2, 2, 3, 3, 3];

    assert_eq!(drain(&mut seq.enumerator()), expected);
    assert_eq!(seq.to_vec().unwrap(), expected);
    assert_eq!(&*seq.to_array().unwrap(), expected.as_slice());
    assert_eq!(seq.count().unwrap(), expected.len());
}

#[test]
fn bulk_and_streaming_agree_on_mixed_inner_sequences() {
    let seq = of(vec![0usize, 1, 2, 3, 4, 5]).select_many(|&n| {
        if n % 2 == 0 {
            repeat(n, n)
        } else {
            tracked(vec![n; n]).0
        }
    });

    let streamed = collect(&seq);
    assert_eq!(streamed, vec![1, 2, 2, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 5]);
    assert_eq!(seq.to_vec().unwrap(), streamed);
    assert_eq!(seq.count().unwrap(), streamed.len());
}

#[test]
fn reserved_inner_sequences_are_enumerated_once_each() {
    let (inner, probe) = tracked_counted(vec![1, 2, 3]);
    let seq = of(vec!['a', 'b']).select_many(move |_| inner.clone());

    assert_eq!(seq.to_vec().unwrap(), vec![1, 2, 3, 1, 2, 3]);
    assert_eq!(probe.opened(), 2);
    assert_eq!(probe.open_cursors(), 0);
}

#[test]
fn unknown_length_inner_sequences_are_appended_in_place() {
    let (inner, probe) = tracked(vec![7, 8]);
    let seq = of(vec![1, 2, 3]).select_many(move |&x| {
        if x == 2 {
            inner.clone()
        } else {
            repeat(x, 2)
        }
    });

    assert_eq!(seq.to_vec().unwrap(), vec![1, 1, 7, 8, 3, 3]);
    assert_eq!(probe.opened(), 1);
}

#[test]
fn selector_error_closes_outer_cursor() {
    let (source, probe) = tracked(vec![1, 2, 3]);
    let seq = source.try_select_many(|&x| {
        if x == 2 {
            Err(LinqError::transform("bad element"))
        } else {
            Ok(repeat(x, 1))
        }
    });

    let mut cursor = seq.enumerator();
    assert!(cursor.move_next().unwrap());
    assert_eq!(cursor.current(), Some(&1));

    let err = cursor.move_next().unwrap_err();
    assert_eq!(err.to_string(), "bad element");
    assert_eq!(probe.opened(), 1);
    assert_eq!(probe.open_cursors(), 0);
    assert!(!cursor.move_next().unwrap());
}

#[test]
fn inner_error_closes_every_cursor_on_both_paths() {
    let (inner, inner_probe) = failing(vec![7, 8], 1);
    let (outer, outer_probe) = tracked(vec![1, 2]);
    let seq = outer.select_many(move |_| inner.clone());

    let err = seq.to_vec().unwrap_err();
    assert_eq!(err.to_string(), "source failed");
    assert_eq!(outer_probe.open_cursors(), 0);
    assert_eq!(inner_probe.open_cursors(), 0);

    let mut cursor = seq.enumerator();
    assert!(cursor.move_next().unwrap());
    assert_eq!(cursor.current(), Some(&7));
    assert!(cursor.move_next().is_err());
    assert_eq!(outer_probe.open_cursors(), 0);
    assert_eq!(inner_probe.open_cursors(), 0);
}

#[test]
fn closing_mid_iteration_releases_nested_cursors() {
    let (outer, outer_probe) = tracked(vec![1, 2, 3]);
    let (inner, inner_probe) = tracked(vec![10, 20]);
    let seq = outer.select_many(move |_| inner.clone());

    let mut cursor = seq.enumerator();
    assert!(cursor.move_next().unwrap());
    assert_eq!(outer_probe.open_cursors(), 1);
    assert_eq!(inner_probe.open_cursors(), 1);

    cursor.close();
    cursor.close();
    assert_eq!(outer_probe.open_cursors(), 0);
    assert_eq!(inner_probe.open_cursors(), 0);
    assert!(!cursor.move_next().unwrap());
    assert_eq!(cursor.current(), None);
}

#[test]
fn exhausted_inner_cursor_is_closed_before_next_outer_element() {
    let (outer, _) = tracked(vec![1, 2]);
    let (inner, inner_probe) = tracked(vec![5]);
    let seq = outer.select_many(move |_| inner.clone());

    let mut cursor = seq.enumerator();
    assert!(cursor.move_next().unwrap());
    assert!(cursor.move_next().unwrap());
    assert_eq!(inner_probe.opened(), 2);
    assert_eq!(inner_probe.open_cursors(), 1);
    assert!(!cursor.move_next().unwrap());
    assert_eq!(inner_probe.open_cursors(), 0);
}

#[test]
fn total_count_overflow_is_reported() {
    let seq = of(vec![1, 2]).select_many(|_| repeat(0u8, usize::MAX));

    assert!(matches!(seq.count(), Err(LinqError::Overflow { .. })));
    assert!(matches!(seq.to_vec(), Err(LinqError::Overflow { .. })));
}

#[test]
fn indexed_flavor_passes_positions() {
    let seq = of(vec!['x', 'y', 'z']).select_many_indexed(|&c, i| repeat(c, i));
    assert_eq!(seq.to_vec().unwrap(), vec!['y', 'z', 'z']);
    assert_eq!(collect(&seq), vec!['y', 'z', 'z']);
}

#[test]
fn result_flavors_pair_inner_with_outer() {
    let owners = of(vec![("ann", vec!["cat", "dog"]), ("bob", vec![]), ("cy", vec!["fish"])]);
    let pets: Seq<String> = owners.select_many_with(
        |(_, pets)| of(pets.clone()),
        |(owner, _), pet| format!("{owner}:{pet}"),
    );
    assert_eq!(pets.to_vec().unwrap(), vec!["ann:cat", "ann:dog", "cy:fish"]);
    assert_eq!(pets.count().unwrap(), 3);

    let numbered = of(vec!["a", "b"])
        .select_many_indexed_with(|_, i| repeat(i, i + 1), |s, i| format!("{s}{i}"));
    assert_eq!(numbered.to_vec().unwrap(), vec!["a0", "b1", "b1"]);
}

#[test]
fn empty_outer_and_empty_inners_produce_nothing() {
    let none = of(Vec::<u32>::new()).select_many(|&x| repeat(x, 3));
    assert!(none.to_vec().unwrap().is_empty());
    assert_eq!(none.count().unwrap(), 0);

    let hollow = of(vec![1, 2, 3]).select_many(|&x| repeat(x, 0));
    assert!(collect(&hollow).is_empty());
    assert!(hollow.to_vec().unwrap().is_empty());
}
