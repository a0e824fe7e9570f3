#![no_main]

use libfuzzer_sys::fuzz_target;

use linq_engine::{of, repeat, LinqResult, Seq};

const MAX_OUTER: usize = 1_024;

/// Byte `b` expands to `b % 8` copies of itself; bit 3 picks an inner with no cheap count.
fn inner(b: u8) -> Seq<u8> {
    let len = usize::from(b % 8);
    if b & 0b1000 == 0 {
        repeat(b, len)
    } else {
        repeat(b, len).where_(|_| true)
    }
}

fuzz_target!(|data: &[u8]| {
    let outer: Vec<u8> = data.iter().copied().take(MAX_OUTER).collect();
    let seq = of(outer.clone()).select_many(|&b| inner(b));

    let expected: Vec<u8> = outer
        .iter()
        .flat_map(|&b| std::iter::repeat(b).take(usize::from(b % 8)))
        .collect();

    let streamed = match seq.iter().collect::<LinqResult<Vec<u8>>>() {
        Ok(items) => items,
        Err(err) => panic!("streaming failed: {err}"),
    };
    assert_eq!(streamed, expected);
    match seq.to_vec() {
        Ok(bulk) => assert_eq!(bulk, expected),
        Err(err) => panic!("bulk copy failed: {err}"),
    }
});
