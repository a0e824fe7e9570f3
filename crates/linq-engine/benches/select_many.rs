use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use linq_engine::{of, range, repeat, Seq};
use std::time::Duration;

fn bench_outer_len() -> usize {
    std::env::var("LINQ_ENGINE_SELECT_MANY_BENCH_OUTER")
        .ok()
        .and_then(|v| v.replace('_', "").parse::<usize>().ok())
        .filter(|&v| (1_000..=1_000_000).contains(&v))
        .unwrap_or(10_000)
}

/// Every other inner sequence has no cheap count, so the bulk path exercises both the reserved
/// and the appended branches.
fn mixed(outer: usize) -> Seq<u32> {
    of((0..outer as u32).collect()).select_many(|&n| {
        let len = (n % 16) as usize;
        if n % 2 == 0 {
            repeat(n, len)
        } else {
            repeat(n, len).where_(|_| true)
        }
    })
}

fn bench_select_many(c: &mut Criterion) {
    let outer = bench_outer_len();
    let seq = mixed(outer);
    let total = seq.count().unwrap();

    let mut group = c.benchmark_group("select_many");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(total as u64));

    group.bench_with_input(BenchmarkId::new("streaming", outer), &seq, |b, seq| {
        b.iter(|| {
            let mut sum = 0u64;
            for item in seq {
                sum += u64::from(item.unwrap());
            }
            black_box(sum);
        })
    });

    group.bench_with_input(BenchmarkId::new("to_vec", outer), &seq, |b, seq| {
        b.iter(|| black_box(seq.to_vec().unwrap()))
    });

    let counted = range(0, outer)
        .unwrap()
        .select_many(|&n| repeat(n, (n % 16) as usize));
    group.bench_with_input(BenchmarkId::new("to_vec_reserved", outer), &counted, |b, seq| {
        b.iter(|| black_box(seq.to_vec().unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_select_many);
criterion_main!(benches);
