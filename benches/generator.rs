/// Tick generation benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use market_feed_sim::{price_step, InstrumentSet, TickGenerator};

fn create_instruments(count: u32) -> InstrumentSet {
    let mut set = InstrumentSet::new(0.01).unwrap();
    for id in 0..count {
        set.register(id, "SYM", 50.0 + id as f64, 0.03).unwrap();
    }
    set
}

fn bench_price_step(c: &mut Criterion) {
    c.bench_function("price_step", |b| {
        b.iter(|| price_step(black_box(150.0), 0.025, black_box(-0.004), 150.0, 0.01))
    });
}

fn bench_generate_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_tick");

    for count in [1u32, 10, 1000].iter() {
        let mut set = create_instruments(*count);
        let mut gen = TickGenerator::seeded(1);

        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let idx = gen.pick(set.len());
                let inst = set.by_index_mut(idx).unwrap();
                gen.generate(inst, 0.01, 0)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_price_step, bench_generate_tick);
criterion_main!(benches);
