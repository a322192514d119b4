//! Benchmarks for trigger fan-out and computed chains.
//!
//! Run with: cargo bench -p lumen-core -- trigger

use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use lumen_core::observe::{reactive, Value};
use lumen_core::reactive::{derive, effect, Computed, Effect};

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigger/fan_out");

    for count in [1u64, 10, 100, 1_000] {
        group.throughput(Throughput::Elements(count));

        let state = reactive(Value::record([("count", 0)]))
            .into_observed()
            .expect("record");
        let sum = Rc::new(Cell::new(0i64));
        let effects: Vec<Effect> = (0..count)
            .map(|_| {
                let (state, sum) = (state.clone(), sum.clone());
                effect(move || sum.set(sum.get() + state.get("count").as_int().unwrap_or(0)))
            })
            .collect();

        let mut next = 0i64;
        group.bench_with_input(BenchmarkId::from_parameter(count), &(), |b, _| {
            b.iter(|| {
                next += 1;
                state.set("count", next);
                black_box(sum.get())
            })
        });

        for effect in &effects {
            effect.stop();
        }
    }

    group.finish();
}

fn bench_computed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigger/computed_chain");

    for depth in [1usize, 10, 100] {
        let state = reactive(Value::record([("count", 0)]))
            .into_observed()
            .expect("record");

        let root = {
            let state = state.clone();
            derive(move || state.get("count").as_int().unwrap_or(0))
        };
        let mut tail: Computed<i64> = root;
        for _ in 1..depth {
            let previous = tail.clone();
            tail = derive(move || previous.get() + 1);
        }

        let mut next = 0i64;
        group.bench_with_input(BenchmarkId::from_parameter(depth), &(), |b, _| {
            b.iter(|| {
                next += 1;
                state.set("count", next);
                black_box(tail.get())
            })
        });
    }

    group.finish();
}

fn bench_list_push(c: &mut Criterion) {
    c.bench_function("trigger/list_push", |b| {
        b.iter_with_setup(
            || {
                let list = reactive(Value::list(Vec::<i64>::new()))
                    .into_observed()
                    .expect("list");
                let reader = {
                    let list = list.clone();
                    effect(move || {
                        black_box(list.len());
                    })
                };
                (list, reader)
            },
            |(list, reader)| {
                for i in 0..100i64 {
                    list.push(i);
                }
                reader.stop();
            },
        )
    });
}

criterion_group!(benches, bench_fan_out, bench_computed_chain, bench_list_push);
criterion_main!(benches);
