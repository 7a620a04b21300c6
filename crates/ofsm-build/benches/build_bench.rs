// Criterion benchmarks for ofsm-build.
//
// Run:
//   cargo bench -p ofsm-build

use criterion::{Criterion, criterion_group, criterion_main};
use ofsm_build::{Machine, OfsmArray, PackMode, Script, Symbol};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Highest symbol plus the number of distinct "suits" (symbol % 4).
fn score(path: &[Symbol]) -> u64 {
    let high = path.iter().copied().max().unwrap_or(0) as u64;
    let mut suits = 0u8;
    for &s in path {
        suits |= 1 << (s % 4);
    }
    high * 8 + suits.count_ones() as u64
}

fn packed_hands() -> Machine {
    let mut script = Script::new();
    script.comb(20, 4).pack(score, PackMode::Renumber);
    script.finish().expect("build packed hands")
}

fn exported_hands() -> OfsmArray {
    let mut script = Script::new();
    script
        .comb(20, 4)
        .pack(score, PackMode::Renumber)
        .optimize_all();
    script.make_array(1).expect("export hands")
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Grow all 4-element sets of 20 symbols (4845 states).
fn bench_grow_comb(c: &mut Criterion) {
    c.bench_function("grow_comb_20_4", |b| {
        b.iter(|| {
            let mut script = Script::new();
            script.comb(20, 4);
            std::hint::black_box(script.machine().state_count());
        });
    });
}

fn bench_pack(c: &mut Criterion) {
    c.bench_function("pack_comb_20_4", |b| {
        b.iter(|| {
            let mut script = Script::new();
            script.comb(20, 4).pack(score, PackMode::Renumber);
            std::hint::black_box(script.machine().state_count());
        });
    });
}

fn bench_optimize_all(c: &mut Criterion) {
    let machine = packed_hands();
    c.bench_function("optimize_all_comb_20_4", |b| {
        b.iter(|| {
            let mut m = machine.clone();
            std::hint::black_box(ofsm_build::optimize::optimize_all(&mut m, None).ok());
        });
    });
}

/// Evaluate 380 four-symbol sequences (some with repeats) through the array.
fn bench_array_run(c: &mut Criterion) {
    let array = exported_hands();
    let mut hands = Vec::new();
    for a in 0..20u8 {
        for b in (0..20u8).filter(|&b| b != a) {
            hands.push([a, b, (a + 1) % 20, (b + 2) % 20]);
        }
    }
    c.bench_function("array_run_380_hands", |b| {
        b.iter(|| {
            let mut acc = 0u32;
            for hand in &hands {
                acc = acc.wrapping_add(array.run(hand));
            }
            std::hint::black_box(acc);
        });
    });
}

criterion_group!(
    benches,
    bench_grow_comb,
    bench_pack,
    bench_optimize_all,
    bench_array_run
);
criterion_main!(benches);
