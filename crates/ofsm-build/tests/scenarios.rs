//! End-to-end pipelines: grow, pack, optimize, export, and evaluate the
//! exported array against brute force.

use hashbrown::{HashMap, HashSet};
use ofsm_build::optimize::exact_row_hash;
use ofsm_build::{BuildOptions, INVALID_STATE, Machine, OfsmArray, PackMode, Script, StepStatus, Symbol};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Scripts in these tests check machine invariants after every step.
fn validated() -> Script {
    Script::with_options(BuildOptions::default().with_validation(true))
}

/// Every sequence of `len` symbols, each below the matching entry of `radix`.
fn sequences(radix: &[u8]) -> Vec<Vec<Symbol>> {
    let mut out = vec![Vec::new()];
    for &q in radix {
        out = out
            .into_iter()
            .flat_map(|p| {
                (0..q).map(move |x| {
                    let mut next = p.clone();
                    next.push(x);
                    next
                })
            })
            .collect();
    }
    out
}

fn has_repeat(path: &[Symbol]) -> bool {
    let mut seen = HashSet::new();
    !path.iter().all(|s| seen.insert(*s))
}

/// A toy hand score: size of the largest "suit" (symbol % 4) group, times
/// 16, plus the highest "rank" (symbol / 4). Order-independent.
fn toy_score(path: &[Symbol]) -> u64 {
    let mut suits = [0u64; 4];
    for &s in path {
        suits[(s % 4) as usize] += 1;
    }
    let flush = suits.iter().copied().max().unwrap_or(0);
    let high = path.iter().map(|&s| s / 4).max().unwrap_or(0) as u64;
    flush * 16 + high
}

fn assert_array_matches(machine: &Machine, array: &OfsmArray, delta: u32, radix: &[u8]) {
    for path in sequences(radix) {
        let state = machine.execute(&path);
        let expected = if state == INVALID_STATE { 0 } else { state + delta };
        assert_eq!(array.run(&path), expected, "path {path:?}");
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_pairs_without_repetition() {
    let mut script = validated();
    script.comb(4, 2);
    assert_eq!(script.status(), StepStatus::Done);
    let machine = script.machine();
    assert_eq!(machine.state_count(), 6);

    let array = script.make_array(1).unwrap();
    let mut hits: HashMap<u32, usize> = HashMap::new();
    let mut valid = 0;
    for path in sequences(&[4, 4]) {
        let code = array.run(&path);
        if path[0] == path[1] {
            assert_eq!(code, 0, "path {path:?}");
        } else {
            valid += 1;
            assert!((1..=6).contains(&code), "path {path:?} -> {code}");
            *hits.entry(code).or_default() += 1;
        }
    }
    assert_eq!(valid, 12);
    assert_eq!(hits.len(), 6);
    assert!(hits.values().all(|&n| n == 2));
}

#[test]
fn scenario_b_product_of_independent_draws() {
    let mut script = validated();
    script.power(4, 1).power(5, 1).product();
    assert_eq!(script.status(), StepStatus::Done, "{:?}", script.error());
    assert_eq!(script.machine().state_count(), 20);

    let array = script.make_array(1).unwrap();
    let mut seen = HashSet::new();
    for a in 0..4u8 {
        for b in 0..5u8 {
            let code = array.run(&[a, b]);
            assert!((1..=20).contains(&code));
            assert!(seen.insert(code), "code {code} reached twice");
        }
    }
    assert_eq!(seen.len(), 20);
}

#[test]
fn scenario_b_each_state_has_one_pair() {
    let mut script = validated();
    script.power(4, 1).power(5, 1).product();
    let machine = script.machine();
    for a in 0..4u8 {
        for b in 0..5u8 {
            let state = a as u32 * 5 + b as u32;
            assert_eq!(machine.canonical_path(state), Some(&[a, b][..]));
            assert_eq!(machine.execute(&[a, b]), state);
        }
    }

    // No other pair lands on a state already claimed by (a, b).
    let mut hits: HashMap<u32, usize> = HashMap::new();
    for path in sequences(&[4, 5]) {
        *hits.entry(machine.execute(&path)).or_default() += 1;
    }
    assert_eq!(hits.len(), 20);
    assert!(hits.values().all(|&n| n == 1));
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

#[test]
fn comb_pack_optimize_export() {
    let mut script = validated();
    script
        .comb(12, 3)
        .pack(toy_score, PackMode::Renumber)
        .optimize_all();
    assert_eq!(script.status(), StepStatus::Done);
    let array = script.make_array(1).unwrap();

    // Brute force: every ordering of distinct symbols scores like its set.
    let mut by_score: HashMap<u64, u32> = HashMap::new();
    for path in sequences(&[12, 12, 12]) {
        let code = array.run(&path);
        if has_repeat(&path) {
            assert_eq!(code, 0);
            continue;
        }
        let mut sorted = path.clone();
        sorted.sort_unstable();
        let score = toy_score(&sorted);
        let previous = *by_score.entry(score).or_insert(code);
        assert_eq!(previous, code, "score {score} split across codes");
    }

    // Dense codes in ascending score order.
    let mut scores: Vec<u64> = by_score.keys().copied().collect();
    scores.sort_unstable();
    for (i, score) in scores.iter().enumerate() {
        assert_eq!(by_score[score], i as u32 + 1);
    }
}

#[test]
fn optimizing_shrinks_without_changing_results() {
    let build = |optimize: bool| {
        let mut script = validated();
        script.power(6, 4).pack(
            |p| p.iter().map(|&s| s as u64).sum::<u64>() % 5,
            PackMode::Renumber,
        );
        if optimize {
            script.optimize_all();
        }
        assert_eq!(script.status(), StepStatus::Done);
        script.finish().unwrap()
    };
    let plain = build(false);
    let optimized = build(true);

    let plain_cells = plain.to_array(1).unwrap().len();
    let optimized_array = optimized.to_array(1).unwrap();
    assert!(optimized_array.len() < plain_cells / 10);
    for flake in &optimized.flakes()[2..] {
        // Only the running sum mod 5 matters after the first symbol.
        assert!(flake.qstates() <= 5);
    }
    assert_array_matches(&plain, &optimized_array, 1, &[6, 6, 6, 6]);
}

#[test]
fn hashed_optimize_is_never_worse_than_correct() {
    let mut script = validated();
    script
        .comb(8, 2)
        .pack(|p| (p[0] / 2 + p[1] / 2) as u64, PackMode::Renumber);
    let before = script.machine().clone();
    script.push(ofsm_build::Step::OptimizeAll {
        hash: Some(Box::new(exact_row_hash)),
    });
    assert_eq!(script.status(), StepStatus::Done);

    let after = script.machine();
    for path in sequences(&[8, 8]) {
        let expected = before.execute(&path);
        if expected != INVALID_STATE {
            assert_eq!(after.execute(&path), expected);
        }
    }
}

#[test]
fn skip_renumbering_exposes_raw_values() {
    let mut script = validated();
    script
        .comb(6, 2)
        .pack(|p| 10 + (p[0] as u64).max(p[1] as u64), PackMode::SkipRenumbering);
    assert_eq!(script.status(), StepStatus::Done);
    let machine = script.machine();
    assert_eq!(machine.state_count(), 16);
    assert_eq!(machine.execute(&[5, 0]), 15);
    assert_eq!(machine.execute(&[1, 0]), 11);
    assert_eq!(machine.canonical_path(3), None);
}

#[test]
fn product_of_comb_blocks() {
    // Two symbols from one deck, then one symbol from another.
    let mut script = validated();
    script.comb(5, 2).comb(3, 1).product();
    assert_eq!(script.status(), StepStatus::Done);
    let machine = script.machine();
    assert_eq!(machine.state_count(), 10 * 3);
    assert_eq!(machine.execute(&[4, 1, 2]), machine.execute(&[1, 4, 2]));
    assert_eq!(machine.execute(&[4, 4, 2]), INVALID_STATE);

    let array = script.make_array(1).unwrap();
    assert_array_matches(machine, &array, 1, &[5, 5, 3]);
}

#[test]
fn failed_script_still_exports_partial_machine() {
    let mut script = validated();
    script.power(3, 2).optimize(9).pack(|_| 0, PackMode::Renumber);
    assert_eq!(script.status(), StepStatus::Failed);
    assert_eq!(script.steps()[2].status, StepStatus::New);

    let array = script.make_array(1).unwrap();
    assert_eq!(array.run(&[2, 2]), 9);
}

#[test]
fn canonical_paths_decode_every_state() {
    let mut script = validated();
    script
        .power(2, 1)
        .comb(6, 2)
        .pack(toy_score, PackMode::Renumber)
        .optimize_all();
    let machine = script.machine();
    for state in 0..machine.state_count() {
        let path = machine
            .canonical_path(state)
            .unwrap_or_else(|| panic!("state {state} has no path"));
        assert_eq!(machine.execute(path), state);
    }
}
