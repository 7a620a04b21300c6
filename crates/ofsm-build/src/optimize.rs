// Optimize: merge compatible input states of one flake.
//
// Two jump rows are compatible when, for every symbol, either side is
// invalid or both lead to the same state. Merging them keeps every valid
// path's result and fills gaps of the surviving row. The merge is greedy:
// states are visited in (hash, old id) order and joined to the first
// compatible representative of their hash bucket, so the result is never
// wrong but need not be the coarsest possible partition.

use ofsm_core::{INVALID_STATE, State, Symbol, is_valid};

use crate::machine::Machine;
use crate::{OfsmError, alloc_table};

/// Partition hint: states only merge when their hashes are equal.
pub type RowHash<'a> = &'a dyn Fn(&[State], &[Symbol]) -> u64;

/// State counts of one optimized flake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub before: u32,
    pub after: u32,
}

#[derive(Debug, Clone, Copy)]
struct StateInfo {
    old: State,
    /// Index of the representative this state merged into.
    slot: u32,
    hash: u64,
    final_index: State,
}

/// FNV-1a over the row. Only identical rows share a bucket, which restricts
/// merging to exact duplicates.
pub fn exact_row_hash(row: &[State], _path: &[Symbol]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &target in row {
        for byte in target.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    hash
}

#[inline]
fn compatible(a: &[State], b: &[State]) -> bool {
    a.iter()
        .zip(b)
        .all(|(&x, &y)| !is_valid(x) || !is_valid(y) || x == y)
}

#[inline]
fn fill_gaps(representative: &mut [State], row: &[State]) {
    for (x, &y) in representative.iter_mut().zip(row) {
        if !is_valid(*x) {
            *x = y;
        }
    }
}

/// Merge compatible input states of flake `index` and rewrite the
/// predecessor's transitions to the survivors.
///
/// Without a hash every reachable state is a merge candidate of every
/// other. Unreachable states are dropped. Survivors are numbered in
/// ascending order of their original ids.
pub fn optimize(
    machine: &mut Machine,
    index: usize,
    hash: Option<RowHash<'_>>,
) -> Result<MergeStats, OfsmError> {
    if machine.is_empty() {
        return Err(OfsmError::EmptyMachine("optimize"));
    }
    let count = machine.flakes().len();
    if index == 0 || index >= count {
        return Err(OfsmError::FlakeOutOfRange { index, count });
    }

    let (head, tail) = machine.flakes_mut().split_at_mut(index);
    let pred = &mut head[index - 1];
    let flake = &mut tail[0];
    let q = flake.qinputs() as usize;
    let before = flake.qstates();

    let mut infos: Vec<StateInfo> = Vec::new();
    infos.try_reserve_exact(pred.reached_count())?;
    for state in 0..before {
        let Some(path) = pred.path(state) else {
            continue;
        };
        infos.push(StateInfo {
            old: state,
            slot: 0,
            hash: hash.map_or(0, |h| h(flake.row(state), path)),
            final_index: INVALID_STATE,
        });
    }
    infos.sort_unstable_by_key(|info| (info.hash, info.old));

    // Representative rows, one per slot, in creation order.
    let mut rows: Vec<State> = Vec::new();
    let mut slot_owner: Vec<State> = Vec::new();
    let mut start = 0;
    while start < infos.len() {
        let bucket_hash = infos[start].hash;
        let bucket_first_slot = slot_owner.len();
        let mut i = start;
        while i < infos.len() && infos[i].hash == bucket_hash {
            let row = flake.row(infos[i].old);
            let found = (bucket_first_slot..slot_owner.len())
                .find(|&slot| compatible(&rows[slot * q..(slot + 1) * q], row));
            let slot = match found {
                Some(slot) => {
                    fill_gaps(&mut rows[slot * q..(slot + 1) * q], row);
                    slot
                }
                None => {
                    rows.try_reserve(q)?;
                    rows.extend_from_slice(row);
                    slot_owner.push(infos[i].old);
                    slot_owner.len() - 1
                }
            };
            infos[i].slot = slot as u32;
            i += 1;
        }
        start = i;
    }

    // Final ids follow the representatives' original order.
    let mut order: Vec<usize> = (0..slot_owner.len()).collect();
    order.sort_unstable_by_key(|&slot| slot_owner[slot]);
    let mut slot_final = vec![INVALID_STATE; slot_owner.len()];
    for (final_index, &slot) in order.iter().enumerate() {
        slot_final[slot] = final_index as State;
    }

    let mut translation = alloc_table(before as usize, INVALID_STATE)?;
    for info in &mut infos {
        info.final_index = slot_final[info.slot as usize];
        translation[info.old as usize] = info.final_index;
    }

    let after = order.len() as u32;
    let mut jumps = alloc_table(order.len() * q, INVALID_STATE)?;
    let mut representatives = Vec::with_capacity(order.len());
    for (final_index, &slot) in order.iter().enumerate() {
        jumps[final_index * q..(final_index + 1) * q]
            .copy_from_slice(&rows[slot * q..(slot + 1) * q]);
        representatives.push(slot_owner[slot]);
    }

    flake.replace_rows(after, jumps);
    pred.remap_outputs(&translation, &representatives)?;

    Ok(MergeStats { before, after })
}

/// Optimize every real flake, last to first, so that merges in later flakes
/// expose further merges in earlier ones.
pub fn optimize_all(
    machine: &mut Machine,
    hash: Option<RowHash<'_>>,
) -> Result<Vec<MergeStats>, OfsmError> {
    if machine.is_empty() {
        return Err(OfsmError::EmptyMachine("optimize"));
    }
    (1..machine.flakes().len())
        .rev()
        .map(|index| optimize(machine, index, hash))
        .collect()
}
