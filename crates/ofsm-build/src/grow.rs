// Growth steps: power (Cartesian) and combination layers.

use ofsm_core::{ChooseTable, INVALID_STATE, MAX_INPUTS, State, Symbol};

use crate::flake::Flake;
use crate::machine::Machine;
use crate::{InvariantError, OfsmError, state_product};

fn check_inputs(qinputs: u32) -> Result<(), OfsmError> {
    if qinputs == 0 || qinputs > MAX_INPUTS {
        return Err(OfsmError::InvalidInputCount(qinputs));
    }
    Ok(())
}

fn check_room(machine: &Machine, count: u32, max_flakes: usize) -> Result<(), OfsmError> {
    if machine.flakes().len() + count as usize > max_flakes {
        return Err(OfsmError::TooManyFlakes { limit: max_flakes });
    }
    Ok(())
}

/// Append `count` Cartesian layers of `qinputs` symbols each.
///
/// Every layer maps input state `s` and symbol `x` to `s * qinputs + x`, so
/// the terminal state encodes the whole sequence in mixed radix.
pub fn grow_power(
    machine: &mut Machine,
    qinputs: u32,
    count: u32,
    max_flakes: usize,
) -> Result<(), OfsmError> {
    check_inputs(qinputs)?;
    check_room(machine, count, max_flakes)?;

    for _ in 0..count {
        let prev = machine.last();
        let qstates = prev.qoutputs();
        let qoutputs = state_product(qstates, qinputs)?;
        let mut flake = Flake::new_invalid(qinputs, qstates, qoutputs, prev.depth() + 1)?;

        for state in (0..qstates).filter(|&s| prev.is_reached(s)) {
            let base = state * qinputs;
            for (input, target) in flake.row_mut(state).iter_mut().enumerate() {
                *target = base + input as State;
            }
        }

        flake.rebuild_paths(prev)?;
        machine.push(flake, max_flakes)?;
    }
    Ok(())
}

/// Append `count` layers drawing distinct symbols out of `qinputs`, where
/// draw order does not matter.
///
/// With `B` states before the block, relative layer `k` has
/// `B * C(qinputs, k)` outputs: input state `s0 * C(q, k-1) + r` and symbol
/// `x` go to `s0 * C(q, k) + rank(set ∪ {x})`, where `set` is the symbols
/// drawn so far in this block. Drawing a symbol twice is invalid.
pub fn grow_comb(
    machine: &mut Machine,
    choose: &mut ChooseTable,
    qinputs: u32,
    count: u32,
    max_flakes: usize,
) -> Result<(), OfsmError> {
    check_inputs(qinputs)?;
    if count > qinputs {
        return Err(OfsmError::InvalidCombination { qinputs, count });
    }
    check_room(machine, count, max_flakes)?;
    choose
        .ensure(qinputs as usize, count as usize)
        .map_err(InvariantError::from)?;

    let block = machine.last().qoutputs();
    let mut set: Vec<Symbol> = Vec::with_capacity(count as usize);

    for k in 1..=count as usize {
        let before = choose.get(qinputs as usize, k - 1);
        let after = choose.get(qinputs as usize, k);
        let after_state = u32::try_from(after).map_err(|_| InvariantError::StateOverflow {
            count: after,
            max: ofsm_core::MAX_STATES,
        })?;

        let prev = machine.last();
        let qstates = prev.qoutputs();
        let qoutputs = state_product(block, after_state)?;
        let mut flake = Flake::new_invalid(qinputs, qstates, qoutputs, prev.depth() + 1)?;

        for state in 0..qstates {
            let Some(path) = prev.path(state) else {
                continue;
            };
            let prefix = state as u64 / before;
            set.clear();
            set.extend_from_slice(&path[path.len() - (k - 1)..]);
            set.sort_unstable();

            let base = prefix * after;
            for (input, target) in flake.row_mut(state).iter_mut().enumerate() {
                let input = input as Symbol;
                *target = if set.binary_search(&input).is_ok() {
                    INVALID_STATE
                } else {
                    (base + choose.rank_with(&set, input)) as State
                };
            }
        }

        flake.rebuild_paths(prev)?;
        machine.push(flake, max_flakes)?;
    }
    Ok(())
}
