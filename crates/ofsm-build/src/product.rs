// Product: run one machine after another.

use ofsm_core::is_valid;

use crate::flake::Flake;
use crate::machine::Machine;
use crate::{OfsmError, state_product};

/// Compose two independently grown machines into one that consumes `a`'s
/// symbols, then `b`'s.
///
/// Every flake of `b` is replicated once per terminal state of `a`: with
/// `n` terminal states in `a`, input state `x * qstates + s` and output
/// `x * qoutputs + t` carry `a`'s result `x` alongside `b`'s own state. The
/// result therefore has `|A| * |B|` terminal states, ordered by `a` first.
pub fn product(a: &Machine, b: &Machine, max_flakes: usize) -> Result<Machine, OfsmError> {
    check_depth(a, b, max_flakes)?;
    let mut result = a.clone();
    append_product(&mut result, b, max_flakes)?;
    Ok(result)
}

fn check_depth(a: &Machine, b: &Machine, max_flakes: usize) -> Result<(), OfsmError> {
    if a.flakes().len() + b.depth() > max_flakes {
        return Err(OfsmError::TooManyFlakes { limit: max_flakes });
    }
    Ok(())
}

/// In-place form of [`product`]: extend `machine` by `b`'s flakes.
///
/// The flake ceiling is checked before anything is appended.
pub fn append_product(machine: &mut Machine, b: &Machine, max_flakes: usize) -> Result<(), OfsmError> {
    check_depth(machine, b, max_flakes)?;
    let outer = machine.state_count();

    for inner in &b.flakes()[1..] {
        let q = inner.qinputs();
        let qstates = state_product(outer, inner.qstates())?;
        let qoutputs = state_product(outer, inner.qoutputs())?;
        let prev = machine.last();
        let mut flake = Flake::new_invalid(q, qstates, qoutputs, prev.depth() + 1)?;

        for x in 0..outer {
            for s in 0..inner.qstates() {
                let state = x * inner.qstates() + s;
                if !prev.is_reached(state) {
                    continue;
                }
                let offset = x * inner.qoutputs();
                for (target, &t) in flake.row_mut(state).iter_mut().zip(inner.row(s)) {
                    if is_valid(t) {
                        *target = offset + t;
                    }
                }
            }
        }

        flake.rebuild_paths(prev)?;
        machine.push(flake, max_flakes)?;
    }
    Ok(())
}
