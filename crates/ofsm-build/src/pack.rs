// Pack: collapse terminal states by an application value.

use ofsm_core::{INVALID_STATE, MAX_STATES, State, Symbol};

use crate::machine::Machine;
use crate::{InvariantError, OfsmError, alloc_table};

/// How packed values become state ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackMode {
    /// Equal-value groups get dense ids `0..groups`, in ascending value
    /// order.
    #[default]
    Renumber,
    /// The value itself is the new id. Ids may be sparse; unused ids have no
    /// canonical path.
    SkipRenumbering,
}

/// One terminal state and its packed value.
#[derive(Debug, Clone, Copy)]
struct PackDecode {
    state: State,
    value: u64,
}

/// Replace every terminal state of `machine` with the group of states
/// sharing its `value`.
///
/// `value` is called once per reachable terminal state with that state's
/// canonical path. Returns the new terminal state count.
pub fn pack(
    machine: &mut Machine,
    value: &dyn Fn(&[Symbol]) -> u64,
    mode: PackMode,
) -> Result<u32, OfsmError> {
    if machine.is_empty() {
        return Err(OfsmError::EmptyMachine("pack"));
    }
    let last = machine.last_mut();

    let mut decodes: Vec<PackDecode> = Vec::new();
    decodes.try_reserve_exact(last.reached_count())?;
    for state in 0..last.qoutputs() {
        if let Some(path) = last.path(state) {
            decodes.push(PackDecode {
                state,
                value: value(path),
            });
        }
    }
    decodes.sort_unstable_by_key(|d| (d.value, d.state));

    let mut translation = alloc_table(last.qoutputs() as usize, INVALID_STATE)?;
    let mut representatives: Vec<State> = Vec::new();

    match mode {
        PackMode::Renumber => {
            let mut previous = None;
            for d in &decodes {
                if previous != Some(d.value) {
                    representatives.push(d.state);
                    previous = Some(d.value);
                }
                translation[d.state as usize] = (representatives.len() - 1) as State;
            }
        }
        PackMode::SkipRenumbering => {
            if let Some(d) = decodes.iter().find(|d| d.value >= MAX_STATES) {
                return Err(InvariantError::ValueOverflow {
                    state: d.state,
                    value: d.value,
                }
                .into());
            }
            let outputs = decodes.last().map_or(0, |d| d.value as usize + 1);
            representatives = alloc_table(outputs, INVALID_STATE)?;
            for d in &decodes {
                let id = d.value as usize;
                if representatives[id] == INVALID_STATE {
                    representatives[id] = d.state;
                }
                translation[d.state as usize] = d.value as State;
            }
        }
    }

    last.remap_outputs(&translation, &representatives)?;
    Ok(last.qoutputs())
}
