// Machine: ordered flake list grown from a synthetic root.

use ofsm_core::{INVALID_STATE, State, Symbol, is_valid};

use crate::flake::Flake;
use crate::{InvariantError, OfsmError};

/// A layered OFSM.
///
/// Flake 0 is always the synthetic root with a single output state; flakes
/// `1..` are real layers, each consuming one symbol. Flake `i`'s output
/// state count equals flake `i + 1`'s input state count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    flakes: Vec<Flake>,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    /// A machine holding only the root.
    pub fn new() -> Self {
        Self {
            flakes: vec![Flake::root()],
        }
    }

    /// All flakes, root first.
    pub fn flakes(&self) -> &[Flake] {
        &self.flakes
    }

    pub fn flake(&self, index: usize) -> Option<&Flake> {
        self.flakes.get(index)
    }

    pub(crate) fn flakes_mut(&mut self) -> &mut [Flake] {
        &mut self.flakes
    }

    /// Number of real flakes, i.e. the input sequence length.
    pub fn depth(&self) -> usize {
        self.flakes.len() - 1
    }

    /// `true` if the machine holds nothing beyond the root.
    pub fn is_empty(&self) -> bool {
        self.flakes.len() == 1
    }

    /// The newest flake (the root for an empty machine).
    pub fn last(&self) -> &Flake {
        &self.flakes[self.flakes.len() - 1]
    }

    pub(crate) fn last_mut(&mut self) -> &mut Flake {
        let last = self.flakes.len() - 1;
        &mut self.flakes[last]
    }

    /// Number of terminal states.
    pub fn state_count(&self) -> u32 {
        self.last().qoutputs()
    }

    /// Append a flake, refusing to exceed `max_flakes` (root included).
    pub(crate) fn push(&mut self, flake: Flake, max_flakes: usize) -> Result<(), OfsmError> {
        if self.flakes.len() >= max_flakes {
            return Err(OfsmError::TooManyFlakes { limit: max_flakes });
        }
        self.flakes.push(flake);
        Ok(())
    }

    /// Run `inputs` through the first `inputs.len()` real flakes.
    ///
    /// Returns the reached state, or [`INVALID_STATE`] on any invalid hop,
    /// out-of-range symbol, or when more symbols than flakes are given.
    pub fn execute(&self, inputs: &[Symbol]) -> State {
        if inputs.len() > self.depth() {
            return INVALID_STATE;
        }
        let mut state = 0;
        for (flake, &input) in self.flakes[1..].iter().zip(inputs) {
            state = flake.jump(state, input);
            if !is_valid(state) {
                return INVALID_STATE;
            }
        }
        state
    }

    /// Canonical path reaching `state` among the outputs of `flake`.
    pub fn path(&self, flake: usize, state: State) -> Option<&[Symbol]> {
        self.flakes.get(flake)?.path(state)
    }

    /// Canonical path reaching a terminal state.
    pub fn canonical_path(&self, state: State) -> Option<&[Symbol]> {
        self.last().path(state)
    }

    /// Verify table shapes, layer chaining and transition bounds.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        for (index, pair) in self.flakes.windows(2).enumerate() {
            let (prev, flake) = (&pair[0], &pair[1]);
            if prev.qoutputs() != flake.qstates() {
                return Err(InvariantError::LayerMismatch {
                    flake: index + 1,
                    qstates: flake.qstates(),
                    qoutputs: prev.qoutputs(),
                });
            }
        }

        for (index, flake) in self.flakes.iter().enumerate().skip(1) {
            let expected = flake.qstates() as usize * flake.qinputs() as usize;
            if flake.jumps().len() != expected {
                return Err(InvariantError::TableSize {
                    flake: index,
                    expected,
                    actual: flake.jumps().len(),
                });
            }
            if let Some(&target) = flake
                .jumps()
                .iter()
                .find(|&&t| is_valid(t) && t >= flake.qoutputs())
            {
                return Err(InvariantError::TargetOutOfRange {
                    flake: index,
                    target,
                    qoutputs: flake.qoutputs(),
                });
            }
        }
        Ok(())
    }
}
