// Flake: one layer of the machine.
//
// A flake consumes one symbol. Its jump table maps (input state, symbol) to
// an output state of the same flake; the next flake's input states are this
// flake's output states. Each reachable output state also carries the
// canonical symbol sequence that reaches it, used by pack value functions
// and optimize hashes.

use ofsm_core::{INVALID_STATE, State, Symbol, is_valid};

use crate::{OfsmError, alloc_table, state_product};

/// One layer of an OFSM.
///
/// Two independently owned buffers back a flake: the jump table
/// (`qstates * qinputs` cells, row per input state) and the path table
/// (`qoutputs * depth` symbols, one fixed-length path per output state).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flake {
    qinputs: u32,
    qstates: u32,
    qoutputs: u32,
    /// Length of every path in the path table.
    depth: usize,
    jumps: Vec<State>,
    paths: Vec<Symbol>,
    /// Whether each output state has a canonical path.
    reached: Vec<bool>,
}

impl Flake {
    /// The synthetic root: no transitions, one output state reached by the
    /// empty path.
    pub fn root() -> Self {
        Self {
            qinputs: 0,
            qstates: 1,
            qoutputs: 1,
            depth: 0,
            jumps: Vec::new(),
            paths: Vec::new(),
            reached: vec![true],
        }
    }

    /// A flake whose every transition is invalid and whose path table is
    /// empty. `depth` is the length of paths reaching its outputs.
    pub(crate) fn new_invalid(
        qinputs: u32,
        qstates: u32,
        qoutputs: u32,
        depth: usize,
    ) -> Result<Self, OfsmError> {
        let cells = state_product(qstates, qinputs)? as usize;
        Ok(Self {
            qinputs,
            qstates,
            qoutputs,
            depth,
            jumps: alloc_table(cells, INVALID_STATE)?,
            paths: Vec::new(),
            reached: Vec::new(),
        })
    }

    pub fn qinputs(&self) -> u32 {
        self.qinputs
    }

    pub fn qstates(&self) -> u32 {
        self.qstates
    }

    pub fn qoutputs(&self) -> u32 {
        self.qoutputs
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The whole jump table, row-major by input state.
    pub fn jumps(&self) -> &[State] {
        &self.jumps
    }

    /// Outgoing transitions of one input state.
    #[inline]
    pub fn row(&self, state: State) -> &[State] {
        let q = self.qinputs as usize;
        let start = state as usize * q;
        &self.jumps[start..start + q]
    }

    #[inline]
    pub(crate) fn row_mut(&mut self, state: State) -> &mut [State] {
        let q = self.qinputs as usize;
        let start = state as usize * q;
        &mut self.jumps[start..start + q]
    }

    /// Follow one transition. Out-of-range states or symbols yield
    /// [`INVALID_STATE`].
    #[inline]
    pub fn jump(&self, state: State, input: Symbol) -> State {
        if state >= self.qstates || input as u32 >= self.qinputs {
            return INVALID_STATE;
        }
        self.jumps[state as usize * self.qinputs as usize + input as usize]
    }

    /// Whether an output state has a canonical path.
    #[inline]
    pub fn is_reached(&self, state: State) -> bool {
        self.reached.get(state as usize).copied().unwrap_or(false)
    }

    /// Number of output states with a canonical path.
    pub fn reached_count(&self) -> usize {
        self.reached.iter().filter(|&&r| r).count()
    }

    /// Canonical path of an output state, if it is reachable.
    pub fn path(&self, state: State) -> Option<&[Symbol]> {
        if !self.is_reached(state) {
            return None;
        }
        let start = state as usize * self.depth;
        Some(&self.paths[start..start + self.depth])
    }

    /// Recompute the path table from the predecessor's paths.
    ///
    /// Output state `t` gets the path of the first (input state, symbol)
    /// pair, in ascending order, whose transition lands on it.
    pub(crate) fn rebuild_paths(&mut self, prev: &Flake) -> Result<(), OfsmError> {
        debug_assert_eq!(prev.depth + 1, self.depth);
        let outputs = self.qoutputs as usize;
        let mut paths = alloc_table(outputs * self.depth, 0 as Symbol)?;
        let mut reached = alloc_table(outputs, false)?;

        for state in 0..self.qstates {
            let Some(prefix) = prev.path(state) else {
                continue;
            };
            for (input, &target) in self.row(state).iter().enumerate() {
                if !is_valid(target) || reached[target as usize] {
                    continue;
                }
                let start = target as usize * self.depth;
                paths[start..start + prefix.len()].copy_from_slice(prefix);
                paths[start + prefix.len()] = input as Symbol;
                reached[target as usize] = true;
            }
        }

        self.paths = paths;
        self.reached = reached;
        Ok(())
    }

    /// Renumber the output states.
    ///
    /// Every transition is rewritten through `translation` (old id to new
    /// id); the path of new id `n` becomes the old path of
    /// `representatives[n]`, or none if that entry is invalid.
    pub(crate) fn remap_outputs(
        &mut self,
        translation: &[State],
        representatives: &[State],
    ) -> Result<(), OfsmError> {
        for target in self.jumps.iter_mut().filter(|t| is_valid(**t)) {
            *target = translation
                .get(*target as usize)
                .copied()
                .unwrap_or(INVALID_STATE);
        }

        let outputs = representatives.len();
        let mut paths = alloc_table(outputs * self.depth, 0 as Symbol)?;
        let mut reached = alloc_table(outputs, false)?;
        for (new_id, &old_id) in representatives.iter().enumerate() {
            if let Some(path) = self.path(old_id) {
                paths[new_id * self.depth..(new_id + 1) * self.depth].copy_from_slice(path);
                reached[new_id] = true;
            }
        }

        self.qoutputs = outputs as u32;
        self.paths = paths;
        self.reached = reached;
        Ok(())
    }

    /// Replace the jump table with `jumps`, holding `qstates` rows.
    pub(crate) fn replace_rows(&mut self, qstates: u32, jumps: Vec<State>) {
        debug_assert_eq!(jumps.len(), qstates as usize * self.qinputs as usize);
        self.qstates = qstates;
        self.jumps = jumps;
    }
}
