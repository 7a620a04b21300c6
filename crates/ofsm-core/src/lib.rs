//! Shared types for ordered finite state machines (OFSM).
//!
//! An OFSM consumes a fixed-length sequence of small-alphabet symbols, one
//! symbol per layer ("flake"), and lands in a state that encodes some
//! application value. This crate holds the primitive vocabulary shared by
//! the builder and its tools:
//!
//! - [`Symbol`], [`State`] and the [`INVALID_STATE`] sentinel
//! - [`choose`] -- memoized binomial coefficients and combinatorial ranking

pub mod choose;

pub use choose::{ChooseError, ChooseTable};

/// One input symbol (a card, a die face, ...). Bounded by the consuming
/// flake's input count.
pub type Symbol = u8;

/// A state index within one flake.
pub type State = u32;

/// Marks a forbidden or unreachable transition.
pub const INVALID_STATE: State = State::MAX;

/// Largest alphabet a single flake may consume (every [`Symbol`] value).
pub const MAX_INPUTS: u32 = Symbol::MAX as u32 + 1;

/// Largest number of states a flake may hold. Valid ids stay strictly below
/// [`INVALID_STATE`].
pub const MAX_STATES: u64 = INVALID_STATE as u64;

/// Returns `true` if `state` is a real state rather than the sentinel.
#[inline]
pub fn is_valid(state: State) -> bool {
    state != INVALID_STATE
}
