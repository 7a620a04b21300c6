//! OFSM (Ordered Finite State Machine) builder.
//!
//! This crate grows a layered deterministic state machine one flake (layer)
//! at a time, collapses its terminal states into application values, merges
//! equivalent states, and flattens the result into a single lookup array
//! where evaluating an input sequence costs one load per symbol.
//!
//! # Architecture
//!
//! - [`flake`] -- One layer: jump table plus canonical paths
//! - [`machine`] -- Ordered flake list, execution, invariant checks
//! - [`grow`] -- Power (Cartesian) and combination layers
//! - [`product`] -- Composition of two independently grown machines
//! - [`pack`] -- Value-driven state collapse
//! - [`optimize`] -- Merging of compatible states within a flake
//! - [`script`] -- Step pipeline with status tracking
//! - [`array`] -- Flat array export and array-driven execution
//! - [`format`] -- Persisted binary layout of exported arrays
//! - [`options`] -- Build configuration

pub mod array;
pub mod flake;
pub mod format;
pub mod grow;
pub mod machine;
pub mod optimize;
pub mod options;
pub mod pack;
pub mod product;
pub mod script;

pub use array::OfsmArray;
pub use flake::Flake;
pub use machine::Machine;
pub use ofsm_core::{INVALID_STATE, State, Symbol};
pub use options::BuildOptions;
pub use pack::PackMode;
pub use script::{Script, Step, StepKind, StepStatus};

use ofsm_core::ChooseError;

/// Error type for machine construction and export.
///
/// Every variant except [`OfsmError::Invariant`] is recoverable: the machine
/// is left in its last successfully built state and may still be inspected
/// or exported.
#[derive(Debug, thiserror::Error)]
pub enum OfsmError {
    #[error("cannot {0}: machine has no flakes beyond the root")]
    EmptyMachine(&'static str),
    #[error("flake index {index} out of range 1..{count}")]
    FlakeOutOfRange { index: usize, count: usize },
    #[error("flake limit reached: at most {limit} flakes per machine")]
    TooManyFlakes { limit: usize },
    #[error("input count {0} outside 1..=256")]
    InvalidInputCount(u32),
    #[error("cannot draw {count} distinct symbols out of {qinputs}")]
    InvalidCombination { qinputs: u32, count: u32 },
    #[error("product needs two operands, found {0}")]
    ProductUnderflow(usize),
    #[error("table allocation failed: {0}")]
    Allocation(#[from] std::collections::TryReserveError),
    #[error("exported cell value {value} does not fit in 32 bits")]
    ArrayTooLarge { value: u64 },
    #[error("internal invariant violated: {0}")]
    Invariant(#[from] InvariantError),
}

impl OfsmError {
    /// Whether this error means the machine can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OfsmError::Invariant(_))
    }
}

/// Broken internal invariants, typically caused by a caller-supplied value
/// function producing out-of-range results. Continuing past one of these
/// would produce a corrupted table.
#[derive(Debug, thiserror::Error)]
pub enum InvariantError {
    #[error("pack value {value} of state {state} does not fit a state id")]
    ValueOverflow { state: State, value: u64 },
    #[error("state count {count} exceeds the limit of {max}")]
    StateOverflow { count: u64, max: u64 },
    #[error("flake {flake}: transition to {target} but only {qoutputs} outputs")]
    TargetOutOfRange {
        flake: usize,
        target: State,
        qoutputs: u32,
    },
    #[error("flake {flake}: {qstates} input states but predecessor has {qoutputs} outputs")]
    LayerMismatch {
        flake: usize,
        qstates: u32,
        qoutputs: u32,
    },
    #[error("flake {flake}: jump table holds {actual} cells, expected {expected}")]
    TableSize {
        flake: usize,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Choose(#[from] ChooseError),
}

/// Error type for parsing persisted arrays.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("data too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("header declares {declared} cells but body holds {actual} bytes")]
    LengthMismatch { declared: u64, actual: usize },
    #[error("entry offset {start_from} outside array of {len} cells")]
    InvalidStartOffset { start_from: u32, len: u64 },
}

/// Error type for checked lookups against an exported array.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("expected {expected} symbols, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("symbol {symbol} at position {position} is not below {limit}")]
    SymbolOutOfRange {
        position: usize,
        symbol: Symbol,
        limit: u32,
    },
}

/// Allocate a table of `len` copies of `fill`, reporting allocation failure
/// instead of aborting.
pub(crate) fn alloc_table<T: Clone>(len: usize, fill: T) -> Result<Vec<T>, OfsmError> {
    let mut table = Vec::new();
    table.try_reserve_exact(len)?;
    table.resize(len, fill);
    Ok(table)
}

/// `a * b` as a state count, or a fatal overflow.
pub(crate) fn state_product(a: u32, b: u32) -> Result<u32, InvariantError> {
    let count = a as u64 * b as u64;
    if count > ofsm_core::MAX_STATES {
        return Err(InvariantError::StateOverflow {
            count,
            max: ofsm_core::MAX_STATES,
        });
    }
    Ok(count as u32)
}
