// Script: the step pipeline that builds a machine.
//
// Steps run eagerly, in the order they are appended. Once a step fails the
// script stops executing: later steps are recorded but left `New`, and the
// machine keeps whatever the earlier steps built.
//
// Each grow step builds its block from a fresh root as a separate operand
// and composes it onto the machine with `product::append_product`. Appending
// a block after earlier flakes is exactly that product, so a comb block
// after a power block lands at its block offset. `Product` joins the two
// most recent operands into one; pack and optimize act on the whole
// machine and leave a single operand behind.

use ofsm_core::{ChooseTable, State, Symbol};
use tracing::{debug, error, warn};

use crate::array::OfsmArray;
use crate::machine::Machine;
use crate::options::BuildOptions;
use crate::optimize::{self, RowHash};
use crate::pack::{self, PackMode};
use crate::{OfsmError, grow, product};

/// Application value of a terminal state, given its canonical path.
pub type PackFn = Box<dyn Fn(&[Symbol]) -> u64>;

/// Partition hint for optimize, given a jump row and the canonical path of
/// the state owning it.
pub type HashFn = Box<dyn Fn(&[State], &[Symbol]) -> u64>;

/// One pipeline step.
pub enum Step {
    GrowPower { qinputs: u32, count: u32 },
    GrowComb { qinputs: u32, count: u32 },
    /// Join the two most recently grown operands.
    Product,
    Pack { value: PackFn, mode: PackMode },
    Optimize { flake: usize, hash: Option<HashFn> },
    /// Optimize every real flake, last to first.
    OptimizeAll { hash: Option<HashFn> },
}

/// A step without its callbacks, kept in the script's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    GrowPower { qinputs: u32, count: u32 },
    GrowComb { qinputs: u32, count: u32 },
    Product,
    Pack { mode: PackMode },
    Optimize { flake: usize, hashed: bool },
    OptimizeAll { hashed: bool },
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Step::GrowPower { qinputs, count } => StepKind::GrowPower {
                qinputs: *qinputs,
                count: *count,
            },
            Step::GrowComb { qinputs, count } => StepKind::GrowComb {
                qinputs: *qinputs,
                count: *count,
            },
            Step::Product => StepKind::Product,
            Step::Pack { mode, .. } => StepKind::Pack { mode: *mode },
            Step::Optimize { flake, hash } => StepKind::Optimize {
                flake: *flake,
                hashed: hash.is_some(),
            },
            Step::OptimizeAll { hash } => StepKind::OptimizeAll {
                hashed: hash.is_some(),
            },
        }
    }
}

/// Execution status of a step, and of the script as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Not executed (yet, or ever, if an earlier step failed).
    New,
    Executing,
    /// Recoverable failure; the machine is still usable.
    Failed,
    /// An internal invariant broke; the machine must not be trusted.
    Interrupted,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRecord {
    pub kind: StepKind,
    pub status: StepStatus,
}

/// Builder owning the machine under construction.
///
/// The script starts with an empty machine and no operands. Every grow step
/// adds an operand; `Product` needs at least two.
pub struct Script {
    options: BuildOptions,
    current: Machine,
    /// First flake of each open operand, oldest first.
    operands: Vec<usize>,
    choose: ChooseTable,
    steps: Vec<StepRecord>,
    status: StepStatus,
    error: Option<OfsmError>,
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("status", &self.status)
            .field("steps", &self.steps.len())
            .field("depth", &self.current.depth())
            .field("states", &self.current.state_count())
            .field("operands", &self.operands.len())
            .finish()
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl Script {
    pub fn new() -> Self {
        Self::with_options(BuildOptions::default())
    }

    pub fn with_options(options: BuildOptions) -> Self {
        Self {
            options,
            current: Machine::new(),
            operands: Vec::new(),
            choose: ChooseTable::new(),
            steps: Vec::new(),
            status: StepStatus::New,
            error: None,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Status of the script: `New` before any step, `Done` while every step
    /// has succeeded, otherwise the status of the step that stopped it.
    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// The error that stopped the script, if any.
    pub fn error(&self) -> Option<&OfsmError> {
        self.error.as_ref()
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// The machine under construction.
    pub fn machine(&self) -> &Machine {
        &self.current
    }

    pub fn choose(&self) -> &ChooseTable {
        &self.choose
    }

    /// Number of grown operands not yet joined by `Product`, pack or
    /// optimize.
    pub fn operands(&self) -> usize {
        self.operands.len()
    }

    fn is_stopped(&self) -> bool {
        matches!(self.status, StepStatus::Failed | StepStatus::Interrupted)
    }

    /// Append a step and run it, unless an earlier step already failed.
    pub fn push(&mut self, step: Step) -> &mut Self {
        let kind = step.kind();
        if self.is_stopped() {
            debug!(?kind, "script stopped, step skipped");
            self.steps.push(StepRecord {
                kind,
                status: StepStatus::New,
            });
            return self;
        }

        let index = self.steps.len();
        self.steps.push(StepRecord {
            kind,
            status: StepStatus::Executing,
        });
        self.status = StepStatus::Executing;
        debug!(step = index, ?kind, "executing step");

        let status = match self.run(step) {
            Ok(()) => {
                debug!(
                    step = index,
                    depth = self.current.depth(),
                    states = self.current.state_count(),
                    "step done"
                );
                StepStatus::Done
            }
            Err(e) if e.is_fatal() => {
                error!(step = index, ?kind, error = %e, "step interrupted");
                self.error = Some(e);
                StepStatus::Interrupted
            }
            Err(e) => {
                warn!(step = index, ?kind, error = %e, "step failed");
                self.error = Some(e);
                StepStatus::Failed
            }
        };
        self.steps[index].status = status;
        self.status = status;
        self
    }

    fn run(&mut self, step: Step) -> Result<(), OfsmError> {
        let max_flakes = self.options.max_flakes;
        match step {
            Step::GrowPower { qinputs, count } => {
                let mut operand = Machine::new();
                grow::grow_power(&mut operand, qinputs, count, max_flakes)?;
                self.append_operand(&operand)?;
            }
            Step::GrowComb { qinputs, count } => {
                let mut operand = Machine::new();
                grow::grow_comb(&mut operand, &mut self.choose, qinputs, count, max_flakes)?;
                self.append_operand(&operand)?;
            }
            Step::Product => {
                if self.operands.len() < 2 {
                    return Err(OfsmError::ProductUnderflow(self.operands.len()));
                }
                let joined = self.operands.pop();
                debug!(
                    first = ?self.operands.last(),
                    second = ?joined,
                    "joined operands"
                );
            }
            Step::Pack { value, mode } => {
                pack::pack(&mut self.current, value.as_ref(), mode)?;
                self.collapse_operands();
            }
            Step::Optimize { flake, hash } => {
                let hash: Option<RowHash<'_>> = hash.as_deref();
                optimize::optimize(&mut self.current, flake, hash)?;
                self.collapse_operands();
            }
            Step::OptimizeAll { hash } => {
                let hash: Option<RowHash<'_>> = hash.as_deref();
                optimize::optimize_all(&mut self.current, hash)?;
                self.collapse_operands();
            }
        }
        if self.options.validate {
            self.current.check_invariants()?;
        }
        Ok(())
    }

    fn append_operand(&mut self, operand: &Machine) -> Result<(), OfsmError> {
        let first = self.current.flakes().len();
        product::append_product(&mut self.current, operand, self.options.max_flakes)?;
        self.operands.push(first);
        Ok(())
    }

    fn collapse_operands(&mut self) {
        self.operands.clear();
        self.operands.push(1);
    }

    pub fn power(&mut self, qinputs: u32, count: u32) -> &mut Self {
        self.push(Step::GrowPower { qinputs, count })
    }

    pub fn comb(&mut self, qinputs: u32, count: u32) -> &mut Self {
        self.push(Step::GrowComb { qinputs, count })
    }

    pub fn product(&mut self) -> &mut Self {
        self.push(Step::Product)
    }

    pub fn pack(&mut self, value: impl Fn(&[Symbol]) -> u64 + 'static, mode: PackMode) -> &mut Self {
        self.push(Step::Pack {
            value: Box::new(value),
            mode,
        })
    }

    pub fn optimize(&mut self, flake: usize) -> &mut Self {
        self.push(Step::Optimize { flake, hash: None })
    }

    pub fn optimize_hashed(
        &mut self,
        flake: usize,
        hash: impl Fn(&[State], &[Symbol]) -> u64 + 'static,
    ) -> &mut Self {
        self.push(Step::Optimize {
            flake,
            hash: Some(Box::new(hash)),
        })
    }

    pub fn optimize_all(&mut self) -> &mut Self {
        self.push(Step::OptimizeAll { hash: None })
    }

    /// Export the machine under construction. Works on a stopped script too.
    pub fn make_array(&self, delta_last: u32) -> Result<OfsmArray, OfsmError> {
        self.current.to_array(delta_last)
    }

    /// Take the built machine, or the error that stopped the script.
    pub fn finish(self) -> Result<Machine, OfsmError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.current),
        }
    }

    /// Take the machine under construction regardless of status.
    pub fn into_machine(self) -> Machine {
        self.current
    }
}
