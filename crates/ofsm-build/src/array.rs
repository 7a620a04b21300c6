// Flat array export and array-driven execution.
//
// The exported array bakes every offset into the stored values: starting at
// `start_from`, each lookup is `state = cells[state + input]`. Cells
// `0..start_from` form a block of zeros so that an invalid (zero) state
// keeps reading zeros for the rest of the sequence.

use ofsm_core::{Symbol, is_valid};
use tracing::info;

use crate::format::{self, OfsmHeader};
use crate::machine::Machine;
use crate::{FormatError, LookupError, OfsmError, alloc_table};

/// An exported machine: header plus flat cell array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfsmArray {
    header: OfsmHeader,
    cells: Vec<u32>,
}

impl OfsmArray {
    pub fn header(&self) -> &OfsmHeader {
        &self.header
    }

    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn name(&self) -> &str {
        self.header.name()
    }

    pub fn set_name(&mut self, name: &str) {
        self.header.set_name(name);
    }

    pub fn start_from(&self) -> u32 {
        self.header.start_from
    }

    pub fn qflakes(&self) -> u32 {
        self.header.qflakes
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Evaluate an input sequence.
    ///
    /// For a full-length sequence the result is the terminal state plus the
    /// export's `delta_last`, or 0 if any transition was invalid. Shorter
    /// sequences return an interior offset. Lookups past the end yield 0.
    pub fn run(&self, inputs: &[Symbol]) -> u32 {
        let mut state = self.header.start_from;
        for &input in inputs {
            state = self
                .cells
                .get(state as usize + input as usize)
                .copied()
                .unwrap_or(0);
        }
        state
    }

    /// Evaluate a full-length input sequence, rejecting malformed input.
    ///
    /// The format keeps no per-flake alphabet sizes, so symbols are only
    /// checked against `start_from`, the widest alphabet. A symbol that fits
    /// that bound but not its own flake still reads a neighbouring row.
    pub fn run_checked(&self, inputs: &[Symbol]) -> Result<u32, LookupError> {
        let expected = self.header.qflakes as usize;
        if inputs.len() != expected {
            return Err(LookupError::Length {
                expected,
                actual: inputs.len(),
            });
        }
        let limit = self.header.start_from;
        if let Some((position, &symbol)) =
            inputs.iter().enumerate().find(|(_, s)| **s as u32 >= limit)
        {
            return Err(LookupError::SymbolOutOfRange {
                position,
                symbol,
                limit,
            });
        }
        Ok(self.run(inputs))
    }

    /// Serialize to the persisted binary format.
    pub fn to_bytes(&self) -> Vec<u8> {
        format::write(&self.header, &self.cells)
    }

    /// Parse the persisted binary format.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        let (header, cells) = format::read(data)?;
        Ok(Self { header, cells })
    }
}

fn cell(value: u64) -> Result<u32, OfsmError> {
    u32::try_from(value).map_err(|_| OfsmError::ArrayTooLarge { value })
}

impl Machine {
    /// Flatten the machine into an [`OfsmArray`].
    ///
    /// Interior transitions store the absolute offset of the target's row in
    /// the next flake's block; the last flake stores `target + delta_last`.
    /// Invalid transitions store 0, so `delta_last` should keep valid
    /// terminal codes away from 0.
    pub fn to_array(&self, delta_last: u32) -> Result<OfsmArray, OfsmError> {
        if self.is_empty() {
            return Err(OfsmError::EmptyMachine("export"));
        }
        let flakes = self.flakes();
        let start_from = flakes.iter().map(|f| f.qinputs()).max().unwrap_or(0);

        // bases[i] is the offset of flake i's block (real flakes only).
        let mut bases = vec![0u64; flakes.len() + 1];
        bases[1] = start_from as u64;
        for (i, flake) in flakes.iter().enumerate().skip(1) {
            bases[i + 1] = bases[i] + flake.qstates() as u64 * flake.qinputs() as u64;
        }
        let len = bases[flakes.len()];
        let total = usize::try_from(len).map_err(|_| OfsmError::ArrayTooLarge { value: len })?;
        let mut cells = alloc_table(total, 0u32)?;

        let last = flakes.len() - 1;
        for (i, flake) in flakes.iter().enumerate().skip(1) {
            let block = &mut cells[bases[i] as usize..bases[i + 1] as usize];
            for (slot, &target) in block.iter_mut().zip(flake.jumps()) {
                if !is_valid(target) {
                    continue;
                }
                *slot = if i == last {
                    cell(target as u64 + delta_last as u64)?
                } else {
                    cell(bases[i + 1] + target as u64 * flakes[i + 1].qinputs() as u64)?
                };
            }
        }

        let header = OfsmHeader::new("ofsm", start_from, self.depth() as u32, len);
        info!(
            flakes = self.depth(),
            start_from,
            cells = len,
            "exported machine to array"
        );
        Ok(OfsmArray { header, cells })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grow::grow_power;
    use crate::pack::{PackMode, pack};
    use ofsm_core::INVALID_STATE;

    #[test]
    fn layout_of_two_power_layers() {
        let mut m = Machine::new();
        grow_power(&mut m, 2, 1, 8).unwrap();
        grow_power(&mut m, 3, 1, 8).unwrap();
        let array = m.to_array(1).unwrap();

        assert_eq!(array.start_from(), 3);
        assert_eq!(array.qflakes(), 2);
        // 3 root cells + 1*2 + 2*3
        assert_eq!(array.len(), 11);
        assert_eq!(&array.cells()[..3], &[0, 0, 0]);
        // Flake 1 points at rows of flake 2, which starts at 5.
        assert_eq!(&array.cells()[3..5], &[5, 8]);
        assert_eq!(&array.cells()[5..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn run_matches_execute() {
        let mut m = Machine::new();
        grow_power(&mut m, 3, 2, 8).unwrap();
        pack(&mut m, &|p| (p[0] * p[1]) as u64, PackMode::Renumber).unwrap();
        let array = m.to_array(1).unwrap();
        for a in 0..3u8 {
            for b in 0..3u8 {
                assert_eq!(array.run(&[a, b]), m.execute(&[a, b]) + 1);
            }
        }
    }

    #[test]
    fn invalid_decodes_to_zero() {
        let mut m = Machine::new();
        grow_power(&mut m, 2, 2, 8).unwrap();
        // Forbid symbol 1 in the first layer.
        m.flakes_mut()[1].row_mut(0)[1] = INVALID_STATE;
        let array = m.to_array(1).unwrap();
        assert_eq!(array.run(&[1, 0]), 0);
        assert_eq!(array.run(&[1, 1]), 0);
        assert_eq!(array.run(&[0, 1]), 2);
    }

    #[test]
    fn empty_machine_cannot_export() {
        let err = Machine::new().to_array(1).unwrap_err();
        assert!(matches!(err, OfsmError::EmptyMachine("export")));
    }

    #[test]
    fn delta_overflow_is_reported() {
        let mut m = Machine::new();
        grow_power(&mut m, 2, 1, 8).unwrap();
        let err = m.to_array(u32::MAX).unwrap_err();
        assert!(matches!(err, OfsmError::ArrayTooLarge { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn bytes_round_trip_preserves_lookups() {
        let mut m = Machine::new();
        grow_power(&mut m, 4, 2, 8).unwrap();
        let mut array = m.to_array(1).unwrap();
        array.set_name("pairs");
        let parsed = OfsmArray::from_bytes(&array.to_bytes()).unwrap();
        assert_eq!(parsed, array);
        assert_eq!(parsed.name(), "pairs");
        assert_eq!(parsed.run(&[3, 2]), 3 * 4 + 2 + 1);
    }

    #[test]
    fn checked_run_rejects_symbols_past_the_widest_alphabet() {
        let mut m = Machine::new();
        grow_power(&mut m, 2, 1, 8).unwrap();
        grow_power(&mut m, 5, 1, 8).unwrap();
        let array = m.to_array(1).unwrap();
        assert_eq!(array.start_from(), 5);

        assert_eq!(array.run_checked(&[1, 4]), Ok(m.execute(&[1, 4]) + 1));
        assert_eq!(
            array.run_checked(&[7, 0]),
            Err(LookupError::SymbolOutOfRange {
                position: 0,
                symbol: 7,
                limit: 5
            })
        );
        assert_eq!(
            array.run_checked(&[0, 5]),
            Err(LookupError::SymbolOutOfRange {
                position: 1,
                symbol: 5,
                limit: 5
            })
        );
        // Below the global bound but outside flake 1's two inputs: not
        // detectable from the array alone.
        assert!(array.run_checked(&[3, 3]).is_ok());
        assert_eq!(m.execute(&[3, 3]), INVALID_STATE);
    }

    #[test]
    fn checked_run_wants_one_symbol_per_flake() {
        let mut m = Machine::new();
        grow_power(&mut m, 3, 2, 8).unwrap();
        let array = m.to_array(1).unwrap();
        assert_eq!(
            array.run_checked(&[1]),
            Err(LookupError::Length {
                expected: 2,
                actual: 1
            })
        );
        assert!(matches!(
            array.run_checked(&[1, 2, 0]),
            Err(LookupError::Length { actual: 3, .. })
        ));
        assert_eq!(array.run_checked(&[1, 2]), Ok(6));
    }
}
