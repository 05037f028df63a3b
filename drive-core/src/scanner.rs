//! Keypad scan scheduler: one column per tick

use crate::debounce::Debouncer;
use crate::hal::KeypadMatrix;
use crate::queue::EventQueue;
use crate::types::KEYPAD_COLUMNS;

/// Column-stepping scanner feeding the debouncer.
///
/// Each tick reads the rows of the column driven on the previous tick, so a
/// full tick of settling time separates driving a column and sampling it.
pub struct KeypadScanner {
    column: usize,
    debouncer: Debouncer,
}

impl KeypadScanner {
    pub const fn new() -> Self {
        Self {
            column: 0,
            debouncer: Debouncer::new(),
        }
    }

    /// Drive the first column before the first tick
    pub fn start<M: KeypadMatrix>(&mut self, matrix: &mut M) -> Result<(), M::Error> {
        self.column = 0;
        matrix.drive_column(self.column)
    }

    /// Sample, debounce, then move on to the next column.
    /// Returns the number of events queued.
    pub fn tick<M: KeypadMatrix, const N: usize>(
        &mut self,
        matrix: &mut M,
        queue: &EventQueue<N>,
    ) -> Result<usize, M::Error> {
        let rows = matrix.read_rows()?;
        let queued = self.debouncer.observe(self.column, rows, queue);

        self.column = (self.column + 1) % KEYPAD_COLUMNS;
        matrix.drive_column(self.column)?;

        Ok(queued)
    }

    /// Column to be sampled on the next tick
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }
}

impl Default for KeypadScanner {
    fn default() -> Self {
        Self::new()
    }
}
