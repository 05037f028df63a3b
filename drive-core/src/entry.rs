//! Numeric entry and cursor state machine
//!
//! Keys map onto the entry grid as follows:
//!
//! | Key     | Effect                                              |
//! |---------|-----------------------------------------------------|
//! | `0`-`9` | store digit under the cursor, step right            |
//! | `A`/`B` | cursor up/down one field                            |
//! | `C`/`D` | cursor left/right one cell                          |
//! | `#`     | commit the buffer into the cursor row's setpoint    |
//! | `*`     | toggle the start/stop latch                         |
//!
//! The voltage field reads `DDD.DD`; the cursor never rests on its decimal
//! point cell.

use crate::control::{LatchChange, MotorLatch};
use crate::state::Setpoints;
use crate::types::{Field, ENTRY_DIGITS};

const ZERO_BUFFER: [u8; ENTRY_DIGITS] = [b'0'; ENTRY_DIGITS];

/// Cursor position in the entry grid
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CursorState {
    /// Field row, 0 = voltage
    pub row: u8,
    /// Character cell within the field
    pub cell: u8,
}

impl CursorState {
    pub fn field(&self) -> Field {
        Field::from_row(self.row).unwrap_or(Field::Voltage)
    }
}

/// Result of interpreting one key
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EntryOutcome {
    /// Key has no meaning here
    Ignored,
    /// Digit stored into `slot` of the buffer
    Digit { slot: usize },
    /// Cursor moved (or was held at a bound)
    Moved,
    /// Buffer parsed and stored into a setpoint
    Committed { field: Field, value: f32 },
    /// Start/stop latch toggled (or refused)
    StartStop(LatchChange),
}

pub struct NumericEntry {
    cursor: CursorState,
    digits: [u8; ENTRY_DIGITS],
}

impl NumericEntry {
    pub const fn new() -> Self {
        Self {
            cursor: CursorState { row: 0, cell: 0 },
            digits: ZERO_BUFFER,
        }
    }

    pub fn cursor(&self) -> CursorState {
        self.cursor
    }

    /// ASCII digit buffer
    pub fn digits(&self) -> &[u8; ENTRY_DIGITS] {
        &self.digits
    }

    /// Interpret one pressed key
    pub fn handle(&mut self, key: char, setpoints: &Setpoints, latch: &MotorLatch) -> EntryOutcome {
        match key {
            '0'..='9' => self.enter_digit(key as u8),
            'A' => self.move_vertical(-1),
            'B' => self.move_vertical(1),
            'C' => self.move_left(),
            'D' => self.move_right(),
            '#' => self.commit(setpoints),
            '*' => EntryOutcome::StartStop(latch.toggle()),
            _ => EntryOutcome::Ignored,
        }
    }

    fn enter_digit(&mut self, digit: u8) -> EntryOutcome {
        let slot = self.cursor.field().slot_for_cell(self.cursor.cell);
        self.digits[slot] = digit;
        self.move_right();
        EntryOutcome::Digit { slot }
    }

    fn move_right(&mut self) -> EntryOutcome {
        let field = self.cursor.field();
        let last = field.cells() - 1;
        let mut next = (self.cursor.cell + 1).min(last);
        if field.decimal_cell() == Some(next) {
            next = (next + 1).min(last);
        }
        self.cursor.cell = next;
        EntryOutcome::Moved
    }

    fn move_left(&mut self) -> EntryOutcome {
        let field = self.cursor.field();
        let mut next = self.cursor.cell.saturating_sub(1);
        if field.decimal_cell() == Some(next) {
            next = next.saturating_sub(1);
        }
        self.cursor.cell = next;
        EntryOutcome::Moved
    }

    fn move_vertical(&mut self, step: i8) -> EntryOutcome {
        let last_row = Field::ALL.len() as i8 - 1;
        let row = (self.cursor.row as i8 + step).clamp(0, last_row) as u8;
        self.cursor.row = row;

        let field = self.cursor.field();
        let mut cell = self.cursor.cell.min(field.cells() - 1);
        if field.decimal_cell() == Some(cell) {
            cell += 1;
        }
        self.cursor.cell = cell;
        EntryOutcome::Moved
    }

    fn commit(&mut self, setpoints: &Setpoints) -> EntryOutcome {
        let field = self.cursor.field();
        let value = parse_digits(field, &self.digits);
        setpoints.store(field, value);

        #[cfg(feature = "defmt")]
        defmt::info!("Committed {:?} = {}", field, value);

        self.digits = ZERO_BUFFER;
        self.cursor = CursorState {
            row: (self.cursor.row + 1) % Field::ALL.len() as u8,
            cell: 0,
        };
        EntryOutcome::Committed { field, value }
    }
}

impl Default for NumericEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the digit buffer for `field`.
///
/// The voltage field carries a fixed point before the last two digits
/// (`01250` reads 12.50); the other fields are plain integers.
pub fn parse_digits(field: Field, digits: &[u8; ENTRY_DIGITS]) -> f32 {
    let whole = digits
        .iter()
        .fold(0u32, |acc, &d| acc * 10 + d.wrapping_sub(b'0').min(9) as u32);
    match field {
        Field::Voltage => whole as f32 / 100.0,
        Field::Speed | Field::MaxSpeed => whole as f32,
    }
}
