//! Per-key shift-register debounce.
//!
//! Every key keeps its last eight raw samples, newest in bit 0. A history of
//! `0b0000_0001` (seven released samples then one pressed) confirms a press,
//! `0b1111_1110` confirms a release. Anything else is bounce and is absorbed.

use crate::queue::EventQueue;
use crate::types::{KeyEvent, KEYMAP, KEYPAD_COLUMNS, KEYPAD_ROWS};

const PRESS_PATTERN: u8 = 0b0000_0001;
const RELEASE_PATTERN: u8 = 0b1111_1110;

pub struct Debouncer {
    /// Raw sample history, indexed `4 * column + row`
    history: [u8; KEYPAD_COLUMNS * KEYPAD_ROWS],
    dropped: u32,
}

impl Debouncer {
    pub const fn new() -> Self {
        Self {
            history: [0; KEYPAD_COLUMNS * KEYPAD_ROWS],
            dropped: 0,
        }
    }

    /// Feed one scan sample for `column`; bit `i` of `rows` is row `i`.
    ///
    /// Confirmed edges go to `queue`; an event that finds the queue full is
    /// dropped and counted. Returns the number of events queued.
    pub fn observe<const N: usize>(&mut self, column: usize, rows: u8, queue: &EventQueue<N>) -> usize {
        debug_assert!(column < KEYPAD_COLUMNS);
        let mut queued = 0;

        for row in 0..KEYPAD_ROWS {
            let index = KEYPAD_ROWS * column + row;
            let history = (self.history[index] << 1) | ((rows >> row) & 1);
            self.history[index] = history;

            let key = char::from(KEYMAP[index]);
            let event = match history {
                PRESS_PATTERN => KeyEvent::press(key),
                RELEASE_PATTERN => KeyEvent::release(key),
                _ => continue,
            };

            if queue.try_push(event).is_ok() {
                queued += 1;
            } else {
                self.dropped = self.dropped.wrapping_add(1);
                #[cfg(feature = "defmt")]
                defmt::warn!("Key event dropped, queue full: {:?}", event);
            }
        }

        queued
    }

    /// Events lost to a full queue since start-up
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Raw history byte of one key
    pub fn history(&self, column: usize, row: usize) -> u8 {
        self.history[KEYPAD_ROWS * column + row]
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}
