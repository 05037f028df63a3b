//! Host-side integration tests for the motor drive core

#[cfg(test)]
mod keypad_tests;
#[cfg(test)]
mod control_tests;
#[cfg(test)]
mod concurrency_tests;
#[cfg(test)]
mod pin_adapter_tests;

use drive_core::hal::mock::MockMatrix;
use drive_core::{Dispatcher, DriveState, KeyEvent, KeypadScanner, KEYPAD_COLUMNS};

/// Scan ticks that visit every column once
pub const TICKS_PER_SWEEP: usize = KEYPAD_COLUMNS;

/// Hold `key` for `sweeps` full sweeps, then release it for as many,
/// draining the queue after every tick. Returns the events seen.
pub fn tap_key<const Q: usize>(
    key: char,
    sweeps: usize,
    matrix: &mut MockMatrix,
    scanner: &mut KeypadScanner,
    dispatcher: &mut Dispatcher,
    state: &DriveState<Q>,
) -> Vec<KeyEvent> {
    let mut seen = Vec::new();
    for held in [true, false] {
        matrix.set_key(key, held);
        for _ in 0..sweeps * TICKS_PER_SWEEP {
            scanner
                .tick(matrix, &state.events)
                .expect("mock matrix never fails on a valid column");
            while let Some(event) = state.events.pop() {
                seen.push(event);
                dispatcher.dispatch(event, state);
            }
        }
    }
    seen
}
