//! Shared drive state and the foreground key dispatcher
//!
//! Every cross-context value has exactly one writer:
//!
//! | Value            | Writer                     | Readers                 |
//! |------------------|----------------------------|-------------------------|
//! | `events`         | keypad scan tick (push)    | foreground (pop)        |
//! | `setpoints`      | foreground commit          | control tick            |
//! | `entry`          | foreground                 | control tick (display)  |
//! | `rpm`            | speed tick                 | control tick (display)  |
//! | `duties`         | control tick               | anyone                  |
//! | `latch`          | foreground, button edge, control tick (atomic RMW) | all |
//!
//! Readers may see a value one tick stale; nothing here needs to be
//! consistent across fields.

use portable_atomic::{AtomicBool, AtomicF32, AtomicU8, Ordering};
use crate::control::MotorLatch;
use crate::entry::{CursorState, EntryOutcome, NumericEntry};
use crate::queue::EventQueue;
use crate::types::{DutyCycles, Field, KeyEvent, ENTRY_DIGITS};

/// Committed operating point
pub struct Setpoints {
    voltage: AtomicF32,
    speed: AtomicF32,
    max_speed: AtomicF32,
}

impl Setpoints {
    pub const fn new() -> Self {
        Self {
            voltage: AtomicF32::new(0.0),
            speed: AtomicF32::new(0.0),
            max_speed: AtomicF32::new(0.0),
        }
    }

    pub fn store(&self, field: Field, value: f32) {
        let cell = match field {
            Field::Voltage => &self.voltage,
            Field::Speed => &self.speed,
            Field::MaxSpeed => &self.max_speed,
        };
        cell.store(value, Ordering::Release);
    }

    pub fn load(&self, field: Field) -> f32 {
        match field {
            Field::Voltage => self.voltage(),
            Field::Speed => self.speed(),
            Field::MaxSpeed => self.max_speed(),
        }
    }

    pub fn voltage(&self) -> f32 {
        self.voltage.load(Ordering::Acquire)
    }

    pub fn speed(&self) -> f32 {
        self.speed.load(Ordering::Acquire)
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed.load(Ordering::Acquire)
    }
}

impl Default for Setpoints {
    fn default() -> Self {
        Self::new()
    }
}

/// Duty cycles last applied to the power stage
pub struct DutyCells {
    h_bridge: AtomicF32,
    boost: AtomicF32,
    buck: AtomicF32,
}

impl DutyCells {
    pub const fn new() -> Self {
        Self {
            h_bridge: AtomicF32::new(0.0),
            boost: AtomicF32::new(0.0),
            buck: AtomicF32::new(0.0),
        }
    }

    pub fn store(&self, duties: DutyCycles) {
        self.h_bridge.store(duties.h_bridge, Ordering::Relaxed);
        self.boost.store(duties.boost, Ordering::Relaxed);
        self.buck.store(duties.buck, Ordering::Relaxed);
    }

    pub fn load(&self) -> DutyCycles {
        DutyCycles {
            h_bridge: self.h_bridge.load(Ordering::Relaxed),
            boost: self.boost.load(Ordering::Relaxed),
            buck: self.buck.load(Ordering::Relaxed),
        }
    }
}

impl Default for DutyCells {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of the entry cursor and digit buffer for the display tick
pub struct EntryMirror {
    row: AtomicU8,
    cell: AtomicU8,
    digits: [AtomicU8; ENTRY_DIGITS],
    /// Set by the foreground after any change, cleared by the display tick
    dirty: AtomicBool,
}

impl EntryMirror {
    const ZERO_DIGIT: AtomicU8 = AtomicU8::new(b'0');

    pub const fn new() -> Self {
        Self {
            row: AtomicU8::new(0),
            cell: AtomicU8::new(0),
            digits: [Self::ZERO_DIGIT; ENTRY_DIGITS],
            dirty: AtomicBool::new(true),
        }
    }

    /// Publish the entry machine's current view
    pub fn publish(&self, entry: &NumericEntry) {
        let cursor = entry.cursor();
        self.row.store(cursor.row, Ordering::Relaxed);
        self.cell.store(cursor.cell, Ordering::Relaxed);
        for (cell, &digit) in self.digits.iter().zip(entry.digits()) {
            cell.store(digit, Ordering::Relaxed);
        }
        self.dirty.store(true, Ordering::Release);
    }

    /// Snapshot if changed since the last call
    pub fn take_changed(&self) -> Option<(CursorState, [u8; ENTRY_DIGITS])> {
        if !self.dirty.swap(false, Ordering::Acquire) {
            return None;
        }
        Some(self.snapshot())
    }

    pub fn snapshot(&self) -> (CursorState, [u8; ENTRY_DIGITS]) {
        let cursor = CursorState {
            row: self.row.load(Ordering::Relaxed),
            cell: self.cell.load(Ordering::Relaxed),
        };
        let mut digits = [b'0'; ENTRY_DIGITS];
        for (digit, cell) in digits.iter_mut().zip(&self.digits) {
            *digit = cell.load(Ordering::Relaxed);
        }
        (cursor, digits)
    }
}

impl Default for EntryMirror {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the drive tasks share, `const`-constructible for a `static`
pub struct DriveState<const Q: usize> {
    pub events: EventQueue<Q>,
    pub setpoints: Setpoints,
    pub latch: MotorLatch,
    pub rpm: AtomicF32,
    pub duties: DutyCells,
    pub entry: EntryMirror,
}

impl<const Q: usize> DriveState<Q> {
    pub const fn new() -> Self {
        Self {
            events: EventQueue::new(),
            setpoints: Setpoints::new(),
            latch: MotorLatch::new(),
            rpm: AtomicF32::new(0.0),
            duties: DutyCells::new(),
            entry: EntryMirror::new(),
        }
    }

    pub fn rpm(&self) -> f32 {
        self.rpm.load(Ordering::Relaxed)
    }
}

impl<const Q: usize> Default for DriveState<Q> {
    fn default() -> Self {
        Self::new()
    }
}

/// Foreground consumer: routes key presses into the entry machine
pub struct Dispatcher {
    entry: NumericEntry,
}

impl Dispatcher {
    pub const fn new() -> Self {
        Self { entry: NumericEntry::new() }
    }

    pub fn entry(&self) -> &NumericEntry {
        &self.entry
    }

    /// Handle one event; releases are ignored
    pub fn dispatch<const Q: usize>(&mut self, event: KeyEvent, state: &DriveState<Q>) -> EntryOutcome {
        if !event.is_press() {
            return EntryOutcome::Ignored;
        }

        let outcome = self.entry.handle(event.key, &state.setpoints, &state.latch);
        #[cfg(feature = "defmt")]
        defmt::debug!("Key '{}' -> {:?}", event.key, outcome);

        if outcome != EntryOutcome::Ignored {
            state.entry.publish(&self.entry);
        }
        outcome
    }

    /// Drain every pending event, returning how many were handled
    pub fn drain<const Q: usize>(&mut self, state: &DriveState<Q>) -> usize {
        let mut handled = 0;
        while let Some(event) = state.events.pop() {
            self.dispatch(event, state);
            handled += 1;
        }
        handled
    }

    /// Bare-metal foreground loop: spin on the queue forever
    pub fn run_blocking<const Q: usize>(&mut self, state: &DriveState<Q>) -> ! {
        loop {
            let key = state.events.wait_keypress();
            self.dispatch(KeyEvent::press(key), state);
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
