//! Single-producer/single-consumer keypad event queue
//!
//! The keypad scan tick (interrupt context) is the only producer and the
//! foreground dispatcher the only consumer. Each slot is one atomic byte
//! holding an encoded [`KeyEvent`], zero meaning empty. The producer only
//! touches the slot at the input index and the consumer only the slot at the
//! output index, so no lock is needed as long as the backlog never exceeds
//! the capacity.

use portable_atomic::{AtomicU8, AtomicUsize, Ordering};
use crate::types::KeyEvent;

/// Fixed-capacity circular buffer of key events
pub struct EventQueue<const N: usize> {
    slots: [AtomicU8; N],
    input: AtomicUsize,
    output: AtomicUsize,
}

impl<const N: usize> EventQueue<N> {
    const EMPTY_SLOT: AtomicU8 = AtomicU8::new(0);
    const NON_ZERO_CAPACITY: () = assert!(N > 0, "queue capacity must be non-zero");

    /// Create an empty queue
    pub const fn new() -> Self {
        let () = Self::NON_ZERO_CAPACITY;
        Self {
            slots: [Self::EMPTY_SLOT; N],
            input: AtomicUsize::new(0),
            output: AtomicUsize::new(0),
        }
    }

    fn advance(index: usize) -> usize {
        if N.is_power_of_two() {
            (index + 1) & (N - 1)
        } else {
            (index + 1) % N
        }
    }

    /// Write at the input index and advance it.
    ///
    /// Overwrites an unread event when the queue is full; returns `true` when
    /// that happened. Capacity must cover the worst-case backlog.
    pub fn push(&self, event: KeyEvent) -> bool {
        let index = self.input.load(Ordering::Relaxed);
        let overwrote = self.slots[index].swap(event.encode(), Ordering::Release) != 0;
        self.input.store(Self::advance(index), Ordering::Relaxed);
        overwrote
    }

    /// Write at the input index only if that slot has been consumed.
    ///
    /// Hands the event back when the queue is full.
    pub fn try_push(&self, event: KeyEvent) -> Result<(), KeyEvent> {
        let index = self.input.load(Ordering::Relaxed);
        let slot = &self.slots[index];
        if slot.load(Ordering::Acquire) != 0 {
            return Err(event);
        }
        slot.store(event.encode(), Ordering::Release);
        self.input.store(Self::advance(index), Ordering::Relaxed);
        Ok(())
    }

    /// Take and clear the event at the output index, if any
    pub fn pop(&self) -> Option<KeyEvent> {
        let index = self.output.load(Ordering::Relaxed);
        let byte = self.slots[index].swap(0, Ordering::AcqRel);
        let event = KeyEvent::decode(byte)?;
        self.output.store(Self::advance(index), Ordering::Relaxed);
        Some(event)
    }

    /// True when the slot at the output index holds an event
    pub fn ready(&self) -> bool {
        let index = self.output.load(Ordering::Relaxed);
        self.slots[index].load(Ordering::Acquire) != 0
    }

    /// Spin until an event arrives.
    ///
    /// Never times out: with no key ever pressed the caller spins forever.
    pub fn wait_event(&self) -> KeyEvent {
        loop {
            if let Some(event) = self.pop() {
                return event;
            }
            core::hint::spin_loop();
        }
    }

    /// Spin until a press arrives, discarding releases
    pub fn wait_keypress(&self) -> char {
        loop {
            let event = self.wait_event();
            if event.is_press() {
                return event.key;
            }
        }
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
