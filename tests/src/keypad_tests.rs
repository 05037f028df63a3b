//! Keypad pipeline: bounce absorption, event order and queue behavior

use drive_core::test_utils::keypad_sim::KeypadSim;
use drive_core::{EventQueue, KeyEvent, KeyKind, KeypadScanner, KEYMAP};
use proptest::prelude::*;

/// Scan `sim` for `sweeps` sweeps, collecting every queued event
fn scan(sim: &mut KeypadSim, scanner: &mut KeypadScanner, queue: &EventQueue<16>, sweeps: usize) -> Vec<KeyEvent> {
    let mut events = Vec::new();
    for _ in 0..sweeps * crate::TICKS_PER_SWEEP {
        scanner.tick(sim, queue).unwrap();
        while let Some(event) = queue.pop() {
            events.push(event);
        }
    }
    events
}

fn legend() -> impl Strategy<Value = char> {
    proptest::sample::select(KEYMAP.iter().map(|&b| b as char).collect::<Vec<_>>())
}

proptest! {
    #[test]
    fn bouncy_press_yields_one_press_and_one_release(
        key in legend(),
        press_bounce in 0u8..7,
        release_bounce in 0u8..7,
    ) {
        let mut sim = KeypadSim::new();
        let mut scanner = KeypadScanner::new();
        let queue = EventQueue::<16>::new();
        scanner.start(&mut sim).unwrap();

        sim.press(key, press_bounce);
        let mut events = scan(&mut sim, &mut scanner, &queue, press_bounce as usize + 10);
        sim.release(key, release_bounce);
        events.extend(scan(&mut sim, &mut scanner, &queue, release_bounce as usize + 10));

        prop_assert_eq!(events, vec![KeyEvent::press(key), KeyEvent::release(key)]);
        prop_assert_eq!(scanner.debouncer().dropped(), 0);
    }

    #[test]
    fn queue_preserves_order(keys in proptest::collection::vec(legend(), 1..=8), press in any::<bool>()) {
        let queue = EventQueue::<8>::new();
        for &key in &keys {
            let event = if press { KeyEvent::press(key) } else { KeyEvent::release(key) };
            prop_assert!(queue.try_push(event).is_ok());
        }
        let popped: Vec<char> = std::iter::from_fn(|| queue.pop()).map(|e| e.key).collect();
        prop_assert_eq!(popped, keys);
        prop_assert!(!queue.ready());
    }
}

#[test]
fn test_short_glitch_still_confirms_press() {
    // A single closed read after seven open ones is a confirmed press
    let mut sim = KeypadSim::new();
    let mut scanner = KeypadScanner::new();
    let queue = EventQueue::<16>::new();
    scanner.start(&mut sim).unwrap();

    sim.press('5', 0);
    let events = scan(&mut sim, &mut scanner, &queue, 1);
    assert_eq!(events, vec![KeyEvent::press('5')]);
    assert_eq!(events[0].kind, KeyKind::Press);
}

#[test]
fn test_two_keys_held_together() {
    let mut sim = KeypadSim::new();
    let mut scanner = KeypadScanner::new();
    let queue = EventQueue::<16>::new();
    scanner.start(&mut sim).unwrap();

    sim.press('1', 0);
    sim.press('D', 0);
    let events = scan(&mut sim, &mut scanner, &queue, 10);
    // Column 0 holds 'D', column 3 holds '1'; order follows the scan
    assert_eq!(events, vec![KeyEvent::press('D'), KeyEvent::press('1')]);
}

#[test]
fn test_full_queue_drops_and_counts() {
    let mut sim = KeypadSim::new();
    let mut scanner = KeypadScanner::new();
    let queue = EventQueue::<2>::new();
    scanner.start(&mut sim).unwrap();

    // '3', '2' and '1' sit on columns 1, 2 and 3
    for key in ['1', '2', '3'] {
        sim.press(key, 0);
    }
    // Nobody drains the queue
    for _ in 0..10 * crate::TICKS_PER_SWEEP {
        scanner.tick(&mut sim, &queue).unwrap();
    }
    assert_eq!(scanner.debouncer().dropped(), 1);
    assert_eq!(queue.pop(), Some(KeyEvent::press('3')));
    assert_eq!(queue.pop(), Some(KeyEvent::press('2')));
    assert_eq!(queue.pop(), None);
}

#[test]
fn test_overwriting_push_reports_loss() {
    let queue = EventQueue::<2>::new();
    assert!(!queue.push(KeyEvent::press('1')));
    assert!(!queue.push(KeyEvent::press('2')));
    assert!(queue.push(KeyEvent::press('3')));
    // Slot 0 now holds the newest event
    assert_eq!(queue.pop(), Some(KeyEvent::press('3')));
}
