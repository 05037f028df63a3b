//! Drive contexts running on separate threads over one shared state

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use drive_core::hal::mock::{MockDisplay, MockPwm};
use drive_core::test_utils::keypad_sim::KeypadSim;
use drive_core::test_utils::pulse_train::PulseTrain;
use drive_core::{
    Dispatcher, DriveConfig, DriveState, DutyController, Field, KeyEvent, KeypadScanner, SpeedEstimator, StatusView,
};

/// Keypad scan context: type `keys` with bouncy contacts, pacing each tick
fn scan_thread<const Q: usize>(state: &'static DriveState<Q>, keys: &'static str, done: &'static AtomicBool) -> u32 {
    let mut sim = KeypadSim::new();
    let mut scanner = KeypadScanner::new();
    scanner.start(&mut sim).unwrap();

    let sweep = |sim: &mut KeypadSim, scanner: &mut KeypadScanner| {
        for _ in 0..12 * crate::TICKS_PER_SWEEP {
            scanner.tick(sim, &state.events).unwrap();
            std::thread::sleep(Duration::from_micros(50));
        }
    };
    for key in keys.chars() {
        sim.press(key, 3);
        sweep(&mut sim, &mut scanner);
        sim.release(key, 3);
        sweep(&mut sim, &mut scanner);
    }
    done.store(true, Ordering::Release);
    scanner.debouncer().dropped()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scan_thread_feeds_async_dispatcher() {
    static STATE: DriveState<8> = DriveState::new();
    static DONE: AtomicBool = AtomicBool::new(false);

    let scanner = tokio::task::spawn_blocking(|| scan_thread(&STATE, "01250#2500#", &DONE));

    let mut dispatcher = Dispatcher::new();
    let mut presses = 0;
    while !DONE.load(Ordering::Acquire) || STATE.events.ready() {
        while let Some(event) = STATE.events.pop() {
            if event.is_press() {
                presses += 1;
            }
            dispatcher.dispatch(event, &STATE);
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert_eq!(scanner.await.unwrap(), 0);
    assert_eq!(presses, 11);
    assert!((STATE.setpoints.voltage() - 12.5).abs() < 1e-4);
    // "2500" fills the first four speed digits: 25000
    assert_eq!(STATE.setpoints.speed(), 25000.0);
    assert_eq!(dispatcher.entry().cursor().field(), Field::MaxSpeed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_speed_and_control_ticks_share_state() {
    static STATE: DriveState<2> = DriveState::new();
    static STOP: AtomicBool = AtomicBool::new(false);
    let config = DriveConfig::default();

    STATE.setpoints.store(Field::Voltage, 6.0);
    STATE.setpoints.store(Field::Speed, 1200.0);
    STATE.setpoints.store(Field::MaxSpeed, 2400.0);
    assert!(!STATE.events.push(KeyEvent::press('*')));
    Dispatcher::new().drain(&STATE);
    assert!(STATE.latch.running());

    let sampler = tokio::task::spawn_blocking(move || {
        let mut estimator = SpeedEstimator::<4>::new(&config);
        let mut train = PulseTrain::new(1200.0, config.sample_rate_hz, config.pulses_per_rev);
        while !STOP.load(Ordering::Acquire) {
            estimator.tick(&mut train, &STATE.rpm).unwrap();
        }
    });

    let mut controller = DutyController::new(&config);
    let mut pwm = MockPwm::new();
    let mut view = StatusView::new();
    let mut display = MockDisplay::new();
    let mut seen_rpm = 0.0;
    for _ in 0..200 {
        controller.tick(&STATE, &mut pwm).unwrap();
        view.refresh(&mut display, &STATE).unwrap();
        seen_rpm = STATE.rpm();
        if seen_rpm > 0.0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    STOP.store(true, Ordering::Release);
    sampler.await.unwrap();

    assert_eq!(seen_rpm, 1200.0);
    assert!(pwm.enabled);
    let duties = STATE.duties.load();
    assert!((duties.buck - 66.67).abs() < 0.01);
    assert!((duties.h_bridge - 50.0).abs() < 0.01);
    assert!(display.contains_text("RUNNING"));
}

#[test]
fn test_blocking_wait_returns_next_press() {
    static STATE: DriveState<4> = DriveState::new();

    let producer = std::thread::spawn(|| {
        std::thread::sleep(Duration::from_millis(5));
        STATE.events.push(KeyEvent::release('7'));
        STATE.events.push(KeyEvent::press('9'));
    });

    let key = tokio_test::block_on(async { STATE.events.wait_keypress() });
    producer.join().unwrap();
    assert_eq!(key, '9');
    assert!(!STATE.events.ready());
}
