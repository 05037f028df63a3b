//! Duty-cycle law and start/stop latch

use drive_core::hal::mock::{MockPwm, NoopDelay};
use drive_core::{
    compute_duties, on_start_stop_edge, DriveConfig, DriveState, DutyController, DutyCycles, Field, LatchChange,
    MotorLatch,
};
use rstest::rstest;
use tokio_test::assert_ok;

const BATTERY: f32 = 9.0;
const CEILING: f32 = 24.0;

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.01
}

#[rstest]
#[case::buck_only(6.0, 1500.0, 3000.0, 66.67, 0.0, 50.0)]
#[case::at_battery(9.0, 3000.0, 3000.0, 100.0, 0.0, 100.0)]
#[case::boost(15.0, 750.0, 3000.0, 100.0, 40.0, 25.0)]
#[case::at_ceiling(24.0, 0.0, 3000.0, 100.0, 62.5, 0.0)]
#[case::speed_above_max(12.0, 4000.0, 3000.0, 100.0, 25.0, 100.0)]
#[case::no_max_speed(3.0, 1500.0, 0.0, 33.33, 0.0, 0.0)]
#[case::zero(0.0, 0.0, 0.0, 0.0, 0.0, 0.0)]
fn duty_law(
    #[case] voltage: f32,
    #[case] speed: f32,
    #[case] max_speed: f32,
    #[case] buck: f32,
    #[case] boost: f32,
    #[case] h_bridge: f32,
) {
    let plan = compute_duties(voltage, speed, max_speed, BATTERY, CEILING);
    assert!(!plan.voltage_too_high);
    assert!(close(plan.duties.buck, buck), "buck {} != {}", plan.duties.buck, buck);
    assert!(close(plan.duties.boost, boost), "boost {} != {}", plan.duties.boost, boost);
    assert!(close(plan.duties.h_bridge, h_bridge), "h-bridge {} != {}", plan.duties.h_bridge, h_bridge);
}

#[rstest]
#[case(24.01)]
#[case(30.0)]
#[case(999.99)]
fn duty_law_above_ceiling(#[case] voltage: f32) {
    let plan = compute_duties(voltage, 1500.0, 3000.0, BATTERY, CEILING);
    assert!(plan.voltage_too_high);
    assert_eq!(plan.duties, DutyCycles::ZERO);
}

#[test]
fn test_stopped_stage_gets_zero_duties() {
    let state = DriveState::<2>::new();
    let mut controller = DutyController::new(&DriveConfig::default());
    let mut pwm = MockPwm::new();
    state.setpoints.store(Field::Voltage, 12.0);
    state.setpoints.store(Field::Speed, 1000.0);
    state.setpoints.store(Field::MaxSpeed, 2000.0);

    let applied = assert_ok!(controller.tick(&state, &mut pwm));
    assert_eq!(applied, DutyCycles::ZERO);
    assert!(!pwm.enabled);
    assert_eq!(state.duties.load(), DutyCycles::ZERO);

    assert_eq!(state.latch.toggle(), LatchChange::Started);
    let applied = assert_ok!(controller.tick(&state, &mut pwm));
    assert!(pwm.enabled);
    assert!(close(applied.boost, 25.0));
    assert!(close(applied.h_bridge, 50.0));
    assert_eq!(state.duties.load(), applied);
}

#[test]
fn test_raising_voltage_over_ceiling_stops_running_drive() {
    let state = DriveState::<2>::new();
    let mut controller = DutyController::new(&DriveConfig::default());
    let mut pwm = MockPwm::new();
    state.setpoints.store(Field::Voltage, 12.0);
    state.latch.toggle();
    assert_ok!(controller.tick(&state, &mut pwm));
    assert!(pwm.enabled);

    state.setpoints.store(Field::Voltage, 30.0);
    assert_ok!(controller.tick(&state, &mut pwm));
    assert!(!pwm.enabled);
    assert!(!state.latch.running());
    assert!(state.latch.voltage_too_high());

    // Back under the ceiling clears the flag but does not restart
    state.setpoints.store(Field::Voltage, 12.0);
    assert_ok!(controller.tick(&state, &mut pwm));
    assert!(!state.latch.voltage_too_high());
    assert!(!pwm.enabled);
    assert_eq!(state.latch.toggle(), LatchChange::Started);
}

#[test]
fn test_button_edge_toggles_and_waits() {
    let latch = MotorLatch::new();
    let mut delay = NoopDelay::default();
    let debounce_us = DriveConfig::default().start_stop_debounce_us;

    assert_eq!(on_start_stop_edge(&latch, &mut delay, debounce_us), LatchChange::Started);
    assert_eq!(on_start_stop_edge(&latch, &mut delay, debounce_us), LatchChange::Stopped);
    assert_eq!(delay.total_ns, 2 * debounce_us as u64 * 1000);

    latch.set_voltage_too_high(true);
    assert_eq!(on_start_stop_edge(&latch, &mut delay, debounce_us), LatchChange::Refused);
    assert!(!latch.pwm_enabled());
}
