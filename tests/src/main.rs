// Scripted bench run: keypad entry, start, speed sensing and the duty law

use drive_core::hal::mock::{MockDisplay, MockMatrix, MockPwm};
use drive_core::test_utils::pulse_train::PulseTrain;
use drive_core::{
    default_config, Dispatcher, DriveState, DutyController, Field, KeypadScanner, SpeedEstimator, StatusView, VERSION,
};
use drive_tests::tap_key;

static STATE: DriveState<2> = DriveState::new();

fn main() {
    println!("🧪 Motor Drive Bench Simulation (drive-core {})", VERSION);

    let config = default_config();
    let mut matrix = MockMatrix::new();
    let mut scanner = KeypadScanner::new();
    let mut dispatcher = Dispatcher::new();
    let mut controller = DutyController::new(&config);
    let mut pwm = MockPwm::new();
    let mut view = StatusView::new();
    let mut display = MockDisplay::new();
    scanner.start(&mut matrix).expect("mock matrix accepts column 0");

    let script = [
        ("⌨️ Voltage 15.00 V", "01500#"),
        ("⌨️ Speed 1200 rpm", "01200#"),
        ("⌨️ Max speed 2400 rpm", "02400#"),
        ("▶️ Start", "*"),
    ];
    for (step, keys) in script {
        println!("{}", step);
        for key in keys.chars() {
            tap_key(key, 8, &mut matrix, &mut scanner, &mut dispatcher, &STATE);
        }
    }
    for field in Field::ALL {
        println!("  {} {}", field.label(), STATE.setpoints.load(field));
    }

    println!("🌀 Spinning the simulated shaft at 1200 rpm for 2 s...");
    let mut estimator = SpeedEstimator::<4>::new(&config);
    let mut train = PulseTrain::new(1200.0, config.sample_rate_hz, config.pulses_per_rev);
    let samples_per_control = config.sample_rate_hz as u64 * config.control_period.as_millis() / 1000;
    for _ in 0..20 {
        for _ in 0..samples_per_control {
            estimator.tick(&mut train, &STATE.rpm).expect("pulse train never fails");
        }
        controller.tick(&STATE, &mut pwm).expect("mock stage never fails");
        view.refresh(&mut display, &STATE).expect("mock display never fails");
    }

    let duties = STATE.duties.load();
    println!("  RPM estimate: {:.1}", STATE.rpm());
    println!(
        "  Duties: buck {:.2}%, boost {:.2}%, H-bridge {:.2}% (stage {})",
        duties.buck,
        duties.boost,
        duties.h_bridge,
        if pwm.enabled { "enabled" } else { "disabled" }
    );

    println!("⚠️ Raising voltage to 30.00 V");
    for key in "03000#".chars() {
        tap_key(key, 8, &mut matrix, &mut scanner, &mut dispatcher, &STATE);
    }
    controller.tick(&STATE, &mut pwm).expect("mock stage never fails");
    view.refresh(&mut display, &STATE).expect("mock display never fails");
    println!(
        "  Voltage too high: {}, running: {}, banner shown: {}",
        STATE.latch.voltage_too_high(),
        STATE.latch.running(),
        display.contains_text("VOLTAGE TOO HIGH")
    );

    assert!(STATE.latch.voltage_too_high());
    assert!(!pwm.enabled);
    println!("✅ Bench simulation complete");
    println!();
    println!("📝 Run the host test suite with: cargo test -p drive-tests");
}
