#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # Drive Core
//! 
//! Real-time core of a keypad-programmed motor drive: debounced 4×4 keypad
//! scanning, pulse-train speed estimation and the buck/boost/H-bridge
//! duty-cycle law with its start/stop latch.

pub mod types;
pub mod hal;
pub mod queue;
pub mod debounce;
pub mod scanner;
pub mod speed;
pub mod entry;
pub mod control;
pub mod display;
pub mod state;

#[cfg(feature = "embassy-time")]
pub mod tasks;

#[cfg(feature = "test-utils")]
pub mod test_utils;


pub use types::*;
pub use hal::{*, Duration};
pub use queue::EventQueue;
pub use debounce::Debouncer;
pub use scanner::KeypadScanner;
pub use speed::{SpeedEstimator, SpeedUpdate, SignalPhase};
pub use entry::{NumericEntry, CursorState, EntryOutcome};
pub use control::{DutyController, DutyPlan, MotorLatch, LatchChange, compute_duties, on_start_stop_edge};
pub use display::{StatusView, Color};
pub use state::{DriveState, Setpoints, EntryMirror, Dispatcher};

/// Drive core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Observed bench configuration: 9 V battery, 24 V ceiling, 1 kHz sampling
pub fn default_config() -> DriveConfig {
    DriveConfig {
        scan_period: Duration::from_millis(1),
        sample_rate_hz: 1000,
        control_period: Duration::from_millis(100),
        battery_voltage: 9.0,
        max_voltage: 24.0,
        adc_reference_volts: 3.3,
        adc_full_scale: 4095,
        threshold_fraction: 0.3,
        pulses_per_rev: 1,
        stall_timeout_ticks: 1000,
        start_stop_debounce_us: 20_000,
    }
}
