//! Async task bodies for the four drive activities

use embassy_time::{Ticker, Timer};
use crate::control::DutyController;
use crate::display::StatusView;
use crate::hal::{AnalogSampler, DisplayDriver, KeypadMatrix, PwmOutput};
use crate::scanner::KeypadScanner;
use crate::speed::SpeedEstimator;
use crate::state::{Dispatcher, DriveState};
use crate::types::DriveConfig;

/// Keypad scan: one column per `scan_period`
pub async fn keypad_scan_task<M: KeypadMatrix, const Q: usize>(
    mut matrix: M,
    state: &DriveState<Q>,
    config: DriveConfig,
) {
    let mut scanner = KeypadScanner::new();
    if scanner.start(&mut matrix).is_err() {
        #[cfg(feature = "defmt")]
        defmt::warn!("Keypad column drive failed at start-up");
    }

    let mut ticker = Ticker::every(config.scan_period);
    loop {
        if scanner.tick(&mut matrix, &state.events).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("Keypad scan I/O error");
        }
        ticker.next().await;
    }
}

/// Speed sampling at `sample_rate_hz`
pub async fn speed_task<A: AnalogSampler, const W: usize, const Q: usize>(
    mut adc: A,
    state: &DriveState<Q>,
    config: DriveConfig,
) {
    let mut estimator = SpeedEstimator::<W>::new(&config);
    let mut ticker = Ticker::every(config.sample_period());
    loop {
        if estimator.tick(&mut adc, &state.rpm).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("ADC sample failed");
        }
        ticker.next().await;
    }
}

/// Control law and status screen every `control_period`
pub async fn control_task<P: PwmOutput, D: DisplayDriver, const Q: usize>(
    mut pwm: P,
    mut display: D,
    state: &DriveState<Q>,
    config: DriveConfig,
) {
    let mut controller = DutyController::new(&config);
    let mut view = StatusView::new();
    let mut ticker = Ticker::every(config.control_period);
    loop {
        match controller.tick(state, &mut pwm) {
            Ok(_duties) => {
                #[cfg(feature = "defmt")]
                defmt::trace!("Duties {:?}", _duties);
            }
            Err(_) => {
                // Could not drive the stage; try to at least switch it off
                pwm.set_output_enabled(false).ok();
                #[cfg(feature = "defmt")]
                defmt::warn!("PWM update failed");
            }
        }

        if view.refresh(&mut display, state).is_err() {
            view.invalidate();
            #[cfg(feature = "defmt")]
            defmt::warn!("Display refresh failed");
        }
        ticker.next().await;
    }
}

/// Foreground dispatch: drain key events, yield one scan period when idle
pub async fn dispatch_task<const Q: usize>(state: &DriveState<Q>, config: DriveConfig) {
    let mut dispatcher = Dispatcher::new();
    state.entry.publish(dispatcher.entry());
    loop {
        if dispatcher.drain(state) == 0 {
            Timer::after(config.scan_period).await;
        }
    }
}
