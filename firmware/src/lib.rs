#![no_std]

//! Firmware library: shared drive state, board peripherals and task wrappers

pub use embassy_executor::Spawner;
pub use embassy_time::Duration;

pub use drive_core::*;

// Re-export hardware implementations
pub use crate::mock_hardware::*;
pub use crate::ch32v203_hardware::*;
pub use crate::tasks::*;

/// Key event queue depth between the scan task and the foreground
pub const EVENT_QUEUE_DEPTH: usize = 2;

/// Speed boxcar window, in sensor periods
pub const SPEED_WINDOW: usize = 4;

/// Power stage switching frequency
pub const PWM_FREQUENCY_HZ: u32 = 20_000;

/// State shared by the drive tasks and the start/stop interrupt
pub static DRIVE: DriveState<EVENT_QUEUE_DEPTH> = DriveState::new();

// Stand-in peripherals
pub mod mock_hardware {
    use drive_core::{Color, DisplayDriver, HalError};

    /// Display that forwards every text draw to the log.
    ///
    /// Used until a panel driver is wired up; pixel operations are dropped.
    #[derive(Debug, Default)]
    pub struct LogDisplay;

    impl LogDisplay {
        pub fn new() -> Self {
            #[cfg(feature = "defmt")]
            defmt::info!("🧪 Using log display (no panel attached)");
            Self
        }
    }

    impl DisplayDriver for LogDisplay {
        type Error = HalError;

        fn clear(&mut self, _color: Color) -> Result<(), Self::Error> {
            #[cfg(feature = "defmt")]
            defmt::debug!("🖥️ clear");
            Ok(())
        }

        fn draw_string(
            &mut self,
            _x: u16,
            _y: u16,
            _fg: Color,
            _bg: Color,
            _text: &str,
            _size: u8,
        ) -> Result<(), Self::Error> {
            #[cfg(feature = "defmt")]
            defmt::debug!("🖥️ ({}, {}) {}", _x, _y, _text);
            Ok(())
        }

        fn draw_char(
            &mut self,
            _x: u16,
            _y: u16,
            _fg: Color,
            _bg: Color,
            _ch: char,
            _size: u8,
        ) -> Result<(), Self::Error> {
            #[cfg(feature = "defmt")]
            defmt::trace!("🖥️ ({}, {}) '{}'", _x, _y, _ch);
            Ok(())
        }

        fn draw_line(&mut self, _x0: u16, _y0: u16, _x1: u16, _y1: u16, _color: Color) -> Result<(), Self::Error> {
            Ok(())
        }
    }
}

// Embassy tasks module
pub mod tasks {
    use super::*;

    /// Keypad scan task on the board matrix
    #[embassy_executor::task]
    pub async fn keypad_task(matrix: Ch32v203Keypad, config: DriveConfig) {
        #[cfg(feature = "defmt")]
        defmt::info!("⌨️ Keypad scan task started");
        drive_core::tasks::keypad_scan_task(matrix, &DRIVE, config).await;
    }

    /// Speed sensor sampling task
    #[embassy_executor::task]
    pub async fn speed_task(adc: Ch32v203Adc, config: DriveConfig) {
        #[cfg(feature = "defmt")]
        defmt::info!("🌀 Speed task started at {} Hz", config.sample_rate_hz);
        drive_core::tasks::speed_task::<_, SPEED_WINDOW, EVENT_QUEUE_DEPTH>(adc, &DRIVE, config).await;
    }

    /// Control law and status display task
    #[embassy_executor::task]
    pub async fn control_task(pwm: Ch32v203Pwm, display: LogDisplay, config: DriveConfig) {
        #[cfg(feature = "defmt")]
        defmt::info!("⚡ Control task started");
        drive_core::tasks::control_task(pwm, display, &DRIVE, config).await;
    }

    /// Foreground key dispatch task
    #[embassy_executor::task]
    pub async fn dispatch_task(config: DriveConfig) {
        #[cfg(feature = "defmt")]
        defmt::info!("📥 Dispatch task started");
        drive_core::tasks::dispatch_task(&DRIVE, config).await;
    }
}

// CH32V203 hardware module
pub mod ch32v203_hardware;

// Time driver for embassy
pub mod time_driver;
