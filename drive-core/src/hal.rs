//! Hardware Abstraction Layer for the drive collaborators

// Re-export time types based on feature
#[cfg(feature = "embassy-time")]
pub use embassy_time::Duration;

#[cfg(not(feature = "embassy-time"))]
pub use self::mock_time::Duration;

#[cfg(not(feature = "embassy-time"))]
mod mock_time {
    /// Mock duration type for compilation without embassy-time, in microseconds
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub struct Duration(u64);

    impl Duration {
        pub const fn from_micros(us: u64) -> Self {
            Self(us)
        }

        pub const fn from_millis(ms: u64) -> Self {
            Self(ms * 1000)
        }

        pub const fn as_micros(&self) -> u64 {
            self.0
        }

        pub const fn as_millis(&self) -> u64 {
            self.0 / 1000
        }
    }
}

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;
use crate::display::Color;
use crate::types::{Channel, KEYPAD_COLUMNS, KEYPAD_ROWS};

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// GPIO operation failed
    GpioError,
    /// PWM channel update failed
    PwmError,
    /// Analog conversion failed
    AdcError,
    /// Hardware not initialized
    NotInitialized,
    /// Invalid configuration
    InvalidConfig,
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::GpioError => write!(f, "GPIO operation failed"),
            HalError::PwmError => write!(f, "PWM update failed"),
            HalError::AdcError => write!(f, "Analog conversion failed"),
            HalError::NotInitialized => write!(f, "Hardware not initialized"),
            HalError::InvalidConfig => write!(f, "Invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// Keypad matrix digital I/O
pub trait KeypadMatrix {
    type Error: From<HalError>;

    /// Assert exactly one column line, release the others
    fn drive_column(&mut self, column: usize) -> Result<(), Self::Error>;

    /// Row lines asserted for the driven column, bit `i` for row `i`
    fn read_rows(&mut self) -> Result<u8, Self::Error>;
}

/// Analog sampling of the speed sensor
pub trait AnalogSampler {
    type Error: From<HalError>;

    /// Start one conversion and wait for it (bounded by hardware)
    fn sample(&mut self) -> Result<u16, Self::Error>;
}

/// Three-channel PWM power stage
pub trait PwmOutput {
    type Error: From<HalError>;

    /// Set a channel's duty cycle in percent, `0.0..=100.0`
    fn set_duty(&mut self, channel: Channel, percent: f32) -> Result<(), Self::Error>;

    /// Physically enable or disable the output stage
    fn set_output_enabled(&mut self, enabled: bool) -> Result<(), Self::Error>;
}

/// Character display driver
pub trait DisplayDriver {
    type Error: From<HalError>;

    fn clear(&mut self, color: Color) -> Result<(), Self::Error>;

    fn draw_string(
        &mut self,
        x: u16,
        y: u16,
        fg: Color,
        bg: Color,
        text: &str,
        size: u8,
    ) -> Result<(), Self::Error>;

    fn draw_char(
        &mut self,
        x: u16,
        y: u16,
        fg: Color,
        bg: Color,
        ch: char,
        size: u8,
    ) -> Result<(), Self::Error>;

    fn draw_line(&mut self, x0: u16, y0: u16, x1: u16, y1: u16, color: Color) -> Result<(), Self::Error>;
}

/// Keypad matrix on embedded-hal pins.
///
/// Columns are driven low one at a time; rows are pulled up and read low
/// while a key on the driven column is held.
pub struct MatrixPins<C, R> {
    columns: [C; KEYPAD_COLUMNS],
    rows: [R; KEYPAD_ROWS],
}

impl<C, R> MatrixPins<C, R>
where
    C: OutputPin,
    R: InputPin,
{
    pub fn new(columns: [C; KEYPAD_COLUMNS], rows: [R; KEYPAD_ROWS]) -> Self {
        Self { columns, rows }
    }

    /// Release the pins
    pub fn free(self) -> ([C; KEYPAD_COLUMNS], [R; KEYPAD_ROWS]) {
        (self.columns, self.rows)
    }
}

impl<C, R> KeypadMatrix for MatrixPins<C, R>
where
    C: OutputPin,
    R: InputPin,
{
    type Error = HalError;

    fn drive_column(&mut self, column: usize) -> Result<(), Self::Error> {
        if column >= KEYPAD_COLUMNS {
            return Err(HalError::InvalidConfig);
        }
        for (index, pin) in self.columns.iter_mut().enumerate() {
            let result = if index == column { pin.set_low() } else { pin.set_high() };
            result.map_err(|_| HalError::GpioError)?;
        }
        Ok(())
    }

    fn read_rows(&mut self) -> Result<u8, Self::Error> {
        let mut mask = 0u8;
        for (index, pin) in self.rows.iter_mut().enumerate() {
            if pin.is_low().map_err(|_| HalError::GpioError)? {
                mask |= 1 << index;
            }
        }
        Ok(mask)
    }
}

/// Power stage on three embedded-hal PWM channels plus a gate-driver enable pin
pub struct PwmStage<H, B, K, E> {
    h_bridge: H,
    boost: B,
    buck: K,
    enable: E,
}

impl<H, B, K, E> PwmStage<H, B, K, E>
where
    H: SetDutyCycle,
    B: SetDutyCycle,
    K: SetDutyCycle,
    E: OutputPin,
{
    pub fn new(h_bridge: H, boost: B, buck: K, enable: E) -> Self {
        Self { h_bridge, boost, buck, enable }
    }
}

fn apply_percent<P: SetDutyCycle>(pwm: &mut P, percent: f32) -> Result<(), HalError> {
    let clamped = percent.max(0.0).min(100.0);
    let max = pwm.max_duty_cycle();
    let duty = (clamped / 100.0 * max as f32) as u16;
    pwm.set_duty_cycle(duty).map_err(|_| HalError::PwmError)
}

impl<H, B, K, E> PwmOutput for PwmStage<H, B, K, E>
where
    H: SetDutyCycle,
    B: SetDutyCycle,
    K: SetDutyCycle,
    E: OutputPin,
{
    type Error = HalError;

    fn set_duty(&mut self, channel: Channel, percent: f32) -> Result<(), Self::Error> {
        match channel {
            Channel::HBridge => apply_percent(&mut self.h_bridge, percent),
            Channel::Boost => apply_percent(&mut self.boost, percent),
            Channel::Buck => apply_percent(&mut self.buck, percent),
        }
    }

    fn set_output_enabled(&mut self, enabled: bool) -> Result<(), Self::Error> {
        let result = if enabled { self.enable.set_high() } else { self.enable.set_low() };
        result.map_err(|_| HalError::GpioError)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use std::collections::VecDeque;
    use std::string::String;
    use std::vec::Vec;

    /// Physical keypad stand-in: a grid of held keys read back per driven column
    #[derive(Default)]
    pub struct MockMatrix {
        held: [[bool; KEYPAD_ROWS]; KEYPAD_COLUMNS],
        driven: Option<usize>,
        drive_log: Vec<usize>,
    }

    impl MockMatrix {
        pub fn new() -> Self {
            Self::default()
        }

        /// Hold or release the key carrying `legend`
        pub fn set_key(&mut self, legend: char, held: bool) {
            if let Some(index) = crate::types::KEYMAP.iter().position(|&k| k as char == legend) {
                self.held[index / KEYPAD_ROWS][index % KEYPAD_ROWS] = held;
            }
        }

        pub fn drive_log(&self) -> &[usize] {
            &self.drive_log
        }
    }

    impl KeypadMatrix for MockMatrix {
        type Error = HalError;

        fn drive_column(&mut self, column: usize) -> Result<(), Self::Error> {
            if column >= KEYPAD_COLUMNS {
                return Err(HalError::InvalidConfig);
            }
            self.driven = Some(column);
            self.drive_log.push(column);
            Ok(())
        }

        fn read_rows(&mut self) -> Result<u8, Self::Error> {
            let column = self.driven.ok_or(HalError::NotInitialized)?;
            Ok(self.held[column]
                .iter()
                .enumerate()
                .fold(0u8, |mask, (row, &held)| if held { mask | 1 << row } else { mask }))
        }
    }

    /// ADC returning scripted samples, then repeating the last one
    #[derive(Default)]
    pub struct MockAdc {
        samples: VecDeque<u16>,
        last: u16,
    }

    impl MockAdc {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_samples(&mut self, samples: &[u16]) {
            self.samples.extend(samples.iter().copied());
        }
    }

    impl AnalogSampler for MockAdc {
        type Error = HalError;

        fn sample(&mut self) -> Result<u16, Self::Error> {
            if let Some(sample) = self.samples.pop_front() {
                self.last = sample;
            }
            Ok(self.last)
        }
    }

    /// PWM stage that records what it was told
    #[derive(Default, Debug)]
    pub struct MockPwm {
        pub duties: crate::types::DutyCycles,
        pub enabled: bool,
    }

    impl MockPwm {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl PwmOutput for MockPwm {
        type Error = HalError;

        fn set_duty(&mut self, channel: Channel, percent: f32) -> Result<(), Self::Error> {
            match channel {
                Channel::HBridge => self.duties.h_bridge = percent,
                Channel::Boost => self.duties.boost = percent,
                Channel::Buck => self.duties.buck = percent,
            }
            Ok(())
        }

        fn set_output_enabled(&mut self, enabled: bool) -> Result<(), Self::Error> {
            self.enabled = enabled;
            Ok(())
        }
    }

    /// One recorded display operation
    #[derive(Clone, Debug, PartialEq)]
    pub enum DrawOp {
        Clear(Color),
        Text { x: u16, y: u16, fg: Color, text: String },
        Char { x: u16, y: u16, ch: char },
        Line { x0: u16, y0: u16, x1: u16, y1: u16, color: Color },
    }

    /// Display that records draw calls
    #[derive(Default)]
    pub struct MockDisplay {
        pub ops: Vec<DrawOp>,
    }

    impl MockDisplay {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn contains_text(&self, needle: &str) -> bool {
            self.ops.iter().any(|op| matches!(op, DrawOp::Text { text, .. } if text.contains(needle)))
        }
    }

    impl DisplayDriver for MockDisplay {
        type Error = HalError;

        fn clear(&mut self, color: Color) -> Result<(), Self::Error> {
            self.ops.push(DrawOp::Clear(color));
            Ok(())
        }

        fn draw_string(
            &mut self,
            x: u16,
            y: u16,
            fg: Color,
            _bg: Color,
            text: &str,
            _size: u8,
        ) -> Result<(), Self::Error> {
            self.ops.push(DrawOp::Text { x, y, fg, text: text.into() });
            Ok(())
        }

        fn draw_char(
            &mut self,
            x: u16,
            y: u16,
            _fg: Color,
            _bg: Color,
            ch: char,
            _size: u8,
        ) -> Result<(), Self::Error> {
            self.ops.push(DrawOp::Char { x, y, ch });
            Ok(())
        }

        fn draw_line(&mut self, x0: u16, y0: u16, x1: u16, y1: u16, color: Color) -> Result<(), Self::Error> {
            self.ops.push(DrawOp::Line { x0, y0, x1, y1, color });
            Ok(())
        }
    }

    /// Delay that returns immediately, counting requested time
    #[derive(Default)]
    pub struct NoopDelay {
        pub total_ns: u64,
    }

    impl embedded_hal::delay::DelayNs for NoopDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns as u64;
        }
    }
}
