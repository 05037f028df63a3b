//! Core data types for the motor drive

use crate::hal::Duration;

/// Number of keypad columns (driven lines)
pub const KEYPAD_COLUMNS: usize = 4;
/// Number of keypad rows (sensed lines)
pub const KEYPAD_ROWS: usize = 4;

/// Key legends indexed by `4 * column + row`
pub const KEYMAP: [u8; KEYPAD_COLUMNS * KEYPAD_ROWS] = *b"DCBA#9630852*741";

/// Number of digits held by the entry buffer
pub const ENTRY_DIGITS: usize = 5;

/// Keypad event kind
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyKind {
    /// Debounced press (history reached `0b0000_0001`)
    Press,
    /// Debounced release (history reached `0b1111_1110`)
    Release,
}

/// A debounced keypad event
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
    /// Key legend, a non-NUL 7-bit ASCII character
    pub key: char,
    pub kind: KeyKind,
}

impl KeyEvent {
    pub const fn press(key: char) -> Self {
        Self { key, kind: KeyKind::Press }
    }

    pub const fn release(key: char) -> Self {
        Self { key, kind: KeyKind::Release }
    }

    pub const fn is_press(&self) -> bool {
        matches!(self.kind, KeyKind::Press)
    }

    /// Pack into one byte: bit 7 set for a press, low 7 bits the legend.
    /// Zero is reserved for an empty queue slot.
    pub(crate) fn encode(&self) -> u8 {
        let legend = (self.key as u32 & 0x7F) as u8;
        debug_assert!(legend != 0, "NUL is not a valid key legend");
        match self.kind {
            KeyKind::Press => 0x80 | legend,
            KeyKind::Release => legend,
        }
    }

    pub(crate) fn decode(byte: u8) -> Option<Self> {
        let legend = byte & 0x7F;
        if legend == 0 {
            return None;
        }
        let key = char::from(legend);
        if byte & 0x80 != 0 {
            Some(Self::press(key))
        } else {
            Some(Self::release(key))
        }
    }
}

/// Editable fields, one per row of the entry grid
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    /// Desired converter output voltage, `DDD.DD` volts
    Voltage,
    /// Desired motor speed, plain integer
    Speed,
    /// Speed that maps to 100% H-bridge duty, plain integer
    MaxSpeed,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Voltage, Field::Speed, Field::MaxSpeed];

    pub const fn from_row(row: u8) -> Option<Field> {
        match row {
            0 => Some(Field::Voltage),
            1 => Some(Field::Speed),
            2 => Some(Field::MaxSpeed),
            _ => None,
        }
    }

    pub const fn row(&self) -> u8 {
        match self {
            Field::Voltage => 0,
            Field::Speed => 1,
            Field::MaxSpeed => 2,
        }
    }

    /// Character cells occupied on screen, including the fixed decimal point
    pub const fn cells(&self) -> u8 {
        match self {
            Field::Voltage => ENTRY_DIGITS as u8 + 1,
            Field::Speed | Field::MaxSpeed => ENTRY_DIGITS as u8,
        }
    }

    /// Cell holding the fixed decimal point, if the field has one
    pub const fn decimal_cell(&self) -> Option<u8> {
        match self {
            Field::Voltage => Some(3),
            Field::Speed | Field::MaxSpeed => None,
        }
    }

    /// Map a cursor cell onto a digit-buffer slot
    pub const fn slot_for_cell(&self, cell: u8) -> usize {
        match self.decimal_cell() {
            Some(point) if cell > point => (cell - 1) as usize,
            _ => cell as usize,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Field::Voltage => "Voltage:",
            Field::Speed => "Speed:",
            Field::MaxSpeed => "Max Speed:",
        }
    }
}

/// PWM output channels
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    HBridge,
    Boost,
    Buck,
}

/// Duty cycles in percent, each within `[0, 100]`
#[derive(Copy, Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyCycles {
    pub h_bridge: f32,
    pub boost: f32,
    pub buck: f32,
}

impl DutyCycles {
    pub const ZERO: DutyCycles = DutyCycles { h_bridge: 0.0, boost: 0.0, buck: 0.0 };
}

/// Screen geometry of the entry grid, in pixels
pub mod layout {
    /// x of the leftmost entry cell
    pub const FIELD_LEFT_PX: u16 = 130;
    /// Horizontal distance between entry cells
    pub const CELL_STEP_PX: u16 = 12;
    /// x of the field labels
    pub const LABEL_LEFT_PX: u16 = 10;
    /// y of the first field row
    pub const FIELD_TOP_PX: u16 = 40;
    /// Vertical distance between field rows
    pub const ROW_STEP_PX: u16 = 40;
    /// Glyph height at `TEXT_SIZE`, used for the cursor underline
    pub const GLYPH_HEIGHT_PX: u16 = 16;
    /// Font scale passed to the display driver
    pub const TEXT_SIZE: u8 = 2;
    /// y of the RPM readout
    pub const RPM_TOP_PX: u16 = 170;
    /// y of the running/stopped status
    pub const STATUS_TOP_PX: u16 = 200;
    /// y of the voltage-too-high banner
    pub const BANNER_TOP_PX: u16 = 240;

    pub const fn cell_x(cell: u8) -> u16 {
        FIELD_LEFT_PX + CELL_STEP_PX * cell as u16
    }

    pub const fn row_y(row: u8) -> u16 {
        FIELD_TOP_PX + ROW_STEP_PX * row as u16
    }
}

/// Drive configuration parameters
#[derive(Copy, Clone, Debug)]
pub struct DriveConfig {
    /// Keypad scan tick period (one column per tick)
    pub scan_period: Duration,
    /// Speed sensor sampling rate, ticks per second
    pub sample_rate_hz: u32,
    /// Control/display tick period
    pub control_period: Duration,
    /// Supply voltage seen by the converters, volts
    pub battery_voltage: f32,
    /// Highest voltage the boost stage may be asked for, volts
    pub max_voltage: f32,
    /// ADC reference, volts at full scale
    pub adc_reference_volts: f32,
    /// ADC count at full scale (4095 for 12 bits)
    pub adc_full_scale: u16,
    /// Crossing threshold as a fraction of full scale, in (0, 1)
    pub threshold_fraction: f32,
    /// Sensor pulses per shaft revolution
    pub pulses_per_rev: u8,
    /// Sample ticks without a crossing before the motor counts as stopped
    pub stall_timeout_ticks: u32,
    /// Busy-wait after a start/stop button edge, microseconds
    pub start_stop_debounce_us: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        crate::default_config()
    }
}

impl DriveConfig {
    /// Create a new configuration with validation
    pub fn new(
        sample_rate_hz: u32,
        battery_voltage: f32,
        max_voltage: f32,
        threshold_fraction: f32,
        pulses_per_rev: u8,
    ) -> Result<Self, &'static str> {
        if sample_rate_hz == 0 || sample_rate_hz > 100_000 {
            return Err("Sample rate must be between 1 Hz and 100 kHz");
        }
        // The sampling tick is a whole number of microseconds
        if 1_000_000 % sample_rate_hz != 0 {
            return Err("Sample rate must divide 1 MHz");
        }
        if !(battery_voltage > 0.0) {
            return Err("Battery voltage must be positive");
        }
        if !(max_voltage > battery_voltage) {
            return Err("Voltage ceiling must exceed battery voltage");
        }
        if !(threshold_fraction > 0.0 && threshold_fraction < 1.0) {
            return Err("Threshold fraction must be inside (0, 1)");
        }
        if pulses_per_rev == 0 {
            return Err("Pulses per revolution must be at least 1");
        }

        Ok(Self {
            sample_rate_hz,
            battery_voltage,
            max_voltage,
            threshold_fraction,
            pulses_per_rev,
            // One nominal period: a full second of samples
            stall_timeout_ticks: sample_rate_hz,
            ..crate::default_config()
        })
    }

    /// Speed sampling period, exactly `1 / sample_rate_hz`
    pub fn sample_period(&self) -> Duration {
        Duration::from_micros((1_000_000 / self.sample_rate_hz.max(1)) as u64)
    }

    /// Crossing threshold in volts
    pub fn threshold_volts(&self) -> f32 {
        self.adc_reference_volts * self.threshold_fraction
    }

    /// Volts per ADC count
    pub fn volts_per_count(&self) -> f32 {
        self.adc_reference_volts / self.adc_full_scale as f32
    }
}
