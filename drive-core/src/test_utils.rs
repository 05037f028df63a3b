//! Test utilities: signal and keypad simulators

pub mod pulse_train {
    //! Speed sensor waveform generator

    use crate::hal::{AnalogSampler, HalError};

    /// Square pulse train as seen by the ADC, one reading per `sample()`
    #[derive(Debug, Clone)]
    pub struct PulseTrain {
        rpm: f64,
        sample_rate_hz: f64,
        pulses_per_rev: f64,
        high_fraction: f64,
        pub high: u16,
        pub low: u16,
        tick: u64,
    }

    impl PulseTrain {
        pub fn new(rpm: f64, sample_rate_hz: u32, pulses_per_rev: u8) -> Self {
            Self {
                rpm,
                sample_rate_hz: sample_rate_hz as f64,
                pulses_per_rev: pulses_per_rev as f64,
                high_fraction: 0.25,
                high: 3500,
                low: 150,
                tick: 0,
            }
        }

        /// Change speed without restarting the waveform
        pub fn set_rpm(&mut self, rpm: f64) {
            self.rpm = rpm;
        }

        /// Samples per sensor pulse, `None` when stopped
        pub fn period_ticks(&self) -> Option<f64> {
            if self.rpm <= 0.0 {
                return None;
            }
            Some(self.sample_rate_hz * 60.0 / (self.rpm * self.pulses_per_rev))
        }

        pub fn next_sample(&mut self) -> u16 {
            let tick = self.tick;
            self.tick += 1;
            match self.period_ticks() {
                Some(period) => {
                    let position = tick as f64 % period;
                    if position < period * self.high_fraction {
                        self.high
                    } else {
                        self.low
                    }
                }
                None => self.low,
            }
        }
    }

    impl AnalogSampler for PulseTrain {
        type Error = HalError;

        fn sample(&mut self) -> Result<u16, Self::Error> {
            Ok(self.next_sample())
        }
    }
}

pub mod keypad_sim {
    //! Physical keypad with contact bounce

    use crate::hal::{HalError, KeypadMatrix};
    use crate::types::{KEYMAP, KEYPAD_COLUMNS, KEYPAD_ROWS};

    #[derive(Default)]
    pub struct KeypadSim {
        held: [[bool; KEYPAD_ROWS]; KEYPAD_COLUMNS],
        /// Remaining chattering reads per key
        bounce: [[u8; KEYPAD_ROWS]; KEYPAD_COLUMNS],
        driven: Option<usize>,
    }

    fn position(legend: char) -> Option<(usize, usize)> {
        KEYMAP
            .iter()
            .position(|&k| k as char == legend)
            .map(|index| (index / KEYPAD_ROWS, index % KEYPAD_ROWS))
    }

    impl KeypadSim {
        pub fn new() -> Self {
            Self::default()
        }

        /// Close the contact, chattering for `bounce_reads` reads first
        pub fn press(&mut self, legend: char, bounce_reads: u8) {
            if let Some((column, row)) = position(legend) {
                self.held[column][row] = true;
                self.bounce[column][row] = bounce_reads;
            }
        }

        /// Open the contact, chattering for `bounce_reads` reads first
        pub fn release(&mut self, legend: char, bounce_reads: u8) {
            if let Some((column, row)) = position(legend) {
                self.held[column][row] = false;
                self.bounce[column][row] = bounce_reads;
            }
        }
    }

    impl KeypadMatrix for KeypadSim {
        type Error = HalError;

        fn drive_column(&mut self, column: usize) -> Result<(), Self::Error> {
            if column >= KEYPAD_COLUMNS {
                return Err(HalError::InvalidConfig);
            }
            self.driven = Some(column);
            Ok(())
        }

        fn read_rows(&mut self) -> Result<u8, Self::Error> {
            let column = self.driven.ok_or(HalError::NotInitialized)?;
            let mut mask = 0u8;
            for row in 0..KEYPAD_ROWS {
                let remaining = &mut self.bounce[column][row];
                let closed = if *remaining > 0 {
                    *remaining -= 1;
                    // Chatter: contact reads opposite of its target on odd counts
                    (*remaining % 2 == 0) == self.held[column][row]
                } else {
                    self.held[column][row]
                };
                if closed {
                    mask |= 1 << row;
                }
            }
            Ok(mask)
        }
    }
}
