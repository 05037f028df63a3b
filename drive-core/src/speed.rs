//! Speed estimation from a pulse-train sensor sampled by the ADC.
//!
//! Each sample tick converts one reading to volts and compares it with a fixed
//! threshold. A below-to-above crossing closes a measurement period:
//! `rpm = 60 * ticks_per_second / (elapsed_ticks * pulses_per_rev)`, smoothed
//! over a boxcar window of `W` periods. Staying below the threshold longer
//! than the stall timeout forces the estimate to zero.

use heapless::HistoryBuffer;
use portable_atomic::{AtomicF32, Ordering};
use crate::hal::AnalogSampler;
use crate::types::DriveConfig;

/// Threshold flip-flop state
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalPhase {
    BelowThreshold,
    AboveThreshold,
}

/// Outcome of one sample tick
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpeedUpdate {
    /// No estimate change
    Unchanged,
    /// First crossing after start-up or a stall; timing starts here
    Armed,
    /// A period closed; carries the smoothed RPM
    Measured(f32),
    /// No crossing within the stall timeout; estimate forced to zero
    Stalled,
}

/// Crossing-period speed estimator with a `W`-period boxcar average
pub struct SpeedEstimator<const W: usize> {
    phase: SignalPhase,
    elapsed_ticks: u32,
    armed: bool,
    window: HistoryBuffer<f32, W>,
    volts_per_count: f32,
    threshold_volts: f32,
    ticks_per_second: f32,
    pulses_per_rev: f32,
    stall_timeout_ticks: u32,
}

impl<const W: usize> SpeedEstimator<W> {
    const NON_EMPTY_WINDOW: () = assert!(W >= 1, "boxcar window must hold at least one period");

    pub fn new(config: &DriveConfig) -> Self {
        let () = Self::NON_EMPTY_WINDOW;
        Self {
            phase: SignalPhase::BelowThreshold,
            elapsed_ticks: 0,
            armed: false,
            window: HistoryBuffer::new(),
            volts_per_count: config.volts_per_count(),
            threshold_volts: config.threshold_volts(),
            ticks_per_second: config.sample_rate_hz as f32,
            pulses_per_rev: config.pulses_per_rev as f32,
            stall_timeout_ticks: config.stall_timeout_ticks,
        }
    }

    pub fn phase(&self) -> SignalPhase {
        self.phase
    }

    /// Ticks since the last closing crossing
    pub fn elapsed_ticks(&self) -> u32 {
        self.elapsed_ticks
    }

    /// Process one raw ADC reading
    pub fn sample(&mut self, raw: u16) -> SpeedUpdate {
        // Counting before the comparison guarantees at least one elapsed
        // tick between two crossings.
        self.elapsed_ticks = self.elapsed_ticks.saturating_add(1);
        let above = raw as f32 * self.volts_per_count > self.threshold_volts;

        match (self.phase, above) {
            (SignalPhase::BelowThreshold, true) => {
                self.phase = SignalPhase::AboveThreshold;
                let update = if self.armed {
                    SpeedUpdate::Measured(self.close_period())
                } else {
                    self.armed = true;
                    SpeedUpdate::Armed
                };
                self.elapsed_ticks = 0;
                update
            }
            (SignalPhase::BelowThreshold, false) => {
                if self.armed && self.elapsed_ticks > self.stall_timeout_ticks {
                    self.armed = false;
                    self.window.clear();
                    SpeedUpdate::Stalled
                } else {
                    SpeedUpdate::Unchanged
                }
            }
            (SignalPhase::AboveThreshold, false) => {
                self.phase = SignalPhase::BelowThreshold;
                SpeedUpdate::Unchanged
            }
            (SignalPhase::AboveThreshold, true) => SpeedUpdate::Unchanged,
        }
    }

    fn close_period(&mut self) -> f32 {
        debug_assert!(self.elapsed_ticks > 0);
        let seconds = self.elapsed_ticks as f32 / self.ticks_per_second;
        let rpm = 60.0 / (seconds * self.pulses_per_rev);
        self.window.write(rpm);

        let filled = self.window.as_slice();
        filled.iter().sum::<f32>() / filled.len() as f32
    }

    /// Sample the ADC once and publish the estimate into `rpm`
    pub fn tick<A: AnalogSampler>(&mut self, adc: &mut A, rpm: &AtomicF32) -> Result<SpeedUpdate, A::Error> {
        let raw = adc.sample()?;
        let update = self.sample(raw);
        match update {
            SpeedUpdate::Measured(value) => rpm.store(value, Ordering::Relaxed),
            SpeedUpdate::Stalled => {
                rpm.store(0.0, Ordering::Relaxed);
                #[cfg(feature = "defmt")]
                defmt::trace!("Speed sensor stalled, RPM forced to 0");
            }
            SpeedUpdate::Armed | SpeedUpdate::Unchanged => {}
        }
        Ok(update)
    }
}
