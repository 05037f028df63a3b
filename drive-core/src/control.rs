//! Start/stop latch and the duty-cycle control law

use embedded_hal::delay::DelayNs;
use portable_atomic::{AtomicU8, Ordering};
use crate::hal::PwmOutput;
use crate::state::DriveState;
use crate::types::{Channel, DriveConfig, DutyCycles};

const RUNNING: u8 = 0b001;
const PWM_ENABLED: u8 = 0b010;
const VOLTAGE_TOO_HIGH: u8 = 0b100;

/// Result of a latch toggle request
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LatchChange {
    Started,
    Stopped,
    /// Start refused while the voltage setpoint is above the ceiling
    Refused,
}

/// Motor start/stop latch.
///
/// Toggled from two contexts (keypad `*` in the foreground, the start/stop
/// button interrupt), so all three flags live in one byte updated with
/// atomic read-modify-write.
pub struct MotorLatch {
    flags: AtomicU8,
}

impl MotorLatch {
    pub const fn new() -> Self {
        Self { flags: AtomicU8::new(0) }
    }

    /// Stop if running, otherwise start unless the voltage is too high
    pub fn toggle(&self) -> LatchChange {
        let mut change = LatchChange::Refused;
        let _ = self.flags.fetch_update(Ordering::AcqRel, Ordering::Acquire, |flags| {
            if flags & (RUNNING | PWM_ENABLED) != 0 {
                change = LatchChange::Stopped;
                Some(flags & !(RUNNING | PWM_ENABLED))
            } else if flags & VOLTAGE_TOO_HIGH == 0 {
                change = LatchChange::Started;
                Some(flags | RUNNING | PWM_ENABLED)
            } else {
                change = LatchChange::Refused;
                None
            }
        });
        change
    }

    /// Record the ceiling check; going too high also drops the latch.
    /// Returns `true` if that forced a running motor to stop.
    pub fn set_voltage_too_high(&self, too_high: bool) -> bool {
        let previous = if too_high {
            self.flags.fetch_update(Ordering::AcqRel, Ordering::Acquire, |flags| {
                Some((flags | VOLTAGE_TOO_HIGH) & !(RUNNING | PWM_ENABLED))
            })
        } else {
            self.flags.fetch_update(Ordering::AcqRel, Ordering::Acquire, |flags| {
                Some(flags & !VOLTAGE_TOO_HIGH)
            })
        };
        let previous = previous.unwrap_or_else(|flags| flags);
        too_high && previous & (RUNNING | PWM_ENABLED) != 0
    }

    pub fn running(&self) -> bool {
        self.flags.load(Ordering::Acquire) & RUNNING != 0
    }

    pub fn pwm_enabled(&self) -> bool {
        self.flags.load(Ordering::Acquire) & PWM_ENABLED != 0
    }

    pub fn voltage_too_high(&self) -> bool {
        self.flags.load(Ordering::Acquire) & VOLTAGE_TOO_HIGH != 0
    }
}

impl Default for MotorLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Start/stop button edge handler body.
///
/// Toggles the latch like the `*` key, then busy-waits the debounce delay so
/// contact bounce settles before the caller re-arms the edge interrupt.
pub fn on_start_stop_edge<D: DelayNs>(latch: &MotorLatch, delay: &mut D, debounce_us: u32) -> LatchChange {
    let change = latch.toggle();
    #[cfg(feature = "defmt")]
    defmt::info!("Start/stop button: {:?}", change);
    delay.delay_us(debounce_us);
    change
}

/// Duty cycles derived from the setpoints, before the latch is applied
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct DutyPlan {
    pub duties: DutyCycles,
    pub voltage_too_high: bool,
}

/// Map the voltage and speed setpoints onto buck, boost and H-bridge duty.
///
/// Up to the battery voltage the buck stage alone regulates; above it the
/// buck runs fully on and the boost stage makes up the difference; past
/// `max_voltage` everything is pinned at zero.
pub fn compute_duties(
    desired_voltage: f32,
    desired_speed: f32,
    max_speed: f32,
    battery_voltage: f32,
    max_voltage: f32,
) -> DutyPlan {
    let (buck, boost) = if desired_voltage <= battery_voltage {
        (100.0 * desired_voltage / battery_voltage, 0.0)
    } else if desired_voltage <= max_voltage {
        (100.0, 100.0 * (1.0 - battery_voltage / desired_voltage))
    } else {
        return DutyPlan {
            duties: DutyCycles::ZERO,
            voltage_too_high: true,
        };
    };

    let h_bridge = if max_speed > 0.0 {
        100.0 * desired_speed / max_speed
    } else {
        0.0
    };

    DutyPlan {
        duties: DutyCycles {
            h_bridge: h_bridge.clamp(0.0, 100.0),
            boost: boost.clamp(0.0, 100.0),
            buck: buck.clamp(0.0, 100.0),
        },
        voltage_too_high: false,
    }
}

/// Control tick: recompute the duty plan and drive the power stage
pub struct DutyController {
    battery_voltage: f32,
    max_voltage: f32,
}

impl DutyController {
    pub fn new(config: &DriveConfig) -> Self {
        Self {
            battery_voltage: config.battery_voltage,
            max_voltage: config.max_voltage,
        }
    }

    /// Run one control tick and return the duties actually applied
    pub fn tick<P: PwmOutput, const N: usize>(
        &mut self,
        state: &DriveState<N>,
        pwm: &mut P,
    ) -> Result<DutyCycles, P::Error> {
        let setpoints = &state.setpoints;
        let plan = compute_duties(
            setpoints.voltage(),
            setpoints.speed(),
            setpoints.max_speed(),
            self.battery_voltage,
            self.max_voltage,
        );

        if state.latch.set_voltage_too_high(plan.voltage_too_high) {
            #[cfg(feature = "defmt")]
            defmt::warn!("Voltage setpoint above ceiling, output stage disabled");
        }

        let applied = if state.latch.pwm_enabled() {
            pwm.set_duty(Channel::HBridge, plan.duties.h_bridge)?;
            pwm.set_duty(Channel::Boost, plan.duties.boost)?;
            pwm.set_duty(Channel::Buck, plan.duties.buck)?;
            pwm.set_output_enabled(true)?;
            plan.duties
        } else {
            pwm.set_output_enabled(false)?;
            pwm.set_duty(Channel::HBridge, 0.0)?;
            pwm.set_duty(Channel::Boost, 0.0)?;
            pwm.set_duty(Channel::Buck, 0.0)?;
            DutyCycles::ZERO
        };

        state.duties.store(applied);
        Ok(applied)
    }
}
