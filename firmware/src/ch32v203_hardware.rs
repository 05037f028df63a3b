//! CH32V203 Hardware Implementation
//!
//! Register-level drivers for the drive's peripherals:
//! keypad on GPIOC, speed sensor on ADC1, power stage on TIM1 and
//! the start/stop button on PB0 / EXTI0.

use core::ptr::{read_volatile, write_volatile};
use embedded_hal::delay::DelayNs;

use drive_core::{Channel, HalError, KeypadMatrix, AnalogSampler, PwmOutput, KEYPAD_COLUMNS, KEYPAD_ROWS};

/// Core clock after reset configuration
pub const SYSCLK_HZ: u32 = 96_000_000;

/// Peripheral register map (RM0001-style offsets)
pub mod regs {
    pub const RCC: usize = 0x4002_1000;
    pub const RCC_APB2PCENR: usize = 0x18;

    pub const AFIO: usize = 0x4001_0000;
    pub const AFIO_EXTICR1: usize = 0x08;

    pub const GPIOA: usize = 0x4001_0800;
    pub const GPIOB: usize = 0x4001_0C00;
    pub const GPIOC: usize = 0x4001_1000;
    pub const GPIO_CFGLR: usize = 0x00;
    pub const GPIO_CFGHR: usize = 0x04;
    pub const GPIO_INDR: usize = 0x08;
    pub const GPIO_OUTDR: usize = 0x0C;
    pub const GPIO_BSHR: usize = 0x10;

    pub const EXTI: usize = 0x4001_0400;
    pub const EXTI_INTENR: usize = 0x00;
    pub const EXTI_FTENR: usize = 0x0C;
    pub const EXTI_PR: usize = 0x14;

    pub const TIM1: usize = 0x4001_2C00;
    pub const TIM_CTLR1: usize = 0x00;
    pub const TIM_CHCTLR1: usize = 0x18;
    pub const TIM_CHCTLR2: usize = 0x1C;
    pub const TIM_CCER: usize = 0x20;
    pub const TIM_PSC: usize = 0x28;
    pub const TIM_ATRLR: usize = 0x2C;
    pub const TIM_CH1CVR: usize = 0x34;
    pub const TIM_CH2CVR: usize = 0x38;
    pub const TIM_CH3CVR: usize = 0x3C;
    pub const TIM_BDTR: usize = 0x44;

    pub const ADC1: usize = 0x4001_2400;
    pub const ADC_STATR: usize = 0x00;
    pub const ADC_CTLR2: usize = 0x08;
    pub const ADC_SAMPTR2: usize = 0x10;
    pub const ADC_RSQR3: usize = 0x34;
    pub const ADC_RDATAR: usize = 0x4C;

    pub const PFIC: usize = 0xE000_E000;
    pub const PFIC_IENR1: usize = 0x100;
}

use regs::*;

#[inline(always)]
fn read(base: usize, offset: usize) -> u32 {
    // SAFETY: `base + offset` is a memory-mapped peripheral register.
    unsafe { read_volatile((base + offset) as *const u32) }
}

#[inline(always)]
fn write(base: usize, offset: usize, value: u32) {
    // SAFETY: `base + offset` is a memory-mapped peripheral register.
    unsafe { write_volatile((base + offset) as *mut u32, value) }
}

#[inline(always)]
fn modify(base: usize, offset: usize, f: impl FnOnce(u32) -> u32) {
    write(base, offset, f(read(base, offset)));
}

/// Replace the 4-bit CFGLR/CFGHR nibble for `pin`
fn configure_pin(port: usize, pin: u8, mode_cnf: u32) {
    let (offset, shift) = if pin < 8 {
        (GPIO_CFGLR, pin as u32 * 4)
    } else {
        (GPIO_CFGHR, (pin as u32 - 8) * 4)
    };
    modify(port, offset, |v| (v & !(0xF << shift)) | (mode_cnf << shift));
}

/// CFGxR nibble values
mod pin_mode {
    pub const ANALOG: u32 = 0b0000;
    pub const INPUT_PULL: u32 = 0b1000;
    pub const OUTPUT_PUSH_PULL: u32 = 0b0001;
    pub const ALTERNATE_PUSH_PULL: u32 = 0b1011;
}

/// Keypad matrix: columns PC4-PC7 driven low, rows PC0-PC3 pulled up
pub struct Ch32v203Keypad {
    _private: (),
}

impl Ch32v203Keypad {
    fn init() -> Self {
        for row in 0..KEYPAD_ROWS as u8 {
            configure_pin(GPIOC, pins::ROW_BASE + row, pin_mode::INPUT_PULL);
        }
        // Pull-up selected through OUTDR; columns idle high
        let rows_mask = 0xF << pins::ROW_BASE;
        let columns_mask = 0xF << pins::COLUMN_BASE;
        modify(GPIOC, GPIO_OUTDR, |v| v | rows_mask | columns_mask);
        for column in 0..KEYPAD_COLUMNS as u8 {
            configure_pin(GPIOC, pins::COLUMN_BASE + column, pin_mode::OUTPUT_PUSH_PULL);
        }
        Self { _private: () }
    }
}

impl KeypadMatrix for Ch32v203Keypad {
    type Error = HalError;

    fn drive_column(&mut self, column: usize) -> Result<(), Self::Error> {
        if column >= KEYPAD_COLUMNS {
            return Err(HalError::InvalidConfig);
        }
        let all = 0xFu32 << pins::COLUMN_BASE;
        let active = 1u32 << (pins::COLUMN_BASE as usize + column);
        // BSHR: low half sets, high half resets, in one write
        write(GPIOC, GPIO_BSHR, (all & !active) | (active << 16));
        Ok(())
    }

    fn read_rows(&mut self) -> Result<u8, Self::Error> {
        let level = read(GPIOC, GPIO_INDR) >> pins::ROW_BASE;
        Ok((!level & 0xF) as u8)
    }
}

/// Speed sensor on ADC1 channel 1 (PA1), software-triggered single conversions
pub struct Ch32v203Adc {
    _private: (),
}

impl Ch32v203Adc {
    const EOC: u32 = 1 << 1;
    const ADON: u32 = 1 << 0;
    const EXTTRIG: u32 = 1 << 20;
    const EXTSEL_SWSTART: u32 = 0b111 << 17;
    const SWSTART: u32 = 1 << 22;
    /// Polls before a conversion counts as lost
    const TIMEOUT_POLLS: u32 = 10_000;

    fn init() -> Self {
        configure_pin(GPIOA, pins::SPEED_SENSOR, pin_mode::ANALOG);
        // 71.5-cycle sample time on the sensor channel
        modify(ADC1, ADC_SAMPTR2, |v| (v & !(0b111 << 3)) | (0b110 << 3));
        write(ADC1, ADC_RSQR3, pins::SPEED_SENSOR as u32);
        write(ADC1, ADC_CTLR2, Self::ADON | Self::EXTTRIG | Self::EXTSEL_SWSTART);
        Self { _private: () }
    }
}

impl AnalogSampler for Ch32v203Adc {
    type Error = HalError;

    fn sample(&mut self) -> Result<u16, Self::Error> {
        modify(ADC1, ADC_CTLR2, |v| v | Self::SWSTART);
        for _ in 0..Self::TIMEOUT_POLLS {
            if read(ADC1, ADC_STATR) & Self::EOC != 0 {
                // Reading RDATAR clears EOC
                return Ok((read(ADC1, ADC_RDATAR) & 0x0FFF) as u16);
            }
        }
        Err(HalError::AdcError)
    }
}

/// Power stage on TIM1: CH1 H-bridge (PA8), CH2 boost (PA9), CH3 buck (PA10).
///
/// The main output enable (BDTR.MOE) gates all three channels at once.
pub struct Ch32v203Pwm {
    period: u32,
}

impl Ch32v203Pwm {
    const CEN: u32 = 1 << 0;
    const ARPE: u32 = 1 << 7;
    const MOE: u32 = 1 << 15;
    /// PWM mode 1 with preload, for one channel slot of CHCTLRx
    const OC_PWM1: u32 = (0b110 << 4) | (1 << 3);

    fn init(frequency_hz: u32) -> Self {
        for pin in [pins::H_BRIDGE, pins::BOOST, pins::BUCK] {
            configure_pin(GPIOA, pin, pin_mode::ALTERNATE_PUSH_PULL);
        }
        let period = SYSCLK_HZ / frequency_hz;
        write(TIM1, TIM_PSC, 0);
        write(TIM1, TIM_ATRLR, period - 1);
        write(TIM1, TIM_CHCTLR1, Self::OC_PWM1 | (Self::OC_PWM1 << 8));
        write(TIM1, TIM_CHCTLR2, Self::OC_PWM1);
        write(TIM1, TIM_CH1CVR, 0);
        write(TIM1, TIM_CH2CVR, 0);
        write(TIM1, TIM_CH3CVR, 0);
        // CC1E | CC2E | CC3E
        write(TIM1, TIM_CCER, 0x111);
        write(TIM1, TIM_CTLR1, Self::ARPE | Self::CEN);
        Self { period }
    }
}

impl PwmOutput for Ch32v203Pwm {
    type Error = HalError;

    fn set_duty(&mut self, channel: Channel, percent: f32) -> Result<(), Self::Error> {
        let offset = match channel {
            Channel::HBridge => TIM_CH1CVR,
            Channel::Boost => TIM_CH2CVR,
            Channel::Buck => TIM_CH3CVR,
        };
        let compare = (percent.clamp(0.0, 100.0) / 100.0 * self.period as f32) as u32;
        write(TIM1, offset, compare);
        Ok(())
    }

    fn set_output_enabled(&mut self, enabled: bool) -> Result<(), Self::Error> {
        modify(TIM1, TIM_BDTR, |v| if enabled { v | Self::MOE } else { v & !Self::MOE });
        Ok(())
    }
}

/// Cycle-counting busy wait
pub struct SpinDelay;

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        // Two instructions per loop iteration
        let cycles = (ns as u64 * (SYSCLK_HZ / 1_000_000) as u64 / 1000) as u32;
        // SAFETY: pure busy loop, no memory access
        unsafe { riscv::asm::delay(cycles / 2) };
    }
}

/// Peripherals handed to the drive tasks
pub struct Ch32v203Drive {
    pub keypad: Ch32v203Keypad,
    pub adc: Ch32v203Adc,
    pub pwm: Ch32v203Pwm,
}

/// Clock and configure every drive peripheral; the stage starts disabled
pub fn init_hardware(pwm_frequency_hz: u32) -> Ch32v203Drive {
    // AFIO | IOPA | IOPB | IOPC | ADC1 | TIM1
    modify(RCC, RCC_APB2PCENR, |v| v | (1 << 0) | (1 << 2) | (1 << 3) | (1 << 4) | (1 << 9) | (1 << 11));

    let keypad = Ch32v203Keypad::init();
    let adc = Ch32v203Adc::init();
    let mut pwm = Ch32v203Pwm::init(pwm_frequency_hz);
    pwm.set_output_enabled(false).ok();
    init_start_stop_button();

    #[cfg(feature = "defmt")]
    defmt::info!("🔌 CH32V203 drive peripherals initialized");

    Ch32v203Drive { keypad, adc, pwm }
}

/// PB0 input with pull-up, falling edge on EXTI0
fn init_start_stop_button() {
    configure_pin(GPIOB, pins::START_STOP, pin_mode::INPUT_PULL);
    modify(GPIOB, GPIO_OUTDR, |v| v | (1 << pins::START_STOP));
    // EXTI0 source = port B
    modify(AFIO, AFIO_EXTICR1, |v| (v & !0xF) | 0x1);
    modify(EXTI, EXTI_FTENR, |v| v | 1);
    modify(EXTI, EXTI_INTENR, |v| v | 1);
    enable_irq(pins::EXTI0_IRQN);
}

/// Unmask one PFIC interrupt line
pub fn enable_irq(irqn: u32) {
    // IENR registers are write-one-to-set, 32 lines each
    write(PFIC, PFIC_IENR1 + 4 * (irqn as usize / 32), 1 << (irqn % 32));
}

/// EXTI0 handler body for the start/stop button
pub fn handle_start_stop_interrupt() {
    if read(EXTI, EXTI_PR) & 1 == 0 {
        return;
    }
    let _change = drive_core::on_start_stop_edge(
        &crate::DRIVE.latch,
        &mut SpinDelay,
        drive_core::default_config().start_stop_debounce_us,
    );
    // Clear after the debounce so bounces during the wait are discarded
    write(EXTI, EXTI_PR, 1);
}

/// CH32V203 pin assignments
pub mod pins {
    /// Keypad rows PC0-PC3
    pub const ROW_BASE: u8 = 0;
    /// Keypad columns PC4-PC7
    pub const COLUMN_BASE: u8 = 4;
    /// Speed sensor, PA1 / ADC channel 1
    pub const SPEED_SENSOR: u8 = 1;
    /// TIM1 outputs
    pub const H_BRIDGE: u8 = 8;
    pub const BOOST: u8 = 9;
    pub const BUCK: u8 = 10;
    /// Start/stop push button, PB0
    pub const START_STOP: u8 = 0;
    /// PFIC interrupt number of the SysTick compare
    pub const SYSTICK_IRQN: u32 = 12;
    /// PFIC interrupt number of EXTI0
    pub const EXTI0_IRQN: u32 = 22;
}
