//! Embassy time driver on the CH32V203 SysTick counter
//!
//! SysTick counts HCLK/8 (12 MHz) up through a 64-bit counter; embassy
//! runs at 1 MHz ticks. One alarm is backed by the SysTick compare value.

use core::cell::Cell;
use core::ptr::{read_volatile, write_volatile};
use critical_section::Mutex;
use embassy_time_driver::{AlarmHandle, Driver};
use portable_atomic::{AtomicBool, Ordering};

use crate::ch32v203_hardware::{enable_irq, pins::SYSTICK_IRQN, SYSCLK_HZ};

const SYSTICK: usize = 0xE000_F000;
const STK_CTLR: usize = 0x00;
const STK_SR: usize = 0x04;
const STK_CNTL: usize = 0x08;
const STK_CNTH: usize = 0x0C;
const STK_CMPLR: usize = 0x10;
const STK_CMPHR: usize = 0x14;

/// STE: counter enabled, HCLK/8, free-running
const CTLR_RUN: u32 = 0b0001;
/// STIE: compare interrupt enable
const CTLR_IRQ: u32 = 0b0010;

const COUNTS_PER_TICK: u64 = (SYSCLK_HZ / 8 / 1_000_000) as u64;

fn reg(offset: usize) -> *mut u32 {
    (SYSTICK + offset) as *mut u32
}

struct AlarmState {
    timestamp: Cell<u64>,
    callback: Cell<Option<(fn(*mut ()), usize)>>,
}

/// SysTick-backed time driver with a single alarm
pub struct SysTickDriver {
    started: AtomicBool,
    alarm_taken: AtomicBool,
    alarm: Mutex<AlarmState>,
}

impl SysTickDriver {
    const fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            alarm_taken: AtomicBool::new(false),
            alarm: Mutex::new(AlarmState {
                timestamp: Cell::new(u64::MAX),
                callback: Cell::new(None),
            }),
        }
    }

    /// Start the counter (idempotent)
    pub fn init(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        // SAFETY: SysTick registers, written once before any alarm is armed.
        unsafe {
            write_volatile(reg(STK_CNTL), 0);
            write_volatile(reg(STK_CNTH), 0);
            write_volatile(reg(STK_CTLR), CTLR_RUN);
        }
        enable_irq(SYSTICK_IRQN);
    }

    fn counter(&self) -> u64 {
        // Re-read until the high word is stable across the low read
        loop {
            // SAFETY: read-only access to the SysTick counter.
            let (high, low, again) = unsafe {
                (
                    read_volatile(reg(STK_CNTH)),
                    read_volatile(reg(STK_CNTL)),
                    read_volatile(reg(STK_CNTH)),
                )
            };
            if high == again {
                return ((high as u64) << 32) | low as u64;
            }
        }
    }

    fn arm_compare(&self, timestamp: u64) {
        let compare = timestamp.saturating_mul(COUNTS_PER_TICK);
        // SAFETY: compare registers plus the interrupt enable bit.
        unsafe {
            write_volatile(reg(STK_CMPLR), compare as u32);
            write_volatile(reg(STK_CMPHR), (compare >> 32) as u32);
            write_volatile(reg(STK_SR), 0);
            write_volatile(reg(STK_CTLR), CTLR_RUN | CTLR_IRQ);
        }
    }

    fn disarm_compare(&self) {
        // SAFETY: clears the SysTick interrupt enable and flag.
        unsafe {
            write_volatile(reg(STK_CTLR), CTLR_RUN);
            write_volatile(reg(STK_SR), 0);
        }
    }

    /// SysTick compare interrupt: fire the alarm if it is due
    pub fn on_interrupt(&self) {
        let fire = critical_section::with(|cs| {
            let alarm = self.alarm.borrow(cs);
            if alarm.timestamp.get() > self.now() {
                return None;
            }
            alarm.timestamp.set(u64::MAX);
            self.disarm_compare();
            alarm.callback.get()
        });
        if let Some((callback, ctx)) = fire {
            callback(ctx as *mut ());
        }
    }
}

impl Driver for SysTickDriver {
    fn now(&self) -> u64 {
        self.counter() / COUNTS_PER_TICK
    }

    unsafe fn allocate_alarm(&self) -> Option<AlarmHandle> {
        if self.alarm_taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(AlarmHandle::new(0))
    }

    fn set_alarm_callback(&self, _alarm: AlarmHandle, callback: fn(*mut ()), ctx: *mut ()) {
        critical_section::with(|cs| {
            self.alarm.borrow(cs).callback.set(Some((callback, ctx as usize)));
        });
    }

    fn set_alarm(&self, _alarm: AlarmHandle, timestamp: u64) -> bool {
        critical_section::with(|cs| {
            let alarm = self.alarm.borrow(cs);
            if timestamp <= self.now() {
                alarm.timestamp.set(u64::MAX);
                self.disarm_compare();
                return false;
            }
            alarm.timestamp.set(timestamp);
            self.arm_compare(timestamp);
            true
        })
    }
}

embassy_time_driver::time_driver_impl!(static DRIVER: SysTickDriver = SysTickDriver::new());

/// Start the embassy time base
pub fn init() {
    DRIVER.init();
}

/// SysTick interrupt handler body
pub fn handle_systick_interrupt() {
    DRIVER.on_interrupt();
}

// Critical section implementation for single-core RISC-V
critical_section::set_impl!(RiscvCriticalSection);

struct RiscvCriticalSection;

unsafe impl critical_section::Impl for RiscvCriticalSection {
    unsafe fn acquire() -> u8 {
        let mut mstatus: usize;
        core::arch::asm!("csrrci {}, mstatus, 8", out(reg) mstatus);
        (mstatus & 8) as u8
    }

    unsafe fn release(was_active: u8) {
        if was_active != 0 {
            core::arch::asm!("csrsi mstatus, 8");
        }
    }
}
