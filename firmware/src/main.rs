#![no_std]
#![no_main]

#[cfg(feature = "defmt")]
use defmt_rtt as _;

// RISC-V runtime
use riscv_rt as _;

// Panic handler
use panic_halt as _;

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};

use motor_drive_firmware::*;

/// Main firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    #[cfg(feature = "defmt")]
    defmt::info!("🔧 Motor Drive Firmware Starting...");

    time_driver::init();
    let hw = init_hardware(PWM_FREQUENCY_HZ);
    #[cfg(feature = "defmt")]
    defmt::info!("✅ Hardware initialized");

    let bench = default_config();
    let config = match DriveConfig::new(
        bench.sample_rate_hz,
        bench.battery_voltage,
        bench.max_voltage,
        bench.threshold_fraction,
        bench.pulses_per_rev,
    ) {
        Ok(config) => config,
        Err(_reason) => {
            #[cfg(feature = "defmt")]
            defmt::error!("Invalid drive config: {}", _reason);
            // Nothing is spawned; the power stage stays disabled
            return;
        }
    };
    #[cfg(feature = "defmt")]
    defmt::info!(
        "⚙️ Drive config: battery {} V, ceiling {} V, sampling {} Hz",
        config.battery_voltage,
        config.max_voltage,
        config.sample_rate_hz
    );

    // SAFETY: peripherals and DRIVE are initialized; handlers may run from here on.
    unsafe { riscv::register::mstatus::set_mie() };

    #[cfg(feature = "defmt")]
    defmt::info!("🚀 Spawning drive tasks...");

    spawner.must_spawn(keypad_task(hw.keypad, config));
    spawner.must_spawn(speed_task(hw.adc, config));
    spawner.must_spawn(control_task(hw.pwm, LogDisplay::new(), config));
    spawner.must_spawn(dispatch_task(config));

    #[cfg(feature = "defmt")]
    defmt::info!("✨ Motor drive ready!");

    // Main supervision loop
    loop {
        Timer::after(Duration::from_secs(1)).await;
        #[cfg(feature = "defmt")]
        defmt::trace!(
            "💓 {} rpm, running={}, duties={:?}",
            DRIVE.rpm(),
            DRIVE.latch.running(),
            DRIVE.duties.load()
        );
    }
}

/// PFIC lines past the standard RISC-V causes (SysTick is 12, EXTI0 is 22)
/// are not in the riscv-rt handler table and arrive here
#[no_mangle]
#[allow(non_snake_case)]
fn DefaultHandler() {
    match riscv::register::mcause::read().code() as u32 {
        pins::SYSTICK_IRQN => time_driver::handle_systick_interrupt(),
        pins::EXTI0_IRQN => handle_start_stop_interrupt(),
        _ => {}
    }
}
