//! Blink the "D8" LED: one second on, one second off.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use bmduino_kit::hardware::Led;

const BLINK_INTERVAL_MS: u64 = 1_000;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    esp_println::println!("=== BMduino Kit: blink D8 ===");
    let mut led = Led::new(peripherals.GPIO8);

    loop {
        led.set(true);
        log::debug!("LED on");
        Timer::after(Duration::from_millis(BLINK_INTERVAL_MS)).await;
        led.set(false);
        log::debug!("LED off");
        Timer::after(Duration::from_millis(BLINK_INTERVAL_MS)).await;
    }
}
