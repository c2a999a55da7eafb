//! I2C bus scan
//!
//! Probes both kit buses and names the devices the kit ships with:
//! - I2C0 (sensor): SDA => GPIO4, SCL => GPIO5
//! - I2C1 (relay board, OLED): SDA => GPIO2, SCL => GPIO1

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use bmduino_core::{oled, relay};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{
    Blocking,
    delay::Delay,
    i2c::master::{Config, I2c},
    time::Rate,
    timer::timg::TimerGroup,
};

const BME280_ADDRESS: u8 = 0x76;
const RESCAN_INTERVAL_S: u64 = 10;

esp_bootloader_esp_idf::esp_app_desc!();

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
        esp_println::println!("[PANIC] continue...");
    }
}

fn device_name(address: u8) -> &'static str {
    match address {
        BME280_ADDRESS => "BME280 climate sensor",
        oled::DEFAULT_ADDRESS => "SSD1306 OLED",
        relay::DEFAULT_ADDRESS => "BMP75M131 relay board",
        _ => "unknown",
    }
}

fn scan(name: &str, bus: &mut I2c<'_, Blocking>) -> usize {
    esp_println::println!("[{}] scan start", name);
    let mut found = 0;
    for address in 0x03..0x78 {
        let mut buf = [0u8; 1];
        if bus.write_read(address, &[], &mut buf).is_ok() {
            found += 1;
            esp_println::println!(
                "[{}] found 0x{:02X} ({})",
                name,
                address,
                device_name(address)
            );
        }
    }
    esp_println::println!("[{}] scan done, {} device(s)", name, found);
    found
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let config = || Config::default().with_frequency(Rate::from_khz(100));
    let mut sensor_bus = I2c::new(peripherals.I2C0, config())
        .unwrap()
        .with_sda(peripherals.GPIO4)
        .with_scl(peripherals.GPIO5);
    let mut shared_bus = I2c::new(peripherals.I2C1, config())
        .unwrap()
        .with_sda(peripherals.GPIO2)
        .with_scl(peripherals.GPIO1);

    loop {
        scan("I2C0", &mut sensor_bus);
        scan("I2C1", &mut shared_bus);
        Timer::after(Duration::from_secs(RESCAN_INTERVAL_S)).await;
    }
}
