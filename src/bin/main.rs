//! Climate node: BME280 readings published to the MQTT broker every two
//! minutes, with status on the OLED.

#![no_std]
#![no_main]

use core::fmt::Write;
use core::panic::PanicInfo;

use bmduino_core::{
    node::{NodeState, SensorNode},
    traits::ClimateSensor,
};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};
use log::{error, info};

use bmduino_kit::{
    config::kit_config,
    display::{init_oled, show},
    hardware::{self, ClimateHardware},
};

const HEART_BEAT_INTERVAL_MS: u64 = 5_000;
const HALTED_LOG_INTERVAL_S: u64 = 60;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
        esp_println::println!("[PANIC] continue...");
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

#[embassy_executor::task]
async fn run_heartbeat() {
    loop {
        esp_println::println!("[HEARTBEAT] System is alive");
        Timer::after(Duration::from_millis(HEART_BEAT_INTERVAL_MS)).await;
    }
}

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_alloc::heap_allocator!(size: 64 * 1024);

    esp_println::println!("=== BMduino Kit: MQTT climate node ===");

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    if let Err(e) = spawner.spawn(run_heartbeat()) {
        esp_println::println!("[ERROR] Failed to spawn task: {:?}", e);
    }

    let bus = hardware::shared_bus(peripherals.I2C1, peripherals.GPIO2, peripherals.GPIO1);
    let mut oled = init_oled(bus);
    show(&mut oled, "BMduino MQTT", 0);

    let mut sensor = ClimateHardware::new(peripherals.I2C0, peripherals.GPIO4, peripherals.GPIO5);
    if let Err(e) = sensor.init() {
        error!("[BME280] init failed: {:?}", e);
        show(&mut oled, "Sensor Fail", 6);
        loop {
            Timer::after(Duration::from_secs(1)).await;
        }
    }

    let mut wifi = hardware::wifi_module(peripherals.UART1, peripherals.GPIO17, peripherals.GPIO18);
    if let Err(e) = wifi.begin() {
        error!("[WIFI] module not responding: {}", e);
    }

    let config = kit_config();
    let interval = config.timing.publish_interval_ms;
    let mut node = SensorNode::new(wifi, Delay::new(), config);

    if let Err(e) = node.start() {
        error!("[NODE] start failed: {}", e);
    }
    if let NodeState::Fatal(reason) = node.state() {
        show(&mut oled, "MQTT Fail", 6);
        loop {
            error!("[NODE] halted ({:?}), reset the board", reason);
            Timer::after(Duration::from_secs(HALTED_LOG_INTERVAL_S)).await;
        }
    }
    if let Some(identity) = node.identity() {
        show(&mut oled, identity.device().as_str(), 2);
    }

    loop {
        match sensor.read() {
            Ok(climate) => {
                info!(
                    "[BME280] T: {:.1} C, H: {:.1} %",
                    climate.temperature, climate.humidity
                );
                let mut line = heapless::String::<32>::new();
                let _ = write!(line, "{:.1}C {:.1}%", climate.temperature, climate.humidity);
                show(&mut oled, &line, 4);

                match node.publish(&climate) {
                    Ok(status) => show(&mut oled, status.as_str(), 6),
                    Err(e) => error!("[NODE] publish: {}", e),
                }
            }
            Err(e) => error!("[BME280] read error: {:?}", e),
        }

        Timer::after(Duration::from_millis(interval as u64)).await;
    }
}
