//! Climate readings uploaded to the web server with an HTTP GET every two
//! minutes.

#![no_std]
#![no_main]

use core::fmt::Write;
use core::panic::PanicInfo;

use bmduino_core::{
    node::{NodeState, SensorNode, UploadStatus},
    traits::ClimateSensor,
};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};
use log::{error, info, warn};

use bmduino_kit::{
    config::kit_config,
    display::{init_oled, show},
    hardware::{self, ClimateHardware},
};

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
    esp_alloc::heap_allocator!(size: 64 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    esp_println::println!("=== BMduino Kit: web upload ===");

    let bus = hardware::shared_bus(peripherals.I2C1, peripherals.GPIO2, peripherals.GPIO1);
    let mut oled = init_oled(bus);
    show(&mut oled, "BMduino Web", 0);

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

    if let Err(e) = node.join() {
        error!("[NODE] {}", e);
    }
    match node.state() {
        NodeState::Fatal(reason) => loop {
            error!("[NODE] halted ({:?}), reset the board", reason);
            Timer::after(Duration::from_secs(60)).await;
        },
        NodeState::Degraded => warn!("[NODE] no Wi-Fi yet, will retry before each upload"),
        _ => {}
    }
    if let Some(identity) = node.identity() {
        show(&mut oled, identity.device().as_str(), 2);
    }

    loop {
        match sensor.read() {
            Ok(climate) => {
                let mut line = heapless::String::<32>::new();
                let _ = write!(line, "{:.1}C {:.1}%", climate.temperature, climate.humidity);
                show(&mut oled, &line, 4);

                match node.upload(&climate) {
                    Ok(UploadStatus::Accepted) => {
                        info!("[HTTP] Successful");
                        show(&mut oled, "Upload OK", 6);
                    }
                    Ok(UploadStatus::Rejected(body)) => {
                        warn!("[HTTP] server said: {}", body);
                        show(&mut oled, "Upload Fail", 6);
                    }
                    Err(e) => {
                        error!("[HTTP] {}", e);
                        show(&mut oled, "Upload Fail", 6);
                    }
                }
            }
            Err(e) => error!("[BME280] read error: {:?}", e),
        }

        Timer::after(Duration::from_millis(interval as u64)).await;
    }
}
