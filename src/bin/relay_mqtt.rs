//! Relay board driven by commands received over MQTT.
//!
//! Subscribes to `/arduino/SW/#` and accepts `ON:<n>`, `OFF:<n>`, `ALLON`,
//! `ALLOFF` and `STATUS`. Each result is published on `/arduino/SW/<MAC>`.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use bmduino_core::{
    node::{NodeState, SensorNode},
    relay::{Bmp75m131, ControlError, RelayController},
    traits::RelayBoard,
};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use embedded_hal_bus::i2c::RefCellDevice;
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};
use log::{debug, error, info, warn};

use bmduino_kit::{
    config::relay_config,
    display::{init_oled, show},
    hardware,
};

const POLL_INTERVAL_MS: u64 = 100;

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

    esp_println::println!("=== BMduino Kit: relay control over MQTT ===");

    let bus = hardware::shared_bus(peripherals.I2C1, peripherals.GPIO2, peripherals.GPIO1);
    let mut oled = init_oled(bus);
    show(&mut oled, "Relay MQTT", 0);

    let mut board = Bmp75m131::new(RefCellDevice::new(bus));
    if let Err(e) = board.begin() {
        error!("[RELAY] {}", e);
        show(&mut oled, "Relay Fail", 6);
        loop {
            Timer::after(Duration::from_secs(1)).await;
        }
    }
    let mut controller = RelayController::new(board);

    let mut wifi = hardware::wifi_module(peripherals.UART1, peripherals.GPIO17, peripherals.GPIO18);
    if let Err(e) = wifi.begin() {
        error!("[WIFI] module not responding: {}", e);
    }

    let mut node = SensorNode::new(wifi, Delay::new(), relay_config());
    if let Err(e) = node.start() {
        error!("[NODE] start failed: {}", e);
    }
    if let NodeState::Fatal(reason) = node.state() {
        show(&mut oled, "MQTT Fail", 6);
        loop {
            error!("[NODE] halted ({:?}), reset the board", reason);
            Timer::after(Duration::from_secs(60)).await;
        }
    }
    show(&mut oled, "MQTT OK", 6);

    loop {
        match node.poll() {
            Ok(Some(message))
                if !node
                    .identity()
                    .is_some_and(|id| id.is_addressed_by(&message.topic)) =>
            {
                debug!("[MQTT] not for this board: {}", message.topic);
            }
            Ok(Some(message)) => {
                info!("[MQTT] {} <- {}", message.topic, message.payload);
                match controller.handle(&message.payload, &mut oled) {
                    Ok(report) => match node.publish_text(&report) {
                        Ok(status) => debug!("[MQTT] report {}", status.as_str()),
                        Err(e) => warn!("[MQTT] report: {}", e),
                    },
                    Err(ControlError::Command(e)) => debug!("[RELAY] ignored: {}", e),
                    Err(ControlError::Board(e)) => warn!("[RELAY] {}", e),
                }
            }
            Ok(None) => {}
            Err(e) => warn!("[MQTT] poll: {}", e),
        }

        Timer::after(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}
