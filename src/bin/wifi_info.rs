//! Join the access point and report what the Wi-Fi module knows: MAC,
//! SSID, addressing, and the access points in range.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use bmduino_core::{identity::MacAddress, traits::NetworkLink};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};
use log::{error, info, warn};

use bmduino_kit::{
    config::{WIFI_PASS, WIFI_SSID},
    display::{init_oled, show},
    hardware,
};

const REFRESH_INTERVAL_S: u64 = 30;

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
    esp_alloc::heap_allocator!(size: 32 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    esp_println::println!("=== BMduino Kit: Wi-Fi information ===");

    let bus = hardware::shared_bus(peripherals.I2C1, peripherals.GPIO2, peripherals.GPIO1);
    let mut oled = init_oled(bus);
    show(&mut oled, "WIFI Info", 0);

    let mut wifi = hardware::wifi_module(peripherals.UART1, peripherals.GPIO17, peripherals.GPIO18);
    if let Err(e) = wifi.begin() {
        error!("[WIFI] module not responding: {}", e);
    }

    match wifi.connect(WIFI_SSID, WIFI_PASS) {
        Ok(()) => info!("[WIFI] success, joined {}", WIFI_SSID),
        Err(e) => warn!("[WIFI] fail: {}", e),
    }

    match wifi.mac_address() {
        Ok(mac) => {
            // the module reports lower-case with colons
            match MacAddress::parse(&mac) {
                Ok(parsed) => info!("MAC: {} ({})", parsed.to_hex(), mac),
                Err(_) => info!("MAC: {}", mac),
            }
            show(&mut oled, &mac, 6);
        }
        Err(e) => error!("[WIFI] cannot read MAC: {}", e),
    }

    loop {
        match wifi.network_info() {
            Ok(net) if !net.ip_address.is_empty() => {
                info!("SSID: {}", net.ssid);
                info!("IP: {}", net.ip_address);
                info!("Gateway: {}", net.gateway);
                info!("Netmask: {}", net.netmask);
                show(&mut oled, &net.ssid, 2);
                show(&mut oled, &net.ip_address, 4);
            }
            Ok(_) => {
                warn!("[WIFI] not associated");
                show(&mut oled, "No WIFI", 4);
            }
            Err(e) => error!("[WIFI] {}", e),
        }

        match wifi.scan() {
            Ok(aps) => {
                info!("{} access points in range", aps.len());
                for ap in aps {
                    info!("  {:<32} {:>4} dBm  ch {}", ap.ssid, ap.rssi, ap.channel);
                }
            }
            Err(e) => warn!("[WIFI] scan failed: {}", e),
        }

        Timer::after(Duration::from_secs(REFRESH_INTERVAL_S)).await;
    }
}
