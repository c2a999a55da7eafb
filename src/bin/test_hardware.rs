#![no_std]
#![no_main]

use core::panic::PanicInfo;

use bmduino_core::{
    config::DEFAULT_UPLOAD_PATH,
    escape::escape_at_payload,
    identity::{DeviceIdentity, MacAddress, RELAY_SUBSCRIBE_TOPIC, RELAY_TOPIC},
    payload::{SensorReading, http_query_path, mqtt_payload},
    relay::Bmp75m131,
    traits::{ClimateSensor, NetworkLink, RelayBoard},
};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use embedded_hal_bus::i2c::RefCellDevice;
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use bmduino_kit::{
    display::init_oled,
    hardware::{self, ClimateHardware, Led, WifiModule},
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

// Test result tracking
struct TestResults {
    passed: u32,
    failed: u32,
    total: u32,
}

impl TestResults {
    fn new() -> Self {
        Self {
            passed: 0,
            failed: 0,
            total: 0,
        }
    }

    fn assert(&mut self, condition: bool, test_name: &str) {
        self.total += 1;
        if condition {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED", test_name);
        }
    }

    fn assert_eq<T: PartialEq + core::fmt::Debug>(&mut self, left: T, right: T, test_name: &str) {
        self.total += 1;
        if left == right {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED: {:?} != {:?}", test_name, left, right);
        }
    }

    fn print_summary(&self) {
        esp_println::println!("\n==========================================");
        esp_println::println!("Test Summary:");
        esp_println::println!("  Total:  {}", self.total);
        esp_println::println!("  Passed: {}", self.passed);
        esp_println::println!("  Failed: {}", self.failed);
        if self.failed == 0 {
            esp_println::println!("\n✓ ALL TESTS PASSED!");
        } else {
            esp_println::println!("\n✗ SOME TESTS FAILED");
        }
        esp_println::println!("==========================================");
    }
}

/// Formatting that has to behave the same on the chip as on the host.
fn test_formatting(results: &mut TestResults) {
    esp_println::println!("\n[TEST] Identifier and payload formatting");

    let mac = MacAddress::parse("e8:9f:6d:e8:f3:bc");
    results.assert(mac.is_ok(), "MAC parses");
    let Ok(mac) = mac else {
        return;
    };

    match DeviceIdentity::derive(mac, RELAY_TOPIC, RELAY_SUBSCRIBE_TOPIC) {
        Ok(identity) => {
            results.assert_eq(identity.client_id.as_str(), "twE89F6DE8F3BC", "client id");
            results.assert_eq(
                identity.publish_topic.as_str(),
                "/arduino/SW/E89F6DE8F3BC",
                "relay topic",
            );
        }
        Err(_) => results.assert(false, "identity derivation"),
    }

    results.assert_eq(
        escape_at_payload("a\"b,c").as_str(),
        "a\\\"b\\,c",
        "escape quote and comma",
    );

    let device = mac.to_hex();
    let reading = SensorReading::new(&device, 25.5, 60.0);
    match mqtt_payload(&reading) {
        Ok(payload) => {
            results.assert(payload.starts_with("{\\\"Device\\\""), "payload escaped");
            results.assert(payload.contains("25.5"), "payload temperature");
        }
        Err(_) => results.assert(false, "payload fits"),
    }
    match http_query_path(DEFAULT_UPLOAD_PATH, &reading) {
        Ok(path) => results.assert(path.ends_with("T=25.5&H=60.0"), "upload path"),
        Err(_) => results.assert(false, "upload path fits"),
    }
}

async fn test_led(results: &mut TestResults, led: &mut Led<'_>) {
    esp_println::println!("\n[TEST] LED D8 (watch the board)");
    for _ in 0..6 {
        led.toggle();
        Timer::after(Duration::from_millis(250)).await;
    }
    led.set(false);
    results.assert(true, "LED toggled");
}

async fn test_climate_sensor(results: &mut TestResults, sensor: &mut ClimateHardware<'_>) {
    esp_println::println!("\n[TEST] BME280 Sensor Tests");

    if let Err(e) = sensor.init() {
        esp_println::println!("  Failed to initialize BME280: {:?}", e);
        results.assert(false, "BME280 initialization");
        return;
    }
    results.assert(true, "BME280 initialization");

    let mut samples = heapless::Vec::<(f32, f32), 5>::new();
    for i in 0..5 {
        Timer::after(Duration::from_millis(100)).await;
        match sensor.read() {
            Ok(climate) => {
                esp_println::println!(
                    "    Sample {}: {:.2}°C {:.1}%",
                    i + 1,
                    climate.temperature,
                    climate.humidity
                );
                let _ = samples.push((climate.temperature, climate.humidity));
            }
            Err(e) => esp_println::println!("    Failed to read: {:?}", e),
        }
    }
    results.assert_eq(samples.len(), 5, "collected 5 samples");

    for (t, h) in samples.iter() {
        results.assert(*t > -40.0 && *t < 85.0, "temperature in valid range");
        results.assert((0.0..=100.0).contains(h), "humidity in valid range");
    }
}

fn test_wifi_module(results: &mut TestResults, wifi: &mut WifiModule) {
    esp_println::println!("\n[TEST] Wi-Fi module");

    match wifi.begin() {
        Ok(()) => results.assert(true, "module answers AT"),
        Err(e) => {
            esp_println::println!("    {}", e);
            results.assert(false, "module answers AT");
            return;
        }
    }
    match wifi.mac_address() {
        Ok(mac) => {
            esp_println::println!("    MAC: {}", mac);
            results.assert_eq(mac.len(), 12, "MAC has 12 hex digits");
        }
        Err(e) => {
            esp_println::println!("    {}", e);
            results.assert(false, "read MAC");
        }
    }
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_alloc::heap_allocator!(size: 64 * 1024);

    esp_println::println!("\n==========================================");
    esp_println::println!("=== BMduino Kit Hardware Test Runner ===");
    esp_println::println!("==========================================");

    let mut results = TestResults::new();

    // Run tests that don't need hardware
    test_formatting(&mut results);

    let mut led = Led::new(peripherals.GPIO8);
    let mut sensor = ClimateHardware::new(peripherals.I2C0, peripherals.GPIO4, peripherals.GPIO5);
    let bus = hardware::shared_bus(peripherals.I2C1, peripherals.GPIO2, peripherals.GPIO1);
    let mut wifi = hardware::wifi_module(peripherals.UART1, peripherals.GPIO17, peripherals.GPIO18);

    // Initialize RTOS timer for embassy (this consumes TIMG0)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    test_led(&mut results, &mut led).await;
    test_climate_sensor(&mut results, &mut sensor).await;

    esp_println::println!("\n[TEST] OLED");
    let mut oled = init_oled(bus);
    results.assert(oled.print(0, 0, "Self test").is_ok(), "OLED draws");
    results.assert(oled.update().is_ok(), "OLED flushes");

    esp_println::println!("\n[TEST] Relay board");
    let mut relay = Bmp75m131::new(RefCellDevice::new(bus));
    match relay.begin() {
        Ok(count) => {
            esp_println::println!("    {} relay(s)", count);
            results.assert(relay.set_relay(1, true).is_ok(), "relay 1 on");
            results.assert_eq(relay.relay_status(1).ok(), Some(true), "relay 1 reads on");
            results.assert(relay.set_all(false).is_ok(), "all relays off");
        }
        Err(e) => {
            esp_println::println!("    {}", e);
            results.assert(false, "relay board found");
        }
    }

    test_wifi_module(&mut results, &mut wifi);

    results.print_summary();

    // Keep running and blink a pattern based on results
    esp_println::println!("\nTest run complete. Looping...");
    loop {
        led.toggle();
        if results.failed == 0 {
            // All passed - short blink
            Timer::after(Duration::from_millis(200)).await;
        } else {
            // Some failed - long blink
            Timer::after(Duration::from_millis(1000)).await;
        }
    }
}
