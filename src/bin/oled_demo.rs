//! Walk through what the OLED can do: fonts, numbers, pixels, lines,
//! bitmaps, hardware scrolling, inversion and dimming.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use bmduino_core::oled::{Font, ScrollDirection, ScrollSpeed, VerticalScroll};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use embedded_graphics::pixelcolor::BinaryColor;
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};
use log::{info, warn};

use bmduino_kit::{
    display::{KitOled, KitOledError, init_oled},
    hardware,
};

const STEP_MS: u64 = 500;
const GREETING: &str = "Hello World!";

// 16x16 thermometer icon, one bit per pixel, MSB first
const ICON: [u8; 32] = [
    0x03, 0xC0, 0x04, 0x20, 0x04, 0x20, 0x04, 0xA0, 0x04, 0x20, 0x04, 0xA0, 0x04, 0x20, 0x05,
    0xA0, 0x05, 0xA0, 0x05, 0xA0, 0x0B, 0xD0, 0x17, 0xE8, 0x17, 0xE8, 0x13, 0xC8, 0x08, 0x10,
    0x07, 0xE0,
];

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

async fn pause() {
    Timer::after(Duration::from_millis(STEP_MS)).await;
}

/// Column that centres `text` in `font`.
fn centred(text: &str, font: Font) -> u8 {
    let width = text.len() as u32 * font.width();
    (128u32.saturating_sub(width) / 2) as u8
}

async fn strings(oled: &mut KitOled) -> Result<(), KitOledError> {
    oled.clear_screen()?;
    oled.set_font(Font::Small);
    for row in 0..8 {
        oled.print(centred(GREETING, Font::Small), row, GREETING)?;
    }
    oled.update()?;
    pause().await;

    oled.clear_screen()?;
    oled.set_font(Font::Large);
    for row in (0..8).step_by(2) {
        oled.print(centred(GREETING, Font::Large), row, GREETING)?;
    }
    oled.update()?;
    pause().await;
    Ok(())
}

async fn numbers(oled: &mut KitOled) -> Result<(), KitOledError> {
    oled.clear_screen()?;
    oled.set_font(Font::Large);
    oled.print(0, 0, "Num:")?;
    oled.print_number(48, 0, 2024)?;
    oled.print(0, 2, "Neg:")?;
    oled.print_number(48, 2, -42)?;
    oled.print(0, 4, "Flt:")?;
    oled.print_float(48, 4, 3.14159)?;
    oled.print_char(0, 6, '#')?;
    oled.update()?;
    pause().await;
    Ok(())
}

async fn pixels(oled: &mut KitOled) -> Result<(), KitOledError> {
    oled.clear_screen()?;
    for x in (0..128u8).step_by(4) {
        for y in (0..64u8).step_by(4) {
            oled.draw_pixel(x, y, BinaryColor::On);
        }
    }
    oled.update()?;
    pause().await;
    Ok(())
}

async fn lines(oled: &mut KitOled) -> Result<(), KitOledError> {
    oled.clear_screen()?;
    for y in (0..64u8).step_by(8) {
        oled.draw_hline(0, y, 128, BinaryColor::On)?;
    }
    for x in (0..128u8).step_by(8) {
        oled.draw_vline(x, 0, 64, BinaryColor::On)?;
    }
    oled.update()?;
    pause().await;

    oled.clear_screen()?;
    oled.draw_line(0, 0, 127, 63, BinaryColor::On)?;
    oled.draw_line(0, 63, 127, 0, BinaryColor::On)?;
    oled.draw_box(16, 8, 111, 55, BinaryColor::On)?;
    pause().await;
    Ok(())
}

async fn bitmap(oled: &mut KitOled) -> Result<(), KitOledError> {
    oled.draw_bitmap(56, 24, 16, 16, &ICON)?;
    pause().await;
    Ok(())
}

async fn scrolling(oled: &mut KitOled) -> Result<(), KitOledError> {
    oled.clear_screen()?;
    oled.set_font(Font::Large);
    oled.print(centred("Scroll", Font::Large), 3, "Scroll")?;
    oled.update()?;

    let runs = [
        (ScrollDirection::Right, VerticalScroll::None),
        (ScrollDirection::Left, VerticalScroll::None),
        (ScrollDirection::Right, VerticalScroll::Up),
        (ScrollDirection::Left, VerticalScroll::Down),
    ];
    for (direction, vertical) in runs {
        oled.start_scroll(direction, 0, 7, ScrollSpeed::Frames2, vertical)?;
        Timer::after(Duration::from_millis(STEP_MS * 4)).await;
        oled.stop_scroll()?;
    }
    // stopping leaves the RAM shifted, redraw from the buffer
    oled.update()?;
    Ok(())
}

async fn invert_and_dim(oled: &mut KitOled) -> Result<(), KitOledError> {
    for _ in 0..2 {
        oled.invert(true)?;
        pause().await;
        oled.invert(false)?;
        pause().await;
    }
    for _ in 0..2 {
        oled.dim(true)?;
        pause().await;
        oled.dim(false)?;
        pause().await;
    }
    Ok(())
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_alloc::heap_allocator!(size: 32 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    esp_println::println!("=== BMduino Kit: OLED demo ===");

    let bus = hardware::shared_bus(peripherals.I2C1, peripherals.GPIO2, peripherals.GPIO1);
    let mut oled = init_oled(bus);

    loop {
        let steps = [
            ("strings", strings(&mut oled).await),
            ("numbers", numbers(&mut oled).await),
            ("pixels", pixels(&mut oled).await),
            ("lines", lines(&mut oled).await),
            ("bitmap", bitmap(&mut oled).await),
            ("scroll", scrolling(&mut oled).await),
            ("invert/dim", invert_and_dim(&mut oled).await),
        ];
        for (name, result) in steps {
            match result {
                Ok(()) => info!("[OLED] {} done", name),
                Err(e) => warn!("[OLED] {} failed: {}", name, e),
            }
        }
    }
}
