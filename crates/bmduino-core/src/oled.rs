//! SSD1306 128x64 OLED
//!
//! Drawing goes through the `ssd1306` buffered graphics mode and shows up on
//! the next [`Oled::update`]. Panel settings the driver does not cover
//! (dimming, inversion, hardware scroll) are sent as raw command bytes over
//! a second handle to the same I2C bus.

use core::fmt::Write as _;

use embedded_graphics::{
    image::{Image, ImageRaw},
    mono_font::{
        MonoFont, MonoTextStyleBuilder,
        ascii::{FONT_6X9, FONT_8X13},
    },
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use embedded_hal::i2c::I2c;
use log::info;
use ssd1306::{Ssd1306, mode::BufferedGraphicsMode, prelude::*};
use thiserror_no_std::Error;

use crate::traits::TextDisplay;

pub const DEFAULT_ADDRESS: u8 = 0x3C;
pub const WIDTH: u32 = 128;
pub const HEIGHT: u32 = 64;
/// Height of one text row (display page) in pixels.
pub const ROW_HEIGHT: u32 = 8;

// Raw SSD1306 commands
const CONTROL_COMMAND: u8 = 0x00;
const SET_CONTRAST: u8 = 0x81;
const DISPLAY_NORMAL: u8 = 0xA6;
const DISPLAY_INVERTED: u8 = 0xA7;
const SCROLL_RIGHT: u8 = 0x26;
const SCROLL_LEFT: u8 = 0x27;
const SCROLL_VERTICAL_RIGHT: u8 = 0x29;
const SCROLL_VERTICAL_LEFT: u8 = 0x2A;
const SET_VERTICAL_SCROLL_AREA: u8 = 0xA3;
const SCROLL_STOP: u8 = 0x2E;
const SCROLL_START: u8 = 0x2F;

const CONTRAST_DIM: u8 = 0x00;
const CONTRAST_NORMAL: u8 = 0xCF;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OledError<E> {
    #[error("display interface error")]
    Interface,
    #[error("I2C error: {0:?}")]
    Bus(E),
    #[error("bitmap needs {needed} bytes, got {got}")]
    Bitmap { needed: usize, got: usize },
    #[error("page {0} is outside 0..=7")]
    Page(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Font {
    Small,
    #[default]
    Large,
}

impl Font {
    fn mono(self) -> &'static MonoFont<'static> {
        match self {
            Font::Small => &FONT_6X9,
            Font::Large => &FONT_8X13,
        }
    }

    /// Character width in pixels.
    pub fn width(self) -> u32 {
        self.mono().character_size.width
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Right,
    Left,
}

/// Vertical component of a diagonal scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalScroll {
    None,
    Up,
    Down,
}

/// Frames between scroll steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollSpeed {
    Frames2,
    Frames3,
    Frames4,
    Frames5,
    Frames25,
    Frames64,
    Frames128,
    Frames256,
}

impl ScrollSpeed {
    fn code(self) -> u8 {
        match self {
            Self::Frames5 => 0b000,
            Self::Frames64 => 0b001,
            Self::Frames128 => 0b010,
            Self::Frames256 => 0b011,
            Self::Frames3 => 0b100,
            Self::Frames4 => 0b101,
            Self::Frames25 => 0b110,
            Self::Frames2 => 0b111,
        }
    }
}

type Panel<DI> = Ssd1306<DI, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

pub struct Oled<DI, C> {
    panel: Panel<DI>,
    command: C,
    address: u8,
    font: Font,
}

impl<DI, C> Oled<DI, C>
where
    DI: WriteOnlyDataCommand,
    C: I2c,
{
    /// `interface` carries the frame buffer; `command` is a handle to the
    /// same bus for raw panel commands.
    pub fn new(interface: DI, command: C) -> Self {
        let panel = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        Self {
            panel,
            command,
            address: DEFAULT_ADDRESS,
            font: Font::default(),
        }
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn init(&mut self) -> Result<(), OledError<C::Error>> {
        self.panel.init().map_err(|_| OledError::Interface)?;
        self.panel.clear_buffer();
        self.panel.flush().map_err(|_| OledError::Interface)?;
        info!("init OLED12864 OK");
        Ok(())
    }

    pub fn set_font(&mut self, font: Font) {
        self.font = font;
    }

    pub fn font(&self) -> Font {
        self.font
    }

    /// Clear the buffer and the panel.
    pub fn clear_screen(&mut self) -> Result<(), OledError<C::Error>> {
        self.panel.clear_buffer();
        self.update()
    }

    /// Push the buffer to the panel.
    pub fn update(&mut self) -> Result<(), OledError<C::Error>> {
        self.panel.flush().map_err(|_| OledError::Interface)
    }

    /// Text at pixel column `x` on page `row`, in the current font.
    pub fn print(&mut self, x: u8, row: u8, text: &str) -> Result<(), OledError<C::Error>> {
        let style = MonoTextStyleBuilder::new()
            .font(self.font.mono())
            .text_color(BinaryColor::On)
            .background_color(BinaryColor::Off)
            .build();
        let origin = Point::new(x as i32, (row as u32 * ROW_HEIGHT) as i32);
        Text::with_baseline(text, origin, style, Baseline::Top)
            .draw(&mut self.panel)
            .map_err(|_| OledError::Interface)?;
        Ok(())
    }

    pub fn print_char(&mut self, x: u8, row: u8, c: char) -> Result<(), OledError<C::Error>> {
        let mut buf = [0u8; 4];
        self.print(x, row, c.encode_utf8(&mut buf))
    }

    pub fn print_number(&mut self, x: u8, row: u8, value: i32) -> Result<(), OledError<C::Error>> {
        let mut text = heapless::String::<12>::new();
        // an i32 has at most 11 characters
        let _ = write!(text, "{}", value);
        self.print(x, row, &text)
    }

    pub fn print_float(&mut self, x: u8, row: u8, value: f32) -> Result<(), OledError<C::Error>> {
        self.print(x, row, &format_float(value))
    }

    pub fn draw_pixel(&mut self, x: u8, y: u8, color: BinaryColor) {
        self.panel.set_pixel(x as u32, y as u32, color.is_on());
    }

    fn stroke(&mut self, line: Line, color: BinaryColor) -> Result<(), OledError<C::Error>> {
        line.into_styled(PrimitiveStyle::with_stroke(color, 1))
            .draw(&mut self.panel)
            .map_err(|_| OledError::Interface)
    }

    pub fn draw_line(
        &mut self,
        x1: u8,
        y1: u8,
        x2: u8,
        y2: u8,
        color: BinaryColor,
    ) -> Result<(), OledError<C::Error>> {
        let line = Line::new(
            Point::new(x1 as i32, y1 as i32),
            Point::new(x2 as i32, y2 as i32),
        );
        self.stroke(line, color)
    }

    pub fn draw_hline(
        &mut self,
        x: u8,
        y: u8,
        width: u8,
        color: BinaryColor,
    ) -> Result<(), OledError<C::Error>> {
        let end = x.saturating_add(width.saturating_sub(1));
        self.draw_line(x, y, end, y, color)
    }

    pub fn draw_vline(
        &mut self,
        x: u8,
        y: u8,
        height: u8,
        color: BinaryColor,
    ) -> Result<(), OledError<C::Error>> {
        let end = y.saturating_add(height.saturating_sub(1));
        self.draw_line(x, y, x, end, color)
    }

    /// Outline between two corners, shown immediately.
    pub fn draw_box(
        &mut self,
        x1: u8,
        y1: u8,
        x2: u8,
        y2: u8,
        color: BinaryColor,
    ) -> Result<(), OledError<C::Error>> {
        let rect = Rectangle::with_corners(
            Point::new(x1 as i32, y1 as i32),
            Point::new(x2 as i32, y2 as i32),
        );
        rect.into_styled(PrimitiveStyle::with_stroke(color, 1))
            .draw(&mut self.panel)
            .map_err(|_| OledError::Interface)?;
        self.update()
    }

    /// Clear the screen and show a 1-bit bitmap with rows padded to whole bytes.
    pub fn draw_bitmap(
        &mut self,
        x: u8,
        y: u8,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<(), OledError<C::Error>> {
        let needed = width.div_ceil(8) as usize * height as usize;
        if width == 0 || data.len() < needed {
            return Err(OledError::Bitmap {
                needed,
                got: data.len(),
            });
        }
        let raw = ImageRaw::<BinaryColor>::new(&data[..needed], width);
        self.panel.clear_buffer();
        Image::new(&raw, Point::new(x as i32, y as i32))
            .draw(&mut self.panel)
            .map_err(|_| OledError::Interface)?;
        self.update()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), OledError<C::Error>> {
        self.command
            .write(self.address, bytes)
            .map_err(OledError::Bus)
    }

    /// Drop the contrast to save power, or restore it.
    pub fn dim(&mut self, dim: bool) -> Result<(), OledError<C::Error>> {
        let contrast = if dim { CONTRAST_DIM } else { CONTRAST_NORMAL };
        self.send(&[CONTROL_COMMAND, SET_CONTRAST, contrast])
    }

    pub fn invert(&mut self, invert: bool) -> Result<(), OledError<C::Error>> {
        let mode = if invert {
            DISPLAY_INVERTED
        } else {
            DISPLAY_NORMAL
        };
        self.send(&[CONTROL_COMMAND, mode])
    }

    /// Scroll pages `start..=end` in hardware until [`Oled::stop_scroll`].
    pub fn start_scroll(
        &mut self,
        direction: ScrollDirection,
        start: u8,
        end: u8,
        speed: ScrollSpeed,
        vertical: VerticalScroll,
    ) -> Result<(), OledError<C::Error>> {
        for page in [start, end] {
            if page > 7 {
                return Err(OledError::Page(page));
            }
        }
        self.stop_scroll()?;

        let setup = match vertical {
            VerticalScroll::None => {
                let opcode = match direction {
                    ScrollDirection::Right => SCROLL_RIGHT,
                    ScrollDirection::Left => SCROLL_LEFT,
                };
                [
                    CONTROL_COMMAND,
                    opcode,
                    0x00,
                    start,
                    speed.code(),
                    end,
                    0x00,
                    0xFF,
                ]
            }
            VerticalScroll::Up | VerticalScroll::Down => {
                self.send(&[CONTROL_COMMAND, SET_VERTICAL_SCROLL_AREA, 0x00, HEIGHT as u8])?;
                let opcode = match direction {
                    ScrollDirection::Right => SCROLL_VERTICAL_RIGHT,
                    ScrollDirection::Left => SCROLL_VERTICAL_LEFT,
                };
                let offset = if vertical == VerticalScroll::Up {
                    0x01
                } else {
                    HEIGHT as u8 - 1
                };
                // the diagonal setup is one byte shorter; pad with a NOP
                [
                    CONTROL_COMMAND,
                    opcode,
                    0x00,
                    start,
                    speed.code(),
                    end,
                    offset,
                    0xE3,
                ]
            }
        };
        self.send(&setup)?;
        self.send(&[CONTROL_COMMAND, SCROLL_START])
    }

    pub fn stop_scroll(&mut self) -> Result<(), OledError<C::Error>> {
        self.send(&[CONTROL_COMMAND, SCROLL_STOP])
    }
}

/// Two decimals, like the Arduino `print(float)`.
pub fn format_float(value: f32) -> heapless::String<24> {
    let mut text = heapless::String::new();
    if write!(text, "{:.2}", value).is_err() {
        text.clear();
        let _ = text.push_str("ovf");
    }
    text
}

impl<DI, C> TextDisplay for Oled<DI, C>
where
    DI: WriteOnlyDataCommand,
    C: I2c,
{
    type Error = OledError<C::Error>;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.clear_screen()
    }

    fn print_text(&mut self, x: u8, row: u8, text: &str) -> Result<(), Self::Error> {
        self.print(x, row, text)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.update()
    }
}
