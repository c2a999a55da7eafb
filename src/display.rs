use core::cell::RefCell;

use bmduino_core::{
    oled::{Oled, OledError},
    traits::{TextDisplay, show_message},
};
use embedded_hal_bus::i2c::RefCellDevice;
use esp_hal::i2c::master::Error as I2cError;
use ssd1306::{I2CDisplayInterface, prelude::I2CInterface};

use crate::hardware::{Bus, SharedI2c};

pub type KitOled = Oled<I2CInterface<SharedI2c>, SharedI2c>;
pub type KitOledError = OledError<I2cError>;

/// Bring up the OLED on the shared bus.
///
/// A panel that fails to initialise is logged and returned anyway; later
/// drawing calls report their own errors.
pub fn init_oled(bus: &'static RefCell<Bus>) -> KitOled {
    let interface = I2CDisplayInterface::new(RefCellDevice::new(bus));
    let mut oled = Oled::new(interface, RefCellDevice::new(bus));

    if let Err(e) = oled.init() {
        log::error!("[OLED] init failed: {}", e);
    }
    oled
}

/// Show a line of text; display failures only get logged.
pub fn show<D: TextDisplay>(display: &mut D, text: &str, row: u8) {
    if let Err(e) = show_message(display, text, row) {
        log::warn!("[OLED] {:?}", e);
    }
}
