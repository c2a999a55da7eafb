//! Peripheral capability traits
//!
//! Each peripheral of the kit sits behind one narrow trait so the node and
//! relay logic can be driven by the real drivers or by test doubles.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{Debug, Display};

use log::info;

use crate::config::MqttConfig;
use crate::model::{AccessPoint, Climate, InboundMessage, NetworkInfo};

/// Most relays a stack of relay boards can expose.
pub const MAX_RELAYS: usize = 16;

/// Wide enough to blank a row in the large font.
pub const ROW_BLANK: &str = "              ";

/// Trait for the Wi-Fi link, including the module's MQTT and HTTP support
pub trait NetworkLink {
    type Error: Debug + Display;

    /// Join an access point
    fn connect(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Whether the link currently holds an IP address
    fn is_connected(&mut self) -> bool;

    fn mac_address(&mut self) -> Result<String, Self::Error>;

    fn network_info(&mut self) -> Result<NetworkInfo, Self::Error>;

    fn scan(&mut self) -> Result<Vec<AccessPoint>, Self::Error>;

    /// GET `path` from `server_url` on `port` and return the body
    fn http_get(&mut self, server_url: &str, port: u16, path: &str)
    -> Result<String, Self::Error>;

    fn mqtt_connect(&mut self, broker: &MqttConfig<'_>, client_id: &str)
    -> Result<(), Self::Error>;

    fn mqtt_subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Publish `payload` as-is; it must already be escaped for the module
    fn mqtt_publish(&mut self, topic: &str, payload: &str) -> Result<(), Self::Error>;

    /// Next message received on a subscribed topic, if any
    fn mqtt_poll(&mut self) -> Result<Option<InboundMessage>, Self::Error>;
}

/// Trait for temperature/humidity sensors
pub trait ClimateSensor {
    type Error: Debug;

    fn init(&mut self) -> Result<(), Self::Error>;

    fn read(&mut self) -> Result<Climate, Self::Error>;
}

/// Trait for relay boards. Relays are numbered from 1.
pub trait RelayBoard {
    type Error: Debug + Display;

    /// Probe the board and return how many relays it drives
    fn begin(&mut self) -> Result<u8, Self::Error>;

    fn relay_count(&self) -> u8;

    fn set_relay(&mut self, relay: u8, on: bool) -> Result<(), Self::Error>;

    fn set_all(&mut self, on: bool) -> Result<(), Self::Error>;

    fn relay_status(&mut self, relay: u8) -> Result<bool, Self::Error>;

    fn all_status(&mut self) -> Result<heapless::Vec<bool, MAX_RELAYS>, Self::Error>;
}

/// Trait for character-row displays
pub trait TextDisplay {
    type Error: Debug;

    fn clear(&mut self) -> Result<(), Self::Error>;

    /// Draw text at pixel column `x` on 8-pixel page `row`
    fn print_text(&mut self, x: u8, row: u8, text: &str) -> Result<(), Self::Error>;

    /// Push buffered drawing to the panel
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Blank `row` and write `text` at its start.
pub fn show_message<D: TextDisplay>(display: &mut D, text: &str, row: u8) -> Result<(), D::Error> {
    display.print_text(0, row, ROW_BLANK)?;
    display.print_text(0, row, text)?;
    display.flush()?;
    info!("Message on OLED:({})", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingDisplay;

    #[test]
    fn show_message_blanks_row_first() {
        let mut display = RecordingDisplay::default();
        show_message(&mut display, "MQTT OK", 6).unwrap();
        assert_eq!(
            display.drawn,
            vec![(0, 6, ROW_BLANK.to_string()), (0, 6, "MQTT OK".to_string())]
        );
        assert_eq!(display.flushes, 1);
        // only the row is blanked, the rest of the screen stays
        assert_eq!(display.clears, 0);
    }
}
