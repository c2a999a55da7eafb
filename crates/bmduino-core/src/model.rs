// Data read from the board's peripherals

use alloc::string::String;

/// One temperature/humidity sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    pub temperature: f32,
    pub humidity: f32,
}

/// Addressing the Wi-Fi module reports once it is associated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    pub ssid: heapless::String<32>,
    pub ip_address: heapless::String<16>,
    pub gateway: heapless::String<16>,
    pub netmask: heapless::String<16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: heapless::String<32>,
    pub rssi: i16,
    pub channel: u8,
}

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
}
