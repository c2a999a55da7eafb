// Build-time settings, filled in by build.rs

use bmduino_core::config::{DEFAULT_MQTT_PORT, KitConfig, MqttConfig, WifiConfig};

pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASS: &str = env!("WIFI_PASS");
pub const MQTT_HOST: &str = env!("MQTT_HOST");
pub const MQTT_PORT: &str = env!("MQTT_PORT");
pub const MQTT_USER: &str = env!("MQTT_USER");
pub const MQTT_PASS: &str = env!("MQTT_PASS");

/// Configuration for the climate sketches.
pub fn kit_config() -> KitConfig<'static> {
    let port = MQTT_PORT.parse().unwrap_or_else(|_| {
        log::warn!("invalid MQTT_PORT {:?}, using {}", MQTT_PORT, DEFAULT_MQTT_PORT);
        DEFAULT_MQTT_PORT
    });

    KitConfig {
        wifi: WifiConfig {
            ssid: WIFI_SSID,
            password: WIFI_PASS,
        },
        mqtt: MqttConfig {
            host: MQTT_HOST,
            port,
            username: MQTT_USER,
            password: MQTT_PASS,
            ..MqttConfig::default()
        },
        ..KitConfig::default()
    }
}

/// Configuration for the relay sketch.
pub fn relay_config() -> KitConfig<'static> {
    let mut config = kit_config();
    config.mqtt = config.mqtt.relay();
    config
}
