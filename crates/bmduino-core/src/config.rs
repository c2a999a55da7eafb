//! Kit configuration
//!
//! Defaults match the values the classroom kit shipped with. The firmware
//! overrides the Wi-Fi credentials and broker at build time.

use serde::{Deserialize, Serialize};

use crate::identity::{DHT_TOPIC, RELAY_SUBSCRIBE_TOPIC, RELAY_TOPIC};

pub const DEFAULT_MQTT_HOST: &str = "broker.emqx.io";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_SERVER_URL: &str = "http://iot.arduino.org.tw";
pub const DEFAULT_SERVER_PORT: u16 = 8888;
pub const DEFAULT_UPLOAD_PATH: &str = "/bmduino/dhtdata/dataadd.php?MAC={mac}&T={t}&H={h}";

/// Marker the upload endpoint puts in its body when it stored a sample.
pub const UPLOAD_SUCCESS_MARKER: &str = "Successful";

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct KitConfig<'a> {
    pub wifi: WifiConfig<'a>,
    pub mqtt: MqttConfig<'a>,
    pub http: HttpConfig<'a>,
    pub timing: TimingConfig,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy)]
pub struct WifiConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct MqttConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    /// Empty for anonymous access.
    pub username: &'a str,
    pub password: &'a str,
    pub publish_topic: &'a str,
    pub subscribe_topic: &'a str,
}

impl Default for MqttConfig<'_> {
    fn default() -> Self {
        Self {
            host: DEFAULT_MQTT_HOST,
            port: DEFAULT_MQTT_PORT,
            username: "",
            password: "",
            publish_topic: DHT_TOPIC,
            subscribe_topic: DHT_TOPIC,
        }
    }
}

impl<'a> MqttConfig<'a> {
    /// Topics used by the relay board sketch.
    pub fn relay(self) -> Self {
        Self {
            publish_topic: RELAY_TOPIC,
            subscribe_topic: RELAY_SUBSCRIBE_TOPIC,
            ..self
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct HttpConfig<'a> {
    pub server_url: &'a str,
    pub port: u16,
    /// Request path with `{mac}`, `{t}` and `{h}` placeholders.
    pub path_template: &'a str,
    pub success_marker: &'a str,
}

impl Default for HttpConfig<'_> {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL,
            port: DEFAULT_SERVER_PORT,
            path_template: DEFAULT_UPLOAD_PATH,
            success_marker: UPLOAD_SUCCESS_MARKER,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Time between two samples being sent out.
    pub publish_interval_ms: u32,
    /// Pause after a successful publish.
    pub publish_settle_ms: u32,
    /// Pause after joining the access point.
    pub wifi_settle_ms: u32,
    pub retry: RetryPolicy,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: 120_000,
            publish_settle_ms: 1_000,
            wifi_settle_ms: 500,
            retry: RetryPolicy::default(),
        }
    }
}

/// How often the broker connection is attempted before giving up.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u8,
    pub backoff_ms: u32,
}

impl Default for RetryPolicy {
    /// A single attempt.
    fn default() -> Self {
        Self {
            attempts: 1,
            backoff_ms: 0,
        }
    }
}

impl RetryPolicy {
    pub const fn bounded(attempts: u8, backoff_ms: u32) -> Self {
        Self {
            attempts,
            backoff_ms,
        }
    }

    /// Delay before attempt number `attempt` (0-based), doubling each time.
    pub fn delay_before(&self, attempt: u8) -> u32 {
        if attempt == 0 {
            return 0;
        }
        let shift = u32::from(attempt - 1).min(16);
        self.backoff_ms.saturating_mul(1 << shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KitConfig::default();
        assert_eq!(config.mqtt.host, "broker.emqx.io");
        assert_eq!(config.mqtt.port, 1883);
        assert!(config.mqtt.username.is_empty());
        assert!(config.mqtt.password.is_empty());
        assert_eq!(config.mqtt.publish_topic, "/arduino/dht/{}");
        assert_eq!(config.http.server_url, "http://iot.arduino.org.tw");
        assert_eq!(config.http.port, 8888);
        assert_eq!(config.http.success_marker, "Successful");
        assert_eq!(config.timing.publish_interval_ms, 120_000);
        assert_eq!(config.timing.retry.attempts, 1);
    }

    #[test]
    fn test_relay_topics() {
        let mqtt = MqttConfig::default().relay();
        assert_eq!(mqtt.publish_topic, "/arduino/SW/{}");
        assert_eq!(mqtt.subscribe_topic, "/arduino/SW/#");
        assert_eq!(mqtt.host, DEFAULT_MQTT_HOST);
    }

    #[test]
    fn test_retry_backoff_doubles() {
        let retry = RetryPolicy::bounded(4, 500);
        assert_eq!(retry.delay_before(0), 0);
        assert_eq!(retry.delay_before(1), 500);
        assert_eq!(retry.delay_before(2), 1_000);
        assert_eq!(retry.delay_before(3), 2_000);
        assert_eq!(RetryPolicy::default().delay_before(1), 0);
    }
}
