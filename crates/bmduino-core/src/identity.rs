//! MAC-derived identifiers
//!
//! The Wi-Fi module's MAC address is the only stable per-device value, so
//! the MQTT client id and the topic names are both derived from it.

use core::fmt::{self, Write};

use heapless::String;
use thiserror_no_std::Error;

/// Prefix placed in front of the MAC to form the MQTT client id.
pub const CLIENT_ID_PREFIX: &str = "tw";

/// Size of the client id buffer in the Arduino sketches, terminator included.
pub const CLIENT_ID_BUFFER: usize = 20;

/// Size of the topic buffers in the Arduino sketches, terminator included.
pub const TOPIC_BUFFER: usize = 200;

/// Placeholder substituted by the device MAC in topic templates.
pub const MAC_PLACEHOLDER: &str = "{}";

/// Publish and subscribe topic for the temperature/humidity node.
pub const DHT_TOPIC: &str = "/arduino/dht/{}";

/// Publish topic for relay status reports.
pub const RELAY_TOPIC: &str = "/arduino/SW/{}";

/// Subscription covering every relay board's command topic.
pub const RELAY_SUBSCRIBE_TOPIC: &str = "/arduino/SW/#";

pub type ClientId = String<{ CLIENT_ID_BUFFER - 1 }>;
pub type Topic = String<{ TOPIC_BUFFER - 1 }>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid MAC address: {0}")]
    InvalidMac(String<32>),
    #[error("identifier needs {needed} bytes, buffer holds {capacity}")]
    TooLong { needed: usize, capacity: usize },
    #[error("publish topic contains a wildcard or NUL character")]
    InvalidTopic,
}

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Parse the textual MAC reported by the Wi-Fi module.
    ///
    /// Accepts `e8:9f:6d:e8:f3:bc`, `E8-9F-6D-E8-F3-BC` and `E89F6DE8F3BC`.
    pub fn parse(text: &str) -> Result<Self, IdentityError> {
        let invalid = || {
            let mut shown = String::<32>::new();
            for c in text.chars().take(32) {
                if shown.push(c).is_err() {
                    break;
                }
            }
            IdentityError::InvalidMac(shown)
        };

        let mut octets = [0u8; 6];
        let mut nibbles = 0usize;
        for c in text.trim().chars() {
            if c == ':' || c == '-' {
                continue;
            }
            let value = c.to_digit(16).ok_or_else(invalid)? as u8;
            if nibbles >= 12 {
                return Err(invalid());
            }
            octets[nibbles / 2] = (octets[nibbles / 2] << 4) | value;
            nibbles += 1;
        }

        if nibbles != 12 {
            return Err(invalid());
        }
        Ok(Self(octets))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Twelve upper-case hex digits, no separators.
    pub fn to_hex(&self) -> String<12> {
        let mut hex = String::new();
        // 12 digits always fit
        let _ = write!(hex, "{}", self);
        hex
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for octet in self.0 {
            write!(f, "{:02X}", octet)?;
        }
        Ok(())
    }
}

/// MQTT client id: `tw` followed by the MAC text.
pub fn client_id(mac: &str) -> Result<ClientId, IdentityError> {
    let needed = CLIENT_ID_PREFIX.len() + mac.len();
    let too_long = IdentityError::TooLong {
        needed: needed + 1,
        capacity: CLIENT_ID_BUFFER,
    };

    let mut id = ClientId::new();
    id.push_str(CLIENT_ID_PREFIX).map_err(|_| too_long.clone())?;
    id.push_str(mac).map_err(|_| too_long)?;
    Ok(id)
}

/// Byte image of the client id buffer as the Arduino sketches filled it.
///
/// The sketches wrote a `'\n'` one slot past the string terminator. The
/// newline is never part of the C string, but it is in the buffer. This
/// reproduces that layout for compatibility checks only; use [`client_id`]
/// for anything sent to a broker.
pub fn legacy_client_id_buffer(mac: &str) -> Result<[u8; CLIENT_ID_BUFFER], IdentityError> {
    let prefix = CLIENT_ID_PREFIX.as_bytes();
    let terminator = prefix.len() + mac.len();
    let needed = terminator + 2;
    if needed > CLIENT_ID_BUFFER {
        return Err(IdentityError::TooLong {
            needed,
            capacity: CLIENT_ID_BUFFER,
        });
    }

    let mut buffer = [0u8; CLIENT_ID_BUFFER];
    buffer[..prefix.len()].copy_from_slice(prefix);
    buffer[prefix.len()..terminator].copy_from_slice(mac.as_bytes());
    buffer[terminator] = 0;
    buffer[terminator + 1] = b'\n';
    Ok(buffer)
}

/// Substitute `mac` for the first `{}` in `template`.
pub fn format_topic(template: &str, mac: &str) -> Result<Topic, IdentityError> {
    let (head, tail) = match template.find(MAC_PLACEHOLDER) {
        Some(at) => (&template[..at], &template[at + MAC_PLACEHOLDER.len()..]),
        None => (template, ""),
    };
    let substituted = if template.contains(MAC_PLACEHOLDER) { mac } else { "" };

    let needed = head.len() + substituted.len() + tail.len() + 1;
    let too_long = || IdentityError::TooLong {
        needed,
        capacity: TOPIC_BUFFER,
    };

    let mut topic = Topic::new();
    topic.push_str(head).map_err(|_| too_long())?;
    topic.push_str(substituted).map_err(|_| too_long())?;
    topic.push_str(tail).map_err(|_| too_long())?;
    Ok(topic)
}

/// Like [`format_topic`], rejecting MQTT wildcards and NUL.
pub fn publish_topic(template: &str, mac: &str) -> Result<Topic, IdentityError> {
    let topic = format_topic(template, mac)?;
    if topic.contains(['+', '#', '\0']) {
        return Err(IdentityError::InvalidTopic);
    }
    Ok(topic)
}

/// Everything the node derives from its MAC at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub mac: MacAddress,
    pub client_id: ClientId,
    pub publish_topic: Topic,
    pub subscribe_topic: Topic,
}

impl DeviceIdentity {
    pub fn derive(
        mac: MacAddress,
        publish_template: &str,
        subscribe_template: &str,
    ) -> Result<Self, IdentityError> {
        let hex = mac.to_hex();
        Ok(Self {
            mac,
            client_id: client_id(&hex)?,
            publish_topic: publish_topic(publish_template, &hex)?,
            subscribe_topic: format_topic(subscribe_template, &hex)?,
        })
    }

    /// Device field used in payloads.
    pub fn device(&self) -> String<12> {
        self.mac.to_hex()
    }

    /// Whether a message on `topic` is meant for this board.
    pub fn is_addressed_by(&self, topic: &str) -> bool {
        topic == self.publish_topic.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: &str = "E89F6DE8F3BC";

    #[test]
    fn parses_module_formats() {
        let expected = MacAddress::new([0xE8, 0x9F, 0x6D, 0xE8, 0xF3, 0xBC]);
        assert_eq!(MacAddress::parse("e8:9f:6d:e8:f3:bc").unwrap(), expected);
        assert_eq!(MacAddress::parse("E8-9F-6D-E8-F3-BC").unwrap(), expected);
        assert_eq!(MacAddress::parse(MAC).unwrap(), expected);
        assert_eq!(expected.to_hex().as_str(), MAC);
    }

    #[test]
    fn rejects_bad_macs() {
        assert!(MacAddress::parse("").is_err());
        assert!(MacAddress::parse("e8:9f:6d").is_err());
        assert!(MacAddress::parse("e8:9f:6d:e8:f3:bc:00").is_err());
        assert!(matches!(
            MacAddress::parse("zz:9f:6d:e8:f3:bc"),
            Err(IdentityError::InvalidMac(_))
        ));
    }

    #[test]
    fn client_id_is_prefix_and_mac() {
        let id = client_id(MAC).unwrap();
        assert_eq!(id.as_str(), "twE89F6DE8F3BC");
        assert!(!id.contains('\n'));
    }

    #[test]
    fn client_id_too_long_is_an_error() {
        let err = client_id("0123456789ABCDEF0123").unwrap_err();
        assert_eq!(
            err,
            IdentityError::TooLong {
                needed: 23,
                capacity: CLIENT_ID_BUFFER
            }
        );
    }

    #[test]
    fn legacy_buffer_keeps_stray_newline_after_terminator() {
        let buffer = legacy_client_id_buffer(MAC).unwrap();
        let end = buffer.iter().position(|&b| b == 0).unwrap();
        assert_eq!(&buffer[..end], b"twE89F6DE8F3BC");
        assert_eq!(buffer[end + 1], b'\n');
        assert!(legacy_client_id_buffer("0123456789ABCDEF").is_ok());
        assert!(legacy_client_id_buffer("0123456789ABCDEF0").is_err());
    }

    #[test]
    fn topics_substitute_mac() {
        assert_eq!(
            publish_topic(DHT_TOPIC, MAC).unwrap().as_str(),
            "/arduino/dht/E89F6DE8F3BC"
        );
        assert_eq!(
            format_topic(RELAY_SUBSCRIBE_TOPIC, MAC).unwrap().as_str(),
            "/arduino/SW/#"
        );
    }

    #[test]
    fn publish_topic_rejects_wildcards() {
        assert_eq!(
            publish_topic(RELAY_SUBSCRIBE_TOPIC, MAC),
            Err(IdentityError::InvalidTopic)
        );
        assert_eq!(
            publish_topic(DHT_TOPIC, "AB+CD"),
            Err(IdentityError::InvalidTopic)
        );
    }

    #[test]
    fn topic_overflow_is_an_error() {
        let long = "A".repeat(TOPIC_BUFFER);
        assert!(matches!(
            format_topic(DHT_TOPIC, &long),
            Err(IdentityError::TooLong { .. })
        ));
    }

    #[test]
    fn identity_derivation() {
        let mac = MacAddress::parse(MAC).unwrap();
        let identity = DeviceIdentity::derive(mac, RELAY_TOPIC, RELAY_SUBSCRIBE_TOPIC).unwrap();
        assert_eq!(identity.client_id.as_str(), "twE89F6DE8F3BC");
        assert_eq!(identity.publish_topic.as_str(), "/arduino/SW/E89F6DE8F3BC");
        assert_eq!(identity.subscribe_topic.as_str(), "/arduino/SW/#");
        assert_eq!(identity.device().as_str(), MAC);
    }

    #[test]
    fn only_own_topic_addresses_the_board() {
        let mac = MacAddress::parse(MAC).unwrap();
        let identity = DeviceIdentity::derive(mac, RELAY_TOPIC, RELAY_SUBSCRIBE_TOPIC).unwrap();
        assert!(identity.is_addressed_by("/arduino/SW/E89F6DE8F3BC"));
        assert!(!identity.is_addressed_by("/arduino/SW/001122334455"));
        assert!(!identity.is_addressed_by("/arduino/SW/#"));
    }
}
