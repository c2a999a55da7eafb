//! Sensor payloads for the broker and the upload endpoint

use alloc::string::String;
use core::fmt::Write;

use serde::Serialize;
use thiserror_no_std::Error;

use crate::escape::escape_at_payload;

/// Serialised payloads never get near this; the Arduino sketches used 200.
pub const JSON_BUFFER: usize = 256;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload does not fit in {0} bytes")]
    TooLarge(usize),
    #[error("payload is not valid UTF-8")]
    Encoding,
    #[error("failed to format request path")]
    Format,
}

/// One sample as published.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct SensorReading<'a> {
    #[serde(rename = "Device")]
    pub device: &'a str,
    #[serde(rename = "Temperature")]
    pub temperature: f32,
    #[serde(rename = "Humidity")]
    pub humidity: f32,
}

impl<'a> SensorReading<'a> {
    pub fn new(device: &'a str, temperature: f32, humidity: f32) -> Self {
        Self {
            device,
            temperature,
            humidity,
        }
    }

    /// Plain JSON text of the reading.
    pub fn to_json(&self) -> Result<String, PayloadError> {
        let mut buffer = [0u8; JSON_BUFFER];
        let len = serde_json_core::to_slice(self, &mut buffer)
            .map_err(|_| PayloadError::TooLarge(JSON_BUFFER))?;
        let text = core::str::from_utf8(&buffer[..len]).map_err(|_| PayloadError::Encoding)?;
        Ok(String::from(text))
    }
}

/// JSON with quotes and commas escaped for `AT+MQTTPUB`.
pub fn mqtt_payload(reading: &SensorReading<'_>) -> Result<String, PayloadError> {
    let json = reading.to_json()?;
    Ok(escape_at_payload(&json))
}

/// Fill `{mac}`, `{t}` and `{h}` in an upload path.
///
/// Values are written with one decimal and no padding so the path never
/// carries a space.
pub fn http_query_path(template: &str, reading: &SensorReading<'_>) -> Result<String, PayloadError> {
    let mut path = String::with_capacity(template.len() + reading.device.len() + 16);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        path.push_str(&rest[..open]);
        let after = &rest[open..];
        if let Some(field) = after.strip_prefix("{mac}") {
            path.push_str(reading.device);
            rest = field;
        } else if let Some(field) = after.strip_prefix("{t}") {
            write!(path, "{:.1}", reading.temperature).map_err(|_| PayloadError::Format)?;
            rest = field;
        } else if let Some(field) = after.strip_prefix("{h}") {
            write!(path, "{:.1}", reading.humidity).map_err(|_| PayloadError::Format)?;
            rest = field;
        } else {
            path.push('{');
            rest = &after[1..];
        }
    }
    path.push_str(rest);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_UPLOAD_PATH;

    #[test]
    fn json_keeps_field_order() {
        let reading = SensorReading::new("E89F6DE8F3BC", 25.5, 60.5);
        assert_eq!(
            reading.to_json().unwrap(),
            "{\"Device\":\"E89F6DE8F3BC\",\"Temperature\":25.5,\"Humidity\":60.5}"
        );
    }

    #[test]
    fn mqtt_payload_is_escaped() {
        let reading = SensorReading::new("AB", 25.5, 60.5);
        let payload = mqtt_payload(&reading).unwrap();
        assert_eq!(
            payload,
            "{\\\"Device\\\":\\\"AB\\\"\\,\\\"Temperature\\\":25.5\\,\\\"Humidity\\\":60.5}"
        );
        let json = reading.to_json().unwrap();
        // eight quotes, two commas
        assert_eq!(payload.len(), json.len() + 10);
    }

    #[test]
    fn non_finite_values_become_null() {
        let reading = SensorReading::new("AB", f32::NAN, 50.5);
        let json = reading.to_json().unwrap();
        assert!(json.contains("\"Temperature\":null"));
    }

    #[test]
    fn oversized_device_is_rejected() {
        let device = "X".repeat(JSON_BUFFER);
        let reading = SensorReading::new(&device, 1.5, 2.5);
        assert_eq!(reading.to_json(), Err(PayloadError::TooLarge(JSON_BUFFER)));
    }

    #[test]
    fn upload_path_substitutes_fields() {
        let reading = SensorReading::new("E89F6DE8F3BC", 25.46, 7.0);
        assert_eq!(
            http_query_path(DEFAULT_UPLOAD_PATH, &reading).unwrap(),
            "/bmduino/dhtdata/dataadd.php?MAC=E89F6DE8F3BC&T=25.5&H=7.0"
        );
    }

    #[test]
    fn upload_path_keeps_unknown_braces() {
        let reading = SensorReading::new("AB", 1.0, 2.0);
        assert_eq!(
            http_query_path("/x?{y}&m={mac}", &reading).unwrap(),
            "/x?{y}&m=AB"
        );
    }
}
