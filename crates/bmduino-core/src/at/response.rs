//! Framing and parsing of module replies
//!
//! Replies are CRLF-terminated lines, except for HTTP bodies and MQTT
//! messages, which carry a byte count and may span several lines.

use alloc::string::String;
use alloc::vec::Vec;

use super::AtError;
use crate::model::{AccessPoint, InboundMessage, NetworkInfo};

const HTTP_PREFIX: &[u8] = b"+HTTPCLIENT:";
const SUBSCRIPTION_PREFIX: &[u8] = b"+MQTTSUBRECV:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    HttpChunk(String),
    Message(InboundMessage),
}

/// Take the next complete frame off the front of `rx`.
///
/// Returns `Ok(None)` while more bytes are needed. A header with a bad
/// length is dropped up to the end of its line before the error is returned.
pub fn take_frame(rx: &mut Vec<u8>) -> Result<Option<Frame>, AtError> {
    let framed = if rx.starts_with(HTTP_PREFIX) {
        Some(take_http_chunk(rx))
    } else if rx.starts_with(SUBSCRIPTION_PREFIX) {
        Some(take_message(rx))
    } else {
        None
    };
    if let Some(result) = framed {
        if result.is_err() {
            discard_line(rx);
        }
        return result;
    }
    // A length-prefixed header may still be arriving.
    if rx.len() < SUBSCRIPTION_PREFIX.len()
        && (HTTP_PREFIX.starts_with(rx.as_slice()) || SUBSCRIPTION_PREFIX.starts_with(rx.as_slice()))
        && !rx.is_empty()
    {
        return Ok(None);
    }

    let Some(end) = find_crlf(rx) else {
        return Ok(None);
    };
    let line = String::from_utf8_lossy(&rx[..end]).into_owned();
    rx.drain(..end + 2);
    Ok(Some(Frame::Line(line)))
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == b"\r\n")
}

fn discard_line(rx: &mut Vec<u8>) {
    match find_crlf(rx) {
        Some(end) => {
            rx.drain(..end + 2);
        }
        None => rx.clear(),
    }
}

/// Parse an unsigned length that ends at the next `,`.
fn length_field(bytes: &[u8], start: usize) -> Result<Option<(usize, usize)>, AtError> {
    if start > bytes.len() {
        return Ok(None);
    }
    let Some(offset) = bytes[start..].iter().position(|&b| b == b',') else {
        if find_crlf(&bytes[start..]).is_some() {
            return Err(AtError::malformed(&String::from_utf8_lossy(bytes)));
        }
        return Ok(None);
    };
    let digits = &bytes[start..start + offset];
    let text = core::str::from_utf8(digits).map_err(|_| AtError::malformed("length"))?;
    let len = text
        .trim()
        .parse::<usize>()
        .map_err(|_| AtError::malformed(text))?;
    Ok(Some((len, start + offset + 1)))
}

/// Consume `len` data bytes at `start` plus a trailing CRLF if present.
fn take_data(rx: &mut Vec<u8>, start: usize, len: usize) -> Option<String> {
    if rx.len() < start + len {
        return None;
    }
    let data = String::from_utf8_lossy(&rx[start..start + len]).into_owned();
    let mut end = start + len;
    if rx[end..].starts_with(b"\r\n") {
        end += 2;
    }
    rx.drain(..end);
    Some(data)
}

// +HTTPCLIENT:<size>,<data>
fn take_http_chunk(rx: &mut Vec<u8>) -> Result<Option<Frame>, AtError> {
    let Some((len, start)) = length_field(rx, HTTP_PREFIX.len())? else {
        return Ok(None);
    };
    Ok(take_data(rx, start, len).map(Frame::HttpChunk))
}

// +MQTTSUBRECV:<link>,"<topic>",<len>,<data>
fn take_message(rx: &mut Vec<u8>) -> Result<Option<Frame>, AtError> {
    let header = &rx[SUBSCRIPTION_PREFIX.len()..];
    let Some(open) = header.iter().position(|&b| b == b'"') else {
        return Ok(None);
    };
    let Some(close) = header[open + 1..].iter().position(|&b| b == b'"') else {
        return Ok(None);
    };
    let topic_start = SUBSCRIPTION_PREFIX.len() + open + 1;
    let topic_end = topic_start + close;
    let topic = String::from_utf8_lossy(&rx[topic_start..topic_end]).into_owned();

    // skip the closing quote and the comma after it
    let Some((len, start)) = length_field(rx, topic_end + 2)? else {
        return Ok(None);
    };
    Ok(take_data(rx, start, len).map(|payload| Frame::Message(InboundMessage { topic, payload })))
}

/// Value of the first quoted field after `prefix`.
pub(crate) fn quoted_after<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    let open = rest.find('"')?;
    let rest = &rest[open + 1..];
    let close = rest.find('"')?;
    Some(&rest[..close])
}

fn copy_into<const N: usize>(text: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// MAC from `+CIPSTAMAC:"e8:9f:6d:e8:f3:bc"`.
pub(crate) fn parse_mac(lines: &[String]) -> Option<&str> {
    lines.iter().find_map(|l| quoted_after(l, "+CIPSTAMAC:"))
}

/// SSID from `+CWJAP:"ssid","bssid",channel,rssi,...`.
pub(crate) fn parse_joined_ssid(lines: &[String]) -> Option<heapless::String<32>> {
    lines
        .iter()
        .find_map(|l| quoted_after(l, "+CWJAP:"))
        .map(copy_into)
}

/// Fill IP, gateway and netmask from `+CIPSTA:<field>:"<value>"` lines.
pub(crate) fn parse_station(lines: &[String], info: &mut NetworkInfo) {
    for line in lines {
        if let Some(ip) = quoted_after(line, "+CIPSTA:ip:") {
            info.ip_address = copy_into(ip);
        } else if let Some(gateway) = quoted_after(line, "+CIPSTA:gateway:") {
            info.gateway = copy_into(gateway);
        } else if let Some(netmask) = quoted_after(line, "+CIPSTA:netmask:") {
            info.netmask = copy_into(netmask);
        }
    }
}

/// Station state from `STATUS:<n>`.
pub(crate) fn parse_status(lines: &[String]) -> Option<u8> {
    lines
        .iter()
        .find_map(|l| l.strip_prefix("STATUS:"))
        .and_then(|n| n.trim().parse().ok())
}

/// `+CWLAP:(<ecn>,"<ssid>",<rssi>,"<mac>",<channel>,...)`
pub(crate) fn parse_access_point(line: &str) -> Option<AccessPoint> {
    let body = line.strip_prefix("+CWLAP:(")?;
    let ssid_start = body.find('"')? + 1;
    let ssid_len = body[ssid_start..].find('"')?;
    let ssid = &body[ssid_start..ssid_start + ssid_len];

    let mut rest = body[ssid_start + ssid_len + 1..].split(',').skip(1);
    let rssi = rest.next()?.trim().parse().ok()?;
    let _mac = rest.next()?;
    let channel = rest.next()?.trim_end_matches(')').trim().parse().ok()?;

    Some(AccessPoint {
        ssid: copy_into(ssid),
        rssi,
        channel,
    })
}
