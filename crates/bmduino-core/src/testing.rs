//! Test doubles for the peripheral seams

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation};

use crate::config::MqttConfig;
use crate::model::{AccessPoint, InboundMessage, NetworkInfo};
use crate::traits::{NetworkLink, TextDisplay};

/// UART that answers each expected command line with a canned reply.
///
/// A line that does not match the next scripted command gets no answer.
pub struct ScriptedUart {
    script: VecDeque<(String, Vec<u8>)>,
    outgoing: Vec<u8>,
    incoming: VecDeque<u8>,
    sent: Vec<String>,
}

impl ScriptedUart {
    pub fn new(script: &[(&str, &str)]) -> Self {
        Self {
            script: script
                .iter()
                .map(|(cmd, reply)| (cmd.to_string(), reply.as_bytes().to_vec()))
                .collect(),
            outgoing: Vec::new(),
            incoming: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    /// Bytes the module sends without being asked.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes.iter().copied());
    }

    pub fn sent(&self) -> &[String] {
        &self.sent
    }
}

impl embedded_io::ErrorType for ScriptedUart {
    type Error = Infallible;
}

impl embedded_io::Write for ScriptedUart {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.outgoing.extend_from_slice(buf);
        while let Some(end) = self.outgoing.windows(2).position(|w| w == b"\r\n") {
            let line = String::from_utf8_lossy(&self.outgoing[..end]).into_owned();
            self.outgoing.drain(..end + 2);
            if self.script.front().is_some_and(|(cmd, _)| *cmd == line) {
                if let Some((_, reply)) = self.script.pop_front() {
                    self.incoming.extend(reply);
                }
            }
            self.sent.push(line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl embedded_io::Read for ScriptedUart {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for ScriptedUart {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.incoming.is_empty())
    }
}

/// Delay that returns at once and adds up what was asked for.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelay {
    pub total_ms: u32,
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_us(&mut self, us: u32) {
        self.total_ms = self.total_ms.saturating_add(us / 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms = self.total_ms.saturating_add(ms);
    }
}

/// Display that remembers every text it was asked to draw.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub drawn: Vec<(u8, u8, String)>,
    pub clears: usize,
    pub flushes: usize,
}

impl RecordingDisplay {
    pub fn texts(&self) -> Vec<&str> {
        self.drawn.iter().map(|(_, _, t)| t.as_str()).collect()
    }
}

impl TextDisplay for RecordingDisplay {
    type Error = Infallible;

    fn clear(&mut self) -> Result<(), Infallible> {
        self.clears += 1;
        self.drawn.clear();
        Ok(())
    }

    fn print_text(&mut self, x: u8, row: u8, text: &str) -> Result<(), Infallible> {
        self.drawn.push((x, row, text.to_string()));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        self.flushes += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct I2cState {
    writes: Vec<(u8, Vec<u8>)>,
    reads: VecDeque<Vec<u8>>,
    absent: bool,
}

/// I2C bus double. Clones share the same log so a test can keep one handle
/// while a driver owns another.
#[derive(Debug, Default, Clone)]
pub struct MockI2c(Rc<RefCell<I2cState>>);

impl MockI2c {
    /// Data returned by the next read, in order.
    pub fn queue_read(&self, bytes: &[u8]) {
        self.0.borrow_mut().reads.push_back(bytes.to_vec());
    }

    /// Every device NACKs its address from now on.
    pub fn unplug(&self) {
        self.0.borrow_mut().absent = true;
    }

    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.0.borrow().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.0.borrow_mut().writes.clear();
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl i2c::I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if state.absent {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => state.writes.push((address, bytes.to_vec())),
                Operation::Read(buf) => {
                    let data = state.reads.pop_front().unwrap_or_default();
                    for (slot, byte) in buf.iter_mut().zip(data.iter().chain(core::iter::repeat(&0))) {
                        *slot = *byte;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Network link double with switchable failures.
#[derive(Debug, Default)]
pub struct FakeLink {
    pub mac: String,
    pub join_fails: bool,
    /// Number of broker connects that fail before one succeeds.
    pub mqtt_failures: u8,
    pub publish_fails: bool,
    pub http_body: String,
    pub connected: bool,
    pub joins: usize,
    pub mqtt_connects: Vec<String>,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, String)>,
    pub requests: Vec<String>,
    pub inbox: VecDeque<InboundMessage>,
}

impl FakeLink {
    pub fn new(mac: &str) -> Self {
        Self {
            mac: mac.to_string(),
            ..Self::default()
        }
    }
}

impl NetworkLink for FakeLink {
    type Error = &'static str;

    fn connect(&mut self, _ssid: &str, _password: &str) -> Result<(), Self::Error> {
        self.joins += 1;
        if self.join_fails {
            return Err("join failed");
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn mac_address(&mut self) -> Result<String, Self::Error> {
        Ok(self.mac.clone())
    }

    fn network_info(&mut self) -> Result<NetworkInfo, Self::Error> {
        Ok(NetworkInfo::default())
    }

    fn scan(&mut self) -> Result<Vec<AccessPoint>, Self::Error> {
        Ok(Vec::new())
    }

    fn http_get(&mut self, server_url: &str, port: u16, path: &str) -> Result<String, Self::Error> {
        if !self.connected {
            return Err("not connected");
        }
        self.requests.push(alloc::format!("{}:{}{}", server_url, port, path));
        Ok(self.http_body.clone())
    }

    fn mqtt_connect(&mut self, _broker: &MqttConfig<'_>, client_id: &str) -> Result<(), Self::Error> {
        self.mqtt_connects.push(client_id.to_string());
        if self.mqtt_failures > 0 {
            self.mqtt_failures -= 1;
            return Err("broker refused");
        }
        Ok(())
    }

    fn mqtt_subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn mqtt_publish(&mut self, topic: &str, payload: &str) -> Result<(), Self::Error> {
        if self.publish_fails {
            return Err("publish failed");
        }
        self.published.push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    fn mqtt_poll(&mut self) -> Result<Option<InboundMessage>, Self::Error> {
        Ok(self.inbox.pop_front())
    }
}
