//! Driver for the serial Wi-Fi module
//!
//! The module runs Espressif AT firmware and is reached over a UART. Station
//! management, MQTT and HTTP all happen inside the module; this driver only
//! formats commands and reads back the line-oriented replies.

mod command;
mod module;
mod response;

pub use command::AtCommand;
pub use module::{AtModule, Reply};
pub use response::{Frame, take_frame};

use thiserror_no_std::Error;

/// Default wait for a reply.
pub const DEFAULT_TIMEOUT_MS: u32 = 2_000;
/// Joining an access point can take a while.
pub const JOIN_TIMEOUT_MS: u32 = 20_000;
pub const SCAN_TIMEOUT_MS: u32 = 10_000;
pub const MQTT_TIMEOUT_MS: u32 = 10_000;
pub const HTTP_TIMEOUT_MS: u32 = 10_000;
/// Settle time after `AT+RST` before the module accepts commands.
pub const RESET_SETTLE_MS: u32 = 1_000;

/// Bytes buffered while waiting for a terminal line.
pub const RX_CAPACITY: usize = 2_048;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtError {
    #[error("serial I/O error: {0:?}")]
    Io(embedded_io::ErrorKind),
    #[error("no reply within {0} ms")]
    Timeout(u32),
    #[error("module answered ERROR")]
    Rejected,
    #[error("module answered FAIL")]
    Failed,
    #[error("reply exceeds {0} bytes")]
    Overflow(usize),
    #[error("unexpected reply: {0}")]
    Malformed(heapless::String<48>),
    #[error("not connected to an access point")]
    NotConnected,
}

impl AtError {
    pub(crate) fn malformed(text: &str) -> Self {
        let mut shown = heapless::String::<48>::new();
        for c in text.chars() {
            if shown.push(c).is_err() {
                break;
            }
        }
        Self::Malformed(shown)
    }
}
