use alloc::string::String;
use core::fmt::{Display, Write};

use crate::escape::escape_at_argument;

/// An AT command line being assembled.
///
/// Arguments are appended in order; the first is introduced by `=`, the
/// rest by `,`. String arguments are quoted and escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommand {
    text: String,
    has_args: bool,
}

impl AtCommand {
    /// `AT+<name>` with no arguments yet. An empty name gives plain `AT`.
    pub fn new(name: &str) -> Self {
        let mut text = String::with_capacity(32);
        text.push_str("AT");
        if !name.is_empty() {
            text.push('+');
            text.push_str(name);
        }
        Self {
            text,
            has_args: false,
        }
    }

    /// `AT+<name>?`
    pub fn query(name: &str) -> Self {
        let mut command = Self::new(name);
        command.text.push('?');
        command
    }

    /// A command sent exactly as written, such as `ATE0`.
    pub fn raw(text: &str) -> Self {
        Self {
            text: String::from(text),
            has_args: false,
        }
    }

    fn separator(&mut self) {
        self.text.push(if self.has_args { ',' } else { '=' });
        self.has_args = true;
    }

    pub fn int(mut self, value: impl Display) -> Self {
        self.separator();
        // writing to a String cannot fail
        let _ = write!(self.text, "{}", value);
        self
    }

    /// Quoted string argument, escaped for the module.
    pub fn string(mut self, value: &str) -> Self {
        self.separator();
        self.text.push('"');
        self.text.push_str(&escape_at_argument(value));
        self.text.push('"');
        self
    }

    /// Quoted string argument that the caller already escaped.
    pub fn escaped(mut self, value: &str) -> Self {
        self.separator();
        self.text.push('"');
        self.text.push_str(value);
        self.text.push('"');
        self
    }

    /// Skip an optional argument.
    pub fn empty(mut self) -> Self {
        self.separator();
        self
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}
