//! Hardware-independent core library for the BMduino kit firmware
//!
//! Everything that does not touch an ESP32 peripheral directly lives here:
//! the AT-command driver for the serial Wi-Fi module, identifier and payload
//! formatting, the sensor node state machine, and the relay and OLED drivers
//! written against `embedded-hal`.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles for the board
//! and for desktop hosts, where the unit tests run.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod at;
pub mod config;
pub mod escape;
pub mod identity;
pub mod model;
pub mod node;
pub mod oled;
pub mod payload;
pub mod relay;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;
