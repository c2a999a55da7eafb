//! Board support for the BMduino kit on an ESP32-S3
//!
//! Pin map:
//! - LED "D8" => GPIO8
//! - Climate sensor (BME280) on I2C0 => SDA GPIO4, SCL GPIO5
//! - Relay board and OLED share I2C1 => SDA GPIO2, SCL GPIO1
//! - Wi-Fi module UART1 at 115200 baud => TX GPIO17, RX GPIO18

#![no_std]

pub mod config;
pub mod display;
pub mod hardware;
