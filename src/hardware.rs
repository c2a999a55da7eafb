use core::cell::RefCell;

use bme280::i2c::BME280;
use bmduino_core::{at::AtModule, model::Climate, traits::ClimateSensor};
use embedded_hal_bus::i2c::RefCellDevice;
use esp_hal::{
    Blocking,
    delay::Delay,
    gpio::{AnyPin, Level, Output, OutputConfig},
    i2c::master::{Config as I2cConfig, Error as I2cError, I2c},
    peripherals::{I2C0, I2C1, UART1},
    time::Rate,
    uart::{Config as UartConfig, Uart},
};
use static_cell::StaticCell;

const WIFI_BAUD_RATE: u32 = 115_200;
const SENSOR_I2C_KHZ: u32 = 100;
const SHARED_I2C_KHZ: u32 = 400;

pub type Bus = I2c<'static, Blocking>;
/// Handle to the I2C1 bus shared by the relay board and the OLED.
pub type SharedI2c = RefCellDevice<'static, Bus>;
pub type WifiModule = AtModule<WifiSerial<'static>, Delay>;

static SHARED_BUS: StaticCell<RefCell<Bus>> = StaticCell::new();

/// Bring up I2C1. Hand out devices with `RefCellDevice::new(bus)`.
pub fn shared_bus<SDA, SCL>(i2c_periph: I2C1<'static>, sda: SDA, scl: SCL) -> &'static RefCell<Bus>
where
    SDA: Into<AnyPin<'static>>,
    SCL: Into<AnyPin<'static>>,
{
    let i2c = I2c::new(
        i2c_periph,
        I2cConfig::default().with_frequency(Rate::from_khz(SHARED_I2C_KHZ)),
    )
    .unwrap()
    .with_sda(sda.into())
    .with_scl(scl.into());

    SHARED_BUS.init(RefCell::new(i2c))
}

/// UART to the Wi-Fi module, exposed through `embedded-io`.
pub struct WifiSerial<'a> {
    uart: Uart<'a, Blocking>,
}

impl<'a> WifiSerial<'a> {
    pub fn new<TX, RX>(uart_periph: UART1<'a>, tx: TX, rx: RX) -> Self
    where
        TX: Into<AnyPin<'a>>,
        RX: Into<AnyPin<'a>>,
    {
        let uart = Uart::new(
            uart_periph,
            UartConfig::default().with_baudrate(WIFI_BAUD_RATE),
        )
        .unwrap()
        .with_tx(tx.into())
        .with_rx(rx.into());

        Self { uart }
    }
}

impl embedded_io::ErrorType for WifiSerial<'_> {
    type Error = embedded_io::ErrorKind;
}

impl embedded_io::Read for WifiSerial<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.uart
            .read(buf)
            .map_err(|_| embedded_io::ErrorKind::Other)
    }
}

impl embedded_io::ReadReady for WifiSerial<'_> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.uart.read_ready())
    }
}

impl embedded_io::Write for WifiSerial<'_> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.uart
            .write(buf)
            .map_err(|_| embedded_io::ErrorKind::Other)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.uart
            .flush()
            .map_err(|_| embedded_io::ErrorKind::Other)
    }
}

/// AT driver on UART1.
pub fn wifi_module<TX, RX>(uart_periph: UART1<'static>, tx: TX, rx: RX) -> WifiModule
where
    TX: Into<AnyPin<'static>>,
    RX: Into<AnyPin<'static>>,
{
    AtModule::new(WifiSerial::new(uart_periph, tx, rx), Delay::new())
}

/// BME280 temperature/humidity sensor on I2C0.
pub struct ClimateHardware<'a> {
    sensor: BME280<I2c<'a, Blocking>>,
    delay: Delay,
}

impl<'a> ClimateHardware<'a> {
    pub fn new<SDA, SCL>(i2c_periph: I2C0<'a>, sda: SDA, scl: SCL) -> Self
    where
        SDA: Into<AnyPin<'a>>,
        SCL: Into<AnyPin<'a>>,
    {
        let i2c = I2c::new(
            i2c_periph,
            I2cConfig::default().with_frequency(Rate::from_khz(SENSOR_I2C_KHZ)),
        )
        .unwrap()
        .with_sda(sda.into())
        .with_scl(scl.into());

        // 0x76
        let sensor = BME280::new_primary(i2c);

        Self {
            sensor,
            delay: Delay::new(),
        }
    }
}

impl ClimateSensor for ClimateHardware<'_> {
    type Error = bme280::Error<I2cError>;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.sensor.init(&mut self.delay)?;
        log::info!("[BME280] Initialized");
        Ok(())
    }

    fn read(&mut self) -> Result<Climate, Self::Error> {
        let measurement = self.sensor.measure(&mut self.delay)?;
        Ok(Climate {
            temperature: measurement.temperature,
            humidity: measurement.humidity,
        })
    }
}

/// The "D8" LED.
pub struct Led<'a> {
    pin: Output<'a>,
}

impl<'a> Led<'a> {
    pub fn new<PIN: Into<AnyPin<'a>>>(pin: PIN) -> Self {
        Self {
            pin: Output::new(pin.into(), Level::Low, OutputConfig::default()),
        }
    }

    pub fn set(&mut self, on: bool) {
        self.pin.set_level(if on { Level::High } else { Level::Low });
    }

    pub fn toggle(&mut self) {
        self.pin.toggle();
    }
}
