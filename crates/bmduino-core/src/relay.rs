//! I2C relay board and the text commands that drive it
//!
//! The BMP75M131 board answers on a single I2C address and exposes its
//! relays through a small register map. Relays are numbered from 1.

use alloc::format;
use alloc::string::String;
use core::fmt::{Display, Write as _};

use embedded_hal::i2c::I2c;
use log::{debug, info, warn};
use thiserror_no_std::Error;

use crate::traits::{MAX_RELAYS, RelayBoard, TextDisplay, show_message};

pub const DEFAULT_ADDRESS: u8 = 0x13;

// Register map
const REG_SWITCH: u8 = 0x01;
const REG_ALL: u8 = 0x02;
const REG_STATUS: u8 = 0x03;
const REG_ALL_STATUS: u8 = 0x04;
const REG_COUNT: u8 = 0x05;

/// Display row for the relay number.
pub const RELAY_ROW: u8 = 4;
/// Display row for the last command.
pub const COMMAND_ROW: u8 = 6;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError<E> {
    #[error("I2C bus error: {0:?}")]
    Bus(E),
    #[error("no relay board answered")]
    NotFound,
    #[error("relay {relay} out of range 1..={count}")]
    OutOfRange { relay: u8, count: u8 },
}

/// BMP75M131 relay board
pub struct Bmp75m131<I2C> {
    i2c: I2C,
    address: u8,
    count: u8,
}

impl<I2C: I2c> Bmp75m131<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            count: 0,
        }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn check(&self, relay: u8) -> Result<(), RelayError<I2C::Error>> {
        if relay == 0 || relay > self.count {
            return Err(RelayError::OutOfRange {
                relay,
                count: self.count,
            });
        }
        Ok(())
    }
}

impl<I2C: I2c> RelayBoard for Bmp75m131<I2C> {
    type Error = RelayError<I2C::Error>;

    fn begin(&mut self) -> Result<u8, Self::Error> {
        let mut count = [0u8];
        self.i2c
            .write_read(self.address, &[REG_COUNT], &mut count)
            .map_err(RelayError::Bus)?;
        if count[0] == 0 {
            return Err(RelayError::NotFound);
        }
        self.count = count[0].min(MAX_RELAYS as u8);
        info!("Total Relay Amount is :({})", self.count);
        Ok(self.count)
    }

    fn relay_count(&self) -> u8 {
        self.count
    }

    fn set_relay(&mut self, relay: u8, on: bool) -> Result<(), Self::Error> {
        self.check(relay)?;
        self.i2c
            .write(self.address, &[REG_SWITCH, relay, on as u8])
            .map_err(RelayError::Bus)?;
        info!("Relay({}): is {}", relay, if on { "on" } else { "off" });
        Ok(())
    }

    fn set_all(&mut self, on: bool) -> Result<(), Self::Error> {
        self.i2c
            .write(self.address, &[REG_ALL, on as u8])
            .map_err(RelayError::Bus)
    }

    fn relay_status(&mut self, relay: u8) -> Result<bool, Self::Error> {
        self.check(relay)?;
        let mut state = [0u8];
        self.i2c
            .write_read(self.address, &[REG_STATUS, relay], &mut state)
            .map_err(RelayError::Bus)?;
        Ok(state[0] != 0)
    }

    fn all_status(&mut self) -> Result<heapless::Vec<bool, MAX_RELAYS>, Self::Error> {
        let mut raw = [0u8; MAX_RELAYS];
        let raw = &mut raw[..self.count as usize];
        self.i2c
            .write_read(self.address, &[REG_ALL_STATUS], raw)
            .map_err(RelayError::Bus)?;
        Ok(raw.iter().map(|&b| b != 0).collect())
    }
}

/// A command received over MQTT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    On(u8),
    Off(u8),
    AllOn,
    AllOff,
    Status,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown relay command: {0}")]
pub struct UnknownCommand(pub heapless::String<32>);

impl RelayCommand {
    /// Parse `ON:<n>`, `OFF:<n>`, `ALLON`, `ALLOFF` or `STATUS`, ignoring case.
    pub fn parse(text: &str) -> Result<Self, UnknownCommand> {
        let text = text.trim();
        let unknown = || {
            let mut shown = heapless::String::new();
            for c in text.chars() {
                if shown.push(c).is_err() {
                    break;
                }
            }
            UnknownCommand(shown)
        };

        let (verb, arg) = match text.split_once(':') {
            Some((verb, arg)) => (verb.trim(), Some(arg.trim())),
            None => (text, None),
        };
        let relay = || {
            arg.and_then(|n| n.parse::<u8>().ok())
                .ok_or_else(unknown)
        };

        if verb.eq_ignore_ascii_case("ON") {
            Ok(Self::On(relay()?))
        } else if verb.eq_ignore_ascii_case("OFF") {
            Ok(Self::Off(relay()?))
        } else if arg.is_none() && verb.eq_ignore_ascii_case("ALLON") {
            Ok(Self::AllOn)
        } else if arg.is_none() && verb.eq_ignore_ascii_case("ALLOFF") {
            Ok(Self::AllOff)
        } else if arg.is_none() && verb.eq_ignore_ascii_case("STATUS") {
            Ok(Self::Status)
        } else {
            Err(unknown())
        }
    }
}

impl Display for RelayCommand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::On(n) => write!(f, "ON:{}", n),
            Self::Off(n) => write!(f, "OFF:{}", n),
            Self::AllOn => f.write_str("ALLON"),
            Self::AllOff => f.write_str("ALLOFF"),
            Self::Status => f.write_str("STATUS"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError<E> {
    #[error("relay board: {0}")]
    Board(E),
    #[error("{0}")]
    Command(UnknownCommand),
}

/// Show the relay number on its display row.
pub fn show_relay_number<D: TextDisplay>(display: &mut D, relay: u8) -> Result<(), D::Error> {
    show_message(display, &format!("Relay:({})", relay), RELAY_ROW)
}

/// Show a command on its display row.
pub fn show_command<D: TextDisplay>(display: &mut D, command: &str) -> Result<(), D::Error> {
    show_message(display, command, COMMAND_ROW)
}

/// Applies commands to a relay board and reports the result.
pub struct RelayController<B> {
    board: B,
}

impl<B: RelayBoard> RelayController<B> {
    pub fn new(board: B) -> Self {
        Self { board }
    }

    pub fn board(&mut self) -> &mut B {
        &mut self.board
    }

    /// Run `command` and return a one-line report of the outcome.
    pub fn apply(&mut self, command: RelayCommand) -> Result<String, B::Error> {
        match command {
            RelayCommand::On(n) => {
                self.board.set_relay(n, true)?;
                Ok(format!("Relay({}): is on", n))
            }
            RelayCommand::Off(n) => {
                self.board.set_relay(n, false)?;
                Ok(format!("Relay({}): is off", n))
            }
            RelayCommand::AllOn => {
                self.board.set_all(true)?;
                Ok(String::from("All relays on"))
            }
            RelayCommand::AllOff => {
                self.board.set_all(false)?;
                Ok(String::from("All relays off"))
            }
            RelayCommand::Status => {
                let states = self.board.all_status()?;
                let mut report = String::new();
                for (i, on) in states.iter().enumerate() {
                    if i > 0 {
                        report.push(' ');
                    }
                    // writing to a String cannot fail
                    let _ = write!(report, "{}:{}", i + 1, if *on { "ON" } else { "OFF" });
                }
                Ok(report)
            }
        }
    }

    /// Parse and apply a message payload, echoing it on the display.
    ///
    /// Display failures are logged and do not abort the command.
    pub fn handle<D: TextDisplay>(
        &mut self,
        payload: &str,
        display: &mut D,
    ) -> Result<String, ControlError<B::Error>> {
        let command = RelayCommand::parse(payload).map_err(|e| {
            debug!("{}", e);
            ControlError::Command(e)
        })?;
        info!("Relay command {}", command);

        if let Err(e) = show_command(display, &format!("{}", command)) {
            warn!("display: {:?}", e);
        }
        if let RelayCommand::On(n) | RelayCommand::Off(n) = command {
            if let Err(e) = show_relay_number(display, n) {
                warn!("display: {:?}", e);
            }
        }
        self.apply(command).map_err(ControlError::Board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockI2c, RecordingDisplay};
    use crate::traits::ROW_BLANK;
    use embedded_hal::i2c::ErrorKind;

    fn board(count: u8) -> (Bmp75m131<MockI2c>, MockI2c) {
        let bus = MockI2c::default();
        bus.queue_read(&[count]);
        let mut relay = Bmp75m131::new(bus.clone());
        relay.begin().unwrap();
        bus.clear_writes();
        (relay, bus)
    }

    #[test]
    fn begin_reads_relay_count() {
        let (relay, _) = board(4);
        assert_eq!(relay.relay_count(), 4);

        let (relay, _) = board(40);
        assert_eq!(relay.relay_count(), 16);
    }

    #[test]
    fn begin_without_board() {
        let bus = MockI2c::default();
        bus.queue_read(&[0]);
        assert_eq!(Bmp75m131::new(bus.clone()).begin(), Err(RelayError::NotFound));

        bus.unplug();
        assert!(matches!(
            Bmp75m131::new(bus).begin(),
            Err(RelayError::Bus(ErrorKind::NoAcknowledge(_)))
        ));
    }

    #[test]
    fn switching_writes_registers() {
        let (mut relay, bus) = board(4);
        relay.set_relay(2, true).unwrap();
        relay.set_relay(2, false).unwrap();
        relay.set_all(true).unwrap();
        assert_eq!(
            bus.writes(),
            vec![
                (DEFAULT_ADDRESS, vec![REG_SWITCH, 2, 1]),
                (DEFAULT_ADDRESS, vec![REG_SWITCH, 2, 0]),
                (DEFAULT_ADDRESS, vec![REG_ALL, 1]),
            ]
        );
    }

    #[test]
    fn indices_are_bounds_checked() {
        let (mut relay, bus) = board(4);
        assert_eq!(
            relay.set_relay(0, true),
            Err(RelayError::OutOfRange { relay: 0, count: 4 })
        );
        assert_eq!(
            relay.relay_status(5),
            Err(RelayError::OutOfRange { relay: 5, count: 4 })
        );
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn reads_status() {
        let (mut relay, bus) = board(4);
        bus.queue_read(&[1]);
        assert!(relay.relay_status(3).unwrap());
        bus.queue_read(&[1, 0, 0, 1]);
        assert_eq!(relay.all_status().unwrap().as_slice(), &[true, false, false, true]);
    }

    #[test]
    fn parses_commands() {
        assert_eq!(RelayCommand::parse("ON:1"), Ok(RelayCommand::On(1)));
        assert_eq!(RelayCommand::parse(" off : 12 "), Ok(RelayCommand::Off(12)));
        assert_eq!(RelayCommand::parse("allon"), Ok(RelayCommand::AllOn));
        assert_eq!(RelayCommand::parse("ALLOFF"), Ok(RelayCommand::AllOff));
        assert_eq!(RelayCommand::parse("Status"), Ok(RelayCommand::Status));
        assert!(RelayCommand::parse("ON").is_err());
        assert!(RelayCommand::parse("ON:x").is_err());
        assert!(RelayCommand::parse("STATUS:1").is_err());
        assert!(RelayCommand::parse("Relay(1): is on").is_err());
    }

    #[test]
    fn controller_reports_and_displays() {
        let (relay, bus) = board(2);
        let mut controller = RelayController::new(relay);
        let mut display = RecordingDisplay::default();

        let report = controller.handle("on:2", &mut display).unwrap();
        assert_eq!(report, "Relay(2): is on");
        assert_eq!(
            display.texts(),
            vec![ROW_BLANK, "ON:2", ROW_BLANK, "Relay:(2)"]
        );
        assert_eq!(display.drawn[1].1, COMMAND_ROW);
        assert_eq!(display.drawn[3].1, RELAY_ROW);

        bus.queue_read(&[0, 1]);
        assert_eq!(
            controller.apply(RelayCommand::Status).unwrap(),
            "1:OFF 2:ON"
        );
    }

    #[test]
    fn controller_rejects_garbage() {
        let (relay, bus) = board(2);
        let mut controller = RelayController::new(relay);
        let mut display = RecordingDisplay::default();
        assert!(matches!(
            controller.handle("hello", &mut display),
            Err(ControlError::Command(_))
        ));
        assert!(matches!(
            controller.handle("ON:9", &mut display),
            Err(ControlError::Board(RelayError::OutOfRange { relay: 9, count: 2 }))
        ));
        assert!(bus.writes().is_empty());
    }
}
