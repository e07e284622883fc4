//! Wire format of the Vallox RS485 bus.
//!
//! Every telegram is exactly six bytes:
//!
//! ```text
//! [domain=0x01][sender][receiver][command][argument][checksum]
//! ```
//!
//! The checksum is the sum of the five preceding bytes modulo 256.

use crate::conversion::byte_to_hex;
use crate::error::FrameError;
use crate::Error;
use std::fmt;

pub const LENGTH: usize = 6;
pub const DOMAIN: u8 = 0x01;

/// Bus addresses of the ventilation unit and its control panels.
pub mod address {
    pub const ALL_MASTERS: u8 = 0x10;
    pub const MASTER: u8 = 0x11;
    pub const ALL_PANELS: u8 = 0x20;
    pub const PANEL1: u8 = 0x21;
    pub const PANEL2: u8 = 0x22;
    pub const PANEL3: u8 = 0x23;
    pub const PANEL4: u8 = 0x24;
    pub const PANEL5: u8 = 0x25;
    pub const PANEL6: u8 = 0x26;
    pub const PANEL7: u8 = 0x27;
    pub const PANEL8: u8 = 0x28;
}

macro_rules! variables {
    ($($(#[$meta:meta])* $name:ident = $code:literal,)*) => {
        /// Command byte of a telegram, naming the quantity carried by the argument.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Variable {
            $($(#[$meta])* $name,)*
            /// Any command byte without a known meaning.
            Unknown(u8),
        }

        impl Variable {
            pub fn code(self) -> u8 {
                match self {
                    $(Variable::$name => $code,)*
                    Variable::Unknown(code) => code,
                }
            }
        }

        impl From<u8> for Variable {
            fn from(code: u8) -> Self {
                match code {
                    $($code => Variable::$name,)*
                    other => Variable::Unknown(other),
                }
            }
        }
    };
}

variables! {
    /// Poll request, the argument names the requested variable.
    Poll = 0x00,
    IoPortFanSpeedRelays = 0x06,
    IoPortMultiPurpose1 = 0x07,
    IoPortMultiPurpose2 = 0x08,
    FanSpeed = 0x29,
    Humidity = 0x2A,
    Co2High = 0x2B,
    Co2Low = 0x2C,
    InstalledCo2Sensors = 0x2D,
    CurrentIncoming = 0x2E,
    HumiditySensor1 = 0x2F,
    HumiditySensor2 = 0x30,
    TempOutside = 0x32,
    TempExhaust = 0x33,
    TempInside = 0x34,
    TempIncoming = 0x35,
    LastErrorNumber = 0x36,
    PostHeatingOnCounter = 0x55,
    PostHeatingOffTime = 0x56,
    PostHeatingTargetValue = 0x57,
    Flags1 = 0x6C,
    Flags2 = 0x6D,
    Flags3 = 0x6E,
    Flags4 = 0x6F,
    Flags5 = 0x70,
    Flags6 = 0x71,
    FirePlaceBoosterCounter = 0x79,
    /// End of a CO2 sensor exchange, transmitting is allowed again.
    Resume = 0x8F,
    /// Start of a CO2 sensor exchange, no transmission allowed.
    Suspend = 0x91,
    Select = 0xA3,
    HeatingSetPoint = 0xA4,
    FanSpeedMax = 0xA5,
    ServiceReminder = 0xA6,
    PreHeatingSetPoint = 0xA7,
    InputFanStop = 0xA8,
    FanSpeedMin = 0xA9,
    Program = 0xAA,
    MaintenanceMonthCounter = 0xAB,
    BasicHumidityLevel = 0xAE,
    HrcBypass = 0xAF,
    DcFanInputAdjustment = 0xB0,
    DcFanOutputAdjustment = 0xB1,
    CellDefrosting = 0xB2,
    Co2SetPointUpper = 0xB3,
    Co2SetPointLower = 0xB4,
    Program2 = 0xB5,
}

/// Sum of all bytes but the last one, modulo 256.
pub fn calc_checksum(buffer: &[u8]) -> u8 {
    let mut checksum: u8 = 0;
    let slice = &buffer[0..buffer.len() - 1];
    for b in slice {
        checksum = checksum.wrapping_add(*b);
    }
    checksum
}

fn validate_len(buffer: &[u8]) -> Result<(), Error> {
    if buffer.len() < LENGTH {
        return Err(Error::InsufficientData {
            available: buffer.len(),
            required: LENGTH,
        });
    }
    Ok(())
}

fn validate_domain(buffer: &[u8]) -> Result<(), Error> {
    if buffer[0] != DOMAIN {
        return Err(FrameError::Domain(buffer[0]).into());
    }
    Ok(())
}

fn validate_checksum(buffer: &[u8]) -> Result<(), Error> {
    let checksum = calc_checksum(buffer);
    if buffer[buffer.len() - 1] != checksum {
        return Err(FrameError::CheckSum {
            calculated: checksum,
            received: buffer[buffer.len() - 1],
        }
        .into());
    }
    Ok(())
}

/// One telegram as seen on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telegram {
    pub sender: u8,
    pub receiver: u8,
    pub command: u8,
    pub argument: u8,
}

impl Telegram {
    pub fn new(sender: u8, receiver: u8, command: u8, argument: u8) -> Self {
        Self {
            sender,
            receiver,
            command,
            argument,
        }
    }

    pub fn variable(&self) -> Variable {
        Variable::from(self.command)
    }

    /// Parses the first [`LENGTH`] bytes of `rx_buffer`.
    ///
    /// Checks length, domain byte and checksum but not the recipient, see
    /// [`Addressing::decode`].
    pub fn decode(rx_buffer: &[u8]) -> Result<Self, Error> {
        validate_len(rx_buffer)?;
        let frame = &rx_buffer[..LENGTH];
        validate_domain(frame)?;
        validate_checksum(frame)?;
        Ok(Self::new(frame[1], frame[2], frame[3], frame[4]))
    }

    pub fn encode(&self) -> [u8; LENGTH] {
        let mut tx_buffer = [
            DOMAIN,
            self.sender,
            self.receiver,
            self.command,
            self.argument,
            0,
        ];
        tx_buffer[LENGTH - 1] = calc_checksum(&tx_buffer);
        tx_buffer
    }
}

impl fmt::Display for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Telegram [sender={}, receiver={}, command={}, arg={}, variable={:?}]",
            byte_to_hex(self.sender),
            byte_to_hex(self.receiver),
            byte_to_hex(self.command),
            byte_to_hex(self.argument),
            self.variable()
        )
    }
}

/// Our own identity on the bus.
///
/// We transmit in the name of `sender_id` and accept telegrams addressed to
/// `receiver_id`, to ourselves or to all panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addressing {
    pub sender_id: u8,
    pub receiver_id: u8,
}

impl Default for Addressing {
    fn default() -> Self {
        Self {
            sender_id: address::PANEL8,
            receiver_id: address::PANEL1,
        }
    }
}

impl Addressing {
    pub fn accepts(&self, receiver: u8) -> bool {
        receiver == self.receiver_id || receiver == self.sender_id || receiver == address::ALL_PANELS
    }

    pub fn filter(&self, telegram: Telegram) -> Result<Telegram, Error> {
        if self.accepts(telegram.receiver) {
            Ok(telegram)
        } else {
            Err(Error::WrongRecipient(telegram))
        }
    }

    /// Full receive path validation: length, domain, checksum and recipient.
    pub fn decode(&self, rx_buffer: &[u8]) -> Result<Telegram, Error> {
        self.filter(Telegram::decode(rx_buffer)?)
    }

    pub fn request(&self, variable: Variable, value: u8, destination: u8) -> [u8; LENGTH] {
        Telegram::new(self.sender_id, destination, variable.code(), value).encode()
    }

    /// Request addressed to the master unit.
    pub fn request_master(&self, variable: Variable, value: u8) -> [u8; LENGTH] {
        self.request(variable, value, address::MASTER)
    }

    pub fn poll_request(&self, variable: Variable) -> [u8; LENGTH] {
        self.request_master(Variable::Poll, variable.code())
    }
}
