//! Status register and bus load readings.
use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// CAN controller status register. Bits not listed here are retained as read from the driver.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Status: u8 {
        /// Controller is stopped
        const RESET = 0x80;
        const BUS_OFF = 0x40;
        const WARNING = 0x20;
        const BUS_ERROR = 0x10;
        const TX_BUSY = 0x08;
        const RX_EMPTY = 0x04;
        const MSG_LOST = 0x02;
        const QUEUE_OVERRUN = 0x01;
    }
}

impl Status {
    /// Wraps a raw status byte, keeping every bit.
    pub fn from_byte(byte: u8) -> Status {
        Status::from_bits_retain(byte)
    }

    pub fn is_running(&self) -> bool {
        !self.contains(Status::RESET)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.bits())
    }
}

/// Bus load together with the status register at the time of the reading.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Busload {
    /// Between 0 and 1, where 0 is 0% and 1 is 100% bus load.
    pub load: f64,
    pub status: Status,
}

impl Busload {
    /// Converts the percentage reported by the driver. Values above 100 are read as 100.
    pub fn from_percent(percent: u8, status: u8) -> Busload {
        Busload {
            load: percent.min(100) as f64 / 100.0,
            status: Status::from_byte(status),
        }
    }
}
