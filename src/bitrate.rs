//! Predefined CAN 2.0 bit rates and their bit-timing register settings.
//!
//! Only the eight rates listed in [`Bitrate`] are supported. There is no bit-timing
//! calculation for other rates; [`Bitrate::resolve`] rejects them with [`Error::Baudrate`].

use strum_macros::{EnumIter, FromRepr};

use crate::error::Error;

/// CAN controller clock of the TouCAN interface in Hz.
pub const TOUCAN_CLOCK: i32 = 50_000_000;

const CAN_SYNC_SEG: u32 = 1;

/// Nominal bit rate. The discriminant is the CAN API bit-rate index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromRepr, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum Bitrate {
    Rate1M = 0,
    Rate500K = -2,
    Rate250K = -3,
    Rate125K = -4,
    Rate100K = -5,
    Rate50K = -6,
    Rate20K = -7,
    Rate10K = -8,
}

/// Bit-timing register set realizing a nominal bit rate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BitTiming {
    /// Controller clock in Hz
    pub frequency: i32,
    pub brp: u16,
    pub tseg1: u16,
    pub tseg2: u16,
    pub sjw: u16,
    /// Triple sampling
    pub sam: u8,
}

impl BitTiming {
    const fn nominal(brp: u16, tseg1: u16, tseg2: u16, sjw: u16) -> Self {
        BitTiming {
            frequency: TOUCAN_CLOCK,
            brp,
            tseg1,
            tseg2,
            sjw,
            sam: 0,
        }
    }

    /// Duration of one bit in time quanta.
    pub fn bit_time_tq(&self) -> u32 {
        CAN_SYNC_SEG + self.tseg1 as u32 + self.tseg2 as u32
    }

    /// Bit rate in bits per second produced by these registers.
    pub fn bitrate(&self) -> u32 {
        self.frequency as u32 / (self.brp as u32 * self.bit_time_tq())
    }

    /// Sample point between 0 and 1.
    pub fn sample_point(&self) -> f32 {
        (CAN_SYNC_SEG + self.tseg1 as u32) as f32 / self.bit_time_tq() as f32
    }
}

impl Bitrate {
    /// Resolves a nominal bit rate in bits per second. No nearest-rate fallback is performed.
    pub fn resolve(nominal: i64) -> Result<Bitrate, Error> {
        match nominal {
            1_000_000 => Ok(Bitrate::Rate1M),
            500_000 => Ok(Bitrate::Rate500K),
            250_000 => Ok(Bitrate::Rate250K),
            125_000 => Ok(Bitrate::Rate125K),
            100_000 => Ok(Bitrate::Rate100K),
            50_000 => Ok(Bitrate::Rate50K),
            20_000 => Ok(Bitrate::Rate20K),
            10_000 => Ok(Bitrate::Rate10K),
            _ => Err(Error::Baudrate),
        }
    }

    /// Nominal bit rate in bits per second.
    pub fn bits_per_second(&self) -> u32 {
        match self {
            Bitrate::Rate1M => 1_000_000,
            Bitrate::Rate500K => 500_000,
            Bitrate::Rate250K => 250_000,
            Bitrate::Rate125K => 125_000,
            Bitrate::Rate100K => 100_000,
            Bitrate::Rate50K => 50_000,
            Bitrate::Rate20K => 20_000,
            Bitrate::Rate10K => 10_000,
        }
    }

    /// CAN API bit-rate index.
    pub fn index(&self) -> i32 {
        *self as i32
    }

    pub fn timing(&self) -> BitTiming {
        match self {
            Bitrate::Rate1M => BitTiming::nominal(5, 7, 2, 2),
            Bitrate::Rate500K => BitTiming::nominal(5, 14, 5, 4),
            Bitrate::Rate250K => BitTiming::nominal(10, 14, 5, 4),
            Bitrate::Rate125K => BitTiming::nominal(20, 14, 5, 4),
            Bitrate::Rate100K => BitTiming::nominal(25, 14, 5, 4),
            Bitrate::Rate50K => BitTiming::nominal(50, 14, 5, 4),
            Bitrate::Rate20K => BitTiming::nominal(125, 14, 5, 4),
            Bitrate::Rate10K => BitTiming::nominal(250, 14, 5, 4),
        }
    }
}

impl TryFrom<i64> for Bitrate {
    type Error = Error;

    fn try_from(nominal: i64) -> Result<Self, Self::Error> {
        Bitrate::resolve(nominal)
    }
}

impl From<Bitrate> for BitTiming {
    fn from(bitrate: Bitrate) -> BitTiming {
        bitrate.timing()
    }
}
