//! Operation mode of a CAN channel.
use bitflags::bitflags;

bitflags! {
    /// Operation mode flags passed to the driver when a channel is opened. The empty set is CAN 2.0 operation.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Mode: u8 {
        /// CAN FD operation enable
        const FDOE = 0x80;
        /// Bit-rate switch enable
        const BRSE = 0x40;
        /// Non-ISO CAN FD enable
        const NISO = 0x20;
        /// Shared access enable
        const SHRD = 0x10;
        /// Extended format disable
        const NXTD = 0x08;
        /// Remote frames disable
        const NRTR = 0x04;
        /// Error frames enable
        const ERR = 0x02;
        /// Monitor mode enable
        const MON = 0x01;
    }
}

impl Mode {
    pub const DEFAULT: Mode = Mode::empty();

    pub fn is_fd(&self) -> bool {
        self.contains(Mode::FDOE)
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_classic() {
        assert_eq!(Mode::default().bits(), 0);
        assert!(!Mode::DEFAULT.is_fd());
        assert!((Mode::FDOE | Mode::BRSE).is_fd());
    }

    #[test]
    fn raw_bits() {
        let mode = Mode::FDOE | Mode::BRSE | Mode::MON;
        assert_eq!(mode.bits(), 0xc1);
        assert_eq!(Mode::from_bits(0xc1), Some(mode));
    }
}
