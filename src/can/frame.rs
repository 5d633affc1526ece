//! Fixed layout CAN message record exchanged with the driver, and conversion from and to [`Message`].
use std::fmt;
use std::os::raw::c_long;

use bitflags::bitflags;

use crate::can::{Identifier, Message, CANFD_MAX_LEN, CAN_MAX_LEN, PADDING};
use crate::error::Error;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

bitflags! {
    /// Single-bit flags following the identifier in [`HardwareFrame`].
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct FrameFlags: u8 {
        /// Extended format
        const XTD = 0x01;
        /// Remote frame
        const RTR = 0x02;
        /// CAN FD format
        const FDF = 0x04;
        /// Bit-rate switch
        const BRS = 0x08;
        /// Error state indicator
        const ESI = 0x10;
        /// Status message
        const STS = 0x20;
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Timestamp {
    pub tv_sec: i64,
    pub tv_nsec: c_long,
}

impl Timestamp {
    pub fn from_secs_f64(secs: f64) -> Timestamp {
        let secs = secs.max(0.0);
        let whole = secs.trunc();
        Timestamp {
            tv_sec: whole as i64,
            tv_nsec: ((secs - whole) * NANOS_PER_SEC) as c_long,
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.tv_sec as f64 + self.tv_nsec as f64 / NANOS_PER_SEC
    }
}

/// CAN message record of the CAN API V3 (`can_message_t`).
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct HardwareFrame {
    pub id: u32,
    pub flags: u8,
    // MSVC allocates the full storage unit of the C bit-field
    #[cfg(windows)]
    _reserved: [u8; 3],
    pub dlc: u8,
    pub data: [u8; CANFD_MAX_LEN],
    pub timestamp: Timestamp,
}

impl Default for HardwareFrame {
    fn default() -> Self {
        HardwareFrame {
            id: 0,
            flags: 0,
            #[cfg(windows)]
            _reserved: [0; 3],
            dlc: 0,
            data: [0; CANFD_MAX_LEN],
            timestamp: Timestamp::default(),
        }
    }
}

impl HardwareFrame {
    pub fn flags(&self) -> FrameFlags {
        FrameFlags::from_bits_truncate(self.flags)
    }
}

impl fmt::Debug for HardwareFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareFrame")
            .field("id", &format_args!("0x{:x}", self.id))
            .field("flags", &self.flags())
            .field("dlc", &self.dlc)
            .field("data", &hex::encode(&self.data[..CAN_MAX_LEN]))
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Encodes a message into the hardware layout. Bytes after the payload are filled with [`PADDING`] up to 8 bytes.
/// FD lengths (DLC 9 to 15) are not supported.
pub fn to_frame(message: &Message) -> Result<HardwareFrame, Error> {
    let len = message.dlc() as usize;
    if len > CAN_MAX_LEN {
        return Err(Error::NotSupported);
    }
    if message.data().len() != len {
        return Err(Error::IllegalParameter);
    }

    let mut flags = FrameFlags::empty();
    flags.set(FrameFlags::XTD, message.is_extended());
    flags.set(FrameFlags::RTR, message.is_remote());
    flags.set(FrameFlags::FDF, message.is_fd());
    flags.set(FrameFlags::BRS, message.bitrate_switch());
    flags.set(FrameFlags::ESI, message.error_state());
    flags.set(FrameFlags::STS, message.is_status());

    let mut frame = HardwareFrame {
        id: message.id().into(),
        flags: flags.bits(),
        dlc: message.dlc(),
        timestamp: Timestamp::from_secs_f64(message.timestamp()),
        ..Default::default()
    };
    frame.data[..CAN_MAX_LEN].fill(PADDING);
    frame.data[..len].copy_from_slice(message.data());

    Ok(frame)
}

/// Decodes a hardware frame. Only the first DLC bytes become the payload; DLC 9 to 15 is not supported.
pub fn from_frame(frame: &HardwareFrame) -> Result<Message, Error> {
    let len = frame.dlc as usize;
    if len > CAN_MAX_LEN {
        return Err(Error::NotSupported);
    }

    let flags = frame.flags();
    let id = match flags.contains(FrameFlags::XTD) {
        true => Identifier::Extended(frame.id & 0x1fffffff),
        false => Identifier::Standard(frame.id & 0x7ff),
    };

    Ok(Message {
        id,
        remote: flags.contains(FrameFlags::RTR),
        fd: flags.contains(FrameFlags::FDF),
        brs: flags.contains(FrameFlags::BRS),
        esi: flags.contains(FrameFlags::ESI),
        status: flags.contains(FrameFlags::STS),
        dlc: frame.dlc,
        data: frame.data[..len].to_vec(),
        timestamp: frame.timestamp.as_secs_f64(),
    })
}

impl TryFrom<&Message> for HardwareFrame {
    type Error = Error;

    fn try_from(message: &Message) -> Result<Self, Self::Error> {
        to_frame(message)
    }
}

impl TryFrom<&HardwareFrame> for Message {
    type Error = Error;

    fn try_from(frame: &HardwareFrame) -> Result<Self, Self::Error> {
        from_frame(frame)
    }
}
