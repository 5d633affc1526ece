//! Generic CAN types: identifiers, messages and the data length code tables.

pub mod frame;

use std::fmt;

use crate::error::Error;

pub use frame::{from_frame, to_frame, HardwareFrame};

/// Maximum data length of a classic CAN frame.
pub const CAN_MAX_LEN: usize = 8;
/// Maximum data length of a CAN FD frame.
pub const CANFD_MAX_LEN: usize = 64;
/// Filler byte used by [`Message::new_padded`] and for unused bytes of the hardware frame.
pub const PADDING: u8 = 0x55;

pub static DLC_TO_LEN: &[usize] = &[0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// Byte length encoded by `dlc`. Lengths above 8 only exist for FD frames.
pub fn dlc_to_len(dlc: u8, fd: bool) -> Option<usize> {
    match (dlc as usize, fd) {
        (dlc, false) if dlc <= CAN_MAX_LEN => Some(dlc),
        (_, false) => None,
        (dlc, true) => DLC_TO_LEN.get(dlc).copied(),
    }
}

/// Smallest data length code for exactly `len` bytes, if one exists.
pub fn len_to_dlc(len: usize, fd: bool) -> Option<u8> {
    if !fd && len > CAN_MAX_LEN {
        return None;
    }
    DLC_TO_LEN.iter().position(|&x| x == len).map(|dlc| dlc as u8)
}

/// Identifier for a CAN frame
#[derive(Copy, Clone, PartialOrd, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Identifier {
    Standard(u32),
    Extended(u32),
}

impl Identifier {
    pub fn is_standard(&self) -> bool {
        match self {
            Identifier::Standard(_) => true,
            Identifier::Extended(_) => false,
        }
    }
    pub fn is_extended(&self) -> bool {
        !self.is_standard()
    }

    fn validate(&self) -> Result<(), Error> {
        match *self {
            Identifier::Standard(id) if id > 0x7ff => Err(Error::IllegalParameter),
            Identifier::Extended(id) if id > 0x1fffffff => Err(Error::IllegalParameter),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Extended(id) => write!(f, "0x{:08x}", id),
            Identifier::Standard(id) => write!(f, "0x{:03x}", id),
        }
    }
}

impl From<u32> for Identifier {
    fn from(id: u32) -> Identifier {
        if id <= 0x7ff {
            Identifier::Standard(id)
        } else {
            Identifier::Extended(id)
        }
    }
}

impl From<Identifier> for u32 {
    fn from(val: Identifier) -> u32 {
        match val {
            Identifier::Standard(id) => id,
            Identifier::Extended(id) => id,
        }
    }
}

/// A CAN message. Immutable once constructed; the payload length always matches the DLC.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    id: Identifier,
    remote: bool,
    fd: bool,
    brs: bool,
    esi: bool,
    status: bool,
    dlc: u8,
    data: Vec<u8>,
    timestamp: f64,
}

impl Message {
    /// Classic data frame carrying `data` (0 to 8 bytes). The DLC equals the data length.
    pub fn new(id: Identifier, data: &[u8]) -> Result<Message, Error> {
        MessageBuilder::new(id).data(data).build()
    }

    /// Classic data frame of 8 bytes: `data` (1 to 8 bytes) followed by [`PADDING`].
    pub fn new_padded(id: Identifier, data: &[u8]) -> Result<Message, Error> {
        if data.is_empty() || data.len() > CAN_MAX_LEN {
            return Err(Error::IllegalParameter);
        }

        let mut padded = [PADDING; CAN_MAX_LEN];
        padded[..data.len()].copy_from_slice(data);
        Message::new(id, &padded)
    }

    pub fn builder(id: Identifier) -> MessageBuilder {
        MessageBuilder::new(id)
    }

    /// Arbitration ID
    pub fn id(&self) -> Identifier {
        self.id
    }
    pub fn is_extended(&self) -> bool {
        self.id.is_extended()
    }
    /// Remote transmission request
    pub fn is_remote(&self) -> bool {
        self.remote
    }
    /// CAN FD format
    pub fn is_fd(&self) -> bool {
        self.fd
    }
    /// CAN FD bit-rate switching
    pub fn bitrate_switch(&self) -> bool {
        self.brs
    }
    /// CAN FD error state indicator
    pub fn error_state(&self) -> bool {
        self.esi
    }
    /// Status message generated by the interface
    pub fn is_status(&self) -> bool {
        self.status
    }
    /// Raw data length code
    pub fn dlc(&self) -> u8 {
        self.dlc
    }
    pub fn data(&self) -> &[u8] {
        &self.data
    }
    /// Byte length derived from the DLC.
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    /// Seconds since the interface booted.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("dlc", &self.dlc)
            .field("data", &hex::encode(&self.data))
            .field("remote", &self.remote)
            .field("fd", &self.fd)
            .field("brs", &self.brs)
            .field("esi", &self.esi)
            .field("status", &self.status)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Builder for hand-built messages. [`MessageBuilder::build`] validates the DLC against the payload.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    id: Identifier,
    remote: bool,
    fd: bool,
    brs: bool,
    esi: bool,
    status: bool,
    dlc: Option<u8>,
    data: Vec<u8>,
    timestamp: f64,
}

impl MessageBuilder {
    pub fn new(id: Identifier) -> Self {
        MessageBuilder {
            id,
            remote: false,
            fd: false,
            brs: false,
            esi: false,
            status: false,
            dlc: None,
            data: vec![],
            timestamp: 0.0,
        }
    }

    pub fn data(mut self, data: &[u8]) -> Self {
        self.data = data.to_vec();
        self
    }

    /// Explicit DLC. If not given, the smallest DLC fitting the data is used.
    pub fn dlc(mut self, dlc: u8) -> Self {
        self.dlc = Some(dlc);
        self
    }

    pub fn remote(mut self, remote: bool) -> Self {
        self.remote = remote;
        self
    }

    pub fn fd(mut self, fd: bool) -> Self {
        self.fd = fd;
        self
    }

    pub fn bitrate_switch(mut self, brs: bool) -> Self {
        self.brs = brs;
        self
    }

    pub fn error_state(mut self, esi: bool) -> Self {
        self.esi = esi;
        self
    }

    pub fn status(mut self, status: bool) -> Self {
        self.status = status;
        self
    }

    pub fn timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn build(self) -> Result<Message, Error> {
        self.id.validate()?;

        let dlc = match self.dlc {
            Some(dlc) => dlc,
            None => len_to_dlc(self.data.len(), self.fd).ok_or(Error::IllegalParameter)?,
        };
        let len = dlc_to_len(dlc, self.fd).ok_or(Error::IllegalParameter)?;
        if len != self.data.len() {
            return Err(Error::IllegalParameter);
        }

        Ok(Message {
            id: self.id,
            remote: self.remote,
            fd: self.fd,
            brs: self.brs,
            esi: self.esi,
            status: self.status,
            dlc,
            data: self.data,
            timestamp: self.timestamp,
        })
    }
}
