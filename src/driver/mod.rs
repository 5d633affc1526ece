//! The driver boundary: a narrow numeric-handle API implemented by each CAN interface driver.
//!
//! Every operation returns a raw status code (0 on success, negative on failure) which the
//! [`Session`](crate::session::Session) maps with [`map_status`](crate::error::map_status).

pub mod loopback;
#[cfg(feature = "toucan")]
pub mod toucan;

use std::fmt;

use crate::bitrate::BitTiming;
use crate::can::HardwareFrame;
use crate::mode::Mode;

pub use loopback::Loopback;
#[cfg(feature = "toucan")]
pub use toucan::TouCan;

/// Timeout value for blocking forever in [`Driver::read`] and [`Driver::write`].
pub const INFINITE: u16 = 0xffff;

/// Number of channels addressable through the driver boundary.
pub const MAX_CHANNELS: i32 = 8;

/// Identifies a live session with the driver.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Handle(i32);

impl Handle {
    /// Sentinel for "no live session". Never passed to the driver.
    pub const INVALID: Handle = Handle(-1);

    /// Interprets the return value of [`Driver::open`]: non-negative values are handles, negative values are status codes.
    pub fn from_open(ret: i32) -> Result<Handle, i32> {
        match ret {
            ret if ret >= 0 => Ok(Handle(ret)),
            code => Err(code),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }

    pub fn raw(&self) -> i32 {
        self.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Handle::INVALID
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.is_valid() {
            true => write!(f, "Handle({})", self.0),
            false => write!(f, "Handle(invalid)"),
        }
    }
}

/// Trait for a blocking CAN interface driver.
///
/// `cancel` may be called from another thread while `read` or `write` is blocked on the same handle,
/// and must make the blocked call return promptly with an error.
pub trait Driver: Send + Sync {
    /// Opens `channel` in `mode`. Returns a handle (>= 0) or a negative status code.
    fn open(&self, channel: i32, mode: Mode) -> i32;
    /// Applies the bit timing and starts the controller.
    fn configure(&self, handle: Handle, timing: &BitTiming) -> i32;
    /// Stops the controller, keeping the handle open.
    fn reset(&self, handle: Handle) -> i32;
    fn read(&self, handle: Handle, frame: &mut HardwareFrame, timeout: u16) -> i32;
    fn write(&self, handle: Handle, frame: &HardwareFrame, timeout: u16) -> i32;
    /// Unblocks any outstanding read or write on `handle`.
    fn cancel(&self, handle: Handle) -> i32;
    fn status(&self, handle: Handle, status: &mut u8) -> i32;
    /// Bus load in percent (0 to 100) and status register.
    fn busload(&self, handle: Handle, load: &mut u8, status: &mut u8) -> i32;
    fn close(&self, handle: Handle);
    fn hardware_version(&self, handle: Handle) -> Option<String>;
    fn software_version(&self, handle: Handle) -> Option<String>;
}
