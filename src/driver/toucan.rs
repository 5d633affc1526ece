//! Driver for Rusoku TouCAN USB interfaces, using the CAN API V3 wrapper library loaded at runtime.
use std::ffi::{c_char, c_int, c_void, CStr};

use bstr::ByteSlice;
use tracing::{error, info, warn};

use crate::bitrate::BitTiming;
use crate::can::HardwareFrame;
use crate::driver::{Driver, Handle};
use crate::error::Error;
use crate::mode::Mode;

#[cfg(target_os = "macos")]
pub const LIBRARY_NAME: &str = "libUVCANTOU.dylib";
#[cfg(target_os = "windows")]
pub const LIBRARY_NAME: &str = "u3cantou.dll";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const LIBRARY_NAME: &str = "libuvcantou.so";

/// `can_bitrate_t` in bit-timing register form.
#[repr(C)]
struct RawBitrate {
    frequency: i32,
    nominal: RawNominal,
    data: RawData,
}

#[repr(C)]
struct RawNominal {
    brp: u16,
    tseg1: u16,
    tseg2: u16,
    sjw: u16,
    sam: u8,
}

#[repr(C)]
struct RawData {
    brp: u16,
    tseg1: u16,
    tseg2: u16,
    sjw: u16,
}

impl From<&BitTiming> for RawBitrate {
    fn from(timing: &BitTiming) -> Self {
        RawBitrate {
            frequency: timing.frequency,
            nominal: RawNominal {
                brp: timing.brp,
                tseg1: timing.tseg1,
                tseg2: timing.tseg2,
                sjw: timing.sjw,
                sam: timing.sam,
            },
            // Unused in CAN 2.0 operation
            data: RawData {
                brp: 0,
                tseg1: 0,
                tseg2: 0,
                sjw: 0,
            },
        }
    }
}

type InitFn = unsafe extern "C" fn(i32, u8, *const c_void) -> c_int;
type HandleFn = unsafe extern "C" fn(c_int) -> c_int;
type StartFn = unsafe extern "C" fn(c_int, *const RawBitrate) -> c_int;
type ReadFn = unsafe extern "C" fn(c_int, *mut HardwareFrame, u16) -> c_int;
type WriteFn = unsafe extern "C" fn(c_int, *const HardwareFrame, u16) -> c_int;
type StatusFn = unsafe extern "C" fn(c_int, *mut u8) -> c_int;
type BusloadFn = unsafe extern "C" fn(c_int, *mut u8, *mut u8) -> c_int;
type InfoFn = unsafe extern "C" fn(c_int) -> *mut c_char;
type VersionFn = unsafe extern "C" fn() -> *mut c_char;

/// Function table of the CAN API V3 library. The library stays loaded for the lifetime of this value.
pub struct TouCan {
    can_init: InitFn,
    can_exit: HandleFn,
    can_kill: HandleFn,
    can_start: StartFn,
    can_reset: HandleFn,
    can_read: ReadFn,
    can_write: WriteFn,
    can_status: StatusFn,
    can_busload: BusloadFn,
    can_hardware: InfoFn,
    can_software: InfoFn,
    can_version: VersionFn,
    _library: libloading::Library,
}

fn symbol<T: Copy>(library: &libloading::Library, name: &[u8]) -> Result<T, Error> {
    let symbol = unsafe { library.get::<T>(name) }.map_err(|e| {
        error!("Missing symbol {} in CAN API library: {}", name.as_bstr(), e);
        Error::Library
    })?;
    Ok(*symbol)
}

fn to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes();
    Some(bytes.to_str_lossy().into_owned())
}

impl TouCan {
    /// Loads the library from the default search path.
    pub fn load() -> Result<TouCan, Error> {
        Self::open(LIBRARY_NAME)
    }

    /// Loads the library from `path`.
    pub fn open(path: &str) -> Result<TouCan, Error> {
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
            error!("Failed to load CAN API library {}: {}", path, e);
            Error::Library
        })?;

        let toucan = TouCan {
            can_init: symbol(&library, b"can_init\0")?,
            can_exit: symbol(&library, b"can_exit\0")?,
            can_kill: symbol(&library, b"can_kill\0")?,
            can_start: symbol(&library, b"can_start\0")?,
            can_reset: symbol(&library, b"can_reset\0")?,
            can_read: symbol(&library, b"can_read\0")?,
            can_write: symbol(&library, b"can_write\0")?,
            can_status: symbol(&library, b"can_status\0")?,
            can_busload: symbol(&library, b"can_busload\0")?,
            can_hardware: symbol(&library, b"can_hardware\0")?,
            can_software: symbol(&library, b"can_software\0")?,
            can_version: symbol(&library, b"can_version\0")?,
            _library: library,
        };

        info!(
            "Loaded {}: {}",
            path,
            toucan.library_version().unwrap_or_default()
        );
        Ok(toucan)
    }

    /// Version string of the loaded library.
    pub fn library_version(&self) -> Option<String> {
        to_string(unsafe { (self.can_version)() })
    }
}

impl Driver for TouCan {
    fn open(&self, channel: i32, mode: Mode) -> i32 {
        unsafe { (self.can_init)(channel, mode.bits(), std::ptr::null()) }
    }

    fn configure(&self, handle: Handle, timing: &BitTiming) -> i32 {
        let bitrate = RawBitrate::from(timing);
        unsafe { (self.can_start)(handle.raw(), &bitrate) }
    }

    fn reset(&self, handle: Handle) -> i32 {
        unsafe { (self.can_reset)(handle.raw()) }
    }

    fn read(&self, handle: Handle, frame: &mut HardwareFrame, timeout: u16) -> i32 {
        unsafe { (self.can_read)(handle.raw(), frame, timeout) }
    }

    fn write(&self, handle: Handle, frame: &HardwareFrame, timeout: u16) -> i32 {
        unsafe { (self.can_write)(handle.raw(), frame, timeout) }
    }

    fn cancel(&self, handle: Handle) -> i32 {
        unsafe { (self.can_kill)(handle.raw()) }
    }

    fn status(&self, handle: Handle, status: &mut u8) -> i32 {
        unsafe { (self.can_status)(handle.raw(), status) }
    }

    fn busload(&self, handle: Handle, load: &mut u8, status: &mut u8) -> i32 {
        unsafe { (self.can_busload)(handle.raw(), load, status) }
    }

    fn close(&self, handle: Handle) {
        let ret = unsafe { (self.can_exit)(handle.raw()) };
        if ret != 0 {
            warn!("can_exit({}) returned {}", handle.raw(), ret);
        }
    }

    fn hardware_version(&self, handle: Handle) -> Option<String> {
        to_string(unsafe { (self.can_hardware)(handle.raw()) })
    }

    fn software_version(&self, handle: Handle) -> Option<String> {
        to_string(unsafe { (self.can_software)(handle.raw()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitrate::Bitrate;

    #[test]
    fn raw_bitrate() {
        let raw = RawBitrate::from(&Bitrate::Rate125K.timing());
        assert_eq!(raw.frequency, 50_000_000);
        assert_eq!(raw.nominal.brp, 20);
        assert_eq!(raw.nominal.tseg1, 14);
        assert_eq!(raw.nominal.tseg2, 5);
        assert_eq!(raw.nominal.sjw, 4);
    }

    #[test]
    fn missing_library() {
        assert!(matches!(
            TouCan::open("/nonexistent/libUVCANTOU.dylib"),
            Err(Error::Library)
        ));
    }

    #[test]
    fn null_string() {
        assert_eq!(to_string(std::ptr::null()), None);
    }
}
