//! Contains the main error type for the library, and the mapping from driver status codes onto it.
use thiserror::Error;

/// The main error type for the library. Every status code returned by the driver boundary maps onto exactly one variant.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Error {
    #[error("Bus Off")]
    BusOff,
    #[error("Error Warning")]
    ErrorWarning,
    #[error("Bus Error")]
    BusError,
    #[error("Controller Offline")]
    Offline,
    #[error("Controller Already Online")]
    Online,
    #[error("Message Lost")]
    MessageLost,
    #[error("LEC Stuff Error")]
    LecStuff,
    #[error("LEC Form Error")]
    LecForm,
    #[error("LEC Acknowledge Error")]
    LecAck,
    #[error("LEC Recessive Bit Error")]
    LecBit1,
    #[error("LEC Dominant Bit Error")]
    LecBit0,
    #[error("LEC Checksum Error")]
    LecCrc,
    #[error("Transmitter Busy")]
    TxBusy,
    #[error("Receiver Empty")]
    RxEmpty,
    #[error("Error Frame")]
    ErrorFrame,
    #[error("Timeout")]
    Timeout,
    #[error("Resource Allocation")]
    Resource,
    #[error("Illegal Baudrate")]
    Baudrate,
    #[error("Illegal Handle")]
    Handle,
    #[error("Illegal Parameter")]
    IllegalParameter,
    #[error("Null Pointer Assignment")]
    NullPointer,
    #[error("Not Initialized")]
    NotInitialized,
    #[error("Already Initialized")]
    AlreadyInitialized,
    #[error("Illegal Library")]
    Library,
    #[error("Not Supported")]
    NotSupported,
    #[error("Fatal")]
    Fatal,
    #[error("Vendor Specific")]
    Vendor,
    #[error("Unknown Error Code {0}")]
    Unknown(i32),
}

const NO_ERROR: i32 = 0;

impl Error {
    /// The driver status code this error was mapped from.
    pub fn code(&self) -> i32 {
        match self {
            Error::BusOff => -1,
            Error::ErrorWarning => -2,
            Error::BusError => -3,
            Error::Online => -8,
            Error::Offline => -9,
            Error::MessageLost => -10,
            Error::LecStuff => -11,
            Error::LecForm => -12,
            Error::LecAck => -13,
            Error::LecBit1 => -14,
            Error::LecBit0 => -15,
            Error::LecCrc => -16,
            Error::TxBusy => -20,
            Error::RxEmpty => -30,
            Error::ErrorFrame => -40,
            Error::Timeout => -50,
            Error::Resource => -90,
            Error::Baudrate => -91,
            Error::Handle => -92,
            Error::IllegalParameter => -93,
            Error::NullPointer => -94,
            Error::NotInitialized => -95,
            Error::AlreadyInitialized => -96,
            Error::Library => -97,
            Error::NotSupported => -98,
            Error::Fatal => -99,
            Error::Vendor => -100,
            Error::Unknown(code) => *code,
        }
    }

    /// Line error code faults reported by the CAN controller.
    pub fn is_lec(&self) -> bool {
        matches!(
            self,
            Error::LecStuff
                | Error::LecForm
                | Error::LecAck
                | Error::LecBit1
                | Error::LecBit0
                | Error::LecCrc
        )
    }

    /// Bus state errors, as opposed to API usage errors.
    pub fn is_bus_state(&self) -> bool {
        matches!(
            self,
            Error::BusOff
                | Error::ErrorWarning
                | Error::BusError
                | Error::Offline
                | Error::Online
                | Error::MessageLost
        )
    }
}

/// Maps a status code returned by the driver boundary. Zero is success, every other code is an error.
/// Codes outside the known set map to [`Error::Unknown`].
pub fn map_status(code: i32) -> Result<(), Error> {
    let error = match code {
        NO_ERROR => return Ok(()),
        -1 => Error::BusOff,
        -2 => Error::ErrorWarning,
        -3 => Error::BusError,
        -8 => Error::Online,
        -9 => Error::Offline,
        -10 => Error::MessageLost,
        -11 => Error::LecStuff,
        -12 => Error::LecForm,
        -13 => Error::LecAck,
        -14 => Error::LecBit1,
        -15 => Error::LecBit0,
        -16 => Error::LecCrc,
        -20 => Error::TxBusy,
        -30 => Error::RxEmpty,
        -40 => Error::ErrorFrame,
        -50 => Error::Timeout,
        -90 => Error::Resource,
        -91 => Error::Baudrate,
        -92 => Error::Handle,
        -93 => Error::IllegalParameter,
        -94 => Error::NullPointer,
        -95 => Error::NotInitialized,
        -96 => Error::AlreadyInitialized,
        -97 => Error::Library,
        -98 => Error::NotSupported,
        -99 => Error::Fatal,
        -100 => Error::Vendor,
        code => Error::Unknown(code),
    };
    Err(error)
}
