//! # The TouCAN Crate
//! Session layer for Rusoku TouCAN USB interfaces. The crate sits on top of a CAN API V3 style driver,
//! which is consumed through the narrow numeric-handle [`Driver`](driver::Driver) trait.
//!
//! A [`Session`] owns exactly one driver handle. It resolves the nominal bit rate to a predefined
//! bit-timing setting, converts between [`Message`] and the fixed hardware frame layout, and maps
//! driver status codes onto [`Error`].
//!
//! ## Example
//!
//! ```rust
//! use toucan::driver::Loopback;
//! use toucan::{Message, Mode, Session};
//!
//! fn example() -> toucan::Result<()> {
//!     let mut session = Session::new(Loopback::new());
//!     session.connect(0, Mode::DEFAULT, 500_000)?;
//!
//!     let get_vin = Message::new(0x7df.into(), &[0x02, 0x09, 0x02])?;
//!     session.write(&get_vin, 0xffff)?;
//!
//!     let message = session.read(5000)?;
//!     println!("{:?}", message);
//!     Ok(())
//! }
//! # example().unwrap();
//! ```
//!
//! ## Supported drivers
//!  - In-process loopback (all platforms)
//!  - CAN API V3 library for Rusoku TouCAN (macOS and Windows, `toucan` feature)
//!

pub mod bitrate;
pub mod can;
pub mod config;
pub mod driver;
mod error;
pub mod mode;
pub mod session;
pub mod status;

pub use bitrate::{BitTiming, Bitrate};
pub use can::{Identifier, Message, MessageBuilder};
pub use config::SessionConfig;
pub use error::{map_status, Error};
pub use mode::Mode;
pub use session::{Session, State};
pub use status::{Busload, Status};

pub type Result<T> = std::result::Result<T, Error>;
