//! A session owns exactly one driver handle and exposes the CAN operations on it.
//!
//! ```rust
//! use toucan::driver::Loopback;
//! use toucan::{Message, Mode, Session};
//!
//! let mut session = Session::new(Loopback::new());
//! session.connect(0, Mode::DEFAULT, 500_000).unwrap();
//!
//! let request = Message::new(0x7df.into(), &[0x02, 0x09, 0x02]).unwrap();
//! session.write(&request, 0).unwrap();
//!
//! let echo = session.read(5000).unwrap();
//! assert_eq!(echo.data(), request.data());
//! ```
use tracing::{debug, info, warn};

use crate::bitrate::Bitrate;
use crate::can::{from_frame, to_frame, HardwareFrame, Message};
use crate::config::SessionConfig;
use crate::driver::{Driver, Handle};
use crate::error::{map_status, Error};
use crate::mode::Mode;
use crate::status::{Busload, Status};
use crate::Result;

/// Lifecycle state of a [`Session`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    /// No handle is held
    Closed,
    /// A handle is held but the controller is stopped
    Configured,
    /// The controller is started
    Running,
}

/// CAN session on top of a [`Driver`].
///
/// Operations that change the lifecycle take `&mut self`. `read`, `write`, `kill`, `status` and `busload`
/// take `&self`, so a session shared between threads can be cancelled with [`Session::kill`] while another
/// thread is blocked in [`Session::read`]. At most one `read` and one `write` should be in flight at a time;
/// serializing concurrent calls of the same operation is up to the caller.
///
/// The session takes ownership of the driver and never hands it out, so the handle can only be released
/// through [`Session::teardown`] or drop.
pub struct Session<D: Driver> {
    driver: D,
    handle: Handle,
    state: State,
    mode: Mode,
    bitrate: Option<Bitrate>,
}

impl<D: Driver> Session<D> {
    pub fn new(driver: D) -> Self {
        Session {
            driver,
            handle: Handle::INVALID,
            state: State::Closed,
            mode: Mode::DEFAULT,
            bitrate: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Bit rate the controller was last started with.
    pub fn bitrate(&self) -> Option<Bitrate> {
        self.bitrate
    }

    /// Opens `channel` in `mode` and starts the controller at `nominal_rate` bits per second.
    ///
    /// The bit rate is resolved before the driver is touched. If starting the controller fails,
    /// the handle that was just opened is released again and the session stays closed.
    pub fn connect(&mut self, channel: i32, mode: Mode, nominal_rate: i64) -> Result<()> {
        if self.state != State::Closed {
            return Err(Error::AlreadyInitialized);
        }

        let bitrate = Bitrate::resolve(nominal_rate)?;
        let handle = self.open_and_start(channel, mode, bitrate)?;

        self.handle = handle;
        self.mode = mode;
        self.bitrate = Some(bitrate);
        self.state = State::Running;

        info!(
            "Connected to channel {} at {} bit/s, mode {:?}",
            channel,
            bitrate.bits_per_second(),
            mode
        );
        Ok(())
    }

    pub fn connect_with(&mut self, config: &SessionConfig) -> Result<()> {
        self.connect(config.channel, config.mode, config.bitrate)
    }

    /// Opening and starting as one step: the handle is closed on any failure after it was acquired.
    fn open_and_start(&self, channel: i32, mode: Mode, bitrate: Bitrate) -> Result<Handle> {
        let handle = Handle::from_open(self.driver.open(channel, mode)).map_err(|code| {
            match map_status(code) {
                Err(e) => e,
                // A negative return is never success
                Ok(()) => Error::Unknown(code),
            }
        })?;

        if let Err(e) = map_status(self.driver.configure(handle, &bitrate.timing())) {
            warn!("Failed to start channel {}: {}, releasing handle", channel, e);
            self.driver.close(handle);
            return Err(e);
        }

        Ok(handle)
    }

    /// Restarts a controller stopped with [`Session::reset`].
    pub fn start(&mut self, nominal_rate: i64) -> Result<()> {
        if self.state != State::Configured {
            return Err(Error::NotInitialized);
        }

        let bitrate = Bitrate::resolve(nominal_rate)?;
        map_status(self.driver.configure(self.handle, &bitrate.timing()))?;

        self.bitrate = Some(bitrate);
        self.state = State::Running;
        info!("Restarted at {} bit/s", bitrate.bits_per_second());
        Ok(())
    }

    /// Stops the controller, keeping the handle.
    pub fn reset(&mut self) -> Result<()> {
        self.require_running()?;

        map_status(self.driver.reset(self.handle))?;
        self.state = State::Configured;
        info!("Controller stopped");
        Ok(())
    }

    /// Reads one message. The timeout is given in milliseconds with `0xFFFF` being forever.
    pub fn read(&self, timeout: u16) -> Result<Message> {
        self.require_running()?;

        let mut frame = HardwareFrame::default();
        map_status(self.driver.read(self.handle, &mut frame, timeout))?;

        let message = from_frame(&frame)?;
        debug!("RX {:?}", message);
        Ok(message)
    }

    /// Writes one message. The timeout is given in milliseconds with `0xFFFF` being forever.
    pub fn write(&self, message: &Message, timeout: u16) -> Result<()> {
        self.require_running()?;
        if message.dlc() == 0 || message.is_empty() {
            return Err(Error::IllegalParameter);
        }

        let frame = to_frame(message)?;
        map_status(self.driver.write(self.handle, &frame, timeout))?;

        debug!("TX {:?}", message);
        Ok(())
    }

    /// Signals a blocked `read` or `write` to return immediately.
    pub fn kill(&self) -> Result<()> {
        self.require_running()?;
        map_status(self.driver.cancel(self.handle))
    }

    /// The status register.
    pub fn status(&self) -> Result<Status> {
        self.require_running()?;

        let mut status = 0;
        map_status(self.driver.status(self.handle, &mut status))?;
        Ok(Status::from_byte(status))
    }

    /// The bus load and status register.
    pub fn busload(&self) -> Result<Busload> {
        self.require_running()?;

        let mut load = 0;
        let mut status = 0;
        map_status(self.driver.busload(self.handle, &mut load, &mut status))?;
        Ok(Busload::from_percent(load, status))
    }

    pub fn hardware_version(&self) -> Option<String> {
        if !self.handle.is_valid() {
            return None;
        }
        self.driver.hardware_version(self.handle)
    }

    pub fn software_version(&self) -> Option<String> {
        if !self.handle.is_valid() {
            return None;
        }
        self.driver.software_version(self.handle)
    }

    /// Releases the handle. Calling this again, or dropping the session afterwards, does nothing.
    pub fn teardown(&mut self) {
        if self.handle.is_valid() {
            self.driver.close(self.handle);
            info!("Released {:?}", self.handle);
        }

        self.handle = Handle::INVALID;
        self.state = State::Closed;
        self.bitrate = None;
    }

    fn require_running(&self) -> Result<()> {
        match self.state {
            State::Running => Ok(()),
            _ => Err(Error::NotInitialized),
        }
    }
}

impl<D: Driver> Drop for Session<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Loopback;

    #[test]
    fn lifecycle() {
        let mut session = Session::new(Loopback::new());
        assert_eq!(session.state(), State::Closed);
        assert!(!session.handle().is_valid());

        session.connect(3, Mode::DEFAULT, 250_000).unwrap();
        assert_eq!(session.state(), State::Running);
        assert_eq!(session.handle().raw(), 3);
        assert_eq!(session.bitrate(), Some(Bitrate::Rate250K));

        session.reset().unwrap();
        assert_eq!(session.state(), State::Configured);
        session.start(1_000_000).unwrap();
        assert_eq!(session.bitrate(), Some(Bitrate::Rate1M));

        session.teardown();
        assert_eq!(session.state(), State::Closed);
        assert_eq!(session.hardware_version(), None);
    }

    #[test]
    fn unsupported_bitrate_before_open() {
        let mut session = Session::new(Loopback::new());
        assert_eq!(
            session.connect(0, Mode::DEFAULT, 83_333),
            Err(Error::Baudrate)
        );
        assert_eq!(session.state(), State::Closed);

        // Nothing was left open on the driver
        session.connect(0, Mode::DEFAULT, 500_000).unwrap();
        assert_eq!(session.handle().raw(), 0);
    }

    #[test]
    fn write_rejects_empty() {
        let mut session = Session::new(Loopback::new());
        session.connect_with(&SessionConfig::default()).unwrap();

        let empty = Message::new(0x123.into(), &[]).unwrap();
        assert_eq!(session.write(&empty, 0), Err(Error::IllegalParameter));
        assert_eq!(session.read(0).unwrap_err(), Error::RxEmpty);
    }
}
