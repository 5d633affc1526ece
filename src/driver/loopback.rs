//! In-process loopback driver. Every frame written on a handle is received again on the same handle.
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::bitrate::BitTiming;
use crate::can::frame::{FrameFlags, Timestamp};
use crate::can::{HardwareFrame, CAN_MAX_LEN};
use crate::driver::{Driver, Handle, INFINITE, MAX_CHANNELS};
use crate::error::Error;
use crate::mode::Mode;
use crate::status::Status;

const NO_ERROR: i32 = 0;
const MAX_STD_ID: u32 = 0x7ff;
const MAX_XTD_ID: u32 = 0x1fff_ffff;

/// Receive queue size per channel, in frames.
pub const QUEUE_SIZE: usize = 65536;

#[derive(Debug)]
struct Channel {
    mode: Mode,
    timing: Option<BitTiming>,
    queue: VecDeque<HardwareFrame>,
    overrun: bool,
    /// Incremented by every cancel, so that only reads already in progress are interrupted.
    signals: u64,
}

impl Channel {
    fn new(mode: Mode) -> Self {
        Channel {
            mode,
            timing: None,
            queue: VecDeque::new(),
            overrun: false,
            signals: 0,
        }
    }

    fn running(&self) -> bool {
        self.timing.is_some()
    }

    fn status(&self) -> Status {
        let mut status = Status::empty();
        status.set(Status::RESET, !self.running());
        status.set(Status::RX_EMPTY, self.queue.is_empty());
        status.set(Status::QUEUE_OVERRUN, self.overrun);
        status
    }

    fn enqueue(&mut self, frame: HardwareFrame) {
        if self.queue.len() >= QUEUE_SIZE {
            if !self.overrun {
                warn!("Loopback receive queue overrun, dropping frames");
            }
            self.overrun = true;
            return;
        }
        self.queue.push_back(frame);
    }

    /// Same checks the CAN API applies before transmitting a message.
    fn check_transmit(&self, frame: &HardwareFrame) -> Result<(), Error> {
        let flags = frame.flags();
        let max_id = match flags.contains(FrameFlags::XTD) {
            true => MAX_XTD_ID,
            false => MAX_STD_ID,
        };
        if frame.id > max_id {
            return Err(Error::IllegalParameter);
        }
        if flags.contains(FrameFlags::XTD) && self.mode.contains(Mode::NXTD) {
            return Err(Error::IllegalParameter);
        }
        if flags.contains(FrameFlags::RTR) && self.mode.contains(Mode::NRTR) {
            return Err(Error::IllegalParameter);
        }
        if flags.contains(FrameFlags::FDF) && !self.mode.contains(Mode::FDOE) {
            return Err(Error::IllegalParameter);
        }
        if flags.contains(FrameFlags::BRS)
            && (!self.mode.contains(Mode::BRSE) || !flags.contains(FrameFlags::FDF))
        {
            return Err(Error::IllegalParameter);
        }
        if flags.contains(FrameFlags::STS) {
            return Err(Error::IllegalParameter);
        }
        if frame.dlc as usize > CAN_MAX_LEN {
            return Err(Error::IllegalParameter);
        }
        Ok(())
    }
}

/// Loopback driver with [`MAX_CHANNELS`] independent channels. The handle of a channel is its channel number.
pub struct Loopback {
    channels: Mutex<Vec<Option<Channel>>>,
    wakeup: Condvar,
    epoch: Instant,
}

impl Default for Loopback {
    fn default() -> Self {
        Self::new()
    }
}

impl Loopback {
    pub fn new() -> Self {
        Loopback {
            channels: Mutex::new((0..MAX_CHANNELS).map(|_| None).collect()),
            wakeup: Condvar::new(),
            epoch: Instant::now(),
        }
    }

    /// Queues `frame` for reception on `channel` as if it was received from the bus.
    pub fn inject(&self, channel: i32, mut frame: HardwareFrame) -> Result<(), Error> {
        let mut channels = self.lock().map_err(|_| Error::Fatal)?;
        let channel = lookup(&mut channels, channel).map_err(|_| Error::Handle)?;
        if frame.timestamp == Timestamp::default() {
            frame.timestamp = self.now();
        }
        channel.enqueue(frame);
        self.wakeup.notify_all();
        Ok(())
    }

    fn now(&self) -> Timestamp {
        Timestamp::from_secs_f64(self.epoch.elapsed().as_secs_f64())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Option<Channel>>>, i32> {
        self.channels.lock().map_err(|_| Error::Fatal.code())
    }

    fn with_channel<F>(&self, handle: Handle, f: F) -> i32
    where
        F: FnOnce(&mut Channel) -> Result<(), Error>,
    {
        let mut channels = match self.lock() {
            Ok(channels) => channels,
            Err(code) => return code,
        };
        let ret = match lookup(&mut channels, handle.raw()) {
            Ok(channel) => f(channel),
            Err(code) => return code,
        };
        self.wakeup.notify_all();
        match ret {
            Ok(()) => NO_ERROR,
            Err(e) => e.code(),
        }
    }
}

fn lookup(channels: &mut [Option<Channel>], channel: i32) -> Result<&mut Channel, i32> {
    usize::try_from(channel)
        .ok()
        .and_then(|idx| channels.get_mut(idx))
        .and_then(|channel| channel.as_mut())
        .ok_or(Error::Handle.code())
}

impl Driver for Loopback {
    fn open(&self, channel: i32, mode: Mode) -> i32 {
        if !(0..MAX_CHANNELS).contains(&channel) {
            return Error::Handle.code();
        }
        if mode.intersects(Mode::BRSE | Mode::NISO) && !mode.contains(Mode::FDOE) {
            return Error::IllegalParameter.code();
        }

        let mut channels = match self.lock() {
            Ok(channels) => channels,
            Err(code) => return code,
        };
        let slot = &mut channels[channel as usize];
        if slot.is_some() {
            return Error::AlreadyInitialized.code();
        }
        *slot = Some(Channel::new(mode));
        debug!("Loopback channel {} opened with mode {:?}", channel, mode);
        channel
    }

    fn configure(&self, handle: Handle, timing: &BitTiming) -> i32 {
        self.with_channel(handle, |channel| {
            if channel.running() {
                return Err(Error::Online);
            }
            channel.timing = Some(*timing);
            channel.queue.clear();
            channel.overrun = false;
            Ok(())
        })
    }

    fn reset(&self, handle: Handle) -> i32 {
        self.with_channel(handle, |channel| {
            if !channel.running() {
                return Err(Error::Offline);
            }
            channel.timing = None;
            channel.signals += 1;
            Ok(())
        })
    }

    fn read(&self, handle: Handle, frame: &mut HardwareFrame, timeout: u16) -> i32 {
        let mut channels = match self.lock() {
            Ok(channels) => channels,
            Err(code) => return code,
        };
        let deadline = Instant::now() + Duration::from_millis(timeout as u64);
        let generation = match lookup(&mut channels, handle.raw()) {
            Ok(channel) => channel.signals,
            Err(code) => return code,
        };

        loop {
            let channel = match lookup(&mut channels, handle.raw()) {
                Ok(channel) => channel,
                Err(code) => return code,
            };
            if !channel.running() {
                return Error::Offline.code();
            }
            if let Some(received) = channel.queue.pop_front() {
                *frame = received;
                return NO_ERROR;
            }
            if channel.signals != generation || timeout == 0 {
                return Error::RxEmpty.code();
            }

            channels = if timeout == INFINITE {
                match self.wakeup.wait(channels) {
                    Ok(channels) => channels,
                    Err(_) => return Error::Fatal.code(),
                }
            } else {
                let now = Instant::now();
                if now >= deadline {
                    return Error::Timeout.code();
                }
                match self.wakeup.wait_timeout(channels, deadline - now) {
                    Ok((channels, _)) => channels,
                    Err(_) => return Error::Fatal.code(),
                }
            };
        }
    }

    fn write(&self, handle: Handle, frame: &HardwareFrame, _timeout: u16) -> i32 {
        let timestamp = self.now();
        self.with_channel(handle, |channel| {
            if !channel.running() {
                return Err(Error::Offline);
            }
            channel.check_transmit(frame)?;

            let mut looped = *frame;
            looped.timestamp = timestamp;
            channel.enqueue(looped);
            Ok(())
        })
    }

    fn cancel(&self, handle: Handle) -> i32 {
        self.with_channel(handle, |channel| {
            channel.signals += 1;
            Ok(())
        })
    }

    fn status(&self, handle: Handle, status: &mut u8) -> i32 {
        self.with_channel(handle, |channel| {
            *status = channel.status().bits();
            Ok(())
        })
    }

    fn busload(&self, handle: Handle, load: &mut u8, status: &mut u8) -> i32 {
        self.with_channel(handle, |channel| {
            *load = 0;
            *status = channel.status().bits();
            Ok(())
        })
    }

    fn close(&self, handle: Handle) {
        if let Ok(mut channels) = self.lock() {
            if let Some(slot) = usize::try_from(handle.raw())
                .ok()
                .and_then(|idx| channels.get_mut(idx))
            {
                if slot.take().is_some() {
                    debug!("Loopback channel {} closed", handle.raw());
                }
            }
            self.wakeup.notify_all();
        }
    }

    fn hardware_version(&self, handle: Handle) -> Option<String> {
        let mut channels = self.lock().ok()?;
        lookup(&mut channels, handle.raw()).ok()?;
        Some(format!("Loopback CAN Interface, Channel {}", handle.raw()))
    }

    fn software_version(&self, handle: Handle) -> Option<String> {
        let mut channels = self.lock().ok()?;
        lookup(&mut channels, handle.raw()).ok()?;
        Some(format!("toucan {}", env!("CARGO_PKG_VERSION")))
    }
}
