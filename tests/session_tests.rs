use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use toucan::bitrate::BitTiming;
use toucan::can::{HardwareFrame, CAN_MAX_LEN};
use toucan::driver::{Driver, Handle, Loopback, INFINITE};
use toucan::{Bitrate, Error, Identifier, Message, Mode, Session, SessionConfig, State, Status};

/// Calls observed by [`Scripted`], shared with the test after the driver moved into a session.
#[derive(Default)]
struct Calls {
    opens: AtomicUsize,
    configures: Mutex<Vec<BitTiming>>,
    closes: Mutex<Vec<i32>>,
    writes: Mutex<Vec<HardwareFrame>>,
    /// Status code returned by every read
    read: AtomicI32,
    /// Frame returned by reads instead of the default response
    rx: Mutex<Option<HardwareFrame>>,
}

/// Driver returning fixed status codes, for injecting failures.
struct Scripted {
    calls: Arc<Calls>,
    open: i32,
    configure: i32,
    write: i32,
    status: (i32, u8),
    busload: (i32, u8, u8),
}

impl Scripted {
    fn new() -> (Self, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let driver = Scripted {
            calls: calls.clone(),
            open: 0,
            configure: 0,
            write: 0,
            status: (0, 0),
            busload: (0, 0, 0),
        };
        (driver, calls)
    }
}

impl Driver for Scripted {
    fn open(&self, _channel: i32, _mode: Mode) -> i32 {
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        self.open
    }

    fn configure(&self, _handle: Handle, timing: &BitTiming) -> i32 {
        self.calls.configures.lock().unwrap().push(*timing);
        self.configure
    }

    fn reset(&self, _handle: Handle) -> i32 {
        0
    }

    fn read(&self, _handle: Handle, frame: &mut HardwareFrame, _timeout: u16) -> i32 {
        match *self.calls.rx.lock().unwrap() {
            Some(rx) => *frame = rx,
            None => {
                frame.id = 0x7e8;
                frame.dlc = 3;
                frame.data[..CAN_MAX_LEN]
                    .copy_from_slice(&[0x03, 0x49, 0x02, 0x55, 0x55, 0x55, 0x55, 0x55]);
            }
        }
        self.calls.read.load(Ordering::SeqCst)
    }

    fn write(&self, _handle: Handle, frame: &HardwareFrame, _timeout: u16) -> i32 {
        self.calls.writes.lock().unwrap().push(*frame);
        self.write
    }

    fn cancel(&self, _handle: Handle) -> i32 {
        0
    }

    fn status(&self, _handle: Handle, status: &mut u8) -> i32 {
        *status = self.status.1;
        self.status.0
    }

    fn busload(&self, _handle: Handle, load: &mut u8, status: &mut u8) -> i32 {
        *load = self.busload.1;
        *status = self.busload.2;
        self.busload.0
    }

    fn close(&self, handle: Handle) {
        self.calls.closes.lock().unwrap().push(handle.raw());
    }

    fn hardware_version(&self, _handle: Handle) -> Option<String> {
        None
    }

    fn software_version(&self, _handle: Handle) -> Option<String> {
        Some(String::from("1.0"))
    }
}

#[test]
fn example_scenario() {
    let mut session = Session::new(Loopback::new());
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();

    let get_vin = Message::new(0x7df.into(), &[0x02, 0x09, 0x02]).unwrap();
    session.write(&get_vin, INFINITE).unwrap();

    let message = session.read(5000).unwrap();
    assert_eq!(message.id(), Identifier::Standard(0x7df));
    assert_eq!(message.dlc(), 3);
    assert_eq!(message.data(), &[0x02, 0x09, 0x02]);

    let start = Instant::now();
    assert_eq!(session.read(50), Err(Error::Timeout));
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn write_pads_wire_frame() {
    let (driver, calls) = Scripted::new();
    let mut session = Session::new(driver);
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();

    let get_vin = Message::new(0x7df.into(), &[0x02, 0x09, 0x02]).unwrap();
    session.write(&get_vin, INFINITE).unwrap();

    let writes = calls.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].dlc, 3);
    assert_eq!(
        writes[0].data[..CAN_MAX_LEN],
        [0x02, 0x09, 0x02, 0x55, 0x55, 0x55, 0x55, 0x55]
    );
}

#[test]
fn read_strips_wire_padding() {
    let (driver, _calls) = Scripted::new();
    let mut session = Session::new(driver);
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();

    let message = session.read(INFINITE).unwrap();
    assert_eq!(message.id(), Identifier::Standard(0x7e8));
    assert_eq!(message.data(), &[0x03, 0x49, 0x02]);
}

#[test]
fn connect_resolves_bitrate() {
    let (driver, calls) = Scripted::new();
    let mut session = Session::new(driver);
    session.connect(0, Mode::DEFAULT, 125_000).unwrap();

    assert_eq!(session.state(), State::Running);
    assert_eq!(
        calls.configures.lock().unwrap().as_slice(),
        &[Bitrate::Rate125K.timing()]
    );
}

#[test]
fn connect_unsupported_bitrate() {
    let (driver, calls) = Scripted::new();
    let mut session = Session::new(driver);

    for nominal in [83_333, 0, -1] {
        assert_eq!(
            session.connect(0, Mode::DEFAULT, nominal),
            Err(Error::Baudrate)
        );
    }
    assert_eq!(calls.opens.load(Ordering::SeqCst), 0);
    assert_eq!(session.state(), State::Closed);
}

#[test]
fn connect_open_failure() {
    let (mut driver, calls) = Scripted::new();
    driver.open = -92;
    let mut session = Session::new(driver);

    assert_eq!(session.connect(0, Mode::DEFAULT, 500_000), Err(Error::Handle));
    assert_eq!(session.state(), State::Closed);
    assert!(!session.handle().is_valid());
    assert!(calls.configures.lock().unwrap().is_empty());

    drop(session);
    assert!(calls.closes.lock().unwrap().is_empty());
}

#[test]
fn connect_open_unknown_code() {
    let (mut driver, _calls) = Scripted::new();
    driver.open = -599;
    let mut session = Session::new(driver);

    assert_eq!(
        session.connect(0, Mode::DEFAULT, 500_000),
        Err(Error::Unknown(-599))
    );
}

#[test]
fn connect_configure_failure_releases_handle() {
    let (mut driver, calls) = Scripted::new();
    driver.open = 4;
    driver.configure = -99;
    let mut session = Session::new(driver);

    assert_eq!(session.connect(4, Mode::DEFAULT, 500_000), Err(Error::Fatal));
    assert_eq!(session.state(), State::Closed);
    assert!(!session.handle().is_valid());
    assert_eq!(calls.closes.lock().unwrap().as_slice(), &[4]);

    // No second release on teardown or drop
    session.teardown();
    drop(session);
    assert_eq!(calls.closes.lock().unwrap().as_slice(), &[4]);
}

#[test]
fn connect_twice() {
    let (mut driver, calls) = Scripted::new();
    driver.open = 1;
    let mut session = Session::new(driver);

    session.connect(1, Mode::DEFAULT, 500_000).unwrap();
    assert_eq!(
        session.connect(2, Mode::DEFAULT, 250_000),
        Err(Error::AlreadyInitialized)
    );

    assert_eq!(session.state(), State::Running);
    assert_eq!(session.handle().raw(), 1);
    assert_eq!(session.bitrate(), Some(Bitrate::Rate500K));
    assert_eq!(calls.opens.load(Ordering::SeqCst), 1);
    assert!(calls.closes.lock().unwrap().is_empty());
}

#[test]
fn operations_require_running() {
    let mut session = Session::new(Loopback::new());
    let message = Message::new(0x123.into(), &[1]).unwrap();

    let check = |session: &Session<Loopback>| {
        assert_eq!(session.read(0), Err(Error::NotInitialized));
        assert_eq!(session.write(&message, 0), Err(Error::NotInitialized));
        assert_eq!(session.status(), Err(Error::NotInitialized));
        assert_eq!(session.busload(), Err(Error::NotInitialized));
        assert_eq!(session.kill(), Err(Error::NotInitialized));
    };

    // Closed
    check(&session);

    // Configured
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();
    session.reset().unwrap();
    assert_eq!(session.state(), State::Configured);
    check(&session);
    assert_eq!(session.reset(), Err(Error::NotInitialized));

    session.start(500_000).unwrap();
    assert_eq!(session.start(500_000), Err(Error::NotInitialized));
    session.write(&message, 0).unwrap();
    assert_eq!(session.read(0).unwrap().data(), &[1]);
}

#[test]
fn restart_with_unsupported_bitrate() {
    let mut session = Session::new(Loopback::new());
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();
    session.reset().unwrap();

    assert_eq!(session.start(800_000), Err(Error::Baudrate));
    assert_eq!(session.state(), State::Configured);
}

#[test]
fn write_rejects_empty_before_encoding() {
    let (driver, calls) = Scripted::new();
    let mut session = Session::new(driver);
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();

    let empty = Message::new(0x123.into(), &[]).unwrap();
    assert_eq!(session.write(&empty, 0), Err(Error::IllegalParameter));

    let fd = Message::builder(0x123.into())
        .data(&[0; 16])
        .fd(true)
        .build()
        .unwrap();
    assert_eq!(session.write(&fd, 0), Err(Error::NotSupported));

    assert!(calls.writes.lock().unwrap().is_empty());
}

#[test]
fn driver_errors_are_mapped() {
    let (mut driver, calls) = Scripted::new();
    driver.write = -20;
    driver.status = (-92, 0);
    driver.busload = (-98, 0, 0);
    let mut session = Session::new(driver);
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();

    let message = Message::new(0x123.into(), &[1]).unwrap();
    assert_eq!(session.write(&message, 0), Err(Error::TxBusy));
    assert_eq!(session.status(), Err(Error::Handle));
    assert_eq!(session.busload(), Err(Error::NotSupported));

    let codes = [
        (-50, Error::Timeout),
        (-30, Error::RxEmpty),
        (-1234, Error::Unknown(-1234)),
    ];
    for (code, error) in codes {
        calls.read.store(code, Ordering::SeqCst);
        assert_eq!(session.read(100), Err(error));
    }
}

#[test]
fn status_and_busload() {
    let (mut driver, _calls) = Scripted::new();
    driver.status = (0, 0x24);
    driver.busload = (0, 37, 0x40);
    let mut session = Session::new(driver);
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();

    let status = session.status().unwrap();
    assert_eq!(status.bits(), 0x24);
    assert!(status.contains(Status::WARNING | Status::RX_EMPTY));

    let busload = session.busload().unwrap();
    assert_eq!(busload.load, 0.37);
    assert_eq!(busload.status, Status::BUS_OFF);
}

#[test]
fn loopback_status() {
    let mut session = Session::new(Loopback::new());
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();

    let status = session.status().unwrap();
    assert!(status.is_running());
    assert!(status.contains(Status::RX_EMPTY));

    let message = Message::new(0x123.into(), &[1, 2]).unwrap();
    session.write(&message, 0).unwrap();
    assert!(!session.status().unwrap().contains(Status::RX_EMPTY));
    assert_eq!(session.busload().unwrap().load, 0.0);
}

#[test]
fn teardown_twice() {
    let (mut driver, calls) = Scripted::new();
    driver.open = 2;
    let mut session = Session::new(driver);
    session.connect(2, Mode::DEFAULT, 500_000).unwrap();

    session.teardown();
    session.teardown();
    assert_eq!(session.state(), State::Closed);
    drop(session);

    assert_eq!(calls.closes.lock().unwrap().as_slice(), &[2]);
}

#[test]
fn drop_releases_handle() {
    let (mut driver, calls) = Scripted::new();
    driver.open = 5;
    {
        let mut session = Session::new(driver);
        session.connect(5, Mode::DEFAULT, 500_000).unwrap();
    }
    assert_eq!(calls.closes.lock().unwrap().as_slice(), &[5]);
}

#[test]
fn reconnect_after_teardown() {
    let mut session = Session::new(Loopback::new());
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();
    session.teardown();
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();
    assert_eq!(session.state(), State::Running);
}

#[test]
fn kill_unblocks_read() {
    let mut session = Session::new(Loopback::new());
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();
    let session = &session;

    let start = Instant::now();
    std::thread::scope(|s| {
        let reader = s.spawn(move || session.read(INFINITE));

        // Keep signalling until the reader is actually blocked and returns
        while !reader.is_finished() {
            std::thread::sleep(Duration::from_millis(10));
            session.kill().unwrap();
        }

        assert_eq!(reader.join().unwrap().unwrap_err(), Error::RxEmpty);
    });
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn versions() {
    let mut session = Session::new(Loopback::new());
    assert_eq!(session.hardware_version(), None);
    assert_eq!(session.software_version(), None);

    session.connect(1, Mode::DEFAULT, 500_000).unwrap();
    assert!(session.hardware_version().unwrap().contains("Channel 1"));
    assert!(session.software_version().is_some());

    session.teardown();
    assert_eq!(session.software_version(), None);
}

#[test]
fn connect_with_config() {
    let (driver, calls) = Scripted::new();
    let mut session = Session::new(driver);

    let config = SessionConfig {
        mode: Mode::NRTR,
        bitrate: 20_000,
        ..Default::default()
    };
    session.connect_with(&config).unwrap();

    assert_eq!(session.mode(), Mode::NRTR);
    assert_eq!(
        calls.configures.lock().unwrap().as_slice(),
        &[Bitrate::Rate20K.timing()]
    );
}

#[test]
fn loopback_mode_checks() {
    let mut session = Session::new(Loopback::new());
    session.connect(0, Mode::NXTD, 500_000).unwrap();

    let extended = Message::new(Identifier::Extended(0x18daf110), &[1]).unwrap();
    assert_eq!(session.write(&extended, 0), Err(Error::IllegalParameter));

    let mut session = Session::new(Loopback::new());
    assert_eq!(
        session.connect(0, Mode::BRSE, 500_000),
        Err(Error::IllegalParameter)
    );
}

#[test]
fn decode_fd_frame_not_supported() {
    let (driver, calls) = Scripted::new();
    let mut frame = HardwareFrame::default();
    frame.id = 0x123;
    frame.flags = 0x04;
    frame.dlc = 9;
    *calls.rx.lock().unwrap() = Some(frame);

    let mut session = Session::new(driver);
    session.connect(6, Mode::FDOE, 500_000).unwrap();

    assert_eq!(session.read(0), Err(Error::NotSupported));
}

#[test]
fn kill_does_not_cancel_later_reads() {
    let mut session = Session::new(Loopback::new());
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();
    session.kill().unwrap();

    let start = Instant::now();
    assert_eq!(session.read(50), Err(Error::Timeout));
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn write_out_of_range_identifier() {
    let mut session = Session::new(Loopback::new());
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();

    // Rejected before reaching the driver
    assert_eq!(
        Message::new(Identifier::Standard(0x800), &[1]),
        Err(Error::IllegalParameter)
    );

    let message = Message::new(Identifier::Standard(0x7ff), &[1]).unwrap();
    session.write(&message, 0).unwrap();
    assert_eq!(session.read(0).unwrap().id(), Identifier::Standard(0x7ff));
}
