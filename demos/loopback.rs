use toucan::driver::{Loopback, INFINITE};
use toucan::{Message, Mode, Session};
use tracing_subscriber;

fn main() {
    tracing_subscriber::fmt::init();

    let mut session = Session::new(Loopback::new());
    session.connect(0, Mode::DEFAULT, 500_000).unwrap();

    let get_vin = Message::new(0x7df.into(), &[0x02, 0x09, 0x02]).unwrap();
    session.write(&get_vin, INFINITE).unwrap();

    let message = session.read(5000).unwrap();
    println!("{:?}", message);
    println!("{:?}", session.status().unwrap());

    session.teardown();
}
