use toucan::driver::{TouCan, INFINITE};
use toucan::{Mode, Session, SessionConfig};
use tracing_subscriber;

fn main() {
    tracing_subscriber::fmt::init();

    let config = SessionConfig {
        mode: Mode::MON,
        ..Default::default()
    };

    let mut session = Session::new(TouCan::load().unwrap());
    session.connect_with(&config).unwrap();

    println!("Hardware: {}", session.hardware_version().unwrap_or_default());
    println!("Software: {}", session.software_version().unwrap_or_default());

    loop {
        match session.read(INFINITE) {
            Ok(message) => println!("{:?}", message),
            Err(e) => {
                println!("{}", e);
                break;
            }
        }
    }
}
