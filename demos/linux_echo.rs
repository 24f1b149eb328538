//! Linux host demo: drives the modem over a non-blocking TCP stream
//! (stand-in for a UART) and echoes whatever the remote TCP peer sends
//! back once the socket opens.
//!
//! Adapted from `original_source/examples/linux/main.cpp`'s polling loop,
//! which drove the driver over non-blocking stdin/stdout. This version
//! swaps the transport for a `TcpStream` (so it can be exercised without
//! real modem hardware) but keeps the same "one poll loop, dispatch on
//! `state()`" shape.
//!
//! Not wired into the crate's build — copy into a `[[bin]]` target with a
//! `std` feature enabled to run it against a real device.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Instant;

use gsm_at_core::{DefaultModem, Event, Modem, State, Transport};

const APN: &str = "wholesale";
const HOST: &str = "127.0.0.1";
const PORT: u16 = 1883;

struct UartLike {
	stream: TcpStream,
	start: Instant,
}

impl Transport for UartLike {
	fn read(&mut self, buf: &mut [u8]) -> i32 {
		match self.stream.read(buf) {
			Ok(n) => n as i32,
			Err(e) if e.kind() == ErrorKind::WouldBlock => 0,
			Err(_) => -1,
		}
	}

	fn write(&mut self, buf: &[u8]) -> i32 {
		match self.stream.write(buf) {
			Ok(n) => n as i32,
			Err(e) if e.kind() == ErrorKind::WouldBlock => 0,
			Err(_) => -1,
		}
	}

	fn monotonic_millis(&mut self) -> u32 {
		self.start.elapsed().as_millis() as u32
	}
}

fn main() -> std::io::Result<()> {
	let stream = TcpStream::connect("127.0.0.1:9000")?;
	stream.set_nonblocking(true)?;
	let transport = UartLike {
		stream,
		start: Instant::now(),
	};

	let mut modem: DefaultModem<'_, UartLike> = Modem::new(transport);

	let mut on_event = |event: Event| {
		eprintln!("event: {event:?}");
	};
	modem.set_event_callback(&mut on_event);

	let mut rx_buf = [0u8; 256];
	let mut connected_once = false;

	loop {
		modem.process();

		match modem.state() {
			State::Ready => {
				modem.configure(APN).ok();
			}
			State::Registered => {
				modem.authenticate(APN, None, None).ok();
			}
			State::Online if !connected_once => {
				modem.connect(HOST, PORT).ok();
				connected_once = true;
			}
			State::Open => {
				if !modem.rx_busy() {
					modem.receive(&mut rx_buf);
				}
			}
			State::Error => {
				eprintln!("modem entered Error state, resetting");
				modem.reset().ok();
			}
			_ => {}
		}

		std::thread::sleep(std::time::Duration::from_millis(5));
	}
}
