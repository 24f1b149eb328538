//! Non-blocking driver core for bringing up a single TCP socket over a
//! GSM/GPRS modem's AT command set.
//!
//! The crate owns three tightly coupled subsystems: a multi-stage
//! [`state::State`] machine that walks the modem from power-on through SIM
//! unlock, network registration, GPRS attach, PDP activation, TCP connect
//! and byte-stream transfer; a framed AT-response [`parser::Parser`] that
//! tolerates echo, unsolicited result codes and the modem's `>` send
//! prompt; and a cooperative, single-threaded scheduler
//! ([`modem::Modem::process`]) that issues one command at a time and
//! backpressures reads/writes against modem-reported buffer credit.
//!
//! The core does not own a transport: the host supplies one by
//! implementing [`transport::Transport`], a non-blocking byte stream plus a
//! millisecond clock. The host calls [`modem::Modem::process`] repeatedly
//! from a single thread; every other call on [`modem::Modem`] must come
//! from that same thread.
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![cfg_attr(not(test), warn(missing_docs))]

pub mod command;
pub mod error;
mod logger;
pub mod modem;
pub mod parser;
pub mod queue;
pub mod socket;
pub mod state;
pub mod status;
pub mod transport;
pub mod urc;

pub use command::Command;
pub use error::Error;
pub use modem::{DefaultModem, Event, Modem};
pub use state::State;
pub use status::ModemStatus;
pub use transport::Transport;

/// Default size of the parser/command scratch buffer (bytes), per the
/// modem's framing contract. Must be at least 256.
pub const DEFAULT_BUFFER_SIZE: usize = 556;

/// Default depth of the command queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// Default response timeout for commands that don't override it (ms).
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;
