//! The driver core: owns the command queue, parser, device/socket state and
//! the host-facing control API, and wires them together in [`Modem::process`].
//!
//! Ported from `original_source/include/modem.h` + `source/modem.cpp`'s
//! `Modem` class. The biggest structural change is the callback style: the
//! original's `void (*func)(State, void *user)` pairs become borrowed
//! `&'a mut dyn FnMut` trait objects that can capture their own state
//! directly, so no `user` pointer is threaded through.

use core::fmt::Write as _;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::logger::{at_debug, at_error, at_info, at_trace, at_warn};
use crate::parser::Parser;
use crate::queue::CommandQueue;
use crate::socket::{self, SocketState};
use crate::state::State;
use crate::status::{self, ModemStatus};
use crate::transport::Transport;
use crate::urc::{self, UrcAction};
use crate::DEFAULT_TIMEOUT_MS;

const POLLING_INTERVAL_MS: u32 = 20;
const READY_TIMEOUT_MS: u32 = 30_000;
const RESET_TIMEOUT_MS: u32 = 1_000;
const PING_TIMEOUT_MS: u32 = 1_000;
const POLL_TIMEOUT_MS: u32 = 10_000;
const CONFIGURE_TIMEOUT_MS: u32 = 5_000;
const CIPSHUT_TIMEOUT_MS: u32 = 65_000;
const CIICR_TIMEOUT_MS: u32 = 85_000;
const CIPSTART_TIMEOUT_MS: u32 = 75_000;
const CLOSE_TIMEOUT_MS: u32 = 30_000;
const SEND_TIMEOUT_MS: u32 = 10_000;
const CIFSR_TIMEOUT_MS: u32 = 1_000;

/// Runtime notification delivered through the event callback.
///
/// Unlike [`Error`], these never originate from a direct API call — they
/// surface anomalies observed while the driver is running (timeouts,
/// URCs, socket faults).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
	/// A non-ping command didn't get a response in time.
	Timeout,
	/// `+CPIN: NOT INSERTED` — fatal until [`Modem::reset`].
	SimError,
	/// `authenticate()`'s sequence failed (`ERROR` line or timeout).
	AuthError,
	/// `connect()`'s handshake failed (`CONNECT FAIL` or timeout).
	ConnError,
	/// A socket exchange failed (`ERROR`, `SEND FAIL`, or a timeout while
	/// `Open`).
	SockError,
	/// `+CIPRXGET: 4` reported more unread bytes than last observed.
	NewData,
	/// A `receive()` transfer finished, filled or interrupted.
	RxComplete,
	/// A `send()` transfer finished, drained or interrupted.
	TxComplete,
}

/// Convenience alias for a driver using the crate's default buffer and
/// queue sizing.
pub type DefaultModem<'a, T> = Modem<'a, T, { crate::DEFAULT_BUFFER_SIZE }, { crate::DEFAULT_QUEUE_DEPTH }>;

/// The non-blocking GSM/GPRS driver core.
///
/// `BUF` bounds both the command payload and the parser's accumulator;
/// `QUEUE` bounds how many not-yet-dispatched commands may be queued.
/// Borrowed callbacks and transfer buffers share the lifetime `'a`.
pub struct Modem<'a, T: Transport, const BUF: usize, const QUEUE: usize> {
	transport: T,
	queue: CommandQueue<BUF, QUEUE>,
	parser: Parser<BUF>,
	status: ModemStatus,
	/// State already installed and reported to the host.
	device_state: State,
	/// State the driver is transitioning toward; read by every dispatch
	/// and parse decision so a mid-tick transition takes effect
	/// immediately, mirroring the original's `status()` reading
	/// `next_state` rather than `device_state`.
	next_state: State,
	sock_state: SocketState,
	/// Set while an `AT+CIFSR` reply is expected, so a stray line during
	/// `Authenticating` isn't mistaken for an IP address.
	cifsr_flag: bool,
	command_timer: u32,
	update_timer: u32,
	reset_timer: Option<u32>,
	rx_buf: Option<&'a mut [u8]>,
	rx_index: usize,
	modem_rx_pending: usize,
	tx_buf: Option<&'a [u8]>,
	tx_index: usize,
	state_cb: Option<&'a mut dyn FnMut(State)>,
	event_cb: Option<&'a mut dyn FnMut(Event)>,
	error_cb: Option<&'a mut dyn FnMut(i32)>,
}

impl<'a, T: Transport, const BUF: usize, const QUEUE: usize> Modem<'a, T, BUF, QUEUE> {
	/// A freshly constructed driver, in `State::Reset`, with no callbacks
	/// or transfer buffers installed.
	pub fn new(transport: T) -> Self {
		Self {
			transport,
			queue: CommandQueue::new(),
			parser: Parser::new(),
			status: ModemStatus::new(),
			device_state: State::Reset,
			next_state: State::Reset,
			sock_state: SocketState::Command,
			cifsr_flag: false,
			command_timer: 0,
			update_timer: 0,
			reset_timer: None,
			rx_buf: None,
			rx_index: 0,
			modem_rx_pending: 0,
			tx_buf: None,
			tx_index: 0,
			state_cb: None,
			event_cb: None,
			error_cb: None,
		}
	}

	/// Install the callback fired synchronously on every state transition.
	pub fn set_state_callback(&mut self, cb: &'a mut dyn FnMut(State)) {
		self.state_cb = Some(cb);
	}

	/// Install the callback fired on runtime [`Event`]s.
	pub fn set_event_callback(&mut self, cb: &'a mut dyn FnMut(Event)) {
		self.event_cb = Some(cb);
	}

	/// Install the callback fired on `+CME ERROR: n`.
	pub fn set_error_callback(&mut self, cb: &'a mut dyn FnMut(i32)) {
		self.error_cb = Some(cb);
	}

	/// Drive the state machine one tick: reads whatever the transport has
	/// buffered, advances the command queue, and polls when idle.
	///
	/// Must be called repeatedly from the same thread that owns this
	/// `Modem`; every other method must be called from that same thread.
	pub fn process(&mut self) {
		if self.next_state != self.device_state {
			let now = self.now();
			self.update_timer = now.wrapping_add(POLLING_INTERVAL_MS);
			self.device_state = self.next_state;
			at_info!("state -> {:?}", self.device_state);
			self.emit_state(self.device_state);
		}

		if self.queue.is_in_flight() {
			let read = self.read_and_parse();
			if read == 0 {
				let now = self.now();
				if elapsed(now, self.command_timer) {
					self.handle_timeout();
				}
			}
		} else if !self.queue.is_empty() {
			self.dispatch_next();
		} else {
			let now = self.now();
			if elapsed(now, self.update_timer) {
				self.update_timer = now.wrapping_add(POLLING_INTERVAL_MS);
				let _ = self.poll_modem();
			}
		}

		if self.device_state == State::Reset {
			let now = self.now();
			match self.reset_timer {
				None => self.reset_timer = Some(now.wrapping_add(READY_TIMEOUT_MS)),
				Some(deadline) if elapsed(now, deadline) => {
					let _ = self.reset();
				}
				_ => {}
			}
		}
	}

	/// Reset the modem (`AT+CFUN=1,1`). Unconditional: always clears the
	/// queue, cached status and any in-progress transfer, and transitions
	/// to `State::Reset`.
	pub fn reset(&mut self) -> Result<()> {
		self.queue.clear();
		let cmd = Command::at(RESET_TIMEOUT_MS, b"+CFUN=1,1")?;
		self.queue.push(cmd)?;

		self.status = ModemStatus::new();
		self.stop_send();
		self.stop_receive();
		self.sock_state = SocketState::Command;
		self.modem_rx_pending = 0;

		at_info!("resetting modem");
		self.set_state(State::Reset);
		self.reset_timer = None;
		Ok(())
	}

	/// Configure the PDP context with the default preferred mode (38, LTE).
	pub fn configure(&mut self, apn: &str) -> Result<()> {
		self.configure_with_mode(apn, 38)
	}

	/// Configure the PDP context. Requires `state() != Reset`.
	pub fn configure_with_mode(&mut self, apn: &str, mode: u8) -> Result<()> {
		if self.next_state == State::Reset {
			return Err(Error::NoDevice);
		}
		if apn.is_empty() || apn.len() > 63 {
			return Err(Error::InvalidArgument);
		}

		let mut cnmp: heapless::String<16> = heapless::String::new();
		write!(cnmp, "+CNMP={mode}").map_err(|_| Error::PayloadTooLarge)?;

		let mut cgdcont: heapless::String<96> = heapless::String::new();
		write!(cgdcont, "+CGDCONT=1,\"IP\",\"{apn}\"").map_err(|_| Error::PayloadTooLarge)?;

		let cmd = Command::at(CONFIGURE_TIMEOUT_MS, b"+CMEE=1")?
			.chain(cnmp.as_bytes())?
			.chain(cgdcont.as_bytes())?;
		self.queue.push(cmd)?;

		self.set_state(State::Searching);
		Ok(())
	}

	/// Bring up the GPRS/PDP context. Requires `state() ∈ {Registered,
	/// Online}`.
	pub fn authenticate(&mut self, apn: &str, user: Option<&str>, pwd: Option<&str>) -> Result<()> {
		if apn.is_empty() || apn.len() > 63 {
			return Err(Error::InvalidArgument);
		}
		match self.next_state {
			State::Reset => return Err(Error::NoDevice),
			State::Ready | State::Error | State::Searching => return Err(Error::NetUnreachable),
			State::Authenticating => return Err(Error::AlreadyInProgress),
			State::Handshaking | State::Open | State::Closing => return Err(Error::Busy),
			State::Registered | State::Online => {}
		}

		let mut cstt: heapless::String<96> = heapless::String::new();
		let write_result = match (user, pwd) {
			(Some(u), Some(p)) => write!(cstt, "+CSTT=\"{apn}\",\"{u}\",\"{p}\""),
			(Some(u), None) => write!(cstt, "+CSTT=\"{apn}\",\"{u}\""),
			(None, _) => write!(cstt, "+CSTT=\"{apn}\""),
		};
		write_result.map_err(|_| Error::PayloadTooLarge)?;

		let sequence = Command::at(CIPSHUT_TIMEOUT_MS, b"+CIPSHUT")?
			.chain(b"+CIPMUX=0")?
			.chain(b"+CIPRXGET=1")?
			.chain(b"+CIPATS=1,1")?
			.chain(cstt.as_bytes())?;
		self.queue.push(sequence)?;

		let bring_up = Command::at(CIICR_TIMEOUT_MS, b"+CIICR")?;
		self.queue.push(bring_up)?;

		at_info!("authenticating");
		self.set_state(State::Authenticating);
		Ok(())
	}

	/// Open a TCP socket. Requires `state() == Online`.
	pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
		if host.is_empty() || port == 0 {
			return Err(Error::InvalidArgument);
		}
		match self.next_state {
			State::Reset => return Err(Error::NoDevice),
			State::Ready | State::Error | State::Searching => return Err(Error::NetUnreachable),
			State::Registered | State::Authenticating => return Err(Error::NotConnected),
			State::Handshaking => return Err(Error::AlreadyInProgress),
			State::Open => return Err(Error::AddressInUse),
			State::Closing => return Err(Error::Busy),
			State::Online => {}
		}

		let mut directive: heapless::String<96> = heapless::String::new();
		write!(directive, "+CIPSTART=\"TCP\",\"{host}\",{port}").map_err(|_| Error::PayloadTooLarge)?;
		let cmd = Command::at(CIPSTART_TIMEOUT_MS, directive.as_bytes())?;
		self.queue.push(cmd)?;

		at_info!("handshaking");
		self.set_state(State::Handshaking);
		Ok(())
	}

	/// Close the TCP socket, waiting for the server to acknowledge.
	/// Requires `state() == Open`.
	pub fn close(&mut self) -> Result<()> {
		self.close_with(false)
	}

	/// Close the TCP socket immediately (`+CIPCLOSE=1`), without waiting
	/// for acknowledgement. Requires `state() == Open`.
	pub fn close_quick(&mut self) -> Result<()> {
		self.close_with(true)
	}

	fn close_with(&mut self, quick: bool) -> Result<()> {
		match self.next_state {
			State::Reset => return Err(Error::NoDevice),
			State::Ready | State::Error | State::Searching => return Err(Error::NetUnreachable),
			State::Registered | State::Authenticating | State::Online | State::Handshaking => {
				return Err(Error::NotSocket)
			}
			State::Closing => return Err(Error::AlreadyInProgress),
			State::Open => {}
		}

		let cmd = if quick {
			Command::at(DEFAULT_TIMEOUT_MS, b"+CIPCLOSE=1")?
		} else {
			Command::at(CLOSE_TIMEOUT_MS, b"+CIPCLOSE")?
		};
		self.queue.push(cmd)?;

		at_info!("closing TCP connection");
		self.set_state(State::Closing);
		Ok(())
	}

	/// Stage `buf` as the destination for the next received bytes,
	/// replacing any buffer already staged.
	pub fn receive(&mut self, buf: &'a mut [u8]) {
		self.rx_buf = Some(buf);
		self.rx_index = 0;
	}

	/// Cancel an in-progress `receive()`. If a transfer was underway,
	/// emits `RxComplete` with whatever was copied so far.
	pub fn stop_receive(&mut self) {
		let was_busy = self.rx_busy();
		self.rx_buf = None;
		self.rx_index = 0;
		if was_busy {
			at_warn!("receive interrupted");
			self.emit_event(Event::RxComplete);
		}
	}

	/// Stage `buf` as the source for the next send, replacing any buffer
	/// already staged.
	pub fn send(&mut self, buf: &'a [u8]) {
		self.tx_buf = Some(buf);
		self.tx_index = 0;
	}

	/// Cancel an in-progress `send()`. If a transfer was underway, emits
	/// `TxComplete` with whatever was sent so far.
	pub fn stop_send(&mut self) {
		let was_busy = self.tx_busy();
		self.tx_buf = None;
		self.tx_index = 0;
		if was_busy {
			at_warn!("send interrupted");
			self.emit_event(Event::TxComplete);
		}
	}

	/// The driver's lifecycle state.
	pub fn state(&self) -> State {
		self.next_state
	}

	/// Cached modem readings (CSQ, registration codes, CIFSR, credit
	/// counters).
	pub fn status(&self) -> &ModemStatus {
		&self.status
	}

	/// `true` once registered on the network and GPRS-attached.
	pub fn registered(&self) -> bool {
		self.next_state.registered()
	}

	/// `true` while `authenticate()`'s sequence is in flight.
	pub fn authenticating(&self) -> bool {
		self.next_state == State::Authenticating
	}

	/// `true` once the PDP context is active.
	pub fn online(&self) -> bool {
		self.next_state.online()
	}

	/// `true` while `connect()`'s handshake is in flight.
	pub fn handshaking(&self) -> bool {
		self.next_state == State::Handshaking
	}

	/// `true` while `close()`'s sequence is in flight.
	pub fn closing(&self) -> bool {
		self.next_state == State::Closing
	}

	/// `true` exactly when the TCP socket is open.
	pub fn connected(&self) -> bool {
		self.next_state.connected()
	}

	/// Last `AT+CSQ` signal quality (0-31, or 99 for no signal).
	pub fn csq(&self) -> u8 {
		self.status.csq
	}

	/// Last `AT+CREG?` circuit-switched registration code.
	pub fn creg(&self) -> u8 {
		self.status.creg
	}

	/// Last `AT+CGREG?` GPRS registration code.
	pub fn cgreg(&self) -> u8 {
		self.status.cgreg
	}

	/// Last `AT+CEREG?` EPS registration code.
	pub fn cereg(&self) -> u8 {
		self.status.cereg
	}

	/// Last `AT+CGATT?` GPRS attach flag.
	pub fn cgatt(&self) -> u8 {
		self.status.cgatt
	}

	/// Last recorded `AT+CFUN` functional mode.
	pub fn cfun(&self) -> u8 {
		self.status.cfun
	}

	/// Last `AT+CIFSR` dotted-quad address, or empty before authentication
	/// succeeds.
	pub fn cifsr(&self) -> &str {
		self.status.cifsr.as_str()
	}

	/// Bytes the modem reports are buffered, awaiting `+CIPRXGET=2`.
	pub fn rx_available(&self) -> usize {
		self.status.rx_available
	}

	/// Bytes the modem will currently accept via `+CIPSEND`.
	pub fn tx_available(&self) -> usize {
		self.status.tx_available
	}

	/// `true` while a staged `receive()` buffer has room left and the
	/// socket is open.
	pub fn rx_busy(&self) -> bool {
		self.connected() && self.rx_buf.as_ref().map_or(false, |b| self.rx_index < b.len())
	}

	/// `true` while a staged `send()` buffer has bytes left and the socket
	/// is open.
	pub fn tx_busy(&self) -> bool {
		self.connected() && self.tx_buf.as_ref().map_or(false, |b| self.tx_index < b.len())
	}

	/// Bytes copied into the staged receive buffer so far.
	pub fn rx_count(&self) -> usize {
		if self.rx_buf.is_some() {
			self.rx_index
		} else {
			0
		}
	}

	/// Bytes sent from the staged send buffer so far.
	pub fn tx_count(&self) -> usize {
		if self.tx_buf.is_some() {
			self.tx_index
		} else {
			0
		}
	}

	fn now(&mut self) -> u32 {
		self.transport.monotonic_millis()
	}

	fn set_state(&mut self, state: State) {
		self.next_state = state;
	}

	fn emit_state(&mut self, state: State) {
		if let Some(cb) = self.state_cb.as_mut() {
			cb(state);
		}
	}

	fn emit_event(&mut self, event: Event) {
		if let Some(cb) = self.event_cb.as_mut() {
			cb(event);
		}
	}

	fn emit_error(&mut self, code: i32) {
		if let Some(cb) = self.error_cb.as_mut() {
			cb(code);
		}
	}

	fn complete_in_flight(&mut self) {
		if self.queue.is_in_flight() {
			self.queue.complete();
		}
	}

	fn read_and_parse(&mut self) -> usize {
		let mut chunk = [0u8; BUF];
		let n = self.transport.read(&mut chunk);
		if n <= 0 {
			return 0;
		}
		let n = n as usize;

		// Swap the parser out so its `load` callback can borrow the rest
		// of `self` freely without aliasing `self.parser`.
		let mut parser = core::mem::replace(&mut self.parser, Parser::new());
		parser.load(&chunk[..n], |unit| self.handle_unit(unit));
		self.parser = parser;
		n
	}

	fn dispatch_next(&mut self) {
		if let Some(cmd) = self.queue.dispatch() {
			let timeout_ms = cmd.timeout_ms();
			self.transport.write(cmd.data());
			let now = self.transport.monotonic_millis();
			self.command_timer = now.wrapping_add(timeout_ms);
		}
	}

	fn handle_timeout(&mut self) {
		let ignored = self.queue.in_flight().map_or(false, Command::is_ping);
		self.queue.take_timed_out();
		if ignored {
			return;
		}

		match self.device_state {
			State::Reset | State::Ready => {}
			State::Authenticating => {
				at_warn!("authentication timeout");
				self.set_state(State::Registered);
				self.emit_event(Event::AuthError);
			}
			State::Handshaking => {
				at_warn!("TCP connection timeout");
				self.set_state(State::Online);
				self.emit_event(Event::ConnError);
			}
			State::Open => {
				at_warn!("socket timeout");
				self.emit_event(Event::SockError);
			}
			State::Closing => {
				at_warn!("close timeout");
				self.set_state(State::Online);
			}
			State::Error | State::Searching | State::Registered | State::Online => {
				at_warn!("command timeout");
				self.emit_event(Event::Timeout);
			}
		}
	}

	fn poll_modem(&mut self) -> Result<()> {
		match self.next_state {
			State::Reset | State::Ready => {
				let now = self.now();
				self.update_timer = now.wrapping_add(PING_TIMEOUT_MS);
				let cmd = Command::ping(PING_TIMEOUT_MS)?;
				self.queue.push(cmd)?;
			}
			State::Searching | State::Registered | State::Online => {
				let cmd = Command::at(POLL_TIMEOUT_MS, b"+CSQ")?
					.chain(b"+CREG?")?
					.chain(b"+CGREG?")?
					.chain(b"+CEREG?")?
					.chain(b"+CGATT?")?;
				self.queue.push(cmd)?;
			}
			State::Authenticating => {
				let cmd = Command::at(CIFSR_TIMEOUT_MS, b"+CIFSR")?;
				self.queue.push(cmd)?;
				self.cifsr_flag = true;
			}
			State::Open => self.poll_socket()?,
			State::Handshaking | State::Error | State::Closing => {}
		}
		Ok(())
	}

	fn poll_socket(&mut self) -> Result<()> {
		let rx_requested = match &self.rx_buf {
			Some(b) => b.len().saturating_sub(self.rx_index),
			None => 0,
		};
		let tx_requested = match &self.tx_buf {
			Some(b) => b.len().saturating_sub(self.tx_index),
			None => 0,
		};

		if rx_requested > 0 && self.status.rx_available > 0 {
			self.socket_receive(rx_requested)?;
		} else if tx_requested > 0 && self.status.tx_available > 0 {
			self.socket_send(tx_requested)?;
		} else {
			let cmd = Command::at(DEFAULT_TIMEOUT_MS, b"+CSQ")?
				.chain(b"+CIPRXGET=4")?
				.chain(b"+CIPSEND?")?;
			self.queue.push(cmd)?;
		}
		Ok(())
	}

	fn socket_receive(&mut self, requested: usize) -> Result<()> {
		if self.sock_state != SocketState::Command {
			return Ok(());
		}

		let size = socket::receive_chunk_size(requested, self.status.rx_available, BUF);
		if size == 0 {
			return Ok(());
		}

		let mut directive: heapless::String<32> = heapless::String::new();
		write!(directive, "+CIPRXGET=2,{size}").map_err(|_| Error::PayloadTooLarge)?;
		let cmd = Command::at(DEFAULT_TIMEOUT_MS, directive.as_bytes())?;
		self.queue.push(cmd)?;

		at_debug!("requesting {} bytes ({} available)", size, self.status.rx_available);
		Ok(())
	}

	fn socket_send(&mut self, requested: usize) -> Result<()> {
		if self.sock_state != SocketState::Command {
			return Ok(());
		}

		let size = socket::send_chunk_size(requested, self.status.tx_available, BUF);
		if size == 0 {
			return Ok(());
		}

		let mut directive: heapless::String<32> = heapless::String::new();
		write!(directive, "+CIPSEND={size}").map_err(|_| Error::PayloadTooLarge)?;
		let cmd = Command::at(DEFAULT_TIMEOUT_MS, directive.as_bytes())?;
		self.queue.push(cmd)?;

		let start = self.tx_index;
		// `Option<&'a [u8]>` is `Copy`, so this reads a copy of the
		// reference rather than holding a borrow of `self.tx_buf`.
		if let Some(payload) = self.tx_buf.map(|b| &b[start..start + size]) {
			let raw = Command::raw(SEND_TIMEOUT_MS, payload)?;
			self.queue.push(raw)?;
		}

		self.sock_state = SocketState::Send;
		at_debug!("requesting to send {} bytes", size);
		Ok(())
	}

	fn handle_unit(&mut self, unit: &[u8]) {
		at_trace!("<- {:?}", unit);

		// A unit arriving mid-receive is a slice of the binary payload
		// itself, not a command response: it must go straight to
		// `parse_socket_receive` uninspected. Running it through the echo
		// guard or URC matching first would treat payload bytes that
		// happen to start with `AT` (or match a URC string) as protocol
		// framing and swallow them instead of copying them into `rx_buf`.
		if self.next_state == State::Open && self.sock_state == SocketState::Receive {
			self.parse_open(unit);
			return;
		}

		// Discard echo. Once off Reset, ask the modem to stop echoing so
		// this branch stops firing.
		if unit.len() >= 2 && &unit[..2] == b"AT" {
			if self.next_state != State::Reset {
				if let Ok(cmd) = Command::at(DEFAULT_TIMEOUT_MS, b"E0") {
					let _ = self.queue.push(cmd);
				}
			}
			return;
		}

		if let Some(action) = urc::try_match(unit) {
			self.apply_urc(action);
			return;
		}

		match self.next_state {
			State::Authenticating => self.parse_authenticating(unit),
			State::Handshaking => self.parse_handshaking(unit),
			State::Open => self.parse_open(unit),
			State::Closing => self.parse_closing(unit),
			State::Reset | State::Ready | State::Error | State::Searching | State::Registered | State::Online => {
				if unit.starts_with(b"OK\r") {
					self.complete_in_flight();
					if self.next_state == State::Reset {
						self.set_state(State::Ready);
					}
				}
			}
		}

		self.parse_general(unit);
	}

	fn apply_urc(&mut self, action: UrcAction) {
		match action {
			UrcAction::CmeError(code) => {
				at_error!("+CME ERROR: {}", code);
				self.emit_error(code);
			}
			UrcAction::SimReady => {
				if self.next_state.rank() < State::Searching.rank() {
					self.set_state(State::Ready);
				}
			}
			UrcAction::SimNotInserted => {
				at_error!("SIM card is not inserted");
				self.emit_event(Event::SimError);
				self.set_state(State::Error);
			}
			UrcAction::Cfun(mode) => {
				self.status.cfun = mode;
				if mode != 1 {
					at_warn!("modem offline");
					self.set_state(State::Error);
				}
			}
			UrcAction::PdpDeactivated => {
				if self.next_state.rank() > State::Registered.rank() {
					self.set_state(State::Registered);
				}
			}
		}
	}

	fn parse_general(&mut self, unit: &[u8]) {
		if let Some(v) = status::parse_trailing_u8(unit, b"+CSQ: ") {
			self.status.csq = v;
		} else if let Some(v) = status::parse_after_comma_u8(unit, b"+CREG: ") {
			self.status.creg = v;
		} else if let Some(v) = status::parse_after_comma_u8(unit, b"+CGREG: ") {
			self.status.cgreg = v;
		} else if let Some(v) = status::parse_after_comma_u8(unit, b"+CEREG: ") {
			self.status.cereg = v;
		} else if let Some(v) = status::parse_trailing_u8(unit, b"+CGATT: ") {
			self.status.cgatt = v;
		}

		// The Searching <-> Registered toggle is derived only while one of
		// those two states is current: once Authenticating or later, a
		// stray registration-code dip (or a CSQ line from the socket idle
		// poll) must not yank the state machine backwards.
		if matches!(self.next_state, State::Searching | State::Registered) {
			if self.status.registered() {
				if self.next_state == State::Searching {
					at_info!("registered");
					self.set_state(State::Registered);
				}
			} else if self.next_state == State::Registered {
				at_info!("searching for network");
				self.set_state(State::Searching);
			}
		}
	}

	fn parse_authenticating(&mut self, unit: &[u8]) {
		if unit.starts_with(b"OK\r") {
			self.complete_in_flight();
		} else if unit.starts_with(b"ERROR\r") {
			at_info!("authentication error");
			self.set_state(State::Registered);
			self.complete_in_flight();
			self.emit_event(Event::AuthError);
		} else if self.cifsr_flag {
			if let Some(ip) = status::parse_cifsr(unit) {
				self.status.cifsr = ip;
				at_info!("connected to GPRS");
				self.set_state(State::Online);
				self.complete_in_flight();
				self.cifsr_flag = false;
			}
		}
	}

	fn parse_handshaking(&mut self, unit: &[u8]) {
		if unit.starts_with(b"CONNECT OK\r") {
			at_info!("TCP socket connected");
			self.sock_state = SocketState::Command;
			self.set_state(State::Open);
			self.complete_in_flight();
		} else if unit.starts_with(b"ALREADY CONNECT\r") {
			at_info!("TCP socket reconnected");
			self.set_state(State::Open);
			self.complete_in_flight();
		} else if unit.starts_with(b"CONNECT FAIL\r") {
			at_warn!("TCP connection failed");
			self.set_state(State::Online);
			self.emit_event(Event::ConnError);
			self.complete_in_flight();
		}
	}

	fn parse_closing(&mut self, unit: &[u8]) {
		if unit.starts_with(b"CLOSE OK") {
			at_info!("TCP socket closed");
			self.set_state(State::Online);
			self.complete_in_flight();
		} else if unit.starts_with(b"ERROR\r") {
			at_info!("error during close");
			self.set_state(State::Online);
			self.complete_in_flight();
		}
	}

	fn parse_open(&mut self, unit: &[u8]) {
		match self.sock_state {
			SocketState::Command => self.parse_socket_command(unit),
			SocketState::Receive => self.parse_socket_receive(unit),
			SocketState::Send => self.parse_socket_send(unit),
		}
	}

	fn parse_socket_command(&mut self, unit: &[u8]) {
		if unit.starts_with(b"OK\r") {
			self.complete_in_flight();
		} else if unit.starts_with(b"ERROR\r") {
			at_info!("socket error");
			self.complete_in_flight();
			self.emit_event(Event::SockError);
		} else if unit.starts_with(b"TCP CLOSED\r") {
			at_info!("TCP socket disconnected");
			self.stop_send();
			self.stop_receive();
			self.sock_state = SocketState::Command;
			self.set_state(State::Online);
		} else if let Some(count) = socket::parse_cipget4_count(unit) {
			if count > self.status.rx_available {
				self.emit_event(Event::NewData);
			}
			self.status.rx_available = count;
		} else if let Some(count) = socket::parse_cipget2_count(unit) {
			self.modem_rx_pending = count;
			self.status.rx_available = self.status.rx_available.saturating_sub(count);
			self.sock_state = SocketState::Receive;
		} else if let Some(credit) = socket::parse_cipsend_credit(unit) {
			self.status.tx_available = credit;
		}
	}

	fn parse_socket_receive(&mut self, unit: &[u8]) {
		let mut count = self.modem_rx_pending.min(unit.len());
		self.modem_rx_pending -= count;

		let mut completed = false;
		match self.rx_buf.as_deref_mut() {
			Some(buf) if self.rx_index < buf.len() => {
				let room = buf.len() - self.rx_index;
				if count > room {
					count = room;
				}
				buf[self.rx_index..self.rx_index + count].copy_from_slice(&unit[..count]);
				self.rx_index += count;
				at_debug!("received {} bytes", count);
				completed = self.rx_index == buf.len();
			}
			_ => {
				at_warn!("discarded {} bytes", count);
			}
		}

		if completed {
			self.emit_event(Event::RxComplete);
		}

		if self.modem_rx_pending == 0 {
			self.sock_state = SocketState::Command;
		}
	}

	fn parse_socket_send(&mut self, unit: &[u8]) {
		if unit == b">" {
			self.complete_in_flight();
		} else if unit.starts_with(b"OK\r") {
			self.complete_in_flight();
		} else if unit.starts_with(b"ERROR\r") {
			at_info!("socket error");
			self.complete_in_flight();
			self.emit_event(Event::SockError);
		} else if unit.starts_with(b"SEND OK\r") {
			let count = self.queue.in_flight().map_or(0, |c| c.data().len());
			self.tx_index += count;
			at_debug!("sent {} bytes", count);
			let done = self.tx_buf.as_ref().map_or(false, |b| self.tx_index == b.len());
			if done {
				self.emit_event(Event::TxComplete);
			}
			self.sock_state = SocketState::Command;
			self.complete_in_flight();
		} else if unit.starts_with(b"SEND FAIL\r") {
			self.sock_state = SocketState::Command;
			self.emit_event(Event::SockError);
			self.complete_in_flight();
		}
	}
}

/// Wrap-safe `now >= deadline` using a signed 32-bit comparison, so a
/// 49.7-day wrap of the millisecond clock is handled correctly.
fn elapsed(now: u32, deadline: u32) -> bool {
	(now.wrapping_sub(deadline) as i32) > 0
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::vec::Vec;

	/// In-memory transport: a fixed clock step plus a byte queue the test
	/// pre-loads with the modem's scripted replies.
	struct MockTransport {
		inbox: Vec<u8>,
		outbox: Vec<u8>,
		millis: u32,
	}

	impl MockTransport {
		fn new() -> Self {
			Self {
				inbox: Vec::new(),
				outbox: Vec::new(),
				millis: 0,
			}
		}

		fn feed(&mut self, data: &[u8]) {
			self.inbox.extend_from_slice(data);
		}

		fn advance(&mut self, ms: u32) {
			self.millis = self.millis.wrapping_add(ms);
		}
	}

	impl Transport for MockTransport {
		fn read(&mut self, buf: &mut [u8]) -> i32 {
			let n = buf.len().min(self.inbox.len());
			buf[..n].copy_from_slice(&self.inbox[..n]);
			self.inbox.drain(..n);
			n as i32
		}

		fn write(&mut self, buf: &[u8]) -> i32 {
			self.outbox.extend_from_slice(buf);
			buf.len() as i32
		}

		fn monotonic_millis(&mut self) -> u32 {
			self.millis
		}
	}

	type TestModem<'a> = Modem<'a, MockTransport, 128, 4>;

	#[test]
	fn configure_before_ready_is_no_device() {
		let mut modem: TestModem = Modem::new(MockTransport::new());
		assert_eq!(modem.configure("internet").unwrap_err(), Error::NoDevice);
	}

	#[test]
	fn authenticate_requires_registration() {
		let mut modem: TestModem = Modem::new(MockTransport::new());
		modem.set_state(State::Searching);
		assert_eq!(
			modem.authenticate("internet", None, None).unwrap_err(),
			Error::NetUnreachable
		);
	}

	#[test]
	fn connect_while_open_is_address_in_use() {
		let mut modem: TestModem = Modem::new(MockTransport::new());
		modem.set_state(State::Open);
		assert_eq!(modem.connect("1.2.3.4", 80).unwrap_err(), Error::AddressInUse);
	}

	#[test]
	fn reset_is_idempotent() {
		let mut modem: TestModem = Modem::new(MockTransport::new());
		modem.reset().unwrap();
		modem.reset().unwrap();
		assert_eq!(modem.state(), State::Reset);
		assert!(modem.queue.is_empty());
		assert_eq!(modem.csq(), status::CSQ_NO_SIGNAL);
	}

	#[test]
	fn ping_ok_in_reset_advances_to_ready() {
		let mut modem: TestModem = Modem::new(MockTransport::new());
		modem.process(); // installs Reset, starts reset_timer
		modem.process(); // dispatches the AT ping
		modem.transport.feed(b"AT\r\r\nOK\r\n");
		modem.process(); // reads, discards echo, frees ping on OK
		assert_eq!(modem.state(), State::Ready);
	}

	#[test]
	fn command_timeout_emits_timeout_event_once() {
		let mut modem: TestModem = Modem::new(MockTransport::new());
		modem.set_state(State::Searching);
		modem.process();
		let cmd = Command::at(1000, b"+X").unwrap();
		modem.queue.push(cmd).unwrap();

		let count = core::cell::Cell::new(0);
		{
			let mut on_event = |e: Event| {
				if e == Event::Timeout {
					count.set(count.get() + 1);
				}
			};
			modem.set_event_callback(&mut on_event);
			modem.process(); // dispatch
			modem.transport.advance(1100);
			modem.process(); // observe timeout

			assert_eq!(count.get(), 1);
			assert!(!modem.queue.is_in_flight());
		}
	}

	#[test]
	fn ping_timeout_is_silently_ignored() {
		let mut modem: TestModem = Modem::new(MockTransport::new());
		modem.process();
		modem.process(); // dispatches the AT ping
		modem.transport.advance(1100);

		let mut count = 0;
		{
			let mut on_event = |_: Event| count += 1;
			modem.set_event_callback(&mut on_event);
			modem.process();
		}
		assert_eq!(count, 0);
	}

	#[test]
	fn elapsed_handles_wraparound() {
		let deadline = 10u32;
		assert!(!elapsed(5, deadline));
		assert!(elapsed(11, deadline));
		let now0 = u32::MAX - 2;
		let deadline = now0.wrapping_add(10);
		assert!(!elapsed(now0.wrapping_add(9), deadline));
		assert!(elapsed(now0.wrapping_add(11), deadline));
	}
}
