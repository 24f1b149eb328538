//! A single AT command frame: payload bytes plus a response timeout.
//!
//! Ported from `command.h`/`command.cpp`: a [`Command`] starts life as
//! `"AT" + directive + "\r"`, and [`Command::chain`] can fold additional
//! directives into the same frame by turning the trailing `\r` into a `;`
//! (e.g. `command("+X").chain("+Y")` produces `"AT+X;+Y\r"`). Socket payload
//! bytes are sent as a separate, unprefixed raw frame via [`Command::raw`].

use crate::error::{Error, Result};
use crate::DEFAULT_TIMEOUT_MS;

/// One AT command (or chained group of directives), owned by the queue
/// from the moment it's pushed until it completes, times out, or the queue
/// is cleared.
#[derive(Clone, Debug)]
pub struct Command<const BUF: usize> {
	payload: heapless::Vec<u8, BUF>,
	timeout_ms: u32,
	/// `true` for a raw socket-data frame: no `AT` prefix, no `\r`
	/// terminator, sent verbatim after a `>` send prompt.
	raw: bool,
}

impl<const BUF: usize> Command<BUF> {
	/// Build `"AT" + directive + "\r"` with the given response timeout.
	pub fn at(timeout_ms: u32, directive: &[u8]) -> Result<Self> {
		let mut payload = heapless::Vec::new();
		payload
			.extend_from_slice(b"AT")
			.map_err(|_| Error::PayloadTooLarge)?;
		payload
			.extend_from_slice(directive)
			.map_err(|_| Error::PayloadTooLarge)?;
		payload.push(b'\r').map_err(|_| Error::PayloadTooLarge)?;
		Ok(Self {
			payload,
			timeout_ms,
			raw: false,
		})
	}

	/// A bare `"AT\r"` ping, used for modem-ready polling.
	pub fn ping(timeout_ms: u32) -> Result<Self> {
		Self::at(timeout_ms, b"")
	}

	/// A command with the crate's default timeout.
	pub fn new(directive: &[u8]) -> Result<Self> {
		Self::at(DEFAULT_TIMEOUT_MS, directive)
	}

	/// A frame of raw bytes sent as-is (no `AT` prefix or terminator),
	/// used for socket payload data written after a `>` send prompt.
	pub fn raw(timeout_ms: u32, data: &[u8]) -> Result<Self> {
		let mut payload = heapless::Vec::new();
		payload
			.extend_from_slice(data)
			.map_err(|_| Error::PayloadTooLarge)?;
		Ok(Self {
			payload,
			timeout_ms,
			raw: true,
		})
	}

	/// Fold another directive into this command: `"AT+X\r"` followed by
	/// `.chain("+Y")` becomes `"AT+X;+Y\r"`.
	pub fn chain(mut self, directive: &[u8]) -> Result<Self> {
		if self.raw {
			return Err(Error::InvalidArgument);
		}
		if self.payload.len() == 3 {
			// "AT\r" -> "AT"
			self.payload.pop();
		} else {
			// Swap the trailing '\r' for a ';'.
			*self.payload.last_mut().expect("non-empty payload") = b';';
		}
		self.payload
			.extend_from_slice(directive)
			.map_err(|_| Error::PayloadTooLarge)?;
		self.payload.push(b'\r').map_err(|_| Error::PayloadTooLarge)?;
		Ok(self)
	}

	/// The command's wire bytes.
	pub fn data(&self) -> &[u8] {
		&self.payload
	}

	/// The configured response timeout, in milliseconds.
	pub fn timeout_ms(&self) -> u32 {
		self.timeout_ms
	}

	/// `true` if this is the bare `"AT\r"` ping (timeouts on it are
	/// silently ignored per spec §7).
	pub fn is_ping(&self) -> bool {
		!self.raw && self.payload.len() == 3
	}

	/// `true` for a raw socket-data frame.
	pub fn is_raw(&self) -> bool {
		self.raw
	}
}
