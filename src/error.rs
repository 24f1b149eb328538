//! Error taxonomy for the driver's synchronous API calls.
//!
//! Runtime anomalies (timeouts, socket errors, SIM failures) never appear
//! here — they surface exclusively as [`crate::modem::Event`]s delivered to
//! the event callback. This enum covers only the preconditions and resource
//! limits an API call can fail synchronously.

use core::fmt;

/// Error returned synchronously by an API call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
	/// An argument was null, empty, or exceeded a length limit.
	InvalidArgument,
	/// The call requires the modem to have left `State::Reset`.
	NoDevice,
	/// The call requires network registration, which hasn't happened yet.
	NetUnreachable,
	/// The call requires an active GPRS/PDP context.
	NotConnected,
	/// The call requires an open TCP socket.
	NotSocket,
	/// The requested operation is already in progress.
	AlreadyInProgress,
	/// `connect()` was called while a socket is already open.
	AddressInUse,
	/// The modem is mid-transition and can't accept this call yet.
	Busy,
	/// The command queue is full.
	BufferFull,
	/// The command payload would exceed the configured buffer size.
	PayloadTooLarge,
	/// A bounded allocation (queue slot, buffer) could not be obtained.
	OutOfMemory,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let msg = match self {
			Error::InvalidArgument => "invalid argument",
			Error::NoDevice => "modem is not responsive (in reset)",
			Error::NetUnreachable => "network is not reachable yet",
			Error::NotConnected => "GPRS/PDP context is not active",
			Error::NotSocket => "no TCP socket is open",
			Error::AlreadyInProgress => "operation already in progress",
			Error::AddressInUse => "a socket is already open",
			Error::Busy => "modem is busy with a transient operation",
			Error::BufferFull => "command queue is full",
			Error::PayloadTooLarge => "command payload exceeds the buffer size",
			Error::OutOfMemory => "no buffer space available",
		};
		f.write_str(msg)
	}
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result alias for the crate's synchronous API.
pub type Result<T> = core::result::Result<T, Error>;
