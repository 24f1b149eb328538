//! Device lifecycle state and the socket sub-state nested inside it.

/// Lifecycle state of the modem.
///
/// Ordered: `rank()` is monotonically increasing along the lifecycle, so
/// predicates like [`State::registered`] and [`State::online`] are defined
/// in terms of rank rather than relying on the enum's discriminant values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
	/// Waiting for the modem to become responsive after `+CFUN=1,1`.
	Reset,
	/// Modem accepts AT commands; network has not been configured.
	Ready,
	/// Fatal condition (SIM missing, `+CFUN` reports non-functional). Only
	/// `reset()` recovers from this state.
	Error,
	/// Configured; waiting for network/GPRS registration.
	Searching,
	/// Registered on the network and GPRS-attached.
	Registered,
	/// `authenticate()` is in flight (PDP context bring-up).
	Authenticating,
	/// PDP context is active; no TCP socket is open.
	Online,
	/// `connect()` is in flight (`AT+CIPSTART`).
	Handshaking,
	/// TCP socket is open; see [`crate::socket::SocketState`] for the
	/// nested sub-state.
	Open,
	/// `close()` is in flight.
	Closing,
}

impl State {
	/// Position in the lifecycle, used to define ordering predicates.
	/// Not the same thing as `self as u8` by contract — only by
	/// coincidence of how the variants above happen to be listed.
	pub const fn rank(self) -> u8 {
		match self {
			State::Reset => 0,
			State::Ready => 1,
			State::Error => 2,
			State::Searching => 3,
			State::Registered => 4,
			State::Authenticating => 5,
			State::Online => 6,
			State::Handshaking => 7,
			State::Open => 8,
			State::Closing => 9,
		}
	}

	/// `true` once the modem has registered on the network and attached to
	/// GPRS (`State::Registered` or later in rank).
	pub fn registered(self) -> bool {
		self.rank() >= State::Registered.rank()
	}

	/// `true` once the PDP context is active (`State::Online` or later in
	/// rank).
	pub fn online(self) -> bool {
		self.rank() >= State::Online.rank()
	}

	/// `true` exactly when the TCP socket is open.
	pub fn connected(self) -> bool {
		matches!(self, State::Open)
	}

	/// `true` exactly in the fatal `Error` state.
	pub fn is_error(self) -> bool {
		matches!(self, State::Error)
	}
}
