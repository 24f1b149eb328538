//! The socket sub-state machine nested inside `State::Open`.
//!
//! Ported from `modem.cpp`'s `poll_socket`/`socket_receive`/`socket_send`/
//! `parse_socket*` family. Only [`SocketState::Command`] may issue new
//! commands; `Receive`/`Send` are entered once a `+CIPRXGET=2`/`+CIPSEND`
//! exchange is under way and exited once the transfer completes.

/// Sub-state of the socket, valid only while the device is in
/// `State::Open`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketState {
	/// Idle; may issue a new receive/send/poll command.
	Command,
	/// A `+CIPRXGET=2` exchange is in progress; raw bytes are being
	/// copied into the receive buffer.
	Receive,
	/// A `+CIPSEND` exchange is in progress, awaiting the `>` prompt or
	/// the `SEND OK`/`SEND FAIL` terminator.
	Send,
}

/// Per spec: each data chunk must stay under the wire buffer size to leave
/// room for protocol framing overhead.
pub const fn socket_max(buf_size: usize) -> usize {
	buf_size - 64
}

/// Bytes to request in the next `+CIPRXGET=2,<n>` given how much room is
/// left in the host's receive buffer and how much the modem says it has
/// buffered.
pub fn receive_chunk_size(rx_remaining: usize, modem_rx_available: usize, buf_size: usize) -> usize {
	rx_remaining
		.min(modem_rx_available)
		.min(socket_max(buf_size))
}

/// Bytes to request in the next `+CIPSEND=<n>` given how much of the host
/// buffer is left to send and how much credit the modem has reported.
pub fn send_chunk_size(tx_remaining: usize, modem_tx_available: usize, buf_size: usize) -> usize {
	tx_remaining
		.min(modem_tx_available)
		.min(socket_max(buf_size))
}

/// Parse the byte count out of a `+CIPRXGET: 2,<count>,...` header line.
/// Everything between the count and the trailing newline is opaque per
/// spec (vendor-specific "extra" fields).
pub fn parse_cipget2_count(line: &[u8]) -> Option<usize> {
	let rest = line.strip_prefix(b"+CIPRXGET: 2,")?;
	parse_leading_usize(rest)
}

/// Parse the byte count out of a `+CIPRXGET: 4,<count>` header line
/// (modem's current unread-byte counter).
pub fn parse_cipget4_count(line: &[u8]) -> Option<usize> {
	let rest = line.strip_prefix(b"+CIPRXGET: 4,")?;
	parse_leading_usize(rest)
}

/// Parse the credit value out of a `+CIPSEND: <count>` header line.
pub fn parse_cipsend_credit(line: &[u8]) -> Option<usize> {
	let rest = line.strip_prefix(b"+CIPSEND: ")?;
	parse_leading_usize(rest)
}

fn parse_leading_usize(data: &[u8]) -> Option<usize> {
	let end = data
		.iter()
		.position(|b| !b.is_ascii_digit())
		.unwrap_or(data.len());
	if end == 0 {
		return None;
	}
	core::str::from_utf8(&data[..end]).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chunk_size_is_bounded_by_all_three_limits() {
		assert_eq!(receive_chunk_size(3, 5, 556), 3);
		assert_eq!(receive_chunk_size(10, 5, 556), 5);
		assert_eq!(receive_chunk_size(1000, 1000, 128), socket_max(128));
	}

	#[test]
	fn parses_cipget2_header() {
		assert_eq!(parse_cipget2_count(b"+CIPRXGET: 2,3,2,X\r\n"), Some(3));
	}

	#[test]
	fn parses_cipget4_header() {
		assert_eq!(parse_cipget4_count(b"+CIPRXGET: 4,5\r\n"), Some(5));
	}

	#[test]
	fn parses_cipsend_credit() {
		assert_eq!(parse_cipsend_credit(b"+CIPSEND: 100\r\n"), Some(100));
	}
}
