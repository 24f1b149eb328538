//! Cached modem readings: signal quality, registration state, GPRS attach,
//! functional mode and the locally assigned IPv4 address.
//!
//! Field parsing is ported from `modem.cpp::parse_general` (the original's
//! `sscanf`/`strtoul` dispatch, replaced here with checked prefix matching
//! and `str::parse`) and the dotted-quad parser from the teacher's
//! `pdp.rs::parse_ipv4`.

use heapless::String;

/// CSQ value meaning "no signal" (see `AT+CSQ`).
pub const CSQ_NO_SIGNAL: u8 = 99;

/// Last-known modem readings. Updated by URCs and by polling responses;
/// never by a direct write from the host.
#[derive(Clone)]
pub struct ModemStatus {
	/// `AT+CSQ` signal quality, 0-31, or [`CSQ_NO_SIGNAL`].
	pub csq: u8,
	/// `AT+CREG?` circuit-switched registration code.
	pub creg: u8,
	/// `AT+CGREG?` GPRS registration code.
	pub cgreg: u8,
	/// `AT+CEREG?` EPS (LTE) registration code.
	pub cereg: u8,
	/// `AT+CGATT?` GPRS attach flag (0 or 1).
	pub cgatt: u8,
	/// `AT+CFUN?` functional mode.
	pub cfun: u8,
	/// Local IPv4 address reported by `AT+CIFSR`, dotted-quad text.
	pub cifsr: String<16>,
	/// Bytes currently buffered on the modem, awaiting `+CIPRXGET=2`.
	pub rx_available: usize,
	/// Bytes the modem will currently accept via `+CIPSEND`.
	pub tx_available: usize,
}

impl ModemStatus {
	/// Freshly reset state: no signal, not registered, no IP.
	pub const fn new() -> Self {
		Self {
			csq: CSQ_NO_SIGNAL,
			creg: 0,
			cgreg: 0,
			cereg: 0,
			cgatt: 0,
			cfun: 0,
			cifsr: String::new(),
			rx_available: 0,
			tx_available: 0,
		}
	}

	/// Registration derived per spec: attached to GPRS and registered on
	/// at least one of circuit-switched/GPRS/EPS.
	pub fn registered(&self) -> bool {
		let reg_code = |code: u8| code == 1 || code == 5;
		self.cgatt != 0 && (reg_code(self.creg) || reg_code(self.cgreg) || reg_code(self.cereg))
	}
}

impl Default for ModemStatus {
	fn default() -> Self {
		Self::new()
	}
}

/// Parse the trailing unsigned integer out of a line already known to
/// start with `prefix`, e.g. `"+CFUN: "` -> the value after it up to the
/// first non-digit byte.
pub fn parse_trailing_u8(line: &[u8], prefix: &[u8]) -> Option<u8> {
	let rest = line.strip_prefix(prefix)?;
	parse_leading_u8(rest)
}

/// Parse the unsigned integer after the first `,` in a line already known
/// to start with `prefix`, e.g. `"+CREG: 0,1\r\n"` -> `1`.
pub fn parse_after_comma_u8(line: &[u8], prefix: &[u8]) -> Option<u8> {
	let rest = line.strip_prefix(prefix)?;
	let comma = rest.iter().position(|&b| b == b',')?;
	parse_leading_u8(&rest[comma + 1..])
}

fn parse_leading_u8(data: &[u8]) -> Option<u8> {
	let end = data.iter().position(|b| !b.is_ascii_digit()).unwrap_or(data.len());
	if end == 0 {
		return None;
	}
	core::str::from_utf8(&data[..end]).ok()?.parse().ok()
}

/// Parse a dotted-quad IPv4 address out of the start of a buffer, e.g. the
/// line the modem sends in response to `AT+CIFSR`. Returns the formatted
/// address and the number of bytes consumed, or `None` if the buffer
/// doesn't start with four dot-separated byte values.
pub fn parse_cifsr(line: &[u8]) -> Option<String<16>> {
	let text = core::str::from_utf8(line).ok()?;
	let text = text.trim_end_matches(['\r', '\n']);
	let mut parts = text.splitn(4, '.');
	let a: u8 = parts.next()?.parse().ok()?;
	let b: u8 = parts.next()?.parse().ok()?;
	let c: u8 = parts.next()?.parse().ok()?;
	let d_part = parts.next()?;
	// The fourth octet may be followed by more response bytes on the same
	// logical frame; take only the leading digits.
	let d_end = d_part
		.as_bytes()
		.iter()
		.position(|b| !b.is_ascii_digit())
		.unwrap_or(d_part.len());
	if d_end == 0 {
		return None;
	}
	let d: u8 = d_part[..d_end].parse().ok()?;

	let mut out = String::new();
	// 15 bytes max ("255.255.255.255"); `String<16>` always has room.
	let _ = core::fmt::write(&mut Fmt(&mut out), format_args!("{a}.{b}.{c}.{d}"));
	Some(out)
}

struct Fmt<'a>(&'a mut String<16>);

impl core::fmt::Write for Fmt<'_> {
	fn write_str(&mut self, s: &str) -> core::fmt::Result {
		self.0.push_str(s).map_err(|_| core::fmt::Error)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn registered_requires_attach_and_registration() {
		let mut status = ModemStatus::new();
		assert!(!status.registered());
		status.cgatt = 1;
		status.creg = 1;
		assert!(status.registered());
	}

	#[test]
	fn roaming_registration_counts() {
		let mut status = ModemStatus::new();
		status.cgatt = 1;
		status.cereg = 5;
		assert!(status.registered());
	}

	#[test]
	fn parse_csq() {
		assert_eq!(parse_trailing_u8(b"+CSQ: 20,0\r\n", b"+CSQ: "), Some(20));
	}

	#[test]
	fn parse_creg() {
		assert_eq!(parse_after_comma_u8(b"+CREG: 0,1\r\n", b"+CREG: "), Some(1));
	}

	#[test]
	fn parse_cifsr_address() {
		let ip = parse_cifsr(b"10.0.0.2\r\n").unwrap();
		assert_eq!(ip.as_str(), "10.0.0.2");
	}

	#[test]
	fn parse_cifsr_rejects_garbage() {
		assert!(parse_cifsr(b"ERROR\r\n").is_none());
	}
}
