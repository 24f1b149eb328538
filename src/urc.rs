//! Unsolicited result codes: modem-initiated lines that aren't a response
//! to the command currently in flight.
//!
//! Ported from `modem.cpp::parse_urc`. URCs are checked before any
//! state-specific handler and, when matched, short-circuit further parsing
//! of that line — they never consume the in-flight command.

/// Effect a matched URC has on the driver, applied by
/// [`crate::modem::Modem`] (the parser here stays free of state-machine and
/// callback plumbing).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrcAction {
	/// `+CME ERROR: n` — report `n` via the error callback.
	CmeError(i32),
	/// `+CPIN: READY` — advance to `Ready` if still earlier than
	/// `Searching`.
	SimReady,
	/// `+CPIN: NOT INSERTED` — fatal, transition to `Error`.
	SimNotInserted,
	/// `+CFUN: n` — record the functional mode; `n != 1` is fatal.
	Cfun(u8),
	/// `+PDP: DEACT` — drop to `Registered` if currently further along.
	PdpDeactivated,
}

/// Try to match `line` against the known URC prefixes. Returns `None` if
/// the line isn't a recognized URC, in which case the caller should fall
/// through to its state-specific handler.
pub fn try_match(line: &[u8]) -> Option<UrcAction> {
	if let Some(rest) = line.strip_prefix(b"+CME ERROR:") {
		let code = parse_i32(rest)?;
		return Some(UrcAction::CmeError(code));
	}
	if let Some(rest) = line.strip_prefix(b"+CPIN: ") {
		if rest.starts_with(b"READY") {
			return Some(UrcAction::SimReady);
		}
		if rest.starts_with(b"NOT INSERTED") {
			return Some(UrcAction::SimNotInserted);
		}
		return None;
	}
	if let Some(rest) = line.strip_prefix(b"+CFUN: ") {
		let mode = parse_u8(rest)?;
		return Some(UrcAction::Cfun(mode));
	}
	if line.starts_with(b"+PDP: DEACT") {
		return Some(UrcAction::PdpDeactivated);
	}
	None
}

fn parse_u8(data: &[u8]) -> Option<u8> {
	let end = data
		.iter()
		.position(|b| !b.is_ascii_digit())
		.unwrap_or(data.len());
	core::str::from_utf8(data.get(..end)?).ok()?.parse().ok()
}

fn parse_i32(data: &[u8]) -> Option<i32> {
	let data = data.strip_prefix(b" ").unwrap_or(data);
	let end = data
		.iter()
		.position(|b| !b.is_ascii_digit())
		.unwrap_or(data.len());
	core::str::from_utf8(data.get(..end)?).ok()?.parse().ok()
}
