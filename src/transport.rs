//! The byte-oriented transport capability the core is driven over.
//!
//! This mirrors the original driver's `context_t`: a non-blocking,
//! hardware-agnostic handle to the serial link plus a free-running
//! millisecond clock. The core never owns threads or I/O channels — it
//! only calls these three methods, on the same thread that calls
//! [`crate::modem::Modem::process`].

/// Capability the host supplies so the core can talk to the modem.
///
/// All methods are non-blocking: `read` and `write` return immediately with
/// whatever progress was possible, and `monotonic_millis` never sleeps.
pub trait Transport {
	/// Read up to `buf.len()` bytes into `buf`, non-blocking.
	///
	/// Returns the number of bytes read (`0` means "nothing available
	/// right now"). A negative return is a transport error and is ignored
	/// for the current tick.
	fn read(&mut self, buf: &mut [u8]) -> i32;

	/// Write up to `buf.len()` bytes, non-blocking, best-effort.
	///
	/// Short writes are not retried within the same tick; the core
	/// observes the consequence (no response, or a timeout) on a later
	/// tick rather than looping here.
	fn write(&mut self, buf: &[u8]) -> i32;

	/// Free-running millisecond counter. Wraps at `u32::MAX`; callers
	/// must use wrap-safe comparisons (see [`crate::modem::elapsed`]).
	fn monotonic_millis(&mut self) -> u32;
}
