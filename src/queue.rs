//! Bounded command FIFO with a single in-flight slot.
//!
//! Ported from `modem.h`'s `cmd_buffer`/`pending` split: commands wait in a
//! bounded deque until dispatched, at which point they move into a single
//! "in flight" slot that is cleared only by completion, timeout, or
//! [`CommandQueue::clear`]. At most one command is in flight at any time —
//! this is enforced structurally (there is only one slot), not by a runtime
//! check.

use crate::command::Command;
use crate::error::{Error, Result};

/// FIFO of not-yet-sent [`Command`]s plus the single in-flight slot.
pub struct CommandQueue<const BUF: usize, const QUEUE: usize> {
	queued: heapless::Deque<Command<BUF>, QUEUE>,
	in_flight: Option<Command<BUF>>,
}

impl<const BUF: usize, const QUEUE: usize> CommandQueue<BUF, QUEUE> {
	/// An empty queue.
	pub const fn new() -> Self {
		Self {
			queued: heapless::Deque::new(),
			in_flight: None,
		}
	}

	/// Append a command to the tail. Fails with [`Error::BufferFull`] if
	/// the queue is at capacity.
	pub fn push(&mut self, cmd: Command<BUF>) -> Result<()> {
		self.queued.push_back(cmd).map_err(|_| Error::BufferFull)
	}

	/// `true` while a command is dispatched and awaiting a response.
	pub fn is_in_flight(&self) -> bool {
		self.in_flight.is_some()
	}

	/// Borrow the in-flight command, if any.
	pub fn in_flight(&self) -> Option<&Command<BUF>> {
		self.in_flight.as_ref()
	}

	/// Mutably borrow the in-flight command, if any.
	pub fn in_flight_mut(&mut self) -> Option<&mut Command<BUF>> {
		self.in_flight.as_mut()
	}

	/// Pop the head of the queue into the in-flight slot, returning a
	/// reference to it so the caller can write it to the transport.
	///
	/// Does nothing (and returns `None`) if a command is already in
	/// flight.
	pub fn dispatch(&mut self) -> Option<&Command<BUF>> {
		if self.in_flight.is_some() {
			return None;
		}
		self.in_flight = self.queued.pop_front();
		self.in_flight.as_ref()
	}

	/// Free the in-flight command after a successful response.
	///
	/// A no-op if nothing is in flight: the core never panics, so callers
	/// that aren't sure may call this unconditionally.
	pub fn complete(&mut self) {
		self.in_flight = None;
	}

	/// Take the in-flight command out on timeout, clearing the slot.
	pub fn take_timed_out(&mut self) -> Option<Command<BUF>> {
		self.in_flight.take()
	}

	/// Drop every queued and in-flight command. Used on reset and on
	/// fatal errors.
	pub fn clear(&mut self) {
		self.queued.clear();
		self.in_flight = None;
	}

	/// Number of commands waiting to be dispatched (excludes the in-flight
	/// one).
	pub fn len(&self) -> usize {
		self.queued.len()
	}

	/// `true` if nothing is queued (the in-flight slot may still be busy).
	pub fn is_empty(&self) -> bool {
		self.queued.is_empty()
	}
}

impl<const BUF: usize, const QUEUE: usize> Default for CommandQueue<BUF, QUEUE> {
	fn default() -> Self {
		Self::new()
	}
}
