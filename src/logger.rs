//! Internal log-level dial.
//!
//! Per the core's design notes, logging is a dial plus a sink capability,
//! not a compile-time layer baked into the driver. The sink here is the
//! `log` crate: when the `log` feature is off these macros compile to
//! nothing, so a host that doesn't want a logging backend never pays for
//! one (and the core never forces `log` on a host that hasn't installed a
//! logger).

macro_rules! at_trace {
	($($arg:tt)*) => {
		#[cfg(feature = "log")]
		::log::trace!($($arg)*);
	};
}

macro_rules! at_debug {
	($($arg:tt)*) => {
		#[cfg(feature = "log")]
		::log::debug!($($arg)*);
	};
}

macro_rules! at_info {
	($($arg:tt)*) => {
		#[cfg(feature = "log")]
		::log::info!($($arg)*);
	};
}

macro_rules! at_warn {
	($($arg:tt)*) => {
		#[cfg(feature = "log")]
		::log::warn!($($arg)*);
	};
}

macro_rules! at_error {
	($($arg:tt)*) => {
		#[cfg(feature = "log")]
		::log::error!($($arg)*);
	};
}

pub(crate) use at_debug;
pub(crate) use at_error;
pub(crate) use at_info;
pub(crate) use at_trace;
pub(crate) use at_warn;
