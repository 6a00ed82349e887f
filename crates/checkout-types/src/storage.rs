//! Storage namespace types for the durable session store.

use std::str::FromStr;

/// Namespaces for the different data collections kept in the session store.
///
/// Replaces string literals in storage calls with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreNamespace {
	/// In-progress checkout sessions, keyed by session key.
	Sessions,
	/// Markers for initial messages that failed to send after a completed
	/// payment, keyed by transaction id, so the UI can offer a
	/// message-only retry.
	MessageRetries,
}

impl StoreNamespace {
	/// Returns the string form used to build storage keys.
	pub fn as_str(&self) -> &'static str {
		match self {
			StoreNamespace::Sessions => "sessions",
			StoreNamespace::MessageRetries => "message_retries",
		}
	}

	/// Returns an iterator over all namespaces.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Sessions, Self::MessageRetries].into_iter()
	}
}

impl FromStr for StoreNamespace {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"sessions" => Ok(Self::Sessions),
			"message_retries" => Ok(Self::MessageRetries),
			_ => Err(()),
		}
	}
}

impl From<StoreNamespace> for &'static str {
	fn from(ns: StoreNamespace) -> Self {
		ns.as_str()
	}
}
