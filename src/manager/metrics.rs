// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token requests handled by a manager.
#[derive(Debug, Default)]
pub struct TokenMetrics {
	requests: AtomicU64,
	joined: AtomicU64,
	silent_fetches: AtomicU64,
	interactive_fetches: AtomicU64,
	failures: AtomicU64,
}
impl TokenMetrics {
	/// Returns the total number of token requests, proxy short-circuits included.
	pub fn requests(&self) -> u64 {
		self.requests.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that joined an in-flight retrieval.
	pub fn joined(&self) -> u64 {
		self.joined.load(Ordering::Relaxed)
	}

	/// Returns the number of silent retrievals started.
	pub fn silent_fetches(&self) -> u64 {
		self.silent_fetches.load(Ordering::Relaxed)
	}

	/// Returns the number of interactive escalations started.
	pub fn interactive_fetches(&self) -> u64 {
		self.interactive_fetches.load(Ordering::Relaxed)
	}

	/// Returns the number of retrievals that ended in an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_request(&self) {
		self.requests.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_joined(&self) {
		self.joined.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_silent_fetch(&self) {
		self.silent_fetches.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_interactive_fetch(&self) {
		self.interactive_fetches.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
