//! Optional observability helpers for token retrieval.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to run every token request inside an `auth_token_manager.token` span with
//!   `stage` and `mode` fields, and to emit `debug` events when callers join or evict an
//!   in-flight retrieval.
//! - Enable `metrics` to increment `auth_token_manager_fetch_total` (labeled by `fetch` +
//!   `outcome`) and `auth_token_manager_dedup_total` (labeled by `event`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Retrieval kinds performed against the identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchKind {
	/// Non-interactive retrieval.
	Silent,
	/// Retrieval that may prompt the user.
	Interactive,
}
impl FetchKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FetchKind::Silent => "silent",
			FetchKind::Interactive => "interactive",
		}
	}
}
impl Display for FetchKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each retrieval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchOutcome {
	/// Retrieval started.
	Attempt,
	/// Retrieval produced a token.
	Success,
	/// Retrieval failed.
	Failure,
}
impl FetchOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FetchOutcome::Attempt => "attempt",
			FetchOutcome::Success => "success",
			FetchOutcome::Failure => "failure",
		}
	}
}
impl Display for FetchOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Registry events emitted by the request deduplicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DedupEvent {
	/// A caller joined an in-flight retrieval instead of starting one.
	Joined,
	/// An in-flight retrieval was unlinked so the next caller starts fresh.
	Evicted,
}
impl DedupEvent {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			DedupEvent::Joined => "joined",
			DedupEvent::Evicted => "evicted",
		}
	}
}
impl Display for DedupEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
