// self
use crate::obs::{DedupEvent, FetchKind, FetchOutcome};

/// Records a retrieval outcome via the global metrics recorder (when enabled).
pub fn record_fetch_outcome(kind: FetchKind, outcome: FetchOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"auth_token_manager_fetch_total",
			"fetch" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a deduplicator event via the metrics recorder and the tracing subscriber (when
/// enabled). Only the request key is logged; it never contains token material.
pub fn record_dedup_event(event: DedupEvent, key: &str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("auth_token_manager_dedup_total", "event" => event.as_str()).increment(1);
	}

	#[cfg(feature = "tracing")]
	{
		tracing::debug!(event = event.as_str(), key, "token request registry event");
	}

	#[cfg(not(all(feature = "metrics", feature = "tracing")))]
	{
		let _ = (event, key);
	}
}
