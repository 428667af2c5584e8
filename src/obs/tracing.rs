// self
use crate::_prelude::*;

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRequest<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRequest<F> = F;

/// Span wrapping a single token request.
#[derive(Clone, Debug)]
pub struct TokenSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl TokenSpan {
	/// Creates a new span tagged with the call site and the context mode label.
	pub fn new(stage: &'static str, mode: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("auth_token_manager.token", stage, mode);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, mode);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRequest<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a `debug` event when a silent failure escalates to an interactive retrieval.
pub fn record_escalation(code: &'static str, prompt: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(code, prompt, "escalating to interactive token retrieval");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (code, prompt);
	}
}
