// self
use crate::{_prelude::*, obs::OpKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used by crate operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation kind + stage.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("histoviewer_fetch.op", op = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
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

/// Logs a failure that was swallowed and surfaced to the consumer as an empty value.
pub fn log_fail_soft(kind: OpKind, endpoint: &str, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(op = kind.as_str(), endpoint, error = %error, "resolution failed; yielding an empty value");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, endpoint, error);
	}
}

/// Logs a transport failure that will be retried after `delay`.
pub fn log_retry(endpoint: &str, attempt: u32, delay: Duration, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(endpoint, attempt, delay = %delay, error = %error, "retrying after transport failure");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (endpoint, attempt, delay, error);
	}
}

/// Logs a cache entry dropped to respect the capacity bound.
pub fn log_eviction(endpoint: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(endpoint, "evicted blob cache entry; object URL revoked");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = endpoint;
	}
}

/// Logs the result of a token refresh attempt.
pub fn log_refresh(result: &Result<bool, crate::error::AuthError>) {
	#[cfg(feature = "tracing")]
	{
		match result {
			Ok(true) => tracing::info!("access token refreshed"),
			Ok(false) => tracing::trace!("access token still fresh"),
			Err(error) => tracing::warn!(error = %error, "access token could not be refreshed"),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = result;
	}
}
