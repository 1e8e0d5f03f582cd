// self
use crate::obs::{OpKind, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"histoviewer_fetch_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a blob cache lookup via the global metrics recorder (when enabled).
pub fn record_cache_lookup(hit: bool) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"histoviewer_fetch_blob_cache_total",
			"result" => if hit { "hit" } else { "miss" }
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = hit;
	}
}
