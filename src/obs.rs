//! Optional observability helpers for token, fetch, and cache operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `histoviewer_fetch.op` with the `op` and
//!   `stage` fields, plus warn/debug events on fail-soft paths and token refreshes.
//! - Enable `metrics` to increment the `histoviewer_fetch_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`, and the
//!   `histoviewer_fetch_blob_cache_total` counter labeled by `result` (`hit`/`miss`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Bearer token renewal against the identity provider.
	TokenRefresh,
	/// Authenticated request to the API backend.
	Request,
	/// Endpoint-to-object-URL resolution through the blob cache.
	BlobResolve,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::TokenRefresh => "token_refresh",
			OpKind::Request => "request",
			OpKind::BlobResolve => "blob_resolve",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated (or swallowed fail-soft) by the operation.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
