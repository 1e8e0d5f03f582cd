// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how a [`TokenProvider`](crate::provider::TokenProvider) renewed tokens.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
	stale_served: AtomicU64,
}
impl RefreshMetrics {
	/// Calls made to the identity client's renewal operation.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Renewal calls that completed without error (including "still valid" answers).
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Renewal calls that failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Tokens handed out inside the refresh threshold because renewal failed.
	pub fn stale_served(&self) -> u64 {
		self.stale_served.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_outcome<T, E>(&self, result: &Result<T, E>) {
		let counter = if result.is_ok() { &self.successes } else { &self.failures };

		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_stale_served(&self) {
		self.stale_served.fetch_add(1, Ordering::Relaxed);
	}
}
