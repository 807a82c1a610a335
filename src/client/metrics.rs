// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for requests issued through the client.
#[derive(Debug, Default)]
pub struct RequestMetrics {
	attempts: AtomicU64,
	retries: AtomicU64,
	recoveries: AtomicU64,
	replays: AtomicU64,
	queued: AtomicU64,
}
impl RequestMetrics {
	/// Returns the number of transport sends for business requests (replays included).
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of backoff retries scheduled.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of 401 recoveries that drove a refresh.
	pub fn recoveries(&self) -> u64 {
		self.recoveries.load(Ordering::Relaxed)
	}

	/// Returns the number of requests replayed after a refresh.
	pub fn replays(&self) -> u64 {
		self.replays.load(Ordering::Relaxed)
	}

	/// Returns the number of requests parked behind a running recovery.
	pub fn queued(&self) -> u64 {
		self.queued.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_recovery(&self) {
		self.recoveries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_replay(&self) {
		self.replays.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_queued(&self) {
		self.queued.fetch_add(1, Ordering::Relaxed);
	}
}
