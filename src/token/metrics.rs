// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for credential acquisitions.
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	exchanges: AtomicU64,
	identity_mints: AtomicU64,
}
impl AcquisitionMetrics {
	/// Returns the number of acquisitions started (store adoption included).
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of acquisitions that produced a credential.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed acquisitions.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of calls made to the exchange endpoint.
	pub fn exchanges(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}

	/// Returns the number of identity tokens minted.
	pub fn identity_mints(&self) -> u64 {
		self.identity_mints.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_exchange(&self) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_identity_mint(&self) {
		self.identity_mints.fetch_add(1, Ordering::Relaxed);
	}
}
