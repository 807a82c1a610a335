//! Background freshness check that renews credentials before they go stale.

// crates.io
use tokio::{
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	obs::{self, OperationKind},
	token::{Inner, TokenManager},
};

/// Result of a single freshness check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FreshnessOutcome {
	/// No credential is held; nothing to renew.
	Idle,
	/// The held credential is outside the refresh margin.
	Fresh,
	/// The credential was inside the margin and has been replaced.
	Refreshed,
	/// Renewal failed; the failure was logged and swallowed.
	Failed,
}

/// Handle to the recurring freshness task; stopping or dropping it cancels the timer.
#[derive(Debug)]
pub struct FreshnessTask {
	handle: JoinHandle<()>,
}
impl FreshnessTask {
	pub(crate) fn spawn(manager: &TokenManager, interval: Duration) -> Self {
		let inner = Arc::downgrade(&manager.inner);
		let period = interval.unsigned_abs().max(std::time::Duration::from_millis(1));
		let handle = tokio::spawn(run(inner, period));

		obs::record_transition(OperationKind::Freshness, "started");

		Self { handle }
	}

	/// Cancels the recurring check.
	pub fn stop(&self) {
		if !self.handle.is_finished() {
			self.handle.abort();
			obs::record_transition(OperationKind::Freshness, "stopped");
		}
	}

	/// Returns `true` while the task is scheduled.
	pub fn is_running(&self) -> bool {
		!self.handle.is_finished()
	}
}
impl Drop for FreshnessTask {
	fn drop(&mut self) {
		self.stop();
	}
}

async fn run(inner: Weak<Inner>, period: std::time::Duration) {
	let mut ticker = time::interval_at(time::Instant::now() + period, period);

	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		ticker.tick().await;

		// The manager is gone once its owning session ends.
		let Some(inner) = inner.upgrade() else { break };

		TokenManager { inner }.check_freshness().await;
	}
}
