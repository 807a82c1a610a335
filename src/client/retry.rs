//! Bounded exponential backoff policy.

// self
use crate::{_prelude::*, error::ConfigError};

/// Retry bound and doubling backoff schedule.
///
/// A request is attempted at most `max_retries + 1` times. The delay before retry `n`
/// (1-based) is `base_delay * 2^(n - 1)`, capped at `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
	/// Retries allowed after the first attempt.
	pub max_retries: u32,
	/// Delay before the first retry.
	pub base_delay: Duration,
	/// Upper bound for any single delay.
	pub max_delay: Duration,
}
impl RetryPolicy {
	/// Policy that never retries.
	pub const fn none() -> Self {
		Self { max_retries: 0, base_delay: Duration::ZERO, max_delay: Duration::ZERO }
	}

	/// Creates a policy with the provided bound and base delay.
	pub fn new(max_retries: u32, base_delay: Duration) -> Self {
		Self { max_retries, base_delay, ..Self::default() }
	}

	/// Overrides the delay cap.
	pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
		self.max_delay = max_delay;

		self
	}

	/// Total attempts including the first one.
	pub fn max_attempts(&self) -> u32 {
		self.max_retries.saturating_add(1)
	}

	/// Delay before retry number `retry` (1-based); zero for `retry == 0`.
	pub fn delay_for(&self, retry: u32) -> Duration {
		if retry == 0 || self.base_delay.is_zero() {
			return Duration::ZERO;
		}

		let factor = 2_i32.saturating_pow(retry.saturating_sub(1).min(30));

		self.base_delay.saturating_mul(factor).min(self.max_delay)
	}

	/// Delay before retry `retry`, stretched to an upstream `Retry-After` hint when that is
	/// longer, still capped at `max_delay`.
	pub fn delay_with_hint(&self, retry: u32, hint: Option<Duration>) -> Duration {
		let computed = self.delay_for(retry);

		match hint {
			Some(hint) if hint > computed => hint.min(self.max_delay),
			_ => computed,
		}
	}

	pub(crate) fn validate(&self) -> Result<(), ConfigError> {
		if self.base_delay.is_negative() {
			return Err(ConfigError::NegativeDuration { field: "retry.base_delay" });
		}
		if self.max_delay.is_negative() {
			return Err(ConfigError::NegativeDuration { field: "retry.max_delay" });
		}

		Ok(())
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_retries: 3, base_delay: Duration::seconds(1), max_delay: Duration::seconds(30) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_schedule_doubles_from_one_second() {
		let policy = RetryPolicy::default();

		assert_eq!(policy.max_attempts(), 4);
		assert_eq!(policy.delay_for(0), Duration::ZERO);
		assert_eq!(policy.delay_for(1), Duration::seconds(1));
		assert_eq!(policy.delay_for(2), Duration::seconds(2));
		assert_eq!(policy.delay_for(3), Duration::seconds(4));
	}

	#[test]
	fn delays_are_capped() {
		let policy = RetryPolicy::new(10, Duration::seconds(1)).with_max_delay(Duration::seconds(5));

		assert_eq!(policy.delay_for(4), Duration::seconds(5));
		assert_eq!(policy.delay_for(40), Duration::seconds(5));
		assert_eq!(policy.delay_with_hint(1, Some(Duration::seconds(3))), Duration::seconds(3));
		assert_eq!(policy.delay_with_hint(1, Some(Duration::seconds(60))), Duration::seconds(5));
		assert_eq!(policy.delay_with_hint(3, Some(Duration::seconds(1))), Duration::seconds(4));
	}

	#[test]
	fn none_policy_attempts_once() {
		let policy = RetryPolicy::none();

		assert_eq!(policy.max_attempts(), 1);
		assert_eq!(policy.delay_for(1), Duration::ZERO);
	}
}
