//! Optional observability helpers for credential and request operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `session_gate.op` with the `op` and
//!   `stage` fields, plus `warn` events for failures that are logged and swallowed.
//! - Enable `metrics` to increment the `session_gate_operation_total` counter for every
//!   attempt/success/failure/retry, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Credential acquisition through the identity exchange.
	Acquire,
	/// Forced re-acquisition.
	Refresh,
	/// One logical business request.
	Request,
	/// 401-triggered refresh-and-replay cycle.
	Recovery,
	/// Background freshness check.
	Freshness,
	/// Secret-store access.
	Store,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::Acquire => "acquire",
			OperationKind::Refresh => "refresh",
			OperationKind::Request => "request",
			OperationKind::Recovery => "recovery",
			OperationKind::Freshness => "freshness",
			OperationKind::Store => "store",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// A failed attempt that will be tried again.
	Retry,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
			OperationOutcome::Retry => "retry",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
