//! Error types shared by the credential layer and the request client.
//!
//! Every failure that crosses the public request surface is a [`ClassifiedError`]; the
//! remaining types describe local problems (storage, configuration, raw transport) that
//! are either converted before they reach callers or surfaced from setup/teardown APIs.

pub mod taxonomy;

pub use taxonomy::*;

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Shared, cloneable error cause attached to a [`ClassifiedError`].
pub type SharedCause = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by setup and lifecycle APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Request-level failure that has already been classified.
	#[error(transparent)]
	Classified(#[from] ClassifiedError),
	/// Secret-store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Closed set of failure categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
	/// Credential missing, rejected, or not obtainable.
	Authentication,
	/// No response was received (DNS, timeout, offline).
	Network,
	/// The backend answered with a 5xx status.
	Server,
	/// The backend rejected the request itself (4xx other than 401/429).
	Client,
	/// The backend throttled the caller (429).
	RateLimit,
	/// Anything that does not fit the categories above.
	Unknown,
}
impl ErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorKind::Authentication => "authentication",
			ErrorKind::Network => "network",
			ErrorKind::Server => "server",
			ErrorKind::Client => "client",
			ErrorKind::RateLimit => "rate_limit",
			ErrorKind::Unknown => "unknown",
		}
	}

	/// Whether a failure of this kind may succeed when attempted again.
	pub const fn is_retryable(self) -> bool {
		matches!(
			self,
			ErrorKind::Authentication | ErrorKind::RateLimit | ErrorKind::Server | ErrorKind::Network
		)
	}

	/// Display-ready sentence for kinds whose detail is not meant for end users.
	pub const fn user_message(self) -> Option<&'static str> {
		match self {
			ErrorKind::Authentication => Some("Your session has expired. Please sign in again."),
			ErrorKind::Network =>
				Some("Unable to reach the server. Please check your connection and try again."),
			ErrorKind::Server => Some("Something went wrong on our side. Please try again later."),
			ErrorKind::RateLimit => Some("Too many requests. Please wait a moment and try again."),
			ErrorKind::Client | ErrorKind::Unknown => None,
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Taxonomy-tagged representation of a failed request.
///
/// The error is `Clone` so a single refresh failure can be fanned out to every queued
/// caller; the original cause is kept behind an [`Arc`] for that reason.
#[derive(Clone, Debug)]
pub struct ClassifiedError {
	/// Failure category.
	pub kind: ErrorKind,
	/// HTTP status code, when a response was received.
	pub status: Option<u16>,
	/// Human-readable message.
	pub message: String,
	/// Upstream `Retry-After` hint, when one was supplied.
	pub retry_after: Option<Duration>,
	cause: Option<SharedCause>,
}
impl ClassifiedError {
	/// Creates an error without an attached cause.
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self { kind, status: None, message: message.into(), retry_after: None, cause: None }
	}

	/// Shorthand for an [`ErrorKind::Authentication`] error.
	pub fn authentication(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Authentication, message)
	}

	/// Attaches the HTTP status code.
	pub fn with_status(mut self, status: u16) -> Self {
		self.status = Some(status);

		self
	}

	/// Attaches an upstream `Retry-After` hint.
	pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
		self.retry_after = retry_after;

		self
	}

	/// Attaches the original cause.
	pub fn with_cause(mut self, cause: impl 'static + Send + Sync + StdError) -> Self {
		self.cause = Some(Arc::new(cause));

		self
	}

	/// Attaches an already shared cause.
	pub fn with_shared_cause(mut self, cause: SharedCause) -> Self {
		self.cause = Some(cause);

		self
	}

	/// Returns the original cause, if any.
	pub fn cause(&self) -> Option<&SharedCause> {
		self.cause.as_ref()
	}

	/// Whether the request may be attempted again.
	pub fn is_retryable(&self) -> bool {
		self.kind.is_retryable()
	}

	/// Message suitable for direct display next to a retry affordance.
	pub fn user_message(&self) -> &str {
		match self.kind.user_message() {
			Some(message) => message,
			None => &self.message,
		}
	}
}
impl Display for ClassifiedError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.message)
	}
}
impl StdError for ClassifiedError {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self.cause.as_deref().map(|cause| cause as &(dyn StdError + 'static))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured URL cannot be parsed or joined.
	#[error("The {endpoint} URL is invalid.")]
	InvalidUrl {
		/// Which URL failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured URL is not an absolute http(s) URL with a host.
	#[error("The {endpoint} URL must be an absolute http(s) URL: {url}.")]
	UnsupportedUrl {
		/// Which URL failed validation.
		endpoint: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// A duration that must be positive was zero or negative.
	#[error("The {field} duration must be positive.")]
	NonPositiveDuration {
		/// Configuration field name.
		field: &'static str,
	},
	/// A duration that must not be negative was negative.
	#[error("The {field} duration must not be negative.")]
	NegativeDuration {
		/// Configuration field name.
		field: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures raised before any response was received.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure (DNS, connect, TLS, offline).
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete in time.
	#[error("The request to the backend timed out.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retryability_is_fixed_per_kind() {
		assert!(ErrorKind::Authentication.is_retryable());
		assert!(ErrorKind::RateLimit.is_retryable());
		assert!(ErrorKind::Server.is_retryable());
		assert!(ErrorKind::Network.is_retryable());
		assert!(!ErrorKind::Client.is_retryable());
		assert!(!ErrorKind::Unknown.is_retryable());
	}

	#[test]
	fn user_message_falls_back_to_detail_for_client_errors() {
		let throttled = ClassifiedError::new(ErrorKind::RateLimit, "slow down").with_status(429);
		let rejected = ClassifiedError::new(ErrorKind::Client, "Username is taken").with_status(409);

		assert_eq!(
			throttled.user_message(),
			"Too many requests. Please wait a moment and try again."
		);
		assert_eq!(throttled.to_string(), "slow down");
		assert_eq!(rejected.user_message(), "Username is taken");
	}

	#[test]
	fn classified_error_exposes_cause_as_source() {
		let io = std::io::Error::other("socket closed");
		let err = ClassifiedError::new(ErrorKind::Network, "offline").with_cause(io);
		let source = std::error::Error::source(&err)
			.expect("Classified error should expose its cause as the error source.");

		assert_eq!(source.to_string(), "socket closed");

		let cloned = err.clone();

		assert!(cloned.cause().is_some());
	}

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = crate::store::StoreError::Backend { message: "keychain locked".into() };
		let err: Error = store_error.clone().into();

		assert!(matches!(err, Error::Storage(_)));
		assert!(err.to_string().contains("keychain locked"));
		assert_eq!(
			std::error::Error::source(&err)
				.expect("Crate error should expose the store error as its source.")
				.to_string(),
			store_error.to_string()
		);
	}
}
