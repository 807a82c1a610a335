//! Client configuration and its validating builder.

// self
use crate::{_prelude::*, client::RetryPolicy, error::ConfigError};

/// Tunables shared by the token manager, credential store, and request client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Base URL relative request paths are joined onto.
	pub base_url: Url,
	/// Endpoint that exchanges an identity token for a credential.
	pub exchange_endpoint: Url,
	/// Safety buffer subtracted from expiry when judging validity.
	pub refresh_margin: Duration,
	/// How long a secret-store read is served from memory.
	pub store_cache_ttl: Duration,
	/// Period of the background freshness check; `None` disables it.
	pub freshness_interval: Option<Duration>,
	/// Bounded retry policy applied to every request.
	pub retry: RetryPolicy,
	/// Reuse the identity token retained by the last credential when re-exchanging.
	pub reuse_identity_token: bool,
}
impl ClientConfig {
	/// Default refresh margin.
	pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::hours(1);
	/// Default secret-store cache lifetime.
	pub const DEFAULT_STORE_CACHE_TTL: Duration = Duration::seconds(5);
	/// Default background freshness interval.
	pub const DEFAULT_FRESHNESS_INTERVAL: Duration = Duration::minutes(5);
	/// Default exchange endpoint path joined onto the base URL.
	pub const DEFAULT_EXCHANGE_PATH: &str = "auth/token";

	/// Returns a builder seeded with defaults for `base_url`.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Resolves a request target against the base URL.
	///
	/// Absolute URLs pass through unchanged; anything else is joined onto the base URL
	/// with leading slashes stripped so the base path is preserved.
	pub fn resolve(&self, target: &str) -> Result<Url, ConfigError> {
		if let Ok(url) = Url::parse(target) {
			return Ok(url);
		}

		base_dir(&self.base_url)
			.join(target.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidUrl { endpoint: "request", source })
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	base_url: Url,
	exchange_endpoint: Option<Url>,
	refresh_margin: Duration,
	store_cache_ttl: Duration,
	freshness_interval: Option<Duration>,
	retry: RetryPolicy,
	reuse_identity_token: bool,
}
impl ClientConfigBuilder {
	fn new(base_url: Url) -> Self {
		Self {
			base_url,
			exchange_endpoint: None,
			refresh_margin: ClientConfig::DEFAULT_REFRESH_MARGIN,
			store_cache_ttl: ClientConfig::DEFAULT_STORE_CACHE_TTL,
			freshness_interval: Some(ClientConfig::DEFAULT_FRESHNESS_INTERVAL),
			retry: RetryPolicy::default(),
			reuse_identity_token: true,
		}
	}

	/// Overrides the exchange endpoint (defaults to `{base_url}/auth/token`).
	pub fn exchange_endpoint(mut self, url: Url) -> Self {
		self.exchange_endpoint = Some(url);

		self
	}

	/// Overrides the refresh margin.
	pub fn refresh_margin(mut self, margin: Duration) -> Self {
		self.refresh_margin = margin;

		self
	}

	/// Overrides the secret-store cache lifetime.
	pub fn store_cache_ttl(mut self, ttl: Duration) -> Self {
		self.store_cache_ttl = ttl;

		self
	}

	/// Overrides the background freshness interval; `None` disables the check.
	pub fn freshness_interval(mut self, interval: Option<Duration>) -> Self {
		self.freshness_interval = interval;

		self
	}

	/// Overrides the retry policy.
	pub fn retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Toggles identity-token reuse.
	pub fn reuse_identity_token(mut self, reuse: bool) -> Self {
		self.reuse_identity_token = reuse;

		self
	}

	/// Validates the inputs and produces a [`ClientConfig`].
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		ensure_http_url("base", &self.base_url)?;

		let exchange_endpoint = match self.exchange_endpoint {
			Some(url) => url,
			None => base_dir(&self.base_url)
				.join(ClientConfig::DEFAULT_EXCHANGE_PATH)
				.map_err(|source| ConfigError::InvalidUrl { endpoint: "exchange", source })?,
		};

		ensure_http_url("exchange", &exchange_endpoint)?;

		if self.refresh_margin.is_negative() {
			return Err(ConfigError::NegativeDuration { field: "refresh_margin" });
		}
		if self.store_cache_ttl.is_negative() {
			return Err(ConfigError::NegativeDuration { field: "store_cache_ttl" });
		}
		if self.freshness_interval.is_some_and(|interval| !interval.is_positive()) {
			return Err(ConfigError::NonPositiveDuration { field: "freshness_interval" });
		}

		self.retry.validate()?;

		Ok(ClientConfig {
			base_url: self.base_url,
			exchange_endpoint,
			refresh_margin: self.refresh_margin,
			store_cache_ttl: self.store_cache_ttl,
			freshness_interval: self.freshness_interval,
			retry: self.retry,
			reuse_identity_token: self.reuse_identity_token,
		})
	}
}

fn ensure_http_url(endpoint: &'static str, url: &Url) -> Result<(), ConfigError> {
	if matches!(url.scheme(), "http" | "https") && url.has_host() {
		Ok(())
	} else {
		Err(ConfigError::UnsupportedUrl { endpoint, url: url.to_string() })
	}
}

fn base_dir(base: &Url) -> Url {
	let mut dir = base.clone();

	if !dir.path().ends_with('/') {
		let path = format!("{}/", dir.path());

		dir.set_path(&path);
	}

	dir
}
