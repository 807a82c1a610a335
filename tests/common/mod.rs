#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};
// crates.io
use parking_lot::Mutex;
use session_gate::{
	client::{ResilientApiClient, RetryPolicy},
	clock::ManualClock,
	config::ClientConfig,
	error::TransportError,
	http::{ApiRequest, ApiResponse, HttpTransport, TransportFuture},
	http_types::{StatusCode, header::AUTHORIZATION},
	identity::{FnIdentityProvider, IdentityError, IdentityProvider},
	store::MemorySecretStore,
	token::TokenManager,
};
use time::{Duration, OffsetDateTime, macros};
use url::Url;

pub const EPOCH: OffsetDateTime = macros::datetime!(2025-01-01 00:00 UTC);

type Script = dyn Fn(usize, &ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

/// Identity provider that counts mints and returns `identity-{n}`.
#[derive(Clone, Default)]
pub struct CountingIdentity {
	pub mints: Arc<AtomicUsize>,
}
impl CountingIdentity {
	pub fn provider(&self) -> Arc<dyn IdentityProvider> {
		let mints = self.mints.clone();

		Arc::new(FnIdentityProvider::new(move || {
			let n = mints.fetch_add(1, Ordering::SeqCst);

			async move {
				tokio::task::yield_now().await;

				Ok::<_, IdentityError>(format!("identity-{n}"))
			}
		}))
	}

	pub fn mints(&self) -> usize {
		self.mints.load(Ordering::SeqCst)
	}
}

/// Fake backend: `/auth/token` issues `token-{n}`, every other path follows a script.
pub struct Backend {
	exchanges: AtomicUsize,
	calls: AtomicUsize,
	exchange_fails: AtomicBool,
	expires_in: i64,
	exchange_delay: Option<std::time::Duration>,
	bearers: Mutex<Vec<String>>,
	script: Box<Script>,
}
impl Backend {
	pub fn new(
		script: impl Fn(usize, &ApiRequest) -> Result<ApiResponse, TransportError>
		+ 'static
		+ Send
		+ Sync,
	) -> Self {
		Self {
			exchanges: AtomicUsize::new(0),
			calls: AtomicUsize::new(0),
			exchange_fails: AtomicBool::new(false),
			expires_in: 7200,
			exchange_delay: None,
			bearers: Mutex::new(Vec::new()),
			script: Box::new(script),
		}
	}

	pub fn ok() -> Self {
		Self::new(|_, _| Ok(ApiResponse::new(StatusCode::OK, "{}")))
	}

	pub fn with_expires_in(mut self, expires_in: i64) -> Self {
		self.expires_in = expires_in;

		self
	}

	pub fn with_exchange_delay(mut self, delay: std::time::Duration) -> Self {
		self.exchange_delay = Some(delay);

		self
	}

	pub fn fail_exchanges(&self, fail: bool) {
		self.exchange_fails.store(fail, Ordering::SeqCst);
	}

	pub fn exchanges(&self) -> usize {
		self.exchanges.load(Ordering::SeqCst)
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn bearers(&self) -> Vec<String> {
		self.bearers.lock().clone()
	}
}
impl HttpTransport for Backend {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		let bearer = request
			.headers
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.unwrap_or_default()
			.to_owned();

		if request.url.path().ends_with("/auth/token") {
			let n = self.exchanges.fetch_add(1, Ordering::SeqCst);
			let result = if self.exchange_fails.load(Ordering::SeqCst) {
				Ok(ApiResponse::new(StatusCode::SERVICE_UNAVAILABLE, "{\"error\":\"exchange down\"}"))
			} else {
				Ok(ApiResponse::new(
					StatusCode::OK,
					format!("{{\"token\":\"token-{n}\",\"expiresIn\":{}}}", self.expires_in),
				))
			};
			let delay = self.exchange_delay;

			return Box::pin(async move {
				match delay {
					Some(delay) => tokio::time::sleep(delay).await,
					None => tokio::task::yield_now().await,
				}

				result
			});
		}

		let n = self.calls.fetch_add(1, Ordering::SeqCst);
		let result = (self.script)(n, &request);

		self.bearers.lock().push(bearer);

		Box::pin(async move {
			tokio::task::yield_now().await;

			result
		})
	}
}

pub fn base_url() -> Url {
	Url::parse("https://api.example.com/v1/").expect("Fixture base URL should parse.")
}

pub fn config(retry: RetryPolicy) -> ClientConfig {
	ClientConfig::builder(base_url())
		.retry(retry)
		.freshness_interval(None)
		.build()
		.expect("Fixture configuration should build.")
}

pub struct Harness {
	pub client: ResilientApiClient,
	pub backend: Arc<Backend>,
	pub identity: CountingIdentity,
	pub secrets: MemorySecretStore,
	pub clock: ManualClock,
}
impl Harness {
	pub fn new(config: ClientConfig, backend: Backend) -> Self {
		let backend = Arc::new(backend);
		let identity = CountingIdentity::default();
		let secrets = MemorySecretStore::default();
		let clock = ManualClock::new(EPOCH);
		let client = ResilientApiClient::with_clock(
			config,
			identity.provider(),
			backend.clone(),
			Arc::new(secrets.clone()),
			Arc::new(clock.clone()),
		);

		Self { client, backend, identity, secrets, clock }
	}

	pub fn tokens(&self) -> &TokenManager {
		self.client.token_manager()
	}

	pub fn advance(&self, delta: Duration) {
		self.clock.advance(delta);
	}
}
