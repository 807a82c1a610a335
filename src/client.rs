//! Authenticated request client with 401 recovery and bounded retry.
//!
//! Every request carries the current bearer credential. A 401 starts exactly one
//! recovery: the first caller drives a forced refresh while later 401s park in a FIFO
//! queue, and once the refresh settles the queue is replayed in arrival order with the
//! new credential (or rejected with the refresh error). Around that sits a bounded
//! exponential retry that only re-attempts failures the taxonomy marks as retryable.

mod metrics;
mod retry;

pub use metrics::RequestMetrics;
pub use retry::RetryPolicy;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use ::http::{
	HeaderValue, Method, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::Credential,
	clock::{Clock, SystemClock},
	config::ClientConfig,
	error::taxonomy,
	http::{ApiRequest, ApiResponse, HttpTransport},
	identity::IdentityProvider,
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	store::SecretStore,
	token::{FreshnessTask, TokenManager},
};

type RequestResult = Result<ApiResponse, ClassifiedError>;
type RecoveryQueue = VecDeque<QueuedRequest>;

struct QueuedRequest {
	request: ApiRequest,
	responder: oneshot::Sender<RequestResult>,
}

enum RecoveryRole<'a> {
	// The token was rotated after this request was sent.
	Replay(ApiRequest, Credential),
	Leader(ApiRequest, RecoveryGate<'a>),
	Follower(oneshot::Receiver<RequestResult>),
}

/// Marks a recovery as underway for as long as it lives.
///
/// Dropping an unsettled gate (the leading caller was cancelled) closes the recovery and
/// drops every queued responder, so parked callers fail instead of waiting forever.
struct RecoveryGate<'a> {
	slot: &'a Mutex<Option<RecoveryQueue>>,
	settled: bool,
}
impl RecoveryGate<'_> {
	fn settle(mut self) -> RecoveryQueue {
		self.settled = true;

		self.slot.lock().take().unwrap_or_default()
	}
}
impl Drop for RecoveryGate<'_> {
	fn drop(&mut self) {
		if !self.settled {
			drop(self.slot.lock().take());
		}
	}
}

struct ClientInner {
	config: ClientConfig,
	tokens: TokenManager,
	transport: Arc<dyn HttpTransport>,
	// `Some` while a recovery is underway.
	recovery: Mutex<Option<RecoveryQueue>>,
	freshness: Mutex<Option<FreshnessTask>>,
	closed: AtomicBool,
	metrics: RequestMetrics,
}

/// Issues authenticated business requests on behalf of the signed-in session.
///
/// Cloning is cheap; clones share the credential, the recovery queue, and the freshness
/// task. The freshness task stops once the last clone is dropped.
#[derive(Clone)]
pub struct ResilientApiClient {
	inner: Arc<ClientInner>,
}
impl ResilientApiClient {
	/// Creates a client and its token manager, backed by the system clock.
	pub fn new(
		config: ClientConfig,
		identity: Arc<dyn IdentityProvider>,
		transport: Arc<dyn HttpTransport>,
		secrets: Arc<dyn SecretStore>,
	) -> Self {
		Self::with_clock(config, identity, transport, secrets, Arc::new(SystemClock))
	}

	/// Creates a client whose token manager reads time from `clock`.
	pub fn with_clock(
		config: ClientConfig,
		identity: Arc<dyn IdentityProvider>,
		transport: Arc<dyn HttpTransport>,
		secrets: Arc<dyn SecretStore>,
		clock: Arc<dyn Clock>,
	) -> Self {
		let tokens = TokenManager::with_clock(&config, identity, transport.clone(), secrets, clock);

		Self::with_token_manager(config, tokens, transport)
	}

	/// Creates a client around an existing token manager.
	pub fn with_token_manager(
		config: ClientConfig,
		tokens: TokenManager,
		transport: Arc<dyn HttpTransport>,
	) -> Self {
		Self {
			inner: Arc::new(ClientInner {
				config,
				tokens,
				transport,
				recovery: Mutex::new(None),
				freshness: Mutex::new(None),
				closed: AtomicBool::new(false),
				metrics: RequestMetrics::default(),
			}),
		}
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Token manager shared with the background freshness check.
	pub fn token_manager(&self) -> &TokenManager {
		&self.inner.tokens
	}

	/// Request counters.
	pub fn metrics(&self) -> &RequestMetrics {
		&self.inner.metrics
	}

	/// Returns `true` while a 401 recovery is underway.
	pub fn is_recovering(&self) -> bool {
		self.inner.recovery.lock().is_some()
	}

	/// Returns `true` while the background freshness check is scheduled.
	pub fn is_freshness_check_running(&self) -> bool {
		self.inner.freshness.lock().as_ref().is_some_and(FreshnessTask::is_running)
	}

	/// Sends `request` with the current credential, recovering from 401 and retrying
	/// retryable failures within the configured bound.
	pub async fn request(&self, request: ApiRequest) -> RequestResult {
		self.ensure_freshness_check();

		let span = OperationSpan::new(OperationKind::Request, "request");

		obs::record_outcome(OperationKind::Request, OperationOutcome::Attempt);

		let result = span.instrument(self.with_retry(request)).await;

		match &result {
			Ok(_) => obs::record_outcome(OperationKind::Request, OperationOutcome::Success),
			Err(_) => obs::record_outcome(OperationKind::Request, OperationOutcome::Failure),
		}

		result
	}

	/// Sends `request` and decodes a successful body as JSON.
	pub async fn request_json<T>(&self, request: ApiRequest) -> Result<T, ClassifiedError>
	where
		T: DeserializeOwned,
	{
		self.request(request).await?.json()
	}

	/// `GET` against a path relative to the base URL (or an absolute URL).
	pub async fn get(&self, target: &str) -> RequestResult {
		let request = self.prepare(Method::GET, target)?;

		self.request(request).await
	}

	/// `DELETE` against a path relative to the base URL (or an absolute URL).
	pub async fn delete(&self, target: &str) -> RequestResult {
		let request = self.prepare(Method::DELETE, target)?;

		self.request(request).await
	}

	/// `POST` with a JSON body.
	pub async fn post_json<B>(&self, target: &str, body: &B) -> RequestResult
	where
		B: ?Sized + Serialize,
	{
		let request = self.prepare(Method::POST, target)?.with_json(body)?;

		self.request(request).await
	}

	/// `PUT` with a JSON body.
	pub async fn put_json<B>(&self, target: &str, body: &B) -> RequestResult
	where
		B: ?Sized + Serialize,
	{
		let request = self.prepare(Method::PUT, target)?.with_json(body)?;

		self.request(request).await
	}

	/// Ends the session: stops the freshness check and clears the held and persisted
	/// credential. An acquisition still in flight is discarded.
	pub async fn logout(&self) -> Result<()> {
		self.stop_freshness_check();
		self.inner.tokens.clear().await?;

		Ok(())
	}

	/// Stops the freshness check for good; requests keep working without it.
	pub fn shutdown(&self) {
		self.inner.closed.store(true, Ordering::Release);
		self.stop_freshness_check();
	}

	fn prepare(&self, method: Method, target: &str) -> Result<ApiRequest, ClassifiedError> {
		let url = self.inner.config.resolve(target).map_err(|e| {
			ClassifiedError::new(ErrorKind::Client, format!("Request target `{target}` is invalid."))
				.with_cause(e)
		})?;

		Ok(ApiRequest::new(method, url))
	}

	fn ensure_freshness_check(&self) {
		let Some(interval) = self.inner.config.freshness_interval else { return };

		if self.inner.closed.load(Ordering::Acquire) {
			return;
		}

		let mut slot = self.inner.freshness.lock();

		if !slot.as_ref().is_some_and(FreshnessTask::is_running) {
			*slot = Some(self.inner.tokens.spawn_freshness_check(interval));
		}
	}

	fn stop_freshness_check(&self) {
		if let Some(task) = self.inner.freshness.lock().take() {
			task.stop();
		}
	}

	async fn with_retry(&self, request: ApiRequest) -> RequestResult {
		let policy = self.inner.config.retry;
		let mut retry = 0;

		loop {
			let error = match self.attempt(request.clone()).await {
				Ok(response) => return Ok(response),
				Err(e) => e,
			};

			if !error.is_retryable() || retry >= policy.max_retries {
				return Err(error);
			}

			retry += 1;

			let delay = policy.delay_with_hint(retry, error.retry_after);

			obs::record_outcome(OperationKind::Request, OperationOutcome::Retry);
			self.inner.metrics.record_retry();

			if delay.is_positive() {
				tokio::time::sleep(delay.unsigned_abs()).await;
			}
		}
	}

	async fn attempt(&self, request: ApiRequest) -> RequestResult {
		let credential = self.inner.tokens.get_valid_credential().await?;
		let response = self.send(&request, &credential).await?;

		if response.status == StatusCode::UNAUTHORIZED {
			return self.recover(request, credential).await;
		}

		into_result(response, self.inner.tokens.now())
	}

	async fn recover(&self, request: ApiRequest, used: Credential) -> RequestResult {
		let role = {
			let mut recovery = self.inner.recovery.lock();

			match recovery.as_mut() {
				Some(queue) => {
					let (responder, receiver) = oneshot::channel();

					queue.push_back(QueuedRequest { request, responder });
					self.inner.metrics.record_queued();

					RecoveryRole::Follower(receiver)
				},
				None => {
					// A finished recovery installs the new credential before closing the queue,
					// so a token rotated by it is visible here.
					let rotated =
						self.inner.tokens.current().filter(|current| current.token != used.token);

					match rotated {
						Some(current) => RecoveryRole::Replay(request, current),
						None => {
							*recovery = Some(VecDeque::new());

							RecoveryRole::Leader(
								request,
								RecoveryGate { slot: &self.inner.recovery, settled: false },
							)
						},
					}
				},
			}
		};

		match role {
			RecoveryRole::Replay(request, current) => self.replay(&request, &current).await,
			RecoveryRole::Follower(receiver) => receiver.await.unwrap_or_else(|_| {
				Err(ClassifiedError::authentication(
					"Session recovery was abandoned before this request was replayed.",
				))
			}),
			RecoveryRole::Leader(request, gate) => self.lead_recovery(request, gate).await,
		}
	}

	async fn lead_recovery(&self, request: ApiRequest, gate: RecoveryGate<'_>) -> RequestResult {
		let span = OperationSpan::new(OperationKind::Recovery, "refresh");

		obs::record_outcome(OperationKind::Recovery, OperationOutcome::Attempt);
		self.inner.metrics.record_recovery();

		let refreshed = span.instrument(self.inner.tokens.refresh()).await;
		let queued = gate.settle();

		match refreshed {
			Ok(credential) => {
				obs::record_outcome(OperationKind::Recovery, OperationOutcome::Success);

				let own = self.replay(&request, &credential).await;

				for entry in queued {
					let result = self.replay(&entry.request, &credential).await;

					// The caller may have given up; nothing to deliver then.
					let _ = entry.responder.send(result);
				}

				own
			},
			Err(e) => {
				obs::record_outcome(OperationKind::Recovery, OperationOutcome::Failure);

				for entry in queued {
					let _ = entry.responder.send(Err(e.clone()));
				}

				Err(e)
			},
		}
	}

	// A 401 here classifies as Authentication; there is no nested recovery.
	async fn replay(&self, request: &ApiRequest, credential: &Credential) -> RequestResult {
		self.inner.metrics.record_replay();

		let response = self.send(request, credential).await?;

		into_result(response, self.inner.tokens.now())
	}

	async fn send(&self, request: &ApiRequest, credential: &Credential) -> RequestResult {
		let mut bearer = HeaderValue::try_from(format!("Bearer {}", credential.token.expose()))
			.map_err(|e| {
				ClassifiedError::authentication("Credential is not a valid header value.")
					.with_cause(e)
			})?;

		bearer.set_sensitive(true);

		let mut outbound = request.clone();

		outbound.headers.insert(AUTHORIZATION, bearer);

		if !outbound.headers.contains_key(CONTENT_TYPE) {
			outbound.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		}

		self.inner.metrics.record_attempt();
		self.inner.transport.send(outbound).await.map_err(taxonomy::classify_transport)
	}
}
impl Debug for ResilientApiClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResilientApiClient")
			.field("base_url", &self.inner.config.base_url.as_str())
			.field("tokens", &self.inner.tokens)
			.field("recovering", &self.is_recovering())
			.finish()
	}
}

fn into_result(response: ApiResponse, now: OffsetDateTime) -> RequestResult {
	if response.is_success() {
		return Ok(response);
	}

	let status = response.status.as_u16();
	let error = taxonomy::classify_status(status, &response.text());
	let hint = response.retry_after(now).filter(|_| error.kind == ErrorKind::RateLimit);

	Err(error.with_retry_after(hint))
}
