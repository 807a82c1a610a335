//! Credential lifecycle: single-flight acquisition, explicit refresh, and logout.
//!
//! [`TokenManager`] is the single source of truth for "is there a usable credential,
//! and if not, get one". Every acquisition runs behind one shared handle that is
//! installed while the state lock is held, before the first suspension point, so any
//! number of concurrent callers (foreground requests, 401 recovery, the background
//! freshness check) join the same exchange instead of racing duplicates.

mod freshness;
mod metrics;

pub use freshness::{FreshnessOutcome, FreshnessTask};
pub use metrics::AcquisitionMetrics;

// crates.io
use ::http::{
	HeaderValue, Method,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use futures_util::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	auth::{Credential, ExchangeResponse, TokenSecret},
	clock::{Clock, SystemClock},
	config::ClientConfig,
	error::taxonomy,
	http::{ApiRequest, HttpTransport},
	identity::IdentityProvider,
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	store::{CredentialStore, SecretStore, StoreError},
};

type AcquisitionResult = Result<Credential, ClassifiedError>;
type SharedAcquisition = Shared<BoxFuture<'static, AcquisitionResult>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AcquireMode {
	/// Adopt a valid stored credential before falling back to an exchange.
	Resolve,
	/// Always exchange.
	Force,
}

struct InFlight {
	id: u64,
	future: SharedAcquisition,
}

#[derive(Default)]
struct State {
	credential: Option<Credential>,
	in_flight: Option<InFlight>,
	epoch: u64,
	next_id: u64,
}

pub(crate) struct Inner {
	identity: Arc<dyn IdentityProvider>,
	transport: Arc<dyn HttpTransport>,
	store: CredentialStore,
	clock: Arc<dyn Clock>,
	exchange_endpoint: Url,
	refresh_margin: Duration,
	reuse_identity_token: bool,
	state: Mutex<State>,
	metrics: AcquisitionMetrics,
}

/// Owns the in-memory credential and deduplicates every credential exchange.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct TokenManager {
	pub(crate) inner: Arc<Inner>,
}
impl TokenManager {
	/// Creates a manager backed by the system clock.
	pub fn new(
		config: &ClientConfig,
		identity: Arc<dyn IdentityProvider>,
		transport: Arc<dyn HttpTransport>,
		secrets: Arc<dyn SecretStore>,
	) -> Self {
		Self::with_clock(config, identity, transport, secrets, Arc::new(SystemClock))
	}

	/// Creates a manager that reads time from `clock`.
	pub fn with_clock(
		config: &ClientConfig,
		identity: Arc<dyn IdentityProvider>,
		transport: Arc<dyn HttpTransport>,
		secrets: Arc<dyn SecretStore>,
		clock: Arc<dyn Clock>,
	) -> Self {
		let store = CredentialStore::new(secrets, clock.clone(), config.store_cache_ttl);

		Self {
			inner: Arc::new(Inner {
				identity,
				transport,
				store,
				clock,
				exchange_endpoint: config.exchange_endpoint.clone(),
				refresh_margin: config.refresh_margin,
				reuse_identity_token: config.reuse_identity_token,
				state: Mutex::new(State::default()),
				metrics: AcquisitionMetrics::default(),
			}),
		}
	}

	/// Returns a credential that is valid beyond the refresh margin, acquiring one if needed.
	pub async fn get_valid_credential(&self) -> Result<Credential, ClassifiedError> {
		let acquisition = {
			let mut state = self.inner.state.lock();
			let joined = state.in_flight.as_ref().map(|in_flight| in_flight.future.clone());

			match joined {
				Some(future) => future,
				None => {
					let now = self.inner.clock.now();
					let held = state
						.credential
						.as_ref()
						.filter(|credential| credential.is_valid_at(now, self.inner.refresh_margin))
						.cloned();

					if let Some(credential) = held {
						return Ok(credential);
					}

					self.install(&mut state, AcquireMode::Resolve)
				},
			}
		};

		acquisition.await
	}

	/// Forces a new exchange, joining one that is already in flight.
	///
	/// Every failure, including an unreachable exchange endpoint, is reported as
	/// [`ErrorKind::Authentication`].
	pub async fn refresh(&self) -> Result<Credential, ClassifiedError> {
		let acquisition = {
			let mut state = self.inner.state.lock();
			let joined = state.in_flight.as_ref().map(|in_flight| in_flight.future.clone());

			match joined {
				Some(future) => future,
				None => self.install(&mut state, AcquireMode::Force),
			}
		};

		acquisition.await
	}

	/// Logs out: drops the held credential, discards any in-flight result, and clears the
	/// persisted slot.
	pub async fn clear(&self) -> Result<(), StoreError> {
		{
			let mut state = self.inner.state.lock();

			state.credential = None;
			state.in_flight = None;
			state.epoch += 1;
		}

		obs::record_transition(OperationKind::Acquire, "cleared");

		self.inner.store.clear().await
	}

	/// Returns the held credential without validity checks or I/O.
	pub fn current(&self) -> Option<Credential> {
		self.inner.state.lock().credential.clone()
	}

	/// Returns `true` while an acquisition is in flight.
	pub fn is_acquiring(&self) -> bool {
		self.inner.state.lock().in_flight.is_some()
	}

	pub(crate) fn now(&self) -> OffsetDateTime {
		self.inner.clock.now()
	}

	/// Refresh margin applied to validity decisions.
	pub fn refresh_margin(&self) -> Duration {
		self.inner.refresh_margin
	}

	/// Acquisition counters.
	pub fn metrics(&self) -> &AcquisitionMetrics {
		&self.inner.metrics
	}

	/// Refreshes the held credential when its remaining lifetime has reached the margin.
	///
	/// Failures are logged and swallowed; the next foreground call retries through the
	/// normal path.
	pub async fn check_freshness(&self) -> FreshnessOutcome {
		let Some(credential) = self.current() else {
			return FreshnessOutcome::Idle;
		};
		let remaining = credential.remaining_at(self.inner.clock.now());

		if remaining > self.inner.refresh_margin {
			return FreshnessOutcome::Fresh;
		}

		obs::record_outcome(OperationKind::Freshness, OperationOutcome::Attempt);

		match self.refresh().await {
			Ok(_) => {
				obs::record_outcome(OperationKind::Freshness, OperationOutcome::Success);

				FreshnessOutcome::Refreshed
			},
			Err(e) => {
				obs::record_outcome(OperationKind::Freshness, OperationOutcome::Failure);
				obs::record_swallowed(OperationKind::Freshness, "refresh", &e);

				FreshnessOutcome::Failed
			},
		}
	}

	/// Starts the recurring freshness check on the current tokio runtime.
	pub fn spawn_freshness_check(&self, interval: Duration) -> FreshnessTask {
		FreshnessTask::spawn(self, interval)
	}

	fn install(&self, state: &mut State, mode: AcquireMode) -> SharedAcquisition {
		let id = state.next_id;
		let epoch = state.epoch;

		state.next_id += 1;

		let inner = self.inner.clone();
		let future = async move {
			let result = inner.acquire(mode, epoch).await;

			inner.settle(id, epoch, result)
		}
		.boxed()
		.shared();

		state.in_flight = Some(InFlight { id, future: future.clone() });

		future
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.inner.state.lock();

		f.debug_struct("TokenManager")
			.field("exchange_endpoint", &self.inner.exchange_endpoint.as_str())
			.field("refresh_margin", &self.inner.refresh_margin)
			.field("credential", &state.credential)
			.field("acquiring", &state.in_flight.is_some())
			.finish()
	}
}

impl Inner {
	async fn acquire(&self, mode: AcquireMode, epoch: u64) -> AcquisitionResult {
		let kind = match mode {
			AcquireMode::Resolve => OperationKind::Acquire,
			AcquireMode::Force => OperationKind::Refresh,
		};
		let span = OperationSpan::new(kind, "acquire");

		obs::record_outcome(kind, OperationOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.resolve_or_exchange(mode, epoch)).await;

		match &result {
			Ok(_) => {
				obs::record_outcome(kind, OperationOutcome::Success);
				self.metrics.record_success();
			},
			Err(_) => {
				obs::record_outcome(kind, OperationOutcome::Failure);
				self.metrics.record_failure();
			},
		}

		result
	}

	async fn resolve_or_exchange(&self, mode: AcquireMode, epoch: u64) -> AcquisitionResult {
		let held = self.state.lock().credential.clone();
		let stored = match mode {
			AcquireMode::Resolve => self.store.read().await,
			AcquireMode::Force => None,
		};

		if let Some(valid) =
			stored.as_ref().filter(|stored| stored.is_valid_at(self.clock.now(), self.refresh_margin))
		{
			return Ok(valid.clone());
		}

		let reusable = self
			.reuse_identity_token
			.then(|| {
				held.iter()
					.chain(stored.iter())
					.find_map(|credential| credential.identity_token.clone())
					.filter(|identity| !identity.is_blank())
			})
			.flatten();
		let credential = self.exchange_with_identity(reusable).await?;

		let current_session = self.state.lock().epoch == epoch;

		if current_session {
			if let Err(e) = self.store.write(&credential).await {
				obs::record_swallowed(OperationKind::Store, "persist", &e);
			}
		}

		Ok(credential)
	}

	async fn exchange_with_identity(&self, reusable: Option<TokenSecret>) -> AcquisitionResult {
		if let Some(identity) = reusable {
			match self.exchange(identity.expose()).await {
				Err(e) if matches!(e.status, Some(401 | 403)) => {
					obs::record_transition(OperationKind::Acquire, "identity_rejected");
				},
				result => return result,
			}
		}

		let identity = self.mint_identity().await?;

		self.exchange(&identity).await
	}

	async fn mint_identity(&self) -> Result<String, ClassifiedError> {
		self.metrics.record_identity_mint();

		let identity = self.identity.mint_identity_token().await.map_err(|e| {
			ClassifiedError::authentication("Identity provider could not mint a token.")
				.with_cause(e)
		})?;

		if identity.trim().is_empty() {
			return Err(ClassifiedError::authentication("Identity provider returned an empty token."));
		}

		Ok(identity)
	}

	async fn exchange(&self, identity: &str) -> AcquisitionResult {
		self.metrics.record_exchange();

		let bearer = HeaderValue::try_from(format!("Bearer {identity}")).map_err(|e| {
			ClassifiedError::authentication("Identity token is not a valid header value.")
				.with_cause(e)
		})?;
		let request = ApiRequest::new(Method::POST, self.exchange_endpoint.clone())
			.with_header(AUTHORIZATION, bearer)
			.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_body(&b"{}"[..]);
		let response = self.transport.send(request).await.map_err(|e| {
			ClassifiedError::authentication("Credential exchange could not reach the server.")
				.with_cause(e)
		})?;
		let status = response.status.as_u16();

		if !response.is_success() {
			let detail = taxonomy::classify_status(status, &response.text());

			return Err(ClassifiedError::authentication(format!(
				"Credential exchange failed: {}",
				detail.message
			))
			.with_status(status));
		}

		let body = serde_json::from_slice::<ExchangeResponse>(&response.body).map_err(|e| {
			ClassifiedError::authentication("Credential exchange returned an unreadable body.")
				.with_status(status)
				.with_cause(e)
		})?;

		Credential::from_exchange(body, identity, self.clock.now())
	}

	fn settle(&self, id: u64, epoch: u64, result: AcquisitionResult) -> AcquisitionResult {
		let mut state = self.state.lock();

		if state.in_flight.as_ref().is_some_and(|in_flight| in_flight.id == id) {
			state.in_flight = None;
		}
		if state.epoch != epoch {
			return Err(ClassifiedError::new(
				ErrorKind::Authentication,
				"Credential acquisition was discarded because the session ended.",
			));
		}
		// A failed acquisition leaves the session without a credential.
		state.credential = result.as_ref().ok().cloned();

		result
	}
}
