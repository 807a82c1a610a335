//! Credential persistence with a short-lived read cache in front of the secret store.

// self
use crate::{
	_prelude::*,
	auth::Credential,
	clock::Clock,
	obs::{self, OperationKind},
	store::{SecretStore, StoreError},
};

#[derive(Clone, Debug)]
struct CacheEntry {
	value: Option<Credential>,
	fetched_at: OffsetDateTime,
}

/// Read/write view of the persisted [`Credential`] slot.
///
/// Reads are served from memory for `ttl` after the last fetch or write so a slow or
/// rate-limited secret store is consulted at most once per window. Backend reads and
/// mutations are serialized so a stale fetch can never overwrite the cache entry left by
/// a newer write.
pub struct CredentialStore {
	backend: Arc<dyn SecretStore>,
	clock: Arc<dyn Clock>,
	ttl: Duration,
	cache: Mutex<Option<CacheEntry>>,
	io: AsyncMutex<()>,
}
impl CredentialStore {
	/// Wraps `backend` with a read cache of lifetime `ttl`.
	pub fn new(backend: Arc<dyn SecretStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
		Self { backend, clock, ttl, cache: Mutex::new(None), io: AsyncMutex::new(()) }
	}

	/// Returns the persisted credential, or `None` when absent, undecodable, or unreadable.
	pub async fn read(&self) -> Option<Credential> {
		if let Some(value) = self.cached() {
			return value;
		}

		let _io = self.io.lock().await;

		// Another reader may have filled the cache while this one waited.
		if let Some(value) = self.cached() {
			return value;
		}

		let value = match self.backend.read().await {
			Ok(Some(raw)) => decode(&raw),
			Ok(None) => None,
			Err(e) => {
				obs::record_swallowed(OperationKind::Store, "read", &e);

				None
			},
		};

		self.fill(value.clone());

		value
	}

	/// Persists `credential` and makes it visible to reads within the cache window.
	pub async fn write(&self, credential: &Credential) -> Result<(), StoreError> {
		let raw = serde_json::to_string(credential)
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;
		let _io = self.io.lock().await;

		match self.backend.write(raw).await {
			Ok(()) => {
				self.fill(Some(credential.clone()));

				Ok(())
			},
			Err(e) => {
				self.invalidate();

				Err(e)
			},
		}
	}

	/// Deletes the persisted credential and invalidates the cache.
	pub async fn clear(&self) -> Result<(), StoreError> {
		let _io = self.io.lock().await;

		self.invalidate();
		self.backend.delete().await
	}

	/// Drops the cached entry so the next read consults the backend.
	pub fn invalidate(&self) {
		*self.cache.lock() = None;
	}

	fn cached(&self) -> Option<Option<Credential>> {
		let now = self.clock.now();
		let cache = self.cache.lock();

		cache
			.as_ref()
			.filter(|entry| now - entry.fetched_at < self.ttl)
			.map(|entry| entry.value.clone())
	}

	fn fill(&self, value: Option<Credential>) {
		*self.cache.lock() = Some(CacheEntry { value, fetched_at: self.clock.now() });
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialStore").field("ttl", &self.ttl).finish()
	}
}

fn decode(raw: &str) -> Option<Credential> {
	match serde_json::from_str::<Credential>(raw) {
		Ok(credential) => Some(credential),
		Err(e) => {
			obs::record_swallowed(OperationKind::Store, "decode", &e);

			None
		},
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{clock::ManualClock, store::MemorySecretStore};

	const TTL: Duration = Duration::seconds(5);

	fn fixture(backend: MemorySecretStore) -> (CredentialStore, ManualClock) {
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));
		let store = CredentialStore::new(Arc::new(backend), Arc::new(clock.clone()), TTL);

		(store, clock)
	}

	fn credential(token: &str) -> Credential {
		Credential::new(
			token,
			macros::datetime!(2025-01-01 00:00 UTC),
			macros::datetime!(2025-01-01 02:00 UTC),
		)
		.with_identity_token("identity")
	}

	#[tokio::test]
	async fn write_then_read_skips_backend() {
		let backend = MemorySecretStore::default();
		let (store, _clock) = fixture(backend.clone());
		let record = credential("abc");

		store.write(&record).await.expect("Credential write should succeed.");

		assert_eq!(store.read().await, Some(record));
		assert_eq!(backend.reads(), 0);
		assert_eq!(backend.writes(), 1);
	}

	#[tokio::test]
	async fn reads_are_cached_until_ttl_elapses() {
		let backend = MemorySecretStore::with_value(
			serde_json::to_string(&credential("abc")).expect("Fixture should serialize."),
		);
		let (store, clock) = fixture(backend.clone());

		assert!(store.read().await.is_some());
		assert!(store.read().await.is_some());
		assert_eq!(backend.reads(), 1);

		clock.advance(TTL - Duration::milliseconds(1));

		assert!(store.read().await.is_some());
		assert_eq!(backend.reads(), 1);

		clock.advance(Duration::milliseconds(1));

		assert!(store.read().await.is_some());
		assert_eq!(backend.reads(), 2);
	}

	#[tokio::test]
	async fn placeholder_contents_read_as_absent() {
		let backend = MemorySecretStore::with_value("secret-value");
		let (store, _clock) = fixture(backend.clone());

		assert_eq!(store.read().await, None);
		assert_eq!(store.read().await, None);
		assert_eq!(backend.reads(), 1);
	}

	#[tokio::test]
	async fn backend_failures_read_as_absent_but_writes_propagate() {
		let backend = MemorySecretStore::default();
		let (store, _clock) = fixture(backend.clone());

		backend.fail_with(Some(StoreError::Backend { message: "keychain locked".into() }));

		assert_eq!(store.read().await, None);

		let err = store.write(&credential("abc")).await.expect_err("Write failures must propagate.");

		assert!(matches!(err, StoreError::Backend { .. }));
		assert!(store.clear().await.is_err());
	}

	#[tokio::test]
	async fn clear_deletes_and_invalidates() {
		let backend = MemorySecretStore::default();
		let (store, _clock) = fixture(backend.clone());

		store.write(&credential("abc")).await.expect("Credential write should succeed.");
		store.clear().await.expect("Credential clear should succeed.");

		assert_eq!(backend.peek(), None);
		assert_eq!(store.read().await, None);
		assert_eq!(backend.reads(), 1);
		assert_eq!(backend.deletes(), 1);
	}
}
