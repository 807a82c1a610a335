//! Thread-safe in-memory [`SecretStore`] for local development and tests.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use parking_lot::RwLock;
// self
use crate::{
	_prelude::*,
	store::{SecretStore, StoreError, StoreFuture},
};

/// Per-operation call counters.
#[derive(Debug, Default)]
struct CallCounters {
	reads: AtomicU64,
	writes: AtomicU64,
	deletes: AtomicU64,
}

/// Storage backend that keeps the slot in-process and counts how often it is touched.
#[derive(Clone, Debug, Default)]
pub struct MemorySecretStore {
	slot: Arc<RwLock<Option<String>>>,
	calls: Arc<CallCounters>,
	failure: Arc<Mutex<Option<StoreError>>>,
}
impl MemorySecretStore {
	/// Creates a store whose slot already holds `value`.
	pub fn with_value(value: impl Into<String>) -> Self {
		let store = Self::default();

		*store.slot.write() = Some(value.into());

		store
	}

	/// Returns the raw slot contents without counting a read.
	pub fn peek(&self) -> Option<String> {
		self.slot.read().clone()
	}

	/// Makes every subsequent operation fail with `error` until cleared with `None`.
	pub fn fail_with(&self, error: Option<StoreError>) {
		*self.failure.lock() = error;
	}

	/// Number of [`SecretStore::read`] calls observed.
	pub fn reads(&self) -> u64 {
		self.calls.reads.load(Ordering::Relaxed)
	}

	/// Number of [`SecretStore::write`] calls observed.
	pub fn writes(&self) -> u64 {
		self.calls.writes.load(Ordering::Relaxed)
	}

	/// Number of [`SecretStore::delete`] calls observed.
	pub fn deletes(&self) -> u64 {
		self.calls.deletes.load(Ordering::Relaxed)
	}

	fn check_failure(&self) -> Result<(), StoreError> {
		match self.failure.lock().clone() {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}
}
impl SecretStore for MemorySecretStore {
	fn read(&self) -> StoreFuture<'_, Option<String>> {
		Box::pin(async move {
			self.calls.reads.fetch_add(1, Ordering::Relaxed);
			self.check_failure()?;

			Ok(self.slot.read().clone())
		})
	}

	fn write(&self, value: String) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.calls.writes.fetch_add(1, Ordering::Relaxed);
			self.check_failure()?;

			*self.slot.write() = Some(value);

			Ok(())
		})
	}

	fn delete(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.calls.deletes.fetch_add(1, Ordering::Relaxed);
			self.check_failure()?;

			*self.slot.write() = None;

			Ok(())
		})
	}
}
