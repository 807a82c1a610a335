//! Secret-store contract, built-in backends, and the cached credential store.

pub mod credential;
pub mod file;
pub mod memory;

pub use credential::CredentialStore;
pub use file::FileSecretStore;
pub use memory::MemorySecretStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`SecretStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Single-slot persistent secret storage provided by the host platform.
///
/// Implementations may be slow or rate limited and may return placeholder text that is
/// not a serialized credential; callers treat anything undecodable as "no credential".
pub trait SecretStore
where
	Self: Send + Sync,
{
	/// Reads the raw slot contents, if any.
	fn read(&self) -> StoreFuture<'_, Option<String>>;

	/// Replaces the slot contents.
	fn write(&self, value: String) -> StoreFuture<'_, ()>;

	/// Deletes the slot contents.
	fn delete(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`SecretStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced while encoding a record.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
