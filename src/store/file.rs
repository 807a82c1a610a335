//! Simple file-backed [`SecretStore`] for desktop hosts and local tooling.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind as IoErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{SecretStore, StoreError, StoreFuture},
};

/// Persists the single secret slot to a file, replacing it atomically on every write.
#[derive(Clone, Debug)]
pub struct FileSecretStore {
	path: PathBuf,
	guard: Arc<Mutex<()>>,
}
impl FileSecretStore {
	/// Opens a store at the provided path, creating parent directories as needed.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		Ok(Self { path, guard: Default::default() })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn read_now(&self) -> Result<Option<String>, StoreError> {
		let _guard = self.guard.lock();

		match fs::read_to_string(&self.path) {
			Ok(contents) if contents.is_empty() => Ok(None),
			Ok(contents) => Ok(Some(contents)),
			Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to read {}: {e}", self.path.display()),
			}),
		}
	}

	fn write_now(&self, value: &str) -> Result<(), StoreError> {
		let _guard = self.guard.lock();

		Self::ensure_parent_exists(&self.path)?;

		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(value.as_bytes()).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn delete_now(&self) -> Result<(), StoreError> {
		let _guard = self.guard.lock();

		match fs::remove_file(&self.path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to remove {}: {e}", self.path.display()),
			}),
		}
	}
}
impl SecretStore for FileSecretStore {
	fn read(&self) -> StoreFuture<'_, Option<String>> {
		Box::pin(async move { self.read_now() })
	}

	fn write(&self, value: String) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.write_now(&value) })
	}

	fn delete(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.delete_now() })
	}
}
