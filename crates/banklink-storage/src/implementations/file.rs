//! File-based storage backend.
//!
//! Each key is one JSON file under the configured directory. Writes go to a
//! uniquely named temporary file first and are renamed into place, so a
//! crash never leaves a half-written order record behind.
//!
//! Every write holds an exclusive lock on a `<key>.lock` file next to the
//! record. The lock is an OS file lock, so separate processes sharing the
//! directory are serialized too.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Name the backend is registered under.
pub const NAME: &str = "file";

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage instance rooted at `base_path`.
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', '\\', ':', '.'], "_");
		self.base_path.join(format!("{}.json", safe_key))
	}
}

/// Exclusive lock on a record, released on drop.
struct RecordLock(File);

impl RecordLock {
	fn acquire(path: &Path) -> Result<Self, StorageError> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).map_err(backend)?;
		}
		let file = OpenOptions::new()
			.create(true)
			.truncate(false)
			.write(true)
			.open(path.with_extension("lock"))
			.map_err(backend)?;
		file.lock_exclusive().map_err(backend)?;
		Ok(Self(file))
	}
}

impl Drop for RecordLock {
	fn drop(&mut self) {
		let _ = FileExt::unlock(&self.0);
	}
}

fn backend(e: std::io::Error) -> StorageError {
	StorageError::Backend(e.to_string())
}

/// Writes `value` to a fresh temporary file in the record's directory and
/// renames it over `path`.
fn write_atomic(path: &Path, value: &[u8]) -> Result<(), StorageError> {
	let parent = path.parent().unwrap_or_else(|| Path::new("."));
	let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(backend)?;
	temp.write_all(value).map_err(backend)?;
	temp.as_file().sync_all().map_err(backend)?;
	temp.persist(path).map_err(|e| backend(e.error))?;
	Ok(())
}

/// Runs blocking file work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, StorageError>
where
	F: FnOnce() -> Result<T, StorageError> + Send + 'static,
	T: Send + 'static,
{
	tokio::task::spawn_blocking(work)
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))?
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);

		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(backend(e)),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		blocking(move || {
			let _lock = RecordLock::acquire(&path)?;
			write_atomic(&path, &value)?;
			tracing::debug!(path = %path.display(), "Stored record");
			Ok(())
		})
		.await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		blocking(move || {
			let _lock = RecordLock::acquire(&path)?;
			match std::fs::remove_file(&path) {
				Ok(_) => Ok(()),
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
				Err(e) => Err(backend(e)),
			}
		})
		.await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let path = self.get_file_path(key);
		fs::try_exists(&path).await.map_err(backend)
	}

	async fn compare_and_swap(
		&self,
		key: &str,
		expected: &[u8],
		value: Vec<u8>,
	) -> Result<bool, StorageError> {
		let path = self.get_file_path(key);
		let expected = expected.to_vec();

		blocking(move || {
			let _lock = RecordLock::acquire(&path)?;
			let current = match std::fs::read(&path) {
				Ok(data) => data,
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
					return Err(StorageError::NotFound)
				},
				Err(e) => return Err(backend(e)),
			};
			if current != expected {
				tracing::debug!(path = %path.display(), "Record changed since it was read");
				return Ok(false);
			}
			write_atomic(&path, &value)?;
			Ok(true)
		})
		.await
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/orders")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = match config.get("storage_path") {
		None => "./data/orders",
		Some(value) => value.as_str().ok_or_else(|| {
			StorageError::Configuration("storage_path must be a string".into())
		})?,
	};

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}
