//! Storage module for the banklink gateway.
//!
//! Provides a small key/value abstraction with in-memory and file-based
//! backends, a typed [`StorageService`] on top of it, and the [`OrderStore`]
//! the gateway reads orders from and records payment status in.

use async_trait::async_trait;
use banklink_types::OrderStatus;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

mod order_store;

pub use order_store::{OrderStore, StorageOrderStore};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs when a backend is configured incorrectly.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// Error that occurs when an order status change is not allowed.
	#[error("Order {order_id} cannot move from {from} to {to}")]
	InvalidTransition {
		order_id: String,
		from: OrderStatus,
		to: OrderStatus,
	},
}

/// Trait defining the low-level interface for storage backends.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes under the given key, replacing any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Replaces the value under `key` only if it still equals `expected`.
	///
	/// Returns `false` and writes nothing when the stored value has changed
	/// since `expected` was read. Fails with `NotFound` if the key is absent.
	/// The comparison and the write are atomic with respect to every other
	/// writer of the same backend, including other processes.
	async fn compare_and_swap(
		&self,
		key: &str,
		expected: &[u8],
		value: Vec<u8>,
	) -> Result<bool, StorageError>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Get all registered storage implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::NAME, file::create_storage as StorageFactory),
		(memory::NAME, memory::create_storage as StorageFactory),
	]
}

/// Creates the backend registered under `name`.
pub fn create_backend(
	name: &str,
	config: &toml::Value,
) -> Result<Box<dyn StorageInterface>, StorageError> {
	let factory = get_all_implementations()
		.into_iter()
		.find(|(registered, _)| *registered == name)
		.map(|(_, factory)| factory)
		.ok_or_else(|| {
			StorageError::Configuration(format!("Unknown storage implementation '{}'", name))
		})?;
	factory(config)
}

/// High-level storage service that provides typed operations.
///
/// Values are serialized to JSON and stored under `namespace:id`.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes).await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes = self.backend.get_bytes(&key).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Retrieves a value together with the raw bytes it was decoded from.
	///
	/// The bytes are the snapshot to pass to [`replace`](Self::replace).
	pub async fn retrieve_snapshot<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<(T, Vec<u8>), StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes = self.backend.get_bytes(&key).await?;
		let value = serde_json::from_slice(&bytes)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		Ok((value, bytes))
	}

	/// Writes `data` only if the stored value still matches `snapshot`.
	pub async fn replace<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		snapshot: &[u8],
		data: &T,
	) -> Result<bool, StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.compare_and_swap(&key, snapshot, bytes).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Record {
		value: u64,
	}

	#[tokio::test]
	async fn test_typed_round_trip() {
		let service = StorageService::new(Box::new(MemoryStorage::new()));
		service.store("records", "1", &Record { value: 7 }).await.unwrap();

		let record: Record = service.retrieve("records", "1").await.unwrap();
		assert_eq!(record, Record { value: 7 });
		let other: Result<Record, _> = service.retrieve("other", "1").await;
		assert!(matches!(other, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_retrieve_wrong_shape() {
		let service = StorageService::new(Box::new(MemoryStorage::new()));
		service.store("records", "1", &"text").await.unwrap();
		let result: Result<Record, _> = service.retrieve("records", "1").await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}

	#[tokio::test]
	async fn test_replace_detects_concurrent_change() {
		let service = StorageService::new(Box::new(MemoryStorage::new()));
		service.store("records", "1", &Record { value: 1 }).await.unwrap();

		let (record, snapshot): (Record, _) =
			service.retrieve_snapshot("records", "1").await.unwrap();
		assert_eq!(record.value, 1);

		service.store("records", "1", &Record { value: 2 }).await.unwrap();
		let replaced = service
			.replace("records", "1", &snapshot, &Record { value: 3 })
			.await
			.unwrap();
		assert!(!replaced);

		let current: Record = service.retrieve("records", "1").await.unwrap();
		assert_eq!(current.value, 2);

		let result = service
			.replace("records", "missing", &snapshot, &Record { value: 3 })
			.await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[test]
	fn test_create_backend_by_name() {
		let empty = toml::Value::Table(toml::Table::new());
		assert!(create_backend("memory", &empty).is_ok());
		assert!(matches!(
			create_backend("redis", &empty),
			Err(StorageError::Configuration(_))
		));
	}
}
