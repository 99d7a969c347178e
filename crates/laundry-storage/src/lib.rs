//! Local preference storage.
//!
//! A small key-value store for per-device preferences such as the last branch
//! an owner selected for each laundry. It is a convenience, never a source of
//! truth: concurrent writers simply overwrite each other.

use async_trait::async_trait;
use laundry_types::ImplementationRegistry;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

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
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level interface implemented by storage backends.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, replacing any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value for the key. Deleting a missing key is not an error.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Returns `(name, factory)` for every built-in storage implementation.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Typed access to a storage backend.
///
/// Values are addressed by a namespace and an id, joined as `namespace:id`,
/// and stored as JSON.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a serializable value, overwriting any previous one.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&Self::key(namespace, id), bytes).await
	}

	/// Retrieves and deserializes a value. Missing keys are `StorageError::NotFound`.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Like [`retrieve`](Self::retrieve) but maps a missing key to `None`.
	pub async fn retrieve_optional<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use laundry_types::PreferenceKey;

	#[tokio::test]
	async fn test_typed_round_trip_and_optional() {
		let service = StorageService::new(Box::new(MemoryStorage::new()));
		let ns = PreferenceKey::BranchSelection.as_str();

		assert_eq!(
			service
				.retrieve_optional::<String>(ns, "l-1")
				.await
				.unwrap(),
			None
		);

		service.store(ns, "l-1", &"b-centro".to_string()).await.unwrap();
		assert!(service.exists(ns, "l-1").await.unwrap());
		assert_eq!(
			service
				.retrieve_optional::<String>(ns, "l-1")
				.await
				.unwrap()
				.as_deref(),
			Some("b-centro")
		);

		// Other laundries are untouched
		assert!(!service.exists(ns, "l-2").await.unwrap());

		service.remove(ns, "l-1").await.unwrap();
		assert!(matches!(
			service.retrieve::<String>(ns, "l-1").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_corrupt_value_is_serialization_error() {
		let backend = MemoryStorage::new();
		backend
			.set_bytes("branch_selection:l-1", b"not json".to_vec())
			.await
			.unwrap();
		let service = StorageService::new(Box::new(backend));

		let result = service
			.retrieve_optional::<String>("branch_selection", "l-1")
			.await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["file", "memory"]);
	}
}
