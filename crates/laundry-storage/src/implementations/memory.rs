//! In-memory storage backend.
//!
//! Nothing survives a restart; used for tests and for deployments where
//! preferences do not need to persist.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use laundry_types::ImplementationRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct MemoryStorage {
	store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store.contains_key(key))
	}
}

/// Factory for the memory backend. It takes no options; any key is rejected.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	if let Some(table) = config.as_table() {
		if let Some(key) = table.keys().next() {
			return Err(StorageError::Configuration(format!(
				"memory storage takes no options, found '{}'",
				key
			)));
		}
	}
	Ok(Box::new(MemoryStorage::new()))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "branch_selection:l-1";
		let value = b"\"b-norte\"".to_vec();
		storage.set_bytes(key, value.clone()).await.unwrap();

		assert_eq!(storage.get_bytes(key).await.unwrap(), value);
		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());
		assert!(matches!(
			storage.get_bytes(key).await,
			Err(StorageError::NotFound)
		));

		// Deleting again is fine
		storage.delete(key).await.unwrap();
	}

	#[tokio::test]
	async fn test_last_write_wins() {
		let storage = MemoryStorage::new();
		let key = "branch_selection:l-1";

		storage.set_bytes(key, b"1".to_vec()).await.unwrap();
		storage.set_bytes(key, b"2".to_vec()).await.unwrap();
		assert_eq!(storage.get_bytes(key).await.unwrap(), b"2".to_vec());
	}

	#[test]
	fn test_factory_rejects_options() {
		let config: toml::Value = toml::from_str("storage_path = \"/tmp\"").unwrap();
		assert!(create_storage(&config).is_err());

		let empty = toml::Value::Table(toml::map::Map::new());
		assert!(create_storage(&empty).is_ok());
	}
}
