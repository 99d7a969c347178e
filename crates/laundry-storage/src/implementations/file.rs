//! File-based storage backend.
//!
//! Each key is stored as one JSON file under a base directory. Writes go to a
//! temporary file first and are renamed into place, so a reader never sees a
//! partially written preference.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use laundry_types::ImplementationRegistry;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs;

const DEFAULT_STORAGE_PATH: &str = "./data/preferences";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileStorageConfig {
	#[serde(default = "default_storage_path")]
	storage_path: String,
}

fn default_storage_path() -> String {
	DEFAULT_STORAGE_PATH.to_string()
}

pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Maps a key to a filesystem-safe path, `branch_selection:l-1` becomes
	/// `branch_selection_l-1.json`.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', '\\', ':', '.'], "_");
		self.base_path.join(format!("{}.json", safe_key))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);

		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		tracing::debug!(key = %key, path = %path.display(), "Stored preference");
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let path = self.get_file_path(key);
		fs::try_exists(&path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for preference files (default: "./data/preferences")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let config: FileStorageConfig = config
		.clone()
		.try_into()
		.map_err(|e: toml::de::Error| StorageError::Configuration(e.to_string()))?;

	Ok(Box::new(FileStorage::new(PathBuf::from(
		config.storage_path,
	))))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
