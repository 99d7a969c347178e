//! Builder for constructing laundry engines.
//!
//! Composes a LaundryEngine from the storage, backend and notification
//! implementations named in the configuration, using factory functions
//! looked up by implementation name.

use crate::engine::{event_bus::EventBus, LaundryEngine};
use laundry_backend::{BackendError, BackendService};
use laundry_config::Config;
use laundry_notify::{NotificationInterface, NotificationService, NotifyError};
use laundry_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Capacity of the engine's event bus.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by implementation
/// name.
pub struct LaundryFactories<SF, BF, NF> {
	pub storage_factories: HashMap<String, SF>,
	pub backend_factories: HashMap<String, BF>,
	pub notification_factories: HashMap<String, NF>,
}

/// Builder for constructing a LaundryEngine with pluggable implementations.
pub struct LaundryBuilder {
	config: Config,
}

impl LaundryBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine. Every configured implementation must have a factory
	/// that accepts its configuration.
	pub fn build<SF, BF, NF>(
		self,
		factories: LaundryFactories<SF, BF, NF>,
	) -> Result<LaundryEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		BF: Fn(&toml::Value) -> Result<BackendService, BackendError>,
		NF: Fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotifyError>,
	{
		// Storage
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let factory = factories.storage_factories.get(name).ok_or_else(|| {
				BuilderError::MissingComponent(format!("storage implementation '{}'", name))
			})?;
			match factory(config) {
				Ok(implementation) => {
					storage_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				}
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				}
			}
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;
		let storage = Arc::new(StorageService::new(storage_backend));

		// Backend
		let mut backend_impls = HashMap::new();
		for (name, config) in &self.config.backend.implementations {
			let factory = factories.backend_factories.get(name).ok_or_else(|| {
				BuilderError::MissingComponent(format!("backend implementation '{}'", name))
			})?;
			match factory(config) {
				Ok(implementation) => {
					backend_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.backend.primary == name;
					tracing::info!(component = "backend", implementation = %name, enabled = %is_primary, "Loaded");
				}
				Err(e) => {
					tracing::error!(
						component = "backend",
						implementation = %name,
						error = %e,
						"Failed to create backend implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create backend implementation '{}': {}",
						name, e
					)));
				}
			}
		}

		let primary_backend = &self.config.backend.primary;
		let backend = backend_impls.remove(primary_backend).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary backend '{}' failed to load or has invalid configuration",
				primary_backend
			))
		})?;

		// Notifications are optional; every configured channel is used
		let mut channels = HashMap::new();
		for (name, config) in &self.config.notifications.implementations {
			let factory = factories.notification_factories.get(name).ok_or_else(|| {
				BuilderError::MissingComponent(format!("notification implementation '{}'", name))
			})?;
			match factory(config) {
				Ok(implementation) => {
					channels.insert(name.clone(), implementation);
					tracing::info!(component = "notifications", implementation = %name, "Loaded");
				}
				Err(e) => {
					tracing::error!(
						component = "notifications",
						implementation = %name,
						error = %e,
						"Failed to create notification implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create notification implementation '{}': {}",
						name, e
					)));
				}
			}
		}
		if channels.is_empty() {
			tracing::info!(component = "notifications", "No notification channels configured");
		}
		let notifications = Arc::new(NotificationService::new(channels));

		Ok(LaundryEngine::new(
			self.config,
			storage,
			backend,
			notifications,
			EventBus::new(EVENT_BUS_CAPACITY),
		))
	}
}
