//! Configuration builder for test and development setups.

use crate::{
	ApiConfig, BackendConfig, Config, FlowConfig, NotificationsConfig, ServiceConfig,
	StorageConfig, SubscriptionConfig,
};
use laundry_types::{UserRole, UserSession};
use std::collections::HashMap;

/// Builds a [`Config`] backed by in-memory storage and an in-memory backend.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	session: UserSession,
	backend_seed: toml::Value,
	notifications: HashMap<String, toml::Value>,
	flow_refresh_seconds: u64,
	subscription_refresh_seconds: u64,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Owner session, empty memory backend, no notification channels.
	pub fn new() -> Self {
		Self {
			service_id: "laundry-test".to_string(),
			session: UserSession {
				user_id: "u-owner".to_string(),
				role: UserRole::Owner,
				laundry_id: None,
				branch_id: None,
			},
			backend_seed: toml::Value::Table(toml::map::Map::new()),
			notifications: HashMap::new(),
			flow_refresh_seconds: 60,
			subscription_refresh_seconds: 60,
			api: None,
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	pub fn session(mut self, session: UserSession) -> Self {
		self.session = session;
		self
	}

	/// Seed table for the memory backend (`steps`, `laundries`, `branches`, ...).
	pub fn backend_seed(mut self, seed: toml::Value) -> Self {
		self.backend_seed = seed;
		self
	}

	pub fn notification(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		self.notifications.insert(name.into(), config);
		self
	}

	pub fn flow_refresh_seconds(mut self, seconds: u64) -> Self {
		self.flow_refresh_seconds = seconds;
		self
	}

	pub fn subscription_refresh_seconds(mut self, seconds: u64) -> Self {
		self.subscription_refresh_seconds = seconds;
		self
	}

	pub fn api(mut self, api: ApiConfig) -> Self {
		self.api = Some(api);
		self
	}

	pub fn build(self) -> Config {
		let empty = || toml::Value::Table(toml::map::Map::new());
		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			session: self.session,
			storage: StorageConfig {
				primary: "memory".to_string(),
				implementations: HashMap::from([("memory".to_string(), empty())]),
			},
			backend: BackendConfig {
				primary: "memory".to_string(),
				implementations: HashMap::from([("memory".to_string(), self.backend_seed)]),
			},
			notifications: NotificationsConfig {
				implementations: self.notifications,
			},
			flow: FlowConfig {
				refresh_interval_seconds: self.flow_refresh_seconds,
			},
			subscription: SubscriptionConfig {
				refresh_interval_seconds: self.subscription_refresh_seconds,
			},
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builder_defaults_are_valid() {
		let config = ConfigBuilder::new().service_id("builder").build();
		assert_eq!(config.service.id, "builder");
		assert!(config.validate().is_ok());
	}
}
