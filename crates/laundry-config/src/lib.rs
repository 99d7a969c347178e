//! Configuration module for the laundry operations service.
//!
//! Configuration is read from TOML. Environment variables are substituted
//! before parsing (`${VAR}` or `${VAR:-default}`), and the result is validated
//! so the engine never starts with a dangling primary implementation.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["backend.toml", "api.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

use laundry_types::UserSession;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
pub use builders::config::ConfigBuilder;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only, the full input dump is not useful in logs
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Session handed over by the authentication layer.
	pub session: UserSession,
	/// Local preference storage.
	pub storage: StorageConfig,
	/// Hosted platform (configuration, orders, branches, billing).
	pub backend: BackendConfig,
	/// Notification channels.
	#[serde(default)]
	pub notifications: NotificationsConfig,
	/// Status flow refresh settings.
	#[serde(default)]
	pub flow: FlowConfig,
	/// Subscription check settings.
	#[serde(default)]
	pub subscription: SubscriptionConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this instance, used in logs.
	pub id: String,
}

/// Configuration for the local preference storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the hosted platform backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of backend implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for notification delivery.
///
/// Every configured implementation receives every notification.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotificationsConfig {
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlowConfig {
	/// How often the operation steps are reloaded.
	#[serde(default = "default_flow_refresh_seconds")]
	pub refresh_interval_seconds: u64,
}

impl Default for FlowConfig {
	fn default() -> Self {
		Self {
			refresh_interval_seconds: default_flow_refresh_seconds(),
		}
	}
}

fn default_flow_refresh_seconds() -> u64 {
	300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionConfig {
	/// How often the subscription snapshot is refreshed.
	#[serde(default = "default_subscription_refresh_seconds")]
	pub refresh_interval_seconds: u64,
}

impl Default for SubscriptionConfig {
	fn default() -> Self {
		Self {
			refresh_interval_seconds: default_subscription_refresh_seconds(),
		}
	}
}

fn default_subscription_refresh_seconds() -> u64 {
	900
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// CORS configuration.
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS.
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

/// Longest refresh interval accepted for periodic tasks.
const MAX_REFRESH_SECONDS: u64 = 86_400;

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration.
	///
	/// Checks that identifiers are present, that every primary implementation
	/// is configured, and that refresh intervals are within (0, 24h].
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}
		if self.session.user_id.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Session user_id cannot be empty".into(),
			));
		}
		if !self.session.role.can_switch_scope() && self.session.branch_id.is_none() {
			return Err(ConfigError::Validation(format!(
				"Role '{}' is bound to a branch: session branch_id is required",
				self.session.role
			)));
		}

		validate_primary("storage", &self.storage.primary, &self.storage.implementations)?;
		validate_primary("backend", &self.backend.primary, &self.backend.implementations)?;

		validate_interval("flow.refresh_interval_seconds", self.flow.refresh_interval_seconds)?;
		validate_interval(
			"subscription.refresh_interval_seconds",
			self.subscription.refresh_interval_seconds,
		)?;

		if let Some(ref api) = self.api {
			if api.enabled && api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"api.timeout_seconds must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

fn validate_interval(name: &str, seconds: u64) -> Result<(), ConfigError> {
	if seconds == 0 {
		return Err(ConfigError::Validation(format!(
			"{} must be greater than 0",
			name
		)));
	}
	if seconds > MAX_REFRESH_SECONDS {
		return Err(ConfigError::Validation(format!(
			"{} cannot exceed {} (24 hours)",
			name, MAX_REFRESH_SECONDS
		)));
	}
	Ok(())
}

/// Parses a TOML string, resolving environment variables and validating the
/// result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
