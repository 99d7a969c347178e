//! Notifier that writes each request to the tracing log.

use crate::{NotificationInterface, NotifyError, NotifyFactory, NotifyRegistry};
use async_trait::async_trait;
use laundry_types::{ImplementationRegistry, NotificationRequest};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogNotifierConfig {
	/// Logged alongside every request, e.g. the device group the push would target.
	#[serde(default)]
	audience: Option<String>,
}

pub struct LogNotifier {
	audience: String,
}

impl LogNotifier {
	pub fn new(audience: Option<String>) -> Self {
		Self {
			audience: audience.unwrap_or_else(|| "staff".to_string()),
		}
	}
}

#[async_trait]
impl NotificationInterface for LogNotifier {
	async fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
		tracing::info!(
			audience = %self.audience,
			kind = %request.kind,
			ticket = %request.ticket_code,
			"{}",
			request.summary()
		);
		Ok(())
	}
}

pub fn create_notifier(
	config: &toml::Value,
) -> Result<Box<dyn NotificationInterface>, NotifyError> {
	let config: LogNotifierConfig = config
		.clone()
		.try_into()
		.map_err(|e: toml::de::Error| NotifyError::Configuration(e.to_string()))?;
	Ok(Box::new(LogNotifier::new(config.audience)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = NotifyFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotifyRegistry for Registry {}
