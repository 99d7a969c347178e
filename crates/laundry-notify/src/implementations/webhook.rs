//! Notifier that POSTs each request as JSON to a webhook.
//!
//! The body is the request itself plus a rendered `summary` line, which is
//! what the push relay shows as the notification text.

use crate::{NotificationInterface, NotifyError, NotifyFactory, NotifyRegistry};
use async_trait::async_trait;
use laundry_types::{ImplementationRegistry, NotificationRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WebhookConfig {
	url: String,
	/// Sent as a bearer token when set.
	#[serde(default)]
	auth_token: Option<String>,
	#[serde(default = "default_timeout_seconds")]
	timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
	10
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
	#[serde(flatten)]
	request: &'a NotificationRequest,
	summary: String,
}

pub struct WebhookNotifier {
	client: reqwest::Client,
	url: String,
	auth_token: Option<String>,
}

impl WebhookNotifier {
	pub fn new(
		url: impl Into<String>,
		auth_token: Option<String>,
		timeout: Duration,
	) -> Result<Self, NotifyError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| NotifyError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			url: url.into(),
			auth_token,
		})
	}
}

#[async_trait]
impl NotificationInterface for WebhookNotifier {
	async fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
		let payload = WebhookPayload {
			request,
			summary: request.summary(),
		};

		let mut builder = self.client.post(&self.url).json(&payload);
		if let Some(token) = &self.auth_token {
			builder = builder.bearer_auth(token);
		}

		let response = builder
			.send()
			.await
			.map_err(|e| NotifyError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			return Err(NotifyError::Rejected(format!(
				"webhook answered {}",
				status.as_u16()
			)));
		}

		tracing::debug!(ticket = %request.ticket_code, "Webhook notification delivered");
		Ok(())
	}
}

/// Configuration parameters:
/// - `url`: webhook endpoint (required)
/// - `auth_token`: bearer token (optional)
/// - `timeout_seconds`: request timeout (default: 10)
pub fn create_notifier(
	config: &toml::Value,
) -> Result<Box<dyn NotificationInterface>, NotifyError> {
	let config: WebhookConfig = config
		.clone()
		.try_into()
		.map_err(|e: toml::de::Error| NotifyError::Configuration(e.to_string()))?;

	if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
		return Err(NotifyError::Configuration(format!(
			"webhook url must be http(s): {}",
			config.url
		)));
	}

	Ok(Box::new(WebhookNotifier::new(
		config.url,
		config.auth_token,
		Duration::from_secs(config.timeout_seconds),
	)?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "webhook";
	type Factory = NotifyFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotifyRegistry for Registry {}
