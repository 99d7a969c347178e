//! Notification delivery for order events.
//!
//! Staff devices are told about new orders and status changes. The actual
//! push transport is external; implementations here either log the request or
//! hand it to a webhook. Delivery is best effort: failures are logged and
//! never fail the order operation that triggered them.

use async_trait::async_trait;
use futures::future::join_all;
use laundry_types::{ImplementationRegistry, NotificationRequest};
use std::collections::HashMap;
use thiserror::Error;

pub mod implementations {
	pub mod log;
	pub mod webhook;
}

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
	/// Error that occurs when the transport cannot be reached.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when the transport refuses the request.
	#[error("Delivery rejected: {0}")]
	Rejected(String),
	/// Error that occurs when the implementation configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait implemented by every notification channel.
#[async_trait]
pub trait NotificationInterface: Send + Sync {
	async fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError>;
}

/// Type alias for notifier factory functions.
pub type NotifyFactory = fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotifyError>;

/// Registry trait for notification implementations.
pub trait NotifyRegistry: ImplementationRegistry<Factory = NotifyFactory> {}

/// Get all registered notification implementations.
pub fn get_all_implementations() -> Vec<(&'static str, NotifyFactory)> {
	use implementations::{log, webhook};

	vec![
		(log::Registry::NAME, log::Registry::factory()),
		(webhook::Registry::NAME, webhook::Registry::factory()),
	]
}

/// Fans a notification out to every configured channel.
pub struct NotificationService {
	channels: HashMap<String, Box<dyn NotificationInterface>>,
}

impl NotificationService {
	pub fn new(channels: HashMap<String, Box<dyn NotificationInterface>>) -> Self {
		Self { channels }
	}

	pub fn is_empty(&self) -> bool {
		self.channels.is_empty()
	}

	/// Sends the request on every channel concurrently and returns how many
	/// accepted it. Failing channels are logged and skipped.
	pub async fn notify(&self, request: &NotificationRequest) -> usize {
		let deliveries = self.channels.iter().map(|(name, channel)| async move {
			match channel.send(request).await {
				Ok(()) => true,
				Err(e) => {
					tracing::warn!(
						channel = %name,
						ticket = %request.ticket_code,
						error = %e,
						"Notification delivery failed"
					);
					false
				}
			}
		});

		join_all(deliveries)
			.await
			.into_iter()
			.filter(|delivered| *delivered)
			.count()
	}
}
