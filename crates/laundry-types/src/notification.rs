//! Notification requests handed to the external delivery mechanism.

use crate::{Order, OrderStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
	NewOrder,
	StatusChanged,
}

impl fmt::Display for NotificationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			NotificationKind::NewOrder => write!(f, "new_order"),
			NotificationKind::StatusChanged => write!(f, "status_changed"),
		}
	}
}

/// Payload for a "new order" or "status changed" notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
	pub kind: NotificationKind,
	pub ticket_code: String,
	pub customer_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<OrderStatus>,
	/// Display label of `status`, falls back to the raw key.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status_label: Option<String>,
}

impl NotificationRequest {
	pub fn new_order(order: &Order) -> Self {
		Self {
			kind: NotificationKind::NewOrder,
			ticket_code: order.ticket_code.clone(),
			customer_name: order.customer.name.clone(),
			status: Some(order.status.clone()),
			status_label: None,
		}
	}

	pub fn status_changed(
		ticket_code: impl Into<String>,
		customer_name: impl Into<String>,
		status: OrderStatus,
	) -> Self {
		Self {
			kind: NotificationKind::StatusChanged,
			ticket_code: ticket_code.into(),
			customer_name: customer_name.into(),
			status: Some(status),
			status_label: None,
		}
	}

	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.status_label = Some(label.into());
		self
	}

	/// Single line summary used as the notification body.
	pub fn summary(&self) -> String {
		let status = self
			.status_label
			.clone()
			.or_else(|| self.status.as_ref().map(|s| s.to_string()))
			.unwrap_or_default();
		match self.kind {
			NotificationKind::NewOrder => {
				format!("New order {} for {}", self.ticket_code, self.customer_name)
			}
			NotificationKind::StatusChanged => format!(
				"Order {} ({}) is now {}",
				self.ticket_code, self.customer_name, status
			),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_summary_prefers_label() {
		let request =
			NotificationRequest::status_changed("A-0007", "Ana", OrderStatus::from("ready"))
				.with_label("Ready for pickup");
		assert_eq!(request.summary(), "Order A-0007 (Ana) is now Ready for pickup");

		let raw = NotificationRequest::status_changed("A-0007", "Ana", OrderStatus::from("ready"));
		assert_eq!(raw.summary(), "Order A-0007 (Ana) is now ready");
	}
}
