//! Notification handler for order events.
//!
//! Turns order events into notification requests, resolving the status label
//! from the flow snapshot current at dispatch time.

use crate::state::StatusFlowRegistry;
use arc_swap::ArcSwap;
use laundry_notify::NotificationService;
use laundry_types::{truncate_id, NotificationRequest, Order, OrderStatus};
use std::sync::Arc;
use tracing::instrument;

pub struct NotificationHandler {
	notifications: Arc<NotificationService>,
	registry: Arc<ArcSwap<StatusFlowRegistry>>,
}

impl NotificationHandler {
	pub fn new(
		notifications: Arc<NotificationService>,
		registry: Arc<ArcSwap<StatusFlowRegistry>>,
	) -> Self {
		Self {
			notifications,
			registry,
		}
	}

	#[instrument(skip_all, fields(order_id = %truncate_id(&order.id)))]
	pub async fn handle_created(&self, order: &Order) -> usize {
		let label = self.registry.load().label(order.status.as_str());
		let request = NotificationRequest::new_order(order).with_label(label);
		self.dispatch(request).await
	}

	#[instrument(skip_all, fields(ticket = %ticket_code))]
	pub async fn handle_status_changed(
		&self,
		ticket_code: &str,
		customer_name: &str,
		status: &OrderStatus,
	) -> usize {
		let label = self.registry.load().label(status.as_str());
		let request = NotificationRequest::status_changed(ticket_code, customer_name, status.clone())
			.with_label(label);
		self.dispatch(request).await
	}

	async fn dispatch(&self, request: NotificationRequest) -> usize {
		if self.notifications.is_empty() {
			tracing::debug!("No notification channels configured");
			return 0;
		}
		let delivered = self.notifications.notify(&request).await;
		tracing::debug!(delivered, kind = %request.kind, "Notification dispatched");
		delivered
	}
}
