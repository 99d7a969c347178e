//! Event types for inter-component communication.
//!
//! Events flow through the engine's event bus so that independent consumers
//! (notification dispatch, HTTP clients, logging) can react to scope changes,
//! order activity and subscription refreshes without being wired to the
//! producer.

use crate::{Order, OrderStatus, SubscriptionCheckResult};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LaundryEvent {
	/// Events from the tenant scope resolver.
	Scope(ScopeEvent),
	/// Events from order handling.
	Order(OrderEvent),
	/// Events from the subscription gate.
	Subscription(SubscriptionEvent),
}

/// Tenant scope changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScopeEvent {
	/// A laundry became active and its branches were loaded.
	LaundryChanged {
		laundry_id: String,
		branch_count: usize,
	},
	/// The branch filter changed. `None` selects all branches.
	BranchChanged {
		laundry_id: String,
		branch_id: Option<String>,
	},
}

/// Order activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order was recorded.
	Created { order: Order },
	/// An order moved to another step of the flow.
	StatusChanged {
		order_id: String,
		ticket_code: String,
		customer_name: String,
		from: OrderStatus,
		to: OrderStatus,
	},
	/// A sale was parked until the subscription reminder is acknowledged.
	Deferred { laundry_id: String, branch_id: String },
}

/// Subscription gate activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SubscriptionEvent {
	/// A fresh snapshot was fetched from the billing backend.
	Refreshed {
		branch_id: String,
		result: SubscriptionCheckResult,
	},
	/// An operation was refused because the subscription is blocked.
	OperationBlocked { message: String },
}
