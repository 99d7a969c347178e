//! Order handler for creating orders and moving them through the flow.
//!
//! Status changes are computed by the flow's state machine and persisted
//! through the order store. Every successful change is published on the
//! event bus so notification dispatch can react to it.

use crate::engine::event_bus::EventBus;
use crate::state::{StatusFlowRegistry, TransitionError};
use arc_swap::ArcSwap;
use chrono::Utc;
use laundry_backend::OrderStore;
use laundry_types::{
	truncate_id, LaundryEvent, NewOrder, Order, OrderEvent, OrderQuery, OrderStatus, OrderView,
	StatusUpdate,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur while handling orders.
#[derive(Debug, Error)]
pub enum OrderHandlerError {
	#[error("No active operation steps are configured")]
	NoFlow,
	#[error("Transition error: {0}")]
	Transition(#[from] TransitionError),
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error("Backend error: {0}")]
	Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
	Forward,
	Backward,
}

pub struct OrderHandler {
	orders: Arc<dyn OrderStore>,
	registry: Arc<ArcSwap<StatusFlowRegistry>>,
	event_bus: EventBus,
}

impl OrderHandler {
	pub fn new(
		orders: Arc<dyn OrderStore>,
		registry: Arc<ArcSwap<StatusFlowRegistry>>,
		event_bus: EventBus,
	) -> Self {
		Self {
			orders,
			registry,
			event_bus,
		}
	}

	/// Records a new order in the first active step of the flow.
	#[instrument(skip_all, fields(branch_id = %truncate_id(&order.branch_id)))]
	pub async fn create_order(&self, order: NewOrder) -> Result<Order, OrderHandlerError> {
		let initial = self
			.registry
			.load()
			.machine()
			.initial()
			.cloned()
			.ok_or(OrderHandlerError::NoFlow)?;

		let created = self
			.orders
			.create_order(order, initial)
			.await
			.map_err(|e| OrderHandlerError::Backend(e.to_string()))?;

		tracing::info!(
			order_id = %truncate_id(&created.id),
			ticket = %created.ticket_code,
			status = %created.status,
			"Order created"
		);

		self.event_bus
			.publish(LaundryEvent::Order(OrderEvent::Created {
				order: created.clone(),
			}))
			.ok();

		Ok(created)
	}

	/// Moves the order one step forward.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn advance(
		&self,
		order_id: &str,
		scope: &OrderQuery,
	) -> Result<Order, OrderHandlerError> {
		self.transition(order_id, scope, Direction::Forward).await
	}

	/// Moves the order one step back.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn regress(
		&self,
		order_id: &str,
		scope: &OrderQuery,
	) -> Result<Order, OrderHandlerError> {
		self.transition(order_id, scope, Direction::Backward).await
	}

	/// Orders in scope, newest first, with their position in the current flow.
	pub async fn list(&self, query: &OrderQuery) -> Result<Vec<OrderView>, OrderHandlerError> {
		let orders = self
			.orders
			.list_orders(query)
			.await
			.map_err(|e| OrderHandlerError::Backend(e.to_string()))?;

		let registry = self.registry.load();
		Ok(orders
			.into_iter()
			.map(|order| order_view(&registry, order))
			.collect())
	}

	async fn transition(
		&self,
		order_id: &str,
		scope: &OrderQuery,
		direction: Direction,
	) -> Result<Order, OrderHandlerError> {
		let order = self
			.orders
			.get_order(order_id)
			.await
			.map_err(|e| OrderHandlerError::Backend(e.to_string()))?
			.filter(|order| scope.matches(order))
			.ok_or_else(|| OrderHandlerError::NotFound(order_id.to_string()))?;

		let (target, delivered): (OrderStatus, bool) = {
			let registry = self.registry.load();
			let machine = registry.machine();
			let target = match direction {
				Direction::Forward => machine.advance_target(order.status.as_str())?,
				Direction::Backward => machine.regress_target(order.status.as_str())?,
			};
			(target.clone(), machine.is_terminal(target.as_str()))
		};

		// Only the last step of the flow counts as delivered
		let update = StatusUpdate {
			status: target.clone(),
			delivered_at: delivered.then(Utc::now),
		};

		let updated = self
			.orders
			.update_status(&order.id, update)
			.await
			.map_err(|e| OrderHandlerError::Backend(e.to_string()))?;

		tracing::info!(from = %order.status, to = %target, "Order status changed");

		self.event_bus
			.publish(LaundryEvent::Order(OrderEvent::StatusChanged {
				order_id: updated.id.clone(),
				ticket_code: updated.ticket_code.clone(),
				customer_name: updated.customer.name.clone(),
				from: order.status,
				to: target,
			}))
			.ok();

		Ok(updated)
	}
}

/// Builds the display view of an order against the given flow.
pub fn order_view(registry: &StatusFlowRegistry, order: Order) -> OrderView {
	let machine = registry.machine();
	let status = order.status.as_str();
	OrderView {
		status_label: registry.label(status),
		is_paid: order.is_paid(),
		progress: machine.progress(status),
		can_advance: machine.can_advance(status),
		can_regress: machine.can_regress(status),
		next_status: machine.next(status).cloned(),
		previous_status: machine.previous(status).cloned(),
		order,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use laundry_backend::{BackendError, MockOrderStore};
	use laundry_types::{Customer, OperationStep, StepState};
	use rust_decimal::Decimal;

	fn registry() -> Arc<ArcSwap<StatusFlowRegistry>> {
		let steps = ["received", "washing", "ready"]
			.iter()
			.enumerate()
			.map(|(i, key)| OperationStep {
				key: key.to_string(),
				name: key.to_uppercase(),
				color: "blue-500".into(),
				icon: String::new(),
				is_active: true,
				order: i as i32,
			})
			.collect();
		Arc::new(ArcSwap::from_pointee(StatusFlowRegistry::new(steps)))
	}

	fn order(id: &str, branch: &str, status: &str) -> Order {
		Order {
			id: id.into(),
			ticket_code: "C-0001".into(),
			laundry_id: "l-1".into(),
			branch_id: branch.into(),
			customer: Customer {
				name: "Ana".into(),
				phone: "555".into(),
				address: None,
			},
			items: vec![],
			status: OrderStatus::from(status),
			total_amount: Decimal::new(10, 0),
			paid_amount: Decimal::ZERO,
			is_delivery: false,
			delivery_slot: None,
			driver_id: None,
			created_at: Utc::now(),
			updated_at: Utc::now(),
			estimated_ready_at: None,
			delivered_at: None,
			notes: None,
		}
	}

	fn scope(branch: Option<&str>) -> OrderQuery {
		OrderQuery {
			laundry_id: "l-1".into(),
			branch_id: branch.map(String::from),
			status: None,
		}
	}

	fn store_with(existing: Order) -> MockOrderStore {
		let mut store = MockOrderStore::new();
		let found = existing.clone();
		store
			.expect_get_order()
			.returning(move |_| Ok(Some(found.clone())));
		store.expect_update_status().returning(move |_, update| {
			let mut updated = existing.clone();
			updated.status = update.status;
			updated.delivered_at = update.delivered_at;
			Ok(updated)
		});
		store
	}

	#[tokio::test]
	async fn test_advance_publishes_change() {
		let bus = EventBus::new(16);
		let mut events = bus.subscribe();
		let handler = OrderHandler::new(
			Arc::new(store_with(order("o-1", "b-1", "received"))),
			registry(),
			bus,
		);

		let updated = handler.advance("o-1", &scope(None)).await.unwrap();
		assert_eq!(updated.status.as_str(), "washing");

		match events.recv().await.unwrap() {
			LaundryEvent::Order(OrderEvent::StatusChanged { from, to, .. }) => {
				assert_eq!(from.as_str(), "received");
				assert_eq!(to.as_str(), "washing");
			}
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_reaching_last_step_marks_delivery() {
		let handler = OrderHandler::new(
			Arc::new(store_with(order("o-1", "b-1", "washing"))),
			registry(),
			EventBus::new(16),
		);
		let delivered = handler.advance("o-1", &scope(None)).await.unwrap();
		assert_eq!(delivered.status.as_str(), "ready");
		assert!(delivered.delivered_at.is_some());

		let mut finished = order("o-1", "b-1", "ready");
		finished.delivered_at = Some(Utc::now());
		let handler = OrderHandler::new(Arc::new(store_with(finished)), registry(), EventBus::new(16));
		let reopened = handler.regress("o-1", &scope(None)).await.unwrap();
		assert_eq!(reopened.status.as_str(), "washing");
		assert_eq!(reopened.delivered_at, None);
	}

	#[tokio::test]
	async fn test_regress_from_first_step_fails() {
		let handler = OrderHandler::new(
			Arc::new(store_with(order("o-1", "b-1", "received"))),
			registry(),
			EventBus::new(16),
		);
		let err = handler.regress("o-1", &scope(None)).await.unwrap_err();
		assert!(matches!(
			err,
			OrderHandlerError::Transition(TransitionError::AlreadyInitial(_))
		));
	}

	#[tokio::test]
	async fn test_advance_retired_status_fails() {
		let handler = OrderHandler::new(
			Arc::new(store_with(order("o-1", "b-1", "ironing"))),
			registry(),
			EventBus::new(16),
		);
		let err = handler.advance("o-1", &scope(None)).await.unwrap_err();
		assert!(matches!(
			err,
			OrderHandlerError::Transition(TransitionError::UnknownStatus(_))
		));
	}

	#[tokio::test]
	async fn test_out_of_scope_order_is_not_found() {
		let mut store = MockOrderStore::new();
		store
			.expect_get_order()
			.returning(|_| Ok(Some(order("o-1", "b-2", "received"))));
		store.expect_update_status().never();
		let handler = OrderHandler::new(Arc::new(store), registry(), EventBus::new(16));

		let err = handler.advance("o-1", &scope(Some("b-1"))).await.unwrap_err();
		assert!(matches!(err, OrderHandlerError::NotFound(_)));
	}

	#[tokio::test]
	async fn test_create_uses_initial_status() {
		let mut store = MockOrderStore::new();
		store.expect_create_order().returning(|new, status| {
			let mut created = order("o-9", &new.branch_id, status.as_str());
			created.customer = new.customer;
			Ok(created)
		});
		let handler = OrderHandler::new(Arc::new(store), registry(), EventBus::new(16));

		let created = handler
			.create_order(NewOrder {
				laundry_id: "l-1".into(),
				branch_id: "b-1".into(),
				customer: Customer {
					name: "Luis".into(),
					phone: "555".into(),
					address: None,
				},
				items: vec![],
				total_amount: None,
				paid_amount: Decimal::ZERO,
				is_delivery: false,
				delivery_slot: None,
				estimated_ready_at: None,
				notes: None,
			})
			.await
			.unwrap();
		assert_eq!(created.status.as_str(), "received");
	}

	#[tokio::test]
	async fn test_create_without_flow_fails() {
		let handler = OrderHandler::new(
			Arc::new(MockOrderStore::new()),
			Arc::new(ArcSwap::from_pointee(StatusFlowRegistry::empty())),
			EventBus::new(16),
		);
		let new = NewOrder {
			laundry_id: "l-1".into(),
			branch_id: "b-1".into(),
			customer: Customer {
				name: "Luis".into(),
				phone: "555".into(),
				address: None,
			},
			items: vec![],
			total_amount: None,
			paid_amount: Decimal::ZERO,
			is_delivery: false,
			delivery_slot: None,
			estimated_ready_at: None,
			notes: None,
		};
		assert!(matches!(
			handler.create_order(new).await,
			Err(OrderHandlerError::NoFlow)
		));
	}

	#[tokio::test]
	async fn test_list_builds_views() {
		let mut store = MockOrderStore::new();
		store.expect_list_orders().returning(|_| {
			Ok(vec![
				order("o-1", "b-1", "washing"),
				order("o-2", "b-1", "legacy"),
			])
		});
		store
			.expect_get_order()
			.returning(|_| Err(BackendError::Connection("unused".into())));
		let handler = OrderHandler::new(Arc::new(store), registry(), EventBus::new(16));

		let views = handler.list(&scope(None)).await.unwrap();
		assert_eq!(views[0].status_label, "WASHING");
		assert!(views[0].can_advance && views[0].can_regress);
		assert_eq!(views[0].progress[0].state, StepState::Completed);
		assert_eq!(views[0].next_status.as_ref().map(|s| s.as_str()), Some("ready"));

		assert_eq!(views[1].status_label, "legacy");
		assert!(!views[1].can_advance && !views[1].can_regress);
		assert!(views[1].progress.iter().all(|p| p.state == StepState::Pending));
	}
}
