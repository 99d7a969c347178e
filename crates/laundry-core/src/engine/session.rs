//! Per-user session contexts.
//!
//! Every acting user gets a scope resolver and a subscription gate of their
//! own, so one user's laundry, branch filter or parked sale is never visible
//! to another. A [`SessionHandle`] holds the user's turn lock for as long as
//! it lives: requests of the same user run one after the other, requests of
//! different users run side by side.

use super::event_bus::EventBus;
use super::{EngineError, SubmitOutcome};
use crate::handlers::{OrderHandler, OrderHandlerError};
use crate::scope::TenantScopeResolver;
use crate::state::StatusFlowRegistry;
use crate::subscription::{GateOutcome, SubscriptionGate};
use arc_swap::ArcSwap;
use laundry_backend::BackendService;
use laundry_storage::StorageService;
use laundry_types::{
	truncate_id, LaundryEvent, NewOrder, Order, OrderEvent, OrderQuery, OrderStatus, OrderView,
	SubscriptionCheckResult,
};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Mutex, OwnedMutexGuard};

/// Scope and subscription state of one user.
pub(crate) struct SessionContext {
	pub(crate) scope: TenantScopeResolver,
	pub(crate) gate: SubscriptionGate,
	turn: Arc<Mutex<()>>,
}

impl SessionContext {
	pub(crate) fn new(
		backend: &BackendService,
		storage: Arc<StorageService>,
		event_bus: EventBus,
	) -> Self {
		Self {
			scope: TenantScopeResolver::new(backend.branches.clone(), storage, event_bus.clone()),
			gate: SubscriptionGate::new(backend.subscriptions.clone(), event_bus),
			turn: Arc::new(Mutex::new(())),
		}
	}

	/// Waits until no other request of this user is running.
	pub(crate) async fn take_turn(&self) -> OwnedMutexGuard<()> {
		self.turn.clone().lock_owned().await
	}

	/// Refreshes the snapshot for the branch whose subscription governs the
	/// current scope.
	pub(crate) async fn refresh_subscription(&self) -> Option<SubscriptionCheckResult> {
		match self.scope.billing_branch_id().await {
			Some(branch_id) => self.gate.refresh(&branch_id).await,
			None => {
				tracing::debug!("No branch in scope, subscription not refreshed");
				self.gate.snapshot()
			}
		}
	}
}

/// Exclusive access to one user's session for the duration of a request.
pub struct SessionHandle {
	pub(crate) context: Arc<SessionContext>,
	pub(crate) registry: Arc<ArcSwap<StatusFlowRegistry>>,
	pub(crate) order_handler: Arc<OrderHandler>,
	pub(crate) event_bus: EventBus,
	pub(crate) _turn: OwnedMutexGuard<()>,
}

impl SessionHandle {
	pub fn scope(&self) -> &TenantScopeResolver {
		&self.context.scope
	}

	pub fn gate(&self) -> &SubscriptionGate {
		&self.context.gate
	}

	/// Current flow snapshot.
	pub fn flow(&self) -> Arc<StatusFlowRegistry> {
		self.registry.load_full()
	}

	pub async fn refresh_subscription(&self) -> Option<SubscriptionCheckResult> {
		self.context.refresh_subscription().await
	}

	/// Switches the laundry and rechecks the subscription for the new scope.
	pub async fn switch_laundry(&self, laundry_id: &str) -> Result<(), EngineError> {
		self.context.scope.switch_laundry(laundry_id).await?;
		self.refresh_subscription().await;
		Ok(())
	}

	/// Sets the branch filter and rechecks the subscription for it.
	pub async fn set_branch(&self, branch_id: Option<String>) -> Result<(), EngineError> {
		self.context.scope.set_branch(branch_id).await?;
		self.refresh_subscription().await;
		Ok(())
	}

	/// Orders in the current scope, optionally filtered by status.
	pub async fn list_orders(
		&self,
		status: Option<OrderStatus>,
	) -> Result<Vec<OrderView>, EngineError> {
		let mut query = self.current_query().await?;
		query.status = status;
		Ok(self.order_handler.list(&query).await?)
	}

	/// Submits a sale through the subscription gate of the order's branch.
	pub async fn submit_order(&self, order: NewOrder) -> Result<SubmitOutcome, EngineError> {
		let query = self.current_query().await?;

		if order.laundry_id != query.laundry_id {
			return Err(EngineError::Forbidden(format!(
				"Laundry '{}' is outside the active scope",
				order.laundry_id
			)));
		}
		if query
			.branch_id
			.as_ref()
			.is_some_and(|branch| branch != &order.branch_id)
		{
			return Err(EngineError::Forbidden(format!(
				"Branch '{}' is outside the selected branch",
				order.branch_id
			)));
		}
		if !self
			.context
			.scope
			.branches()
			.await
			.iter()
			.any(|branch| branch.id == order.branch_id)
		{
			return Err(EngineError::InvalidRequest(format!(
				"Branch '{}' is not an active branch of the current laundry",
				order.branch_id
			)));
		}
		if self.registry.load().machine().is_empty() {
			return Err(OrderHandlerError::NoFlow.into());
		}

		self.context.gate.ensure_branch(&order.branch_id).await;

		let laundry_id = order.laundry_id.clone();
		let branch_id = order.branch_id.clone();
		let handler = self.order_handler.clone();
		let runtime = Handle::current();
		let (tx, rx) = oneshot::channel();

		let outcome = self.context.gate.validate_operation(move || {
			runtime.spawn(async move {
				let result = handler.create_order(order).await;
				if let Err(e) = &result {
					tracing::error!(error = %e, "Order creation failed");
				}
				// Nobody is waiting for a deferred sale
				tx.send(result).ok();
			});
		});

		match outcome {
			GateOutcome::Proceeded => {
				let created = rx
					.await
					.map_err(|_| EngineError::Handler("Order creation was interrupted".into()))??;
				Ok(SubmitOutcome::Created(created))
			}
			GateOutcome::Blocked(message) => Err(EngineError::Blocked(message)),
			GateOutcome::AwaitingAcknowledgement(reminder) => {
				tracing::info!(
					branch_id = %truncate_id(&branch_id),
					days_until_suspension = reminder.days_until_suspension,
					"Sale deferred until the subscription reminder is acknowledged"
				);
				self.event_bus
					.publish(LaundryEvent::Order(OrderEvent::Deferred {
						laundry_id,
						branch_id,
					}))
					.ok();
				Ok(SubmitOutcome::AwaitingAcknowledgement(reminder))
			}
		}
	}

	pub async fn advance_order(&self, order_id: &str) -> Result<Order, EngineError> {
		let query = self.current_query().await?;
		Ok(self.order_handler.advance(order_id, &query).await?)
	}

	pub async fn regress_order(&self, order_id: &str) -> Result<Order, EngineError> {
		let query = self.current_query().await?;
		Ok(self.order_handler.regress(order_id, &query).await?)
	}

	/// Runs the sale this user parked behind the subscription reminder.
	pub fn acknowledge_pending(&self) -> bool {
		self.context.gate.acknowledge()
	}

	/// Drops the sale this user parked behind the subscription reminder.
	pub fn dismiss_pending(&self) -> bool {
		self.context.gate.dismiss()
	}

	async fn current_query(&self) -> Result<OrderQuery, EngineError> {
		self.context
			.scope
			.order_query()
			.await
			.ok_or_else(|| EngineError::NotReady("No laundry is active".into()))
	}
}
