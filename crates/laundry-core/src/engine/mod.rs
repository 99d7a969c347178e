//! Core laundry engine that ties the flow, scope and subscription state
//! together.
//!
//! The engine owns the shared flow registry and one session context per
//! acting user (see [`session`]). Operations coming from the API run through
//! a [`SessionHandle`], and the run loop keeps the flow and every session's
//! subscription snapshot fresh and dispatches order events to the
//! notification handler.

pub mod event_bus;
pub mod lifecycle;
pub mod session;

use crate::handlers::{NotificationHandler, OrderHandler, OrderHandlerError};
use crate::scope::ScopeError;
use crate::state::StatusFlowRegistry;
use arc_swap::ArcSwap;
use laundry_backend::BackendService;
use laundry_config::Config;
use laundry_notify::NotificationService;
use laundry_storage::StorageService;
use laundry_types::{LaundryEvent, Order, OrderEvent, SubscriptionReminder, UserSession};
use session::SessionContext;
pub use session::SessionHandle;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Semaphore;

/// Maximum number of event handler tasks running at once.
const MAX_CONCURRENT_HANDLERS: usize = 32;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
	#[error("Not ready: {0}")]
	NotReady(String),
	#[error("Forbidden: {0}")]
	Forbidden(String),
	#[error("Operation blocked: {0}")]
	Blocked(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	#[error("Transition error: {0}")]
	Transition(String),
	#[error("Handler error: {0}")]
	Handler(String),
}

impl From<ScopeError> for EngineError {
	fn from(err: ScopeError) -> Self {
		match err {
			ScopeError::NotPermitted(_) => EngineError::Forbidden(err.to_string()),
			ScopeError::NoLaundry => EngineError::NotReady(err.to_string()),
			ScopeError::UnknownBranch(_) | ScopeError::UnknownLaundry(_) => {
				EngineError::InvalidRequest(err.to_string())
			}
		}
	}
}

impl From<OrderHandlerError> for EngineError {
	fn from(err: OrderHandlerError) -> Self {
		match err {
			OrderHandlerError::NoFlow => EngineError::NotReady(err.to_string()),
			OrderHandlerError::Transition(e) => EngineError::Transition(e.to_string()),
			OrderHandlerError::NotFound(id) => EngineError::NotFound(id),
			OrderHandlerError::Backend(e) => EngineError::Service(e),
		}
	}
}

/// Result of submitting a sale through the subscription gate.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
	Created(Order),
	/// The sale runs once the reminder is acknowledged.
	AwaitingAcknowledgement(SubscriptionReminder),
}

/// Main engine shared by every session.
#[derive(Clone)]
pub struct LaundryEngine {
	/// Service configuration.
	pub(crate) config: Config,
	/// Local preference storage.
	pub(crate) storage: Arc<StorageService>,
	/// Remote configuration, directory, order and billing services.
	pub(crate) backend: BackendService,
	/// Event bus for inter-component communication.
	pub(crate) event_bus: event_bus::EventBus,
	/// Current flow snapshot, swapped on every successful reload.
	pub(crate) registry: Arc<ArcSwap<StatusFlowRegistry>>,
	/// Session contexts keyed by user id.
	pub(crate) sessions: Arc<Mutex<HashMap<String, Arc<SessionContext>>>>,
	pub(crate) order_handler: Arc<OrderHandler>,
	pub(crate) notification_handler: Arc<NotificationHandler>,
}

impl LaundryEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		backend: BackendService,
		notifications: Arc<NotificationService>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let registry = Arc::new(ArcSwap::from_pointee(StatusFlowRegistry::empty()));

		let order_handler = Arc::new(OrderHandler::new(
			backend.orders.clone(),
			registry.clone(),
			event_bus.clone(),
		));

		let notification_handler =
			Arc::new(NotificationHandler::new(notifications, registry.clone()));

		Self {
			config,
			storage,
			backend,
			event_bus,
			registry,
			sessions: Arc::new(Mutex::new(HashMap::new())),
			order_handler,
			notification_handler,
		}
	}

	/// Main loop: periodic flow and subscription refreshes plus event
	/// dispatch, until ctrl-c.
	pub async fn run(&self) -> Result<(), EngineError> {
		let mut event_receiver = self.event_bus.subscribe();

		let mut flow_interval = tokio::time::interval(Duration::from_secs(
			self.config.flow.refresh_interval_seconds,
		));
		let mut subscription_interval = tokio::time::interval(Duration::from_secs(
			self.config.subscription.refresh_interval_seconds,
		));
		// The first tick completes immediately; initialize() already loaded both
		flow_interval.tick().await;
		subscription_interval.tick().await;

		let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_HANDLERS));

		loop {
			tokio::select! {
				_ = flow_interval.tick() => {
					self.spawn_handler(&semaphore, |engine| async move {
						engine.reload_flow().await.map(|_| ())
					})
					.await;
				}

				_ = subscription_interval.tick() => {
					self.spawn_handler(&semaphore, |engine| async move {
						engine.refresh_subscriptions().await;
						Ok(())
					})
					.await;
				}

				event = event_receiver.recv() => {
					match event {
						Ok(event) => self.dispatch_event(event, &semaphore).await,
						Err(RecvError::Lagged(skipped)) => {
							tracing::warn!(skipped, "Event receiver lagged, events dropped");
						}
						Err(RecvError::Closed) => break,
					}
				}

				_ = tokio::signal::ctrl_c() => {
					break;
				}
			}
		}

		self.shutdown().await
	}

	async fn dispatch_event(&self, event: LaundryEvent, semaphore: &Arc<Semaphore>) {
		match event {
			LaundryEvent::Order(OrderEvent::Created { order }) => {
				self.spawn_handler(semaphore, move |engine| async move {
					engine.notification_handler.handle_created(&order).await;
					Ok(())
				})
				.await;
			}

			LaundryEvent::Order(OrderEvent::StatusChanged {
				ticket_code,
				customer_name,
				to,
				..
			}) => {
				self.spawn_handler(semaphore, move |engine| async move {
					engine
						.notification_handler
						.handle_status_changed(&ticket_code, &customer_name, &to)
						.await;
					Ok(())
				})
				.await;
			}

			_ => {}
		}
	}

	/// Reloads operation steps and swaps in a new registry. On failure the
	/// previous registry stays in place.
	pub async fn reload_flow(&self) -> Result<usize, EngineError> {
		let steps = match self.backend.steps.operation_steps().await {
			Ok(steps) => steps,
			Err(e) => {
				tracing::warn!(error = %e, "Failed to load operation steps, keeping previous flow");
				return Err(EngineError::Service(e.to_string()));
			}
		};

		let registry = StatusFlowRegistry::new(steps);
		let active = registry.status_flow().len();
		if active == 0 {
			tracing::warn!("No active operation steps configured");
		}
		tracing::debug!(steps = registry.steps().len(), active, "Flow reloaded");
		self.registry.store(Arc::new(registry));
		Ok(active)
	}

	/// Current flow snapshot.
	pub fn flow(&self) -> Arc<StatusFlowRegistry> {
		self.registry.load_full()
	}

	/// Opens the session of the acting user, waiting for any request of the
	/// same user to finish. The scope is resolved again, and its subscription
	/// checked, whenever the user shows up with a different session.
	pub async fn session(&self, user: UserSession) -> SessionHandle {
		let context = self.context_for(&user.user_id);
		let turn = context.take_turn().await;

		if context.scope.session().await.as_ref() != Some(&user) {
			tracing::info!(user_id = %user.user_id, role = %user.role, "Resolving session");
			context.scope.resolve_session(user).await;
			context.refresh_subscription().await;
		}

		SessionHandle {
			context,
			registry: self.registry.clone(),
			order_handler: self.order_handler.clone(),
			event_bus: self.event_bus.clone(),
			_turn: turn,
		}
	}

	/// Opens the session configured for this service instance.
	pub async fn default_session(&self) -> SessionHandle {
		self.session(self.config.session.clone()).await
	}

	/// Rechecks the subscription of every open session.
	pub async fn refresh_subscriptions(&self) {
		for context in self.contexts() {
			let _turn = context.take_turn().await;
			context.refresh_subscription().await;
		}
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns a reference to the storage service.
	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	fn context_for(&self, user_id: &str) -> Arc<SessionContext> {
		self.sessions
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.entry(user_id.to_string())
			.or_insert_with(|| {
				Arc::new(SessionContext::new(
					&self.backend,
					self.storage.clone(),
					self.event_bus.clone(),
				))
			})
			.clone()
	}

	pub(crate) fn contexts(&self) -> Vec<Arc<SessionContext>> {
		self.sessions
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.values()
			.cloned()
			.collect()
	}

	/// Spawns a handler task, holding a semaphore permit while it runs.
	async fn spawn_handler<F, Fut>(&self, semaphore: &Arc<Semaphore>, handler: F)
	where
		F: FnOnce(LaundryEngine) -> Fut + Send + 'static,
		Fut: Future<Output = Result<(), EngineError>> + Send,
	{
		let engine = self.clone();
		match semaphore.clone().acquire_owned().await {
			Ok(permit) => {
				tokio::spawn(async move {
					let _permit = permit;
					if let Err(e) = handler(engine).await {
						tracing::error!("Handler error: {}", e);
					}
				});
			}
			Err(e) => {
				tracing::error!("Failed to acquire semaphore permit: {}", e);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use laundry_backend::implementations::memory::MemoryBackend;
	use laundry_config::ConfigBuilder;
	use laundry_storage::implementations::memory::MemoryStorage;
	use laundry_types::{
		Customer, ItemType, NewOrder, NewOrderItem, SubscriptionCheckResult, SubscriptionStatus,
		UserRole,
	};
	use rust_decimal::Decimal;

	const SEED: &str = r#"
[[steps]]
key = "received"
name = "Received"
color = "slate-500"
icon = "inbox"
order = 1

[[steps]]
key = "washing"
name = "Washing"
color = "blue-500"
icon = "droplets"
order = 2

[[steps]]
key = "ready"
name = "Ready"
color = "green-500"
icon = "check"
order = 3

[[laundries]]
id = "l-1"
name = "Suds"
is_active = true

[[laundries]]
id = "l-2"
name = "Spin City"
is_active = true

[[branches]]
id = "b-main"
laundry_id = "l-1"
name = "Centro"
code = "C"
is_main = true
is_active = true

[[branches]]
id = "b-north"
laundry_id = "l-1"
name = "Norte"
code = "N"
is_main = false
is_active = true

[[branches]]
id = "b-2"
laundry_id = "l-2"
name = "Plaza"
code = "P"
is_main = true
is_active = true

[[users]]
user_id = "u-owner"
laundry_id = "l-1"

[[subscriptions]]
branch_id = "b-main"
status = "active"
days_until_suspension = 20
is_in_grace_period = false

[[subscriptions]]
branch_id = "b-2"
status = "suspended"
days_until_suspension = -3
is_in_grace_period = false
"#;

	struct Fixture {
		engine: LaundryEngine,
		memory: Arc<MemoryBackend>,
	}

	async fn fixture() -> Fixture {
		let seed: toml::Value = toml::from_str(SEED).unwrap();
		let config = ConfigBuilder::new().build();
		let memory = Arc::new(MemoryBackend::from_seed(seed.try_into().unwrap()).unwrap());
		let engine = LaundryEngine::new(
			config,
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			BackendService::from_shared(memory.clone()),
			Arc::new(NotificationService::new(HashMap::new())),
			event_bus::EventBus::new(64),
		);
		engine.initialize().await.unwrap();
		Fixture { engine, memory }
	}

	fn owner() -> UserSession {
		UserSession {
			user_id: "u-owner".into(),
			role: UserRole::Owner,
			laundry_id: None,
			branch_id: None,
		}
	}

	fn cashier(laundry_id: &str, branch_id: &str) -> UserSession {
		UserSession {
			user_id: "u-cashier".into(),
			role: UserRole::Cashier,
			laundry_id: Some(laundry_id.into()),
			branch_id: Some(branch_id.into()),
		}
	}

	fn new_order(laundry_id: &str, branch_id: &str) -> NewOrder {
		NewOrder {
			laundry_id: laundry_id.into(),
			branch_id: branch_id.into(),
			customer: Customer {
				name: "Ana".into(),
				phone: "555-0100".into(),
				address: None,
			},
			items: vec![NewOrderItem {
				name: "Shirts".into(),
				item_type: ItemType::Piece,
				quantity: Decimal::new(3, 0),
				unit_price: Decimal::new(25, 0),
				extras: vec![],
			}],
			total_amount: None,
			paid_amount: Decimal::ZERO,
			is_delivery: false,
			delivery_slot: None,
			estimated_ready_at: None,
			notes: None,
		}
	}

	fn subscription(status: SubscriptionStatus, grace: bool) -> SubscriptionCheckResult {
		SubscriptionCheckResult {
			can_operate: !status.is_blocking(),
			is_in_grace_period: grace,
			days_until_suspension: if grace { 2 } else { 0 },
			status,
			message: "Billing notice".into(),
		}
	}

	async fn created(session: &SessionHandle, order: NewOrder) -> Order {
		match session.submit_order(order).await.unwrap() {
			SubmitOutcome::Created(order) => order,
			other => panic!("unexpected outcome {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_initialize_resolves_owner_scope() {
		let f = fixture().await;
		let session = f.engine.default_session().await;
		let scope = session.scope().scope().await;
		assert_eq!(scope.laundry_id.as_deref(), Some("l-1"));
		assert_eq!(scope.selected_branch_id, None);
		assert_eq!(session.scope().branches().await.len(), 2);
		assert_eq!(f.engine.flow().status_flow().len(), 3);
		assert_eq!(
			session.gate().snapshot().map(|s| s.status),
			Some(SubscriptionStatus::Active)
		);
		assert_eq!(session.gate().branch_id().as_deref(), Some("b-main"));
	}

	#[tokio::test]
	async fn test_order_lifecycle() {
		let f = fixture().await;
		let session = f.engine.default_session().await;
		let order = created(&session, new_order("l-1", "b-north")).await;
		assert_eq!(order.status.as_str(), "received");
		assert!(order.ticket_code.starts_with("N-"));

		let advanced = session.advance_order(&order.id).await.unwrap();
		assert_eq!(advanced.status.as_str(), "washing");
		assert_eq!(advanced.delivered_at, None);
		let regressed = session.regress_order(&order.id).await.unwrap();
		assert_eq!(regressed.status.as_str(), "received");

		let err = session.regress_order(&order.id).await.unwrap_err();
		assert!(matches!(err, EngineError::Transition(_)));

		let views = session.list_orders(None).await.unwrap();
		assert_eq!(views.len(), 1);
		assert!(views[0].can_advance);
		assert!(!views[0].can_regress);
	}

	#[tokio::test]
	async fn test_last_step_records_delivery() {
		let f = fixture().await;
		let session = f.engine.default_session().await;
		let order = created(&session, new_order("l-1", "b-main")).await;

		session.advance_order(&order.id).await.unwrap();
		let ready = session.advance_order(&order.id).await.unwrap();
		assert_eq!(ready.status.as_str(), "ready");
		assert!(ready.delivered_at.is_some());

		let reopened = session.regress_order(&order.id).await.unwrap();
		assert_eq!(reopened.delivered_at, None);
	}

	#[tokio::test]
	async fn test_branch_filter_hides_other_orders() {
		let f = fixture().await;
		let session = f.engine.default_session().await;
		let order = created(&session, new_order("l-1", "b-north")).await;

		session.set_branch(Some("b-main".into())).await.unwrap();
		assert!(session.list_orders(None).await.unwrap().is_empty());
		assert!(matches!(
			session.advance_order(&order.id).await,
			Err(EngineError::NotFound(_))
		));
		assert!(matches!(
			session.submit_order(new_order("l-1", "b-north")).await,
			Err(EngineError::Forbidden(_))
		));
	}

	#[tokio::test]
	async fn test_blocked_subscription_refuses_sale() {
		let f = fixture().await;
		f.memory
			.set_subscription("b-main", subscription(SubscriptionStatus::Suspended, false))
			.await;
		let session = f.engine.default_session().await;
		session.refresh_subscription().await;

		assert!(matches!(
			session.submit_order(new_order("l-1", "b-main")).await,
			Err(EngineError::Blocked(_))
		));
		assert!(session.list_orders(None).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_sale_is_gated_by_its_own_branch() {
		let f = fixture().await;
		f.memory
			.set_subscription("b-north", subscription(SubscriptionStatus::Suspended, false))
			.await;
		let session = f.engine.default_session().await;
		// The snapshot of the main branch allows sales
		assert!(!session.gate().is_blocked());

		assert!(matches!(
			session.submit_order(new_order("l-1", "b-north")).await,
			Err(EngineError::Blocked(_))
		));
		assert_eq!(session.gate().branch_id().as_deref(), Some("b-north"));

		created(&session, new_order("l-1", "b-main")).await;
	}

	#[tokio::test]
	async fn test_scope_change_rechecks_subscription() {
		let f = fixture().await;
		let session = f.engine.default_session().await;

		session.switch_laundry("l-2").await.unwrap();
		assert_eq!(session.gate().branch_id().as_deref(), Some("b-2"));
		assert!(session.gate().is_blocked());
		assert!(matches!(
			session.submit_order(new_order("l-2", "b-2")).await,
			Err(EngineError::Blocked(_))
		));

		session.switch_laundry("l-1").await.unwrap();
		session.set_branch(Some("b-north".into())).await.unwrap();
		// b-north has no subscription
		assert_eq!(session.gate().branch_id().as_deref(), Some("b-north"));
		assert!(!session.gate().is_blocked());
	}

	#[tokio::test]
	async fn test_new_user_is_gated_by_their_own_laundry() {
		let f = fixture().await;
		drop(f.engine.default_session().await);

		let session = f.engine.session(cashier("l-2", "b-2")).await;
		assert_eq!(
			session.gate().snapshot().map(|s| s.status),
			Some(SubscriptionStatus::Suspended)
		);
		assert!(matches!(
			session.submit_order(new_order("l-2", "b-2")).await,
			Err(EngineError::Blocked(_))
		));
	}

	#[tokio::test]
	async fn test_sessions_do_not_share_scope() {
		let f = fixture().await;
		let owner_session = f.engine.session(owner()).await;
		owner_session.set_branch(Some("b-north".into())).await.unwrap();
		let order = created(&owner_session, new_order("l-1", "b-north")).await;

		// Both sessions are open at the same time
		let cashier_session = f.engine.session(cashier("l-1", "b-main")).await;
		assert_eq!(
			cashier_session.scope().scope().await.selected_branch_id.as_deref(),
			Some("b-main")
		);
		assert!(cashier_session.list_orders(None).await.unwrap().is_empty());
		assert!(matches!(
			cashier_session.advance_order(&order.id).await,
			Err(EngineError::NotFound(_))
		));

		assert_eq!(
			owner_session.scope().scope().await.selected_branch_id.as_deref(),
			Some("b-north")
		);
		assert_eq!(owner_session.list_orders(None).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_same_user_requests_take_turns() {
		let f = fixture().await;
		let first = f.engine.default_session().await;

		let engine = f.engine.clone();
		let second = tokio::spawn(async move {
			let session = engine.default_session().await;
			session.scope().scope().await.selected_branch_id
		});

		first.set_branch(Some("b-north".into())).await.unwrap();
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(!second.is_finished());
		drop(first);

		assert_eq!(second.await.unwrap().as_deref(), Some("b-north"));
	}

	#[tokio::test]
	async fn test_grace_period_defers_sale_until_acknowledged() {
		let f = fixture().await;
		f.memory
			.set_subscription("b-main", subscription(SubscriptionStatus::PastDue, true))
			.await;
		let session = f.engine.default_session().await;
		session.refresh_subscription().await;

		let outcome = session.submit_order(new_order("l-1", "b-main")).await.unwrap();
		assert!(matches!(outcome, SubmitOutcome::AwaitingAcknowledgement(_)));
		assert!(session.list_orders(None).await.unwrap().is_empty());

		assert!(session.acknowledge_pending());
		assert!(!session.acknowledge_pending());

		// The sale runs on a spawned task
		let mut orders = Vec::new();
		for _ in 0..50 {
			orders = session.list_orders(None).await.unwrap();
			if !orders.is_empty() {
				break;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		assert_eq!(orders.len(), 1);
	}

	#[tokio::test]
	async fn test_parked_sale_belongs_to_its_user() {
		let f = fixture().await;
		f.memory
			.set_subscription("b-main", subscription(SubscriptionStatus::PastDue, true))
			.await;
		let owner_session = f.engine.default_session().await;
		owner_session.refresh_subscription().await;
		owner_session
			.submit_order(new_order("l-1", "b-main"))
			.await
			.unwrap();

		let cashier_session = f.engine.session(cashier("l-1", "b-main")).await;
		assert!(!cashier_session.gate().has_pending());
		assert!(!cashier_session.acknowledge_pending());
		assert!(!cashier_session.dismiss_pending());

		assert!(owner_session.gate().has_pending());
		assert!(owner_session.dismiss_pending());
	}

	#[tokio::test]
	async fn test_dismissed_sale_never_runs() {
		let f = fixture().await;
		f.memory
			.set_subscription("b-main", subscription(SubscriptionStatus::PastDue, true))
			.await;
		let session = f.engine.default_session().await;
		session.refresh_subscription().await;

		session.submit_order(new_order("l-1", "b-main")).await.unwrap();
		assert!(session.dismiss_pending());
		assert!(!session.acknowledge_pending());
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(session.list_orders(None).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_periodic_refresh_updates_every_session() {
		let f = fixture().await;
		drop(f.engine.session(cashier("l-1", "b-main")).await);
		f.memory
			.set_subscription("b-main", subscription(SubscriptionStatus::Cancelled, false))
			.await;

		f.engine.refresh_subscriptions().await;
		assert!(f.engine.default_session().await.gate().is_blocked());
		assert!(f
			.engine
			.session(cashier("l-1", "b-main"))
			.await
			.gate()
			.is_blocked());
	}

	#[tokio::test]
	async fn test_empty_flow_refuses_sales() {
		let f = fixture().await;
		f.memory.set_steps(vec![]).await;
		assert_eq!(f.engine.reload_flow().await.unwrap(), 0);
		assert!(f.engine.flow().status_flow().is_empty());
		let session = f.engine.default_session().await;
		assert!(matches!(
			session.submit_order(new_order("l-1", "b-main")).await,
			Err(EngineError::NotReady(_))
		));
	}

	#[tokio::test]
	async fn test_staff_session_is_pinned_to_branch() {
		let f = fixture().await;
		let session = f.engine.session(cashier("l-1", "b-north")).await;

		let scope = session.scope().scope().await;
		assert_eq!(scope.selected_branch_id.as_deref(), Some("b-north"));
		assert!(matches!(
			session.set_branch(None).await,
			Err(EngineError::Forbidden(_))
		));
	}
}
