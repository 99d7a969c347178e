//! In-memory platform backend.
//!
//! Seeded from the implementation's TOML table and keeps orders in process
//! memory. Used for local runs, demos and tests; nothing is persisted.
//!
//! ```toml
//! [backend.implementations.memory]
//! steps = [
//!   { key = "received", name = "Received", color = "slate-500", icon = "inbox", order = 1 },
//!   { key = "washing", name = "Washing", color = "blue-500", icon = "droplets", order = 2 },
//! ]
//! laundries = [{ id = "l-1", name = "Clean & Co" }]
//! branches = [{ id = "b-1", laundry_id = "l-1", code = "CTR", name = "Centro", is_main = true }]
//! users = [{ user_id = "u-owner", laundry_id = "l-1" }]
//! subscriptions = [{ branch_id = "b-1", status = "active" }]
//! ```

use crate::{
	BackendError, BackendFactory, BackendRegistry, BackendService, BranchDirectory, OrderStore,
	StepSource, SubscriptionService,
};
use async_trait::async_trait;
use chrono::Utc;
use laundry_types::{
	Branch, ImplementationRegistry, Laundry, NewOrder, OperationStep, Order, OrderItem,
	OrderQuery, OrderStatus, StatusUpdate, SubscriptionCheckResult, SubscriptionStatus,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Initial content of a [`MemoryBackend`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemorySeed {
	#[serde(default)]
	pub steps: Vec<OperationStep>,
	#[serde(default)]
	pub laundries: Vec<Laundry>,
	#[serde(default)]
	pub branches: Vec<Branch>,
	#[serde(default)]
	pub users: Vec<UserSeed>,
	#[serde(default)]
	pub subscriptions: Vec<SubscriptionSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserSeed {
	pub user_id: String,
	pub laundry_id: String,
}

/// Subscription snapshot for a branch; `can_operate` follows from the status.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSeed {
	pub branch_id: String,
	pub status: SubscriptionStatus,
	#[serde(default)]
	pub days_until_suspension: i64,
	#[serde(default)]
	pub is_in_grace_period: bool,
	#[serde(default)]
	pub message: String,
}

impl From<SubscriptionSeed> for SubscriptionCheckResult {
	fn from(seed: SubscriptionSeed) -> Self {
		SubscriptionCheckResult {
			can_operate: !seed.status.is_blocking(),
			is_in_grace_period: seed.is_in_grace_period,
			days_until_suspension: seed.days_until_suspension,
			status: seed.status,
			message: seed.message,
		}
	}
}

pub struct MemoryBackend {
	steps: RwLock<Vec<OperationStep>>,
	laundries: Vec<Laundry>,
	branches: Vec<Branch>,
	/// user id -> laundry id
	users: HashMap<String, String>,
	/// branch id -> latest check result
	subscriptions: RwLock<HashMap<String, SubscriptionCheckResult>>,
	orders: RwLock<Vec<Order>>,
	ticket_counter: AtomicU64,
}

impl MemoryBackend {
	/// Builds a backend from a seed, rejecting branches of unknown laundries.
	pub fn from_seed(seed: MemorySeed) -> Result<Self, BackendError> {
		for branch in &seed.branches {
			if !seed.laundries.iter().any(|l| l.id == branch.laundry_id) {
				return Err(BackendError::Configuration(format!(
					"branch '{}' references unknown laundry '{}'",
					branch.id, branch.laundry_id
				)));
			}
		}

		let users = seed
			.users
			.into_iter()
			.map(|u| (u.user_id, u.laundry_id))
			.collect();
		let subscriptions = seed
			.subscriptions
			.into_iter()
			.map(|s| (s.branch_id.clone(), SubscriptionCheckResult::from(s)))
			.collect();

		Ok(Self {
			steps: RwLock::new(seed.steps),
			laundries: seed.laundries,
			branches: seed.branches,
			users,
			subscriptions: RwLock::new(subscriptions),
			orders: RwLock::new(Vec::new()),
			ticket_counter: AtomicU64::new(0),
		})
	}

	/// Replaces the configured steps, as an administrator editing the flow would.
	pub async fn set_steps(&self, steps: Vec<OperationStep>) {
		*self.steps.write().await = steps;
	}

	/// Replaces the subscription snapshot reported for a branch.
	pub async fn set_subscription(&self, branch_id: &str, result: SubscriptionCheckResult) {
		self.subscriptions
			.write()
			.await
			.insert(branch_id.to_string(), result);
	}

	fn next_ticket_code(&self, branch: &Branch) -> String {
		let n = self.ticket_counter.fetch_add(1, Ordering::Relaxed) + 1;
		format!("{}-{:04}", branch.code, n)
	}
}

#[async_trait]
impl StepSource for MemoryBackend {
	async fn operation_steps(&self) -> Result<Vec<OperationStep>, BackendError> {
		Ok(self.steps.read().await.clone())
	}
}

#[async_trait]
impl BranchDirectory for MemoryBackend {
	async fn laundry_for_user(&self, user_id: &str) -> Result<Option<String>, BackendError> {
		Ok(self.users.get(user_id).cloned())
	}

	async fn laundries(&self) -> Result<Vec<Laundry>, BackendError> {
		let mut laundries: Vec<Laundry> =
			self.laundries.iter().filter(|l| l.is_active).cloned().collect();
		laundries.sort_by(|a, b| a.name.cmp(&b.name));
		Ok(laundries)
	}

	async fn active_branches(&self, laundry_id: &str) -> Result<Vec<Branch>, BackendError> {
		let mut branches: Vec<Branch> = self
			.branches
			.iter()
			.filter(|b| b.laundry_id == laundry_id && b.is_active)
			.cloned()
			.collect();
		branches.sort_by(|a, b| b.is_main.cmp(&a.is_main).then_with(|| a.name.cmp(&b.name)));
		Ok(branches)
	}

	async fn branch(&self, branch_id: &str) -> Result<Option<Branch>, BackendError> {
		Ok(self.branches.iter().find(|b| b.id == branch_id).cloned())
	}
}

#[async_trait]
impl OrderStore for MemoryBackend {
	async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, BackendError> {
		let orders = self.orders.read().await;
		// Stored oldest first
		Ok(orders
			.iter()
			.rev()
			.filter(|order| query.matches(order))
			.cloned()
			.collect())
	}

	async fn get_order(&self, order_id: &str) -> Result<Option<Order>, BackendError> {
		let orders = self.orders.read().await;
		Ok(orders.iter().find(|o| o.id == order_id).cloned())
	}

	async fn create_order(
		&self,
		order: NewOrder,
		status: OrderStatus,
	) -> Result<Order, BackendError> {
		let branch = self
			.branches
			.iter()
			.find(|b| b.id == order.branch_id)
			.ok_or_else(|| BackendError::NotFound(format!("branch {}", order.branch_id)))?;
		if branch.laundry_id != order.laundry_id {
			return Err(BackendError::Rejected(format!(
				"branch {} does not belong to laundry {}",
				branch.id, order.laundry_id
			)));
		}
		if order.items.is_empty() {
			return Err(BackendError::Rejected("order has no items".into()));
		}

		let now = Utc::now();
		let total_amount = order
			.total()
			.ok_or_else(|| BackendError::Rejected("order total is out of range".into()))?;
		let items = order
			.items
			.into_iter()
			.map(|item| OrderItem {
				id: uuid::Uuid::new_v4().to_string(),
				name: item.name,
				item_type: item.item_type,
				quantity: item.quantity,
				unit_price: item.unit_price,
				extras: item.extras,
			})
			.collect();

		let created = Order {
			id: uuid::Uuid::new_v4().to_string(),
			ticket_code: self.next_ticket_code(branch),
			laundry_id: order.laundry_id,
			branch_id: order.branch_id,
			customer: order.customer,
			items,
			status,
			total_amount,
			paid_amount: order.paid_amount,
			is_delivery: order.is_delivery,
			delivery_slot: order.delivery_slot,
			driver_id: None,
			created_at: now,
			updated_at: now,
			estimated_ready_at: order.estimated_ready_at,
			delivered_at: None,
			notes: order.notes,
		};

		self.orders.write().await.push(created.clone());
		Ok(created)
	}

	async fn update_status(
		&self,
		order_id: &str,
		update: StatusUpdate,
	) -> Result<Order, BackendError> {
		let mut orders = self.orders.write().await;
		let order = orders
			.iter_mut()
			.find(|o| o.id == order_id)
			.ok_or_else(|| BackendError::NotFound(format!("order {}", order_id)))?;

		order.status = update.status;
		order.delivered_at = update.delivered_at;
		order.updated_at = Utc::now();
		Ok(order.clone())
	}
}

#[async_trait]
impl SubscriptionService for MemoryBackend {
	async fn check(&self, branch_id: &str) -> Result<SubscriptionCheckResult, BackendError> {
		self.subscriptions
			.read()
			.await
			.get(branch_id)
			.cloned()
			.ok_or_else(|| BackendError::NotFound(format!("subscription for branch {}", branch_id)))
	}
}

/// Factory for the memory backend; the whole table is read as a [`MemorySeed`].
pub fn create_backend(config: &toml::Value) -> Result<BackendService, BackendError> {
	let seed: MemorySeed = config
		.clone()
		.try_into()
		.map_err(|e: toml::de::Error| BackendError::Configuration(e.to_string()))?;

	let backend = MemoryBackend::from_seed(seed)?;
	tracing::debug!(
		laundries = backend.laundries.len(),
		branches = backend.branches.len(),
		"Seeded memory backend"
	);
	Ok(BackendService::from_shared(Arc::new(backend)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = BackendFactory;

	fn factory() -> Self::Factory {
		create_backend
	}
}

impl BackendRegistry for Registry {}
