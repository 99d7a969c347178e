//! Contracts for the hosted laundry platform.
//!
//! Everything the core needs from the outside world but does not own lives
//! behind the traits in this crate: the configured operation steps, the
//! laundry/branch directory, the order table and the subscription check.
//! A backend implementation provides all four and is bundled into a
//! [`BackendService`].

use async_trait::async_trait;
use laundry_types::{
	Branch, ImplementationRegistry, Laundry, NewOrder, OperationStep, Order, OrderQuery,
	OrderStatus, StatusUpdate, SubscriptionCheckResult,
};
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod memory;
	pub mod rest;
}

/// Errors that can occur while talking to the platform.
#[derive(Debug, Error)]
pub enum BackendError {
	/// The requested record does not exist.
	#[error("Not found: {0}")]
	NotFound(String),
	/// The platform could not be reached.
	#[error("Connection error: {0}")]
	Connection(String),
	/// The platform answered with a non-success status.
	#[error("Request failed with status {status}: {message}")]
	Http { status: u16, message: String },
	/// The response body could not be decoded.
	#[error("Parse error: {0}")]
	Parse(String),
	/// The request was understood but refused.
	#[error("Rejected: {0}")]
	Rejected(String),
	/// The implementation configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Source of the configured operation steps.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StepSource: Send + Sync {
	/// Returns every configured step, active or not, in source order.
	async fn operation_steps(&self) -> Result<Vec<OperationStep>, BackendError>;
}

/// Directory of laundries and their branches.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BranchDirectory: Send + Sync {
	/// Laundry the user belongs to, if any.
	async fn laundry_for_user(&self, user_id: &str) -> Result<Option<String>, BackendError>;

	/// All laundries visible to the caller.
	async fn laundries(&self) -> Result<Vec<Laundry>, BackendError>;

	/// Active branches of a laundry, main branch first, then by name.
	async fn active_branches(&self, laundry_id: &str) -> Result<Vec<Branch>, BackendError>;

	/// Looks up a single branch regardless of its active flag.
	async fn branch(&self, branch_id: &str) -> Result<Option<Branch>, BackendError>;
}

/// Persistent order table.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
	/// Orders inside the query scope, newest first.
	async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, BackendError>;

	async fn get_order(&self, order_id: &str) -> Result<Option<Order>, BackendError>;

	/// Inserts a new order in the given initial status.
	async fn create_order(
		&self,
		order: NewOrder,
		status: OrderStatus,
	) -> Result<Order, BackendError>;

	/// Overwrites the status and delivery time of an order and returns the
	/// updated record.
	async fn update_status(
		&self,
		order_id: &str,
		update: StatusUpdate,
	) -> Result<Order, BackendError>;
}

/// Remote subscription status check.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SubscriptionService: Send + Sync {
	async fn check(&self, branch_id: &str) -> Result<SubscriptionCheckResult, BackendError>;
}

/// The four platform contracts, usually served by one implementation.
#[derive(Clone)]
pub struct BackendService {
	pub steps: Arc<dyn StepSource>,
	pub branches: Arc<dyn BranchDirectory>,
	pub orders: Arc<dyn OrderStore>,
	pub subscriptions: Arc<dyn SubscriptionService>,
}

impl BackendService {
	pub fn new(
		steps: Arc<dyn StepSource>,
		branches: Arc<dyn BranchDirectory>,
		orders: Arc<dyn OrderStore>,
		subscriptions: Arc<dyn SubscriptionService>,
	) -> Self {
		Self {
			steps,
			branches,
			orders,
			subscriptions,
		}
	}

	/// Bundles a single value implementing every contract.
	pub fn from_shared<T>(backend: Arc<T>) -> Self
	where
		T: StepSource + BranchDirectory + OrderStore + SubscriptionService + 'static,
	{
		Self {
			steps: backend.clone(),
			branches: backend.clone(),
			orders: backend.clone(),
			subscriptions: backend,
		}
	}
}

/// Type alias for backend factory functions.
pub type BackendFactory = fn(&toml::Value) -> Result<BackendService, BackendError>;

/// Registry trait for backend implementations.
pub trait BackendRegistry: ImplementationRegistry<Factory = BackendFactory> {}

/// Get all registered backend implementations.
pub fn get_all_implementations() -> Vec<(&'static str, BackendFactory)> {
	use implementations::{memory, rest};

	vec![
		(memory::Registry::NAME, memory::Registry::factory()),
		(rest::Registry::NAME, rest::Registry::factory()),
	]
}
