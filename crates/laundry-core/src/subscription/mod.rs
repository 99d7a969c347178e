//! Subscription gate for sale operations.
//!
//! The gate turns the remotely computed subscription snapshot into a local
//! allow / remind / block decision. It only observes billing transitions,
//! it never drives them. Without a snapshot the gate allows: a slow or
//! unreachable billing check must not stop the counter from taking orders.
//!
//! The snapshot belongs to the branch it was checked for. A branch without a
//! subscription, or one whose first check fails, has no snapshot and is
//! allowed; a failed recheck of the same branch keeps the last known answer.
//!
//! A reminder defers the operation into a single pending slot until the user
//! acknowledges it. The slot is emptied by acknowledging (the operation runs)
//! and by dismissing (it is dropped), so a deferred operation runs at most
//! once no matter how often the reminder is shown.

use crate::engine::event_bus::EventBus;
use laundry_backend::{BackendError, SubscriptionService};
use laundry_types::{
	LaundryEvent, SubscriptionCheckResult, SubscriptionEvent, SubscriptionReminder,
	SubscriptionStatus,
};
use std::sync::{Arc, Mutex, PoisonError};

const DEFAULT_BLOCK_MESSAGE: &str = "The subscription is not active. Sales are disabled.";

/// Local decision for an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
	Allow,
	Remind(SubscriptionReminder),
	Block(String),
}

/// What happened to an operation passed to
/// [`SubscriptionGate::validate_operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
	/// The operation ran immediately.
	Proceeded,
	/// The operation was refused.
	Blocked(String),
	/// The operation is parked until the reminder is acknowledged.
	AwaitingAcknowledgement(SubscriptionReminder),
}

type PendingOperation = Box<dyn FnOnce() + Send>;

struct Pending {
	operation: PendingOperation,
	reminder: SubscriptionReminder,
}

/// Last check for a branch. `result` is `None` when the branch has no
/// subscription or could not be checked yet.
struct Snapshot {
	branch_id: String,
	result: Option<SubscriptionCheckResult>,
}

pub struct SubscriptionGate {
	service: Arc<dyn SubscriptionService>,
	event_bus: EventBus,
	snapshot: Mutex<Option<Snapshot>>,
	pending: Mutex<Option<Pending>>,
}

impl SubscriptionGate {
	pub fn new(service: Arc<dyn SubscriptionService>, event_bus: EventBus) -> Self {
		Self {
			service,
			event_bus,
			snapshot: Mutex::new(None),
			pending: Mutex::new(None),
		}
	}

	/// Fetches a fresh snapshot for the branch. A branch without a
	/// subscription clears the snapshot. Any other failure keeps the previous
	/// snapshot only when it belongs to the same branch.
	pub async fn refresh(&self, branch_id: &str) -> Option<SubscriptionCheckResult> {
		let result = match self.service.check(branch_id).await {
			Ok(result) => result,
			Err(BackendError::NotFound(_)) => {
				tracing::debug!(branch_id = %branch_id, "Branch has no subscription, sales allowed");
				self.replace_snapshot(branch_id, None);
				return None;
			}
			Err(e) => {
				tracing::warn!(branch_id = %branch_id, error = %e, "Subscription check failed");
				let mut snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
				if let Some(previous) = snapshot.as_ref().filter(|p| p.branch_id == branch_id) {
					return previous.result.clone();
				}
				*snapshot = Some(Snapshot {
					branch_id: branch_id.to_string(),
					result: None,
				});
				return None;
			}
		};

		if !result.is_consistent() {
			tracing::warn!(
				branch_id = %branch_id,
				status = %result.status,
				can_operate = result.can_operate,
				"Subscription check disagrees with its own status"
			);
		}

		let previous = self.replace_snapshot(branch_id, Some(result.clone()));
		if let Some(previous) = previous.filter(|p| p.branch_id == branch_id).and_then(|p| p.result) {
			log_transition(previous.status, result.status);
		}

		self.event_bus
			.publish(LaundryEvent::Subscription(SubscriptionEvent::Refreshed {
				branch_id: branch_id.to_string(),
				result: result.clone(),
			}))
			.ok();
		Some(result)
	}

	/// Checks the branch unless the current snapshot already belongs to it.
	pub async fn ensure_branch(&self, branch_id: &str) -> Option<SubscriptionCheckResult> {
		if self.branch_id().as_deref() == Some(branch_id) {
			return self.snapshot();
		}
		self.refresh(branch_id).await
	}

	pub fn snapshot(&self) -> Option<SubscriptionCheckResult> {
		self.snapshot
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.as_ref()
			.and_then(|snapshot| snapshot.result.clone())
	}

	/// Branch the current snapshot was checked for.
	pub fn branch_id(&self) -> Option<String> {
		self.snapshot
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.as_ref()
			.map(|snapshot| snapshot.branch_id.clone())
	}

	/// True only for suspended or cancelled subscriptions.
	pub fn is_blocked(&self) -> bool {
		self.snapshot()
			.is_some_and(|result| result.status.is_blocking())
	}

	pub fn should_remind(&self) -> bool {
		self.snapshot().is_some_and(|result| {
			result.is_in_grace_period || result.status == SubscriptionStatus::PastDue
		})
	}

	pub fn evaluate(&self) -> GateDecision {
		let Some(result) = self.snapshot() else {
			return GateDecision::Allow;
		};

		if result.status.is_blocking() {
			let message = if result.message.is_empty() {
				DEFAULT_BLOCK_MESSAGE.to_string()
			} else {
				result.message.clone()
			};
			GateDecision::Block(message)
		} else if result.is_in_grace_period || result.status == SubscriptionStatus::PastDue {
			GateDecision::Remind(SubscriptionReminder::from(&result))
		} else {
			GateDecision::Allow
		}
	}

	/// Runs, refuses or parks `proceed` depending on the current decision.
	/// Parking replaces any operation that was already waiting.
	pub fn validate_operation<F>(&self, proceed: F) -> GateOutcome
	where
		F: FnOnce() + Send + 'static,
	{
		match self.evaluate() {
			GateDecision::Allow => {
				proceed();
				GateOutcome::Proceeded
			}
			GateDecision::Block(message) => {
				tracing::warn!(message = %message, "Operation blocked by subscription");
				self.event_bus
					.publish(LaundryEvent::Subscription(
						SubscriptionEvent::OperationBlocked {
							message: message.clone(),
						},
					))
					.ok();
				GateOutcome::Blocked(message)
			}
			GateDecision::Remind(reminder) => {
				let replaced = self
					.pending
					.lock()
					.unwrap_or_else(PoisonError::into_inner)
					.replace(Pending {
						operation: Box::new(proceed),
						reminder: reminder.clone(),
					});
				if replaced.is_some() {
					tracing::debug!("Replaced an operation that was awaiting acknowledgement");
				}
				GateOutcome::AwaitingAcknowledgement(reminder)
			}
		}
	}

	/// Runs the parked operation. Returns false when nothing was waiting.
	pub fn acknowledge(&self) -> bool {
		let pending = self
			.pending
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take();

		match pending {
			Some(pending) => {
				tracing::info!("Subscription reminder acknowledged, running operation");
				(pending.operation)();
				true
			}
			None => false,
		}
	}

	/// Drops the parked operation. Returns false when nothing was waiting.
	pub fn dismiss(&self) -> bool {
		self.pending
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take()
			.is_some()
	}

	pub fn has_pending(&self) -> bool {
		self.pending
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.is_some()
	}

	/// Dialog content for the parked operation, if any.
	pub fn reminder(&self) -> Option<SubscriptionReminder> {
		self.pending
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.as_ref()
			.map(|pending| pending.reminder.clone())
	}

	fn replace_snapshot(
		&self,
		branch_id: &str,
		result: Option<SubscriptionCheckResult>,
	) -> Option<Snapshot> {
		self.snapshot
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.replace(Snapshot {
				branch_id: branch_id.to_string(),
				result,
			})
	}
}

fn log_transition(from: SubscriptionStatus, to: SubscriptionStatus) {
	if from == to {
		return;
	}
	if from.can_transition_to(to) {
		tracing::info!(from = %from, to = %to, "Subscription status changed");
	} else {
		tracing::warn!(from = %from, to = %to, "Unexpected subscription status change");
	}
}
