//! Subscription billing status as reported by the remote billing backend.
//!
//! The values here are snapshots: they are computed remotely and only observed
//! locally. Nothing in this workspace drives a subscription transition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Billing status of a laundry subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
	Trial,
	Active,
	PastDue,
	Suspended,
	Cancelled,
}

impl SubscriptionStatus {
	/// Statuses under which no sale may be recorded.
	pub fn is_blocking(&self) -> bool {
		matches!(self, Self::Suspended | Self::Cancelled)
	}

	/// Whether the billing backend is known to move a subscription from `self`
	/// to `next`. Staying in the same status is always allowed.
	pub fn can_transition_to(&self, next: SubscriptionStatus) -> bool {
		use SubscriptionStatus::*;

		if *self == next {
			return true;
		}
		match (self, next) {
			(Cancelled, _) => false,
			(_, Cancelled) => true,
			(Trial, Active) | (Trial, PastDue) => true,
			(Active, PastDue) | (PastDue, Active) => true,
			(PastDue, Suspended) => true,
			(Suspended, Active) => true,
			_ => false,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Trial => "trial",
			Self::Active => "active",
			Self::PastDue => "past_due",
			Self::Suspended => "suspended",
			Self::Cancelled => "cancelled",
		}
	}
}

impl fmt::Display for SubscriptionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Result of the remote subscription check for a branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCheckResult {
	pub can_operate: bool,
	pub is_in_grace_period: bool,
	/// Days left before suspension; zero or negative once the threshold passed.
	pub days_until_suspension: i64,
	pub status: SubscriptionStatus,
	#[serde(default)]
	pub message: String,
}

impl SubscriptionCheckResult {
	/// `can_operate` must be false exactly when the status blocks operation.
	pub fn is_consistent(&self) -> bool {
		self.can_operate != self.status.is_blocking()
	}
}

/// Content of the reminder dialog shown before a sale during a grace period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionReminder {
	pub status: SubscriptionStatus,
	pub days_until_suspension: i64,
	pub is_in_grace_period: bool,
	pub message: String,
}

impl From<&SubscriptionCheckResult> for SubscriptionReminder {
	fn from(result: &SubscriptionCheckResult) -> Self {
		Self {
			status: result.status,
			days_until_suspension: result.days_until_suspension,
			is_in_grace_period: result.is_in_grace_period,
			message: result.message.clone(),
		}
	}
}
