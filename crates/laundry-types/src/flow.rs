//! Operation step and order status types.
//!
//! The set of statuses an order moves through is not a compile-time enum: it is
//! read from configuration as a list of operation steps. An order status is
//! therefore just a step key, and every consumer has to be prepared for a key
//! that no longer (or never) matched a configured step.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// One configured stage of the order processing pipeline (e.g. washing).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperationStep {
	/// Stable unique identifier, stored on orders as their status.
	pub key: String,
	/// Human readable label.
	pub name: String,
	/// Color token in `family-shade` form, e.g. `blue-500`.
	pub color: String,
	/// Icon identifier understood by the client.
	pub icon: String,
	/// Inactive steps are kept for display but are not part of the flow.
	#[serde(default = "default_true", alias = "is_active")]
	pub is_active: bool,
	/// Rank of the step inside the flow, ascending.
	pub order: i32,
}

fn default_true() -> bool {
	true
}

/// Current status of an order: the key of an operation step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderStatus(String);

impl OrderStatus {
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_inner(self) -> String {
		self.0
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for OrderStatus {
	fn from(key: &str) -> Self {
		Self(key.to_string())
	}
}

impl From<String> for OrderStatus {
	fn from(key: String) -> Self {
		Self(key)
	}
}

impl AsRef<str> for OrderStatus {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for OrderStatus {
	fn borrow(&self) -> &str {
		&self.0
	}
}

/// Rendering state of a single step in a compact flow indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
	Completed,
	Current,
	Pending,
}

/// One entry of a compact flow indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepProgress {
	pub key: OrderStatus,
	pub state: StepState,
}
