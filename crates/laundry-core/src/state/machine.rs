//! Order status transitions over the configured flow.
//!
//! The machine answers questions about an order's position in the flow. It
//! never mutates orders: handlers ask it for the target status and persist
//! the change themselves.

use laundry_types::{OrderStatus, StepProgress, StepState};
use thiserror::Error;

/// Errors returned when a requested transition is not legal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
	#[error("Status '{0}' is not part of the active flow")]
	UnknownStatus(String),
	#[error("Order is already in the final step '{0}'")]
	AlreadyFinal(String),
	#[error("Order is already in the first step '{0}'")]
	AlreadyInitial(String),
	#[error("Cannot move from '{from}' to '{to}': steps are not adjacent")]
	NotAdjacent { from: String, to: String },
}

/// Position based transition rules for an ordered flow of statuses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderStatusMachine {
	flow: Vec<OrderStatus>,
}

impl OrderStatusMachine {
	pub fn new(flow: Vec<OrderStatus>) -> Self {
		Self { flow }
	}

	pub fn flow(&self) -> &[OrderStatus] {
		&self.flow
	}

	pub fn len(&self) -> usize {
		self.flow.len()
	}

	pub fn is_empty(&self) -> bool {
		self.flow.is_empty()
	}

	/// Zero-based position of the status, `None` when it is not in the flow.
	pub fn index(&self, status: &str) -> Option<usize> {
		self.flow.iter().position(|s| s.as_str() == status)
	}

	pub fn next(&self, status: &str) -> Option<&OrderStatus> {
		self.index(status).and_then(|i| self.flow.get(i + 1))
	}

	pub fn previous(&self, status: &str) -> Option<&OrderStatus> {
		self.index(status)
			.and_then(|i| i.checked_sub(1))
			.and_then(|i| self.flow.get(i))
	}

	pub fn can_advance(&self, status: &str) -> bool {
		self.index(status).is_some_and(|i| i + 1 < self.flow.len())
	}

	pub fn can_regress(&self, status: &str) -> bool {
		self.index(status).is_some_and(|i| i > 0)
	}

	/// Status new orders are created in.
	pub fn initial(&self) -> Option<&OrderStatus> {
		self.flow.first()
	}

	pub fn terminal(&self) -> Option<&OrderStatus> {
		self.flow.last()
	}

	pub fn is_terminal(&self, status: &str) -> bool {
		self.terminal().is_some_and(|last| last.as_str() == status)
	}

	/// Compact flow indicator: steps before the status are completed, the
	/// status itself is current and the rest are pending. Every step is
	/// pending for a status outside the flow.
	pub fn progress(&self, status: &str) -> Vec<StepProgress> {
		let current = self.index(status);
		self.flow
			.iter()
			.enumerate()
			.map(|(i, key)| StepProgress {
				key: key.clone(),
				state: match current {
					Some(c) if i < c => StepState::Completed,
					Some(c) if i == c => StepState::Current,
					_ => StepState::Pending,
				},
			})
			.collect()
	}

	/// Target of an advance from `status`.
	pub fn advance_target(&self, status: &str) -> Result<&OrderStatus, TransitionError> {
		if self.index(status).is_none() {
			return Err(TransitionError::UnknownStatus(status.to_string()));
		}
		self.next(status)
			.ok_or_else(|| TransitionError::AlreadyFinal(status.to_string()))
	}

	/// Target of a regress from `status`.
	pub fn regress_target(&self, status: &str) -> Result<&OrderStatus, TransitionError> {
		if self.index(status).is_none() {
			return Err(TransitionError::UnknownStatus(status.to_string()));
		}
		self.previous(status)
			.ok_or_else(|| TransitionError::AlreadyInitial(status.to_string()))
	}

	/// Checks that `to` is one step away from `from` in either direction.
	pub fn check_transition(&self, from: &str, to: &str) -> Result<(), TransitionError> {
		let from_index = self
			.index(from)
			.ok_or_else(|| TransitionError::UnknownStatus(from.to_string()))?;
		let to_index = self
			.index(to)
			.ok_or_else(|| TransitionError::UnknownStatus(to.to_string()))?;

		if from_index.abs_diff(to_index) == 1 {
			Ok(())
		} else {
			Err(TransitionError::NotAdjacent {
				from: from.to_string(),
				to: to.to_string(),
			})
		}
	}
}
