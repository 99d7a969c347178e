//! API types for the laundry HTTP API.
//!
//! Request/response payloads of the `/api` endpoints and the structured error
//! type mapped to HTTP status codes.

use crate::{
	Branch, Order, OrderStatus, StepProgress, SubscriptionCheckResult, SubscriptionReminder,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display data for one configured step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FlowStepView {
	pub key: OrderStatus,
	pub name: String,
	pub icon: Option<String>,
	pub background_class: String,
	pub text_class: String,
	pub is_active: bool,
	/// Position in the active flow, `None` for inactive steps.
	pub position: Option<usize>,
}

/// Response for `GET /api/flow`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowResponse {
	/// Ordered keys of the active flow.
	pub flow: Vec<OrderStatus>,
	/// Every configured step, active or not.
	pub steps: Vec<FlowStepView>,
}

/// Response for the `/api/scope` endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeResponse {
	pub laundry_id: Option<String>,
	pub selected_branch_id: Option<String>,
	pub branches: Vec<Branch>,
	pub can_switch: bool,
}

/// Body of `PUT /api/scope/branch`. A null branch selects all branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBranchRequest {
	pub branch_id: Option<String>,
}

/// Body of `PUT /api/scope/laundry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLaundryRequest {
	pub laundry_id: String,
}

/// An order together with its position in the flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
	pub order: Order,
	pub status_label: String,
	pub is_paid: bool,
	pub progress: Vec<StepProgress>,
	pub can_advance: bool,
	pub can_regress: bool,
	pub next_status: Option<OrderStatus>,
	pub previous_status: Option<OrderStatus>,
}

/// Response for `GET /api/orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOrdersResponse {
	pub orders: Vec<OrderView>,
}

/// Response for `POST /api/orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreateOrderResponse {
	Created { order: Order },
	AwaitingAcknowledgement { reminder: SubscriptionReminder },
}

/// Response for `GET /api/subscription`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
	/// Latest snapshot, `None` when no check succeeded yet.
	pub result: Option<SubscriptionCheckResult>,
	pub blocked: bool,
	pub should_remind: bool,
	pub pending_operation: bool,
}

/// Response for `POST /api/subscription/acknowledge` and `/dismiss`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOperationResponse {
	/// True if a parked operation was run (acknowledge) or dropped (dismiss).
	pub handled: bool,
}

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed request (400)
	BadRequest { error_type: String, message: String },
	/// Role or subscription does not allow the operation (403)
	Forbidden { error_type: String, message: String },
	/// Unknown order, laundry or branch (404)
	NotFound { error_type: String, message: String },
	/// Illegal status transition (409)
	Conflict { error_type: String, message: String },
	/// Scope not resolved or flow unavailable (422)
	UnprocessableEntity { error_type: String, message: String },
	/// Remote platform unavailable (503)
	ServiceUnavailable { error_type: String, message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Forbidden { .. } => 403,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	fn parts(&self) -> (&str, &str) {
		match self {
			APIError::BadRequest { error_type, message }
			| APIError::Forbidden { error_type, message }
			| APIError::NotFound { error_type, message }
			| APIError::Conflict { error_type, message }
			| APIError::UnprocessableEntity { error_type, message }
			| APIError::ServiceUnavailable { error_type, message }
			| APIError::InternalServerError { error_type, message } => (error_type, message),
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message) = self.parts();
		ErrorResponse {
			error: error.to_string(),
			message: message.to_string(),
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let (error_type, message) = self.parts();
		write!(f, "{} ({}): {}", error_type, self.status_code(), message)
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
