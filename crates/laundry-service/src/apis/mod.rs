//! Endpoint implementations for the laundry API.
//!
//! Each module works against the engine and returns API payloads or an
//! [`APIError`]; routing and request extraction live in the server module.

pub mod flow;
pub mod order;
pub mod scope;
pub mod subscription;

use laundry_core::EngineError;
use laundry_types::APIError;

/// Maps engine failures to HTTP errors.
pub fn engine_error(err: EngineError) -> APIError {
	let message = err.to_string();
	match err {
		EngineError::InvalidRequest(_) => APIError::BadRequest {
			error_type: "INVALID_REQUEST".to_string(),
			message,
		},
		EngineError::Forbidden(_) => APIError::Forbidden {
			error_type: "FORBIDDEN".to_string(),
			message,
		},
		EngineError::Blocked(_) => APIError::Forbidden {
			error_type: "SUBSCRIPTION_BLOCKED".to_string(),
			message,
		},
		EngineError::NotFound(_) => APIError::NotFound {
			error_type: "NOT_FOUND".to_string(),
			message,
		},
		EngineError::Transition(_) => APIError::Conflict {
			error_type: "INVALID_TRANSITION".to_string(),
			message,
		},
		EngineError::NotReady(_) => APIError::UnprocessableEntity {
			error_type: "NOT_READY".to_string(),
			message,
		},
		EngineError::Service(_) => APIError::ServiceUnavailable {
			error_type: "BACKEND_UNAVAILABLE".to_string(),
			message,
		},
		EngineError::Config(_) | EngineError::Handler(_) => APIError::InternalServerError {
			error_type: "INTERNAL_ERROR".to_string(),
			message,
		},
	}
}
