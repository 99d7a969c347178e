//! Flow endpoint: the configured operation steps and their display data.

use laundry_core::LaundryEngine;
use laundry_types::FlowResponse;

/// Handles GET /api/flow.
pub fn get_flow(engine: &LaundryEngine) -> FlowResponse {
	let registry = engine.flow();
	FlowResponse {
		flow: registry.status_flow().to_vec(),
		steps: registry.step_views(),
	}
}
