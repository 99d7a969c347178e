//! Scope endpoints: the active laundry, its branches and the branch filter.

use super::engine_error;
use laundry_core::SessionHandle;
use laundry_types::{APIError, ScopeResponse, SetBranchRequest, SetLaundryRequest};
use tracing::info;

/// Handles GET /api/scope.
pub async fn get_scope(session: &SessionHandle) -> ScopeResponse {
	let resolver = session.scope();
	let scope = resolver.scope().await;
	ScopeResponse {
		laundry_id: scope.laundry_id,
		selected_branch_id: scope.selected_branch_id,
		branches: resolver.branches().await,
		can_switch: resolver.can_switch().await,
	}
}

/// Handles PUT /api/scope/laundry.
pub async fn set_laundry(
	session: &SessionHandle,
	request: SetLaundryRequest,
) -> Result<ScopeResponse, APIError> {
	if request.laundry_id.trim().is_empty() {
		return Err(APIError::BadRequest {
			error_type: "INVALID_REQUEST".to_string(),
			message: "laundryId must not be empty".to_string(),
		});
	}
	info!(laundry_id = %request.laundry_id, "Switching laundry");
	session
		.switch_laundry(&request.laundry_id)
		.await
		.map_err(engine_error)?;
	Ok(get_scope(session).await)
}

/// Handles PUT /api/scope/branch.
pub async fn set_branch(
	session: &SessionHandle,
	request: SetBranchRequest,
) -> Result<ScopeResponse, APIError> {
	session
		.set_branch(request.branch_id)
		.await
		.map_err(engine_error)?;
	Ok(get_scope(session).await)
}
