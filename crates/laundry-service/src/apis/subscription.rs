//! Subscription endpoints: the current snapshot and the reminder dialog
//! actions. Every
//! user sees their own snapshot and their own parked sale.

use laundry_core::SessionHandle;
use laundry_types::{PendingOperationResponse, SubscriptionResponse};

/// Handles GET /api/subscription.
pub fn get_subscription(session: &SessionHandle) -> SubscriptionResponse {
	let gate = session.gate();
	SubscriptionResponse {
		result: gate.snapshot(),
		blocked: gate.is_blocked(),
		should_remind: gate.should_remind(),
		pending_operation: gate.has_pending(),
	}
}

/// Handles POST /api/subscription/acknowledge.
pub fn acknowledge(session: &SessionHandle) -> PendingOperationResponse {
	PendingOperationResponse {
		handled: session.acknowledge_pending(),
	}
}

/// Handles POST /api/subscription/dismiss.
pub fn dismiss(session: &SessionHandle) -> PendingOperationResponse {
	PendingOperationResponse {
		handled: session.dismiss_pending(),
	}
}
