//! Order endpoints: scoped listing, gated creation and status moves.

use super::engine_error;
use laundry_core::{SessionHandle, SubmitOutcome};
use laundry_types::{
	APIError, CreateOrderResponse, ListOrdersResponse, NewOrder, OrderStatus, OrderView,
};
use tracing::{info, warn};

/// Handles GET /api/orders.
pub async fn list_orders(
	session: &SessionHandle,
	status: Option<String>,
) -> Result<ListOrdersResponse, APIError> {
	let status = status.filter(|s| !s.is_empty()).map(OrderStatus::new);
	let orders = session.list_orders(status).await.map_err(engine_error)?;
	Ok(ListOrdersResponse { orders })
}

/// Handles POST /api/orders. Returns the response body and whether the order
/// was created right away.
pub async fn create_order(
	session: &SessionHandle,
	order: NewOrder,
) -> Result<(bool, CreateOrderResponse), APIError> {
	validate_new_order(&order)?;

	match session.submit_order(order).await {
		Ok(SubmitOutcome::Created(order)) => {
			info!(ticket = %order.ticket_code, "Order created");
			Ok((true, CreateOrderResponse::Created { order }))
		}
		Ok(SubmitOutcome::AwaitingAcknowledgement(reminder)) => {
			Ok((false, CreateOrderResponse::AwaitingAcknowledgement { reminder }))
		}
		Err(e) => {
			warn!("Order creation failed: {}", e);
			Err(engine_error(e))
		}
	}
}

/// Handles POST /api/orders/{id}/advance.
pub async fn advance_order(session: &SessionHandle, id: &str) -> Result<OrderView, APIError> {
	let order = session.advance_order(id).await.map_err(engine_error)?;
	Ok(view(session, order))
}

/// Handles POST /api/orders/{id}/regress.
pub async fn regress_order(session: &SessionHandle, id: &str) -> Result<OrderView, APIError> {
	let order = session.regress_order(id).await.map_err(engine_error)?;
	Ok(view(session, order))
}

fn view(session: &SessionHandle, order: laundry_types::Order) -> OrderView {
	laundry_core::handlers::order_view(&session.flow(), order)
}

fn validate_new_order(order: &NewOrder) -> Result<(), APIError> {
	let invalid = |message: &str| APIError::BadRequest {
		error_type: "INVALID_ORDER".to_string(),
		message: message.to_string(),
	};

	if order.customer.name.trim().is_empty() {
		return Err(invalid("Customer name is required"));
	}
	if order.items.is_empty() {
		return Err(invalid("An order needs at least one item"));
	}
	if order
		.items
		.iter()
		.any(|item| item.quantity.is_sign_negative() || item.unit_price.is_sign_negative())
	{
		return Err(invalid("Item quantities and prices must not be negative"));
	}
	if order.paid_amount.is_sign_negative() {
		return Err(invalid("Paid amount must not be negative"));
	}
	if order.total().is_none() {
		return Err(invalid("Order total is out of range"));
	}
	Ok(())
}
