//! HTTP server for the laundry API.
//!
//! Every request may name the acting user through the `x-user-id` and
//! `x-user-role` headers (with optional `x-laundry-id` and `x-branch-id`);
//! without them the configured session is used. Each acting user works in a
//! session of their own, so one caller's branch filter or parked sale never
//! leaks into another caller's requests.

use crate::apis;
use axum::{
	extract::{Path, Query, Request, State},
	http::{HeaderMap, HeaderValue, StatusCode},
	middleware::{self, Next},
	response::{IntoResponse, Json, Response},
	routing::{get, post, put},
	Router,
};
use laundry_config::ApiConfig;
use laundry_core::{LaundryEngine, SessionHandle};
use laundry_types::{
	APIError, FlowResponse, ListOrdersResponse, NewOrder, OrderView, PendingOperationResponse,
	ScopeResponse, SetBranchRequest, SetLaundryRequest, SubscriptionResponse, UserRole,
	UserSession,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

const USER_ID_HEADER: &str = "x-user-id";
const USER_ROLE_HEADER: &str = "x-user-role";
const LAUNDRY_ID_HEADER: &str = "x-laundry-id";
const BRANCH_ID_HEADER: &str = "x-branch-id";

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Engine serving every request.
	pub engine: Arc<LaundryEngine>,
	/// Upper bound for handling one request.
	pub timeout: Duration,
}

/// Query parameters of GET /api/orders.
#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
	pub status: Option<String>,
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<LaundryEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(&api_config, engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Laundry API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Builds the router with every endpoint nested under `/api`.
pub fn router(api_config: &ApiConfig, engine: Arc<LaundryEngine>) -> Router {
	let state = AppState {
		engine,
		timeout: Duration::from_secs(api_config.timeout_seconds),
	};

	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/flow", get(handle_get_flow))
				.route("/scope", get(handle_get_scope))
				.route("/scope/laundry", put(handle_set_laundry))
				.route("/scope/branch", put(handle_set_branch))
				.route("/orders", get(handle_list_orders).post(handle_create_order))
				.route("/orders/{id}/advance", post(handle_advance_order))
				.route("/orders/{id}/regress", post(handle_regress_order))
				.route("/subscription", get(handle_get_subscription))
				.route("/subscription/acknowledge", post(handle_acknowledge))
				.route("/subscription/dismiss", post(handle_dismiss)),
		)
		.layer(middleware::from_fn_with_state(state.clone(), request_timeout))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors_layer(api_config)),
		)
		.with_state(state)
}

fn cors_layer(api_config: &ApiConfig) -> CorsLayer {
	let origins: Vec<HeaderValue> = api_config
		.cors
		.as_ref()
		.map(|cors| {
			cors.allowed_origins
				.iter()
				.filter_map(|origin| match origin.parse::<HeaderValue>() {
					Ok(value) => Some(value),
					Err(_) => {
						tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
						None
					}
				})
				.collect()
		})
		.unwrap_or_default();

	if origins.is_empty() {
		CorsLayer::permissive()
	} else {
		CorsLayer::new()
			.allow_origin(origins)
			.allow_methods(Any)
			.allow_headers(Any)
	}
}

async fn request_timeout(State(state): State<AppState>, request: Request, next: Next) -> Response {
	match tokio::time::timeout(state.timeout, next.run(request)).await {
		Ok(response) => response,
		Err(_) => {
			tracing::warn!(timeout_seconds = state.timeout.as_secs(), "Request timed out");
			APIError::ServiceUnavailable {
				error_type: "TIMEOUT".to_string(),
				message: "The request took too long to complete".to_string(),
			}
			.into_response()
		}
	}
}

/// Reads the acting user from the request headers. `Ok(None)` means the
/// request carries no identity and the configured session applies.
fn session_from_headers(headers: &HeaderMap) -> Result<Option<UserSession>, APIError> {
	let header = |name: &str| -> Result<Option<String>, APIError> {
		match headers.get(name) {
			None => Ok(None),
			Some(value) => value
				.to_str()
				.map(|v| Some(v.trim().to_string()).filter(|v| !v.is_empty()))
				.map_err(|_| APIError::BadRequest {
					error_type: "INVALID_HEADER".to_string(),
					message: format!("Header '{}' is not valid text", name),
				}),
		}
	};

	let Some(user_id) = header(USER_ID_HEADER)? else {
		return Ok(None);
	};
	let role = header(USER_ROLE_HEADER)?.ok_or_else(|| APIError::BadRequest {
		error_type: "INVALID_HEADER".to_string(),
		message: format!("Header '{}' is required with '{}'", USER_ROLE_HEADER, USER_ID_HEADER),
	})?;
	let role: UserRole = role.parse().map_err(|e: String| APIError::BadRequest {
		error_type: "INVALID_HEADER".to_string(),
		message: e,
	})?;

	Ok(Some(UserSession {
		user_id,
		role,
		laundry_id: header(LAUNDRY_ID_HEADER)?,
		branch_id: header(BRANCH_ID_HEADER)?,
	}))
}

/// Opens the session of the request's acting user.
async fn act_as(state: &AppState, headers: &HeaderMap) -> Result<SessionHandle, APIError> {
	let user = match session_from_headers(headers)? {
		Some(user) => user,
		None => state.engine.config().session.clone(),
	};
	Ok(state.engine.session(user).await)
}

/// Handles GET /api/flow requests.
async fn handle_get_flow(State(state): State<AppState>) -> Json<FlowResponse> {
	Json(apis::flow::get_flow(&state.engine))
}

/// Handles GET /api/scope requests.
async fn handle_get_scope(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<ScopeResponse>, APIError> {
	let session = act_as(&state, &headers).await?;
	Ok(Json(apis::scope::get_scope(&session).await))
}

/// Handles PUT /api/scope/laundry requests.
async fn handle_set_laundry(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<SetLaundryRequest>,
) -> Result<Json<ScopeResponse>, APIError> {
	let session = act_as(&state, &headers).await?;
	apis::scope::set_laundry(&session, request)
		.await
		.map(Json)
}

/// Handles PUT /api/scope/branch requests.
async fn handle_set_branch(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<SetBranchRequest>,
) -> Result<Json<ScopeResponse>, APIError> {
	let session = act_as(&state, &headers).await?;
	apis::scope::set_branch(&session, request)
		.await
		.map(Json)
}

/// Handles GET /api/orders requests.
async fn handle_list_orders(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(params): Query<ListOrdersParams>,
) -> Result<Json<ListOrdersResponse>, APIError> {
	let session = act_as(&state, &headers).await?;
	apis::order::list_orders(&session, params.status)
		.await
		.map(Json)
}

/// Handles POST /api/orders requests.
///
/// Answers 201 when the order was recorded and 202 when it waits for the
/// subscription reminder to be acknowledged.
async fn handle_create_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(order): Json<NewOrder>,
) -> Result<Response, APIError> {
	let session = act_as(&state, &headers).await?;
	let (created, body) = apis::order::create_order(&session, order).await?;
	let status = if created {
		StatusCode::CREATED
	} else {
		StatusCode::ACCEPTED
	};
	Ok((status, Json(body)).into_response())
}

/// Handles POST /api/orders/{id}/advance requests.
async fn handle_advance_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<OrderView>, APIError> {
	let session = act_as(&state, &headers).await?;
	apis::order::advance_order(&session, &id)
		.await
		.map(Json)
}

/// Handles POST /api/orders/{id}/regress requests.
async fn handle_regress_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<OrderView>, APIError> {
	let session = act_as(&state, &headers).await?;
	apis::order::regress_order(&session, &id)
		.await
		.map(Json)
}

/// Handles GET /api/subscription requests.
async fn handle_get_subscription(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<SubscriptionResponse>, APIError> {
	let session = act_as(&state, &headers).await?;
	Ok(Json(apis::subscription::get_subscription(&session)))
}

/// Handles POST /api/subscription/acknowledge requests.
async fn handle_acknowledge(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<PendingOperationResponse>, APIError> {
	let session = act_as(&state, &headers).await?;
	Ok(Json(apis::subscription::acknowledge(&session)))
}

/// Handles POST /api/subscription/dismiss requests.
async fn handle_dismiss(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<PendingOperationResponse>, APIError> {
	let session = act_as(&state, &headers).await?;
	Ok(Json(apis::subscription::dismiss(&session)))
}
