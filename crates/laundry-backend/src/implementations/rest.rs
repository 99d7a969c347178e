//! PostgREST client for the hosted platform.
//!
//! Tables are read and written through `/rest/v1/<table>` with PostgREST
//! filter syntax (`column=eq.value`), and the subscription check is the
//! `check_subscription_status` RPC. Row level security on the platform side
//! decides what the configured token may see.

use crate::{
	BackendError, BackendFactory, BackendRegistry, BackendService, BranchDirectory, OrderStore,
	StepSource, SubscriptionService,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use laundry_types::{
	Branch, Customer, ImplementationRegistry, Laundry, NewOrder, OperationStep, Order, OrderItem,
	OrderQuery, OrderStatus, StatusUpdate, SubscriptionCheckResult, SubscriptionStatus,
};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RestBackendConfig {
	base_url: String,
	api_key: String,
	/// User access token; the anon key is sent when absent.
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default = "default_timeout_seconds")]
	timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
	30
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
	laundry_id: Option<String>,
}

/// Row returned by `check_subscription_status`.
#[derive(Debug, Deserialize)]
struct SubscriptionRow {
	can_operate: bool,
	is_in_grace_period: bool,
	days_until_suspension: i64,
	status: SubscriptionStatus,
	#[serde(default)]
	message: Option<String>,
}

impl From<SubscriptionRow> for SubscriptionCheckResult {
	fn from(row: SubscriptionRow) -> Self {
		SubscriptionCheckResult {
			can_operate: row.can_operate,
			is_in_grace_period: row.is_in_grace_period,
			days_until_suspension: row.days_until_suspension,
			status: row.status,
			message: row.message.unwrap_or_default(),
		}
	}
}

/// Insert payload for the `orders` table. Ids and ticket codes are assigned
/// by the database.
#[derive(Debug, Serialize)]
struct OrderInsert {
	laundry_id: String,
	branch_id: String,
	customer: Customer,
	items: Vec<OrderItem>,
	status: OrderStatus,
	total_amount: Decimal,
	paid_amount: Decimal,
	is_delivery: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	delivery_slot: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	estimated_ready_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusPatch {
	status: OrderStatus,
	/// Sent as `null` to clear the column.
	delivered_at: Option<DateTime<Utc>>,
	updated_at: DateTime<Utc>,
}

pub struct RestBackend {
	client: reqwest::Client,
	base_url: String,
	api_key: String,
	bearer: String,
}

impl RestBackend {
	pub fn new(
		base_url: impl Into<String>,
		api_key: impl Into<String>,
		access_token: Option<String>,
		timeout: Duration,
	) -> Result<Self, BackendError> {
		let api_key = api_key.into();
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.pool_idle_timeout(Duration::from_secs(90))
			.build()
			.map_err(|e| BackendError::Configuration(e.to_string()))?;

		Ok(Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
			bearer: access_token.unwrap_or_else(|| api_key.clone()),
			api_key,
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}/rest/v1/{}", self.base_url, path)
	}

	fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
		self.client
			.request(method, self.url(path))
			.header("apikey", &self.api_key)
			.bearer_auth(&self.bearer)
	}

	async fn send<T: DeserializeOwned>(
		&self,
		request: reqwest::RequestBuilder,
	) -> Result<T, BackendError> {
		let response = request
			.send()
			.await
			.map_err(|e| BackendError::Connection(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			return Err(BackendError::Http {
				status: status.as_u16(),
				message,
			});
		}

		response
			.json::<T>()
			.await
			.map_err(|e| BackendError::Parse(e.to_string()))
	}

	async fn fetch_rows<T: DeserializeOwned>(
		&self,
		table: &str,
		filters: &[(&str, String)],
	) -> Result<Vec<T>, BackendError> {
		let request = self
			.request(reqwest::Method::GET, table)
			.query(&[("select", "*")])
			.query(filters);
		self.send(request).await
	}
}

fn eq(value: &str) -> String {
	format!("eq.{}", value)
}

#[async_trait]
impl StepSource for RestBackend {
	async fn operation_steps(&self) -> Result<Vec<OperationStep>, BackendError> {
		self.fetch_rows("operation_steps", &[("order", "order.asc".to_string())])
			.await
	}
}

#[async_trait]
impl BranchDirectory for RestBackend {
	async fn laundry_for_user(&self, user_id: &str) -> Result<Option<String>, BackendError> {
		let rows: Vec<ProfileRow> = self
			.fetch_rows("profiles", &[("id", eq(user_id)), ("limit", "1".to_string())])
			.await?;
		Ok(rows.into_iter().next().and_then(|row| row.laundry_id))
	}

	async fn laundries(&self) -> Result<Vec<Laundry>, BackendError> {
		self.fetch_rows(
			"laundries",
			&[
				("is_active", "eq.true".to_string()),
				("order", "name.asc".to_string()),
			],
		)
		.await
	}

	async fn active_branches(&self, laundry_id: &str) -> Result<Vec<Branch>, BackendError> {
		self.fetch_rows(
			"branches",
			&[
				("laundry_id", eq(laundry_id)),
				("is_active", "eq.true".to_string()),
				("order", "is_main.desc,name.asc".to_string()),
			],
		)
		.await
	}

	async fn branch(&self, branch_id: &str) -> Result<Option<Branch>, BackendError> {
		let rows: Vec<Branch> = self.fetch_rows("branches", &[("id", eq(branch_id))]).await?;
		Ok(rows.into_iter().next())
	}
}

#[async_trait]
impl OrderStore for RestBackend {
	async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, BackendError> {
		let mut filters = vec![("laundry_id", eq(&query.laundry_id))];
		if let Some(branch_id) = &query.branch_id {
			filters.push(("branch_id", eq(branch_id)));
		}
		if let Some(status) = &query.status {
			filters.push(("status", eq(status.as_str())));
		}
		filters.push(("order", "created_at.desc".to_string()));

		self.fetch_rows("orders", &filters).await
	}

	async fn get_order(&self, order_id: &str) -> Result<Option<Order>, BackendError> {
		let rows: Vec<Order> = self.fetch_rows("orders", &[("id", eq(order_id))]).await?;
		Ok(rows.into_iter().next())
	}

	async fn create_order(
		&self,
		order: NewOrder,
		status: OrderStatus,
	) -> Result<Order, BackendError> {
		let total_amount = order
			.total()
			.ok_or_else(|| BackendError::Rejected("order total is out of range".into()))?;
		let insert = OrderInsert {
			laundry_id: order.laundry_id,
			branch_id: order.branch_id,
			customer: order.customer,
			items: order
				.items
				.into_iter()
				.map(|item| OrderItem {
					id: uuid::Uuid::new_v4().to_string(),
					name: item.name,
					item_type: item.item_type,
					quantity: item.quantity,
					unit_price: item.unit_price,
					extras: item.extras,
				})
				.collect(),
			status,
			total_amount,
			paid_amount: order.paid_amount,
			is_delivery: order.is_delivery,
			delivery_slot: order.delivery_slot,
			estimated_ready_at: order.estimated_ready_at,
			notes: order.notes,
		};

		let request = self
			.request(reqwest::Method::POST, "orders")
			.header("Prefer", "return=representation")
			.json(&insert);
		let rows: Vec<Order> = self.send(request).await?;
		rows.into_iter()
			.next()
			.ok_or_else(|| BackendError::Parse("insert returned no rows".into()))
	}

	async fn update_status(
		&self,
		order_id: &str,
		update: StatusUpdate,
	) -> Result<Order, BackendError> {
		let patch = StatusPatch {
			status: update.status,
			delivered_at: update.delivered_at,
			updated_at: Utc::now(),
		};
		let request = self
			.request(reqwest::Method::PATCH, "orders")
			.query(&[("id", eq(order_id))])
			.header("Prefer", "return=representation")
			.json(&patch);
		let rows: Vec<Order> = self.send(request).await?;
		rows.into_iter()
			.next()
			.ok_or_else(|| BackendError::NotFound(format!("order {}", order_id)))
	}
}

#[async_trait]
impl SubscriptionService for RestBackend {
	async fn check(&self, branch_id: &str) -> Result<SubscriptionCheckResult, BackendError> {
		let request = self
			.request(reqwest::Method::POST, "rpc/check_subscription_status")
			.json(&serde_json::json!({ "p_branch_id": branch_id }));
		let rows: Vec<SubscriptionRow> = self.send(request).await?;
		rows.into_iter()
			.next()
			.map(SubscriptionCheckResult::from)
			.ok_or_else(|| BackendError::NotFound(format!("subscription for branch {}", branch_id)))
	}
}

/// Factory function to create the REST backend from configuration.
///
/// Configuration parameters:
/// - `base_url`: platform URL, e.g. "https://project.example.co" (required)
/// - `api_key`: anon key sent as `apikey` (required)
/// - `access_token`: bearer token of the signed-in user (optional)
/// - `timeout_seconds`: request timeout (default: 30)
pub fn create_backend(config: &toml::Value) -> Result<BackendService, BackendError> {
	let config: RestBackendConfig = config
		.clone()
		.try_into()
		.map_err(|e: toml::de::Error| BackendError::Configuration(e.to_string()))?;

	if config.timeout_seconds == 0 {
		return Err(BackendError::Configuration(
			"timeout_seconds must be greater than zero".into(),
		));
	}

	let backend = RestBackend::new(
		config.base_url,
		config.api_key,
		config.access_token,
		Duration::from_secs(config.timeout_seconds),
	)?;
	Ok(BackendService::from_shared(Arc::new(backend)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "rest";
	type Factory = BackendFactory;

	fn factory() -> Self::Factory {
		create_backend
	}
}

impl BackendRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use laundry_types::{ItemType, NewOrderItem};
	use serde_json::json;
	use wiremock::matchers::{body_partial_json, header, method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn backend(server: &MockServer) -> RestBackend {
		RestBackend::new(
			server.uri(),
			"anon-key",
			Some("user-token".into()),
			Duration::from_secs(5),
		)
		.unwrap()
	}

	fn order_row(id: &str, status: &str) -> serde_json::Value {
		json!({
			"id": id,
			"ticket_code": "CTR-0042",
			"laundry_id": "l-1",
			"branch_id": "b-centro",
			"customer": { "name": "Ana", "phone": "555-0100" },
			"items": [],
			"status": status,
			"total_amount": "12.50",
			"paid_amount": "0",
			"is_delivery": false,
			"created_at": "2026-03-01T10:00:00Z",
			"updated_at": "2026-03-01T10:00:00Z"
		})
	}

	#[tokio::test]
	async fn test_operation_steps_sends_auth_headers() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/rest/v1/operation_steps"))
			.and(header("apikey", "anon-key"))
			.and(header("authorization", "Bearer user-token"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!([
				{ "key": "received", "name": "Received", "color": "slate-500", "icon": "inbox", "is_active": true, "order": 1 },
				{ "key": "ironing", "name": "Ironing", "color": "amber-400", "icon": "shirt", "is_active": false, "order": 3 }
			])))
			.mount(&server)
			.await;

		let steps = backend(&server).operation_steps().await.unwrap();
		assert_eq!(steps.len(), 2);
		assert!(!steps[1].is_active);
	}

	#[tokio::test]
	async fn test_active_branches_query() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/rest/v1/branches"))
			.and(query_param("laundry_id", "eq.l-1"))
			.and(query_param("is_active", "eq.true"))
			.and(query_param("order", "is_main.desc,name.asc"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!([
				{ "id": "b-centro", "laundry_id": "l-1", "code": "CTR", "name": "Centro", "is_main": true, "is_active": true }
			])))
			.mount(&server)
			.await;

		let branches = backend(&server).active_branches("l-1").await.unwrap();
		assert_eq!(branches.len(), 1);
		assert!(branches[0].is_main);
	}

	#[tokio::test]
	async fn test_list_orders_applies_scope_filters() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/rest/v1/orders"))
			.and(query_param("laundry_id", "eq.l-1"))
			.and(query_param("branch_id", "eq.b-centro"))
			.and(query_param("order", "created_at.desc"))
			.respond_with(
				ResponseTemplate::new(200).set_body_json(json!([order_row("o-1", "washing")])),
			)
			.mount(&server)
			.await;

		let orders = backend(&server)
			.list_orders(&OrderQuery {
				laundry_id: "l-1".into(),
				branch_id: Some("b-centro".into()),
				status: None,
			})
			.await
			.unwrap();
		assert_eq!(orders.len(), 1);
		assert_eq!(orders[0].status.as_str(), "washing");
		assert_eq!(orders[0].total_amount, Decimal::new(1250, 2));
	}

	#[tokio::test]
	async fn test_create_order_returns_representation() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/rest/v1/orders"))
			.and(header("prefer", "return=representation"))
			.and(body_partial_json(json!({ "status": "received", "branch_id": "b-centro" })))
			.respond_with(
				ResponseTemplate::new(201).set_body_json(json!([order_row("o-9", "received")])),
			)
			.mount(&server)
			.await;

		let order = backend(&server)
			.create_order(
				NewOrder {
					laundry_id: "l-1".into(),
					branch_id: "b-centro".into(),
					customer: Customer {
						name: "Ana".into(),
						phone: "555-0100".into(),
						address: None,
					},
					items: vec![NewOrderItem {
						name: "Bedding".into(),
						item_type: ItemType::Weight,
						quantity: Decimal::new(5, 0),
						unit_price: Decimal::new(250, 2),
						extras: vec![],
					}],
					total_amount: None,
					paid_amount: Decimal::ZERO,
					is_delivery: false,
					delivery_slot: None,
					estimated_ready_at: None,
					notes: None,
				},
				OrderStatus::from("received"),
			)
			.await
			.unwrap();
		assert_eq!(order.id, "o-9");
	}

	#[tokio::test]
	async fn test_update_status_clears_delivery_time() {
		let server = MockServer::start().await;
		Mock::given(method("PATCH"))
			.and(path("/rest/v1/orders"))
			.and(query_param("id", "eq.o-1"))
			.and(body_partial_json(json!({ "status": "washing", "delivered_at": null })))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!([order_row("o-1", "washing")])))
			.mount(&server)
			.await;

		let updated = backend(&server)
			.update_status(
				"o-1",
				StatusUpdate {
					status: OrderStatus::from("washing"),
					delivered_at: None,
				},
			)
			.await
			.unwrap();
		assert_eq!(updated.status.as_str(), "washing");
		assert_eq!(updated.delivered_at, None);
	}

	#[tokio::test]
	async fn test_update_status_on_missing_order() {
		let server = MockServer::start().await;
		Mock::given(method("PATCH"))
			.and(path("/rest/v1/orders"))
			.and(query_param("id", "eq.o-404"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
			.mount(&server)
			.await;

		let result = backend(&server)
			.update_status(
				"o-404",
				StatusUpdate {
					status: OrderStatus::from("washing"),
					delivered_at: None,
				},
			)
			.await;
		assert!(matches!(result, Err(BackendError::NotFound(_))));
	}

	#[tokio::test]
	async fn test_subscription_rpc() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/rest/v1/rpc/check_subscription_status"))
			.and(body_partial_json(json!({ "p_branch_id": "b-centro" })))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!([{
				"can_operate": false,
				"is_in_grace_period": false,
				"days_until_suspension": -2,
				"status": "suspended",
				"message": null
			}])))
			.mount(&server)
			.await;

		let result = backend(&server).check("b-centro").await.unwrap();
		assert_eq!(result.status, SubscriptionStatus::Suspended);
		assert!(!result.can_operate);
		assert_eq!(result.message, "");
	}

	#[tokio::test]
	async fn test_http_error_is_reported() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/rest/v1/laundries"))
			.respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
			.mount(&server)
			.await;

		let result = backend(&server).laundries().await;
		match result {
			Err(BackendError::Http { status, message }) => {
				assert_eq!(status, 401);
				assert_eq!(message, "JWT expired");
			}
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn test_factory_requires_base_url() {
		let config: toml::Value = toml::from_str("api_key = \"k\"").unwrap();
		assert!(matches!(
			create_backend(&config),
			Err(BackendError::Configuration(_))
		));

		let config: toml::Value =
			toml::from_str("base_url = \"http://localhost:54321\"\napi_key = \"k\"").unwrap();
		assert!(create_backend(&config).is_ok());
	}
}
