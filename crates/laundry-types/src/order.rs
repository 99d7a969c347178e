//! Order types for the laundry operations system.
//!
//! An order belongs to exactly one laundry and one branch, owns its items, and
//! carries a data-driven status (see [`crate::OrderStatus`]).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::OrderStatus;

/// Customer reference attached to an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
	pub name: String,
	pub phone: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
}

/// How an item is priced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
	/// Priced per kilogram.
	Weight,
	/// Priced per piece.
	Piece,
}

/// A line of an order. Owned by its order, no independent lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
	pub id: String,
	pub name: String,
	#[serde(rename = "type")]
	pub item_type: ItemType,
	pub quantity: Decimal,
	pub unit_price: Decimal,
	/// Free-text tags such as "ironing" or "express".
	#[serde(default)]
	pub extras: Vec<String>,
}

impl OrderItem {
	/// `None` when the line amount overflows.
	pub fn line_total(&self) -> Option<Decimal> {
		self.quantity.checked_mul(self.unit_price)
	}
}

/// A laundry order with its current position in the status flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// Human facing ticket code printed on the receipt.
	pub ticket_code: String,
	/// Laundry (tenant) owning this order.
	pub laundry_id: String,
	/// Branch the order was taken at.
	pub branch_id: String,
	pub customer: Customer,
	#[serde(default)]
	pub items: Vec<OrderItem>,
	/// Key of the operation step the order is currently in.
	pub status: OrderStatus,
	pub total_amount: Decimal,
	pub paid_amount: Decimal,
	/// Whether the order is delivered to the customer instead of picked up.
	#[serde(default)]
	pub is_delivery: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub delivery_slot: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub driver_id: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub estimated_ready_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub delivered_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

impl Order {
	pub fn is_paid(&self) -> bool {
		self.paid_amount >= self.total_amount
	}

	/// Amount still owed, never negative.
	pub fn balance_due(&self) -> Decimal {
		(self.total_amount - self.paid_amount).max(Decimal::ZERO)
	}
}

/// Item payload used when creating an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewOrderItem {
	pub name: String,
	#[serde(rename = "type")]
	pub item_type: ItemType,
	pub quantity: Decimal,
	pub unit_price: Decimal,
	#[serde(default)]
	pub extras: Vec<String>,
}

/// Payload for creating an order at the counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewOrder {
	pub laundry_id: String,
	pub branch_id: String,
	pub customer: Customer,
	pub items: Vec<NewOrderItem>,
	/// Overrides the total computed from the items.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub total_amount: Option<Decimal>,
	#[serde(default)]
	pub paid_amount: Decimal,
	#[serde(default)]
	pub is_delivery: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub delivery_slot: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub estimated_ready_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

impl NewOrderItem {
	/// `None` when the line amount overflows.
	pub fn line_total(&self) -> Option<Decimal> {
		self.quantity.checked_mul(self.unit_price)
	}
}

impl NewOrder {
	/// Total to charge: the explicit override or the sum of the item lines.
	/// `None` when the item lines overflow.
	pub fn total(&self) -> Option<Decimal> {
		if let Some(total) = self.total_amount {
			return Some(total);
		}
		self.items.iter().try_fold(Decimal::ZERO, |total, item| {
			total.checked_add(item.line_total()?)
		})
	}
}

/// Status change written to the order store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
	pub status: OrderStatus,
	/// Set when the order reaches the last step of the flow and cleared
	/// when it leaves it.
	pub delivered_at: Option<DateTime<Utc>>,
}

/// Scoped read request against the order store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQuery {
	pub laundry_id: String,
	/// `None` means every branch of the laundry.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub branch_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<OrderStatus>,
}

impl OrderQuery {
	/// Returns true if the order falls inside this query's scope.
	pub fn matches(&self, order: &Order) -> bool {
		order.laundry_id == self.laundry_id
			&& self
				.branch_id
				.as_ref()
				.is_none_or(|branch| &order.branch_id == branch)
			&& self.status.as_ref().is_none_or(|status| &order.status == status)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal::Decimal;

	fn order(total: i64, paid: i64) -> Order {
		Order {
			id: "o-1".into(),
			ticket_code: "A-0001".into(),
			laundry_id: "l-1".into(),
			branch_id: "b-1".into(),
			customer: Customer {
				name: "Ana".into(),
				phone: "555-0100".into(),
				address: None,
			},
			items: vec![],
			status: OrderStatus::from("pending_pickup"),
			total_amount: Decimal::new(total, 0),
			paid_amount: Decimal::new(paid, 0),
			is_delivery: false,
			delivery_slot: None,
			driver_id: None,
			created_at: Utc::now(),
			updated_at: Utc::now(),
			estimated_ready_at: None,
			delivered_at: None,
			notes: None,
		}
	}

	#[test]
	fn test_is_paid_and_balance() {
		assert!(order(100, 100).is_paid());
		assert!(order(100, 120).is_paid());
		assert!(!order(100, 40).is_paid());
		assert_eq!(order(100, 40).balance_due(), Decimal::new(60, 0));
		assert_eq!(order(100, 120).balance_due(), Decimal::ZERO);
	}

	#[test]
	fn test_new_order_total_from_items() {
		let new_order = NewOrder {
			laundry_id: "l-1".into(),
			branch_id: "b-1".into(),
			customer: Customer {
				name: "Ana".into(),
				phone: "555-0100".into(),
				address: None,
			},
			items: vec![
				NewOrderItem {
					name: "Shirts".into(),
					item_type: ItemType::Piece,
					quantity: Decimal::new(3, 0),
					unit_price: Decimal::new(250, 2),
					extras: vec![],
				},
				NewOrderItem {
					name: "Mixed load".into(),
					item_type: ItemType::Weight,
					quantity: Decimal::new(45, 1),
					unit_price: Decimal::new(2, 0),
					extras: vec!["express".into()],
				},
			],
			total_amount: None,
			paid_amount: Decimal::ZERO,
			is_delivery: false,
			delivery_slot: None,
			estimated_ready_at: None,
			notes: None,
		};
		// 3 * 2.50 + 4.5 * 2
		assert_eq!(new_order.total(), Some(Decimal::new(1650, 2)));
	}

	#[test]
	fn test_new_order_total_overflow() {
		let item = |quantity: Decimal, unit_price: Decimal| NewOrderItem {
			name: "Bulk".into(),
			item_type: ItemType::Weight,
			quantity,
			unit_price,
			extras: vec![],
		};
		let mut new_order = NewOrder {
			laundry_id: "l-1".into(),
			branch_id: "b-1".into(),
			customer: Customer {
				name: "Ana".into(),
				phone: "555-0100".into(),
				address: None,
			},
			items: vec![item(Decimal::MAX, Decimal::new(2, 0))],
			total_amount: None,
			paid_amount: Decimal::ZERO,
			is_delivery: false,
			delivery_slot: None,
			estimated_ready_at: None,
			notes: None,
		};
		assert_eq!(new_order.total(), None);

		// Each line fits, the sum does not
		new_order.items = vec![
			item(Decimal::MAX, Decimal::ONE),
			item(Decimal::MAX, Decimal::ONE),
		];
		assert_eq!(new_order.items[0].line_total(), Some(Decimal::MAX));
		assert_eq!(new_order.total(), None);

		new_order.total_amount = Some(Decimal::new(100, 0));
		assert_eq!(new_order.total(), Some(Decimal::new(100, 0)));
	}

	#[test]
	fn test_query_scope_matching() {
		let o = order(10, 0);
		let all = OrderQuery {
			laundry_id: "l-1".into(),
			branch_id: None,
			status: None,
		};
		assert!(all.matches(&o));

		let other_branch = OrderQuery {
			branch_id: Some("b-2".into()),
			..all.clone()
		};
		assert!(!other_branch.matches(&o));

		let other_laundry = OrderQuery {
			laundry_id: "l-2".into(),
			..all
		};
		assert!(!other_laundry.matches(&o));
	}
}
