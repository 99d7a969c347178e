//! Tenant types: laundries, their branches, and the user session that decides
//! which of them a request is scoped to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A laundry business (tenant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Laundry {
	pub id: String,
	pub name: String,
	#[serde(default = "default_true")]
	pub is_active: bool,
}

/// A physical branch of a laundry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Branch {
	pub id: String,
	pub laundry_id: String,
	/// Short code printed on tickets, e.g. "CTR".
	pub code: String,
	pub name: String,
	#[serde(default)]
	pub is_main: bool,
	#[serde(default = "default_true")]
	pub is_active: bool,
}

fn default_true() -> bool {
	true
}

/// Role of the authenticated user inside their laundry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
	Owner,
	Admin,
	Operator,
	Cashier,
	Driver,
}

impl UserRole {
	/// Owners and admins pick their laundry/branch; everyone else works inside
	/// the branch they are assigned to.
	pub fn can_switch_scope(&self) -> bool {
		matches!(self, UserRole::Owner | UserRole::Admin)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			UserRole::Owner => "owner",
			UserRole::Admin => "admin",
			UserRole::Operator => "operator",
			UserRole::Cashier => "cashier",
			UserRole::Driver => "driver",
		}
	}
}

impl fmt::Display for UserRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for UserRole {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"owner" => Ok(Self::Owner),
			"admin" => Ok(Self::Admin),
			"operator" => Ok(Self::Operator),
			"cashier" | "counter" => Ok(Self::Cashier),
			"driver" => Ok(Self::Driver),
			other => Err(format!("unknown role '{}'", other)),
		}
	}
}

/// Identity handed over by the external authentication layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSession {
	pub user_id: String,
	pub role: UserRole,
	/// Laundry from the user's profile, if the auth layer already knows it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub laundry_id: Option<String>,
	/// Branch assignment for roles bound to a single branch.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub branch_id: Option<String>,
}

/// The (laundry, branch) pair that filters every order query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantScope {
	/// Resolved laundry, `None` while unresolved.
	pub laundry_id: Option<String>,
	/// `None` means "all branches" (no branch filter).
	pub selected_branch_id: Option<String>,
}

impl TenantScope {
	pub fn is_resolved(&self) -> bool {
		self.laundry_id.is_some()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_role_gating() {
		assert!(UserRole::Owner.can_switch_scope());
		assert!(UserRole::Admin.can_switch_scope());
		assert!(!UserRole::Operator.can_switch_scope());
		assert!(!UserRole::Cashier.can_switch_scope());
		assert!(!UserRole::Driver.can_switch_scope());
	}

	#[test]
	fn test_role_parsing() {
		assert_eq!("Admin".parse::<UserRole>().unwrap(), UserRole::Admin);
		assert_eq!("counter".parse::<UserRole>().unwrap(), UserRole::Cashier);
		assert!("janitor".parse::<UserRole>().is_err());
	}
}
