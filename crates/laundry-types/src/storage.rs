//! Keys for locally persisted preferences.

use std::str::FromStr;

/// Namespaces used in the local preference store.
///
/// A stored entry is addressed by a namespace and an id; for per-laundry
/// preferences the id is the laundry id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
	/// Last branch selected by an owner/admin, one entry per laundry.
	BranchSelection,
	/// Last laundry an owner switched to, one entry per user.
	LaundrySelection,
}

impl PreferenceKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			PreferenceKey::BranchSelection => "branch_selection",
			PreferenceKey::LaundrySelection => "laundry_selection",
		}
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[Self::BranchSelection, Self::LaundrySelection].into_iter()
	}
}

impl FromStr for PreferenceKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"branch_selection" => Ok(Self::BranchSelection),
			"laundry_selection" => Ok(Self::LaundrySelection),
			_ => Err(()),
		}
	}
}

impl From<PreferenceKey> for &'static str {
	fn from(key: PreferenceKey) -> Self {
		key.as_str()
	}
}
