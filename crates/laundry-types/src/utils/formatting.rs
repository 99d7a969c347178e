//! Display helpers for log output.

/// Shortens an identifier to its first 8 characters for log fields.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((end, _)) => format!("{}..", &id[..end]),
		None => id.to_string(),
	}
}
