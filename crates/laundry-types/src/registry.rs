//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Every pluggable implementation (storage, backend, notification channel)
/// exposes a `Registry` type declaring the name it is configured under and the
/// factory that builds it from its TOML table.
pub trait ImplementationRegistry {
	/// Name of the implementation table, e.g. `memory` for
	/// `[storage.implementations.memory]`.
	const NAME: &'static str;

	/// Factory function type of the owning module.
	type Factory;

	fn factory() -> Self::Factory;
}
