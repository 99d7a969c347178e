//! Lifecycle management for the laundry engine.
//!
//! Initialization loads the flow, resolves the configured session and takes
//! its first subscription snapshot. None of these steps fail startup: each
//! one degrades to its documented fallback and logs the cause.

use super::{EngineError, LaundryEngine};

impl LaundryEngine {
	/// Performs the initial loads before running.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		tracing::info!(service_id = %self.config.service.id, "Initializing laundry engine");

		if let Err(e) = self.reload_flow().await {
			tracing::warn!(error = %e, "Starting with an empty flow, statuses render as raw keys");
		}

		let session = self.default_session().await;
		if session.gate().snapshot().is_none() {
			tracing::info!("No subscription snapshot yet, sales are allowed");
		}

		Ok(())
	}

	/// Performs cleanup operations.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down laundry engine");

		let dropped = self
			.contexts()
			.iter()
			.filter(|context| context.gate.dismiss())
			.count();
		if dropped > 0 {
			tracing::warn!(dropped, "Dropped sales that were awaiting subscription acknowledgement");
		}

		Ok(())
	}
}
