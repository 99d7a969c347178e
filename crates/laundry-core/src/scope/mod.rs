//! Tenant scope resolution.
//!
//! The resolver owns the active laundry, its loaded branch list and the
//! selected branch filter for one session. Every order query is built from
//! it. Loading failures never surface as errors: the scope degrades to an
//! empty branch list with no selection and the failure is logged.
//!
//! Owners and admins may switch laundries and branches; their last branch
//! selection is remembered per laundry in local preference storage. Other
//! roles are pinned to the branch they are assigned to.

use crate::engine::event_bus::EventBus;
use laundry_backend::BranchDirectory;
use laundry_storage::StorageService;
use laundry_types::{
	Branch, LaundryEvent, OrderQuery, PreferenceKey, ScopeEvent, TenantScope, UserSession,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors returned by explicit scope changes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
	#[error("Role '{0}' cannot change the active scope")]
	NotPermitted(String),
	#[error("No laundry is active")]
	NoLaundry,
	#[error("Branch '{0}' is not an active branch of the current laundry")]
	UnknownBranch(String),
	#[error("Laundry '{0}' is not available")]
	UnknownLaundry(String),
}

#[derive(Debug, Default)]
struct ScopeState {
	session: Option<UserSession>,
	scope: TenantScope,
	branches: Vec<Branch>,
}

pub struct TenantScopeResolver {
	directory: Arc<dyn BranchDirectory>,
	storage: Arc<StorageService>,
	event_bus: EventBus,
	state: RwLock<ScopeState>,
	/// Bumped on every laundry load; a load finishing after a newer one
	/// started is discarded.
	generation: AtomicU64,
}

impl TenantScopeResolver {
	pub fn new(
		directory: Arc<dyn BranchDirectory>,
		storage: Arc<StorageService>,
		event_bus: EventBus,
	) -> Self {
		Self {
			directory,
			storage,
			event_bus,
			state: RwLock::new(ScopeState::default()),
			generation: AtomicU64::new(0),
		}
	}

	/// Resolves the scope for a session. Called whenever a session context
	/// sees a different session.
	pub async fn resolve_session(&self, session: UserSession) {
		tracing::info!(
			user = %session.user_id,
			role = %session.role,
			"Resolving tenant scope"
		);

		if session.role.can_switch_scope() {
			let laundry_id = self.default_laundry(&session).await;
			{
				let mut state = self.state.write().await;
				*state = ScopeState {
					session: Some(session),
					..ScopeState::default()
				};
			}
			match laundry_id {
				Some(laundry_id) => self.load_laundry(&laundry_id).await,
				None => tracing::warn!("No laundry found for session, scope left empty"),
			}
		} else {
			self.pin_to_branch(session).await;
		}
	}

	/// Switches the active laundry and reloads its branches.
	pub async fn switch_laundry(&self, laundry_id: &str) -> Result<(), ScopeError> {
		let user_id = {
			let state = self.state.read().await;
			let session = state.session.as_ref().ok_or(ScopeError::NoLaundry)?;
			if !session.role.can_switch_scope() {
				return Err(ScopeError::NotPermitted(session.role.to_string()));
			}
			session.user_id.clone()
		};

		match self.directory.laundries().await {
			Ok(laundries) if !laundries.iter().any(|l| l.id == laundry_id) => {
				return Err(ScopeError::UnknownLaundry(laundry_id.to_string()));
			}
			Ok(_) => {}
			Err(e) => {
				tracing::warn!(laundry_id = %laundry_id, error = %e, "Could not verify laundry");
			}
		}

		if let Err(e) = self
			.storage
			.store(
				PreferenceKey::LaundrySelection.as_str(),
				&user_id,
				&laundry_id.to_string(),
			)
			.await
		{
			tracing::warn!(error = %e, "Failed to persist laundry selection");
		}

		self.load_laundry(laundry_id).await;
		Ok(())
	}

	/// Sets the branch filter; `None` selects all branches.
	pub async fn set_branch(&self, branch_id: Option<String>) -> Result<(), ScopeError> {
		let laundry_id = {
			let mut state = self.state.write().await;
			let role = state
				.session
				.as_ref()
				.map(|s| s.role)
				.ok_or(ScopeError::NoLaundry)?;
			if !role.can_switch_scope() {
				return Err(ScopeError::NotPermitted(role.to_string()));
			}
			let laundry_id = state.scope.laundry_id.clone().ok_or(ScopeError::NoLaundry)?;
			if let Some(id) = &branch_id {
				if !state.branches.iter().any(|b| &b.id == id) {
					return Err(ScopeError::UnknownBranch(id.clone()));
				}
			}
			state.scope.selected_branch_id = branch_id.clone();
			laundry_id
		};

		let namespace = PreferenceKey::BranchSelection.as_str();
		let persisted = match &branch_id {
			Some(id) => self.storage.store(namespace, &laundry_id, id).await,
			None => self.storage.remove(namespace, &laundry_id).await,
		};
		if let Err(e) = persisted {
			tracing::warn!(laundry_id = %laundry_id, error = %e, "Failed to persist branch selection");
		}

		tracing::info!(
			laundry_id = %laundry_id,
			branch_id = branch_id.as_deref().unwrap_or("all"),
			"Branch selection changed"
		);
		self.event_bus
			.publish(LaundryEvent::Scope(ScopeEvent::BranchChanged {
				laundry_id,
				branch_id,
			}))
			.ok();
		Ok(())
	}

	pub async fn session(&self) -> Option<UserSession> {
		self.state.read().await.session.clone()
	}

	pub async fn scope(&self) -> TenantScope {
		self.state.read().await.scope.clone()
	}

	pub async fn branches(&self) -> Vec<Branch> {
		self.state.read().await.branches.clone()
	}

	pub async fn can_switch(&self) -> bool {
		self.state
			.read()
			.await
			.session
			.as_ref()
			.is_some_and(|s| s.role.can_switch_scope())
	}

	/// The first main branch of the loaded list.
	pub async fn main_branch(&self) -> Option<Branch> {
		self.state
			.read()
			.await
			.branches
			.iter()
			.find(|b| b.is_main)
			.cloned()
	}

	/// Branch whose subscription governs sales: the selected branch, else the
	/// main branch, else the first loaded branch.
	pub async fn billing_branch_id(&self) -> Option<String> {
		let state = self.state.read().await;
		state.scope.selected_branch_id.clone().or_else(|| {
			state
				.branches
				.iter()
				.find(|b| b.is_main)
				.or_else(|| state.branches.first())
				.map(|b| b.id.clone())
		})
	}

	/// Order query for the current scope, `None` until a laundry is active.
	pub async fn order_query(&self) -> Option<OrderQuery> {
		let state = self.state.read().await;
		state.scope.laundry_id.as_ref().map(|laundry_id| OrderQuery {
			laundry_id: laundry_id.clone(),
			branch_id: state.scope.selected_branch_id.clone(),
			status: None,
		})
	}

	/// Laundry for a switching role: the session's own, then the last one the
	/// user picked if still available, then the directory's answer.
	async fn default_laundry(&self, session: &UserSession) -> Option<String> {
		if let Some(id) = &session.laundry_id {
			return Some(id.clone());
		}

		let remembered = self
			.storage
			.retrieve_optional::<String>(
				PreferenceKey::LaundrySelection.as_str(),
				&session.user_id,
			)
			.await
			.unwrap_or_else(|e| {
				tracing::warn!(error = %e, "Failed to read laundry selection");
				None
			});
		if let Some(id) = remembered {
			match self.directory.laundries().await {
				Ok(laundries) if laundries.iter().any(|l| l.id == id) => return Some(id),
				Ok(_) => tracing::debug!(laundry_id = %id, "Remembered laundry no longer available"),
				Err(e) => tracing::warn!(error = %e, "Failed to list laundries"),
			}
		}

		match self.directory.laundry_for_user(&session.user_id).await {
			Ok(found) => found,
			Err(e) => {
				tracing::warn!(user = %session.user_id, error = %e, "Failed to look up user laundry");
				None
			}
		}
	}

	async fn pin_to_branch(&self, session: UserSession) {
		self.generation.fetch_add(1, Ordering::SeqCst);

		let Some(branch_id) = session.branch_id.clone() else {
			tracing::warn!(role = %session.role, "Branch-bound session has no branch, scope left empty");
			*self.state.write().await = ScopeState {
				session: Some(session),
				..ScopeState::default()
			};
			return;
		};

		let branch = match self.directory.branch(&branch_id).await {
			Ok(branch) => branch,
			Err(e) => {
				tracing::warn!(branch_id = %branch_id, error = %e, "Failed to load assigned branch");
				None
			}
		};

		let laundry_id = branch
			.as_ref()
			.map(|b| b.laundry_id.clone())
			.or_else(|| session.laundry_id.clone());
		let branches: Vec<Branch> = branch.into_iter().collect();

		{
			let mut state = self.state.write().await;
			*state = ScopeState {
				session: Some(session),
				scope: TenantScope {
					laundry_id: laundry_id.clone(),
					selected_branch_id: Some(branch_id),
				},
				branches,
			};
		}

		if let Some(laundry_id) = laundry_id {
			self.event_bus
				.publish(LaundryEvent::Scope(ScopeEvent::LaundryChanged {
					laundry_id,
					branch_count: 1,
				}))
				.ok();
		}
	}

	async fn load_laundry(&self, laundry_id: &str) {
		let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

		let branches = match self.directory.active_branches(laundry_id).await {
			Ok(branches) => branches,
			Err(e) => {
				tracing::warn!(laundry_id = %laundry_id, error = %e, "Failed to load branches");
				Vec::new()
			}
		};

		let remembered = self
			.storage
			.retrieve_optional::<String>(PreferenceKey::BranchSelection.as_str(), laundry_id)
			.await
			.unwrap_or_else(|e| {
				tracing::warn!(laundry_id = %laundry_id, error = %e, "Failed to read branch selection");
				None
			});
		let selected = match remembered {
			Some(id) if branches.iter().any(|b| b.id == id) => Some(id),
			Some(id) => {
				tracing::debug!(branch_id = %id, "Remembered branch is no longer active");
				None
			}
			None => None,
		};

		if branches.iter().filter(|b| b.is_main).count() > 1 {
			tracing::warn!(laundry_id = %laundry_id, "Laundry has more than one main branch");
		}

		let branch_count = branches.len();
		{
			let mut state = self.state.write().await;
			if self.generation.load(Ordering::SeqCst) != generation {
				tracing::debug!(laundry_id = %laundry_id, "Discarding stale branch load");
				return;
			}
			state.scope = TenantScope {
				laundry_id: Some(laundry_id.to_string()),
				selected_branch_id: selected,
			};
			state.branches = branches;
		}

		tracing::info!(laundry_id = %laundry_id, branches = branch_count, "Laundry scope loaded");
		self.event_bus
			.publish(LaundryEvent::Scope(ScopeEvent::LaundryChanged {
				laundry_id: laundry_id.to_string(),
				branch_count,
			}))
			.ok();
	}
}
