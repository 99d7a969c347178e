//! Core engine for the laundry operations system.
//!
//! This crate holds the session-scoped state of a counter or back-office
//! client: the data-driven order status flow, the tenant scope (active
//! laundry and branch filter) and the subscription gate that decides whether
//! a sale may proceed. The engine shares the flow and keeps a scope and a
//! gate per acting user, handed out as a [`SessionHandle`]. It is assembled
//! by the builder from configured implementations.

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod scope;
pub mod state;
pub mod subscription;

pub use builder::{BuilderError, LaundryBuilder, LaundryFactories};
pub use engine::event_bus::EventBus;
pub use engine::{EngineError, LaundryEngine, SessionHandle, SubmitOutcome};
pub use scope::{ScopeError, TenantScopeResolver};
pub use state::{OrderStatusMachine, StatusFlowRegistry, StepDisplay, TransitionError};
pub use subscription::{GateDecision, GateOutcome, SubscriptionGate};
