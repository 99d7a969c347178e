//! Common types for the laundry operations system.
//!
//! This crate defines the data model shared by every other crate in the
//! workspace: configurable operation steps, orders, tenant (laundry/branch)
//! records, subscription snapshots, events and the HTTP API payloads.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Event types for inter-component communication.
pub mod events;
/// Operation step and order status types.
pub mod flow;
/// Notification request types.
pub mod notification;
/// Order, order item and order query types.
pub mod order;
/// Base trait for self-registering implementations.
pub mod registry;
/// Keys used for locally persisted preferences.
pub mod storage;
/// Subscription status and remote check snapshot types.
pub mod subscription;
/// Laundry, branch, role and session types.
pub mod tenant;
/// Utility functions for display formatting.
pub mod utils;

pub use api::*;
pub use events::*;
pub use flow::*;
pub use notification::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use subscription::*;
pub use tenant::*;
pub use utils::truncate_id;
