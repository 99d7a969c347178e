//! Handlers reacting to order operations and order events.
//!
//! The order handler performs creations and status moves; the notification
//! handler turns the resulting events into staff notifications.

pub mod notification;
pub mod order;

pub use notification::NotificationHandler;
pub use order::{order_view, OrderHandler, OrderHandlerError};
