//! Broadcast channel connecting the engine components.
//!
//! Every subscriber sees every event published after it subscribed. Publishing
//! with no subscribers is not an error worth reporting, so callers usually
//! discard the result.

use laundry_types::LaundryEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<LaundryEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<LaundryEvent> {
		self.sender.subscribe()
	}

	/// Returns the number of subscribers that received the event.
	pub fn publish(
		&self,
		event: LaundryEvent,
	) -> Result<usize, broadcast::error::SendError<LaundryEvent>> {
		self.sender.send(event)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use laundry_types::{LaundryEvent, ScopeEvent};

	#[tokio::test]
	async fn test_publish_reaches_subscribers() {
		let bus = EventBus::new(8);
		let mut receiver = bus.subscribe();

		bus.publish(LaundryEvent::Scope(ScopeEvent::BranchChanged {
			laundry_id: "l-1".into(),
			branch_id: None,
		}))
		.unwrap();

		match receiver.recv().await.unwrap() {
			LaundryEvent::Scope(ScopeEvent::BranchChanged { laundry_id, branch_id }) => {
				assert_eq!(laundry_id, "l-1");
				assert_eq!(branch_id, None);
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn test_publish_without_subscribers_fails_quietly() {
		let bus = EventBus::new(8);
		assert!(bus
			.publish(LaundryEvent::Scope(ScopeEvent::LaundryChanged {
				laundry_id: "l-1".into(),
				branch_count: 0,
			}))
			.is_err());
	}
}
