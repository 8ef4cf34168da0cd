use stream_events::ServerEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// In-process fan-out bus for progress events.
///
/// Publishing never blocks and never fails: with no subscribers the event
/// is simply dropped, and a lagging subscriber loses oldest-first without
/// affecting anyone else.
#[derive(Clone)]
pub struct EventBus {
	tx: broadcast::Sender<ServerEvent>,
}

impl EventBus {
	#[must_use]
	pub fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity);
		Self { tx }
	}

	pub fn publish(&self, event: ServerEvent) {
		let receivers = self.tx.receiver_count();
		trace!(?event, receivers, "Publishing event");
		let _ = self.tx.send(event);
	}

	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
		self.tx.subscribe()
	}

	#[must_use]
	pub fn subscriber_count(&self) -> usize {
		self.tx.receiver_count()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}
