use std::collections::HashSet;
use uuid::Uuid;

/// Topics (job/batch/session ids) one connection wants events for.
///
/// Subscribing to an id that does not exist is deliberately not an error;
/// it simply matches no events until the entity appears.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionSet {
	topics: HashSet<Uuid>,
}

impl SubscriptionSet {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns true if the topic was newly added.
	pub fn subscribe(&mut self, topic: Uuid) -> bool {
		self.topics.insert(topic)
	}

	/// Returns true if the topic was present.
	pub fn unsubscribe(&mut self, topic: &Uuid) -> bool {
		self.topics.remove(topic)
	}

	#[must_use]
	pub fn contains(&self, topic: &Uuid) -> bool {
		self.topics.contains(topic)
	}

	#[must_use]
	pub fn count(&self) -> usize {
		self.topics.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.topics.is_empty()
	}

	pub fn clear(&mut self) {
		self.topics.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_set_is_empty() {
		let subs = SubscriptionSet::new();
		assert!(subs.is_empty());
		assert_eq!(subs.count(), 0);
	}

	#[test]
	fn subscribe_is_idempotent() {
		let mut subs = SubscriptionSet::new();
		let topic = Uuid::new_v4();

		assert!(subs.subscribe(topic));
		assert!(!subs.subscribe(topic), "re-subscribing must not count as new");
		assert_eq!(subs.count(), 1);
	}

	#[test]
	fn unsubscribe_is_the_inverse_of_subscribe() {
		let mut subs = SubscriptionSet::new();
		let topic = Uuid::new_v4();

		subs.subscribe(topic);
		assert!(subs.unsubscribe(&topic));
		assert!(!subs.contains(&topic));
		assert!(subs.is_empty());
	}

	#[test]
	fn unsubscribing_an_unknown_topic_is_not_an_error() {
		let mut subs = SubscriptionSet::new();
		assert!(!subs.unsubscribe(&Uuid::new_v4()));
	}

	#[test]
	fn watching_a_nonexistent_entity_matches_nothing() {
		let mut subs = SubscriptionSet::new();
		subs.subscribe(Uuid::new_v4());
		assert!(!subs.contains(&Uuid::new_v4()));
	}

	#[test]
	fn clear_removes_everything() {
		let mut subs = SubscriptionSet::new();
		for _ in 0..5 {
			subs.subscribe(Uuid::new_v4());
		}
		subs.clear();
		assert!(subs.is_empty());
	}
}
