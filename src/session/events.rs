//! Observer registry for the "session ended" notification.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

type SessionEndedCallback = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`SessionEvents::subscribe`], used to unsubscribe later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registered observers of the logout notification.
///
/// Callbacks run synchronously on the task that ended the session, after the credentials
/// have already been cleared, and outside every internal lock.
#[derive(Default)]
pub struct SessionEvents {
	next_id: AtomicU64,
	observers: Mutex<Vec<(SubscriptionId, SessionEndedCallback)>>,
}
impl SessionEvents {
	/// Registers `callback` to run each time the session ends.
	pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
	where
		F: 'static + Fn() + Send + Sync,
	{
		let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

		self.observers.lock().push((id, Arc::new(callback)));

		id
	}

	/// Removes a previously registered callback. Returns `false` if it was already gone.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut observers = self.observers.lock();
		let before = observers.len();

		observers.retain(|(existing, _)| *existing != id);

		observers.len() != before
	}

	/// Number of registered callbacks.
	pub fn observer_count(&self) -> usize {
		self.observers.lock().len()
	}

	pub(crate) fn emit_session_ended(&self) {
		let snapshot = self.observers.lock().iter().map(|(_, cb)| cb.clone()).collect::<Vec<_>>();

		for callback in snapshot {
			callback();
		}
	}
}
impl Debug for SessionEvents {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionEvents").field("observers", &self.observer_count()).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicUsize;
	// self
	use super::*;

	#[test]
	fn unsubscribed_callbacks_stop_firing() {
		let events = SessionEvents::default();
		let hits = Arc::new(AtomicUsize::new(0));
		let first = {
			let hits = hits.clone();

			events.subscribe(move || {
				hits.fetch_add(1, Ordering::SeqCst);
			})
		};
		let hits_second = hits.clone();

		events.subscribe(move || {
			hits_second.fetch_add(10, Ordering::SeqCst);
		});
		events.emit_session_ended();

		assert_eq!(hits.load(Ordering::SeqCst), 11);
		assert!(events.unsubscribe(first));
		assert!(!events.unsubscribe(first));

		events.emit_session_ended();

		assert_eq!(hits.load(Ordering::SeqCst), 21);
		assert_eq!(events.observer_count(), 1);
	}
}
