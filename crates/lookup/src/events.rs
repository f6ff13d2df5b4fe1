//! Position-keyed listener table for companion lifecycle notifications.
//!
//! Worlds embed a [`CompanionBus`] to implement the subscription half of
//! [`World`](crate::World). The bus stores only weak [`InvalidationListener`]s,
//! never the caches behind them, so a listener that was never deregistered
//! cannot keep a cache alive. Orphaned listeners at a position are pruned the
//! next time any event fires there.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::world::{CompanionEvent, InvalidationListener, Position, Subscription};

#[derive(Default)]
struct BusState {
	next_id: u64,
	listeners: FxHashMap<(Position, CompanionEvent), Vec<(u64, InvalidationListener)>>,
}

impl BusState {
	/// Drops orphaned listeners for both events at `position`.
	fn prune(&mut self, position: Position) -> usize {
		let mut pruned = 0;
		for event in [CompanionEvent::Loaded, CompanionEvent::Unloaded] {
			let key = (position, event);
			let Some(listeners) = self.listeners.get_mut(&key) else {
				continue;
			};
			let before = listeners.len();
			listeners.retain(|(_, listener)| !listener.is_orphaned());
			pruned += before - listeners.len();
			if listeners.is_empty() {
				self.listeners.remove(&key);
			}
		}
		pruned
	}
}

#[derive(Default)]
pub struct CompanionBus {
	state: Mutex<BusState>,
}

impl CompanionBus {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn subscribe(
		&self,
		position: Position,
		event: CompanionEvent,
		listener: InvalidationListener,
	) -> Subscription {
		let mut state = self.state.lock();
		let id = state.next_id;
		state.next_id += 1;
		state
			.listeners
			.entry((position, event))
			.or_default()
			.push((id, listener));
		Subscription {
			position,
			event,
			id,
		}
	}

	/// Removes a listener. Unknown subscriptions are ignored.
	pub fn unsubscribe(&self, subscription: Subscription) {
		let mut state = self.state.lock();
		let key = (subscription.position, subscription.event);
		let Some(listeners) = state.listeners.get_mut(&key) else {
			return;
		};
		listeners.retain(|(id, _)| *id != subscription.id);
		if listeners.is_empty() {
			state.listeners.remove(&key);
		}
	}

	/// Marks every live listener for `event` at `position`; returns how many were marked.
	pub fn notify(&self, position: Position, event: CompanionEvent) -> usize {
		let mut state = self.state.lock();
		let pruned = state.prune(position);
		if pruned > 0 {
			tracing::debug!(%position, ?event, pruned, "pruned orphaned companion listeners");
		}
		let Some(listeners) = state.listeners.get(&(position, event)) else {
			return 0;
		};
		for (_, listener) in listeners {
			listener.mark();
		}
		listeners.len()
	}

	/// Number of listeners registered at `position`, across both events.
	pub fn listener_count(&self, position: Position) -> usize {
		let state = self.state.lock();
		[CompanionEvent::Loaded, CompanionEvent::Unloaded]
			.iter()
			.filter_map(|event| state.listeners.get(&(position, *event)))
			.map(Vec::len)
			.sum()
	}

	pub fn is_empty(&self) -> bool {
		self.state.lock().listeners.is_empty()
	}
}
