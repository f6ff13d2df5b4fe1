//! Minimal world for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::events::CompanionBus;
use crate::kind::{CompanionKind, KindCatalog, ObjectKind};
use crate::world::{
	Companion, CompanionEvent, CompanionObject, InvalidationListener, Position, Subscription, World,
};

pub(crate) struct Tank {
	pub kind: CompanionKind,
	pub amount: u32,
}

impl CompanionObject for Tank {
	fn kind(&self) -> CompanionKind {
		self.kind
	}
}

pub(crate) struct TestWorld {
	pub catalog: KindCatalog,
	pub air: ObjectKind,
	objects: RwLock<FxHashMap<Position, ObjectKind>>,
	companions: RwLock<FxHashMap<Position, Companion>>,
	pub bus: CompanionBus,
	pub kind_queries: AtomicUsize,
	pub companion_queries: AtomicUsize,
	ignore_unsubscribe: AtomicBool,
}

impl TestWorld {
	pub fn new() -> Self {
		let catalog = KindCatalog::new();
		let air = catalog.object_kind("air");
		Self {
			catalog,
			air,
			objects: RwLock::default(),
			companions: RwLock::default(),
			bus: CompanionBus::new(),
			kind_queries: AtomicUsize::new(0),
			companion_queries: AtomicUsize::new(0),
			ignore_unsubscribe: AtomicBool::new(false),
		}
	}

	/// Sets the object kind, notifying both events when it changes.
	pub fn place(&self, position: Position, kind: ObjectKind) {
		let previous = self.objects.write().insert(position, kind).unwrap_or(self.air);
		if previous != kind {
			self.bus.notify(position, CompanionEvent::Unloaded);
			self.bus.notify(position, CompanionEvent::Loaded);
		}
	}

	/// Makes [`World::unsubscribe`] a no-op, like a world that never deregisters.
	pub fn ignore_unsubscribe(&self) {
		self.ignore_unsubscribe.store(true, Ordering::Relaxed);
	}

	pub fn attach(&self, position: Position, companion: impl CompanionObject) {
		self.companions.write().insert(position, Arc::new(companion));
		self.bus.notify(position, CompanionEvent::Loaded);
	}

	pub fn detach(&self, position: Position) {
		self.companions.write().remove(&position);
		self.bus.notify(position, CompanionEvent::Unloaded);
	}

	/// Swaps the companion without emitting any notification.
	pub fn attach_silently(&self, position: Position, companion: impl CompanionObject) {
		self.companions.write().insert(position, Arc::new(companion));
	}

	pub fn kind_queries(&self) -> usize {
		self.kind_queries.load(Ordering::Relaxed)
	}

	pub fn companion_queries(&self) -> usize {
		self.companion_queries.load(Ordering::Relaxed)
	}
}

impl World for TestWorld {
	fn object_kind(&self, position: Position) -> ObjectKind {
		self.kind_queries.fetch_add(1, Ordering::Relaxed);
		self.objects.read().get(&position).copied().unwrap_or(self.air)
	}

	fn companion(&self, position: Position) -> Option<Companion> {
		self.companion_queries.fetch_add(1, Ordering::Relaxed);
		self.companions.read().get(&position).cloned()
	}

	fn on_companion_loaded(&self, position: Position, handler: InvalidationListener) -> Subscription {
		self.bus.subscribe(position, CompanionEvent::Loaded, handler)
	}

	fn on_companion_unloaded(
		&self,
		position: Position,
		handler: InvalidationListener,
	) -> Subscription {
		self.bus.subscribe(position, CompanionEvent::Unloaded, handler)
	}

	fn unsubscribe(&self, subscription: Subscription) {
		if self.ignore_unsubscribe.load(Ordering::Relaxed) {
			return;
		}
		self.bus.unsubscribe(subscription);
	}
}
