//! In-memory grid world for capability lookups.
//!
//! [`GridWorld`] stores an object kind and an optional companion object per
//! position and implements [`World`] on top of a [`CompanionBus`]. Companion
//! changes emit the matching load/unload notification; an object kind change
//! emits both, so caches at that position re-resolve. Unset positions hold the
//! catalog's `air` kind.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lodestone_lookup::{
	Companion, CompanionBus, CompanionEvent, CompanionObject, InvalidationListener, KindCatalog,
	ObjectKind, Position, Subscription, World,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Name of the kind every unset position reports.
pub const AIR: &str = "air";

#[derive(Clone)]
struct Cell {
	kind: ObjectKind,
	companion: Option<Companion>,
}

/// Counts of collaborator calls made by lookups and caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridStats {
	pub kind_queries: u64,
	pub companion_queries: u64,
}

pub struct GridWorld {
	catalog: Arc<KindCatalog>,
	air: ObjectKind,
	cells: RwLock<FxHashMap<Position, Cell>>,
	bus: CompanionBus,
	kind_queries: AtomicU64,
	companion_queries: AtomicU64,
}

impl GridWorld {
	pub fn new(catalog: Arc<KindCatalog>) -> Self {
		let air = catalog.object_kind(AIR);
		Self {
			catalog,
			air,
			cells: RwLock::default(),
			bus: CompanionBus::new(),
			kind_queries: AtomicU64::new(0),
			companion_queries: AtomicU64::new(0),
		}
	}

	pub fn catalog(&self) -> &Arc<KindCatalog> {
		&self.catalog
	}

	#[inline]
	pub fn air(&self) -> ObjectKind {
		self.air
	}

	/// Places `kind` at `position`, dropping any companion that was there.
	pub fn set_object(&self, position: Position, kind: ObjectKind) {
		let previous = self.cells.write().insert(
			position,
			Cell {
				kind,
				companion: None,
			},
		);
		self.replaced(position, previous, kind);
	}

	/// Attaches `companion` at `position`, replacing any previous companion.
	pub fn set_companion(&self, position: Position, companion: impl CompanionObject) {
		let companion: Companion = Arc::new(companion);
		let replaced = {
			let mut cells = self.cells.write();
			let cell = cells.entry(position).or_insert(Cell {
				kind: self.air,
				companion: None,
			});
			cell.companion.replace(companion).is_some()
		};
		if replaced {
			self.emit(position, CompanionEvent::Unloaded);
		}
		self.emit(position, CompanionEvent::Loaded);
	}

	/// Detaches the companion at `position`; returns it if there was one.
	pub fn remove_companion(&self, position: Position) -> Option<Companion> {
		let removed = self
			.cells
			.write()
			.get_mut(&position)
			.and_then(|cell| cell.companion.take());
		if removed.is_some() {
			self.emit(position, CompanionEvent::Unloaded);
		}
		removed
	}

	/// Resets `position` to air.
	pub fn clear(&self, position: Position) {
		let previous = self.cells.write().remove(&position);
		self.replaced(position, previous, self.air);
	}

	/// Number of live invalidation listeners at `position`.
	pub fn listener_count(&self, position: Position) -> usize {
		self.bus.listener_count(position)
	}

	pub fn stats(&self) -> GridStats {
		GridStats {
			kind_queries: self.kind_queries.load(Ordering::Relaxed),
			companion_queries: self.companion_queries.load(Ordering::Relaxed),
		}
	}

	/// Notifies listeners after the cell at `position` was overwritten.
	fn replaced(&self, position: Position, previous: Option<Cell>, kind: ObjectKind) {
		let (previous_kind, displaced) = previous.map_or((self.air, false), |cell| {
			(cell.kind, cell.companion.is_some())
		});
		if previous_kind != kind {
			tracing::trace!(%position, ?previous_kind, ?kind, "object kind changed");
			self.emit(position, CompanionEvent::Unloaded);
			self.emit(position, CompanionEvent::Loaded);
		} else if displaced {
			self.emit(position, CompanionEvent::Unloaded);
		}
	}

	fn emit(&self, position: Position, event: CompanionEvent) {
		let marked = self.bus.notify(position, event);
		tracing::debug!(%position, ?event, marked, "companion event");
	}
}

impl World for GridWorld {
	fn object_kind(&self, position: Position) -> ObjectKind {
		self.kind_queries.fetch_add(1, Ordering::Relaxed);
		self.cells
			.read()
			.get(&position)
			.map_or(self.air, |cell| cell.kind)
	}

	fn companion(&self, position: Position) -> Option<Companion> {
		self.companion_queries.fetch_add(1, Ordering::Relaxed);
		self.cells
			.read()
			.get(&position)
			.and_then(|cell| cell.companion.clone())
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
		self.bus.unsubscribe(subscription);
	}
}
