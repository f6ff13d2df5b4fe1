//! Interface the lookup core consumes from the host world.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::kind::{CompanionKind, ObjectKind};

/// Integer grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Position {
	pub x: i32,
	pub y: i32,
	pub z: i32,
}

impl Position {
	pub const fn new(x: i32, y: i32, z: i32) -> Self {
		Self { x, y, z }
	}
}

impl fmt::Display for Position {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "({}, {}, {})", self.x, self.y, self.z)
	}
}

/// Per-position runtime object attached by the world (e.g. a machine's state).
pub trait CompanionObject: Any + Send + Sync {
	fn kind(&self) -> CompanionKind;
}

/// Shared handle to a companion object.
pub type Companion = Arc<dyn CompanionObject>;

/// Downcasts a companion to its concrete type.
#[inline]
pub fn downcast_companion<T: CompanionObject>(companion: &dyn CompanionObject) -> Option<&T> {
	let any: &dyn Any = companion;
	any.downcast_ref::<T>()
}

/// Companion lifecycle notifications a world emits per position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompanionEvent {
	Loaded,
	Unloaded,
}

/// Dirty flag owned by a cache.
///
/// The cache holds the only strong reference. The world receives
/// [`InvalidationListener`]s, which mark the flag while the owner is alive and
/// report themselves orphaned once it is gone.
#[derive(Debug, Default)]
pub struct InvalidationHandle {
	dirty: Arc<AtomicBool>,
}

impl InvalidationHandle {
	pub fn new() -> Self {
		Self::default()
	}

	/// Weak view of this flag for the world to mark.
	pub fn listener(&self) -> InvalidationListener {
		InvalidationListener {
			dirty: Arc::downgrade(&self.dirty),
		}
	}

	/// Marks the flag directly.
	#[inline]
	pub fn mark(&self) {
		self.dirty.store(true, Ordering::Release);
	}

	#[inline]
	pub fn is_marked(&self) -> bool {
		self.dirty.load(Ordering::Acquire)
	}

	/// Clears the flag, returning whether it was set.
	#[inline]
	pub(crate) fn take(&self) -> bool {
		self.dirty.swap(false, Ordering::AcqRel)
	}
}

/// World-side view of an [`InvalidationHandle`].
#[derive(Debug, Clone)]
pub struct InvalidationListener {
	dirty: Weak<AtomicBool>,
}

impl InvalidationListener {
	/// Marks the owning cache stale. Does nothing once the owner is gone.
	#[inline]
	pub fn mark(&self) {
		if let Some(dirty) = self.dirty.upgrade() {
			dirty.store(true, Ordering::Release);
		}
	}

	/// True once the owning handle has been dropped.
	#[inline]
	pub fn is_orphaned(&self) -> bool {
		self.dirty.strong_count() == 0
	}
}

/// Receipt for a registered listener, used to deregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
	pub position: Position,
	pub event: CompanionEvent,
	pub id: u64,
}

/// The host world, as seen by lookups and caches.
///
/// Implementations must not block: every method is called on query paths.
///
/// Caches never re-read the object kind on their own. Whenever the object
/// kind at a position changes, the world must fire both the loaded and the
/// unloaded notifications for that position, in addition to firing them for
/// companion changes.
pub trait World: Send + Sync {
	/// Kind of whatever occupies `position`. Empty space is a kind too.
	fn object_kind(&self, position: Position) -> ObjectKind;

	/// Companion object attached at `position`, if one is loaded.
	fn companion(&self, position: Position) -> Option<Companion>;

	/// Marks `handler` whenever a companion is loaded at `position`.
	fn on_companion_loaded(&self, position: Position, handler: InvalidationListener) -> Subscription;

	/// Marks `handler` whenever the companion at `position` is unloaded.
	fn on_companion_unloaded(&self, position: Position, handler: InvalidationListener)
	-> Subscription;

	/// Removes a listener previously registered with this world.
	fn unsubscribe(&self, subscription: Subscription);
}
