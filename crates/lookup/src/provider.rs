//! Provider traits and the companion adapter.
//!
//! Closures become providers through [`object_provider_fn`] and
//! [`companion_provider_fn`], which pin down the higher-ranked signatures the
//! blanket impls need.

use std::any::Any;
use std::sync::Arc;

use crate::kind::{CompanionKind, ObjectKind};
use crate::world::{CompanionObject, Position, World};

/// Resolves a capability for an occupied position.
pub trait ObjectProvider<V, C>: Send + Sync {
	fn find(&self, world: &dyn World, position: Position, kind: ObjectKind, context: &C)
	-> Option<V>;

	/// Returns the companion adapter when this provider answers through a
	/// position's companion object.
	fn as_companion(&self) -> Option<&WrappedCompanionProvider<V, C>> {
		None
	}
}

impl<V, C, F> ObjectProvider<V, C> for F
where
	F: Fn(&dyn World, Position, ObjectKind, &C) -> Option<V> + Send + Sync,
{
	#[inline]
	fn find(
		&self,
		world: &dyn World,
		position: Position,
		kind: ObjectKind,
		context: &C,
	) -> Option<V> {
		self(world, position, kind, context)
	}
}

/// Resolves a capability from a companion object.
pub trait CompanionProvider<V, C>: Send + Sync {
	fn find(&self, companion: &dyn CompanionObject, context: &C) -> Option<V>;
}

impl<V, C, F> CompanionProvider<V, C> for F
where
	F: Fn(&dyn CompanionObject, &C) -> Option<V> + Send + Sync,
{
	#[inline]
	fn find(&self, companion: &dyn CompanionObject, context: &C) -> Option<V> {
		self(companion, context)
	}
}

pub type ObjectProviderRef<V, C> = Arc<dyn ObjectProvider<V, C>>;
pub type CompanionProviderRef<V, C> = Arc<dyn CompanionProvider<V, C>>;

pub fn object_provider_fn<V, C, F>(f: F) -> ObjectProviderRef<V, C>
where
	V: 'static,
	C: 'static,
	F: Fn(&dyn World, Position, ObjectKind, &C) -> Option<V> + Send + Sync + 'static,
{
	Arc::new(f)
}

pub fn companion_provider_fn<V, C, F>(f: F) -> CompanionProviderRef<V, C>
where
	V: 'static,
	C: 'static,
	F: Fn(&dyn CompanionObject, &C) -> Option<V> + Send + Sync + 'static,
{
	Arc::new(f)
}

/// Provider whose answer is the companion object itself, downcast to `V`.
pub(crate) fn self_provider<V, C>() -> CompanionProviderRef<V, C>
where
	V: Clone + 'static,
	C: 'static,
{
	companion_provider_fn(|companion: &dyn CompanionObject, _: &C| {
		let any: &dyn Any = companion;
		any.downcast_ref::<V>().cloned()
	})
}

/// Object provider that answers through the position's companion object.
///
/// Fetches the companion from the world and, if it is of the expected kind,
/// hands it to the wrapped [`CompanionProvider`]. Position caches recognise
/// this adapter and call [`Self::find_in`] on their cached companion instead.
pub struct WrappedCompanionProvider<V, C> {
	kind: CompanionKind,
	inner: CompanionProviderRef<V, C>,
}

impl<V, C> Clone for WrappedCompanionProvider<V, C> {
	fn clone(&self) -> Self {
		Self {
			kind: self.kind,
			inner: self.inner.clone(),
		}
	}
}

impl<V, C> WrappedCompanionProvider<V, C> {
	pub fn new(kind: CompanionKind, inner: CompanionProviderRef<V, C>) -> Self {
		Self { kind, inner }
	}

	#[inline]
	pub fn companion_kind(&self) -> CompanionKind {
		self.kind
	}

	pub fn inner(&self) -> &CompanionProviderRef<V, C> {
		&self.inner
	}

	/// Queries an already fetched companion. Companions of another kind yield `None`.
	#[inline]
	pub fn find_in(&self, companion: &dyn CompanionObject, context: &C) -> Option<V> {
		if companion.kind() != self.kind {
			return None;
		}
		self.inner.find(companion, context)
	}
}

impl<V, C> ObjectProvider<V, C> for WrappedCompanionProvider<V, C> {
	fn find(
		&self,
		world: &dyn World,
		position: Position,
		_kind: ObjectKind,
		context: &C,
	) -> Option<V> {
		let companion = world.companion(position)?;
		self.find_in(companion.as_ref(), context)
	}

	fn as_companion(&self) -> Option<&WrappedCompanionProvider<V, C>> {
		Some(self)
	}
}
