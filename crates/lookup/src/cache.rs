//! Per-position memo of the provider (and companion) that answers there.
//!
//! # States
//!
//! The companion slot moves `Unknown -> Present | Absent -> Unknown`. It is
//! filled once, on the first query that needs it, and cleared only by
//! [`PositionCache::invalidate`]. Invalidation drops the provider and the
//! companion together; there is no partial invalidation.
//!
//! # Ownership
//!
//! A cache belongs to one owner and is queried through `&mut self`. The world
//! signals companion load/unload (and object kind changes) by marking the
//! cache's [`InvalidationHandle`] through a weak listener; the cache notices on
//! its next query. Dropping the cache removes both of its world subscriptions,
//! and even a world that ignores the removal only keeps orphaned listeners,
//! which it prunes on the next event at that position. A cache leaked with
//! [`std::mem::forget`] never drops its handle and stays subscribed.

use std::sync::Arc;

use crate::kind::ObjectKind;
use crate::lookup::Lookup;
use crate::provider::{ObjectProviderRef, WrappedCompanionProvider};
use crate::world::{Companion, InvalidationHandle, Position, Subscription, World};

enum CompanionSlot {
	Unknown,
	Present(Companion),
	Absent,
}

struct Resolved<V: 'static, C: 'static> {
	kind: ObjectKind,
	provider: Option<ObjectProviderRef<V, C>>,
}

pub struct PositionCache<V: 'static, C: 'static> {
	lookup: Arc<Lookup<V, C>>,
	world: Arc<dyn World>,
	position: Position,
	handle: InvalidationHandle,
	subscriptions: [Subscription; 2],
	resolved: Option<Resolved<V, C>>,
	companion_provider: Option<WrappedCompanionProvider<V, C>>,
	companion: CompanionSlot,
}

impl<V: 'static, C: 'static> PositionCache<V, C> {
	/// Binds a cache to `position` and subscribes it to companion changes there.
	pub fn new(lookup: Arc<Lookup<V, C>>, world: Arc<dyn World>, position: Position) -> Self {
		let handle = InvalidationHandle::new();
		let subscriptions = [
			world.on_companion_loaded(position, handle.listener()),
			world.on_companion_unloaded(position, handle.listener()),
		];
		Self {
			lookup,
			world,
			position,
			handle,
			subscriptions,
			resolved: None,
			companion_provider: None,
			companion: CompanionSlot::Unknown,
		}
	}

	#[inline]
	pub fn lookup(&self) -> &Arc<Lookup<V, C>> {
		&self.lookup
	}

	#[inline]
	pub fn world(&self) -> &Arc<dyn World> {
		&self.world
	}

	#[inline]
	pub fn position(&self) -> Position {
		self.position
	}

	/// Resolves the capability at the cached position.
	///
	/// Equivalent to [`Lookup::get`] for the same world, position and context,
	/// but only the first call after construction or invalidation resolves the
	/// object kind and provider.
	pub fn get(&mut self, context: &C) -> Option<V> {
		self.refresh();
		let kind = match self.resolved.as_ref().map(|resolved| resolved.kind) {
			Some(kind) => kind,
			None => self.resolve(None),
		};
		self.query(kind, context)
	}

	/// Like [`Self::get`] for a caller that already observed the object kind.
	///
	/// A kind other than the cached one invalidates the cache first.
	pub fn find_with_kind(&mut self, kind: ObjectKind, context: &C) -> Option<V> {
		self.refresh();
		match self.resolved.as_ref().map(|resolved| resolved.kind) {
			Some(cached) if cached == kind => {}
			Some(_) => {
				self.invalidate();
				self.resolve(Some(kind));
			}
			None => {
				self.resolve(Some(kind));
			}
		}
		self.query(kind, context)
	}

	/// Companion object at the cached position, fetched at most once per validity window.
	pub fn companion(&mut self) -> Option<&Companion> {
		self.refresh();
		self.fill_companion();
		match &self.companion {
			CompanionSlot::Present(companion) => Some(companion),
			CompanionSlot::Unknown | CompanionSlot::Absent => None,
		}
	}

	/// Forgets the resolved provider and companion.
	pub fn invalidate(&mut self) {
		tracing::trace!(
			position = %self.position,
			lookup = %self.lookup.id(),
			"position cache invalidated"
		);
		self.resolved = None;
		self.companion_provider = None;
		self.companion = CompanionSlot::Unknown;
	}

	/// Returns true while a provider resolution is cached.
	pub fn is_resolved(&self) -> bool {
		self.resolved.is_some() && !self.handle.is_marked()
	}

	fn refresh(&mut self) {
		if self.handle.take() {
			self.invalidate();
		}
	}

	fn resolve(&mut self, kind: Option<ObjectKind>) -> ObjectKind {
		let kind = kind.unwrap_or_else(|| self.world.object_kind(self.position));
		let provider = self.lookup.provider(kind);
		self.companion_provider = provider
			.as_ref()
			.and_then(|provider| provider.as_companion().cloned());
		self.resolved = Some(Resolved { kind, provider });
		kind
	}

	fn fill_companion(&mut self) {
		if matches!(self.companion, CompanionSlot::Unknown) {
			self.companion = match self.world.companion(self.position) {
				Some(companion) => CompanionSlot::Present(companion),
				None => CompanionSlot::Absent,
			};
		}
	}

	fn query(&mut self, kind: ObjectKind, context: &C) -> Option<V> {
		if self.companion_provider.is_some() {
			self.fill_companion();
		}

		if let Some(wrapped) = &self.companion_provider {
			if let CompanionSlot::Present(companion) = &self.companion
				&& let Some(value) = wrapped.find_in(companion.as_ref(), context)
			{
				return Some(value);
			}
		} else if let Some(Resolved {
			provider: Some(provider),
			..
		}) = &self.resolved
			&& let Some(value) = provider.find(self.world.as_ref(), self.position, kind, context)
		{
			return Some(value);
		}

		self.lookup
			.find_fallback(self.world.as_ref(), self.position, kind, context)
	}
}

impl<V: 'static, C: 'static> Drop for PositionCache<V, C> {
	fn drop(&mut self) {
		for subscription in self.subscriptions {
			self.world.unsubscribe(subscription);
		}
	}
}
