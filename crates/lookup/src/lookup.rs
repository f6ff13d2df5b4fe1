//! Per-capability provider table.
//!
//! # Resolution order
//!
//! 1. The provider registered for the position's object kind.
//! 2. Object fallbacks, in registration order.
//! 3. Companion fallbacks, in registration order, against the position's
//!    companion object (fetched once for the whole pass).
//!
//! The first non-empty answer wins. An empty overall answer is normal: most
//! positions expose no given capability.
//!
//! # Concurrency
//!
//! Queries only load immutable snapshots and may run on any thread. Each
//! registration publishes a new snapshot; fallback lists share one writer lock.
//! Provider panics are not caught.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::conflict::{Conflict, ConflictKey, ConflictPolicy, RegisterReport};
use crate::error::LookupError;
use crate::identity_map::IdentityKeyedMap;
use crate::kind::{
	CapabilityId, CompanionAttachments, CompanionKind, KindCatalog, ObjectKind, TypeToken,
};
use crate::provider::{
	CompanionProviderRef, ObjectProviderRef, WrappedCompanionProvider, self_provider,
};
use crate::world::{Position, World};

/// Providers of one capability, keyed by object and companion kind.
pub struct Lookup<V: 'static, C: 'static> {
	id: CapabilityId,
	policy: ConflictPolicy,
	object_providers: IdentityKeyedMap<ObjectKind, ObjectProviderRef<V, C>>,
	companion_providers: IdentityKeyedMap<CompanionKind, CompanionProviderRef<V, C>>,
	object_fallbacks: ArcSwap<Vec<ObjectProviderRef<V, C>>>,
	companion_fallbacks: ArcSwap<Vec<CompanionProviderRef<V, C>>>,
	fallback_write: Mutex<()>,
	conflicts: Mutex<Vec<Conflict>>,
	kind_names: Option<Arc<KindCatalog>>,
}

impl<V: 'static, C: 'static> Lookup<V, C> {
	pub(crate) fn new(id: CapabilityId, policy: ConflictPolicy) -> Self {
		Self {
			id,
			policy,
			object_providers: IdentityKeyedMap::new(),
			companion_providers: IdentityKeyedMap::new(),
			object_fallbacks: ArcSwap::from_pointee(Vec::new()),
			companion_fallbacks: ArcSwap::from_pointee(Vec::new()),
			fallback_write: Mutex::new(()),
			conflicts: Mutex::new(Vec::new()),
			kind_names: None,
		}
	}

	/// Resolves kind names through `catalog` when reporting conflicts.
	pub(crate) fn with_kind_names(mut self, catalog: Option<Arc<KindCatalog>>) -> Self {
		self.kind_names = catalog;
		self
	}

	#[inline]
	pub fn id(&self) -> &CapabilityId {
		&self.id
	}

	#[inline]
	pub fn capability_type(&self) -> TypeToken {
		self.id.capability()
	}

	#[inline]
	pub fn context_type(&self) -> TypeToken {
		self.id.context()
	}

	#[inline]
	pub fn policy(&self) -> ConflictPolicy {
		self.policy
	}

	/// Installs `provider` for each of `kinds`.
	///
	/// Kinds that already have a provider keep it; each such kind is logged and
	/// recorded as a [`Conflict`].
	pub fn register_for_object_kinds(
		&self,
		provider: ObjectProviderRef<V, C>,
		kinds: &[ObjectKind],
	) -> Result<RegisterReport, LookupError> {
		if kinds.is_empty() {
			return Err(LookupError::invalid(format!(
				"{}: provider registered for no object kinds",
				self.id
			)));
		}

		let mut report = RegisterReport::default();
		for &kind in kinds {
			let key = ConflictKey::Object(kind);
			if self
				.object_providers
				.put_if_absent(kind, provider.clone())
				.is_some()
			{
				self.record_conflict(key);
				report.conflicting.push(key);
			} else {
				report.installed.push(key);
			}
		}
		Ok(report)
	}

	/// Installs `provider` for each companion kind, wrapped so it answers for
	/// every object kind the companion is attached to.
	pub fn register_companion_provider(
		&self,
		attachments: &dyn CompanionAttachments,
		provider: CompanionProviderRef<V, C>,
		companion_kinds: &[CompanionKind],
	) -> Result<RegisterReport, LookupError> {
		if companion_kinds.is_empty() {
			return Err(LookupError::invalid(format!(
				"{}: companion provider registered for no companion kinds",
				self.id
			)));
		}

		let mut targets = Vec::with_capacity(companion_kinds.len());
		for &companion_kind in companion_kinds {
			let object_kinds = attachments.attached_object_kinds(companion_kind);
			if object_kinds.is_empty() {
				return Err(LookupError::invalid(format!(
					"{}: {companion_kind:?} is not attached to any object kind",
					self.id
				)));
			}
			targets.push((companion_kind, object_kinds));
		}

		let mut report = RegisterReport::default();
		for (companion_kind, object_kinds) in targets {
			let key = ConflictKey::Companion(companion_kind);
			if self
				.companion_providers
				.put_if_absent(companion_kind, provider.clone())
				.is_some()
			{
				self.record_conflict(key);
				report.conflicting.push(key);
			} else {
				report.installed.push(key);
			}

			let wrapped: ObjectProviderRef<V, C> =
				Arc::new(WrappedCompanionProvider::new(companion_kind, provider.clone()));
			report.merge(self.register_for_object_kinds(wrapped, &object_kinds)?);
		}
		Ok(report)
	}

	/// Registers the companion objects themselves as the capability.
	///
	/// Companions whose concrete type is not `V` answer nothing.
	pub fn register_self(
		&self,
		attachments: &dyn CompanionAttachments,
		companion_kinds: &[CompanionKind],
	) -> Result<RegisterReport, LookupError>
	where
		V: Clone,
	{
		self.register_companion_provider(attachments, self_provider(), companion_kinds)
	}

	/// Appends an object fallback, consulted after the kind-specific provider.
	pub fn register_fallback(&self, provider: ObjectProviderRef<V, C>) {
		let _writer = self.fallback_write.lock();
		let mut next = Vec::clone(&self.object_fallbacks.load());
		next.push(provider);
		self.object_fallbacks.store(Arc::new(next));
	}

	/// Appends a companion fallback, consulted after every object fallback.
	pub fn register_companion_fallback(&self, provider: CompanionProviderRef<V, C>) {
		let _writer = self.fallback_write.lock();
		let mut next = Vec::clone(&self.companion_fallbacks.load());
		next.push(provider);
		self.companion_fallbacks.store(Arc::new(next));
	}

	/// Provider registered for `kind`.
	#[inline]
	pub fn provider(&self, kind: ObjectKind) -> Option<ObjectProviderRef<V, C>> {
		self.object_providers.get(&kind)
	}

	/// Provider for whatever currently occupies `position`.
	pub fn get_provider(
		&self,
		world: &dyn World,
		position: Position,
	) -> Option<ObjectProviderRef<V, C>> {
		self.provider(world.object_kind(position))
	}

	/// Companion provider registered for `kind`.
	pub fn companion_provider(&self, kind: CompanionKind) -> Option<CompanionProviderRef<V, C>> {
		self.companion_providers.get(&kind)
	}

	/// Resolves the capability at `position`.
	pub fn get(&self, world: &dyn World, position: Position, context: &C) -> Option<V> {
		let kind = world.object_kind(position);
		self.find_with_kind(world, position, kind, context)
	}

	/// Resolves the capability at `position` for a caller that already knows its kind.
	pub fn find_with_kind(
		&self,
		world: &dyn World,
		position: Position,
		kind: ObjectKind,
		context: &C,
	) -> Option<V> {
		if let Some(provider) = self.object_providers.get(&kind)
			&& let Some(value) = provider.find(world, position, kind, context)
		{
			return Some(value);
		}
		self.find_fallback(world, position, kind, context)
	}

	/// Runs only the fallback chain.
	pub fn find_fallback(
		&self,
		world: &dyn World,
		position: Position,
		kind: ObjectKind,
		context: &C,
	) -> Option<V> {
		let object_fallbacks = self.object_fallbacks.load();
		for provider in object_fallbacks.iter() {
			if let Some(value) = provider.find(world, position, kind, context) {
				return Some(value);
			}
		}

		let companion_fallbacks = self.companion_fallbacks.load();
		if companion_fallbacks.is_empty() {
			return None;
		}
		let companion = world.companion(position)?;
		companion_fallbacks
			.iter()
			.find_map(|provider| provider.find(companion.as_ref(), context))
	}

	/// Object kinds with a specific provider, in registration order.
	pub fn object_kinds(&self) -> Vec<ObjectKind> {
		self.object_providers.keys()
	}

	/// Companion kinds with a registered provider, in registration order.
	pub fn companion_kinds(&self) -> Vec<CompanionKind> {
		self.companion_providers.keys()
	}

	pub fn fallback_count(&self) -> usize {
		self.object_fallbacks.load().len() + self.companion_fallbacks.load().len()
	}

	/// Every duplicate registration seen so far.
	pub fn conflicts(&self) -> Vec<Conflict> {
		self.conflicts.lock().clone()
	}

	fn kind_name(&self, key: ConflictKey) -> Option<Arc<str>> {
		let catalog = self.kind_names.as_ref()?;
		match key {
			ConflictKey::Object(kind) => catalog.object_name(kind),
			ConflictKey::Companion(kind) => catalog.companion_name(kind),
		}
	}

	fn record_conflict(&self, key: ConflictKey) {
		let kind_name = self.kind_name(key);
		if self.policy == ConflictPolicy::Panic {
			match &kind_name {
				Some(name) => panic!("lookup '{}': duplicate provider for {key} ({name})", self.id),
				None => panic!("lookup '{}': duplicate provider for {key}", self.id),
			}
		}
		tracing::warn!(
			lookup = %self.id,
			%key,
			kind = kind_name.as_deref(),
			"duplicate provider registration; keeping the first provider",
		);
		self.conflicts.lock().push(Conflict {
			lookup: Arc::from(self.id.name()),
			key,
			kind_name,
		});
	}
}

impl<V: 'static, C: 'static> std::fmt::Debug for Lookup<V, C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Lookup")
			.field("id", &self.id)
			.field("object_kinds", &self.object_providers.len())
			.field("companion_kinds", &self.companion_providers.len())
			.field("fallbacks", &self.fallback_count())
			.finish()
	}
}

#[cfg(test)]
mod tests;
