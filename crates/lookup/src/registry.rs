//! Name-keyed registry of capability lookups.
//!
//! One [`Lookup`] exists per capability name. The registry remembers the
//! capability/context pair each name was first requested with and refuses to
//! hand the same name out under any other pair. Construct one registry during
//! process setup and pass it to every module that registers providers.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::conflict::ConflictPolicy;
use crate::error::LookupError;
use crate::kind::{CapabilityId, KindCatalog};
use crate::lookup::Lookup;

struct Entry {
	id: CapabilityId,
	lookup: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct LookupRegistry {
	policy: ConflictPolicy,
	catalog: Option<Arc<KindCatalog>>,
	lookups: Mutex<FxHashMap<Arc<str>, Entry>>,
}

impl LookupRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a registry whose lookups react to duplicates per `policy`.
	pub fn with_policy(policy: ConflictPolicy) -> Self {
		Self {
			policy,
			..Self::default()
		}
	}

	/// Names kinds through `catalog` in the conflict reports of lookups
	/// created from now on.
	pub fn with_catalog(mut self, catalog: Arc<KindCatalog>) -> Self {
		self.catalog = Some(catalog);
		self
	}

	#[inline]
	pub fn policy(&self) -> ConflictPolicy {
		self.policy
	}

	/// Returns the lookup registered under `name`, creating it on first use.
	///
	/// # Errors
	///
	/// * [`LookupError::InvalidArgument`] if `name` is not `namespace:path`.
	/// * [`LookupError::TypeConflict`] if `name` already serves another
	///   capability/context pair.
	pub fn get_or_create<V: 'static, C: 'static>(
		&self,
		name: &str,
	) -> Result<Arc<Lookup<V, C>>, LookupError> {
		let requested = CapabilityId::of::<V, C>(name)?;
		let mut lookups = self.lookups.lock();
		if let Some(entry) = lookups.get(name) {
			return downcast_entry(entry, &requested);
		}

		tracing::debug!(
			lookup = %requested,
			capability = requested.capability().name(),
			context = requested.context().name(),
			"created capability lookup"
		);
		let lookup = Arc::new(
			Lookup::<V, C>::new(requested.clone(), self.policy).with_kind_names(self.catalog.clone()),
		);
		lookups.insert(
			Arc::from(name),
			Entry {
				id: requested,
				lookup: lookup.clone(),
			},
		);
		Ok(lookup)
	}

	/// Returns the lookup registered under `name` without creating it.
	pub fn get<V: 'static, C: 'static>(
		&self,
		name: &str,
	) -> Result<Option<Arc<Lookup<V, C>>>, LookupError> {
		let requested = CapabilityId::of::<V, C>(name)?;
		let lookups = self.lookups.lock();
		lookups
			.get(name)
			.map(|entry| downcast_entry(entry, &requested))
			.transpose()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.lookups.lock().contains_key(name)
	}

	/// Ids of every registered lookup, sorted by name.
	pub fn ids(&self) -> Vec<CapabilityId> {
		let mut ids: Vec<_> = self
			.lookups
			.lock()
			.values()
			.map(|entry| entry.id.clone())
			.collect();
		ids.sort_unstable_by(|a, b| a.name().cmp(b.name()));
		ids
	}

	pub fn len(&self) -> usize {
		self.lookups.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lookups.lock().is_empty()
	}
}

fn downcast_entry<V: 'static, C: 'static>(
	entry: &Entry,
	requested: &CapabilityId,
) -> Result<Arc<Lookup<V, C>>, LookupError> {
	let conflict = || LookupError::TypeConflict {
		name: requested.name().to_owned(),
		existing: (entry.id.capability(), entry.id.context()),
		requested: (requested.capability(), requested.context()),
	};
	if !entry.id.same_types(requested) {
		return Err(conflict());
	}
	entry
		.lookup
		.clone()
		.downcast::<Lookup<V, C>>()
		.map_err(|_| conflict())
}
