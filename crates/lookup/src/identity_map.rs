//! Copy-on-write map keyed by identity.
//!
//! # Mental model
//!
//! * Readers load the current [`IdentitySnapshot`] through `ArcSwap` and probe it.
//!   No lock, no allocation, and a reader never sees a half-applied write.
//! * Writers take the map's writer lock, clone the current snapshot, insert,
//!   and publish the replacement with one atomic store.
//! * Keys compare by [`IdentityKey::identity`], never by value. Two structurally
//!   equal keys that are distinct objects are distinct entries.
//!
//! # Invariants
//!
//! * An entry, once published, is never replaced or removed.
//! * A pinned snapshot is immutable: later writes are invisible through it.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::kind::{CompanionKind, ObjectKind};

/// Key types whose identity is a process-unique address or token.
pub trait IdentityKey: Clone + Send + Sync + 'static {
	fn identity(&self) -> usize;
}

impl IdentityKey for ObjectKind {
	#[inline]
	fn identity(&self) -> usize {
		self.as_u32() as usize
	}
}

impl IdentityKey for CompanionKind {
	#[inline]
	fn identity(&self) -> usize {
		self.as_u32() as usize
	}
}

impl<T: ?Sized + Send + Sync + 'static> IdentityKey for Arc<T> {
	#[inline]
	fn identity(&self) -> usize {
		Arc::as_ptr(self).cast::<()>() as usize
	}
}

impl<T: ?Sized + Sync + 'static> IdentityKey for &'static T {
	#[inline]
	fn identity(&self) -> usize {
		(*self as *const T).cast::<()>() as usize
	}
}

/// Immutable published state of an [`IdentityKeyedMap`].
///
/// Entries are kept in insertion order.
pub struct IdentitySnapshot<K, V> {
	entries: Vec<(K, V)>,
	by_identity: FxHashMap<usize, u32>,
}

impl<K: IdentityKey, V> IdentitySnapshot<K, V> {
	fn empty() -> Self {
		Self {
			entries: Vec::new(),
			by_identity: FxHashMap::default(),
		}
	}

	#[inline]
	pub fn get(&self, key: &K) -> Option<&V> {
		let idx = *self.by_identity.get(&key.identity())?;
		Some(&self.entries[idx as usize].1)
	}

	#[inline]
	pub fn contains_key(&self, key: &K) -> bool {
		self.by_identity.contains_key(&key.identity())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
		self.entries.iter().map(|(k, v)| (k, v))
	}
}

impl<K: Clone, V: Clone> Clone for IdentitySnapshot<K, V> {
	fn clone(&self) -> Self {
		Self {
			entries: self.entries.clone(),
			by_identity: self.by_identity.clone(),
		}
	}
}

/// Concurrent map with wait-free reads and serialized copy-on-write inserts.
pub struct IdentityKeyedMap<K, V> {
	snap: ArcSwap<IdentitySnapshot<K, V>>,
	write: Mutex<()>,
}

impl<K: IdentityKey, V: Clone> Default for IdentityKeyedMap<K, V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<K: IdentityKey, V: Clone> IdentityKeyedMap<K, V> {
	pub fn new() -> Self {
		Self {
			snap: ArcSwap::from_pointee(IdentitySnapshot::empty()),
			write: Mutex::new(()),
		}
	}

	/// Returns the value bound to `key`, if any.
	#[inline]
	pub fn get(&self, key: &K) -> Option<V> {
		self.snap.load().get(key).cloned()
	}

	#[inline]
	pub fn contains_key(&self, key: &K) -> bool {
		self.snap.load().contains_key(key)
	}

	/// Binds `value` to `key` unless the key is already bound.
	///
	/// Returns the existing value when the key was present, leaving the map
	/// unchanged; otherwise publishes a new snapshot and returns `None`.
	pub fn put_if_absent(&self, key: K, value: V) -> Option<V> {
		let _writer = self.write.lock();
		let cur = self.snap.load_full();
		if let Some(existing) = cur.get(&key) {
			return Some(existing.clone());
		}

		let mut next = (*cur).clone();
		let idx = next.entries.len() as u32;
		next.by_identity.insert(key.identity(), idx);
		next.entries.push((key, value));
		self.snap.store(Arc::new(next));
		None
	}

	/// Pins the current snapshot.
	pub fn snapshot(&self) -> Arc<IdentitySnapshot<K, V>> {
		self.snap.load_full()
	}

	pub fn keys(&self) -> Vec<K> {
		self.snap.load().entries.iter().map(|(k, _)| k.clone()).collect()
	}

	pub fn len(&self) -> usize {
		self.snap.load().len()
	}

	pub fn is_empty(&self) -> bool {
		self.snap.load().is_empty()
	}
}
