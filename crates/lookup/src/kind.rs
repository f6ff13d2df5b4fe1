//! Identity tokens: capability ids, object kinds and companion kinds.
//!
//! Kinds are dense `u32` tokens handed out by a [`KindCatalog`]. The token *is*
//! the identity; two kinds interned under the same name are the same kind, and
//! nothing downstream ever compares kinds by name.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::LookupError;

/// Runtime token for a Rust type, with its name kept for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeToken {
	id: TypeId,
	name: &'static str,
}

impl TypeToken {
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self {
			id: TypeId::of::<T>(),
			name: std::any::type_name::<T>(),
		}
	}

	#[inline]
	pub fn id(self) -> TypeId {
		self.id
	}

	#[inline]
	pub fn name(self) -> &'static str {
		self.name
	}
}

impl PartialEq for TypeToken {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for TypeToken {}

impl fmt::Debug for TypeToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}

/// Registry key of a lookup: a name plus the capability and context types it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityId {
	name: Arc<str>,
	capability: TypeToken,
	context: TypeToken,
}

impl CapabilityId {
	/// Builds an id after validating `name` as a `namespace:path` identifier.
	pub fn new(
		name: &str,
		capability: TypeToken,
		context: TypeToken,
	) -> Result<Self, LookupError> {
		validate_name(name)?;
		Ok(Self {
			name: Arc::from(name),
			capability,
			context,
		})
	}

	pub fn of<V: 'static, C: 'static>(name: &str) -> Result<Self, LookupError> {
		Self::new(name, TypeToken::of::<V>(), TypeToken::of::<C>())
	}

	#[inline]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[inline]
	pub fn capability(&self) -> TypeToken {
		self.capability
	}

	#[inline]
	pub fn context(&self) -> TypeToken {
		self.context
	}

	/// Returns true if both ids serve the same capability/context pair.
	pub fn same_types(&self, other: &CapabilityId) -> bool {
		self.capability == other.capability && self.context == other.context
	}
}

impl fmt::Display for CapabilityId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.name)
	}
}

fn validate_name(name: &str) -> Result<(), LookupError> {
	let Some((namespace, path)) = name.split_once(':') else {
		return Err(LookupError::invalid(format!(
			"capability name '{name}' must have the form namespace:path"
		)));
	};
	let namespace_ok = !namespace.is_empty()
		&& namespace
			.bytes()
			.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b"_-.".contains(&b));
	let path_ok = !path.is_empty()
		&& path
			.bytes()
			.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b"_-./".contains(&b));
	if namespace_ok && path_ok {
		Ok(())
	} else {
		Err(LookupError::invalid(format!(
			"capability name '{name}' contains characters outside [a-z0-9_-./]"
		)))
	}
}

/// Classification of whatever occupies a grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKind(u32);

impl ObjectKind {
	#[inline]
	pub fn as_u32(self) -> u32 {
		self.0
	}
}

/// Classification of a position's companion object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompanionKind(u32);

impl CompanionKind {
	#[inline]
	pub fn as_u32(self) -> u32 {
		self.0
	}
}

/// Answers which object kinds can carry a given companion kind.
pub trait CompanionAttachments {
	fn attached_object_kinds(&self, kind: CompanionKind) -> Vec<ObjectKind>;
}

#[derive(Default)]
struct CatalogState {
	object_names: Vec<Arc<str>>,
	object_by_name: FxHashMap<Arc<str>, ObjectKind>,
	companion_names: Vec<Arc<str>>,
	companion_by_name: FxHashMap<Arc<str>, CompanionKind>,
	attachments: Vec<Vec<ObjectKind>>,
}

/// Interner for object and companion kinds.
///
/// Interning is idempotent: the same name always yields the same token. The
/// catalog also records which object kinds each companion kind is attached
/// to, which is what companion provider registration fans out over.
#[derive(Default)]
pub struct KindCatalog {
	state: RwLock<CatalogState>,
}

impl KindCatalog {
	pub fn new() -> Self {
		Self::default()
	}

	/// Interns an object kind.
	pub fn object_kind(&self, name: &str) -> ObjectKind {
		if let Some(&kind) = self.state.read().object_by_name.get(name) {
			return kind;
		}
		let mut state = self.state.write();
		if let Some(&kind) = state.object_by_name.get(name) {
			return kind;
		}
		let kind = ObjectKind(state.object_names.len() as u32);
		let name: Arc<str> = Arc::from(name);
		state.object_names.push(name.clone());
		state.object_by_name.insert(name, kind);
		kind
	}

	/// Interns a companion kind and attaches it to `object_kinds`.
	///
	/// Calling again with the same name extends the attachment set.
	pub fn companion_kind(
		&self,
		name: &str,
		object_kinds: &[ObjectKind],
	) -> Result<CompanionKind, LookupError> {
		let mut state = self.state.write();
		for kind in object_kinds {
			if kind.0 as usize >= state.object_names.len() {
				return Err(LookupError::invalid(format!(
					"companion kind '{name}' attached to unknown {kind:?}"
				)));
			}
		}
		let kind = match state.companion_by_name.get(name) {
			Some(&kind) => kind,
			None => {
				let kind = CompanionKind(state.companion_names.len() as u32);
				let name: Arc<str> = Arc::from(name);
				state.companion_names.push(name.clone());
				state.companion_by_name.insert(name, kind);
				state.attachments.push(Vec::new());
				kind
			}
		};
		let attached = &mut state.attachments[kind.0 as usize];
		for &object in object_kinds {
			if !attached.contains(&object) {
				attached.push(object);
			}
		}
		Ok(kind)
	}

	pub fn find_object_kind(&self, name: &str) -> Option<ObjectKind> {
		self.state.read().object_by_name.get(name).copied()
	}

	pub fn find_companion_kind(&self, name: &str) -> Option<CompanionKind> {
		self.state.read().companion_by_name.get(name).copied()
	}

	pub fn object_name(&self, kind: ObjectKind) -> Option<Arc<str>> {
		self.state.read().object_names.get(kind.0 as usize).cloned()
	}

	pub fn companion_name(&self, kind: CompanionKind) -> Option<Arc<str>> {
		self.state.read().companion_names.get(kind.0 as usize).cloned()
	}

	pub fn contains_object_kind(&self, kind: ObjectKind) -> bool {
		(kind.0 as usize) < self.state.read().object_names.len()
	}

	pub fn contains_companion_kind(&self, kind: CompanionKind) -> bool {
		(kind.0 as usize) < self.state.read().companion_names.len()
	}
}

impl CompanionAttachments for KindCatalog {
	fn attached_object_kinds(&self, kind: CompanionKind) -> Vec<ObjectKind> {
		self.state
			.read()
			.attachments
			.get(kind.0 as usize)
			.cloned()
			.unwrap_or_default()
	}
}
