//! Duplicate-registration vocabulary.

use std::fmt;
use std::sync::Arc;

use crate::kind::{CompanionKind, ObjectKind};

/// How a lookup reacts when a kind that already has a provider is registered again.
///
/// The first registration is kept under every policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
	/// Log a warning and record the conflict.
	#[default]
	Warn,
	/// Panic with the conflicting key. Meant for contract-checking test builds.
	Panic,
}

impl ConflictPolicy {
	/// Returns the policy selected by the `registry-contracts` feature.
	#[inline]
	pub fn for_contracts() -> Self {
		if cfg!(feature = "registry-contracts") {
			ConflictPolicy::Panic
		} else {
			ConflictPolicy::Warn
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKey {
	Object(ObjectKind),
	Companion(CompanionKind),
}

impl fmt::Display for ConflictKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Object(kind) => write!(f, "object kind {}", kind.as_u32()),
			Self::Companion(kind) => write!(f, "companion kind {}", kind.as_u32()),
		}
	}
}

/// A registration that lost to an earlier provider for the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
	/// Name of the lookup the registration targeted.
	pub lookup: Arc<str>,
	pub key: ConflictKey,
	/// Catalog name of the key's kind, when the lookup knows its catalog.
	pub kind_name: Option<Arc<str>>,
}

/// Outcome of one registration call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterReport {
	/// Keys now served by the registered provider.
	pub installed: Vec<ConflictKey>,
	/// Keys that already had a provider and kept it.
	pub conflicting: Vec<ConflictKey>,
}

impl RegisterReport {
	pub fn is_clean(&self) -> bool {
		self.conflicting.is_empty()
	}

	pub(crate) fn merge(&mut self, other: RegisterReport) {
		self.installed.extend(other.installed);
		self.conflicting.extend(other.conflicting);
	}
}
