//! Typed capability lookup for objects placed on a shared grid.
//!
//! Modules expose behaviors ("stores fluid", "burns as fuel") for whatever
//! occupies a position without depending on each other's types:
//!
//! - [`LookupRegistry`]: one [`Lookup`] per capability name, type-checked.
//! - [`Lookup`]: providers keyed by [`ObjectKind`] or [`CompanionKind`], plus
//!   ordered fallbacks.
//! - [`PositionCache`]: remembers which provider (and companion object)
//!   answered at one position until the world says otherwise.
//! - [`IdentityKeyedMap`]: the copy-on-write table underneath, read without locks.
//!
//! The host world is reached only through the [`World`] trait.

mod cache;
mod conflict;
mod error;
mod events;
mod identity_map;
mod kind;
mod lookup;
mod provider;
mod registry;
#[cfg(test)]
mod testing;
mod world;

pub use cache::PositionCache;
pub use conflict::{Conflict, ConflictKey, ConflictPolicy, RegisterReport};
pub use error::LookupError;
pub use events::CompanionBus;
pub use identity_map::{IdentityKey, IdentityKeyedMap, IdentitySnapshot};
pub use kind::{
	CapabilityId, CompanionAttachments, CompanionKind, KindCatalog, ObjectKind, TypeToken,
};
pub use lookup::Lookup;
pub use provider::{
	CompanionProvider, CompanionProviderRef, ObjectProvider, ObjectProviderRef,
	WrappedCompanionProvider, companion_provider_fn, object_provider_fn,
};
pub use registry::LookupRegistry;
pub use world::{
	Companion, CompanionEvent, CompanionObject, InvalidationHandle, InvalidationListener, Position,
	Subscription, World, downcast_companion,
};
