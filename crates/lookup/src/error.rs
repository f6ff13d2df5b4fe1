use thiserror::Error;

use crate::kind::TypeToken;

/// Errors raised by lookup construction and provider registration.
///
/// Query paths never produce these: "no provider" is an empty answer, and a
/// misbehaving provider panics straight through to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
	/// Input rejected by a registration or construction contract.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	/// A capability name was reused with a different capability/context pair.
	#[error(
		"capability '{name}' is registered as ({}, {}) but was requested as ({}, {})",
		.existing.0.name(),
		.existing.1.name(),
		.requested.0.name(),
		.requested.1.name()
	)]
	TypeConflict {
		/// The capability name both requests share.
		name: String,
		/// Capability and context types of the original registration.
		existing: (TypeToken, TypeToken),
		/// Capability and context types of the rejected request.
		requested: (TypeToken, TypeToken),
	},
}

impl LookupError {
	pub(crate) fn invalid(msg: impl Into<String>) -> Self {
		Self::InvalidArgument(msg.into())
	}
}
