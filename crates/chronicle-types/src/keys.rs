//! Type-safe identifier wrappers around plain strings.
//!
//! Scope, world, and entity identifiers arrive on the bus as free-form
//! strings minted by external producers (`"player:42"`, `"loc:market"`).
//! Wrapping them in distinct newtypes prevents accidental mixing at
//! compile time while keeping the wire format untouched. Event ids are
//! also strings, but [`EventId::generate`] mints UUID v7 values
//! (time-ordered) for events the engine emits itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// View the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner [`String`].
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_key! {
    /// Unique identifier for a scope (the key under which its narrator
    /// agent is registered).
    ScopeId
}

define_key! {
    /// Unique identifier for the world a scope belongs to.
    WorldId
}

define_key! {
    /// Unique identifier for an entity referenced by a scope (player,
    /// place, group).
    EntityId
}

define_key! {
    /// Unique identifier for an event on the bus.
    EventId
}

impl EventId {
    /// Mint a fresh event id using UUID v7 (time-ordered).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}
