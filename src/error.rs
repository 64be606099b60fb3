//! Error types for dependency resolution

use thiserror::Error;

/// Type-erased error raised by user-supplied constructors, factories,
/// setters and methods.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while configuring or resolving services
#[derive(Error, Debug)]
pub enum DiError {
    /// No definition exists, autoload fallback failed, and no delegate could supply the id
    #[error("no definition or constructible type found for \"{id}\"{}", format_stack(.build_stack))]
    NotFound {
        id: String,
        build_stack: Vec<String>,
    },

    /// Re-entrant build or reference cycle detected during resolution
    #[error("circular reference to \"{id}\" detected: {}", .chain.join(" -> "))]
    CircularReference { id: String, chain: Vec<String> },

    /// Malformed definition, ambiguous binding, or a dependency failing its declared type
    #[error("invalid definition: {reason}")]
    InvalidConfig { reason: String },

    /// Target type cannot be constructed (unregistered, or an interface without a binding)
    #[error("type \"{type_name}\" is not instantiable: {reason}")]
    NotInstantiable { type_name: String, reason: String },

    /// Wraps an error raised by application code during construction
    #[error("error building service \"{id}\"{}", format_stack(.build_stack))]
    Building {
        id: String,
        build_stack: Vec<String>,
        #[source]
        source: BoxError,
    },
}

fn format_stack(stack: &[String]) -> String {
    if stack.is_empty() {
        String::new()
    } else {
        format!(" (build stack: {})", stack.join(" -> "))
    }
}

impl DiError {
    /// Create a NotFound error carrying the attempted build stack
    #[inline]
    pub fn not_found(id: impl Into<String>, build_stack: Vec<String>) -> Self {
        Self::NotFound {
            id: id.into(),
            build_stack,
        }
    }

    /// Create a CircularReference error carrying the cycle chain
    #[inline]
    pub fn circular(id: impl Into<String>, chain: Vec<String>) -> Self {
        Self::CircularReference {
            id: id.into(),
            chain,
        }
    }

    /// Create an InvalidConfig error
    #[inline]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a NotInstantiable error
    #[inline]
    pub fn not_instantiable(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotInstantiable {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a foreign error raised during construction.
    ///
    /// Container-native errors travelling through a `BoxError` (a factory
    /// that forwarded a nested `get` failure) are unwrapped and propagated
    /// as-is, so callers can still pattern-match on them.
    pub fn building(id: impl Into<String>, build_stack: Vec<String>, source: BoxError) -> Self {
        match source.downcast::<DiError>() {
            Ok(native) => *native,
            Err(foreign) => Self::Building {
                id: id.into(),
                build_stack,
                source: foreign,
            },
        }
    }
}

/// Result type alias for container operations
pub type Result<T> = std::result::Result<T, DiError>;
