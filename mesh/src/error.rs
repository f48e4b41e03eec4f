//! Error types for the mesh container.
//!
//! This module defines a lightweight error model used across the crate to
//! describe failures that can occur while registering bindings, declaring
//! dependency fields, resolving keys, and reading dependency fields.
//!
//! # Design
//!
//! - `ErrorKind` captures the error category.
//! - `Error` stores the category and a human-readable message that names the
//!   mesh, key, owner type and field involved.
//!
//! Nothing in the crate retries on error: callers decide whether to recover
//! (for instance through [`Mesh::try_resolve`](crate::Mesh::try_resolve) or an
//! optional declaration) or to propagate.
//!
//! # Feature Flags
//!
//! - `tracing`: logs errors when they are created.
//! - `debug`: prefixes the kind in `Display`.
//!
//! # Examples
//!
//! ```
//! use mesh::error::{Error, ErrorKind};
//!
//! let err = Error::binding_not_found("default", "Logger");
//! assert_eq!(err.kind, ErrorKind::BindingNotFound);
//! assert!(err.message.contains("Logger"));
//! ```

use core::fmt;

#[cfg(feature = "tracing")]
use tracing::error;

/// Error categories for the container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// No mesh in the parent chain binds the requested key.
    BindingNotFound,
    /// Registration arguments did not form a valid binding.
    InvalidBinding,
    /// A declaration without an explicit key could not infer one from its type.
    KeyNotInferred,
    /// A dependency field was read on an object with no back-reference.
    InstanceNotConnected,
    /// A field was requested from a construction context that never declared it.
    NotDeclared,
    /// The resolved value is not of the requested type.
    TypeMismatch,
    /// Resolution re-entered a key that is still being resolved.
    CircularDependency,
}

/// Container error structure.
///
/// `kind` enables programmatic handling, while `message` is human-readable.
#[derive(Clone, Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    /// Creates a new error with the given kind and message.
    ///
    /// If the `tracing` feature is enabled, the error is automatically logged.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let error = Self {
            kind,
            message: message.into(),
        };

        #[cfg(feature = "tracing")]
        error!("{}", error);

        error
    }

    /// Resolution reached the root of the mesh chain without a binding.
    pub fn binding_not_found(mesh_name: &str, key: &str) -> Self {
        Self::new(
            ErrorKind::BindingNotFound,
            format!("\"{}\" not found in Mesh \"{}\"", key, mesh_name),
        )
    }

    /// A registration call could not be turned into a binding.
    pub fn invalid_binding(key: &str, reason: &str) -> Self {
        Self::new(
            ErrorKind::InvalidBinding,
            format!("Invalid binding \"{}\": {}", key, reason),
        )
    }

    /// A declaration has no explicit key and its field type has no usable name.
    pub fn key_not_inferred(owner: &str, field: &str) -> Self {
        Self::new(
            ErrorKind::KeyNotInferred,
            format!(
                "{}.{}: cannot infer the binding key from the field type; \
                 please declare the field with an explicit key",
                owner, field
            ),
        )
    }

    /// A dependency field was read before the object was connected to a mesh.
    pub fn instance_not_connected(owner: &str, field: &str) -> Self {
        Self::new(
            ErrorKind::InstanceNotConnected,
            format!(
                "{}.{}: cannot access dependency: instance is not connected to Mesh",
                owner, field
            ),
        )
    }

    /// The construction context has no declaration for the requested field.
    pub fn not_declared(owner: &str, field: &str) -> Self {
        Self::new(
            ErrorKind::NotDeclared,
            format!("{}.{}: field is not declared as a dependency", owner, field),
        )
    }

    /// The value bound under `key` cannot be viewed as `expected`.
    pub fn type_mismatch(key: &str, expected: &str, found: &str) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            format!(
                "Type mismatch when resolving \"{}\": expected {}, found {}",
                key, expected, found
            ),
        )
    }

    /// Circular dependency detected in resolution chain.
    pub fn circular_dependency(dependency_chain: &[&str]) -> Self {
        Self::new(
            ErrorKind::CircularDependency,
            format!(
                "Circular dependency detected: {}",
                dependency_chain.join(" -> ")
            ),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(feature = "debug")]
        {
            write!(f, "({:?}) - {}", self.kind, self.message)
        }
        #[cfg(not(feature = "debug"))]
        {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for Error {}
