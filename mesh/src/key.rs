//! Service keys.
//!
//! Every binding, cache entry and declaration is stored under the string form
//! of a key. A key is either written out directly (`"SessionId"`) or derived
//! from a type, in which case the short name of the type is used
//! (`crate::services::Logger` and `dyn crate::services::Logger` both become
//! `"Logger"`). Two distinct types with the same short name map to the same
//! key; lookups cannot tell them apart.

use std::borrow::Borrow;
use std::fmt;

/// String identity under which a binding is stored and looked up.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceKey(String);

impl ServiceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key derived from the name of `T`.
    ///
    /// Falls back to the full type name when no short name can be inferred,
    /// so this never fails. Use [`ServiceKey::infer`] when the caller needs to
    /// know whether inference succeeded.
    ///
    /// ```
    /// use mesh::ServiceKey;
    ///
    /// trait Logger {}
    /// struct Database;
    ///
    /// assert_eq!(ServiceKey::of::<Database>().as_str(), "Database");
    /// assert_eq!(ServiceKey::of::<dyn Logger>().as_str(), "Logger");
    /// ```
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::infer::<T>().unwrap_or_else(|| Self::new(std::any::type_name::<T>()))
    }

    /// Key derived from the name of `T`, or `None` when `T` has no plain name.
    ///
    /// Structural types (tuples, slices, arrays, references, pointers, function
    /// pointers), closures and generic instantiations have no unambiguous name.
    pub fn infer<T: ?Sized + 'static>() -> Option<Self> {
        short_name(std::any::type_name::<T>()).map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Short display name of `T`, used in error messages and diagnostics.
pub fn short_type_name<T: ?Sized + 'static>() -> &'static str {
    let full = std::any::type_name::<T>();
    short_name(full).unwrap_or(full)
}

fn short_name(full: &'static str) -> Option<&'static str> {
    let mut name = full.trim();
    if let Some(rest) = name.strip_prefix("dyn ") {
        name = rest;
    }
    // `dyn Trait + Send` keys on the principal trait
    if let Some((principal, _)) = name.split_once(" + ") {
        name = principal;
    }

    if name.is_empty()
        || name.starts_with(['(', '[', '&', '*'])
        || name.starts_with("fn(")
        || name.starts_with("unsafe ")
        || name.starts_with("extern ")
        || name.contains(['<', '{', '(', ' '])
    {
        return None;
    }

    name.rsplit("::").next().filter(|short| !short.is_empty())
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ServiceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServiceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServiceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ServiceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&String> for ServiceKey {
    fn from(key: &String) -> Self {
        Self::new(key.as_str())
    }
}

impl From<&ServiceKey> for ServiceKey {
    fn from(key: &ServiceKey) -> Self {
        key.clone()
    }
}
