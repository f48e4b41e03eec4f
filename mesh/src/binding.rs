//! Binding variants and the per-mesh binding registry.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::instance::Instance;
use crate::key::ServiceKey;
use crate::scope::ScopeFactory;
use crate::service::ServiceClass;

/// A registered rule for producing the value of a key.
#[derive(Clone)]
pub enum Binding {
    /// A literal value, connected the first time it is resolved.
    Constant(Instance),
    /// A service built lazily and cached per mesh.
    Service(ServiceClass),
    /// Redirects to another key, looked up from the same mesh on every resolution.
    Alias(ServiceKey),
    /// Resolves to a [`Provider`](crate::Provider) that builds child meshes.
    Scope(ScopeFactory),
    /// The mesh's own registration under [`MESH_KEY`](crate::MESH_KEY).
    Mesh,
}

impl Binding {
    pub fn kind(&self) -> &'static str {
        match self {
            Binding::Constant(_) => "constant",
            Binding::Service(_) => "service",
            Binding::Alias(_) => "alias",
            Binding::Scope(_) => "scope",
            Binding::Mesh => "mesh",
        }
    }

    pub fn as_service(&self) -> Option<&ServiceClass> {
        match self {
            Binding::Service(class) => Some(class),
            _ => None,
        }
    }
}

#[cfg(feature = "debug")]
impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Binding::Constant(instance) => f.debug_tuple("Constant").field(instance).finish(),
            Binding::Service(class) => f.debug_tuple("Service").field(class).finish(),
            Binding::Alias(target) => f.debug_tuple("Alias").field(target).finish(),
            Binding::Scope(_) => f.write_str("Scope"),
            Binding::Mesh => f.write_str("Mesh"),
        }
    }
}

/// Map from key to binding, at most one binding per key.
#[derive(Clone, Default)]
pub struct Registry {
    entries: BTreeMap<ServiceKey, Binding>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `binding` under `key`, returning the binding it replaced.
    pub fn insert(&mut self, key: ServiceKey, binding: Binding) -> Result<Option<Binding>, Error> {
        if key.is_empty() {
            return Err(Error::invalid_binding(
                key.as_str(),
                "the key must not be empty; bind by name (\"MyService\") or by type",
            ));
        }
        Ok(self.entries.insert(key, binding))
    }

    pub fn remove(&mut self, key: &str) -> Option<Binding> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Binding> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ServiceKey, &Binding)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ServiceKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::runtime::Shared;

    fn constant(value: u32) -> Binding {
        Binding::Constant(Instance::new(Shared::new(value)))
    }

    #[test]
    fn insert_and_lookup() {
        let mut registry = Registry::new();
        registry.insert("A".into(), constant(1)).unwrap();
        registry.insert("B".into(), Binding::Alias("A".into())).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("A"));
        assert_eq!(registry.get("B").map(Binding::kind), Some("alias"));
        assert!(registry.get("C").is_none());
    }

    #[test]
    fn rebinding_overwrites_silently() {
        let mut registry = Registry::new();
        assert!(registry.insert("A".into(), constant(1)).unwrap().is_none());

        let replaced = registry.insert("A".into(), constant(2)).unwrap();

        assert!(replaced.is_some());
        assert_eq!(registry.len(), 1);
        let Some(Binding::Constant(instance)) = registry.get("A") else {
            panic!("A should be a constant");
        };
        assert_eq!(*instance.get::<u32>().unwrap(), 2);
    }

    #[test]
    fn empty_key_is_invalid() {
        let mut registry = Registry::new();
        let err = registry.insert("".into(), constant(1)).err().expect("empty key");

        assert_eq!(err.kind, ErrorKind::InvalidBinding);
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_drops_the_entry() {
        let mut registry = Registry::new();
        registry.insert("A".into(), constant(1)).unwrap();

        assert!(registry.remove("A").is_some());
        assert!(registry.remove("A").is_none());
        assert_eq!(registry.keys().count(), 0);
    }

    #[test]
    fn service_accessor() {
        let binding = Binding::Alias("X".into());
        assert!(binding.as_service().is_none());
        assert_eq!(Binding::Mesh.kind(), "mesh");
    }
}
