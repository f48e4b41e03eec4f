//! Scopes: child meshes built on demand.
//!
//! A scope binding stores a [`ScopeFactory`]. Resolving the key yields a
//! [`Provider`], a callable that builds a fresh child mesh each time it is
//! asked. Services bound only on the parent stay shared by every child, while
//! bindings made inside a child belong to that child alone.
//!
//! [`Mesh::scope`](crate::Mesh::scope) offers a declarative form: a
//! [`ScopeDef`] collects bindings up front, and each materialized child starts
//! with a copy of them. Binding [`ScopeDef::factory`] under a key turns the
//! definition into a provider.

use crate::binding::{Binding, Registry};
use crate::declaration::DeclarationTable;
use crate::error::Error;
use crate::instance::Instance;
use crate::key::ServiceKey;
use crate::link::Managed;
use crate::container::Mesh;
use crate::runtime::{Shared, Store};
use crate::service::{Service, ServiceClass};

#[cfg(feature = "tracing")]
use tracing::info;

type MakeScope = Shared<dyn Fn(&Mesh) -> Result<Mesh, Error>>;

/// Builds child meshes for a scope binding.
#[derive(Clone)]
pub struct ScopeFactory {
    make: MakeScope,
}

impl ScopeFactory {
    /// Factory that takes no arguments; the provider's parent is ignored.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Mesh + 'static,
    {
        Self {
            make: Shared::new(move |_parent: &Mesh| Ok(factory())),
        }
    }

    /// Constructor that receives the parent of the mesh it builds.
    pub fn child<F>(constructor: F) -> Self
    where
        F: Fn(&Mesh) -> Mesh + 'static,
    {
        Self {
            make: Shared::new(move |parent: &Mesh| Ok(constructor(parent))),
        }
    }

    /// Fallible variant of [`child`](Self::child).
    pub fn try_child<F>(constructor: F) -> Self
    where
        F: Fn(&Mesh) -> Result<Mesh, Error> + 'static,
    {
        Self {
            make: Shared::new(constructor),
        }
    }

    pub(crate) fn build(&self, parent: &Mesh) -> Result<Mesh, Error> {
        (self.make)(parent)
    }
}

/// The value a scope key resolves to.
///
/// Providers do not cache: every call to [`provide`](Self::provide) builds a
/// new mesh unless the factory itself memoizes.
#[derive(Clone)]
pub struct Provider {
    key: ServiceKey,
    factory: ScopeFactory,
    owner: Mesh,
}

impl Provider {
    pub(crate) fn new(key: ServiceKey, factory: ScopeFactory, owner: Mesh) -> Self {
        Self {
            key,
            factory,
            owner,
        }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// Builds a child mesh under `parent`, or under the mesh that owns the
    /// scope binding when `parent` is `None`.
    pub fn provide(&self, parent: Option<&Mesh>) -> Result<Mesh, Error> {
        let parent = parent.unwrap_or(&self.owner);

        #[cfg(feature = "tracing")]
        info!("Providing scope \"{}\" under mesh \"{}\"", self.key, parent.name());

        self.factory.build(parent)
    }
}

/// Pre-binding set of a named scope.
///
/// Cloning shares the set. Bindings added after a child was materialized do
/// not reach that child.
#[derive(Clone)]
pub struct ScopeDef {
    id: String,
    registry: Shared<Store<Registry>>,
    declarations: DeclarationTable,
}

impl ScopeDef {
    pub(crate) fn new(id: &str, declarations: DeclarationTable) -> Self {
        Self {
            id: id.to_string(),
            registry: Shared::new(Store::new(Registry::new())),
            declarations,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bind_service<T: Service>(&self, key: impl Into<ServiceKey>) -> Result<&Self, Error> {
        self.declarations.register::<T>()?;
        self.bind(key.into(), Binding::Service(ServiceClass::of::<T>()))
    }

    pub fn service<T: Service>(&self) -> Result<&Self, Error> {
        self.bind_service::<T>(ServiceKey::of::<T>())
    }

    pub fn bind_service_as<I, T, F>(&self, key: impl Into<ServiceKey>, cast: F) -> Result<&Self, Error>
    where
        I: ?Sized + 'static,
        T: Service,
        F: Fn(Shared<T>) -> Shared<I> + 'static,
    {
        self.declarations.register::<T>()?;
        self.bind(key.into(), Binding::Service(ServiceClass::of_as::<I, T, F>(cast)))
    }

    pub fn bind_constant(&self, key: impl Into<ServiceKey>, value: Instance) -> Result<&Self, Error> {
        self.bind(key.into(), Binding::Constant(value))
    }

    pub fn constant<T: 'static>(&self, key: impl Into<ServiceKey>, value: T) -> Result<&Self, Error> {
        self.bind_constant(key, Instance::new(Shared::new(value)))
    }

    pub fn constant_managed<T: Managed>(&self, key: impl Into<ServiceKey>, value: T) -> Result<&Self, Error> {
        self.bind_constant(key, Instance::managed(Shared::new(value)))
    }

    pub fn bind_alias(
        &self,
        key: impl Into<ServiceKey>,
        target: impl Into<ServiceKey>,
    ) -> Result<&Self, Error> {
        self.bind(key.into(), Binding::Alias(target.into()))
    }

    pub fn bind_scope(&self, key: impl Into<ServiceKey>, factory: ScopeFactory) -> Result<&Self, Error> {
        self.bind(key.into(), Binding::Scope(factory))
    }

    /// Snapshot of the current pre-bindings.
    pub fn registry(&self) -> Registry {
        self.registry.borrow().clone()
    }

    fn bind(&self, key: ServiceKey, binding: Binding) -> Result<&Self, Error> {
        self.registry.borrow_mut().insert(key, binding)?;
        Ok(self)
    }

    /// Factory that materializes this definition as a child named `name`.
    ///
    /// Each child copies the pre-bindings present when it is built.
    pub fn factory(&self, name: &str) -> ScopeFactory {
        let registry = self.registry.clone();
        let name = name.to_string();
        ScopeFactory::child(move |parent: &Mesh| {
            Mesh::with_registry(
                &name,
                Some(parent.clone()),
                registry.borrow().clone(),
                parent.declarations().clone(),
            )
        })
    }
}

#[cfg(feature = "debug")]
impl std::fmt::Debug for ScopeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeDef")
            .field("id", &self.id)
            .field("bindings", &self.registry.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}
