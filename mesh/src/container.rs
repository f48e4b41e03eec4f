//! The mesh: a binding registry, an instance cache and an optional parent.
//!
//! Resolution checks the local cache, then the local registry, and only then
//! delegates to the parent. Constants and services are connected (middleware
//! and back-reference) the first time they are resolved and cached under
//! their key; aliases and scope bindings are dispatched again on every call.
//!
//! # Examples
//!
//! ```
//! use mesh::{Error, Mesh};
//!
//! let parent = Mesh::new("parent");
//! parent.constant("Greeting", String::from("hello"))?;
//!
//! let child = Mesh::child("child", &parent);
//! child.bind_alias("Welcome", "Greeting")?;
//!
//! let greeting = child.get::<String>("Welcome")?;
//! assert_eq!(greeting.as_str(), "hello");
//! assert!(child.try_resolve("Missing")?.is_none());
//! # Ok::<(), Error>(())
//! ```

use std::collections::HashMap;

use crate::binding::{Binding, Registry};
use crate::context::Context;
use crate::declaration::DeclarationTable;
use crate::error::Error;
use crate::instance::Instance;
use crate::key::{ServiceKey, short_type_name};
use crate::link::{Link, Managed};
use crate::resolve_guard::ResolveGuard;
use crate::runtime::{Shared, Store, WeakRef};
use crate::scope::{Provider, ScopeDef, ScopeFactory};
use crate::service::{Service, ServiceClass};

#[cfg(feature = "tracing")]
use tracing::{debug, info, trace};

/// Key under which every mesh binds itself.
pub const MESH_KEY: &str = "Mesh";

/// Transform applied to every value a mesh connects.
pub type Middleware = Shared<dyn Fn(Instance) -> Instance>;

/// Handle to a container. Cloning shares the container.
pub struct Mesh {
    inner: Shared<MeshInner>,
}

pub(crate) struct MeshInner {
    name: String,
    parent: Option<Mesh>,
    registry: Store<Registry>,
    instances: Store<HashMap<ServiceKey, Instance>>,
    middleware: Store<Vec<Middleware>>,
    scopes: Store<HashMap<String, ScopeDef>>,
    declarations: DeclarationTable,
}

#[cfg(feature = "debug")]
impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("name", &self.inner.name)
            .field("parent", &self.inner.parent.as_ref().map(Mesh::name))
            .field("bindings", &self.inner.registry.borrow().keys().collect::<Vec<_>>())
            .field("instances", &self.inner.instances.borrow().keys().collect::<Vec<_>>())
            .field("middleware", &self.inner.middleware.borrow().len())
            .finish()
    }
}

impl Clone for Mesh {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new("default")
    }
}

impl Mesh {
    /// Creates a root mesh with its own declaration table.
    pub fn new(name: &str) -> Self {
        Self::build(name, None, Registry::new(), DeclarationTable::new())
    }

    /// Creates a root mesh that records declarations into `declarations`.
    pub fn with_declarations(name: &str, declarations: DeclarationTable) -> Self {
        Self::build(name, None, Registry::new(), declarations)
    }

    /// Creates a child of `parent`, sharing its declaration table.
    pub fn child(name: &str, parent: &Mesh) -> Self {
        Self::build(
            name,
            Some(parent.clone()),
            Registry::new(),
            parent.inner.declarations.clone(),
        )
    }

    pub(crate) fn with_registry(
        name: &str,
        parent: Option<Mesh>,
        registry: Registry,
        declarations: DeclarationTable,
    ) -> Self {
        Self::build(name, parent, registry, declarations)
    }

    fn build(
        name: &str,
        parent: Option<Mesh>,
        mut registry: Registry,
        declarations: DeclarationTable,
    ) -> Self {
        #[cfg(feature = "tracing")]
        info!(
            "Creating mesh \"{}\" (parent: {:?})",
            name,
            parent.as_ref().map(Mesh::name)
        );

        // Keys are never empty here, so the self-binding always succeeds.
        let _ = registry.insert(ServiceKey::new(MESH_KEY), Binding::Mesh);

        Self {
            inner: Shared::new(MeshInner {
                name: name.to_string(),
                parent,
                registry: Store::new(registry),
                instances: Store::new(HashMap::new()),
                middleware: Store::new(Vec::new()),
                scopes: Store::new(HashMap::new()),
                declarations,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parent(&self) -> Option<&Mesh> {
        self.inner.parent.as_ref()
    }

    pub fn declarations(&self) -> &DeclarationTable {
        &self.inner.declarations
    }

    /// Whether both handles refer to the same mesh.
    pub fn ptr_eq(&self, other: &Mesh) -> bool {
        Shared::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakRef<MeshInner> {
        Shared::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &WeakRef<MeshInner>) -> Option<Mesh> {
        weak.upgrade().map(|inner| Mesh { inner })
    }

    fn id(&self) -> usize {
        Shared::as_ptr(&self.inner) as usize
    }
}

// Registration
impl Mesh {
    /// Binds `T` as a lazily built service under `key`.
    pub fn bind_service<T: Service>(&self, key: impl Into<ServiceKey>) -> Result<&Self, Error> {
        self.inner.declarations.register::<T>()?;
        self.bind(key.into(), Binding::Service(ServiceClass::of::<T>()))
    }

    /// Binds `T` under its own type name.
    pub fn service<T: Service>(&self) -> Result<&Self, Error> {
        self.bind_service::<T>(ServiceKey::of::<T>())
    }

    /// Binds `T` under `key`, readable both as `T` and through `cast` as `I`.
    pub fn bind_service_as<I, T, F>(&self, key: impl Into<ServiceKey>, cast: F) -> Result<&Self, Error>
    where
        I: ?Sized + 'static,
        T: Service,
        F: Fn(Shared<T>) -> Shared<I> + 'static,
    {
        self.inner.declarations.register::<T>()?;
        self.bind(key.into(), Binding::Service(ServiceClass::of_as::<I, T, F>(cast)))
    }

    /// Binds `T` under the name of the interface `I`.
    ///
    /// ```
    /// use mesh::{Context, Declare, Error, Managed, Mesh, Service, Shared};
    ///
    /// trait Clock {
    ///     fn now(&self) -> u64;
    /// }
    ///
    /// struct FixedClock;
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> u64 {
    ///         42
    ///     }
    /// }
    /// impl Managed for FixedClock {}
    /// impl Declare for FixedClock {}
    /// impl Service for FixedClock {
    ///     fn construct(_ctx: &Context) -> Result<Self, Error> {
    ///         Ok(FixedClock)
    ///     }
    /// }
    ///
    /// let mesh = Mesh::new("app");
    /// mesh.service_as::<dyn Clock, FixedClock, _>(|c| c as Shared<dyn Clock>)?;
    /// assert_eq!(mesh.get::<dyn Clock>("Clock")?.now(), 42);
    /// # Ok::<(), Error>(())
    /// ```
    pub fn service_as<I, T, F>(&self, cast: F) -> Result<&Self, Error>
    where
        I: ?Sized + 'static,
        T: Service,
        F: Fn(Shared<T>) -> Shared<I> + 'static,
    {
        self.bind_service_as::<I, T, F>(ServiceKey::of::<I>(), cast)
    }

    pub fn bind_constant(&self, key: impl Into<ServiceKey>, value: Instance) -> Result<&Self, Error> {
        self.bind(key.into(), Binding::Constant(value))
    }

    /// Binds a plain value as a constant.
    ///
    /// The value gets no back-reference. Use
    /// [`constant_managed`](Self::constant_managed) for objects with
    /// dependency fields.
    pub fn constant<T: 'static>(&self, key: impl Into<ServiceKey>, value: T) -> Result<&Self, Error> {
        self.bind_constant(key, Instance::new(Shared::new(value)))
    }

    /// Binds an object with its own [`Link`] as a constant.
    ///
    /// The link is attached to this mesh on first resolution, after which the
    /// object's dependency fields resolve here.
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

    /// Shorthand for [`bind_alias`](Self::bind_alias).
    pub fn alias(&self, key: impl Into<ServiceKey>, target: impl Into<ServiceKey>) -> Result<&Self, Error> {
        self.bind_alias(key, target)
    }

    pub fn bind_scope(&self, key: impl Into<ServiceKey>, factory: ScopeFactory) -> Result<&Self, Error> {
        self.bind(key.into(), Binding::Scope(factory))
    }

    /// Removes the binding and the cached instance for `key`.
    pub fn unbind(&self, key: impl Into<ServiceKey>) -> Option<Binding> {
        let key = key.into();

        #[cfg(feature = "tracing")]
        info!("Unbinding \"{}\" from mesh \"{}\"", key, self.inner.name);

        self.inner.instances.borrow_mut().remove(&key);
        self.inner.registry.borrow_mut().remove(key.as_str())
    }

    /// Finds the binding for `key` locally, then in the parents when `recursive`.
    pub fn lookup(&self, key: impl Into<ServiceKey>, recursive: bool) -> Option<Binding> {
        let key = key.into();
        let local = self.inner.registry.borrow().get(key.as_str()).cloned();

        match (local, &self.inner.parent) {
            (Some(binding), _) => Some(binding),
            (None, Some(parent)) if recursive => parent.lookup(key, true),
            (None, _) => None,
        }
    }

    fn bind(&self, key: ServiceKey, binding: Binding) -> Result<&Self, Error> {
        #[cfg(feature = "tracing")]
        info!(
            "Binding \"{}\" as {} in mesh \"{}\"",
            key,
            binding.kind(),
            self.inner.name
        );

        self.inner.registry.borrow_mut().insert(key, binding)?;
        Ok(self)
    }

    pub(crate) fn local_bindings(&self) -> Vec<(ServiceKey, Binding)> {
        self.inner
            .registry
            .borrow()
            .iter()
            .map(|(key, binding)| (key.clone(), binding.clone()))
            .collect()
    }
}

// Resolution
impl Mesh {
    /// Resolves `key` or fails with `BindingNotFound`.
    pub fn resolve(&self, key: impl Into<ServiceKey>) -> Result<Instance, Error> {
        let key = key.into();
        self.resolve_key(&key)?
            .ok_or_else(|| Error::binding_not_found(&self.inner.name, key.as_str()))
    }

    /// Resolves `key`, yielding `None` when no mesh in the chain binds it.
    ///
    /// Errors other than a missing binding (a failing constructor, a cycle)
    /// are still returned.
    pub fn try_resolve(&self, key: impl Into<ServiceKey>) -> Result<Option<Instance>, Error> {
        let key = key.into();
        self.resolve_key(&key)
    }

    /// Resolves `key` and reads the value as `T`.
    pub fn get<T: ?Sized + 'static>(&self, key: impl Into<ServiceKey>) -> Result<Shared<T>, Error> {
        let key = key.into();
        let instance = self.resolve(&key)?;
        Self::downcast(&key, &instance)
    }

    pub fn try_get<T: ?Sized + 'static>(
        &self,
        key: impl Into<ServiceKey>,
    ) -> Result<Option<Shared<T>>, Error> {
        let key = key.into();
        match self.try_resolve(&key)? {
            Some(instance) => Self::downcast(&key, &instance).map(Some),
            None => Ok(None),
        }
    }

    /// Resolves the key derived from `T`'s name and reads the value as `T`.
    pub fn resolve_type<T: ?Sized + 'static>(&self) -> Result<Shared<T>, Error> {
        self.get::<T>(ServiceKey::of::<T>())
    }

    /// Resolves a scope binding to its provider.
    pub fn provider(&self, key: impl Into<ServiceKey>) -> Result<Provider, Error> {
        self.get::<Provider>(key).map(|provider| (*provider).clone())
    }

    fn downcast<T: ?Sized + 'static>(key: &ServiceKey, instance: &Instance) -> Result<Shared<T>, Error> {
        instance.get::<T>().ok_or_else(|| {
            Error::type_mismatch(key.as_str(), short_type_name::<T>(), instance.type_name())
        })
    }

    fn resolve_key(&self, key: &ServiceKey) -> Result<Option<Instance>, Error> {
        let cached = self.inner.instances.borrow().get(key).cloned();
        if let Some(instance) = cached {
            #[cfg(feature = "tracing")]
            trace!("Cache hit for \"{}\" in mesh \"{}\"", key, self.inner.name);
            return Ok(Some(instance));
        }

        let binding = self.inner.registry.borrow().get(key.as_str()).cloned();
        match binding {
            Some(binding) => self.dispatch(key, binding).map(Some),
            None => match &self.inner.parent {
                Some(parent) => {
                    #[cfg(feature = "tracing")]
                    trace!(
                        "Delegating \"{}\" from mesh \"{}\" to \"{}\"",
                        key,
                        self.inner.name,
                        parent.name()
                    );
                    parent.resolve_key(key)
                }
                None => Ok(None),
            },
        }
    }

    fn dispatch(&self, key: &ServiceKey, binding: Binding) -> Result<Instance, Error> {
        #[cfg(feature = "tracing")]
        debug!(
            "Dispatching {} binding \"{}\" in mesh \"{}\"",
            binding.kind(),
            key,
            self.inner.name
        );

        match binding {
            Binding::Constant(value) => {
                let instance = self.connect_instance(value);
                self.cache(key, &instance);
                Ok(instance)
            }
            Binding::Service(class) => {
                let _guard = ResolveGuard::push(self.id(), key.as_str())?;
                class.declare_into(&self.inner.declarations)?;
                let ctx = Context::new(
                    class.type_name(),
                    class.type_id(),
                    Link::attached(self),
                    self.inner.declarations.effective(class.type_id()),
                );
                let instance = self.connect_instance(class.instantiate(&ctx)?);
                self.cache(key, &instance);
                Ok(instance)
            }
            Binding::Alias(target) => {
                let _guard = ResolveGuard::push(self.id(), key.as_str())?;
                self.resolve_key(&target)?
                    .ok_or_else(|| Error::binding_not_found(&self.inner.name, target.as_str()))
            }
            Binding::Scope(factory) => Ok(Instance::new(Shared::new(Provider::new(
                key.clone(),
                factory,
                self.clone(),
            )))),
            Binding::Mesh => Ok(Instance::new(Shared::new(self.clone()))),
        }
    }

    fn cache(&self, key: &ServiceKey, instance: &Instance) {
        self.inner
            .instances
            .borrow_mut()
            .insert(key.clone(), instance.clone());
    }
}

// Lifecycle
impl Mesh {
    /// Registers a transform applied to every constant and service on first
    /// resolution and to every connected guest object.
    pub fn use_middleware<F>(&self, middleware: F) -> &Self
    where
        F: Fn(Instance) -> Instance + 'static,
    {
        self.inner.middleware.borrow_mut().push(Shared::new(middleware));
        self
    }

    /// Runs middleware over `instance` (this mesh's first, then each
    /// parent's) and attaches the back-reference of the result.
    pub fn connect_instance(&self, instance: Instance) -> Instance {
        let instance = self.apply_middleware(instance);
        instance.attach(self);
        instance
    }

    /// Adopts an object built outside the mesh so its dependency fields resolve here.
    pub fn connect<T: Managed>(&self, value: Shared<T>) -> Result<Shared<T>, Error> {
        let instance = self.connect_instance(Instance::managed(value));
        instance.get::<T>().ok_or_else(|| {
            Error::type_mismatch("<guest>", short_type_name::<T>(), instance.type_name())
        })
    }

    fn apply_middleware(&self, instance: Instance) -> Instance {
        let chain: Vec<Middleware> = self.inner.middleware.borrow().clone();
        let instance = chain.iter().fold(instance, |value, middleware| middleware(value));

        match &self.inner.parent {
            Some(parent) => parent.apply_middleware(instance),
            None => instance,
        }
    }
}

// Scopes
impl Mesh {
    /// The pre-binding set of scope `id`, created on first use.
    ///
    /// Defining a scope binds nothing in this mesh. Materialize it with
    /// [`create_scope`](Self::create_scope), or bind
    /// [`ScopeDef::factory`] under a key to hand out a [`Provider`].
    pub fn scope(&self, id: &str) -> Result<ScopeDef, Error> {
        Self::check_scope_id(id)?;

        if let Some(scope) = self.inner.scopes.borrow().get(id) {
            return Ok(scope.clone());
        }

        #[cfg(feature = "tracing")]
        debug!("Defining scope \"{}\" in mesh \"{}\"", id, self.inner.name);

        let scope = ScopeDef::new(id, self.inner.declarations.clone());
        self.inner
            .scopes
            .borrow_mut()
            .insert(id.to_string(), scope.clone());
        Ok(scope)
    }

    /// Materializes scope `id` into a new child mesh named `id`.
    pub fn create_scope(&self, id: &str) -> Result<Mesh, Error> {
        self.create_scope_named(id, id)
    }

    /// Materializes scope `id` into a new child mesh named `name`.
    ///
    /// A scope that was never defined yields a child with no bindings of its own.
    pub fn create_scope_named(&self, id: &str, name: &str) -> Result<Mesh, Error> {
        Self::check_scope_id(id)?;

        let scope = self.inner.scopes.borrow().get(id).cloned();
        match scope {
            Some(scope) => scope.factory(name).build(self),
            None => Ok(Mesh::child(name, self)),
        }
    }

    fn check_scope_id(id: &str) -> Result<(), Error> {
        if id.trim().is_empty() {
            return Err(Error::invalid_binding(id, "the scope id must not be empty"));
        }
        Ok(())
    }
}
