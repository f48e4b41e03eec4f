//! Service types and their type-erased constructors.
//!
//! A service is any type the mesh can build on demand: it declares its
//! dependency fields through [`Declare`] and builds itself from a
//! [`Context`]. Binding a service stores a [`ServiceClass`], which remembers
//! how to register the declarations and how to construct an [`Instance`].

use std::any::TypeId;

use crate::context::Context;
use crate::declaration::{Declare, DeclarationTable};
use crate::error::Error;
use crate::instance::Instance;
use crate::key::short_type_name;
use crate::link::Managed;
use crate::runtime::Shared;

#[cfg(feature = "tracing")]
use tracing::debug;

/// A type the mesh instantiates lazily.
///
/// `construct` receives a context whose link is already attached, so
/// dependency fields may be read while the object is being built.
///
/// ```
/// use mesh::{Context, Declare, Declarator, Dep, Error, Link, Managed, Mesh, Service};
///
/// struct Config;
/// impl Managed for Config {}
/// impl Declare for Config {}
/// impl Service for Config {
///     fn construct(_ctx: &Context) -> Result<Self, Error> {
///         Ok(Config)
///     }
/// }
///
/// struct App {
///     link: Link,
///     config: Dep<Config>,
/// }
///
/// impl Managed for App {
///     fn link(&self) -> Option<&Link> {
///         Some(&self.link)
///     }
/// }
///
/// impl Declare for App {
///     fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
///         decl.field::<Config>("config")?;
///         Ok(())
///     }
/// }
///
/// impl Service for App {
///     fn construct(ctx: &Context) -> Result<Self, Error> {
///         let config = ctx.dep::<Config>("config")?;
///         config.get()?;
///         Ok(App { link: ctx.link(), config })
///     }
/// }
///
/// let mesh = Mesh::new("app");
/// mesh.service::<Config>()?.service::<App>()?;
/// let app = mesh.resolve_type::<App>()?;
/// assert!(app.config.get().is_ok());
/// # Ok::<(), Error>(())
/// ```
pub trait Service: Declare + Managed {
    fn construct(ctx: &Context) -> Result<Self, Error>;
}

type Build = Shared<dyn Fn(&Context) -> Result<Instance, Error>>;

/// Type-erased constructor for a bound service.
#[derive(Clone)]
pub struct ServiceClass {
    type_id: TypeId,
    type_name: &'static str,
    register: fn(&DeclarationTable) -> Result<(), Error>,
    build: Build,
}

impl ServiceClass {
    pub fn of<T: Service>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: short_type_name::<T>(),
            register: DeclarationTable::register::<T>,
            build: Shared::new(|ctx: &Context| {
                let value = Shared::new(T::construct(ctx)?);
                Ok(Instance::managed(value))
            }),
        }
    }

    /// Like [`of`](Self::of), with the built value also viewable as `I`.
    pub fn of_as<I, T, F>(cast: F) -> Self
    where
        I: ?Sized + 'static,
        T: Service,
        F: Fn(Shared<T>) -> Shared<I> + 'static,
    {
        Self {
            build: Shared::new(move |ctx: &Context| {
                let value = Shared::new(T::construct(ctx)?);
                let view = cast(value.clone());
                Ok(Instance::managed(value).with_view(view))
            }),
            ..Self::of::<T>()
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn declare_into(&self, table: &DeclarationTable) -> Result<(), Error> {
        (self.register)(table)
    }

    pub(crate) fn instantiate(&self, ctx: &Context) -> Result<Instance, Error> {
        #[cfg(feature = "tracing")]
        debug!("Constructing service {}", self.type_name);

        (self.build)(ctx)
    }
}

#[cfg(feature = "debug")]
impl std::fmt::Debug for ServiceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClass")
            .field("type_name", &self.type_name)
            .finish()
    }
}
