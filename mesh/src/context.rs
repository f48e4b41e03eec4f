//! Construction context handed to [`Service::construct`](crate::Service::construct).
//!
//! Before a service constructor runs, the mesh creates a [`Context`] whose
//! [`Link`] already points at the mesh. Dependency fields built from the
//! context share that link, so they resolve correctly from inside the
//! constructor itself, before the finished object exists.
//!
//! Objects built outside a mesh use [`Context::detached`]. Their fields fail
//! with `InstanceNotConnected` until the object is adopted with
//! [`Mesh::connect`](crate::Mesh::connect).

use std::any::TypeId;

use crate::declaration::{Declaration, DeclarationTable};
use crate::dep::Dep;
use crate::error::Error;
use crate::key::short_type_name;
use crate::link::Link;
use crate::container::Mesh;
use crate::service::Service;
use crate::runtime::Shared;

pub struct Context {
    owner: &'static str,
    owner_id: TypeId,
    link: Link,
    declarations: Shared<[Declaration]>,
}

impl Context {
    pub(crate) fn new(
        owner: &'static str,
        owner_id: TypeId,
        link: Link,
        declarations: Vec<Declaration>,
    ) -> Self {
        Self {
            owner,
            owner_id,
            link,
            declarations: declarations.into(),
        }
    }

    /// Context for building `T` outside any mesh.
    ///
    /// ```
    /// use mesh::{Context, Declare, Error, ErrorKind, Managed, Mesh, Service, Shared};
    ///
    /// struct Clock;
    /// impl Managed for Clock {}
    /// impl Declare for Clock {}
    /// impl Service for Clock {
    ///     fn construct(_ctx: &Context) -> Result<Self, Error> {
    ///         Ok(Clock)
    ///     }
    /// }
    ///
    /// let ctx = Context::detached::<Clock>()?;
    /// assert!(!ctx.link().is_attached());
    /// let guest = Shared::new(Clock::construct(&ctx)?);
    /// let mesh = Mesh::new("app");
    /// mesh.connect(guest)?;
    /// # Ok::<(), Error>(())
    /// ```
    pub fn detached<T: Service>() -> Result<Self, Error> {
        let table = DeclarationTable::new();
        table.register::<T>()?;
        let owner_id = TypeId::of::<T>();
        Ok(Self::new(
            short_type_name::<T>(),
            owner_id,
            Link::new(),
            table.effective(owner_id),
        ))
    }

    /// Short name of the type being constructed.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn owner_id(&self) -> TypeId {
        self.owner_id
    }

    /// The back-reference shared by the object under construction and its fields.
    pub fn link(&self) -> Link {
        self.link.clone()
    }

    /// The mesh constructing the object, `None` for a detached context.
    pub fn mesh(&self) -> Option<Mesh> {
        self.link.mesh()
    }

    /// Effective declarations of the owner, own fields first.
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Builds the accessor for the declared field `field`.
    pub fn dep<T: ?Sized + 'static>(&self, field: &str) -> Result<Dep<T>, Error> {
        let declaration = self
            .declarations
            .iter()
            .find(|declaration| declaration.field == field)
            .ok_or_else(|| Error::not_declared(self.owner, field))?;

        Ok(Dep::new(declaration.clone(), self.link.clone()))
    }
}

#[cfg(feature = "debug")]
impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("owner", &self.owner)
            .field("link", &self.link)
            .field("declarations", &self.declarations.len())
            .finish()
    }
}
