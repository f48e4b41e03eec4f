//! Back-references from managed objects to their owning mesh.
//!
//! A [`Link`] is a set-once slot shared by an object and all of its
//! [`Dep`](crate::Dep) fields. The mesh fills it either before running a
//! service constructor or when a guest object is adopted through
//! [`Mesh::connect`](crate::Mesh::connect). Once filled it is never
//! reassigned, so an object stays bound to the mesh that first claimed it.
//!
//! The slot holds a weak reference: an instance cached inside a mesh does not
//! keep that mesh alive. Reading through a link whose mesh has been dropped
//! behaves as if the link had never been attached.

use std::any::Any;
use std::cell::OnceCell;

use crate::container::{Mesh, MeshInner};
use crate::runtime::{Shared, WeakRef};

/// Set-once back-reference to a mesh.
#[derive(Clone, Default)]
pub struct Link {
    slot: Shared<OnceCell<WeakRef<MeshInner>>>,
}

impl Link {
    /// Creates a detached link.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attached(mesh: &Mesh) -> Self {
        let link = Self::new();
        link.attach(mesh);
        link
    }

    /// Attaches the link to `mesh`.
    ///
    /// Returns `false` when the link was already attached, in which case the
    /// existing back-reference is kept.
    pub fn attach(&self, mesh: &Mesh) -> bool {
        self.slot.set(mesh.downgrade()).is_ok()
    }

    pub fn is_attached(&self) -> bool {
        self.mesh().is_some()
    }

    /// The mesh this link points to, if attached and still alive.
    pub fn mesh(&self) -> Option<Mesh> {
        self.slot.get().and_then(Mesh::upgrade)
    }

    /// Whether both links share the same slot.
    pub fn ptr_eq(&self, other: &Link) -> bool {
        Shared::ptr_eq(&self.slot, &other.slot)
    }
}

#[cfg(feature = "debug")]
impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("mesh", &self.mesh().map(|mesh| mesh.name().to_string()))
            .finish()
    }
}

/// Objects a mesh can attach a back-reference to.
///
/// Types with dependency fields return the [`Link`] their fields share (the
/// one handed out by [`Context::link`](crate::Context::link)). Plain values
/// keep the default and are passed through `connect` untouched.
pub trait Managed: Any {
    fn link(&self) -> Option<&Link> {
        None
    }
}
