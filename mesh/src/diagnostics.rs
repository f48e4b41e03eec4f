//! Dependency graph inspection.
//!
//! These walks read the binding registries and the declaration table only.
//! Nothing is instantiated, so they are safe to run before any service
//! constructor could succeed, e.g. to report missing bindings at startup.

use std::collections::HashSet;
use std::vec;

use crate::binding::Binding;
use crate::declaration::Declaration;
use crate::error::Error;
use crate::key::ServiceKey;
use crate::container::Mesh;
use crate::service::ServiceClass;

#[cfg(feature = "tracing")]
use tracing::debug;

/// Iterator over the bindings of a mesh and then of each of its parents.
///
/// Each registry is snapshotted when the walk reaches it. Keys shadowed by a
/// child are yielded again for the parent.
pub struct AllBindings {
    pending: vec::IntoIter<(ServiceKey, Binding)>,
    next_mesh: Option<Mesh>,
}

impl Iterator for AllBindings {
    type Item = (ServiceKey, Binding);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.pending.next() {
                return Some(entry);
            }
            let mesh = self.next_mesh.take()?;
            self.pending = mesh.local_bindings().into_iter();
            self.next_mesh = mesh.parent().cloned();
        }
    }
}

impl Mesh {
    pub fn all_bindings(&self) -> AllBindings {
        AllBindings {
            pending: Vec::new().into_iter(),
            next_mesh: Some(self.clone()),
        }
    }

    /// Declarations reachable from `class`, depth first.
    ///
    /// A key is reported once per `visited` set. When a key is bound to a
    /// service anywhere in the chain, that service's declarations follow it.
    pub fn traverse_class_deps(
        &self,
        class: &ServiceClass,
        visited: &mut HashSet<ServiceKey>,
    ) -> Result<Vec<Declaration>, Error> {
        class.declare_into(self.declarations())?;

        let mut found = Vec::new();
        for declaration in self.declarations().effective(class.type_id()) {
            if !visited.insert(declaration.key.clone()) {
                continue;
            }
            let key = declaration.key.clone();
            found.push(declaration);

            if let Some(Binding::Service(next)) = self.lookup(&key, true) {
                found.extend(self.traverse_class_deps(&next, visited)?);
            }
        }

        Ok(found)
    }

    /// Every declaration reachable from the service bindings of this mesh and its parents.
    pub fn all_deps(&self) -> Result<Vec<Declaration>, Error> {
        let mut visited = HashSet::new();
        let mut deps = Vec::new();

        for (_, binding) in self.all_bindings() {
            if let Binding::Service(class) = binding {
                deps.extend(self.traverse_class_deps(&class, &mut visited)?);
            }
        }

        #[cfg(feature = "tracing")]
        debug!("Mesh \"{}\" has {} reachable dependencies", self.name(), deps.len());

        Ok(deps)
    }

    /// The subset of [`all_deps`](Self::all_deps) whose key no mesh in the chain binds.
    ///
    /// ```
    /// use mesh::{Context, Declare, Declarator, Error, Managed, Mesh, Service};
    ///
    /// struct Mailer;
    /// impl Managed for Mailer {}
    /// impl Declare for Mailer {
    ///     fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
    ///         decl.field::<String>("smtp_host")?;
    ///         Ok(())
    ///     }
    /// }
    /// impl Service for Mailer {
    ///     fn construct(_ctx: &Context) -> Result<Self, Error> {
    ///         Ok(Mailer)
    ///     }
    /// }
    ///
    /// let mesh = Mesh::new("app");
    /// mesh.service::<Mailer>()?;
    /// let missing = mesh.missing_deps()?;
    /// assert_eq!(missing.len(), 1);
    /// assert_eq!(missing[0].key.as_str(), "String");
    /// # Ok::<(), Error>(())
    /// ```
    pub fn missing_deps(&self) -> Result<Vec<Declaration>, Error> {
        Ok(self
            .all_deps()?
            .into_iter()
            .filter(|declaration| self.lookup(&declaration.key, true).is_none())
            .collect())
    }
}
