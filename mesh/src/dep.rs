use std::cell::OnceCell;

use crate::declaration::Declaration;
use crate::error::Error;
use crate::key::short_type_name;
use crate::link::Link;
use crate::runtime::Shared;

#[cfg(feature = "tracing")]
use tracing::trace;

/// Lazily resolved dependency field.
///
/// Reading goes through the owner's back-reference to its mesh and resolves
/// the declared key there. A resolve-once field pins the first value it sees
/// and ignores later binding changes; an uncached field resolves on every
/// read.
pub struct Dep<T: ?Sized + 'static> {
    declaration: Declaration,
    link: Link,
    pinned: OnceCell<Shared<T>>,
}

impl<T: ?Sized + 'static> Dep<T> {
    pub(crate) fn new(declaration: Declaration, link: Link) -> Self {
        Self {
            declaration,
            link,
            pinned: OnceCell::new(),
        }
    }

    /// Reads the field.
    ///
    /// Yields `Ok(None)` only for an optional field with no binding.
    pub fn resolve(&self) -> Result<Option<Shared<T>>, Error> {
        if let Some(value) = self.pinned.get() {
            #[cfg(feature = "tracing")]
            trace!(
                "Pinned value for {}.{}",
                self.declaration.owner, self.declaration.field
            );
            return Ok(Some(value.clone()));
        }

        let Declaration {
            owner, field, key, ..
        } = &self.declaration;

        let mesh = self
            .link
            .mesh()
            .ok_or_else(|| Error::instance_not_connected(owner, field))?;

        let instance = if self.declaration.optional {
            match mesh.try_resolve(key)? {
                Some(instance) => instance,
                None => return Ok(None),
            }
        } else {
            mesh.resolve(key)?
        };

        let value = instance.get::<T>().ok_or_else(|| {
            Error::type_mismatch(key.as_str(), short_type_name::<T>(), instance.type_name())
        })?;

        if self.declaration.resolve_once {
            // A re-entrant read may have pinned first; keep that one.
            let _ = self.pinned.set(value.clone());
        }

        Ok(Some(value))
    }

    /// Reads the field, treating an absent optional value as not found.
    pub fn get(&self) -> Result<Shared<T>, Error> {
        self.resolve()?.ok_or_else(|| {
            let mesh_name = self.link.mesh().map(|mesh| mesh.name().to_string());
            Error::binding_not_found(mesh_name.as_deref().unwrap_or_default(), self.declaration.key.as_str())
        })
    }

    pub fn declaration(&self) -> &Declaration {
        &self.declaration
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.get().is_some()
    }
}

#[cfg(feature = "debug")]
impl<T: ?Sized + 'static> std::fmt::Debug for Dep<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("owner", &self.declaration.owner)
            .field("field", &self.declaration.field)
            .field("key", &self.declaration.key)
            .field("pinned", &self.is_pinned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{Context, Declare, Declarator, DepOptions, ErrorKind, Managed, Mesh, Service};

    struct Bar;
    impl Managed for Bar {}
    impl Declare for Bar {}
    impl Service for Bar {
        fn construct(_ctx: &Context) -> Result<Self, Error> {
            Ok(Bar)
        }
    }

    struct Foo {
        link: Link,
        opt: Dep<Bar>,
        req: Dep<Bar>,
        live: Dep<u32>,
    }

    impl Managed for Foo {
        fn link(&self) -> Option<&Link> {
            Some(&self.link)
        }
    }

    impl Declare for Foo {
        fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
            decl.field_with::<Bar>("opt", DepOptions::new().optional())?
                .field::<Bar>("req")?
                .field_with::<u32>("live", DepOptions::new().key("Limit").uncached())?;
            Ok(())
        }
    }

    impl Service for Foo {
        fn construct(ctx: &Context) -> Result<Self, Error> {
            Ok(Self {
                link: ctx.link(),
                opt: ctx.dep("opt")?,
                req: ctx.dep("req")?,
                live: ctx.dep("live")?,
            })
        }
    }

    struct Counter {
        value: Cell<u32>,
    }

    impl Counter {
        fn incr(&self) {
            self.value.set(self.value.get() + 1);
        }
    }

    impl Managed for Counter {}
    impl Declare for Counter {}
    impl Service for Counter {
        fn construct(_ctx: &Context) -> Result<Self, Error> {
            Ok(Self { value: Cell::new(0) })
        }
    }

    struct Eager {
        link: Link,
        counter: Dep<Counter>,
    }

    impl Managed for Eager {
        fn link(&self) -> Option<&Link> {
            Some(&self.link)
        }
    }

    impl Declare for Eager {
        fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
            decl.field::<Counter>("counter")?;
            Ok(())
        }
    }

    impl Service for Eager {
        fn construct(ctx: &Context) -> Result<Self, Error> {
            let counter: Dep<Counter> = ctx.dep("counter")?;
            counter.get()?.incr();
            Ok(Self {
                link: ctx.link(),
                counter,
            })
        }
    }

    #[test]
    fn dep_is_readable_inside_constructor() {
        let mesh = Mesh::new("default");
        mesh.service::<Counter>().unwrap();
        mesh.service::<Eager>().unwrap();

        let counter = mesh.resolve_type::<Counter>().unwrap();
        let eager = mesh.resolve_type::<Eager>().unwrap();

        assert_eq!(counter.value.get(), 1);
        assert!(Shared::ptr_eq(&eager.counter.get().unwrap(), &counter));
        assert!(eager.link.is_attached());
    }

    #[test]
    fn optional_dep_resolves_when_provided() {
        let mesh = Mesh::new("default");
        mesh.service::<Bar>().unwrap();
        mesh.service::<Foo>().unwrap();

        let foo = mesh.resolve_type::<Foo>().unwrap();
        let opt = foo.opt.resolve().unwrap().expect("Bar is bound");
        let req = foo.req.get().unwrap();

        assert!(Shared::ptr_eq(&opt, &req));
    }

    #[test]
    fn optional_dep_is_absent_when_not_provided() {
        let mesh = Mesh::new("default");
        mesh.service::<Foo>().unwrap();

        let foo = mesh.resolve_type::<Foo>().unwrap();

        assert!(foo.opt.resolve().unwrap().is_none());
        assert!(!foo.opt.is_pinned());
    }

    #[test]
    fn required_dep_fails_on_read_not_on_declaration() {
        let mesh = Mesh::new("default");
        mesh.service::<Foo>().unwrap();

        let foo = mesh.resolve_type::<Foo>().unwrap();
        let err = foo.req.get().err().expect("Bar is not bound");

        assert_eq!(err.kind, ErrorKind::BindingNotFound);
        assert!(err.message.contains("\"Bar\""));
    }

    #[test]
    fn resolve_once_pins_the_first_value() {
        let mesh = Mesh::new("default");
        mesh.service::<Bar>().unwrap();
        mesh.service::<Foo>().unwrap();

        let foo = mesh.resolve_type::<Foo>().unwrap();
        let first = foo.req.get().unwrap();
        assert!(foo.req.is_pinned());

        mesh.unbind("Bar");
        mesh.service::<Bar>().unwrap();

        let again = foo.req.get().unwrap();
        assert!(Shared::ptr_eq(&first, &again));
        assert!(!Shared::ptr_eq(&again, &mesh.resolve_type::<Bar>().unwrap()));
    }

    #[test]
    fn uncached_dep_observes_rebinding() {
        let mesh = Mesh::new("default");
        mesh.service::<Foo>().unwrap();
        mesh.constant("Limit", 10u32).unwrap();

        let foo = mesh.resolve_type::<Foo>().unwrap();
        assert_eq!(*foo.live.get().unwrap(), 10);

        mesh.unbind("Limit");
        mesh.constant("Limit", 20u32).unwrap();

        assert_eq!(*foo.live.get().unwrap(), 20);
        assert!(!foo.live.is_pinned());
    }

    #[test]
    fn wrong_value_type_is_a_mismatch() {
        let mesh = Mesh::new("default");
        mesh.service::<Foo>().unwrap();
        mesh.constant("Limit", String::from("ten")).unwrap();

        let foo = mesh.resolve_type::<Foo>().unwrap();
        let err = foo.live.get().err().expect("Limit is a String");

        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn unmanaged_instance_is_not_connected() {
        let ctx = Context::detached::<Foo>().unwrap();
        let foo = Foo::construct(&ctx).unwrap();

        let err = foo.req.get().err().expect("guest is not connected");

        assert_eq!(err.kind, ErrorKind::InstanceNotConnected);
        assert!(err.message.contains("Foo.req"));
    }

    #[test]
    fn dropped_mesh_reads_as_not_connected() {
        let foo = {
            let mesh = Mesh::new("gone");
            mesh.service::<Bar>().unwrap();
            mesh.service::<Foo>().unwrap();
            mesh.resolve_type::<Foo>().unwrap()
        };

        let err = foo.req.get().err().expect("mesh was dropped");
        assert_eq!(err.kind, ErrorKind::InstanceNotConnected);
    }
}
