//! Named handler methods.
//!
//! A service type may tag some of its methods with a name while declaring its
//! dependencies (`decl.handler("start", Self::start)`). The mesh can later
//! find every bound service that registered a handler under a name, resolve
//! it, and call the method. This is how startup and shutdown hooks are run
//! across a whole graph without the caller knowing the services involved.

use std::any::Any;

use crate::binding::Binding;
use crate::error::Error;
use crate::instance::Instance;
use crate::key::{ServiceKey, short_type_name};
use crate::container::Mesh;
use crate::runtime::Shared;

#[cfg(feature = "tracing")]
use tracing::debug;

type Call = Shared<dyn Fn(&dyn Any) -> Result<(), Error>>;

/// A handler method registered for an owner type.
///
/// Handlers declared by an ancestor reach a derived type through the
/// projection given to [`Declarator::inherit_with`](crate::Declarator::inherit_with).
#[derive(Clone)]
pub struct Handler {
    owner: &'static str,
    name: &'static str,
    target: fn(&Instance) -> Option<Shared<dyn Any>>,
    call: Call,
}

fn target_of<T: 'static>(instance: &Instance) -> Option<Shared<dyn Any>> {
    instance.get::<T>().map(|target| target as Shared<dyn Any>)
}

impl Handler {
    pub(crate) fn new<T: 'static>(name: &'static str, method: fn(&T) -> Result<(), Error>) -> Self {
        let owner = short_type_name::<T>();
        Self {
            owner,
            name,
            target: target_of::<T>,
            call: Shared::new(move |target: &dyn Any| {
                let target = target
                    .downcast_ref::<T>()
                    .ok_or_else(|| Error::type_mismatch(name, owner, "a different handler target"))?;
                method(target)
            }),
        }
    }

    /// Runs this handler, declared on `P`, on the `P` inside a `T`.
    pub(crate) fn project<T: 'static, P: 'static>(&self, project: fn(&T) -> &P) -> Self {
        let owner = short_type_name::<T>();
        let name = self.name;
        let inner = self.call.clone();
        Self {
            owner,
            name,
            target: target_of::<T>,
            call: Shared::new(move |target: &dyn Any| {
                let target = target
                    .downcast_ref::<T>()
                    .ok_or_else(|| Error::type_mismatch(name, owner, "a different handler target"))?;
                let parent: &dyn Any = project(target);
                inner(parent)
            }),
        }
    }

    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self, instance: &Instance) -> Result<(), Error> {
        let target = (self.target)(instance).ok_or_else(|| {
            Error::type_mismatch(self.name, self.owner, instance.type_name())
        })?;
        (self.call)(&*target)
    }
}

/// A handler paired with the resolved service it runs on.
#[derive(Clone)]
pub struct BoundHandler {
    pub key: ServiceKey,
    pub target: Instance,
    handler: Handler,
}

impl BoundHandler {
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn invoke(&self) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        debug!(
            "Invoking handler {}::{} on \"{}\"",
            self.handler.owner, self.handler.name, self.key
        );

        self.handler.run(&self.target)
    }
}

impl Mesh {
    /// Resolves every service bound in this mesh whose type registered a
    /// handler called `name`, and, when `recursive`, does the same for each
    /// parent in turn.
    pub fn find_handlers(&self, name: &str, recursive: bool) -> Result<Vec<BoundHandler>, Error> {
        let mut found = Vec::new();
        let mut current = Some(self.clone());

        while let Some(mesh) = current {
            for (key, binding) in mesh.local_bindings() {
                let Binding::Service(class) = binding else {
                    continue;
                };
                class.declare_into(mesh.declarations())?;
                for handler in mesh.declarations().handlers(class.type_id(), name) {
                    found.push(BoundHandler {
                        key: key.clone(),
                        target: mesh.resolve(&key)?,
                        handler,
                    });
                }
            }
            current = if recursive { mesh.parent().cloned() } else { None };
        }

        Ok(found)
    }

    /// Runs the handlers found by [`find_handlers`](Self::find_handlers) in
    /// order, stopping at the first error.
    pub fn invoke_handlers(&self, name: &str, recursive: bool) -> Result<usize, Error> {
        let handlers = self.find_handlers(name, recursive)?;
        for handler in &handlers {
            handler.invoke()?;
        }
        Ok(handlers.len())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::{Context, Declare, Declarator, Managed, Service};

    #[derive(Default)]
    struct Journal {
        entries: RefCell<Vec<String>>,
    }

    impl Managed for Journal {}
    impl Declare for Journal {}
    impl Service for Journal {
        fn construct(_ctx: &Context) -> Result<Self, Error> {
            Ok(Self::default())
        }
    }

    struct Server;

    impl Server {
        fn start(&self) -> Result<(), Error> {
            Ok(())
        }
    }

    impl Managed for Server {}
    impl Declare for Server {
        fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
            decl.handler("start", Server::start);
            Ok(())
        }
    }
    impl Service for Server {
        fn construct(_ctx: &Context) -> Result<Self, Error> {
            Ok(Server)
        }
    }

    struct Worker {
        link: crate::Link,
        journal: crate::Dep<Journal>,
    }

    impl Worker {
        fn start(&self) -> Result<(), Error> {
            self.journal.get()?.entries.borrow_mut().push("worker started".into());
            Ok(())
        }

        fn stop(&self) -> Result<(), Error> {
            Err(Error::new(crate::ErrorKind::InvalidBinding, "worker refused to stop"))
        }
    }

    impl Managed for Worker {
        fn link(&self) -> Option<&crate::Link> {
            Some(&self.link)
        }
    }
    impl Declare for Worker {
        fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
            decl.field::<Journal>("journal")?;
            decl.handler("start", Worker::start).handler("stop", Worker::stop);
            Ok(())
        }
    }
    impl Service for Worker {
        fn construct(ctx: &Context) -> Result<Self, Error> {
            Ok(Self {
                link: ctx.link(),
                journal: ctx.dep("journal")?,
            })
        }
    }

    #[test]
    fn finds_handlers_of_bound_services() {
        let mesh = Mesh::new("app");
        mesh.service::<Journal>().unwrap();
        mesh.service::<Server>().unwrap();
        mesh.service::<Worker>().unwrap();

        let handlers = mesh.find_handlers("start", false).unwrap();
        let keys: Vec<_> = handlers.iter().map(|h| h.key.to_string()).collect();
        assert_eq!(keys, vec!["Server", "Worker"]);
        assert!(handlers.iter().all(|h| h.handler().name() == "start"));
        assert!(mesh.find_handlers("missing", true).unwrap().is_empty());
    }

    #[test]
    fn invoke_runs_handlers_on_resolved_instances() {
        let mesh = Mesh::new("app");
        mesh.service::<Journal>().unwrap();
        mesh.service::<Worker>().unwrap();

        assert_eq!(mesh.invoke_handlers("start", false).unwrap(), 1);

        let journal = mesh.resolve_type::<Journal>().unwrap();
        assert_eq!(*journal.entries.borrow(), vec!["worker started".to_string()]);
    }

    #[test]
    fn recursive_lookup_walks_parents() {
        let parent = Mesh::new("parent");
        parent.service::<Server>().unwrap();
        let child = Mesh::child("child", &parent);
        child.service::<Journal>().unwrap();
        child.service::<Worker>().unwrap();

        assert_eq!(child.find_handlers("start", false).unwrap().len(), 1);
        assert_eq!(child.find_handlers("start", true).unwrap().len(), 2);
    }

    #[test]
    fn invoke_stops_at_first_error() {
        let mesh = Mesh::new("app");
        mesh.service::<Journal>().unwrap();
        mesh.service::<Worker>().unwrap();

        let err = mesh.invoke_handlers("stop", false).err().expect("stop fails");
        assert!(err.message.contains("refused"));
    }

    #[derive(Default)]
    struct Base {
        started: std::cell::Cell<u32>,
    }

    impl Base {
        fn start(&self) -> Result<(), Error> {
            self.started.set(self.started.get() + 1);
            Ok(())
        }
    }

    impl Managed for Base {}
    impl Declare for Base {
        fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
            decl.handler("start", Base::start);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Derived {
        base: Base,
    }

    impl Managed for Derived {}
    impl Declare for Derived {
        fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
            decl.inherit_with::<Base>(|derived| &derived.base)?;
            Ok(())
        }
    }
    impl Service for Derived {
        fn construct(_ctx: &Context) -> Result<Self, Error> {
            Ok(Self::default())
        }
    }

    #[test]
    fn inherited_handlers_run_on_the_derived_service() {
        let mesh = Mesh::new("app");
        mesh.service::<Derived>().unwrap();

        let handlers = mesh.find_handlers("start", false).unwrap();
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].handler().owner(), "Derived");

        assert_eq!(mesh.invoke_handlers("start", false).unwrap(), 1);
        let derived = mesh.resolve_type::<Derived>().unwrap();
        assert_eq!(derived.base.started.get(), 1);
    }

    #[test]
    fn plain_inherit_keeps_handlers_on_their_owner() {
        struct Bare;
        impl Managed for Bare {}
        impl Declare for Bare {
            fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
                decl.inherit::<Base>()?;
                Ok(())
            }
        }
        impl Service for Bare {
            fn construct(_ctx: &Context) -> Result<Self, Error> {
                Ok(Bare)
            }
        }

        let mesh = Mesh::new("app");
        mesh.service::<Bare>().unwrap();
        assert!(mesh.find_handlers("start", false).unwrap().is_empty());
    }
}
