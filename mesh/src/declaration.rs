//! Dependency declarations.
//!
//! A type describes its dependency fields once, through [`Declare::declare`].
//! The records end up in a [`DeclarationTable`] shared by a mesh and all of
//! its children, which the mesh reads when constructing services and when
//! walking the dependency graph for diagnostics.
//!
//! Inheritance is explicit: a type that embeds another declared type calls
//! [`Declarator::inherit`], and its effective declaration set becomes its own
//! declarations followed by those of every ancestor.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

use crate::error::Error;
use crate::handler::Handler;
use crate::key::{ServiceKey, short_type_name};
use crate::runtime::{Shared, Store};

#[cfg(feature = "tracing")]
use tracing::debug;

/// A recorded dependency requirement of an owner type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub owner: &'static str,
    pub owner_id: TypeId,
    pub field: &'static str,
    pub key: ServiceKey,
    pub optional: bool,
    pub resolve_once: bool,
}

/// Options for a declared field.
///
/// Defaults: key inferred from the field type, required, resolved once.
#[derive(Clone, Debug)]
pub struct DepOptions {
    key: Option<ServiceKey>,
    optional: bool,
    resolve_once: bool,
}

impl Default for DepOptions {
    fn default() -> Self {
        Self {
            key: None,
            optional: false,
            resolve_once: true,
        }
    }
}

impl DepOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: impl Into<ServiceKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// A missing binding reads as `None` instead of failing.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Re-resolve on every read instead of pinning the first value.
    pub fn uncached(mut self) -> Self {
        self.resolve_once = false;
        self
    }
}

/// Types that declare dependency fields.
///
/// The default declares nothing, which suits leaf services.
pub trait Declare: Sized + 'static {
    fn declare(_decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
        Ok(())
    }
}

/// Collects the declarations of `T` during [`DeclarationTable::register`].
pub struct Declarator<'a, T> {
    table: &'a DeclarationTable,
    declarations: Vec<Declaration>,
    parents: Vec<TypeId>,
    handlers: Vec<Handler>,
    _owner: PhantomData<fn(&T)>,
}

impl<'a, T: Declare> Declarator<'a, T> {
    fn new(table: &'a DeclarationTable) -> Self {
        Self {
            table,
            declarations: Vec::new(),
            parents: Vec::new(),
            handlers: Vec::new(),
            _owner: PhantomData,
        }
    }

    /// Declares a required, resolve-once field keyed by the name of `D`.
    pub fn field<D: ?Sized + 'static>(&mut self, name: &'static str) -> Result<&mut Self, Error> {
        self.field_with::<D>(name, DepOptions::default())
    }

    pub fn field_with<D: ?Sized + 'static>(
        &mut self,
        name: &'static str,
        options: DepOptions,
    ) -> Result<&mut Self, Error> {
        let owner = short_type_name::<T>();
        let key = match options.key {
            Some(key) => key,
            None => ServiceKey::infer::<D>()
                .ok_or_else(|| Error::key_not_inferred(owner, name))?,
        };

        self.declarations.push(Declaration {
            owner,
            owner_id: TypeId::of::<T>(),
            field: name,
            key,
            optional: options.optional,
            resolve_once: options.resolve_once,
        });

        Ok(self)
    }

    /// Adds the declarations of `P` to the effective set of `T`.
    pub fn inherit<P: Declare>(&mut self) -> Result<&mut Self, Error> {
        self.table.register::<P>()?;
        self.parents.push(TypeId::of::<P>());
        Ok(self)
    }

    /// Like [`inherit`](Self::inherit), and also runs the handlers of `P`
    /// on the `P` that `project` reaches inside `T`.
    pub fn inherit_with<P: Declare>(&mut self, project: fn(&T) -> &P) -> Result<&mut Self, Error> {
        self.inherit::<P>()?;
        let inherited = self.table.all_handlers(TypeId::of::<P>());
        self.handlers
            .extend(inherited.iter().map(|handler| handler.project(project)));
        Ok(self)
    }

    /// Registers a named handler method, see [`Mesh::find_handlers`](crate::Mesh::find_handlers).
    pub fn handler(&mut self, name: &'static str, method: fn(&T) -> Result<(), Error>) -> &mut Self {
        self.handlers.push(Handler::new::<T>(name, method));
        self
    }
}

#[derive(Default)]
struct TableData {
    declarations: Vec<Declaration>,
    parents: HashMap<TypeId, Vec<TypeId>>,
    handlers: HashMap<TypeId, Vec<Handler>>,
    registered: HashSet<TypeId>,
}

/// Shared list of dependency declarations.
///
/// Cloning shares the table. Each type is registered at most once; later
/// calls to [`register`](Self::register) for the same type do nothing.
#[derive(Clone, Default)]
pub struct DeclarationTable {
    inner: Shared<Store<TableData>>,
}

impl DeclarationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `T::declare` and records the result.
    pub fn register<T: Declare>(&self) -> Result<(), Error> {
        let type_id = TypeId::of::<T>();

        // Marked before declaring so an inherit cycle terminates.
        if !self.inner.borrow_mut().registered.insert(type_id) {
            return Ok(());
        }

        let mut declarator = Declarator::<T>::new(self);
        if let Err(error) = T::declare(&mut declarator) {
            self.inner.borrow_mut().registered.remove(&type_id);
            return Err(error);
        }

        #[cfg(feature = "tracing")]
        debug!(
            "Registered {} declaration(s) for {}",
            declarator.declarations.len(),
            short_type_name::<T>()
        );

        let Declarator {
            declarations,
            parents,
            handlers,
            ..
        } = declarator;

        let mut data = self.inner.borrow_mut();
        data.declarations.extend(declarations);
        data.parents.insert(type_id, parents);
        data.handlers.insert(type_id, handlers);

        Ok(())
    }

    pub fn is_registered(&self, owner: TypeId) -> bool {
        self.inner.borrow().registered.contains(&owner)
    }

    /// Every declaration in registration order.
    pub fn declarations(&self) -> Vec<Declaration> {
        self.inner.borrow().declarations.clone()
    }

    /// Declarations recorded directly against `owner`.
    pub fn own(&self, owner: TypeId) -> Vec<Declaration> {
        self.inner
            .borrow()
            .declarations
            .iter()
            .filter(|declaration| declaration.owner_id == owner)
            .cloned()
            .collect()
    }

    /// Declarations of `owner` followed by those of each ancestor.
    pub fn effective(&self, owner: TypeId) -> Vec<Declaration> {
        let data = self.inner.borrow();
        let mut seen = HashSet::new();
        let mut pending = vec![owner];
        let mut result = Vec::new();

        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            result.extend(
                data.declarations
                    .iter()
                    .filter(|declaration| declaration.owner_id == current)
                    .cloned(),
            );
            if let Some(parents) = data.parents.get(&current) {
                pending.extend(parents.iter().rev());
            }
        }

        result
    }

    pub(crate) fn all_handlers(&self, owner: TypeId) -> Vec<Handler> {
        self.inner.borrow().handlers.get(&owner).cloned().unwrap_or_default()
    }

    pub(crate) fn handlers(&self, owner: TypeId, name: &str) -> Vec<Handler> {
        self.inner
            .borrow()
            .handlers
            .get(&owner)
            .map(|handlers| {
                handlers
                    .iter()
                    .filter(|handler| handler.name() == name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(feature = "debug")]
impl std::fmt::Debug for DeclarationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.inner.borrow();
        f.debug_struct("DeclarationTable")
            .field("declarations", &data.declarations)
            .field("registered", &data.registered.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct A;
    impl Declare for A {}

    struct B;
    impl Declare for B {
        fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
            decl.field::<A>("a")?;
            Ok(())
        }
    }

    struct Base;
    impl Declare for Base {
        fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
            decl.field::<A>("a")?.field::<B>("b")?;
            Ok(())
        }
    }

    struct Derived;
    impl Declare for Derived {
        fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
            decl.field_with::<String>("extra", DepOptions::new().key("Extra").optional())?
                .inherit::<Base>()?;
            Ok(())
        }
    }

    struct Pair;
    impl Declare for Pair {
        fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
            decl.field::<(u8, u8)>("pair")?;
            Ok(())
        }
    }

    struct Loop;
    impl Declare for Loop {
        fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
            decl.inherit::<Loop>()?;
            Ok(())
        }
    }

    #[test]
    fn register_records_fields_with_inferred_keys() {
        let table = DeclarationTable::new();
        table.register::<B>().unwrap();

        let own = table.own(TypeId::of::<B>());
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].owner, "B");
        assert_eq!(own[0].field, "a");
        assert_eq!(own[0].key.as_str(), "A");
        assert!(!own[0].optional);
        assert!(own[0].resolve_once);
    }

    #[test]
    fn register_runs_once_per_type() {
        let table = DeclarationTable::new();
        table.register::<B>().unwrap();
        table.register::<B>().unwrap();

        assert_eq!(table.declarations().len(), 1);
        assert!(table.is_registered(TypeId::of::<B>()));
        assert!(!table.is_registered(TypeId::of::<A>()));
    }

    #[test]
    fn effective_set_includes_ancestors() {
        let table = DeclarationTable::new();
        table.register::<Derived>().unwrap();

        let keys: Vec<_> = table
            .effective(TypeId::of::<Derived>())
            .into_iter()
            .map(|declaration| declaration.key.to_string())
            .collect();
        assert_eq!(keys, vec!["Extra", "A", "B"]);

        let extra = &table.own(TypeId::of::<Derived>())[0];
        assert!(extra.optional);
        assert_eq!(table.own(TypeId::of::<Base>()).len(), 2);
    }

    #[test]
    fn uninferable_key_fails_at_declaration() {
        let table = DeclarationTable::new();
        let err = table.register::<Pair>().err().expect("tuple key cannot be inferred");

        assert_eq!(err.kind, ErrorKind::KeyNotInferred);
        assert!(err.message.contains("Pair.pair"));
        assert!(!table.is_registered(TypeId::of::<Pair>()));
    }

    #[test]
    fn self_inheritance_terminates() {
        let table = DeclarationTable::new();
        table.register::<Loop>().unwrap();
        assert!(table.effective(TypeId::of::<Loop>()).is_empty());
    }

    #[test]
    fn options_builder() {
        let options = DepOptions::new().key("SessionId").uncached();
        assert_eq!(options.key, Some(ServiceKey::new("SessionId")));
        assert!(!options.resolve_once);
        assert!(!options.optional);
    }
}
