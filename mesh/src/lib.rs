//! Hierarchical IoC container.
//!
//! A [`Mesh`] maps keys to bindings (constants, lazily built services,
//! aliases and scopes) and resolves them on demand, delegating to its parent
//! when a key is not bound locally. Services declare their dependency fields
//! once; each field is a [`Dep`] that reads through the owning mesh the first
//! time it is used.
//!
//! ```
//! use mesh::{Context, Declare, Declarator, Dep, Error, Link, Managed, Mesh, Service};
//!
//! struct Repository;
//! impl Managed for Repository {}
//! impl Declare for Repository {}
//! impl Service for Repository {
//!     fn construct(_ctx: &Context) -> Result<Self, Error> {
//!         Ok(Repository)
//!     }
//! }
//!
//! struct Handler {
//!     link: Link,
//!     repository: Dep<Repository>,
//! }
//!
//! impl Managed for Handler {
//!     fn link(&self) -> Option<&Link> {
//!         Some(&self.link)
//!     }
//! }
//!
//! impl Declare for Handler {
//!     fn declare(decl: &mut Declarator<'_, Self>) -> Result<(), Error> {
//!         decl.field::<Repository>("repository")?;
//!         Ok(())
//!     }
//! }
//!
//! impl Service for Handler {
//!     fn construct(ctx: &Context) -> Result<Self, Error> {
//!         Ok(Handler { link: ctx.link(), repository: ctx.dep("repository")? })
//!     }
//! }
//!
//! let app = Mesh::new("app");
//! app.service::<Repository>()?;
//! app.scope("request")?.service::<Handler>()?;
//!
//! let request = app.create_scope("request")?;
//! let handler = request.resolve_type::<Handler>()?;
//! assert!(handler.repository.get().is_ok());
//! assert!(app.missing_deps()?.is_empty());
//! # Ok::<(), Error>(())
//! ```

pub mod binding;
pub mod container;
pub mod context;
pub mod declaration;
pub mod dep;
pub mod diagnostics;
pub mod error;
pub mod handler;
pub mod instance;
pub mod key;
pub mod link;
pub mod macros;
pub mod resolve_guard;
pub mod runtime;
pub mod scope;
pub mod service;

pub use binding::*;
pub use container::*;
pub use context::*;
pub use declaration::*;
pub use dep::*;
pub use diagnostics::*;
pub use error::*;
pub use handler::*;
pub use instance::*;
pub use key::*;
pub use link::*;
pub use resolve_guard::*;
pub use runtime::*;
pub use scope::*;
pub use service::*;
