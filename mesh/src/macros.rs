//! Macros for registering bindings and composing a mesh in one block.
//!
//! - [`bind!`] macro: shorthand for a single binding (service, interface service, constant, alias).
//! - [`mesh!`] macro: build a mesh, optionally under a parent, from several `bind!` statements.
//!
//! # Example
//! ```
//! use mesh::{Context, Declare, Error, Managed, Service};
//!
//! trait Greeter {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//! impl Managed for English {}
//! impl Declare for English {}
//! impl Service for English {
//!     fn construct(_ctx: &Context) -> Result<Self, Error> {
//!         Ok(English)
//!     }
//! }
//!
//! let app = mesh::mesh! {
//!     "app";
//!     bind(dyn Greeter => English)
//!     bind(constant "Port" => 8080u16)
//!     bind(alias "Hello" => "Greeter")
//! }?;
//!
//! assert_eq!(app.get::<dyn Greeter>("Hello")?.greet(), "hello");
//! mesh::bind!(app, "English" => English)?;
//! assert!(app.resolve("English").is_ok());
//! # Ok::<(), Error>(())
//! ```

/// Registers one binding and evaluates to `Result<(), Error>`.
///
/// - `dyn Trait => Type`: bind `Type` under the name of `Trait`, readable as `dyn Trait`.
/// - `constant "Key" => value`: bind a constant.
/// - `alias "Key" => "Target"`: bind an alias.
/// - `"Key" => Type`: bind the service `Type` under an explicit key.
/// - `Type`: bind the service `Type` under its own name.
#[macro_export]
macro_rules! bind {
    // Interface service
    ($mesh:expr, dyn $iface:path => $service:ty) => {
        $mesh
            .service_as::<dyn $iface, $service, _>(|service| service as $crate::Shared<dyn $iface>)
            .map(|_| ())
    };

    // Constant
    ($mesh:expr, constant $key:literal => $value:expr) => {
        $mesh.constant($key, $value).map(|_| ())
    };

    // Alias
    ($mesh:expr, alias $key:literal => $target:literal) => {
        $mesh.bind_alias($key, $target).map(|_| ())
    };

    // Service under an explicit key
    ($mesh:expr, $key:literal => $service:ty) => {
        $mesh.bind_service::<$service>($key).map(|_| ())
    };

    // Service under its own name
    ($mesh:expr, $service:ty) => {
        $mesh.service::<$service>().map(|_| ())
    };
}

/// Builds a mesh from `bind(...)` statements, evaluating to `Result<Mesh, Error>`.
///
/// The first binding that fails aborts the block with its error.
#[macro_export]
macro_rules! mesh {
    (@fill $mesh:ident; $( bind( $($stmt:tt)* ) )*) => {{
        let filled = (|| -> ::core::result::Result<(), $crate::Error> {
            $(
                $crate::bind!($mesh, $($stmt)*)?;
            )*
            Ok(())
        })();
        filled.map(|()| $mesh)
    }};

    (
        $name:expr, parent: $parent:expr;
        $(
            bind( $($stmt:tt)* )
        )*
    ) => {{
        let mesh = $crate::Mesh::child($name, &$parent);
        $crate::mesh!(@fill mesh; $( bind( $($stmt)* ) )*)
    }};

    (
        $name:expr;
        $(
            bind( $($stmt:tt)* )
        )*
    ) => {{
        let mesh = $crate::Mesh::new($name);
        $crate::mesh!(@fill mesh; $( bind( $($stmt)* ) )*)
    }};
}
