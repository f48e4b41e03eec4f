use std::any::Any;

use crate::link::{Link, Managed};
use crate::container::Mesh;
use crate::runtime::Shared;

/// A resolved value.
///
/// The concrete value is kept as a type-erased `Shared<C>`. An optional view
/// exposes the same allocation under an interface type, so a `TestLogger`
/// bound for `dyn Logger` can be read back as either. Identity follows the
/// concrete allocation, not the `Instance` wrapper.
pub struct Instance {
    value: Shared<dyn Any>,
    view: Option<Shared<dyn Any>>,
    addr: *const (),
    type_name: &'static str,
    link: Option<Link>,
}

impl Instance {
    /// Wraps a plain value. `connect` will run middleware on it but has no
    /// back-reference to attach.
    pub fn new<T: ?Sized + 'static>(value: Shared<T>) -> Self {
        Self {
            addr: Shared::as_ptr(&value) as *const (),
            type_name: crate::key::short_type_name::<T>(),
            value: Shared::new(value),
            view: None,
            link: None,
        }
    }

    /// Wraps a value that carries its own back-reference slot.
    pub fn managed<T: Managed>(value: Shared<T>) -> Self {
        let link = value.link().cloned();
        Self {
            link,
            ..Self::new(value)
        }
    }

    /// Adds an interface view of the same value.
    pub fn with_view<I: ?Sized + 'static>(mut self, view: Shared<I>) -> Self {
        self.view = Some(Shared::new(view));
        self
    }

    /// The value as `T`, trying the interface view first.
    pub fn get<T: ?Sized + 'static>(&self) -> Option<Shared<T>> {
        self.view
            .as_ref()
            .and_then(|view| view.downcast_ref::<Shared<T>>())
            .or_else(|| self.value.downcast_ref::<Shared<T>>())
            .cloned()
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// Short name of the concrete type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn link(&self) -> Option<&Link> {
        self.link.as_ref()
    }

    /// Whether both instances wrap the same allocation.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        std::ptr::eq(self.addr, other.addr)
    }

    pub(crate) fn attach(&self, mesh: &Mesh) {
        if let Some(link) = &self.link {
            link.attach(mesh);
        }
    }
}

impl Clone for Instance {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            view: self.view.clone(),
            addr: self.addr,
            type_name: self.type_name,
            link: self.link.clone(),
        }
    }
}

#[cfg(feature = "debug")]
impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("addr", &self.addr)
            .field("has_view", &self.view.is_some())
            .field("managed", &self.link.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    struct Tracked {
        link: Link,
    }

    impl Managed for Tracked {
        fn link(&self) -> Option<&Link> {
            Some(&self.link)
        }
    }

    #[test]
    fn get_returns_the_wrapped_value() {
        let value = Shared::new(42u32);
        let instance = Instance::new(value.clone());

        let read = instance.get::<u32>().unwrap();
        assert!(Shared::ptr_eq(&read, &value));
        assert!(instance.get::<String>().is_none());
        assert_eq!(instance.type_name(), "u32");
    }

    #[test]
    fn view_exposes_interface_and_concrete_type() {
        let english = Shared::new(English);
        let instance = Instance::new(english.clone()).with_view(english as Shared<dyn Greeter>);

        assert_eq!(instance.get::<dyn Greeter>().unwrap().greet(), "hello");
        assert!(instance.is::<English>());
        assert_eq!(instance.type_name(), "English");
    }

    #[test]
    fn identity_follows_the_allocation() {
        let value = Shared::new(String::from("a"));
        let first = Instance::new(value.clone());
        let second = Instance::new(value);
        let other = Instance::new(Shared::new(String::from("a")));

        assert!(first.ptr_eq(&second));
        assert!(first.ptr_eq(&first.clone()));
        assert!(!first.ptr_eq(&other));
    }

    #[test]
    fn managed_instance_carries_link() {
        let tracked = Shared::new(Tracked { link: Link::new() });
        let instance = Instance::managed(tracked.clone());
        let mesh = Mesh::new("owner");

        instance.attach(&mesh);

        assert!(tracked.link.is_attached());
        assert!(Instance::new(Shared::new(1u8)).link().is_none());
    }
}
