//! Runtime type definitions for shared ownership and interior mutability.
//!
//! A mesh is a single-threaded structure: every operation runs to completion
//! on the calling thread and no locking is performed. These aliases keep the
//! ownership vocabulary in one place so the rest of the crate never names
//! `Rc`/`RefCell` directly.
//!
//! # Type Aliases
//!
//! - [`Shared<T>`]: Smart pointer for shared ownership
//! - [`Store<T>`]: Container providing interior mutability
//! - [`WeakRef<T>`]: Non-owning counterpart of [`Shared<T>`]
//!
//! # Examples
//!
//! ```
//! use mesh::runtime::{Shared, Store};
//!
//! // Create a shared reference to a store
//! let value = Store::new(42);
//! let shared = Shared::new(value);
//! ```

use std::{cell::RefCell, rc::Rc, rc::Weak};

/// Type alias for shared ownership of data.
///
/// Resolved instances, bindings and mesh handles are all reference counted
/// through this alias. Cloning is cheap and never copies the value.
///
/// # Examples
///
/// ```
/// use mesh::runtime::Shared;
///
/// let data = Shared::new(vec![1, 2, 3]);
/// let clone = Shared::clone(&data);
/// assert!(Shared::ptr_eq(&data, &clone));
/// ```
pub type Shared<T> = Rc<T>;

/// Type alias for interior mutability with runtime borrow checking.
///
/// # Examples
///
/// ```
/// use mesh::runtime::Store;
///
/// let store = Store::new(42);
/// *store.borrow_mut() += 1;
/// assert_eq!(*store.borrow(), 43);
/// ```
pub type Store<T> = RefCell<T>;

/// Non-owning reference to a [`Shared<T>`] value.
///
/// Back-references from managed objects to their mesh use this alias so an
/// instance cached inside a mesh never keeps that mesh alive.
pub type WeakRef<T> = Weak<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_can_be_cloned() {
        let data = Shared::new(100);
        let clone = Shared::clone(&data);

        assert_eq!(Rc::strong_count(&data), 2);

        drop(clone);

        assert_eq!(Rc::strong_count(&data), 1);
    }

    #[test]
    fn test_store_allows_mutation() {
        let store = Store::new(42);

        {
            let value = store.borrow();
            assert_eq!(*value, 42);
        }
        {
            let mut value = store.borrow_mut();
            *value = 100;
        }
        assert_eq!(*store.borrow(), 100);
    }

    #[test]
    fn test_weak_ref_does_not_keep_value_alive() {
        let data = Shared::new(String::from("mesh"));
        let weak: WeakRef<String> = Shared::downgrade(&data);

        assert_eq!(weak.upgrade().as_deref().map(String::as_str), Some("mesh"));

        drop(data);

        assert!(weak.upgrade().is_none());
    }
}
