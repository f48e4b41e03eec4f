//! Thread-local stack guard for circular resolution detection.
//!
//! This module provides [`ResolveGuard`], a utility for tracking the chain of
//! keys being dispatched by each mesh during resolution. Entries are keyed by
//! mesh identity and key, so a child delegating a key to its parent is not a
//! cycle, while an alias chain that loops back on itself, or a constructor that
//! reads a field whose service is still being constructed, is.
//!
//! # Example
//! ```
//! use mesh::{ErrorKind, ResolveGuard};
//!
//! // Push a key onto the stack for mesh #1
//! let _g1 = ResolveGuard::push(1, "A").unwrap();
//! // The same key in another mesh is fine
//! let _g2 = ResolveGuard::push(2, "A").unwrap();
//! // Pushing the same key for the same mesh again triggers a circular dependency error
//! let err = ResolveGuard::push(1, "A").unwrap_err();
//! assert!(matches!(err.kind, ErrorKind::CircularDependency));
//! ```

use std::cell::RefCell;

use crate::Error;

thread_local! {
    // Stack of (mesh id, key) pairs being resolved in this thread.
    static RESOLVE_STACK: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the last pushed entry from the thread-local stack on drop.
#[derive(Debug)]
pub struct ResolveGuard {
    pub key: String,
}

impl ResolveGuard {
    /// Try to push a key for the mesh identified by `mesh_id`.
    ///
    /// Returns `Err(Error::circular_dependency(..))` if the pair is already on
    /// the stack. Otherwise, returns a guard that will pop it on drop.
    pub fn push(mesh_id: usize, key: &str) -> Result<Self, Error> {
        RESOLVE_STACK.with(|stack| {
            let mut v = stack.borrow_mut();
            if let Some(start) = v.iter().position(|(id, k)| *id == mesh_id && k == key) {
                // Chain from the first occurrence back to the repeated key
                let mut chain: Vec<&str> = v[start..].iter().map(|(_, k)| k.as_str()).collect();
                chain.push(key);
                return Err(Error::circular_dependency(&chain));
            }
            v.push((mesh_id, key.to_string()));
            Ok(ResolveGuard {
                key: key.to_string(),
            })
        })
    }
}

impl Drop for ResolveGuard {
    fn drop(&mut self) {
        RESOLVE_STACK.with(|stack| {
            let mut v = stack.borrow_mut();
            v.pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn push_and_pop_stack() {
        // Push A, then B, then pop B, then pop A
        {
            let _g1 = ResolveGuard::push(7, "A").unwrap();
            {
                let _g2 = ResolveGuard::push(7, "B").unwrap();
                // B is on top
                let err = ResolveGuard::push(7, "A").unwrap_err();
                assert!(matches!(err.kind, ErrorKind::CircularDependency));
                assert!(err.message.contains("A -> B -> A"));
            }
            // B popped, only A remains
            assert!(ResolveGuard::push(7, "A").is_err());
        }
        // All popped, stack is empty, can push A again
        let _g = ResolveGuard::push(7, "A").unwrap();
    }

    #[test]
    fn chain_starts_at_the_repeated_key() {
        let _g1 = ResolveGuard::push(3, "Root").unwrap();
        let _g2 = ResolveGuard::push(3, "X").unwrap();
        let _g3 = ResolveGuard::push(3, "Y").unwrap();

        let err = ResolveGuard::push(3, "X").unwrap_err();
        assert!(err.message.ends_with("X -> Y -> X"));
        assert!(!err.message.contains("Root"));
    }
}
