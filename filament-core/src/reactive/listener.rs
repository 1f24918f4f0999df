//! Listener types for the reactive engine.
//!
//! A Listener is any reaction that should re-run when a node it read is
//! written. Identity is the `ListenerId`: a listener is never registered
//! twice on the same node, and the pending batch de-duplicates by id.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a listener.
///
/// Each listener gets a unique ID when created. The ID is what subscription
/// de-duplication and batch coalescing key on; the closure itself has no
/// identity of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// A zero-argument reaction with a stable identity.
///
/// Cloning a listener shares the underlying closure and keeps the same id,
/// so a clone scheduled into the pending batch coalesces with the original.
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    run: Arc<dyn Fn() + Send + Sync>,
}

impl Listener {
    /// Create a new listener wrapping the given reaction.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id: ListenerId::new(),
            run: Arc::new(run),
        }
    }

    /// Get the listener's unique ID.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Invoke the reaction.
    ///
    /// Panics inside the reaction propagate to the caller; the engine never
    /// catches them.
    pub fn call(&self) {
        (self.run)()
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn listener_ids_are_unique() {
        let id1 = ListenerId::new();
        let id2 = ListenerId::new();
        let id3 = ListenerId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn listener_call_invokes_reaction() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let listener = Listener::new(move || {
            called_clone.store(true, Ordering::SeqCst);
        });

        assert!(!called.load(Ordering::SeqCst));
        listener.call();
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn listener_clone_keeps_identity() {
        let listener = Listener::new(|| {});
        let clone = listener.clone();

        assert_eq!(listener.id(), clone.id());
    }
}
