//! Reactive Context
//!
//! The context is the engine's coordinator. It owns three pieces of shared
//! state:
//!
//! - the *current-listener stack*, consulted by node reads to decide which
//!   listener (if any) to subscribe;
//! - the *pending batch*, an insertion-ordered, de-duplicated set of
//!   listeners scheduled by writes;
//! - the *transaction depth*, which decides when the pending batch flushes.
//!
//! # Batching
//!
//! Writes inside a transaction only accumulate listeners; the outermost
//! transaction exit flushes the batch in one pass, running each distinct
//! listener exactly once in first-insertion order. Writes outside any
//! transaction flush immediately, so an ad hoc write behaves like a depth-1
//! transaction around itself.
//!
//! The flush is a single pass over a snapshot: listeners scheduled *during*
//! the flush are not appended to the pass in progress. At that point the
//! depth is already zero, so any such write drains itself through the
//! auto-flush path instead.
//!
//! # Tracking windows
//!
//! Listener installation uses a guard that pops the stack on drop, so the
//! stack stays consistent even if a listener panics. Installation windows
//! never contain an await, which is what keeps the shared stack safe under
//! the cooperative single-threaded model.

use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use super::listener::{Listener, ListenerId};
use super::node::{Node, Source};

/// The reactive context: node factory, tracking scope, and write batcher.
///
/// Cloning a context shares its state; nodes hold a clone of the context
/// that created them and schedule their subscribers through it.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

#[derive(Default)]
struct ContextInner {
    /// Stack of installed listeners; the top is the current listener.
    tracking: RwLock<Vec<Listener>>,

    /// Listeners awaiting execution, keyed by id, in first-insertion order.
    pending: RwLock<IndexMap<ListenerId, Listener>>,

    /// Open transaction depth.
    depth: AtomicUsize,
}

impl Context {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner::default()),
        }
    }

    /// Create a node owned by this context.
    pub fn create_node<T>(&self, source: Source<T>) -> Node<T>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        Node::new(self.clone(), source)
    }

    /// Get the current listener, if a tracking window is open.
    pub fn current_listener(&self) -> Option<Listener> {
        self.inner
            .tracking
            .read()
            .expect("tracking lock poisoned")
            .last()
            .cloned()
    }

    /// Run a listener with itself installed as current.
    ///
    /// Every execution installs the listener, including batch re-runs, so
    /// reads performed on a re-run keep registering dependencies.
    pub fn effect(&self, listener: &Listener) {
        let _guard = TrackingGuard::enter(self, listener);
        listener.call();
    }

    /// Run an arbitrary closure with the given listener installed.
    ///
    /// Used by readers that carry their listener across suspension points:
    /// the installation spans only the synchronous read itself.
    pub fn with_current<R>(&self, listener: &Listener, f: impl FnOnce() -> R) -> R {
        let _guard = TrackingGuard::enter(self, listener);
        f()
    }

    /// Run `f` inside a transaction.
    ///
    /// Nested transactions share the pending batch with their parent and
    /// never flush early; only the outermost exit flushes.
    pub fn transaction(&self, f: impl FnOnce()) {
        let depth = self.inner.depth.fetch_add(1, Ordering::SeqCst) + 1;
        f();
        self.inner.depth.fetch_sub(1, Ordering::SeqCst);
        if depth == 1 {
            self.flush();
        }
    }

    /// Drain the pending batch and run each listener exactly once.
    ///
    /// Single pass over a snapshot; listeners scheduled while the pass runs
    /// are handled by their own auto-flush, not this one.
    pub fn flush(&self) {
        let batch = mem::take(&mut *self.inner.pending.write().expect("pending lock poisoned"));
        if batch.is_empty() {
            return;
        }
        tracing::trace!(listeners = batch.len(), "flushing pending batch");
        for (_, listener) in batch {
            self.effect(&listener);
        }
    }

    /// Schedule listeners into the pending batch, flushing immediately when
    /// no transaction is open.
    pub(crate) fn schedule(&self, listeners: Vec<Listener>) {
        {
            let mut pending = self.inner.pending.write().expect("pending lock poisoned");
            for listener in listeners {
                pending.entry(listener.id()).or_insert(listener);
            }
        }
        if self.inner.depth.load(Ordering::SeqCst) == 0 {
            self.flush();
        }
    }

    /// Current transaction depth.
    pub fn depth(&self) -> usize {
        self.inner.depth.load(Ordering::SeqCst)
    }

    /// Number of listeners awaiting a flush.
    pub fn pending_len(&self) -> usize {
        self.inner
            .pending
            .read()
            .expect("pending lock poisoned")
            .len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that pops the tracking stack when dropped.
///
/// Keeps the stack consistent even when the tracked closure panics.
struct TrackingGuard<'a> {
    ctx: &'a Context,
    id: ListenerId,
}

impl<'a> TrackingGuard<'a> {
    fn enter(ctx: &'a Context, listener: &Listener) -> Self {
        ctx.inner
            .tracking
            .write()
            .expect("tracking lock poisoned")
            .push(listener.clone());
        Self {
            ctx,
            id: listener.id(),
        }
    }
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        let popped = self
            .ctx
            .inner
            .tracking
            .write()
            .expect("tracking lock poisoned")
            .pop();
        if let Some(listener) = popped {
            debug_assert_eq!(
                listener.id(),
                self.id,
                "tracking stack mismatch: expected {:?}, got {:?}",
                self.id,
                listener.id()
            );
        }
    }
}
