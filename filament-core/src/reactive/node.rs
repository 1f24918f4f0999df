//! Node Implementation
//!
//! A Node is the fundamental reactive cell. It holds a source, memoizes the
//! resolved value, and tracks which listeners depend on it.
//!
//! # How Nodes Work
//!
//! 1. When a node is read while a listener is current, the node registers
//!    that listener as a subscriber (idempotent, keyed by listener id).
//!
//! 2. A lazy source (thunk) is resolved on first read and the result is
//!    memoized; further reads return the memo until a write invalidates it.
//!
//! 3. Writing a value equal to the current resolved value is a no-op: no
//!    invalidation, no propagation. Writing a different value stores the new
//!    source, memoizes the resolved value, and schedules every subscriber
//!    into the owning context's pending batch.
//!
//! # Memory Layout
//!
//! Each node consists of:
//! - A unique ID (8 bytes)
//! - The source and memo (stored behind Arc<RwLock>)
//! - A small inline list of subscribed listeners

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use smallvec::SmallVec;

use super::context::Context;
use super::listener::Listener;

/// Unique identifier for a node, stable for the node's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The source of a node's value: a plain value or a lazy producer.
pub enum Source<T> {
    /// An already-resolved value.
    Value(T),
    /// A zero-argument producer, resolved on demand.
    Thunk(Arc<dyn Fn() -> T + Send + Sync>),
}

impl<T: Clone> Source<T> {
    /// Resolve the source to a value, invoking the producer if lazy.
    pub fn resolve(&self) -> T {
        match self {
            Source::Value(v) => v.clone(),
            Source::Thunk(f) => f(),
        }
    }
}

impl<T: Clone> Clone for Source<T> {
    fn clone(&self) -> Self {
        match self {
            Source::Value(v) => Source::Value(v.clone()),
            Source::Thunk(f) => Source::Thunk(Arc::clone(f)),
        }
    }
}

impl<T> Debug for Source<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Value(_) => f.write_str("Source::Value"),
            Source::Thunk(_) => f.write_str("Source::Thunk"),
        }
    }
}

/// A reactive node holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The type of value stored in the node. Must be
///   Clone + Send + Sync + PartialEq. The PartialEq bound is what the
///   no-op write suppression is defined in terms of.
///
/// Cloning a node shares its state; both clones observe the same cell.
pub struct Node<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Unique identifier for this node.
    id: NodeId,

    /// The context that owns this node's scheduling.
    ctx: Context,

    /// The current source.
    source: Arc<RwLock<Source<T>>>,

    /// Memoized resolved value (None if never resolved).
    memo: Arc<RwLock<Option<T>>>,

    /// Whether the memo reflects the current source.
    computed: Arc<AtomicBool>,

    /// Listeners subscribed to this node, in subscription order.
    subscribers: Arc<RwLock<SmallVec<[Listener; 4]>>>,
}

impl<T> Node<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    pub(crate) fn new(ctx: Context, source: Source<T>) -> Self {
        Self {
            id: NodeId::new(),
            ctx,
            source: Arc::new(RwLock::new(source)),
            memo: Arc::new(RwLock::new(None)),
            computed: Arc::new(AtomicBool::new(false)),
            subscribers: Arc::new(RwLock::new(SmallVec::new())),
        }
    }

    /// Get the node's unique ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Read the current value.
    ///
    /// If a listener is current in the owning context, it is registered as a
    /// subscriber. The producer runs at most once per write: a stale memo is
    /// repopulated here, and further reads return the memo directly.
    pub fn get(&self) -> T {
        if let Some(listener) = self.ctx.current_listener() {
            self.subscribe(listener);
        }
        self.get_untracked()
    }

    /// Read the current value without registering any subscription.
    pub fn get_untracked(&self) -> T {
        if !self.computed.load(Ordering::SeqCst) {
            let source = self.source.read().expect("source lock poisoned").clone();
            let value = source.resolve();
            *self.memo.write().expect("memo lock poisoned") = Some(value.clone());
            self.computed.store(true, Ordering::SeqCst);
            return value;
        }
        self.memo
            .read()
            .expect("memo lock poisoned")
            .clone()
            .expect("computed node holds a value")
    }

    /// Write a plain value. See [`Node::write_source`].
    pub fn set(&self, value: T) {
        self.write_source(Source::Value(value));
    }

    /// Write a lazy producer. See [`Node::write_source`].
    pub fn set_with<F>(&self, thunk: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.write_source(Source::Thunk(Arc::new(thunk)));
    }

    /// Write a new source.
    ///
    /// The incoming source is resolved exactly once. If the resolved value
    /// equals the current resolved value the write is suppressed entirely.
    /// Otherwise the new source is stored, the memo is repopulated from the
    /// resolution already performed, and every subscriber is scheduled into
    /// the owning context's pending batch (flushing immediately when no
    /// transaction is open).
    pub fn write_source(&self, source: Source<T>) {
        let incoming = source.resolve();
        if incoming == self.get_untracked() {
            tracing::trace!(node = self.id.raw(), "write suppressed, value unchanged");
            return;
        }

        *self.source.write().expect("source lock poisoned") = source;
        *self.memo.write().expect("memo lock poisoned") = Some(incoming);
        self.computed.store(true, Ordering::SeqCst);

        let subscribers: Vec<Listener> = self
            .subscribers
            .read()
            .expect("subscriber lock poisoned")
            .iter()
            .cloned()
            .collect();
        self.ctx.schedule(subscribers);
    }

    /// Register a listener as a subscriber, de-duplicated by id.
    fn subscribe(&self, listener: Listener) {
        let mut subs = self.subscribers.write().expect("subscriber lock poisoned");
        if !subs.iter().any(|s| s.id() == listener.id()) {
            subs.push(listener);
        }
    }

    /// Get the number of subscribed listeners.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("subscriber lock poisoned")
            .len()
    }

    /// Whether the memo currently reflects the source.
    pub fn is_computed(&self) -> bool {
        self.computed.load(Ordering::SeqCst)
    }

    /// Build the `(read, write)` pair facade over this node.
    pub fn handle(&self) -> Reactive<T> {
        let reader = self.clone();
        let writer = self.clone();
        Reactive::new(
            move || reader.get(),
            move |source| writer.write_source(source),
        )
    }
}

impl<T> Clone for Node<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            ctx: self.ctx.clone(),
            source: Arc::clone(&self.source),
            memo: Arc::clone(&self.memo),
            computed: Arc::clone(&self.computed),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T> Debug for Node<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("computed", &self.is_computed())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// The `(read, write)` pair the engine hands to the combinator layer.
///
/// For plain nodes this is a thin facade over [`Node`]; composite handles
/// (such as the tuple pair built by `zip`) supply their own closures.
pub struct Reactive<T> {
    read: Arc<dyn Fn() -> T + Send + Sync>,
    write: Arc<dyn Fn(Source<T>) + Send + Sync>,
}

impl<T> Reactive<T> {
    /// Build a pair from explicit read and write closures.
    pub fn new<R, W>(read: R, write: W) -> Self
    where
        R: Fn() -> T + Send + Sync + 'static,
        W: Fn(Source<T>) + Send + Sync + 'static,
    {
        Self {
            read: Arc::new(read),
            write: Arc::new(write),
        }
    }

    /// Read the current value, registering the current listener if any.
    pub fn get(&self) -> T {
        (self.read)()
    }

    /// Write a plain value.
    pub fn set(&self, value: T) {
        (self.write)(Source::Value(value));
    }

    /// Write a lazy producer.
    pub fn set_with<F>(&self, thunk: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        (self.write)(Source::Thunk(Arc::new(thunk)));
    }

    /// Write an arbitrary source.
    pub fn write_source(&self, source: Source<T>) {
        (self.write)(source);
    }
}

impl<T> Clone for Reactive<T> {
    fn clone(&self) -> Self {
        Self {
            read: Arc::clone(&self.read),
            write: Arc::clone(&self.write),
        }
    }
}
