//! Scope, cache, and entry points.
//!
//! A [`Scope`] is the `(Context, Cache)` pair threaded through every
//! description. The [`Cache`] maps deterministic string keys to already
//! constructed node pairs so that resolving the same description twice in
//! one scope yields the same underlying node.
//!
//! The cache is an explicit parameter of every entry point; the process-wide
//! default instance is one convenience wrapper ([`run`]), not an implicit
//! dependency of the machinery.

use std::any::Any;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use super::{Describe, Program};
use crate::reactive::{Context, Listener};

/// Mapping from deterministic keys to constructed node pairs.
///
/// Cloning shares the underlying map. Entries are never evicted; a cache
/// lives as long as the reactive state built against it should.
#[derive(Clone, Default)]
pub struct Cache {
    entries: Arc<DashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Cache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, constructing and storing the entry on a miss.
    ///
    /// A key bound to a different entry type than `V` is an internal
    /// invariant violation: combinator keys embed the value's type name, so
    /// the public surface cannot produce one.
    pub fn get_or_insert_with<V, F>(&self, key: &str, make: F) -> V
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> V,
    {
        let entry = self
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(make()) as Arc<dyn Any + Send + Sync>);
        let stored = Arc::clone(entry.value());
        drop(entry);
        match stored.downcast::<V>() {
            Ok(v) => v.as_ref().clone(),
            Err(_) => panic!("cache key {key:?} is bound to a different entry type"),
        }
    }

    /// Whether an entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The `(Context, Cache)` pair descriptions are resolved against.
#[derive(Clone)]
pub struct Scope {
    ctx: Context,
    cache: Cache,
}

impl Scope {
    /// Build a scope from a context and a cache.
    pub fn new(ctx: Context, cache: Cache) -> Self {
        Self { ctx, cache }
    }

    /// The scope's context.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The scope's cache.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Build a reader without a carried listener.
    ///
    /// Reads through it still register the engine's current listener, if a
    /// tracking window is open.
    pub fn reader(&self) -> Reader {
        Reader {
            scope: self.clone(),
            listener: None,
        }
    }

}

/// Accessor handed to effect and func bodies.
///
/// `get` resolves a nested description and reads it, registering the
/// carried listener (or the engine's current one) as a dependent.
pub struct Reader {
    scope: Scope,
    listener: Option<Listener>,
}

impl Reader {
    /// Resolve and read a description, registering dependencies.
    pub fn get<T>(&self, description: &Describe<T>) -> T
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        match &self.listener {
            Some(listener) => self
                .scope
                .context()
                .with_current(listener, || description.resolve(&self.scope).get()),
            None => description.resolve(&self.scope).get(),
        }
    }

    /// The scope this reader resolves against.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

static DEFAULT_CACHE: OnceLock<Cache> = OnceLock::new();

/// The process-wide default cache used by [`run`].
pub fn default_cache() -> &'static Cache {
    DEFAULT_CACHE.get_or_init(Cache::new)
}

/// Run programs against a fresh context and the given cache.
///
/// Returns the context so the caller keeps manual [`Context::flush`]
/// control.
pub fn run_with(cache: &Cache, programs: &[Program]) -> Context {
    let ctx = Context::new();
    let scope = Scope::new(ctx.clone(), cache.clone());
    for program in programs {
        program.apply(&scope);
    }
    ctx
}

/// Run programs against the process-wide default cache.
pub fn run(programs: &[Program]) -> Context {
    run_with(default_cache(), programs)
}

/// Run programs against a brand-new cache, sharing nothing.
pub fn run_isolated(programs: &[Program]) -> Context {
    run_with(&Cache::new(), programs)
}

/// Extract a description's current value outside the reactive world.
///
/// Opens a brand-new context and cache, resolves once, and reads; none of
/// the wiring is retained.
pub fn leave<T>(description: &Describe<T>) -> T
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    let scope = Scope::new(Context::new(), Cache::new());
    description.resolve(&scope).get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_returns_same_entry_for_same_key() {
        let cache = Cache::new();

        let first: Arc<i32> = cache.get_or_insert_with("k", || Arc::new(1));
        let second: Arc<i32> = cache.get_or_insert_with("k", || Arc::new(2));

        // The second make closure never ran.
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_distinguishes_keys() {
        let cache = Cache::new();

        let a: i32 = cache.get_or_insert_with("a", || 1);
        let b: i32 = cache.get_or_insert_with("b", || 2);

        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert!(cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[test]
    fn cache_clone_shares_entries() {
        let cache = Cache::new();
        let clone = cache.clone();

        let _: i32 = cache.get_or_insert_with("k", || 7);
        let v: i32 = clone.get_or_insert_with("k", || 0);

        assert_eq!(v, 7);
    }
}
