//! Description Combinators
//!
//! A *description* is an inert builder: a function of a [`Scope`] (context +
//! cache) that only touches the graph when invoked. Combinator calls are
//! pure and composable; nothing is materialized until an entry point such as
//! [`run`] or [`leave`] threads a scope through the tree.
//!
//! Two description shapes exist:
//!
//! - [`Describe<T>`] resolves to a [`Reactive<T>`] read/write pair;
//! - [`Program`] performs registrations and writes without yielding a pair.
//!
//! The combinators themselves live in submodules: sources and effects in
//! `core`, derivations in `transform`, and the result channel in `result`.

use std::sync::Arc;

use crate::reactive::Reactive;

mod core;
mod result;
mod scope;
mod transform;

pub use self::core::{chain, effect, effect_seq, func, pipe, step, tap, value, EffectFn, Step};
pub use result::{from_try, is_error, match_try, Try};
pub use scope::{default_cache, leave, run, run_isolated, run_with, Cache, Reader, Scope};
pub use transform::{map, zip2, zip3};

/// A description resolving to a read/write pair.
///
/// Cloning shares the underlying builder; resolving the same description
/// against the same scope repeatedly is how cached combinators (`value`,
/// `promise`) return one shared node.
pub struct Describe<T>(Arc<dyn Fn(&Scope) -> Reactive<T> + Send + Sync>);

impl<T> Describe<T> {
    /// Wrap a builder closure.
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&Scope) -> Reactive<T> + Send + Sync + 'static,
    {
        Self(Arc::new(build))
    }

    /// Materialize against a scope, yielding the read/write pair.
    pub fn resolve(&self, scope: &Scope) -> Reactive<T> {
        (self.0)(scope)
    }
}

impl<T> Clone for Describe<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// A description that performs graph work without yielding a pair.
pub struct Program(Arc<dyn Fn(&Scope) + Send + Sync>);

impl Program {
    /// Wrap a builder closure.
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&Scope) + Send + Sync + 'static,
    {
        Self(Arc::new(build))
    }

    /// Run against a scope.
    pub fn apply(&self, scope: &Scope) {
        (self.0)(scope)
    }
}

impl Clone for Program {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}
