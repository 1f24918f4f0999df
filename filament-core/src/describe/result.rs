//! Result channel: `Try` and the combinators that route construction
//! failures through the graph instead of out of it.
//!
//! Only *construction-time* failures are channeled: a builder that fails
//! while the description resolves becomes an `Err` payload. Failures raised
//! later inside listeners or asynchronous bodies are not caught here; they
//! propagate to whatever invoked them, exactly as an uninstrumented call
//! would.

use std::sync::Arc;

use super::transform::map;
use super::scope::Reader;
use super::{Describe, Program};
use crate::reactive::Source;

/// Explicit two-variant result carried as a node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Try<T, E> {
    /// The happy path value.
    Ok(T),
    /// The channeled error.
    Err(E),
}

impl<T, E> Try<T, E> {
    /// Whether this is the `Ok` variant.
    pub fn is_ok(&self) -> bool {
        matches!(self, Try::Ok(_))
    }

    /// Whether this is the `Err` variant.
    pub fn is_err(&self) -> bool {
        matches!(self, Try::Err(_))
    }

    /// The value, if `Ok`.
    pub fn ok(self) -> Option<T> {
        match self {
            Try::Ok(v) => Some(v),
            Try::Err(_) => None,
        }
    }

    /// The error, if `Err`.
    pub fn err(self) -> Option<E> {
        match self {
            Try::Ok(_) => None,
            Try::Err(e) => Some(e),
        }
    }
}

/// Attempt the happy-path builder; fall back to the error-path description
/// when construction fails.
///
/// `build` reports a construction failure as a `Result`; on `Err` the
/// description produced by `on_error` is materialized instead, and the
/// final read is wrapped in [`Try::Ok`] / [`Try::Err`] accordingly.
pub fn from_try<T, E, C, F, G>(build: F, on_error: G) -> Describe<Try<T, E>>
where
    T: Clone + Send + Sync + PartialEq + 'static,
    E: Clone + Send + Sync + PartialEq + 'static,
    F: Fn() -> Result<Describe<T>, C> + Send + Sync + 'static,
    G: Fn(C) -> Describe<E> + Send + Sync + 'static,
{
    Describe::new(move |scope| match build() {
        Ok(description) => {
            let handle = description.resolve(scope);
            scope
                .context()
                .create_node(Source::Thunk(Arc::new(move || Try::Ok(handle.get()))))
                .handle()
        }
        Err(cause) => {
            let handle = on_error(cause).resolve(scope);
            scope
                .context()
                .create_node(Source::Thunk(Arc::new(move || Try::Err(handle.get()))))
                .handle()
        }
    })
}

/// Read the wrapped `Try` once and dispatch to exactly one handler.
pub fn match_try<T, E, FO, FE>(source: Describe<Try<T, E>>, on_ok: FO, on_err: FE) -> Program
where
    T: Clone + Send + Sync + PartialEq + 'static,
    E: Clone + Send + Sync + PartialEq + 'static,
    FO: Fn(T, &Reader) + Send + Sync + 'static,
    FE: Fn(E, &Reader) + Send + Sync + 'static,
{
    Program::new(move |scope| {
        let reader = scope.reader();
        match source.resolve(scope).get() {
            Try::Ok(value) => on_ok(value, &reader),
            Try::Err(error) => on_err(error, &reader),
        }
    })
}

/// Derive a boolean view reporting whether the wrapped value is `Err`.
pub fn is_error<T, E>(source: Describe<Try<T, E>>) -> Describe<bool>
where
    T: Clone + Send + Sync + PartialEq + 'static,
    E: Clone + Send + Sync + PartialEq + 'static,
{
    map(source, |t: Try<T, E>| t.is_err())
}
