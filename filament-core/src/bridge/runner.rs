//! Asynchronous effect and pipeline runners.
//!
//! Bodies here are futures: they run as spawned tasks and may await freely.
//! Dependency tracking still works because the [`AsyncReader`] re-installs
//! the owning listener around each individual synchronous read, never across
//! an await.

use std::sync::{Arc, OnceLock};

use futures_util::future::BoxFuture;

use super::promise::{AsyncDescribe, AsyncState, PromiseNode};
use super::BridgeError;
use crate::describe::{Cache, Describe, Program, Scope, Try};
use crate::reactive::{Context, Listener};

/// Accessor handed to asynchronous effect and func bodies.
///
/// Owned by value so the body can hold it across awaits. Reads register the
/// carried listener (if any) by opening a tracking window spanning only the
/// synchronous read itself.
pub struct AsyncReader {
    scope: Scope,
    listener: Option<Listener>,
}

impl AsyncReader {
    /// Resolve and read a synchronous description, registering dependencies.
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

    /// Resolve an asynchronous description and read its cell, registering
    /// dependencies.
    ///
    /// A listener that reads a pending cell re-runs when the cell settles.
    pub fn state<T, E>(&self, description: &AsyncDescribe<T, E>) -> AsyncState<T, E>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
        E: Clone + Send + Sync + PartialEq + 'static,
    {
        match &self.listener {
            Some(listener) => self
                .scope
                .context()
                .with_current(listener, || description.resolve(&self.scope).state()),
            None => description.resolve(&self.scope).state(),
        }
    }

    /// Resolve an asynchronous description and await its outcome.
    ///
    /// The cell read that registers the dependency happens synchronously
    /// before the await; only the settlement wait suspends.
    pub async fn settled<T, E>(
        &self,
        description: &AsyncDescribe<T, E>,
    ) -> Result<Try<T, E>, BridgeError>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
        E: Clone + Send + Sync + PartialEq + 'static,
    {
        let node = self.tracked_resolve(description);
        node.settled().await
    }

    fn tracked_resolve<T, E>(&self, description: &AsyncDescribe<T, E>) -> PromiseNode<T, E>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
        E: Clone + Send + Sync + PartialEq + 'static,
    {
        match &self.listener {
            Some(listener) => self.scope.context().with_current(listener, || {
                let node = description.resolve(&self.scope);
                let _ = node.state();
                node
            }),
            None => description.resolve(&self.scope),
        }
    }
}

/// Register one listener whose body is a future.
///
/// The listener spawns a fresh run of the body; each run's synchronous reads
/// register the listener, so a later write to any of them re-runs the whole
/// body from the top. Runs are not cancelled by their successors.
pub fn effect_async<F>(body: F) -> Program
where
    F: Fn(AsyncReader) -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    let body = Arc::new(body);
    Program::new(move |scope| {
        let body = Arc::clone(&body);
        let run_scope = scope.clone();
        // The listener needs a handle to itself so each run's reader can
        // re-register it; the slot is filled right after construction.
        let slot: Arc<OnceLock<Listener>> = Arc::new(OnceLock::new());
        let slot_clone = Arc::clone(&slot);
        let listener = Listener::new(move || {
            let reader = AsyncReader {
                scope: run_scope.clone(),
                listener: slot_clone.get().cloned(),
            };
            tokio::spawn(body(reader));
        });
        let _ = slot.set(listener.clone());
        scope.context().effect(&listener);
    })
}

/// Run an arbitrary asynchronous computation with reader access, without
/// registering anything.
pub fn func_async<F>(body: F) -> Program
where
    F: Fn(AsyncReader) -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    Program::new(move |scope| {
        let reader = AsyncReader {
            scope: scope.clone(),
            listener: None,
        };
        tokio::spawn(body(reader));
    })
}

/// One stage of a [`pipe_async`] pipeline.
pub enum AsyncStep<T> {
    /// Replace the running value.
    Transform(Arc<dyn Fn(T) -> BoxFuture<'static, T> + Send + Sync>),
    /// Observe the running value.
    Tap(Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>),
}

impl<T> Clone for AsyncStep<T> {
    fn clone(&self) -> Self {
        match self {
            AsyncStep::Transform(f) => AsyncStep::Transform(Arc::clone(f)),
            AsyncStep::Tap(f) => AsyncStep::Tap(Arc::clone(f)),
        }
    }
}

/// Build an asynchronous transform step.
pub fn step_async<T, F>(f: F) -> AsyncStep<T>
where
    F: Fn(T) -> BoxFuture<'static, T> + Send + Sync + 'static,
{
    AsyncStep::Transform(Arc::new(f))
}

/// Build an asynchronous tap step.
pub fn tap_async<T, F>(f: F) -> AsyncStep<T>
where
    F: Fn(T) -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    AsyncStep::Tap(Arc::new(f))
}

/// Read the source once, apply each step in order (awaiting each), and
/// write the final value back.
///
/// One-shot: the initial read happens inside the spawned task where no
/// tracking window is open, so the pipeline never re-runs on later writes.
pub fn pipe_async<T>(source: Describe<T>, steps: Vec<AsyncStep<T>>) -> Program
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    Program::new(move |scope| {
        let handle = source.resolve(scope);
        let steps = steps.clone();
        tokio::spawn(async move {
            let mut value = handle.get();
            for s in &steps {
                match s {
                    AsyncStep::Transform(f) => value = f(value).await,
                    AsyncStep::Tap(f) => f(value.clone()).await,
                }
            }
            handle.set(value);
        });
    })
}

/// Extract an asynchronous description's outcome outside the reactive
/// world.
///
/// Opens a brand-new context and cache, resolves once, and awaits the
/// settlement; none of the wiring is retained.
pub async fn leave_async<T, E>(description: &AsyncDescribe<T, E>) -> Result<Try<T, E>, BridgeError>
where
    T: Clone + Send + Sync + PartialEq + 'static,
    E: Clone + Send + Sync + PartialEq + 'static,
{
    let scope = Scope::new(Context::new(), Cache::new());
    let node = description.resolve(&scope);
    node.settled().await
}
