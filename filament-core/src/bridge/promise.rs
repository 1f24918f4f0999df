//! Promise cells: asynchronous operations as reactive state.
//!
//! # How Promise Cells Work
//!
//! 1. [`promise`] takes a caller-supplied identity key and a one-shot
//!    operation. The operation is spawned at most once, by the
//!    materialization that creates a cache entry; a cache hit returns the
//!    existing node and spawns nothing. The outcome goes into a watch
//!    channel shared by every materialization of the description.
//!
//! 2. Each cache gets its own cell, created `Pending` and mirrored to the
//!    terminal state by a small task awaiting the shared channel. The mirror
//!    write flows through the ordinary write path, so listeners reading the
//!    cell re-run on settlement like on any other write.
//!
//! 3. Asynchronous consumers skip the cell and await the channel directly
//!    through [`PromiseNode::settled`].

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::watch;

use super::BridgeError;
use crate::describe::{Scope, Try};
use crate::reactive::{Reactive, Source};

/// Lifecycle of an asynchronous operation, as seen by the graph.
///
/// A cell starts `Pending` and moves to exactly one terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncState<T, E> {
    /// The operation has not settled yet.
    Pending,
    /// The operation completed with a value.
    Fulfilled(T),
    /// The operation completed with an error value.
    Rejected(E),
}

impl<T, E> AsyncState<T, E> {
    /// Whether the operation is still outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(self, AsyncState::Pending)
    }

    /// Whether the operation completed with a value.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, AsyncState::Fulfilled(_))
    }

    /// Whether the operation completed with an error value.
    pub fn is_rejected(&self) -> bool {
        matches!(self, AsyncState::Rejected(_))
    }
}

/// The two faces of one asynchronous operation: a reactive cell for
/// synchronous listeners and a settlement channel for asynchronous
/// consumers.
///
/// Cloning shares both; every clone observes the same operation.
pub struct PromiseNode<T, E> {
    cell: Reactive<AsyncState<T, E>>,
    settled: watch::Receiver<Option<Try<T, E>>>,
}

impl<T, E> PromiseNode<T, E>
where
    T: Clone + Send + Sync + PartialEq + 'static,
    E: Clone + Send + Sync + PartialEq + 'static,
{
    pub(crate) fn new(
        cell: Reactive<AsyncState<T, E>>,
        settled: watch::Receiver<Option<Try<T, E>>>,
    ) -> Self {
        Self { cell, settled }
    }

    /// Read the cell, registering the current listener if any.
    pub fn state(&self) -> AsyncState<T, E> {
        self.cell.get()
    }

    /// Await the operation's outcome.
    ///
    /// Returns immediately if the operation already settled. Fails with
    /// [`BridgeError::SourceDropped`] when the producer side of the
    /// settlement channel went away without delivering an outcome.
    pub async fn settled(&self) -> Result<Try<T, E>, BridgeError> {
        let mut rx = self.settled.clone();
        let outcome = rx
            .wait_for(|outcome| outcome.is_some())
            .await
            .map_err(|_| BridgeError::SourceDropped)?
            .clone()
            .expect("settled channel holds an outcome");
        Ok(outcome)
    }
}

impl<T, E> Clone for PromiseNode<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            settled: self.settled.clone(),
        }
    }
}

/// A description resolving to a [`PromiseNode`].
///
/// The asynchronous analogue of `Describe<T>`: an inert builder that only
/// touches the graph (and spawns work) when resolved against a scope.
pub struct AsyncDescribe<T, E>(Arc<dyn Fn(&Scope) -> PromiseNode<T, E> + Send + Sync>);

impl<T, E> AsyncDescribe<T, E> {
    /// Wrap a builder closure.
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&Scope) -> PromiseNode<T, E> + Send + Sync + 'static,
    {
        Self(Arc::new(build))
    }

    /// Materialize against a scope, yielding the promise node.
    pub fn resolve(&self, scope: &Scope) -> PromiseNode<T, E> {
        (self.0)(scope)
    }
}

impl<T, E> Clone for AsyncDescribe<T, E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// Describe a one-shot asynchronous operation under a caller-supplied
/// identity.
///
/// The key decides cache identity within one payload type: two descriptions
/// with the same key resolved against the same cache share one cell, and a
/// cache hit leaves the later description's operation inert. Only the
/// materialization that creates a cache entry spawns the operation. Each
/// cache's cell starts `Pending` and settles when the shared channel
/// delivers the outcome.
pub fn promise<T, E, Fut>(key: impl Into<String>, op: Fut) -> AsyncDescribe<T, E>
where
    T: Clone + Send + Sync + PartialEq + 'static,
    E: Clone + Send + Sync + PartialEq + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let key = format!(
        "promise:{}:{}",
        std::any::type_name::<(T, E)>(),
        key.into()
    );
    let (tx, rx) = watch::channel(None::<Try<T, E>>);
    let tx = Arc::new(tx);
    let op: Arc<Mutex<Option<BoxFuture<'static, Result<T, E>>>>> =
        Arc::new(Mutex::new(Some(op.boxed())));

    AsyncDescribe::new(move |scope| {
        let rx = rx.clone();
        scope.cache().get_or_insert_with(&key, || {
            if let Some(fut) = op.lock().expect("operation lock poisoned").take() {
                let tx = Arc::clone(&tx);
                tokio::spawn(async move {
                    let outcome = match fut.await {
                        Ok(value) => Try::Ok(value),
                        Err(error) => Try::Err(error),
                    };
                    // All receivers may already be gone; that is fine.
                    let _ = tx.send(Some(outcome));
                });
            }
            let cell = scope
                .context()
                .create_node(Source::Value(AsyncState::<T, E>::Pending))
                .handle();
            spawn_mirror(cell.clone(), rx.clone());
            PromiseNode::new(cell, rx.clone())
        })
    })
}

/// Derive a promise whose value is an asynchronous transform of the
/// source's fulfilled value.
///
/// A rejected source short-circuits: the transform never runs and the
/// rejection is carried through unchanged. Each resolution builds a fresh
/// derived cell awaiting the (shared) source settlement.
pub fn map_async<T, U, E, F>(source: AsyncDescribe<T, E>, f: F) -> AsyncDescribe<U, E>
where
    T: Clone + Send + Sync + PartialEq + 'static,
    U: Clone + Send + Sync + PartialEq + 'static,
    E: Clone + Send + Sync + PartialEq + 'static,
    F: Fn(T) -> BoxFuture<'static, Result<U, E>> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    AsyncDescribe::new(move |scope| {
        let upstream = source.resolve(scope);
        let (tx, rx) = watch::channel(None::<Try<U, E>>);
        let cell = scope
            .context()
            .create_node(Source::Value(AsyncState::<U, E>::Pending))
            .handle();

        let f = Arc::clone(&f);
        let task_cell = cell.clone();
        tokio::spawn(async move {
            let outcome = match upstream.settled().await {
                Ok(Try::Ok(value)) => match f(value).await {
                    Ok(mapped) => Try::Ok(mapped),
                    Err(error) => Try::Err(error),
                },
                Ok(Try::Err(error)) => Try::Err(error),
                Err(BridgeError::SourceDropped) => {
                    tracing::warn!("upstream source dropped; derived cell stays pending");
                    return;
                }
            };
            match outcome.clone() {
                Try::Ok(value) => task_cell.set(AsyncState::Fulfilled(value)),
                Try::Err(error) => task_cell.set(AsyncState::Rejected(error)),
            }
            let _ = tx.send(Some(outcome));
        });

        PromiseNode::new(cell, rx)
    })
}

/// Mirror the settlement channel into the cell.
fn spawn_mirror<T, E>(
    cell: Reactive<AsyncState<T, E>>,
    mut rx: watch::Receiver<Option<Try<T, E>>>,
) where
    T: Clone + Send + Sync + PartialEq + 'static,
    E: Clone + Send + Sync + PartialEq + 'static,
{
    tokio::spawn(async move {
        match rx.wait_for(|outcome| outcome.is_some()).await {
            Ok(guard) => {
                let outcome = guard.clone().expect("settled channel holds an outcome");
                drop(guard);
                match outcome {
                    Try::Ok(value) => cell.set(AsyncState::Fulfilled(value)),
                    Try::Err(error) => cell.set(AsyncState::Rejected(error)),
                }
            }
            Err(_) => {
                tracing::warn!("source dropped before settling; cell stays pending");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::Cache;
    use crate::reactive::Context;
    use std::sync::atomic::{AtomicI32, Ordering};
    use tokio::task::yield_now;

    fn scope() -> Scope {
        Scope::new(Context::new(), Cache::new())
    }

    async fn settle<T, E>(node: &PromiseNode<T, E>)
    where
        T: Clone + Send + Sync + PartialEq + 'static,
        E: Clone + Send + Sync + PartialEq + 'static,
    {
        let mut tries = 0;
        while node.state().is_pending() && tries < 1000 {
            yield_now().await;
            tries += 1;
        }
    }

    #[tokio::test]
    async fn promise_settles_fulfilled() {
        let scope = scope();
        let description = promise("fetch", async { Ok::<_, String>(5) });

        let node = description.resolve(&scope);
        assert!(node.state().is_pending());

        assert_eq!(node.settled().await, Ok(Try::Ok(5)));

        settle(&node).await;
        assert_eq!(node.state(), AsyncState::Fulfilled(5));
    }

    #[tokio::test]
    async fn promise_settles_rejected() {
        let scope = scope();
        let description =
            promise("failing", async { Err::<i32, _>("unreachable host".to_string()) });

        let node = description.resolve(&scope);
        assert_eq!(
            node.settled().await,
            Ok(Try::Err("unreachable host".to_string()))
        );

        settle(&node).await;
        assert_eq!(
            node.state(),
            AsyncState::Rejected("unreachable host".to_string())
        );
    }

    #[tokio::test]
    async fn operation_spawns_once_across_materializations() {
        let scope = scope();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let description = promise("once", async move {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(1)
        });

        let first = description.resolve(&scope);
        let second = description.resolve(&scope);

        assert_eq!(first.settled().await, Ok(Try::Ok(1)));
        settle(&second).await;

        // One operation run; both materializations see the shared cell.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.state(), AsyncState::Fulfilled(1));
    }

    #[tokio::test]
    async fn same_key_distinct_payload_types_do_not_collide() {
        let scope = scope();
        let numeric = promise("load", async { Ok::<_, String>(1) });
        let textual = promise("load", async { Ok::<_, String>("one".to_string()) });

        // One cache, one key, two payload types: each gets its own entry.
        let first = numeric.resolve(&scope);
        let second = textual.resolve(&scope);

        assert_eq!(first.settled().await, Ok(Try::Ok(1)));
        assert_eq!(second.settled().await, Ok(Try::Ok("one".to_string())));
    }

    #[tokio::test]
    async fn cache_hit_leaves_duplicate_operation_inert() {
        let scope = scope();

        let first_calls = Arc::new(AtomicI32::new(0));
        let first_calls_clone = first_calls.clone();
        let first = promise("shared", async move {
            first_calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(1)
        });

        let duplicate_calls = Arc::new(AtomicI32::new(0));
        let duplicate_calls_clone = duplicate_calls.clone();
        let duplicate = promise("shared", async move {
            duplicate_calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(2)
        });

        let node = first.resolve(&scope);
        assert_eq!(node.settled().await, Ok(Try::Ok(1)));

        // Same key, already-populated cache: the duplicate's operation
        // never runs and its node shows the first operation's result.
        let aliased = duplicate.resolve(&scope);
        assert_eq!(aliased.settled().await, Ok(Try::Ok(1)));
        settle(&aliased).await;
        assert_eq!(aliased.state(), AsyncState::Fulfilled(1));

        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(duplicate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropped_source_surfaces_as_error() {
        let (tx, rx) = watch::channel(None::<Try<i32, String>>);
        drop(tx);

        let ctx = Context::new();
        let cell = ctx.create_node(Source::Value(AsyncState::Pending)).handle();
        let node = PromiseNode::new(cell, rx);

        assert_eq!(node.settled().await, Err(BridgeError::SourceDropped));
        assert!(node.state().is_pending());
    }

    #[tokio::test]
    async fn map_async_transforms_fulfillment() {
        let scope = scope();
        let source = promise("base", async { Ok::<_, String>(5) });
        let derived = map_async(source, |v: i32| async move { Ok(v * 2) }.boxed());

        let node = derived.resolve(&scope);
        assert_eq!(node.settled().await, Ok(Try::Ok(10)));

        settle(&node).await;
        assert_eq!(node.state(), AsyncState::Fulfilled(10));
    }

    #[tokio::test]
    async fn map_async_carries_rejection_through() {
        let scope = scope();
        let source = promise("doomed", async { Err::<i32, _>("boom".to_string()) });
        let derived = map_async(source, |v: i32| async move { Ok(v * 2) }.boxed());

        let node = derived.resolve(&scope);
        assert_eq!(node.settled().await, Ok(Try::Err("boom".to_string())));
    }
}
