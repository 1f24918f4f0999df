//! Core combinators: sources, effects, pipelines, and sequencing.

use std::sync::Arc;

use serde::Serialize;

use super::scope::Reader;
use super::{Describe, Program};
use crate::reactive::{Listener, Source};

/// A reactive value description, cached by canonical serialization.
///
/// Two calls with an equal `initial` resolved against the same cache yield
/// the *same* node: equal literal sources are deliberately de-duplicated,
/// so a write through one pair is observable through the other.
pub fn value<T>(initial: T) -> Describe<T>
where
    T: Clone + Send + Sync + PartialEq + Serialize + 'static,
{
    Describe::new(move |scope| {
        let body = serde_json::to_string(&initial).expect("value cache key serialization");
        let key = format!("value:{}:{}", std::any::type_name::<T>(), body);
        scope.cache().get_or_insert_with(&key, || {
            scope
                .context()
                .create_node(Source::Value(initial.clone()))
                .handle()
        })
    })
}

/// A function run by an effect listener, given reader access.
pub type EffectFn = Arc<dyn Fn(&Reader) + Send + Sync>;

/// Register one listener running the given body.
///
/// The listener runs immediately to establish dependencies, then re-runs
/// through the batch-flush mechanism whenever a node it read is written.
pub fn effect<F>(body: F) -> Program
where
    F: Fn(&Reader) + Send + Sync + 'static,
{
    effect_seq(vec![Arc::new(body) as EffectFn])
}

/// Register one listener running each supplied function in order.
pub fn effect_seq(fns: Vec<EffectFn>) -> Program {
    let fns = Arc::new(fns);
    Program::new(move |scope| {
        let fns = Arc::clone(&fns);
        let run_scope = scope.clone();
        let listener = Listener::new(move || {
            let reader = run_scope.reader();
            for f in fns.iter() {
                f(&reader);
            }
        });
        scope.context().effect(&listener);
    })
}

/// One stage of a [`pipe`] pipeline.
///
/// A transform replaces the running value; a tap observes it without
/// replacing it. The distinction is an explicit discriminant, checked at
/// dispatch time.
pub enum Step<T> {
    /// Replace the running value.
    Transform(Arc<dyn Fn(T) -> T + Send + Sync>),
    /// Observe the running value.
    Tap(Arc<dyn Fn(&T) + Send + Sync>),
}

impl<T> Clone for Step<T> {
    fn clone(&self) -> Self {
        match self {
            Step::Transform(f) => Step::Transform(Arc::clone(f)),
            Step::Tap(f) => Step::Tap(Arc::clone(f)),
        }
    }
}

/// Build a transform step.
pub fn step<T, F>(f: F) -> Step<T>
where
    F: Fn(T) -> T + Send + Sync + 'static,
{
    Step::Transform(Arc::new(f))
}

/// Build a tap step.
pub fn tap<T, F>(f: F) -> Step<T>
where
    F: Fn(&T) + Send + Sync + 'static,
{
    Step::Tap(Arc::new(f))
}

/// Read the source, apply each step in order, and write the final value
/// back, all inside one transaction so intermediate states never propagate
/// individually.
pub fn pipe<T>(source: Describe<T>, steps: Vec<Step<T>>) -> Program
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    Program::new(move |scope| {
        let handle = source.resolve(scope);
        let current = handle.get();
        scope.context().transaction(|| {
            let mut value = current;
            for s in &steps {
                match s {
                    Step::Transform(f) => value = f(value),
                    Step::Tap(f) => f(&value),
                }
            }
            handle.set(value);
        });
    })
}

/// Run each program against the same scope, in order.
///
/// A sequencing primitive; no data dependency is implied.
pub fn chain(programs: Vec<Program>) -> Program {
    Program::new(move |scope| {
        for program in &programs {
            program.apply(scope);
        }
    })
}

/// Run an arbitrary computation with reader access.
pub fn func<F>(body: F) -> Program
where
    F: Fn(&Reader) + Send + Sync + 'static,
{
    Program::new(move |scope| {
        body(&scope.reader());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::scope::{run_with, Cache, Scope};
    use crate::reactive::Context;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Mutex;

    #[test]
    fn equal_values_share_one_node() {
        let scope = Scope::new(Context::new(), Cache::new());

        let first = value(5).resolve(&scope);
        let second = value(5).resolve(&scope);

        first.set(9);
        assert_eq!(second.get(), 9);
    }

    #[test]
    fn distinct_values_get_distinct_nodes() {
        let scope = Scope::new(Context::new(), Cache::new());

        let five = value(5).resolve(&scope);
        let six = value(6).resolve(&scope);

        five.set(50);
        assert_eq!(six.get(), 6);
    }

    #[test]
    fn pipe_transforms_and_writes_back() {
        let cache = Cache::new();
        run_with(&cache, &[pipe(value(1), vec![step(|x: i32| x + 1)])]);

        let scope = Scope::new(Context::new(), cache);
        assert_eq!(value(1).resolve(&scope).get(), 2);
    }

    #[test]
    fn tap_observes_without_replacing() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let cache = Cache::new();
        run_with(
            &cache,
            &[pipe(
                value(1),
                vec![
                    step(|x: i32| x + 1),
                    tap(move |x: &i32| seen_clone.lock().unwrap().push(*x)),
                    step(|x: i32| x * 10),
                ],
            )],
        );

        // The tap saw the intermediate value and the transform after it saw
        // the same value, unreplaced.
        assert_eq!(*seen.lock().unwrap(), vec![2]);
        let scope = Scope::new(Context::new(), cache);
        assert_eq!(value(1).resolve(&scope).get(), 20);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let seen = Arc::new(AtomicI32::new(-1));
        let seen_clone = seen.clone();

        let cache = Cache::new();
        run_with(
            &cache,
            &[effect(move |r| {
                seen_clone.store(r.get(&value(10)), Ordering::SeqCst);
            })],
        );
        assert_eq!(seen.load(Ordering::SeqCst), 10);

        let scope = Scope::new(Context::new(), cache);
        value(10).resolve(&scope).set(99);
        assert_eq!(seen.load(Ordering::SeqCst), 99);
    }

    #[test]
    fn effect_seq_runs_fns_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = order.clone();
        let order_b = order.clone();
        let cache = Cache::new();
        run_with(
            &cache,
            &[effect_seq(vec![
                Arc::new(move |_r: &Reader| order_a.lock().unwrap().push("first")),
                Arc::new(move |_r: &Reader| order_b.lock().unwrap().push("second")),
            ])],
        );

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn chain_applies_programs_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = order.clone();
        let order_b = order.clone();
        let cache = Cache::new();
        run_with(
            &cache,
            &[chain(vec![
                func(move |_r| order_a.lock().unwrap().push(1)),
                func(move |_r| order_b.lock().unwrap().push(2)),
            ])],
        );

        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn func_reads_without_registering() {
        let cache = Cache::new();
        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();
        run_with(
            &cache,
            &[func(move |r| {
                seen_clone.store(r.get(&value(3)), Ordering::SeqCst);
            })],
        );
        assert_eq!(seen.load(Ordering::SeqCst), 3);

        // No listener was current, so the node has no subscribers and a
        // later write re-runs nothing.
        let scope = Scope::new(Context::new(), cache);
        value(3).resolve(&scope).set(4);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
