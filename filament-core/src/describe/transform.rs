//! Derivations over descriptions: `map` and `zip`.

use std::sync::Arc;

use super::Describe;
use crate::reactive::{Reactive, Source};

/// Derive a read-only view whose value is `f` applied to the source's
/// current value at read time.
///
/// The derivation is lazy: `f` runs when the derived node is read, not when
/// the description resolves. Each resolution builds a fresh derived node;
/// only the underlying source is shared.
pub fn map<T, U, F>(source: Describe<T>, f: F) -> Describe<U>
where
    T: Clone + Send + Sync + PartialEq + 'static,
    U: Clone + Send + Sync + PartialEq + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Describe::new(move |scope| {
        let handle = source.resolve(scope);
        let f = Arc::clone(&f);
        scope
            .context()
            .create_node(Source::Thunk(Arc::new(move || f(handle.get()))))
            .handle()
    })
}

/// Compose two pairs into one pair over a tuple.
///
/// Reading re-reads every slot; writing fans out per-slot writes, so a slot
/// written with its current value is left undisturbed by that slot's own
/// no-op suppression.
pub fn zip2<A, B>(a: Describe<A>, b: Describe<B>) -> Describe<(A, B)>
where
    A: Clone + Send + Sync + PartialEq + 'static,
    B: Clone + Send + Sync + PartialEq + 'static,
{
    Describe::new(move |scope| {
        let ra = a.resolve(scope);
        let rb = b.resolve(scope);
        let (wa, wb) = (ra.clone(), rb.clone());
        Reactive::new(
            move || (ra.get(), rb.get()),
            move |source: Source<(A, B)>| {
                let (va, vb) = source.resolve();
                wa.set(va);
                wb.set(vb);
            },
        )
    })
}

/// Three-slot analogue of [`zip2`].
pub fn zip3<A, B, C>(a: Describe<A>, b: Describe<B>, c: Describe<C>) -> Describe<(A, B, C)>
where
    A: Clone + Send + Sync + PartialEq + 'static,
    B: Clone + Send + Sync + PartialEq + 'static,
    C: Clone + Send + Sync + PartialEq + 'static,
{
    Describe::new(move |scope| {
        let ra = a.resolve(scope);
        let rb = b.resolve(scope);
        let rc = c.resolve(scope);
        let (wa, wb, wc) = (ra.clone(), rb.clone(), rc.clone());
        Reactive::new(
            move || (ra.get(), rb.get(), rc.get()),
            move |source: Source<(A, B, C)>| {
                let (va, vb, vc) = source.resolve();
                wa.set(va);
                wb.set(vb);
                wc.set(vc);
            },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::core::value;
    use crate::describe::scope::{Cache, Scope};
    use crate::reactive::Context;

    #[test]
    fn map_applies_lazily_over_current_value() {
        let scope = Scope::new(Context::new(), Cache::new());
        let doubled = map(value(2), |x: i32| x * 2);

        assert_eq!(doubled.resolve(&scope).get(), 4);

        value(2).resolve(&scope).set(5);
        assert_eq!(doubled.resolve(&scope).get(), 10);
    }

    #[test]
    fn map_chains_compose() {
        let scope = Scope::new(Context::new(), Cache::new());
        let plus_one = map(value(1), |x: i32| x + 1);
        let stringified = map(plus_one, |x: i32| x.to_string());

        assert_eq!(stringified.resolve(&scope).get(), "2");
    }

    #[test]
    fn zip_reads_as_tuple() {
        let scope = Scope::new(Context::new(), Cache::new());
        let pair = zip2(value(1), value(2)).resolve(&scope);

        assert_eq!(pair.get(), (1, 2));
    }

    #[test]
    fn zip_write_fans_out_per_slot() {
        let scope = Scope::new(Context::new(), Cache::new());
        let zipped = zip2(value(1), value(2));
        let pair = zipped.resolve(&scope);

        pair.set((10, 2));
        assert_eq!(pair.get(), (10, 2));

        // The untouched slot saw a no-op write: its node kept its memo and
        // its value is still readable through its own pair.
        assert_eq!(value(2).resolve(&scope).get(), 2);
        assert_eq!(value(1).resolve(&scope).get(), 10);
    }

    #[test]
    fn zip3_roundtrip() {
        let scope = Scope::new(Context::new(), Cache::new());
        let triple = zip3(value(1), value(2), value(3)).resolve(&scope);

        assert_eq!(triple.get(), (1, 2, 3));
        triple.set((1, 20, 3));
        assert_eq!(triple.get(), (1, 20, 3));
    }
}
