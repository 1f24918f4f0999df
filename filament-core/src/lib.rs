//! # Filament Core
//!
//! A fine-grained reactive runtime with a combinator front end.
//!
//! ## Architecture
//!
//! The crate is layered:
//!
//! - [`reactive`] is the engine: nodes (memoized cells with no-op write
//!   suppression), listeners, and the context that batches writes into
//!   transactions and flushes each distinct listener once per batch.
//! - [`describe`] is the surface: inert description values (`Describe`,
//!   `Program`) built by combinators and materialized against a scope, with
//!   a cache that de-duplicates equal sources.
//! - [`bridge`] connects one-shot asynchronous operations to the graph as
//!   settling cells, plus asynchronous effect and pipeline runners.
//!
//! ## Example
//!
//! ```
//! use filament_core::describe::{effect, pipe, run_isolated, step, value};
//!
//! // Register a listener, then transform the value it depends on. The
//! // pipeline's write re-runs the listener.
//! run_isolated(&[
//!     effect(|r| {
//!         let n = r.get(&value(1));
//!         let _ = n;
//!     }),
//!     pipe(value(1), vec![step(|x: i32| x + 1)]),
//! ]);
//! ```
//!
//! The [`bridge`] module requires a tokio runtime; the synchronous layers
//! do not.

pub mod bridge;
pub mod describe;
pub mod reactive;
