//! Reactive Graph Engine
//!
//! This module implements the core of the runtime: nodes, listeners, and the
//! context that ties them together.
//!
//! # Concepts
//!
//! ## Nodes
//!
//! A Node is the atomic reactive cell. It holds a source (a plain value or a
//! lazy producer), a memoized value, and the list of listeners subscribed to
//! it. Reading a node inside a tracked listener registers that listener as a
//! subscriber; writing a changed value schedules every subscriber for re-run.
//!
//! ## Listeners
//!
//! A Listener is a zero-argument reaction. While a listener executes it is
//! the *current listener*, and every node read during that window subscribes
//! it. Listeners re-run only through the batch-flush mechanism, when a node
//! they previously read is written.
//!
//! ## Context
//!
//! The Context owns the current-listener stack, the pending listener batch,
//! and the transaction depth. Writes inside a transaction coalesce into one
//! flush at the outermost boundary; writes outside a transaction flush
//! immediately.
//!
//! # Implementation Notes
//!
//! Dependency detection is automatic: reads consult the context's
//! current-listener stack, so combinator code never wires subscriptions by
//! hand. This is the same "transparent reactivity" approach used by SolidJS,
//! Vue 3, and Leptos.

mod context;
mod listener;
mod node;

pub use context::Context;
pub use listener::{Listener, ListenerId};
pub use node::{Node, NodeId, Reactive, Source};
