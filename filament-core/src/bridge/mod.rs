//! Asynchronous Bridge
//!
//! The bridge connects one-shot asynchronous operations to the synchronous
//! reactive graph. An operation is represented twice:
//!
//! - as a reactive *cell* holding an [`AsyncState`] that moves from
//!   `Pending` to exactly one terminal state, so synchronous listeners can
//!   depend on the settlement like any other write;
//! - as a *settlement channel* that asynchronous consumers can await
//!   directly, without polling the cell.
//!
//! # Execution model
//!
//! Everything here assumes a cooperative single-threaded tokio runtime:
//! spawned tasks interleave at await points only, and every tracking window
//! opened by a reader spans purely synchronous code. Readers that carry a
//! listener across suspension points re-install it around each individual
//! read rather than holding it open across an await.
//!
//! # Failure
//!
//! An operation that completes with `Err` settles its cell as
//! [`AsyncState::Rejected`]; that is a value, not an error. The only error
//! surfaced by the bridge itself is [`BridgeError::SourceDropped`]: the
//! settlement channel's producer side went away before settling, so the
//! awaited outcome can never arrive.

use thiserror::Error;

mod promise;
mod runner;

pub use promise::{map_async, promise, AsyncDescribe, AsyncState, PromiseNode};
pub use runner::{
    effect_async, func_async, leave_async, pipe_async, step_async, tap_async, AsyncReader,
    AsyncStep,
};

/// Errors surfaced by the asynchronous bridge.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The settlement channel's producer side was dropped before an outcome
    /// was delivered.
    #[error("asynchronous source dropped before settling")]
    SourceDropped,
}
