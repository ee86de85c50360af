//! Revact – composable, interpretable actions for a code-review backend
//!
//! This crate separates describing effects from running them:
//! - Business logic builds immutable [`Action`] trees out of leaf effects
//! - An [`Interpreter`] maps each leaf type to a handler and reduces the tree
//! - A [`CachingInterpreter`] memoizes selected leaf types with write expiry
//! - A [`Stepper`] reduces a tree one layer at a time for inspection
//! - The [`review`] module applies all of this to grouping and approving
//!   pull-request hunks

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Action trees, leaves and combinators
pub mod action;
/// Leaf result caching
pub mod cache;
/// Handler registry and tree evaluation
pub mod interpreter;
/// Code-review domain
pub mod review;
/// Layer-by-layer evaluation
pub mod stepper;

// Re-export key types for convenience
pub use action::{Action, ActionValue, Leaf, LeafExt, LeafRef, sequence, traverse};
pub use cache::{ActionCache, CacheBuilder, CacheSettings, CachingInterpreter};
pub use interpreter::{ActionError, Evaluate, Interpreter, Response};
pub use stepper::Stepper;

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
