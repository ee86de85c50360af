//! Error types for action evaluation
//!
//! Every failure is fail-fast: the first error aborts the rest of the tree and
//! is returned to the caller unchanged.

use thiserror::Error;

/// Failure produced while evaluating or stepping an action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// No handler was registered for a leaf type
    #[error("no handler registered for action type {type_name}")]
    Unhandled {
        /// Short name of the leaf type
        type_name: &'static str,
    },

    /// A handler returned an error
    #[error("handler for {type_name} failed: {source}")]
    Handler {
        /// Short name of the leaf type
        type_name: &'static str,
        /// Error raised by the handler
        #[source]
        source: anyhow::Error,
    },

    /// A handler returned no value where one was required
    #[error("handler for {type_name} produced no result")]
    NoResult {
        /// Short name of the leaf type
        type_name: &'static str,
    },

    /// Evaluation reached a leaf registered with `stop`
    #[error("evaluation stopped at {leaf}")]
    Stopped {
        /// Short name of the leaf type
        type_name: &'static str,
        /// Debug rendering of the leaf that was reached
        leaf: String,
    },

    /// The stepper has already reduced its action to a value
    #[error("stepper has no remaining steps")]
    Done,

    /// An erased value did not have the expected type
    #[error("internal type mismatch: expected {expected}")]
    TypeMismatch {
        /// Expected type name
        expected: &'static str,
    },

    /// Serializing a response body failed
    #[error("failed to serialize response: {0}")]
    Response(#[from] serde_json::Error),
}

impl ActionError {
    /// Whether this is the signal raised by a `stop` handler.
    pub fn is_stopped(&self) -> bool {
        matches!(self, ActionError::Stopped { .. })
    }

    /// Whether this is the stepper's terminal signal.
    pub fn is_done(&self) -> bool {
        matches!(self, ActionError::Done)
    }

    /// Leaf type involved in the failure, when there is one.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            ActionError::Unhandled { type_name }
            | ActionError::Handler { type_name, .. }
            | ActionError::NoResult { type_name }
            | ActionError::Stopped { type_name, .. } => Some(type_name),
            _ => None,
        }
    }
}

/// Result type using ActionError
pub type Result<T> = std::result::Result<T, ActionError>;
