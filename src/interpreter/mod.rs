//! Action interpretation
//!
//! [`Evaluate`] is the seam between the tree-reduction algorithm and leaf
//! dispatch. Implementors only decide how one leaf is run; reducing `Return`,
//! `Suspend` and `Apply` nodes is shared by every evaluator, including the
//! caching decorator and the stepper.

use std::sync::Arc;

use serde::Serialize;

use crate::action::{Action, ActionValue, LeafRef, Node, Value, apply_value, downcast};

/// Error types for evaluation.
pub mod error;
/// Handler registry and the default interpreter.
pub mod registry;
/// Response boundary for fully evaluated actions.
pub mod response;

pub use error::{ActionError, Result};
pub use registry::{Interpreter, On};
pub use response::Response;

/// Something that can run leaf actions and, through them, whole action trees.
pub trait Evaluate {
    /// Run a single leaf through its handler.
    fn evaluate_leaf(&self, leaf: &LeafRef) -> Result<Value>;

    /// Reduce an action to its result, stopping at the first failure.
    fn evaluate<A: ActionValue>(&self, action: &Action<A>) -> Result<A>
    where
        Self: Sized,
    {
        let value = reduce(self, action.node())?;
        downcast::<A>(&value)
    }

    /// Reduce an action, panicking on failure.
    ///
    /// Intended for tests and call sites where a failed evaluation is a bug.
    fn evaluate_or_panic<A: ActionValue>(&self, action: &Action<A>) -> A
    where
        Self: Sized,
    {
        match self.evaluate(action) {
            Ok(value) => value,
            Err(err) => panic!("action evaluation failed: {err}"),
        }
    }

    /// Reduce an action and wrap its serialized result in a success response.
    fn evaluate_to_response<A>(&self, action: &Action<A>) -> Result<Response>
    where
        Self: Sized,
        A: ActionValue + Serialize,
    {
        let value = self.evaluate(action)?;
        Response::ok(&value)
    }
}

impl<E: Evaluate + ?Sized> Evaluate for &E {
    fn evaluate_leaf(&self, leaf: &LeafRef) -> Result<Value> {
        (**self).evaluate_leaf(leaf)
    }
}

impl<E: Evaluate + ?Sized> Evaluate for Arc<E> {
    fn evaluate_leaf(&self, leaf: &LeafRef) -> Result<Value> {
        (**self).evaluate_leaf(leaf)
    }
}

/// Pending work while reducing a tree.
enum Frame {
    /// Feed the value into a `Suspend` continuation.
    Bind(crate::action::Continuation),
    /// The argument of an `Apply` is being reduced; the function comes next.
    Function(Arc<Node>),
    /// The argument of an `Apply` is known; the function is being reduced.
    Argument(Value),
}

/// Reduce a node tree to a value using an explicit stack.
///
/// `Apply` reduces its argument before its function. Neither branch depends on
/// the other, so callers must not rely on that order.
pub(crate) fn reduce<E: Evaluate + ?Sized>(evaluator: &E, root: &Arc<Node>) -> Result<Value> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut current = Arc::clone(root);

    loop {
        let mut value = match &*current {
            Node::Return(value) => Arc::clone(value),
            Node::Suspend {
                source,
                continuation,
            } => {
                let source = Arc::clone(source);
                stack.push(Frame::Bind(Arc::clone(continuation)));
                current = source;
                continue;
            }
            Node::Apply { function, argument } => {
                let argument = Arc::clone(argument);
                stack.push(Frame::Function(Arc::clone(function)));
                current = argument;
                continue;
            }
            Node::Leaf(leaf) => evaluator.evaluate_leaf(leaf)?,
        };

        // Unwind until a frame needs another subtree reduced.
        loop {
            match stack.pop() {
                None => return Ok(value),
                Some(Frame::Bind(continuation)) => {
                    current = continuation(&value)?;
                    break;
                }
                Some(Frame::Function(function)) => {
                    stack.push(Frame::Argument(value));
                    current = function;
                    break;
                }
                Some(Frame::Argument(argument)) => {
                    value = apply_value(&value, &argument)?;
                }
            }
        }
    }
}
