//! Layer-by-layer evaluation
//!
//! A [`Stepper`] reduces an action one layer at a time so tests and tooling can
//! see which leaves are about to run before any of them does. Each call to
//! [`Stepper::next`] runs exactly the leaves reported by the preceding
//! [`Stepper::peek`] and folds the tree one level.

use std::sync::Arc;

use crate::action::{
    Action, ActionValue, Continuation, LeafRef, Node, Value, apply_value, downcast,
};
use crate::interpreter::{ActionError, Evaluate, Result};

enum State {
    /// Tree still holding unresolved work.
    Pending(Arc<Node>),
    /// Fully reduced.
    Done(Value),
}

/// Stepwise driver over an [`Evaluate`] implementation.
pub struct Stepper<'i, I, A> {
    interpreter: &'i I,
    state: State,
    steps: usize,
    _output: std::marker::PhantomData<fn() -> A>,
}

impl<'i, I: Evaluate, A: ActionValue> Stepper<'i, I, A> {
    /// Prepare to step through `action`. Nothing is evaluated yet.
    pub fn new(interpreter: &'i I, action: &Action<A>) -> Self {
        let node = Arc::clone(action.node());
        let state = match &*node {
            Node::Return(value) => State::Done(Arc::clone(value)),
            _ => State::Pending(node),
        };
        Self {
            interpreter,
            state,
            steps: 0,
            _output: std::marker::PhantomData,
        }
    }

    /// Leaves that the next step would run, without running them.
    pub fn peek(&self) -> Vec<LeafRef> {
        match &self.state {
            State::Pending(node) => {
                let mut leaves = Vec::new();
                collect_outermost(node, &mut leaves);
                leaves
            }
            State::Done(_) => Vec::new(),
        }
    }

    /// Run the peekable leaves, fold one layer, and report the new frontier.
    ///
    /// Fails with [`ActionError::Done`] once the action has been reduced to a
    /// value. A failing leaf leaves the pending tree as it was.
    pub fn next(&mut self) -> Result<Vec<LeafRef>> {
        let State::Pending(node) = &self.state else {
            return Err(ActionError::Done);
        };

        let reduced = step(self.interpreter, node)?;
        self.steps += 1;

        self.state = match &*reduced {
            Node::Return(value) => State::Done(Arc::clone(value)),
            _ => State::Pending(reduced),
        };
        let frontier = self.peek();
        tracing::trace!(step = self.steps, pending = frontier.len(), "stepped action");
        Ok(frontier)
    }

    /// Evaluate whatever remains in one go.
    pub fn run_remaining_steps(self) -> Result<A> {
        match self.state {
            State::Pending(node) => self.interpreter.evaluate(&Action::<A>::from_node(node)),
            State::Done(value) => downcast::<A>(&value),
        }
    }

    /// Whether the action has been reduced to a value.
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done(_))
    }

    /// Number of successful calls to [`Stepper::next`].
    pub fn steps(&self) -> usize {
        self.steps
    }
}

/// Outermost unresolved leaves, function branch before argument branch.
fn collect_outermost(root: &Node, leaves: &mut Vec<LeafRef>) {
    let mut pending = vec![root];
    while let Some(node) = pending.pop() {
        match node {
            Node::Return(_) => {}
            Node::Suspend { source, .. } => pending.push(source),
            Node::Apply { function, argument } => {
                pending.push(argument);
                pending.push(function);
            }
            Node::Leaf(leaf) => leaves.push(leaf.clone()),
        }
    }
}

/// Work left on the spine while stepping a tree.
enum Frame {
    /// Rebuild a `Suspend` around the stepped source, or resume it.
    Bind(Continuation),
    /// The function branch is being stepped; this argument comes next.
    Function(Arc<Node>),
    /// The argument branch is being stepped; this is the stepped function.
    Argument(Arc<Node>),
}

fn returned(node: &Node) -> Option<Value> {
    match node {
        Node::Return(value) => Some(Arc::clone(value)),
        _ => None,
    }
}

/// Reduce one layer of `root`, returning a new tree.
///
/// Every leaf reachable without crossing a continuation runs once; a
/// continuation whose source became a value is resumed but its result is not
/// stepped further.
fn step<E: Evaluate>(evaluator: &E, root: &Arc<Node>) -> Result<Arc<Node>> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut current = Arc::clone(root);

    loop {
        let mut reduced = match &*current {
            Node::Return(_) => Arc::clone(&current),
            Node::Leaf(leaf) => Arc::new(Node::Return(evaluator.evaluate_leaf(leaf)?)),
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
                let function = Arc::clone(function);
                stack.push(Frame::Function(Arc::clone(argument)));
                current = function;
                continue;
            }
        };

        // Rebuild the spine until a frame needs another subtree stepped.
        loop {
            match stack.pop() {
                None => return Ok(reduced),
                Some(Frame::Bind(continuation)) => {
                    reduced = match returned(&reduced) {
                        Some(value) => continuation(&value)?,
                        None => Arc::new(Node::Suspend {
                            source: reduced,
                            continuation,
                        }),
                    };
                }
                Some(Frame::Function(argument)) => {
                    stack.push(Frame::Argument(reduced));
                    current = argument;
                    break;
                }
                Some(Frame::Argument(function)) => {
                    reduced = match (returned(&function), returned(&reduced)) {
                        (Some(f), Some(x)) => Arc::new(Node::Return(apply_value(&f, &x)?)),
                        _ => Arc::new(Node::Apply {
                            function,
                            argument: reduced,
                        }),
                    };
                }
            }
        }
    }
}
