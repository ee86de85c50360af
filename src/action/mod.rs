//! Composable action trees
//!
//! An [`Action`] describes work without doing it. Leaves name concrete effects,
//! and three structural nodes glue them together:
//!
//! - `Return` holds an already computed value
//! - `Suspend` runs a source action and feeds its result to a continuation
//! - `Apply` combines two independent actions, one of which yields a function
//!
//! Every combinator bottoms out in these nodes, so an interpreter needs a single
//! reduction algorithm for any tree. Trees are immutable and share structure
//! through `Arc`, which makes cloning an action cheap.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use crate::interpreter::ActionError;

/// Leaf trait and type-erased leaf handles.
pub mod leaf;

pub use leaf::{Leaf, LeafExt, LeafRef};

/// Bound shared by every value flowing through an action tree.
pub trait ActionValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> ActionValue for T {}

/// Type-erased value produced while reducing a tree.
///
/// Leaf handlers and custom [`Evaluate`](crate::interpreter::Evaluate)
/// implementations exchange results in this form.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Continuation of a `Suspend` node.
pub(crate) type Continuation =
    Arc<dyn Fn(&Value) -> Result<Arc<Node>, ActionError> + Send + Sync>;

/// Function value consumed by an `Apply` node.
#[derive(Clone)]
pub(crate) struct FnValue(Arc<dyn Fn(&Value) -> Result<Value, ActionError> + Send + Sync>);

impl FnValue {
    fn new<A, B, F>(f: F) -> Self
    where
        A: ActionValue,
        B: ActionValue,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        Self(Arc::new(move |value: &Value| {
            let arg = downcast::<A>(value)?;
            Ok(Arc::new(f(arg)) as Value)
        }))
    }
}

/// Internal node representation of an action tree.
pub(crate) enum Node {
    Return(Value),
    Suspend {
        source: Arc<Node>,
        continuation: Continuation,
    },
    Apply {
        function: Arc<Node>,
        argument: Arc<Node>,
    },
    Leaf(LeafRef),
}

impl Node {
    /// Whether this node is a fully reduced value.
    pub(crate) fn is_return(&self) -> bool {
        matches!(self, Node::Return(_))
    }

    fn detach_children(&mut self, out: &mut Vec<Arc<Node>>) {
        match self {
            Node::Suspend { source, .. } => out.push(std::mem::replace(source, placeholder())),
            Node::Apply { function, argument } => {
                out.push(std::mem::replace(function, placeholder()));
                out.push(std::mem::replace(argument, placeholder()));
            }
            Node::Return(_) | Node::Leaf(_) => {}
        }
    }
}

/// Shared stand-in used while tearing a tree down.
fn placeholder() -> Arc<Node> {
    static PLACEHOLDER: OnceLock<Arc<Node>> = OnceLock::new();
    Arc::clone(PLACEHOLDER.get_or_init(|| Arc::new(Node::Return(Arc::new(())))))
}

// Long `then` chains nest deeply; drop them iteratively instead of recursing.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_children(&mut pending);
        while let Some(child) = pending.pop() {
            if let Some(mut node) = Arc::into_inner(child) {
                node.detach_children(&mut pending);
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        enum Token<'a> {
            Node(&'a Node),
            Text(&'static str),
        }

        let mut pending = vec![Token::Node(self)];
        while let Some(token) = pending.pop() {
            match token {
                Token::Text(text) => f.write_str(text)?,
                Token::Node(Node::Return(_)) => f.write_str("Return(..)")?,
                Token::Node(Node::Leaf(leaf)) => write!(f, "{:?}", leaf)?,
                Token::Node(Node::Suspend { source, .. }) => {
                    f.write_str("Suspend(")?;
                    pending.push(Token::Text(", <continuation>)"));
                    pending.push(Token::Node(&**source));
                }
                Token::Node(Node::Apply { function, argument }) => {
                    f.write_str("Apply(")?;
                    pending.push(Token::Text(")"));
                    pending.push(Token::Node(&**argument));
                    pending.push(Token::Text(", "));
                    pending.push(Token::Node(&**function));
                }
            }
        }
        Ok(())
    }
}

/// Recover a concrete value from the erased representation.
///
/// Construction sites are type-checked, so a mismatch here means a node was
/// assembled by hand with the wrong payload.
pub(crate) fn downcast<T: ActionValue>(value: &Value) -> Result<T, ActionError> {
    (**value)
        .downcast_ref::<T>()
        .cloned()
        .ok_or(ActionError::TypeMismatch {
            expected: std::any::type_name::<T>(),
        })
}

/// Apply a reduced function value to a reduced argument.
pub(crate) fn apply_value(function: &Value, argument: &Value) -> Result<Value, ActionError> {
    let function = downcast::<FnValue>(function)?;
    (function.0)(argument)
}

/// A suspended computation producing an `A` when interpreted.
pub struct Action<A> {
    node: Arc<Node>,
    _output: PhantomData<fn() -> A>,
}

impl<A> Clone for Action<A> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
            _output: PhantomData,
        }
    }
}

impl<A> fmt::Debug for Action<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.node, f)
    }
}

impl<A> Action<A> {
    pub(crate) fn from_node(node: Arc<Node>) -> Self {
        Self {
            node,
            _output: PhantomData,
        }
    }

    pub(crate) fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Whether this action is an already computed value.
    pub fn is_pure(&self) -> bool {
        self.node.is_return()
    }
}

impl Action<()> {
    /// An action that does nothing and yields `()`.
    pub fn unit() -> Self {
        Action::pure(())
    }
}

impl<A: ActionValue> Action<A> {
    /// Lift a constant into an action with no effects.
    pub fn pure(value: A) -> Self {
        Self::from_node(Arc::new(Node::Return(Arc::new(value))))
    }

    /// Describe a single leaf effect.
    pub fn perform<L: Leaf<Output = A>>(leaf: L) -> Self {
        Self::from_node(Arc::new(Node::Leaf(LeafRef::new(leaf))))
    }

    /// Transform the eventual result with a pure function.
    pub fn map<B, F>(self, f: F) -> Action<B>
    where
        B: ActionValue,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let function = Arc::new(Node::Return(Arc::new(FnValue::new(f))));
        Action::from_node(Arc::new(Node::Apply {
            function,
            argument: self.node,
        }))
    }

    /// Keep this action's effects but replace its result.
    pub fn replace<B: ActionValue>(self, value: B) -> Action<B> {
        self.map(move |_| value.clone())
    }

    /// Discard the result, keeping the effects.
    pub fn to_unit(self) -> Action<()> {
        self.replace(())
    }

    /// Sequential bind: `f` runs only once this action's result is known.
    pub fn then<B, F>(self, f: F) -> Action<B>
    where
        B: ActionValue,
        F: Fn(A) -> Action<B> + Send + Sync + 'static,
    {
        let continuation: Continuation = Arc::new(move |value: &Value| {
            let a = downcast::<A>(value)?;
            Ok(f(a).node)
        });
        Action::from_node(Arc::new(Node::Suspend {
            source: self.node,
            continuation,
        }))
    }

    /// Run `next` after this action, ignoring this action's result.
    pub fn followed_by<B: ActionValue>(self, next: Action<B>) -> Action<B> {
        self.then(move |_| next.clone())
    }

    /// Combine with an independently described function action.
    pub fn ap<B, F>(self, function: Action<F>) -> Action<B>
    where
        B: ActionValue,
        F: Fn(A) -> B + ActionValue,
    {
        let function = function.map(FnValue::new::<A, B, F>);
        Action::from_node(Arc::new(Node::Apply {
            function: function.node,
            argument: self.node,
        }))
    }

    /// Pair the results of two independent actions.
    pub fn zip<B: ActionValue>(self, other: Action<B>) -> Action<(A, B)> {
        other.ap(self.map(|a: A| move |b: B| (a.clone(), b)))
    }
}

/// Collapse a list of actions into one action yielding their results in order.
///
/// The tree is built as a balanced fold, so its depth grows with the log of the
/// input length.
pub fn sequence<A, I>(actions: I) -> Action<Vec<A>>
where
    A: ActionValue,
    I: IntoIterator<Item = Action<A>>,
{
    let actions: Vec<Action<A>> = actions.into_iter().collect();
    sequence_slice(&actions)
}

fn sequence_slice<A: ActionValue>(actions: &[Action<A>]) -> Action<Vec<A>> {
    match actions {
        [] => Action::pure(Vec::new()),
        [single] => single.clone().map(|a| vec![a]),
        _ => {
            let (left, right) = actions.split_at(actions.len() / 2);
            sequence_slice(left)
                .zip(sequence_slice(right))
                .map(|(mut left, right)| {
                    left.extend(right);
                    left
                })
        }
    }
}

/// Map each item to an action, then [`sequence`] the results.
pub fn traverse<T, A, I, F>(items: I, f: F) -> Action<Vec<A>>
where
    A: ActionValue,
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Action<A>,
{
    sequence(items.into_iter().map(f))
}
