//! Handler registry
//!
//! An [`Interpreter`] maps leaf types to handler functions. Each collaborator
//! (GitHub client, database, request context) builds one interpreter for the
//! leaves it owns, and the application merges them into a single dispatch
//! table. Merging copies handler maps in order, so the last registration for a
//! leaf type wins.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::action::leaf::short_type_name;
use crate::action::{Leaf, LeafRef, Value};

use super::Evaluate;
use super::error::{ActionError, Result};

type Handler = Arc<dyn Fn(&LeafRef) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    type_name: &'static str,
    handler: Handler,
}

/// Dispatch table from leaf type to handler.
#[derive(Clone, Default)]
pub struct Interpreter {
    handlers: HashMap<TypeId, Registration>,
}

impl Interpreter {
    /// Create an interpreter with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge interpreters in order; later handlers replace earlier ones.
    pub fn merge<I>(interpreters: I) -> Self
    where
        I: IntoIterator<Item = Interpreter>,
    {
        interpreters
            .into_iter()
            .fold(Self::new(), |merged, next| merged.merged_with(next))
    }

    /// Copy every handler from `other` into this interpreter, replacing
    /// handlers for leaf types both define.
    pub fn merged_with(mut self, other: Interpreter) -> Self {
        for (type_id, registration) in other.handlers {
            if self.handlers.insert(type_id, registration).is_some() {
                tracing::debug!(
                    action = self.handlers[&type_id].type_name,
                    "handler replaced during merge"
                );
            }
        }
        self
    }

    /// Start registering a handler for leaf type `L`.
    pub fn on<L: Leaf>(self) -> On<L> {
        On {
            interpreter: self,
            _leaf: PhantomData,
        }
    }

    /// Register a no-op handler for a leaf whose result carries no information.
    pub fn ignore<L: Leaf<Output = ()>>(self) -> Self {
        self.register::<L, _>(|_| Ok(()))
    }

    /// Whether a handler is registered for `L`.
    pub fn handles<L: Leaf>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<L>())
    }

    /// Number of registered leaf types.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Names of every registered leaf type, sorted.
    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.values().map(|r| r.type_name).collect();
        names.sort_unstable();
        names
    }

    fn register<L, F>(mut self, handler: F) -> Self
    where
        L: Leaf,
        F: Fn(&L) -> Result<L::Output> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(move |leaf: &LeafRef| {
            let leaf = leaf
                .downcast_ref::<L>()
                .ok_or(ActionError::TypeMismatch {
                    expected: std::any::type_name::<L>(),
                })?;
            handler(leaf).map(|output| Arc::new(output) as Value)
        });

        self.handlers.insert(
            TypeId::of::<L>(),
            Registration {
                type_name: short_type_name::<L>(),
                handler,
            },
        );
        self
    }
}

impl Evaluate for Interpreter {
    fn evaluate_leaf(&self, leaf: &LeafRef) -> Result<Value> {
        let Some(registration) = self.handlers.get(&leaf.leaf_type_id()) else {
            tracing::warn!(action = leaf.type_name(), "no handler registered");
            return Err(ActionError::Unhandled {
                type_name: leaf.type_name(),
            });
        };

        tracing::trace!(action = ?leaf, "dispatching leaf action");
        let result = (registration.handler)(leaf);
        if let Err(err) = &result {
            if !err.is_stopped() {
                tracing::debug!(action = registration.type_name, error = %err, "leaf action failed");
            }
        }
        result
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("handlers", &self.registered_types())
            .finish()
    }
}

/// Pending handler registration for leaf type `L`.
///
/// Obtained from [`Interpreter::on`]; every method hands the interpreter back.
pub struct On<L> {
    interpreter: Interpreter,
    _leaf: PhantomData<fn(L)>,
}

impl<L: Leaf> On<L> {
    /// Handle `L` with a fallible function.
    pub fn apply<F>(self, handler: F) -> Interpreter
    where
        F: Fn(&L) -> anyhow::Result<L::Output> + Send + Sync + 'static,
    {
        self.interpreter.register::<L, _>(move |leaf| {
            handler(leaf).map_err(|source| ActionError::Handler {
                type_name: short_type_name::<L>(),
                source,
            })
        })
    }

    /// Handle `L` with a function that may find nothing to return.
    ///
    /// `Ok(None)` fails the evaluation with [`ActionError::NoResult`].
    pub fn apply_optional<F>(self, handler: F) -> Interpreter
    where
        F: Fn(&L) -> anyhow::Result<Option<L::Output>> + Send + Sync + 'static,
    {
        self.interpreter.register::<L, _>(move |leaf| {
            match handler(leaf) {
                Ok(Some(output)) => Ok(output),
                Ok(None) => Err(ActionError::NoResult {
                    type_name: short_type_name::<L>(),
                }),
                Err(source) => Err(ActionError::Handler {
                    type_name: short_type_name::<L>(),
                    source,
                }),
            }
        })
    }

    /// Answer every `L` with the same value.
    pub fn returns(self, value: L::Output) -> Interpreter {
        self.interpreter.register::<L, _>(move |_| Ok(value.clone()))
    }

    /// Call `observer` with the leaf, then halt evaluation with
    /// [`ActionError::Stopped`].
    pub fn stop<F>(self, observer: F) -> Interpreter
    where
        F: Fn(&L) + Send + Sync + 'static,
    {
        self.interpreter.register::<L, _>(move |leaf| {
            observer(leaf);
            Err(ActionError::Stopped {
                type_name: short_type_name::<L>(),
                leaf: format!("{:?}", leaf),
            })
        })
    }
}
