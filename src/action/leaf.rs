//! Leaf actions and their type-erased handles
//!
//! A leaf is a plain value describing one concrete effect ("fetch pull request
//! 42", "read header X-Reviewer"). Leaves carry input fields only; the
//! interpreter decides what running them means. Because cached results are
//! keyed by leaf value, every leaf type must implement structural equality and
//! hashing.

use std::any::{Any, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::Action;

/// A concrete effect description dispatched to a registered handler.
pub trait Leaf: fmt::Debug + Eq + Hash + Send + Sync + 'static {
    /// Result produced when the leaf is interpreted.
    type Output: Clone + Send + Sync + 'static;
}

/// Convenience conversion from a leaf value into an [`Action`].
pub trait LeafExt: Leaf + Sized {
    /// Lift this leaf into a single-node action.
    fn action(self) -> Action<Self::Output> {
        Action::perform(self)
    }
}

impl<L: Leaf> LeafExt for L {}

/// Object-safe view of a [`Leaf`].
pub(crate) trait ErasedLeaf: fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn leaf_type_id(&self) -> TypeId;
    fn type_name(&self) -> &'static str;
    fn dyn_eq(&self, other: &dyn ErasedLeaf) -> bool;
    fn dyn_hash(&self) -> u64;
}

impl<L: Leaf> ErasedLeaf for L {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn leaf_type_id(&self) -> TypeId {
        TypeId::of::<L>()
    }

    fn type_name(&self) -> &'static str {
        short_type_name::<L>()
    }

    fn dyn_eq(&self, other: &dyn ErasedLeaf) -> bool {
        other
            .as_any()
            .downcast_ref::<L>()
            .is_some_and(|other| self == other)
    }

    fn dyn_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        TypeId::of::<L>().hash(&mut hasher);
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Shared, type-erased handle on a leaf instance.
///
/// Two handles are equal when they wrap the same leaf type with equal field
/// values, which makes `LeafRef` usable as a cache key.
#[derive(Clone)]
pub struct LeafRef(Arc<dyn ErasedLeaf>);

impl LeafRef {
    /// Wrap a leaf value.
    pub fn new<L: Leaf>(leaf: L) -> Self {
        Self(Arc::new(leaf))
    }

    /// Short name of the wrapped leaf type (without its module path).
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Runtime type identity of the wrapped leaf.
    pub fn leaf_type_id(&self) -> TypeId {
        self.0.leaf_type_id()
    }

    /// Whether the wrapped leaf is an `L`.
    pub fn is<L: Leaf>(&self) -> bool {
        self.leaf_type_id() == TypeId::of::<L>()
    }

    /// Borrow the wrapped leaf as an `L`, if it is one.
    pub fn downcast_ref<L: Leaf>(&self) -> Option<&L> {
        self.0.as_any().downcast_ref::<L>()
    }

    pub(crate) fn as_any(&self) -> &dyn Any {
        self.0.as_any()
    }
}

impl PartialEq for LeafRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl Eq for LeafRef {}

impl Hash for LeafRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.dyn_hash());
    }
}

impl fmt::Debug for LeafRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Last path segment of a type name, keeping generic arguments intact.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}
