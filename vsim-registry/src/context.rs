//! Call contexts and lock identity

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity under which per-object locks are held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

static CONTEXT_COUNTER: AtomicU64 = AtomicU64::new(1);

impl ContextId {
    fn next() -> Self {
        Self(CONTEXT_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx:{}", self.0)
    }
}

/// A simulated client call.
///
/// Every lock taken through the registry is owned by a context identity. A
/// context may re-acquire a lock it already holds; any other context blocks
/// until the lock is released.
///
/// `Context::new()` always yields a fresh identity. Cloning shares the
/// identity, which is how a caller hands a held lock over to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    id: ContextId,
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: ContextId::next(),
        }
    }

    /// A context that shares nothing with `self`
    pub fn isolated(&self) -> Self {
        Self::new()
    }

    pub fn id(&self) -> ContextId {
        self.id
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
