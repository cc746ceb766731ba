//! Identifiers for values in the object graph.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identifies one [`ValueOwner`](super::ValueOwner) arena.
///
/// Every document's binder gets a fresh id from a process-wide counter.
/// [`OwnerId::LINK`] is reserved for the objects a link pass creates, so
/// two links over the same input produce identical handles.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct OwnerId(u32);

static NEXT_OWNER: AtomicU32 = AtomicU32::new(1);

impl OwnerId {
    /// The arena owned by a link result.
    pub const LINK: OwnerId = OwnerId(0);

    /// Allocate an id not used by any other arena in this process.
    pub fn fresh() -> Self {
        Self(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::LINK {
            write!(f, "OwnerId(link)")
        } else {
            write!(f, "OwnerId({})", self.0)
        }
    }
}

/// A handle to one object inside a [`ValueOwner`](super::ValueOwner).
///
/// Handles stay valid exactly as long as the owning arena is alive; they
/// never keep it alive themselves.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObjectRef {
    pub owner: OwnerId,
    pub index: u32,
}

impl ObjectRef {
    #[inline]
    pub const fn new(owner: OwnerId, index: u32) -> Self {
        Self { owner, index }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:?}#{})", self.owner, self.index)
    }
}
