use super::SegmentRef;
use crate::sync::sync_compat::{AtomicU32, Ordering};

const EMPTY: u32 = 0;
const LOCKED: u32 = 1;
const BASE: u32 = 2;

/// Decoded [`ChildrenHandle`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Children {
    Empty,
    /// one thread is allocating the children
    Locked,
    Populated(SegmentRef),
}

/// A node's link to its child segment.
///
/// Only the thread that wins `Empty -> Locked` may publish children; every
/// other thread sees `Locked` and backs off.
pub struct ChildrenHandle(AtomicU32);

impl ChildrenHandle {
    pub fn new() -> Self {
        ChildrenHandle(AtomicU32::new(EMPTY))
    }

    #[inline]
    fn decode(raw: u32) -> Children {
        match raw {
            EMPTY => Children::Empty,
            LOCKED => Children::Locked,
            seg => Children::Populated(SegmentRef(seg - BASE)),
        }
    }

    #[inline]
    pub fn get(&self) -> Children {
        Self::decode(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn segment(&self) -> Option<SegmentRef> {
        match self.get() {
            Children::Populated(seg) => Some(seg),
            _ => None,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.load(Ordering::Acquire) == EMPTY
    }

    /// Claim the right to populate. False if another thread holds it or the
    /// children already exist.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.0.compare_exchange(EMPTY, LOCKED, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    /// Publish children allocated under the lock.
    pub fn publish(&self, seg: SegmentRef) {
        let published = self
            .0
            .compare_exchange(LOCKED, seg.0 + BASE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        assert!(published, "children published without holding the lock");
    }

    /// Give the lock back without publishing.
    pub fn unlock(&self) {
        let released = self.0.compare_exchange(LOCKED, EMPTY, Ordering::AcqRel, Ordering::Acquire).is_ok();
        assert!(released, "children unlocked without holding the lock");
    }

    /// Detach the children. Only valid while no worker is searching.
    pub fn take(&self) -> Option<SegmentRef> {
        match Self::decode(self.0.swap(EMPTY, Ordering::AcqRel)) {
            Children::Populated(seg) => Some(seg),
            Children::Empty => None,
            Children::Locked => panic!("children taken while locked"),
        }
    }

    /// Point at a relocated segment. Only valid while no worker is searching.
    pub(crate) fn relink(&self, seg: SegmentRef) {
        self.0.store(seg.0 + BASE, Ordering::Release);
    }

    pub(crate) fn copy_from(&self, other: &ChildrenHandle) {
        self.0.store(other.0.load(Ordering::Acquire), Ordering::Release);
    }

    pub(crate) fn clear(&self) {
        self.0.store(EMPTY, Ordering::Release);
    }
}

impl Default for ChildrenHandle {
    fn default() -> Self {
        ChildrenHandle::new()
    }
}

impl std::fmt::Debug for ChildrenHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.get())
    }
}
