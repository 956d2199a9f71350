use std::sync::atomic::AtomicU32;

use super::ArenaNode;

/// Sentinel parent of a free segment.
pub(crate) const FREE: u32 = u32::MAX;

/// One large block of node slots plus a segment header per slot. Headers are
/// only meaningful at segment starts.
pub(crate) struct Chunk<T> {
    pub slots: Box<[T]>,
    pub capacity: Box<[AtomicU32]>,
    pub parent: Box<[AtomicU32]>,
    /// bump offset, only grows between compactions
    pub used: AtomicU32,
}

impl<T: ArenaNode> Chunk<T> {
    pub fn new(slots: u32) -> Box<Self> {
        let n = slots as usize;
        Box::new(Chunk {
            slots: (0..n).map(|_| T::default()).collect(),
            capacity: (0..n).map(|_| AtomicU32::new(0)).collect(),
            parent: (0..n).map(|_| AtomicU32::new(FREE)).collect(),
            used: AtomicU32::new(0),
        })
    }
}
