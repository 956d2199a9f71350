//! Segmented arena for search trees.
//!
//! Nodes live in large chunks and are handed out in segments: contiguous runs
//! of slots holding the children of one node. Allocation bumps a per-chunk
//! offset with CAS and links new chunks on demand, also with CAS. Freed
//! segments go to an exact-capacity freelist, so a bucket of capacity K only
//! ever serves requests of K.
//!
//! Every segment header records the node whose [`ChildrenHandle`] points at
//! it. [`Arena::compact`] uses that back reference to slide live segments
//! left and repair both the parent handle and the headers of the moved
//! nodes' own children.
//!
//! Nodes and segments are addressed by `u32` slot indices, never pointers.

mod children;
mod chunk;
mod gc;

#[cfg(test)]
mod tests;

use std::mem::size_of;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64, Ordering};

use self::chunk::{Chunk, FREE};
pub use self::children::{Children, ChildrenHandle};
pub use self::gc::{GcReport, GcThreshold, collect_garbage};
use crate::config::CompactParams;
use crate::sync::SpinLock;

/// Largest segment. A Havannah node has at most 361 children plus swap.
pub const MAX_SEGMENT: u32 = 512;

/// Upper bound on linked chunks.
pub const MAX_CHUNKS: usize = 4096;

/// Payload stored in the arena.
pub trait ArenaNode: Default + Send + Sync + 'static {
    fn children(&self) -> &ChildrenHandle;

    /// Copy every field of `other`, including the raw children link.
    fn copy_from(&self, other: &Self);

    /// Return to the freshly allocated state.
    fn reset(&self);
}

/// Index of one node slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef(u32);

impl NodeRef {
    /// Back reference of the root segment: the arena's own root handle.
    pub const ROOT_HOLDER: NodeRef = NodeRef(u32::MAX - 1);

    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Index of the first slot of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentRef(u32);

impl SegmentRef {
    #[inline]
    pub const fn new(index: u32) -> SegmentRef {
        SegmentRef(index)
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn node(self, i: usize) -> NodeRef {
        NodeRef(self.0 + i as u32)
    }
}

/// Outcome of [`Arena::compact`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactStats {
    pub chunks_before: usize,
    pub chunks_after: usize,
    pub moved_segments: usize,
    pub moved_slots: u64,
    pub live_slots: u64,
}

pub struct Arena<T: ArenaNode> {
    chunk_slots: u32,
    chunks: Box<[AtomicPtr<Chunk<T>>]>,
    /// chunk currently bumped
    current: AtomicU32,
    /// indexed by capacity
    freelists: Box<[SpinLock<Vec<SegmentRef>>]>,
    live: AtomicU64,
    root: ChildrenHandle,
}

impl<T: ArenaNode> Arena<T> {
    /// Arena whose chunks hold `chunk_slots` nodes each.
    pub fn new(chunk_slots: u32) -> Self {
        assert!(chunk_slots >= MAX_SEGMENT, "chunk must hold the largest segment");
        let max_chunks = (((u32::MAX - 2) / chunk_slots) as usize).min(MAX_CHUNKS);
        Arena {
            chunk_slots,
            chunks: (0..max_chunks).map(|_| AtomicPtr::new(ptr::null_mut())).collect(),
            current: AtomicU32::new(0),
            freelists: (0..=MAX_SEGMENT).map(|_| SpinLock::new(Vec::new())).collect(),
            live: AtomicU64::new(0),
            root: ChildrenHandle::new(),
        }
    }

    /// Arena with chunks of roughly `bytes`.
    pub fn with_chunk_bytes(bytes: usize) -> Self {
        Arena::new(((bytes / Self::slot_bytes()) as u32).max(MAX_SEGMENT))
    }

    #[inline]
    pub fn slot_bytes() -> usize {
        size_of::<T>() + 2 * size_of::<AtomicU32>()
    }

    #[inline]
    pub fn chunk_slots(&self) -> u32 {
        self.chunk_slots
    }

    #[inline]
    fn split(&self, idx: u32) -> (usize, usize) {
        ((idx / self.chunk_slots) as usize, (idx % self.chunk_slots) as usize)
    }

    #[inline]
    fn chunk(&self, ci: usize) -> &Chunk<T> {
        let p = self.chunks[ci].load(Ordering::Acquire);
        assert!(!p.is_null(), "access to unlinked chunk {ci}");
        // SAFETY: linked chunks are only freed through `&mut self`
        // (`compact`, `clear`, drop), so the chunk outlives this borrow.
        unsafe { &*p }
    }

    /// Chunk `ci`, linking a fresh one if nobody has yet.
    fn chunk_or_link(&self, ci: usize) -> Option<&Chunk<T>> {
        let slot = self.chunks.get(ci)?;
        let mut p = slot.load(Ordering::Acquire);
        if p.is_null() {
            let fresh = Box::into_raw(Chunk::<T>::new(self.chunk_slots));
            match slot.compare_exchange(ptr::null_mut(), fresh, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => p = fresh,
                Err(winner) => {
                    // SAFETY: `fresh` was never shared.
                    drop(unsafe { Box::from_raw(fresh) });
                    p = winner;
                }
            }
        }
        // SAFETY: see `chunk`.
        Some(unsafe { &*p })
    }

    fn linked_chunks(&self) -> usize {
        self.chunks.iter().take_while(|c| !c.load(Ordering::Acquire).is_null()).count()
    }

    /// Allocate `cap` reset nodes whose link lives in `parent`. `None` once
    /// the chunk table is full.
    pub fn alloc(&self, cap: u32, parent: NodeRef) -> Option<SegmentRef> {
        assert!((1..=MAX_SEGMENT).contains(&cap), "segment capacity {cap} out of range");

        if let Some(seg) = self.freelists[cap as usize].lock().pop() {
            self.init_segment(seg, cap, parent);
            return Some(seg);
        }

        let spc = self.chunk_slots;
        loop {
            let ci = self.current.load(Ordering::Acquire) as usize;
            let Some(chunk) = self.chunk_or_link(ci) else {
                log::warn!("arena: chunk table full ({} chunks)", self.chunks.len());
                return None;
            };
            let used = chunk.used.load(Ordering::Acquire);
            if used + cap <= spc {
                if chunk
                    .used
                    .compare_exchange_weak(used, used + cap, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    let seg = SegmentRef(ci as u32 * spc + used);
                    self.init_segment(seg, cap, parent);
                    return Some(seg);
                }
                continue;
            }
            // seal the tail so nobody else bumps into it, then recycle it
            if used < spc {
                if chunk.used.compare_exchange(used, spc, Ordering::AcqRel, Ordering::Acquire).is_err() {
                    continue;
                }
                self.release_range(ci, used, spc);
            }
            let _ = self.current.compare_exchange(ci as u32, ci as u32 + 1, Ordering::AcqRel, Ordering::Acquire);
        }
    }

    fn init_segment(&self, seg: SegmentRef, cap: u32, parent: NodeRef) {
        let (ci, off) = self.split(seg.0);
        let chunk = self.chunk(ci);
        chunk.capacity[off].store(cap, Ordering::Relaxed);
        chunk.parent[off].store(parent.0, Ordering::Release);
        for node in &chunk.slots[off..off + cap as usize] {
            node.reset();
        }
        self.live.fetch_add(cap as u64, Ordering::Relaxed);
    }

    /// Turn `[from, to)` of chunk `ci` into free segments.
    fn release_range(&self, ci: usize, from: u32, to: u32) {
        let chunk = self.chunk(ci);
        let mut off = from;
        while off < to {
            let len = (to - off).min(MAX_SEGMENT);
            chunk.capacity[off as usize].store(len, Ordering::Relaxed);
            chunk.parent[off as usize].store(FREE, Ordering::Release);
            self.freelists[len as usize].lock().push(SegmentRef(ci as u32 * self.chunk_slots + off));
            off += len;
        }
    }

    /// Return a segment to its freelist. Its nodes' own children are not
    /// touched; see [`free_subtree`](Self::free_subtree).
    pub fn free(&self, seg: SegmentRef) {
        let (ci, off) = self.split(seg.0);
        let chunk = self.chunk(ci);
        let cap = chunk.capacity[off].load(Ordering::Relaxed);
        let prev = chunk.parent[off].swap(FREE, Ordering::AcqRel);
        assert_ne!(prev, FREE, "double free of segment {}", seg.0);
        self.live.fetch_sub(cap as u64, Ordering::Relaxed);
        self.freelists[cap as usize].lock().push(seg);
    }

    /// Free `seg` and everything below it. Returns the number of slots freed.
    pub fn free_subtree(&self, seg: SegmentRef) -> u64 {
        let mut freed = 0;
        for node in self.segment(seg) {
            if let Some(child) = node.children().take() {
                freed += self.free_subtree(child);
            }
        }
        freed += self.capacity(seg) as u64;
        self.free(seg);
        freed
    }

    #[inline]
    pub fn capacity(&self, seg: SegmentRef) -> u32 {
        let (ci, off) = self.split(seg.0);
        self.chunk(ci).capacity[off].load(Ordering::Relaxed)
    }

    /// Node holding the link to `seg`.
    pub fn segment_parent(&self, seg: SegmentRef) -> Option<NodeRef> {
        let (ci, off) = self.split(seg.0);
        match self.chunk(ci).parent[off].load(Ordering::Acquire) {
            FREE => None,
            p => Some(NodeRef(p)),
        }
    }

    fn set_parent(&self, seg: SegmentRef, parent: NodeRef) {
        let (ci, off) = self.split(seg.0);
        self.chunk(ci).parent[off].store(parent.0, Ordering::Release);
    }

    #[inline]
    pub fn segment(&self, seg: SegmentRef) -> &[T] {
        let (ci, off) = self.split(seg.0);
        let chunk = self.chunk(ci);
        let cap = chunk.capacity[off].load(Ordering::Relaxed) as usize;
        &chunk.slots[off..off + cap]
    }

    #[inline]
    pub fn node(&self, r: NodeRef) -> &T {
        let (ci, off) = self.split(r.0);
        &self.chunk(ci).slots[off]
    }

    /// Published children of `node`.
    #[inline]
    pub fn children_of(&self, node: &T) -> Option<(SegmentRef, &[T])> {
        node.children().segment().map(|seg| (seg, self.segment(seg)))
    }

    #[inline]
    fn holder(&self, parent: NodeRef) -> &ChildrenHandle {
        if parent == NodeRef::ROOT_HOLDER { &self.root } else { self.node(parent).children() }
    }

    pub fn root(&self) -> Option<NodeRef> {
        self.root.segment().map(|seg| seg.node(0))
    }

    /// Root node, allocating it on first use.
    pub fn ensure_root(&self) -> Option<NodeRef> {
        if let Some(root) = self.root() {
            return Some(root);
        }
        assert!(self.root.try_lock(), "concurrent root creation");
        match self.alloc(1, NodeRef::ROOT_HOLDER) {
            Some(seg) => {
                self.root.publish(seg);
                Some(seg.node(0))
            }
            None => {
                self.root.unlock();
                None
            }
        }
    }

    /// Make `child` the new root, keeping its subtree and freeing the rest.
    /// Only valid while no worker is searching.
    pub fn promote_to_root(&self, child: NodeRef) -> Option<NodeRef> {
        let old = self.root.segment()?;
        let seg = self.alloc(1, NodeRef::ROOT_HOLDER)?;
        let new_root = seg.node(0);
        self.node(new_root).copy_from(self.node(child));
        if let Some(grand) = self.node(child).children().take() {
            self.set_parent(grand, new_root);
        }
        self.root.relink(seg);
        self.free_subtree(old);
        Some(new_root)
    }

    /// Free the whole tree but keep the chunks.
    pub fn clear_tree(&self) {
        if let Some(seg) = self.root.take() {
            self.free_subtree(seg);
        }
    }

    #[inline]
    pub fn live_slots(&self) -> u64 {
        self.live.load(Ordering::Relaxed)
    }

    /// Bytes held by live nodes.
    #[inline]
    pub fn memory_used(&self) -> u64 {
        self.live_slots() * Self::slot_bytes() as u64
    }

    /// Bytes held by linked chunks.
    pub fn memory_allocated(&self) -> u64 {
        self.linked_chunks() as u64 * self.chunk_slots as u64 * Self::slot_bytes() as u64
    }

    /// Defragment in place. Requires exclusive access.
    ///
    /// The first `1 - lazy` of the linked chunks are compacted eagerly: live
    /// segments slide left, free ones vanish. In the remaining (lazy) chunks
    /// free segments only go back to the freelists. Without lazy chunks,
    /// `release` of the now-empty trailing chunks is returned to the system.
    pub fn compact(&mut self, params: CompactParams) -> CompactStats {
        let spc = self.chunk_slots;
        let linked = self.linked_chunks();
        let mut stats = CompactStats {
            chunks_before: linked,
            chunks_after: linked,
            live_slots: self.live_slots(),
            ..Default::default()
        };
        if linked == 0 {
            return stats;
        }
        for list in self.freelists.iter_mut() {
            list.get_mut().clear();
        }

        let lazy_chunks = (linked as f64 * params.lazy.clamp(0.0, 1.0)).floor() as usize;
        let eager = linked - lazy_chunks;

        let (mut dst_chunk, mut dst_off) = (0usize, 0u32);
        for ci in 0..eager {
            let used = self.chunk(ci).used.load(Ordering::Acquire);
            let mut off = 0u32;
            while off < used {
                let chunk = self.chunk(ci);
                let cap = chunk.capacity[off as usize].load(Ordering::Relaxed);
                let parent = chunk.parent[off as usize].load(Ordering::Acquire);
                assert!(cap > 0, "unformatted slot {off} in chunk {ci}");
                if parent != FREE {
                    if spc - dst_off < cap {
                        // only reached for a chunk already walked
                        self.release_range(dst_chunk, dst_off, spc);
                        dst_chunk += 1;
                        dst_off = 0;
                    }
                    let src = SegmentRef(ci as u32 * spc + off);
                    let dst = SegmentRef(dst_chunk as u32 * spc + dst_off);
                    if src != dst {
                        self.relocate(src, dst, cap, NodeRef(parent));
                        stats.moved_segments += 1;
                        stats.moved_slots += cap as u64;
                    }
                    dst_off += cap;
                }
                off += cap;
            }
        }

        if lazy_chunks == 0 {
            for ci in 0..eager {
                let used = match ci.cmp(&dst_chunk) {
                    std::cmp::Ordering::Less => spc,
                    std::cmp::Ordering::Equal => dst_off,
                    std::cmp::Ordering::Greater => 0,
                };
                self.chunk(ci).used.store(used, Ordering::Release);
            }
            let empty = linked - dst_chunk - 1;
            let release = (empty as f64 * params.release.clamp(0.0, 1.0)).floor() as usize;
            for ci in (linked - release..linked).rev() {
                let p = self.chunks[ci].swap(ptr::null_mut(), Ordering::AcqRel);
                // SAFETY: exclusive access, and nothing references an empty chunk.
                drop(unsafe { Box::from_raw(p) });
            }
            stats.chunks_after = linked - release;
            self.current.store(dst_chunk as u32, Ordering::Release);
        } else {
            if eager > 0 {
                self.release_range(dst_chunk, dst_off, spc);
                for ci in dst_chunk + 1..eager {
                    self.release_range(ci, 0, spc);
                }
                for ci in 0..eager {
                    self.chunk(ci).used.store(spc, Ordering::Release);
                }
            }
            for ci in eager..linked {
                let chunk = self.chunk(ci);
                let used = chunk.used.load(Ordering::Acquire);
                let mut off = 0u32;
                while off < used {
                    let cap = chunk.capacity[off as usize].load(Ordering::Relaxed);
                    if chunk.parent[off as usize].load(Ordering::Acquire) == FREE {
                        self.freelists[cap as usize].lock().push(SegmentRef(ci as u32 * spc + off));
                    }
                    off += cap;
                }
            }
            if (self.current.load(Ordering::Acquire) as usize) < eager {
                self.current.store(eager as u32, Ordering::Release);
            }
        }

        debug_assert_eq!(stats.live_slots, self.live_slots());
        stats
    }

    /// Move a live segment to `dst` (left of `src`) and repair every link
    /// into and out of it.
    fn relocate(&self, src: SegmentRef, dst: SegmentRef, cap: u32, parent: NodeRef) {
        let holder = self.holder(parent);
        assert_eq!(holder.segment(), Some(src), "segment {} back reference does not verify", src.0);

        // ascending copy is safe for dst < src
        for i in 0..cap as usize {
            let to = self.node(dst.node(i));
            to.copy_from(self.node(src.node(i)));
            if let Some(grand) = to.children().segment() {
                self.set_parent(grand, dst.node(i));
            }
        }

        let (ci, off) = self.split(dst.0);
        let chunk = self.chunk(ci);
        chunk.capacity[off].store(cap, Ordering::Relaxed);
        chunk.parent[off].store(parent.0, Ordering::Release);
        holder.relink(dst);
    }

    /// Drop every chunk and the tree.
    pub fn clear(&mut self) {
        self.root.clear();
        for slot in self.chunks.iter() {
            let p = slot.swap(ptr::null_mut(), Ordering::AcqRel);
            if !p.is_null() {
                // SAFETY: exclusive access.
                drop(unsafe { Box::from_raw(p) });
            }
        }
        for list in self.freelists.iter_mut() {
            list.get_mut().clear();
        }
        self.current.store(0, Ordering::Release);
        self.live.store(0, Ordering::Relaxed);
    }
}

impl<T: ArenaNode> Drop for Arena<T> {
    fn drop(&mut self) {
        self.clear();
    }
}
