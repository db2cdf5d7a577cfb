/*!
The memory pool: a fixed-capacity arena of same-size blocks, per §3.7/§4.A.

The arena is a `Vec<Slot>` indexed by [`BlockId`], a `u32` handle — never a
raw pointer, so the whole arena is freely relocatable (it could, in a
future revision, be backed by a single `mmap`'d region). Every slot
carries an intrusive, *offset-based* `(prev, next)` link: the same two
fields serve as the free-list link while a block is unallocated, and as
the content-chain link (`stream_write`/`stream_read`) while it is owned by
a bundle — a block is never on both at once, per the pool's core
invariant. Index `0` is the reserved admin sentinel that roots the free
list; it is never handed out by [`Pool::alloc`].
*/
use std::sync::Mutex;

use crate::error::Error;

/// Payload bytes carried by one content block.
pub const BLOCK_PAYLOAD_SIZE: usize = 256;

/// A handle into the arena. `NULL` never refers to a real block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    /// The admin sentinel, also the free list's head.
    pub const ADMIN: BlockId = BlockId(0);

    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// The logical role a block is currently playing, carried alongside its
/// list link so recycling and debugging don't need to infer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Free,
    Admin,
    Primary,
    Canonical,
    Ref,
    Flow,
    ListHead,
    Api,
}

struct Slot {
    tag: BlockTag,
    prev: BlockId,
    next: BlockId,
    /// Reference count, meaningful only on the first block of a chain.
    refcount: u32,
    len: usize,
    data: [u8; BLOCK_PAYLOAD_SIZE],
}

impl Slot {
    fn singleton(tag: BlockTag, id: BlockId) -> Self {
        Self {
            tag,
            prev: id,
            next: id,
            refcount: 0,
            len: 0,
            data: [0; BLOCK_PAYLOAD_SIZE],
        }
    }
}

struct PoolInner {
    slots: Vec<Slot>,
    free_len: usize,
    mem_current_use: usize,
    mem_high_use: usize,
}

impl PoolInner {
    /// Unlinks `id` from whatever circular list it is currently on,
    /// leaving it a singleton (`next == prev == id`).
    fn unlink(&mut self, id: BlockId) {
        let (prev, next) = {
            let s = &self.slots[id.idx()];
            (s.prev, s.next)
        };
        self.slots[prev.idx()].next = next;
        self.slots[next.idx()].prev = prev;
        let s = &mut self.slots[id.idx()];
        s.prev = id;
        s.next = id;
    }

    /// Splices singleton `id` in immediately after `head` in `head`'s
    /// cycle.
    fn insert_after(&mut self, head: BlockId, id: BlockId) {
        let old_next = self.slots[head.idx()].next;
        self.slots[head.idx()].next = id;
        self.slots[id.idx()].prev = head;
        self.slots[id.idx()].next = old_next;
        self.slots[old_next.idx()].prev = id;
    }

    fn pop_free(&mut self) -> Option<BlockId> {
        if self.free_len == 0 {
            return None;
        }
        let id = self.slots[BlockId::ADMIN.idx()].next;
        self.unlink(id);
        self.free_len -= 1;
        Some(id)
    }

    fn push_free(&mut self, id: BlockId) {
        self.unlink(id);
        self.slots[id.idx()].tag = BlockTag::Free;
        self.slots[id.idx()].len = 0;
        self.insert_after(BlockId::ADMIN, id);
        self.free_len += 1;
    }
}

/// A fixed-capacity arena of equally-sized content blocks.
pub struct Pool {
    inner: Mutex<PoolInner>,
}

impl Pool {
    /// Partitions `total_bytes` into an admin block followed by as many
    /// `BLOCK_PAYLOAD_SIZE`-byte content blocks as fit, all linked onto
    /// the free list.
    pub fn create(total_bytes: usize) -> Self {
        let content_blocks = total_bytes / BLOCK_PAYLOAD_SIZE;
        let mut slots = Vec::with_capacity(content_blocks + 1);
        slots.push(Slot::singleton(BlockTag::Admin, BlockId::ADMIN));

        let mut inner = PoolInner {
            slots,
            free_len: 0,
            mem_current_use: 0,
            mem_high_use: 0,
        };
        for i in 0..content_blocks {
            let id = BlockId((i + 1) as u32);
            inner.slots.push(Slot::singleton(BlockTag::Free, id));
            inner.insert_after(BlockId::ADMIN, id);
            inner.free_len += 1;
        }
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().slots.len() - 1
    }

    pub fn free_len(&self) -> usize {
        self.inner.lock().unwrap().free_len
    }

    pub fn mem_current_use(&self) -> usize {
        self.inner.lock().unwrap().mem_current_use
    }

    pub fn mem_high_use(&self) -> usize {
        self.inner.lock().unwrap().mem_high_use
    }

    /// Allocates a single block, or `None` if the free list is empty.
    /// Eviction under memory pressure is the cache's responsibility
    /// (§4.F): this call never blocks and never evicts on its own.
    pub fn alloc(&self, tag: BlockTag) -> Option<BlockId> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.pop_free()?;
        inner.slots[id.idx()].tag = tag;
        inner.mem_current_use += BLOCK_PAYLOAD_SIZE;
        inner.mem_high_use = inner.mem_high_use.max(inner.mem_current_use);
        Some(id)
    }

    /// Detaches `id`'s whole content chain and returns every block in it
    /// to the free list.
    pub fn recycle(&self, id: BlockId) {
        let mut inner = self.inner.lock().unwrap();
        let mut cur = id;
        loop {
            let next = inner.slots[cur.idx()].next;
            let is_last = next == cur;
            inner.push_free(cur);
            inner.mem_current_use -= BLOCK_PAYLOAD_SIZE;
            if is_last {
                break;
            }
            cur = next;
        }
    }

    /// Appends `bytes` to the content chain rooted at `head`, allocating
    /// additional blocks from the free list as the current tail fills.
    pub fn stream_write(&self, head: BlockId, bytes: &[u8]) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        let mut tail = {
            let mut cur = head;
            loop {
                let next = inner.slots[cur.idx()].next;
                if next == cur {
                    break cur;
                }
                cur = next;
            }
        };
        let mut remaining = bytes;
        loop {
            let slot = &mut inner.slots[tail.idx()];
            let space = BLOCK_PAYLOAD_SIZE - slot.len;
            let take = space.min(remaining.len());
            slot.data[slot.len..slot.len + take].copy_from_slice(&remaining[..take]);
            slot.len += take;
            remaining = &remaining[take..];
            if remaining.is_empty() {
                return Ok(());
            }
            let new_tail = inner.pop_free().ok_or(Error::StoreFailure)?;
            inner.slots[new_tail.idx()].tag = BlockTag::Canonical;
            inner.mem_current_use += BLOCK_PAYLOAD_SIZE;
            inner.mem_high_use = inner.mem_high_use.max(inner.mem_current_use);
            inner.slots[tail.idx()].next = new_tail;
            inner.slots[new_tail.idx()].prev = tail;
            tail = new_tail;
        }
    }

    /// Reads the full content of the chain rooted at `head`, in order.
    pub fn stream_read(&self, head: BlockId) -> Vec<u8> {
        let inner = self.inner.lock().unwrap();
        let mut out = Vec::new();
        let mut cur = head;
        loop {
            let slot = &inner.slots[cur.idx()];
            out.extend_from_slice(&slot.data[..slot.len]);
            let next = slot.next;
            if next == cur {
                break;
            }
            cur = next;
        }
        out
    }

    fn ref_count(&self, head: BlockId) -> u32 {
        self.inner.lock().unwrap().slots[head.idx()].refcount
    }

    fn inc_ref(&self, head: BlockId) {
        self.inner.lock().unwrap().slots[head.idx()].refcount += 1;
    }

    fn dec_ref(&self, head: BlockId) -> u32 {
        let mut inner = self.inner.lock().unwrap();
        let slot = &mut inner.slots[head.idx()];
        slot.refcount -= 1;
        slot.refcount
    }
}

/// A reference-counted handle over a block chain's head. The chain is
/// recycled back to the pool when the last `BlockRef` is dropped.
pub struct BlockRef<'p> {
    pool: &'p Pool,
    head: BlockId,
}

impl<'p> BlockRef<'p> {
    /// Wraps an already-allocated chain head as a single owning
    /// reference (refcount starts at 1).
    pub fn new(pool: &'p Pool, head: BlockId) -> Self {
        pool.inc_ref(head);
        Self { pool, head }
    }

    pub fn head(&self) -> BlockId {
        self.head
    }

    pub fn count(&self) -> u32 {
        self.pool.ref_count(self.head)
    }
}

impl Clone for BlockRef<'_> {
    fn clone(&self) -> Self {
        self.pool.inc_ref(self.head);
        Self {
            pool: self.pool,
            head: self.head,
        }
    }
}

impl Drop for BlockRef<'_> {
    fn drop(&mut self) {
        if self.pool.dec_ref(self.head) == 0 {
            self.pool.recycle(self.head);
        }
    }
}

/// The persisted-state offload boundary, per §6.5: a pluggable store the
/// pool hands a chain's bytes to under memory pressure, opaque to
/// everything above it. Mirrors the shape of the teacher's
/// `BundleStorage` trait (`load`/`save`/`delete`), but synchronous —
/// this engine has no async runtime to hand the call off to.
pub trait BundleStore: Send + Sync {
    /// Hands ownership of `bytes` to the store, returning an opaque
    /// identifier the pool can use to `restore` or `release` it later.
    fn offload(&self, bytes: Vec<u8>) -> Result<u64, Error>;

    /// Reads back the bytes previously offloaded under `storage_id`.
    fn restore(&self, storage_id: u64) -> Result<Vec<u8>, Error>;

    /// Tells the store the offloaded copy is no longer needed.
    fn release(&self, storage_id: u64) -> Result<(), Error>;
}

/// An in-memory [`BundleStore`], for tests and for deployments with no
/// durable offload backend configured.
#[derive(Default)]
pub struct MemStore {
    bundles: Mutex<std::collections::HashMap<u64, Vec<u8>>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BundleStore for MemStore {
    fn offload(&self, bytes: Vec<u8>) -> Result<u64, Error> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.bundles.lock().unwrap().insert(id, bytes);
        Ok(id)
    }

    fn restore(&self, storage_id: u64) -> Result<Vec<u8>, Error> {
        self.bundles
            .lock()
            .unwrap()
            .get(&storage_id)
            .cloned()
            .ok_or(Error::NullPtr)
    }

    fn release(&self, storage_id: u64) -> Result<(), Error> {
        self.bundles.lock().unwrap().remove(&storage_id);
        Ok(())
    }
}
