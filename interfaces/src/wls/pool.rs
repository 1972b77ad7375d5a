//! Fixed-size block pool
//!
//! Blocks are handed out as [`PoolBlock`] values that own their block and
//! return it on drop. Each block slot carries a generation that is bumped on
//! every release, so a stale handle or a repeated release is detected
//! instead of corrupting the free list. A block given to the transport
//! leaves local ownership and is tracked by bus address until released with
//! [`BufferPool::free_pa`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, warn};

use super::region::MemoryRegion;
use crate::InterfaceError;

/// Bytes at the end of every block written with [`TAIL_GUARD_BYTE`]
pub const TAIL_GUARD_LEN: usize = 16;
pub const TAIL_GUARD_BYTE: u8 = 0xAB;

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    /// Owned by a local `PoolBlock`
    Owned,
    /// Handed to the transport
    InFlight,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    state: SlotState,
}

/// Allocation counters of one pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub allocs: u64,
    pub frees: u64,
    pub alloc_failures: u64,
    pub rejected_frees: u64,
    pub in_use: usize,
    pub high_water: usize,
}

#[derive(Debug)]
struct PoolInner {
    free: Vec<u32>,
    slots: Vec<Slot>,
    stats: PoolStats,
}

/// Ownership token of one allocated block
#[derive(Debug, PartialEq, Eq)]
pub struct BlockHandle {
    pool_id: u32,
    index: u32,
    generation: u32,
}

impl BlockHandle {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Pool of homogeneous blocks over one memory region
#[derive(Debug)]
pub struct BufferPool {
    id: u32,
    region: Box<dyn MemoryRegion>,
    block_size: usize,
    num_blocks: usize,
    inner: Mutex<PoolInner>,
}

impl BufferPool {
    /// Carve `region` into blocks of `block_size` bytes
    pub fn new(region: Box<dyn MemoryRegion>, block_size: usize) -> Result<Arc<Self>, InterfaceError> {
        if block_size <= TAIL_GUARD_LEN + super::element::ELEM_HEADER_LEN {
            return Err(InterfaceError::Region(format!("block size {} too small", block_size)));
        }
        let num_blocks = region.size() / block_size;
        if num_blocks == 0 {
            return Err(InterfaceError::Region(format!(
                "region of {} bytes holds no block of {} bytes",
                region.size(),
                block_size
            )));
        }

        let slots = (0..num_blocks)
            .map(|_| Slot { generation: 0, state: SlotState::Free })
            .collect();
        // Pop from the back so the lowest block is handed out first
        let free = (0..num_blocks as u32).rev().collect();

        Ok(Arc::new(Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            region,
            block_size,
            num_blocks,
            inner: Mutex::new(PoolInner { free, slots, stats: PoolStats::default() }),
        }))
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Usable bytes of a block, excluding the tail guard
    pub fn payload_capacity(&self) -> usize {
        self.block_size - TAIL_GUARD_LEN
    }

    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    pub fn free_blocks(&self) -> usize {
        self.inner.lock().free.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats
    }

    /// Take one block from the free list
    pub fn allocate(self: &Arc<Self>) -> Result<PoolBlock, InterfaceError> {
        let handle = {
            let mut inner = self.inner.lock();
            let Some(index) = inner.free.pop() else {
                inner.stats.alloc_failures += 1;
                let in_use = inner.stats.in_use;
                return Err(InterfaceError::OutOfMemory(in_use));
            };
            let slot = &mut inner.slots[index as usize];
            slot.state = SlotState::Owned;
            let generation = slot.generation;
            inner.stats.allocs += 1;
            inner.stats.in_use += 1;
            inner.stats.high_water = inner.stats.high_water.max(inner.stats.in_use);
            BlockHandle { pool_id: self.id, index, generation }
        };

        // SAFETY: the slot was just moved to Owned; nobody else touches its bytes.
        let guard = unsafe { self.block_bytes_mut(handle.index()) };
        let cap = self.payload_capacity();
        guard[cap..].fill(TAIL_GUARD_BYTE);

        Ok(PoolBlock { pool: Arc::clone(self), handle: Some(handle) })
    }

    /// Return a locally owned block
    pub fn free(&self, handle: BlockHandle) -> Result<(), InterfaceError> {
        if handle.pool_id != self.id {
            return Err(self.reject(InterfaceError::ForeignBlock(format!(
                "pool {} handle given to pool {}",
                handle.pool_id, self.id
            ))));
        }
        let index = handle.index();
        let mut inner = self.inner.lock();
        let Some(slot) = inner.slots.get(index) else {
            drop(inner);
            return Err(self.reject(InterfaceError::ForeignBlock(format!("index {}", index))));
        };
        let (generation, state) = (slot.generation, slot.state);
        if generation != handle.generation {
            drop(inner);
            return Err(self.reject(InterfaceError::StaleHandle(index)));
        }
        match state {
            SlotState::Free => {
                drop(inner);
                Err(self.reject(InterfaceError::DoubleFree(index)))
            }
            SlotState::InFlight => {
                drop(inner);
                Err(self.reject(InterfaceError::StaleHandle(index)))
            }
            SlotState::Owned => {
                let intact = self.guard_intact(index);
                Self::release(&mut inner, index);
                if intact {
                    Ok(())
                } else {
                    Err(InterfaceError::Corrupted(index))
                }
            }
        }
    }

    /// Return a block previously handed to the transport
    pub fn free_pa(&self, pa: u64) -> Result<(), InterfaceError> {
        let index = self.index_of(pa)?;
        let mut inner = self.inner.lock();
        let state = inner.slots[index].state;
        match state {
            SlotState::InFlight => {
                let intact = self.guard_intact(index);
                Self::release(&mut inner, index);
                if intact {
                    Ok(())
                } else {
                    Err(InterfaceError::Corrupted(index))
                }
            }
            SlotState::Free => {
                drop(inner);
                Err(self.reject(InterfaceError::DoubleFree(index)))
            }
            SlotState::Owned => {
                drop(inner);
                Err(self.reject(InterfaceError::ForeignBlock(format!(
                    "block {} is locally owned, release it through its handle",
                    index
                ))))
            }
        }
    }

    /// Read an in-flight block
    pub fn with_pa<R>(&self, pa: u64, f: impl FnOnce(&[u8]) -> R) -> Result<R, InterfaceError> {
        let index = self.in_flight_index(pa)?;
        // SAFETY: in-flight blocks are only read until released.
        let bytes = unsafe { self.block_bytes(index) };
        Ok(f(&bytes[..self.payload_capacity()]))
    }

    /// Fill an in-flight block taken from the posted-block queue
    pub fn with_pa_mut<R>(&self, pa: u64, f: impl FnOnce(&mut [u8]) -> R) -> Result<R, InterfaceError> {
        let index = self.in_flight_index(pa)?;
        let cap = self.payload_capacity();
        // SAFETY: a posted block has exactly one filler, the peer that dequeued it.
        let bytes = unsafe { self.block_bytes_mut(index) };
        Ok(f(&mut bytes[..cap]))
    }

    /// Bus address of a block index
    pub fn pa_of(&self, index: usize) -> u64 {
        self.region.base_pa() + (index * self.block_size) as u64
    }

    /// Block index of a bus address; rejects addresses outside the region
    pub fn index_of(&self, pa: u64) -> Result<usize, InterfaceError> {
        let base = self.region.base_pa();
        if pa < base {
            return Err(self.reject(InterfaceError::ForeignBlock(format!("{:#x} below region", pa))));
        }
        let offset = (pa - base) as usize;
        if offset % self.block_size != 0 || offset / self.block_size >= self.num_blocks {
            return Err(self.reject(InterfaceError::ForeignBlock(format!("{:#x} not a block start", pa))));
        }
        Ok(offset / self.block_size)
    }

    fn in_flight_index(&self, pa: u64) -> Result<usize, InterfaceError> {
        let index = self.index_of(pa)?;
        let inner = self.inner.lock();
        if inner.slots[index].state != SlotState::InFlight {
            return Err(InterfaceError::StaleHandle(index));
        }
        Ok(index)
    }

    fn mark_in_flight(&self, handle: &BlockHandle) {
        let mut inner = self.inner.lock();
        inner.slots[handle.index()].state = SlotState::InFlight;
    }

    fn release(inner: &mut PoolInner, index: usize) {
        let slot = &mut inner.slots[index];
        slot.state = SlotState::Free;
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(index as u32);
        inner.stats.frees += 1;
        inner.stats.in_use -= 1;
    }

    fn reject(&self, err: InterfaceError) -> InterfaceError {
        self.inner.lock().stats.rejected_frees += 1;
        error!("[WLS] pool {}: {}", self.id, err);
        err
    }

    fn guard_intact(&self, index: usize) -> bool {
        // SAFETY: caller holds the pool lock and the slot is not Free.
        let bytes = unsafe { self.block_bytes(index) };
        bytes[self.payload_capacity()..].iter().all(|b| *b == TAIL_GUARD_BYTE)
    }

    unsafe fn block_bytes(&self, index: usize) -> &[u8] {
        let start = self.region.as_ptr().add(index * self.block_size);
        std::slice::from_raw_parts(start, self.block_size)
    }

    #[allow(clippy::mut_from_ref)]
    unsafe fn block_bytes_mut(&self, index: usize) -> &mut [u8] {
        let start = self.region.as_ptr().add(index * self.block_size);
        std::slice::from_raw_parts_mut(start, self.block_size)
    }
}

/// A block owned by local code; returned to its pool on drop
#[derive(Debug)]
pub struct PoolBlock {
    pool: Arc<BufferPool>,
    handle: Option<BlockHandle>,
}

impl PoolBlock {
    pub fn index(&self) -> usize {
        self.handle.as_ref().map(|h| h.index()).unwrap_or(usize::MAX)
    }

    /// Bus address of the block
    pub fn pa(&self) -> u64 {
        self.pool.pa_of(self.index())
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: this value owns the block.
        let bytes = unsafe { self.pool.block_bytes(self.index()) };
        &bytes[..self.pool.payload_capacity()]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let cap = self.pool.payload_capacity();
        // SAFETY: this value owns the block exclusively.
        let bytes = unsafe { self.pool.block_bytes_mut(self.index()) };
        &mut bytes[..cap]
    }

    /// Give the block to the transport; it must come back through `free_pa`
    pub fn into_pa(mut self) -> u64 {
        let pa = self.pa();
        if let Some(handle) = self.handle.take() {
            self.pool.mark_in_flight(&handle);
        }
        pa
    }

    /// Release explicitly, surfacing guard corruption
    pub fn release(mut self) -> Result<(), InterfaceError> {
        match self.handle.take() {
            Some(handle) => self.pool.free(handle),
            None => Ok(()),
        }
    }
}

impl Drop for PoolBlock {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.pool.free(handle) {
                warn!("[WLS] releasing block on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wls::region::HeapRegion;

    fn pool(blocks: usize) -> Arc<BufferPool> {
        BufferPool::new(Box::new(HeapRegion::new(blocks * 256).unwrap()), 256).unwrap()
    }

    #[test]
    fn test_allocate_until_exhausted() {
        let pool = pool(2);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert_ne!(a.index(), b.index());
        assert_eq!(pool.allocate().unwrap_err(), InterfaceError::OutOfMemory(2));
        assert_eq!(pool.stats().alloc_failures, 1);

        drop(a);
        assert!(pool.allocate().is_ok());
    }

    #[test]
    fn test_drop_returns_block() {
        let pool = pool(4);
        {
            let _block = pool.allocate().unwrap();
            assert_eq!(pool.free_blocks(), 3);
        }
        assert_eq!(pool.free_blocks(), 4);
        let stats = pool.stats();
        assert_eq!(stats.allocs, 1);
        assert_eq!(stats.frees, 1);
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.high_water, 1);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let pool = pool(1);
        let block = pool.allocate().unwrap();
        let stale = BlockHandle { pool_id: pool.id, index: 0, generation: 0 };
        drop(block);
        // Generation moved on after the release
        assert_eq!(pool.free(stale), Err(InterfaceError::StaleHandle(0)));
        assert_eq!(pool.free_blocks(), 1);
    }

    #[test]
    fn test_double_free_by_pa_rejected() {
        let pool = pool(2);
        let pa = pool.allocate().unwrap().into_pa();
        assert!(pool.free_pa(pa).is_ok());
        assert_eq!(pool.free_pa(pa), Err(InterfaceError::DoubleFree(0)));
        assert_eq!(pool.free_blocks(), 2);
        assert_eq!(pool.stats().rejected_frees, 1);
    }

    #[test]
    fn test_out_of_range_pa_rejected() {
        let pool = pool(2);
        let base = pool.pa_of(0);
        assert!(matches!(pool.free_pa(base + 7), Err(InterfaceError::ForeignBlock(_))));
        assert!(matches!(pool.free_pa(base + 256 * 5), Err(InterfaceError::ForeignBlock(_))));
        assert!(matches!(pool.free_pa(0), Err(InterfaceError::ForeignBlock(_))));
    }

    #[test]
    fn test_foreign_pool_handle_rejected() {
        let a = pool(1);
        let b = pool(1);
        let mut block = a.allocate().unwrap();
        let handle = block.handle.take().unwrap();
        assert!(matches!(b.free(handle), Err(InterfaceError::ForeignBlock(_))));
    }

    #[test]
    fn test_owned_block_not_freeable_by_pa() {
        let pool = pool(1);
        let block = pool.allocate().unwrap();
        assert!(matches!(pool.free_pa(block.pa()), Err(InterfaceError::ForeignBlock(_))));
        assert_eq!(pool.free_blocks(), 0);
    }

    #[test]
    fn test_tail_guard_detects_overrun() {
        let pool = pool(1);
        let block = pool.allocate().unwrap();
        let index = block.index();
        // Write past the usable payload into the guard
        unsafe { pool.block_bytes_mut(index)[pool.payload_capacity()] = 0 };
        assert_eq!(block.release(), Err(InterfaceError::Corrupted(0)));
        // Block is still returned to the free list
        assert_eq!(pool.free_blocks(), 1);
    }

    #[test]
    fn test_in_flight_access() {
        let pool = pool(2);
        let mut block = pool.allocate().unwrap();
        block.as_mut_slice()[..4].copy_from_slice(&[1, 2, 3, 4]);
        let pa = block.into_pa();

        let head = pool.with_pa(pa, |b| b[..4].to_vec()).unwrap();
        assert_eq!(head, vec![1, 2, 3, 4]);
        pool.with_pa_mut(pa, |b| b[0] = 9).unwrap();
        assert_eq!(pool.with_pa(pa, |b| b[0]).unwrap(), 9);

        pool.free_pa(pa).unwrap();
        assert!(pool.with_pa(pa, |_| ()).is_err());
    }
}
