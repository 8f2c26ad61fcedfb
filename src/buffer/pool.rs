use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::buffer_ref::{try_alloc, BufferFlags, BufferRef, Opaque};
use crate::error::{AvError, Result};

/// Allocator called on a free-list miss with the pool's size class.
pub type PoolAllocFn = Box<dyn Fn(usize) -> Result<Vec<u8>> + Send + Sync>;

/// Lifecycle of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Returned buffers are cached for reuse.
    Active,
    /// The owner dropped its handle; returned buffers are freed.
    Draining,
}

struct FreeList {
    entries: Vec<Vec<u8>>,
    state: PoolState,
}

struct PoolShared {
    size: usize,
    max_free: usize,
    // One for the owning handle plus one per checked-out buffer
    refcount: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    free: Mutex<FreeList>,
    alloc: PoolAllocFn,
}

impl PoolShared {
    fn checkout(self: &Arc<Self>) -> Result<BufferRef> {
        let cached = self.free.lock().entries.pop();
        let data = match cached {
            Some(data) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                data
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                log::debug!("buffer pool miss, allocating {} bytes", self.size);
                let data = (self.alloc)(self.size)?;
                if data.len() != self.size {
                    return Err(AvError::InvalidState(format!(
                        "pool allocator returned {} bytes, expected {}",
                        data.len(),
                        self.size
                    )));
                }
                data
            }
        };

        self.refcount.fetch_add(1, Ordering::AcqRel);
        let shared = Arc::clone(self);
        Ok(BufferRef::create(
            data,
            Some(Box::new(move |_: Option<Opaque>, data: Vec<u8>| {
                shared.give_back(data)
            })),
            None,
            BufferFlags::empty(),
        ))
    }

    fn give_back(&self, data: Vec<u8>) {
        {
            let mut free = self.free.lock();
            if free.state == PoolState::Active && free.entries.len() < self.max_free {
                free.entries.push(data);
            }
        }
        self.release_ref();
    }

    fn release_ref(&self) {
        if self.refcount.fetch_sub(1, Ordering::AcqRel) == 1 {
            log::debug!("buffer pool of {} byte entries released", self.size);
            self.free.lock().entries.clear();
        }
    }
}

/// A pool of recycled fixed-size allocations.
///
/// Every buffer handed out by [`BufferPool::get`] keeps the pool alive. When
/// its last view drops, the memory goes back onto the free list. Dropping the
/// `BufferPool` puts it into [`PoolState::Draining`]: cached entries are freed
/// at once, and outstanding buffers are freed as they come back.
///
/// ```rust
/// use avcore::buffer::BufferPool;
///
/// # fn main() -> avcore::Result<()> {
/// let pool = BufferPool::new(4096);
/// let buf = pool.get()?;
/// assert_eq!(buf.len(), 4096);
/// drop(buf);
/// assert_eq!(pool.free_count(), 1);
/// # Ok(())
/// # }
/// ```
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    /// Creates a pool of zero-initialised `size`-byte buffers.
    pub fn new(size: usize) -> Self {
        Self::with_allocator(size, try_alloc)
    }

    /// Creates a pool that calls `alloc` on a free-list miss.
    pub fn with_allocator<F>(size: usize, alloc: F) -> Self
    where
        F: Fn(usize) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self::build(size, crate::config::pool_max_free(), Box::new(alloc))
    }

    /// Like [`BufferPool::with_allocator`], caching at most `max_free` entries.
    pub fn with_limits<F>(size: usize, max_free: usize, alloc: F) -> Self
    where
        F: Fn(usize) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self::build(size, max_free, Box::new(alloc))
    }

    fn build(size: usize, max_free: usize, alloc: PoolAllocFn) -> Self {
        log::debug!("creating buffer pool of {} byte entries", size);
        BufferPool {
            shared: Arc::new(PoolShared {
                size,
                max_free,
                refcount: AtomicUsize::new(1),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                free: Mutex::new(FreeList {
                    entries: Vec::new(),
                    state: PoolState::Active,
                }),
                alloc,
            }),
        }
    }

    /// Checks out a buffer, reusing a cached one when available.
    pub fn get(&self) -> Result<BufferRef> {
        self.shared.checkout()
    }

    /// Size class in bytes.
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// The owner's reference plus one per outstanding buffer.
    pub fn ref_count(&self) -> usize {
        self.shared.refcount.load(Ordering::Acquire)
    }

    /// Entries currently cached on the free list.
    pub fn free_count(&self) -> usize {
        self.shared.free.lock().entries.len()
    }

    /// Checkouts served from the free list.
    pub fn hits(&self) -> u64 {
        self.shared.hits.load(Ordering::Relaxed)
    }

    /// Checkouts that had to call the allocator.
    pub fn misses(&self) -> u64 {
        self.shared.misses.load(Ordering::Relaxed)
    }

    /// Whether returned buffers are still cached.
    pub fn state(&self) -> PoolState {
        self.shared.free.lock().state
    }

    /// Frees every cached entry.
    pub fn flush(&self) {
        self.shared.free.lock().entries.clear();
    }

    /// An allocator closure that checks out from this pool, for
    /// [`Frame::get_buffer_with`](crate::av::Frame::get_buffer_with).
    pub fn allocator(&self) -> impl FnMut(usize) -> Result<BufferRef> + '_ {
        move |size| {
            if size > self.size() {
                return Err(AvError::FormatMismatch(format!(
                    "requested {} bytes from a pool of {} byte entries",
                    size,
                    self.size()
                )));
            }
            self.get()?.slice(..size)
        }
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        {
            let mut free = self.shared.free.lock();
            free.state = PoolState::Draining;
            free.entries.clear();
        }
        self.shared.release_ref();
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("size", &self.shared.size)
            .field("max_free", &self.shared.max_free)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_draining_pool_frees_returned_buffers() {
        let pool = BufferPool::with_limits(32, 4, try_alloc);
        let shared = Arc::clone(&pool.shared);
        let first = pool.get().unwrap();
        let second = pool.get().unwrap();

        // Still active: a returned buffer is cached
        drop(pool.get().unwrap());
        assert_eq!(shared.free.lock().entries.len(), 1);

        drop(pool);
        assert_eq!(shared.free.lock().state, PoolState::Draining);
        assert!(shared.free.lock().entries.is_empty());
        assert_eq!(shared.refcount.load(Ordering::Acquire), 2);

        drop(first);
        assert!(shared.free.lock().entries.is_empty());
        assert_eq!(shared.refcount.load(Ordering::Acquire), 1);

        drop(second);
        assert!(shared.free.lock().entries.is_empty());
        assert_eq!(shared.refcount.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let pool = BufferPool::with_limits(16, 2, try_alloc);
        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        assert_eq!((pool.hits(), pool.misses()), (0, 2));

        drop(a);
        drop(b);
        let _c = pool.get().unwrap();
        let _d = pool.get().unwrap();
        let _e = pool.get().unwrap();
        assert_eq!((pool.hits(), pool.misses()), (2, 3));
    }
}
