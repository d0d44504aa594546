//! Size-classed byte buffer recycling.
//!
//! Transports read and write framed messages into `Vec<u8>` buffers that
//! would otherwise be allocated and dropped per message. This pool buckets
//! freed buffers by size class and hands out the smallest class that fits a
//! request, so a connection doing many small requests doesn't keep paying
//! for a buffer sized for the one large message it once carried.

use parking_lot::Mutex;

/// Size classes, in bytes. Chosen to cover typical JSON-RPC request/response
/// bodies without over-allocating for small ones.
const SIZE_CLASSES: [usize; 4] = [128, 512, 2048, 8192];

/// Buffers larger than this are never pooled; they're returned to the
/// global allocator on drop instead of bloating the pool.
const MAX_POOLED_SIZE: usize = 64 * 1024;

struct Bucket {
    capacity: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

/// A pool of reusable byte buffers, bucketed by size class.
#[derive(Debug)]
pub struct BufferPool {
    buckets: Vec<Bucket>,
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("capacity", &self.capacity)
            .field("free_count", &self.free.lock().len())
            .finish()
    }
}

impl BufferPool {
    /// Create an empty pool with the default size classes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: SIZE_CLASSES
                .iter()
                .map(|&capacity| Bucket {
                    capacity,
                    free: Mutex::new(Vec::new()),
                })
                .collect(),
        }
    }

    /// Borrow a buffer with at least `min_size` capacity, empty and ready to
    /// fill. Reuses a pooled buffer from the smallest size class that fits,
    /// falling back to a fresh allocation if the pool is empty or the
    /// request exceeds every size class.
    #[must_use]
    pub fn acquire(&self, min_size: usize) -> Vec<u8> {
        for bucket in &self.buckets {
            if bucket.capacity < min_size {
                continue;
            }
            if let Some(mut buf) = bucket.free.lock().pop() {
                buf.clear();
                return buf;
            }
            return Vec::with_capacity(bucket.capacity);
        }
        Vec::with_capacity(min_size)
    }

    /// Return a buffer to the pool for reuse. Buffers over
    /// [`MAX_POOLED_SIZE`] are dropped instead of retained, so one
    /// oversized message doesn't permanently inflate the pool's footprint.
    pub fn release(&self, buf: Vec<u8>) {
        let capacity = buf.capacity();
        if capacity > MAX_POOLED_SIZE {
            return;
        }
        for bucket in &self.buckets {
            if bucket.capacity >= capacity {
                bucket.free.lock().push(buf);
                return;
            }
        }
    }

    /// Total number of buffers currently held in the pool, across all size
    /// classes.
    #[must_use]
    pub fn pooled_count(&self) -> usize {
        self.buckets.iter().map(|b| b.free.lock().len()).sum()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_picks_smallest_fitting_class() {
        let pool = BufferPool::new();
        let buf = pool.acquire(200);
        assert!(buf.capacity() >= 200);
        assert!(buf.capacity() <= 512);
    }

    #[test]
    fn release_then_acquire_reuses_buffer() {
        let pool = BufferPool::new();
        let buf = pool.acquire(100);
        let capacity = buf.capacity();
        pool.release(buf);
        assert_eq!(pool.pooled_count(), 1);

        let reused = pool.acquire(100);
        assert_eq!(reused.capacity(), capacity);
        assert_eq!(pool.pooled_count(), 0);
    }

    #[test]
    fn oversized_buffer_is_not_pooled() {
        let pool = BufferPool::new();
        let big = Vec::with_capacity(MAX_POOLED_SIZE + 1);
        pool.release(big);
        assert_eq!(pool.pooled_count(), 0);
    }
}
