//! Accumulation buffer for the async client
//!
//! Producers append log bytes from any thread; the background sender periodically swaps the
//! filled buffer out for an empty one and ships it as one batch.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  write(...)  │  any thread, never blocks on I/O
//! └──────┬───────┘
//!        ▼
//! ┌──────────────────────────────┐
//! │  AccumulationBuffer          │
//! │  - current: PooledBuffer     │◄──── empty buffer from BufferPool
//! └──────┬───────────────────────┘
//!        │ get_and_clear() every flush_interval
//!        ▼
//! ┌──────────────────────────────┐
//! │  PooledBuffer (one batch)    │──── dropped after send, returns to pool
//! └──────────────────────────────┘
//! ```
//!
//! Growth is unbounded: if the server is unreachable the batch is dropped at the next tick,
//! which is the only backpressure.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Capacity of freshly allocated buffers.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 1024;

const MAX_POOLED_BUFFERS: usize = 4;

/// Pool of reusable byte buffers.
///
/// Cloning shares the same pool.
#[derive(Debug, Clone)]
pub struct BufferPool {
    free: Arc<Mutex<Vec<Vec<u8>>>>,
    capacity: usize,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Arc::new(Mutex::new(Vec::new())),
            capacity,
        }
    }

    fn free(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take an empty buffer, reusing a returned one when available.
    pub fn get(&self) -> PooledBuffer {
        let buf = self
            .free()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.capacity));
        PooledBuffer {
            buf,
            pool: self.clone(),
        }
    }

    fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut free = self.free();
        if free.len() < MAX_POOLED_BUFFERS {
            free.push(buf);
        }
    }

    /// Number of idle buffers waiting for reuse.
    pub fn available(&self) -> usize {
        self.free().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

/// A buffer on loan from a [`BufferPool`]; returned to it (cleared) on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: BufferPool,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}

/// Thread-safe append-only byte buffer drained in whole batches.
#[derive(Debug)]
pub struct AccumulationBuffer {
    pool: BufferPool,
    current: Mutex<PooledBuffer>,
}

impl AccumulationBuffer {
    pub fn new(pool: BufferPool) -> Self {
        let current = Mutex::new(pool.get());
        Self { pool, current }
    }

    fn current(&self) -> MutexGuard<'_, PooledBuffer> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self, data: &[u8]) {
        self.current().extend_from_slice(data);
    }

    /// Swap out everything written so far, or `None` when nothing was written.
    pub fn get_and_clear(&self) -> Option<PooledBuffer> {
        let mut current = self.current();
        if current.is_empty() {
            return None;
        }
        Some(std::mem::replace(&mut *current, self.pool.get()))
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }
}

impl Default for AccumulationBuffer {
    fn default() -> Self {
        Self::new(BufferPool::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_yields_nothing() {
        let buffer = AccumulationBuffer::default();
        assert!(buffer.get_and_clear().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_get_and_clear_takes_everything() {
        let buffer = AccumulationBuffer::default();
        buffer.write(b"hello ");
        buffer.write(b"world");
        assert_eq!(buffer.len(), 11);

        let batch = buffer.get_and_clear().unwrap();
        assert_eq!(&batch[..], b"hello world");
        assert!(buffer.is_empty());
        assert!(buffer.get_and_clear().is_none());
    }

    #[test]
    fn test_dropped_batch_returns_to_pool_cleared() {
        let pool = BufferPool::new(64);
        let buffer = AccumulationBuffer::new(pool.clone());
        assert_eq!(pool.available(), 0);

        buffer.write(b"batch one");
        let batch = buffer.get_and_clear().unwrap();
        drop(batch);
        assert_eq!(pool.available(), 1);

        let reused = pool.get();
        assert!(reused.is_empty());
        assert!(reused.capacity() >= 9);
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = BufferPool::new(8);
        let loans: Vec<_> = (0..10).map(|_| pool.get()).collect();
        drop(loans);
        assert_eq!(pool.available(), MAX_POOLED_BUFFERS);
    }

    #[test]
    fn test_concurrent_writers() {
        let buffer = Arc::new(AccumulationBuffer::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        buffer.write(b"0123456789");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let batch = buffer.get_and_clear().unwrap();
        assert_eq!(batch.len(), 8 * 1000 * 10);
    }
}
