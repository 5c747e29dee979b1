use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

const DEFAULT_MAX_POOLED: usize = 64;
const DEFAULT_MAX_RETAINED_CAPACITY: usize = 64 * 1024;

/// Bounded pool of encode buffers shared by a core and its clones.
///
/// Buffers that grew beyond `max_retained_capacity` are dropped instead of
/// pooled, and at most `max_pooled` idle buffers are kept.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
    max_retained_capacity: usize,
}

impl BufferPool {
    pub fn new(max_pooled: usize, max_retained_capacity: usize) -> Arc<Self> {
        Arc::new(BufferPool {
            free: Mutex::new(Vec::with_capacity(max_pooled)),
            max_pooled,
            max_retained_capacity,
        })
    }

    /// Take a cleared buffer; it goes back to the pool when dropped.
    pub fn get(self: &Arc<Self>) -> PooledBuffer {
        let buf = self.free.lock().pop().unwrap_or_else(|| Vec::with_capacity(256));
        PooledBuffer { buf, pool: Arc::clone(self) }
    }

    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn put(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.max_retained_capacity {
            return;
        }
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_pooled {
            free.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        BufferPool {
            free: Mutex::new(Vec::new()),
            max_pooled: DEFAULT_MAX_POOLED,
            max_retained_capacity: DEFAULT_MAX_RETAINED_CAPACITY,
        }
    }
}

pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: Arc<BufferPool>,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_return_cleared() {
        let pool = BufferPool::new(4, 1024);
        {
            let mut buf = pool.get();
            buf.extend_from_slice(b"hello");
        }
        assert_eq!(pool.idle(), 1);
        assert!(pool.get().is_empty());
    }

    #[test]
    fn oversized_buffers_are_not_retained() {
        let pool = BufferPool::new(4, 16);
        {
            let mut buf = pool.get();
            buf.extend_from_slice(&[0u8; 1024]);
        }
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn pool_size_is_bounded() {
        let pool = BufferPool::new(1, 1024);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }
}
