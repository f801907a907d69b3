use std::sync::{Mutex, PoisonError};

/// Size of every pooled buffer (32 KiB).
pub const BUFFER_SIZE: usize = 32 * 1024;

/// A pool of reusable fixed-size copy buffers.
///
/// Used by temp-file materialization. It is `Send + Sync` so that one
/// `Arc<BufferPool>` can be shared between every handle of a filesystem,
/// or between filesystems. A fresh buffer behaves exactly like a pooled one.
#[derive(Debug, Default)]
pub struct BufferPool {
    buffers: Mutex<Vec<Box<[u8]>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a buffer from the pool, allocating one if the pool is empty.
    pub fn acquire(&self) -> Box<[u8]> {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| vec![0u8; BUFFER_SIZE].into_boxed_slice())
    }

    /// Return a buffer for reuse. `None` and buffers of the wrong size are
    /// dropped.
    pub fn release(&self, buf: Option<Box<[u8]>>) {
        let Some(buf) = buf else { return };
        if buf.len() != BUFFER_SIZE {
            return;
        }
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(buf);
    }

    /// Number of buffers waiting in the pool.
    pub fn idle(&self) -> usize {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn buffers_are_reused() {
        let pool = BufferPool::new();
        let buf = pool.acquire();
        assert_eq!(buf.len(), BUFFER_SIZE);
        let addr = buf.as_ptr();

        pool.release(Some(buf));
        assert_eq!(pool.idle(), 1);

        let again = pool.acquire();
        assert_eq!(again.as_ptr(), addr);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn release_ignores_none_and_foreign_buffers() {
        let pool = BufferPool::new();
        pool.release(None);
        pool.release(Some(Box::from(&[0u8; 16][..])));
        pool.release(Some(Vec::new().into_boxed_slice()));
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn shared_across_threads() {
        let pool = Arc::new(BufferPool::new());
        std::thread::scope(|s| {
            for _ in 0..4 {
                let pool = Arc::clone(&pool);
                s.spawn(move || {
                    for _ in 0..16 {
                        let buf = pool.acquire();
                        pool.release(Some(buf));
                    }
                });
            }
        });
        assert!(pool.idle() >= 1 && pool.idle() <= 4);
    }
}
