//! Pooled per-request scratch buffers.
//!
//! Secure-mode requests stage decoded ciphertext and decrypted plaintext in
//! buffers checked out from a [`ScratchPool`]. Every buffer is zeroized over
//! its whole capacity before it re-enters the pool, so no request can observe
//! another request's bytes.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;
use zeroize::Zeroize;

/// Default capacity of a freshly allocated buffer. Callback payloads are
/// small; larger ones grow the buffer and keep the capacity when pooled.
const DEFAULT_CAPACITY: usize = 4096;

/// Bounded pool of reusable byte buffers.
pub struct ScratchPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
}

impl ScratchPool {
    /// Create a pool retaining at most `max_pooled` idle buffers.
    pub fn new(max_pooled: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_pooled)),
            max_pooled,
        }
    }

    /// Check out an empty buffer. It returns to the pool when dropped.
    pub fn checkout(&self) -> ScratchBuf<'_> {
        let buf = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(DEFAULT_CAPACITY));

        ScratchBuf { pool: self, buf }
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn restore(&self, mut buf: Vec<u8>) {
        reset(&mut buf);

        let mut free = self.free.lock();
        if free.len() < self.max_pooled {
            free.push(buf);
        }
    }
}

/// Zero every byte up to capacity, then truncate to empty.
fn reset(buf: &mut Vec<u8>) {
    buf.zeroize();
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::new(64)
    }
}

/// A buffer on loan from a [`ScratchPool`].
pub struct ScratchBuf<'a> {
    pool: &'a ScratchPool,
    buf: Vec<u8>,
}

impl Deref for ScratchBuf<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for ScratchBuf<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for ScratchBuf<'_> {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.restore(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_is_empty() {
        let pool = ScratchPool::new(4);
        let buf = pool.checkout();
        assert!(buf.is_empty());
    }

    /// Bytes in `buf`'s spare capacity.
    fn spare_bytes(buf: &mut Vec<u8>) -> Vec<u8> {
        buf.spare_capacity_mut()
            .iter()
            // SAFETY: callers only pass buffers whose whole capacity was
            // written before, and zeroizing only stores into it.
            .map(|byte| unsafe { byte.assume_init() })
            .collect()
    }

    #[test]
    fn test_reset_zeroes_full_capacity() {
        let mut buf = Vec::with_capacity(64);
        buf.resize(buf.capacity(), 0xAA);
        let capacity = buf.capacity();
        buf.truncate(8);

        reset(&mut buf);

        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), capacity);
        let spare = spare_bytes(&mut buf);
        assert_eq!(spare.len(), capacity);
        assert!(spare.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_buffer_returns_reset() {
        let pool = ScratchPool::new(4);
        {
            let mut buf = pool.checkout();
            let capacity = buf.capacity();
            buf.resize(capacity, 0x5C);
            buf.truncate(3);
        }
        assert_eq!(pool.idle(), 1);

        let mut reused = pool.checkout();
        assert!(reused.is_empty());
        assert!(reused.capacity() >= DEFAULT_CAPACITY);
        assert!(spare_bytes(&mut reused).iter().all(|&b| b == 0));
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = ScratchPool::new(2);
        {
            let _a = pool.checkout();
            let _b = pool.checkout();
            let _c = pool.checkout();
        }
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_zero_sized_pool_keeps_nothing() {
        let pool = ScratchPool::new(0);
        drop(pool.checkout());
        assert_eq!(pool.idle(), 0);
    }
}
