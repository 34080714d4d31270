//! A size-bucketed pool of reusable backing buffers.
//!
//! Neighbour queries run once per boid per frame, so handing each of them a
//! freshly allocated `Vec` would stall the update loop. Instead a query
//! borrows a buffer from the pool, fills a prefix of it and gives it back.
//!
//! Buffers are grouped by power-of-two capacity ("buckets"): a request for
//! `n` slots is served from the bucket `n.next_power_of_two()`, so results of
//! slightly different sizes keep reusing the same few buffers.
//!
//! # Example
//!
//! ```
//! use flock_sim::pool::BufferPool;
//!
//! let pool: BufferPool<usize> = BufferPool::new();
//! let mut view = pool.borrow(5).expect("allocation failed");
//! assert_eq!(view.len(), 5);
//! assert_eq!(view.capacity(), 8);
//! view[0] = 42;
//! let first = view.as_ptr();
//! view.release();
//!
//! // Any request in the same bucket gets the same backing buffer back.
//! let again = pool.borrow(7).expect("allocation failed");
//! assert_eq!(again.as_ptr(), first);
//! assert_eq!(pool.allocations(), 1);
//! ```
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use log::trace;
use parking_lot::Mutex;

use crate::utils::FlockError;

struct PoolInner<T> {
    buckets: Mutex<HashMap<usize, Vec<Box<[T]>>>>,
    allocations: AtomicUsize,
}

impl<T> PoolInner<T> {
    fn recycle(&self, buffer: Box<[T]>) {
        let bucket = buffer.len();
        let mut buckets = self.buckets.lock();
        buckets.entry(bucket).or_default().push(buffer);
    }
}

/// Thread-safe pool of `Box<[T]>` buffers keyed by power-of-two capacity.
///
/// Cloning the pool is cheap and yields another handle to the same free lists.
pub struct BufferPool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for BufferPool<T> {
    fn clone(&self) -> Self {
        BufferPool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default + Clone> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + Clone> BufferPool<T> {
    pub fn new() -> Self {
        BufferPool {
            inner: Arc::new(PoolInner {
                buckets: Mutex::new(HashMap::new()),
                allocations: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns the bucket capacity serving a request for `min_capacity` slots,
    /// or `None` if no power of two that large fits in a `usize`.
    pub fn bucket_for(min_capacity: usize) -> Option<usize> {
        min_capacity.max(1).checked_next_power_of_two()
    }

    /// Checks out a buffer with room for at least `min_capacity` elements.
    ///
    /// The returned view is exactly `min_capacity` long; its backing buffer
    /// may be larger. Slots hold whatever the previous borrower left there.
    ///
    /// # Errors
    ///
    /// Returns [`FlockError::ResourceExhaustion`] if the bucket size overflows
    /// or the backing allocation fails.
    pub fn borrow(&self, min_capacity: usize) -> Result<Borrowed<T>, FlockError> {
        let bucket = Self::bucket_for(min_capacity).ok_or_else(|| {
            FlockError::ResourceExhaustion(format!(
                "no buffer bucket can hold {} elements",
                min_capacity
            ))
        })?;

        let recycled = {
            let mut buckets = self.inner.buckets.lock();
            buckets.get_mut(&bucket).and_then(Vec::pop)
        };

        let buffer = match recycled {
            Some(buffer) => buffer,
            None => self.allocate(bucket)?,
        };

        Ok(Borrowed {
            buffer: Some(buffer),
            len: min_capacity,
            origin: Arc::downgrade(&self.inner),
        })
    }

    fn allocate(&self, bucket: usize) -> Result<Box<[T]>, FlockError> {
        let mut storage = Vec::new();
        storage.try_reserve_exact(bucket).map_err(|err| {
            FlockError::ResourceExhaustion(format!(
                "failed to allocate a buffer of {} elements: {}",
                bucket, err
            ))
        })?;
        storage.resize(bucket, T::default());

        let total = self.inner.allocations.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("allocated pooled buffer of {} slots ({} total)", bucket, total);

        Ok(storage.into_boxed_slice())
    }
}

impl<T> BufferPool<T> {
    /// Returns `handle` to this pool.
    ///
    /// Releasing a handle that was borrowed from a different pool leaves this
    /// pool untouched and returns `false`; the handle then goes back to its
    /// own pool when it is dropped.
    pub fn release(&self, handle: Borrowed<T>) -> bool {
        if !handle.belongs_to(self) {
            return false;
        }
        handle.release();
        true
    }

    /// Number of backing buffers this pool has ever allocated.
    pub fn allocations(&self) -> usize {
        self.inner.allocations.load(Ordering::Relaxed)
    }

    /// Number of idle buffers waiting in `bucket`.
    pub fn free_buffers(&self, bucket: usize) -> usize {
        let buckets = self.inner.buckets.lock();
        buckets.get(&bucket).map_or(0, Vec::len)
    }

    /// Number of idle buffers across every bucket.
    pub fn idle_buffers(&self) -> usize {
        let buckets = self.inner.buckets.lock();
        buckets.values().map(Vec::len).sum()
    }
}

/// An exclusively owned view over a pooled buffer.
///
/// The view derefs to a slice of its logical length. Dropping it (or calling
/// [`Borrowed::release`]) hands the backing buffer back to the pool it came
/// from, exactly once. If that pool is gone the buffer is simply freed.
pub struct Borrowed<T> {
    buffer: Option<Box<[T]>>,
    len: usize,
    origin: Weak<PoolInner<T>>,
}

impl<T> Borrowed<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the backing buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, |buffer| buffer.len())
    }

    /// Address of the backing buffer, stable for the buffer's whole life in the pool.
    pub fn as_ptr(&self) -> *const T {
        self.buffer.as_ref().map_or(std::ptr::null(), |buffer| buffer.as_ptr())
    }

    /// Shrinks the logical length to `len` (never grows it).
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// Re-wraps this handle as a shorter view over the same buffer. Releasing
    /// the narrowed view still reaches the original pool.
    pub fn narrow(mut self, len: usize) -> Self {
        self.truncate(len);
        self
    }

    pub fn belongs_to(&self, pool: &BufferPool<T>) -> bool {
        std::ptr::eq(self.origin.as_ptr(), Arc::as_ptr(&pool.inner))
    }

    pub fn release(mut self) {
        self.return_to_origin();
    }

    fn return_to_origin(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            if let Some(pool) = self.origin.upgrade() {
                pool.recycle(buffer);
            }
        }
    }
}

impl<T> Drop for Borrowed<T> {
    fn drop(&mut self) {
        self.return_to_origin();
    }
}

impl<T> Deref for Borrowed<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match &self.buffer {
            Some(buffer) => &buffer[..self.len],
            None => &[],
        }
    }
}

impl<T> DerefMut for Borrowed<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        match &mut self.buffer {
            Some(buffer) => &mut buffer[..self.len],
            None => &mut [],
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Borrowed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Borrowed")
            .field("view", &self.deref())
            .field("capacity", &self.capacity())
            .finish()
    }
}
