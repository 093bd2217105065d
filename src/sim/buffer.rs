//! Structure-of-arrays building blocks
//!
//! Every attribute of a point (or spring, or triangle) lives in its own
//! fixed-size `Buffer`, all indexed by the same `ElementIndex`. Buffers are
//! sized once at construction and never grow.
//!
//! Algorithms that need a temporary snapshot (double-buffered water diffusion,
//! per-point accumulators) check a scratch buffer out of a `BufferAllocator`.
//! The returned `PooledBuffer` goes back to the pool when dropped, so it is
//! released on every exit path and two live scratch buffers never alias.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::rc::Rc;

use super::types::{ElementCount, ElementIndex};

/// Fixed-capacity element set shared by all buffers of a container
#[derive(Debug, Clone, Copy)]
pub struct ElementContainer {
    element_count: ElementCount,
}

impl ElementContainer {
    pub fn new(element_count: ElementCount) -> Self {
        Self { element_count }
    }

    #[inline]
    pub fn element_count(&self) -> ElementCount {
        self.element_count
    }

    /// All element indices, in order
    #[inline]
    pub fn iter(&self) -> std::ops::Range<ElementIndex> {
        0..self.element_count
    }
}

/// A fixed-size attribute array
#[derive(Debug, Clone)]
pub struct Buffer<T> {
    data: Box<[T]>,
}

impl<T: Clone> Buffer<T> {
    /// Allocate `element_count` elements, all set to `fill`
    pub fn new(element_count: ElementCount, fill: T) -> Self {
        Self {
            data: vec![fill; element_count as usize].into_boxed_slice(),
        }
    }

    /// Overwrite the whole buffer from a slice of the same length
    pub fn copy_from(&mut self, other: &[T]) {
        debug_assert_eq!(other.len(), self.data.len());
        self.data.clone_from_slice(other);
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Buffer<T> {
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Index<ElementIndex> for Buffer<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: ElementIndex) -> &T {
        &self.data[index as usize]
    }
}

impl<T> IndexMut<ElementIndex> for Buffer<T> {
    #[inline]
    fn index_mut(&mut self, index: ElementIndex) -> &mut T {
        &mut self.data[index as usize]
    }
}

type Pool<T> = Rc<RefCell<Vec<Box<[T]>>>>;

/// Pool of scratch buffers, all `element_count` long
#[derive(Debug)]
pub struct BufferAllocator<T> {
    element_count: usize,
    pool: Pool<T>,
}

impl<T: Clone + Default> BufferAllocator<T> {
    pub fn new(element_count: ElementCount) -> Self {
        Self {
            element_count: element_count as usize,
            pool: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Check out a scratch buffer
    ///
    /// Contents are whatever the previous user left behind; callers must
    /// overwrite before reading.
    pub fn allocate(&self) -> PooledBuffer<T> {
        let data = self
            .pool
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| vec![T::default(); self.element_count].into_boxed_slice());

        PooledBuffer {
            data: Some(data),
            pool: Rc::clone(&self.pool),
        }
    }

    /// Number of buffers currently parked in the pool
    pub fn free_count(&self) -> usize {
        self.pool.borrow().len()
    }
}

/// A scratch buffer on loan from a `BufferAllocator`
#[derive(Debug)]
pub struct PooledBuffer<T> {
    // Only `None` while dropping
    data: Option<Box<[T]>>,
    pool: Pool<T>,
}

impl<T> Deref for PooledBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.data.as_deref().unwrap_or(&[])
    }
}

impl<T> DerefMut for PooledBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }
}

impl<T> Drop for PooledBuffer<T> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.borrow_mut().push(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_fixed_size_and_fill() {
        let mut buffer = Buffer::new(4, 1.5f32);
        assert_eq!(buffer.len(), 4);
        assert!(buffer.as_slice().iter().all(|&v| v == 1.5));

        buffer[2] = 3.0;
        assert_eq!(buffer[2], 3.0);

        buffer.copy_from(&[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(buffer.as_slice(), &[0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_pooled_buffer_returns_on_drop() {
        let allocator = BufferAllocator::<f32>::new(8);
        assert_eq!(allocator.free_count(), 0);

        {
            let mut a = allocator.allocate();
            let b = allocator.allocate();
            assert_eq!(a.len(), 8);
            assert_eq!(b.len(), 8);
            a[0] = 42.0;
        }

        assert_eq!(allocator.free_count(), 2);

        // Recycled, not reallocated
        let c = allocator.allocate();
        assert_eq!(c.len(), 8);
        assert_eq!(allocator.free_count(), 1);
    }

    #[test]
    fn test_pooled_buffer_released_on_early_return() {
        fn use_and_bail(allocator: &BufferAllocator<u32>) -> Option<u32> {
            let scratch = allocator.allocate();
            scratch.first().copied().filter(|&v| v > 100)?;
            Some(1)
        }

        let allocator = BufferAllocator::<u32>::new(3);
        assert_eq!(use_and_bail(&allocator), None);
        assert_eq!(allocator.free_count(), 1);
    }

    #[test]
    fn test_element_container_iterates_all_indices() {
        let container = ElementContainer::new(3);
        assert_eq!(container.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
