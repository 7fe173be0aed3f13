//! Byte limited chunk buffer.

use rayon;

/// In-memory chunk of records limited by the encoded size of the lines they were parsed from.
///
/// The size is an estimate of the on-disk chunk size: it is accumulated from the raw input lines,
/// so the persisted chunk may be slightly larger or smaller.
pub struct ChunkBuffer<T> {
    limit: u64,
    current_size: u64,
    inner: Vec<T>,
}

impl<T> ChunkBuffer<T> {
    /// Creates an empty buffer.
    ///
    /// # Arguments
    /// * `limit` - Buffer size in bytes. The buffer is full once the accumulated size strictly exceeds it.
    pub fn new(limit: u64) -> Self {
        ChunkBuffer {
            limit,
            current_size: 0,
            inner: Vec::new(),
        }
    }

    /// Adds a new element to the buffer.
    ///
    /// # Arguments
    /// * `item` - Element to be added
    /// * `size` - Encoded size of the line the element was parsed from
    pub fn push(&mut self, item: T, size: usize) {
        self.current_size += size as u64;
        self.inner.push(item);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Accumulated size in bytes.
    pub fn mem_size(&self) -> u64 {
        self.current_size
    }

    /// Checks if the buffer exceeded the limit.
    pub fn is_full(&self) -> bool {
        self.current_size > self.limit
    }

    pub fn as_slice(&self) -> &[T] {
        self.inner.as_slice()
    }
}

impl<T> IntoIterator for ChunkBuffer<T> {
    type Item = T;
    type IntoIter = <Vec<T> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<T: Send> rayon::slice::ParallelSliceMut<T> for ChunkBuffer<T> {
    fn as_parallel_slice_mut(&mut self) -> &mut [T] {
        self.inner.as_mut_slice()
    }
}
