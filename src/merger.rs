//! Binary heap merger.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::error::Error;

/// Binary heap merger implementation.
/// Merges multiple sorted inputs into a single sorted output.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of items,
/// *n* is the number of chunks (inputs).
///
/// An exhausted input is dropped right away. On the first input error all the inputs are dropped,
/// the error is returned and the merger yields nothing afterwards.
pub struct BinaryHeapMerger<T, E, C>
where
    T: Ord,
    E: Error,
    C: IntoIterator<Item = Result<T, E>>,
{
    // binary heap is max-heap by default so we reverse it to convert it to min-heap
    items: BinaryHeap<(Reverse<T>, usize)>,
    chunks: Vec<Option<C::IntoIter>>,
    initiated: bool,
    failed: bool,
}

impl<T, E, C> BinaryHeapMerger<T, E, C>
where
    T: Ord,
    E: Error,
    C: IntoIterator<Item = Result<T, E>>,
{
    /// Creates an instance of a binary heap merger using chunks as inputs.
    /// Chunk items should be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `chunks` - Chunks to be merged in a single sorted one
    pub fn new<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
    {
        let chunks = Vec::from_iter(chunks.into_iter().map(|c| Some(c.into_iter())));
        let items = BinaryHeap::with_capacity(chunks.len());

        return BinaryHeapMerger {
            chunks,
            items,
            initiated: false,
            failed: false,
        };
    }

    /// Number of inputs that are not exhausted yet.
    pub fn open_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }

    /// Writes all the merged items to `sink`.
    /// Returns the number of items written.
    ///
    /// # Arguments
    /// * `sink` - Item consumer
    /// * `progress_interval` - Number of items between two `progress` calls
    /// * `progress` - Called with the number of items written so far
    pub fn drain_into<F, P>(mut self, mut sink: F, progress_interval: u64, mut progress: P) -> Result<u64, E>
    where
        F: FnMut(T) -> Result<(), E>,
        P: FnMut(u64),
    {
        let mut written: u64 = 0;
        let mut last_reported: u64 = 0;

        while let Some(item) = self.next() {
            sink(item?)?;
            written += 1;

            if progress_interval > 0 && written - last_reported >= progress_interval {
                progress(written);
                last_reported = written;
            }
        }

        return Ok(written);
    }

    fn advance(&mut self, idx: usize) -> Result<(), E> {
        let next = match self.chunks[idx].as_mut() {
            Some(chunk) => chunk.next(),
            None => return Ok(()),
        };

        match next {
            Some(Ok(item)) => self.items.push((Reverse(item), idx)),
            Some(Err(err)) => return Err(err),
            None => self.chunks[idx] = None,
        }

        return Ok(());
    }

    fn fail(&mut self, err: E) -> Option<Result<T, E>> {
        self.failed = true;
        self.items.clear();
        self.chunks.clear();
        Some(Err(err))
    }
}

impl<T, E, C> Iterator for BinaryHeapMerger<T, E, C>
where
    T: Ord,
    E: Error,
    C: IntoIterator<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    /// Returns the next item from the inputs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if !self.initiated {
            self.initiated = true;
            for idx in 0..self.chunks.len() {
                if let Err(err) = self.advance(idx) {
                    return self.fail(err);
                }
            }
        }

        let (result, idx) = self.items.pop()?;
        if let Err(err) = self.advance(idx) {
            return self.fail(err);
        }

        return Some(Ok(result.0));
    }
}
