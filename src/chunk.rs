//! Input chunking.

use std::io;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log;

use crate::buffer::ChunkBuffer;
use crate::encoding::Encoding;
use crate::record::LineRecord;
use crate::sort::SortError;
use crate::stream::LineReader;

/// Splits an input file into size limited chunks of parsed records.
///
/// Lines that fail to parse are skipped and counted. The last chunk is always emitted once the input is
/// exhausted even if it is empty. Chunks are produced one at a time, nothing is read ahead.
pub struct ChunkSource<T> {
    lines: Option<LineReader>,
    encoding: Encoding,
    chunk_size: u64,
    cancel_flag: Option<Arc<AtomicBool>>,
    lines_read: u64,
    lines_dropped: u64,

    item_type: PhantomData<T>,
}

impl<T: LineRecord> ChunkSource<T> {
    /// Opens an input file for chunking.
    ///
    /// # Arguments
    /// * `path` - Input file
    /// * `encoding` - Input file encoding
    /// * `chunk_size` - Maximum chunk size in bytes
    /// * `buf_size` - Read buffer size
    pub fn open(path: &Path, encoding: Encoding, chunk_size: u64, buf_size: Option<usize>) -> io::Result<Self> {
        let lines = LineReader::open(path, encoding, buf_size)?;

        return Ok(ChunkSource {
            lines: Some(lines),
            encoding,
            chunk_size,
            cancel_flag: None,
            lines_read: 0,
            lines_dropped: 0,
            item_type: PhantomData,
        });
    }

    /// Sets a flag to be checked before every line read.
    pub fn with_cancel_flag(mut self, cancel_flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(cancel_flag);
        return self;
    }

    /// Number of lines read so far.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Number of lines skipped because they could not be parsed.
    pub fn lines_dropped(&self) -> u64 {
        self.lines_dropped
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    fn fail(&mut self, err: SortError) -> Option<Result<ChunkBuffer<T>, SortError>> {
        self.lines = None;
        Some(Err(err))
    }
}

impl<T: LineRecord> Iterator for ChunkSource<T> {
    type Item = Result<ChunkBuffer<T>, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.as_ref()?;

        let mut chunk = ChunkBuffer::new(self.chunk_size);
        loop {
            if self.is_cancelled() {
                return self.fail(SortError::Cancelled);
            }

            let line = match self.lines.as_mut()?.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.lines = None;
                    return Some(Ok(chunk));
                }
                Err(err) => return self.fail(SortError::InputError(err)),
            };
            self.lines_read += 1;

            match T::parse_line(&line) {
                Ok(item) => chunk.push(item, self.encoding.byte_count(&line)),
                Err(err) => {
                    self.lines_dropped += 1;
                    log::trace!("skipping line {}: {}", self.lines_read, err);
                }
            }

            if chunk.is_full() {
                return Some(Ok(chunk));
            }
        }
    }
}
