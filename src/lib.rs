//! `line-sort` is an external sort implementation for line oriented text files.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. Sorting is achieved in two passes. During the
//! first pass it sorts chunks of data that each fit in RAM, during the second pass it merges the sorted chunks
//! together. For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! Every input line is parsed into a record, by default a [`ParsedLine`] of the form `<number>. <text>`
//! ordered by text first and by number second.
//!
//! * **Record agnostic:**
//!   any type implementing [`LineRecord`] (parse from a line, format to a line, total order) can be sorted.
//! * **Memory limit support:**
//!   the input is split into chunks limited by size in bytes, each chunk is sorted in memory
//!   and saved to a temporary file.
//! * **File handles limit support:**
//!   no more than the configured number of chunk files are merged at once, larger sets are merged
//!   in several passes.
//! * **Multithreading support:**
//!   chunks are sorted using multiple threads.
//! * **Temporary files cleanup:**
//!   all the temporary files are deleted whether sorting succeeds or fails.
//!
//! # Example
//!
//! ```no_run
//! use std::path;
//!
//! use log;
//!
//! use line_sort::{Encoding, ExternalSorter, ExternalSorterBuilder};
//!
//! fn main() {
//!     let sorter: ExternalSorter = ExternalSorterBuilder::new()
//!         .with_tmp_dir(path::Path::new("./"))
//!         .with_encoding(Encoding::Utf8)
//!         .with_chunk_size(50 * 1024 * 1024)
//!         .with_max_file_handles(64)
//!         .with_progress(|msg| log::info!("{}", msg))
//!         .build()
//!         .unwrap();
//!
//!     sorter
//!         .sort_file(path::Path::new("input.txt"), path::Path::new("output.txt"))
//!         .unwrap();
//! }
//! ```

pub mod audit;
pub mod buffer;
pub mod chunk;
pub mod encoding;
pub mod merger;
pub mod record;
pub mod sort;
pub mod stream;
pub mod tempfiles;

pub use buffer::ChunkBuffer;
pub use chunk::ChunkSource;
pub use encoding::Encoding;
pub use merger::BinaryHeapMerger;
pub use record::{LineRecord, ParseError, ParsedLine};
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortError, SortStats};
pub use stream::{RecordReader, RecordWriter};
pub use tempfiles::{CleanupReport, TempFileManager};
