//! External sorter.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::slice::ParallelSliceMut;

use crate::buffer::ChunkBuffer;
use crate::chunk::ChunkSource;
use crate::encoding::Encoding;
use crate::merger::BinaryHeapMerger;
use crate::record::{LineRecord, ParseError, ParsedLine};
use crate::stream::{RecordReader, RecordWriter};
use crate::tempfiles::TempFileManager;

/// Default maximum chunk size (512 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 512 * 1024 * 1024;
/// Default maximum number of files merged at once.
pub const DEFAULT_MAX_FILE_HANDLES: usize = 512;
/// Default file read/write buffer size (4 MiB).
pub const DEFAULT_RW_BUF_SIZE: usize = 4 * 1024 * 1024;
/// Default number of merged records between two progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000_000;

/// Progress reporting callback. Receives a human readable status message.
pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
    /// Input file opening or reading error.
    InputError(io::Error),
    /// Common I/O error.
    IO(io::Error),
    /// Malformed line in a sorted chunk.
    Parse {
        path: PathBuf,
        line: u64,
        source: ParseError,
    },
    /// Invalid sorter configuration.
    Config(String),
    /// Sorting cancelled.
    Cancelled,
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::TempDir(err) => Some(err),
            SortError::ThreadPoolBuildError(err) => Some(err),
            SortError::InputError(err) => Some(err),
            SortError::IO(err) => Some(err),
            SortError::Parse { source, .. } => Some(source),
            SortError::Config(_) => None,
            SortError::Cancelled => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
            SortError::InputError(err) => write!(f, "input data stream error: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::Parse { path, line, source } => {
                write!(f, "chunk {} line {} parsing failed: {}", path.display(), line, source)
            }
            SortError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            SortError::Cancelled => write!(f, "sorting cancelled"),
        }
    }
}

/// Sorting run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Number of sorted chunks written to temporary files.
    pub chunks: usize,
    /// Number of records parsed from the input.
    pub records_read: u64,
    /// Number of input lines skipped because they could not be parsed.
    pub lines_dropped: u64,
    /// Number of records written to the output.
    pub records_written: u64,
    /// Number of merge passes. Every pass but the last merges groups of chunks into intermediate files.
    pub merge_passes: usize,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
pub struct ExternalSorterBuilder<T = ParsedLine>
where
    T: LineRecord,
{
    /// Number of threads to be used to sort chunks.
    threads_number: Option<usize>,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// File read/write buffer size.
    rw_buf_size: usize,
    /// Maximum chunk size in bytes.
    chunk_size: u64,
    /// Maximum number of files merged at once.
    max_file_handles: usize,
    /// Input, output and chunk files encoding.
    encoding: Encoding,
    /// Progress reporting callback.
    progress: ProgressCallback,
    /// Number of merged records between two progress reports.
    progress_interval: u64,
    /// Cooperative cancellation flag.
    cancel_flag: Option<Arc<AtomicBool>>,

    /// Record type.
    item_type: PhantomData<T>,
}

impl<T> ExternalSorterBuilder<T>
where
    T: LineRecord,
{
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter<T>, SortError> {
        if self.chunk_size == 0 {
            return Err(SortError::Config("chunk size must be positive".to_string()));
        }
        if self.max_file_handles < 2 {
            return Err(SortError::Config(format!(
                "at least 2 file handles required, got {}",
                self.max_file_handles
            )));
        }
        if self.rw_buf_size == 0 {
            return Err(SortError::Config("read/write buffer size must be positive".to_string()));
        }

        return Ok(ExternalSorter {
            thread_pool: ExternalSorter::<T>::init_thread_pool(self.threads_number)?,
            tmp_dir: self.tmp_dir.map(PathBuf::from),
            rw_buf_size: self.rw_buf_size,
            chunk_size: self.chunk_size,
            max_file_handles: self.max_file_handles,
            encoding: self.encoding,
            progress: self.progress,
            progress_interval: self.progress_interval,
            cancel_flag: self.cancel_flag,
            item_type: PhantomData,
        });
    }

    /// Sets number of threads to be used to sort chunks.
    pub fn with_threads_number(mut self, threads_number: usize) -> ExternalSorterBuilder<T> {
        self.threads_number = Some(threads_number);
        return self;
    }

    /// Sets directory to be used to store temporary data.
    /// The directory is created when sorting starts if it doesn't exist.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder<T> {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder<T> {
        self.rw_buf_size = buf_size;
        return self;
    }

    /// Sets maximum chunk size in bytes.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> ExternalSorterBuilder<T> {
        self.chunk_size = chunk_size;
        return self;
    }

    /// Sets maximum number of files opened at once during the merge.
    pub fn with_max_file_handles(mut self, max_file_handles: usize) -> ExternalSorterBuilder<T> {
        self.max_file_handles = max_file_handles;
        return self;
    }

    /// Sets input, output and temporary files encoding.
    pub fn with_encoding(mut self, encoding: Encoding) -> ExternalSorterBuilder<T> {
        self.encoding = encoding;
        return self;
    }

    /// Sets progress reporting callback.
    pub fn with_progress<F>(mut self, progress: F) -> ExternalSorterBuilder<T>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.progress = Arc::new(progress);
        return self;
    }

    /// Sets number of merged records between two progress reports.
    pub fn with_progress_interval(mut self, progress_interval: u64) -> ExternalSorterBuilder<T> {
        self.progress_interval = progress_interval;
        return self;
    }

    /// Sets a flag that cancels sorting once set to `true`.
    pub fn with_cancel_flag(mut self, cancel_flag: Arc<AtomicBool>) -> ExternalSorterBuilder<T> {
        self.cancel_flag = Some(cancel_flag);
        return self;
    }
}

impl<T> Default for ExternalSorterBuilder<T>
where
    T: LineRecord,
{
    fn default() -> Self {
        ExternalSorterBuilder {
            threads_number: None,
            tmp_dir: None,
            rw_buf_size: DEFAULT_RW_BUF_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_handles: DEFAULT_MAX_FILE_HANDLES,
            encoding: Encoding::default(),
            progress: Arc::new(|msg: &str| log::debug!("{}", msg)),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            cancel_flag: None,
            item_type: PhantomData,
        }
    }
}

/// External sorter.
pub struct ExternalSorter<T = ParsedLine>
where
    T: LineRecord,
{
    /// Sorting thread pool.
    thread_pool: rayon::ThreadPool,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<PathBuf>,
    /// File read/write buffer size.
    rw_buf_size: usize,
    /// Maximum chunk size in bytes.
    chunk_size: u64,
    /// Maximum number of files merged at once.
    max_file_handles: usize,
    /// Input, output and chunk files encoding.
    encoding: Encoding,
    /// Progress reporting callback.
    progress: ProgressCallback,
    /// Number of merged records between two progress reports.
    progress_interval: u64,
    /// Cooperative cancellation flag.
    cancel_flag: Option<Arc<AtomicBool>>,

    /// Record type.
    item_type: PhantomData<T>,
}

impl<T> ExternalSorter<T>
where
    T: LineRecord,
{
    fn init_thread_pool(threads_number: Option<usize>) -> Result<rayon::ThreadPool, SortError> {
        let mut thread_pool_builder = rayon::ThreadPoolBuilder::new();

        if let Some(threads_number) = threads_number {
            log::info!("initializing thread-pool (threads: {})", threads_number);
            thread_pool_builder = thread_pool_builder.num_threads(threads_number);
        } else {
            log::info!("initializing thread-pool (threads: default)");
        }
        let thread_pool = thread_pool_builder
            .build()
            .map_err(|err| SortError::ThreadPoolBuildError(err))?;

        return Ok(thread_pool);
    }

    /// Sorts the input file writing the result to the output file.
    ///
    /// All the temporary files created during the run are deleted before returning, whether sorting
    /// succeeded or not. On error the output file content is undefined.
    ///
    /// # Arguments
    /// * `input` - File to be sorted
    /// * `output` - File the sorted data is written to
    pub fn sort_file(&self, input: &Path, output: &Path) -> Result<SortStats, SortError> {
        log::info!("starting chunked file sorting (encoding: {})", self.encoding);

        let mut tmp_files = TempFileManager::new(self.tmp_dir.as_deref()).map_err(|err| SortError::TempDir(err))?;
        log::info!("using {} as a temporary directory", tmp_files.dir().display());
        let result = self.sort_chunked(input, output, &mut tmp_files);

        let report = tmp_files.close();
        if report.failed > 0 {
            log::warn!("{} temporary files could not be deleted", report.failed);
        }

        return result;
    }

    fn sort_chunked(&self, input: &Path, output: &Path, tmp_files: &mut TempFileManager) -> Result<SortStats, SortError> {
        let mut stats = SortStats::default();

        let mut source: ChunkSource<T> = ChunkSource::open(input, self.encoding, self.chunk_size, Some(self.rw_buf_size))
            .map_err(|err| SortError::InputError(err))?;
        if let Some(cancel_flag) = &self.cancel_flag {
            source = source.with_cancel_flag(cancel_flag.clone());
        }

        let mut chunk_files = Vec::new();
        while let Some(chunk) = source.next() {
            let chunk = chunk?;
            let chunk_file = tmp_files
                .create_temporary_file()
                .map_err(|err| SortError::TempDir(err))?;
            chunk_files.push(chunk_file.clone());

            stats.records_read += self.create_chunk(chunk, &chunk_file)?;
            stats.chunks += 1;

            self.report_progress(&format!(
                "Chunk {} read, sorted and written to temporary file {}",
                chunk_files.len(),
                chunk_file.display()
            ));
        }

        stats.lines_dropped = source.lines_dropped();
        if stats.lines_dropped > 0 {
            log::warn!("{} malformed input lines skipped", stats.lines_dropped);
        }
        log::info!("created {} temporary files for sorted chunks", chunk_files.len());

        stats.records_written = self.merge_files(&chunk_files, output, tmp_files, &mut stats)?;
        log::info!("k-way merge completed, sorted data written to {}", output.display());

        return Ok(stats);
    }

    fn create_chunk(&self, mut buffer: ChunkBuffer<T>, path: &Path) -> Result<u64, SortError> {
        log::debug!("sorting chunk data ...");
        self.thread_pool.install(|| {
            buffer.par_sort_unstable();
        });

        log::debug!("saving chunk data");
        let mut chunk_writer =
            RecordWriter::create(path, self.encoding, Some(self.rw_buf_size)).map_err(|err| SortError::IO(err))?;
        chunk_writer
            .write_all(buffer.as_slice())
            .map_err(|err| SortError::IO(err))?;

        return chunk_writer.finish().map_err(|err| SortError::IO(err));
    }

    /// Merges `files` into `output` opening at most `max_file_handles` inputs at once.
    /// Larger sets are merged pass by pass: every group of a pass is merged into an intermediate file,
    /// and the group inputs are deleted as soon as the group is merged. Returns the number of records
    /// written to `output`.
    fn merge_files(
        &self,
        files: &[PathBuf],
        output: &Path,
        tmp_files: &mut TempFileManager,
        stats: &mut SortStats,
    ) -> Result<u64, SortError> {
        stats.merge_passes += 1;
        if files.len() <= self.max_file_handles {
            return self.merge_group(files, output);
        }

        let groups_number = (files.len() + self.max_file_handles - 1) / self.max_file_handles;
        log::info!(
            "too many chunks for a single k-way merge, pass {} splits them into {} groups",
            stats.merge_passes,
            groups_number
        );

        let mut group_files = Vec::with_capacity(groups_number);
        for (idx, group) in files.chunks(self.max_file_handles).enumerate() {
            let group_file = tmp_files
                .create_temporary_file()
                .map_err(|err| SortError::TempDir(err))?;
            group_files.push(group_file.clone());

            self.merge_group(group, &group_file)?;

            log::info!(
                "finished k-way merge for group {}, {} groups remaining",
                idx + 1,
                groups_number - idx - 1
            );
            tmp_files.cleanup_temporary_files(Some(group));
        }

        return self.merge_files(&group_files, output, tmp_files, stats);
    }

    fn merge_group(&self, files: &[PathBuf], output: &Path) -> Result<u64, SortError> {
        if files.is_empty() {
            log::info!("no temporary files to merge, output file will be empty");
        } else {
            log::info!("starting k-way merge of {} files", files.len());
        }

        let chunks = files
            .iter()
            .map(|path| RecordReader::<T>::open(path, self.encoding, Some(self.rw_buf_size)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| SortError::IO(err))?;
        let mut output_writer =
            RecordWriter::create(output, self.encoding, Some(self.rw_buf_size)).map_err(|err| SortError::IO(err))?;

        let written = BinaryHeapMerger::new(chunks).drain_into(
            |item| {
                if self.is_cancelled() {
                    return Err(SortError::Cancelled);
                }
                output_writer.write(&item).map_err(|err| SortError::IO(err))
            },
            self.progress_interval,
            |written| self.report_progress(&format!("Processed {} lines", written)),
        )?;
        output_writer.finish().map_err(|err| SortError::IO(err))?;

        log::info!("k-way merge completed: {} lines written", written);

        return Ok(written);
    }

    fn report_progress(&self, msg: &str) {
        (self.progress)(msg);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }
}
