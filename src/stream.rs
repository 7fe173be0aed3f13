//! Line oriented record streams.

use std::fs;
use std::io::{self, prelude::*};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use log;

use crate::encoding::Encoding;
use crate::record::LineRecord;
use crate::sort::SortError;

/// Buffered line reader decoding lines with a configured encoding.
/// Accepts `\n` and `\r\n` line terminators.
///
/// A byte order mark at the beginning of the file is skipped and overrides the configured encoding.
pub(crate) struct LineReader {
    reader: io::BufReader<fs::File>,
    encoding: Encoding,
    newline: Vec<u8>,
    carriage_return: Vec<u8>,
    buf: Vec<u8>,
}

impl LineReader {
    pub(crate) fn open(path: &Path, encoding: Encoding, buf_size: Option<usize>) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        let mut reader = match buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        let bom = Encoding::detect_bom(reader.fill_buf()?);
        let encoding = match bom {
            Some((detected, bom_len)) => {
                reader.consume(bom_len);
                if detected != encoding {
                    log::debug!("{} byte order mark found in {}", detected, path.display());
                }
                detected
            }
            None => encoding,
        };

        return Ok(LineReader {
            reader,
            encoding,
            newline: encoding.encode_ascii('\n'),
            carriage_return: encoding.encode_ascii('\r'),
            buf: Vec::new(),
        });
    }

    /// Reads the next line without its terminator. Returns [`None`] at the end of the file.
    pub(crate) fn read_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let terminated = self.read_raw_line()?;
        if self.buf.is_empty() {
            return Ok(None);
        }

        if terminated {
            self.buf.truncate(self.buf.len() - self.newline.len());
            if self.buf.len() % self.newline.len() == 0 && self.buf.ends_with(&self.carriage_return) {
                self.buf.truncate(self.buf.len() - self.carriage_return.len());
            }
        }

        return Ok(Some(self.encoding.decode(&self.buf).into_owned()));
    }

    /// Reads raw bytes up to and including the next newline code unit.
    /// Returns `false` if the end of the file is reached first.
    fn read_raw_line(&mut self) -> io::Result<bool> {
        let unit_size = self.newline.len();
        // position of the 0x0A byte inside the newline code unit
        let marker_offset = self.newline.iter().position(|&b| b == b'\n').unwrap_or(0);

        loop {
            if self.reader.read_until(b'\n', &mut self.buf)? == 0 || self.buf.last() != Some(&b'\n') {
                return Ok(false);
            }

            let marker = self.buf.len() - 1;
            if marker % unit_size != marker_offset {
                continue;
            }

            let unit_start = marker - marker_offset;
            let missing = (unit_size - 1 - marker_offset) as u64;
            if missing > 0 && self.reader.by_ref().take(missing).read_to_end(&mut self.buf)? < missing as usize {
                return Ok(false);
            }
            if self.buf.len() == unit_start + unit_size && self.buf[unit_start..] == self.newline[..] {
                return Ok(true);
            }
        }
    }
}

/// Forward-only record stream over a sorted chunk file.
///
/// Every line must parse: a malformed line is reported as [`SortError::Parse`] and ends the stream.
/// The file handle is released as soon as the stream is exhausted or fails.
pub struct RecordReader<T> {
    lines: Option<LineReader>,
    path: PathBuf,
    line_number: u64,

    item_type: PhantomData<T>,
}

impl<T: LineRecord> RecordReader<T> {
    /// Opens a record stream.
    ///
    /// # Arguments
    /// * `path` - File to be read
    /// * `encoding` - File encoding
    /// * `buf_size` - Read buffer size
    pub fn open(path: &Path, encoding: Encoding, buf_size: Option<usize>) -> io::Result<Self> {
        let lines = LineReader::open(path, encoding, buf_size)?;

        return Ok(RecordReader {
            lines: Some(lines),
            path: path.to_path_buf(),
            line_number: 0,
            item_type: PhantomData,
        });
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks if the underlying file is still open.
    pub fn is_open(&self) -> bool {
        self.lines.is_some()
    }
}

impl<T: LineRecord> Iterator for RecordReader<T> {
    type Item = Result<T, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        let lines = self.lines.as_mut()?;

        let line = match lines.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                self.lines = None;
                return None;
            }
            Err(err) => {
                self.lines = None;
                return Some(Err(SortError::IO(err)));
            }
        };
        self.line_number += 1;

        match T::parse_line(&line) {
            Ok(item) => Some(Ok(item)),
            Err(err) => {
                self.lines = None;
                Some(Err(SortError::Parse {
                    path: self.path.clone(),
                    line: self.line_number,
                    source: err,
                }))
            }
        }
    }
}

/// Sequential record writer. Each record is written as one line.
///
/// [`RecordWriter::finish`] flushes and closes the file reporting errors, dropping an unfinished writer
/// flushes on a best effort basis.
pub struct RecordWriter<T> {
    writer: Option<io::BufWriter<fs::File>>,
    encoding: Encoding,
    line_buf: Vec<u8>,
    written: u64,

    item_type: PhantomData<T>,
}

impl<T: LineRecord> RecordWriter<T> {
    /// Creates (or truncates) the file at `path`.
    ///
    /// # Arguments
    /// * `path` - File to be written
    /// * `encoding` - File encoding
    /// * `buf_size` - Write buffer size
    pub fn create(path: &Path, encoding: Encoding, buf_size: Option<usize>) -> io::Result<Self> {
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        return Ok(RecordWriter {
            writer: Some(writer),
            encoding,
            line_buf: Vec::new(),
            written: 0,
            item_type: PhantomData,
        });
    }

    /// Writes a single record.
    pub fn write(&mut self, item: &T) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "record writer is already closed"))?;

        self.line_buf.clear();
        self.encoding.encode_into(&item.format_line(), &mut self.line_buf);
        self.encoding.encode_into("\n", &mut self.line_buf);
        writer.write_all(&self.line_buf)?;
        self.written += 1;

        return Ok(());
    }

    /// Writes all the records.
    pub fn write_all<'a>(&mut self, items: impl IntoIterator<Item = &'a T>) -> io::Result<()>
    where
        T: 'a,
    {
        for item in items.into_iter() {
            self.write(item)?;
        }

        return Ok(());
    }

    /// Number of records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes and closes the file. Returns the number of records written.
    pub fn finish(mut self) -> io::Result<u64> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        return Ok(self.written);
    }
}
