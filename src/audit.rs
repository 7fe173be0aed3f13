//! Sorted file verification.

use std::io;
use std::path::Path;

use log;

use crate::encoding::Encoding;
use crate::record::LineRecord;
use crate::stream::LineReader;

/// First line breaking the sort order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// 1-based line number.
    pub line_number: u64,
    /// Previous record, [`None`] if the violating line is the first record.
    pub previous: Option<String>,
    /// Violating line as read from the file.
    pub current: String,
    /// Set if the violating line could not be parsed.
    pub malformed: bool,
}

/// Sorted file verification result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Number of lines checked, verification stops at the first violation.
    pub lines: u64,
    /// First sort order violation.
    pub violation: Option<Violation>,
    /// Set if two adjacent records have the same text.
    pub found_duplicate_text: bool,
    /// Number of lines of the original file, if it was checked as well.
    pub original_lines: Option<u64>,
}

impl AuditReport {
    pub fn is_sorted(&self) -> bool {
        self.violation.is_none()
    }

    /// Checks that the sorted file has as many lines as the original one.
    pub fn line_counts_match(&self) -> bool {
        self.original_lines.map_or(true, |original_lines| original_lines == self.lines)
    }

    /// Checks that the sorted file is ordered and complete.
    pub fn is_valid(&self) -> bool {
        self.is_sorted() && self.line_counts_match()
    }
}

/// Counts the lines of a file.
pub fn count_lines(path: &Path, encoding: Encoding) -> io::Result<u64> {
    let mut lines = LineReader::open(path, encoding, None)?;

    let mut count = 0;
    while lines.read_line()?.is_some() {
        count += 1;
    }

    return Ok(count);
}

/// Checks that a file is sorted in ascending order.
/// Blank lines are skipped, any other unparseable line is a violation.
///
/// # Arguments
/// * `path` - File to be checked
/// * `encoding` - File encoding
/// * `same_text` - Tells if two records have the same text
pub fn verify_sorted<T, F>(path: &Path, encoding: Encoding, same_text: F) -> io::Result<AuditReport>
where
    T: LineRecord,
    F: Fn(&T, &T) -> bool,
{
    let mut lines = LineReader::open(path, encoding, None)?;
    let mut report = AuditReport::default();
    let mut previous: Option<T> = None;

    while let Some(line) = lines.read_line()? {
        report.lines += 1;
        if line.trim().is_empty() {
            log::warn!("empty line {} skipped", report.lines);
            continue;
        }

        let current = match T::parse_line(&line) {
            Ok(current) => current,
            Err(err) => {
                log::error!("line {} can't be parsed: {}", report.lines, err);
                report.violation = Some(Violation {
                    line_number: report.lines,
                    previous: previous.as_ref().map(T::format_line),
                    current: line,
                    malformed: true,
                });
                break;
            }
        };

        if let Some(previous) = &previous {
            if current < *previous {
                log::error!("sort order violated at line {}", report.lines);
                report.violation = Some(Violation {
                    line_number: report.lines,
                    previous: Some(previous.format_line()),
                    current: line,
                    malformed: false,
                });
                break;
            }
            if same_text(previous, &current) {
                report.found_duplicate_text = true;
            }
        }
        previous = Some(current);
    }

    return Ok(report);
}

/// Checks that `sorted` is sorted in ascending order and has as many lines as `original`.
///
/// # Arguments
/// * `original` - File that was sorted
/// * `sorted` - Sorting result
/// * `encoding` - Files encoding
/// * `same_text` - Tells if two records have the same text
pub fn verify_against<T, F>(original: &Path, sorted: &Path, encoding: Encoding, same_text: F) -> io::Result<AuditReport>
where
    T: LineRecord,
    F: Fn(&T, &T) -> bool,
{
    let original_lines = count_lines(original, encoding)?;
    let mut report = verify_sorted(sorted, encoding, same_text)?;
    report.original_lines = Some(original_lines);

    if report.is_sorted() && !report.line_counts_match() {
        log::error!(
            "line count mismatch: original file has {} lines, sorted file has {}",
            original_lines,
            report.lines
        );
    }

    return Ok(report);
}
