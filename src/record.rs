//! Line record model.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::num::ParseIntError;

/// Capabilities a value needs to be sorted by [`crate::ExternalSorter`]: it is parsed from one line of text,
/// formatted back to one line and totally ordered.
pub trait LineRecord: Ord + Send + Sized {
    /// Parses a record from a single line (without the line terminator).
    fn parse_line(line: &str) -> Result<Self, ParseError>;

    /// Formats the record as a single line (without the line terminator).
    fn format_line(&self) -> String;
}

/// Reason a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The line is empty.
    Empty,
    /// The line has no `.` separator.
    MissingSeparator,
    /// Nothing follows the `.` separator.
    MissingText,
    /// The part before the separator is not a signed integer.
    InvalidNumber(ParseIntError),
}

/// Line parsing error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    line: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, line: &str) -> Self {
        ParseError {
            kind,
            line: line.to_string(),
        }
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Offending line.
    pub fn line(&self) -> &str {
        &self.line
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            ParseErrorKind::InvalidNumber(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::Empty => write!(f, "malformed line: line is empty"),
            ParseErrorKind::MissingSeparator => write!(f, "malformed line: no separator: {:?}", self.line),
            ParseErrorKind::MissingText => write!(f, "malformed line: no text after separator: {:?}", self.line),
            ParseErrorKind::InvalidNumber(err) => {
                write!(f, "malformed line: invalid number part ({}): {:?}", err, self.line)
            }
        }
    }
}

/// A `<number>. <text>` line.
///
/// Records are ordered by text first (byte-wise) and by number when texts are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedLine {
    pub number: i64,
    pub text: String,
}

impl ParsedLine {
    pub fn new(number: i64, text: impl Into<String>) -> Self {
        ParsedLine {
            number,
            text: text.into(),
        }
    }
}

impl PartialOrd for ParsedLine {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParsedLine {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text
            .as_bytes()
            .cmp(other.text.as_bytes())
            .then(self.number.cmp(&other.number))
    }
}

impl Display for ParsedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.number, self.text)
    }
}

impl LineRecord for ParsedLine {
    /// Parses `<integer><ws>.<ws><text>`. The first `.` is the separator, both parts are trimmed.
    fn parse_line(line: &str) -> Result<Self, ParseError> {
        if line.is_empty() {
            return Err(ParseError::new(ParseErrorKind::Empty, line));
        }

        let dot_idx = line
            .find('.')
            .ok_or_else(|| ParseError::new(ParseErrorKind::MissingSeparator, line))?;
        if dot_idx + 1 >= line.len() {
            return Err(ParseError::new(ParseErrorKind::MissingText, line));
        }

        let number_part = line[..dot_idx].trim();
        let text_part = line[dot_idx + 1..].trim();

        let number = number_part
            .parse::<i64>()
            .map_err(|err| ParseError::new(ParseErrorKind::InvalidNumber(err), line))?;

        return Ok(ParsedLine::new(number, text_part));
    }

    fn format_line(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;

    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{LineRecord, ParseErrorKind, ParsedLine};

    #[rstest]
    #[case("1. apple", 1, "apple")]
    #[case("415. Apple", 415, "Apple")]
    #[case("  -7  .   spaced out  ", -7, "spaced out")]
    #[case("+12.no space", 12, "no space")]
    #[case("3. dots. in. text", 3, "dots. in. text")]
    #[case("0.    ", 0, "")]
    fn test_parse_valid(#[case] line: &str, #[case] number: i64, #[case] text: &str) {
        let parsed = ParsedLine::parse_line(line).unwrap();
        assert_eq!(parsed, ParsedLine::new(number, text));
    }

    #[rstest]
    #[case("")]
    #[case("banana")]
    #[case("12.")]
    #[case("abc. text")]
    #[case(". text")]
    #[case("1 2. text")]
    #[case("99999999999999999999. overflow")]
    fn test_parse_malformed(#[case] line: &str) {
        let err = ParsedLine::parse_line(line).unwrap_err();
        assert_eq!(err.line(), line);
    }

    #[test]
    fn test_parse_error_kinds() {
        assert_eq!(ParsedLine::parse_line("").unwrap_err().kind(), &ParseErrorKind::Empty);
        assert_eq!(
            ParsedLine::parse_line("banana").unwrap_err().kind(),
            &ParseErrorKind::MissingSeparator
        );
        assert_eq!(
            ParsedLine::parse_line("5.").unwrap_err().kind(),
            &ParseErrorKind::MissingText
        );
        assert!(matches!(
            ParsedLine::parse_line("x. y").unwrap_err().kind(),
            ParseErrorKind::InvalidNumber(_)
        ));
    }

    #[rstest]
    #[case(ParsedLine::new(1, "Apple"))]
    #[case(ParsedLine::new(-42, "Something something"))]
    #[case(ParsedLine::new(i64::MAX, "a.b.c"))]
    #[case(ParsedLine::new(i64::MIN, "Ünïcödé"))]
    fn test_format_parse(#[case] record: ParsedLine) {
        let line = record.format_line();
        assert_eq!(ParsedLine::parse_line(&line).unwrap(), record);
    }

    #[test]
    fn test_format() {
        assert_eq!(ParsedLine::new(30432, "Something something").format_line(), "30432. Something something");
    }

    #[rstest]
    #[case((1, "Apple"), (1, "Apple"), Ordering::Equal)]
    #[case((1, "Apple"), (1, "Banana"), Ordering::Less)]
    #[case((1, "Banana"), (1, "Apple"), Ordering::Greater)]
    #[case((1, "Apple"), (2, "Apple"), Ordering::Less)]
    #[case((2, "Apple"), (1, "Apple"), Ordering::Greater)]
    #[case((10, "Cherry"), (2, "Cherry"), Ordering::Greater)]
    #[case((1, "banana"), (2, "Banana"), Ordering::Greater)]
    #[case((100, "Apple"), (1, "Banana"), Ordering::Less)]
    fn test_ordering(#[case] a: (i64, &str), #[case] b: (i64, &str), #[case] expected: Ordering) {
        let a = ParsedLine::new(a.0, a.1);
        let b = ParsedLine::new(b.0, b.1);
        assert_eq!(a.cmp(&b), expected);
        assert_eq!(b.cmp(&a), expected.reverse());
        assert_eq!(a == b, expected == Ordering::Equal);
    }

    #[test]
    fn test_ordering_is_text_first() {
        let mut lines = vec![
            ParsedLine::new(3, "banana"),
            ParsedLine::new(1, "apple"),
            ParsedLine::new(2, "apple"),
            ParsedLine::new(-5, "cherry"),
            ParsedLine::new(0, "apple"),
        ];
        lines.shuffle(&mut rand::thread_rng());
        lines.sort();

        assert_eq!(
            lines,
            vec![
                ParsedLine::new(0, "apple"),
                ParsedLine::new(1, "apple"),
                ParsedLine::new(2, "apple"),
                ParsedLine::new(3, "banana"),
                ParsedLine::new(-5, "cherry"),
            ]
        );
    }
}
