//! Text encodings used to read input lines and write output lines.

use std::borrow::Cow;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// Supported text encodings.
///
/// Undecodable input bytes and unencodable output characters are replaced rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Ascii,
    Latin1,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

const ASCII_REPLACEMENT: u8 = b'?';

/// Byte order marks, longest first: the UTF-32LE mark starts with the UTF-16LE one.
const BYTE_ORDER_MARKS: [(&[u8], Encoding); 5] = [
    (&[0xFF, 0xFE, 0x00, 0x00], Encoding::Utf32Le),
    (&[0x00, 0x00, 0xFE, 0xFF], Encoding::Utf32Be),
    (&[0xEF, 0xBB, 0xBF], Encoding::Utf8),
    (&[0xFF, 0xFE], Encoding::Utf16Le),
    (&[0xFE, 0xFF], Encoding::Utf16Be),
];

impl Encoding {
    /// Canonical encoding name.
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Ascii => "us-ascii",
            Encoding::Latin1 => "iso-8859-1",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
            Encoding::Utf32Le => "utf-32le",
            Encoding::Utf32Be => "utf-32be",
        }
    }

    /// Size of a code unit in bytes.
    pub fn unit_size(&self) -> usize {
        match self {
            Encoding::Utf8 | Encoding::Ascii | Encoding::Latin1 => 1,
            Encoding::Utf16Le | Encoding::Utf16Be => 2,
            Encoding::Utf32Le | Encoding::Utf32Be => 4,
        }
    }

    /// Detects a byte order mark at the beginning of `bytes`.
    /// Returns the encoding it denotes and the mark length.
    pub fn detect_bom(bytes: &[u8]) -> Option<(Encoding, usize)> {
        BYTE_ORDER_MARKS
            .iter()
            .find(|(bom, _)| bytes.starts_with(bom))
            .map(|(bom, encoding)| (*encoding, bom.len()))
    }

    /// Number of bytes `text` occupies once encoded.
    pub fn byte_count(&self, text: &str) -> usize {
        match self {
            Encoding::Utf8 => text.len(),
            Encoding::Ascii | Encoding::Latin1 => text.chars().count(),
            Encoding::Utf16Le | Encoding::Utf16Be => text.encode_utf16().count() * 2,
            Encoding::Utf32Le | Encoding::Utf32Be => text.chars().count() * 4,
        }
    }

    /// Decodes raw line bytes.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes),
            Encoding::Ascii => {
                if bytes.is_ascii() {
                    // ascii bytes are valid utf-8
                    String::from_utf8_lossy(bytes)
                } else {
                    Cow::Owned(
                        bytes
                            .iter()
                            .map(|&b| if b.is_ascii() { b as char } else { ASCII_REPLACEMENT as char })
                            .collect(),
                    )
                }
            }
            Encoding::Latin1 => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
            Encoding::Utf16Le | Encoding::Utf16Be => {
                let units = bytes.chunks_exact(2).map(|unit| {
                    let unit = [unit[0], unit[1]];
                    match self {
                        Encoding::Utf16Le => u16::from_le_bytes(unit),
                        _ => u16::from_be_bytes(unit),
                    }
                });
                let mut text: String = char::decode_utf16(units)
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect();
                if bytes.len() % 2 != 0 {
                    text.push(char::REPLACEMENT_CHARACTER);
                }
                Cow::Owned(text)
            }
            Encoding::Utf32Le | Encoding::Utf32Be => {
                let mut text: String = bytes
                    .chunks_exact(4)
                    .map(|unit| {
                        let unit = [unit[0], unit[1], unit[2], unit[3]];
                        let code = match self {
                            Encoding::Utf32Le => u32::from_le_bytes(unit),
                            _ => u32::from_be_bytes(unit),
                        };
                        char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
                    })
                    .collect();
                if bytes.len() % 4 != 0 {
                    text.push(char::REPLACEMENT_CHARACTER);
                }
                Cow::Owned(text)
            }
        }
    }

    /// Appends encoded `text` to `out`.
    pub fn encode_into(&self, text: &str, out: &mut Vec<u8>) {
        match self {
            Encoding::Utf8 => out.extend_from_slice(text.as_bytes()),
            Encoding::Ascii => out.extend(
                text.chars()
                    .map(|c| if c.is_ascii() { c as u8 } else { ASCII_REPLACEMENT }),
            ),
            Encoding::Latin1 => out.extend(
                text.chars()
                    .map(|c| u8::try_from(u32::from(c)).unwrap_or(ASCII_REPLACEMENT)),
            ),
            Encoding::Utf16Le => text.encode_utf16().for_each(|unit| out.extend(unit.to_le_bytes())),
            Encoding::Utf16Be => text.encode_utf16().for_each(|unit| out.extend(unit.to_be_bytes())),
            Encoding::Utf32Le => text.chars().for_each(|c| out.extend(u32::from(c).to_le_bytes())),
            Encoding::Utf32Be => text.chars().for_each(|c| out.extend(u32::from(c).to_be_bytes())),
        }
    }

    /// Encoded form of a single ascii character, one code unit long.
    pub(crate) fn encode_ascii(&self, c: char) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.unit_size());
        self.encode_into(c.encode_utf8(&mut [0; 4]), &mut out);
        return out;
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Utf8
    }
}

impl Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "ascii" | "us-ascii" => Ok(Encoding::Ascii),
            "latin1" | "iso-8859-1" => Ok(Encoding::Latin1),
            "utf16" | "utf-16" | "unicode" | "utf-16le" => Ok(Encoding::Utf16Le),
            "utf-16be" | "bigendianunicode" => Ok(Encoding::Utf16Be),
            "utf32" | "utf-32" | "utf-32le" => Ok(Encoding::Utf32Le),
            "utf-32be" => Ok(Encoding::Utf32Be),
            other => Err(format!("unsupported encoding: {}", other)),
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::Encoding;

    #[rstest]
    #[case("utf8", Encoding::Utf8)]
    #[case("UTF-8", Encoding::Utf8)]
    #[case("ascii", Encoding::Ascii)]
    #[case("us-ascii", Encoding::Ascii)]
    #[case("Latin1", Encoding::Latin1)]
    #[case("iso-8859-1", Encoding::Latin1)]
    #[case("utf16", Encoding::Utf16Le)]
    #[case("Unicode", Encoding::Utf16Le)]
    #[case("utf-16be", Encoding::Utf16Be)]
    #[case("utf32", Encoding::Utf32Le)]
    #[case("utf-32be", Encoding::Utf32Be)]
    fn test_from_str(#[case] name: &str, #[case] expected: Encoding) {
        assert_eq!(name.parse::<Encoding>().unwrap(), expected);
    }

    #[test]
    fn test_from_str_unsupported() {
        assert!("ebcdic".parse::<Encoding>().is_err());
    }

    #[rstest]
    #[case(Encoding::Utf8, "1. héllo", 9)]
    #[case(Encoding::Latin1, "1. héllo", 8)]
    #[case(Encoding::Ascii, "1. hello", 8)]
    #[case(Encoding::Utf16Le, "1. héllo", 16)]
    #[case(Encoding::Utf16Be, "1. 𝄞", 10)]
    #[case(Encoding::Utf32Le, "1. héllo", 32)]
    fn test_byte_count(#[case] encoding: Encoding, #[case] text: &str, #[case] expected: usize) {
        assert_eq!(encoding.byte_count(text), expected);
    }

    #[test]
    fn test_latin1() {
        let mut encoded = Vec::new();
        Encoding::Latin1.encode_into("1. héllo €", &mut encoded);
        assert_eq!(encoded, b"1. h\xe9llo ?".to_vec());
        assert_eq!(Encoding::Latin1.decode(b"1. h\xe9llo"), "1. héllo");
    }

    #[test]
    fn test_ascii_replacement() {
        let mut encoded = Vec::new();
        Encoding::Ascii.encode_into("é1", &mut encoded);
        assert_eq!(encoded, b"?1".to_vec());
        assert_eq!(Encoding::Ascii.decode(b"a\xffb"), "a?b");
    }

    #[rstest]
    #[case(Encoding::Utf16Le)]
    #[case(Encoding::Utf16Be)]
    #[case(Encoding::Utf32Le)]
    #[case(Encoding::Utf32Be)]
    fn test_wide_encodings(#[case] encoding: Encoding) {
        let mut encoded = Vec::new();
        encoding.encode_into("7. Ünïcödé 𝄞", &mut encoded);

        assert_eq!(encoded.len(), encoding.byte_count("7. Ünïcödé 𝄞"));
        assert_eq!(encoding.decode(&encoded), "7. Ünïcödé 𝄞");
        assert_eq!(encoding.encode_ascii('\n').len(), encoding.unit_size());
    }

    #[test]
    fn test_utf16_byte_order() {
        let mut encoded = Vec::new();
        Encoding::Utf16Be.encode_into("1\n", &mut encoded);
        assert_eq!(encoded, vec![0x00, b'1', 0x00, b'\n']);

        assert_eq!(Encoding::Utf16Le.decode(&[b'a', 0x00, 0x00, 0xD8]), "a\u{FFFD}");
        assert_eq!(Encoding::Utf16Le.decode(&[b'a', 0x00, b'b']), "a\u{FFFD}");
    }

    #[rstest]
    #[case(&[0xEF, 0xBB, 0xBF, b'1'], Some((Encoding::Utf8, 3)))]
    #[case(&[0xFF, 0xFE, b'1', 0x00], Some((Encoding::Utf16Le, 2)))]
    #[case(&[0xFE, 0xFF, 0x00, b'1'], Some((Encoding::Utf16Be, 2)))]
    #[case(&[0xFF, 0xFE, 0x00, 0x00], Some((Encoding::Utf32Le, 4)))]
    #[case(&[0x00, 0x00, 0xFE, 0xFF], Some((Encoding::Utf32Be, 4)))]
    #[case(b"1. apple", None)]
    #[case(&[0xEF, 0xBB], None)]
    fn test_detect_bom(#[case] bytes: &[u8], #[case] expected: Option<(Encoding, usize)>) {
        assert_eq!(Encoding::detect_bom(bytes), expected);
    }
}
