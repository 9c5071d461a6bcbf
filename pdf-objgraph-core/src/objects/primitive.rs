use std::borrow::Borrow;
use std::cell::OnceCell;
use std::fmt;

/// Identity of an indirect object: `(object number, generation)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    object_number: u32,
    generation: u16,
}

impl Reference {
    pub fn new(object_number: u32, generation: u16) -> Self {
        Self {
            object_number,
            generation,
        }
    }

    pub fn object_number(&self) -> u32 {
        self.object_number
    }

    pub fn generation(&self) -> u16 {
        self.generation
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.object_number, self.generation)
    }
}

impl From<(u32, u16)> for Reference {
    fn from((object_number, generation): (u32, u16)) -> Self {
        Self::new(object_number, generation)
    }
}

/// A PDF name, stored unescaped (`/A#20B` is held as the bytes `A B`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Name(Vec<u8>);

impl Name {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode a name token body, resolving `#xx` escapes.
    ///
    /// A `#` not followed by two hex digits is kept verbatim.
    pub fn from_escaped(raw: &[u8]) -> Self {
        let mut out = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Some(hi), Some(lo)) = (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                    out.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            out.push(raw[i]);
            i += 1;
        }
        Self(out)
    }

    /// Encode for output: delimiters, whitespace, `#` and non-printable bytes become `#xx`.
    pub fn escaped(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len());
        for &b in &self.0 {
            let needs_escape = !(0x21..=0x7e).contains(&b)
                || matches!(
                    b,
                    b'#' | b'/' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'%'
                );
            if needs_escape {
                out.extend_from_slice(format!("#{b:02X}").as_bytes());
            } else {
                out.push(b);
            }
        }
        out
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<[u8]> for Name {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", String::from_utf8_lossy(&self.0))
    }
}

/// A PDF string. `hex` records whether it was (or should be) written as `<...>`.
#[derive(Clone, Default)]
pub struct PdfString {
    data: Vec<u8>,
    hex: bool,
    text: OnceCell<String>,
}

impl PdfString {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            hex: false,
            text: OnceCell::new(),
        }
    }

    pub fn new_hex(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            hex: true,
            text: OnceCell::new(),
        }
    }

    /// Build from hex digits (whitespace already removed, even length expected).
    pub fn from_hex_digits(digits: &[u8]) -> Self {
        let mut data = Vec::with_capacity(digits.len() / 2 + 1);
        for pair in digits.chunks(2) {
            let hi = hex_value(pair[0]).unwrap_or(0);
            let lo = pair.get(1).and_then(|&d| hex_value(d)).unwrap_or(0);
            data.push((hi << 4) | lo);
        }
        Self::new_hex(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn is_hex(&self) -> bool {
        self.hex
    }

    /// Whether `to_text` has already decoded this string.
    pub fn is_text_evaluated(&self) -> bool {
        self.text.get().is_some()
    }

    /// Text value: UTF-16BE with BOM, UTF-8 with BOM, otherwise PDFDocEncoding.
    pub fn to_text(&self) -> &str {
        self.text.get_or_init(|| decode_text_string(&self.data))
    }
}

impl PartialEq for PdfString {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.hex == other.hex
    }
}

impl fmt::Debug for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfString")
            .field("data", &String::from_utf8_lossy(&self.data))
            .field("hex", &self.hex)
            .finish()
    }
}

impl From<&str> for PdfString {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

pub(crate) fn hex_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

// PDFDocEncoding differs from Latin-1 in 0x18..=0x1F and 0x80..=0xA0.
const PDF_DOC_LOW: [char; 8] = [
    '\u{02D8}', '\u{02C7}', '\u{02C6}', '\u{02D9}', '\u{02DD}', '\u{02DB}', '\u{02DA}', '\u{02DC}',
];

const PDF_DOC_HIGH: [char; 33] = [
    '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}', '\u{2044}',
    '\u{2039}', '\u{203A}', '\u{2212}', '\u{2030}', '\u{201E}', '\u{201C}', '\u{201D}', '\u{2018}',
    '\u{2019}', '\u{201A}', '\u{2122}', '\u{FB01}', '\u{FB02}', '\u{0141}', '\u{0152}', '\u{0160}',
    '\u{0178}', '\u{017D}', '\u{0131}', '\u{0142}', '\u{0153}', '\u{0161}', '\u{017E}', '\u{FFFD}',
    '\u{20AC}',
];

fn decode_text_string(data: &[u8]) -> String {
    if data.len() >= 2 && data[0] == 0xFE && data[1] == 0xFF {
        let units: Vec<u16> = data[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if data.len() >= 3 && data[..3] == [0xEF, 0xBB, 0xBF] {
        return String::from_utf8_lossy(&data[3..]).into_owned();
    }
    data.iter()
        .map(|&b| match b {
            0x18..=0x1F => PDF_DOC_LOW[(b - 0x18) as usize],
            0x80..=0xA0 => PDF_DOC_HIGH[(b - 0x80) as usize],
            _ => b as char,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_display_and_order() {
        let a = Reference::new(1, 0);
        let b = Reference::new(1, 2);
        let c = Reference::new(2, 0);
        assert_eq!(a.to_string(), "1 0 R");
        assert!(a < b && b < c);
        assert_eq!(Reference::from((7, 3)).generation(), 3);
    }

    #[test]
    fn test_name_escape_decoding() {
        assert_eq!(Name::from_escaped(b"A#20B"), Name::from("A B"));
        assert_eq!(Name::from_escaped(b"Type"), Name::from("Type"));
        // Malformed escapes are kept verbatim
        assert_eq!(Name::from_escaped(b"A#G1"), Name::from("A#G1"));
        assert_eq!(Name::from_escaped(b"A#4"), Name::from("A#4"));
        assert_eq!(Name::from_escaped(b"#"), Name::from("#"));
    }

    #[test]
    fn test_name_escape_encoding() {
        assert_eq!(Name::from("A B").escaped(), b"A#20B".to_vec());
        assert_eq!(Name::from("a#b").escaped(), b"a#23b".to_vec());
        assert_eq!(Name::from("Plain").escaped(), b"Plain".to_vec());
        let roundtrip = Name::from_escaped(&Name::new(vec![0x00, b'/', 0xFF]).escaped());
        assert_eq!(roundtrip.as_bytes(), &[0x00, b'/', 0xFF]);
    }

    #[test]
    fn test_name_comparisons() {
        let name = Name::from("Type");
        assert!(name == "Type");
        assert_eq!(name.as_str(), Some("Type"));
        assert_eq!(name.to_string(), "/Type");
    }

    #[test]
    fn test_string_hex_digits() {
        let s = PdfString::from_hex_digits(b"48656C6C6F");
        assert_eq!(s.as_bytes(), b"Hello");
        assert!(s.is_hex());
        let padded = PdfString::from_hex_digits(b"4865");
        assert_eq!(padded.as_bytes(), b"He");
    }

    #[test]
    fn test_string_text_decoding() {
        let utf16 = PdfString::new(vec![0xFE, 0xFF, 0x00, b'H', 0x00, b'i']);
        assert!(!utf16.is_text_evaluated());
        assert_eq!(utf16.to_text(), "Hi");
        assert!(utf16.is_text_evaluated());

        let doc = PdfString::new(vec![b'a', 0x80, 0xA0]);
        assert_eq!(doc.to_text(), "a\u{2022}\u{20AC}");
    }

    #[test]
    fn test_string_equality_ignores_text_cache() {
        let a = PdfString::from("abc");
        let b = PdfString::from("abc");
        let _ = a.to_text();
        assert_eq!(a, b);
        assert_ne!(a, PdfString::new_hex(b"abc".to_vec()));
    }
}
