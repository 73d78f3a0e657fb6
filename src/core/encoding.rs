//! XML Encoding Detection
//!
//! The streaming reader decodes UTF-8 only. Detection looks at the byte
//! order mark (or the UTF-16 `<` pattern) and at the encoding named in the
//! XML declaration so that other encodings fail up front instead of
//! producing garbled text.

/// Encoding inferred from the first bytes of the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    /// UTF-8 with a byte order mark (3 bytes to skip)
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

/// UTF-8 byte order mark
pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Bytes needed before [`XmlEncoding::detect`] can decide
pub const DETECT_LEN: usize = 3;

impl XmlEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.starts_with(UTF8_BOM) {
            return XmlEncoding::Utf8Bom;
        }
        match input {
            [0xFF, 0xFE, ..] | [b'<', 0x00, ..] => XmlEncoding::Utf16Le,
            [0xFE, 0xFF, ..] | [0x00, b'<', ..] => XmlEncoding::Utf16Be,
            _ => XmlEncoding::Utf8,
        }
    }

    /// Length of the byte order mark to skip
    pub fn bom_len(self) -> usize {
        match self {
            XmlEncoding::Utf8Bom => UTF8_BOM.len(),
            _ => 0,
        }
    }

    pub fn is_supported(self) -> bool {
        matches!(self, XmlEncoding::Utf8 | XmlEncoding::Utf8Bom)
    }

    pub fn name(self) -> &'static str {
        match self {
            XmlEncoding::Utf8 | XmlEncoding::Utf8Bom => "UTF-8",
            XmlEncoding::Utf16Le => "UTF-16LE",
            XmlEncoding::Utf16Be => "UTF-16BE",
        }
    }
}

/// Whether an encoding label from `<?xml encoding="..."?>` can be read as UTF-8
pub fn is_utf8_compatible(label: &str) -> bool {
    matches!(
        label.trim().to_ascii_lowercase().as_str(),
        "utf-8" | "utf8" | "us-ascii" | "ascii"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_utf8() {
        assert_eq!(XmlEncoding::detect(b"<root/>"), XmlEncoding::Utf8);
        assert_eq!(XmlEncoding::detect(b"<?xml"), XmlEncoding::Utf8);
        assert_eq!(XmlEncoding::detect(b""), XmlEncoding::Utf8);
    }

    #[test]
    fn test_detect_utf8_bom() {
        let encoding = XmlEncoding::detect(&[0xEF, 0xBB, 0xBF, b'<']);
        assert_eq!(encoding, XmlEncoding::Utf8Bom);
        assert_eq!(encoding.bom_len(), 3);
        assert!(encoding.is_supported());
    }

    #[test]
    fn test_detect_utf16() {
        assert_eq!(XmlEncoding::detect(&[0xFF, 0xFE, b'<', 0x00]), XmlEncoding::Utf16Le);
        assert_eq!(XmlEncoding::detect(&[0xFE, 0xFF, 0x00, b'<']), XmlEncoding::Utf16Be);
        assert_eq!(XmlEncoding::detect(&[b'<', 0x00, b'r', 0x00]), XmlEncoding::Utf16Le);
        assert!(!XmlEncoding::Utf16Le.is_supported());
    }

    #[test]
    fn test_declared_labels() {
        assert!(is_utf8_compatible("UTF-8"));
        assert!(is_utf8_compatible("us-ascii"));
        assert!(!is_utf8_compatible("ISO-8859-1"));
        assert!(!is_utf8_compatible("UTF-16"));
    }
}
