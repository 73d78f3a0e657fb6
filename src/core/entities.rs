//! XML Entity Decoding
//!
//! Handles decoding of XML entities:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! Unknown named entities (declared in a DTD we do not expand) are kept
//! verbatim. A character reference that does not denote a legal XML
//! character is an error. Uses Cow for zero-copy when no entities are
//! present.

use memchr::{memchr, memrchr};
use std::borrow::Cow;

/// Longest entity reference we will wait for when cutting a text chunk
const MAX_ENTITY_LEN: usize = 32;

/// A `&#...;` reference that is not a legal XML character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCharRef {
    /// Offset of the `&` within the decoded input
    pub position: usize,
}

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded.
#[inline]
pub fn decode_text(input: &[u8]) -> Result<Cow<'_, [u8]>, InvalidCharRef> {
    if memchr(b'&', input).is_none() {
        return Ok(Cow::Borrowed(input));
    }
    decode_entities(input).map(Cow::Owned)
}

/// Decode all entity references in the input
pub fn decode_entities(input: &[u8]) -> Result<Vec<u8>, InvalidCharRef> {
    let mut result = Vec::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = memchr(b'&', rest) {
        result.extend_from_slice(&rest[..amp]);
        let position = input.len() - rest.len() + amp;
        rest = &rest[amp..];

        let decoded = match memchr(b';', rest) {
            Some(semi) => match decode_entity(&rest[1..semi]) {
                Entity::Char(ch) => Some((ch, semi + 1)),
                Entity::Unknown => None,
                Entity::Invalid => return Err(InvalidCharRef { position }),
            },
            None => None,
        };

        match decoded {
            Some((ch, consumed)) => {
                let mut utf8 = [0u8; 4];
                result.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
                rest = &rest[consumed..];
            }
            None => {
                result.push(b'&');
                rest = &rest[1..];
            }
        }
    }
    result.extend_from_slice(rest);
    Ok(result)
}

enum Entity {
    Char(char),
    /// Named entity we do not know; kept verbatim
    Unknown,
    /// Character reference outside the XML Char production
    Invalid,
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &[u8]) -> Entity {
    let codepoint = match entity {
        b"lt" => return Entity::Char('<'),
        b"gt" => return Entity::Char('>'),
        b"amp" => return Entity::Char('&'),
        b"quot" => return Entity::Char('"'),
        b"apos" => return Entity::Char('\''),
        [b'#', b'x' | b'X', hex @ ..] => parse_codepoint(hex, 16),
        [b'#', dec @ ..] => parse_codepoint(dec, 10),
        _ => return Entity::Unknown,
    };
    codepoint.map_or(Entity::Invalid, Entity::Char)
}

fn parse_codepoint(digits: &[u8], radix: u32) -> Option<char> {
    if digits.is_empty() || !digits.iter().all(|&b| char::from(b).is_digit(radix)) {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    let codepoint = u32::from_str_radix(text, radix).ok()?;
    if !is_valid_xml_char(codepoint) {
        return None;
    }
    char::from_u32(codepoint)
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

/// Largest prefix length of `text` that can be decoded on its own.
///
/// The cut never falls inside an entity reference that may still be
/// completed by the next read, nor inside a multi-byte UTF-8 sequence.
pub fn split_point(text: &[u8]) -> usize {
    let mut end = text.len();

    if let Some(amp) = memrchr(b'&', text) {
        let terminated = memchr(b';', &text[amp..]).is_some();
        if !terminated && text.len() - amp < MAX_ENTITY_LEN {
            end = amp;
        }
    }

    // Step back over continuation bytes to the start of the last character,
    // then keep that character only if all of its bytes are present.
    let mut start = end;
    while start > 0 && (text[start - 1] & 0xC0) == 0x80 && end - start < 3 {
        start -= 1;
    }
    if start > 0 {
        let lead = text[start - 1];
        let width = match lead {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        if end - (start - 1) < width {
            return start - 1;
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_entities() {
        let result = decode_text(b"Hello, World!").unwrap();
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result.as_ref(), b"Hello, World!");
    }

    #[test]
    fn test_basic_entities() {
        let result = decode_text(b"&lt;hello&gt; &amp; &quot;world&quot; &apos;").unwrap();
        assert_eq!(result.as_ref(), b"<hello> & \"world\" '");
    }

    #[test]
    fn test_numeric_references() {
        assert_eq!(decode_text(b"&#65;&#66;&#67;").unwrap().as_ref(), b"ABC");
        assert_eq!(decode_text(b"&#x41;&#X42;&#x43;").unwrap().as_ref(), b"ABC");
    }

    #[test]
    fn test_unicode_entity() {
        let result = decode_text(b"&#x1F600;").unwrap();
        assert_eq!(std::str::from_utf8(result.as_ref()).unwrap(), "😀");
    }

    #[test]
    fn test_unknown_entities_kept() {
        assert_eq!(decode_text(b"&unknown;").unwrap().as_ref(), b"&unknown;");
        assert_eq!(decode_text(b"fish & chips").unwrap().as_ref(), b"fish & chips");
    }

    #[test]
    fn test_invalid_character_references_rejected() {
        assert_eq!(decode_text(b"ab&#x110000;"), Err(InvalidCharRef { position: 2 }));
        assert_eq!(decode_text(b"&#0;"), Err(InvalidCharRef { position: 0 }));
        assert_eq!(decode_text(b"ok &amp; &#xD800;"), Err(InvalidCharRef { position: 9 }));
        assert_eq!(decode_text(b"&#12a;"), Err(InvalidCharRef { position: 0 }));
        assert!(decode_text(b"&#;").is_err());
    }

    #[test]
    fn test_split_point_avoids_open_entity() {
        assert_eq!(split_point(b"Tom &am"), 4);
        assert_eq!(split_point(b"Tom &amp; Jerry"), 15);
    }

    #[test]
    fn test_split_point_avoids_partial_utf8() {
        let text = "caf\u{e9}".as_bytes();
        assert_eq!(split_point(text), text.len());
        assert_eq!(split_point(&text[..text.len() - 1]), 3);

        let emoji = "a\u{1F600}".as_bytes();
        assert_eq!(split_point(&emoji[..3]), 1);
    }
}
