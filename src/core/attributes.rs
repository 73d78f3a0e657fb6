//! XML Attribute Parsing
//!
//! Parses the attribute list of a start tag. Parsing is strict: every
//! attribute needs `=` and a quoted value, and names may not repeat.

use super::entities::decode_text;
use super::scanner::{is_name_char, is_name_start_char, is_whitespace};
use memchr::memchr;
use std::borrow::Cow;

/// A parsed XML attribute
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    /// Attribute name (may include namespace prefix)
    pub name: &'a [u8],
    /// Attribute value (entities decoded)
    pub value: Cow<'a, [u8]>,
}

impl<'a> Attribute<'a> {
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(self.name).ok()
    }

    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(self.value.as_ref()).ok()
    }
}

/// Parse attributes from raw tag content (after the element name)
///
/// Input should be the content between element name and '>' or '/>'
pub fn parse_attributes(input: &[u8]) -> Result<Vec<Attribute<'_>>, &'static str> {
    let mut attrs: Vec<Attribute<'_>> = Vec::new();
    let mut pos = 0;

    loop {
        let before_ws = pos;
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() {
            break;
        }
        if !attrs.is_empty() && pos == before_ws {
            return Err("attributes must be separated by whitespace");
        }

        // Name
        if !is_name_start_char(input[pos]) {
            return Err("attribute name must start with a letter, underscore, or colon");
        }
        let name_start = pos;
        while pos < input.len() && is_name_char(input[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        // '='
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if input.get(pos) != Some(&b'=') {
            return Err("attribute value required");
        }
        pos += 1;
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }

        // Quoted value
        let quote = match input.get(pos) {
            Some(&q @ (b'"' | b'\'')) => q,
            _ => return Err("attribute value must be quoted"),
        };
        pos += 1;
        let close = match memchr(quote, &input[pos..]) {
            Some(offset) => pos + offset,
            None => return Err("attribute value has mismatched quotes"),
        };
        let raw = &input[pos..close];
        if memchr(b'<', raw).is_some() {
            return Err("attribute value cannot contain '<'");
        }
        pos = close + 1;

        if attrs.iter().any(|a| a.name == name) {
            return Err("duplicate attribute");
        }
        let value = decode_text(raw).map_err(|_| "invalid character reference in attribute value")?;
        attrs.push(Attribute { name, value });
    }

    Ok(attrs)
}
