//! Repeat path parsing
//!
//! A repeat path names, from the document root down, the element whose
//! occurrences become documents: `artists/artist`.

use std::fmt;
use std::str::FromStr;

use crate::core::scanner::{is_name_char, is_name_start_char};
use crate::error::{IngestError, Result};

/// Absolute, slash-separated element path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatPath {
    segments: Vec<String>,
}

impl RepeatPath {
    /// Parse `root/.../element`. A single leading slash is accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let body = trimmed.strip_prefix('/').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(IngestError::Config("repeat path must name at least one element".to_string()));
        }

        let segments = body
            .split('/')
            .map(|segment| {
                let segment = segment.trim();
                if segment.is_empty() {
                    return Err(IngestError::Config(format!("repeat path '{raw}' has an empty segment")));
                }
                let bytes = segment.as_bytes();
                if !is_name_start_char(bytes[0]) || !bytes.iter().all(|&b| is_name_char(b)) {
                    return Err(IngestError::Config(format!(
                        "repeat path segment '{segment}' is not a valid element name"
                    )));
                }
                Ok(segment.to_string())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RepeatPath { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Name of the repeating element
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Whether the open element path is exactly this path
    pub fn matches(&self, open: &[String]) -> bool {
        self.segments.as_slice() == open
    }

    /// Collection used when none is configured: the parent of the
    /// repeating element, or the element itself for a one-segment path
    pub fn default_collection(&self) -> &str {
        match self.segments.len() {
            0 => "",
            1 => &self.segments[0],
            n => &self.segments[n - 2],
        }
    }
}

impl FromStr for RepeatPath {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        RepeatPath::parse(s)
    }
}

impl fmt::Display for RepeatPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
