//! Array-wrapped document model
//!
//! Every key maps to an array, even when the element occurred once, so all
//! documents produced from the same repeating element share one shape.
//!
//! Branches can nest arbitrarily deep, so dropping a [`Document`] and
//! writing it with [`Document::write_json`] walk the tree with an explicit
//! stack instead of recursing.

use std::io::{self, Write};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

type Entries = IndexMap<String, Vec<Value>>;

/// One entry of a key's array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Document(Document),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            Value::Document(_) => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            Value::Text(_) => None,
        }
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Document(doc)
    }
}

/// Insertion-ordered mapping from key to array of values
///
/// Equality ignores key order; use [`Document::keys`] to check ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Entries);

impl Document {
    pub fn new() -> Self {
        Document(IndexMap::new())
    }

    /// Append a value to the array under `key`, creating the key on first use
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn get(&self, key: &str) -> Option<&[Value]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Keys in first-insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Texts stored under `key`, skipping nested documents
    pub fn texts<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> {
        self.0
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(Value::as_text)
    }

    pub fn into_inner(mut self) -> IndexMap<String, Vec<Value>> {
        std::mem::take(&mut self.0)
    }

    /// Convert into a `serde_json::Value` for inspection or re-encoding
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Write compact JSON, byte-identical to `serde_json::to_writer`
    ///
    /// Stack usage does not depend on nesting depth.
    pub fn write_json<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b"{")?;
        let mut stack = vec![Level::new(self)];

        while let Some(level) = stack.last_mut() {
            if let Some(values) = level.values.as_mut() {
                match values.next() {
                    Some(value) => {
                        if !level.first_value {
                            writer.write_all(b",")?;
                        }
                        level.first_value = false;
                        match value {
                            Value::Text(text) => write_string(writer, text)?,
                            Value::Document(doc) => {
                                writer.write_all(b"{")?;
                                stack.push(Level::new(doc));
                            }
                        }
                    }
                    None => {
                        writer.write_all(b"]")?;
                        level.values = None;
                    }
                }
                continue;
            }

            match level.entries.next() {
                Some((key, values)) => {
                    if !level.first_entry {
                        writer.write_all(b",")?;
                    }
                    level.first_entry = false;
                    write_string(writer, key)?;
                    writer.write_all(b":[")?;
                    level.values = Some(values.iter());
                    level.first_value = true;
                }
                None => {
                    writer.write_all(b"}")?;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_nested(&mut self.0, &mut pending);
        while let Some(mut entries) = pending.pop() {
            detach_nested(&mut entries, &mut pending);
        }
    }
}

/// Move nested documents' entries out of `entries` so they drop one level at a time
fn detach_nested(entries: &mut Entries, pending: &mut Vec<Entries>) {
    for (_, values) in entries.drain(..) {
        for value in values {
            if let Value::Document(mut doc) = value {
                if !doc.0.is_empty() {
                    pending.push(std::mem::take(&mut doc.0));
                }
            }
        }
    }
}

/// One open object in [`Document::write_json`]
struct Level<'a> {
    entries: indexmap::map::Iter<'a, String, Vec<Value>>,
    values: Option<std::slice::Iter<'a, Value>>,
    first_entry: bool,
    first_value: bool,
}

impl<'a> Level<'a> {
    fn new(doc: &'a Document) -> Self {
        Level {
            entries: doc.0.iter(),
            values: None,
            first_entry: true,
            first_value: true,
        }
    }
}

fn write_string<W: Write + ?Sized>(writer: &mut W, text: &str) -> io::Result<()> {
    serde_json::to_writer(writer, text).map_err(io::Error::from)
}
