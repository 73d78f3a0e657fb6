//! Batch destinations
//!
//! A [`Sink`] receives whole batches of documents for one collection. The
//! pipeline never retries: a failed batch ends the run, and batches accepted
//! before it stay written.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::document::Document;

/// A document the sink could not store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    /// Position within the batch
    pub index: usize,
    pub reason: String,
}

/// Rejection of a batch by a sink
#[derive(Debug, Error)]
#[error("insert into '{collection}' failed: {message}")]
pub struct SinkWriteError {
    pub collection: String,
    pub message: String,
    /// Per-document failures, empty when the batch failed as a whole
    pub failures: Vec<DocumentFailure>,
    #[source]
    pub source: Option<io::Error>,
}

impl SinkWriteError {
    pub fn new(collection: impl Into<String>, message: impl Into<String>) -> Self {
        SinkWriteError {
            collection: collection.into(),
            message: message.into(),
            failures: Vec::new(),
            source: None,
        }
    }

    pub fn io(collection: impl Into<String>, source: io::Error) -> Self {
        SinkWriteError {
            collection: collection.into(),
            message: source.to_string(),
            failures: Vec::new(),
            source: Some(source),
        }
    }

    pub fn with_failures(mut self, failures: Vec<DocumentFailure>) -> Self {
        self.failures = failures;
        self
    }
}

/// Destination for batches of documents
pub trait Sink {
    /// Store one batch in `collection`, in order
    fn insert_batch(&mut self, collection: &str, batch: Vec<Document>) -> Result<(), SinkWriteError>;

    /// Called once before the first batch; clears whatever the collection held
    fn prepare(&mut self, _collection: &str) -> Result<(), SinkWriteError> {
        Ok(())
    }

    /// Called once after the last batch
    fn finish(&mut self) -> Result<(), SinkWriteError> {
        Ok(())
    }
}

impl<K: Sink + ?Sized> Sink for &mut K {
    fn insert_batch(&mut self, collection: &str, batch: Vec<Document>) -> Result<(), SinkWriteError> {
        (**self).insert_batch(collection, batch)
    }

    fn prepare(&mut self, collection: &str) -> Result<(), SinkWriteError> {
        (**self).prepare(collection)
    }

    fn finish(&mut self) -> Result<(), SinkWriteError> {
        (**self).finish()
    }
}

impl<K: Sink + ?Sized> Sink for Box<K> {
    fn insert_batch(&mut self, collection: &str, batch: Vec<Document>) -> Result<(), SinkWriteError> {
        (**self).insert_batch(collection, batch)
    }

    fn prepare(&mut self, collection: &str) -> Result<(), SinkWriteError> {
        (**self).prepare(collection)
    }

    fn finish(&mut self) -> Result<(), SinkWriteError> {
        (**self).finish()
    }
}

/// Writes one JSON document per line to any writer
///
/// Output loads directly with `mongoimport --type json`.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    documents: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer, documents: 0 }
    }

    /// Documents written so far
    pub fn documents(&self) -> u64 {
        self.documents
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn insert_batch(&mut self, collection: &str, batch: Vec<Document>) -> Result<(), SinkWriteError> {
        let mut failures = Vec::new();
        let mut line = Vec::with_capacity(256);

        for (index, doc) in batch.iter().enumerate() {
            line.clear();
            if let Err(e) = doc.write_json(&mut line) {
                failures.push(DocumentFailure {
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
            line.push(b'\n');
            self.writer
                .write_all(&line)
                .map_err(|e| SinkWriteError::io(collection, e))?;
            self.documents += 1;
        }
        self.writer.flush().map_err(|e| SinkWriteError::io(collection, e))?;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SinkWriteError::new(
                collection,
                format!("{} of {} documents could not be encoded", failures.len(), batch.len()),
            )
            .with_failures(failures))
        }
    }

    fn finish(&mut self) -> Result<(), SinkWriteError> {
        self.writer.flush().map_err(|e| SinkWriteError::io("", e))
    }
}

/// One `<collection>.jsonl` file per collection under `<root>/<database>/`
pub struct DirectorySink {
    dir: PathBuf,
    files: HashMap<String, JsonLinesSink<BufWriter<File>>>,
}

impl DirectorySink {
    /// Create `<root>/<database>` if needed
    ///
    /// `database` must be a single directory name so the output stays
    /// under `root`.
    pub fn create(root: &Path, database: &str) -> io::Result<Self> {
        if !is_plain_name(database) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("database '{database}' is not a plain directory name"),
            ));
        }
        let dir = root.join(database);
        fs::create_dir_all(&dir)?;
        Ok(DirectorySink {
            dir,
            files: HashMap::new(),
        })
    }

    /// Path of the file backing `collection`
    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.jsonl"))
    }

    fn open(&mut self, collection: &str) -> Result<&mut JsonLinesSink<BufWriter<File>>, SinkWriteError> {
        if !self.files.contains_key(collection) {
            if !is_plain_name(collection) {
                return Err(SinkWriteError::new(collection, "collection is not a plain file name"));
            }
            let file = File::create(self.collection_path(collection))
                .map_err(|e| SinkWriteError::io(collection, e))?;
            self.files
                .insert(collection.to_string(), JsonLinesSink::new(BufWriter::new(file)));
        }
        self.files
            .get_mut(collection)
            .ok_or_else(|| SinkWriteError::new(collection, "collection file not open"))
    }
}

impl Sink for DirectorySink {
    fn prepare(&mut self, collection: &str) -> Result<(), SinkWriteError> {
        // File::create truncates
        self.files.remove(collection);
        self.open(collection).map(|_| ())
    }

    fn insert_batch(&mut self, collection: &str, batch: Vec<Document>) -> Result<(), SinkWriteError> {
        self.open(collection)?.insert_batch(collection, batch)
    }

    fn finish(&mut self) -> Result<(), SinkWriteError> {
        for (collection, sink) in &mut self.files {
            sink.finish().map_err(|e| SinkWriteError {
                collection: collection.clone(),
                ..e
            })?;
        }
        Ok(())
    }
}

/// `name` is one path component that is neither `.` nor `..`
pub(crate) fn is_plain_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if *part == *name
    )
}

/// Keeps every batch in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Vec<(String, Vec<Document>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[(String, Vec<Document>)] {
        &self.batches
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.iter().map(|(_, batch)| batch.len()).collect()
    }

    /// All documents in insertion order
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.batches.iter().flat_map(|(_, batch)| batch.iter())
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.batches.into_iter().flat_map(|(_, batch)| batch).collect()
    }
}

impl Sink for MemorySink {
    fn prepare(&mut self, collection: &str) -> Result<(), SinkWriteError> {
        self.batches.retain(|(name, _)| name != collection);
        Ok(())
    }

    fn insert_batch(&mut self, collection: &str, batch: Vec<Document>) -> Result<(), SinkWriteError> {
        self.batches.push((collection.to_string(), batch));
        Ok(())
    }
}

/// Counts and drops everything; used for dry runs
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink {
    pub batches: u64,
    pub documents: u64,
}

impl Sink for DiscardSink {
    fn insert_batch(&mut self, _collection: &str, batch: Vec<Document>) -> Result<(), SinkWriteError> {
        self.batches += 1;
        self.documents += batch.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> Document {
        let mut doc = Document::new();
        doc.push("name", name);
        doc
    }

    #[test]
    fn test_json_lines_output() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.insert_batch("things", vec![doc("Bob"), doc("Alice")]).unwrap();
        assert_eq!(sink.documents(), 2);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "{\"name\":[\"Bob\"]}\n{\"name\":[\"Alice\"]}\n");
    }

    #[test]
    fn test_json_lines_write_failure() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::StorageFull, "no space"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let err = JsonLinesSink::new(Full).insert_batch("things", vec![doc("x")]).unwrap_err();
        assert_eq!(err.collection, "things");
        assert!(err.source.is_some());
    }

    #[test]
    fn test_directory_sink_truncates_on_prepare() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("test").join("things.jsonl");

        let mut sink = DirectorySink::create(root.path(), "test").unwrap();
        sink.prepare("things").unwrap();
        sink.insert_batch("things", vec![doc("old"), doc("older")]).unwrap();
        sink.finish().unwrap();
        drop(sink);

        let mut sink = DirectorySink::create(root.path(), "test").unwrap();
        assert_eq!(sink.collection_path("things"), path);
        sink.prepare("things").unwrap();
        sink.insert_batch("things", vec![doc("new")]).unwrap();
        sink.finish().unwrap();
        drop(sink);

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"name\":[\"new\"]}\n");
    }

    #[test]
    fn test_directory_sink_stays_under_root() {
        let root = tempfile::tempdir().unwrap();
        for database in ["../escape", "/tmp/abs", "..", ".", "a/b", ""] {
            let err = DirectorySink::create(root.path(), database).err().unwrap();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{database}");
        }

        let mut sink = DirectorySink::create(root.path(), "test").unwrap();
        let err = sink.prepare("../outside").unwrap_err();
        assert_eq!(err.collection, "../outside");
        assert!(!root.path().join("outside.jsonl").exists());
    }

    #[test]
    fn test_plain_names() {
        assert!(is_plain_name("discogs"));
        assert!(is_plain_name("my.db"));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("a\\b"));
        assert!(!is_plain_name("/abs"));
    }

    #[test]
    fn test_memory_sink_prepare_clears_collection() {
        let mut sink = MemorySink::new();
        sink.insert_batch("a", vec![doc("1")]).unwrap();
        sink.insert_batch("b", vec![doc("2")]).unwrap();
        sink.prepare("a").unwrap();
        assert_eq!(sink.batches().len(), 1);
        assert_eq!(sink.batches()[0].0, "b");
    }
}
