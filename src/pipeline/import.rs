//! End-to-end import
//!
//! ```text
//! Read -> XmlEventReader -> BranchCollector -> StructureMapper -> Batcher -> Sink
//! ```
//!
//! Everything runs on the calling thread. Parsing pauses while a batch is
//! being written, and cancellation is honoured between documents.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::batcher::Batcher;
use super::sink::Sink;
use crate::branch::BranchCollector;
use crate::config::IngestConfig;
use crate::document::{Document, StructureMapper};
use crate::error::{IngestError, Result};
use crate::reader::{EventSource, XmlEventReader};

/// Cooperative stop signal shared between the importer and its caller
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one import run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportStats {
    pub database: String,
    pub collection: String,
    /// Repeating branches read from the input
    pub branches: u64,
    /// Documents accepted by the sink
    pub documents: u64,
    /// Branches that mapped to nothing
    pub skipped: u64,
    pub batches: u64,
    /// Input bytes consumed
    pub bytes_read: u64,
    pub elapsed_secs: f64,
    pub cancelled: bool,
}

/// Lazy, finite stream of mapped documents
pub struct Documents<S> {
    branches: BranchCollector<S>,
    mapper: StructureMapper,
    skipped: u64,
    done: bool,
}

impl<S: EventSource> Documents<S> {
    pub fn new(branches: BranchCollector<S>, mapper: StructureMapper) -> Self {
        Documents {
            branches,
            mapper,
            skipped: 0,
            done: false,
        }
    }

    /// Branches that produced no document
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn branches_completed(&self) -> u64 {
        self.branches.branches_completed()
    }

    pub fn offset(&self) -> u64 {
        self.branches.offset()
    }
}

impl<S: EventSource> Iterator for Documents<S> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let mapped = match self.branches.next()? {
                Ok(node) => self.mapper.map(node),
                Err(e) => Err(e),
            };
            match mapped {
                Ok(Some(doc)) => return Some(Ok(doc)),
                Ok(None) => self.skipped += 1,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<S: EventSource> std::iter::FusedIterator for Documents<S> {}

/// Runs imports with one validated configuration
pub struct Importer {
    config: IngestConfig,
    cancel: CancellationToken,
}

impl Importer {
    pub fn new(config: IngestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Importer {
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned stop signal
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Document stream over an event source, without a sink
    pub fn documents_from<S: EventSource>(&self, source: S) -> Result<Documents<S>> {
        let branches = BranchCollector::new(source, self.config.parsed_repeat_path()?)
            .with_ignore(self.config.ignore.iter().cloned());
        Ok(Documents::new(branches, StructureMapper::new(self.config.mapping.clone())))
    }

    /// Document stream over raw XML bytes
    pub fn documents<R: Read>(&self, reader: R) -> Result<Documents<XmlEventReader<R>>> {
        self.documents_from(XmlEventReader::with_capacity(reader, self.config.reader.buffer_size))
    }

    /// Import XML from a reader into `sink`
    pub fn run<R: Read, K: Sink + ?Sized>(&self, reader: R, sink: &mut K) -> Result<ImportStats> {
        self.run_source(XmlEventReader::with_capacity(reader, self.config.reader.buffer_size), sink)
    }

    /// Import the XML file at `path` into `sink`
    pub fn import_file<K: Sink + ?Sized>(&self, path: &Path, sink: &mut K) -> Result<ImportStats> {
        let file = File::open(path).map_err(|source| IngestError::Io { source, offset: 0 })?;
        self.run(file, sink)
    }

    /// Import from any event source into `sink`
    pub fn run_source<S: EventSource, K: Sink + ?Sized>(&self, source: S, sink: &mut K) -> Result<ImportStats> {
        let started = Instant::now();
        let config = &self.config;
        let collection = config.collection_name()?;

        info!(
            repeat_path = %config.repeat_path,
            database = %config.database,
            collection = %collection,
            batch_size = config.batch_size,
            "starting import"
        );
        if !config.array_fields.is_empty() {
            debug!(fields = ?config.array_fields, "array_fields ignored: every key is already an array");
        }

        sink.prepare(&collection).map_err(|source| IngestError::SinkWrite {
            batch: 0,
            first_document: 0,
            source,
        })?;

        let mut documents = self.documents_from(source)?;
        let mut batcher = Batcher::new(&mut *sink, collection.as_str(), config.batch_size);
        let mut produced: u64 = 0;
        let mut cancelled = false;

        loop {
            if self.cancel.is_cancelled() {
                cancelled = true;
                warn!(documents = produced, "import cancelled, flushing pending batch");
                break;
            }
            let Some(document) = documents.next() else {
                break;
            };
            batcher.add(document?)?;
            produced += 1;

            if config.progress_interval > 0 && produced % config.progress_interval == 0 {
                info!(
                    documents = produced,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "progress"
                );
            }
        }

        let summary = batcher.flush()?;
        sink.finish().map_err(|source| IngestError::SinkWrite {
            batch: summary.batches,
            first_document: summary.documents,
            source,
        })?;

        let stats = ImportStats {
            database: config.database.clone(),
            collection,
            branches: documents.branches_completed(),
            documents: summary.documents,
            skipped: documents.skipped(),
            batches: summary.batches,
            bytes_read: documents.offset(),
            elapsed_secs: started.elapsed().as_secs_f64(),
            cancelled,
        };
        info!(
            documents = stats.documents,
            batches = stats.batches,
            skipped = stats.skipped,
            elapsed_secs = stats.elapsed_secs,
            "import finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sink::MemorySink;
    use std::io::Cursor;

    fn items(n: usize) -> Vec<u8> {
        let mut xml = String::from("<items>");
        for i in 0..n {
            xml.push_str(&format!("<item><n>{i}</n></item>"));
        }
        xml.push_str("</items>");
        xml.into_bytes()
    }

    #[test]
    fn test_run_counts() {
        let importer = Importer::new(IngestConfig::new("items/item").with_batch_size(4)).unwrap();
        let mut sink = MemorySink::new();
        let stats = importer.run(Cursor::new(items(10)), &mut sink).unwrap();

        assert_eq!(stats.branches, 10);
        assert_eq!(stats.documents, 10);
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.collection, "items");
        assert_eq!(stats.bytes_read, items(10).len() as u64);
        assert!(!stats.cancelled);
        assert_eq!(sink.batch_sizes(), vec![4, 4, 2]);
    }

    #[test]
    fn test_empty_branches_are_skipped() {
        let importer = Importer::new(IngestConfig::new("r/i")).unwrap();
        let mut sink = MemorySink::new();
        let stats = importer
            .run(Cursor::new(b"<r><i/><i><x>1</x></i><i> </i></r>".to_vec()), &mut sink)
            .unwrap();
        assert_eq!(stats.branches, 3);
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.skipped, 2);
    }

    #[test]
    fn test_cancel_before_start_writes_nothing() {
        let importer = Importer::new(IngestConfig::new("items/item")).unwrap();
        importer.cancellation_token().cancel();
        let mut sink = MemorySink::new();
        let stats = importer.run(Cursor::new(items(5)), &mut sink).unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.documents, 0);
        assert!(sink.batches().is_empty());
    }

    #[test]
    fn test_documents_iterator_is_lazy() {
        let importer = Importer::new(IngestConfig::new("items/item")).unwrap();
        let mut docs = importer.documents(Cursor::new(items(3))).unwrap();
        assert!(docs.next().unwrap().is_ok());
        assert_eq!(docs.branches_completed(), 1);
        assert_eq!(docs.by_ref().count(), 2);
        assert!(docs.next().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            Importer::new(IngestConfig::new("")),
            Err(IngestError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let importer = Importer::new(IngestConfig::new("a/b")).unwrap();
        let err = importer
            .import_file(Path::new("/nonexistent/input.xml"), &mut MemorySink::new())
            .unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
