//! Fixed-size batching in front of a sink

use serde::Serialize;
use tracing::debug;

use super::sink::Sink;
use crate::document::Document;
use crate::error::{IngestError, Result};

/// Totals reported when a batcher is flushed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub batches: u64,
    pub documents: u64,
}

/// Groups documents into batches of `capacity` and sends each full group
///
/// Batch numbers and document numbers in errors count from 1.
pub struct Batcher<'s, K: Sink + ?Sized> {
    sink: &'s mut K,
    collection: String,
    capacity: usize,
    pending: Vec<Document>,
    summary: BatchSummary,
}

impl<'s, K: Sink + ?Sized> Batcher<'s, K> {
    pub fn new(sink: &'s mut K, collection: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Batcher {
            sink,
            collection: collection.into(),
            capacity,
            pending: Vec::with_capacity(capacity.min(1024)),
            summary: BatchSummary::default(),
        }
    }

    /// Queue a document; returns true when this filled and sent a batch
    pub fn add(&mut self, document: Document) -> Result<bool> {
        self.pending.push(document);
        if self.pending.len() < self.capacity {
            return Ok(false);
        }
        self.send()?;
        Ok(true)
    }

    /// Documents waiting for the next batch
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Totals of the batches sent so far
    pub fn summary(&self) -> BatchSummary {
        self.summary
    }

    /// Send the partial batch, if any, and return the totals
    pub fn flush(mut self) -> Result<BatchSummary> {
        if !self.pending.is_empty() {
            self.send()?;
        }
        Ok(self.summary)
    }

    fn send(&mut self) -> Result<()> {
        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.capacity.min(1024)));
        let size = batch.len() as u64;
        let number = self.summary.batches + 1;
        let first_document = self.summary.documents + 1;

        self.sink
            .insert_batch(&self.collection, batch)
            .map_err(|source| IngestError::SinkWrite {
                batch: number,
                first_document,
                source,
            })?;

        self.summary.batches = number;
        self.summary.documents += size;
        debug!(
            collection = %self.collection,
            batch = number,
            size,
            total = self.summary.documents,
            "batch written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sink::{DocumentFailure, MemorySink, SinkWriteError};

    fn doc(i: usize) -> Document {
        let mut doc = Document::new();
        doc.push("n", i.to_string());
        doc
    }

    #[test]
    fn test_full_and_partial_batches() {
        let mut sink = MemorySink::new();
        let mut batcher = Batcher::new(&mut sink, "things", 1000);
        let mut full = 0;
        for i in 0..2500 {
            if batcher.add(doc(i)).unwrap() {
                full += 1;
            }
        }
        assert_eq!(full, 2);
        assert_eq!(batcher.pending(), 500);
        let summary = batcher.flush().unwrap();

        assert_eq!(summary, BatchSummary { batches: 3, documents: 2500 });
        assert_eq!(sink.batch_sizes(), vec![1000, 1000, 500]);
        assert!(sink.batches().iter().all(|(c, _)| c == "things"));
    }

    #[test]
    fn test_empty_flush_makes_no_call() {
        let mut sink = MemorySink::new();
        let summary = Batcher::new(&mut sink, "things", 10).flush().unwrap();
        assert_eq!(summary.batches, 0);
        assert!(sink.batches().is_empty());
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_batch() {
        let mut sink = MemorySink::new();
        let mut batcher = Batcher::new(&mut sink, "things", 2);
        for i in 0..4 {
            batcher.add(doc(i)).unwrap();
        }
        batcher.flush().unwrap();
        assert_eq!(sink.batch_sizes(), vec![2, 2]);
    }

    struct RejectSecond {
        calls: u64,
    }

    impl Sink for RejectSecond {
        fn insert_batch(&mut self, collection: &str, batch: Vec<Document>) -> std::result::Result<(), SinkWriteError> {
            self.calls += 1;
            if self.calls == 2 {
                return Err(SinkWriteError::new(collection, "duplicate key").with_failures(vec![DocumentFailure {
                    index: batch.len() - 1,
                    reason: "duplicate key".to_string(),
                }]));
            }
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_identifies_batch() {
        let mut sink = RejectSecond { calls: 0 };
        let mut batcher = Batcher::new(&mut sink, "things", 3);
        let mut result = Ok(false);
        for i in 0..6 {
            result = batcher.add(doc(i));
            if result.is_err() {
                break;
            }
        }
        match result {
            Err(IngestError::SinkWrite {
                batch,
                first_document,
                source,
            }) => {
                assert_eq!(batch, 2);
                assert_eq!(first_document, 4);
                assert_eq!(source.failures[0].index, 2);
            }
            other => panic!("expected sink failure, got {:?}", other),
        }
    }
}
