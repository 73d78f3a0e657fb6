//! Batching, sinks and the import driver

pub mod batcher;
pub mod import;
pub mod sink;

pub use batcher::{BatchSummary, Batcher};
pub use import::{CancellationToken, Documents, ImportStats, Importer};
pub use sink::{DirectorySink, DiscardSink, DocumentFailure, JsonLinesSink, MemorySink, Sink, SinkWriteError};
