//! RustyXML Ingest - stream very large XML files into array-wrapped documents
//!
//! Pipeline:
//! 1. `reader`: incremental event source over any `Read` (bounded buffer)
//! 2. `branch`: cuts the event stream into repeating branches
//! 3. `document`: maps each branch to a document where every key is an array
//! 4. `pipeline`: batches documents into a [`Sink`]
//!
//! ```no_run
//! use rustyxml_ingest::{IngestConfig, Importer, MemorySink};
//!
//! let importer = Importer::new(IngestConfig::new("artists/artist"))?;
//! let mut sink = MemorySink::new();
//! let stats = importer.import_file("artists.xml".as_ref(), &mut sink)?;
//! println!("{} documents", stats.documents);
//! # Ok::<(), rustyxml_ingest::IngestError>(())
//! ```
//!
//! Peak memory is one branch plus the read window plus one pending batch,
//! independent of the input size.

pub mod branch;
pub mod config;
pub mod core;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod reader;

pub use branch::{BranchCollector, BranchNode, RepeatPath};
pub use config::IngestConfig;
pub use document::{Document, MappingConfig, StructureMapper, Value};
pub use error::{IngestError, Result};
pub use pipeline::{
    BatchSummary, Batcher, CancellationToken, DirectorySink, DiscardSink, Documents, ImportStats, Importer,
    JsonLinesSink, MemorySink, Sink, SinkWriteError,
};
pub use reader::{EventSource, ParseEvent, XmlEventReader};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "memory_tracking")]
mod tracking {
    use std::alloc::{GlobalAlloc, Layout};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
    pub static PEAK_ALLOCATED: AtomicUsize = AtomicUsize::new(0);

    pub struct TrackingAllocator;

    #[cfg(feature = "mimalloc")]
    static UNDERLYING: mimalloc::MiMalloc = mimalloc::MiMalloc;

    #[cfg(not(feature = "mimalloc"))]
    static UNDERLYING: std::alloc::System = std::alloc::System;

    unsafe impl GlobalAlloc for TrackingAllocator {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            let ptr = UNDERLYING.alloc(layout);
            if !ptr.is_null() {
                let current = ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed) + layout.size();
                let mut peak = PEAK_ALLOCATED.load(Ordering::Relaxed);
                while current > peak {
                    match PEAK_ALLOCATED.compare_exchange_weak(
                        peak,
                        current,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => break,
                        Err(p) => peak = p,
                    }
                }
            }
            ptr
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
            UNDERLYING.dealloc(ptr, layout)
        }
    }
}

#[cfg(feature = "memory_tracking")]
#[global_allocator]
static GLOBAL: tracking::TrackingAllocator = tracking::TrackingAllocator;

#[cfg(all(feature = "mimalloc", not(feature = "memory_tracking")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Memory Tracking
// ============================================================================

/// Heap usage as seen by the tracking allocator
///
/// All functions return zero when the `memory_tracking` feature is off.
pub mod memory {
    #[cfg(feature = "memory_tracking")]
    use std::sync::atomic::Ordering;

    #[cfg(feature = "memory_tracking")]
    use super::tracking;

    /// Bytes currently allocated
    #[cfg(feature = "memory_tracking")]
    pub fn allocated() -> usize {
        tracking::ALLOCATED.load(Ordering::SeqCst)
    }

    /// Highest allocation level since start or the last reset
    #[cfg(feature = "memory_tracking")]
    pub fn peak() -> usize {
        tracking::PEAK_ALLOCATED.load(Ordering::SeqCst)
    }

    /// Restart peak tracking from the current level; returns (current, previous peak)
    #[cfg(feature = "memory_tracking")]
    pub fn reset_peak() -> (usize, usize) {
        let current = tracking::ALLOCATED.load(Ordering::SeqCst);
        let peak = tracking::PEAK_ALLOCATED.swap(current, Ordering::SeqCst);
        (current, peak)
    }

    #[cfg(not(feature = "memory_tracking"))]
    pub fn allocated() -> usize {
        0
    }

    #[cfg(not(feature = "memory_tracking"))]
    pub fn peak() -> usize {
        0
    }

    #[cfg(not(feature = "memory_tracking"))]
    pub fn reset_peak() -> (usize, usize) {
        (0, 0)
    }

    /// Whether the tracking allocator is installed
    pub fn is_tracking() -> bool {
        cfg!(feature = "memory_tracking")
    }
}
