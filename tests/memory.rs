use std::io::{self, Read};

use rustyxml_ingest::{DiscardSink, EventSource, IngestConfig, Importer, XmlEventReader};

/// Generates `<catalog><release>...</release>...</catalog>` on the fly
struct ReleaseFeed {
    remaining: usize,
    next_id: usize,
    pending: Vec<u8>,
    pos: usize,
    finished: bool,
    produced: u64,
}

impl ReleaseFeed {
    fn new(releases: usize) -> Self {
        ReleaseFeed {
            remaining: releases,
            next_id: 0,
            pending: b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<catalog>\n".to_vec(),
            pos: 0,
            finished: false,
            produced: 0,
        }
    }

    fn refill(&mut self) {
        self.pending.clear();
        self.pos = 0;
        if self.remaining == 0 {
            if !self.finished {
                self.pending.extend_from_slice(b"</catalog>\n");
                self.finished = true;
            }
            return;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.remaining -= 1;
        let release = format!(
            "<release id=\"{id}\" status=\"Accepted\"><title>Release number {id}</title>\
             <artists><artist><name>Artist {}</name><role/></artist></artists>\
             <genres><genre>Electronic</genre><genre>Jazz</genre></genres>\
             <notes>Pressed on 180g vinyl &amp; remastered.</notes></release>\n",
            id % 97
        );
        self.pending.extend_from_slice(release.as_bytes());
    }
}

impl Read for ReleaseFeed {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.pending.len() {
            self.refill();
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        self.produced += n as u64;
        Ok(n)
    }
}

#[cfg(feature = "memory_tracking")]
#[test]
fn peak_allocation_is_independent_of_input_size() {
    use rustyxml_ingest::memory;

    const RELEASES: usize = 100_000;
    const LIMIT: usize = 8 * 1024 * 1024;

    let importer = Importer::new(IngestConfig::new("catalog/release")).unwrap();
    let mut sink = DiscardSink::default();

    let (baseline, _) = memory::reset_peak();
    let stats = importer.run(ReleaseFeed::new(RELEASES), &mut sink).unwrap();
    let growth = memory::peak().saturating_sub(baseline);

    assert_eq!(stats.documents, RELEASES as u64);
    assert_eq!(sink.batches, 100);
    assert!(stats.bytes_read > 3 * LIMIT as u64, "feed too small: {} bytes", stats.bytes_read);
    assert!(
        growth < LIMIT,
        "peak heap growth {growth} bytes for {} input bytes",
        stats.bytes_read
    );
}

#[test]
fn reader_buffer_stays_at_initial_size() {
    let mut reader = XmlEventReader::with_capacity(ReleaseFeed::new(2_000), 4096);
    let mut events = 0u64;
    let mut largest = 0;
    while reader.next_event().unwrap().is_some() {
        events += 1;
        largest = largest.max(reader.buffer_capacity());
    }
    assert!(events > 2_000 * 10);
    assert_eq!(largest, 4096);
    assert!(reader.bytes_read() > 400_000);
}
