//! XML Reader Module
//!
//! Turns a byte stream into a forward-only sequence of [`ParseEvent`]s:
//! - BufferedReader: bounded byte window over any `Read`
//! - XmlEventReader: incremental, well-formedness checking event source
//! - Events: owned event types handed to the branch collector

pub mod buffered;
pub mod events;
pub mod stream;

pub use events::ParseEvent;
pub use stream::XmlEventReader;

use crate::error::Result;

/// Forward-only supplier of parse events
pub trait EventSource {
    /// Next event in document order; `None` marks the end of input
    fn next_event(&mut self) -> Result<Option<ParseEvent>>;

    /// Absolute byte offset of the read position
    fn offset(&self) -> u64;
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn next_event(&mut self) -> Result<Option<ParseEvent>> {
        (**self).next_event()
    }

    fn offset(&self) -> u64 {
        (**self).offset()
    }
}

/// Pre-built event lists, used to drive the collector without XML text
impl EventSource for std::vec::IntoIter<ParseEvent> {
    fn next_event(&mut self) -> Result<Option<ParseEvent>> {
        Ok(self.next())
    }

    fn offset(&self) -> u64 {
        0
    }
}
