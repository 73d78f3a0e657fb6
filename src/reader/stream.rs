//! Streaming event reader
//!
//! Pulls bytes from any `Read` into a bounded window, tokenizes one token at
//! a time and hands out owned [`ParseEvent`]s. Only the open element path and
//! the bytes of the token under construction are held in memory.
//!
//! Well-formedness is checked as the events go by: tags must nest, there is
//! exactly one root element, and nothing but whitespace, comments and
//! processing instructions may surround it.

use std::io::Read;

use super::buffered::{BufferedReader, DEFAULT_BUFFER_SIZE};
use super::events::ParseEvent;
use super::EventSource;
use crate::core::attributes::parse_attributes;
use crate::core::encoding::{is_utf8_compatible, XmlEncoding, DETECT_LEN};
use crate::core::entities::decode_text;
use crate::core::scanner::is_whitespace;
use crate::core::tokenizer::{ParseError, Scan, Token, TokenKind, Tokenizer};
use crate::error::{IngestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing read yet; encoding not detected
    Start,
    /// Before the root element
    Prolog,
    /// Inside the root element
    Content,
    /// After the root element closed
    Epilog,
    /// End of input reached or an error was reported
    Done,
}

/// A token copied out of the window
enum Translated {
    Start {
        name: String,
        attributes: Vec<(String, String)>,
        empty: bool,
    },
    End { name: String },
    Text(String),
    Declaration { encoding: Option<String> },
    Skip,
}

enum Step {
    Token(Translated, (usize, usize)),
    More,
    End,
}

/// Incremental XML event source over a byte stream
pub struct XmlEventReader<R: Read> {
    input: BufferedReader<R>,
    /// Names of the currently open elements, root first
    open: Vec<String>,
    /// End event owed for an empty-element tag
    pending_end: Option<String>,
    /// Absolute offset of the first unconsumed byte
    offset: u64,
    chunk_limit: usize,
    phase: Phase,
    tokens_seen: u64,
}

impl<R: Read> XmlEventReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_BUFFER_SIZE)
    }

    /// Reader whose window starts at `capacity` bytes; text runs longer than
    /// the window are delivered in several chunks
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        let capacity = capacity.max(64);
        XmlEventReader {
            input: BufferedReader::with_capacity(reader, capacity),
            open: Vec::new(),
            pending_end: None,
            offset: 0,
            chunk_limit: capacity,
            phase: Phase::Start,
            tokens_seen: 0,
        }
    }

    /// Current size of the read window in bytes
    pub fn buffer_capacity(&self) -> usize {
        self.input.capacity()
    }

    /// Number of currently open elements
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Bytes pulled from the underlying reader so far
    pub fn bytes_read(&self) -> u64 {
        self.input.total_read()
    }

    fn fill(&mut self) -> Result<bool> {
        let offset = self.offset;
        self.input
            .fill_buffer()
            .map_err(|source| IngestError::Io { source, offset })
    }

    fn fail(&self, error: ParseError) -> IngestError {
        IngestError::malformed(error.message, self.offset + error.position as u64)
    }

    fn consume(&mut self, n: usize) {
        self.input.consume(n);
        self.offset += n as u64;
    }

    /// Detect the encoding and skip a byte order mark
    fn start(&mut self) -> Result<()> {
        while self.input.buffered().len() < DETECT_LEN && self.fill()? {}

        let encoding = XmlEncoding::detect(self.input.buffered());
        if !encoding.is_supported() {
            return Err(IngestError::malformed(
                format!("unsupported encoding {}, only UTF-8 input is accepted", encoding.name()),
                0,
            ));
        }
        self.consume(encoding.bom_len());
        self.phase = Phase::Prolog;
        Ok(())
    }

    fn advance(&mut self) -> Result<Option<ParseEvent>> {
        if let Some(name) = self.pending_end.take() {
            return Ok(Some(self.close(name)));
        }

        loop {
            match self.phase {
                Phase::Done => return Ok(None),
                Phase::Start => {
                    self.start()?;
                    continue;
                }
                _ => {}
            }

            let at_eof = self.input.is_exhausted();
            let step = {
                let mut tokenizer =
                    Tokenizer::new(self.input.buffered(), at_eof).with_chunk_limit(self.chunk_limit);
                match tokenizer.next_token() {
                    Ok(Scan::Token(token)) => translate(&token).map(|t| Step::Token(t, token.span)),
                    Ok(Scan::Incomplete) => Ok(Step::More),
                    Ok(Scan::Eof) => Ok(Step::End),
                    Err(e) => Err(e),
                }
            };

            let (translated, span) = match step.map_err(|e| self.fail(e))? {
                Step::Token(translated, span) => (translated, span),
                Step::More if at_eof => {
                    return Err(IngestError::malformed("unexpected end of input", self.offset));
                }
                Step::More => {
                    self.fill()?;
                    continue;
                }
                Step::End => return self.finish(),
            };

            let token_offset = self.offset + span.0 as u64;
            let first_token = self.tokens_seen == 0;
            self.consume(span.1);
            self.tokens_seen += 1;

            if let Some(event) = self.apply(translated, token_offset, first_token)? {
                return Ok(Some(event));
            }
        }
    }

    /// Check one translated token against the document structure
    fn apply(&mut self, token: Translated, at: u64, first_token: bool) -> Result<Option<ParseEvent>> {
        match token {
            Translated::Declaration { encoding } => {
                if !first_token || self.phase != Phase::Prolog {
                    return Err(IngestError::malformed("XML declaration must be at the start of the document", at));
                }
                if let Some(label) = encoding.filter(|label| !is_utf8_compatible(label)) {
                    return Err(IngestError::malformed(
                        format!("unsupported encoding '{label}', only UTF-8 input is accepted"),
                        at,
                    ));
                }
                Ok(None)
            }
            Translated::Start { name, attributes, empty } => {
                if self.phase == Phase::Epilog {
                    return Err(IngestError::malformed(
                        format!("element <{name}> after the root element"),
                        at,
                    ));
                }
                self.phase = Phase::Content;
                self.open.push(name.clone());
                if empty {
                    self.pending_end = Some(name.clone());
                }
                Ok(Some(ParseEvent::ElementStart { name, attributes }))
            }
            Translated::End { name } => match self.open.last() {
                Some(open) if *open == name => Ok(Some(self.close(name))),
                Some(open) => Err(IngestError::malformed(
                    format!("mismatched end tag: expected </{open}>, found </{name}>"),
                    at,
                )),
                None => Err(IngestError::malformed(format!("unexpected end tag </{name}>"), at)),
            },
            Translated::Text(text) => {
                if self.phase == Phase::Content {
                    return Ok((!text.is_empty()).then_some(ParseEvent::Text(text)));
                }
                if text.bytes().all(is_whitespace) {
                    Ok(None)
                } else {
                    Err(IngestError::malformed("text outside the root element", at))
                }
            }
            Translated::Skip => Ok(None),
        }
    }

    fn close(&mut self, name: String) -> ParseEvent {
        self.open.pop();
        if self.open.is_empty() {
            self.phase = Phase::Epilog;
        }
        ParseEvent::ElementEnd { name }
    }

    fn finish(&mut self) -> Result<Option<ParseEvent>> {
        if let Some(open) = self.open.last() {
            return Err(IngestError::malformed(
                format!("unexpected end of input: <{open}> is not closed"),
                self.offset,
            ));
        }
        if self.phase == Phase::Prolog {
            return Err(IngestError::malformed("no root element", self.offset));
        }
        self.phase = Phase::Done;
        Ok(None)
    }
}

impl<R: Read> EventSource for XmlEventReader<R> {
    fn next_event(&mut self) -> Result<Option<ParseEvent>> {
        let result = self.advance();
        if result.is_err() {
            self.phase = Phase::Done;
            self.pending_end = None;
        }
        result
    }

    fn offset(&self) -> u64 {
        self.offset
    }
}

fn utf8(bytes: &[u8], what: &str, at: usize) -> std::result::Result<String, ParseError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::new(format!("invalid UTF-8 in {what}"), at))
}

/// Copy a token out of the window
fn translate(token: &Token<'_>) -> std::result::Result<Translated, ParseError> {
    let at = token.span.0;
    let content = token.content.unwrap_or_default();

    Ok(match token.kind {
        TokenKind::StartTag | TokenKind::EmptyTag => {
            let name = utf8(token.name.unwrap_or_default(), "element name", at)?;
            let parsed = parse_attributes(content).map_err(|msg| ParseError::new(msg, at))?;
            let attributes = parsed
                .iter()
                .map(|a| Ok((utf8(a.name, "attribute name", at)?, utf8(&a.value, "attribute value", at)?)))
                .collect::<std::result::Result<Vec<_>, ParseError>>()?;
            Translated::Start {
                name,
                attributes,
                empty: token.kind == TokenKind::EmptyTag,
            }
        }
        TokenKind::EndTag => Translated::End {
            name: utf8(token.name.unwrap_or_default(), "element name", at)?,
        },
        TokenKind::Text => {
            let decoded = decode_text(content)
                .map_err(|e| ParseError::new("invalid character reference", at + e.position))?;
            Translated::Text(utf8(&decoded, "text", at)?)
        }
        TokenKind::CData => Translated::Text(utf8(content, "CDATA section", at)?),
        TokenKind::XmlDeclaration => Translated::Declaration {
            encoding: declared_encoding(content),
        },
        TokenKind::Comment | TokenKind::ProcessingInstruction | TokenKind::DocType => Translated::Skip,
    })
}

/// Value of the `encoding` pseudo-attribute of an XML declaration
fn declared_encoding(body: &[u8]) -> Option<String> {
    let attrs = parse_attributes(body).ok()?;
    attrs
        .iter()
        .find(|a| a.name == b"encoding")
        .and_then(|a| a.value_str().map(str::to_string))
}
