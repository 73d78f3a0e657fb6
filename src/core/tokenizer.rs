//! XML Tokenizer - incremental token extraction
//!
//! Extracts one token at a time from a window of buffered input:
//! - Element start/end/empty tags
//! - Text content (raw, entities not yet decoded)
//! - CDATA sections
//! - Comments, processing instructions, XML declaration, DOCTYPE
//!
//! The window is usually not the whole document. When a construct runs
//! past the end of the window the tokenizer answers [`Scan::Incomplete`] so
//! the caller can read more bytes and retry; only when the window is known
//! to be the end of input does a truncated construct become a [`ParseError`].

use super::entities::split_point;
use super::scanner::{is_whitespace, Scanner};

/// Type of XML token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Element start tag: <element>
    StartTag,
    /// Element end tag: </element>
    EndTag,
    /// Empty element: <element/>
    EmptyTag,
    /// Text content
    Text,
    /// CDATA section: <![CDATA[...]]>
    CData,
    /// Comment: <!--...-->
    Comment,
    /// Processing instruction: <?target ...?>
    ProcessingInstruction,
    /// XML declaration: <?xml ...?>
    XmlDeclaration,
    /// DOCTYPE declaration
    DocType,
}

/// A token borrowed from the current window
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Span in the window (start, end); `end` is the number of bytes consumed
    pub span: (usize, usize),
    /// For tags and PIs: the name or target
    pub name: Option<&'a [u8]>,
    /// For tags: the attribute region; for text/CDATA/comments/PIs: the raw body
    pub content: Option<&'a [u8]>,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, span: (usize, usize)) -> Self {
        Token {
            kind,
            span,
            name: None,
            content: None,
        }
    }

    fn with_name(mut self, name: &'a [u8]) -> Self {
        self.name = Some(name);
        self
    }

    fn with_content(mut self, content: &'a [u8]) -> Self {
        self.content = Some(content);
        self
    }
}

/// Outcome of one tokenizer step
#[derive(Debug)]
pub enum Scan<'a> {
    Token(Token<'a>),
    /// The next construct extends past the window; read more and retry
    Incomplete,
    /// Window is empty and no more input will arrive
    Eof,
}

/// Well-formedness failure, positioned relative to the window start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

/// Pull tokenizer over one window of input
pub struct Tokenizer<'a> {
    scanner: Scanner<'a>,
    at_eof: bool,
    chunk_limit: usize,
}

impl<'a> Tokenizer<'a> {
    /// `at_eof` tells whether the window is the final tail of the input
    pub fn new(input: &'a [u8], at_eof: bool) -> Self {
        Tokenizer {
            scanner: Scanner::new(input),
            at_eof,
            chunk_limit: usize::MAX,
        }
    }

    /// Emit text in chunks once an unterminated run reaches `limit` bytes
    pub fn with_chunk_limit(mut self, limit: usize) -> Self {
        self.chunk_limit = limit.max(1);
        self
    }

    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Scan<'a>, ParseError> {
        match self.scanner.peek() {
            None if self.at_eof => Ok(Scan::Eof),
            None => Ok(Scan::Incomplete),
            Some(b'<') => self.parse_markup(),
            Some(_) => Ok(self.parse_text()),
        }
    }

    /// Report a construct that runs past the window
    fn truncated(&self, message: &str, start: usize) -> Result<Scan<'a>, ParseError> {
        if self.at_eof {
            Err(ParseError::new(message, start))
        } else {
            Ok(Scan::Incomplete)
        }
    }

    /// Parse markup starting with '<'
    fn parse_markup(&mut self) -> Result<Scan<'a>, ParseError> {
        let start = self.scanner.position();
        let rest = self.scanner.remaining();

        match rest.get(1) {
            None => self.truncated("unterminated tag", start),
            Some(b'/') => self.parse_end_tag(start),
            Some(b'?') => self.parse_pi(start),
            Some(b'!') => {
                if self.scanner.starts_with(b"<!--") {
                    self.parse_delimited(start, 4, b"-->", TokenKind::Comment, "unterminated comment")
                } else if self.scanner.starts_with(b"<![CDATA[") {
                    self.parse_delimited(start, 9, b"]]>", TokenKind::CData, "unterminated CDATA section")
                } else if self.scanner.starts_with(b"<!DOCTYPE") {
                    self.parse_doctype(start)
                } else if [&b"<!--"[..], &b"<![CDATA["[..], &b"<!DOCTYPE"[..]]
                    .iter()
                    .any(|needle| self.scanner.is_prefix_of(needle))
                {
                    self.truncated("unterminated markup declaration", start)
                } else {
                    Err(ParseError::new("unsupported markup declaration", start))
                }
            }
            Some(_) => self.parse_start_tag(start),
        }
    }

    /// Parse a start tag or empty element tag
    fn parse_start_tag(&mut self, start: usize) -> Result<Scan<'a>, ParseError> {
        let end = match self.scanner.find_tag_end_quoted() {
            Some(end) => end,
            None => return self.truncated("unterminated start tag", start),
        };

        self.scanner.set_position(start + 1);
        let name = self
            .scanner
            .read_name()
            .ok_or_else(|| ParseError::new("invalid element name", start))?;
        let name_end = self.scanner.position();

        let is_empty = end > name_end && self.scanner.slice(end - 1, end) == b"/";
        let attr_end = if is_empty { end - 1 } else { end };
        let attrs = self.scanner.slice(name_end, attr_end.max(name_end));
        if attrs.first().is_some_and(|&b| !is_whitespace(b)) {
            return Err(ParseError::new("invalid character in element name", name_end));
        }

        self.scanner.set_position(end + 1);
        let kind = if is_empty { TokenKind::EmptyTag } else { TokenKind::StartTag };
        Ok(Scan::Token(
            Token::new(kind, (start, end + 1))
                .with_name(name)
                .with_content(attrs),
        ))
    }

    /// Parse an end tag
    fn parse_end_tag(&mut self, start: usize) -> Result<Scan<'a>, ParseError> {
        let end = match self.scanner.find_sequence(b">") {
            Some(end) => end,
            None => return self.truncated("unterminated end tag", start),
        };

        self.scanner.set_position(start + 2);
        let name = self
            .scanner
            .read_name()
            .ok_or_else(|| ParseError::new("invalid element name in end tag", start))?;
        self.scanner.skip_whitespace();
        if self.scanner.position() != end {
            return Err(ParseError::new("end tag cannot contain attributes", start));
        }

        self.scanner.set_position(end + 1);
        Ok(Scan::Token(Token::new(TokenKind::EndTag, (start, end + 1)).with_name(name)))
    }

    /// Parse a construct with a fixed opener length and closing sequence
    fn parse_delimited(
        &mut self,
        start: usize,
        open_len: usize,
        close: &[u8],
        kind: TokenKind,
        message: &str,
    ) -> Result<Scan<'a>, ParseError> {
        self.scanner.set_position(start + open_len);
        let body_end = match self.scanner.find_sequence(close) {
            Some(end) => end,
            None => {
                self.scanner.set_position(start);
                return self.truncated(message, start);
            }
        };
        let body = self.scanner.slice(start + open_len, body_end);
        let end = body_end + close.len();
        self.scanner.set_position(end);
        Ok(Scan::Token(Token::new(kind, (start, end)).with_content(body)))
    }

    fn parse_doctype(&mut self, start: usize) -> Result<Scan<'a>, ParseError> {
        match self.scanner.find_declaration_end() {
            Some(end) => {
                self.scanner.set_position(end + 1);
                Ok(Scan::Token(Token::new(TokenKind::DocType, (start, end + 1))))
            }
            None => self.truncated("unterminated DOCTYPE", start),
        }
    }

    /// Parse a processing instruction or the XML declaration
    fn parse_pi(&mut self, start: usize) -> Result<Scan<'a>, ParseError> {
        self.scanner.set_position(start + 2);
        let close = match self.scanner.find_sequence(b"?>") {
            Some(close) => close,
            None => {
                self.scanner.set_position(start);
                return self.truncated("unterminated processing instruction", start);
            }
        };

        let target = self
            .scanner
            .read_name()
            .ok_or_else(|| ParseError::new("invalid processing instruction target", start))?;
        let body = self.scanner.slice(self.scanner.position().min(close), close);

        self.scanner.set_position(close + 2);
        let kind = if target == b"xml" {
            TokenKind::XmlDeclaration
        } else {
            TokenKind::ProcessingInstruction
        };
        Ok(Scan::Token(
            Token::new(kind, (start, close + 2))
                .with_name(target)
                .with_content(body),
        ))
    }

    /// Parse character data up to the next '<'
    fn parse_text(&mut self) -> Scan<'a> {
        let start = self.scanner.position();
        let end = match self.scanner.find_tag_start() {
            Some(lt) => lt,
            None if self.at_eof => self.scanner.len(),
            None => {
                let rest = self.scanner.remaining();
                if rest.len() < self.chunk_limit {
                    return Scan::Incomplete;
                }
                match split_point(rest) {
                    0 => return Scan::Incomplete,
                    cut => start + cut,
                }
            }
        };

        let body = self.scanner.slice(start, end);
        self.scanner.set_position(end);
        Scan::Token(Token::new(TokenKind::Text, (start, end)).with_content(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<(TokenKind, Option<Vec<u8>>)> {
        let mut tokenizer = Tokenizer::new(input, true);
        let mut out = Vec::new();
        loop {
            match tokenizer.next_token().expect("well-formed input") {
                Scan::Token(t) => out.push((t.kind, t.name.map(|n| n.to_vec()))),
                Scan::Eof => break,
                Scan::Incomplete => panic!("incomplete at eof"),
            }
        }
        out
    }

    #[test]
    fn test_simple_element() {
        let toks = tokens(b"<root>hello</root>");
        assert_eq!(toks.len(), 3);
        assert_eq!(toks[0], (TokenKind::StartTag, Some(b"root".to_vec())));
        assert_eq!(toks[1].0, TokenKind::Text);
        assert_eq!(toks[2], (TokenKind::EndTag, Some(b"root".to_vec())));
    }

    #[test]
    fn test_empty_element_with_attributes() {
        let mut tokenizer = Tokenizer::new(b"<br id=\"a/b\"/>", true);
        match tokenizer.next_token().unwrap() {
            Scan::Token(t) => {
                assert_eq!(t.kind, TokenKind::EmptyTag);
                assert_eq!(t.name, Some(&b"br"[..]));
                assert_eq!(t.content, Some(&b" id=\"a/b\""[..]));
                assert_eq!(t.span, (0, 14));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cdata_comment_pi_doctype() {
        let toks = tokens(b"<?xml version=\"1.0\"?><!DOCTYPE r><r><!-- c --><![CDATA[<x>]]><?pi data?></r>");
        let kinds: Vec<_> = toks.iter().map(|t| t.0).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::XmlDeclaration,
                TokenKind::DocType,
                TokenKind::StartTag,
                TokenKind::Comment,
                TokenKind::CData,
                TokenKind::ProcessingInstruction,
                TokenKind::EndTag,
            ]
        );
    }

    #[test]
    fn test_incomplete_tag_mid_stream() {
        let mut tokenizer = Tokenizer::new(b"<item na", false);
        assert!(matches!(tokenizer.next_token(), Ok(Scan::Incomplete)));

        let mut tokenizer = Tokenizer::new(b"<!-", false);
        assert!(matches!(tokenizer.next_token(), Ok(Scan::Incomplete)));
    }

    #[test]
    fn test_unterminated_tag_at_eof() {
        let mut tokenizer = Tokenizer::new(b"<item na", true);
        let err = tokenizer.next_token().unwrap_err();
        assert_eq!(err.message, "unterminated start tag");
        assert_eq!(err.position, 0);
    }

    #[test]
    fn test_text_waits_for_tag_start() {
        let mut tokenizer = Tokenizer::new(b"partial text", false);
        assert!(matches!(tokenizer.next_token(), Ok(Scan::Incomplete)));
    }

    #[test]
    fn test_long_text_is_chunked() {
        let mut tokenizer = Tokenizer::new(b"0123456789 &amp", false).with_chunk_limit(8);
        match tokenizer.next_token().unwrap() {
            Scan::Token(t) => {
                assert_eq!(t.kind, TokenKind::Text);
                assert_eq!(t.content, Some(&b"0123456789 "[..]));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(tokenizer.next_token(), Ok(Scan::Incomplete)));
    }

    #[test]
    fn test_malformed_markup() {
        assert!(Tokenizer::new(b"<1abc>", true).next_token().is_err());
        assert!(Tokenizer::new(b"</a b=\"c\">", true).next_token().is_err());
        assert!(Tokenizer::new(b"<!ELEMENT x>", true).next_token().is_err());
        assert!(Tokenizer::new(b"<a\"b>", true).next_token().is_err());
    }
}
