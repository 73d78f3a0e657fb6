//! Core XML parsing primitives
//!
//! This module contains the fundamental building blocks for XML parsing:
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Tokenizer: Incremental token extraction over a buffered window
//! - Entities: XML entity decoding with Cow (zero-copy when possible)
//! - Attributes: Strict attribute parsing
//! - Encoding: Byte order mark detection and declared-encoding checks

pub mod attributes;
pub mod encoding;
pub mod entities;
pub mod scanner;
pub mod tokenizer;
