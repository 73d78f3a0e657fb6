//! Import configuration
//!
//! Loaded from TOML, overridden by command-line flags, validated once before
//! a run starts.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::branch::RepeatPath;
use crate::error::{IngestError, Result};
use crate::pipeline::sink::is_plain_name;
use crate::reader::buffered::DEFAULT_BUFFER_SIZE;

pub use crate::document::{AttributeMode, MappingConfig, TrimPolicy};

/// Documents per sink call
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Documents between progress lines
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// Smallest accepted read buffer
pub const MIN_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Slash-separated path from the root to the repeating element
    pub repeat_path: String,
    /// Direct children of the repeating element to drop
    pub ignore: Vec<String>,
    /// Accepted for compatibility; every key is already an array
    pub array_fields: Vec<String>,
    pub batch_size: usize,
    pub database: String,
    /// Defaults to the parent of the repeating element
    pub collection: Option<String>,
    /// 0 disables progress logging
    pub progress_interval: u64,
    pub mapping: MappingConfig,
    pub reader: ReaderConfig,
    pub logging: LoggingConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            repeat_path: String::new(),
            ignore: Vec::new(),
            array_fields: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            database: "test".to_string(),
            collection: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            mapping: MappingConfig::default(),
            reader: ReaderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn new(repeat_path: impl Into<String>) -> Self {
        IngestConfig {
            repeat_path: repeat_path.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("failed to read config file '{}': {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            IngestError::Config(format!("failed to parse config file '{}': {}", path.display(), e))
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| IngestError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| IngestError::Config(e.to_string()))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_ignore<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.ignore.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_mapping(mut self, mapping: MappingConfig) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn parsed_repeat_path(&self) -> Result<RepeatPath> {
        RepeatPath::parse(&self.repeat_path)
    }

    /// Configured collection, or the default derived from the repeat path
    pub fn collection_name(&self) -> Result<String> {
        match &self.collection {
            Some(collection) => Ok(collection.clone()),
            None => Ok(self.parsed_repeat_path()?.default_collection().to_string()),
        }
    }

    /// Validate configuration values, reporting every problem at once
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Err(IngestError::Config(msg)) = self.parsed_repeat_path() {
            errors.push(msg);
        }
        if self.batch_size == 0 {
            errors.push("batch_size must be positive".to_string());
        }
        if self.database.trim().is_empty() {
            errors.push("database must not be empty".to_string());
        } else if !is_plain_name(&self.database) {
            errors.push(format!("database '{}' must be a plain name without path separators", self.database));
        }
        if let Some(collection) = &self.collection {
            if collection.trim().is_empty() {
                errors.push("collection must not be empty".to_string());
            } else if !is_plain_name(collection) {
                errors.push(format!("collection '{collection}' must be a plain name without path separators"));
            }
        }
        if self.ignore.iter().any(|name| name.trim().is_empty()) {
            errors.push("ignore list must not contain empty names".to_string());
        }
        if self.mapping.text_key.is_empty() {
            errors.push("mapping.text_key must not be empty".to_string());
        }
        if self.mapping.attributes == AttributeMode::Nested && self.mapping.attributes_key.is_empty() {
            errors.push("mapping.attributes_key must not be empty".to_string());
        }
        if self.reader.buffer_size < MIN_BUFFER_SIZE {
            errors.push(format!("reader.buffer_size must be at least {MIN_BUFFER_SIZE}"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(IngestError::Config(errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// Initial read window in bytes; also the longest text chunk delivered at once
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Log severity level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
}
