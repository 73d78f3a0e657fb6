//! xml-ingest: convert a large XML file into batches of JSON documents
//!
//! Each occurrence of the repeating element becomes one document. Documents
//! are written as JSON lines to `<out-dir>/<database>/<collection>.jsonl`,
//! to standard output, or counted and dropped in a dry run.

use std::fs::File;
use std::io::{self, BufWriter, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rustyxml_ingest::config::{LogFormat, LoggingConfig};
use rustyxml_ingest::{memory, DirectorySink, DiscardSink, IngestConfig, Importer, JsonLinesSink, Sink};

#[derive(Parser)]
#[command(name = "xml-ingest")]
#[command(about = "Stream a large XML file into array-wrapped JSON documents")]
#[command(version)]
struct Cli {
    /// XML file to import ("-" reads standard input)
    #[arg(short, long)]
    file: PathBuf,

    /// Path from the root to the repeating element, e.g. artists/artist
    #[arg(short = 'r', long = "repeating-path")]
    repeat_path: Option<String>,

    /// Direct children of the repeating element to drop (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    ignore: Vec<String>,

    /// Accepted for compatibility; every key is already an array
    #[arg(long, value_delimiter = ',')]
    array_fields: Vec<String>,

    /// Destination database
    #[arg(short, long)]
    database: Option<String>,

    /// Destination collection (default: parent of the repeating element)
    #[arg(short, long)]
    collection: Option<String>,

    /// Documents per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Root directory for output files
    #[arg(long, conflicts_with = "stdout")]
    out_dir: Option<PathBuf>,

    /// Write documents to standard output
    #[arg(long)]
    stdout: bool,

    /// Parse and map only; print statistics instead of writing documents
    #[arg(long, conflicts_with_all = ["stdout", "out_dir"])]
    dry_run: bool,

    /// Configuration file (TOML)
    #[arg(long, env = "XML_INGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Log format
    #[arg(long, value_parser = ["text", "json"])]
    log_format: Option<String>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Configuration file values with command-line overrides applied
    fn ingest_config(&self) -> Result<IngestConfig> {
        let mut config = match &self.config {
            Some(path) => IngestConfig::load(path)?,
            None => IngestConfig::default(),
        };

        if let Some(path) = &self.repeat_path {
            config.repeat_path = path.clone();
        }
        if !self.ignore.is_empty() {
            config.ignore = self.ignore.clone();
        }
        if !self.array_fields.is_empty() {
            config.array_fields = self.array_fields.clone();
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(collection) = &self.collection {
            config.collection = Some(collection.clone());
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        match self.log_format.as_deref() {
            Some("json") => config.logging.format = LogFormat::Json,
            Some("text") => config.logging.format = LogFormat::Text,
            _ => {}
        }

        if config.repeat_path.trim().is_empty() {
            bail!("a repeating path is required (--repeating-path or repeat_path in the config file)");
        }
        Ok(config)
    }
}

fn init_logging(config: &LoggingConfig, verbose: u8) {
    let level = match verbose {
        0 => config.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.with_target(false).init(),
    }
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;
    Ok(Box::new(file))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.ingest_config()?;
    init_logging(&config.logging, cli.verbose);

    let importer = Importer::new(config).context("invalid configuration")?;
    let cancel = importer.cancellation_token();
    ctrlc::set_handler(move || cancel.cancel()).context("failed to install Ctrl-C handler")?;

    let input = open_input(&cli.file)?;
    let mut sink: Box<dyn Sink> = if cli.dry_run {
        Box::new(DiscardSink::default())
    } else if cli.stdout {
        Box::new(JsonLinesSink::new(BufWriter::new(io::stdout().lock())))
    } else {
        let root = cli.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let sink = DirectorySink::create(&root, &importer.config().database)
            .with_context(|| format!("failed to create output directory under '{}'", root.display()))?;
        info!(path = %sink.collection_path(&importer.config().collection_name()?).display(), "writing documents");
        Box::new(sink)
    };

    let stats = importer
        .run(input, &mut sink)
        .with_context(|| format!("import of '{}' failed", cli.file.display()))?;

    if memory::is_tracking() {
        info!(peak_bytes = memory::peak(), "peak heap allocation");
    }
    if cli.dry_run {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    if stats.cancelled {
        bail!("import cancelled after {} documents", stats.documents);
    }
    Ok(())
}
