//! # CLI - `rdb`, an offline Redis snapshot inspector
//!
//! Decodes an RDB file and hands the records to one of the report
//! consumers. Data goes to stdout (or `-o FILE`); logs go to stderr.
//!
//! ## Commands
//!
//! ```text
//! json        JSON array, one object per key
//! ssv         space-separated lines (default fields: db key type size)
//! aof         RESP commands that rebuild the dataset
//! memory      per-key size report (CSV)
//! bigkey      the N largest keys (CSV)
//! flamegraph  key-prefix size tree served over HTTP
//! ```
//!
//! ## Configuration
//!
//! Every global flag can also be set from the environment:
//!
//! ```text
//! RDB_REGEX       key pattern                     (--regex, repeatable)
//! RDB_NO_EXPIRED  drop keys expired at "now"      (--no-expired)
//! RDB_FIELDS      projected fields, json/ssv only (--fields key,size)
//! RDB_NOW_MS      reference time in unix ms       (--now-ms)
//! RDB_OUTPUT      output file                     (-o)
//! RUST_LOG        log filter                      (default: warn)
//! ```
//!
//! ## Example
//!
//! ```text
//! $ rdb --regex '^user:' json dump.rdb
//! $ rdb -o top.csv bigkey -n 20 dump.rdb
//! $ rdb flamegraph --port 16379 --sep : --sep . dump.rdb
//! $ rdb -o tree.json flamegraph dump.rdb     # write the tree instead of serving
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{DecodeConfig, Field};
use filter::{decode_file, DecodeReport};
use rdb::ChecksumStatus;
use report::aof::DEFAULT_BATCH;
use report::{AofWriter, FlameServer, FlameTree, JsonExporter, MemoryReport, SsvExporter, TopN};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rdb", version, about = "Inspect offline Redis RDB snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Only keys matching this regular expression (any pattern may match).
    #[arg(long, global = true, env = "RDB_REGEX")]
    regex: Vec<String>,

    /// Skip keys whose expiry is at or before the reference time.
    #[arg(long, global = true, env = "RDB_NO_EXPIRED")]
    no_expired: bool,

    /// Comma-separated fields for json/ssv: db,key,expiration,size,type,encoding,value.
    #[arg(long, global = true, env = "RDB_FIELDS")]
    fields: Option<String>,

    /// Reference time in unix milliseconds (default: now).
    #[arg(long, global = true, env = "RDB_NOW_MS")]
    now_ms: Option<i64>,

    /// Write to this file instead of stdout.
    #[arg(short = 'o', long, global = true, env = "RDB_OUTPUT")]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Export every key as a JSON object.
    Json {
        /// Snapshot file.
        input: PathBuf,
    },
    /// Export projected fields as separated lines.
    Ssv {
        input: PathBuf,
        /// Column separator.
        #[arg(long, default_value = " ")]
        separator: String,
    },
    /// Generate RESP commands that recreate the dataset.
    Aof {
        input: PathBuf,
        /// Elements per collection command.
        #[arg(long, default_value_t = DEFAULT_BATCH)]
        batch: usize,
    },
    /// Per-key size report.
    Memory { input: PathBuf },
    /// The largest keys by serialized size.
    Bigkey {
        input: PathBuf,
        /// Number of keys to keep.
        #[arg(short = 'n', long, default_value_t = 100)]
        n: usize,
    },
    /// Aggregate sizes by key prefix and serve a flame graph.
    Flamegraph {
        input: PathBuf,
        /// Listen port; 0 picks a free one.
        #[arg(long, default_value_t = 0, env = "RDB_PORT")]
        port: u16,
        /// Key separator, repeatable (default ":").
        #[arg(long = "sep")]
        separators: Vec<String>,
    },
}

impl Command {
    fn input(&self) -> &Path {
        match self {
            Command::Json { input }
            | Command::Ssv { input, .. }
            | Command::Aof { input, .. }
            | Command::Memory { input }
            | Command::Bigkey { input, .. }
            | Command::Flamegraph { input, .. } => input,
        }
    }

    /// Consumers that only need sizes run the decoder in key-only mode.
    fn key_only(&self) -> bool {
        matches!(self, Command::Bigkey { .. } | Command::Flamegraph { .. })
    }

    fn projects(&self) -> bool {
        matches!(self, Command::Json { .. } | Command::Ssv { .. })
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn decode_config(cli: &Cli) -> Result<DecodeConfig> {
    let mut config = DecodeConfig::new()
        .with_key_patterns(cli.regex.iter().cloned())
        .with_exclude_expired(cli.no_expired)
        .with_key_only(cli.command.key_only());
    if let Some(now_ms) = cli.now_ms {
        config = config.with_now_ms(now_ms);
    }
    if let Some(list) = &cli.fields {
        let fields = Field::parse_list(list).with_context(|| format!("parsing --fields {:?}", list))?;
        if cli.command.projects() {
            config = config.with_fields(Some(fields));
        } else {
            warn!("--fields only applies to json and ssv, ignored");
        }
    }
    Ok(config)
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn log_report(report: &DecodeReport) {
    if let Some(ChecksumStatus::Mismatch { .. }) = report.checksum {
        warn!("snapshot checksum does not match; output may be unreliable");
    }
    info!(
        entries = report.entries,
        forwarded = report.forwarded,
        skipped = report.skipped,
        "done"
    );
}

/// Builds the tree, then either writes it to `output` or serves it until
/// the process is stopped. A failed decode still writes (or serves) the
/// keys read before the failure; when writing, the error is returned after.
fn flamegraph(
    input: &Path,
    config: &DecodeConfig,
    output: Option<&Path>,
    port: u16,
    separators: Vec<String>,
) -> Result<()> {
    let mut tree = FlameTree::new(separators);
    let decoded = decode_file(input, config, &mut tree);
    let json = tree.to_json().context("rendering flame graph")?;
    if output.is_some() {
        let mut out = open_output(output)?;
        writeln!(out, "{}", json).context("writing flame graph")?;
        out.flush().context("flushing flame graph")?;
        log_report(&decoded?);
        return Ok(());
    }
    match decoded {
        Ok(report) => log_report(&report),
        Err(e) => warn!(error = %format!("{:#}", e), "serving a partial flame graph"),
    }
    let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
    runtime.block_on(async move {
        let server = FlameServer::bind(port).await?;
        eprintln!("flame graph at http://{}/", server.local_addr()?);
        server.serve(json).await
    })
}

fn run(cli: Cli) -> Result<()> {
    let config = decode_config(&cli)?;
    let input = cli.command.input().to_path_buf();
    let output = cli.output;

    let report = match cli.command {
        Command::Flamegraph {
            port, separators, ..
        } => return flamegraph(&input, &config, output.as_deref(), port, separators),
        Command::Json { .. } => {
            let out = open_output(output.as_deref())?;
            decode_file(&input, &config, JsonExporter::new(out))?
        }
        Command::Ssv { separator, .. } => {
            let out = open_output(output.as_deref())?;
            let ssv = SsvExporter::new(out, config.fields.clone()).with_separator(separator);
            decode_file(&input, &config, ssv)?
        }
        Command::Aof { batch, .. } => {
            let out = open_output(output.as_deref())?;
            decode_file(&input, &config, AofWriter::new(out).with_batch(batch))?
        }
        Command::Memory { .. } => {
            let out = open_output(output.as_deref())?;
            decode_file(&input, &config, MemoryReport::new(out))?
        }
        Command::Bigkey { n, .. } => {
            let mut top = TopN::new(n);
            let decoded = decode_file(&input, &config, &mut top);
            top.write_csv(open_output(output.as_deref())?)?;
            decoded?
        }
    };
    log_report(&report);
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    run(Cli::parse())
}
