//! Replay record dump extraction CLI
//!
//! A command-line front end for the extraction engine, reading JSON-lines
//! record dumps (optionally gzip-compressed).
//!
//! ## Commands
//!
//! - `parse` - Run collectors over one traversal
//! - `index` - Build a keyframe index
//! - `snapshot` - Capture entity state at a tick
//! - `range` - Collect events inside a tick range
//! - `stream` - Stream events as JSON lines
//! - `info` - Count records per kind
//!
//! Results go to stdout as JSON; logs and errors go to stderr. Set
//! `RUST_LOG` to change the log level (default `warn`).

use clap::{Args, Parser, Subcommand, ValueEnum};
use replay_extract::config::{ParseConfig, RangeConfig, SnapshotConfig, StreamConfig};
use replay_extract::error::{ExtractError, Result};
use replay_extract::index::{build_index, range_query, snapshot_at, DEFAULT_KEYFRAME_INTERVAL};
use replay_extract::session::parse;
use replay_extract::source::{DumpOpener, KindSet, Record, SourceOpener};
use replay_extract::stream::{StreamPoll, StreamSession};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Replay record dump extractor
#[derive(Parser)]
#[command(name = "replay-extract")]
#[command(about = "Single-pass extraction, seeking and streaming over replay record dumps", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format: json, pretty
    #[arg(short, long, global = true, default_value = "json")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run collectors over one traversal
    Parse {
        /// Path to the record dump
        file: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Build a keyframe index
    Index {
        /// Path to the record dump
        file: PathBuf,
        /// Ticks between keyframes
        #[arg(short, long, default_value_t = DEFAULT_KEYFRAME_INTERVAL)]
        interval: u32,
    },
    /// Capture entity state at a tick
    Snapshot {
        /// Path to the record dump
        file: PathBuf,
        /// Target tick
        #[arg(short, long)]
        tick: u32,
        /// Include illusions and clones
        #[arg(long)]
        illusions: bool,
        /// Include alive creeps
        #[arg(long)]
        creeps: bool,
        /// Only report this hero (repeatable, `npc_dota_hero_*`)
        #[arg(long = "hero")]
        heroes: Vec<String>,
    },
    /// Collect events inside a tick range
    Range {
        /// Path to the record dump
        file: PathBuf,
        /// First tick, inclusive
        #[arg(short, long)]
        start: u32,
        /// Last tick, inclusive
        #[arg(short, long)]
        end: u32,
        /// Include raw messages
        #[arg(long)]
        messages: bool,
        /// Maximum combat log entries and messages (0 = unbounded)
        #[arg(long, default_value_t = 0)]
        max_events: usize,
    },
    /// Stream events as JSON lines
    Stream {
        /// Path to the record dump
        file: PathBuf,
        #[command(flatten)]
        kinds: StreamArgs,
    },
    /// Count records per kind
    Info {
        /// Path to the record dump
        file: PathBuf,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Args)]
struct ConfigArgs {
    /// Parse config file (JSON)
    #[arg(short, long, conflicts_with = "config_json")]
    config: Option<PathBuf>,
    /// Inline parse config (JSON)
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Args)]
struct StreamArgs {
    /// Emit combat log entries
    #[arg(long)]
    combat_log: bool,
    /// Emit entity ops
    #[arg(long)]
    entities: bool,
    /// Emit other protocol messages
    #[arg(long)]
    messages: bool,
    /// Emit game events
    #[arg(long)]
    game_events: bool,
    /// Emit modifiers
    #[arg(long)]
    modifiers: bool,
    /// Only emit types containing this fragment (repeatable)
    #[arg(long = "filter")]
    filters: Vec<String>,
    /// Stop after this many events (0 = unbounded)
    #[arg(long, default_value_t = replay_extract::config::DEFAULT_STREAM_MAX_EVENTS)]
    max_events: usize,
    /// Minimum ticks between events for the same entity
    #[arg(long, default_value_t = 0)]
    interval_tick: u32,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    let outcome = match cli.command {
        Commands::Parse { file, config } => cmd_parse(&file, &config, format),
        Commands::Index { file, interval } => cmd_index(&file, interval, format),
        Commands::Snapshot {
            file,
            tick,
            illusions,
            creeps,
            heroes,
        } => cmd_snapshot(
            &file,
            SnapshotConfig {
                target_tick: tick,
                include_illusions: illusions,
                include_creeps: creeps,
                target_heroes: heroes,
            },
            format,
        ),
        Commands::Range {
            file,
            start,
            end,
            messages,
            max_events,
        } => cmd_range(
            &file,
            &RangeConfig {
                start_tick: start,
                end_tick: end,
                include_messages: messages,
                max_events,
            },
            format,
        ),
        Commands::Stream { file, kinds } => cmd_stream(&file, kinds, format),
        Commands::Info { file } => cmd_info(&file, format),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_output<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let json = match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
    };
    println!("{json}");
    Ok(())
}

fn opener(file: &Path) -> DumpOpener {
    DumpOpener::new(file)
}

// ============================================================================
// Commands
// ============================================================================

fn load_config(args: &ConfigArgs) -> Result<ParseConfig> {
    if let Some(path) = &args.config {
        return ParseConfig::from_json(&std::fs::read_to_string(path)?);
    }
    if let Some(json) = &args.config_json {
        return ParseConfig::from_json(json);
    }
    Ok(ParseConfig::basic())
}

fn cmd_parse(file: &Path, args: &ConfigArgs, format: OutputFormat) -> Result<()> {
    let config = load_config(args)?;
    let result = parse(&opener(file), &config)?;
    print_output(&result, format)
}

fn cmd_index(file: &Path, interval: u32, format: OutputFormat) -> Result<()> {
    let index = build_index(&opener(file), interval)?;
    print_output(&index, format)
}

fn cmd_snapshot(file: &Path, config: SnapshotConfig, format: OutputFormat) -> Result<()> {
    let snapshot = snapshot_at(&opener(file), &config)?;
    print_output(&snapshot, format)
}

fn cmd_range(file: &Path, config: &RangeConfig, format: OutputFormat) -> Result<()> {
    let result = range_query(&opener(file), config)?;
    print_output(&result, format)
}

fn cmd_stream(file: &Path, args: StreamArgs, format: OutputFormat) -> Result<()> {
    let config = StreamConfig {
        combat_log: args.combat_log,
        entities: args.entities,
        messages: args.messages,
        game_events: args.game_events,
        modifiers: args.modifiers,
        filter_types: args.filters,
        max_events: args.max_events,
        interval_tick: args.interval_tick,
    };
    let mut session = StreamSession::open(&opener(file), config)?;

    loop {
        match session.next_timeout(Duration::from_millis(500)) {
            StreamPoll::Event(event) => print_output(&event, format)?,
            StreamPoll::Pending => {}
            StreamPoll::Done { success: true, .. } => return Ok(()),
            StreamPoll::Done { error, .. } => {
                let reason = error.unwrap_or_else(|| "stream failed".to_string());
                return Err(ExtractError::source(0, reason));
            }
        }
    }
}

#[derive(Serialize)]
struct InfoOutput {
    records: usize,
    by_kind: BTreeMap<String, usize>,
    last_tick: u32,
    last_net_tick: u32,
}

fn cmd_info(file: &Path, format: OutputFormat) -> Result<()> {
    let mut source = opener(file).open()?;
    let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
    let mut records = 0;
    source.start(KindSet::ALL, &mut |record: &Record| {
        records += 1;
        *by_kind.entry(format!("{:?}", record.kind())).or_default() += 1;
        ControlFlow::Continue(())
    })?;

    let info = InfoOutput {
        records,
        by_kind,
        last_tick: source.tick(),
        last_net_tick: source.net_tick(),
    };
    match format {
        OutputFormat::Json => print_output(&info, format),
        OutputFormat::Pretty => {
            println!("=== Records ({}) ===", info.records);
            for (kind, count) in &info.by_kind {
                println!("  {kind:<20} {count}");
            }
            println!("Last tick: {} (net {})", info.last_tick, info.last_net_tick);
            Ok(())
        }
    }
}
