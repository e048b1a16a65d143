//! medfetch - Unified CLI for biomedical dataset ingestion
//!
//! Fetches and normalizes PubMed articles and ClinicalTrials.gov studies
//! into partitioned JSONL, loads them into a DuckDB store, and pushes
//! exports and public CSV extracts to a remote cache.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "medfetch")]
#[command(about = "Fetch, normalize, and load biomedical literature and trial registries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./medfetch.toml or ~/.config/medfetch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Download PubMed bulk archives from the NCBI distribution
    Download(cmd::download::DownloadArgs),
    /// Fetch records from remote APIs into partitioned JSONL
    Fetch(cmd::fetch::FetchArgs),
    /// Export local PubMed archives into partitioned JSONL
    Export(cmd::export::ExportArgs),
    /// Load partition files into the DuckDB store
    Load(cmd::load::LoadArgs),
    /// Push exports and CSV extracts to the remote cache
    Cache(cmd::cache::CacheArgs),
    /// Search the loaded store
    Search(cmd::search::SearchArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(medfetch_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  — progress bars show activity
    //   non-TTY: info unless --debug          — logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    medfetch_core::init_logging(quiet, cli.debug, multi);

    install_signal_handlers();

    // Load configuration
    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Download(args) => cmd::download::run(args, &config, &progress),
        Command::Fetch(args) => cmd::fetch::run(args, &config, &progress),
        Command::Export(args) => cmd::export::run(args, &config, &progress),
        Command::Load(args) => cmd::load::run(args, &config, &progress),
        Command::Cache(args) => cmd::cache::run(args, &config),
        Command::Search(args) => cmd::search::run(args, &config),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec![
                "Output directory",
                &config.output.default_dir.display().to_string(),
            ]);
            table.add_row(vec![
                "Database path",
                &config.output.db_path.display().to_string(),
            ]);
            table.add_row(vec!["PubMed base URL", &config.pubmed.base_url]);
            table.add_row(vec![
                "PubMed archive base URL",
                &config.pubmed.archive_base_url,
            ]);
            table.add_row(vec![
                "PubMed batch size",
                &config.pubmed.batch_size.to_string(),
            ]);
            table.add_row(vec!["CTG base URL", &config.ctgov.base_url]);
            table.add_row(vec!["CTG page size", &config.ctgov.page_size.to_string()]);
            table.add_row(vec!["CTG default year", &config.ctgov.year.to_string()]);
            table.add_row(vec![
                "Cache URL",
                config.cache.base_url.as_deref().unwrap_or("not set"),
            ]);
            table.add_row(vec![
                "Cache API key",
                if config.cache.api_key.is_some() {
                    "configured"
                } else {
                    "not set"
                },
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}

/// First SIGINT/SIGTERM requests a graceful stop at the next record
/// boundary; a second one exits immediately.
fn install_signal_handlers() {
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        // SAFETY: the handler only touches an AtomicBool and process::exit,
        // both async-signal-safe.
        let result = unsafe {
            signal_hook::low_level::register(signal, || {
                if medfetch_core::shutdown_flag().swap(true, Ordering::Relaxed) {
                    std::process::exit(130);
                }
            })
        };
        if let Err(e) = result {
            log::warn!("Failed to register handler for signal {signal}: {e}");
        }
    }
}
