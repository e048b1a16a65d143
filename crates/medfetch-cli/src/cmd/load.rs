//! Load subcommand - load partition files into the DuckDB store

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use medfetch_core::{SharedProgress, fmt_num, is_shutdown_requested};
use medfetch_store::Store;

use crate::cmd::print_summary;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct LoadArgs {
    #[command(subcommand)]
    pub source: LoadSource,
}

#[derive(Subcommand, Debug)]
pub enum LoadSource {
    /// Load exported articles
    Pubmed(LoadSourceArgs),
    /// Load exported trials
    Ctgov(LoadSourceArgs),
}

#[derive(Args, Debug)]
pub struct LoadSourceArgs {
    /// Partition directory or a single .jsonl file
    pub input: PathBuf,

    /// DuckDB database path
    #[arg(long)]
    pub db: Option<PathBuf>,
}

struct LoadTotals {
    loaded: usize,
    skipped: usize,
    malformed: usize,
    files: usize,
    interrupted: bool,
}

pub fn run(args: LoadArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    match args.source {
        LoadSource::Pubmed(source_args) => {
            load(source_args, config, progress, "pubmed", |store, path| {
                let summary = medfetch_pubmed::load_file(path, store)?;
                Ok((summary.loaded, summary.skipped, summary.malformed))
            })
        }
        LoadSource::Ctgov(source_args) => {
            load(source_args, config, progress, "ctgov", |store, path| {
                let summary = medfetch_ctgov::load_file(path, store)?;
                Ok((summary.loaded, summary.skipped, summary.malformed))
            })
        }
    }
}

fn load(
    args: LoadSourceArgs,
    config: &Config,
    progress: &SharedProgress,
    label: &str,
    load_one: impl Fn(&Store, &Path) -> Result<(usize, usize, usize)>,
) -> Result<()> {
    let db_path = args.db.unwrap_or_else(|| config.output.db_path.clone());
    let files = partition_files(&args.input)?;
    anyhow::ensure!(
        !files.is_empty(),
        "no .jsonl files under {}",
        args.input.display()
    );

    log::info!("Loading {} partition file(s)", files.len());
    log::info!("  Database: {}", db_path.display());

    let store = Store::open(&db_path)?;
    let pb = progress.stage_line(label);
    let mut totals = LoadTotals {
        loaded: 0,
        skipped: 0,
        malformed: 0,
        files: 0,
        interrupted: false,
    };

    for path in &files {
        if is_shutdown_requested() {
            totals.interrupted = true;
            break;
        }
        pb.set_message(path.display().to_string());
        let (loaded, skipped, malformed) = load_one(&store, path)?;
        totals.loaded += loaded;
        totals.skipped += skipped;
        totals.malformed += malformed;
        totals.files += 1;
    }
    pb.finish_and_clear();

    print_summary(
        "Load",
        &[
            ("Files", format!("{}/{}", totals.files, files.len())),
            ("Loaded", fmt_num(totals.loaded)),
            ("Skipped", fmt_num(totals.skipped)),
            ("Malformed", fmt_num(totals.malformed)),
        ],
    );

    if totals.interrupted {
        anyhow::bail!("Interrupted");
    }
    Ok(())
}

/// All .jsonl files under a partition directory, or the file itself.
fn partition_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    let pattern = input.join("**/*.jsonl");
    let mut files: Vec<_> = glob::glob(&pattern.to_string_lossy())
        .with_context(|| format!("bad glob pattern {}", pattern.display()))?
        .filter_map(Result::ok)
        .collect();
    files.sort();
    Ok(files)
}
