//! Export subcommand - convert local PubMed archives into partitioned JSONL

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use medfetch_core::{SharedProgress, fmt_num, is_shutdown_requested};
use medfetch_pubmed::export_archive;

use crate::cmd::print_summary;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Archive files or glob patterns (.xml.gz)
    #[arg(required = true)]
    pub archives: Vec<String>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: ExportArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let output_dir = args
        .output
        .unwrap_or_else(|| config.output.default_dir.join("pubmed"));

    let mut paths = Vec::new();
    for pattern in &args.archives {
        let mut matched: Vec<PathBuf> = glob::glob(pattern)
            .with_context(|| format!("bad glob pattern {pattern:?}"))?
            .filter_map(Result::ok)
            .collect();
        if matched.is_empty() {
            // Not a glob hit; treat as a literal path so a typo still errors
            matched.push(PathBuf::from(pattern));
        }
        paths.append(&mut matched);
    }
    paths.sort();
    paths.dedup();

    log::info!("Exporting {} archive(s)", paths.len());
    log::info!("  Output: {}", output_dir.display());

    let pb = progress.stage_line("export");
    let mut processed = 0usize;
    let mut skipped = 0usize;
    let mut written = 0usize;
    let mut files = 0usize;
    let mut interrupted = false;

    for path in &paths {
        if is_shutdown_requested() {
            interrupted = true;
            break;
        }
        pb.set_message(path.display().to_string());
        let summary = export_archive(path, &output_dir)?;
        processed += summary.processed;
        skipped += summary.skipped;
        written += summary.stats.records_written;
        files += 1;
        if summary.interrupted {
            interrupted = true;
            break;
        }
    }
    pb.finish_and_clear();

    print_summary(
        "Export",
        &[
            ("Archives", format!("{files}/{}", paths.len())),
            ("Articles", fmt_num(processed)),
            ("Skipped", fmt_num(skipped)),
            ("Written", fmt_num(written)),
        ],
    );

    if interrupted {
        anyhow::bail!("Interrupted");
    }
    Ok(())
}
