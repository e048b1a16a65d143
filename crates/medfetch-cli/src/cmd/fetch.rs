//! Fetch subcommand - pull records from remote APIs into partitioned JSONL

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use medfetch_core::{SharedProgress, fmt_num};
use medfetch_ctgov::{CtgovClient, StudyQuery, export_query};
use medfetch_pubmed::{EutilsClient, export_search};

use crate::cmd::print_summary;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct FetchArgs {
    #[command(subcommand)]
    pub source: FetchSource,
}

#[derive(Subcommand, Debug)]
pub enum FetchSource {
    /// Fetch PubMed search results via E-utilities
    Pubmed(PubmedArgs),
    /// Fetch ClinicalTrials.gov studies
    Ctgov(CtgovArgs),
}

#[derive(Args, Debug)]
pub struct PubmedArgs {
    /// E-utilities search term
    #[arg(short, long)]
    pub term: String,

    /// Stem for partition file names
    #[arg(long, default_value = "pubmed_search")]
    pub stem: String,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stop after this many articles
    #[arg(short = 'l', long)]
    pub limit: Option<usize>,

    /// Articles per efetch request
    #[arg(long)]
    pub batch_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct CtgovArgs {
    /// Calendar year of last-update dates
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Window start (YYYY-MM-DD, narrows --year)
    #[arg(long)]
    pub from: Option<String>,

    /// Window end (YYYY-MM-DD, narrows --year)
    #[arg(long)]
    pub to: Option<String>,

    /// Free-text term ANDed with the date window
    #[arg(short, long)]
    pub term: Option<String>,

    /// Studies per page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Stop after this many studies
    #[arg(short = 'l', long)]
    pub limit: Option<usize>,

    /// Stem for partition file names (default: studies_{year})
    #[arg(long)]
    pub stem: Option<String>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: FetchArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    match args.source {
        FetchSource::Pubmed(pm_args) => fetch_pubmed(pm_args, config, progress),
        FetchSource::Ctgov(ct_args) => fetch_ctgov(ct_args, config, progress),
    }
}

fn fetch_pubmed(args: PubmedArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let output_dir = args
        .output
        .unwrap_or_else(|| config.output.default_dir.join("pubmed"));
    let batch_size = args.batch_size.unwrap_or(config.pubmed.batch_size);
    let client = EutilsClient::new(&config.pubmed.base_url, batch_size);

    log::info!("Fetching PubMed search {:?}", args.term);
    log::info!("  Output: {}", output_dir.display());

    let pb = progress.stage_line("pubmed");
    pb.set_message(args.term.clone());
    let summary = export_search(&client, &args.term, &args.stem, &output_dir, args.limit)?;
    pb.finish_and_clear();

    print_summary(
        "PubMed",
        &[
            ("Articles", fmt_num(summary.processed)),
            ("Skipped", fmt_num(summary.skipped)),
            (
                "Written",
                format!(
                    "{} across {} partition(s)",
                    fmt_num(summary.stats.records_written),
                    summary.stats.partitions
                ),
            ),
        ],
    );

    if summary.interrupted {
        anyhow::bail!("Interrupted");
    }
    Ok(())
}

fn fetch_ctgov(args: CtgovArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let year = args.year.unwrap_or(config.ctgov.year);
    let mut query = StudyQuery::for_year(year);
    query.page_size = args.page_size.unwrap_or(config.ctgov.page_size);
    query.term = args.term;
    query.max_count = args.limit;
    if let Some(from) = args.from {
        query.from = from;
    }
    if let Some(to) = args.to {
        query.to = to;
    }

    let stem = args.stem.unwrap_or_else(|| format!("studies_{year}"));
    let output_dir = args
        .output
        .unwrap_or_else(|| config.output.default_dir.join("ctgov"));
    let client = CtgovClient::new(&config.ctgov.base_url);

    log::info!("Fetching studies updated {} to {}", query.from, query.to);
    log::info!("  Output: {}", output_dir.display());

    let pb = progress.stage_line("ctgov");
    pb.set_message(query.term_expr());
    let summary = export_query(&client, &query, &stem, &output_dir)?;
    pb.finish_and_clear();

    print_summary(
        "ClinicalTrials.gov",
        &[
            ("Studies", fmt_num(summary.processed)),
            ("Skipped", fmt_num(summary.skipped)),
            (
                "Written",
                format!(
                    "{} across {} partition(s)",
                    fmt_num(summary.stats.records_written),
                    summary.stats.partitions
                ),
            ),
        ],
    );

    if summary.interrupted {
        anyhow::bail!("Interrupted");
    }
    Ok(())
}
