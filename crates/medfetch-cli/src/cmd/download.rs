//! Download subcommand - mirror bulk archives from the NCBI distribution

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};

use medfetch_core::{SharedProgress, fmt_num};
use medfetch_pubmed::{ArchiveSet, download_archives};

use crate::cmd::print_summary;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Distribution directory to mirror
    #[arg(value_enum)]
    pub set: ArchiveSetArg,

    /// Destination directory (default: {output_dir}/archives/{set})
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stop after this many new archives
    #[arg(short = 'l', long)]
    pub limit: Option<usize>,

    /// Distribution base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ArchiveSetArg {
    /// Annual baseline archives
    Baseline,
    /// Daily update archives
    Updates,
}

impl From<ArchiveSetArg> for ArchiveSet {
    fn from(arg: ArchiveSetArg) -> Self {
        match arg {
            ArchiveSetArg::Baseline => Self::Baseline,
            ArchiveSetArg::Updates => Self::Updates,
        }
    }
}

pub fn run(args: DownloadArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let set = ArchiveSet::from(args.set);
    let base_url = args
        .base_url
        .unwrap_or_else(|| config.pubmed.archive_base_url.clone());
    let dest_dir = args.output.unwrap_or_else(|| {
        config
            .output
            .default_dir
            .join("archives")
            .join(set.dir().trim_end_matches('/'))
    });

    log::info!("Mirroring {base_url}{}", set.dir());
    log::info!("  Destination: {}", dest_dir.display());

    let pb = progress.stage_line("download");
    pb.set_message(set.dir().trim_end_matches('/').to_string());
    let summary = download_archives(&base_url, set, &dest_dir, args.limit)?;
    pb.finish_and_clear();

    print_summary(
        "Download",
        &[
            ("Downloaded", fmt_num(summary.downloaded)),
            ("Already present", fmt_num(summary.skipped)),
            ("Failed", fmt_num(summary.failed)),
        ],
    );

    if summary.interrupted {
        anyhow::bail!("Interrupted");
    }
    if summary.failed > 0 {
        anyhow::bail!("{} archive(s) failed to download", summary.failed);
    }
    Ok(())
}
