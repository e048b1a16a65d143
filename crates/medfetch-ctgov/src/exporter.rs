//! Query exporter writing year-partitioned JSONL.

use std::path::Path;

use anyhow::{Context, Result};
use medfetch_core::{PartitionStats, PartitionWriter, fmt_num, is_shutdown_requested};

use crate::client::{CtgovClient, StudyQuery};
use crate::normalize::normalize_page;
use crate::record::Trial;

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub processed: usize,
    /// Studies dropped for missing NCT ID or brief title.
    pub skipped: usize,
    pub stats: PartitionStats,
    pub interrupted: bool,
}

/// Run a studies query and export every result into
/// `{output_dir}/{year}/{stem}.jsonl`, partitioned by last-update year.
pub fn export_query(
    client: &CtgovClient,
    query: &StudyQuery,
    stem: &str,
    output_dir: &Path,
) -> Result<ExportSummary> {
    let mut writer: PartitionWriter<Trial> = PartitionWriter::new(output_dir, stem);
    let mut summary = ExportSummary::default();

    for page in client.pages(query) {
        if is_shutdown_requested() {
            log::warn!("{stem}: interrupted, flushing buffered partitions");
            summary.interrupted = true;
            break;
        }
        let page = page.context("studies page failed")?;
        let (trials, skipped) = normalize_page(&page);
        summary.skipped += skipped;
        for trial in trials {
            writer.upsert(trial)?;
            summary.processed += 1;
        }
        log::info!("{stem}: {} studies processed", fmt_num(summary.processed));
    }

    summary.stats = writer.finish()?;
    log::info!(
        "{stem}: {} processed, {} skipped, {} partition file(s)",
        fmt_num(summary.processed),
        fmt_num(summary.skipped),
        summary.stats.partitions
    );
    Ok(summary)
}
