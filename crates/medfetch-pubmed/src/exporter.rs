//! Archive and search exporters writing year-partitioned JSONL.

use std::path::Path;

use anyhow::{Context, Result, bail};
use medfetch_core::{PartitionStats, PartitionWriter, fmt_num, is_shutdown_requested};

use crate::decoder::{ArticleStream, parse_articles};
use crate::eutils::EutilsClient;
use crate::normalize::normalize;
use crate::record::Article;

const PROGRESS_EVERY: usize = 1000;

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub processed: usize,
    /// Articles dropped for missing PMIDs.
    pub skipped: usize,
    pub stats: PartitionStats,
    pub interrupted: bool,
}

/// Export one `.xml.gz` archive into `{output_dir}/{year}/{stem}.jsonl`.
///
/// Re-running on the same archive merges into the previous export instead
/// of appending duplicates.
pub fn export_archive(path: &Path, output_dir: &Path) -> Result<ExportSummary> {
    let stem = archive_stem(path)?;
    let stream =
        ArticleStream::open(path).with_context(|| format!("opening {}", path.display()))?;

    let mut writer: PartitionWriter<Article> = PartitionWriter::new(output_dir, &stem);
    let mut summary = ExportSummary::default();

    for raw in stream {
        if is_shutdown_requested() {
            log::warn!("{stem}: interrupted, flushing buffered partitions");
            summary.interrupted = true;
            break;
        }
        match normalize(raw) {
            Some(article) => {
                writer.upsert(article)?;
                summary.processed += 1;
                if summary.processed % PROGRESS_EVERY == 0 {
                    log::info!("{stem}: {} articles processed", fmt_num(summary.processed));
                }
            }
            None => summary.skipped += 1,
        }
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

/// Run an E-utilities search and export every matching article.
pub fn export_search(
    client: &EutilsClient,
    term: &str,
    stem: &str,
    output_dir: &Path,
    max_records: Option<usize>,
) -> Result<ExportSummary> {
    let session = client
        .search(term)
        .with_context(|| format!("esearch for {term:?}"))?;
    log::info!("{term:?}: {} matching articles", fmt_num(session.count));

    let mut writer: PartitionWriter<Article> = PartitionWriter::new(output_dir, stem);
    let mut summary = ExportSummary::default();

    'pages: for page in client.pages(&session) {
        if is_shutdown_requested() {
            log::warn!("{stem}: interrupted, flushing buffered partitions");
            summary.interrupted = true;
            break;
        }
        let xml = page.context("efetch page failed")?;
        for raw in parse_articles(&xml)? {
            match normalize(raw) {
                Some(article) => {
                    writer.upsert(article)?;
                    summary.processed += 1;
                    if summary.processed % PROGRESS_EVERY == 0 {
                        log::info!("{stem}: {} articles processed", fmt_num(summary.processed));
                    }
                }
                None => summary.skipped += 1,
            }
            if max_records.is_some_and(|m| summary.processed >= m) {
                break 'pages;
            }
        }
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

/// Output stem for an archive: the file name without `.xml.gz`.
fn archive_stem(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("bad archive path: {}", path.display()))?;
    let stem = name
        .strip_suffix(".xml.gz")
        .or_else(|| name.strip_suffix(".gz"))
        .unwrap_or(name);
    if stem.is_empty() {
        bail!("bad archive path: {}", path.display());
    }
    Ok(stem.to_string())
}
