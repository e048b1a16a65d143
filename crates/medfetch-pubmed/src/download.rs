//! Bulk archive downloader for the NCBI distribution.
//!
//! Mirrors `.xml.gz` archives from the baseline or update-files directory
//! over HTTPS. Archives already present locally are skipped, so re-running
//! only fetches what is new. In-flight downloads go to a `.part` file and
//! are renamed on completion, so an interrupted run never leaves a
//! truncated archive that a later run would skip.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use medfetch_core::{fmt_num, get_bytes_with_retry, get_text_with_retry, is_shutdown_requested};

pub const DEFAULT_ARCHIVE_BASE_URL: &str = "https://ftp.ncbi.nlm.nih.gov/pubmed/";

/// Which distribution directory to mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveSet {
    /// The annual baseline, complete as of the yearly cutoff.
    Baseline,
    /// Daily update files published since the baseline.
    Updates,
}

impl ArchiveSet {
    pub fn dir(self) -> &'static str {
        match self {
            Self::Baseline => "baseline/",
            Self::Updates => "updatefiles/",
        }
    }
}

#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub downloaded: usize,
    /// Archives already present locally.
    pub skipped: usize,
    /// Archives that failed; the run carries on past them.
    pub failed: usize,
    pub interrupted: bool,
}

/// Mirror one distribution directory into `dest_dir`.
///
/// A failed archive is logged and counted but does not abort the run; the
/// next invocation will retry it since no local file was left behind.
pub fn download_archives(
    base_url: &str,
    set: ArchiveSet,
    dest_dir: &Path,
    limit: Option<usize>,
) -> Result<DownloadSummary> {
    let dir_url = format!("{base_url}{}", set.dir());
    let listing = get_text_with_retry(&dir_url, &[]).with_context(|| format!("listing {dir_url}"))?;
    let names = archive_names(&listing);
    log::info!("{dir_url}: {} archive(s) listed", fmt_num(names.len()));

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating {}", dest_dir.display()))?;

    let mut summary = DownloadSummary::default();
    for name in &names {
        if limit.is_some_and(|l| summary.downloaded >= l) {
            break;
        }
        if is_shutdown_requested() {
            log::warn!("interrupted after {} download(s)", summary.downloaded);
            summary.interrupted = true;
            break;
        }
        let dest = dest_dir.join(name);
        if dest.exists() {
            summary.skipped += 1;
            continue;
        }
        match fetch_archive(&format!("{dir_url}{name}"), &dest) {
            Ok(()) => {
                summary.downloaded += 1;
                log::info!("downloaded {name}");
            }
            Err(e) => {
                summary.failed += 1;
                log::error!("{name}: {e:#}");
            }
        }
    }

    log::info!(
        "{} downloaded, {} already present, {} failed",
        fmt_num(summary.downloaded),
        fmt_num(summary.skipped),
        summary.failed
    );
    Ok(summary)
}

/// Download one named archive, returning its local path. An archive that is
/// already present is returned without a request.
pub fn download_archive(
    base_url: &str,
    set: ArchiveSet,
    name: &str,
    dest_dir: &Path,
) -> Result<PathBuf> {
    let dest = dest_dir.join(name);
    if dest.exists() {
        log::info!("already present: {name}");
        return Ok(dest);
    }
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating {}", dest_dir.display()))?;
    fetch_archive(&format!("{base_url}{}{name}", set.dir()), &dest)?;
    Ok(dest)
}

fn fetch_archive(url: &str, dest: &Path) -> Result<()> {
    let body = get_bytes_with_retry(url).with_context(|| format!("fetching {url}"))?;
    let part = dest.with_extension("gz.part");
    fs::write(&part, &body).with_context(|| format!("writing {}", part.display()))?;
    fs::rename(&part, dest)?;
    Ok(())
}

/// Archive names out of an HTTPS directory listing.
///
/// Takes `href` anchors ending in `.xml.gz`; checksum files and navigation
/// links fall out. Names come back sorted and deduplicated.
pub fn archive_names(listing: &str) -> Vec<String> {
    let mut names: Vec<String> = listing
        .match_indices("href=\"")
        .filter_map(|(start, marker)| {
            let rest = &listing[start + marker.len()..];
            let name = &rest[..rest.find('"')?];
            (name.ends_with(".xml.gz") && !name.contains('/')).then(|| name.to_string())
        })
        .collect();
    names.sort();
    names.dedup();
    names
}
