//! Directory walkers feeding the upsert sink.
//!
//! Partitioned JSONL exports are walked per year directory; CSV extracts
//! are matched by glob. Each file gets its own batcher so a failure stops
//! at a file boundary.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use medfetch_core::is_shutdown_requested;
use serde_json::Value;

use crate::sink::{SinkStats, UpsertBatcher, UpsertTransport};
use crate::tables::{self, TableSpec};

/// Push exported articles for the given years into the publications table.
pub fn cache_publications<T: UpsertTransport>(
    transport: &mut T,
    dir: &Path,
    years: &[i32],
) -> Result<SinkStats> {
    cache_jsonl(transport, dir, years, &tables::PUBLICATIONS, tables::publication_row)
}

/// Push exported trials for the given years into the clinicaltrials table.
pub fn cache_trials<T: UpsertTransport>(
    transport: &mut T,
    dir: &Path,
    years: &[i32],
) -> Result<SinkStats> {
    cache_jsonl(transport, dir, years, &tables::CLINICAL_TRIALS, tables::clinicaltrial_row)
}

/// Push Open Payments extracts (`*{year}.csv`) into the payments table.
pub fn cache_payments<T: UpsertTransport>(
    transport: &mut T,
    dir: &Path,
    years: &[i32],
) -> Result<SinkStats> {
    let mut total = SinkStats::default();
    for &year in years {
        for path in matching_files(dir, &format!("*{year}.csv"))? {
            if is_shutdown_requested() {
                log::warn!("interrupted before {}", path.display());
                return Ok(total);
            }
            total.absorb(cache_csv_file(
                transport,
                &path,
                &tables::PAYMENTS,
                tables::payment_row,
            )?);
        }
    }
    Ok(total)
}

/// Push NPI registry extracts matching `pattern` into the physicians table.
pub fn cache_physicians<T: UpsertTransport>(
    transport: &mut T,
    dir: &Path,
    pattern: &str,
) -> Result<SinkStats> {
    let mut total = SinkStats::default();
    for path in matching_files(dir, pattern)? {
        if is_shutdown_requested() {
            log::warn!("interrupted before {}", path.display());
            return Ok(total);
        }
        total.absorb(cache_csv_file(
            transport,
            &path,
            &tables::PHYSICIANS,
            tables::physician_row,
        )?);
    }
    Ok(total)
}

fn cache_jsonl<T: UpsertTransport>(
    transport: &mut T,
    dir: &Path,
    years: &[i32],
    spec: &TableSpec,
    project: fn(&Value) -> Option<(String, Value)>,
) -> Result<SinkStats> {
    let mut total = SinkStats::default();
    for &year in years {
        let year_dir = dir.join(year.to_string());
        if !year_dir.is_dir() {
            log::debug!("no partition directory for {year}");
            continue;
        }
        for path in matching_files(&year_dir, "*.jsonl")? {
            if is_shutdown_requested() {
                log::warn!("interrupted before {}", path.display());
                return Ok(total);
            }
            total.absorb(cache_jsonl_file(transport, &path, spec, project)?);
        }
    }
    Ok(total)
}

fn cache_jsonl_file<T: UpsertTransport>(
    transport: &mut T,
    path: &Path,
    spec: &TableSpec,
    project: fn(&Value) -> Option<(String, Value)>,
) -> Result<SinkStats> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut batcher = UpsertBatcher::new(transport, spec);
    let mut skipped = 0usize;

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                skipped += 1;
                log::warn!("{}: skipping malformed line: {e}", path.display());
                continue;
            }
        };
        match project(&record) {
            Some((key, row)) => batcher.push(key, row)?,
            None => skipped += 1,
        }
    }

    let stats = batcher.finish()?;
    log::info!(
        "{}: {} row(s) sent in {} call(s), {} skipped",
        path.display(),
        stats.rows_sent,
        stats.upsert_calls,
        skipped
    );
    Ok(stats)
}

fn cache_csv_file<T: UpsertTransport>(
    transport: &mut T,
    path: &Path,
    spec: &TableSpec,
    project: fn(&HashMap<String, String>) -> Option<(String, Value)>,
) -> Result<SinkStats> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut batcher = UpsertBatcher::new(transport, spec);
    let mut skipped = 0usize;

    for result in reader.deserialize::<HashMap<String, String>>() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                skipped += 1;
                log::warn!("{}: skipping malformed record: {e}", path.display());
                continue;
            }
        };
        match project(&record) {
            Some((key, row)) => batcher.push(key, row)?,
            None => skipped += 1,
        }
    }

    let stats = batcher.finish()?;
    log::info!(
        "{}: {} row(s) sent in {} call(s), {} skipped",
        path.display(),
        stats.rows_sent,
        stats.upsert_calls,
        skipped
    );
    Ok(stats)
}

fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = dir.join(pattern);
    let mut files: Vec<_> = glob::glob(&full.to_string_lossy())
        .with_context(|| format!("bad glob pattern {}", full.display()))?
        .filter_map(Result::ok)
        .collect();
    files.sort();
    Ok(files)
}
