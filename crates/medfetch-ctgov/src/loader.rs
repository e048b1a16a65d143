//! Partition-file loader for the relational store.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use medfetch_core::dates::str_to_date;
use medfetch_store::{Store, TrialRow};

use crate::record::Trial;

#[derive(Debug, Default)]
pub struct LoadSummary {
    pub loaded: usize,
    /// Records missing an NCT ID or brief title.
    pub skipped: usize,
    /// Lines that failed to parse as JSON.
    pub malformed: usize,
}

/// Load one partition file. All rows commit in a single transaction.
pub fn load_file(path: &Path, store: &Store) -> Result<LoadSummary> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut summary = LoadSummary::default();
    let mut rows = Vec::new();

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let trial: Trial = match serde_json::from_str(&line) {
            Ok(t) => t,
            Err(e) => {
                summary.malformed += 1;
                log::warn!("{}: skipping malformed line: {e}", path.display());
                continue;
            }
        };
        match trial_row(&trial)? {
            Some(row) => rows.push(row),
            None => summary.skipped += 1,
        }
    }

    summary.loaded = store.upsert_trials(&rows)?;
    log::info!(
        "{}: {} loaded, {} skipped, {} malformed",
        path.display(),
        summary.loaded,
        summary.skipped,
        summary.malformed
    );
    Ok(summary)
}

/// Convert to a store row. Requires a non-empty NCT ID and brief title.
fn trial_row(trial: &Trial) -> Result<Option<TrialRow>> {
    let nct_id = trial.nct_id.trim();
    let brief_title = trial.brief_title.trim();
    if nct_id.is_empty() || brief_title.is_empty() {
        return Ok(None);
    }

    Ok(Some(TrialRow {
        nct_id: nct_id.to_string(),
        official_title: trial.official_title.clone(),
        brief_title: brief_title.to_string(),
        org_name: trial.org_name.clone(),
        lead_sponsor: trial.lead_sponsor.clone(),
        collaborators: serde_json::to_string(&trial.collaborators)?,
        brief_summary: trial.brief_summary.clone(),
        conditions: serde_json::to_string(&trial.conditions)?,
        keywords: serde_json::to_string(&trial.keywords)?,
        study_type: trial.study_type.clone(),
        phase: serde_json::to_string(&trial.phase)?,
        city: trial.city.clone(),
        state: trial.state.clone(),
        zip: trial.zip.clone(),
        country: trial.country.clone(),
        status: trial.status.clone(),
        reference_pmid: serde_json::to_string(&trial.reference_pmid)?,
        start_date: typed_date(trial.start_date.as_deref()),
        completion_date: typed_date(trial.completion_date.as_deref()),
        last_update_post_date: typed_date(trial.last_update_post_date.as_deref()),
    }))
}

fn typed_date(s: Option<&str>) -> Option<String> {
    s.and_then(str_to_date).map(|d| d.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;

    fn trial(nct_id: &str, brief_title: &str) -> Trial {
        Trial {
            nct_id: nct_id.to_string(),
            official_title: None,
            brief_title: brief_title.to_string(),
            org_name: None,
            lead_sponsor: None,
            collaborators: vec![],
            brief_summary: None,
            conditions: vec!["Diabetes".to_string()],
            keywords: vec![],
            study_type: None,
            phase: vec![],
            city: None,
            state: None,
            zip: None,
            country: None,
            status: Some("RECRUITING".to_string()),
            reference_pmid: vec![],
            start_date: Some("2024-01-01".to_string()),
            completion_date: None,
            last_update_post_date: Some("2025-03-10".to_string()),
        }
    }

    fn write_partition(dir: &Path, lines: &[String]) -> std::path::PathBuf {
        let path = dir.join("studies_2025.jsonl");
        fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    #[test]
    fn loads_valid_trials() {
        let dir = TempDir::new().unwrap();
        let path = write_partition(
            dir.path(),
            &[
                serde_json::to_string(&trial("NCT00000001", "First")).unwrap(),
                serde_json::to_string(&trial("NCT00000002", "Second")).unwrap(),
            ],
        );

        let store = Store::open_in_memory().unwrap();
        let summary = load_file(&path, &store).unwrap();
        assert_eq!(summary.loaded, 2);
        assert_eq!(store.trial_count().unwrap(), 2);
    }

    #[test]
    fn skips_trials_missing_required_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_partition(
            dir.path(),
            &[
                serde_json::to_string(&trial("NCT00000001", "Kept")).unwrap(),
                serde_json::to_string(&trial("", "No id")).unwrap(),
                serde_json::to_string(&trial("NCT00000003", "  ")).unwrap(),
                "{broken".to_string(),
            ],
        );

        let store = Store::open_in_memory().unwrap();
        let summary = load_file(&path, &store).unwrap();
        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.malformed, 1);
    }

    #[test]
    fn reloading_updates_instead_of_duplicating() {
        let dir = TempDir::new().unwrap();
        let store = Store::open_in_memory().unwrap();

        let path = write_partition(
            dir.path(),
            &[serde_json::to_string(&trial("NCT00000001", "Old")).unwrap()],
        );
        load_file(&path, &store).unwrap();

        let path = write_partition(
            dir.path(),
            &[serde_json::to_string(&trial("NCT00000001", "New")).unwrap()],
        );
        load_file(&path, &store).unwrap();

        assert_eq!(store.trial_count().unwrap(), 1);
    }
}
