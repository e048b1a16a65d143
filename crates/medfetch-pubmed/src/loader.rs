//! Partition-file loader for the relational store.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use medfetch_core::dates::str_to_date;
use medfetch_store::{ArticleRow, Store};

use crate::record::Article;

#[derive(Debug, Default)]
pub struct LoadSummary {
    pub loaded: usize,
    /// Records missing a numeric PMID or a title.
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
        let article: Article = match serde_json::from_str(&line) {
            Ok(a) => a,
            Err(e) => {
                summary.malformed += 1;
                log::warn!("{}: skipping malformed line: {e}", path.display());
                continue;
            }
        };
        match article_row(&article)? {
            Some(row) => rows.push(row),
            None => summary.skipped += 1,
        }
    }

    summary.loaded = store.upsert_articles(&rows)?;
    log::info!(
        "{}: {} loaded, {} skipped, {} malformed",
        path.display(),
        summary.loaded,
        summary.skipped,
        summary.malformed
    );
    Ok(summary)
}

/// Convert to a store row. Requires a numeric PMID and a non-empty title.
fn article_row(article: &Article) -> Result<Option<ArticleRow>> {
    let Ok(pmid) = article.pmid.trim().parse::<i64>() else {
        return Ok(None);
    };
    let Some(title) = article
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return Ok(None);
    };

    Ok(Some(ArticleRow {
        pmid,
        publication_types: serde_json::to_string(&article.publication_types)?,
        title: title.to_string(),
        journal_title: article.journal_title.clone(),
        authors: serde_json::to_string(&article.authors)?,
        abstract_text: article.abstract_text.clone(),
        mesh_terms: serde_json::to_string(&article.mesh_terms)?,
        date_published: article
            .date_published
            .as_deref()
            .and_then(str_to_date)
            .map(|d| d.to_string()),
        language: article.language.clone(),
    }))
}
