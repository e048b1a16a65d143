//! Raw article cleanup
//!
//! Turns a [`RawArticle`] into the flat record written to partition files.
//! Articles without a PMID are dropped; every other field degrades to
//! None/empty instead of failing the record.

use medfetch_core::dates::format_date;

use crate::decoder::{RawArticle, RawAuthor};
use crate::record::{Article, Author};

/// Editorial contribution notes that show up in affiliation lists.
const EQUAL_CONTRIBUTION_MARKER: &str = "contributed equally";

/// The history entry whose date becomes `date_published`.
const PUBMED_STATUS: &str = "pubmed";

pub fn normalize(raw: RawArticle) -> Option<Article> {
    let pmid = clean(raw.pmid.as_deref())?;

    let date_published = raw
        .history
        .iter()
        .find(|h| h.status.as_deref() == Some(PUBMED_STATUS))
        .and_then(|h| format_date(h.year.as_deref(), h.month.as_deref(), h.day.as_deref()));

    let parts: Vec<&str> = raw
        .abstract_parts
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    let abstract_text = (!parts.is_empty()).then(|| parts.join(" "));

    Some(Article {
        pmid,
        publication_types: clean_list(&raw.publication_types),
        title: clean(raw.title.as_deref()),
        journal_title: clean(raw.journal_title.as_deref()),
        authors: raw.authors.into_iter().map(normalize_author).collect(),
        abstract_text,
        mesh_terms: clean_list(&raw.mesh_terms),
        date_published,
        language: clean(raw.language.as_deref()),
    })
}

fn normalize_author(raw: RawAuthor) -> Author {
    let fore = raw.fore_name.as_deref().unwrap_or("");
    let last = raw.last_name.as_deref().unwrap_or("");
    let name = format!("{fore} {last}").trim().to_string();

    let affiliations = raw
        .affiliations
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && !s.to_lowercase().contains(EQUAL_CONTRIBUTION_MARKER))
        .map(str::to_string)
        .collect();

    Author {
        full_name: (!name.is_empty()).then_some(name),
        affiliations,
    }
}

fn clean(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
