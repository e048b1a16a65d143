//! Normalized article records as they appear in partition files.

use medfetch_core::partition::PartitionRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub full_name: Option<String>,
    pub affiliations: Vec<String>,
}

/// One normalized PubMed article. `pmid` is the only required field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub pmid: String,
    pub publication_types: Vec<String>,
    pub title: Option<String>,
    pub journal_title: Option<String>,
    pub authors: Vec<Author>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub mesh_terms: Vec<String>,
    pub date_published: Option<String>,
    pub language: Option<String>,
}

impl PartitionRecord for Article {
    fn key(&self) -> &str {
        &self.pmid
    }

    fn partition(&self) -> String {
        self.date_published
            .as_deref()
            .and_then(|d| d.get(..4))
            .map(str::to_string)
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }
}
