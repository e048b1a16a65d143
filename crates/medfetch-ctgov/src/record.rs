//! Normalized trial records as they appear in partition files.

use medfetch_core::partition::PartitionRecord;
use serde::{Deserialize, Serialize};

/// One normalized study. `nct_id` and `brief_title` are required; studies
/// missing either are dropped during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub nct_id: String,
    pub official_title: Option<String>,
    pub brief_title: String,
    pub org_name: Option<String>,
    pub lead_sponsor: Option<String>,
    pub collaborators: Vec<String>,
    pub brief_summary: Option<String>,
    pub conditions: Vec<String>,
    pub keywords: Vec<String>,
    pub study_type: Option<String>,
    pub phase: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub status: Option<String>,
    pub reference_pmid: Vec<String>,
    pub start_date: Option<String>,
    pub completion_date: Option<String>,
    pub last_update_post_date: Option<String>,
}

impl PartitionRecord for Trial {
    fn key(&self) -> &str {
        &self.nct_id
    }

    fn partition(&self) -> String {
        self.last_update_post_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .map(str::to_string)
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_by_last_update_year() {
        let mut trial = Trial {
            nct_id: "NCT00000001".to_string(),
            official_title: None,
            brief_title: "t".to_string(),
            org_name: None,
            lead_sponsor: None,
            collaborators: vec![],
            brief_summary: None,
            conditions: vec![],
            keywords: vec![],
            study_type: None,
            phase: vec![],
            city: None,
            state: None,
            zip: None,
            country: None,
            status: None,
            reference_pmid: vec![],
            start_date: Some("2020-01-01".to_string()),
            completion_date: None,
            last_update_post_date: Some("2025-03-10".to_string()),
        };
        assert_eq!(trial.partition(), "2025");

        trial.last_update_post_date = None;
        assert_eq!(trial.partition(), "UNKNOWN");
    }
}
