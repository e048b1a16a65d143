//! Protocol-section cleanup
//!
//! Flattens the nested v2 study JSON into [`Trial`] records. Studies
//! without an NCT ID or brief title are dropped; everything else degrades
//! to None/empty.

use medfetch_core::dates::expand_date;
use serde_json::Value;

use crate::record::Trial;

/// Normalize every study in one API page. Returns the kept trials and the
/// number of dropped studies.
pub fn normalize_page(page: &Value) -> (Vec<Trial>, usize) {
    let studies = page.get("studies").and_then(Value::as_array);
    let Some(studies) = studies else {
        return (Vec::new(), 0);
    };

    let mut trials = Vec::with_capacity(studies.len());
    let mut skipped = 0;
    for study in studies {
        match normalize_study(study) {
            Some(trial) => trials.push(trial),
            None => skipped += 1,
        }
    }
    (trials, skipped)
}

pub fn normalize_study(study: &Value) -> Option<Trial> {
    let proto = study.get("protocolSection")?;

    let nct_id = text(proto.pointer("/identificationModule/nctId"))?;
    let brief_title = text(proto.pointer("/identificationModule/briefTitle"))?;

    // Sentinel phase lists mean "no phase applies"
    let mut phase = text_list(proto.pointer("/designModule/phases"));
    if phase == ["NA"] {
        phase.clear();
    }

    // Only the first listed location is carried
    let location = proto.pointer("/contactsLocationsModule/locations/0");

    let collaborators = proto
        .pointer("/sponsorCollaboratorsModule/collaborators")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|c| text(c.get("name")))
                .collect()
        })
        .unwrap_or_default();

    let reference_pmid = proto
        .pointer("/referencesModule/references")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|r| text(r.get("pmid")))
                .collect()
        })
        .unwrap_or_default();

    Some(Trial {
        nct_id,
        official_title: text(proto.pointer("/identificationModule/officialTitle")),
        brief_title,
        org_name: text(proto.pointer("/identificationModule/organization/fullName")),
        lead_sponsor: text(proto.pointer("/sponsorCollaboratorsModule/leadSponsor/name")),
        collaborators,
        brief_summary: text(proto.pointer("/descriptionModule/briefSummary")),
        conditions: text_list(proto.pointer("/conditionsModule/conditions")),
        keywords: text_list(proto.pointer("/conditionsModule/keywords")),
        study_type: text(proto.pointer("/designModule/studyType")),
        phase,
        city: text(location.and_then(|l| l.get("city"))),
        state: text(location.and_then(|l| l.get("state"))),
        zip: text(location.and_then(|l| l.get("zip"))),
        country: text(location.and_then(|l| l.get("country"))),
        status: text(proto.pointer("/statusModule/overallStatus")),
        reference_pmid,
        start_date: date(proto.pointer("/statusModule/startDateStruct/date")),
        completion_date: date(proto.pointer("/statusModule/completionDateStruct/date")),
        last_update_post_date: date(proto.pointer("/statusModule/lastUpdatePostDateStruct/date")),
    })
}

/// Trimmed non-empty string value, or None.
fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn text_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|v| text(Some(v)))
                .collect()
        })
        .unwrap_or_default()
}

/// Partial dates (`2025` or `2025-03`) are expanded to full `YYYY-MM-DD`.
fn date(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).and_then(expand_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn study() -> Value {
        json!({
            "protocolSection": {
                "identificationModule": {
                    "nctId": "NCT01234567",
                    "briefTitle": "Metformin in Type 2 Diabetes",
                    "officialTitle": "A Phase 2 Study of Metformin",
                    "organization": { "fullName": "Test University" }
                },
                "statusModule": {
                    "overallStatus": "RECRUITING",
                    "startDateStruct": { "date": "2024-06" },
                    "completionDateStruct": { "date": "2026" },
                    "lastUpdatePostDateStruct": { "date": "2025-03-10" }
                },
                "sponsorCollaboratorsModule": {
                    "leadSponsor": { "name": "Test University" },
                    "collaborators": [
                        { "name": "Partner Hospital" },
                        { "class": "OTHER" }
                    ]
                },
                "descriptionModule": { "briefSummary": "  A study.  " },
                "conditionsModule": {
                    "conditions": ["Type 2 Diabetes", " "],
                    "keywords": ["metformin"]
                },
                "designModule": {
                    "studyType": "INTERVENTIONAL",
                    "phases": ["PHASE2"]
                },
                "contactsLocationsModule": {
                    "locations": [
                        { "city": "Boston", "state": "MA", "zip": "02115", "country": "United States" },
                        { "city": "Chicago" }
                    ]
                },
                "referencesModule": {
                    "references": [
                        { "pmid": "31452104", "type": "BACKGROUND" },
                        { "type": "DERIVED" }
                    ]
                }
            }
        })
    }

    #[test]
    fn flattens_full_study() {
        let trial = normalize_study(&study()).unwrap();
        assert_eq!(trial.nct_id, "NCT01234567");
        assert_eq!(trial.brief_title, "Metformin in Type 2 Diabetes");
        assert_eq!(trial.org_name.as_deref(), Some("Test University"));
        assert_eq!(trial.lead_sponsor.as_deref(), Some("Test University"));
        assert_eq!(trial.brief_summary.as_deref(), Some("A study."));
        assert_eq!(trial.conditions, vec!["Type 2 Diabetes"]);
        assert_eq!(trial.phase, vec!["PHASE2"]);
        assert_eq!(trial.status.as_deref(), Some("RECRUITING"));
    }

    #[test]
    fn requires_nct_id_and_brief_title() {
        let mut s = study();
        s["protocolSection"]["identificationModule"]["nctId"] = json!("  ");
        assert!(normalize_study(&s).is_none());

        let mut s = study();
        s["protocolSection"]["identificationModule"]
            .as_object_mut()
            .unwrap()
            .remove("briefTitle");
        assert!(normalize_study(&s).is_none());
    }

    #[test]
    fn na_phase_list_is_cleared() {
        let mut s = study();
        s["protocolSection"]["designModule"]["phases"] = json!(["NA"]);
        assert!(normalize_study(&s).unwrap().phase.is_empty());
    }

    #[test]
    fn only_named_collaborators_kept() {
        let trial = normalize_study(&study()).unwrap();
        assert_eq!(trial.collaborators, vec!["Partner Hospital"]);
    }

    #[test]
    fn only_first_location_carried() {
        let trial = normalize_study(&study()).unwrap();
        assert_eq!(trial.city.as_deref(), Some("Boston"));
        assert_eq!(trial.state.as_deref(), Some("MA"));
        assert_eq!(trial.country.as_deref(), Some("United States"));
    }

    #[test]
    fn references_without_pmid_dropped() {
        let trial = normalize_study(&study()).unwrap();
        assert_eq!(trial.reference_pmid, vec!["31452104"]);
    }

    #[test]
    fn partial_dates_expanded() {
        let trial = normalize_study(&study()).unwrap();
        assert_eq!(trial.start_date.as_deref(), Some("2024-06-01"));
        assert_eq!(trial.completion_date.as_deref(), Some("2026-01-01"));
        assert_eq!(trial.last_update_post_date.as_deref(), Some("2025-03-10"));
    }

    #[test]
    fn missing_modules_degrade_to_defaults() {
        let s = json!({
            "protocolSection": {
                "identificationModule": {
                    "nctId": "NCT00000001",
                    "briefTitle": "Minimal"
                }
            }
        });
        let trial = normalize_study(&s).unwrap();
        assert_eq!(trial.status, None);
        assert!(trial.conditions.is_empty());
        assert!(trial.phase.is_empty());
        assert_eq!(trial.city, None);
        assert_eq!(trial.last_update_post_date, None);
    }

    #[test]
    fn page_counts_dropped_studies() {
        let page = json!({
            "studies": [
                study(),
                { "protocolSection": { "identificationModule": {} } }
            ]
        });
        let (trials, skipped) = normalize_page(&page);
        assert_eq!(trials.len(), 1);
        assert_eq!(skipped, 1);
    }
}
