//! Cache table projections
//!
//! Each function flattens one source record into the row shape its cache
//! table expects, returning the conflict key alongside the row. Records
//! missing their key (or otherwise unusable) project to None and are
//! counted as skipped by the runner.

use std::collections::HashMap;

use serde_json::{Value, json};

#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub table: &'static str,
    pub conflict_col: &'static str,
}

pub const PUBLICATIONS: TableSpec = TableSpec {
    table: "publications",
    conflict_col: "pubmed_id",
};

pub const CLINICAL_TRIALS: TableSpec = TableSpec {
    table: "clinicaltrials",
    conflict_col: "trial_id",
};

pub const PAYMENTS: TableSpec = TableSpec {
    table: "payments",
    conflict_col: "record_id",
};

pub const PHYSICIANS: TableSpec = TableSpec {
    table: "physicians",
    conflict_col: "npi_id",
};

/// Project a partition-file article into a publications row.
pub fn publication_row(record: &Value) -> Option<(String, Value)> {
    let pmid = text(record.get("pmid"))?;
    let date_published = record.get("date_published").cloned().unwrap_or(Value::Null);
    let year = date_published
        .as_str()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse::<i64>().ok());

    let row = json!({
        "pubmed_id": pmid,
        "title": record.get("title").cloned().unwrap_or(Value::Null),
        "journal": record.get("journal_title").cloned().unwrap_or(Value::Null),
        "publication_type": join_list(record.get("publication_types")),
        "date_published": date_published,
        "year": year,
    });
    Some((pmid, row))
}

/// Project a partition-file trial into a clinicaltrials row.
pub fn clinicaltrial_row(record: &Value) -> Option<(String, Value)> {
    let nct_id = text(record.get("nct_id"))?;

    let row = json!({
        "trial_id": nct_id,
        "title": record.get("brief_title").cloned().unwrap_or(Value::Null),
        "sponsor": record.get("lead_sponsor").cloned().unwrap_or(Value::Null),
        "conditions": join_list(record.get("conditions")),
        "phase": join_list(record.get("phase")),
        "status": record.get("status").cloned().unwrap_or(Value::Null),
        "start_date": record.get("start_date").cloned().unwrap_or(Value::Null),
        "last_update": record.get("last_update_post_date").cloned().unwrap_or(Value::Null),
    });
    Some((nct_id, row))
}

/// Project one Open Payments CSV record into a payments row.
///
/// Records with an unparseable amount are dropped rather than failing the
/// file.
pub fn payment_row(record: &HashMap<String, String>) -> Option<(String, Value)> {
    let record_id = nonblank(record.get("Record_ID"))?;
    let amount: f64 = record
        .get("Total_Amount_of_Payment_USDollars")?
        .trim()
        .parse()
        .ok()?;

    let row = json!({
        "record_id": record_id,
        "npi_id": nonblank(record.get("Covered_Recipient_NPI")),
        "payer": nonblank(record.get(
            "Applicable_Manufacturer_or_Applicable_GPO_Making_Payment_Name"
        )),
        "amount": amount,
        "payment_date": nonblank(record.get("Date_of_Payment")),
        "nature_of_payment": nonblank(record.get("Nature_of_Payment_or_Transfer_of_Value")),
    });
    Some((record_id.to_string(), row))
}

/// Project one NPI registry CSV record into a physicians row.
///
/// Names are title-cased; credentials lose their periods and are
/// uppercased (`M.d.` becomes `MD`).
pub fn physician_row(record: &HashMap<String, String>) -> Option<(String, Value)> {
    let npi = nonblank(record.get("NPI"))?;
    let first = nonblank(record.get("Provider First Name"))?;
    let last = nonblank(record.get("Provider Last Name (Legal Name)"))?;

    let row = json!({
        "npi_id": npi,
        "first_name": title_case(first),
        "last_name": title_case(last),
        "middle_name": nonblank(record.get("Provider Middle Name")).map(title_case),
        "credential": nonblank(record.get("Provider Credential Text")).map(clean_credential),
        "state": nonblank(record.get("Provider Business Practice Location Address State Name")),
    });
    Some((npi.to_string(), row))
}

/// Join a JSON string array with ", "; Null when missing or empty.
fn join_list(value: Option<&Value>) -> Value {
    let joined = value
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    if joined.is_empty() {
        Value::Null
    } else {
        Value::String(joined)
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn nonblank(s: Option<&String>) -> Option<&str> {
    s.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

fn clean_credential(s: &str) -> String {
    s.replace('.', "").trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn publication_row_projects_and_derives_year() {
        let record = json!({
            "pmid": "31452104",
            "title": "Formate assay",
            "journal_title": "Biochemical medicine",
            "publication_types": ["Journal Article", "Review"],
            "date_published": "2021-06-01"
        });
        let (key, row) = publication_row(&record).unwrap();
        assert_eq!(key, "31452104");
        assert_eq!(row["publication_type"], "Journal Article, Review");
        assert_eq!(row["year"], 2021);
    }

    #[test]
    fn publication_row_requires_pmid() {
        assert!(publication_row(&json!({ "title": "No id" })).is_none());
        assert!(publication_row(&json!({ "pmid": " " })).is_none());
    }

    #[test]
    fn publication_row_handles_missing_date() {
        let (_, row) = publication_row(&json!({ "pmid": "1" })).unwrap();
        assert_eq!(row["year"], Value::Null);
        assert_eq!(row["publication_type"], Value::Null);
    }

    #[test]
    fn clinicaltrial_row_joins_lists() {
        let record = json!({
            "nct_id": "NCT01234567",
            "brief_title": "Metformin study",
            "conditions": ["Diabetes", "Obesity"],
            "phase": ["PHASE2", "PHASE3"],
            "status": "RECRUITING"
        });
        let (key, row) = clinicaltrial_row(&record).unwrap();
        assert_eq!(key, "NCT01234567");
        assert_eq!(row["conditions"], "Diabetes, Obesity");
        assert_eq!(row["phase"], "PHASE2, PHASE3");
    }

    #[test]
    fn payment_row_parses_amount() {
        let record = map(&[
            ("Record_ID", "12345"),
            ("Covered_Recipient_NPI", "1003000126"),
            ("Total_Amount_of_Payment_USDollars", "150.75"),
            ("Date_of_Payment", "06/15/2024"),
        ]);
        let (key, row) = payment_row(&record).unwrap();
        assert_eq!(key, "12345");
        assert_eq!(row["amount"], 150.75);
        assert_eq!(row["npi_id"], "1003000126");
    }

    #[test]
    fn payment_row_drops_bad_amounts() {
        let record = map(&[
            ("Record_ID", "12345"),
            ("Total_Amount_of_Payment_USDollars", "n/a"),
        ]);
        assert!(payment_row(&record).is_none());

        let record = map(&[("Total_Amount_of_Payment_USDollars", "1.0")]);
        assert!(payment_row(&record).is_none());
    }

    #[test]
    fn physician_row_cleans_names_and_credentials() {
        let record = map(&[
            ("NPI", "1003000126"),
            ("Provider First Name", "JANE"),
            ("Provider Last Name (Legal Name)", "van der BERG"),
            ("Provider Middle Name", "q"),
            ("Provider Credential Text", "M.d., Ph.D."),
            (
                "Provider Business Practice Location Address State Name",
                "CA",
            ),
        ]);
        let (key, row) = physician_row(&record).unwrap();
        assert_eq!(key, "1003000126");
        assert_eq!(row["first_name"], "Jane");
        assert_eq!(row["last_name"], "Van Der Berg");
        assert_eq!(row["middle_name"], "Q");
        assert_eq!(row["credential"], "MD, PHD");
        assert_eq!(row["state"], "CA");
    }

    #[test]
    fn physician_row_requires_npi_and_names() {
        let record = map(&[("NPI", "1"), ("Provider First Name", "Jane")]);
        assert!(physician_row(&record).is_none());
    }
}
