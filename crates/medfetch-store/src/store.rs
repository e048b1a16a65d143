//! DuckDB-backed store for loaded articles and trials.
//!
//! List-valued fields (authors, conditions, ...) are stored as JSON text;
//! DuckDB can unnest them with its JSON functions when needed. Upserts go
//! through `INSERT OR REPLACE` on the primary key, one transaction per
//! call so a partition file loads atomically.

use std::path::Path;

use anyhow::{Context, Result};
use duckdb::{Connection, params};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pubmed (
    pmid              BIGINT PRIMARY KEY,
    publication_types VARCHAR,
    title             VARCHAR NOT NULL,
    journal_title     VARCHAR,
    authors           VARCHAR,
    abstract          VARCHAR,
    mesh_terms        VARCHAR,
    date_published    DATE,
    language          VARCHAR
);

CREATE TABLE IF NOT EXISTS clinicaltrials (
    nct_id                VARCHAR PRIMARY KEY,
    official_title        VARCHAR,
    brief_title           VARCHAR NOT NULL,
    org_name              VARCHAR,
    lead_sponsor          VARCHAR,
    collaborators         VARCHAR,
    brief_summary         VARCHAR,
    conditions            VARCHAR,
    keywords              VARCHAR,
    study_type            VARCHAR,
    phase                 VARCHAR,
    city                  VARCHAR,
    state                 VARCHAR,
    zip                   VARCHAR,
    country               VARCHAR,
    status                VARCHAR,
    reference_pmid        VARCHAR,
    start_date            DATE,
    completion_date       DATE,
    last_update_post_date DATE
);
";

/// One row of the `pubmed` table. List fields arrive pre-serialized as JSON.
#[derive(Debug, Clone)]
pub struct ArticleRow {
    pub pmid: i64,
    pub publication_types: String,
    pub title: String,
    pub journal_title: Option<String>,
    pub authors: String,
    pub abstract_text: Option<String>,
    pub mesh_terms: String,
    pub date_published: Option<String>,
    pub language: Option<String>,
}

/// One row of the `clinicaltrials` table.
#[derive(Debug, Clone)]
pub struct TrialRow {
    pub nct_id: String,
    pub official_title: Option<String>,
    pub brief_title: String,
    pub org_name: Option<String>,
    pub lead_sponsor: Option<String>,
    pub collaborators: String,
    pub brief_summary: Option<String>,
    pub conditions: String,
    pub keywords: String,
    pub study_type: Option<String>,
    pub phase: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub status: Option<String>,
    pub reference_pmid: String,
    pub start_date: Option<String>,
    pub completion_date: Option<String>,
    pub last_update_post_date: Option<String>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening store at {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("creating store schema")?;
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Upsert article rows in one transaction.
    pub fn upsert_articles(&self, rows: &[ArticleRow]) -> Result<usize> {
        self.in_transaction(|conn| {
            let mut stmt = conn.prepare(
                "INSERT OR REPLACE INTO pubmed
                 (pmid, publication_types, title, journal_title, authors,
                  abstract, mesh_terms, date_published, language)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.pmid,
                    row.publication_types,
                    row.title,
                    row.journal_title,
                    row.authors,
                    row.abstract_text,
                    row.mesh_terms,
                    row.date_published,
                    row.language,
                ])?;
            }
            Ok(rows.len())
        })
    }

    /// Upsert trial rows in one transaction.
    pub fn upsert_trials(&self, rows: &[TrialRow]) -> Result<usize> {
        self.in_transaction(|conn| {
            let mut stmt = conn.prepare(
                "INSERT OR REPLACE INTO clinicaltrials
                 (nct_id, official_title, brief_title, org_name, lead_sponsor,
                  collaborators, brief_summary, conditions, keywords, study_type,
                  phase, city, state, zip, country, status, reference_pmid,
                  start_date, completion_date, last_update_post_date)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.nct_id,
                    row.official_title,
                    row.brief_title,
                    row.org_name,
                    row.lead_sponsor,
                    row.collaborators,
                    row.brief_summary,
                    row.conditions,
                    row.keywords,
                    row.study_type,
                    row.phase,
                    row.city,
                    row.state,
                    row.zip,
                    row.country,
                    row.status,
                    row.reference_pmid,
                    row.start_date,
                    row.completion_date,
                    row.last_update_post_date,
                ])?;
            }
            Ok(rows.len())
        })
    }

    pub fn article_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pubmed", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn trial_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM clinicaltrials", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn in_transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        match f(&self.conn) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    log::error!("rollback failed: {rollback}");
                }
                Err(e)
            }
        }
    }
}
