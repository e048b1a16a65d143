//! Case-insensitive substring search over the loaded tables.

use anyhow::Result;
use duckdb::params;

use crate::store::Store;

#[derive(Debug)]
pub struct ArticleHit {
    pub pmid: i64,
    pub title: String,
    pub journal_title: Option<String>,
    pub date_published: Option<String>,
}

#[derive(Debug)]
pub struct TrialHit {
    pub nct_id: String,
    pub brief_title: String,
    pub status: Option<String>,
    pub last_update_post_date: Option<String>,
}

impl Store {
    /// Articles whose title or abstract contains `term`, newest first.
    pub fn search_articles(&self, term: &str, limit: usize) -> Result<Vec<ArticleHit>> {
        let mut stmt = self.conn().prepare(
            "SELECT pmid, title, journal_title, CAST(date_published AS VARCHAR)
             FROM pubmed
             WHERE title ILIKE '%' || ? || '%' OR abstract ILIKE '%' || ? || '%'
             ORDER BY date_published DESC NULLS LAST, pmid
             LIMIT ?",
        )?;
        let rows = stmt.query_map(params![term, term, limit as i64], |row| {
            Ok(ArticleHit {
                pmid: row.get(0)?,
                title: row.get(1)?,
                journal_title: row.get(2)?,
                date_published: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Trials whose titles or summary contain `term`, most recently updated first.
    pub fn search_trials(&self, term: &str, limit: usize) -> Result<Vec<TrialHit>> {
        let mut stmt = self.conn().prepare(
            "SELECT nct_id, brief_title, status, CAST(last_update_post_date AS VARCHAR)
             FROM clinicaltrials
             WHERE brief_title ILIKE '%' || ? || '%'
                OR official_title ILIKE '%' || ? || '%'
                OR brief_summary ILIKE '%' || ? || '%'
             ORDER BY last_update_post_date DESC NULLS LAST, nct_id
             LIMIT ?",
        )?;
        let rows = stmt.query_map(params![term, term, term, limit as i64], |row| {
            Ok(TrialHit {
                nct_id: row.get(0)?,
                brief_title: row.get(1)?,
                status: row.get(2)?,
                last_update_post_date: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
