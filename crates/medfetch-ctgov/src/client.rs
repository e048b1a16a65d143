//! ClinicalTrials.gov v2 API client
//!
//! The studies endpoint pages with opaque tokens: each response carries a
//! `nextPageToken` until the result set is exhausted. Queries are scoped
//! to a last-update date window via a structured search expression.

use std::thread;
use std::time::Duration;

use medfetch_core::{FetchError, get_text_with_retry};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://clinicaltrials.gov/api/v2/";
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Only the protocol section is needed downstream.
const FIELDS: &str = "ProtocolSection";

const REQUEST_SPACING: Duration = Duration::from_millis(340);

/// Parameters for one studies query.
#[derive(Debug, Clone)]
pub struct StudyQuery {
    /// Optional free-text term, ANDed with the date window.
    pub term: Option<String>,
    /// Inclusive last-update window, `YYYY-MM-DD`.
    pub from: String,
    pub to: String,
    pub page_size: usize,
    /// Stop after this many studies; the page in flight still completes.
    pub max_count: Option<usize>,
}

impl StudyQuery {
    /// Query covering one calendar year of updates.
    pub fn for_year(year: i32) -> Self {
        Self {
            term: None,
            from: format!("{year}-01-01"),
            to: format!("{year}-12-31"),
            page_size: DEFAULT_PAGE_SIZE,
            max_count: None,
        }
    }

    /// The structured `query.term` expression.
    pub fn term_expr(&self) -> String {
        let range = format!("AREA[LastUpdatePostDate]RANGE[{},{}]", self.from, self.to);
        match self.term.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => format!("({term}) AND {range}"),
            _ => range,
        }
    }
}

impl Default for StudyQuery {
    fn default() -> Self {
        Self::for_year(2025)
    }
}

/// Token/cap bookkeeping for the page loop, kept separate from I/O.
#[derive(Debug, Default)]
pub struct PageCursor {
    token: Option<String>,
    fetched: usize,
    done: bool,
}

impl PageCursor {
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Record a received page. The cap is applied after the full page, so a
    /// page is never cut off in the middle.
    pub fn advance(&mut self, page: &Value, max_count: Option<usize>) {
        self.fetched += page
            .get("studies")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        self.token = page
            .get("nextPageToken")
            .and_then(Value::as_str)
            .map(String::from);
        if self.token.is_none() || max_count.is_some_and(|m| self.fetched >= m) {
            self.done = true;
        }
    }
}

pub struct CtgovClient {
    base_url: String,
}

impl CtgovClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Iterate result pages for a query.
    pub fn pages<'a>(&'a self, query: &'a StudyQuery) -> StudyPages<'a> {
        StudyPages {
            client: self,
            query,
            cursor: PageCursor::default(),
            fetched_any: false,
            failed: false,
        }
    }
}

impl Default for CtgovClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Iterator over studies pages (parsed JSON bodies).
pub struct StudyPages<'a> {
    client: &'a CtgovClient,
    query: &'a StudyQuery,
    cursor: PageCursor,
    fetched_any: bool,
    failed: bool,
}

impl Iterator for StudyPages<'_> {
    type Item = Result<Value, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.is_done() {
            return None;
        }
        if self.fetched_any {
            thread::sleep(REQUEST_SPACING);
        }
        self.fetched_any = true;

        let url = format!("{}studies", self.client.base_url);
        let mut params = vec![
            ("format", "json".to_string()),
            ("query.term", self.query.term_expr()),
            ("fields", FIELDS.to_string()),
            ("pageSize", self.query.page_size.to_string()),
        ];
        if let Some(token) = self.cursor.token() {
            params.push(("pageToken", token.to_string()));
        }

        let body = match get_text_with_retry(&url, &params) {
            Ok(body) => body,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };
        let page: Value = match serde_json::from_str(&body) {
            Ok(page) => page,
            Err(e) => {
                self.failed = true;
                return Some(Err(FetchError::Http {
                    status: None,
                    message: format!("invalid studies page: {e}"),
                }));
            }
        };
        self.cursor.advance(&page, self.query.max_count);
        Some(Ok(page))
    }
}
