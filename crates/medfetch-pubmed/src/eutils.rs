//! NCBI E-utilities client
//!
//! Searches are posted to the history server (esearch with `usehistory=y`),
//! then results are pulled in fixed windows via efetch. Requests are spaced
//! to stay under the unauthenticated rate limit.

use std::thread;
use std::time::Duration;

use medfetch_core::{FetchError, get_text_with_retry};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::decoder::read_text;

pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/";
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Spacing between requests; NCBI allows 3 req/s without an API key.
const REQUEST_SPACING: Duration = Duration::from_millis(340);

pub struct EutilsClient {
    base_url: String,
    batch_size: usize,
}

impl EutilsClient {
    pub fn new(base_url: impl Into<String>, batch_size: usize) -> Self {
        Self {
            base_url: base_url.into(),
            batch_size: batch_size.max(1),
        }
    }

    /// Post a search to the history server and return its handle.
    pub fn search(&self, term: &str) -> Result<SearchSession, FetchError> {
        let url = format!("{}esearch.fcgi", self.base_url);
        let query = [
            ("db", "pubmed".to_string()),
            ("term", term.to_string()),
            ("usehistory", "y".to_string()),
            ("retmax", "0".to_string()),
        ];
        let body = get_text_with_retry(&url, &query)?;
        parse_esearch(&body).ok_or_else(|| FetchError::Http {
            status: None,
            message: "esearch response missing WebEnv/QueryKey/Count".to_string(),
        })
    }

    /// Iterate efetch pages for a posted search.
    pub fn pages<'a>(&'a self, session: &'a SearchSession) -> FetchPages<'a> {
        FetchPages {
            client: self,
            session,
            pager: OffsetPager::new(session.count, self.batch_size),
            fetched_any: false,
            failed: false,
        }
    }
}

impl Default for EutilsClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_BATCH_SIZE)
    }
}

/// Handle to a search parked on the NCBI history server.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSession {
    pub web_env: String,
    pub query_key: String,
    pub count: usize,
}

/// retstart/retmax window calculator, kept separate from I/O.
#[derive(Debug)]
pub struct OffsetPager {
    retstart: usize,
    count: usize,
    batch_size: usize,
}

impl OffsetPager {
    pub fn new(count: usize, batch_size: usize) -> Self {
        Self {
            retstart: 0,
            count,
            batch_size: batch_size.max(1),
        }
    }

    /// Next `(retstart, retmax)` window, or None once the count is covered.
    pub fn next_window(&mut self) -> Option<(usize, usize)> {
        if self.retstart >= self.count {
            return None;
        }
        let window = (
            self.retstart,
            self.batch_size.min(self.count - self.retstart),
        );
        self.retstart += self.batch_size;
        Some(window)
    }
}

/// Iterator over efetch result pages (raw XML bodies).
///
/// Fuses after the first error: a failed window must not be skipped over,
/// so the whole session ends there.
pub struct FetchPages<'a> {
    client: &'a EutilsClient,
    session: &'a SearchSession,
    pager: OffsetPager,
    fetched_any: bool,
    failed: bool,
}

impl Iterator for FetchPages<'_> {
    type Item = Result<String, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (retstart, retmax) = self.pager.next_window()?;
        if self.fetched_any {
            thread::sleep(REQUEST_SPACING);
        }
        self.fetched_any = true;

        let url = format!("{}efetch.fcgi", self.client.base_url);
        let query = [
            ("db", "pubmed".to_string()),
            ("query_key", self.session.query_key.clone()),
            ("WebEnv", self.session.web_env.clone()),
            ("retstart", retstart.to_string()),
            ("retmax", retmax.to_string()),
            ("rettype", "xml".to_string()),
            ("retmode", "xml".to_string()),
        ];
        match get_text_with_retry(&url, &query) {
            Ok(body) => Some(Ok(body)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Extract WebEnv, QueryKey, and Count from an esearch response.
///
/// Only the first Count is taken; translation blocks later in the document
/// carry their own Count elements.
fn parse_esearch(xml: &str) -> Option<SearchSession> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut web_env = None;
    let mut query_key = None;
    let mut count = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"WebEnv" if web_env.is_none() => {
                    web_env = Some(read_text(&mut reader).ok()?);
                }
                b"QueryKey" if query_key.is_none() => {
                    query_key = Some(read_text(&mut reader).ok()?);
                }
                b"Count" if count.is_none() => {
                    count = read_text(&mut reader).ok()?.trim().parse::<usize>().ok();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    Some(SearchSession {
        web_env: web_env?,
        query_key: query_key?,
        count: count?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pager_covers_exact_count() {
        let mut pager = OffsetPager::new(2500, 1000);
        assert_eq!(pager.next_window(), Some((0, 1000)));
        assert_eq!(pager.next_window(), Some((1000, 1000)));
        assert_eq!(pager.next_window(), Some((2000, 500)));
        assert_eq!(pager.next_window(), None);
        assert_eq!(pager.next_window(), None);
    }

    #[test]
    fn pager_with_count_multiple_of_batch() {
        let mut pager = OffsetPager::new(2000, 1000);
        assert_eq!(pager.next_window(), Some((0, 1000)));
        assert_eq!(pager.next_window(), Some((1000, 1000)));
        assert_eq!(pager.next_window(), None);
    }

    #[test]
    fn pager_with_zero_count_yields_nothing() {
        let mut pager = OffsetPager::new(0, 1000);
        assert_eq!(pager.next_window(), None);
    }

    #[test]
    fn pager_with_count_below_batch() {
        let mut pager = OffsetPager::new(42, 1000);
        assert_eq!(pager.next_window(), Some((0, 42)));
        assert_eq!(pager.next_window(), None);
    }

    #[test]
    fn parse_esearch_response() {
        let xml = r#"<?xml version="1.0"?>
<eSearchResult>
  <Count>36420</Count>
  <RetMax>0</RetMax>
  <RetStart>0</RetStart>
  <QueryKey>1</QueryKey>
  <WebEnv>MCID_65f1c1a2b3</WebEnv>
  <TranslationStack>
    <TermSet>
      <Term>cancer[All Fields]</Term>
      <Field>All Fields</Field>
      <Count>999999</Count>
      <Explode>N</Explode>
    </TermSet>
  </TranslationStack>
</eSearchResult>"#;

        let session = parse_esearch(xml).unwrap();
        assert_eq!(session.count, 36420);
        assert_eq!(session.query_key, "1");
        assert_eq!(session.web_env, "MCID_65f1c1a2b3");
    }

    #[test]
    fn pages_fuse_after_a_failure() {
        let client = EutilsClient::new("http://unused.invalid/", 100);
        let session = SearchSession {
            web_env: "MCID_x".to_string(),
            query_key: "1".to_string(),
            count: 500,
        };
        let mut pages = client.pages(&session);
        pages.failed = true;
        assert!(pages.next().is_none());
        // Windows were still pending; the fuse stops the iteration anyway
        // so the failed window is never skipped over.
        assert!(pages.pager.next_window().is_some());
    }

    #[test]
    fn parse_esearch_missing_webenv_is_none() {
        let xml = "<eSearchResult><Count>5</Count><QueryKey>1</QueryKey></eSearchResult>";
        assert!(parse_esearch(xml).is_none());
    }
}
