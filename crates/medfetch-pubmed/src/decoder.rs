//! Streaming decoder for PubMed baseline/update archives
//!
//! Pulls `<PubmedArticle>` elements out of gzip-compressed XML one at a time
//! without materializing the document. Captured fields stay raw; cleanup
//! lives in [`crate::normalize`].

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Article fields as they appear in the XML, untrimmed.
#[derive(Debug, Default)]
pub struct RawArticle {
    pub pmid: Option<String>,
    pub title: Option<String>,
    pub abstract_parts: Vec<String>,
    pub journal_title: Option<String>,
    pub language: Option<String>,
    pub authors: Vec<RawAuthor>,
    pub publication_types: Vec<String>,
    pub mesh_terms: Vec<String>,
    pub history: Vec<HistoryDate>,
}

#[derive(Debug, Default)]
pub struct RawAuthor {
    pub fore_name: Option<String>,
    pub last_name: Option<String>,
    pub affiliations: Vec<String>,
}

/// One `<PubMedPubDate>` entry from the citation history.
#[derive(Debug, Default)]
pub struct HistoryDate {
    pub status: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
}

/// Parse every article in an XML document (efetch pages, tests).
pub fn parse_articles(xml: &str) -> Result<Vec<RawArticle>> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut articles = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"PubmedArticle" => {
                match parse_article(&mut reader) {
                    Ok(article) => articles.push(article),
                    Err(e) => log::debug!("Failed to parse article: {e}"),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e).context("XML parse error"),
            _ => {}
        }
        buf.clear();
    }

    Ok(articles)
}

/// Iterator over the articles in a compressed archive.
///
/// Decompression and XML faults terminate the stream after a log line;
/// everything decoded up to that point stands.
pub struct ArticleStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl ArticleStream<BufReader<GzDecoder<File>>> {
    /// Open a `.xml.gz` archive for streaming.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(GzDecoder::new(file))))
    }
}

impl<R: BufRead> ArticleStream<R> {
    pub fn from_reader(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for ArticleStream<R> {
    type Item = RawArticle;

    fn next(&mut self) -> Option<RawArticle> {
        if self.done {
            return None;
        }
        loop {
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) if e.name().as_ref() == b"PubmedArticle" => {
                    match parse_article(&mut self.reader) {
                        Ok(article) => {
                            self.buf.clear();
                            return Some(article);
                        }
                        Err(e) => log::debug!("Failed to parse article: {e}"),
                    }
                }
                Ok(Event::Eof) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    log::error!("archive stream aborted: {e}");
                    self.done = true;
                    return None;
                }
                _ => {}
            }
            self.buf.clear();
        }
    }
}

fn parse_article<R: BufRead>(reader: &mut Reader<R>) -> Result<RawArticle> {
    let mut article = RawArticle::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"MedlineCitation" => parse_citation(reader, &mut article)?,
                b"PubmedData" => parse_pubmed_data(reader, &mut article)?,
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"PubmedArticle" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(article)
}

fn parse_citation<R: BufRead>(reader: &mut Reader<R>, article: &mut RawArticle) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                // Linked citations carry their own PMID elements; keep the first
                b"PMID" if article.pmid.is_none() => article.pmid = Some(read_text(reader)?),
                b"CommentsCorrectionsList" => skip_element(reader, b"CommentsCorrectionsList")?,
                b"Article" => parse_article_element(reader, article)?,
                b"MeshHeadingList" => article.mesh_terms = parse_mesh_list(reader)?,
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"MedlineCitation" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn parse_article_element<R: BufRead>(
    reader: &mut Reader<R>,
    article: &mut RawArticle,
) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"Journal" => parse_journal(reader, article)?,
                b"ArticleTitle" => {
                    article.title = Some(read_text_content(reader, b"ArticleTitle")?)
                }
                b"Abstract" => article.abstract_parts = parse_abstract(reader)?,
                b"AuthorList" => article.authors = parse_author_list(reader)?,
                b"Language" => article.language = Some(read_text(reader)?),
                b"PublicationTypeList" => article.publication_types = parse_pub_type_list(reader)?,
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"Article" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn parse_journal<R: BufRead>(reader: &mut Reader<R>, article: &mut RawArticle) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"Title" => {
                article.journal_title = Some(read_text(reader)?);
            }
            Event::End(e) if e.name().as_ref() == b"Journal" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Collect every `<AbstractText>` segment, in document order.
fn parse_abstract<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<String>> {
    let mut buf = Vec::new();
    let mut parts = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"AbstractText" => {
                parts.push(read_text_content(reader, b"AbstractText")?);
            }
            Event::End(e) if e.name().as_ref() == b"Abstract" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(parts)
}

fn parse_author_list<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<RawAuthor>> {
    let mut authors = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"Author" => {
                authors.push(parse_author(reader)?);
            }
            Event::End(e) if e.name().as_ref() == b"AuthorList" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(authors)
}

fn parse_author<R: BufRead>(reader: &mut Reader<R>) -> Result<RawAuthor> {
    let mut author = RawAuthor::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"LastName" => author.last_name = Some(read_text(reader)?),
                b"ForeName" => author.fore_name = Some(read_text(reader)?),
                b"AffiliationInfo" => {
                    if let Some(aff) = parse_affiliation(reader)? {
                        author.affiliations.push(aff);
                    }
                }
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"Author" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(author)
}

fn parse_affiliation<R: BufRead>(reader: &mut Reader<R>) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let mut affiliation = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"Affiliation" => {
                affiliation = Some(read_text(reader)?);
            }
            Event::End(e) if e.name().as_ref() == b"AffiliationInfo" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(affiliation)
}

/// Descriptor names only; qualifiers are not carried.
fn parse_mesh_list<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<String>> {
    let mut terms = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"DescriptorName" => {
                terms.push(read_text(reader)?);
            }
            Event::End(e) if e.name().as_ref() == b"MeshHeadingList" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(terms)
}

fn parse_pub_type_list<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<String>> {
    let mut types = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"PublicationType" => {
                types.push(read_text(reader)?);
            }
            Event::End(e) if e.name().as_ref() == b"PublicationTypeList" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(types)
}

fn parse_pubmed_data<R: BufRead>(reader: &mut Reader<R>, article: &mut RawArticle) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"History" => {
                parse_history(reader, &mut article.history)?;
            }
            Event::End(e) if e.name().as_ref() == b"PubmedData" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn parse_history<R: BufRead>(reader: &mut Reader<R>, history: &mut Vec<HistoryDate>) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"PubMedPubDate" => {
                let mut entry = HistoryDate::default();
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"PubStatus" {
                        entry.status = Some(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
                parse_history_date(reader, &mut entry)?;
                history.push(entry);
            }
            Event::End(e) if e.name().as_ref() == b"History" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn parse_history_date<R: BufRead>(reader: &mut Reader<R>, entry: &mut HistoryDate) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"Year" => entry.year = Some(read_text(reader)?),
                b"Month" => entry.month = Some(read_text(reader)?),
                b"Day" => entry.day = Some(read_text(reader)?),
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"PubMedPubDate" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn skip_element<R: BufRead>(reader: &mut Reader<R>, end_tag: &[u8]) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(e) => {
                depth -= 1;
                if depth == 0 && e.name().as_ref() == end_tag {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Read text content until the next end tag
pub(crate) fn read_text<R: BufRead>(reader: &mut Reader<R>) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::End(_) => break,
            Event::Start(_) => {
                // Nested formatting elements (<i>, <sup>, ...)
                text.push_str(&read_text(reader)?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

/// Read text content of a specific element, handling nested tags
fn read_text_content<R: BufRead>(reader: &mut Reader<R>, end_tag: &[u8]) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::Start(_) => depth += 1,
            Event::End(e) => {
                depth -= 1;
                if depth == 0 && e.name().as_ref() == end_tag {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    const SAMPLE_XML: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE">
      <PMID Version="1">31452104</PMID>
      <Article PubModel="Print">
        <Journal>
          <ISSN IssnType="Print">0006-2944</ISSN>
          <Title>Biochemical medicine</Title>
          <ISOAbbreviation>Biochem Med</ISOAbbreviation>
        </Journal>
        <ArticleTitle>Formate assay in <i>body fluids</i>.</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">First part.</AbstractText>
          <AbstractText Label="METHODS">Second part.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y">
            <LastName>Makar</LastName>
            <ForeName>A B</ForeName>
            <Initials>AB</Initials>
            <AffiliationInfo>
              <Affiliation>University of Test</Affiliation>
            </AffiliationInfo>
          </Author>
          <Author ValidYN="Y">
            <LastName>McMartin</LastName>
          </Author>
        </AuthorList>
        <Language>eng</Language>
        <PublicationTypeList>
          <PublicationType UI="D016428">Journal Article</PublicationType>
          <PublicationType UI="D016454">Review</PublicationType>
        </PublicationTypeList>
      </Article>
      <MeshHeadingList>
        <MeshHeading>
          <DescriptorName UI="D005561" MajorTopicYN="Y">Formates</DescriptorName>
          <QualifierName UI="Q000032" MajorTopicYN="Y">analysis</QualifierName>
        </MeshHeading>
        <MeshHeading>
          <DescriptorName UI="D000818" MajorTopicYN="N">Animals</DescriptorName>
        </MeshHeading>
      </MeshHeadingList>
    </MedlineCitation>
    <PubmedData>
      <History>
        <PubMedPubDate PubStatus="received">
          <Year>1975</Year>
          <Month>1</Month>
          <Day>2</Day>
        </PubMedPubDate>
        <PubMedPubDate PubStatus="pubmed">
          <Year>1975</Year>
          <Month>6</Month>
          <Day>1</Day>
        </PubMedPubDate>
      </History>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>2</PMID>
      <Article>
        <ArticleTitle>Second article</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn parses_core_fields() {
        let articles = parse_articles(SAMPLE_XML).unwrap();
        assert_eq!(articles.len(), 2);

        let a = &articles[0];
        assert_eq!(a.pmid.as_deref(), Some("31452104"));
        assert_eq!(a.title.as_deref(), Some("Formate assay in body fluids."));
        assert_eq!(a.journal_title.as_deref(), Some("Biochemical medicine"));
        assert_eq!(a.language.as_deref(), Some("eng"));
        assert_eq!(a.abstract_parts, vec!["First part.", "Second part."]);
        assert_eq!(a.publication_types, vec!["Journal Article", "Review"]);
        assert_eq!(a.mesh_terms, vec!["Formates", "Animals"]);
    }

    #[test]
    fn parses_authors_and_affiliations() {
        let articles = parse_articles(SAMPLE_XML).unwrap();
        let authors = &articles[0].authors;

        assert_eq!(authors.len(), 2);
        assert_eq!(authors[0].fore_name.as_deref(), Some("A B"));
        assert_eq!(authors[0].last_name.as_deref(), Some("Makar"));
        assert_eq!(authors[0].affiliations, vec!["University of Test"]);
        assert_eq!(authors[1].fore_name, None);
        assert!(authors[1].affiliations.is_empty());
    }

    #[test]
    fn parses_history_with_status_attributes() {
        let articles = parse_articles(SAMPLE_XML).unwrap();
        let history = &articles[0].history;

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status.as_deref(), Some("received"));
        assert_eq!(history[1].status.as_deref(), Some("pubmed"));
        assert_eq!(history[1].year.as_deref(), Some("1975"));
        assert_eq!(history[1].month.as_deref(), Some("6"));
        assert_eq!(history[1].day.as_deref(), Some("1"));
    }

    #[test]
    fn linked_citation_pmids_are_not_captured() {
        let xml = r#"<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>100</PMID>
      <CommentsCorrectionsList>
        <CommentsCorrections RefType="ErratumIn">
          <PMID>999</PMID>
        </CommentsCorrections>
      </CommentsCorrectionsList>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

        let articles = parse_articles(xml).unwrap();
        assert_eq!(articles[0].pmid.as_deref(), Some("100"));
    }

    #[test]
    fn parse_empty_set() {
        let articles = parse_articles("<PubmedArticleSet></PubmedArticleSet>").unwrap();
        assert!(articles.is_empty());
    }

    #[test]
    fn streams_articles_from_gzip_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pubmed25n0001.xml.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::fast());
        encoder.write_all(SAMPLE_XML.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let articles: Vec<_> = ArticleStream::open(&path).unwrap().collect();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].pmid.as_deref(), Some("31452104"));
        assert_eq!(articles[1].pmid.as_deref(), Some("2"));
    }

    #[test]
    fn truncated_archive_yields_decoded_prefix() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(SAMPLE_XML.as_bytes()).unwrap();
        let full = encoder.finish().unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pubmed25n0001.xml.gz");
        std::fs::write(&path, &full[..full.len() / 2]).unwrap();

        // Must terminate without panicking; a prefix of articles may come out.
        let articles: Vec<_> = ArticleStream::open(&path).unwrap().collect();
        assert!(articles.len() <= 2);
    }
}
