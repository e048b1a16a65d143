//! medfetch-pubmed - PubMed ingestion
//!
//! Downloads baseline/update archives from the NCBI distribution, streams
//! articles out of them or the E-utilities API, normalizes them, exports
//! year-partitioned JSONL, and loads partition files into the relational
//! store.

pub mod decoder;
pub mod download;
pub mod eutils;
pub mod exporter;
pub mod loader;
pub mod normalize;
pub mod record;

pub use decoder::{ArticleStream, RawArticle, parse_articles};
pub use download::{ArchiveSet, DownloadSummary, download_archive, download_archives};
pub use eutils::{EutilsClient, OffsetPager, SearchSession};
pub use exporter::{ExportSummary, export_archive, export_search};
pub use loader::{LoadSummary, load_file};
pub use normalize::normalize;
pub use record::{Article, Author};
