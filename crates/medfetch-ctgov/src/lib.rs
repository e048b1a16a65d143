//! medfetch-ctgov - ClinicalTrials.gov ingestion
//!
//! Pulls studies from the v2 API with token pagination, normalizes the
//! protocol section into flat trial records, exports year-partitioned
//! JSONL, and loads partition files into the relational store.

pub mod client;
pub mod exporter;
pub mod loader;
pub mod normalize;
pub mod record;

pub use client::{CtgovClient, PageCursor, StudyQuery};
pub use exporter::{ExportSummary, export_query};
pub use loader::{LoadSummary, load_file};
pub use normalize::{normalize_page, normalize_study};
pub use record::Trial;
