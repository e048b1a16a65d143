//! medfetch-store - Relational store over DuckDB
//!
//! Holds the loaded article and trial tables and the substring search
//! queries the CLI exposes.

pub mod search;
pub mod store;

pub use search::{ArticleHit, TrialHit};
pub use store::{ArticleRow, Store, TrialRow};
