//! medfetch-cache - Remote cache synchronization
//!
//! Pushes exported partition files and public CSV extracts into a
//! PostgREST-style cache backend with batched, deduplicated upserts.

pub mod runner;
pub mod sink;
pub mod tables;

pub use runner::{cache_payments, cache_physicians, cache_publications, cache_trials};
pub use sink::{RestTransport, SinkStats, UpsertBatcher, UpsertTransport};
pub use tables::TableSpec;
