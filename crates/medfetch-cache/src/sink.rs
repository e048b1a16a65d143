//! Batched upsert sink
//!
//! Rows accumulate until a batch fills, then the batch is deduplicated by
//! conflict key (last occurrence wins) and sent in one request. The
//! transport is a trait so tests can record calls instead of hitting the
//! network.

use std::collections::hash_map::Entry;

use anyhow::{Context, Result};
use medfetch_core::{SHARED_RUNTIME, http_client};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::tables::TableSpec;

/// Rows per upsert request.
const BATCH_SIZE: usize = 500;

pub trait UpsertTransport {
    fn upsert(&mut self, table: &str, conflict_col: &str, rows: &[Value]) -> Result<()>;
}

/// PostgREST upsert transport (`POST /rest/v1/{table}?on_conflict=...`
/// with merge-duplicates resolution).
pub struct RestTransport {
    base_url: String,
    api_key: String,
}

impl RestTransport {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

impl UpsertTransport for RestTransport {
    fn upsert(&mut self, table: &str, conflict_col: &str, rows: &[Value]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = format!("{}/rest/v1/{table}", self.base_url.trim_end_matches('/'));
        SHARED_RUNTIME
            .handle()
            .block_on(async {
                http_client()
                    .post(&url)
                    .query(&[("on_conflict", conflict_col)])
                    .header("apikey", &self.api_key)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .header("Prefer", "resolution=merge-duplicates")
                    .json(rows)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok::<_, reqwest::Error>(())
            })
            .with_context(|| format!("upserting {} row(s) into {table}", rows.len()))
    }
}

#[derive(Debug, Default, Clone)]
pub struct SinkStats {
    /// Rows pushed into the sink.
    pub rows_seen: usize,
    /// Rows actually sent (after within-batch dedup).
    pub rows_sent: usize,
    pub upsert_calls: usize,
}

impl SinkStats {
    pub fn absorb(&mut self, other: SinkStats) {
        self.rows_seen += other.rows_seen;
        self.rows_sent += other.rows_sent;
        self.upsert_calls += other.upsert_calls;
    }
}

/// Accumulates keyed rows and flushes them in deduplicated batches.
pub struct UpsertBatcher<'a, T: UpsertTransport> {
    transport: &'a mut T,
    spec: &'a TableSpec,
    pending: Vec<(String, Value)>,
    stats: SinkStats,
}

impl<'a, T: UpsertTransport> UpsertBatcher<'a, T> {
    pub fn new(transport: &'a mut T, spec: &'a TableSpec) -> Self {
        Self {
            transport,
            spec,
            pending: Vec::with_capacity(BATCH_SIZE),
            stats: SinkStats::default(),
        }
    }

    pub fn push(&mut self, key: String, row: Value) -> Result<()> {
        self.stats.rows_seen += 1;
        self.pending.push((key, row));
        if self.pending.len() >= BATCH_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    /// Dedup the pending batch by key (last occurrence wins, first-seen
    /// order preserved) and send it.
    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut rows: Vec<Value> = Vec::with_capacity(self.pending.len());
        let mut index: FxHashMap<String, usize> = FxHashMap::default();
        for (key, row) in self.pending.drain(..) {
            match index.entry(key) {
                Entry::Occupied(slot) => rows[*slot.get()] = row,
                Entry::Vacant(slot) => {
                    slot.insert(rows.len());
                    rows.push(row);
                }
            }
        }
        self.transport
            .upsert(self.spec.table, self.spec.conflict_col, &rows)?;
        self.stats.upsert_calls += 1;
        self.stats.rows_sent += rows.len();
        Ok(())
    }

    /// Flush the final partial batch and return the stats.
    pub fn finish(mut self) -> Result<SinkStats> {
        self.flush()?;
        Ok(std::mem::take(&mut self.stats))
    }
}
