//! Search subcommand - substring search over the loaded store

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use medfetch_store::Store;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct SearchArgs {
    #[command(subcommand)]
    pub target: SearchTarget,
}

#[derive(Subcommand, Debug)]
pub enum SearchTarget {
    /// Search article titles and abstracts
    Articles(QueryArgs),
    /// Search trial titles and summaries
    Trials(QueryArgs),
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Substring to match (case-insensitive)
    pub term: String,

    /// DuckDB database path
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Maximum number of hits
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,
}

pub fn run(args: SearchArgs, config: &Config) -> Result<()> {
    match args.target {
        SearchTarget::Articles(query) => search_articles(query, config),
        SearchTarget::Trials(query) => search_trials(query, config),
    }
}

fn open_store(db: Option<PathBuf>, config: &Config) -> Result<Store> {
    let db_path = db.unwrap_or_else(|| config.output.db_path.clone());
    Store::open(&db_path)
}

fn results_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

fn search_articles(query: QueryArgs, config: &Config) -> Result<()> {
    let store = open_store(query.db, config)?;
    let hits = store.search_articles(&query.term, query.limit)?;
    if hits.is_empty() {
        eprintln!("No articles match {:?}", query.term);
        return Ok(());
    }

    let mut table = results_table(&["PMID", "Date", "Journal", "Title"]);
    for hit in &hits {
        table.add_row(vec![
            hit.pmid.to_string(),
            hit.date_published.clone().unwrap_or_default(),
            hit.journal_title.clone().unwrap_or_default(),
            hit.title.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn search_trials(query: QueryArgs, config: &Config) -> Result<()> {
    let store = open_store(query.db, config)?;
    let hits = store.search_trials(&query.term, query.limit)?;
    if hits.is_empty() {
        eprintln!("No trials match {:?}", query.term);
        return Ok(());
    }

    let mut table = results_table(&["NCT ID", "Updated", "Status", "Title"]);
    for hit in &hits {
        table.add_row(vec![
            hit.nct_id.clone(),
            hit.last_update_post_date.clone().unwrap_or_default(),
            hit.status.clone().unwrap_or_default(),
            hit.brief_title.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}
