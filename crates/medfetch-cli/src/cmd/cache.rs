//! Cache subcommand - push exports and CSV extracts to the remote cache

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use medfetch_cache::{
    RestTransport, cache_payments, cache_physicians, cache_publications, cache_trials,
};
use medfetch_core::{fmt_num, is_shutdown_requested};

use crate::cmd::print_summary;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub target: CacheTarget,

    /// Cache base URL (default: [cache] base_url or $CACHE_URL)
    #[arg(long, global = true)]
    pub cache_url: Option<String>,

    /// Cache API key (default: [cache] api_key or $CACHE_API_KEY)
    #[arg(long, global = true)]
    pub api_key: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum CacheTarget {
    /// Push exported articles into the publications table
    Publications(YearsArgs),
    /// Push exported trials into the clinicaltrials table
    Trials(YearsArgs),
    /// Push Open Payments extracts into the payments table
    Payments(YearsArgs),
    /// Push NPI registry extracts into the physicians table
    Physicians(PhysiciansArgs),
}

#[derive(Args, Debug)]
pub struct YearsArgs {
    /// Directory holding partition files or CSV extracts
    pub input: PathBuf,

    /// Years to push (comma-separated)
    #[arg(short, long, required = true, value_delimiter = ',')]
    pub years: Vec<i32>,
}

#[derive(Args, Debug)]
pub struct PhysiciansArgs {
    /// Directory holding NPI registry extracts
    pub input: PathBuf,

    /// File pattern within the directory
    #[arg(long, default_value = "*.csv")]
    pub pattern: String,
}

pub fn run(args: CacheArgs, config: &Config) -> Result<()> {
    let base_url = args
        .cache_url
        .or_else(|| config.cache.base_url.clone())
        .context("cache URL not configured (set [cache] base_url or CACHE_URL)")?;
    let api_key = args
        .api_key
        .or_else(|| config.cache.api_key.clone())
        .context("cache API key not configured (set [cache] api_key or CACHE_API_KEY)")?;
    let mut transport = RestTransport::new(base_url, api_key);

    let stats = match args.target {
        CacheTarget::Publications(t) => cache_publications(&mut transport, &t.input, &t.years)?,
        CacheTarget::Trials(t) => cache_trials(&mut transport, &t.input, &t.years)?,
        CacheTarget::Payments(t) => cache_payments(&mut transport, &t.input, &t.years)?,
        CacheTarget::Physicians(t) => cache_physicians(&mut transport, &t.input, &t.pattern)?,
    };

    print_summary(
        "Cache",
        &[
            ("Rows seen", fmt_num(stats.rows_seen)),
            ("Rows sent", fmt_num(stats.rows_sent)),
            ("Upsert calls", fmt_num(stats.upsert_calls)),
        ],
    );

    if is_shutdown_requested() {
        anyhow::bail!("Interrupted");
    }
    Ok(())
}
