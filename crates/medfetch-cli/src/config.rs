//! Configuration loading from TOML files

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global configuration for medfetch
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub pubmed: PubmedConfig,
    pub ctgov: CtgovConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_dir: PathBuf,
    pub db_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_dir: PathBuf::from("./data"),
            db_path: PathBuf::from("./medfetch.duckdb"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PubmedConfig {
    pub base_url: String,
    pub batch_size: usize,
    /// Root of the bulk archive distribution.
    pub archive_base_url: String,
}

impl Default for PubmedConfig {
    fn default() -> Self {
        Self {
            base_url: medfetch_pubmed::eutils::DEFAULT_BASE_URL.to_string(),
            batch_size: medfetch_pubmed::eutils::DEFAULT_BATCH_SIZE,
            archive_base_url: medfetch_pubmed::download::DEFAULT_ARCHIVE_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CtgovConfig {
    pub base_url: String,
    pub page_size: usize,
    /// Default last-update year for fetches.
    pub year: i32,
}

impl Default for CtgovConfig {
    fn default() -> Self {
        Self {
            base_url: medfetch_ctgov::client::DEFAULT_BASE_URL.to_string(),
            page_size: medfetch_ctgov::client::DEFAULT_PAGE_SIZE,
            year: 2025,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub base_url: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("CACHE_URL").ok(),
            api_key: std::env::var("CACHE_API_KEY").ok(),
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./medfetch.toml (current directory)
    /// 2. ~/.config/medfetch/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("medfetch.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "medfetch") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.output.default_dir, PathBuf::from("./data"));
        assert_eq!(config.pubmed.batch_size, 1000);
        assert_eq!(config.ctgov.year, 2025);
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("MEDFETCH_TEST_VAR", "test_value");
        assert_eq!(
            expand_env_var("${MEDFETCH_TEST_VAR}"),
            Some("test_value".to_string())
        );
        std::env::remove_var("MEDFETCH_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[output]
default_dir = "/tmp/data"
db_path = "/tmp/medfetch.duckdb"

[pubmed]
batch_size = 500

[ctgov]
year = 2024
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.output.default_dir, PathBuf::from("/tmp/data"));
        assert_eq!(config.pubmed.batch_size, 500);
        assert_eq!(
            config.pubmed.archive_base_url,
            "https://ftp.ncbi.nlm.nih.gov/pubmed/"
        );
        assert_eq!(config.ctgov.year, 2024);
    }
}
