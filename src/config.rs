//! Configuration loading and validation.
//!
//! All commands read a TOML config file (default `./config/radar.toml`).
//! Per-market sections may override field-name mappings (the raw→canonical
//! table is data, so registry schema drift is handled here, not in adapter
//! code) and define fetch endpoints for the checkpointed bulk downloader.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub markets: BTreeMap<String, MarketConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Root directory holding one subdirectory per layer.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Directory the markdown reports are written to.
    #[serde(default = "default_report_dir")]
    pub output_dir: PathBuf,
    /// Rows in the global ingredient ranking.
    #[serde(default = "default_top_global")]
    pub top_global: usize,
    /// Rows in each per-market ranking.
    #[serde(default = "default_top_market")]
    pub top_market: usize,
    /// How many global leaders are scanned for cross-market differences.
    #[serde(default = "default_cross_market_scan")]
    pub cross_market_scan: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_report_dir(),
            top_global: default_top_global(),
            top_market: default_top_market(),
            cross_market_scan: default_cross_market_scan(),
        }
    }
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_top_global() -> usize {
    20
}
fn default_top_market() -> usize {
    10
}
fn default_cross_market_scan() -> usize {
    50
}

/// Per-market configuration overrides.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MarketConfig {
    /// Canonical-field → raw-key overrides applied on top of the adapter
    /// defaults.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Bulk-download endpoint for `radar fetch`.
    #[serde(default)]
    pub fetch: Option<FetchConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Page URL template; `{page}` is substituted with the page number and
    /// `{limit}` with the page size.
    pub url: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Inter-request delay, a courtesy to the registry API.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base of the exponential backoff between retries, in seconds.
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,
}

fn default_page_size() -> usize {
    100
}
fn default_delay_ms() -> u64 {
    100
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_secs() -> u64 {
    5
}

impl Config {
    /// A minimal config for tests and config-less invocations.
    pub fn minimal() -> Self {
        Self {
            corpus: CorpusConfig {
                root: PathBuf::from("./corpus"),
            },
            report: ReportConfig::default(),
            markets: BTreeMap::new(),
        }
    }

    pub fn field_overrides(&self, layer: &str) -> Option<&BTreeMap<String, String>> {
        self.markets.get(layer).map(|m| &m.fields)
    }

    pub fn fetch_config(&self, layer: &str) -> Option<&FetchConfig> {
        self.markets.get(layer).and_then(|m| m.fetch.as_ref())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.corpus.root.as_os_str().is_empty() {
        anyhow::bail!("corpus.root must not be empty");
    }
    if config.report.top_global == 0 {
        anyhow::bail!("report.top_global must be >= 1");
    }
    if config.report.top_market == 0 {
        anyhow::bail!("report.top_market must be >= 1");
    }
    for (layer, market) in &config.markets {
        if let Some(fetch) = &market.fetch {
            if !fetch.url.contains("{page}") {
                anyhow::bail!(
                    "markets.{}.fetch.url must contain a {{page}} placeholder",
                    layer
                );
            }
            if fetch.page_size == 0 {
                anyhow::bail!("markets.{}.fetch.page_size must be >= 1", layer);
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let toml = r#"
[corpus]
root = "/data/corpus"

[report]
output_dir = "/data/reports"
top_global = 30

[markets.ca_lnhpd.fields]
source_id = "lnhpd_id"

[markets.ca_lnhpd.fetch]
url = "https://example.test/api?page={page}&limit={limit}"
page_size = 100
delay_ms = 250
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.corpus.root, PathBuf::from("/data/corpus"));
        assert_eq!(config.report.top_global, 30);
        assert_eq!(config.report.top_market, 10);
        assert_eq!(
            config.field_overrides("ca_lnhpd").unwrap()["source_id"],
            "lnhpd_id"
        );
        let fetch = config.fetch_config("ca_lnhpd").unwrap();
        assert_eq!(fetch.delay_ms, 250);
        assert_eq!(fetch.max_retries, 3);
        assert!(config.fetch_config("us_dsld").is_none());
    }

    #[test]
    fn fetch_url_requires_page_placeholder() {
        let toml = r#"
[corpus]
root = "/data/corpus"

[markets.ca_lnhpd.fetch]
url = "https://example.test/api"
"#;
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("radar.toml");
        std::fs::write(&path, toml).unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("{page}"));
    }

    #[test]
    fn minimal_config_is_valid() {
        let config = Config::minimal();
        assert!(config.markets.is_empty());
        assert_eq!(config.report.top_global, 20);
    }
}
