//! Checkpointed bulk download of registry records.
//!
//! Pages a registry's JSON API into a JSONL extract. The one piece of
//! failure recovery in the pipeline lives here: after every page the
//! output is flushed and a progress checkpoint (`<output>.progress`) is
//! written and flushed *before* the next request starts, so a crash loses
//! at most one page. `--resume` reopens the output in append mode and
//! continues from the checkpointed page.
//!
//! Failed requests retry with exponential backoff; exhausting the retries
//! persists the checkpoint and aborts the run with a non-zero exit.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{Config, FetchConfig};
use crate::error::PipelineError;
use crate::market::MarketRegistry;
use crate::progress::{ProgressEvent, ProgressMode};

/// Consecutive empty pages treated as the end of the dataset.
const EMPTY_PAGE_LIMIT: u32 = 3;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no fetch endpoint configured for layer '{0}' (markets.{0}.fetch in config)")]
    NotConfigured(String),

    #[error("page {page} failed after {attempts} attempts; checkpoint saved, rerun with --resume")]
    RetriesExhausted { page: u64, attempts: u32 },
}

/// On-disk resume checkpoint.
#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    last_page: u64,
    total_fetched: u64,
    timestamp: String,
}

pub fn run_fetch(
    config: &Config,
    registry: &MarketRegistry,
    layer: &str,
    resume: bool,
    limit: Option<u64>,
    output: Option<PathBuf>,
    progress: Option<ProgressMode>,
) -> Result<u64> {
    registry
        .find(layer)
        .ok_or_else(|| PipelineError::UnknownLayer(layer.to_string()))?;
    let fetch_config = config
        .fetch_config(layer)
        .ok_or_else(|| FetchError::NotConfigured(layer.to_string()))?;

    let output = output.unwrap_or_else(|| {
        let date = chrono::Utc::now().format("%Y-%m-%d");
        config
            .corpus
            .root
            .join(layer)
            .join("raw")
            .join(format!("{}-{}.jsonl", layer, date))
    });
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let checkpoint_path = checkpoint_path(&output);

    println!("fetch {}", layer);
    println!("  endpoint: {}", fetch_config.url);
    println!("  output: {}", output.display());

    let mut start_page = 1u64;
    let mut total_fetched = 0u64;
    let mut append = false;

    if resume {
        if let Some(checkpoint) = load_checkpoint(&checkpoint_path) {
            start_page = checkpoint.last_page + 1;
            total_fetched = checkpoint.total_fetched;
            append = true;
            println!(
                "  resuming from page {} ({} records already fetched)",
                start_page, total_fetched
            );
        } else {
            println!("  no checkpoint found, starting from page 1");
        }
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(&output)
        .map_err(|e| PipelineError::io(&output, e))?;
    let mut writer = std::io::BufWriter::new(file);

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .user_agent("ingredient-radar/0.3")
        .build()?;

    let reporter = progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    let mut page = start_page;
    let mut empty_pages = 0u32;

    loop {
        if limit.map(|l| total_fetched >= l).unwrap_or(false) {
            println!("  reached record limit {}", limit.unwrap_or(0));
            break;
        }

        let body = match fetch_page(&client, fetch_config, page) {
            Ok(body) => body,
            Err(_) => {
                // Persist what we have; the run aborts but loses at most
                // this page.
                save_checkpoint(&checkpoint_path, page.saturating_sub(1), total_fetched)?;
                return Err(FetchError::RetriesExhausted {
                    page,
                    attempts: fetch_config.max_retries,
                }
                .into());
            }
        };

        let records = page_records(&body);
        if records.is_empty() {
            empty_pages += 1;
            if empty_pages >= EMPTY_PAGE_LIMIT {
                println!("  {} consecutive empty pages, done", empty_pages);
                break;
            }
            page += 1;
            continue;
        }
        empty_pages = 0;

        for record in records {
            if limit.map(|l| total_fetched >= l).unwrap_or(false) {
                break;
            }
            let line = serde_json::to_string(record)?;
            writeln!(writer, "{}", line).map_err(|e| PipelineError::io(&output, e))?;
            total_fetched += 1;
        }

        // Flush the data, then the checkpoint, before the next request.
        writer.flush().map_err(|e| PipelineError::io(&output, e))?;
        save_checkpoint(&checkpoint_path, page, total_fetched)?;

        reporter.report(ProgressEvent::Fetching {
            layer: layer.to_string(),
            page,
            total: total_fetched,
        });

        page += 1;
        std::thread::sleep(std::time::Duration::from_millis(fetch_config.delay_ms));
    }

    writer.flush().map_err(|e| PipelineError::io(&output, e))?;
    if checkpoint_path.exists() {
        let _ = std::fs::remove_file(&checkpoint_path);
    }

    println!("  fetched: {} records", total_fetched);
    println!("  pages: {}", page.saturating_sub(start_page) + 1);
    println!("ok");

    Ok(total_fetched)
}

fn fetch_page(
    client: &reqwest::blocking::Client,
    config: &FetchConfig,
    page: u64,
) -> std::result::Result<Value, reqwest::Error> {
    let url = page_url(&config.url, page, config.page_size);

    let mut last_err = None;
    for attempt in 0..config.max_retries {
        match client.get(&url).send().and_then(|r| r.error_for_status()) {
            Ok(response) => match response.json::<Value>() {
                Ok(body) => return Ok(body),
                Err(e) => last_err = Some(e),
            },
            Err(e) => last_err = Some(e),
        }

        if attempt + 1 < config.max_retries {
            let delay = config.retry_base_secs * 2u64.pow(attempt);
            eprintln!(
                "  page {} attempt {}/{} failed, retrying in {}s",
                page,
                attempt + 1,
                config.max_retries,
                delay
            );
            std::thread::sleep(std::time::Duration::from_secs(delay));
        }
    }

    Err(last_err.expect("at least one attempt was made"))
}

/// Substitute `{page}` and `{limit}` placeholders in the URL template.
fn page_url(template: &str, page: u64, page_size: usize) -> String {
    template
        .replace("{page}", &page.to_string())
        .replace("{limit}", &page_size.to_string())
}

/// A page body is either a bare array or `{"data": [...]}`.
fn page_records(body: &Value) -> &[Value] {
    match body {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

fn checkpoint_path(output: &Path) -> PathBuf {
    PathBuf::from(format!("{}.progress", output.display()))
}

fn save_checkpoint(path: &Path, last_page: u64, total_fetched: u64) -> Result<()> {
    let checkpoint = Checkpoint {
        last_page,
        total_fetched,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    let json = serde_json::to_string(&checkpoint)?;
    std::fs::write(path, json).map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

fn load_checkpoint(path: &Path) -> Option<Checkpoint> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_placeholders() {
        assert_eq!(
            page_url("https://x.test/api?page={page}&limit={limit}", 7, 100),
            "https://x.test/api?page=7&limit=100"
        );
    }

    #[test]
    fn records_from_bare_array_and_envelope() {
        let bare = json!([{"a": 1}, {"a": 2}]);
        assert_eq!(page_records(&bare).len(), 2);

        let envelope = json!({"data": [{"a": 1}], "meta": {}});
        assert_eq!(page_records(&envelope).len(), 1);

        let empty = json!({"meta": {}});
        assert!(page_records(&empty).is_empty());
    }

    #[test]
    fn checkpoint_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("kr_hff-2026-02-01.jsonl");
        let path = checkpoint_path(&output);
        assert!(path.to_string_lossy().ends_with(".jsonl.progress"));

        save_checkpoint(&path, 42, 4200).unwrap();
        let loaded = load_checkpoint(&path).unwrap();
        assert_eq!(loaded.last_page, 42);
        assert_eq!(loaded.total_fetched, 4200);
    }

    #[test]
    fn corrupt_checkpoint_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x.progress");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_checkpoint(&path).is_none());
        assert!(load_checkpoint(&tmp.path().join("missing")).is_none());
    }
}
